use thiserror::Error;

use crate::events::EventTag;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("frame {0:?} has no event separator")]
    MissingSeparator(String),

    #[error("unknown event {0:?}")]
    UnknownEvent(String),

    #[error("malformed {event} payload: {reason}")]
    MalformedPayload { event: EventTag, reason: String },

    #[error("receive buffer exceeded {0} bytes without a frame terminator")]
    BufferOverflow(usize),
}
