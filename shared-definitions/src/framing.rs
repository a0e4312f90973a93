use crate::{error::ProtocolError, events::EventTag};

pub const SEPARATOR: char = '#';
pub const TERMINATOR: char = '$';
/// Payload sent for events that carry no data.
pub const EMPTY_PAYLOAD: &str = "_";
/// Bytes the receiver keeps without seeing a terminator before giving up on them.
pub const MAX_PENDING_BYTES: usize = 4096;

/// `<event>#<payload>$`
pub fn encode_frame(event: EventTag, payload: &str) -> String {
    let payload = if payload.is_empty() {
        EMPTY_PAYLOAD
    } else {
        payload
    };
    format!("{}{}{}{}", event.as_str(), SEPARATOR, payload, TERMINATOR)
}

/// One complete message split out of the byte stream, not yet validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub event: String,
    pub payload: String,
}

impl RawFrame {
    fn parse(message: &str) -> Result<Self, ProtocolError> {
        match message.split_once(SEPARATOR) {
            Some((event, payload)) => Ok(RawFrame {
                event: event.trim().to_string(),
                payload: payload.trim().to_string(),
            }),
            None => Err(ProtocolError::MissingSeparator(message.to_string())),
        }
    }
}

/// Receive buffer for a stream connection.
///
/// Bytes are appended as they are read; every terminator found closes a frame.
/// Whatever follows the last terminator stays buffered until the next read, so
/// a frame split across reads is handed out only once it is complete.
pub struct FrameAccumulator {
    pending: Vec<u8>,
    max_pending: usize,
}

impl Default for FrameAccumulator {
    fn default() -> Self {
        Self::new(MAX_PENDING_BYTES)
    }
}

impl FrameAccumulator {
    pub fn new(max_pending: usize) -> Self {
        FrameAccumulator {
            pending: Vec::with_capacity(256),
            max_pending,
        }
    }

    /// Feeds freshly read bytes and returns every frame they complete, in
    /// arrival order. Frames without a separator come back as errors in
    /// their slot so the caller can log and drop them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Result<RawFrame, ProtocolError>> {
        self.pending.extend_from_slice(bytes);

        let mut frames = Vec::new();
        while let Some(end) = self
            .pending
            .iter()
            .position(|byte| *byte == TERMINATOR as u8)
        {
            let message: Vec<u8> = self.pending.drain(..=end).collect();
            let text = String::from_utf8_lossy(&message[..message.len() - 1]);
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            frames.push(RawFrame::parse(text));
        }

        if self.pending.len() > self.max_pending {
            self.pending.clear();
            frames.push(Err(ProtocolError::BufferOverflow(self.max_pending)));
        }

        frames
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
