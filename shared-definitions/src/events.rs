use core::fmt::{self, Display, Formatter};
use core::str::FromStr;

use crate::{
    controller::ControlCommand,
    error::ProtocolError,
    framing::{encode_frame, RawFrame, EMPTY_PAYLOAD},
    telemetry::TelemetryRecord,
};

/// Event names as they travel on the wire, before the `#` separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTag {
    Connected,
    Control,
    Stop,
    Telemetry,
}

impl EventTag {
    pub const fn as_str(&self) -> &'static str {
        match self {
            EventTag::Connected => "CONNECTED",
            EventTag::Control => "CONTROL",
            EventTag::Stop => "STOP",
            EventTag::Telemetry => "TELEMETRY",
        }
    }
}

impl Display for EventTag {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventTag {
    type Err = ProtocolError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "CONNECTED" => Ok(EventTag::Connected),
            "CONTROL" => Ok(EventTag::Control),
            "STOP" => Ok(EventTag::Stop),
            "TELEMETRY" => Ok(EventTag::Telemetry),
            other => Err(ProtocolError::UnknownEvent(other.to_string())),
        }
    }
}

/// A frame that passed validation, with its payload already typed.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    Connected,
    Control(ControlCommand),
    Stop,
    Telemetry(TelemetryRecord),
}

impl ControlEvent {
    pub fn tag(&self) -> EventTag {
        match self {
            ControlEvent::Connected => EventTag::Connected,
            ControlEvent::Control(_) => EventTag::Control,
            ControlEvent::Stop => EventTag::Stop,
            ControlEvent::Telemetry(_) => EventTag::Telemetry,
        }
    }

    /// Payloads of CONNECTED and STOP are ignored, whatever the peer sent.
    pub fn from_frame(frame: &RawFrame) -> Result<Self, ProtocolError> {
        let tag: EventTag = frame.event.parse()?;
        match tag {
            EventTag::Connected => Ok(ControlEvent::Connected),
            EventTag::Stop => Ok(ControlEvent::Stop),
            EventTag::Control => Ok(ControlEvent::Control(frame.payload.parse()?)),
            EventTag::Telemetry => Ok(ControlEvent::Telemetry(frame.payload.parse()?)),
        }
    }

    pub fn to_frame(&self) -> String {
        match self {
            ControlEvent::Connected | ControlEvent::Stop => encode_frame(self.tag(), EMPTY_PAYLOAD),
            ControlEvent::Control(command) => encode_frame(self.tag(), &command.encode()),
            ControlEvent::Telemetry(record) => encode_frame(self.tag(), &record.encode()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_tags_and_rejects_the_rest() {
        assert_eq!("STOP".parse::<EventTag>(), Ok(EventTag::Stop));
        assert_eq!("CONTROL".parse::<EventTag>(), Ok(EventTag::Control));
        assert_eq!(
            "LAND".parse::<EventTag>(),
            Err(ProtocolError::UnknownEvent("LAND".to_string()))
        );
        // Tags are case sensitive on the wire.
        assert!("stop".parse::<EventTag>().is_err());
    }

    #[test]
    fn typed_event_from_raw_frame() {
        let frame = RawFrame {
            event: "CONTROL".to_string(),
            payload: "10,0,-5,0".to_string(),
        };
        let event = ControlEvent::from_frame(&frame).unwrap();
        assert_eq!(
            event,
            ControlEvent::Control(ControlCommand {
                throttle_pct: 10.0,
                roll: 0,
                pitch: -5,
                yaw: 0,
            })
        );

        let stop = RawFrame {
            event: "STOP".to_string(),
            payload: EMPTY_PAYLOAD.to_string(),
        };
        assert_eq!(ControlEvent::from_frame(&stop).unwrap(), ControlEvent::Stop);
    }

    #[test]
    fn malformed_control_payload_is_rejected_before_dispatch() {
        let frame = RawFrame {
            event: "CONTROL".to_string(),
            payload: "10,abc,0,0".to_string(),
        };
        match ControlEvent::from_frame(&frame) {
            Err(ProtocolError::MalformedPayload { event, .. }) => {
                assert_eq!(event, EventTag::Control)
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn frames_for_events_without_payload_use_the_sentinel() {
        assert_eq!(ControlEvent::Stop.to_frame(), "STOP#_$");
        assert_eq!(ControlEvent::Connected.to_frame(), "CONNECTED#_$");
    }
}
