use core::str::FromStr;

use crate::{
    error::ProtocolError,
    events::EventTag,
    framing::{SEPARATOR, TERMINATOR},
};

/// `name,value` payload of a TELEMETRY event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryRecord {
    pub name: String,
    pub value: String,
}

impl TelemetryRecord {
    /// Characters that would break framing are replaced, the name also loses
    /// commas since the first comma splits name from value.
    pub fn new(name: &str, value: impl ToString) -> Self {
        let value = value.to_string();
        TelemetryRecord {
            name: name
                .chars()
                .map(|c| if Self::is_reserved(c) || c == ',' { '_' } else { c })
                .collect(),
            value: value
                .chars()
                .map(|c| if Self::is_reserved(c) { '_' } else { c })
                .collect(),
        }
    }

    fn is_reserved(c: char) -> bool {
        c == SEPARATOR || c == TERMINATOR
    }

    pub fn encode(&self) -> String {
        format!("{},{}", self.name, self.value)
    }
}

impl FromStr for TelemetryRecord {
    type Err = ProtocolError;

    fn from_str(payload: &str) -> Result<Self, Self::Err> {
        match payload.split_once(',') {
            Some((name, value)) if !name.trim().is_empty() => Ok(TelemetryRecord {
                name: name.trim().to_string(),
                value: value.trim().to_string(),
            }),
            _ => Err(ProtocolError::MalformedPayload {
                event: EventTag::Telemetry,
                reason: format!("expected name,value but got {:?}", payload),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_may_contain_commas() {
        let record: TelemetryRecord = "SIG_STR,wlan0,-52".parse().unwrap();
        assert_eq!(record.name, "SIG_STR");
        assert_eq!(record.value, "wlan0,-52");
    }

    #[test]
    fn reserved_characters_never_reach_the_wire() {
        let record = TelemetryRecord::new("A#B,C", "1$2");
        assert_eq!(record.encode(), "A_B_C,1_2");
    }

    #[test]
    fn missing_name_is_malformed() {
        assert!(",12".parse::<TelemetryRecord>().is_err());
        assert!("12".parse::<TelemetryRecord>().is_err());
    }
}
