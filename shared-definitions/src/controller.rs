use core::str::FromStr;

use crate::{error::ProtocolError, events::EventTag};

pub const MIN_THROTTLE_PCT: f32 = 0.0;
pub const MAX_THROTTLE_PCT: f32 = 100.0;
pub const MAX_ANGLE_DEG: i16 = 180;

const FIELD_SEPARATOR: char = ',';

/// Pilot command carried by a CONTROL event.
///
/// Throttle stays a percentage on the wire in both directions, the vehicle
/// maps it onto its own pulse range after decoding.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlCommand {
    pub throttle_pct: f32,
    pub roll: i16,
    pub pitch: i16,
    pub yaw: i16,
}

impl ControlCommand {
    /// `throttle,roll,pitch,yaw`. `f32` display is the shortest text that
    /// parses back to the same value, so decoding yields the exact throttle.
    pub fn encode(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}{sep}{}",
            self.throttle_pct,
            self.roll,
            self.pitch,
            self.yaw,
            sep = FIELD_SEPARATOR
        )
    }

    fn malformed(reason: String) -> ProtocolError {
        ProtocolError::MalformedPayload {
            event: EventTag::Control,
            reason,
        }
    }

    fn parse_angle(name: &str, field: &str) -> Result<i16, ProtocolError> {
        let value: i16 = field
            .trim()
            .parse()
            .map_err(|_| Self::malformed(format!("{} {:?} is not an integer", name, field)))?;
        if value.abs() > MAX_ANGLE_DEG {
            return Err(Self::malformed(format!(
                "{} {} outside +-{} degrees",
                name, value, MAX_ANGLE_DEG
            )));
        }
        Ok(value)
    }
}

impl FromStr for ControlCommand {
    type Err = ProtocolError;

    fn from_str(payload: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = payload.split(FIELD_SEPARATOR).collect();
        if fields.len() != 4 {
            return Err(Self::malformed(format!(
                "expected 4 fields, got {}",
                fields.len()
            )));
        }

        let throttle_pct: f32 = fields[0]
            .trim()
            .parse()
            .map_err(|_| Self::malformed(format!("throttle {:?} is not a number", fields[0])))?;
        if !throttle_pct.is_finite()
            || throttle_pct < MIN_THROTTLE_PCT
            || throttle_pct > MAX_THROTTLE_PCT
        {
            return Err(Self::malformed(format!(
                "throttle {} outside {}..{}",
                throttle_pct, MIN_THROTTLE_PCT, MAX_THROTTLE_PCT
            )));
        }

        Ok(ControlCommand {
            throttle_pct,
            roll: Self::parse_angle("roll", fields[1])?,
            pitch: Self::parse_angle("pitch", fields[2])?,
            yaw: Self::parse_angle("yaw", fields[3])?,
        })
    }
}
