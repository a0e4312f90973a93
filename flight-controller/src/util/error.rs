use shared_definitions::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("hardware error: {0}")]
    Hardware(String),

    #[error("sensor fusion has not finished calibrating")]
    SensorNotReady,

    #[error("sensor failed {consecutive} consecutive reads")]
    SensorFailure { consecutive: u32 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn hardware(context: &str, error: impl core::fmt::Debug) -> Self {
        AppError::Hardware(format!("{} {:?}", context, error))
    }
}
