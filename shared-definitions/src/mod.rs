pub mod controller;
pub mod error;
pub mod events;
pub mod framing;
pub mod telemetry;

pub use controller::ControlCommand;
pub use error::ProtocolError;
pub use events::{ControlEvent, EventTag};
pub use framing::{encode_frame, FrameAccumulator, RawFrame};
pub use telemetry::TelemetryRecord;
