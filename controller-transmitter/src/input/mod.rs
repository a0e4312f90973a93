use std::{
    io::BufRead,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
};

use shared_definitions::{ControlCommand, ProtocolError};
use thiserror::Error;

const STOP_KEYWORD: &str = "stop";

#[derive(Debug, Error)]
pub enum InputError {
    #[error("expected `<throttle> <roll> <pitch> <yaw>` or `stop`, got {0:?}")]
    Unrecognized(String),

    #[error(transparent)]
    OutOfRange(#[from] ProtocolError),
}

/// Throttle in percent, angles in whole degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DroneMovementInput {
    pub throttle_pct: f32,
    pub roll: i16,
    pub pitch: i16,
    pub yaw: i16,
}

impl DroneMovementInput {
    pub fn to_command(&self) -> ControlCommand {
        ControlCommand {
            throttle_pct: self.throttle_pct,
            roll: self.roll,
            pitch: self.pitch,
            yaw: self.yaw,
        }
    }
}

impl From<ControlCommand> for DroneMovementInput {
    fn from(command: ControlCommand) -> Self {
        DroneMovementInput {
            throttle_pct: command.throttle_pct,
            roll: command.roll,
            pitch: command.pitch,
            yaw: command.yaw,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PilotAction {
    Move(DroneMovementInput),
    Stop,
}

/// Blank lines carry no action. Ranges are the ones the vehicle accepts on
/// the wire, so nothing the pilot types can be rejected later.
pub fn parse_input_line(line: &str) -> Result<Option<PilotAction>, InputError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    if line.eq_ignore_ascii_case(STOP_KEYWORD) {
        return Ok(Some(PilotAction::Stop));
    }

    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 4 {
        return Err(InputError::Unrecognized(line.to_string()));
    }
    let command: ControlCommand = fields.join(",").parse()?;
    Ok(Some(PilotAction::Move(command.into())))
}

/// Latest pilot input, written by the input thread and sampled by the send
/// loop at its own cadence.
#[derive(Clone, Default)]
pub struct ControlInputMapper {
    drone_controls: Arc<Mutex<DroneMovementInput>>,
    stop_requested: Arc<AtomicBool>,
    input_closed: Arc<AtomicBool>,
}

impl ControlInputMapper {
    pub fn new() -> Self {
        Self::default()
    }

    fn map_action(&self, action: PilotAction) {
        let mut controls = self
            .drone_controls
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match action {
            PilotAction::Move(input) => *controls = input,
            PilotAction::Stop => {
                *controls = DroneMovementInput::default();
                self.stop_requested.store(true, Ordering::Release);
            }
        }
    }

    pub fn map_line(&self, line: &str) -> Result<(), InputError> {
        if let Some(action) = parse_input_line(line)? {
            self.map_action(action);
        }
        Ok(())
    }

    pub fn get_current_input(&self) -> DroneMovementInput {
        *self
            .drone_controls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// True once per STOP entered.
    pub fn take_stop_request(&self) -> bool {
        self.stop_requested.swap(false, Ordering::AcqRel)
    }

    pub fn is_input_closed(&self) -> bool {
        self.input_closed.load(Ordering::Acquire)
    }

    fn event_thread_fn(&self, reader: impl BufRead) {
        for line in reader.lines() {
            match line {
                Ok(line) => {
                    if let Err(err) = self.map_line(&line) {
                        log::warn!("{}", err);
                    }
                }
                Err(err) => {
                    log::error!("Reading pilot input failed: {}", err);
                    break;
                }
            }
        }
        self.input_closed.store(true, Ordering::Release);
    }

    pub fn start_event_handler_thread<R: BufRead + Send + 'static>(
        &self,
        reader: R,
    ) -> std::io::Result<()> {
        let mapper = self.clone();
        std::thread::Builder::new()
            .name("pilot-input".to_string())
            .spawn(move || mapper.event_thread_fn(reader))?;
        Ok(())
    }
}
