use shared_definitions::{ControlCommand, ControlEvent, EventTag, ProtocolError, RawFrame};

use crate::{
    config::ControllerConfig,
    shared_core_values::{AppContext, ControlTargets},
};

/// Applies pilot events to the shared targets. Runs on the link thread and
/// never touches the motors, a STOP is carried out by the controller.
pub struct CommandHandler<'a> {
    context: &'a AppContext,
    config: ControllerConfig,
}

impl<'a> CommandHandler<'a> {
    pub fn new(context: &'a AppContext, config: &ControllerConfig) -> Self {
        CommandHandler {
            context,
            config: config.clone(),
        }
    }

    pub fn handle_frame(&self, frame: &RawFrame) -> Result<(), ProtocolError> {
        let event = ControlEvent::from_frame(frame)?;
        self.handle_event(&event)
    }

    pub fn handle_event(&self, event: &ControlEvent) -> Result<(), ProtocolError> {
        let now_us = self.context.clock.get_current_system_time_us();
        match event {
            ControlEvent::Stop => {
                log::warn!("STOP received");
                self.context
                    .targets
                    .store(ControlTargets::idle(self.config.min_throttle_pwm), now_us);
                self.context.flags.request_halt();
                Ok(())
            }
            ControlEvent::Control(command) => {
                let targets = self.map_command(command);
                log::debug!("Control {:?} -> {:?}", command, targets);
                self.context.targets.store(targets, now_us);
                Ok(())
            }
            ControlEvent::Connected => {
                log::info!("Operator connected");
                Ok(())
            }
            ControlEvent::Telemetry(_) => {
                Err(ProtocolError::UnknownEvent(EventTag::Telemetry.to_string()))
            }
        }
    }

    /// The payload carries a throttle percentage, the controller works with
    /// pulse widths.
    fn map_command(&self, command: &ControlCommand) -> ControlTargets {
        ControlTargets {
            throttle_pwm: self.config.throttle_pct_to_pwm(command.throttle_pct),
            roll: command.roll,
            pitch: command.pitch,
            yaw: command.yaw,
        }
    }
}
