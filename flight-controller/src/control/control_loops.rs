use core::fmt::{self, Display, Formatter};
use std::sync::atomic::Ordering;

use crate::{
    config::ControllerConfig,
    shared_core_values::{AppContext, ControlTargets},
    util::{error::AppError, math::vectors::RotationVector3D, time::sleep_remaining},
};

use super::pid::PID;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightState {
    Initializing = 0,
    ArmedIdle = 1,
    Active = 2,
    Halted = 3,
}

impl FlightState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            FlightState::Initializing => "INITIALIZING",
            FlightState::ArmedIdle => "ARMED_IDLE",
            FlightState::Active => "ACTIVE",
            FlightState::Halted => "HALTED",
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => FlightState::Initializing,
            1 => FlightState::ArmedIdle,
            2 => FlightState::Active,
            _ => FlightState::Halted,
        }
    }
}

impl Display for FlightState {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requests the controller hands to whoever owns the motors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MainControlLoopOutCommands {
    ArmMotors,
    /// Stop now, no settle delay.
    KillMotors,
    /// Stop with the configured settle delay, used when the process exits.
    ShutdownMotors,
    UpdateFlightState(FlightStabilizerOut),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlightStabilizerOut {
    /// Pulse width the rotation commands are added on top of.
    pub throttle: f32,
    pub rotation_output_command: RotationVector3D,
}

pub struct FlightController {
    config: ControllerConfig,
    roll_pid: PID,
    pitch_pid: PID,
    yaw_pid: PID,
    state: FlightState,
    throttle: f32,
    targets: ControlTargets,
}

impl FlightController {
    pub fn new(config: &ControllerConfig) -> Self {
        let yaw_gain = config.yaw_gain_factor;
        FlightController {
            roll_pid: PID::new(
                config.proportional_gain,
                config.integral_gain,
                config.derivative_gain,
            ),
            pitch_pid: PID::new(
                config.proportional_gain,
                config.integral_gain,
                config.derivative_gain,
            ),
            yaw_pid: PID::new(
                config.proportional_gain * yaw_gain,
                config.integral_gain * yaw_gain,
                config.derivative_gain * yaw_gain,
            ),
            state: FlightState::Initializing,
            throttle: config.min_throttle_pwm as f32,
            targets: ControlTargets::idle(config.min_throttle_pwm),
            config: config.clone(),
        }
    }

    pub fn state(&self) -> FlightState {
        self.state
    }

    /// Targets used on the last tick, after the deadman check.
    #[allow(dead_code)]
    pub fn targets(&self) -> ControlTargets {
        self.targets
    }

    fn transition(&mut self, context: &AppContext, next: FlightState) {
        if self.state != next {
            log::info!("Flight state {} -> {}", self.state, next);
            self.state = next;
            context
                .telemetry
                .controller_state
                .store(next as u8, Ordering::Relaxed);
        }
    }

    fn reset_pids(&mut self) {
        self.roll_pid.reset();
        self.pitch_pid.reset();
        self.yaw_pid.reset();
    }

    fn halt(
        &mut self,
        context: &AppContext,
        command: MainControlLoopOutCommands,
        out: &mut impl FnMut(MainControlLoopOutCommands) -> Result<(), AppError>,
    ) {
        if let Err(err) = out(command) {
            log::error!("Halting motors failed: {}", err);
        }
        self.throttle = 0.0;
        self.reset_pids();
        self.transition(context, FlightState::Halted);
    }

    /// Pilot targets, or idle ones when the last update is older than the
    /// reset timeout. Never having received an update counts as stale.
    fn effective_targets(&self, context: &AppContext, now_us: u64) -> (ControlTargets, bool) {
        let last_update_us = context.targets.last_update_us();
        let timeout_us = self.config.target_reset_timeout.as_micros() as u64;
        let fresh = last_update_us != 0 && now_us.saturating_sub(last_update_us) <= timeout_us;
        match fresh {
            true => (context.targets.read(), true),
            false => (ControlTargets::idle(self.config.min_throttle_pwm), false),
        }
    }

    fn ease_throttle(&mut self, target_throttle: u16) {
        self.throttle +=
            (target_throttle as f32 - self.throttle) * self.config.throttle_ease_factor;
    }

    fn update_setpoints(&mut self, targets: ControlTargets) {
        self.roll_pid.set_setpoint(targets.roll as f32);
        self.pitch_pid.set_setpoint(targets.pitch as f32);
        self.yaw_pid.set_setpoint(targets.yaw as f32);
        self.targets = targets;
    }

    fn attitude_response(&mut self, orientation: RotationVector3D, now_us: u64) -> RotationVector3D {
        // The frame offset applies to the estimate, before any error is computed
        let aligned = orientation.rotate_on_z(self.config.frame_offset_angle_deg);
        let yaw = match self.targets.yaw != 0 {
            true => self.yaw_pid.update_heading(orientation.yaw, now_us),
            false => 0.0,
        };
        RotationVector3D {
            roll: self.roll_pid.update(aligned.roll, now_us),
            pitch: self.pitch_pid.update(aligned.pitch, now_us),
            yaw,
        }
    }

    /// One controller cycle. Every motor request goes through `out`.
    pub fn tick(
        &mut self,
        context: &AppContext,
        now_us: u64,
        out: &mut impl FnMut(MainControlLoopOutCommands) -> Result<(), AppError>,
    ) -> FlightState {
        if self.state == FlightState::Halted {
            return self.state;
        }

        let flags = &context.flags;
        if flags.must_halt() {
            let command = match flags.is_shutting_down() {
                true => MainControlLoopOutCommands::ShutdownMotors,
                false => MainControlLoopOutCommands::KillMotors,
            };
            log::warn!(
                "Halt requested (stop: {}, sensor fault: {}, shutdown: {})",
                flags.halt_requested.load(Ordering::Acquire),
                flags.sensor_fault.load(Ordering::Acquire),
                flags.is_shutting_down()
            );
            self.halt(context, command, out);
            return self.state;
        }

        if self.state == FlightState::Initializing {
            if flags.fusion_ready.load(Ordering::Acquire) {
                match out(MainControlLoopOutCommands::ArmMotors) {
                    Ok(()) => {
                        self.reset_pids();
                        self.transition(context, FlightState::ArmedIdle);
                    }
                    Err(err) => {
                        log::error!("Arming failed: {}", err);
                        self.halt(context, MainControlLoopOutCommands::KillMotors, out);
                    }
                }
            }
            return self.state;
        }

        let (targets, fresh) = self.effective_targets(context, now_us);
        match fresh {
            true => self.transition(context, FlightState::Active),
            false => {
                if self.state == FlightState::Active {
                    log::warn!("No control update for {:?}, reverting to idle", self.config.target_reset_timeout);
                    self.reset_pids();
                }
                self.transition(context, FlightState::ArmedIdle);
            }
        }
        self.update_setpoints(targets);
        self.ease_throttle(targets.throttle_pwm);

        let rotation_output_command = match self.state {
            FlightState::Active => self.attitude_response(context.orientation.read(), now_us),
            _ => RotationVector3D::default(),
        };
        log::debug!(
            "throttle {:.1} response {:?}",
            self.throttle,
            rotation_output_command
        );

        let command = MainControlLoopOutCommands::UpdateFlightState(FlightStabilizerOut {
            throttle: self.throttle,
            rotation_output_command,
        });
        if let Err(err) = out(command) {
            log::error!("Motor update failed: {}", err);
            self.halt(context, MainControlLoopOutCommands::KillMotors, out);
            return self.state;
        }

        context
            .telemetry
            .throttle
            .store(self.throttle as u16, Ordering::Relaxed);
        self.state
    }
}

/// Fixed rate controller loop, returns once the controller halted.
pub fn start_flight_controller(
    context: &AppContext,
    config: &ControllerConfig,
    mut controllers_out_callback: impl FnMut(MainControlLoopOutCommands) -> Result<(), AppError>,
) {
    let mut controller = FlightController::new(config);
    context
        .telemetry
        .controller_state
        .store(controller.state() as u8, Ordering::Relaxed);

    loop {
        let started_us = context.clock.get_current_system_time_us();
        let state = controller.tick(context, started_us, &mut controllers_out_callback);
        if state == FlightState::Halted {
            break;
        }

        let finished_us = context.clock.get_current_system_time_us();
        context.telemetry.loop_exec_time_us.store(
            finished_us.saturating_sub(started_us) as i32,
            Ordering::Relaxed,
        );
        sleep_remaining(&context.clock, started_us, config.cycle);
    }
    log::info!("Flight controller stopped");
}
