use std::{thread, time::Duration};

use crate::{
    config::MotorsConfig,
    drivers::pwm::PulseWidthOutput,
    output::motor_controller::{MotorController, MotorPosition, MotorState},
    util::error::AppError,
};

/// Sole owner of the PWM output and of the four ESC channels, kept in
/// FL, FR, BR, BL order.
///
/// Dropping the manager halts the motors unless that already happened, so
/// every exit path of the thread that owns it stops the rotors.
pub struct QuadcopterMotorsStateManager<O: PulseWidthOutput> {
    output: O,
    controllers: [MotorController; 4],
    arm_settle: Duration,
    halt_settle: Duration,
    calibration_max_hold: Duration,
    calibration_min_hold: Duration,
    halted: bool,
}

impl<O: PulseWidthOutput> QuadcopterMotorsStateManager<O> {
    pub fn new(output: O, config: &MotorsConfig) -> Self {
        let controllers = MotorPosition::ALL.map(|position| {
            let index = position as usize;
            MotorController::new(
                position,
                config.pins[index],
                config.calibration_offsets_us[index],
                config.min_pulse_width_us,
                config.max_pulse_width_us,
            )
        });

        QuadcopterMotorsStateManager {
            output,
            controllers,
            arm_settle: config.arm_settle,
            halt_settle: config.halt_settle,
            calibration_max_hold: config.calibration_max_hold,
            calibration_min_hold: config.calibration_min_hold,
            halted: false,
        }
    }

    /// Requested widths in FL, FR, BR, BL order, returns what was applied.
    /// Every motor is attempted even if one of them fails.
    pub fn set_motor_pulses(&mut self, values: [f32; 4]) -> Result<[u16; 4], AppError> {
        let mut applied = [0_u16; 4];
        let mut first_error = None;
        for (index, value) in values.into_iter().enumerate() {
            match self.controllers[index].pwm(&mut self.output, value, true) {
                Ok(width) => applied[index] = width,
                Err(err) => {
                    log::warn!("Motor {} rejected pulse: {}", MotorPosition::ALL[index], err);
                    first_error.get_or_insert(err);
                }
            }
        }
        self.halted = false;
        match first_error {
            Some(err) => Err(err),
            None => Ok(applied),
        }
    }

    fn set_all_uncalibrated(&mut self, width_us: u16) -> Result<(), AppError> {
        let mut result = Ok(());
        for controller in self.controllers.iter_mut() {
            if let Err(err) = controller.pwm(&mut self.output, width_us as f32, false) {
                log::warn!("Motor {} rejected pulse: {}", controller.state().position, err);
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }
        result
    }

    fn min_pulse(&self) -> u16 {
        self.controllers[0].min_pulse_width_us()
    }

    fn max_pulse(&self) -> u16 {
        self.controllers[0].max_pulse_width_us()
    }

    /// Holds the minimum pulse on every ESC at once, then waits one shared
    /// settle period. Required once per power cycle.
    pub fn arm_all(&mut self) -> Result<(), AppError> {
        log::info!("Arming motors");
        self.set_all_uncalibrated(self.min_pulse())?;
        thread::sleep(self.arm_settle);
        self.halted = false;
        log::info!("Motors armed");
        Ok(())
    }

    /// Minimum pulse, hold for `settle`, then switch the signal off. Runs for
    /// all motors even when some writes fail, and reports the first failure.
    pub fn halt_all(&mut self, settle: Duration) -> Result<(), AppError> {
        let mut result = self.set_all_uncalibrated(self.min_pulse());
        if !settle.is_zero() {
            thread::sleep(settle);
        }
        for controller in self.controllers.iter_mut() {
            if let Err(err) = controller.release(&mut self.output) {
                log::error!("Motor {} could not be released: {}", controller.state().position, err);
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }
        self.halted = true;
        log::info!("Motors halted");
        result
    }

    /// Halt with the configured settle time, used on shutdown.
    pub fn halt_gracefully(&mut self) -> Result<(), AppError> {
        self.halt_all(self.halt_settle)
    }

    /// ESC endpoint training: maximum pulse, then minimum pulse. The rotors
    /// spin at full power while the maximum is held, propellers must be off.
    pub fn calibrate_endpoints(&mut self) -> Result<(), AppError> {
        log::warn!("Calibrating ESC endpoints, max pulse for {:?}", self.calibration_max_hold);
        self.set_all_uncalibrated(self.max_pulse())?;
        thread::sleep(self.calibration_max_hold);
        log::info!("Min pulse for {:?}", self.calibration_min_hold);
        self.set_all_uncalibrated(self.min_pulse())?;
        thread::sleep(self.calibration_min_hold);
        log::info!("ESC endpoints calibrated");
        Ok(())
    }

    pub fn motor_states(&self) -> [MotorState; 4] {
        [
            self.controllers[0].state(),
            self.controllers[1].state(),
            self.controllers[2].state(),
            self.controllers[3].state(),
        ]
    }

    /// Last applied widths, 0 for motors without a signal.
    pub fn pulse_widths(&self) -> [u16; 4] {
        self.motor_states()
            .map(|state| state.pulse_width_us.unwrap_or_default())
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }
}

impl<O: PulseWidthOutput> Drop for QuadcopterMotorsStateManager<O> {
    fn drop(&mut self) {
        if !self.halted {
            log::warn!("Motors manager dropped while running, halting");
            if let Err(err) = self.halt_all(Duration::ZERO) {
                log::error!("Halt on drop failed: {}", err);
            }
        }
    }
}

#[cfg(test)]
pub mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::drivers::pwm::PULSE_OFF;

    /// Records every write, shared so tests can inspect it after the manager
    /// is gone.
    #[derive(Clone, Default)]
    pub struct RecordingPwmOutput {
        pub writes: Arc<Mutex<Vec<(u8, u16)>>>,
    }

    impl RecordingPwmOutput {
        pub fn writes(&self) -> Vec<(u8, u16)> {
            self.writes.lock().unwrap().clone()
        }
    }

    impl PulseWidthOutput for RecordingPwmOutput {
        fn set_pulse_width(&mut self, pin: u8, width_us: u16) -> Result<(), AppError> {
            self.writes.lock().unwrap().push((pin, width_us));
            Ok(())
        }
    }

    pub fn instant_motors_config() -> MotorsConfig {
        MotorsConfig {
            pins: [1, 2, 3, 4],
            calibration_offsets_us: [10, 0, -10, 0],
            arm_settle: Duration::ZERO,
            halt_settle: Duration::ZERO,
            calibration_max_hold: Duration::ZERO,
            calibration_min_hold: Duration::ZERO,
            ..MotorsConfig::default()
        }
    }

    #[test]
    fn motors_follow_position_order_and_offsets() {
        let output = RecordingPwmOutput::default();
        let mut manager = QuadcopterMotorsStateManager::new(output.clone(), &instant_motors_config());
        let applied = manager
            .set_motor_pulses([1000.0, 1000.0, 1000.0, 1000.0])
            .unwrap();
        assert_eq!(applied, [1010, 1000, 990, 1000]);
        assert_eq!(
            output.writes(),
            vec![(1, 1010), (2, 1000), (3, 990), (4, 1000)]
        );
        assert_eq!(manager.motor_states()[2].position, MotorPosition::BackRight);
        manager.halt_all(Duration::ZERO).unwrap();
    }

    #[test]
    fn arming_holds_uncalibrated_minimum() {
        let output = RecordingPwmOutput::default();
        let mut manager = QuadcopterMotorsStateManager::new(output.clone(), &instant_motors_config());
        manager.arm_all().unwrap();
        assert_eq!(manager.pulse_widths(), [650; 4]);
        manager.halt_all(Duration::ZERO).unwrap();
    }

    #[test]
    fn halt_ends_with_every_signal_off() {
        let output = RecordingPwmOutput::default();
        let mut manager = QuadcopterMotorsStateManager::new(output.clone(), &instant_motors_config());
        manager.set_motor_pulses([1500.0; 4]).unwrap();
        manager.halt_all(Duration::ZERO).unwrap();

        let writes = output.writes();
        let tail = &writes[writes.len() - 8..];
        assert!(tail[..4].iter().all(|(_, width)| *width == 650));
        assert!(tail[4..].iter().all(|(_, width)| *width == PULSE_OFF));
        assert_eq!(manager.pulse_widths(), [0; 4]);
        assert!(manager.is_halted());
    }

    #[test]
    fn dropping_a_running_manager_halts_the_motors() {
        let output = RecordingPwmOutput::default();
        {
            let mut manager =
                QuadcopterMotorsStateManager::new(output.clone(), &instant_motors_config());
            manager.set_motor_pulses([1700.0; 4]).unwrap();
        }
        let writes = output.writes();
        assert_eq!(writes.len(), 12);
        assert!(writes[8..].iter().all(|(_, width)| *width == PULSE_OFF));
    }

    #[test]
    fn endpoint_calibration_goes_max_then_min() {
        let output = RecordingPwmOutput::default();
        let mut manager = QuadcopterMotorsStateManager::new(output.clone(), &instant_motors_config());
        manager.calibrate_endpoints().unwrap();
        let widths: Vec<u16> = output.writes().into_iter().map(|(_, width)| width).collect();
        assert_eq!(widths, vec![2400, 2400, 2400, 2400, 650, 650, 650, 650]);
        manager.halt_all(Duration::ZERO).unwrap();
    }
}
