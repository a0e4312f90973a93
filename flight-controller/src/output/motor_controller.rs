use core::fmt::{self, Display, Formatter};

use crate::{
    drivers::pwm::{PulseWidthOutput, PULSE_OFF},
    util::error::AppError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorPosition {
    FrontLeft,
    FrontRight,
    BackRight,
    BackLeft,
}

impl MotorPosition {
    pub const ALL: [MotorPosition; 4] = [
        MotorPosition::FrontLeft,
        MotorPosition::FrontRight,
        MotorPosition::BackRight,
        MotorPosition::BackLeft,
    ];

    pub const fn tag(&self) -> &'static str {
        match self {
            MotorPosition::FrontLeft => "FL",
            MotorPosition::FrontRight => "FR",
            MotorPosition::BackRight => "BR",
            MotorPosition::BackLeft => "BL",
        }
    }
}

impl Display for MotorPosition {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorState {
    pub position: MotorPosition,
    pub calibration_offset_us: i16,
    /// `None` until the first command and after the signal is released.
    pub pulse_width_us: Option<u16>,
}

/// One ESC channel. Only tracks state, the pins are driven through the
/// output handed in by the owner.
pub struct MotorController {
    pin: u8,
    min_pulse_width_us: u16,
    max_pulse_width_us: u16,
    state: MotorState,
}

impl MotorController {
    pub fn new(
        position: MotorPosition,
        pin: u8,
        calibration_offset_us: i16,
        min_pulse_width_us: u16,
        max_pulse_width_us: u16,
    ) -> Self {
        MotorController {
            pin,
            min_pulse_width_us,
            max_pulse_width_us,
            state: MotorState {
                position,
                calibration_offset_us,
                pulse_width_us: None,
            },
        }
    }

    /// Final pulse width for a requested value. NaN maps to the minimum,
    /// everything else is clamped into the hardware range.
    pub fn constrain_pulse(&self, requested_us: f32, calibrated: bool) -> u16 {
        if requested_us.is_nan() {
            return self.min_pulse_width_us;
        }
        let offset = match calibrated {
            true => self.state.calibration_offset_us as f32,
            false => 0.0,
        };
        (requested_us + offset).clamp(
            self.min_pulse_width_us as f32,
            self.max_pulse_width_us as f32,
        ) as u16
    }

    pub fn pwm<O: PulseWidthOutput + ?Sized>(
        &mut self,
        output: &mut O,
        requested_us: f32,
        calibrated: bool,
    ) -> Result<u16, AppError> {
        let width = self.constrain_pulse(requested_us, calibrated);
        output.set_pulse_width(self.pin, width)?;
        self.state.pulse_width_us = Some(width);
        Ok(width)
    }

    /// Switches the pulse train off, the ESC stops driving the rotor.
    pub fn release<O: PulseWidthOutput + ?Sized>(&mut self, output: &mut O) -> Result<(), AppError> {
        output.set_pulse_width(self.pin, PULSE_OFF)?;
        self.state.pulse_width_us = None;
        Ok(())
    }

    pub fn min_pulse_width_us(&self) -> u16 {
        self.min_pulse_width_us
    }

    pub fn max_pulse_width_us(&self) -> u16 {
        self.max_pulse_width_us
    }

    pub fn state(&self) -> MotorState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingOutput {
        writes: Vec<(u8, u16)>,
        fail: bool,
    }

    impl PulseWidthOutput for RecordingOutput {
        fn set_pulse_width(&mut self, pin: u8, width_us: u16) -> Result<(), AppError> {
            if self.fail {
                return Err(AppError::Hardware("pin busy".to_string()));
            }
            self.writes.push((pin, width_us));
            Ok(())
        }
    }

    fn motor(offset: i16) -> MotorController {
        MotorController::new(MotorPosition::FrontRight, 18, offset, 650, 2400)
    }

    #[test]
    fn pwm_output_never_leaves_hardware_range() {
        let mut output = RecordingOutput::default();
        let mut motor = motor(30);
        let inputs = [
            f32::NAN,
            f32::INFINITY,
            f32::NEG_INFINITY,
            -1.0e9,
            0.0,
            649.0,
            650.0,
            1200.5,
            2399.0,
            2400.0,
            1.0e9,
            f32::MAX,
            f32::MIN,
        ];
        for requested in inputs {
            for calibrated in [true, false] {
                let width = motor.pwm(&mut output, requested, calibrated).unwrap();
                assert!((650..=2400).contains(&width), "{} -> {}", requested, width);
            }
        }
        assert!(output.writes.iter().all(|(_, width)| (650..=2400).contains(width)));
    }

    #[test]
    fn calibration_offset_is_added_before_clamping() {
        let mut output = RecordingOutput::default();
        let mut motor = motor(-20);
        assert_eq!(motor.pwm(&mut output, 1000.0, true).unwrap(), 980);
        assert_eq!(motor.pwm(&mut output, 1000.0, false).unwrap(), 1000);
        assert_eq!(motor.pwm(&mut output, 660.0, true).unwrap(), 650);
        assert_eq!(motor.state().pulse_width_us, Some(650));
        assert_eq!(output.writes.last(), Some(&(18, 650)));
    }

    #[test]
    fn failed_write_keeps_previous_state() {
        let mut output = RecordingOutput::default();
        let mut motor = motor(0);
        motor.pwm(&mut output, 1100.0, true).unwrap();
        output.fail = true;
        assert!(motor.pwm(&mut output, 1500.0, true).is_err());
        assert_eq!(motor.state().pulse_width_us, Some(1100));
    }

    #[test]
    fn release_switches_the_signal_off() {
        let mut output = RecordingOutput::default();
        let mut motor = motor(0);
        motor.pwm(&mut output, 1100.0, true).unwrap();
        motor.release(&mut output).unwrap();
        assert_eq!(output.writes.last(), Some(&(18, PULSE_OFF)));
        assert_eq!(motor.state().pulse_width_us, None);
    }
}
