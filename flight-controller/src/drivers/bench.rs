//! Stand-in collaborators used when no hardware backend is wired, so the
//! whole flight stack can run on a workstation.

use std::collections::HashMap;

use crate::{
    drivers::{
        imu_sensors::{Accelerometer, Gyroscope},
        pwm::PulseWidthOutput,
    },
    util::{error::AppError, math::vectors::SensorVector3D},
};

/// A sensor sitting level and still on the bench, with a constant gyro drift.
pub struct StationaryImu {
    gyro_bias: SensorVector3D,
    gravity: SensorVector3D,
}

impl StationaryImu {
    pub fn new(gyro_bias: SensorVector3D) -> Self {
        StationaryImu {
            gyro_bias,
            gravity: SensorVector3D::new(0.0, 0.0, 1.0),
        }
    }
}

impl Gyroscope for StationaryImu {
    fn read_raw_gyro(&mut self) -> Result<SensorVector3D, AppError> {
        Ok(self.gyro_bias)
    }
}

impl Accelerometer for StationaryImu {
    fn read_raw_accel(&mut self) -> Result<SensorVector3D, AppError> {
        Ok(self.gravity)
    }
}

/// Logs pulse width changes instead of driving pins.
#[derive(Default)]
pub struct LoggingPwmOutput {
    widths: HashMap<u8, u16>,
}

impl PulseWidthOutput for LoggingPwmOutput {
    fn set_pulse_width(&mut self, pin: u8, width_us: u16) -> Result<(), AppError> {
        if self.widths.insert(pin, width_us) != Some(width_us) {
            log::debug!("pin {} pulse width {}us", pin, width_us);
        }
        Ok(())
    }
}
