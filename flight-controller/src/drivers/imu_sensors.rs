use crate::util::{error::AppError, math::vectors::SensorVector3D};

pub trait Gyroscope {
    /// Rotation rates in deg/s, without any bias correction.
    fn read_raw_gyro(&mut self) -> Result<SensorVector3D, AppError>;
}

pub trait Accelerometer {
    /// Acceleration in g.
    fn read_raw_accel(&mut self) -> Result<SensorVector3D, AppError>;
}

pub trait InertialMeasurementUnit: Gyroscope + Accelerometer {}

impl<T: Gyroscope + Accelerometer> InertialMeasurementUnit for T {}
