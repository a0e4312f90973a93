use crate::util::math::vectors::{RotationVector2D, RotationVector3D, SensorVector3D};

use super::orientation_estimator::{wrap_degrees, OrientationEstimator};

/// Short term gyro integration blended with the long term accelerometer
/// tilt. Yaw has no absolute reference and is integrated from the gyro only.
pub struct ComplementaryFilter {
    gyro_weight: f32,
    estimate: RotationVector3D,
}

impl ComplementaryFilter {
    pub fn new(gyro_weight: f32) -> Self {
        ComplementaryFilter {
            gyro_weight,
            estimate: RotationVector3D::default(),
        }
    }

    fn blend(&self, previous: f32, rate: f32, measured: f32, dt_seconds: f32) -> f32 {
        self.gyro_weight * (previous + rate * dt_seconds) + (1.0 - self.gyro_weight) * measured
    }
}

impl OrientationEstimator for ComplementaryFilter {
    fn reset(&mut self, initial: RotationVector2D) {
        self.estimate = RotationVector3D::from(&initial, 0.0);
    }

    fn update(
        &mut self,
        gyro_rate: SensorVector3D,
        accel_angles: RotationVector2D,
        dt_seconds: f32,
    ) -> RotationVector3D {
        self.estimate = RotationVector3D {
            roll: self.blend(self.estimate.roll, gyro_rate.x, accel_angles.roll, dt_seconds),
            pitch: self.blend(self.estimate.pitch, gyro_rate.y, accel_angles.pitch, dt_seconds),
            yaw: wrap_degrees(self.estimate.yaw + gyro_rate.z * dt_seconds),
        };
        self.estimate
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn settles_on_accelerometer_tilt_without_rotation() {
        let mut filter = ComplementaryFilter::new(0.9);
        filter.reset(RotationVector2D::default());
        let tilt = RotationVector2D {
            roll: 15.0,
            pitch: -5.0,
        };
        let mut estimate = RotationVector3D::default();
        for _ in 0..200 {
            estimate = filter.update(SensorVector3D::default(), tilt, 0.004);
        }
        assert_abs_diff_eq!(estimate.roll, 15.0, epsilon = 1e-3);
        assert_abs_diff_eq!(estimate.pitch, -5.0, epsilon = 1e-3);
    }

    #[test]
    fn gyro_dominates_a_single_step() {
        let mut filter = ComplementaryFilter::new(0.9);
        filter.reset(RotationVector2D::default());
        // 100 deg/s for 0.1 s with a level accelerometer
        let estimate = filter.update(
            SensorVector3D::new(100.0, 0.0, 50.0),
            RotationVector2D::default(),
            0.1,
        );
        assert_abs_diff_eq!(estimate.roll, 9.0, epsilon = 1e-4);
        assert_abs_diff_eq!(estimate.yaw, 5.0, epsilon = 1e-4);
    }
}
