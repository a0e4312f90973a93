use crate::{
    config::{FilterStrategy, FusionConfig},
    util::math::vectors::{RotationVector2D, RotationVector3D, SensorVector3D},
};

use super::{complementary_filter::ComplementaryFilter, kalman_filter::KalmanFilter};

/// Turns bias corrected gyro rates (deg/s) and accelerometer tilt (deg) into
/// an orientation estimate.
pub trait OrientationEstimator: Send {
    /// Seeds roll and pitch, yaw restarts at 0.
    fn reset(&mut self, initial: RotationVector2D);

    fn update(
        &mut self,
        gyro_rate: SensorVector3D,
        accel_angles: RotationVector2D,
        dt_seconds: f32,
    ) -> RotationVector3D;
}

/// Maps an angle into [-180, 180).
pub fn wrap_degrees(angle: f32) -> f32 {
    (angle + 180.0).rem_euclid(360.0) - 180.0
}

pub struct KalmanEstimator {
    roll_filter: KalmanFilter,
    pitch_filter: KalmanFilter,
    yaw: f32,
}

impl KalmanEstimator {
    pub fn new(config: &FusionConfig) -> Self {
        KalmanEstimator {
            roll_filter: KalmanFilter::new(config.kalman_noise),
            pitch_filter: KalmanFilter::new(config.kalman_noise),
            yaw: 0.0,
        }
    }
}

impl OrientationEstimator for KalmanEstimator {
    fn reset(&mut self, initial: RotationVector2D) {
        self.roll_filter.set_angle(initial.roll);
        self.pitch_filter.set_angle(initial.pitch);
        self.yaw = 0.0;
    }

    fn update(
        &mut self,
        gyro_rate: SensorVector3D,
        accel_angles: RotationVector2D,
        dt_seconds: f32,
    ) -> RotationVector3D {
        self.yaw = wrap_degrees(self.yaw + gyro_rate.z * dt_seconds);
        RotationVector3D {
            roll: self
                .roll_filter
                .apply_filter_update(gyro_rate.x, accel_angles.roll, dt_seconds),
            pitch: self
                .pitch_filter
                .apply_filter_update(gyro_rate.y, accel_angles.pitch, dt_seconds),
            yaw: self.yaw,
        }
    }
}

pub fn build_estimator(config: &FusionConfig) -> Box<dyn OrientationEstimator> {
    match config.strategy {
        FilterStrategy::Complementary => {
            Box::new(ComplementaryFilter::new(config.complementary_gyro_weight))
        }
        FilterStrategy::TwoStateEstimator => Box::new(KalmanEstimator::new(config)),
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn wraps_into_half_open_range() {
        assert_abs_diff_eq!(wrap_degrees(190.0), -170.0, epsilon = 1e-4);
        assert_abs_diff_eq!(wrap_degrees(-190.0), 170.0, epsilon = 1e-4);
        assert_abs_diff_eq!(wrap_degrees(180.0), -180.0, epsilon = 1e-4);
        assert_abs_diff_eq!(wrap_degrees(45.0), 45.0, epsilon = 1e-4);
    }

    #[test]
    fn both_strategies_agree_on_a_still_tilted_sensor() {
        for strategy in [FilterStrategy::Complementary, FilterStrategy::TwoStateEstimator] {
            let config = FusionConfig {
                strategy,
                ..FusionConfig::default()
            };
            let mut estimator = build_estimator(&config);
            let tilt = RotationVector2D {
                roll: -20.0,
                pitch: 7.5,
            };
            estimator.reset(tilt);
            let mut estimate = RotationVector3D::default();
            for _ in 0..500 {
                estimate = estimator.update(SensorVector3D::default(), tilt, 0.004);
            }
            assert_abs_diff_eq!(estimate.roll, -20.0, epsilon = 0.01);
            assert_abs_diff_eq!(estimate.pitch, 7.5, epsilon = 0.01);
            assert_abs_diff_eq!(estimate.yaw, 0.0);
        }
    }
}
