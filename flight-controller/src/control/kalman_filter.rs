use crate::config::KalmanNoise;

/// Two state (angle, gyro bias) predict/correct filter for one axis.
pub struct KalmanFilter {
    noise: KalmanNoise,
    angle: f32,
    bias: f32,
    // Error covariance
    p: [[f32; 2]; 2],
}

impl KalmanFilter {
    pub fn new(noise: KalmanNoise) -> Self {
        KalmanFilter {
            noise,
            angle: 0.0_f32,
            bias: 0.0_f32,
            p: [[0.0_f32; 2]; 2],
        }
    }

    pub fn set_angle(&mut self, angle: f32) {
        self.angle = angle;
    }

    /// `rate` in deg/s, `measured_angle` in degrees from the accelerometer.
    pub fn apply_filter_update(&mut self, rate: f32, measured_angle: f32, dt_seconds: f32) -> f32 {
        // Predict
        let unbiased_rate = rate - self.bias;
        self.angle += dt_seconds * unbiased_rate;

        self.p[0][0] += dt_seconds
            * (dt_seconds * self.p[1][1] - self.p[0][1] - self.p[1][0] + self.noise.q_angle);
        self.p[0][1] -= dt_seconds * self.p[1][1];
        self.p[1][0] -= dt_seconds * self.p[1][1];
        self.p[1][1] += self.noise.q_bias * dt_seconds;

        // Correct
        let innovation_covariance = self.p[0][0] + self.noise.r_measure;
        let gain = [
            self.p[0][0] / innovation_covariance,
            self.p[1][0] / innovation_covariance,
        ];
        let innovation = measured_angle - self.angle;
        self.angle += gain[0] * innovation;
        self.bias += gain[1] * innovation;

        let p00 = self.p[0][0];
        let p01 = self.p[0][1];
        self.p[0][0] -= gain[0] * p00;
        self.p[0][1] -= gain[0] * p01;
        self.p[1][0] -= gain[1] * p00;
        self.p[1][1] -= gain[1] * p01;

        self.angle
    }

    pub fn get_current_state(&self) -> f32 {
        self.angle
    }

    pub fn get_current_bias(&self) -> f32 {
        self.bias
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn converges_to_measured_angle_and_learns_bias() {
        let mut filter = KalmanFilter::new(KalmanNoise::default());
        // Still sensor tilted 10 degrees with a 2 deg/s drifting gyro
        for _ in 0..5000 {
            filter.apply_filter_update(2.0, 10.0, 0.004);
        }
        assert_abs_diff_eq!(filter.get_current_state(), 10.0, epsilon = 0.1);
        assert_abs_diff_eq!(filter.get_current_bias(), 2.0, epsilon = 0.1);
    }

    #[test]
    fn follows_gyro_between_corrections() {
        let mut filter = KalmanFilter::new(KalmanNoise::default());
        filter.set_angle(0.0);
        // 10 deg/s for 100 ms while the accelerometer still reads level. The
        // fresh filter trusts the gyro, so the angle tracks rate * dt.
        let mut previous = 0.0;
        for step in 1..=10 {
            let angle = filter.apply_filter_update(10.0, 0.0, 0.01);
            assert!(angle > previous);
            assert_abs_diff_eq!(angle, 0.1 * step as f32, epsilon = 0.01);
            previous = angle;
        }
    }
}
