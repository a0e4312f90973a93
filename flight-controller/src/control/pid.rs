use super::{integrator::Integrator, orientation_estimator::wrap_degrees};

const US_IN_SECOND: f32 = 1_000_000.0_f32;

/// Position form PID on one axis. Integral and derivative terms need two
/// samples, so the first update after a reset is purely proportional.
pub struct PID {
    proportional_multiplier: f32,
    integral_multiplier: f32,
    derivative_multiplier: f32,
    setpoint: f32,
    error_integrator: Integrator,
    previous_error: f32,
    previous_time_us: Option<u64>,
}

impl PID {
    pub fn new(
        proportional_multiplier: f32,
        integral_multiplier: f32,
        derivative_multiplier: f32,
    ) -> Self {
        PID {
            proportional_multiplier,
            integral_multiplier,
            derivative_multiplier,
            setpoint: 0.0_f32,
            error_integrator: Integrator::new(),
            previous_error: 0.0_f32,
            previous_time_us: None,
        }
    }

    pub fn reset(&mut self) {
        self.error_integrator.reset();
        self.previous_error = 0.0_f32;
        self.previous_time_us = None;
    }

    /// Changing the setpoint starts the loop over.
    pub fn set_setpoint(&mut self, setpoint: f32) {
        if setpoint != self.setpoint {
            self.setpoint = setpoint;
            self.reset();
        }
    }

    pub fn update(&mut self, measured_state: f32, now_us: u64) -> f32 {
        self.update_with_error(self.setpoint - measured_state, now_us)
    }

    /// For headings: the error takes the short way around, so a setpoint of
    /// 170 seen from -175 is -15 and not 345.
    pub fn update_heading(&mut self, measured_heading: f32, now_us: u64) -> f32 {
        self.update_with_error(wrap_degrees(self.setpoint - measured_heading), now_us)
    }

    fn update_with_error(&mut self, error: f32, now_us: u64) -> f32 {
        let iteration_length = self
            .previous_time_us
            .map(|previous| now_us.saturating_sub(previous) as f32 / US_IN_SECOND)
            .unwrap_or(0.0_f32);

        let (accumulated_error, change_rate) = match iteration_length > 0.0 {
            true => (
                self.error_integrator.add_new_value(error, iteration_length),
                (error - self.previous_error) / iteration_length,
            ),
            false => (self.error_integrator.get_current_value(), 0.0_f32),
        };

        self.previous_error = error;
        self.previous_time_us = Some(now_us);

        let proportional_output = error * self.proportional_multiplier;
        let integral_output = accumulated_error * self.integral_multiplier;
        let derivative_output = change_rate * self.derivative_multiplier;

        proportional_output + integral_output + derivative_output
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn zero_error_gives_zero_response() {
        let mut pid = PID::new(5.0, 0.5, 0.2);
        pid.set_setpoint(12.0);
        for step in 0..50_u64 {
            let response = pid.update(12.0, step * 10_000);
            assert_abs_diff_eq!(response, 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn proportional_term_follows_error_sign() {
        let mut pid = PID::new(5.0, 0.0, 0.0);
        pid.set_setpoint(10.0);
        assert_abs_diff_eq!(pid.update(8.0, 0), 10.0);
        assert_abs_diff_eq!(pid.update(12.0, 10_000), -10.0);
    }

    #[test]
    fn integral_accumulates_over_time_and_resets_on_new_setpoint() {
        let mut pid = PID::new(0.0, 1.0, 0.0);
        pid.set_setpoint(1.0);
        pid.update(0.0, 0);
        // One second at error 1
        assert_abs_diff_eq!(pid.update(0.0, 1_000_000), 1.0, epsilon = 1e-6);

        pid.set_setpoint(2.0);
        assert_abs_diff_eq!(pid.update(0.0, 2_000_000), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn same_setpoint_keeps_state() {
        let mut pid = PID::new(0.0, 1.0, 0.0);
        pid.set_setpoint(1.0);
        pid.update(0.0, 0);
        pid.update(0.0, 500_000);
        pid.set_setpoint(1.0);
        assert_abs_diff_eq!(pid.update(0.0, 1_000_000), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn heading_error_takes_the_short_way_around() {
        let mut pid = PID::new(0.5, 0.0, 0.0);
        pid.set_setpoint(170.0);
        assert_abs_diff_eq!(pid.update_heading(-175.0, 0), -7.5, epsilon = 1e-4);

        pid.set_setpoint(-170.0);
        assert_abs_diff_eq!(pid.update_heading(175.0, 10_000), 7.5, epsilon = 1e-4);
        assert_abs_diff_eq!(pid.update_heading(-160.0, 20_000), -5.0, epsilon = 1e-4);
    }

    #[test]
    fn derivative_reacts_to_error_change() {
        let mut pid = PID::new(0.0, 0.0, 1.0);
        pid.update(0.0, 0);
        // error goes from 0 to -1 in 0.5 s
        assert_abs_diff_eq!(pid.update(1.0, 500_000), -2.0, epsilon = 1e-6);
    }
}
