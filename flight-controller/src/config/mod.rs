pub mod constants;

use std::time::Duration;

use shared_definitions::framing::MAX_PENDING_BYTES;

use crate::util::{error::AppError, math::vectors::SensorVector3D};

use self::constants::*;

/// Physical mounting correction, applied to raw samples before any math.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct AxisRemap {
    pub swap_xy: bool,
    pub invert_x: bool,
    pub invert_y: bool,
    pub invert_z: bool,
}

impl AxisRemap {
    /// Swapping happens first, inversions refer to the axes after the swap.
    pub fn apply(&self, sample: SensorVector3D) -> SensorVector3D {
        let (mut x, mut y) = match self.swap_xy {
            true => (sample.y, sample.x),
            false => (sample.x, sample.y),
        };
        let mut z = sample.z;
        if self.invert_x {
            x = -x;
        }
        if self.invert_y {
            y = -y;
        }
        if self.invert_z {
            z = -z;
        }
        SensorVector3D { x, y, z }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum FilterStrategy {
    #[default]
    Complementary,
    TwoStateEstimator,
}

#[derive(Debug, Clone)]
pub struct MotorsConfig {
    pub pins: [u8; 4],
    pub calibration_offsets_us: [i16; 4],
    pub min_pulse_width_us: u16,
    pub max_pulse_width_us: u16,
    pub arm_settle: Duration,
    pub halt_settle: Duration,
    pub calibration_max_hold: Duration,
    pub calibration_min_hold: Duration,
}

impl Default for MotorsConfig {
    fn default() -> Self {
        MotorsConfig {
            pins: MOTOR_PINS,
            calibration_offsets_us: MOTOR_CALIBRATION_OFFSETS_US,
            min_pulse_width_us: MIN_PULSE_WIDTH_US,
            max_pulse_width_us: MAX_PULSE_WIDTH_US,
            arm_settle: Duration::from_millis(ESC_ARM_SETTLE_MS),
            halt_settle: Duration::from_millis(HALT_SETTLE_MS),
            calibration_max_hold: Duration::from_millis(ESC_CALIBRATION_MAX_HOLD_MS),
            calibration_min_hold: Duration::from_millis(ESC_CALIBRATION_MIN_HOLD_MS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub cycle: Duration,
    pub target_reset_timeout: Duration,
    /// Also the idle throttle the deadman reverts to.
    pub min_throttle_pwm: u16,
    pub max_throttle_pwm: u16,
    pub throttle_ease_factor: f32,
    pub proportional_gain: f32,
    pub integral_gain: f32,
    pub derivative_gain: f32,
    pub yaw_gain_factor: f32,
    pub frame_offset_angle_deg: f32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            cycle: Duration::from_millis(CONTROL_CYCLE_MS),
            target_reset_timeout: Duration::from_millis(TARGET_RESET_TIMEOUT_MS),
            min_throttle_pwm: MIN_THROTTLE_PWM,
            max_throttle_pwm: MAX_THROTTLE_PWM,
            throttle_ease_factor: THROTTLE_EASE_FACTOR,
            proportional_gain: PROPORTIONAL_GAIN,
            integral_gain: INTEGRAL_GAIN,
            derivative_gain: DERIVATIVE_GAIN,
            yaw_gain_factor: YAW_GAIN_FACTOR,
            frame_offset_angle_deg: FRAME_OFFSET_ANGLE_DEG,
        }
    }
}

impl ControllerConfig {
    /// `min + (max - min) * pct / 100`, truncated to whole microseconds.
    pub fn throttle_pct_to_pwm(&self, throttle_pct: f32) -> u16 {
        let pct = match throttle_pct.is_finite() {
            true => throttle_pct.clamp(0.0, 100.0),
            false => 0.0,
        };
        let span = (self.max_throttle_pwm - self.min_throttle_pwm) as f32;
        (self.min_throttle_pwm as f32 + span * pct / 100.0) as u16
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KalmanNoise {
    pub q_angle: f32,
    pub q_bias: f32,
    pub r_measure: f32,
}

impl Default for KalmanNoise {
    fn default() -> Self {
        KalmanNoise {
            q_angle: KALMAN_Q_ANGLE,
            q_bias: KALMAN_Q_BIAS,
            r_measure: KALMAN_R_MEASURE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FusionConfig {
    pub cycle: Duration,
    pub calibration_samples: u32,
    pub calibration_interval: Duration,
    pub strategy: FilterStrategy,
    pub complementary_gyro_weight: f32,
    pub kalman_noise: KalmanNoise,
    pub gyro_remap: AxisRemap,
    pub accel_remap: AxisRemap,
    pub max_consecutive_failures: u32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        FusionConfig {
            cycle: Duration::from_micros(SENSOR_CYCLE_US),
            calibration_samples: GYRO_CALIBRATION_SAMPLES,
            calibration_interval: Duration::from_micros(GYRO_CALIBRATION_INTERVAL_US),
            strategy: FilterStrategy::default(),
            complementary_gyro_weight: COMPLEMENTARY_GYRO_WEIGHT,
            kalman_noise: KalmanNoise::default(),
            gyro_remap: AxisRemap::default(),
            accel_remap: AxisRemap::default(),
            max_consecutive_failures: MAX_CONSECUTIVE_SENSOR_FAILURES,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub host: String,
    pub port: u16,
    pub read_buffer_size: usize,
    pub max_pending_bytes: usize,
    pub idle_timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            host: DEFAULT_BIND_HOST.to_string(),
            port: LINK_PORT,
            read_buffer_size: LINK_READ_BUFFER_SIZE,
            max_pending_bytes: MAX_PENDING_BYTES,
            idle_timeout: Duration::from_millis(LINK_IDLE_TIMEOUT_MS),
            write_timeout: Duration::from_millis(LINK_WRITE_TIMEOUT_MS),
        }
    }
}

impl LinkConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Accepts `host`, `host:port` or `:port`.
    pub fn set_bind_address(&mut self, address: &str) -> Result<(), AppError> {
        match address.rsplit_once(':') {
            Some((host, port)) => {
                self.port = port.parse().map_err(|_| {
                    AppError::InvalidConfig(format!("invalid port in bind address {:?}", address))
                })?;
                if !host.is_empty() {
                    self.host = host.to_string();
                }
            }
            None => self.host = address.to_string(),
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub interval: Duration,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        TelemetryConfig {
            interval: Duration::from_millis(TELEMETRY_INTERVAL_MS),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub motors: MotorsConfig,
    pub controller: ControllerConfig,
    pub fusion: FusionConfig,
    pub link: LinkConfig,
    pub telemetry: TelemetryConfig,
}

fn invalid(message: String) -> Result<(), AppError> {
    Err(AppError::InvalidConfig(message))
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        let motors = &self.motors;
        if motors.min_pulse_width_us >= motors.max_pulse_width_us {
            return invalid(format!(
                "min pulse width {} must be below max {}",
                motors.min_pulse_width_us, motors.max_pulse_width_us
            ));
        }
        let pulse_span = (motors.max_pulse_width_us - motors.min_pulse_width_us) as i32;
        if let Some(offset) = motors
            .calibration_offsets_us
            .iter()
            .find(|offset| (**offset as i32).abs() >= pulse_span)
        {
            return invalid(format!(
                "calibration offset {} leaves no usable pulse range",
                offset
            ));
        }

        let controller = &self.controller;
        if controller.min_throttle_pwm >= controller.max_throttle_pwm {
            return invalid(format!(
                "min throttle {} must be below max {}",
                controller.min_throttle_pwm, controller.max_throttle_pwm
            ));
        }
        if controller.min_throttle_pwm < motors.min_pulse_width_us
            || controller.max_throttle_pwm > motors.max_pulse_width_us
        {
            return invalid(format!(
                "throttle range {}..{} outside pulse range {}..{}",
                controller.min_throttle_pwm,
                controller.max_throttle_pwm,
                motors.min_pulse_width_us,
                motors.max_pulse_width_us
            ));
        }
        if controller.cycle.is_zero() || controller.target_reset_timeout.is_zero() {
            return invalid("controller cycle and reset timeout must be non zero".to_string());
        }
        let gains = [
            controller.proportional_gain,
            controller.integral_gain,
            controller.derivative_gain,
            controller.yaw_gain_factor,
            controller.frame_offset_angle_deg,
        ];
        if gains.iter().any(|gain| !gain.is_finite()) {
            return invalid("controller gains must be finite".to_string());
        }
        if !(controller.throttle_ease_factor > 0.0 && controller.throttle_ease_factor <= 1.0) {
            return invalid(format!(
                "throttle ease factor {} outside (0, 1]",
                controller.throttle_ease_factor
            ));
        }

        let fusion = &self.fusion;
        if fusion.cycle.is_zero() || fusion.calibration_samples == 0 {
            return invalid("sensor cycle and calibration samples must be non zero".to_string());
        }
        if !(0.0..=1.0).contains(&fusion.complementary_gyro_weight) {
            return invalid(format!(
                "complementary gyro weight {} outside [0, 1]",
                fusion.complementary_gyro_weight
            ));
        }
        let noise = fusion.kalman_noise;
        if [noise.q_angle, noise.q_bias, noise.r_measure]
            .iter()
            .any(|value| !value.is_finite() || *value <= 0.0)
        {
            return invalid("estimator noise values must be positive".to_string());
        }
        if fusion.max_consecutive_failures == 0 {
            return invalid("sensor failure bound must be non zero".to_string());
        }

        if self.link.read_buffer_size == 0 || self.link.max_pending_bytes == 0 {
            return invalid("link buffers must be non zero".to_string());
        }
        if self.link.idle_timeout.is_zero() || self.link.write_timeout.is_zero() {
            return invalid("link timeouts must be non zero".to_string());
        }
        if self.telemetry.interval.is_zero() {
            return invalid("telemetry interval must be non zero".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_inverted_throttle_range() {
        let mut config = AppConfig::default();
        config.controller.min_throttle_pwm = 1900;
        assert!(matches!(config.validate(), Err(AppError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_throttle_outside_hardware_range() {
        let mut config = AppConfig::default();
        config.controller.max_throttle_pwm = config.motors.max_pulse_width_us + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_link_timeouts() {
        let mut config = AppConfig::default();
        config.link.idle_timeout = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.link.write_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_non_finite_gain() {
        let mut config = AppConfig::default();
        config.controller.proportional_gain = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn throttle_percentage_maps_linearly() {
        let controller = ControllerConfig {
            min_throttle_pwm: 600,
            max_throttle_pwm: 1800,
            ..ControllerConfig::default()
        };
        assert_eq!(controller.throttle_pct_to_pwm(0.0), 600);
        assert_eq!(controller.throttle_pct_to_pwm(50.0), 1200);
        assert_eq!(controller.throttle_pct_to_pwm(100.0), 1800);
        assert_eq!(controller.throttle_pct_to_pwm(10.0), 720);
        assert_eq!(controller.throttle_pct_to_pwm(250.0), 1800);
        assert_eq!(controller.throttle_pct_to_pwm(f32::NAN), 600);
    }

    #[test]
    fn axis_remap_swaps_before_inverting() {
        let remap = AxisRemap {
            swap_xy: true,
            invert_x: true,
            invert_y: false,
            invert_z: true,
        };
        let remapped = remap.apply(SensorVector3D::new(1.0, 2.0, 3.0));
        assert_eq!(remapped, SensorVector3D::new(-2.0, 1.0, -3.0));
    }

    #[test]
    fn bind_address_override() {
        let mut link = LinkConfig::default();
        link.set_bind_address("127.0.0.1:9000").unwrap();
        assert_eq!(link.bind_address(), "127.0.0.1:9000");

        link.set_bind_address(":7000").unwrap();
        assert_eq!(link.bind_address(), "127.0.0.1:7000");

        assert!(link.set_bind_address("host:notaport").is_err());
    }
}
