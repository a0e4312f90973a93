// Motor driver, pulse widths in microseconds
pub const MIN_PULSE_WIDTH_US: u16 = 650;
pub const MAX_PULSE_WIDTH_US: u16 = 2400;
pub const ESC_ARM_SETTLE_MS: u64 = 4000;
pub const ESC_CALIBRATION_MAX_HOLD_MS: u64 = 2000;
pub const ESC_CALIBRATION_MIN_HOLD_MS: u64 = 4000;
pub const HALT_SETTLE_MS: u64 = 1000;

// Motor pins, same order as the motor positions FL, FR, BR, BL
pub const MOTOR_PINS: [u8; 4] = [17, 18, 27, 22];
pub const MOTOR_CALIBRATION_OFFSETS_US: [i16; 4] = [0, 0, 0, 0];

// Controller
pub const MIN_THROTTLE_PWM: u16 = 650;
pub const MAX_THROTTLE_PWM: u16 = 1800;
pub const CONTROL_CYCLE_MS: u64 = 10;
pub const TARGET_RESET_TIMEOUT_MS: u64 = 250;
pub const THROTTLE_EASE_FACTOR: f32 = 0.7;
pub const PROPORTIONAL_GAIN: f32 = 5.0;
pub const INTEGRAL_GAIN: f32 = 0.0;
pub const DERIVATIVE_GAIN: f32 = 0.0;
pub const YAW_GAIN_FACTOR: f32 = 0.1;
// Aligns the roll/pitch axes of an "X" rotor layout with a "+" control layout
pub const FRAME_OFFSET_ANGLE_DEG: f32 = -45.0;

// Sensor fusion
pub const SENSOR_CYCLE_US: u64 = 4000;
pub const GYRO_CALIBRATION_SAMPLES: u32 = 2000;
pub const GYRO_CALIBRATION_INTERVAL_US: u64 = 500;
pub const COMPLEMENTARY_GYRO_WEIGHT: f32 = 0.9;
pub const KALMAN_Q_ANGLE: f32 = 0.001;
pub const KALMAN_Q_BIAS: f32 = 0.003;
pub const KALMAN_R_MEASURE: f32 = 0.1;
pub const MAX_CONSECUTIVE_SENSOR_FAILURES: u32 = 25;

// Control link
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";
pub const LINK_PORT: u16 = 7777;
pub const LINK_READ_BUFFER_SIZE: usize = 1024;
/// A connected operator that sends nothing for this long is dropped.
pub const LINK_IDLE_TIMEOUT_MS: u64 = 1500;
pub const LINK_WRITE_TIMEOUT_MS: u64 = 250;

// Telemetry
pub const TELEMETRY_INTERVAL_MS: u64 = 500;
