pub mod bench;
pub mod imu_sensors;
pub mod pwm;
