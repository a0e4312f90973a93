pub mod command_handler;
pub mod complementary_filter;
pub mod control_loops;
pub mod integrator;
pub mod kalman_filter;
pub mod orientation_estimator;
pub mod pid;
pub mod sensor_fusion;
