use std::{net::TcpListener, time::Duration};

use crate::{
    communication_interfaces::control_link::{ControlLinkServer, LinkWriter},
    config::AppConfig,
    control::{
        command_handler::CommandHandler,
        control_loops::{start_flight_controller, MainControlLoopOutCommands},
        sensor_fusion::SensorFusion,
    },
    drivers::{imu_sensors::InertialMeasurementUnit, pwm::PulseWidthOutput},
    output::{
        motors_state_manager::QuadcopterMotorsStateManager,
        vehicle_movement_mappers::{FlyingVehicleMovementMapper, Quadcopter},
    },
    shared_core_values::AppContext,
    telemetry::start_telemetry_reporter,
};

/// Controller loop plus the motors it owns. No other thread can reach the
/// motors, they only move through the commands issued here.
pub fn flight_thread<O: PulseWidthOutput>(context: &AppContext, config: &AppConfig, output: O) {
    let telemetry_shared = &context.telemetry;
    let mut motors_manager = QuadcopterMotorsStateManager::new(output, &config.motors);
    let quadcopter_movement_mapper = Quadcopter;

    let output_handler = |command: MainControlLoopOutCommands| {
        let result = match command {
            MainControlLoopOutCommands::ArmMotors => motors_manager.arm_all(),
            MainControlLoopOutCommands::KillMotors => motors_manager.halt_all(Duration::ZERO),
            MainControlLoopOutCommands::ShutdownMotors => motors_manager.halt_gracefully(),
            MainControlLoopOutCommands::UpdateFlightState(state) => {
                let quad_out = quadcopter_movement_mapper
                    .map_controller_output_to_actuators_input(
                        state.throttle,
                        state.rotation_output_command,
                    );
                motors_manager.set_motor_pulses(quad_out.to_array()).map(|_| ())
            }
        };
        telemetry_shared.store_motor_pulses(motors_manager.pulse_widths());
        result
    };

    start_flight_controller(context, &config.controller, output_handler);
}

pub fn fusion_thread<I: InertialMeasurementUnit>(context: &AppContext, config: &AppConfig, imu: I) {
    let mut fusion = SensorFusion::new(imu, config.fusion.clone());
    if let Err(err) = fusion.run(context) {
        log::error!("Sensor fusion stopped: {}", err);
    }
}

pub fn link_thread(
    context: &AppContext,
    config: &AppConfig,
    listener: TcpListener,
    writer: &LinkWriter,
) {
    let handler = CommandHandler::new(context, &config.controller);
    let server = ControlLinkServer::new(listener, &config.link, context, writer);
    if let Err(err) = server.run(|frame| handler.handle_frame(frame)) {
        log::error!("Control link stopped: {}", err);
    }
}

pub fn telemetry_thread(context: &AppContext, config: &AppConfig, writer: &LinkWriter) {
    start_telemetry_reporter(context, &config.telemetry, writer);
}

#[cfg(test)]
mod tests {
    use std::{sync::atomic::Ordering, thread, time::Duration};

    use super::*;
    use crate::{
        config::ControllerConfig,
        control::control_loops::FlightState,
        drivers::{bench::StationaryImu, pwm::PULSE_OFF},
        output::motors_state_manager::tests::{instant_motors_config, RecordingPwmOutput},
        shared_core_values::ControlTargets,
        util::{math::vectors::SensorVector3D, time::SystemClock},
    };

    fn test_config() -> AppConfig {
        let mut config = AppConfig {
            motors: instant_motors_config(),
            controller: ControllerConfig {
                cycle: Duration::from_millis(2),
                ..ControllerConfig::default()
            },
            ..AppConfig::default()
        };
        config.fusion.calibration_samples = 10;
        config.fusion.calibration_interval = Duration::ZERO;
        config.fusion.cycle = Duration::from_millis(1);
        config
    }

    fn wait_for(condition: impl Fn() -> bool) {
        for _ in 0..2000 {
            if condition() {
                return;
            }
            thread::sleep(Duration::from_millis(1));
        }
        panic!("condition not reached");
    }

    #[test]
    fn flight_and_fusion_threads_fly_and_shut_down_cleanly() {
        let config = test_config();
        let context = AppContext::new(
            SystemClock::new(),
            config.controller.min_throttle_pwm,
            config.controller.max_throttle_pwm,
        );
        let output = RecordingPwmOutput::default();

        thread::scope(|scope| {
            scope.spawn(|| {
                fusion_thread(&context, &config, StationaryImu::new(SensorVector3D::new(0.5, 0.0, 0.0)))
            });
            let flight = scope.spawn(|| flight_thread(&context, &config, output.clone()));

            let state = || FlightState::from_u8(context.telemetry.controller_state.load(Ordering::Relaxed));
            wait_for(|| state() == FlightState::ArmedIdle);

            let command = ControlTargets {
                throttle_pwm: 1400,
                roll: 0,
                pitch: 0,
                yaw: 0,
            };
            wait_for(|| {
                context
                    .targets
                    .store(command, context.clock.get_current_system_time_us());
                context.telemetry.motor_pulses().iter().all(|pulse| *pulse > 1300)
            });
            assert_eq!(state(), FlightState::Active);

            context.flags.request_shutdown();
            flight.join().unwrap();
            assert_eq!(state(), FlightState::Halted);
        });

        let writes = output.writes();
        assert!(writes[writes.len() - 4..]
            .iter()
            .all(|(_, width)| *width == PULSE_OFF));
        assert_eq!(context.telemetry.motor_pulses(), [0; 4]);
    }

    #[test]
    fn sensor_fault_halts_the_motors() {
        let config = test_config();
        let context = AppContext::new(SystemClock::new(), 650, 1800);
        let output = RecordingPwmOutput::default();
        context.flags.fusion_ready.store(true, Ordering::Release);

        thread::scope(|scope| {
            let flight = scope.spawn(|| flight_thread(&context, &config, output.clone()));
            wait_for(|| !output.writes().is_empty());
            context.flags.sensor_fault.store(true, Ordering::Release);
            flight.join().unwrap();
        });

        assert!(!context.flags.is_shutting_down());
        let writes = output.writes();
        assert!(writes[writes.len() - 4..]
            .iter()
            .all(|(_, width)| *width == PULSE_OFF));
    }
}
