mod communication_interfaces;
mod config;
mod control;
mod drivers;
mod output;
mod shared_core_values;
mod telemetry;
mod threads;
mod util;

use std::{process::ExitCode, sync::Arc, thread};

use crate::{
    communication_interfaces::control_link::{self, LinkWriter},
    config::AppConfig,
    drivers::bench::{LoggingPwmOutput, StationaryImu},
    output::motors_state_manager::QuadcopterMotorsStateManager,
    shared_core_values::AppContext,
    threads::{flight_thread, fusion_thread, link_thread, telemetry_thread},
    util::{error::AppError, math::vectors::SensorVector3D, time::SystemClock},
};

const CALIBRATE_ESCS_ARG: &str = "--calibrate-escs";

fn load_config() -> Result<(AppConfig, bool), AppError> {
    let mut config = AppConfig::default();
    let mut calibrate_escs = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            CALIBRATE_ESCS_ARG => calibrate_escs = true,
            address => config.link.set_bind_address(address)?,
        }
    }
    config.validate()?;
    Ok((config, calibrate_escs))
}

/// Maintenance only, never part of a flight. Propellers must be removed.
fn calibrate_escs(config: &AppConfig) -> Result<(), AppError> {
    let mut motors_manager =
        QuadcopterMotorsStateManager::new(LoggingPwmOutput::default(), &config.motors);
    motors_manager.calibrate_endpoints()?;
    motors_manager.halt_gracefully()
}

fn run(config: AppConfig) -> Result<(), AppError> {
    let context = Arc::new(AppContext::new(
        SystemClock::new(),
        config.controller.min_throttle_pwm,
        config.controller.max_throttle_pwm,
    ));
    {
        let context = context.clone();
        ctrlc::set_handler(move || {
            log::warn!("Interrupted, shutting down");
            context.flags.request_shutdown();
        })
        .map_err(|err| AppError::hardware("installing the interrupt handler", err))?;
    }

    let listener = control_link::bind(&config.link)?;
    let link_address = listener.local_addr()?;
    let writer = LinkWriter::new();
    let context = &*context;
    let config = &config;
    let writer = &writer;

    thread::scope(|scope| {
        let spawned = (|| -> Result<(), AppError> {
            thread::Builder::new()
                .name("fusion".to_string())
                .spawn_scoped(scope, move || {
                    fusion_thread(context, config, StationaryImu::new(SensorVector3D::default()))
                })?;
            thread::Builder::new()
                .name("link".to_string())
                .spawn_scoped(scope, move || link_thread(context, config, listener, writer))?;
            thread::Builder::new()
                .name("telemetry".to_string())
                .spawn_scoped(scope, move || telemetry_thread(context, config, writer))?;
            let flight = thread::Builder::new()
                .name("flight".to_string())
                .spawn_scoped(scope, move || {
                    flight_thread(context, config, LoggingPwmOutput::default())
                })?;
            if flight.join().is_err() {
                log::error!("Flight thread panicked");
            }
            Ok(())
        })();

        // The controller only stops after a halt, take everything else down with it
        context.flags.request_shutdown();
        control_link::wake_listener(link_address);
        spawned
    })
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let result = load_config().and_then(|(config, calibrate)| match calibrate {
        true => calibrate_escs(&config),
        false => run(config),
    });
    match result {
        Ok(()) => {
            log::info!("Flight computer stopped");
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
