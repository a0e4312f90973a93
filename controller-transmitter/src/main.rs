use std::{
    io::{self, BufReader},
    process::ExitCode,
    thread::sleep,
    time::Duration,
};

use proctitle::set_title;
use shared_definitions::ControlEvent;

use crate::{
    input::ControlInputMapper,
    link::{print_vehicle_event, read_events, LinkClient},
};

mod input;
mod link;

const DEFAULT_VEHICLE_ADDRESS: &str = "127.0.0.1:7777";
/// Well under the vehicle's 250 ms target timeout.
const SEND_INTERVAL: Duration = Duration::from_millis(50);

fn run(address: &str) -> io::Result<()> {
    let mut client = LinkClient::connect(address)?;
    log::info!("Connected to vehicle at {}", address);

    let reader = client.reader()?;
    std::thread::Builder::new()
        .name("vehicle-events".to_string())
        .spawn(move || match read_events(reader, print_vehicle_event) {
            Ok(()) => log::warn!("Vehicle closed the connection"),
            Err(err) => log::error!("Connection to vehicle lost: {}", err),
        })?;

    let control_mapper = ControlInputMapper::new();
    control_mapper.start_event_handler_thread(BufReader::new(io::stdin()))?;
    println!("Enter `<throttle %> <roll> <pitch> <yaw>` or `stop`");

    loop {
        if control_mapper.take_stop_request() {
            log::warn!("Sending STOP");
            client.send(&ControlEvent::Stop)?;
        }
        if control_mapper.is_input_closed() {
            log::info!("Pilot input closed, stopping the vehicle");
            return client.send(&ControlEvent::Stop);
        }

        let current_input = control_mapper.get_current_input();
        log::debug!(
            "Throttle: {} - Roll: {} - Pitch: {} - Yaw: {}",
            current_input.throttle_pct,
            current_input.roll,
            current_input.pitch,
            current_input.yaw,
        );
        client.send(&ControlEvent::Control(current_input.to_command()))?;
        sleep(SEND_INTERVAL);
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    set_title("drone-controller");

    let address = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_VEHICLE_ADDRESS.to_string());
    match run(&address) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
