use std::{fs, sync::atomic::Ordering};

use shared_definitions::{ControlEvent, TelemetryRecord};

use crate::{
    communication_interfaces::control_link::LinkWriter,
    config::TelemetryConfig,
    control::control_loops::FlightState,
    shared_core_values::AppContext,
    util::time::sleep_remaining,
};

const UNAVAILABLE: &str = "n/a";

const THERMAL_ZONE_PATH: &str = "/sys/class/thermal/thermal_zone0/temp";
const CPU_STAT_PATH: &str = "/proc/stat";
const MEMINFO_PATH: &str = "/proc/meminfo";
const WIRELESS_PATH: &str = "/proc/net/wireless";
const BATTERY_CAPACITY_PATH: &str = "/sys/class/power_supply/BAT0/capacity";

/// Millidegrees as written by the kernel thermal zone.
fn parse_thermal_zone(contents: &str) -> Option<f32> {
    let millidegrees: i64 = contents.trim().parse().ok()?;
    Some(millidegrees as f32 / 1000.0)
}

/// Idle and total jiffies from the aggregate `cpu` line.
fn parse_cpu_times(contents: &str) -> Option<(u64, u64)> {
    let line = contents.lines().find(|line| line.starts_with("cpu "))?;
    let times: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .map(|field| field.parse().ok())
        .collect::<Option<_>>()?;
    if times.len() < 4 {
        return None;
    }
    // idle + iowait
    let idle = times[3] + times.get(4).copied().unwrap_or(0);
    Some((idle, times.iter().sum()))
}

fn parse_meminfo_used_pct(contents: &str) -> Option<f32> {
    let field = |name: &str| -> Option<f32> {
        contents
            .lines()
            .find_map(|line| line.strip_prefix(name))?
            .split_whitespace()
            .next()?
            .parse()
            .ok()
    };
    let total = field("MemTotal:")?;
    let available = field("MemAvailable:")?;
    if total <= 0.0 {
        return None;
    }
    Some((total - available) / total * 100.0)
}

/// `iface,level` for every wireless interface, levels in dBm.
fn parse_wireless_signal(contents: &str) -> Option<String> {
    let readings: Vec<String> = contents
        .lines()
        .skip(2)
        .filter_map(|line| {
            let (iface, stats) = line.split_once(':')?;
            let level = stats.split_whitespace().nth(2)?.trim_end_matches('.');
            Some(format!("{},{}", iface.trim(), level))
        })
        .collect();
    match readings.is_empty() {
        true => None,
        false => Some(readings.join(",")),
    }
}

/// CPU usage is a delta between two samples, the first call has nothing to
/// compare against.
#[derive(Default)]
struct CpuUsage {
    previous: Option<(u64, u64)>,
}

impl CpuUsage {
    fn update(&mut self, sample: (u64, u64)) -> Option<f32> {
        let previous = self.previous.replace(sample)?;
        let idle = sample.0.saturating_sub(previous.0);
        let total = sample.1.saturating_sub(previous.1);
        if total == 0 {
            return None;
        }
        Some((1.0 - idle as f32 / total as f32) * 100.0)
    }
}

fn read_file(path: &str) -> Option<String> {
    fs::read_to_string(path).ok()
}

fn or_unavailable(value: Option<String>) -> String {
    value.unwrap_or_else(|| UNAVAILABLE.to_string())
}

/// Host health readings. Anything the platform does not expose is reported
/// as `n/a`.
#[derive(Default)]
pub struct HealthProbe {
    cpu: CpuUsage,
}

impl HealthProbe {
    pub fn sample(&mut self) -> Vec<TelemetryRecord> {
        let temperature = read_file(THERMAL_ZONE_PATH)
            .and_then(|contents| parse_thermal_zone(&contents))
            .map(|celsius| format!("{:.1}", celsius));
        let cpu = read_file(CPU_STAT_PATH)
            .and_then(|contents| parse_cpu_times(&contents))
            .and_then(|sample| self.cpu.update(sample))
            .map(|pct| format!("{:.1}", pct));
        let memory = read_file(MEMINFO_PATH)
            .and_then(|contents| parse_meminfo_used_pct(&contents))
            .map(|pct| format!("{:.1}", pct));
        let signal = read_file(WIRELESS_PATH).and_then(|contents| parse_wireless_signal(&contents));
        let battery = read_file(BATTERY_CAPACITY_PATH).map(|contents| contents.trim().to_string());

        vec![
            TelemetryRecord::new("RPI_TEMP", or_unavailable(temperature)),
            TelemetryRecord::new("RPI_CPU", or_unavailable(cpu)),
            TelemetryRecord::new("RPI_MEM", or_unavailable(memory)),
            TelemetryRecord::new("SIG_STR", or_unavailable(signal)),
            TelemetryRecord::new("BATTERY", or_unavailable(battery)),
        ]
    }
}

/// Snapshot of what the controller is doing right now. Only reads shared state.
pub fn vehicle_records(context: &AppContext) -> Vec<TelemetryRecord> {
    let orientation = context.orientation.read();
    let telemetry = &context.telemetry;
    let [front_left, front_right, back_right, back_left] = telemetry.motor_pulses();
    let state = FlightState::from_u8(telemetry.controller_state.load(Ordering::Relaxed));

    vec![
        TelemetryRecord::new("ROLL", format!("{:.2}", orientation.roll)),
        TelemetryRecord::new("PITCH", format!("{:.2}", orientation.pitch)),
        TelemetryRecord::new("YAW", format!("{:.2}", orientation.yaw)),
        TelemetryRecord::new("THROTTLE", telemetry.throttle.load(Ordering::Relaxed)),
        TelemetryRecord::new("MOTOR_FL", front_left),
        TelemetryRecord::new("MOTOR_FR", front_right),
        TelemetryRecord::new("MOTOR_BR", back_right),
        TelemetryRecord::new("MOTOR_BL", back_left),
        TelemetryRecord::new("STATE", state),
        TelemetryRecord::new("LOOP_US", telemetry.loop_exec_time_us.load(Ordering::Relaxed)),
    ]
}

pub fn start_telemetry_reporter(
    context: &AppContext,
    config: &TelemetryConfig,
    writer: &LinkWriter,
) {
    let mut health = HealthProbe::default();

    while !context.flags.is_shutting_down() {
        let started_us = context.clock.get_current_system_time_us();
        let mut records = health.sample();
        records.extend(vehicle_records(context));

        log::debug!(
            "Telemetry: {}",
            records
                .iter()
                .map(TelemetryRecord::encode)
                .collect::<Vec<_>>()
                .join(" ")
        );

        if writer.is_connected() {
            for record in records {
                if let Err(err) = writer.send(&ControlEvent::Telemetry(record)) {
                    log::warn!("Telemetry send failed: {}", err);
                    break;
                }
            }
        }
        sleep_remaining(&context.clock, started_us, config.interval);
    }
    log::info!("Telemetry reporter stopped");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::util::{math::vectors::RotationVector3D, time::SystemClock};

    #[test]
    fn thermal_zone_is_in_millidegrees() {
        assert_abs_diff_eq!(parse_thermal_zone("48312\n").unwrap(), 48.312, epsilon = 1e-3);
        assert_eq!(parse_thermal_zone("hot"), None);
    }

    #[test]
    fn cpu_usage_needs_two_samples() {
        let first = "cpu  100 0 100 700 100 0 0 0 0 0\ncpu0 50 0 50 350 50 0 0 0 0 0\n";
        let second = "cpu  200 0 200 1300 100 0 0 0 0 0\n";
        let mut usage = CpuUsage::default();
        assert_eq!(usage.update(parse_cpu_times(first).unwrap()), None);
        // 200 busy jiffies out of 800
        assert_abs_diff_eq!(
            usage.update(parse_cpu_times(second).unwrap()).unwrap(),
            25.0,
            epsilon = 1e-3
        );
        assert_eq!(parse_cpu_times("intr 12 3"), None);
    }

    #[test]
    fn memory_usage_from_total_and_available() {
        let meminfo = "MemTotal:        1000000 kB\nMemFree:          100000 kB\nMemAvailable:     250000 kB\n";
        assert_abs_diff_eq!(parse_meminfo_used_pct(meminfo).unwrap(), 75.0, epsilon = 1e-3);
        assert_eq!(parse_meminfo_used_pct("MemTotal: 10 kB\n"), None);
    }

    #[test]
    fn wireless_signal_per_interface() {
        let wireless = "Inter-| sta-|   Quality        |   Discarded packets\n face | tus | link level noise |  nwid  crypt   frag\n wlan0: 0000   70.  -40.  -256        0      0      0\n";
        assert_eq!(parse_wireless_signal(wireless).as_deref(), Some("wlan0,-40"));
        let headers_only: String = wireless.lines().take(2).collect::<Vec<_>>().join("\n");
        assert_eq!(parse_wireless_signal(&headers_only), None);
    }

    #[test]
    fn health_sample_always_reports_every_record() {
        let names: Vec<String> = HealthProbe::default()
            .sample()
            .into_iter()
            .map(|record| record.name)
            .collect();
        assert_eq!(names, vec!["RPI_TEMP", "RPI_CPU", "RPI_MEM", "SIG_STR", "BATTERY"]);
    }

    #[test]
    fn vehicle_records_mirror_shared_state() {
        let context = AppContext::new(SystemClock::new(), 650, 1800);
        context.orientation.store(RotationVector3D {
            roll: 1.5,
            pitch: -2.25,
            yaw: 90.0,
        });
        context.telemetry.store_motor_pulses([1100, 1200, 1300, 1400]);
        context
            .telemetry
            .controller_state
            .store(FlightState::Active as u8, Ordering::Relaxed);

        let encoded: Vec<String> = vehicle_records(&context)
            .iter()
            .map(TelemetryRecord::encode)
            .collect();
        assert_eq!(
            encoded,
            vec![
                "ROLL,1.50",
                "PITCH,-2.25",
                "YAW,90.00",
                "THROTTLE,0",
                "MOTOR_FL,1100",
                "MOTOR_FR,1200",
                "MOTOR_BR,1300",
                "MOTOR_BL,1400",
                "STATE,ACTIVE",
                "LOOP_US,0",
            ]
        );
    }

    #[test]
    fn reporter_returns_on_shutdown_without_a_connection() {
        let context = AppContext::new(SystemClock::new(), 650, 1800);
        let writer = LinkWriter::new();
        let config = TelemetryConfig {
            interval: Duration::from_millis(1),
        };
        std::thread::scope(|scope| {
            let reporter = scope.spawn(|| start_telemetry_reporter(&context, &config, &writer));
            std::thread::sleep(Duration::from_millis(10));
            context.flags.request_shutdown();
            reporter.join().unwrap();
        });
    }
}
