use std::time::{Duration, Instant};

/// Monotonic microsecond clock shared by every loop of the flight computer, so
/// timestamps written by one thread can be compared by another.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            start: Instant::now(),
        }
    }

    pub fn get_current_system_time_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Sleeps for what is left of `period` since `started_us`, skipping the sleep
/// when the iteration already overran.
pub fn sleep_remaining(clock: &SystemClock, started_us: u64, period: Duration) {
    let elapsed = Duration::from_micros(
        clock
            .get_current_system_time_us()
            .saturating_sub(started_us),
    );
    if let Some(remaining) = period.checked_sub(elapsed) {
        std::thread::sleep(remaining);
    }
}
