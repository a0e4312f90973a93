use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU16, AtomicU32, AtomicU64, AtomicU8, Ordering};

use crate::util::{math::vectors::RotationVector3D, time::SystemClock};

const CENTI: f32 = 100.0;

fn pack_i16x3(values: [i16; 3]) -> u64 {
    (values[0] as u16 as u64) | (values[1] as u16 as u64) << 16 | (values[2] as u16 as u64) << 32
}

fn unpack_i16x3(packed: u64) -> [i16; 3] {
    [
        packed as u16 as i16,
        (packed >> 16) as u16 as i16,
        (packed >> 32) as u16 as i16,
    ]
}

fn to_centi(value: f32) -> i16 {
    // Saturating cast, NaN becomes 0
    (value * CENTI) as i16
}

/// Roll, pitch and yaw in hundredths of a degree, all three packed in one
/// word so a reader never sees axes from different updates.
pub struct AtomicRotationVector3D {
    packed: AtomicU64,
}

impl AtomicRotationVector3D {
    pub const fn new() -> Self {
        Self {
            packed: AtomicU64::new(0),
        }
    }

    pub fn store(&self, vector: RotationVector3D) {
        let packed = pack_i16x3([
            to_centi(vector.roll),
            to_centi(vector.pitch),
            to_centi(vector.yaw),
        ]);
        self.packed.store(packed, Ordering::Release);
    }

    pub fn read(&self) -> RotationVector3D {
        let [roll, pitch, yaw] = unpack_i16x3(self.packed.load(Ordering::Acquire));
        RotationVector3D {
            roll: roll as f32 / CENTI,
            pitch: pitch as f32 / CENTI,
            yaw: yaw as f32 / CENTI,
        }
    }
}

/// Throttle as a pulse width plus the attitude target in whole degrees.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ControlTargets {
    pub throttle_pwm: u16,
    pub roll: i16,
    pub pitch: i16,
    pub yaw: i16,
}

impl ControlTargets {
    pub fn idle(throttle_pwm: u16) -> Self {
        ControlTargets {
            throttle_pwm,
            ..Default::default()
        }
    }

    fn pack(&self) -> u64 {
        pack_i16x3([self.roll, self.pitch, self.yaw]) | (self.throttle_pwm as u64) << 48
    }

    fn unpack(packed: u64) -> Self {
        let [roll, pitch, yaw] = unpack_i16x3(packed);
        ControlTargets {
            throttle_pwm: (packed >> 48) as u16,
            roll,
            pitch,
            yaw,
        }
    }
}

/// Pilot targets written by the link receiver and read by the controller.
///
/// The four fields share one atomic word. The update timestamp lives next to
/// it and is written after the targets, so a reader that sees a fresh
/// timestamp also sees the targets that came with it.
pub struct SharedControlTargets {
    packed: AtomicU64,
    last_update_us: AtomicU64,
    min_throttle_pwm: u16,
    max_throttle_pwm: u16,
}

impl SharedControlTargets {
    pub fn new(min_throttle_pwm: u16, max_throttle_pwm: u16) -> Self {
        Self {
            packed: AtomicU64::new(ControlTargets::idle(min_throttle_pwm).pack()),
            last_update_us: AtomicU64::new(0),
            min_throttle_pwm,
            max_throttle_pwm,
        }
    }

    /// Throttle is clamped to the configured range before publishing. A zero
    /// timestamp means "never updated", so updates are stamped at least 1us.
    pub fn store(&self, targets: ControlTargets, now_us: u64) {
        let targets = ControlTargets {
            throttle_pwm: targets
                .throttle_pwm
                .clamp(self.min_throttle_pwm, self.max_throttle_pwm),
            ..targets
        };
        self.packed.store(targets.pack(), Ordering::Release);
        self.last_update_us.store(now_us.max(1), Ordering::Release);
    }

    pub fn read(&self) -> ControlTargets {
        ControlTargets::unpack(self.packed.load(Ordering::Acquire))
    }

    pub fn last_update_us(&self) -> u64 {
        self.last_update_us.load(Ordering::Acquire)
    }
}

/// Flags crossing thread boundaries. Each one only ever goes from false to true.
pub struct AtomicSafetyFlags {
    pub halt_requested: AtomicBool,
    pub sensor_fault: AtomicBool,
    pub shutdown: AtomicBool,
    pub fusion_ready: AtomicBool,
}

impl AtomicSafetyFlags {
    pub const fn new() -> Self {
        AtomicSafetyFlags {
            halt_requested: AtomicBool::new(false),
            sensor_fault: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            fusion_ready: AtomicBool::new(false),
        }
    }

    pub fn request_halt(&self) {
        self.halt_requested.store(true, Ordering::Release);
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// True when the controller has to stop the motors on its next tick.
    pub fn must_halt(&self) -> bool {
        self.halt_requested.load(Ordering::Acquire)
            || self.sensor_fault.load(Ordering::Acquire)
            || self.shutdown.load(Ordering::Acquire)
    }
}

pub struct AtomicTelemetry {
    pub loop_exec_time_us: AtomicI32,
    pub controller_state: AtomicU8,
    pub throttle: AtomicU16,
    pub motor_fl_pulse: AtomicU16,
    pub motor_fr_pulse: AtomicU16,
    pub motor_br_pulse: AtomicU16,
    pub motor_bl_pulse: AtomicU16,
    pub sensor_failures: AtomicU32,
}

impl AtomicTelemetry {
    pub const fn new() -> Self {
        AtomicTelemetry {
            loop_exec_time_us: AtomicI32::new(0),
            controller_state: AtomicU8::new(0),
            throttle: AtomicU16::new(0),
            motor_fl_pulse: AtomicU16::new(0),
            motor_fr_pulse: AtomicU16::new(0),
            motor_br_pulse: AtomicU16::new(0),
            motor_bl_pulse: AtomicU16::new(0),
            sensor_failures: AtomicU32::new(0),
        }
    }

    /// Pulse widths in FL, FR, BR, BL order, 0 for a released output.
    pub fn store_motor_pulses(&self, pulses: [u16; 4]) {
        self.motor_fl_pulse.store(pulses[0], Ordering::Relaxed);
        self.motor_fr_pulse.store(pulses[1], Ordering::Relaxed);
        self.motor_br_pulse.store(pulses[2], Ordering::Relaxed);
        self.motor_bl_pulse.store(pulses[3], Ordering::Relaxed);
    }

    pub fn motor_pulses(&self) -> [u16; 4] {
        [
            self.motor_fl_pulse.load(Ordering::Relaxed),
            self.motor_fr_pulse.load(Ordering::Relaxed),
            self.motor_br_pulse.load(Ordering::Relaxed),
            self.motor_bl_pulse.load(Ordering::Relaxed),
        ]
    }
}

/// Everything the threads share, built once in `main` and handed out by
/// reference.
pub struct AppContext {
    pub clock: SystemClock,
    pub orientation: AtomicRotationVector3D,
    pub targets: SharedControlTargets,
    pub flags: AtomicSafetyFlags,
    pub telemetry: AtomicTelemetry,
}

impl AppContext {
    pub fn new(clock: SystemClock, min_throttle_pwm: u16, max_throttle_pwm: u16) -> Self {
        AppContext {
            clock,
            orientation: AtomicRotationVector3D::new(),
            targets: SharedControlTargets::new(min_throttle_pwm, max_throttle_pwm),
            flags: AtomicSafetyFlags::new(),
            telemetry: AtomicTelemetry::new(),
        }
    }
}
