use std::{
    sync::atomic::Ordering,
    thread,
};

use crate::{
    config::FusionConfig,
    drivers::imu_sensors::InertialMeasurementUnit,
    shared_core_values::AppContext,
    util::{
        error::AppError,
        math::vectors::{RotationVector3D, SensorVector3D},
        time::sleep_remaining,
    },
};

use super::orientation_estimator::{build_estimator, OrientationEstimator};

const US_IN_SECOND: f32 = 1_000_000.0_f32;

pub struct SensorFusion<I: InertialMeasurementUnit> {
    imu: I,
    config: FusionConfig,
    estimator: Box<dyn OrientationEstimator>,
    gyro_bias: SensorVector3D,
    calibrated: bool,
    last_estimate: RotationVector3D,
    previous_time_us: Option<u64>,
    consecutive_failures: u32,
}

impl<I: InertialMeasurementUnit> SensorFusion<I> {
    pub fn new(imu: I, config: FusionConfig) -> Self {
        SensorFusion {
            estimator: build_estimator(&config),
            imu,
            config,
            gyro_bias: SensorVector3D::default(),
            calibrated: false,
            last_estimate: RotationVector3D::default(),
            previous_time_us: None,
            consecutive_failures: 0,
        }
    }

    fn read_gyro(&mut self) -> Result<SensorVector3D, AppError> {
        let sample = self.imu.read_raw_gyro()?;
        Ok(self.config.gyro_remap.apply(sample))
    }

    fn read_accel(&mut self) -> Result<SensorVector3D, AppError> {
        let sample = self.imu.read_raw_accel()?;
        Ok(self.config.accel_remap.apply(sample))
    }

    /// Counts a failed read, escalating once the configured bound is hit.
    fn register_failure(&mut self, err: AppError) -> Result<(), AppError> {
        self.consecutive_failures += 1;
        if self.consecutive_failures == 1 {
            log::warn!("IMU read failed: {}", err);
        }
        if self.consecutive_failures >= self.config.max_consecutive_failures {
            log::error!(
                "IMU failed {} consecutive reads, last error: {}",
                self.consecutive_failures,
                err
            );
            return Err(AppError::SensorFailure {
                consecutive: self.consecutive_failures,
            });
        }
        Ok(())
    }

    /// Averages the gyro while the vehicle sits still. Must finish before any
    /// estimate is produced. The sensor has to be completely still.
    pub fn calibrate(&mut self) -> Result<SensorVector3D, AppError> {
        log::info!(
            "Calibrating gyro over {} samples",
            self.config.calibration_samples
        );
        let mut rotation_rate_accumulator = SensorVector3D::default();
        let mut count = 0_u32;
        while count < self.config.calibration_samples {
            match self.read_gyro() {
                Ok(rate) => {
                    self.consecutive_failures = 0;
                    rotation_rate_accumulator += rate;
                    count += 1;
                }
                Err(err) => self.register_failure(err)?,
            }
            if !self.config.calibration_interval.is_zero() {
                thread::sleep(self.config.calibration_interval);
            }
        }
        self.gyro_bias = rotation_rate_accumulator / count as f32;

        let accel = loop {
            match self.read_accel() {
                Ok(accel) => break accel,
                Err(err) => self.register_failure(err)?,
            }
            if !self.config.calibration_interval.is_zero() {
                thread::sleep(self.config.calibration_interval);
            }
        };
        self.consecutive_failures = 0;
        self.estimator.reset(accel.calculate_orientation_angles());
        self.previous_time_us = None;
        self.calibrated = true;

        log::info!("Gyro calibrated, bias {:?}", self.gyro_bias);
        Ok(self.gyro_bias)
    }

    /// One fusion step. A failed read leaves the previous estimate in place
    /// until too many of them happen in a row.
    pub fn update_cycle(&mut self, now_us: u64) -> Result<RotationVector3D, AppError> {
        if !self.calibrated {
            return Err(AppError::SensorNotReady);
        }

        let samples = self
            .read_gyro()
            .and_then(|gyro| Ok((gyro, self.read_accel()?)));
        let (gyro, accel) = match samples {
            Ok(samples) => samples,
            Err(err) => {
                self.register_failure(err)?;
                return Ok(self.last_estimate);
            }
        };
        if self.consecutive_failures > 0 {
            log::info!(
                "IMU recovered after {} failed reads",
                self.consecutive_failures
            );
            self.consecutive_failures = 0;
        }

        let dt_seconds = self
            .previous_time_us
            .map(|previous| now_us.saturating_sub(previous) as f32 / US_IN_SECOND)
            .unwrap_or(0.0_f32);
        self.previous_time_us = Some(now_us);

        let rotation_rate = gyro - self.gyro_bias;
        let accel_angles = accel.calculate_orientation_angles();
        if !rotation_rate.is_finite() || !accel_angles.roll.is_finite() || !accel_angles.pitch.is_finite() {
            log::debug!("Discarding non finite IMU sample");
            return Ok(self.last_estimate);
        }

        self.last_estimate = self
            .estimator
            .update(rotation_rate, accel_angles, dt_seconds);
        Ok(self.last_estimate)
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Sampling loop: calibrates, then publishes an estimate every cycle until
    /// shutdown. A sensor failure raises the fault flag, which halts the
    /// controller.
    pub fn run(&mut self, context: &AppContext) -> Result<(), AppError> {
        if let Err(err) = self.calibrate() {
            context.flags.sensor_fault.store(true, Ordering::Release);
            return Err(err);
        }
        context.orientation.store(self.last_estimate);
        context.flags.fusion_ready.store(true, Ordering::Release);

        while !context.flags.is_shutting_down() {
            let started_us = context.clock.get_current_system_time_us();
            match self.update_cycle(started_us) {
                Ok(estimate) => context.orientation.store(estimate),
                Err(err) => {
                    context.flags.sensor_fault.store(true, Ordering::Release);
                    return Err(err);
                }
            }
            context
                .telemetry
                .sensor_failures
                .store(self.consecutive_failures, Ordering::Relaxed);
            sleep_remaining(&context.clock, started_us, self.config.cycle);
        }
        Ok(())
    }
}
