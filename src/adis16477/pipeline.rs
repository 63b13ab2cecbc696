// Copyright (c) 2022, Zachary D. Olkin.
// This code is provided under the MIT license.

use crate::adis16477::convert::{temperature_c, ACCEL_SCALE_M_S2, GYRO_SCALE_RAD_S};
use crate::adis16477::filter::LowPassFilter2p;
use crate::adis16477::frame::RawFrame;
use crate::adis16477::integrator::{Coalesce, Integrator};
use crate::adis16477::report::{AccelReport, GyroReport};
use crate::adis16477::Config;

// Gaps longer than this many periods are treated as a restart
const MAX_GAP_PERIODS: u64 = 10;

/// Filter and integrator state of both channels, plus the time of the previous sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pipeline {
    gyro_filter: LowPassFilter2p,
    accel_filter: LowPassFilter2p,
    gyro_integrator: Integrator,
    accel_integrator: Integrator,
    last_sample_us: Option<u64>,
}

impl Pipeline {
    /// Fresh pipeline for `config`.
    pub fn new(config: &Config) -> Self {
        let rate = config.sample_rate_hz as f32;
        Pipeline {
            gyro_filter: LowPassFilter2p::new(rate, config.gyro_cutoff_hz, config.filter_q),
            accel_filter: LowPassFilter2p::new(rate, config.accel_cutoff_hz, config.filter_q),
            gyro_integrator: Integrator::new(Coalesce::EveryCall),
            accel_integrator: Integrator::new(Coalesce::Window {
                interval_us: config.accel_window_us,
            }),
            last_sample_us: None,
        }
    }

    /// Rebuilds the filters and empties the integrators.
    pub fn reset(&mut self, config: &Config) {
        *self = Pipeline::new(config);
    }

    /// Keeps filter and integrator state but forgets the previous sample time, so the first
    /// sample after a pause integrates over a nominal period.
    pub fn resume(&mut self) {
        self.last_sample_us = None;
    }

    /// Changes the gyro cutoff. Clears the gyro filter state.
    pub fn set_gyro_cutoff(&mut self, config: &Config) {
        self.gyro_filter
            .set_cutoff_frequency(config.sample_rate_hz as f32, config.gyro_cutoff_hz);
    }

    /// Changes the accel cutoff. Clears the accel filter state.
    pub fn set_accel_cutoff(&mut self, config: &Config) {
        self.accel_filter
            .set_cutoff_frequency(config.sample_rate_hz as f32, config.accel_cutoff_hz);
    }

    /// Gyro filter, for inspection.
    pub fn gyro_filter(&self) -> &LowPassFilter2p {
        &self.gyro_filter
    }

    /// Accel filter, for inspection.
    pub fn accel_filter(&self) -> &LowPassFilter2p {
        &self.accel_filter
    }

    fn dt_us(&mut self, timestamp_us: u64, nominal_us: u32) -> u32 {
        let dt = match self.last_sample_us {
            Some(last) if timestamp_us > last => {
                let gap = timestamp_us - last;
                if gap <= MAX_GAP_PERIODS * nominal_us as u64 {
                    gap as u32
                } else {
                    nominal_us
                }
            }
            _ => nominal_us,
        };
        self.last_sample_us = Some(timestamp_us);
        dt
    }

    /// Runs one good frame through conversion, calibration, rotation, filtering and integration.
    /// The gyro report comes every sample, the accel report once its window fills.
    pub fn process(
        &mut self,
        timestamp_us: u64,
        frame: &RawFrame,
        config: &Config,
        error_count: u32,
    ) -> (Option<GyroReport>, Option<AccelReport>) {
        let cal = &config.calibration;
        let temperature = temperature_c(frame.temp);
        let dt_us = self.dt_us(timestamp_us, config.interval_us());

        let gyro = config.rotation.apply(cal.convert_gyro(frame.gyro));
        let accel = config.rotation.apply(cal.convert_accel(frame.accel));
        let clipping = cal.accel_clipping(&accel);

        let rate = self.gyro_filter.apply(gyro);
        let accel = self.accel_filter.apply(accel);

        let gyro_report = self
            .gyro_integrator
            .put(dt_us, rate)
            .map(|(integral_dt_us, delta_angle)| GyroReport {
                timestamp_us,
                integral_dt_us,
                delta_angle,
                rate,
                raw: frame.gyro,
                temperature,
                error_count,
                scaling: GYRO_SCALE_RAD_S,
                range_rad_s: cal.gyro_range_rad_s,
            });

        let accel_report =
            self.accel_integrator
                .put(dt_us, accel)
                .map(|(integral_dt_us, delta_velocity)| AccelReport {
                    timestamp_us,
                    integral_dt_us,
                    delta_velocity,
                    accel,
                    raw: frame.accel,
                    temperature,
                    error_count,
                    scaling: ACCEL_SCALE_M_S2,
                    range_m_s2: cal.accel_range_m_s2,
                    clipping,
                });

        (gyro_report, accel_report)
    }
}
