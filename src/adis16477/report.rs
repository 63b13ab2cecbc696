// Copyright (c) 2022, Zachary D. Olkin.
// This code is provided under the MIT license.

use heapless::Deque;

/// One angular rate output.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GyroReport {
    /// Time the frame was read, microseconds
    pub timestamp_us: u64,
    /// Time covered by `delta_angle`, microseconds
    pub integral_dt_us: u32,
    /// Integrated angle over `integral_dt_us`, rad
    pub delta_angle: [f32; 3],
    /// Filtered angular rate, rad/s
    pub rate: [f32; 3],
    /// Sensor counts as read
    pub raw: [i16; 3],
    /// Die temperature, degC
    pub temperature: f32,
    /// Bad transfers so far
    pub error_count: u32,
    /// rad/s per count
    pub scaling: f32,
    /// Full scale range, rad/s
    pub range_rad_s: f32,
}

/// One acceleration output.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AccelReport {
    /// Time the frame was read, microseconds
    pub timestamp_us: u64,
    /// Time covered by `delta_velocity`, microseconds
    pub integral_dt_us: u32,
    /// Integrated velocity change over `integral_dt_us`, m/s
    pub delta_velocity: [f32; 3],
    /// Filtered acceleration, m/s^2
    pub accel: [f32; 3],
    /// Sensor counts as read
    pub raw: [i16; 3],
    /// Die temperature, degC
    pub temperature: f32,
    /// Bad transfers so far
    pub error_count: u32,
    /// m/s^2 per count
    pub scaling: f32,
    /// Full scale range, m/s^2
    pub range_m_s2: f32,
    /// Axes at or past the full scale range
    pub clipping: [bool; 3],
}

/// Where finished reports go. Called from the sampling callback, so implementations must not
/// block.
pub trait Publisher {
    /// Takes a new angular rate report.
    fn publish_gyro(&mut self, report: &GyroReport);

    /// Takes a new acceleration report.
    fn publish_accel(&mut self, report: &AccelReport);
}

/// Bounded in-memory publisher. Holds the newest `N` reports of each kind; older ones are
/// dropped and counted.
pub struct ReportQueue<const N: usize> {
    gyro: Deque<GyroReport, N>,
    accel: Deque<AccelReport, N>,
    overruns: u32,
}

impl<const N: usize> Default for ReportQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> ReportQueue<N> {
    /// Empty queue.
    pub const fn new() -> Self {
        ReportQueue {
            gyro: Deque::new(),
            accel: Deque::new(),
            overruns: 0,
        }
    }

    /// Oldest queued gyro report.
    pub fn pop_gyro(&mut self) -> Option<GyroReport> {
        self.gyro.pop_front()
    }

    /// Oldest queued accel report.
    pub fn pop_accel(&mut self) -> Option<AccelReport> {
        self.accel.pop_front()
    }

    /// Queued gyro reports, oldest first.
    pub fn gyro(&self) -> impl Iterator<Item = &GyroReport> {
        self.gyro.iter()
    }

    /// Queued accel reports, oldest first.
    pub fn accel(&self) -> impl Iterator<Item = &AccelReport> {
        self.accel.iter()
    }

    /// Number of queued gyro reports.
    pub fn gyro_len(&self) -> usize {
        self.gyro.len()
    }

    /// Number of queued accel reports.
    pub fn accel_len(&self) -> usize {
        self.accel.len()
    }

    /// Reports dropped because the queue was full.
    pub fn overruns(&self) -> u32 {
        self.overruns
    }

    /// Empties both queues.
    pub fn clear(&mut self) {
        self.gyro.clear();
        self.accel.clear();
    }
}

fn push_newest<T, const N: usize>(queue: &mut Deque<T, N>, item: T) -> bool {
    let mut dropped = false;
    if queue.is_full() {
        queue.pop_front();
        dropped = true;
    }
    if queue.push_back(item).is_err() {
        // only possible with N == 0
        dropped = true;
    }
    dropped
}

impl<const N: usize> Publisher for ReportQueue<N> {
    fn publish_gyro(&mut self, report: &GyroReport) {
        if push_newest(&mut self.gyro, *report) {
            self.overruns = self.overruns.saturating_add(1);
        }
    }

    fn publish_accel(&mut self, report: &AccelReport) {
        if push_newest(&mut self.accel, *report) {
            self.overruns = self.overruns.saturating_add(1);
        }
    }
}
