// Copyright (c) 2022, Zachary D. Olkin.
// This code is provided under the MIT license.

/// Number of periods the bad transfer limit looks back over.
pub const TRANSFER_WINDOW: u8 = 64;

/// Cumulative sampling statistics. Monotonic for the life of the driver except for the interval
/// statistics, which start over with every `start()`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Counters {
    /// Frames that made it through the pipeline
    pub samples: u32,
    /// Periods lost to a bus error
    pub bus_errors: u32,
    /// Periods lost to a checksum mismatch
    pub checksum_errors: u32,
    /// Frames that arrived with DIAG_STAT flags raised
    pub diag_faults: u32,
    /// Jumps in DATA_CNTR larger than one between good frames
    pub counter_gaps: u32,
    /// Time between callbacks
    pub interval: IntervalStats,
}

impl Counters {
    /// Bus and checksum errors together.
    pub fn bad_transfers(&self) -> u32 {
        self.bus_errors.saturating_add(self.checksum_errors)
    }
}

/// Min, max and mean of the time between consecutive callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IntervalStats {
    last_us: Option<u64>,
    min_us: u32,
    max_us: u32,
    total_us: u64,
    count: u32,
}

impl IntervalStats {
    /// Records a callback at `now_us`.
    pub fn record(&mut self, now_us: u64) {
        if let Some(last) = self.last_us {
            let interval = now_us.saturating_sub(last).min(u32::MAX as u64) as u32;
            if self.count == 0 {
                self.min_us = interval;
                self.max_us = interval;
            } else {
                self.min_us = self.min_us.min(interval);
                self.max_us = self.max_us.max(interval);
            }
            self.total_us = self.total_us.saturating_add(interval as u64);
            self.count = self.count.saturating_add(1);
        }
        self.last_us = Some(now_us);
    }

    /// Forgets everything, the next callback only sets the reference time.
    pub fn restart(&mut self) {
        *self = IntervalStats::default();
    }

    /// Shortest interval seen, zero before two callbacks.
    pub fn min_us(&self) -> u32 {
        self.min_us
    }

    /// Longest interval seen.
    pub fn max_us(&self) -> u32 {
        self.max_us
    }

    /// Average interval.
    pub fn mean_us(&self) -> u32 {
        if self.count == 0 {
            0
        } else {
            (self.total_us / self.count as u64) as u32
        }
    }

    /// Number of intervals measured.
    pub fn count(&self) -> u32 {
        self.count
    }
}

/// Decides when sampling has to stop.
///
/// Trips on either too many bad transfers within the last [`TRANSFER_WINDOW`] periods, or on a
/// DIAG_STAT that stays raised for too many frames in a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultMonitor {
    history: u64,
    bad_limit: u8,
    diag_run: u8,
    diag_limit: u8,
}

impl FaultMonitor {
    /// Monitor that trips above `bad_limit` bad transfers, or after `diag_limit` consecutive
    /// faulty frames.
    pub fn new(bad_limit: u8, diag_limit: u8) -> Self {
        FaultMonitor {
            history: 0,
            bad_limit,
            diag_run: 0,
            diag_limit,
        }
    }

    /// Records the outcome of one period's transfer. Returns true once the limit is exceeded.
    pub fn record_transfer(&mut self, bad: bool) -> bool {
        self.history = self.history << 1 | bad as u64;
        self.bad_in_window() > self.bad_limit as u32
    }

    /// Records whether a good frame had DIAG_STAT raised. Returns true once the run is long
    /// enough.
    pub fn record_diag(&mut self, faulty: bool) -> bool {
        if faulty {
            self.diag_run = self.diag_run.saturating_add(1);
        } else {
            self.diag_run = 0;
        }
        self.diag_run >= self.diag_limit
    }

    /// Bad transfers within the window.
    pub fn bad_in_window(&self) -> u32 {
        self.history.count_ones()
    }

    /// Length of the current run of faulty frames.
    pub fn diag_run(&self) -> u8 {
        self.diag_run
    }

    /// Clears the history.
    pub fn reset(&mut self) {
        self.history = 0;
        self.diag_run = 0;
    }
}
