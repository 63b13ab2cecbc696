// Copyright (c) 2022, Zachary D. Olkin.
// This code is provided under the MIT license.

/// When an [`Integrator`] hands back what it accumulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Coalesce {
    /// Report on every sample
    EveryCall,
    /// Report once at least this many microseconds have accumulated
    Window {
        /// window length in microseconds
        interval_us: u32,
    },
}

/// Rectangular rule integrator of a 3 axis rate. Turns angular rate into delta angle and
/// acceleration into delta velocity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Integrator {
    policy: Coalesce,
    sum: [f32; 3],
    elapsed_us: u32,
}

impl Integrator {
    /// Empty integrator with the given reporting policy.
    pub fn new(policy: Coalesce) -> Self {
        Integrator {
            policy,
            sum: [0.0; 3],
            elapsed_us: 0,
        }
    }

    /// Accumulates `value` held for `dt_us`. Returns the elapsed time and the integral when the
    /// policy says it is time to report, resetting both.
    pub fn put(&mut self, dt_us: u32, value: [f32; 3]) -> Option<(u32, [f32; 3])> {
        let dt = dt_us as f32 * 1e-6;
        for (sum, v) in self.sum.iter_mut().zip(value.iter()) {
            *sum += v * dt;
        }
        self.elapsed_us = self.elapsed_us.saturating_add(dt_us);

        let ready = match self.policy {
            Coalesce::EveryCall => true,
            Coalesce::Window { interval_us } => self.elapsed_us >= interval_us,
        };

        if ready {
            Some(self.take())
        } else {
            None
        }
    }

    /// Returns whatever is accumulated and starts over.
    pub fn take(&mut self) -> (u32, [f32; 3]) {
        let out = (self.elapsed_us, self.sum);
        self.reset();
        out
    }

    /// Drops the accumulated integral.
    pub fn reset(&mut self) {
        self.sum = [0.0; 3];
        self.elapsed_us = 0;
    }

    /// Changes the policy, dropping anything accumulated.
    pub fn set_policy(&mut self, policy: Coalesce) {
        self.policy = policy;
        self.reset();
    }

    /// Time accumulated since the last report.
    pub fn elapsed_us(&self) -> u32 {
        self.elapsed_us
    }
}
