// Copyright (c) 2022, Zachary D. Olkin.
// This code is provided under the MIT license.

use core::f32::consts::{FRAC_1_SQRT_2, PI};

/// Quality factor of a Butterworth response.
pub const BUTTERWORTH_Q: f32 = FRAC_1_SQRT_2;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Coefficients {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

/// Second order low pass filter over a 3 axis vector, direct form II.
///
/// A cutoff of zero or below, or at or above Nyquist, turns the filter into a pass-through.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LowPassFilter2p {
    sample_freq: f32,
    cutoff_freq: f32,
    q: f32,
    coefficients: Option<Coefficients>,
    delay1: [f32; 3],
    delay2: [f32; 3],
}

impl LowPassFilter2p {
    /// Filter for the given sample rate, cutoff and quality factor, both in Hz.
    pub fn new(sample_freq: f32, cutoff_freq: f32, q: f32) -> Self {
        let mut filter = LowPassFilter2p {
            sample_freq,
            cutoff_freq,
            q,
            coefficients: None,
            delay1: [0.0; 3],
            delay2: [0.0; 3],
        };
        filter.set_cutoff_frequency(sample_freq, cutoff_freq);
        filter
    }

    /// Recomputes the coefficients and clears the delay elements.
    pub fn set_cutoff_frequency(&mut self, sample_freq: f32, cutoff_freq: f32) {
        self.sample_freq = sample_freq;
        self.cutoff_freq = cutoff_freq;
        self.delay1 = [0.0; 3];
        self.delay2 = [0.0; 3];

        let valid = sample_freq > 0.0
            && cutoff_freq > 0.0
            && cutoff_freq < sample_freq / 2.0
            && self.q.is_finite()
            && self.q > 0.0;
        if !valid {
            self.coefficients = None;
            return;
        }

        let ohm = libm::tanf(PI * cutoff_freq / sample_freq);
        let ohm2 = ohm * ohm;
        let c = 1.0 + ohm / self.q + ohm2;

        let b0 = ohm2 / c;
        self.coefficients = Some(Coefficients {
            b0,
            b1: 2.0 * b0,
            b2: b0,
            a1: 2.0 * (ohm2 - 1.0) / c,
            a2: (1.0 - ohm / self.q + ohm2) / c,
        });
    }

    /// Changes the quality factor, keeping the rates.
    pub fn set_q(&mut self, q: f32) {
        self.q = q;
        self.set_cutoff_frequency(self.sample_freq, self.cutoff_freq);
    }

    /// Filters one sample.
    pub fn apply(&mut self, sample: [f32; 3]) -> [f32; 3] {
        let Some(k) = self.coefficients else {
            return sample;
        };

        let mut out = [0.0; 3];
        for axis in 0..3 {
            let mut delay0 = sample[axis] - self.delay1[axis] * k.a1 - self.delay2[axis] * k.a2;
            if !delay0.is_finite() {
                // don't let a bad sample poison the state
                delay0 = sample[axis];
            }

            out[axis] = delay0 * k.b0 + self.delay1[axis] * k.b1 + self.delay2[axis] * k.b2;

            self.delay2[axis] = self.delay1[axis];
            self.delay1[axis] = delay0;
        }
        out
    }

    /// Primes the delay elements so the output settles at `sample` straight away.
    pub fn reset_to(&mut self, sample: [f32; 3]) -> [f32; 3] {
        match self.coefficients {
            Some(k) => {
                let dval = sample.map(|s| s / (k.b0 + k.b1 + k.b2));
                let dval = dval.map(|d| if d.is_finite() { d } else { 0.0 });
                self.delay1 = dval;
                self.delay2 = dval;
                self.apply(sample)
            }
            None => sample,
        }
    }

    /// Clears the delay elements.
    pub fn reset(&mut self) {
        self.delay1 = [0.0; 3];
        self.delay2 = [0.0; 3];
    }

    /// Configured cutoff in Hz.
    pub fn cutoff_freq(&self) -> f32 {
        self.cutoff_freq
    }

    /// Configured sample rate in Hz.
    pub fn sample_freq(&self) -> f32 {
        self.sample_freq
    }

    /// false when the filter passes samples through unchanged
    pub fn is_active(&self) -> bool {
        self.coefficients.is_some()
    }
}
