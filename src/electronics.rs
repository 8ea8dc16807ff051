use crate::error::{Error, Result};
use std::f64::consts::PI;
use uom::si::f64::Time;
use uom::si::time::{nanosecond, second};

/// Arbitrary scaling that brings the shaped pulse to display-friendly ADC
/// counts.
pub const DISPLAY_SCALE: f64 = 120_000.0;

/// Samples below this fraction of the peak are trimmed from both ends of the
/// response.
pub const TRIM_FRACTION: f64 = 0.01;

/// Time constants of the bipolar-exponential shaping amplifier.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShapingTimes {
    /// Decay constant of the pulse tail.
    pub fast: Time,
    /// Rise constant of the pulse front. Must be shorter than `fast`.
    pub slow: Time,
}

/// Impulse response of the readout electronics, trimmed to the region where
/// it is at least [`TRIM_FRACTION`] of its peak.
#[derive(Clone, Debug, PartialEq)]
pub struct ElectronicsResponse {
    samples: Vec<f64>,
    peak: f64,
}

impl ElectronicsResponse {
    /// Sample the shaping pulse over `tick_count` ticks and trim its tails.
    ///
    /// The pulse is evaluated at `t = (i - tick_count / 3) * sample_period` so
    /// that the whole rise is captured.
    pub fn new(shaping: ShapingTimes, sample_period: Time, tick_count: usize) -> Result<Self> {
        let fast = shaping.fast.get::<second>();
        let slow = shaping.slow.get::<second>();
        let period = sample_period.get::<second>();

        let invalid = || Error::InvalidShaping {
            fast_ns: shaping.fast.get::<nanosecond>(),
            slow_ns: shaping.slow.get::<nanosecond>(),
        };
        if !(slow > 0.0 && slow < fast) {
            return Err(invalid());
        }
        let norm = slow * PI / (period * (slow * PI / fast).sin());
        if !(norm.is_finite() && norm > 0.0) {
            return Err(invalid());
        }

        let offset = tick_count as f64 / 3.0;
        let full: Vec<f64> = (0..tick_count)
            .map(|i| {
                let t = (i as f64 - offset) * period;
                DISPLAY_SCALE * shape(t, fast, slow) / norm
            })
            .collect();

        let peak = full.iter().copied().fold(0.0, f64::max);
        let threshold = TRIM_FRACTION * peak;
        let samples = match retained_bounds(&full, threshold) {
            Some((first, last)) => full[first..=last].to_vec(),
            None => Vec::new(),
        };

        Ok(Self { samples, peak })
    }

    /// Retained samples.
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Number of retained samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Largest value of the untrimmed response.
    pub fn peak(&self) -> f64 {
        self.peak
    }
}

// exp(-t/fast) / (1 + exp(-t/slow)), rearranged for negative t so that
// neither exponential overflows.
fn shape(t: f64, fast: f64, slow: f64) -> f64 {
    if t >= 0.0 {
        (-t / fast).exp() / (1.0 + (-t / slow).exp())
    } else {
        (t / slow - t / fast).exp() / ((t / slow).exp() + 1.0)
    }
}

// Indices of the first and last samples at or above `threshold`. The pulse
// has a single maximum, so every sample in between is above it too.
fn retained_bounds(samples: &[f64], threshold: f64) -> Option<(usize, usize)> {
    let first = samples.iter().position(|&x| x >= threshold)?;
    let last = samples.iter().rposition(|&x| x >= threshold)?;
    Some((first, last))
}
