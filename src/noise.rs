use crate::error::{Error, Result};
use crate::fft::TransformEngine;
use crate::random::UniformSource;
use num_complex::Complex64;
use std::f64::consts::PI;
use uom::si::f64::{Frequency, Time};
use uom::si::frequency::hertz;
use uom::si::time::second;

/// Default number of pre-generated noise waveforms.
pub const DEFAULT_SLOTS: usize = 100;
/// Default width (in frequency bins) of the sigmoid that suppresses content
/// below the low-frequency cutoff.
pub const DEFAULT_CUTOFF_STEEPNESS: f64 = 0.5;
/// Default relative amplitude jitter of every frequency bin (±10%).
pub const DEFAULT_JITTER: f64 = 0.1;

/// Shape of the noise spectrum.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoiseSpectrum {
    /// Overall scale of the spectrum.
    pub factor: f64,
    /// Scale of the exponential fall-off with frequency.
    pub width: Frequency,
    /// Frequency below which noise is suppressed.
    pub low_cutoff: Frequency,
    /// Width, in bins, of the low-frequency suppression.
    pub cutoff_steepness: f64,
    /// Relative amplitude jitter of every bin, in `[0, 1]`.
    pub jitter: f64,
}

impl NoiseSpectrum {
    fn validate(&self) -> Result<()> {
        if !self.factor.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "noise factor must be finite, got {}",
                self.factor
            )));
        }
        if !(self.width.get::<hertz>() > 0.0) {
            return Err(Error::InvalidConfig("noise width must be positive".into()));
        }
        if !self.low_cutoff.get::<hertz>().is_finite() {
            return Err(Error::InvalidConfig("low cutoff must be finite".into()));
        }
        if !(self.cutoff_steepness > 0.0) {
            return Err(Error::InvalidConfig(
                "cutoff steepness must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(Error::InvalidConfig(format!(
                "noise jitter must be in [0, 1], got {}",
                self.jitter
            )));
        }
        Ok(())
    }
}

/// Summary of every sample of every waveform in a [`NoiseBank`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoiseStats {
    pub samples: usize,
    pub mean: f64,
    pub rms: f64,
    pub min: f64,
    pub max: f64,
}

/// Fixed pool of independent noise waveforms shared by all channels.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NoiseBank {
    slots: Vec<Vec<f64>>,
}

impl NoiseBank {
    /// Generate `slots` noise waveforms of `engine.size()` ticks.
    ///
    /// Slots are generated in order, and every frequency bin consumes exactly
    /// two uniform draws (amplitude jitter, then phase). The same source state
    /// therefore always gives the same bank.
    ///
    /// # Examples
    ///
    /// ```
    /// use rand::{rngs::StdRng, SeedableRng};
    /// use simwire::fft::TransformEngine;
    /// use simwire::noise::{NoiseBank, NoiseSpectrum};
    /// use uom::si::f64::{Frequency, Time};
    /// use uom::si::{frequency::kilohertz, time::nanosecond};
    ///
    /// let spectrum = NoiseSpectrum {
    ///     factor: 0.0132,
    ///     width: Frequency::new::<kilohertz>(62.4),
    ///     low_cutoff: Frequency::new::<kilohertz>(7.5),
    ///     cutoff_steepness: 0.5,
    ///     jitter: 0.1,
    /// };
    /// let mut engine = TransformEngine::new(1024)?;
    /// let mut rng = StdRng::seed_from_u64(1);
    /// let bank = NoiseBank::generate(
    ///     &spectrum,
    ///     Time::new::<nanosecond>(500.0),
    ///     4,
    ///     &mut engine,
    ///     &mut rng,
    /// )?;
    /// assert_eq!(bank.len(), 4);
    /// assert_eq!(bank.slot(0).unwrap().len(), 1024);
    /// # Ok::<(), simwire::Error>(())
    /// ```
    pub fn generate<R>(
        spectrum: &NoiseSpectrum,
        sample_period: Time,
        slots: usize,
        engine: &mut TransformEngine,
        rng: &mut R,
    ) -> Result<Self>
    where
        R: UniformSource + ?Sized,
    {
        spectrum.validate()?;
        let tick_count = engine.size();
        let bin_width = 1.0 / (tick_count as f64 * sample_period.get::<second>());
        if !(bin_width.is_finite() && bin_width > 0.0) {
            return Err(Error::InvalidConfig(
                "sample period must be positive".into(),
            ));
        }

        let slots = (0..slots)
            .map(|_| {
                let bins = shaped_bins(spectrum, bin_width, engine.spectrum_len(), rng);
                let waveform = engine.inverse(&bins)?;
                // Undo the 1/N of the inverse transform.
                Ok(waveform
                    .into_iter()
                    .map(|x| x * tick_count as f64)
                    .collect::<Vec<f64>>())
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { slots })
    }

    /// Bank made of the given waveforms.
    pub fn from_waveforms(slots: Vec<Vec<f64>>) -> Self {
        Self { slots }
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot(&self, index: usize) -> Option<&[f64]> {
        self.slots.get(index).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f64]> {
        self.slots.iter().map(Vec::as_slice)
    }

    /// Map a uniform draw in `[0, 1)` to a slot index.
    ///
    /// Returns `None` for an empty bank.
    ///
    /// # Examples
    ///
    /// ```
    /// use simwire::noise::NoiseBank;
    ///
    /// let bank = NoiseBank::from_waveforms(vec![vec![0.0]; 100]);
    /// assert_eq!(bank.select(0.0), Some(0));
    /// assert_eq!(bank.select(0.5), Some(50));
    /// assert_eq!(bank.select(0.9999), Some(99));
    /// assert_eq!(NoiseBank::default().select(0.5), None);
    /// ```
    pub fn select(&self, draw: f64) -> Option<usize> {
        let last = self.slots.len().checked_sub(1)?;
        let index = (draw * (last as f64 + 0.1)).round();
        let index: usize = num_traits::cast(index.max(0.0)).unwrap_or(last);
        Some(index.min(last))
    }

    /// Distribution summary over all samples of all slots, `None` if the bank
    /// holds no samples.
    pub fn stats(&self) -> Option<NoiseStats> {
        let samples = self.slots.iter().map(Vec::len).sum::<usize>();
        if samples == 0 {
            return None;
        }

        let (sum, sum_sq, min, max) = self.slots.iter().flatten().fold(
            (0.0, 0.0, f64::INFINITY, f64::NEG_INFINITY),
            |(sum, sum_sq, min, max), &x| (sum + x, sum_sq + x * x, min.min(x), max.max(x)),
        );
        let n = samples as f64;

        Some(NoiseStats {
            samples,
            mean: sum / n,
            rms: (sum_sq / n).sqrt(),
            min,
            max,
        })
    }
}

fn shaped_bins<R>(
    spectrum: &NoiseSpectrum,
    bin_width: f64,
    len: usize,
    rng: &mut R,
) -> Vec<Complex64>
where
    R: UniformSource + ?Sized,
{
    let width = spectrum.width.get::<hertz>();
    let cutoff_bin = spectrum.low_cutoff.get::<hertz>() / bin_width;
    let mut draws = [0.0; 2];

    (0..len)
        .map(|i| {
            let i = i as f64;
            let envelope = spectrum.factor * (-i * bin_width / width).exp();
            let high_pass =
                1.0 / (1.0 + (-(i - cutoff_bin) / spectrum.cutoff_steepness).exp());

            rng.fill_uniform(&mut draws);
            let jitter = 1.0 - spectrum.jitter + 2.0 * spectrum.jitter * draws[0];
            let magnitude = envelope * high_pass * jitter;
            let phase = draws[1] * 2.0 * PI;

            Complex64::from_polar(magnitude, phase)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use uom::si::frequency::kilohertz;
    use uom::si::time::nanosecond;

    fn spectrum() -> NoiseSpectrum {
        NoiseSpectrum {
            factor: 0.0132,
            width: Frequency::new::<kilohertz>(62.4),
            low_cutoff: Frequency::new::<kilohertz>(7.5),
            cutoff_steepness: DEFAULT_CUTOFF_STEEPNESS,
            jitter: DEFAULT_JITTER,
        }
    }

    fn bank(seed: u64, slots: usize) -> NoiseBank {
        let mut engine = TransformEngine::new(512).unwrap();
        let mut rng = StdRng::seed_from_u64(seed);
        NoiseBank::generate(
            &spectrum(),
            Time::new::<nanosecond>(500.0),
            slots,
            &mut engine,
            &mut rng,
        )
        .unwrap()
    }

    #[test]
    fn noise_bank_deterministic() {
        assert_eq!(bank(17, 8), bank(17, 8));
        assert_ne!(bank(17, 8), bank(18, 8));
    }

    #[test]
    fn noise_bank_slots_are_independent() {
        let bank = bank(5, 3);
        assert_eq!(bank.len(), 3);
        assert_ne!(bank.slot(0), bank.slot(1));
        assert_ne!(bank.slot(1), bank.slot(2));
        assert!(bank.iter().all(|w| w.len() == 512));
    }

    #[test]
    fn noise_bank_prefix_is_stable() {
        // Slot k only depends on the draws made before it.
        let small = bank(9, 2);
        let large = bank(9, 5);
        assert_eq!(small.slot(0), large.slot(0));
        assert_eq!(small.slot(1), large.slot(1));
    }

    #[test]
    fn noise_bank_draws_two_values_per_bin() {
        struct Counter(usize);
        impl UniformSource for Counter {
            fn uniform(&mut self) -> f64 {
                self.0 += 1;
                0.5
            }
        }

        let mut engine = TransformEngine::new(64).unwrap();
        let mut counter = Counter(0);
        NoiseBank::generate(
            &spectrum(),
            Time::new::<nanosecond>(500.0),
            3,
            &mut engine,
            &mut counter,
        )
        .unwrap();

        assert_eq!(counter.0, 3 * 2 * 33);
    }

    #[test]
    fn noise_bank_suppresses_low_frequencies() {
        let mut engine = TransformEngine::new(512).unwrap();
        let bank = bank(11, 1);
        let spectrum = engine.forward(bank.slot(0).unwrap()).unwrap();

        // Bin width is 1 / (512 * 500 ns) ~ 3.9 kHz, so the 7.5 kHz cutoff
        // sits near bin 2 and bin 0 is strongly suppressed.
        assert!(spectrum[0].norm() < 0.05 * spectrum[5].norm());
    }

    #[test]
    fn noise_bank_zero_slots() {
        let bank = bank(1, 0);
        assert!(bank.is_empty());
        assert_eq!(bank.select(0.3), None);
        assert_eq!(bank.stats(), None);
    }

    #[test]
    fn noise_bank_select_clamps() {
        let bank = NoiseBank::from_waveforms(vec![vec![0.0]; 10]);
        // 0.99 * 9.1 = 9.009 -> 9, never 10
        assert_eq!(bank.select(0.99), Some(9));
        assert_eq!(bank.select(1.0), Some(9));
        assert_eq!(bank.select(-0.2), Some(0));

        let single = NoiseBank::from_waveforms(vec![vec![1.0]]);
        assert_eq!(single.select(0.999), Some(0));
    }

    #[test]
    fn noise_bank_stats() {
        let bank = NoiseBank::from_waveforms(vec![vec![1.0, -1.0], vec![3.0, -3.0]]);
        let stats = bank.stats().unwrap();
        assert_eq!(stats.samples, 4);
        assert_eq!(stats.mean, 0.0);
        assert!((stats.rms - 5.0_f64.sqrt()).abs() < 1e-12);
        assert_eq!(stats.min, -3.0);
        assert_eq!(stats.max, 3.0);
    }

    #[test]
    fn noise_bank_rejects_bad_spectrum() {
        let mut engine = TransformEngine::new(64).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let period = Time::new::<nanosecond>(500.0);

        let mut bad = spectrum();
        bad.jitter = 1.5;
        assert!(NoiseBank::generate(&bad, period, 1, &mut engine, &mut rng).is_err());

        let mut bad = spectrum();
        bad.width = Frequency::new::<kilohertz>(0.0);
        assert!(NoiseBank::generate(&bad, period, 1, &mut engine, &mut rng).is_err());

        let mut bad = spectrum();
        bad.cutoff_steepness = 0.0;
        assert!(NoiseBank::generate(&bad, period, 1, &mut engine, &mut rng).is_err());
    }
}
