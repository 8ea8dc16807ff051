use crate::error::{Error, Result};
use num_complex::Complex64;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use std::fmt;
use std::sync::Arc;

/// Real-valued spectral transform of a fixed size.
///
/// The forward transform is unnormalized and the inverse transform divides by
/// the transform size, so `inverse(forward(x)) == x`.
///
/// An engine owns its scratch buffers, so it can't be shared between
/// concurrent workers. Cloning is cheap (the plans are reference counted) and
/// gives every worker its own buffers.
#[derive(Clone)]
pub struct TransformEngine {
    size: usize,
    forward: Arc<dyn RealToComplex<f64>>,
    inverse: Arc<dyn ComplexToReal<f64>>,
    real: Vec<f64>,
    spectrum: Vec<Complex64>,
    scratch: Vec<Complex64>,
}

impl fmt::Debug for TransformEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformEngine")
            .field("size", &self.size)
            .finish()
    }
}

impl TransformEngine {
    /// Plan the transforms for signals of `size` samples.
    ///
    /// Only powers of two (at least 2) are supported.
    ///
    /// # Examples
    ///
    /// ```
    /// use simwire::fft::TransformEngine;
    ///
    /// assert!(TransformEngine::new(4096).is_ok());
    /// assert!(TransformEngine::new(1000).is_err());
    /// ```
    pub fn new(size: usize) -> Result<Self> {
        if size < 2 || !size.is_power_of_two() {
            return Err(Error::UnsupportedTransformLength(size));
        }

        let mut planner = RealFftPlanner::<f64>::new();
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);
        let scratch_len = forward.get_scratch_len().max(inverse.get_scratch_len());

        Ok(Self {
            size,
            real: forward.make_input_vec(),
            spectrum: forward.make_output_vec(),
            scratch: vec![Complex64::new(0.0, 0.0); scratch_len],
            forward,
            inverse,
        })
    }

    /// Number of time-domain samples.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of frequency bins, `size / 2 + 1`.
    pub fn spectrum_len(&self) -> usize {
        self.size / 2 + 1
    }

    /// Forward transform. Signals shorter than [`size`](Self::size) are
    /// zero-padded at the end.
    ///
    /// # Panics
    ///
    /// Panics if `signal` is longer than the transform size.
    pub fn forward(&mut self, signal: &[f64]) -> Result<Vec<Complex64>> {
        assert!(
            signal.len() <= self.size,
            "signal of {} samples doesn't fit a {} point transform",
            signal.len(),
            self.size
        );
        self.real.fill(0.0);
        self.real[..signal.len()].copy_from_slice(signal);

        self.forward
            .process_with_scratch(&mut self.real, &mut self.spectrum, &mut self.scratch)?;

        Ok(self.spectrum.clone())
    }

    /// Inverse transform, normalized by the transform size.
    ///
    /// The imaginary parts of the zero and Nyquist bins carry no information
    /// for a real signal and are discarded.
    ///
    /// # Panics
    ///
    /// Panics if `spectrum` doesn't have exactly
    /// [`spectrum_len`](Self::spectrum_len) bins.
    pub fn inverse(&mut self, spectrum: &[Complex64]) -> Result<Vec<f64>> {
        assert_eq!(spectrum.len(), self.spectrum_len());
        self.spectrum.copy_from_slice(spectrum);
        let last = self.spectrum.len() - 1;
        self.spectrum[0].im = 0.0;
        self.spectrum[last].im = 0.0;

        self.inverse
            .process_with_scratch(&mut self.spectrum, &mut self.real, &mut self.scratch)?;

        let scale = 1.0 / self.size as f64;
        Ok(self.real.iter().map(|x| x * scale).collect())
    }

    /// Circular convolution of `signal` with a kernel already in frequency
    /// space.
    pub fn convolve(&mut self, signal: &[f64], kernel: &[Complex64]) -> Result<Vec<f64>> {
        let mut spectrum = self.forward(signal)?;
        for (bin, k) in spectrum.iter_mut().zip(kernel) {
            *bin *= k;
        }
        self.inverse(&spectrum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_engine_rejects_unsupported_sizes() {
        for size in [0, 1, 3, 6, 100, 1000] {
            assert!(matches!(
                TransformEngine::new(size),
                Err(Error::UnsupportedTransformLength(n)) if n == size
            ));
        }
        for size in [2, 8, 64, 4096] {
            assert!(TransformEngine::new(size).is_ok());
        }
    }

    #[test]
    fn transform_engine_spectrum_len() {
        let engine = TransformEngine::new(64).unwrap();
        assert_eq!(engine.size(), 64);
        assert_eq!(engine.spectrum_len(), 33);
    }

    #[test]
    fn transform_engine_inverse_undoes_forward() {
        let mut engine = TransformEngine::new(16).unwrap();
        let signal: Vec<f64> = (0..16).map(|i| (i as f64 * 0.7).sin() * 3.0).collect();

        let spectrum = engine.forward(&signal).unwrap();
        let back = engine.inverse(&spectrum).unwrap();

        for (a, b) in signal.iter().zip(&back) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn transform_engine_forward_pads_short_signals() {
        let mut engine = TransformEngine::new(8).unwrap();
        let spectrum = engine.forward(&[1.0]).unwrap();

        assert_eq!(spectrum.len(), 5);
        for bin in spectrum {
            assert!((bin.re - 1.0).abs() < 1e-12);
            assert!(bin.im.abs() < 1e-12);
        }
    }

    #[test]
    fn transform_engine_convolve_shifts_by_delayed_impulse() {
        let mut engine = TransformEngine::new(8).unwrap();
        let kernel = engine.forward(&[0.0, 0.0, 1.0]).unwrap();

        let out = engine
            .convolve(&[1.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0, 3.0], &kernel)
            .unwrap();

        let expected = [0.0, 3.0, 1.0, 2.0, 0.0, 0.0, 0.0, 0.0];
        for (a, b) in out.iter().zip(expected) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn transform_engine_clones_are_independent() {
        let mut a = TransformEngine::new(8).unwrap();
        let mut b = a.clone();

        let sa = a.forward(&[1.0, 1.0]).unwrap();
        let _ = b.forward(&[5.0]).unwrap();
        let sa_again = a.forward(&[1.0, 1.0]).unwrap();

        assert_eq!(sa, sa_again);
    }
}
