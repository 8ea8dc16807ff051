use crate::electronics::ElectronicsResponse;
use crate::error::Result;
use crate::fft::TransformEngine;
use crate::field::FieldResponse;
use crate::geometry::PlaneClass;
use num_complex::Complex64;

/// Frequency-space response of one plane class: the kernel every channel's
/// charge is multiplied by.
#[derive(Clone, Debug, PartialEq)]
pub struct TransferSpectrum {
    bins: Vec<Complex64>,
}

impl TransferSpectrum {
    /// Forward transform of a time-domain response, used as is.
    ///
    /// # Examples
    ///
    /// ```
    /// use simwire::fft::TransformEngine;
    /// use simwire::response::TransferSpectrum;
    ///
    /// let mut engine = TransformEngine::new(8)?;
    /// let identity = TransferSpectrum::from_response(&mut engine, &[1.0])?;
    /// assert_eq!(identity.bins().len(), 5);
    /// # Ok::<(), simwire::Error>(())
    /// ```
    pub fn from_response(engine: &mut TransformEngine, response: &[f64]) -> Result<Self> {
        Ok(Self {
            bins: engine.forward(response)?,
        })
    }

    pub fn bins(&self) -> &[Complex64] {
        &self.bins
    }
}

/// Combined field and electronics response of both plane classes.
#[derive(Clone, Debug)]
pub struct ResponseConvolver {
    collection_shape: Vec<f64>,
    induction_shape: Vec<f64>,
    collection: TransferSpectrum,
    induction: TransferSpectrum,
}

impl ResponseConvolver {
    /// Convolve each field response with the electronics response, align the
    /// result against the two-point delta kernel and transform it.
    ///
    /// Only the first `field_bins` ticks of the field responses take part in
    /// the convolution.
    pub fn new(
        engine: &mut TransformEngine,
        collection: &FieldResponse,
        induction: &FieldResponse,
        electronics: &ElectronicsResponse,
        field_bins: usize,
    ) -> Result<Self> {
        let tick_count = engine.size();

        let mut collection_shape =
            causal_convolution(electronics.samples(), collection.samples(), field_bins, tick_count);
        let mut induction_shape =
            causal_convolution(electronics.samples(), induction.samples(), field_bins, tick_count);
        align_to_delta(&mut collection_shape);
        align_to_delta(&mut induction_shape);

        Ok(Self {
            collection: TransferSpectrum::from_response(engine, &collection_shape)?,
            induction: TransferSpectrum::from_response(engine, &induction_shape)?,
            collection_shape,
            induction_shape,
        })
    }

    /// Transfer spectrum of the given plane class.
    pub fn spectrum(&self, plane: PlaneClass) -> &TransferSpectrum {
        match plane {
            PlaneClass::Collection => &self.collection,
            PlaneClass::Induction => &self.induction,
        }
    }

    /// Aligned time-domain response of the given plane class.
    pub fn time_shape(&self, plane: PlaneClass) -> &[f64] {
        match plane {
            PlaneClass::Collection => &self.collection_shape,
            PlaneClass::Induction => &self.induction_shape,
        }
    }

    pub fn into_spectra(self) -> (TransferSpectrum, TransferSpectrum) {
        (self.collection, self.induction)
    }
}

// out[i] = sum_j elec[i - j] * field[j] for 1 <= i < min(ticks, elec + bins).
// The sum stops once i - j reaches 0; tick 0 is never filled.
fn causal_convolution(
    electronics: &[f64],
    field: &[f64],
    field_bins: usize,
    tick_count: usize,
) -> Vec<f64> {
    let mut out = vec![0.0; tick_count];
    let field = &field[..field_bins.min(field.len())];
    let end = tick_count.min(electronics.len() + field.len());

    for (i, value) in out.iter_mut().enumerate().take(end).skip(1) {
        *value = field
            .iter()
            .enumerate()
            .take(i)
            .filter_map(|(j, f)| electronics.get(i - j).map(|e| e * f))
            .sum();
    }

    out
}

// Rotate `shape` so that its circular cross-correlation with a kernel of ones
// at indices 0 and n - 1 peaks at lag 0. The first maximum wins.
fn align_to_delta(shape: &mut [f64]) {
    let n = shape.len();
    if n < 2 {
        return;
    }
    let correlation = |k: usize| shape[k] + shape[(k + n - 1) % n];

    let mut lag = 0;
    let mut best = correlation(0);
    for k in 1..n {
        let c = correlation(k);
        if c > best {
            best = c;
            lag = k;
        }
    }

    shape.rotate_left(lag);
}
