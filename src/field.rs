use crate::error::{Error, Result};
use crate::geometry::PlaneClass;
use uom::si::f64::{Length, Time, Velocity};
use uom::si::ratio::ratio;

/// Per-plane parameters of the field response.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaneResponse {
    /// Correction for the 3-D path of the electrons through the wire plane.
    pub path_correction: f64,
    /// Total amplitude of the response (area of the collection ramp, area of
    /// each induction lobe).
    pub amplitude: f64,
}

/// Response of a wire to the field of the drifting charge, one tick per
/// sample.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldResponse {
    plane: PlaneClass,
    samples: Vec<f64>,
    support: usize,
}

impl FieldResponse {
    /// Build the response of the given plane class.
    ///
    /// The signal lasts for as many ticks as the electrons need to cross one
    /// plane pitch (scaled by the path correction). The collection response
    /// is a linear ramp whose sum is `amplitude`. The induction response is a
    /// positive lobe followed by a negative lobe of the same length and
    /// height, so its sum is zero.
    ///
    /// The returned waveform is `tick_count` samples long; the response must
    /// fit in the first `field_bins` of them.
    ///
    /// # Examples
    ///
    /// ```
    /// use simwire::field::{FieldResponse, PlaneResponse};
    /// use simwire::geometry::PlaneClass;
    /// use uom::si::f64::{Length, Time, Velocity};
    /// use uom::si::{length::centimeter, time::nanosecond, velocity::meter_per_second};
    ///
    /// let response = FieldResponse::new(
    ///     PlaneClass::Induction,
    ///     PlaneResponse { path_correction: 1.0, amplitude: 1.0 },
    ///     Length::new::<centimeter>(0.4),
    ///     Velocity::new::<meter_per_second>(1600.0),
    ///     Time::new::<nanosecond>(500.0),
    ///     75,
    ///     256,
    /// )?;
    /// assert_eq!(response.support(), 10);
    /// assert!(response.samples().iter().sum::<f64>().abs() < 1e-12);
    /// # Ok::<(), simwire::Error>(())
    /// ```
    pub fn new(
        plane: PlaneClass,
        params: PlaneResponse,
        pitch: Length,
        drift_velocity: Velocity,
        sample_period: Time,
        field_bins: usize,
        tick_count: usize,
    ) -> Result<Self> {
        if field_bins == 0 || field_bins > tick_count {
            return Err(Error::InvalidConfig(format!(
                "field bin count must be in 1..={tick_count}, got {field_bins}"
            )));
        }

        let ticks = (pitch.abs() * params.path_correction / (drift_velocity * sample_period))
            .get::<ratio>()
            .round();
        let nbins: usize = num_traits::cast(ticks).ok_or_else(|| {
            Error::InvalidConfig(format!(
                "{plane} field response spans an invalid number of ticks ({ticks})"
            ))
        })?;

        let support = match plane {
            PlaneClass::Collection => Some(nbins),
            PlaneClass::Induction => nbins.checked_mul(2),
        };
        let support = support.unwrap_or(usize::MAX);
        if support > field_bins {
            return Err(Error::FieldSupportTooLong {
                plane,
                support,
                field_bins,
            });
        }

        let mut samples = vec![0.0; tick_count];
        match plane {
            PlaneClass::Collection => collection_ramp(&mut samples[..nbins], params.amplitude),
            PlaneClass::Induction => induction_lobes(&mut samples[..support], params.amplitude),
        }

        Ok(Self {
            plane,
            samples,
            support,
        })
    }

    pub fn plane(&self) -> PlaneClass {
        self.plane
    }

    /// All `tick_count` samples, zero past [`support`](Self::support).
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Number of leading ticks that can be non-zero.
    pub fn support(&self) -> usize {
        self.support
    }
}

// The ramp starts at zero, so fewer than two bins have no area to normalize
// and stay zero.
fn collection_ramp(bins: &mut [f64], amplitude: f64) {
    for (i, bin) in bins.iter_mut().enumerate() {
        *bin = i as f64;
    }
    let integral: f64 = bins.iter().sum();
    if integral == 0.0 {
        return;
    }
    for bin in bins {
        *bin *= amplitude / integral;
    }
}

fn induction_lobes(bins: &mut [f64], amplitude: f64) {
    let half = bins.len() / 2;
    if half == 0 {
        return;
    }
    let height = amplitude / half as f64;
    let (positive, negative) = bins.split_at_mut(half);
    positive.fill(height);
    negative.fill(-height);
}
