use bon::Builder;
use std::fmt;
use uom::si::f64::{Length, Time, Velocity};

/// Response class of a readout channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlaneClass {
    /// Wires that collect the drifting electrons (unipolar signal).
    Collection,
    /// Wires the electrons drift past (bipolar signal).
    Induction,
}

impl fmt::Display for PlaneClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaneClass::Collection => write!(f, "collection"),
            PlaneClass::Induction => write!(f, "induction"),
        }
    }
}

/// Detector geometry as seen by the signal simulation.
///
/// Implementations are provided by the caller; the simulation only ever reads
/// from them.
pub trait Geometry {
    /// Total number of readout channels. Channels are numbered
    /// `0..channel_count()`.
    fn channel_count(&self) -> usize;
    /// Response class of the given channel. Only called with
    /// `channel < channel_count()`.
    fn plane_class(&self, channel: usize) -> PlaneClass;
    /// Distance between two adjacent wire planes. All planes are assumed to be
    /// equidistant.
    fn plane_pitch(&self) -> Length;
}

/// Clock and drift properties of the detector.
#[derive(Clone, Copy, Debug, Builder)]
pub struct DetectorProperties {
    /// Period of one tick.
    pub sample_period: Time,
    /// Electron drift velocity in the active volume.
    pub drift_velocity: Velocity,
    /// Number of ticks used for all the transform work. Must be a power of
    /// two.
    pub tick_count: usize,
    /// Number of ADC samples in one readout frame.
    pub readout_samples: usize,
}
