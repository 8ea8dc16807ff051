use crate::geometry::PlaneClass;
use thiserror::Error;

/// Errors raised while building or running the signal synthesis chain.
///
/// Configuration errors can only come out of [`SimWire`](crate::SimWire)
/// construction. Precondition violations come out of per-event processing
/// and indicate that an upstream collaborator broke its contract; none of
/// them are worth retrying.
#[derive(Debug, Error)]
pub enum Error {
    #[error("transform length {0} is not supported (must be a power of two, at least 2)")]
    UnsupportedTransformLength(usize),
    #[error(
        "shaping time constants (fast {fast_ns} ns, slow {slow_ns} ns) give an undefined \
         normalization; they must satisfy 0 < slow < fast"
    )]
    InvalidShaping { fast_ns: f64, slow_ns: f64 },
    #[error("{plane} field response spans {support} ticks but only {field_bins} field bins are configured")]
    FieldSupportTooLong {
        plane: PlaneClass,
        support: usize,
        field_bins: usize,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("channel {channel} is out of range ({channel_count} channels)")]
    ChannelOutOfRange { channel: usize, channel_count: usize },
    #[error("charge series of {len} ticks exceeds the {tick_count} tick window")]
    ChargeTooLong { len: usize, tick_count: usize },
    #[error("corrupt run-length stream: {0}")]
    CorruptStream(&'static str),
    #[error("spectral transform failed: {0}")]
    Transform(#[from] realfft::FftError),
}

impl Error {
    /// Returns `true` if the error was detected while setting up the chain
    /// i.e. before any event was processed.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedTransformLength(_)
                | Error::InvalidShaping { .. }
                | Error::FieldSupportTooLong { .. }
                | Error::InvalidConfig(_)
        )
    }

    /// Returns `true` if the error is a broken per-event contract.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Error::ChannelOutOfRange { .. } | Error::ChargeTooLong { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
