use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Lossless encoding applied to the ADC samples of a channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Compression {
    /// Samples are stored as is.
    #[default]
    None,
    /// Samples are stored as `(run length, value)` pairs.
    RunLength,
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compression::None => write!(f, "none"),
            Compression::RunLength => write!(f, "run_length"),
        }
    }
}

/// The error type returned when parsing a [`Compression`] fails.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownCompression(pub String);

impl fmt::Display for UnknownCompression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown compression scheme `{}`", self.0)
    }
}

impl std::error::Error for UnknownCompression {}

impl FromStr for Compression {
    type Err = UnknownCompression;

    /// Parse a compression scheme. `Huffman` is accepted as an alias of the
    /// run-length scheme.
    ///
    /// # Examples
    ///
    /// ```
    /// use simwire::compress::Compression;
    ///
    /// assert_eq!("none".parse(), Ok(Compression::None));
    /// assert_eq!("Huffman".parse(), Ok(Compression::RunLength));
    /// assert!("zstd".parse::<Compression>().is_err());
    /// ```
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Compression::None),
            "run_length" | "runlength" | "run-length" | "huffman" => Ok(Compression::RunLength),
            _ => Err(UnknownCompression(s.to_string())),
        }
    }
}

/// Encode `samples` with the given scheme.
///
/// # Examples
///
/// ```
/// use simwire::compress::{compress, decompress, Compression};
///
/// let adc = vec![3, 3, 3, -1, 0, 0];
/// let packed = compress(&adc, Compression::RunLength);
/// assert_eq!(packed, vec![3, 3, 1, -1, 2, 0]);
/// assert_eq!(decompress(&packed, Compression::RunLength)?, adc);
/// # Ok::<(), simwire::Error>(())
/// ```
pub fn compress(samples: &[i16], scheme: Compression) -> Vec<i16> {
    match scheme {
        Compression::None => samples.to_vec(),
        Compression::RunLength => run_length_encode(samples),
    }
}

/// Undo [`compress`].
pub fn decompress(data: &[i16], scheme: Compression) -> Result<Vec<i16>> {
    match scheme {
        Compression::None => Ok(data.to_vec()),
        Compression::RunLength => run_length_decode(data),
    }
}

// Runs longer than i16::MAX are split over several pairs.
fn run_length_encode(samples: &[i16]) -> Vec<i16> {
    let mut encoded = Vec::new();
    let mut iter = samples.iter().copied().peekable();

    while let Some(value) = iter.next() {
        let mut run: i16 = 1;
        while run < i16::MAX && iter.next_if_eq(&value).is_some() {
            run += 1;
        }
        encoded.push(run);
        encoded.push(value);
    }

    encoded
}

fn run_length_decode(data: &[i16]) -> Result<Vec<i16>> {
    if data.len() % 2 != 0 {
        return Err(Error::CorruptStream("odd number of words"));
    }

    let mut decoded = Vec::new();
    for pair in data.chunks_exact(2) {
        let (run, value) = (pair[0], pair[1]);
        if run <= 0 {
            return Err(Error::CorruptStream("non-positive run length"));
        }
        decoded.extend(std::iter::repeat(value).take(usize::from(run.unsigned_abs())));
    }

    Ok(decoded)
}
