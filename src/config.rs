use crate::compress::Compression;
use crate::electronics::ShapingTimes;
use crate::error::Error;
use crate::field::PlaneResponse;
use crate::noise::{NoiseSpectrum, DEFAULT_CUTOFF_STEEPNESS, DEFAULT_JITTER, DEFAULT_SLOTS};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use uom::si::f64::{Frequency, Time};
use uom::si::frequency::kilohertz;
use uom::si::time::nanosecond;
use winnow::ascii::{line_ending, space0, till_line_ending};
use winnow::combinator::{alt, delimited, opt, separated};
use winnow::error::ContextError;
use winnow::stream::Offset;
use winnow::token::{take_till, take_while};
use winnow::Parser;

/// Tunable parameters of the signal simulation.
///
/// The defaults describe a MicroBooNE-like detector.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Name of the producer of the drifted charge. Only reported, the charge
    /// itself is handed to [`SimWire::process_event`](crate::SimWire::process_event).
    pub drift_charge_label: String,
    pub compression: Compression,
    /// Overall scale of the noise spectrum.
    pub noise_factor: f64,
    /// Scale of the exponential fall-off of the noise spectrum.
    pub noise_width: Frequency,
    /// Noise below this frequency is suppressed.
    pub low_cutoff: Frequency,
    /// Number of leading ticks of the field responses used in the
    /// convolution with the electronics response.
    pub field_bins: usize,
    pub collection: PlaneResponse,
    pub induction: PlaneResponse,
    pub shaping: ShapingTimes,
    /// Number of pre-generated noise waveforms.
    pub noise_slots: usize,
    pub cutoff_steepness: f64,
    pub noise_jitter: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            drift_charge_label: String::from("largeant"),
            compression: Compression::None,
            noise_factor: 0.0132,
            noise_width: Frequency::new::<kilohertz>(62.4),
            low_cutoff: Frequency::new::<kilohertz>(7.5),
            field_bins: 75,
            collection: PlaneResponse {
                path_correction: 2.5,
                amplitude: 0.0354,
            },
            induction: PlaneResponse {
                path_correction: 1.5,
                amplitude: 0.018,
            },
            shaping: ShapingTimes {
                fast: Time::new::<nanosecond>(3000.0),
                slow: Time::new::<nanosecond>(900.0),
            },
            noise_slots: DEFAULT_SLOTS,
            cutoff_steepness: DEFAULT_CUTOFF_STEEPNESS,
            noise_jitter: DEFAULT_JITTER,
        }
    }
}

impl Config {
    /// Check the parameters that don't depend on the detector.
    ///
    /// Shaping constants and the noise spectrum are checked again when the
    /// responses are built.
    pub fn validate(&self) -> crate::Result<()> {
        if self.field_bins == 0 {
            return Err(Error::InvalidConfig(
                "field bin count must be positive".into(),
            ));
        }
        for (name, plane) in [("collection", self.collection), ("induction", self.induction)] {
            if !(plane.path_correction.is_finite() && plane.path_correction >= 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "{name} 3-D correction must be finite and non-negative, got {}",
                    plane.path_correction
                )));
            }
            if !plane.amplitude.is_finite() {
                return Err(Error::InvalidConfig(format!(
                    "{name} amplitude must be finite, got {}",
                    plane.amplitude
                )));
            }
        }
        Ok(())
    }

    pub fn noise_spectrum(&self) -> NoiseSpectrum {
        NoiseSpectrum {
            factor: self.noise_factor,
            width: self.noise_width,
            low_cutoff: self.low_cutoff,
            cutoff_steepness: self.cutoff_steepness,
            jitter: self.noise_jitter,
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "drift_charge_label: \"{}\"", self.drift_charge_label)?;
        writeln!(f, "compression: {}", self.compression)?;
        writeln!(f, "noise_factor: {}", self.noise_factor)?;
        writeln!(f, "noise_width: {} # kHz", self.noise_width.get::<kilohertz>())?;
        writeln!(f, "low_cutoff: {} # kHz", self.low_cutoff.get::<kilohertz>())?;
        writeln!(f, "field_bins: {}", self.field_bins)?;
        writeln!(f, "collection_3d_correction: {}", self.collection.path_correction)?;
        writeln!(f, "induction_3d_correction: {}", self.induction.path_correction)?;
        writeln!(f, "collection_amplitude: {}", self.collection.amplitude)?;
        writeln!(f, "induction_amplitude: {}", self.induction.amplitude)?;
        writeln!(
            f,
            "shaping_time_constants: [{}, {}] # ns",
            self.shaping.fast.get::<nanosecond>(),
            self.shaping.slow.get::<nanosecond>()
        )?;
        writeln!(f, "noise_slots: {}", self.noise_slots)?;
        writeln!(f, "cutoff_steepness: {}", self.cutoff_steepness)?;
        write!(f, "noise_jitter: {}", self.noise_jitter)
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Value<'s> {
    Text(&'s str),
    List(Vec<&'s str>),
    Scalar(&'s str),
}

#[derive(Clone, Debug)]
struct Entry<'s> {
    key: &'s str,
    value: Value<'s>,
    // Value as written, for error reporting.
    raw: &'s str,
}

fn key<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_').parse_next(input)
}

fn quoted<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    delimited('"', take_till(0.., ['"', '\n', '\r']), '"').parse_next(input)
}

fn list_item<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    take_while(1.., |c: char| !matches!(c, ',' | ']' | '#' | '\n' | '\r'))
        .map(str::trim_end)
        .parse_next(input)
}

fn list<'s>(input: &mut &'s str) -> winnow::Result<Vec<&'s str>> {
    delimited(
        ('[', space0),
        separated(0.., list_item, (space0, ',', space0)),
        (space0, ']'),
    )
    .parse_next(input)
}

fn scalar<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    take_till(1.., ['#', '\n', '\r'])
        .map(str::trim_end)
        .parse_next(input)
}

fn value<'s>(input: &mut &'s str) -> winnow::Result<Value<'s>> {
    alt((
        quoted.map(Value::Text),
        list.map(Value::List),
        scalar.map(Value::Scalar),
    ))
    .parse_next(input)
}

fn entry<'s>(input: &mut &'s str) -> winnow::Result<Entry<'s>> {
    let (key, _, _, _, (value, raw)) =
        (key, space0, ':', space0, value.with_taken()).parse_next(input)?;
    Ok(Entry { key, value, raw })
}

fn comment(input: &mut &str) -> winnow::Result<()> {
    ('#', till_line_ending).void().parse_next(input)
}

// Blank lines and comment-only lines give `None`.
fn line<'s>(input: &mut &'s str) -> winnow::Result<Option<Entry<'s>>> {
    delimited(space0, opt(entry), (space0, opt(comment))).parse_next(input)
}

fn document<'s>(input: &mut &'s str) -> winnow::Result<Vec<Entry<'s>>> {
    let lines: Vec<Option<Entry<'s>>> = separated(0.., line, line_ending).parse_next(input)?;
    Ok(lines.into_iter().flatten().collect())
}

/// The error type returned when parsing a [`Config`] fails.
#[derive(Debug)]
pub struct ParseError {
    input: String,
    span: std::ops::Range<usize>,
    title: String,
}

impl ParseError {
    fn from_parse(error: winnow::error::ParseError<&str, ContextError>) -> Self {
        let input = error.input().to_string();
        let span = error.char_span();
        Self {
            input,
            span,
            title: String::from("invalid line starting here"),
        }
    }

    // `part` must be a subslice of `input`.
    fn at(input: &str, part: &str, title: impl Into<String>) -> Self {
        let start = part.offset_from(&input);
        Self {
            input: input.to_string(),
            span: start..start + part.len(),
            title: title.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = annotate_snippets::Level::Error.title(&self.title).snippet(
            annotate_snippets::Snippet::source(&self.input)
                .fold(true)
                .annotation(annotate_snippets::Level::Error.span(self.span.clone())),
        );
        let renderer = annotate_snippets::Renderer::plain();
        let rendered = renderer.render(message);
        rendered.fmt(f)
    }
}

impl std::error::Error for ParseError {}

fn text<'s>(input: &str, entry: &Entry<'s>) -> Result<&'s str, ParseError> {
    match entry.value {
        Value::Text(s) | Value::Scalar(s) => Ok(s),
        Value::List(_) => Err(ParseError::at(
            input,
            entry.raw,
            format!("expected a single value for `{}`", entry.key),
        )),
    }
}

fn number<T: FromStr>(input: &str, entry: &Entry<'_>) -> Result<T, ParseError> {
    match entry.value {
        Value::Scalar(s) => s.parse().map_err(|_| {
            ParseError::at(input, entry.raw, format!("invalid value for `{}`", entry.key))
        }),
        _ => Err(ParseError::at(
            input,
            entry.raw,
            format!("expected a number for `{}`", entry.key),
        )),
    }
}

fn pair(input: &str, entry: &Entry<'_>) -> Result<[f64; 2], ParseError> {
    let error = || {
        ParseError::at(
            input,
            entry.raw,
            format!("expected a list of two numbers for `{}`", entry.key),
        )
    };
    let Value::List(items) = &entry.value else {
        return Err(error());
    };
    match items.as_slice() {
        [a, b] => Ok([
            a.parse().map_err(|_| error())?,
            b.parse().map_err(|_| error())?,
        ]),
        _ => Err(error()),
    }
}

impl FromStr for Config {
    type Err = ParseError;

    /// Parse a [`Config`] from `key: value` lines. Keys that are not given
    /// keep their default value.
    ///
    /// Text goes in double quotes, lists in brackets, and `#` starts a
    /// comment. Frequencies are in kHz and shaping times in ns.
    ///
    /// # Examples
    ///
    /// ```
    /// use simwire::compress::Compression;
    /// use simwire::config::Config;
    ///
    /// let config: Config = "
    /// ## Noisier than usual
    /// noise_factor: 0.05
    /// compression: Huffman
    /// shaping_time_constants: [2000, 800] # ns
    /// ".parse()?;
    ///
    /// assert_eq!(config.noise_factor, 0.05);
    /// assert_eq!(config.compression, Compression::RunLength);
    /// assert_eq!(config.field_bins, 75);
    /// # Ok::<(), simwire::config::ParseError>(())
    /// ```
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let entries = document.parse(input).map_err(ParseError::from_parse)?;

        let mut config = Config::default();
        let mut seen = HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.key) {
                return Err(ParseError::at(
                    input,
                    entry.key,
                    format!("duplicate key `{}`", entry.key),
                ));
            }

            match entry.key {
                "drift_charge_label" => {
                    config.drift_charge_label = text(input, entry)?.to_string();
                }
                "compression" => {
                    config.compression = text(input, entry)?
                        .parse()
                        .map_err(|e| ParseError::at(input, entry.raw, format!("{e}")))?;
                }
                "noise_factor" => config.noise_factor = number(input, entry)?,
                "noise_width" => {
                    config.noise_width = Frequency::new::<kilohertz>(number(input, entry)?);
                }
                "low_cutoff" => {
                    config.low_cutoff = Frequency::new::<kilohertz>(number(input, entry)?);
                }
                "field_bins" => config.field_bins = number(input, entry)?,
                "collection_3d_correction" => {
                    config.collection.path_correction = number(input, entry)?;
                }
                "induction_3d_correction" => {
                    config.induction.path_correction = number(input, entry)?;
                }
                "collection_amplitude" => config.collection.amplitude = number(input, entry)?,
                "induction_amplitude" => config.induction.amplitude = number(input, entry)?,
                "shaping_time_constants" => {
                    let [fast, slow] = pair(input, entry)?;
                    config.shaping = ShapingTimes {
                        fast: Time::new::<nanosecond>(fast),
                        slow: Time::new::<nanosecond>(slow),
                    };
                }
                "noise_slots" => config.noise_slots = number(input, entry)?,
                "cutoff_steepness" => config.cutoff_steepness = number(input, entry)?,
                "noise_jitter" => config.noise_jitter = number(input, entry)?,
                _ => {
                    return Err(ParseError::at(
                        input,
                        entry.key,
                        format!("unknown key `{}`", entry.key),
                    ));
                }
            }
        }

        Ok(config)
    }
}
