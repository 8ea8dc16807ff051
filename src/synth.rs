use crate::compress::{compress, decompress, Compression};
use crate::error::{Error, Result};
use crate::fft::TransformEngine;
use crate::geometry::PlaneClass;
use crate::noise::NoiseBank;
use crate::random::UniformSource;
use crate::response::TransferSpectrum;
use bon::bon;
use log::trace;
use std::sync::Arc;

/// Digitized readout of a single channel for one event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawWaveform {
    channel: usize,
    samples: usize,
    adc: Vec<i16>,
    compression: Compression,
}

impl RawWaveform {
    pub fn channel(&self) -> usize {
        self.channel
    }

    /// Number of ADC samples before compression.
    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Stored words, encoded with [`compression`](Self::compression).
    pub fn adc(&self) -> &[i16] {
        &self.adc
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Recover the ADC samples.
    pub fn decompressed(&self) -> Result<Vec<i16>> {
        let adc = decompress(&self.adc, self.compression)?;
        if adc.len() != self.samples {
            return Err(Error::CorruptStream("sample count mismatch"));
        }
        Ok(adc)
    }
}

/// Turns the charge deposited on a channel into its digitized readout.
///
/// The transfer spectra and the noise bank are shared; every clone owns its
/// own [`TransformEngine`] so clones can run on different threads.
#[derive(Clone, Debug)]
pub struct SignalSynthesizer {
    collection: Arc<TransferSpectrum>,
    induction: Arc<TransferSpectrum>,
    noise: Arc<NoiseBank>,
    engine: TransformEngine,
    readout_samples: usize,
    compression: Compression,
}

#[bon]
impl SignalSynthesizer {
    #[builder]
    pub fn new(
        collection: TransferSpectrum,
        induction: TransferSpectrum,
        noise: Arc<NoiseBank>,
        engine: TransformEngine,
        readout_samples: usize,
        #[builder(default)] compression: Compression,
    ) -> Result<Self> {
        for (plane, spectrum) in [
            (PlaneClass::Collection, &collection),
            (PlaneClass::Induction, &induction),
        ] {
            if spectrum.bins().len() != engine.spectrum_len() {
                return Err(Error::InvalidConfig(format!(
                    "{plane} transfer spectrum has {} bins, expected {}",
                    spectrum.bins().len(),
                    engine.spectrum_len()
                )));
            }
        }

        Ok(Self {
            collection: Arc::new(collection),
            induction: Arc::new(induction),
            noise,
            engine,
            readout_samples,
            compression,
        })
    }
}

impl SignalSynthesizer {
    pub fn spectrum(&self, plane: PlaneClass) -> &TransferSpectrum {
        match plane {
            PlaneClass::Collection => &self.collection,
            PlaneClass::Induction => &self.induction,
        }
    }

    /// Length of the charge window, in ticks.
    pub fn tick_count(&self) -> usize {
        self.engine.size()
    }

    pub fn noise_bank(&self) -> &NoiseBank {
        &self.noise
    }

    pub fn readout_samples(&self) -> usize {
        self.readout_samples
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Synthesize one channel, drawing its noise slot from `rng`.
    pub fn synthesize<R>(
        &mut self,
        channel: usize,
        plane: PlaneClass,
        charge: Option<&[f64]>,
        rng: &mut R,
    ) -> Result<RawWaveform>
    where
        R: UniformSource + ?Sized,
    {
        let draw = rng.uniform();
        self.synthesize_with_draw(channel, plane, charge, draw)
    }

    /// Synthesize one channel with an already drawn uniform value used to
    /// pick the noise slot.
    ///
    /// The whole waveform gets the same noise slot. Missing charge means no
    /// signal, and an empty noise bank means no noise.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use simwire::fft::TransformEngine;
    /// use simwire::geometry::PlaneClass;
    /// use simwire::noise::NoiseBank;
    /// use simwire::response::TransferSpectrum;
    /// use simwire::synth::SignalSynthesizer;
    ///
    /// let mut engine = TransformEngine::new(8)?;
    /// let identity = TransferSpectrum::from_response(&mut engine, &[1.0])?;
    /// let mut synth = SignalSynthesizer::builder()
    ///     .collection(identity.clone())
    ///     .induction(identity)
    ///     .noise(Arc::new(NoiseBank::default()))
    ///     .engine(engine)
    ///     .readout_samples(8)
    ///     .build()?;
    ///
    /// let charge = [0.0, 0.0, 5.0, 5.0, 0.0, 0.0, 0.0, 0.0];
    /// let raw = synth.synthesize_with_draw(0, PlaneClass::Collection, Some(&charge), 0.3)?;
    /// assert_eq!(raw.adc(), &[0, 0, 5, 5, 0, 0, 0, 0]);
    /// # Ok::<(), simwire::Error>(())
    /// ```
    pub fn synthesize_with_draw(
        &mut self,
        channel: usize,
        plane: PlaneClass,
        charge: Option<&[f64]>,
        draw: f64,
    ) -> Result<RawWaveform> {
        let tick_count = self.engine.size();

        let signal = match charge {
            Some(charge) if charge.len() > tick_count => {
                return Err(Error::ChargeTooLong {
                    len: charge.len(),
                    tick_count,
                });
            }
            Some(charge) => {
                let kernel = match plane {
                    PlaneClass::Collection => &self.collection,
                    PlaneClass::Induction => &self.induction,
                };
                self.engine.convolve(charge, kernel.bins())?
            }
            None => vec![0.0; tick_count],
        };

        let slot = self.noise.select(draw);
        trace!("channel {channel}: noise slot {slot:?}");
        let noise = slot.and_then(|i| self.noise.slot(i)).unwrap_or(&[]);

        let mut adc: Vec<i16> = signal
            .iter()
            .enumerate()
            .map(|(i, s)| quantize(s + noise.get(i).copied().unwrap_or(0.0)))
            .collect();
        adc.resize(self.readout_samples, 0);

        Ok(RawWaveform {
            channel,
            samples: adc.len(),
            adc: compress(&adc, self.compression),
            compression: self.compression,
        })
    }
}

// Round half to even, saturating at the i16 range. NaN maps to 0.
fn quantize(value: f64) -> i16 {
    let value = value
        .round_ties_even()
        .clamp(f64::from(i16::MIN), f64::from(i16::MAX));
    num_traits::cast(value).unwrap_or(0)
}
