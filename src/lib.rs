use crate::config::Config;
use crate::electronics::ElectronicsResponse;
use crate::fft::TransformEngine;
use crate::field::FieldResponse;
use crate::geometry::{DetectorProperties, Geometry, PlaneClass};
use crate::noise::NoiseBank;
use crate::random::UniformSource;
use crate::response::ResponseConvolver;
use crate::synth::{RawWaveform, SignalSynthesizer};
use bon::bon;
use log::{debug, info, warn};
use std::sync::Arc;

pub use crate::error::{Error, Result};

/// Lossless encodings of the ADC samples.
pub mod compress;
/// Simulation parameters and their text format.
pub mod config;
/// Shaping response of the readout electronics.
pub mod electronics;
mod error;
/// Real-valued spectral transforms.
pub mod fft;
/// Field response of the sensing wires.
pub mod field;
/// Detector description provided by the caller.
pub mod geometry;
/// Pre-generated coherent noise.
pub mod noise;
/// Injectable source of uniform random numbers.
pub mod random;
/// Combined field and electronics response.
pub mod response;
/// Per-channel signal synthesis.
pub mod synth;

/// A trait that defines the interface for an observer of the simulation.
///
/// The default implementation of all methods is a no-op. Users are expected to
/// override the methods they are interested in.
#[allow(unused_variables)]
pub trait Observer {
    /// Called once per plane class when the field responses are built.
    fn on_field_response(&mut self, response: &FieldResponse) {}
    /// Called once with the trimmed electronics response.
    fn on_electronics_response(&mut self, response: &ElectronicsResponse) {}
    /// Called once per plane class with the aligned convolution of the field
    /// and electronics responses.
    fn on_time_shape(&mut self, plane: PlaneClass, shape: &[f64]) {}
    /// Called for every waveform of the noise bank, in slot order.
    fn on_noise_waveform(&mut self, slot: usize, waveform: &[f64]) {}
    /// Called for every waveform emitted by
    /// [`process_event`](SimWire::process_event).
    fn on_raw_waveform(&mut self, waveform: &RawWaveform) {}
}

impl Observer for () {}

/// Wire signal simulation: all responses and the noise bank are built once,
/// then every event is turned into one [`RawWaveform`] per channel.
pub struct SimWire<G, R, O> {
    geometry: G,
    rng: R,
    observer: O,
    synthesizer: SignalSynthesizer,
    drift_charge_label: String,
}

#[bon]
impl<G, R, O> SimWire<G, R, O>
where
    G: Geometry,
    R: UniformSource,
    O: Observer,
{
    /// Build the responses and the noise bank.
    ///
    /// The noise bank consumes random numbers from `rng`, so the whole
    /// simulation is reproducible from the state of `rng` at this point.
    #[builder]
    pub fn new(
        #[builder(default)] config: Config,
        geometry: G,
        detector: DetectorProperties,
        rng: R,
        observer: O,
    ) -> Result<Self> {
        let mut rng = rng;
        let mut observer = observer;

        config.validate()?;
        warn!(
            "the wire response is a simplified example model; detectors should provide \
             their own simulation of the electronics response"
        );

        let mut engine = TransformEngine::new(detector.tick_count)?;
        let pitch = geometry.plane_pitch();
        let field_response = |plane, params| {
            FieldResponse::new(
                plane,
                params,
                pitch,
                detector.drift_velocity,
                detector.sample_period,
                config.field_bins,
                detector.tick_count,
            )
        };
        let collection = field_response(PlaneClass::Collection, config.collection)?;
        let induction = field_response(PlaneClass::Induction, config.induction)?;
        info!(
            "field responses span {} collection and {} induction ticks",
            collection.support(),
            induction.support()
        );
        observer.on_field_response(&collection);
        observer.on_field_response(&induction);

        let electronics =
            ElectronicsResponse::new(config.shaping, detector.sample_period, detector.tick_count)?;
        info!(
            "electronics response retains {} of {} ticks",
            electronics.len(),
            detector.tick_count
        );
        observer.on_electronics_response(&electronics);

        let convolver = ResponseConvolver::new(
            &mut engine,
            &collection,
            &induction,
            &electronics,
            config.field_bins,
        )?;
        for plane in [PlaneClass::Collection, PlaneClass::Induction] {
            observer.on_time_shape(plane, convolver.time_shape(plane));
        }

        let noise = NoiseBank::generate(
            &config.noise_spectrum(),
            detector.sample_period,
            config.noise_slots,
            &mut engine,
            &mut rng,
        )?;
        for (slot, waveform) in noise.iter().enumerate() {
            observer.on_noise_waveform(slot, waveform);
        }
        match noise.stats() {
            Some(stats) => info!(
                "noise bank of {} slots: mean {:.3}, rms {:.3}",
                noise.len(),
                stats.mean,
                stats.rms
            ),
            None => warn!("noise bank is empty, waveforms will carry no noise"),
        }

        let (collection, induction) = convolver.into_spectra();
        let synthesizer = SignalSynthesizer::builder()
            .collection(collection)
            .induction(induction)
            .noise(Arc::new(noise))
            .engine(engine)
            .readout_samples(detector.readout_samples)
            .compression(config.compression)
            .build()?;

        info!(
            "reading drifted charge from `{}`, {} channels, {} samples per channel",
            config.drift_charge_label,
            geometry.channel_count(),
            detector.readout_samples
        );

        Ok(Self {
            geometry,
            rng,
            observer,
            synthesizer,
            drift_charge_label: config.drift_charge_label,
        })
    }
}

impl<G, R, O> SimWire<G, R, O>
where
    G: Geometry,
    R: UniformSource,
    O: Observer,
{
    /// Synthesize the readout of every channel for one event.
    ///
    /// `charges` lists the charge series of the channels that saw any charge;
    /// all other channels only get noise. If a channel is listed more than
    /// once, the last series is used. The returned waveforms are in ascending
    /// channel order.
    ///
    /// One uniform draw per channel is taken from the random source, in
    /// channel order, whether the channel saw charge or not. An invalid
    /// event is rejected before any draw is taken or any waveform is
    /// reported to the observer.
    pub fn process_event<'a, I>(&mut self, charges: I) -> Result<Vec<RawWaveform>>
    where
        I: IntoIterator<Item = (usize, &'a [f64])>,
    {
        let channel_count = self.geometry.channel_count();
        let tick_count = self.synthesizer.tick_count();
        let mut table: Vec<Option<&'a [f64]>> = vec![None; channel_count];
        for (channel, charge) in charges {
            let entry = table.get_mut(channel).ok_or(Error::ChannelOutOfRange {
                channel,
                channel_count,
            })?;
            if charge.len() > tick_count {
                return Err(Error::ChargeTooLong {
                    len: charge.len(),
                    tick_count,
                });
            }
            *entry = Some(charge);
        }
        debug!(
            "event with charge on {} of {} channels",
            table.iter().filter(|c| c.is_some()).count(),
            channel_count
        );

        let mut draws = vec![0.0; channel_count];
        self.rng.fill_uniform(&mut draws);

        let mut waveforms = Vec::with_capacity(channel_count);
        for (channel, (charge, draw)) in table.into_iter().zip(draws).enumerate() {
            let plane = self.geometry.plane_class(channel);
            let waveform = self
                .synthesizer
                .synthesize_with_draw(channel, plane, charge, draw)?;
            self.observer.on_raw_waveform(&waveform);
            waveforms.push(waveform);
        }

        Ok(waveforms)
    }

    pub fn geometry(&self) -> &G {
        &self.geometry
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn into_observer(self) -> O {
        self.observer
    }

    pub fn synthesizer(&self) -> &SignalSynthesizer {
        &self.synthesizer
    }

    pub fn noise_bank(&self) -> &NoiseBank {
        self.synthesizer.noise_bank()
    }

    pub fn drift_charge_label(&self) -> &str {
        &self.drift_charge_label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::Compression;
    use crate::electronics::ShapingTimes;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use uom::si::f64::{Length, Time, Velocity};
    use uom::si::length::centimeter;
    use uom::si::time::nanosecond;
    use uom::si::velocity::meter_per_second;

    // Two induction planes and one collection plane, interleaved.
    struct TestGeometry {
        channels: usize,
    }

    impl Geometry for TestGeometry {
        fn channel_count(&self) -> usize {
            self.channels
        }

        fn plane_class(&self, channel: usize) -> PlaneClass {
            match channel % 3 {
                2 => PlaneClass::Collection,
                _ => PlaneClass::Induction,
            }
        }

        fn plane_pitch(&self) -> Length {
            Length::new::<centimeter>(0.3)
        }
    }

    #[derive(Default)]
    struct TestObserver {
        field_responses: Vec<PlaneClass>,
        electronics_responses: usize,
        time_shapes: Vec<PlaneClass>,
        noise_slots: Vec<usize>,
        raw_channels: Vec<usize>,
    }

    impl Observer for TestObserver {
        fn on_field_response(&mut self, response: &FieldResponse) {
            self.field_responses.push(response.plane());
        }

        fn on_electronics_response(&mut self, _: &ElectronicsResponse) {
            self.electronics_responses += 1;
        }

        fn on_time_shape(&mut self, plane: PlaneClass, _: &[f64]) {
            self.time_shapes.push(plane);
        }

        fn on_noise_waveform(&mut self, slot: usize, _: &[f64]) {
            self.noise_slots.push(slot);
        }

        fn on_raw_waveform(&mut self, waveform: &RawWaveform) {
            self.raw_channels.push(waveform.channel());
        }
    }

    fn detector(tick_count: usize, readout_samples: usize) -> DetectorProperties {
        DetectorProperties::builder()
            .sample_period(Time::new::<nanosecond>(500.0))
            .drift_velocity(Velocity::new::<meter_per_second>(1600.0))
            .tick_count(tick_count)
            .readout_samples(readout_samples)
            .build()
    }

    fn sim<O: Observer>(
        config: Config,
        seed: u64,
        observer: O,
    ) -> Result<SimWire<TestGeometry, StdRng, O>> {
        SimWire::builder()
            .config(config)
            .geometry(TestGeometry { channels: 6 })
            .detector(detector(1024, 1000))
            .rng(StdRng::seed_from_u64(seed))
            .observer(observer)
            .build()
    }

    const NO_CHARGE: [(usize, &[f64]); 0] = [];

    fn quiet() -> Config {
        Config {
            noise_factor: 0.0,
            noise_slots: 4,
            ..Config::default()
        }
    }

    #[test]
    fn sim_wire_emits_every_channel_in_order() {
        let mut sim = sim(Config::default(), 0, ()).unwrap();
        let deposit = vec![1.0; 10];

        let waveforms = sim
            .process_event([(4, deposit.as_slice()), (1, deposit.as_slice())])
            .unwrap();

        assert_eq!(
            waveforms.iter().map(RawWaveform::channel).collect::<Vec<_>>(),
            vec![0, 1, 2, 3, 4, 5]
        );
        for waveform in &waveforms {
            assert_eq!(waveform.samples(), 1000);
            assert_eq!(waveform.adc().len(), 1000);
            assert_eq!(waveform.compression(), Compression::None);
        }
    }

    #[test]
    fn sim_wire_collection_signal() {
        let mut sim = sim(quiet(), 0, ()).unwrap();
        let mut charge = vec![0.0; 1024];
        charge[100] = 1.0;

        let waveforms = sim.process_event([(2, charge.as_slice())]).unwrap();

        let signal = waveforms[2].adc();
        assert!(signal.iter().copied().max().unwrap() > 10);
        assert!(signal.iter().all(|&x| x >= -1));
        for channel in [0, 1, 3, 4, 5] {
            assert!(waveforms[channel].adc().iter().all(|&x| x == 0));
        }
    }

    #[test]
    fn sim_wire_induction_signal_is_bipolar() {
        let mut sim = sim(quiet(), 0, ()).unwrap();
        let mut charge = vec![0.0; 1024];
        charge[100] = 1.0;

        let waveforms = sim.process_event([(0, charge.as_slice())]).unwrap();

        let signal = waveforms[0].adc();
        assert!(signal.iter().copied().max().unwrap() > 5);
        assert!(signal.iter().copied().min().unwrap() < -5);
    }

    #[test]
    fn sim_wire_deterministic() {
        let charge: Vec<f64> = (0..200).map(|i| f64::from(i % 7)).collect();
        let config = Config {
            noise_factor: 1.0,
            ..Config::default()
        };
        let run = |seed| {
            let mut sim = sim(config.clone(), seed, ()).unwrap();
            (0..3)
                .map(|_| sim.process_event([(2, charge.as_slice())]).unwrap())
                .collect::<Vec<_>>()
        };

        assert_eq!(run(11), run(11));
        assert_ne!(run(11), run(12));
    }

    #[test]
    fn sim_wire_observer() {
        let config = Config {
            noise_slots: 5,
            ..Config::default()
        };
        let mut sim = sim(config, 0, TestObserver::default()).unwrap();
        sim.process_event(NO_CHARGE).unwrap();
        let observer = sim.into_observer();

        assert_eq!(
            observer.field_responses,
            vec![PlaneClass::Collection, PlaneClass::Induction]
        );
        assert_eq!(observer.electronics_responses, 1);
        assert_eq!(
            observer.time_shapes,
            vec![PlaneClass::Collection, PlaneClass::Induction]
        );
        assert_eq!(observer.noise_slots, vec![0, 1, 2, 3, 4]);
        assert_eq!(observer.raw_channels, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn sim_wire_noise_bank() {
        let sim = sim(Config::default(), 0, ()).unwrap();
        assert_eq!(sim.noise_bank().len(), 100);
        assert!(sim.noise_bank().stats().unwrap().rms > 0.0);
        assert_eq!(sim.drift_charge_label(), "largeant");
    }

    #[test]
    fn sim_wire_empty_noise_bank() {
        let config = Config {
            noise_slots: 0,
            ..Config::default()
        };
        let mut sim = sim(config, 0, ()).unwrap();
        let waveforms = sim.process_event(NO_CHARGE).unwrap();
        assert!(waveforms.iter().all(|w| w.adc().iter().all(|&x| x == 0)));
    }

    #[test]
    fn sim_wire_run_length_output() {
        let config = Config {
            compression: Compression::RunLength,
            ..quiet()
        };
        let mut sim = sim(config, 0, ()).unwrap();
        let waveforms = sim.process_event(NO_CHARGE).unwrap();
        for waveform in waveforms {
            assert_eq!(waveform.compression(), Compression::RunLength);
            assert_eq!(waveform.adc(), &[1000, 0]);
            assert_eq!(waveform.decompressed().unwrap(), vec![0; 1000]);
        }
    }

    #[test]
    fn sim_wire_channel_out_of_range() {
        let mut sim = sim(Config::default(), 0, ()).unwrap();
        let err = sim.process_event([(6, [1.0].as_slice())]).unwrap_err();
        assert!(matches!(
            err,
            Error::ChannelOutOfRange {
                channel: 6,
                channel_count: 6
            }
        ));
        assert!(err.is_precondition());
    }

    #[test]
    fn sim_wire_charge_too_long() {
        let mut sim = sim(Config::default(), 0, ()).unwrap();
        let charge = vec![0.0; 1025];
        let err = sim.process_event([(0, charge.as_slice())]).unwrap_err();
        assert!(err.is_precondition());
    }

    #[test]
    fn sim_wire_rejects_bad_event_before_side_effects() {
        let config = Config {
            noise_factor: 1.0,
            ..Config::default()
        };
        let short = vec![1.0; 10];
        let long = vec![0.0; 1025];

        let mut sim_a = sim(config.clone(), 3, TestObserver::default()).unwrap();
        let err = sim_a
            .process_event([(0, short.as_slice()), (5, long.as_slice())])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ChargeTooLong {
                len: 1025,
                tick_count: 1024
            }
        ));
        assert!(sim_a.observer().raw_channels.is_empty());

        // The failed event consumed no random draws.
        let mut sim_b = sim(config, 3, ()).unwrap();
        assert_eq!(
            sim_a.process_event([(0, short.as_slice())]).unwrap(),
            sim_b.process_event([(0, short.as_slice())]).unwrap()
        );
    }

    #[test]
    fn sim_wire_configuration_errors() {
        let err = SimWire::builder()
            .geometry(TestGeometry { channels: 6 })
            .detector(detector(1000, 1000))
            .rng(StdRng::seed_from_u64(0))
            .observer(())
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, Error::UnsupportedTransformLength(1000)));

        let config = Config {
            shaping: ShapingTimes {
                fast: Time::new::<nanosecond>(900.0),
                slow: Time::new::<nanosecond>(3000.0),
            },
            ..Config::default()
        };
        let err = sim(config, 0, ()).err().unwrap();
        assert!(matches!(err, Error::InvalidShaping { .. }));

        let config = Config {
            field_bins: 10,
            ..Config::default()
        };
        let err = sim(config, 0, ()).err().unwrap();
        assert!(matches!(err, Error::FieldSupportTooLong { .. }));
        assert!(err.is_config());
    }
}
