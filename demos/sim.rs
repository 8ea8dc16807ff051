/// This is a general example of how you would typically set up a wire signal
/// simulation.
///
/// Run with `RUST_LOG=info` to see what is built at initialization. An
/// optional argument is the path to a configuration file in the same format
/// as printed at the end of this example.
use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use simwire::config::Config;
use simwire::geometry::{DetectorProperties, Geometry, PlaneClass};
use simwire::synth::RawWaveform;
use simwire::{Observer, SimWire};
use uom::si::f64::{Length, Time, Velocity};
use uom::si::{length::centimeter, time::nanosecond, velocity::meter_per_second};

// Three planes of equal size: two induction planes, then the collection plane.
struct Planes {
    wires_per_plane: usize,
    pitch: Length,
}

impl Geometry for Planes {
    fn channel_count(&self) -> usize {
        3 * self.wires_per_plane
    }

    fn plane_class(&self, channel: usize) -> PlaneClass {
        if channel / self.wires_per_plane == 2 {
            PlaneClass::Collection
        } else {
            PlaneClass::Induction
        }
    }

    fn plane_pitch(&self) -> Length {
        self.pitch
    }
}

#[derive(Default)]
struct Summary {
    waveforms: usize,
    largest_collection: i16,
    largest_induction: i16,
    wires_per_plane: usize,
}

impl Observer for Summary {
    fn on_raw_waveform(&mut self, waveform: &RawWaveform) {
        self.waveforms += 1;
        let Ok(adc) = waveform.decompressed() else {
            return;
        };
        let peak = adc.iter().map(|x| x.saturating_abs()).max().unwrap_or(0);
        if waveform.channel() / self.wires_per_plane == 2 {
            self.largest_collection = self.largest_collection.max(peak);
        } else {
            self.largest_induction = self.largest_induction.max(peak);
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    // ===========================================
    // These are most likely your free parameters:
    let events = 5;
    let seed = 20240915;
    let electrons_per_tick = 40.0;
    // ===========================================

    // ===========================================
    // Then, these are properties of your detector. You get these from the
    // detector description:
    let wires_per_plane = 256;
    let pitch = Length::new::<centimeter>(0.3);
    let detector = DetectorProperties::builder()
        .sample_period(Time::new::<nanosecond>(500.0))
        .drift_velocity(Velocity::new::<meter_per_second>(1600.0))
        .tick_count(4096)
        .readout_samples(3200)
        .build();
    // ===========================================

    let config = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read `{path}`"))?
            .parse::<Config>()?,
        None => Config::default(),
    };

    let mut rng = StdRng::seed_from_u64(seed);
    let mut sim = SimWire::builder()
        .config(config.clone())
        .geometry(Planes {
            wires_per_plane,
            pitch,
        })
        .detector(detector)
        .rng(StdRng::seed_from_u64(rng.random()))
        .observer(Summary {
            wires_per_plane,
            ..Default::default()
        })
        .build()?;

    // A straight track crossing every plane. Each wire sees a Gaussian pulse
    // of charge whose arrival tick moves linearly with the wire number.
    let fluctuation =
        Normal::<f64>::new(1.0, 0.2).context("failed to create charge fluctuation distribution")?;
    for event in 0..events {
        let start = rng.random_range(200.0..1000.0);
        let slope = rng.random_range(-2.0..2.0);
        let first = rng.random_range(0..wires_per_plane / 2);

        let deposits: Vec<(usize, Vec<f64>)> = (0..3)
            .flat_map(|plane| {
                (first..wires_per_plane).map(move |wire| (plane * wires_per_plane + wire, wire))
            })
            .map(|(channel, wire)| {
                let centre: f64 = start + slope * (wire - first) as f64;
                let scale = electrons_per_tick * fluctuation.sample(&mut rng).max(0.0);
                let charge = (0..detector.tick_count)
                    .map(|tick| {
                        let dt = (tick as f64 - centre) / 3.0;
                        scale * (-0.5 * dt * dt).exp()
                    })
                    .collect();
                (channel, charge)
            })
            .collect();

        let waveforms = sim.process_event(
            deposits
                .iter()
                .map(|(channel, charge)| (*channel, charge.as_slice())),
        )?;
        let words: usize = waveforms.iter().map(|w| w.adc().len()).sum();
        println!(
            "event {event}: {} channels, {} with charge, {words} stored words",
            waveforms.len(),
            deposits.len()
        );
    }

    if let Some(stats) = sim.noise_bank().stats() {
        println!(
            "noise bank: {} slots, rms {:.3}, range [{:.3}, {:.3}]",
            sim.noise_bank().len(),
            stats.rms,
            stats.min,
            stats.max
        );
    }
    let summary = sim.into_observer();
    println!(
        "{} waveforms, largest |ADC| collection {} induction {}",
        summary.waveforms, summary.largest_collection, summary.largest_induction
    );
    println!("\nconfiguration used:\n{config}");

    Ok(())
}
