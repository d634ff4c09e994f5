use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};
use lidarcore::ingest::{LoadedRun, RawTrace, RunMetadata};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Configuration for generating a synthetic two-wavelength Lidar run.
///
/// Each channel follows `background + amplitude * exp(-2 alpha h) / h^2` with
/// uniform noise of width `noise` added to every sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub run_id: u32,
    pub date_time: NaiveDateTime,
    pub altitude_start: f64,
    pub altitude_end: f64,
    pub altitude_step: f64,
    pub extinction: [f64; 2],
    pub amplitude: [f64; 2],
    pub background: [f64; 2],
    pub noise: f64,
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            run_id: 1,
            date_time: NaiveDate::from_ymd_opt(2011, 8, 24)
                .and_then(|d| d.and_hms_opt(21, 0, 0))
                .unwrap_or_default(),
            altitude_start: 0.3,
            altitude_end: 25.0,
            altitude_step: 0.0075,
            extinction: [0.05, 0.06],
            amplitude: [0.5, 0.8],
            background: [0.2, 0.4],
            noise: 1e-4,
            seed: 0,
        }
    }
}

fn build_samples(config: &GeneratorConfig) -> anyhow::Result<Vec<(f64, f64, f64)>> {
    anyhow::ensure!(
        config.altitude_step > 0.0 && config.altitude_start > 0.0,
        "altitude start and step must be positive"
    );
    let span = config.altitude_end - config.altitude_start;
    anyhow::ensure!(span > 0.0, "altitude range is empty");
    let count = (span / config.altitude_step).floor() as usize + 1;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut samples = Vec::with_capacity(count);
    for idx in 0..count {
        let alt = config.altitude_start + idx as f64 * config.altitude_step;
        let mut channels = [0.0; 2];
        for (ch, value) in channels.iter_mut().enumerate() {
            let jitter = if config.noise > 0.0 {
                rng.gen_range(-config.noise..config.noise)
            } else {
                0.0
            };
            *value = config.background[ch]
                + config.amplitude[ch] * (-2.0 * config.extinction[ch] * alt).exp() / (alt * alt)
                + jitter;
        }
        samples.push((alt, channels[0], channels[1]));
    }
    Ok(samples)
}

pub fn build_run_from_config(config: &GeneratorConfig) -> anyhow::Result<LoadedRun> {
    let samples = build_samples(config)?;
    let trace = RawTrace::from_samples(&samples).context("building synthetic trace")?;
    Ok(LoadedRun {
        metadata: RunMetadata {
            run_id: config.run_id,
            file_name: format!("run_{:06}_synthetic.txt", config.run_id),
            date_time: config.date_time,
        },
        trace,
    })
}

pub fn build_run(run_id: u32, seed: u64) -> anyhow::Result<LoadedRun> {
    let config = GeneratorConfig {
        run_id,
        seed,
        ..Default::default()
    };
    build_run_from_config(&config)
}
