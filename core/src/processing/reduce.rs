use crate::ingest::RawTrace;
use crate::math::{search, StatsHelper};
use crate::prelude::{
    check_window, Channel, PipelineConfig, PipelineError, PipelineResult, ProcessingStage,
};
use crate::telemetry::log::LogManager;
use ndarray::{s, Array1, ArrayView1};

/// Background-subtracted, range-corrected signal restricted to the signal window.
#[derive(Debug, Clone, PartialEq)]
pub struct ReducedTrace {
    pub alt_min: f64,
    pub alt_max: f64,
    pub altitude: Array1<f64>,
    pub power: [Array1<f64>; 2],
    pub ln_power: [Array1<f64>; 2],
    pub background: (f64, f64),
}

impl ReducedTrace {
    pub fn len(&self) -> usize {
        self.altitude.len()
    }

    pub fn is_empty(&self) -> bool {
        self.altitude.is_empty()
    }

    pub fn power(&self, channel: Channel) -> ArrayView1<'_, f64> {
        self.power[channel.index()].view()
    }

    pub fn ln_power(&self, channel: Channel) -> ArrayView1<'_, f64> {
        self.ln_power[channel.index()].view()
    }
}

/// Subtracts the mean background of each channel and converts the signal to
/// range-corrected power `|signal - background| * altitude^2`.
///
/// Both windows select the samples with altitude in `(min, max]`.
pub fn reduce(
    raw: &RawTrace,
    alt_min: f64,
    alt_max: f64,
    bkg_min: f64,
    bkg_max: f64,
) -> PipelineResult<ReducedTrace> {
    check_window("signal", alt_min, alt_max)?;
    check_window("background", bkg_min, bkg_max)?;

    let altitude = raw.altitude();
    let bkg = search::window(altitude, bkg_min, bkg_max);
    if bkg.is_empty() {
        return Err(PipelineError::EmptyWindow {
            window: "background",
            min: bkg_min,
            max: bkg_max,
        });
    }
    let sig = search::window(altitude, alt_min, alt_max);
    if sig.is_empty() {
        return Err(PipelineError::EmptyWindow {
            window: "signal",
            min: alt_min,
            max: alt_max,
        });
    }

    let signals = [raw.channel1(), raw.channel2()];
    let mut background = [0.0; 2];
    for channel in Channel::ALL {
        let column = signals[channel.index()].slice(s![bkg.clone()]);
        // window is non-empty, so the mean always exists
        background[channel.index()] = StatsHelper::mean(column).unwrap_or_default();
    }

    let alt = altitude.slice(s![sig.clone()]).to_owned();
    let alt_sq = alt.mapv(|a| a * a);
    let mut power: [Array1<f64>; 2] = Default::default();
    let mut ln_power: [Array1<f64>; 2] = Default::default();
    for channel in Channel::ALL {
        let idx = channel.index();
        let column = signals[idx].slice(s![sig.clone()]);
        let pw = column.mapv(|v| (v - background[idx]).abs()) * &alt_sq;
        ln_power[idx] = log_power(channel, alt.view(), pw.view())?;
        power[idx] = pw;
    }

    Ok(ReducedTrace {
        alt_min,
        alt_max,
        altitude: alt,
        power,
        ln_power,
        background: (background[0], background[1]),
    })
}

fn log_power(
    channel: Channel,
    altitude: ArrayView1<f64>,
    power: ArrayView1<f64>,
) -> PipelineResult<Array1<f64>> {
    if let Some((&alt, &pw)) = altitude
        .iter()
        .zip(power.iter())
        .find(|&(_, &pw)| pw <= 0.0 || pw.is_nan())
    {
        return Err(PipelineError::Domain {
            channel,
            altitude: alt,
            power: pw,
        });
    }
    Ok(power.mapv(f64::ln))
}

/// Stage wrapper running [`reduce`] with the configured windows.
pub struct Reducer {
    config: PipelineConfig,
    logger: LogManager,
}

impl Reducer {
    pub fn new(config: &PipelineConfig, logger: LogManager) -> Self {
        Self {
            config: config.clone(),
            logger,
        }
    }
}

impl ProcessingStage for Reducer {
    type Input = RawTrace;
    type Output = ReducedTrace;

    fn name(&self) -> &'static str {
        "reduce"
    }

    fn execute(&self, input: &RawTrace) -> PipelineResult<ReducedTrace> {
        let reduced = reduce(
            input,
            self.config.alt_min,
            self.config.alt_max,
            self.config.bkg_min,
            self.config.bkg_max,
        )?;
        self.logger.record(&format!(
            "reduced {} of {} samples, background ({:.5}, {:.5})",
            reduced.len(),
            input.len(),
            reduced.background.0,
            reduced.background.1
        ));
        Ok(reduced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_sample_trace() -> RawTrace {
        RawTrace::from_samples(&[(1.0, 10.0, 20.0), (2.0, 8.0, 16.0), (20.0, 1.0, 2.0)]).unwrap()
    }

    #[test]
    fn reduce_subtracts_background_and_scales_by_range() {
        let reduced = reduce(&three_sample_trace(), 0.0, 10.0, 15.0, 25.0).unwrap();
        assert_eq!(reduced.background, (1.0, 2.0));
        assert_eq!(reduced.altitude.to_vec(), vec![1.0, 2.0]);
        assert_eq!(reduced.power(Channel::Wavelength1).to_vec(), vec![9.0, 28.0]);
        assert_eq!(reduced.power(Channel::Wavelength2).to_vec(), vec![18.0, 56.0]);
        assert!((reduced.ln_power(Channel::Wavelength1)[1] - 28.0_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn reduced_altitudes_are_an_ordered_subsequence() {
        let raw = RawTrace::from_samples(&[
            (0.5, 5.0, 5.0),
            (1.0, 4.0, 4.0),
            (1.5, 3.0, 3.0),
            (3.0, 2.5, 2.5),
            (21.0, 0.5, 0.5),
            (22.0, 0.7, 0.7),
        ])
        .unwrap();
        let reduced = reduce(&raw, 0.8, 10.0, 20.0, 25.0).unwrap();
        assert_eq!(reduced.altitude.to_vec(), vec![1.0, 1.5, 3.0]);
        assert!((reduced.background.0 - 0.6).abs() < 1e-12);
    }

    #[test]
    fn negative_excess_signal_uses_absolute_value() {
        let raw = RawTrace::from_samples(&[(1.0, 0.5, 3.0), (20.0, 1.0, 2.0)]).unwrap();
        let reduced = reduce(&raw, 0.0, 10.0, 15.0, 25.0).unwrap();
        assert_eq!(reduced.power(Channel::Wavelength1)[0], 0.5);
    }

    #[test]
    fn signal_equal_to_background_is_a_domain_error() {
        let raw = RawTrace::from_samples(&[(1.0, 1.0, 3.0), (20.0, 1.0, 2.0)]).unwrap();
        let err = reduce(&raw, 0.0, 10.0, 15.0, 25.0).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Domain {
                channel: Channel::Wavelength1,
                ..
            }
        ));
    }

    #[test]
    fn missing_background_samples_are_reported() {
        let err = reduce(&three_sample_trace(), 0.0, 10.0, 30.0, 40.0).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::EmptyWindow {
                window: "background",
                ..
            }
        ));
    }

    #[test]
    fn reducer_stage_uses_configured_windows() {
        let config = PipelineConfig {
            alt_min: 0.5,
            alt_max: 1.5,
            bkg_min: 15.0,
            bkg_max: 25.0,
            ..Default::default()
        };
        let stage = Reducer::new(&config, LogManager::for_run(1));
        let reduced = stage.execute(&three_sample_trace()).unwrap();
        assert_eq!(reduced.len(), 1);
        assert_eq!(stage.name(), "reduce");
    }
}
