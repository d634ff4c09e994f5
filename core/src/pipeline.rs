//! Chains the processing stages for a single run.

use crate::ingest::{LoadedRun, RunQualityRecord};
use crate::prelude::{Channel, PipelineConfig, PipelineResult, ProcessingStage};
use crate::processing::{
    optical_depth, AltitudeBinning, Binner, KlettInverter, KlettProfile, ReducedTrace, Reducer,
};
use crate::telemetry::LogManager;

/// Everything derived from one run. Dropped once the record is extracted.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub reduced: ReducedTrace,
    pub binning: AltitudeBinning,
    pub profile: KlettProfile,
    pub record: RunQualityRecord,
}

#[derive(Debug, Clone)]
pub struct RunPipeline {
    config: PipelineConfig,
}

impl RunPipeline {
    pub fn new(config: PipelineConfig) -> PipelineResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Reduce, bin, invert and grade one run.
    pub fn process(&self, run: &LoadedRun) -> PipelineResult<RunOutcome> {
        let logger = LogManager::for_run(run.metadata.run_id);
        logger.record(&format!(
            "processing {} ({}), {} samples",
            run.metadata.file_name,
            run.metadata.date_time,
            run.trace.len()
        ));

        let reduced = run_stage(&Reducer::new(&self.config, logger.clone()), &run.trace, &logger)?;
        let binning = run_stage(&Binner::new(&self.config, logger.clone()), &reduced, &logger)?;
        let profile = run_stage(
            &KlettInverter::new(&self.config, logger.clone()),
            &binning,
            &logger,
        )?;

        let tau1 = optical_depth(
            profile.channel(Channel::Wavelength1),
            &binning,
            self.config.h_max,
        );
        let tau2 = optical_depth(
            profile.channel(Channel::Wavelength2),
            &binning,
            self.config.h_max,
        );
        let is_good = self.config.thresholds.is_good(tau1, tau2);
        logger.record(&format!(
            "optical depth below {} km: ({:.5}, {:.5}), good = {}",
            self.config.h_max, tau1, tau2, is_good
        ));

        let record = RunQualityRecord::new(
            &run.metadata,
            binning.n_bins(),
            reduced.background,
            (tau1, tau2),
            is_good,
        );

        Ok(RunOutcome {
            reduced,
            binning,
            profile,
            record,
        })
    }
}

fn run_stage<S: ProcessingStage>(
    stage: &S,
    input: &S::Input,
    logger: &LogManager,
) -> PipelineResult<S::Output> {
    stage.execute(input).map_err(|err| {
        logger.warn(&format!("stage {} failed: {}", stage.name(), err));
        err
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{RawTrace, RunMetadata};
    use crate::prelude::PipelineError;
    use chrono::NaiveDate;

    // Noise-free two-wavelength return with constant extinction.
    fn clear_sky_run() -> LoadedRun {
        let mut rows = Vec::new();
        let mut alt: f64 = 0.3;
        while alt < 25.0 {
            let ch1 = 0.2 + 0.5 * (-2.0 * 0.05 * alt).exp() / (alt * alt);
            let ch2 = 0.4 + 0.8 * (-2.0 * 0.06 * alt).exp() / (alt * alt);
            rows.push((alt, ch1, ch2));
            alt += 0.0075;
        }
        LoadedRun {
            metadata: RunMetadata {
                run_id: 67217,
                file_name: "run_067217_Lidar_001.root.txt".into(),
                date_time: NaiveDate::from_ymd_opt(2011, 8, 24)
                    .unwrap()
                    .and_hms_opt(22, 10, 0)
                    .unwrap(),
            },
            trace: RawTrace::from_samples(&rows).unwrap(),
        }
    }

    #[test]
    fn default_pipeline_produces_record() {
        let pipeline = RunPipeline::new(PipelineConfig::default()).unwrap();
        let outcome = pipeline.process(&clear_sky_run()).unwrap();
        assert_eq!(outcome.record.run_id, 67217);
        assert_eq!(outcome.record.n_bins, 100);
        assert_eq!(outcome.binning.total_samples(), outcome.reduced.len());
        assert!((outcome.record.background.0 - 0.2).abs() < 1e-3);
        let (tau1, tau2) = outcome.record.optical_depth;
        assert!(tau1 > 0.0 && tau2 > tau1);
        assert!(outcome.record.is_good);
    }

    #[test]
    fn reference_above_signal_window_fails_the_run() {
        let config = PipelineConfig {
            r0: 15.0,
            ..Default::default()
        };
        let pipeline = RunPipeline::new(config).unwrap();
        let err = pipeline.process(&clear_sky_run()).unwrap_err();
        assert!(matches!(err, PipelineError::OutOfRange { .. }));
    }

    #[test]
    fn invalid_config_is_refused_up_front() {
        let config = PipelineConfig {
            n_bins: 0,
            ..Default::default()
        };
        assert!(RunPipeline::new(config).is_err());
    }
}
