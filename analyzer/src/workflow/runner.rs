use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use lidarcore::ingest::{LoadedRun, RunQualityRecord, TraceSource};
use lidarcore::pipeline::{RunOutcome, RunPipeline};
use lidarcore::prelude::{PipelineConfig, PipelineError};
use lidarcore::telemetry::{LogManager, MetricsRecorder};
use std::sync::Arc;

/// A run that could not be reduced, with the reason.
#[derive(Debug)]
pub struct FailedRun {
    pub source: String,
    pub error: PipelineError,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub records: Vec<RunQualityRecord>,
    pub failures: Vec<FailedRun>,
}

impl BatchReport {
    pub fn good_runs(&self) -> usize {
        self.records.iter().filter(|r| r.is_good).count()
    }
}

#[derive(Clone)]
pub struct Runner {
    pipeline: RunPipeline,
    metrics: Arc<MetricsRecorder>,
    logger: LogManager,
}

impl Runner {
    pub fn new(config: &WorkflowConfig) -> anyhow::Result<Self> {
        let pipeline =
            RunPipeline::new(config.to_pipeline_config()).context("validating pipeline config")?;
        Ok(Self {
            pipeline,
            metrics: Arc::new(MetricsRecorder::new()),
            logger: LogManager::new(),
        })
    }

    pub fn execute(&self, run: &LoadedRun) -> Result<RunOutcome, PipelineError> {
        match self.pipeline.process(run) {
            Ok(outcome) => {
                self.metrics.record_processed(outcome.record.is_good);
                Ok(outcome)
            }
            Err(err) => {
                self.metrics.record_error();
                Err(err)
            }
        }
    }

    /// Loads and reduces one run from `source`.
    pub fn execute_source(
        &self,
        source: &dyn TraceSource,
        source_id: &str,
    ) -> Result<RunQualityRecord, PipelineError> {
        let run = source.load_trace(source_id).map_err(|err| {
            self.metrics.record_error();
            PipelineError::from(err)
        })?;
        Ok(self.execute(&run)?.record)
    }

    /// Reduces every run; a failing run is listed and the batch moves on.
    pub fn execute_all<I, S>(&self, source: &dyn TraceSource, source_ids: I) -> BatchReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut report = BatchReport::default();
        for source_id in source_ids {
            let source_id = source_id.as_ref();
            match self.execute_source(source, source_id) {
                Ok(record) => report.records.push(record),
                Err(error) => {
                    self.logger
                        .warn(&format!("run {} failed: {}", source_id, error));
                    report.failures.push(FailedRun {
                        source: source_id.to_string(),
                        error,
                    });
                }
            }
        }
        let (processed, good, errors) = self.metrics.snapshot();
        self.logger.record(&format!(
            "batch done: {} processed, {} good, {} failed",
            processed, good, errors
        ));
        report
    }

    pub fn pipeline_config(&self) -> &PipelineConfig {
        self.pipeline.config()
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::{build_run, build_run_from_config, GeneratorConfig};
    use lidarcore::ingest::IngestError;
    use std::collections::HashMap;

    struct MemorySource {
        runs: HashMap<String, LoadedRun>,
    }

    impl TraceSource for MemorySource {
        fn load_trace(&self, source_id: &str) -> Result<LoadedRun, IngestError> {
            self.runs
                .get(source_id)
                .cloned()
                .ok_or_else(|| IngestError::InvalidTrace(format!("unknown run {}", source_id)))
        }
    }

    #[test]
    fn runner_applies_workflow_overrides() {
        let config = WorkflowConfig::default().with_overrides(Some(40), Some(8.5));
        let runner = Runner::new(&config).unwrap();
        assert_eq!(runner.pipeline_config().n_bins, 40);
        assert_eq!(runner.pipeline_config().r0, 8.5);
    }

    #[test]
    fn runner_executes_workflow() {
        let runner = Runner::new(&WorkflowConfig::default()).unwrap();
        let run = build_run(42, 7).unwrap();
        let outcome = runner.execute(&run).unwrap();
        assert_eq!(outcome.record.run_id, 42);
        assert_eq!(outcome.binning.n_bins(), 100);
        assert_eq!(runner.metrics().snapshot(), (1, 1, 0));
    }

    #[test]
    fn failed_runs_are_listed_and_batch_continues() {
        let mut runs = HashMap::new();
        runs.insert("a".to_string(), build_run(1, 0).unwrap());
        let no_background = GeneratorConfig {
            run_id: 2,
            altitude_end: 15.0,
            ..Default::default()
        };
        runs.insert("b".to_string(), build_run_from_config(&no_background).unwrap());
        runs.insert("c".to_string(), build_run(3, 0).unwrap());
        let source = MemorySource { runs };

        let runner = Runner::new(&WorkflowConfig::default()).unwrap();
        let report = runner.execute_all(&source, ["a", "b", "missing", "c"]);
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.good_runs(), 2);
        assert_eq!(report.failures.len(), 2);
        assert!(matches!(
            report.failures[0].error,
            PipelineError::EmptyWindow { .. }
        ));
        assert!(matches!(
            report.failures[1].error,
            PipelineError::Ingestion(_)
        ));
        assert_eq!(runner.metrics().snapshot(), (2, 2, 2));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = WorkflowConfig::default();
        config.pipeline.alpha0_ch1 = -1.0;
        assert!(Runner::new(&config).is_err());
    }
}
