use anyhow::Context;
use lidarcore::prelude::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    #[serde(flatten)]
    pub pipeline: PipelineConfig,
    /// Directory scanned for run files when no input is given on the command line.
    pub data_dir: Option<PathBuf>,
    /// Run catalog updated after each batch.
    pub catalog: Option<PathBuf>,
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    /// Applies command-line overrides on top of the file or default settings.
    pub fn with_overrides(mut self, n_bins: Option<usize>, r0: Option<f64>) -> Self {
        if let Some(n_bins) = n_bins {
            self.pipeline.n_bins = n_bins;
        }
        if let Some(r0) = r0 {
            self.pipeline.r0 = r0;
        }
        self
    }

    pub fn to_pipeline_config(&self) -> PipelineConfig {
        self.pipeline.clone()
    }
}
