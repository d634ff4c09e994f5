//! Data-reduction core for two-wavelength atmospheric Lidar runs.
//!
//! A run flows through background subtraction, logarithmic altitude binning
//! and the Klett inversion, and ends as a single [`RunQualityRecord`] carrying
//! the optical depth of the lower atmosphere.

pub mod ingest;
pub mod math;
pub mod pipeline;
pub mod prelude;
pub mod processing;
pub mod telemetry;

pub use ingest::{LoadedRun, RawTrace, RunMetadata, RunQualityRecord, TraceSource};
pub use pipeline::{RunOutcome, RunPipeline};
pub use prelude::{Channel, PipelineConfig, PipelineError, PipelineResult, ProcessingStage};
