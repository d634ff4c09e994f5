pub mod record;
pub mod trace;

pub use record::RunQualityRecord;
pub use trace::{IngestError, LoadedRun, RawTrace, RunMetadata, TraceSource};
