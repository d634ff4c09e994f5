//! Logging and run counters shared by the pipeline and its drivers.

pub mod log;
pub mod metrics;

pub use log::LogManager;
pub use metrics::MetricsRecorder;
