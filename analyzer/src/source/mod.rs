pub mod text;

pub use text::{discover_runs, TextTraceSource};
