pub mod search;
pub mod stats;

pub use stats::StatsHelper;
