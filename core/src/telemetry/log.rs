use log::{info, warn};

/// Run-scoped logger; every message carries the run number.
#[derive(Debug, Clone, Default)]
pub struct LogManager {
    run_id: Option<u32>,
}

impl LogManager {
    pub fn new() -> Self {
        Self { run_id: None }
    }

    pub fn for_run(run_id: u32) -> Self {
        Self {
            run_id: Some(run_id),
        }
    }

    pub fn record(&self, message: &str) {
        match self.run_id {
            Some(run) => info!("[run {:06}] {}", run, message),
            None => info!("{}", message),
        }
    }

    pub fn warn(&self, message: &str) {
        match self.run_id {
            Some(run) => warn!("[run {:06}] {}", run, message),
            None => warn!("{}", message),
        }
    }
}
