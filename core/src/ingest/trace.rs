use chrono::NaiveDateTime;
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Failures raised while reading or validating an external run source.
#[derive(thiserror::Error, Debug)]
pub enum IngestError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}: missing acquisition time header")]
    MissingHeader(String),
    #[error("{source_id}: bad acquisition time {value:?}")]
    BadTimestamp { source_id: String, value: String },
    #[error("{0}: no run number in file name")]
    BadRunNumber(String),
    #[error("{source_id}, line {line}: {message}")]
    Parse {
        source_id: String,
        line: usize,
        message: String,
    },
    #[error("invalid trace: {0}")]
    InvalidTrace(String),
}

/// Raw two-wavelength backscatter signal of one run, ordered by altitude.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTrace {
    altitude: Array1<f64>,
    channel1: Array1<f64>,
    channel2: Array1<f64>,
}

impl RawTrace {
    /// Builds a trace, checking that the columns line up, hold finite values
    /// and that altitude is strictly increasing.
    pub fn new(
        altitude: Vec<f64>,
        channel1: Vec<f64>,
        channel2: Vec<f64>,
    ) -> Result<Self, IngestError> {
        if altitude.is_empty() {
            return Err(IngestError::InvalidTrace("trace has no samples".into()));
        }
        if altitude.len() != channel1.len() || altitude.len() != channel2.len() {
            return Err(IngestError::InvalidTrace(format!(
                "column lengths differ: altitude {}, channel1 {}, channel2 {}",
                altitude.len(),
                channel1.len(),
                channel2.len()
            )));
        }
        let columns = [&altitude, &channel1, &channel2];
        if let Some(idx) = columns
            .iter()
            .find_map(|column| column.iter().position(|v| !v.is_finite()))
        {
            return Err(IngestError::InvalidTrace(format!(
                "non-finite value in sample {}",
                idx
            )));
        }
        if let Some(idx) = altitude.windows(2).position(|pair| pair[1] <= pair[0]) {
            return Err(IngestError::InvalidTrace(format!(
                "altitude not strictly increasing at sample {} ({} -> {})",
                idx + 1,
                altitude[idx],
                altitude[idx + 1]
            )));
        }

        Ok(Self {
            altitude: Array1::from(altitude),
            channel1: Array1::from(channel1),
            channel2: Array1::from(channel2),
        })
    }

    /// Convenience constructor from `(altitude, channel1, channel2)` rows.
    pub fn from_samples(samples: &[(f64, f64, f64)]) -> Result<Self, IngestError> {
        let altitude = samples.iter().map(|s| s.0).collect();
        let channel1 = samples.iter().map(|s| s.1).collect();
        let channel2 = samples.iter().map(|s| s.2).collect();
        Self::new(altitude, channel1, channel2)
    }

    pub fn len(&self) -> usize {
        self.altitude.len()
    }

    pub fn is_empty(&self) -> bool {
        self.altitude.is_empty()
    }

    pub fn altitude(&self) -> ArrayView1<'_, f64> {
        self.altitude.view()
    }

    pub fn channel1(&self) -> ArrayView1<'_, f64> {
        self.channel1.view()
    }

    pub fn channel2(&self) -> ArrayView1<'_, f64> {
        self.channel2.view()
    }
}

/// Identity of a run as reported by the ingestion adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: u32,
    pub file_name: String,
    pub date_time: NaiveDateTime,
}

/// A trace together with the run it belongs to.
#[derive(Debug, Clone)]
pub struct LoadedRun {
    pub metadata: RunMetadata,
    pub trace: RawTrace,
}

/// Boundary implemented by whatever reads run files from disk or archives.
pub trait TraceSource {
    fn load_trace(&self, source_id: &str) -> Result<LoadedRun, IngestError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_accepts_increasing_altitude() {
        let trace = RawTrace::from_samples(&[(1.0, 10.0, 20.0), (2.0, 8.0, 16.0)]).unwrap();
        assert_eq!(trace.len(), 2);
        assert_eq!(trace.channel2()[1], 16.0);
    }

    #[test]
    fn trace_rejects_repeated_altitude() {
        let err = RawTrace::from_samples(&[(1.0, 1.0, 1.0), (1.0, 2.0, 2.0)]).unwrap_err();
        assert!(matches!(err, IngestError::InvalidTrace(_)));
    }

    #[test]
    fn trace_rejects_mismatched_columns() {
        assert!(RawTrace::new(vec![1.0, 2.0], vec![1.0], vec![1.0, 2.0]).is_err());
    }

    #[test]
    fn trace_rejects_empty_and_nan_input() {
        assert!(RawTrace::new(vec![], vec![], vec![]).is_err());
        assert!(RawTrace::from_samples(&[(1.0, f64::NAN, 0.0)]).is_err());
    }
}
