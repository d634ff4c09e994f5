use crate::ingest::trace::RunMetadata;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Per-run result kept once the inversion has completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunQualityRecord {
    pub run_id: u32,
    pub file_name: String,
    pub date_time: NaiveDateTime,
    pub n_bins: usize,
    pub background: (f64, f64),
    pub optical_depth: (f64, f64),
    pub is_good: bool,
}

impl RunQualityRecord {
    pub fn new(
        metadata: &RunMetadata,
        n_bins: usize,
        background: (f64, f64),
        optical_depth: (f64, f64),
        is_good: bool,
    ) -> Self {
        Self {
            run_id: metadata.run_id,
            file_name: metadata.file_name.clone(),
            date_time: metadata.date_time,
            n_bins,
            background,
            optical_depth,
            is_good,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn record_serializes_to_json() {
        let metadata = RunMetadata {
            run_id: 65160,
            file_name: "run_065160_Lidar_001.root.txt".into(),
            date_time: NaiveDate::from_ymd_opt(2011, 8, 24)
                .unwrap()
                .and_hms_opt(21, 5, 0)
                .unwrap(),
        };
        let record = RunQualityRecord::new(&metadata, 100, (0.1, 0.2), (0.05, 0.12), true);
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"run_id\":65160"));
        let back: RunQualityRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
