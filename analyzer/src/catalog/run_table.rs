use anyhow::Context;
use chrono::{Duration, NaiveDateTime};
use lidarcore::prelude::Channel;
use lidarcore::processing::TransmissionChange;
use lidarcore::RunQualityRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Length of an observation night counted from its start time.
const NIGHT_HOURS: i64 = 16;

/// Quality records keyed by run number, persisted as JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunCatalog {
    runs: BTreeMap<u32, RunQualityRecord>,
}

impl RunCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading run catalog {}", path_ref.display()))?;
        let runs = serde_json::from_str(&contents)
            .with_context(|| format!("parsing run catalog {}", path_ref.display()))?;
        Ok(Self { runs })
    }

    /// Loads the catalog, starting empty when the file does not exist yet.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::new())
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path_ref = path.as_ref();
        if let Some(parent) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&self.runs)?;
        fs::write(path_ref, json)
            .with_context(|| format!("writing run catalog {}", path_ref.display()))?;
        Ok(())
    }

    /// Adds or replaces the record of a run.
    pub fn insert(&mut self, record: RunQualityRecord) -> Option<RunQualityRecord> {
        self.runs.insert(record.run_id, record)
    }

    pub fn get(&self, run_id: u32) -> Option<&RunQualityRecord> {
        self.runs.get(&run_id)
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Good runs taken within the night starting at `start`, in run order.
    pub fn runs_for_night(&self, start: NaiveDateTime) -> Vec<u32> {
        let end = start + Duration::hours(NIGHT_HOURS);
        self.runs
            .values()
            .filter(|r| r.is_good && r.date_time >= start && r.date_time <= end)
            .map(|r| r.run_id)
            .collect()
    }

    /// All runs with `from <= date_time <= to`, in run order.
    pub fn runs_between(&self, from: NaiveDateTime, to: NaiveDateTime) -> Vec<u32> {
        self.runs
            .values()
            .filter(|r| r.date_time >= from && r.date_time <= to)
            .map(|r| r.run_id)
            .collect()
    }

    /// Transmission change between the first and last good runs of a night.
    pub fn night_transmission(
        &self,
        start: NaiveDateTime,
        channel: Channel,
    ) -> Option<TransmissionChange> {
        let runs = self.runs_for_night(start);
        let tau = |run: &u32| {
            self.runs.get(run).map(|r| match channel {
                Channel::Wavelength1 => r.optical_depth.0,
                Channel::Wavelength2 => r.optical_depth.1,
            })
        };
        let first = tau(runs.first()?)?;
        let last = tau(runs.last()?)?;
        Some(TransmissionChange::between(first, last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2011, 8, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn record(run_id: u32, date_time: NaiveDateTime, tau2: f64, is_good: bool) -> RunQualityRecord {
        RunQualityRecord {
            run_id,
            file_name: format!("run_{:06}_Lidar_001.root.txt", run_id),
            date_time,
            n_bins: 100,
            background: (0.1, 0.2),
            optical_depth: (0.01, tau2),
            is_good,
        }
    }

    fn sample_catalog() -> RunCatalog {
        let mut catalog = RunCatalog::new();
        catalog.insert(record(3, at(25, 2), 0.5, true));
        catalog.insert(record(1, at(24, 20), 0.0, true));
        catalog.insert(record(2, at(24, 23), 0.2, false));
        catalog.insert(record(4, at(26, 21), 0.3, true));
        catalog
    }

    #[test]
    fn night_query_keeps_good_runs_in_window() {
        assert_eq!(sample_catalog().runs_for_night(at(24, 16)), vec![1, 3]);
    }

    #[test]
    fn range_query_includes_bad_runs() {
        assert_eq!(
            sample_catalog().runs_between(at(24, 0), at(25, 23)),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn night_transmission_compares_first_and_last_run() {
        let change = sample_catalog()
            .night_transmission(at(24, 16), Channel::Wavelength2)
            .unwrap();
        assert_eq!(change.start, 1.0);
        assert!((change.end - (-1.0_f64).exp()).abs() < 1e-12);
        assert!(sample_catalog()
            .night_transmission(at(1, 16), Channel::Wavelength2)
            .is_none());
    }

    #[test]
    fn catalog_round_trips_through_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db").join("runs.json");
        let catalog = sample_catalog();
        catalog.save(&path).unwrap();
        let loaded = RunCatalog::load(&path).unwrap();
        assert_eq!(loaded, catalog);
        assert_eq!(loaded.get(4).unwrap().optical_depth.1, 0.3);
    }

    #[test]
    fn missing_catalog_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = RunCatalog::load_or_default(dir.path().join("none.json")).unwrap();
        assert!(catalog.is_empty());
    }
}
