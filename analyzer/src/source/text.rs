use chrono::NaiveDateTime;
use lidarcore::ingest::{IngestError, LoadedRun, RawTrace, RunMetadata, TraceSource};
use std::fs;
use std::path::{Path, PathBuf};

/// Acquisition time written on the first line of an ASCII run file.
const HEADER_TIME_FORMAT: &str = "%a %b %d %H:%M:%S %Y";

/// Reads ASCII Lidar run files: a timestamp line followed by
/// `altitude channel1 channel2` rows.
#[derive(Debug, Clone, Default)]
pub struct TextTraceSource {
    root: Option<PathBuf>,
}

impl TextTraceSource {
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Resolves relative source ids against `root`.
    pub fn with_root<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, source_id: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(source_id),
            None => PathBuf::from(source_id),
        }
    }
}

impl TraceSource for TextTraceSource {
    fn load_trace(&self, source_id: &str) -> Result<LoadedRun, IngestError> {
        let path = self.resolve(source_id);
        let contents = fs::read_to_string(&path).map_err(|source| IngestError::Io {
            path: path.clone(),
            source,
        })?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(source_id);
        parse_run(file_name, &contents)
    }
}

/// Run number encoded as the second `_`-separated token of the file name,
/// e.g. `run_065160_Lidar_001.root.txt`.
pub fn run_number(file_name: &str) -> Result<u32, IngestError> {
    file_name
        .split('_')
        .nth(1)
        .and_then(|token| token.parse().ok())
        .ok_or_else(|| IngestError::BadRunNumber(file_name.to_string()))
}

pub fn parse_run(file_name: &str, contents: &str) -> Result<LoadedRun, IngestError> {
    let run_id = run_number(file_name)?;
    let mut lines = contents.lines().enumerate();
    let header = lines
        .by_ref()
        .map(|(_, line)| line.trim())
        .find(|line| !line.is_empty())
        .ok_or_else(|| IngestError::MissingHeader(file_name.to_string()))?;
    // ctime pads single-digit days with an extra space
    let normalized = header.split_whitespace().collect::<Vec<_>>().join(" ");
    let date_time = NaiveDateTime::parse_from_str(&normalized, HEADER_TIME_FORMAT).map_err(|_| {
        IngestError::BadTimestamp {
            source_id: file_name.to_string(),
            value: header.to_string(),
        }
    })?;

    let mut altitude = Vec::new();
    let mut channel1 = Vec::new();
    let mut channel2 = Vec::new();
    for (idx, line) in lines {
        let mut fields = line.split_whitespace();
        let Some(first) = fields.next() else {
            continue;
        };
        let values = [Some(first), fields.next(), fields.next()];
        let mut parsed = [0.0; 3];
        for (slot, value) in parsed.iter_mut().zip(values) {
            let token = value.ok_or_else(|| IngestError::Parse {
                source_id: file_name.to_string(),
                line: idx + 1,
                message: "expected altitude and two channel values".into(),
            })?;
            *slot = token.parse().map_err(|_| IngestError::Parse {
                source_id: file_name.to_string(),
                line: idx + 1,
                message: format!("not a number: {:?}", token),
            })?;
        }
        altitude.push(parsed[0]);
        channel1.push(parsed[1]);
        channel2.push(parsed[2]);
    }

    let trace = RawTrace::new(altitude, channel1, channel2)?;
    log::debug!("read {} samples for run {}", trace.len(), run_id);
    Ok(LoadedRun {
        metadata: RunMetadata {
            run_id,
            file_name: file_name.to_string(),
            date_time,
        },
        trace,
    })
}

/// Run files (`run*.txt`) in a directory, sorted by name.
pub fn discover_runs(dir: &Path) -> Result<Vec<PathBuf>, IngestError> {
    let entries = fs::read_dir(dir).map_err(|source| IngestError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut runs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .map(|name| name.starts_with("run") && name.ends_with(".txt"))
                    .unwrap_or(false)
        })
        .collect();
    runs.sort();
    Ok(runs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use std::io::Write;

    const SAMPLE: &str = "Wed Aug 24 21:05:13 2011\n\
                          0.75 -0.52 -0.61\n\
                          0.80 -0.50 -0.60\n\
                          \n\
                          0.85 -0.48 -0.58\n";

    #[test]
    fn parses_header_and_rows() {
        let run = parse_run("run_065160_Lidar_001.root.txt", SAMPLE).unwrap();
        assert_eq!(run.metadata.run_id, 65160);
        assert_eq!(run.metadata.date_time.day(), 24);
        assert_eq!(run.metadata.date_time.hour(), 21);
        assert_eq!(run.trace.len(), 3);
        assert_eq!(run.trace.channel2()[2], -0.58);
    }

    #[test]
    fn single_digit_day_with_padding_parses() {
        let run = parse_run("run_1_x.txt", "Wed Aug  3 01:02:03 2011\n1 2 3\n").unwrap();
        assert_eq!(run.metadata.date_time.day(), 3);
    }

    #[test]
    fn short_row_reports_line_number() {
        let err = parse_run("run_000001_Lidar.txt", "Wed Aug 24 21:05:13 2011\n1 2 3\n2 3\n")
            .unwrap_err();
        assert!(matches!(err, IngestError::Parse { line: 3, .. }));
    }

    #[test]
    fn bad_header_and_name_are_rejected() {
        assert!(matches!(
            parse_run("run_000001_Lidar.txt", "yesterday\n1 2 3\n"),
            Err(IngestError::BadTimestamp { .. })
        ));
        assert!(matches!(
            parse_run("lidar.txt", SAMPLE),
            Err(IngestError::BadRunNumber(_))
        ));
        assert!(matches!(
            parse_run("run_000001_Lidar.txt", "\n\n"),
            Err(IngestError::MissingHeader(_))
        ));
    }

    #[test]
    fn unsorted_altitude_is_invalid() {
        let err = parse_run("run_000002_Lidar.txt", "Wed Aug 24 21:05:13 2011\n2 1 1\n1 1 1\n")
            .unwrap_err();
        assert!(matches!(err, IngestError::InvalidTrace(_)));
    }

    #[test]
    fn source_loads_and_discovers_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = fs::File::create(dir.path().join("run_065161_Lidar_001.root.txt")).unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        fs::File::create(dir.path().join("notes.md")).unwrap();

        let runs = discover_runs(dir.path()).unwrap();
        assert_eq!(runs.len(), 1);

        let source = TextTraceSource::with_root(dir.path());
        let run = source.load_trace("run_065161_Lidar_001.root.txt").unwrap();
        assert_eq!(run.metadata.run_id, 65161);
        assert!(matches!(
            source.load_trace("run_000009_missing.txt"),
            Err(IngestError::Io { .. })
        ));
    }
}
