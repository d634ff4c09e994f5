use anyhow::Context;
use catalog::RunCatalog;
use chrono::NaiveDateTime;
use clap::Parser;
use generator::profile::build_run;
use lidarcore::prelude::Channel;
use source::{discover_runs, TextTraceSource};
use std::path::PathBuf;
use workflow::config::WorkflowConfig;
use workflow::runner::{BatchReport, FailedRun, Runner};

mod catalog;
mod generator;
mod source;
mod workflow;

const QUERY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Parser)]
#[command(author, version, about = "Klett inversion and run quality for Lidar runs")]
struct Args {
    /// Run files or directories holding `run*.txt` files
    inputs: Vec<PathBuf>,
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    #[arg(long)]
    n_bins: Option<usize>,
    /// Reference altitude of the inversion in km
    #[arg(long)]
    r0: Option<f64>,
    /// Run catalog (JSON) to update and query
    #[arg(long)]
    catalog: Option<PathBuf>,
    /// Reduce this many synthetic runs instead of files
    #[arg(long, default_value_t = 0)]
    synthetic: u32,
    /// List good runs of the night starting at "YYYY-MM-DD HH:MM:SS"
    #[arg(long)]
    night: Option<String>,
    /// List all runs from this time ("YYYY-MM-DD HH:MM:SS"), used with --to
    #[arg(long, requires = "to")]
    from: Option<String>,
    #[arg(long, requires = "from")]
    to: Option<String>,
}

fn parse_time(value: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, QUERY_TIME_FORMAT)
        .with_context(|| format!("parsing time {:?} (expected {})", value, QUERY_TIME_FORMAT))
}

fn collect_inputs(inputs: &[PathBuf]) -> anyhow::Result<Vec<String>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let runs = discover_runs(input)
                .with_context(|| format!("scanning {}", input.display()))?;
            files.extend(runs.into_iter().map(|p| p.display().to_string()));
        } else {
            files.push(input.display().to_string());
        }
    }
    Ok(files)
}

fn print_report(report: &BatchReport) {
    for record in &report.records {
        println!(
            "run {:06} {} tau=({:.5}, {:.5}) bkg=({:.5}, {:.5}) {}",
            record.run_id,
            record.date_time,
            record.optical_depth.0,
            record.optical_depth.1,
            record.background.0,
            record.background.1,
            if record.is_good { "GOOD" } else { "BAD" }
        );
    }
    for FailedRun { source, error } in &report.failures {
        println!("FAILED {}: {}", source, error);
    }
    println!(
        "{} runs reduced ({} good), {} failed",
        report.records.len(),
        report.good_runs(),
        report.failures.len()
    );
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let workflow_config = match &args.workflow {
        Some(path) => WorkflowConfig::load(path)?,
        None => WorkflowConfig::default(),
    }
    .with_overrides(args.n_bins, args.r0);
    let catalog_path = args.catalog.clone().or_else(|| workflow_config.catalog.clone());

    let runner = Runner::new(&workflow_config)?;
    let pipeline_config = runner.pipeline_config();
    log::info!(
        "pipeline: {} bins, r0 = {} km, h_max = {} km",
        pipeline_config.n_bins,
        pipeline_config.r0,
        pipeline_config.h_max
    );
    let mut report = BatchReport::default();

    let inputs = collect_inputs(&args.inputs)?;
    if !inputs.is_empty() {
        let batch = runner.execute_all(&TextTraceSource::new(), &inputs);
        report.records.extend(batch.records);
        report.failures.extend(batch.failures);
    } else if let (Some(dir), 0) = (&workflow_config.data_dir, args.synthetic) {
        let names: Vec<String> = discover_runs(dir)
            .with_context(|| format!("scanning {}", dir.display()))?
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(String::from))
            .collect();
        let batch = runner.execute_all(&TextTraceSource::with_root(dir), &names);
        report.records.extend(batch.records);
        report.failures.extend(batch.failures);
    }

    for idx in 0..args.synthetic {
        let run = build_run(idx + 1, u64::from(idx))?;
        match runner.execute(&run) {
            Ok(outcome) => report.records.push(outcome.record),
            Err(error) => report.failures.push(FailedRun {
                source: run.metadata.file_name.clone(),
                error,
            }),
        }
    }

    if !report.records.is_empty() || !report.failures.is_empty() {
        print_report(&report);
        let (processed, good, errors) = runner.metrics().snapshot();
        log::info!(
            "pipeline metrics: {} processed, {} good, {} errors",
            processed,
            good,
            errors
        );
    }

    let Some(catalog_path) = catalog_path else {
        anyhow::ensure!(
            args.night.is_none() && args.from.is_none(),
            "run queries need a catalog (--catalog or `catalog:` in the workflow config)"
        );
        return Ok(());
    };

    let mut catalog = RunCatalog::load_or_default(&catalog_path)?;
    if catalog.is_empty() && report.records.is_empty() {
        log::warn!("catalog {} holds no runs", catalog_path.display());
    }
    if !report.records.is_empty() {
        for record in report.records {
            catalog.insert(record);
        }
        catalog.save(&catalog_path)?;
        log::info!(
            "catalog {} now holds {} runs",
            catalog_path.display(),
            catalog.len()
        );
    }

    if let Some(night) = &args.night {
        let start = parse_time(night)?;
        let runs = catalog.runs_for_night(start);
        println!("good runs for night {}: {:?}", night, runs);
        for run in runs.iter().filter_map(|id| catalog.get(*id)) {
            println!(
                "  {:06} {} tau=({:.5}, {:.5})",
                run.run_id, run.date_time, run.optical_depth.0, run.optical_depth.1
            );
        }
        if let Some(change) = catalog.night_transmission(start, Channel::Wavelength2) {
            println!(
                "transmission from {:.2} to {:.2}, variation {:.2}",
                change.start, change.end, change.relative
            );
        }
    }
    if let (Some(from), Some(to)) = (&args.from, &args.to) {
        let runs = catalog.runs_between(parse_time(from)?, parse_time(to)?);
        println!("runs from {} to {}: {:?}", from, to, runs);
    }

    Ok(())
}
