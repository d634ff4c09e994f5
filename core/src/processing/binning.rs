use crate::prelude::{Channel, PipelineConfig, PipelineError, PipelineResult, ProcessingStage};
use crate::processing::reduce::ReducedTrace;
use crate::telemetry::log::LogManager;
use serde::{Deserialize, Serialize};

/// One logarithmic altitude bin with the mean reduced signal it holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AltitudeBin {
    pub alt_min: f64,
    pub alt_max: f64,
    pub alt_center: f64,
    pub mean_power: [f64; 2],
    pub mean_ln_power: [f64; 2],
    pub sample_count: usize,
}

impl AltitudeBin {
    pub fn width(&self) -> f64 {
        self.alt_max - self.alt_min
    }

    pub fn power(&self, channel: Channel) -> f64 {
        self.mean_power[channel.index()]
    }

    pub fn ln_power(&self, channel: Channel) -> f64 {
        self.mean_ln_power[channel.index()]
    }
}

/// Reduced trace averaged into log-spaced altitude bins, lowest bin first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AltitudeBinning {
    edges: Vec<f64>,
    bins: Vec<AltitudeBin>,
}

impl AltitudeBinning {
    pub fn n_bins(&self) -> usize {
        self.bins.len()
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    pub fn bins(&self) -> &[AltitudeBin] {
        &self.bins
    }

    pub fn centers(&self) -> Vec<f64> {
        self.bins.iter().map(|b| b.alt_center).collect()
    }

    /// Lowest and highest altitude covered by the bins.
    pub fn range(&self) -> (f64, f64) {
        (self.edges[0], self.edges[self.edges.len() - 1])
    }

    pub fn total_samples(&self) -> usize {
        self.bins.iter().map(|b| b.sample_count).sum()
    }

    /// Assembles a binning from already averaged bins, which must be
    /// contiguous and ordered by altitude.
    pub fn from_bins(bins: Vec<AltitudeBin>) -> PipelineResult<Self> {
        let first = bins
            .first()
            .ok_or_else(|| PipelineError::InvalidConfig("binning needs at least one bin".into()))?;
        let mut edges = Vec::with_capacity(bins.len() + 1);
        edges.push(first.alt_min);
        for (idx, bin) in bins.iter().enumerate() {
            if bin.alt_min != edges[idx] || bin.alt_max <= bin.alt_min {
                return Err(PipelineError::InvalidConfig(format!(
                    "bin {} ({}, {}] does not continue the previous bin",
                    idx, bin.alt_min, bin.alt_max
                )));
            }
            edges.push(bin.alt_max);
        }
        Ok(Self { edges, bins })
    }
}

/// `n_bins + 1` edges evenly spaced in `ln(altitude)` between `alt_min` and
/// `alt_max`; the outer edges are exact.
pub fn log_edges(alt_min: f64, alt_max: f64, n_bins: usize) -> PipelineResult<Vec<f64>> {
    if n_bins == 0 {
        return Err(PipelineError::InvalidConfig("n_bins must be at least 1".into()));
    }
    if !(alt_min > 0.0) || !alt_max.is_finite() || alt_min >= alt_max {
        return Err(PipelineError::InvalidConfig(format!(
            "cannot log-bin altitude range ({}, {}]",
            alt_min, alt_max
        )));
    }

    let ln_min = alt_min.ln();
    let step = (alt_max.ln() - ln_min) / n_bins as f64;
    let mut edges: Vec<f64> = (0..=n_bins)
        .map(|i| (ln_min + i as f64 * step).exp())
        .collect();
    edges[0] = alt_min;
    edges[n_bins] = alt_max;
    Ok(edges)
}

#[derive(Default)]
struct Accumulator {
    power: [f64; 2],
    ln_power: [f64; 2],
    count: usize,
}

impl Accumulator {
    fn add(&mut self, power: [f64; 2], ln_power: [f64; 2]) {
        for idx in 0..2 {
            self.power[idx] += power[idx];
            self.ln_power[idx] += ln_power[idx];
        }
        self.count += 1;
    }

    fn close(self, index: usize, edges: &[f64]) -> PipelineResult<AltitudeBin> {
        let (alt_min, alt_max) = (edges[index], edges[index + 1]);
        if self.count == 0 {
            return Err(PipelineError::EmptyBin {
                bin: index,
                alt_min,
                alt_max,
            });
        }
        let n = self.count as f64;
        Ok(AltitudeBin {
            alt_min,
            alt_max,
            alt_center: (alt_min + alt_max) / 2.0,
            mean_power: self.power.map(|sum| sum / n),
            mean_ln_power: self.ln_power.map(|sum| sum / n),
            sample_count: self.count,
        })
    }
}

/// Averages power and log-power of the reduced trace in `n_bins` log-spaced
/// bins over its signal window.
///
/// Samples are walked once in ascending altitude. A sample above the current
/// bin's upper edge closes that bin and starts the next one, so each sample
/// lands in exactly one bin. Any bin left without samples is an error.
pub fn bin(reduced: &ReducedTrace, n_bins: usize) -> PipelineResult<AltitudeBinning> {
    let edges = log_edges(reduced.alt_min, reduced.alt_max, n_bins)?;
    let power = [
        reduced.power(Channel::Wavelength1),
        reduced.power(Channel::Wavelength2),
    ];
    let ln_power = [
        reduced.ln_power(Channel::Wavelength1),
        reduced.ln_power(Channel::Wavelength2),
    ];

    let mut bins = Vec::with_capacity(n_bins);
    let mut current = 0;
    let mut acc = Accumulator::default();
    for (idx, &alt) in reduced.altitude.iter().enumerate() {
        while alt > edges[current + 1] && current + 1 < n_bins {
            bins.push(std::mem::take(&mut acc).close(current, &edges)?);
            current += 1;
        }
        acc.add(
            [power[0][idx], power[1][idx]],
            [ln_power[0][idx], ln_power[1][idx]],
        );
    }
    bins.push(acc.close(current, &edges)?);
    if bins.len() < n_bins {
        let missing = bins.len();
        return Err(PipelineError::EmptyBin {
            bin: missing,
            alt_min: edges[missing],
            alt_max: edges[missing + 1],
        });
    }

    Ok(AltitudeBinning { edges, bins })
}

/// Stage wrapper running [`bin`] with the configured bin count.
pub struct Binner {
    n_bins: usize,
    logger: LogManager,
}

impl Binner {
    pub fn new(config: &PipelineConfig, logger: LogManager) -> Self {
        Self {
            n_bins: config.n_bins,
            logger,
        }
    }
}

impl ProcessingStage for Binner {
    type Input = ReducedTrace;
    type Output = AltitudeBinning;

    fn name(&self) -> &'static str {
        "bin"
    }

    fn execute(&self, input: &ReducedTrace) -> PipelineResult<AltitudeBinning> {
        let binning = bin(input, self.n_bins)?;
        let lowest = &binning.bins()[0];
        self.logger.record(&format!(
            "binned {} samples into {} bins, lowest bin ln power ({:.4}, {:.4})",
            binning.total_samples(),
            binning.n_bins(),
            lowest.ln_power(Channel::Wavelength1),
            lowest.ln_power(Channel::Wavelength2)
        ));
        Ok(binning)
    }
}
