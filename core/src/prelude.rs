use crate::ingest::IngestError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Settings consumed by every stage of the run pipeline. Altitudes are in km.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub alt_min: f64,
    pub alt_max: f64,
    pub bkg_min: f64,
    pub bkg_max: f64,
    pub n_bins: usize,
    pub r0: f64,
    pub alpha0_ch1: f64,
    pub alpha0_ch2: f64,
    pub h_max: f64,
    pub thresholds: QualityThresholds,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            alt_min: 0.8,
            alt_max: 10.0,
            bkg_min: 20.0,
            bkg_max: 25.0,
            n_bins: 100,
            r0: 10.0,
            alpha0_ch1: 0.0038,
            alpha0_ch2: 0.018,
            h_max: 4.0,
            thresholds: QualityThresholds::default(),
        }
    }
}

impl PipelineConfig {
    /// Checks the settings that do not depend on the trace itself.
    pub fn validate(&self) -> PipelineResult<()> {
        check_window("signal", self.alt_min, self.alt_max)?;
        check_window("background", self.bkg_min, self.bkg_max)?;
        if self.alt_min <= 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "alt_min must be positive for log binning, got {}",
                self.alt_min
            )));
        }
        if self.n_bins == 0 {
            return Err(PipelineError::InvalidConfig("n_bins must be at least 1".into()));
        }
        check_alpha0(self.alpha0_ch1)?;
        check_alpha0(self.alpha0_ch2)?;
        if !self.h_max.is_finite() {
            return Err(PipelineError::InvalidConfig("h_max must be finite".into()));
        }
        Ok(())
    }

    pub fn alpha0(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Wavelength1 => self.alpha0_ch1,
            Channel::Wavelength2 => self.alpha0_ch2,
        }
    }
}

pub(crate) fn check_window(name: &str, min: f64, max: f64) -> PipelineResult<()> {
    if !min.is_finite() || !max.is_finite() || min >= max {
        return Err(PipelineError::InvalidConfig(format!(
            "{} window [{}, {}] is not a finite increasing range",
            name, min, max
        )));
    }
    Ok(())
}

pub(crate) fn check_alpha0(alpha0: f64) -> PipelineResult<()> {
    if !alpha0.is_finite() || alpha0 <= 0.0 {
        return Err(PipelineError::InvalidConfig(format!(
            "reference extinction must be positive, got {}",
            alpha0
        )));
    }
    Ok(())
}

/// Minimum optical depths a run must reach on each wavelength to be usable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    pub channel1: f64,
    pub channel2: f64,
}

impl QualityThresholds {
    pub const DEFAULT_CHANNEL1: f64 = 0.002;
    pub const DEFAULT_CHANNEL2: f64 = 0.01;

    pub fn is_good(&self, tau1: f64, tau2: f64) -> bool {
        tau1 >= self.channel1 && tau2 >= self.channel2
    }
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            channel1: Self::DEFAULT_CHANNEL1,
            channel2: Self::DEFAULT_CHANNEL2,
        }
    }
}

/// The two Lidar wavelengths recorded per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Wavelength1,
    Wavelength2,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Wavelength1, Channel::Wavelength2];

    /// Position of the channel in per-channel arrays.
    pub fn index(self) -> usize {
        match self {
            Channel::Wavelength1 => 0,
            Channel::Wavelength2 => 1,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Wavelength1 => write!(f, "WL1"),
            Channel::Wavelength2 => write!(f, "WL2"),
        }
    }
}

/// Common error type for stage execution.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("log of non-positive power {power} at altitude {altitude} ({channel})")]
    Domain {
        channel: Channel,
        altitude: f64,
        power: f64,
    },
    #[error("altitude bin {bin} ({alt_min:.4}, {alt_max:.4}] holds no samples")]
    EmptyBin { bin: usize, alt_min: f64, alt_max: f64 },
    #[error("reference altitude {r0} outside binned range [{low:.4}, {high:.4}]")]
    OutOfRange { r0: f64, low: f64, high: f64 },
    #[error("Klett inversion diverged for {channel} at bin {bin} (alpha = {value})")]
    InversionDiverged {
        channel: Channel,
        bin: usize,
        value: f64,
    },
    #[error("{window} window ({min}, {max}] holds no samples")]
    EmptyWindow {
        window: &'static str,
        min: f64,
        max: f64,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Ingestion(#[from] IngestError),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Trait describing one step of the run pipeline.
pub trait ProcessingStage {
    type Input;
    type Output;

    fn name(&self) -> &'static str;
    fn execute(&self, input: &Self::Input) -> PipelineResult<Self::Output>;
}
