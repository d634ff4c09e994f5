use crate::prelude::QualityThresholds;
use crate::processing::binning::AltitudeBinning;
use crate::processing::klett::ChannelProfile;
use serde::{Deserialize, Serialize};

/// Optical depth `sum alpha_i * width_i` over the profile bins centered at or
/// below `h_max`.
pub fn optical_depth(profile: &ChannelProfile, binning: &AltitudeBinning, h_max: f64) -> f64 {
    profile
        .alpha
        .iter()
        .zip(binning.bins())
        .take_while(|(_, bin)| bin.alt_center <= h_max)
        .map(|(alpha, bin)| alpha * bin.width())
        .sum()
}

/// Run quality with the default thresholds.
pub fn is_good(tau1: f64, tau2: f64) -> bool {
    QualityThresholds::default().is_good(tau1, tau2)
}

/// Two-way atmospheric transmission for an optical depth.
pub fn transmission(tau: f64) -> f64 {
    (-2.0 * tau).exp()
}

/// Change of transmission between two runs, typically the first and last of a night.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransmissionChange {
    pub start: f64,
    pub end: f64,
    pub relative: f64,
}

impl TransmissionChange {
    pub fn between(tau_start: f64, tau_end: f64) -> Self {
        let start = transmission(tau_start);
        let end = transmission(tau_end);
        Self {
            start,
            end,
            relative: (end - start) / start,
        }
    }
}
