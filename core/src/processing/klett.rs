use crate::math::StatsHelper;
use crate::prelude::{
    check_alpha0, Channel, PipelineConfig, PipelineError, PipelineResult, ProcessingStage,
};
use crate::processing::binning::AltitudeBinning;
use crate::telemetry::log::LogManager;
use serde::{Deserialize, Serialize};

/// Extinction coefficients of one wavelength for bins `0..=r0_bin`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelProfile {
    pub channel: Channel,
    pub r0: f64,
    pub r0_bin: usize,
    pub alpha0: f64,
    pub alpha: Vec<f64>,
}

/// Klett extinction profiles of both wavelengths of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KlettProfile {
    pub channels: [ChannelProfile; 2],
}

impl KlettProfile {
    pub fn channel(&self, channel: Channel) -> &ChannelProfile {
        &self.channels[channel.index()]
    }
}

/// Highest bin whose center does not exceed `r0`.
///
/// `r0` must lie inside the binned altitude range and at or above the first
/// bin center; anything else is reported rather than clamped. An `r0` above
/// the top bin center but still at or below the top edge selects the top
/// bin, since that bin contains it; this keeps the default `r0 = alt_max`
/// usable. Only `r0` beyond the top edge is `OutOfRange`.
pub fn reference_bin(binning: &AltitudeBinning, r0: f64) -> PipelineResult<usize> {
    let (low, high) = binning.range();
    let out_of_range = PipelineError::OutOfRange { r0, low, high };
    if !r0.is_finite() || r0 < low || r0 > high {
        return Err(out_of_range);
    }
    let below = binning
        .bins()
        .partition_point(|bin| bin.alt_center <= r0);
    below.checked_sub(1).ok_or(out_of_range)
}

/// Runs the backward Klett recurrence for one channel, anchored at the bin
/// holding `r0` with extinction `alpha0`:
///
/// ```text
/// I       = (P[i+1] + P[i]) / 2 * (c[i+1] - c[i])
/// alpha_i = P[i] / (P[i+1] / alpha_{i+1} - 2 I)
/// ```
pub fn invert_channel(
    binning: &AltitudeBinning,
    channel: Channel,
    r0: f64,
    alpha0: f64,
) -> PipelineResult<ChannelProfile> {
    check_alpha0(alpha0)?;
    let r0_bin = reference_bin(binning, r0)?;
    let bins = binning.bins();

    let mut alpha = vec![0.0; r0_bin + 1];
    alpha[r0_bin] = alpha0;
    for i in (0..r0_bin).rev() {
        let (lower, upper) = (&bins[i], &bins[i + 1]);
        let integral = StatsHelper::trapezoid(
            lower.power(channel),
            upper.power(channel),
            lower.alt_center,
            upper.alt_center,
        );
        let value = lower.power(channel) / (upper.power(channel) / alpha[i + 1] - 2.0 * integral);
        if !value.is_finite() || value <= 0.0 {
            return Err(PipelineError::InversionDiverged {
                channel,
                bin: i,
                value,
            });
        }
        alpha[i] = value;
    }

    Ok(ChannelProfile {
        channel,
        r0,
        r0_bin,
        alpha0,
        alpha,
    })
}

/// Inverts both channels against the same reference altitude.
pub fn invert_klett(
    binning: &AltitudeBinning,
    r0: f64,
    alpha0_ch1: f64,
    alpha0_ch2: f64,
) -> PipelineResult<KlettProfile> {
    Ok(KlettProfile {
        channels: [
            invert_channel(binning, Channel::Wavelength1, r0, alpha0_ch1)?,
            invert_channel(binning, Channel::Wavelength2, r0, alpha0_ch2)?,
        ],
    })
}

/// Stage wrapper running [`invert_klett`] with the configured reference.
pub struct KlettInverter {
    r0: f64,
    alpha0: [f64; 2],
    logger: LogManager,
}

impl KlettInverter {
    pub fn new(config: &PipelineConfig, logger: LogManager) -> Self {
        Self {
            r0: config.r0,
            alpha0: [config.alpha0_ch1, config.alpha0_ch2],
            logger,
        }
    }
}

impl ProcessingStage for KlettInverter {
    type Input = AltitudeBinning;
    type Output = KlettProfile;

    fn name(&self) -> &'static str {
        "klett"
    }

    fn execute(&self, input: &AltitudeBinning) -> PipelineResult<KlettProfile> {
        let profile = invert_klett(input, self.r0, self.alpha0[0], self.alpha0[1])?;
        let r0_bin = profile.channel(Channel::Wavelength1).r0_bin;
        self.logger.record(&format!(
            "Klett inversion done from bin {} (center {:.3} km)",
            r0_bin,
            input.bins()[r0_bin].alt_center
        ));
        Ok(profile)
    }
}
