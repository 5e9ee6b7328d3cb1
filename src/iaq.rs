//! Pseudo air-quality indicator derived from gas resistance.
//!
//! This is a heuristic. It compares the current gas resistance against a caller-supplied
//! clean-air baseline and nothing else; it is **not** a certified or calibrated air-quality
//! index and must not be presented as one.

use crate::Gas;

/// Unitless score from 0 (at or above baseline) to [`IaqScore::MAX`] (far below baseline).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IaqScore(pub u16);

impl IaqScore {
    pub const MAX: IaqScore = IaqScore(500);
}

/// Strategy turning a gas resistance and a baseline into a score.
pub trait IaqEstimator {
    fn estimate(&self, gas: Gas, baseline: Gas) -> IaqScore;
}

/// Scores the log2 ratio `baseline / gas`, scaled linearly so that
/// `full_scale_octaves` halvings of the resistance reach [`IaqScore::MAX`].
///
/// Lower resistance means more reducing gases (VOCs), so the score rises as the
/// resistance drops below the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRatioIaq {
    pub full_scale_octaves: u8,
}

impl Default for LogRatioIaq {
    fn default() -> Self {
        LogRatioIaq {
            full_scale_octaves: 7,
        }
    }
}

/// log2 in Q8 fixed point, with linear interpolation of the mantissa. `x` must be non-zero.
fn log2_q8(x: u32) -> u32 {
    let int = x.ilog2();
    let frac = if int >= 8 {
        (x >> (int - 8)) & 0xFF
    } else {
        (x << (8 - int)) & 0xFF
    };
    (int << 8) | frac
}

impl IaqEstimator for LogRatioIaq {
    fn estimate(&self, gas: Gas, baseline: Gas) -> IaqScore {
        if gas.0 >= baseline.0 {
            return IaqScore(0);
        }
        if gas.0 == 0 {
            return IaqScore::MAX;
        }
        let octaves_q8 = log2_q8(baseline.0) - log2_q8(gas.0);
        let full_scale_q8 = (self.full_scale_octaves.max(1) as u32) << 8;
        let score = (IaqScore::MAX.0 as u32 * octaves_q8) / full_scale_q8;
        IaqScore(score.min(IaqScore::MAX.0 as u32) as u16)
    }
}
