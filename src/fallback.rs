//! Degraded-mode synthesis
//!
//! When the keypoint source cannot be initialized the session switches, for
//! good, to smooth synthetic metrics inside a "good posture" band. Results are
//! tagged `fallback = true` so consumers can tell them from real telemetry.

use crate::metrics::{clamp_pct, compute_score};
use crate::types::{FrameQuality, ScoreResult};
use std::ops::RangeInclusive;

/// Synthetic alignment band
pub const ALIGNMENT_BAND: RangeInclusive<f64> = 80.0..=88.0;

/// Synthetic symmetry band
pub const SYMMETRY_BAND: RangeInclusive<f64> = 85.0..=91.0;

/// Synthetic stability band
pub const STABILITY_BAND: RangeInclusive<f64> = 82.0..=90.0;

/// Produce a synthetic score result `elapsed_ms` after entering degraded mode.
///
/// ```text
/// alignment = 84 + 4·sin(t / 9)
/// symmetry  = 88 + 3·cos(t / 13)
/// stability = 86 + 4·sin(t / 7 + 1)
/// ```
///
/// with `t` in seconds. Fatigue carries only the instantaneous stability term,
/// and the score uses the regular composite formula.
pub fn run_degraded(elapsed_ms: i64) -> ScoreResult {
    let t = elapsed_ms.max(0) as f64 / 1000.0;

    let alignment = band_value(&ALIGNMENT_BAND, (t / 9.0).sin());
    let symmetry = band_value(&SYMMETRY_BAND, (t / 13.0).cos());
    let stability = band_value(&STABILITY_BAND, (t / 7.0 + 1.0).sin());
    let fatigue = clamp_pct((100.0 - stability) * 0.25);
    let score = compute_score(alignment, symmetry, stability, fatigue);

    ScoreResult {
        alignment,
        symmetry,
        stability,
        fatigue,
        score,
        quality: FrameQuality::Synthetic,
        fallback: true,
        penalties: None,
    }
}

/// Map a wave in [-1, 1] onto a band, staying inside it
fn band_value(band: &RangeInclusive<f64>, wave: f64) -> f64 {
    let center = (band.start() + band.end()) / 2.0;
    let amplitude = (band.end() - band.start()) / 2.0;
    (center + amplitude * wave).clamp(*band.start(), *band.end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::classify_risk;
    use crate::types::RiskLevel;

    #[test]
    fn test_tagged_as_fallback() {
        let result = run_degraded(0);
        assert!(result.fallback);
        assert_eq!(result.quality, FrameQuality::Synthetic);
        assert!(result.penalties.is_none());
    }

    #[test]
    fn test_values_stay_in_band() {
        for elapsed_ms in (0..600_000).step_by(250) {
            let result = run_degraded(elapsed_ms);
            assert!(ALIGNMENT_BAND.contains(&result.alignment));
            assert!(SYMMETRY_BAND.contains(&result.symmetry));
            assert!(STABILITY_BAND.contains(&result.stability));
            assert!((0.0..=100.0).contains(&result.score));
        }
    }

    #[test]
    fn test_synthetic_posture_is_good() {
        for elapsed_ms in (0..120_000).step_by(1000) {
            let result = run_degraded(elapsed_ms);
            assert!(classify_risk(result.score, result.fatigue) <= RiskLevel::Moderate);
        }
    }

    #[test]
    fn test_smooth_over_time() {
        let a = run_degraded(10_000);
        let b = run_degraded(10_200);
        assert!((a.alignment - b.alignment).abs() < 0.5);
        assert!((a.stability - b.stability).abs() < 0.5);
    }

    #[test]
    fn test_negative_elapsed_is_clamped() {
        assert_eq!(run_degraded(-500), run_degraded(0));
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(run_degraded(42_000), run_degraded(42_000));
    }
}
