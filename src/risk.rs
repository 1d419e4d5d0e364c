//! Risk classification
//!
//! Maps posture metrics to an ordinal [`RiskLevel`]. Two decision tables exist
//! historically; a session picks exactly one through [`RiskTable`] and keeps it
//! for its whole lifetime so taxonomies are never mixed.

use crate::types::{RiskLevel, ScoreResult};
use serde::{Deserialize, Serialize};

/// Decision table used to classify risk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTable {
    /// Five-tier table on (score, fatigue)
    #[default]
    Canonical,
    /// Weighted four-tier table on (alignment, symmetry, stability), never `Critical`
    Composite,
}

impl RiskTable {
    pub fn classify(&self, result: &ScoreResult) -> RiskLevel {
        match self {
            RiskTable::Canonical => classify_risk(result.score, result.fatigue),
            RiskTable::Composite => {
                classify_composite(result.alignment, result.symmetry, result.stability)
            }
        }
    }
}

/// Classify risk from score and fatigue (canonical five-tier table).
///
/// ```text
/// CRITICAL  score < 40 or fatigue > 85
/// SEVERE    score < 55 or fatigue > 70
/// HIGH      score < 70 or fatigue > 50
/// MODERATE  score < 85 or fatigue > 30
/// LOW       otherwise
/// ```
///
/// Non-finite inputs classify as `High`.
pub fn classify_risk(score: f64, fatigue: f64) -> RiskLevel {
    if !score.is_finite() || !fatigue.is_finite() {
        return RiskLevel::High;
    }

    if score < 40.0 || fatigue > 85.0 {
        RiskLevel::Critical
    } else if score < 55.0 || fatigue > 70.0 {
        RiskLevel::Severe
    } else if score < 70.0 || fatigue > 50.0 {
        RiskLevel::High
    } else if score < 85.0 || fatigue > 30.0 {
        RiskLevel::Moderate
    } else {
        RiskLevel::Low
    }
}

/// Classify risk from the weighted composite of the three posture axes.
///
/// Composite = `alignment×0.45 + symmetry×0.3 + stability×0.25`, then
/// `LOW ≥ 80`, `MODERATE ≥ 60`, `HIGH ≥ 40`, else `SEVERE`.
pub fn classify_composite(alignment: f64, symmetry: f64, stability: f64) -> RiskLevel {
    let composite = alignment * 0.45 + symmetry * 0.3 + stability * 0.25;
    if !composite.is_finite() {
        return RiskLevel::High;
    }

    if composite >= 80.0 {
        RiskLevel::Low
    } else if composite >= 60.0 {
        RiskLevel::Moderate
    } else if composite >= 40.0 {
        RiskLevel::High
    } else {
        RiskLevel::Severe
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FrameQuality;
    use proptest::prelude::*;

    #[test]
    fn test_canonical_tiers() {
        assert_eq!(classify_risk(100.0, 0.0), RiskLevel::Low);
        assert_eq!(classify_risk(80.0, 0.0), RiskLevel::Moderate);
        assert_eq!(classify_risk(90.0, 40.0), RiskLevel::Moderate);
        assert_eq!(classify_risk(60.0, 0.0), RiskLevel::High);
        assert_eq!(classify_risk(90.0, 60.0), RiskLevel::High);
        assert_eq!(classify_risk(50.0, 0.0), RiskLevel::Severe);
        assert_eq!(classify_risk(90.0, 75.0), RiskLevel::Severe);
        assert_eq!(classify_risk(30.0, 0.0), RiskLevel::Critical);
        assert_eq!(classify_risk(90.0, 90.0), RiskLevel::Critical);
    }

    #[test]
    fn test_canonical_boundaries() {
        // thresholds are strict: the boundary value belongs to the better tier
        assert_eq!(classify_risk(40.0, 0.0), RiskLevel::Severe);
        assert_eq!(classify_risk(55.0, 0.0), RiskLevel::High);
        assert_eq!(classify_risk(70.0, 0.0), RiskLevel::Moderate);
        assert_eq!(classify_risk(85.0, 0.0), RiskLevel::Low);
        assert_eq!(classify_risk(100.0, 85.0), RiskLevel::Severe);
        assert_eq!(classify_risk(100.0, 30.0), RiskLevel::Low);
    }

    #[test]
    fn test_non_finite_is_high() {
        assert_eq!(classify_risk(f64::NAN, 0.0), RiskLevel::High);
        assert_eq!(classify_risk(100.0, f64::INFINITY), RiskLevel::High);
        assert_eq!(classify_composite(f64::NAN, 100.0, 100.0), RiskLevel::High);
    }

    #[test]
    fn test_composite_tiers() {
        assert_eq!(classify_composite(100.0, 100.0, 100.0), RiskLevel::Low);
        assert_eq!(classify_composite(90.0, 85.0, 80.0), RiskLevel::Low);
        assert_eq!(classify_composite(70.0, 70.0, 70.0), RiskLevel::Moderate);
        assert_eq!(classify_composite(50.0, 50.0, 50.0), RiskLevel::High);
        assert_eq!(classify_composite(0.0, 0.0, 0.0), RiskLevel::Severe);
    }

    #[test]
    fn test_table_dispatch() {
        let result = ScoreResult {
            alignment: 70.0,
            symmetry: 70.0,
            stability: 70.0,
            fatigue: 95.0,
            score: 60.0,
            quality: FrameQuality::Measured,
            fallback: false,
            penalties: None,
        };

        assert_eq!(RiskTable::Canonical.classify(&result), RiskLevel::Critical);
        assert_eq!(RiskTable::Composite.classify(&result), RiskLevel::Moderate);
    }

    #[test]
    fn test_ordering() {
        assert!(RiskLevel::Low < RiskLevel::Moderate);
        assert!(RiskLevel::Moderate < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Severe);
        assert!(RiskLevel::Severe < RiskLevel::Critical);
    }

    proptest! {
        #[test]
        fn prop_risk_never_improves_as_score_drops(
            a in 0.0..=100.0f64,
            b in 0.0..=100.0f64,
            fatigue in 0.0..=100.0f64,
        ) {
            let (high, low) = if a >= b { (a, b) } else { (b, a) };
            prop_assert!(classify_risk(low, fatigue) >= classify_risk(high, fatigue));
        }

        #[test]
        fn prop_risk_never_improves_as_fatigue_rises(
            score in 0.0..=100.0f64,
            a in 0.0..=100.0f64,
            b in 0.0..=100.0f64,
        ) {
            let (high, low) = if a >= b { (a, b) } else { (b, a) };
            prop_assert!(classify_risk(score, high) >= classify_risk(score, low));
        }

        #[test]
        fn prop_composite_never_critical(
            alignment in 0.0..=100.0f64,
            symmetry in 0.0..=100.0f64,
            stability in 0.0..=100.0f64,
        ) {
            prop_assert!(classify_composite(alignment, symmetry, stability) < RiskLevel::Critical);
        }
    }
}
