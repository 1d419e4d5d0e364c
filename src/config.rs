//! Engine configuration
//!
//! All thresholds and timing windows used by the geometry extractor, the alert
//! engine and the risk classifier. Defaults reproduce the reference behavior.

use crate::error::MonitorError;
use crate::risk::RiskTable;
use serde::{Deserialize, Serialize};

/// Default minimum keypoint visibility
pub const DEFAULT_MIN_VISIBILITY: f64 = 0.5;

/// Default sustain window (milliseconds)
pub const DEFAULT_SUSTAIN_MS: i64 = 1000;

/// Default global alert cooldown (milliseconds)
pub const DEFAULT_COOLDOWN_MS: i64 = 3000;

/// Configuration for a monitoring session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Keypoints below this visibility are treated as missing
    pub min_visibility: f64,
    /// Continuous violation required before an alert fires (ms)
    pub sustain_ms: i64,
    /// Minimum time between any two fired alerts (ms)
    pub cooldown_ms: i64,
    /// Forward head when the neck angle drops below this (degrees)
    pub neck_angle_min_deg: f64,
    /// Slouch when the trunk angle exceeds this (degrees)
    pub trunk_angle_max_deg: f64,
    /// Shoulder alert when the shoulder tilt exceeds this (degrees)
    pub shoulder_tilt_max_deg: f64,
    /// Stability alert when stability drops below this (0-100)
    pub stability_min: f64,
    /// Decision table used for risk classification
    pub risk_table: RiskTable,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            min_visibility: DEFAULT_MIN_VISIBILITY,
            sustain_ms: DEFAULT_SUSTAIN_MS,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            neck_angle_min_deg: 165.0,
            trunk_angle_max_deg: 12.0,
            shoulder_tilt_max_deg: 8.0,
            stability_min: 70.0,
            risk_table: RiskTable::Canonical,
        }
    }
}

impl MonitorConfig {
    /// Load a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, MonitorError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, MonitorError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), MonitorError> {
        if !(0.0..=1.0).contains(&self.min_visibility) {
            return Err(MonitorError::InvalidConfig(format!(
                "min_visibility must be within [0, 1], got {}",
                self.min_visibility
            )));
        }
        if self.sustain_ms < 0 {
            return Err(MonitorError::InvalidConfig(format!(
                "sustain_ms must be non-negative, got {}",
                self.sustain_ms
            )));
        }
        if self.cooldown_ms < 0 {
            return Err(MonitorError::InvalidConfig(format!(
                "cooldown_ms must be non-negative, got {}",
                self.cooldown_ms
            )));
        }

        let thresholds = [
            ("neck_angle_min_deg", self.neck_angle_min_deg),
            ("trunk_angle_max_deg", self.trunk_angle_max_deg),
            ("shoulder_tilt_max_deg", self.shoulder_tilt_max_deg),
            ("stability_min", self.stability_min),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() || value < 0.0 {
                return Err(MonitorError::InvalidConfig(format!(
                    "{name} must be a non-negative finite number, got {value}"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(MonitorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = MonitorConfig::from_json(r#"{"cooldown_ms": 5000}"#).unwrap();
        assert_eq!(config.cooldown_ms, 5000);
        assert_eq!(config.sustain_ms, DEFAULT_SUSTAIN_MS);
        assert_eq!(config.risk_table, RiskTable::Canonical);
    }

    #[test]
    fn test_risk_table_from_json() {
        let config = MonitorConfig::from_json(r#"{"risk_table": "composite"}"#).unwrap();
        assert_eq!(config.risk_table, RiskTable::Composite);
    }

    #[test]
    fn test_rejects_bad_visibility() {
        let result = MonitorConfig::from_json(r#"{"min_visibility": 1.5}"#);
        assert!(matches!(result, Err(MonitorError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_negative_windows() {
        let config = MonitorConfig {
            sustain_ms: -1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_non_finite_threshold() {
        let config = MonitorConfig {
            trunk_angle_max_deg: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_json() {
        let result = MonitorConfig::from_json("not json");
        assert!(matches!(result, Err(MonitorError::JsonError(_))));
    }
}
