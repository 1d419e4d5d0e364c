//! Alert debouncing
//!
//! Each alert type is a small state machine (`Idle → Accumulating → Fired`)
//! driven by per-tick telemetry. A global cooldown gates every transition
//! that could fire, and simultaneous violations resolve by fixed priority:
//! `forward_head > slouch > shoulder > stability`. At most one alert fires
//! per tick.

use crate::config::MonitorConfig;
use crate::geometry::GeometryExtractor;
use crate::types::{AlertEvent, AlertType, Frame, Telemetry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Debounce state of a single alert type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ChannelState {
    /// Not violating
    #[default]
    Idle,
    /// Violating continuously since `since_ms`, not yet fired
    Accumulating { since_ms: i64 },
    /// Fired at `at_ms`; a continuing violation re-arms from that instant
    Fired { at_ms: i64 },
}

impl ChannelState {
    /// Start of the current sustain window, if any
    pub fn first_violation_at(&self) -> Option<i64> {
        match *self {
            ChannelState::Idle => None,
            ChannelState::Accumulating { since_ms } => Some(since_ms),
            ChannelState::Fired { at_ms } => Some(at_ms),
        }
    }
}

/// Debounce state owned by one monitoring session
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AlertDebounceState {
    /// Non-idle channels; absent entries are `Idle`
    channels: BTreeMap<AlertType, ChannelState>,
    /// When the last alert of any type fired
    last_fired_at_ms: Option<i64>,
}

impl AlertDebounceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channel(&self, alert_type: AlertType) -> ChannelState {
        self.channels.get(&alert_type).copied().unwrap_or_default()
    }

    pub fn first_violation_at(&self, alert_type: AlertType) -> Option<i64> {
        self.channel(alert_type).first_violation_at()
    }

    pub fn last_fired_at(&self) -> Option<i64> {
        self.last_fired_at_ms
    }

    fn set(&mut self, alert_type: AlertType, state: ChannelState) {
        match state {
            ChannelState::Idle => {
                self.channels.remove(&alert_type);
            }
            _ => {
                self.channels.insert(alert_type, state);
            }
        }
    }
}

/// Violation thresholds and timing windows
#[derive(Debug, Clone)]
pub struct AlertEngine {
    sustain_ms: i64,
    cooldown_ms: i64,
    neck_angle_min_deg: f64,
    trunk_angle_max_deg: f64,
    shoulder_tilt_max_deg: f64,
    stability_min: f64,
}

impl Default for AlertEngine {
    fn default() -> Self {
        Self::from_config(&MonitorConfig::default())
    }
}

impl AlertEngine {
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            sustain_ms: config.sustain_ms,
            cooldown_ms: config.cooldown_ms,
            neck_angle_min_deg: config.neck_angle_min_deg,
            trunk_angle_max_deg: config.trunk_angle_max_deg,
            shoulder_tilt_max_deg: config.shoulder_tilt_max_deg,
            stability_min: config.stability_min,
        }
    }

    /// Whether `alert_type` is violated by this telemetry
    pub fn is_violating(&self, alert_type: AlertType, telemetry: &Telemetry) -> bool {
        match alert_type {
            AlertType::ForwardHead => telemetry.neck_angle < self.neck_angle_min_deg,
            AlertType::Slouch => telemetry.trunk_angle > self.trunk_angle_max_deg,
            AlertType::Shoulder => telemetry.shoulder_tilt > self.shoulder_tilt_max_deg,
            AlertType::Stability => telemetry.stability < self.stability_min,
        }
    }

    /// Active violations in priority order
    pub fn active_violations(&self, telemetry: &Telemetry) -> Vec<AlertType> {
        AlertType::ALL
            .into_iter()
            .filter(|&t| self.is_violating(t, telemetry))
            .collect()
    }

    /// Evaluate one tick.
    ///
    /// `None` telemetry (geometry unavailable) skips the tick and leaves the
    /// state untouched. Otherwise:
    /// 1. channels that are not violating return to `Idle`
    /// 2. within the cooldown window nothing else happens
    /// 3. the highest-priority violator starts accumulating, or fires once
    ///    its sustain window has elapsed
    pub fn evaluate(
        &self,
        telemetry: Option<&Telemetry>,
        state: &mut AlertDebounceState,
        now_ms: i64,
    ) -> Option<AlertEvent> {
        let Some(telemetry) = telemetry else {
            trace!(now_ms, "telemetry unavailable, skipping alert evaluation");
            return None;
        };

        let active = self.active_violations(telemetry);
        for alert_type in AlertType::ALL {
            if !active.contains(&alert_type) {
                state.set(alert_type, ChannelState::Idle);
            }
        }

        if let Some(last) = state.last_fired_at_ms {
            if now_ms.saturating_sub(last) < self.cooldown_ms {
                return None;
            }
        }

        let alert_type = *active.first()?;
        match state.channel(alert_type).first_violation_at() {
            None => {
                state.set(alert_type, ChannelState::Accumulating { since_ms: now_ms });
                None
            }
            Some(since) if now_ms.saturating_sub(since) >= self.sustain_ms => {
                state.set(alert_type, ChannelState::Fired { at_ms: now_ms });
                state.last_fired_at_ms = Some(now_ms);
                debug!(
                    alert = alert_type.as_str(),
                    now_ms,
                    sustained_ms = now_ms.saturating_sub(since),
                    "posture alert fired"
                );
                Some(AlertEvent {
                    alert_type,
                    message: alert_type.message().to_string(),
                    telemetry: *telemetry,
                    fired_at_ms: now_ms,
                })
            }
            Some(_) => None,
        }
    }
}

/// Evaluate alerts for a frame with default thresholds.
///
/// `stability` is the current tick's stability metric. Frames without the
/// required landmarks are skipped.
pub fn evaluate_alerts(
    frame: &Frame,
    stability: f64,
    state: &mut AlertDebounceState,
    now_ms: i64,
) -> Option<AlertEvent> {
    let telemetry = GeometryExtractor::default().telemetry(frame, stability);
    AlertEngine::default().evaluate(telemetry.as_ref(), state, now_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::tests::{forward_head_frame, upright_frame};
    use pretty_assertions::assert_eq;

    fn good() -> Telemetry {
        Telemetry {
            neck_angle: 178.0,
            trunk_angle: 2.0,
            shoulder_tilt: 1.0,
            stability: 95.0,
        }
    }

    fn slouching() -> Telemetry {
        Telemetry {
            trunk_angle: 20.0,
            ..good()
        }
    }

    fn forward_and_slouching() -> Telemetry {
        Telemetry {
            neck_angle: 150.0,
            trunk_angle: 20.0,
            ..good()
        }
    }

    /// Drive the engine every `step` ms over `[from, to]`, collecting fired alerts
    fn drive(
        engine: &AlertEngine,
        state: &mut AlertDebounceState,
        telemetry: Telemetry,
        from: i64,
        to: i64,
        step: i64,
    ) -> Vec<AlertEvent> {
        let mut fired = Vec::new();
        let mut now = from;
        while now <= to {
            if let Some(event) = engine.evaluate(Some(&telemetry), state, now) {
                fired.push(event);
            }
            now += step;
        }
        fired
    }

    #[test]
    fn test_violation_thresholds() {
        let engine = AlertEngine::default();
        assert!(engine.active_violations(&good()).is_empty());

        let all = Telemetry {
            neck_angle: 160.0,
            trunk_angle: 13.0,
            shoulder_tilt: 9.0,
            stability: 60.0,
        };
        assert_eq!(engine.active_violations(&all), AlertType::ALL.to_vec());

        let boundary = Telemetry {
            neck_angle: 165.0,
            trunk_angle: 12.0,
            shoulder_tilt: 8.0,
            stability: 70.0,
        };
        assert!(engine.active_violations(&boundary).is_empty());
    }

    #[test]
    fn test_fires_once_at_sustain_mark() {
        let engine = AlertEngine::default();
        let mut state = AlertDebounceState::new();

        let fired = drive(&engine, &mut state, slouching(), 0, 900, 100);
        assert!(fired.is_empty());
        assert_eq!(state.first_violation_at(AlertType::Slouch), Some(0));

        let event = engine.evaluate(Some(&slouching()), &mut state, 1000).unwrap();
        assert_eq!(event.alert_type, AlertType::Slouch);
        assert_eq!(event.fired_at_ms, 1000);
        assert_eq!(event.message, AlertType::Slouch.message());
        assert_eq!(state.last_fired_at(), Some(1000));
        assert_eq!(state.first_violation_at(AlertType::Slouch), Some(1000));
    }

    #[test]
    fn test_cooldown_blocks_refire() {
        let engine = AlertEngine::default();
        let mut state = AlertDebounceState::new();

        let fired = drive(&engine, &mut state, slouching(), 0, 3900, 100);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].fired_at_ms, 1000);

        // cooldown ends at 4000 and the reset sustain window has long elapsed
        let refire = engine.evaluate(Some(&slouching()), &mut state, 4000).unwrap();
        assert_eq!(refire.alert_type, AlertType::Slouch);
    }

    #[test]
    fn test_cooldown_is_global() {
        let engine = AlertEngine::default();
        let mut state = AlertDebounceState::new();

        drive(&engine, &mut state, slouching(), 0, 1000, 100);
        let shoulder = Telemetry {
            shoulder_tilt: 15.0,
            ..good()
        };
        let fired = drive(&engine, &mut state, shoulder, 1100, 3900, 100);
        assert!(fired.is_empty());
        // timers do not start while cooling down
        assert_eq!(state.first_violation_at(AlertType::Shoulder), None);
    }

    #[test]
    fn test_recovery_resets_sustain_window() {
        let engine = AlertEngine::default();
        let mut state = AlertDebounceState::new();

        let mut fired = drive(&engine, &mut state, slouching(), 0, 600, 100);
        fired.extend(drive(&engine, &mut state, good(), 700, 700, 100));
        assert_eq!(state.channel(AlertType::Slouch), ChannelState::Idle);
        fired.extend(drive(&engine, &mut state, slouching(), 800, 1400, 100));

        assert!(fired.is_empty());
        assert_eq!(state.first_violation_at(AlertType::Slouch), Some(800));
    }

    #[test]
    fn test_priority_tie_break() {
        let engine = AlertEngine::default();
        let mut state = AlertDebounceState::new();

        let fired = drive(&engine, &mut state, forward_and_slouching(), 0, 1500, 100);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].alert_type, AlertType::ForwardHead);
        // lower-priority channel never started its timer
        assert_eq!(state.first_violation_at(AlertType::Slouch), None);
    }

    #[test]
    fn test_missing_telemetry_skips_tick() {
        let engine = AlertEngine::default();
        let mut state = AlertDebounceState::new();

        drive(&engine, &mut state, slouching(), 0, 500, 100);
        let before = state.clone();
        assert!(engine.evaluate(None, &mut state, 600).is_none());
        assert_eq!(state, before);

        // the gap does not break the sustain window
        let event = engine.evaluate(Some(&slouching()), &mut state, 1000);
        assert!(event.is_some());
    }

    #[test]
    fn test_custom_windows() {
        let config = MonitorConfig {
            sustain_ms: 0,
            cooldown_ms: 500,
            ..Default::default()
        };
        let engine = AlertEngine::from_config(&config);
        let mut state = AlertDebounceState::new();

        // with no sustain window the first tick only arms the channel
        let fired = drive(&engine, &mut state, slouching(), 0, 1000, 100);
        let times: Vec<i64> = fired.iter().map(|e| e.fired_at_ms).collect();
        assert_eq!(times, vec![100, 600]);
    }

    #[test]
    fn test_evaluate_alerts_from_frames() {
        let mut state = AlertDebounceState::new();
        let dx = 0.15 * 25.0_f64.to_radians().tan();

        let mut fired = Vec::new();
        for i in 0..=10 {
            let frame = forward_head_frame(i * 100, dx);
            fired.extend(evaluate_alerts(&frame, 95.0, &mut state, frame.timestamp_ms));
        }
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].alert_type, AlertType::ForwardHead);
        assert!(fired[0].telemetry.neck_angle < 165.0);

        let frame = upright_frame(1100);
        assert!(evaluate_alerts(&frame, 95.0, &mut state, 1100).is_none());
        assert_eq!(state.channel(AlertType::ForwardHead), ChannelState::Idle);
    }

    #[test]
    fn test_state_serialization() {
        let engine = AlertEngine::default();
        let mut state = AlertDebounceState::new();
        drive(&engine, &mut state, forward_and_slouching(), 0, 1000, 100);

        let json = serde_json::to_string(&state).unwrap();
        let loaded: AlertDebounceState = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, state);
        assert!(json.contains("forward_head"));
    }

    #[test]
    fn test_fired_channel_serializes_instant_only() {
        let engine = AlertEngine::default();
        let mut state = AlertDebounceState::new();
        drive(&engine, &mut state, slouching(), 0, 1000, 100);

        assert_eq!(
            state.channel(AlertType::Slouch),
            ChannelState::Fired { at_ms: 1000 }
        );
        let json = serde_json::to_value(state.channel(AlertType::Slouch)).unwrap();
        assert_eq!(json, serde_json::json!({ "state": "fired", "at_ms": 1000 }));
    }

    #[test]
    fn test_extreme_timestamps_do_not_overflow() {
        let engine = AlertEngine::default();
        let mut state = AlertDebounceState::new();

        // sustain and cooldown windows reaching past i64::MAX
        let start = i64::MAX - 1500;
        let fired = drive(&engine, &mut state, slouching(), start, i64::MAX - 100, 100);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].fired_at_ms, start + 1000);
        assert!(engine.evaluate(Some(&slouching()), &mut state, i64::MAX).is_none());

        // a timer armed at i64::MIN and a tick far in the future
        let mut state = AlertDebounceState::new();
        assert!(engine
            .evaluate(Some(&slouching()), &mut state, i64::MIN)
            .is_none());
        let event = engine.evaluate(Some(&slouching()), &mut state, i64::MAX);
        assert_eq!(event.map(|e| e.fired_at_ms), Some(i64::MAX));

        // a clock that jumps backwards after firing stays in cooldown
        assert!(engine
            .evaluate(Some(&slouching()), &mut state, i64::MIN)
            .is_none());
    }
}
