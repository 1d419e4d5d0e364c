//! Session orchestration
//!
//! This module provides the stateful entry point for a monitored user. A
//! [`PostureSession`] owns the threaded temporal state (geometry snapshot and
//! alert debounce state) and runs each frame through the full engine:
//! geometry → metrics → risk → alerts.
//!
//! Sessions share nothing, so many can run side by side in a [`SessionArena`].

use crate::alerts::{AlertDebounceState, AlertEngine};
use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::fallback::run_degraded;
use crate::geometry::GeometryExtractor;
use crate::metrics::MetricComposer;
use crate::types::{
    AlertEvent, AlertType, Frame, FrameQuality, GeometrySnapshot, RiskLevel, ScoreResult,
    Telemetry,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;
use uuid::Uuid;

/// Output of one session tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickOutput {
    pub timestamp_ms: i64,
    pub result: ScoreResult,
    pub risk: RiskLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telemetry: Option<Telemetry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert: Option<AlertEvent>,
}

/// Running aggregates for a session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Caller-supplied wall-clock start of the session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    pub frames: u64,
    pub measured_frames: u64,
    pub missing_landmark_frames: u64,
    pub invalid_frames: u64,
    pub synthetic_frames: u64,
    /// Sum of scores over measured and synthetic frames
    pub score_sum: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worst_risk: Option<RiskLevel>,
    pub alerts: BTreeMap<AlertType, u64>,
    /// Latest bad-frame counter (diagnostic)
    pub bad_frames: f64,
    /// Latest fatigue accumulator
    pub fatigue_accumulator: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_timestamp_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_timestamp_ms: Option<i64>,
}

impl SessionSummary {
    /// Mean score over measured and synthetic frames
    pub fn mean_score(&self) -> Option<f64> {
        let scored = self.measured_frames + self.synthetic_frames;
        if scored == 0 {
            return None;
        }
        Some(self.score_sum / scored as f64)
    }

    /// Elapsed frame time between the first and latest tick
    pub fn duration_ms(&self) -> i64 {
        match (self.first_timestamp_ms, self.last_timestamp_ms) {
            (Some(first), Some(last)) => last.saturating_sub(first).max(0),
            _ => 0,
        }
    }

    /// Wall-clock end derived from `started_at` and the elapsed frame time.
    ///
    /// `None` without a start time or when the end is not representable.
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        let elapsed = Duration::try_milliseconds(self.duration_ms())?;
        self.started_at?.checked_add_signed(elapsed)
    }

    pub fn total_alerts(&self) -> u64 {
        self.alerts.values().sum()
    }

    fn record(&mut self, output: &TickOutput, bad_frames: f64, fatigue_accumulator: f64) {
        self.frames += 1;
        match output.result.quality {
            FrameQuality::Measured => self.measured_frames += 1,
            FrameQuality::MissingLandmarks => self.missing_landmark_frames += 1,
            FrameQuality::InvalidFrame => self.invalid_frames += 1,
            FrameQuality::Synthetic => self.synthetic_frames += 1,
        }
        if matches!(
            output.result.quality,
            FrameQuality::Measured | FrameQuality::Synthetic
        ) {
            self.score_sum += output.result.score;
        }

        self.worst_risk = Some(match self.worst_risk {
            Some(worst) => worst.max(output.risk),
            None => output.risk,
        });
        if let Some(alert) = &output.alert {
            *self.alerts.entry(alert.alert_type).or_insert(0) += 1;
        }

        self.bad_frames = bad_frames;
        self.fatigue_accumulator = fatigue_accumulator;
        self.first_timestamp_ms.get_or_insert(output.timestamp_ms);
        self.last_timestamp_ms = Some(output.timestamp_ms);
    }
}

/// Persisted form of a session's threaded state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: Uuid,
    #[serde(default)]
    pub snapshot: Option<GeometrySnapshot>,
    #[serde(default)]
    pub debounce: AlertDebounceState,
    #[serde(default)]
    pub degraded_since_ms: Option<i64>,
    #[serde(default)]
    pub summary: SessionSummary,
}

/// One monitored user's session.
///
/// Calls must be serialized by the caller; the session never reads the clock
/// and every timestamp comes from the frames or explicit arguments.
#[derive(Debug, Clone)]
pub struct PostureSession {
    id: Uuid,
    config: MonitorConfig,
    composer: MetricComposer,
    alerts: AlertEngine,
    snapshot: Option<GeometrySnapshot>,
    debounce: AlertDebounceState,
    degraded_since_ms: Option<i64>,
    summary: SessionSummary,
}

impl Default for PostureSession {
    fn default() -> Self {
        Self::new()
    }
}

impl PostureSession {
    /// Create a new session with default settings
    pub fn new() -> Self {
        Self::build(Uuid::new_v4(), MonitorConfig::default())
    }

    /// Create a session with a validated configuration
    pub fn with_config(config: MonitorConfig) -> Result<Self, MonitorError> {
        config.validate()?;
        Ok(Self::build(Uuid::new_v4(), config))
    }

    /// Create a session with an explicit id
    pub fn with_id(id: Uuid, config: MonitorConfig) -> Result<Self, MonitorError> {
        config.validate()?;
        Ok(Self::build(id, config))
    }

    fn build(id: Uuid, config: MonitorConfig) -> Self {
        Self {
            id,
            composer: MetricComposer::new(GeometryExtractor::new(config.min_visibility)),
            alerts: AlertEngine::from_config(&config),
            config,
            snapshot: None,
            debounce: AlertDebounceState::new(),
            degraded_since_ms: None,
            summary: SessionSummary::default(),
        }
    }

    /// Record the wall-clock start of the session for reporting
    pub fn started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.summary.started_at = Some(started_at);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn snapshot(&self) -> Option<&GeometrySnapshot> {
        self.snapshot.as_ref()
    }

    pub fn debounce_state(&self) -> &AlertDebounceState {
        &self.debounce
    }

    pub fn summary(&self) -> &SessionSummary {
        &self.summary
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded_since_ms.is_some()
    }

    /// Process one frame.
    ///
    /// Once degraded, frames are ignored and the synthesizer runs at the
    /// frame's timestamp instead.
    pub fn tick(&mut self, frame: &Frame) -> TickOutput {
        if self.degraded_since_ms.is_some() {
            return self.tick_degraded(frame.timestamp_ms);
        }

        let now_ms = frame.timestamp_ms;
        let (result, snapshot) = self.composer.compose(frame, self.snapshot.as_ref(), now_ms);

        let risk = match result.quality {
            FrameQuality::Measured => self.config.risk_table.classify(&result),
            _ => RiskLevel::High,
        };
        let telemetry = snapshot
            .geometry
            .as_ref()
            .map(|geometry| Telemetry::from_geometry(geometry, result.stability));
        let alert = self
            .alerts
            .evaluate(telemetry.as_ref(), &mut self.debounce, now_ms);

        let output = TickOutput {
            timestamp_ms: now_ms,
            result,
            risk,
            telemetry,
            alert,
        };
        self.summary
            .record(&output, snapshot.bad_frames, snapshot.fatigue_accumulator);
        self.snapshot = Some(snapshot);
        output
    }

    /// Switch to degraded mode for the rest of the session.
    ///
    /// Idempotent: the first entry time is kept. There is no automatic return
    /// to the real frame source.
    pub fn enter_degraded(&mut self, now_ms: i64) {
        if self.degraded_since_ms.is_none() {
            warn!(session = %self.id, now_ms, "keypoint source unavailable, entering degraded mode");
            self.degraded_since_ms = Some(now_ms);
        }
    }

    /// Produce a synthetic tick; enters degraded mode if not already in it
    pub fn tick_degraded(&mut self, now_ms: i64) -> TickOutput {
        self.enter_degraded(now_ms);
        let since = self.degraded_since_ms.unwrap_or(now_ms);

        let result = run_degraded(now_ms.saturating_sub(since));
        let risk = self.config.risk_table.classify(&result);
        let output = TickOutput {
            timestamp_ms: now_ms,
            result,
            risk,
            telemetry: None,
            alert: None,
        };

        let (bad_frames, fatigue_accumulator) = self
            .snapshot
            .as_ref()
            .map_or((0.0, 0.0), |s| (s.bad_frames, s.fatigue_accumulator));
        self.summary.record(&output, bad_frames, fatigue_accumulator);
        output
    }

    /// Export the threaded state
    pub fn state(&self) -> SessionState {
        SessionState {
            session_id: self.id,
            snapshot: self.snapshot.clone(),
            debounce: self.debounce.clone(),
            degraded_since_ms: self.degraded_since_ms,
            summary: self.summary.clone(),
        }
    }

    /// Save the threaded state to JSON
    pub fn save_state(&self) -> Result<String, MonitorError> {
        Ok(serde_json::to_string(&self.state())?)
    }

    /// Restore threaded state from JSON, keeping this session's configuration
    pub fn load_state(&mut self, json: &str) -> Result<(), MonitorError> {
        let state: SessionState = serde_json::from_str(json)?;
        self.restore(state)
    }

    pub fn restore(&mut self, state: SessionState) -> Result<(), MonitorError> {
        if let Some(snapshot) = &state.snapshot {
            if !snapshot.bad_frames.is_finite() || !snapshot.fatigue_accumulator.is_finite() {
                return Err(MonitorError::StateError(
                    "snapshot integrators must be finite".to_string(),
                ));
            }
        }

        self.id = state.session_id;
        self.snapshot = state.snapshot;
        self.debounce = state.debounce;
        self.degraded_since_ms = state.degraded_since_ms;
        self.summary = state.summary;
        Ok(())
    }
}

/// Independent sessions keyed by id
#[derive(Debug, Default)]
pub struct SessionArena {
    config: MonitorConfig,
    sessions: HashMap<Uuid, PostureSession>,
}

impl SessionArena {
    /// Create an arena whose sessions share a configuration (not state)
    pub fn new(config: MonitorConfig) -> Result<Self, MonitorError> {
        config.validate()?;
        Ok(Self {
            config,
            sessions: HashMap::new(),
        })
    }

    /// Open a new session and return its id
    pub fn open(&mut self) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions
            .insert(id, PostureSession::build(id, self.config.clone()));
        id
    }

    /// Add an existing session, replacing any session with the same id
    pub fn insert(&mut self, session: PostureSession) -> Uuid {
        let id = session.id();
        self.sessions.insert(id, session);
        id
    }

    pub fn get(&self, id: &Uuid) -> Option<&PostureSession> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &Uuid) -> Option<&mut PostureSession> {
        self.sessions.get_mut(id)
    }

    pub fn tick(&mut self, id: &Uuid, frame: &Frame) -> Result<TickOutput, MonitorError> {
        self.sessions
            .get_mut(id)
            .map(|session| session.tick(frame))
            .ok_or(MonitorError::UnknownSession(*id))
    }

    /// Close a session and return its final summary
    pub fn close(&mut self, id: &Uuid) -> Result<SessionSummary, MonitorError> {
        self.sessions
            .remove(id)
            .map(|session| session.summary)
            .ok_or(MonitorError::UnknownSession(*id))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
