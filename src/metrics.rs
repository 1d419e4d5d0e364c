//! Metric composition
//!
//! Combines body geometry with two leaky integrators (bad-frame counter and
//! fatigue accumulator) into alignment, symmetry, stability, fatigue and an
//! overall score. All temporal state is threaded through [`GeometrySnapshot`];
//! the composer itself holds no mutable state.

use crate::error::GeometryError;
use crate::geometry::GeometryExtractor;
use crate::types::{BodyGeometry, Frame, FrameQuality, GeometrySnapshot, Penalties, ScoreResult};
use tracing::trace;

/// Upper bound of the bad-frame counter
pub const MAX_BAD_FRAMES: f64 = 200.0;

/// Upper bound of the fatigue accumulator
pub const MAX_FATIGUE_ACCUMULATOR: f64 = 400.0;

/// Metric value substituted when geometry is unavailable
pub const NEUTRAL_METRIC: f64 = 50.0;

/// Metric composer for keypoint frames
#[derive(Debug, Clone, Default)]
pub struct MetricComposer {
    extractor: GeometryExtractor,
}

impl MetricComposer {
    pub fn new(extractor: GeometryExtractor) -> Self {
        Self { extractor }
    }

    pub fn extractor(&self) -> &GeometryExtractor {
        &self.extractor
    }

    /// Compose metrics for a frame.
    ///
    /// Pure given `(frame, previous, timestamp_ms)`. Frames without usable
    /// geometry yield neutral metrics instead of an error:
    /// - missing landmarks leave both integrators untouched
    /// - non-finite frames advance the integrators as a bad frame
    pub fn compose(
        &self,
        frame: &Frame,
        previous: Option<&GeometrySnapshot>,
        timestamp_ms: i64,
    ) -> (ScoreResult, GeometrySnapshot) {
        let bad_frames = previous.map_or(0.0, |p| bounded(p.bad_frames, MAX_BAD_FRAMES));
        let fatigue_accumulator = previous.map_or(0.0, |p| {
            bounded(p.fatigue_accumulator, MAX_FATIGUE_ACCUMULATOR)
        });

        match self.extractor.extract(frame, previous, timestamp_ms) {
            Ok(geometry) => {
                let previous_lean = previous
                    .and_then(|p| p.geometry.as_ref())
                    .map(|g| g.torso_lean_deg);
                compose_measured(geometry, previous_lean, bad_frames, fatigue_accumulator, timestamp_ms)
            }
            Err(GeometryError::MissingLandmarks(missing)) => {
                trace!(timestamp_ms, ?missing, "insufficient geometry, using neutral metrics");
                compose_neutral(
                    FrameQuality::MissingLandmarks,
                    bad_frames,
                    fatigue_accumulator,
                    timestamp_ms,
                )
            }
            Err(GeometryError::InvalidFrame) => {
                trace!(timestamp_ms, "non-finite frame counted as bad frame");
                let (bad_frames, fatigue_accumulator) =
                    step_integrators(true, 0.0, bad_frames, fatigue_accumulator);
                compose_neutral(
                    FrameQuality::InvalidFrame,
                    bad_frames,
                    fatigue_accumulator,
                    timestamp_ms,
                )
            }
        }
    }
}

/// Compose metrics with default extraction settings
pub fn compose_metrics(
    frame: &Frame,
    previous: Option<&GeometrySnapshot>,
    timestamp_ms: i64,
) -> (ScoreResult, GeometrySnapshot) {
    MetricComposer::default().compose(frame, previous, timestamp_ms)
}

fn compose_measured(
    geometry: BodyGeometry,
    previous_lean: Option<f64>,
    bad_frames: f64,
    fatigue_accumulator: f64,
    timestamp_ms: i64,
) -> (ScoreResult, GeometrySnapshot) {
    let penalties = compute_penalties(&geometry, previous_lean);

    let alignment = clamp_pct(
        100.0 - penalties.torso * 0.42 - penalties.neck * 0.38 - penalties.forward_head * 0.2,
    );
    let symmetry = clamp_pct(100.0 - penalties.shoulder * 0.55 - penalties.hip * 0.45);
    let stability = clamp_pct(100.0 - penalties.jitter * 0.65 - penalties.lean_delta * 0.35);

    let (bad_frames, fatigue_accumulator) = step_integrators(
        is_bad_frame(alignment, symmetry, stability),
        penalties.forward_head,
        bad_frames,
        fatigue_accumulator,
    );

    let fatigue = compute_fatigue(fatigue_accumulator, stability);
    let score = compute_score(alignment, symmetry, stability, fatigue);

    let result = ScoreResult {
        alignment,
        symmetry,
        stability,
        fatigue,
        score,
        quality: FrameQuality::Measured,
        fallback: false,
        penalties: Some(penalties),
    };
    let snapshot = GeometrySnapshot {
        timestamp_ms,
        geometry: Some(geometry),
        bad_frames,
        fatigue_accumulator,
    };
    (result, snapshot)
}

fn compose_neutral(
    quality: FrameQuality,
    bad_frames: f64,
    fatigue_accumulator: f64,
    timestamp_ms: i64,
) -> (ScoreResult, GeometrySnapshot) {
    let fatigue = compute_fatigue(fatigue_accumulator, NEUTRAL_METRIC);
    let score = compute_score(NEUTRAL_METRIC, NEUTRAL_METRIC, NEUTRAL_METRIC, fatigue);

    let result = ScoreResult {
        alignment: NEUTRAL_METRIC,
        symmetry: NEUTRAL_METRIC,
        stability: NEUTRAL_METRIC,
        fatigue,
        score,
        quality,
        fallback: false,
        penalties: None,
    };
    let snapshot = GeometrySnapshot {
        timestamp_ms,
        geometry: None,
        bad_frames,
        fatigue_accumulator,
    };
    (result, snapshot)
}

/// Penalties with the linear contracts:
///
/// ```text
/// torso        = |torsoLean°| × 3.2
/// neck         = |neckTilt°| × 3.8
/// forward_head = ((noseZ − shoulderMidZ) / bodyScale) × 120
/// shoulder     = (|shoulderOffset| / 0.2) × 100
/// hip          = (|hipOffset| / 0.2) × 100
/// jitter       = (velocity / 0.8) × 100
/// lean_delta   = |torsoLean° − previousTorsoLean°| × 4
/// ```
///
/// each clamped to [0, 100].
fn compute_penalties(geometry: &BodyGeometry, previous_lean: Option<f64>) -> Penalties {
    let forward_head_ratio =
        (geometry.nose.z - geometry.shoulder_mid.z) / geometry.body_scale;

    Penalties {
        torso: clamp_pct(geometry.torso_lean_deg.abs() * 3.2),
        neck: clamp_pct(geometry.neck_tilt_deg.abs() * 3.8),
        forward_head: clamp_pct(forward_head_ratio * 120.0),
        shoulder: clamp_pct((geometry.shoulder_level_offset.abs() / 0.2) * 100.0),
        hip: clamp_pct((geometry.hip_level_offset.abs() / 0.2) * 100.0),
        jitter: clamp_pct((geometry.velocity / 0.8) * 100.0),
        lean_delta: previous_lean
            .map(|prev| clamp_pct((geometry.torso_lean_deg - prev).abs() * 4.0))
            .unwrap_or(0.0),
    }
}

/// Any one weak axis marks the whole frame as bad
fn is_bad_frame(alignment: f64, symmetry: f64, stability: f64) -> bool {
    alignment < 65.0 || symmetry < 65.0 || stability < 60.0
}

/// Advance both leaky integrators by one frame
fn step_integrators(
    bad_frame: bool,
    forward_head_penalty: f64,
    bad_frames: f64,
    fatigue_accumulator: f64,
) -> (f64, f64) {
    let bad_delta = if bad_frame { 1.0 } else { -0.5 };
    let mut fatigue_delta = if bad_frame { 1.6 } else { -0.6 };
    if forward_head_penalty > 25.0 {
        fatigue_delta += 0.8;
    }

    (
        bounded(bad_frames + bad_delta, MAX_BAD_FRAMES),
        bounded(fatigue_accumulator + fatigue_delta, MAX_FATIGUE_ACCUMULATOR),
    )
}

/// Blend of the long-horizon load and the instantaneous stability penalty
fn compute_fatigue(fatigue_accumulator: f64, stability: f64) -> f64 {
    clamp_pct((fatigue_accumulator / MAX_FATIGUE_ACCUMULATOR) * 100.0 + (100.0 - stability) * 0.25)
}

/// Overall posture score
///
/// Formula: `alignment×0.38 + symmetry×0.24 + stability×0.26 + (100 − fatigue)×0.12`
pub(crate) fn compute_score(alignment: f64, symmetry: f64, stability: f64, fatigue: f64) -> f64 {
    clamp_pct(alignment * 0.38 + symmetry * 0.24 + stability * 0.26 + (100.0 - fatigue) * 0.12)
}

/// Clamp to [0, 100]; NaN collapses to 0
pub(crate) fn clamp_pct(value: f64) -> f64 {
    bounded(value, 100.0)
}

fn bounded(value: f64, max: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, max)
    }
}
