//! Geometry extraction
//!
//! This module derives body geometry from a keypoint frame:
//! - Landmark midpoints with worst-case confidence
//! - Body scale from shoulder and hip widths
//! - Tilt angles (against the horizontal) and lean angles (against the vertical)
//! - Shoulder midpoint velocity relative to the previous snapshot

use crate::error::GeometryError;
use crate::types::{BodyGeometry, Frame, GeometrySnapshot, Keypoint, Landmark, Telemetry};

/// Lower bound for body scale, prevents division blow-ups on degenerate frames
pub const MIN_BODY_SCALE: f64 = 0.01;

/// Lower bound for the elapsed time used in velocity (milliseconds)
pub const MIN_FRAME_INTERVAL_MS: f64 = 16.0;

/// Geometry extractor for keypoint frames
#[derive(Debug, Clone)]
pub struct GeometryExtractor {
    min_visibility: f64,
}

impl Default for GeometryExtractor {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MIN_VISIBILITY)
    }
}

impl GeometryExtractor {
    pub fn new(min_visibility: f64) -> Self {
        Self { min_visibility }
    }

    /// Extract body geometry from a frame.
    ///
    /// `previous` supplies the prior position for velocity; without it (or
    /// without geometry in it) velocity is 0.
    pub fn extract(
        &self,
        frame: &Frame,
        previous: Option<&GeometrySnapshot>,
        timestamp_ms: i64,
    ) -> Result<BodyGeometry, GeometryError> {
        let missing: Vec<Landmark> = Landmark::REQUIRED
            .iter()
            .copied()
            .filter(|&lm| !self.is_usable(frame.get(lm)))
            .collect();
        if !missing.is_empty() {
            return Err(GeometryError::MissingLandmarks(missing));
        }

        let point = |lm: Landmark| -> Result<Keypoint, GeometryError> {
            match frame.get(lm) {
                Some(kp) if kp.is_finite() => Ok(*kp),
                Some(_) => Err(GeometryError::InvalidFrame),
                None => Err(GeometryError::MissingLandmarks(vec![lm])),
            }
        };

        let nose = point(Landmark::Nose)?;
        let left_ear = point(Landmark::LeftEar)?;
        let right_ear = point(Landmark::RightEar)?;
        let left_shoulder = point(Landmark::LeftShoulder)?;
        let right_shoulder = point(Landmark::RightShoulder)?;
        let left_hip = point(Landmark::LeftHip)?;
        let right_hip = point(Landmark::RightHip)?;

        let ear_mid = left_ear.midpoint(&right_ear);
        let shoulder_mid = left_shoulder.midpoint(&right_shoulder);
        let hip_mid = left_hip.midpoint(&right_hip);

        let body_scale = compute_body_scale(
            left_shoulder.distance_to(&right_shoulder),
            left_hip.distance_to(&right_hip),
        );

        let velocity = previous
            .and_then(|prev| {
                let elapsed_ms = timestamp_ms.saturating_sub(prev.timestamp_ms);
                prev.geometry
                    .as_ref()
                    .map(|g| compute_velocity(&g.shoulder_mid, &shoulder_mid, elapsed_ms))
            })
            .unwrap_or(0.0);

        let geometry = BodyGeometry {
            nose,
            torso_lean_deg: lean_deg(&shoulder_mid, &hip_mid),
            neck_tilt_deg: lean_deg(&ear_mid, &shoulder_mid),
            shoulder_tilt_deg: tilt_deg(&left_shoulder, &right_shoulder),
            hip_tilt_deg: tilt_deg(&left_hip, &right_hip),
            shoulder_level_offset: (left_shoulder.y - right_shoulder.y).abs() / body_scale,
            hip_level_offset: (left_hip.y - right_hip.y).abs() / body_scale,
            ear_mid,
            shoulder_mid,
            hip_mid,
            body_scale,
            velocity,
        };

        // Finite inputs can still overflow (e.g. coordinates near f64::MAX)
        if !is_finite_geometry(&geometry) {
            return Err(GeometryError::InvalidFrame);
        }

        Ok(geometry)
    }

    /// Build alert telemetry from a frame, `None` when geometry is unavailable
    pub fn telemetry(&self, frame: &Frame, stability: f64) -> Option<Telemetry> {
        self.extract(frame, None, frame.timestamp_ms)
            .ok()
            .map(|geometry| Telemetry::from_geometry(&geometry, stability))
    }

    fn is_usable(&self, keypoint: Option<&Keypoint>) -> bool {
        keypoint.is_some_and(|kp| kp.confidence() >= self.min_visibility)
    }
}

/// Average of shoulder and hip widths, floor-clamped
fn compute_body_scale(shoulder_width: f64, hip_width: f64) -> f64 {
    ((shoulder_width + hip_width) / 2.0).max(MIN_BODY_SCALE)
}

/// Angle of the line `a -> b` against the horizontal, folded into [-90, 90]
///
/// Formula: `atan2(Δy, Δx)` in degrees. Folding makes the result independent of
/// which side of the image the left landmark appears on.
fn tilt_deg(a: &Keypoint, b: &Keypoint) -> f64 {
    let angle = (b.y - a.y).atan2(b.x - a.x).to_degrees();
    if angle > 90.0 {
        angle - 180.0
    } else if angle < -90.0 {
        angle + 180.0
    } else {
        angle
    }
}

/// Angle of the segment from `upper` down to `lower` against the vertical
///
/// Formula: `atan2(Δx, Δy)` in degrees. Image y grows downward, so an upright
/// segment reads 0.
fn lean_deg(upper: &Keypoint, lower: &Keypoint) -> f64 {
    (lower.x - upper.x).atan2(lower.y - upper.y).to_degrees()
}

/// 3D displacement per second, with elapsed time floored at 16 ms
fn compute_velocity(previous: &Keypoint, current: &Keypoint, elapsed_ms: i64) -> f64 {
    let elapsed_sec = (elapsed_ms as f64).max(MIN_FRAME_INTERVAL_MS) / 1000.0;
    previous.distance_to(current) / elapsed_sec
}

fn is_finite_geometry(g: &BodyGeometry) -> bool {
    [
        g.body_scale,
        g.torso_lean_deg,
        g.neck_tilt_deg,
        g.shoulder_tilt_deg,
        g.hip_tilt_deg,
        g.shoulder_level_offset,
        g.hip_level_offset,
        g.velocity,
    ]
    .iter()
    .all(|v| v.is_finite())
        && g.shoulder_mid.is_finite()
        && g.hip_mid.is_finite()
        && g.ear_mid.is_finite()
}
