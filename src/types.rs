//! Core types for the Posture Flux engine
//!
//! This module defines the data structures that flow through each stage of the
//! engine: keypoint frames, body geometry, the threaded temporal snapshot,
//! score results, risk levels and alert events.

use serde::{Deserialize, Serialize};

/// Pose landmark indices (33-point BlazePose topology)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Landmark {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl Landmark {
    /// Total number of landmarks in a full frame
    pub const COUNT: usize = 33;

    /// Landmarks the geometry extractor cannot work without
    pub const REQUIRED: [Landmark; 7] = [
        Landmark::Nose,
        Landmark::LeftEar,
        Landmark::RightEar,
        Landmark::LeftShoulder,
        Landmark::RightShoulder,
        Landmark::LeftHip,
        Landmark::RightHip,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// A single estimated body-joint position in normalized coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Detection confidence (0-1); absent means the provider reports none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f64>,
}

impl Keypoint {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            visibility: None,
        }
    }

    pub fn with_visibility(mut self, visibility: f64) -> Self {
        self.visibility = Some(visibility);
        self
    }

    /// Confidence of this keypoint; a missing visibility counts as fully visible
    pub fn confidence(&self) -> f64 {
        self.visibility.unwrap_or(1.0)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Arithmetic mean of two keypoints. Confidence is the worse of the two.
    pub fn midpoint(&self, other: &Keypoint) -> Keypoint {
        Keypoint {
            x: (self.x + other.x) / 2.0,
            y: (self.y + other.y) / 2.0,
            z: (self.z + other.z) / 2.0,
            visibility: Some(self.confidence().min(other.confidence())),
        }
    }

    /// Euclidean distance in 3D
    pub fn distance_to(&self, other: &Keypoint) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// One timestamped set of keypoints, indexed by [`Landmark`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Monotonic timestamp (milliseconds)
    pub timestamp_ms: i64,
    /// Keypoints in landmark index order; `None` marks an undetected joint
    pub keypoints: Vec<Option<Keypoint>>,
}

impl Frame {
    /// Create an empty frame with every landmark slot undetected
    pub fn new(timestamp_ms: i64) -> Self {
        Self {
            timestamp_ms,
            keypoints: vec![None; Landmark::COUNT],
        }
    }

    /// Builder-style setter for a single landmark
    pub fn with(mut self, landmark: Landmark, keypoint: Keypoint) -> Self {
        self.set(landmark, keypoint);
        self
    }

    pub fn set(&mut self, landmark: Landmark, keypoint: Keypoint) {
        let idx = landmark.index();
        if self.keypoints.len() <= idx {
            self.keypoints.resize(idx + 1, None);
        }
        self.keypoints[idx] = Some(keypoint);
    }

    pub fn get(&self, landmark: Landmark) -> Option<&Keypoint> {
        self.keypoints.get(landmark.index()).and_then(Option::as_ref)
    }
}

/// Body geometry derived from a single frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyGeometry {
    /// Nose keypoint
    pub nose: Keypoint,
    /// Ear midpoint
    pub ear_mid: Keypoint,
    /// Shoulder midpoint
    pub shoulder_mid: Keypoint,
    /// Hip midpoint
    pub hip_mid: Keypoint,
    /// Average of 3D shoulder and hip widths, floored at 0.01
    pub body_scale: f64,
    /// Torso lean from vertical (degrees)
    pub torso_lean_deg: f64,
    /// Neck tilt from vertical (degrees)
    pub neck_tilt_deg: f64,
    /// Shoulder line tilt from horizontal (degrees, -90..90)
    pub shoulder_tilt_deg: f64,
    /// Hip line tilt from horizontal (degrees, -90..90)
    pub hip_tilt_deg: f64,
    /// Vertical shoulder offset normalized by body scale
    pub shoulder_level_offset: f64,
    /// Vertical hip offset normalized by body scale
    pub hip_level_offset: f64,
    /// Shoulder midpoint speed (normalized units per second)
    pub velocity: f64,
}

/// Temporal state threaded from one frame to the next.
///
/// `snapshot(n)` is a pure function of `frame(n)` and `snapshot(n - 1)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometrySnapshot {
    pub timestamp_ms: i64,
    /// Geometry of the frame, `None` when it could not be measured
    pub geometry: Option<BodyGeometry>,
    /// Leaky bad-frame counter (0-200), diagnostic only
    pub bad_frames: f64,
    /// Leaky fatigue load (0-400)
    pub fatigue_accumulator: f64,
}

/// How a score result was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameQuality {
    /// Computed from measured geometry
    Measured,
    /// Neutral defaults, required landmarks absent or low-confidence
    MissingLandmarks,
    /// Neutral defaults, frame carried non-finite coordinates
    InvalidFrame,
    /// Produced by the degraded-mode synthesizer
    Synthetic,
}

/// Intermediate penalties (0-100) behind the composed metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Penalties {
    pub torso: f64,
    pub neck: f64,
    pub forward_head: f64,
    pub shoulder: f64,
    pub hip: f64,
    pub jitter: f64,
    pub lean_delta: f64,
}

/// Posture metrics for one tick, each bounded to [0, 100]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub alignment: f64,
    pub symmetry: f64,
    pub stability: f64,
    pub fatigue: f64,
    pub score: f64,
    pub quality: FrameQuality,
    /// True when produced by the degraded-mode synthesizer
    pub fallback: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub penalties: Option<Penalties>,
}

/// Ordinal risk classification, `Low < Moderate < High < Severe < Critical`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Severe,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Moderate => "MODERATE",
            RiskLevel::High => "HIGH",
            RiskLevel::Severe => "SEVERE",
            RiskLevel::Critical => "CRITICAL",
        }
    }
}

/// Alert channels. Declaration order is priority order, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    ForwardHead,
    Slouch,
    Shoulder,
    Stability,
}

impl AlertType {
    /// All alert types in priority order
    pub const ALL: [AlertType; 4] = [
        AlertType::ForwardHead,
        AlertType::Slouch,
        AlertType::Shoulder,
        AlertType::Stability,
    ];

    /// Priority rank, 0 is highest
    pub fn priority(&self) -> usize {
        *self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::ForwardHead => "forward_head",
            AlertType::Slouch => "slouch",
            AlertType::Shoulder => "shoulder",
            AlertType::Stability => "stability",
        }
    }

    /// Coaching message delivered with a fired alert
    pub fn message(&self) -> &'static str {
        match self {
            AlertType::ForwardHead => "Bring your head back over your shoulders",
            AlertType::Slouch => "Sit up tall, your torso is leaning",
            AlertType::Shoulder => "Level your shoulders",
            AlertType::Stability => "Try to hold still for a moment",
        }
    }
}

/// Per-tick inputs to the alert engine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    /// Neck angle (degrees), 180 when the ears sit directly above the shoulders
    pub neck_angle: f64,
    /// Trunk deviation from vertical (degrees)
    pub trunk_angle: f64,
    /// Shoulder line deviation from horizontal (degrees)
    pub shoulder_tilt: f64,
    /// Stability metric (0-100)
    pub stability: f64,
}

impl Telemetry {
    pub fn from_geometry(geometry: &BodyGeometry, stability: f64) -> Self {
        Self {
            neck_angle: 180.0 - geometry.neck_tilt_deg.abs(),
            trunk_angle: geometry.torso_lean_deg.abs(),
            shoulder_tilt: geometry.shoulder_tilt_deg.abs(),
            stability,
        }
    }
}

/// A debounced, prioritized alert. At most one is produced per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub alert_type: AlertType,
    pub message: String,
    pub telemetry: Telemetry,
    pub fired_at_ms: i64,
}
