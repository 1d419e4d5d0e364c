//! Posture Flux - On-device posture signal engine
//!
//! Flux turns a stream of per-frame body keypoints into a bounded posture
//! score, a discrete risk tier and debounced coaching alerts through a
//! deterministic pipeline: geometry extraction → metric composition → risk
//! classification → alert debouncing.
//!
//! All temporal state is threaded explicitly through [`GeometrySnapshot`] and
//! [`AlertDebounceState`]; nothing is stored globally and every timestamp is
//! supplied by the caller, so any session can be replayed exactly.
//!
//! ## Modules
//!
//! - **Core engine**: `geometry`, `metrics`, `risk`, `alerts`, `fallback`
//! - **Session layer**: `session` owns the threaded state for one monitored user

pub mod alerts;
pub mod config;
pub mod error;
pub mod fallback;
pub mod geometry;
pub mod metrics;
pub mod risk;
pub mod session;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use alerts::{evaluate_alerts, AlertDebounceState, AlertEngine};
pub use config::MonitorConfig;
pub use error::{GeometryError, MonitorError};
pub use fallback::run_degraded;
pub use metrics::{compose_metrics, MetricComposer};
pub use risk::{classify_risk, RiskTable};
pub use session::{PostureSession, SessionArena, SessionSummary, TickOutput};
pub use types::{
    AlertEvent, AlertType, Frame, GeometrySnapshot, Keypoint, Landmark, RiskLevel, ScoreResult,
};

/// Flux version
pub const FLUX_VERSION: &str = env!("CARGO_PKG_VERSION");
