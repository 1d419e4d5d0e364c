//! Error types for Posture Flux

use crate::types::Landmark;
use thiserror::Error;

/// Reasons the geometry extractor cannot produce body geometry for a frame.
///
/// These are expected operating conditions for a live monitor, not faults.
/// The metric composer maps them to neutral defaults and never lets them
/// escape a session tick.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("Missing or low-confidence landmarks: {0:?}")]
    MissingLandmarks(Vec<Landmark>),

    #[error("Frame contains non-finite coordinates")]
    InvalidFrame,
}

/// Errors returned by the fallible API surfaces (configuration, state
/// persistence, session lookup)
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid session state: {0}")]
    StateError(String),

    #[error("Unknown session: {0}")]
    UnknownSession(uuid::Uuid),
}
