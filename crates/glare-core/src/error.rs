//! Error types for glare-core

use thiserror::Error;

/// Errors reported by a platform gamma backend
#[derive(Debug, Error)]
pub enum BackendError {
    /// The platform has no display with this handle
    #[error("unknown display handle {0}")]
    UnknownDisplay(u32),

    /// The platform refused or failed a ramp operation
    #[error("{op} failed: {message}")]
    Platform { op: &'static str, message: String },

    /// Ramp read back from the platform has an unusable size
    #[error("unsupported gamma size {0}")]
    UnsupportedSize(usize),

    /// A restore writer was asked for a ramp it was not prepared with
    #[error("no prepared ramp for display {0}")]
    Unprepared(u32),
}

impl BackendError {
    pub fn platform(op: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Platform {
            op,
            message: err.to_string(),
        }
    }
}

/// Errors for invalid custom curves
#[derive(Debug, Error, PartialEq)]
pub enum CurveError {
    /// Fewer than two control points
    #[error("custom curve needs at least 2 points, got {0}")]
    TooFewPoints(usize),

    /// A coordinate outside [0, 1] or not a number
    #[error("control point {index} out of range: ({x}, {y})")]
    OutOfRange { index: usize, x: f64, y: f64 },

    /// Points not sorted ascending by x
    #[error("control point {0} is not sorted by x")]
    Unsorted(usize),
}

/// Errors surfaced by the engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Engine used before `initialize`
    #[error("engine not initialized")]
    NotInitialized,

    /// Enumeration found no displays
    #[error("no displays found")]
    NoDisplays,

    /// Display index out of range
    #[error("display index {index} out of range (have {count})")]
    IndexOutOfRange { index: usize, count: usize },

    /// Display has no captured original ramp
    #[error("display {0} has no captured original ramp")]
    NoOriginal(usize),

    /// Backend failure
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
