//! Deep Tree Echo error types.

use thiserror::Error;

/// Engine error taxonomy.
///
/// `Config` is fatal at construction; `Shape` and `Training` are
/// recoverable per-call failures that leave committed state untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EchoError {
    /// Invalid construction-time parameters — the engine cannot be built.
    #[error("ConfigError: {0}")]
    Config(String),

    /// Input vector dimensionality mismatch — re-embed and retry.
    #[error("ShapeError: expected {expected}, got {got}")]
    Shape { expected: usize, got: usize },

    /// Ill-conditioned regression — prior readout weights preserved.
    #[error("TrainingError: {0}")]
    Training(String),

    /// Lifecycle misuse on the persistence surface.
    #[error("StateError: {0}")]
    State(String),
}

pub type Result<T> = std::result::Result<T, EchoError>;
