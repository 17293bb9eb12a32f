//! Evaluation-specific error types.

use thiserror::Error;

/// Errors that can occur during query compilation or correlation.
///
/// Configuration mistakes (too many correlation fields, incompatible field,
/// bad temporal window) are reported inside the correlation outcome rather
/// than through this type; only internal invariant violations and
/// compilation failures surface here.
#[derive(Debug, Error)]
pub enum EvalError {
    /// A wildcard pattern compiled to an invalid regex.
    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// A computed correlation or field score fell outside `[0, 1]`.
    /// This indicates a scoring bug, never bad user input.
    #[error("correlation score {score} out of range for {context}")]
    ScoreOutOfRange { score: f64, context: String },

    /// A query failed to parse during search compilation.
    #[error(transparent)]
    Parse(#[from] rtelq_parser::ParseErrors),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, EvalError>;
