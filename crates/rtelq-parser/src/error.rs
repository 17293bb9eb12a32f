//! Structured parse errors with byte positions and remediation hints.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// How many bytes of surrounding input to include in an error context window.
const CONTEXT_WINDOW: usize = 20;

/// A single syntax finding with a byte position into the original query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyntaxError {
    /// Human-readable description of what is wrong.
    pub message: String,
    /// Byte offset into the query text where the problem starts.
    pub position: usize,
    /// A short window of the query text around `position`.
    pub context: String,
    /// An actionable fix, e.g. a quick-fix rewrite of the query.
    pub suggestion: String,
}

impl SyntaxError {
    pub fn new(
        query: &str,
        position: usize,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        SyntaxError {
            message: message.into(),
            position,
            context: context_window(query, position),
            suggestion: suggestion.into(),
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at position {} (near \"{}\")",
            self.message, self.position, self.context
        )
    }
}

/// Extract a context window around a byte position, snapped to char bounds.
fn context_window(query: &str, position: usize) -> String {
    let mut start = position.saturating_sub(CONTEXT_WINDOW / 2);
    while start > 0 && !query.is_char_boundary(start) {
        start -= 1;
    }
    let mut end = (position + CONTEXT_WINDOW / 2).min(query.len());
    while end < query.len() && !query.is_char_boundary(end) {
        end += 1;
    }
    query[start..end].to_string()
}

/// All syntax errors found in a query, returned as a structured result.
///
/// Parsing stops at the first structural error, but cheap pre-parse scans
/// (paren/quote balance, missing colons) may contribute several findings at
/// once so a caller can fix them together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
pub struct ParseErrors {
    pub errors: Vec<SyntaxError>,
}

impl ParseErrors {
    pub fn single(err: SyntaxError) -> Self {
        ParseErrors { errors: vec![err] }
    }

    /// Flat error messages, one per finding.
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.to_string()).collect()
    }

    /// Flat suggestions, one per finding.
    pub fn suggestions(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.suggestion.clone()).collect()
    }
}

impl fmt::Display for ParseErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.len() == 1 {
            write!(f, "{}", self.errors[0])
        } else {
            write!(f, "{} syntax errors", self.errors.len())?;
            for e in &self.errors {
                write!(f, "; {e}")?;
            }
            Ok(())
        }
    }
}

/// Crate-level error type for non-syntax failures.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("unknown entity type '{0}' (expected flows, alarms, rules, devices, or target_lists)")]
    UnknownEntityType(String),

    #[error("{0}")]
    Syntax(#[from] ParseErrors),
}

pub type Result<T> = std::result::Result<T, ParserError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_window_middle() {
        let q = "protocol:tcp AND bytes:>1000000 AND blocked:false";
        let e = SyntaxError::new(q, 17, "test", "fix");
        assert!(e.context.contains("bytes"));
        assert_eq!(e.position, 17);
    }

    #[test]
    fn test_context_window_at_start() {
        let q = "(protocol:tcp";
        let e = SyntaxError::new(q, 0, "unmatched paren", "append ')'");
        assert!(e.context.starts_with('('));
    }

    #[test]
    fn test_display_includes_position() {
        let e = SyntaxError::new("a:1", 0, "bad", "fix");
        assert!(e.to_string().contains("position 0"));
    }
}
