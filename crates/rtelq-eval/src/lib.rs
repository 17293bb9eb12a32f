//! # rtelq-eval
//!
//! Correlation and search evaluation for security telemetry.
//!
//! This crate consumes the AST produced by [`rtelq_parser`] and evaluates it
//! against in-memory record sets using a compile-then-evaluate model, and
//! cross-references two result sets through exact or weighted fuzzy-scored
//! correlation.
//!
//! ## Architecture
//!
//! - **Search** (stateless): a query compiles once into an optimized matcher
//!   with canonicalized field names and pre-built wildcard regexes, then
//!   filters, sorts, and pages a record set.
//! - **Correlation**: builds normalized primary-side value sets per field,
//!   then scores each secondary entity. The exact path answers "does any
//!   field's value appear on the primary side"; the scored path resolves
//!   per-field weights and fuzzy similarities (IPv4 subnet, Levenshtein,
//!   numeric tolerance, geographic) into a ranked `[0, 1]` score with
//!   aggregate statistics.
//!
//! Everything here is synchronous and CPU-bound over fully materialized
//! collections; fetching records and enforcing timeouts belongs to the
//! caller.
//!
//! ## Quick Start — Search
//!
//! ```rust
//! use rtelq_eval::{run_search, SearchOptions};
//! use rtelq_parser::EntityType;
//! use serde_json::json;
//!
//! let flows = vec![
//!     json!({"source_ip": "10.0.0.1", "protocol": "tcp", "bytes": 2_000_000}),
//!     json!({"source_ip": "10.0.0.2", "protocol": "udp", "bytes": 500}),
//! ];
//! let hits = run_search(
//!     &flows,
//!     EntityType::Flows,
//!     "protocol:tcp AND bytes:>1000000",
//!     &SearchOptions::default(),
//! )
//! .unwrap();
//! assert_eq!(hits.len(), 1);
//! ```
//!
//! ## Quick Start — Scored Correlation
//!
//! ```rust
//! use rtelq_eval::{scored_correlation, CorrelationOptions, FuzzyConfig};
//! use rtelq_parser::EntityType;
//! use serde_json::json;
//!
//! let flows = vec![json!({"source_ip": "10.0.0.1"})];
//! let alarms = vec![json!({"device_ip": "10.0.0.5"})];
//! let options = CorrelationOptions {
//!     fuzzy: FuzzyConfig { enabled: true, ..FuzzyConfig::default() },
//!     ..CorrelationOptions::default()
//! };
//! let outcome = scored_correlation(
//!     &flows,
//!     EntityType::Flows,
//!     &alarms,
//!     EntityType::Alarms,
//!     &["source_ip".to_string()],
//!     &options,
//! )
//! .unwrap();
//! // same /24 scores 0.75
//! assert_eq!(outcome.results[0].correlation_score, 0.75);
//! ```

pub mod config;
pub mod correlation;
pub mod entity;
pub mod error;
pub mod mapper;
pub mod scoring;
pub mod search;

// Re-export the most commonly used types and functions at crate root
pub use config::{
    validate_config, CorrelationOptions, CorrelationType, CorrelationWeights, FuzzyConfig,
    TemporalWindow, TimeUnit, DEFAULT_MINIMUM_SCORE, MAX_CORRELATION_FIELDS,
};
pub use correlation::{multi_field_correlation, simple_correlation, SimpleCorrelation};
pub use entity::Entity;
pub use error::{EvalError, Result};
pub use mapper::{get_field_value, is_field_compatible, normalize_field_value};
pub use scoring::{
    scored_correlation, Confidence, CorrelationOutcome, CorrelationStats, MatchKind,
    ScoredCorrelationResult,
};
pub use search::{
    compile_query, compile_query_text, cross_reference, run_search, CompiledQuery, CrossReference,
    SearchOptions,
};
