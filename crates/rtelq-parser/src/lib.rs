//! # rtelq-parser
//!
//! Parser and validator for the security-telemetry query language used to
//! search network flows, alarms, firewall rules, devices, and target lists.
//!
//! This crate turns a query string into a strongly-typed AST and checks it
//! against per-entity field schemas, handling:
//!
//! - **Leaf syntax**: `field:value`, comparisons (`field:>=100`), ranges
//!   (`field:[min TO max]`), wildcards (`field:192.168.*`), bare `*`
//! - **Boolean structure**: case-insensitive `AND`, `OR`, `NOT` and
//!   parenthesized groups with correct precedence
//! - **Structured syntax errors**: byte position, context window, and a
//!   quick-fix suggestion for unmatched parens/quotes, missing colons, and
//!   `=` typed instead of `:`
//! - **Semantic validation**: field existence (with deprecated-alias and
//!   source-path resolution), operator/field-type compatibility, value
//!   formats, plus an advisory query-correction rewrite
//! - **Progressive validation**: a five-stage weighted pipeline that halts
//!   at the first critical failure and scores overall query health
//!
//! ## Architecture
//!
//! - **PEG grammar** ([`pest`]) with Pratt parsing for operator precedence
//!   (`NOT` > `AND` > `OR`)
//! - **Static schemas** per entity type: field types, operator sets,
//!   deprecated aliases, and canonical-field source-path mappings
//!
//! ## Quick Start
//!
//! ```rust
//! use rtelq_parser::{parse_query, validate_query, EntityType};
//!
//! let ast = parse_query("protocol:tcp AND bytes:>1000000").unwrap();
//! assert_eq!(ast.leaves().len(), 2);
//!
//! let report = validate_query("severity:>=high", EntityType::Alarms);
//! assert!(!report.is_valid);
//! assert!(report.errors[0].contains("enum field 'severity'"));
//! ```

pub mod ast;
pub mod error;
pub mod parser;
pub mod progressive;
pub mod schema;
pub mod validate;

// Re-export the most commonly used types and functions at crate root
pub use ast::{ComparisonOp, EntityType, NodeCounts, QueryNode, MATCH_ALL};
pub use error::{ParseErrors, ParserError, Result, SyntaxError};
pub use parser::parse_query;
pub use progressive::{validate_progressive, ProgressiveReport, Stage, StageResult};
pub use schema::FieldType;
pub use validate::{
    correct_query, validate_operator, validate_query, validate_semantics, FieldIssue,
    OperatorValidation, SemanticReport, ValidationReport,
};
