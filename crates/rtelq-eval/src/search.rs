//! Search evaluation: compiles a parsed query into a matcher and applies it
//! to in-memory record sets.
//!
//! The network client that fetches records lives outside this crate; by the
//! time a search runs here, both result sets are fully materialized.
//! Wildcard leaves compile to anchored case-insensitive regexes once, up
//! front. Cross-referencing dispatches to the scored or the exact
//! correlation path based on a caller-supplied flag.

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use rtelq_parser::{parse_query, schema, ComparisonOp, EntityType, QueryNode};

use crate::config::{CorrelationOptions, CorrelationType};
use crate::correlation::multi_field_correlation;
use crate::entity::Entity;
use crate::error::Result;
use crate::mapper;
use crate::scoring::{scored_correlation, CorrelationOutcome};

// ---------------------------------------------------------------------------
// Compiled queries
// ---------------------------------------------------------------------------

/// A query compiled against one entity type, reusable across records.
#[derive(Debug)]
pub struct CompiledQuery {
    entity_type: EntityType,
    root: CompiledNode,
}

#[derive(Debug)]
enum CompiledNode {
    All,
    Eq {
        field: String,
        value: String,
    },
    Cmp {
        field: String,
        op: ComparisonOp,
        value: String,
    },
    Range {
        field: String,
        min: String,
        max: String,
    },
    Pattern {
        field: String,
        regex: Regex,
    },
    And(Box<CompiledNode>, Box<CompiledNode>),
    Or(Box<CompiledNode>, Box<CompiledNode>),
    Not(Box<CompiledNode>),
}

/// Compile a parsed query for evaluation against records of one entity
/// type. Field names are canonicalized (aliases and raw source paths
/// rewritten) at compile time.
pub fn compile_query(ast: &QueryNode, entity_type: EntityType) -> Result<CompiledQuery> {
    Ok(CompiledQuery {
        entity_type,
        root: compile_node(ast, entity_type)?,
    })
}

/// Parse and compile in one step.
pub fn compile_query_text(query: &str, entity_type: EntityType) -> Result<CompiledQuery> {
    let ast = parse_query(query)?;
    compile_query(&ast, entity_type)
}

fn canonical_field(field: &str, entity_type: EntityType) -> String {
    if schema::field_type(entity_type, field).is_some() {
        return field.to_string();
    }
    if let Some(canonical) = schema::resolve_alias(entity_type, field) {
        return canonical.to_string();
    }
    if let Some(canonical) = schema::reverse_mapping(entity_type, field) {
        return canonical.to_string();
    }
    field.to_string()
}

fn compile_node(node: &QueryNode, entity_type: EntityType) -> Result<CompiledNode> {
    Ok(match node {
        QueryNode::Field { field, value } => {
            if node.is_match_all() {
                CompiledNode::All
            } else {
                CompiledNode::Eq {
                    field: canonical_field(field, entity_type),
                    value: value.clone(),
                }
            }
        }
        QueryNode::Comparison { field, op, value } => CompiledNode::Cmp {
            field: canonical_field(field, entity_type),
            op: *op,
            value: value.clone(),
        },
        QueryNode::Range { field, min, max } => CompiledNode::Range {
            field: canonical_field(field, entity_type),
            min: min.clone(),
            max: max.clone(),
        },
        QueryNode::Wildcard { field, pattern } => CompiledNode::Pattern {
            field: canonical_field(field, entity_type),
            regex: wildcard_to_regex(pattern)?,
        },
        QueryNode::And { left, right } => CompiledNode::And(
            Box::new(compile_node(left, entity_type)?),
            Box::new(compile_node(right, entity_type)?),
        ),
        QueryNode::Or { left, right } => CompiledNode::Or(
            Box::new(compile_node(left, entity_type)?),
            Box::new(compile_node(right, entity_type)?),
        ),
        QueryNode::Not { operand } => {
            CompiledNode::Not(Box::new(compile_node(operand, entity_type)?))
        }
        QueryNode::Group { query } => compile_node(query, entity_type)?,
    })
}

/// Convert a glob pattern to an anchored case-insensitive regex.
/// `*` matches any run, `?` a single character; escaped wildcards are
/// literal.
fn wildcard_to_regex(glob: &str) -> Result<Regex> {
    let mut pattern = String::with_capacity(glob.len() + 8);
    pattern.push_str("(?i)^");
    let mut escaped = false;
    for c in glob.chars() {
        if escaped {
            pattern.push_str(&regex::escape(&c.to_string()));
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            _ => pattern.push_str(&regex::escape(&c.to_string())),
        }
    }
    pattern.push('$');
    Ok(Regex::new(&pattern)?)
}

impl CompiledQuery {
    /// Evaluate the query against one raw record.
    pub fn matches(&self, record: &Value) -> bool {
        let entity = Entity::from_value(record);
        eval(&self.root, &entity, self.entity_type)
    }
}

fn eval(node: &CompiledNode, entity: &Entity<'_>, entity_type: EntityType) -> bool {
    match node {
        CompiledNode::All => true,
        CompiledNode::Eq { field, value } => field_eq(entity, entity_type, field, value),
        CompiledNode::Cmp { field, op, value } => {
            let Some(actual) = mapper::get_field_value(entity, field, entity_type) else {
                return false;
            };
            compare(actual, *op, value)
        }
        CompiledNode::Range { field, min, max } => {
            let Some(actual) = mapper::get_field_value(entity, field, entity_type) else {
                return false;
            };
            match (as_number(actual), parse_bound(min), parse_bound(max)) {
                (Some(v), Some(lo), Some(hi)) => v >= lo && v <= hi,
                _ => false,
            }
        }
        CompiledNode::Pattern { field, regex } => {
            match mapper::get_field_value(entity, field, entity_type) {
                Some(Value::Array(items)) => items
                    .iter()
                    .filter_map(mapper::value_to_string)
                    .any(|s| regex.is_match(&s)),
                Some(v) => mapper::value_to_string(v)
                    .map(|s| regex.is_match(&s))
                    .unwrap_or(false),
                None => false,
            }
        }
        CompiledNode::And(l, r) => {
            eval(l, entity, entity_type) && eval(r, entity, entity_type)
        }
        CompiledNode::Or(l, r) => eval(l, entity, entity_type) || eval(r, entity, entity_type),
        CompiledNode::Not(inner) => !eval(inner, entity, entity_type),
    }
}

/// Equality with per-field normalization. Arrays match if any element does.
fn field_eq(entity: &Entity<'_>, entity_type: EntityType, field: &str, query_value: &str) -> bool {
    let Some(actual) = mapper::get_field_value(entity, field, entity_type) else {
        return false;
    };
    if let Value::Array(items) = actual {
        return items.iter().any(|item| value_eq(item, field, query_value));
    }
    value_eq(actual, field, query_value)
}

fn value_eq(actual: &Value, field: &str, query_value: &str) -> bool {
    // booleans accept the relaxed true/false/1/0/yes/no spellings
    if let Value::Bool(b) = actual {
        return match query_value.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => *b,
            "false" | "0" | "no" => !*b,
            _ => false,
        };
    }
    if let (Some(a), Ok(q)) = (as_number(actual), query_value.parse::<f64>()) {
        return a == q;
    }
    let Some(normalized) = mapper::normalize_field_value(actual, field) else {
        return false;
    };
    let query_normalized =
        mapper::normalize_field_value(&Value::String(query_value.to_string()), field)
            .unwrap_or_else(|| query_value.to_string());
    normalized.eq_ignore_ascii_case(&query_normalized)
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Range and comparison bounds: numeric, or a date string converted to
/// epoch seconds.
fn parse_bound(raw: &str) -> Option<f64> {
    if let Ok(n) = raw.parse::<f64>() {
        return Some(n);
    }
    crate::scoring::timestamp_bound(raw)
}

fn compare(actual: &Value, op: ComparisonOp, raw: &str) -> bool {
    if let (Some(a), Some(q)) = (as_number(actual), parse_bound(raw)) {
        return match op {
            ComparisonOp::Gt => a > q,
            ComparisonOp::Lt => a < q,
            ComparisonOp::Ge => a >= q,
            ComparisonOp::Le => a <= q,
            ComparisonOp::Ne => a != q,
            ComparisonOp::Eq => a == q,
        };
    }
    // fall back to lexicographic comparison for strings
    let Some(a) = mapper::value_to_string(actual) else {
        return false;
    };
    match op {
        ComparisonOp::Gt => a.as_str() > raw,
        ComparisonOp::Lt => a.as_str() < raw,
        ComparisonOp::Ge => a.as_str() >= raw,
        ComparisonOp::Le => a.as_str() <= raw,
        ComparisonOp::Ne => a != raw,
        ComparisonOp::Eq => a == raw,
    }
}

// ---------------------------------------------------------------------------
// Search over materialized records
// ---------------------------------------------------------------------------

/// Post-filter options applied after matching.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub sort_by: Option<String>,
    pub descending: bool,
    pub offset: usize,
    pub limit: Option<usize>,
}

/// Filter, sort, and page a record set with a query string.
pub fn run_search(
    records: &[Value],
    entity_type: EntityType,
    query: &str,
    options: &SearchOptions,
) -> Result<Vec<Value>> {
    let compiled = compile_query_text(query, entity_type)?;

    let mut matched: Vec<Value> = records
        .iter()
        .filter(|r| compiled.matches(r))
        .cloned()
        .collect();

    if let Some(sort_field) = &options.sort_by {
        matched.sort_by(|a, b| {
            let av = mapper::get_field_value(&Entity::from_value(a), sort_field, entity_type);
            let bv = mapper::get_field_value(&Entity::from_value(b), sort_field, entity_type);
            let ord = compare_sort_values(av, bv);
            if options.descending {
                ord.reverse()
            } else {
                ord
            }
        });
    }

    let iter = matched.into_iter().skip(options.offset);
    Ok(match options.limit {
        Some(limit) => iter.take(limit).collect(),
        None => iter.collect(),
    })
}

/// Missing values sort last regardless of direction.
fn compare_sort_values(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => match (as_number(a), as_number(b)) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => mapper::value_to_string(a)
                .unwrap_or_default()
                .cmp(&mapper::value_to_string(b).unwrap_or_default()),
        },
    }
}

// ---------------------------------------------------------------------------
// Cross-reference dispatch
// ---------------------------------------------------------------------------

/// Result of a cross-reference request; shape depends on whether scoring
/// was requested.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CrossReference {
    Scored(CorrelationOutcome),
    Simple { results: Vec<Value> },
}

/// Correlate two result sets, dispatching on the scoring flag.
pub fn cross_reference(
    primary: &[Value],
    primary_type: EntityType,
    secondary: &[Value],
    secondary_type: EntityType,
    fields: &[String],
    options: &CorrelationOptions,
    use_scoring: bool,
) -> Result<CrossReference> {
    if use_scoring {
        let outcome = scored_correlation(
            primary,
            primary_type,
            secondary,
            secondary_type,
            fields,
            options,
        )?;
        return Ok(CrossReference::Scored(outcome));
    }

    let results = multi_field_correlation(
        primary,
        primary_type,
        secondary,
        secondary_type,
        fields,
        options.correlation_type,
    );
    Ok(CrossReference::Simple { results })
}

/// Correlation type used by the exact path when none is supplied.
pub fn default_correlation_type() -> CorrelationType {
    CorrelationType::Or
}

// =============================================================================
// Tests
// =============================================================================
