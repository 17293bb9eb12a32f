//! Semantic and operator validation against entity schemas.
//!
//! Validation aggregates every finding in one pass so a caller can fix
//! multiple issues at once; parsing stops at the first structural error, but
//! once a tree exists all leaves are checked. Every failure carries at least
//! one actionable suggestion, and common typos produce an advisory
//! `corrected_query` rewrite that is never substituted for the original.

use serde::Serialize;

use crate::ast::{ComparisonOp, EntityType, QueryNode, MATCH_ALL};
use crate::parser::parse_query;
use crate::schema::{self, FieldType};

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// Full validation outcome for a query string.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub suggestions: Vec<String>,
    pub field_issues: Vec<FieldIssue>,
    /// Advisory rewrite fixing common mistakes; present only when it differs
    /// from the original query.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corrected_query: Option<String>,
}

/// A finding about a single field reference.
#[derive(Debug, Clone, Serialize)]
pub struct FieldIssue {
    pub field: String,
    pub issue: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggested_fields: Vec<String>,
}

/// Outcome of checking one field/operator pair.
#[derive(Debug, Clone, Serialize)]
pub struct OperatorValidation {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_operators: Option<Vec<&'static str>>,
}

impl OperatorValidation {
    fn ok() -> Self {
        OperatorValidation {
            is_valid: true,
            error: None,
            suggestion: None,
            valid_operators: None,
        }
    }
}

/// Aggregated semantic findings over a parsed tree.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SemanticReport {
    pub errors: Vec<String>,
    pub suggestions: Vec<String>,
    pub field_issues: Vec<FieldIssue>,
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Parse and validate a query string against an entity schema.
pub fn validate_query(query: &str, entity: EntityType) -> ValidationReport {
    let corrected = correct_query(query, entity);
    let corrected_query = (corrected != query).then_some(corrected);

    match parse_query(query) {
        Err(errs) => ValidationReport {
            is_valid: false,
            errors: errs.messages(),
            suggestions: errs.suggestions(),
            field_issues: Vec::new(),
            corrected_query,
        },
        Ok(ast) => {
            let sem = validate_semantics(&ast, entity);
            ValidationReport {
                is_valid: sem.errors.is_empty(),
                errors: sem.errors,
                suggestions: sem.suggestions,
                field_issues: sem.field_issues,
                corrected_query,
            }
        }
    }
}

/// Check every leaf of a parsed tree: field existence, operator/type
/// compatibility, and value formats.
pub fn validate_semantics(ast: &QueryNode, entity: EntityType) -> SemanticReport {
    let mut report = SemanticReport::default();
    for leaf in ast.leaves() {
        check_leaf(leaf, entity, &mut report);
    }
    report
}

/// Check one field/operator pair against the entity schema.
///
/// `operator` uses the query-language spelling: `:`, `=`, `!=`, `>`, `<`,
/// `>=`, `<=`, `~` (wildcard), `range`, `contains`, `startswith`,
/// `endswith`, `in`, `not_in`.
pub fn validate_operator(field: &str, operator: &str, entity: EntityType) -> OperatorValidation {
    let ty = match resolve_field(entity, field) {
        Resolution::Unknown => {
            let suggested = schema::suggest_fields(entity, field);
            return OperatorValidation {
                is_valid: false,
                error: Some(format!(
                    "unknown field '{field}' for entity type '{entity}'"
                )),
                suggestion: (!suggested.is_empty())
                    .then(|| format!("did you mean: {}", suggested.join(", "))),
                valid_operators: None,
            };
        }
        Resolution::Known(ty)
        | Resolution::Deprecated { ty, .. }
        | Resolution::Mapped { ty, .. } => ty,
    };

    if ty.supports_operator(operator) {
        return OperatorValidation::ok();
    }

    let (error, suggestion) = operator_incompatibility(field, operator, ty);
    OperatorValidation {
        is_valid: false,
        error: Some(error),
        suggestion: Some(suggestion),
        valid_operators: Some(ty.valid_operators().to_vec()),
    }
}

// ---------------------------------------------------------------------------
// Field resolution
// ---------------------------------------------------------------------------

pub(crate) enum Resolution {
    Known(FieldType),
    Deprecated {
        canonical: &'static str,
        ty: FieldType,
    },
    Mapped {
        canonical: &'static str,
        ty: FieldType,
    },
    Unknown,
}

/// Resolve a field name through the schema, the deprecated-alias table, and
/// the reversed source-path mapping, in that order.
pub(crate) fn resolve_field(entity: EntityType, field: &str) -> Resolution {
    if let Some(ty) = schema::field_type(entity, field) {
        return Resolution::Known(ty);
    }
    if let Some(canonical) = schema::resolve_alias(entity, field) {
        if let Some(ty) = schema::field_type(entity, canonical) {
            return Resolution::Deprecated { canonical, ty };
        }
    }
    if let Some(canonical) = schema::reverse_mapping(entity, field) {
        if let Some(ty) = schema::field_type(entity, canonical) {
            return Resolution::Mapped { canonical, ty };
        }
    }
    Resolution::Unknown
}

// ---------------------------------------------------------------------------
// Leaf checks
// ---------------------------------------------------------------------------

fn check_leaf(leaf: &QueryNode, entity: EntityType, report: &mut SemanticReport) {
    let field = match leaf.leaf_field() {
        Some(f) if f != MATCH_ALL => f,
        _ => return,
    };

    let ty = match resolve_field(entity, field) {
        Resolution::Known(ty) => ty,
        Resolution::Deprecated { canonical, ty } => {
            report.field_issues.push(FieldIssue {
                field: field.to_string(),
                issue: format!("'{field}' is deprecated"),
                suggestion: Some(format!("use '{canonical}' instead")),
                suggested_fields: vec![canonical.to_string()],
            });
            report
                .suggestions
                .push(format!("replace deprecated field '{field}' with '{canonical}'"));
            ty
        }
        Resolution::Mapped { canonical, ty } => {
            report.field_issues.push(FieldIssue {
                field: field.to_string(),
                issue: format!("'{field}' is a raw source path"),
                suggestion: Some(format!("use the canonical field name '{canonical}'")),
                suggested_fields: vec![canonical.to_string()],
            });
            ty
        }
        Resolution::Unknown => {
            let suggested = schema::suggest_fields(entity, field);
            report.errors.push(format!(
                "unknown field '{field}' for entity type '{entity}'"
            ));
            if suggested.is_empty() {
                report.suggestions.push(format!(
                    "valid fields for {entity}: {}",
                    schema::field_names(entity).join(", ")
                ));
            } else {
                report
                    .suggestions
                    .push(format!("did you mean: {}", suggested.join(", ")));
            }
            report.field_issues.push(FieldIssue {
                field: field.to_string(),
                issue: format!("not a valid {entity} field"),
                suggestion: None,
                suggested_fields: suggested.iter().map(|s| s.to_string()).collect(),
            });
            return;
        }
    };

    match leaf {
        QueryNode::Field { value, .. } => check_value_format(field, value, ty, report),
        QueryNode::Comparison { op, value, .. } => {
            if !ty.supports_operator(op.as_str()) {
                let (error, suggestion) = operator_incompatibility(field, op.as_str(), ty);
                report.errors.push(error);
                report.suggestions.push(suggestion);
            }
            match ty {
                FieldType::Number => {
                    if !is_numeric(value) {
                        report.errors.push(format!(
                            "field '{field}' expects a numeric value, got '{value}'"
                        ));
                        report
                            .suggestions
                            .push(format!("use a number, e.g. {field}:{}1000", op.as_str()));
                    }
                }
                FieldType::Timestamp => {
                    if !is_valid_timestamp(value) {
                        report.errors.push(format!(
                            "field '{field}' expects a timestamp value, got '{value}'"
                        ));
                        report.suggestions.push(
                            "use an ISO date (2024-01-15) or a 10-13 digit epoch".to_string(),
                        );
                    }
                }
                _ => {}
            }
        }
        QueryNode::Range { min, max, .. } => {
            if !ty.supports_operator("range") {
                report.errors.push(format!(
                    "range syntax cannot be used with {ty} field '{field}'"
                ));
                report.suggestions.push(format!(
                    "valid operators for '{field}': {}",
                    ty.valid_operators().join(" ")
                ));
            }
            if let (Ok(lo), Ok(hi)) = (min.parse::<f64>(), max.parse::<f64>()) {
                if lo >= hi {
                    report.errors.push(format!(
                        "invalid range for '{field}': min {min} >= max {max}"
                    ));
                    report
                        .suggestions
                        .push(format!("swap the bounds: {field}:[{max} TO {min}]"));
                }
            }
        }
        QueryNode::Wildcard { .. } => {
            if !ty.supports_operator("~") {
                report.errors.push(format!(
                    "wildcard patterns cannot be used with {ty} field '{field}'"
                ));
                report.suggestions.push(format!(
                    "use an exact value: {field}:<value>"
                ));
            }
        }
        _ => {}
    }
}

/// Value-format checks for plain `field:value` leaves.
fn check_value_format(field: &str, value: &str, ty: FieldType, report: &mut SemanticReport) {
    match ty {
        FieldType::Boolean => {
            if !is_valid_boolean(value) {
                report.errors.push(format!(
                    "field '{field}' expects a boolean value, got '{value}'"
                ));
                report
                    .suggestions
                    .push(format!("use {field}:true or {field}:false"));
            }
        }
        FieldType::Timestamp => {
            if !is_valid_timestamp(value) {
                report.errors.push(format!(
                    "field '{field}' expects a timestamp value, got '{value}'"
                ));
                report
                    .suggestions
                    .push("use an ISO date (2024-01-15) or a 10-13 digit epoch".to_string());
            }
        }
        _ => {}
    }
}

/// Specific incompatibility message for an operator/type mismatch.
fn operator_incompatibility(field: &str, op: &str, ty: FieldType) -> (String, String) {
    let is_comparison = ComparisonOp::from_str(op).is_some_and(|o| o.is_ordering());
    match ty {
        FieldType::Enum if is_comparison => (
            format!("comparison operator '{op}' cannot be used with enum field '{field}'"),
            format!("use '{field}:<value>' for an exact match, or in/not_in for set membership"),
        ),
        FieldType::String if is_comparison => (
            format!("comparison operator '{op}' cannot be used with a string field ('{field}')"),
            "use ':' for an exact match, or contains/startswith/endswith".to_string(),
        ),
        FieldType::Boolean => (
            format!("boolean field '{field}' only supports ':' and '='"),
            format!("use {field}:true or {field}:false"),
        ),
        _ => (
            format!("operator '{op}' is not valid for {ty} field '{field}'"),
            format!(
                "valid operators for '{field}': {}",
                ty.valid_operators().join(" ")
            ),
        ),
    }
}

// ---------------------------------------------------------------------------
// Value formats
// ---------------------------------------------------------------------------

pub(crate) fn is_valid_boolean(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "true" | "false" | "1" | "0" | "yes" | "no"
    )
}

/// ISO-date prefix (`YYYY-MM-DD...`) or a 10-13 digit epoch.
pub(crate) fn is_valid_timestamp(value: &str) -> bool {
    let b = value.as_bytes();
    if b.len() >= 10
        && b[..4].iter().all(u8::is_ascii_digit)
        && b[4] == b'-'
        && b[5..7].iter().all(u8::is_ascii_digit)
        && b[7] == b'-'
        && b[8..10].iter().all(u8::is_ascii_digit)
    {
        return true;
    }
    (10..=13).contains(&b.len()) && b.iter().all(u8::is_ascii_digit)
}

fn is_numeric(value: &str) -> bool {
    value.parse::<f64>().is_ok()
}

// ---------------------------------------------------------------------------
// Query correction
// ---------------------------------------------------------------------------

fn is_keyword(tok: &str) -> bool {
    tok.eq_ignore_ascii_case("AND") || tok.eq_ignore_ascii_case("OR") || tok.eq_ignore_ascii_case("NOT")
}

fn looks_like_field_name(tok: &str) -> bool {
    !tok.is_empty()
        && tok
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Split on whitespace, keeping quoted regions intact.
fn split_quoted(query: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in query.chars() {
        if let Some(qc) = quote {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == qc {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => {
                quote = Some(c);
                current.push(c);
            }
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Best-effort rewrite of a query fixing common mistakes: `==`/`=` instead
/// of `:`, missing `AND` between adjacent conditions, unquoted multi-word
/// values, and deprecated short aliases. Advisory only.
pub fn correct_query(query: &str, entity: EntityType) -> String {
    let tokens = split_quoted(query);

    // Per-token fixes, preserving paren wrappers around the token core.
    let fixed: Vec<String> = tokens
        .iter()
        .map(|tok| fix_token(tok, entity))
        .collect();

    // Merge bare continuation words into the previous clause, quoting the
    // combined value: `device_name:my laptop` -> `device_name:"my laptop"`.
    let mut merged: Vec<String> = Vec::with_capacity(fixed.len());
    for tok in fixed {
        let core = tok.trim_start_matches('(').trim_end_matches(')');
        let is_bare_word = !core.is_empty()
            && !core.contains(':')
            && !is_keyword(core)
            && core != "*"
            && !tok.starts_with('(')
            && !tok.ends_with(')');
        if is_bare_word {
            if let Some(prev) = merged.last_mut() {
                if let Some(colon) = prev.find(':') {
                    if !prev.ends_with(')') && prev[colon + 1..].find('[').is_none() {
                        let field = prev[..colon].to_string();
                        let value = prev[colon + 1..].trim_matches('"').to_string();
                        *prev = format!("{field}:\"{value} {core}\"");
                        continue;
                    }
                }
            }
        }
        merged.push(tok);
    }

    // Insert AND between adjacent conditions.
    let mut out: Vec<String> = Vec::with_capacity(merged.len());
    for tok in merged {
        if let Some(prev) = out.last() {
            if ends_condition(prev) && starts_condition(&tok) {
                out.push("AND".to_string());
            }
        }
        out.push(tok);
    }

    out.join(" ")
}

fn fix_token(tok: &str, entity: EntityType) -> String {
    let open = tok.len() - tok.trim_start_matches('(').len();
    let core_end = tok.trim_end_matches(')').len().max(open);
    let prefix = &tok[..open];
    let suffix = &tok[core_end..];
    let mut core = tok[open..core_end].to_string();

    if !core.contains(':') {
        if let Some(eq) = core.find('=') {
            let field = core[..eq].to_string();
            if looks_like_field_name(&field) && !field.is_empty() {
                let value = core[eq..].trim_start_matches('=').to_string();
                core = format!("{field}:{value}");
            }
        }
    }
    if let Some(colon) = core.find(':') {
        if let Some(canonical) = schema::resolve_alias(entity, &core[..colon]) {
            core = format!("{canonical}{}", &core[colon..]);
        }
    }
    format!("{prefix}{core}{suffix}")
}

fn ends_condition(tok: &str) -> bool {
    if is_keyword(tok.trim_end_matches(')')) {
        return false;
    }
    tok.ends_with(')') || tok.contains(':') || tok == "*"
}

fn starts_condition(tok: &str) -> bool {
    let core = tok.trim_start_matches('(');
    if is_keyword(core) || is_keyword(tok) {
        return false;
    }
    tok.starts_with('(') || tok.contains(':') || tok == "*"
}

// =============================================================================
// Tests
// =============================================================================
