//! Progressive validation: a five-stage weighted pipeline with guided
//! remediation.
//!
//! Stages run in a fixed order and the pipeline halts at the first failing
//! critical stage, so the caller always sees the most fundamental problem
//! first. The performance stage never fails a query; it only contributes
//! warnings. Overall progress is the weighted sum of per-stage scores on a
//! 0-100 scale.

use std::collections::HashMap;

use serde::Serialize;

use crate::ast::{EntityType, QueryNode, MATCH_ALL};
use crate::parser::parse_query;
use crate::schema::FieldType;
use crate::validate::{self, Resolution};

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    BasicSyntax,
    FieldExistence,
    OperatorCompatibility,
    SemanticCorrectness,
    PerformanceOptimization,
}

impl Stage {
    pub fn weight(&self) -> f64 {
        match self {
            Stage::BasicSyntax => 0.30,
            Stage::FieldExistence => 0.25,
            Stage::OperatorCompatibility => 0.25,
            Stage::SemanticCorrectness => 0.15,
            Stage::PerformanceOptimization => 0.05,
        }
    }

    /// Every stage except performance halts the pipeline on failure.
    pub fn is_critical(&self) -> bool {
        !matches!(self, Stage::PerformanceOptimization)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::BasicSyntax => "basic_syntax",
            Stage::FieldExistence => "field_existence",
            Stage::OperatorCompatibility => "operator_compatibility",
            Stage::SemanticCorrectness => "semantic_correctness",
            Stage::PerformanceOptimization => "performance_optimization",
        }
    }
}

/// Outcome of a single pipeline stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageResult {
    pub stage: Stage,
    pub passed: bool,
    /// 0-100.
    pub score: f64,
    pub weight: f64,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
}

impl StageResult {
    fn new(stage: Stage) -> Self {
        StageResult {
            stage,
            passed: true,
            score: 100.0,
            weight: stage.weight(),
            errors: Vec::new(),
            warnings: Vec::new(),
            suggestions: Vec::new(),
        }
    }
}

/// Full progressive validation outcome.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressiveReport {
    pub is_valid: bool,
    /// Weighted sum of stage scores, 0-100, rounded to one decimal.
    pub overall_score: f64,
    pub stages: Vec<StageResult>,
    /// The critical stage that stopped the pipeline, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halted_at: Option<Stage>,
    pub complexity: f64,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Threshold above which structural complexity draws a warning.
const COMPLEXITY_LIMIT: f64 = 10.0;

/// Run all five stages against a query string.
pub fn validate_progressive(query: &str, entity: EntityType) -> ProgressiveReport {
    let mut stages: Vec<StageResult> = Vec::with_capacity(5);
    let mut complexity = 0.0;

    // Stage 1: the query must parse at all.
    let mut syntax = StageResult::new(Stage::BasicSyntax);
    let ast = match parse_query(query) {
        Ok(ast) => Some(ast),
        Err(errs) => {
            syntax.passed = false;
            syntax.score = 0.0;
            syntax.errors = errs.messages();
            syntax.suggestions = errs.suggestions();
            None
        }
    };
    stages.push(syntax);

    if let Some(ast) = ast {
        complexity = ast.counts().complexity();

        let field_stage = run_field_existence(&ast, entity);
        let halted = !field_stage.passed;
        stages.push(field_stage);

        if !halted {
            let op_stage = run_operator_compatibility(&ast, entity);
            let halted = !op_stage.passed;
            stages.push(op_stage);

            if !halted {
                let sem_stage = run_semantic_correctness(&ast, entity);
                let halted = !sem_stage.passed;
                stages.push(sem_stage);

                if !halted {
                    stages.push(run_performance(&ast, complexity));
                }
            }
        }
    }

    let overall_score = round1(
        stages
            .iter()
            .map(|s| s.weight * s.score)
            .sum::<f64>(),
    );
    let halted_at = stages
        .iter()
        .find(|s| s.stage.is_critical() && !s.passed)
        .map(|s| s.stage);

    ProgressiveReport {
        is_valid: halted_at.is_none(),
        overall_score,
        stages,
        halted_at,
        complexity,
    }
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

// ---------------------------------------------------------------------------
// Stage 2: field existence
// ---------------------------------------------------------------------------

fn run_field_existence(ast: &QueryNode, entity: EntityType) -> StageResult {
    let mut stage = StageResult::new(Stage::FieldExistence);
    let mut total = 0usize;
    let mut known = 0usize;

    for leaf in ast.leaves() {
        let Some(field) = leaf.leaf_field() else { continue };
        if field == MATCH_ALL {
            continue;
        }
        total += 1;
        match validate::resolve_field(entity, field) {
            Resolution::Unknown => {
                stage
                    .errors
                    .push(format!("unknown field '{field}' for entity type '{entity}'"));
                let suggested = crate::schema::suggest_fields(entity, field);
                if !suggested.is_empty() {
                    stage
                        .suggestions
                        .push(format!("did you mean: {}", suggested.join(", ")));
                }
            }
            Resolution::Deprecated { canonical, .. } => {
                known += 1;
                stage
                    .warnings
                    .push(format!("'{field}' is deprecated; use '{canonical}'"));
            }
            _ => known += 1,
        }
    }

    if total > 0 {
        stage.score = round1(100.0 * known as f64 / total as f64);
    }
    stage.passed = stage.errors.is_empty();
    stage
}

// ---------------------------------------------------------------------------
// Stage 3: operator compatibility
// ---------------------------------------------------------------------------

fn run_operator_compatibility(ast: &QueryNode, entity: EntityType) -> StageResult {
    let mut stage = StageResult::new(Stage::OperatorCompatibility);
    let mut total = 0usize;
    let mut compatible = 0usize;

    for leaf in ast.leaves() {
        let Some(field) = leaf.leaf_field() else { continue };
        if field == MATCH_ALL {
            continue;
        }
        let operator = match leaf {
            QueryNode::Field { .. } => ":",
            QueryNode::Comparison { op, .. } => op.as_str(),
            QueryNode::Range { .. } => "range",
            QueryNode::Wildcard { .. } => "~",
            _ => continue,
        };
        total += 1;
        let check = validate::validate_operator(field, operator, entity);
        if check.is_valid {
            compatible += 1;
        } else {
            if let Some(e) = check.error {
                stage.errors.push(e);
            }
            if let Some(s) = check.suggestion {
                stage.suggestions.push(s);
            }
        }
    }

    if total > 0 {
        stage.score = round1(100.0 * compatible as f64 / total as f64);
    }
    stage.passed = stage.errors.is_empty();
    stage
}

// ---------------------------------------------------------------------------
// Stage 4: semantic correctness
// ---------------------------------------------------------------------------

fn run_semantic_correctness(ast: &QueryNode, entity: EntityType) -> StageResult {
    let mut stage = StageResult::new(Stage::SemanticCorrectness);

    // Value-format and range-bound findings. Field and operator problems
    // were caught by earlier stages, so anything left here is semantic.
    let sem = validate::validate_semantics(ast, entity);
    stage.errors.extend(sem.errors);
    stage.suggestions.extend(sem.suggestions);

    detect_conjunction_conflicts(ast, entity, &mut stage);

    let penalty = 30.0 * stage.errors.len() as f64 + 10.0 * stage.warnings.len() as f64;
    stage.score = (100.0 - penalty).max(0.0);
    stage.passed = stage.errors.is_empty();
    stage
}

/// Walk the tree looking at each AND-conjunction scope for contradictory or
/// redundant conditions. OR and NOT subtrees start fresh scopes.
fn detect_conjunction_conflicts(node: &QueryNode, entity: EntityType, stage: &mut StageResult) {
    match node {
        QueryNode::And { .. } => {
            let mut leaves = Vec::new();
            let mut boundaries = Vec::new();
            collect_conjuncts(node, &mut leaves, &mut boundaries);
            analyze_conjunction(&leaves, entity, stage);
            for b in boundaries {
                match b {
                    QueryNode::Or { left, right } => {
                        detect_conjunction_conflicts(left, entity, stage);
                        detect_conjunction_conflicts(right, entity, stage);
                    }
                    QueryNode::Not { operand } => {
                        detect_conjunction_conflicts(operand, entity, stage)
                    }
                    _ => {}
                }
            }
        }
        QueryNode::Or { left, right } => {
            detect_conjunction_conflicts(left, entity, stage);
            detect_conjunction_conflicts(right, entity, stage);
        }
        QueryNode::Not { operand } => detect_conjunction_conflicts(operand, entity, stage),
        QueryNode::Group { query } => detect_conjunction_conflicts(query, entity, stage),
        _ => {}
    }
}

/// Flatten an AND subtree into its conjunct leaves; OR/NOT subtrees are
/// returned as scope boundaries to analyze separately.
fn collect_conjuncts<'a>(
    node: &'a QueryNode,
    leaves: &mut Vec<&'a QueryNode>,
    boundaries: &mut Vec<&'a QueryNode>,
) {
    match node {
        QueryNode::And { left, right } => {
            collect_conjuncts(left, leaves, boundaries);
            collect_conjuncts(right, leaves, boundaries);
        }
        QueryNode::Group { query } => collect_conjuncts(query, leaves, boundaries),
        QueryNode::Or { .. } | QueryNode::Not { .. } => boundaries.push(node),
        leaf => leaves.push(leaf),
    }
}

fn normalize_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn analyze_conjunction(leaves: &[&QueryNode], entity: EntityType, stage: &mut StageResult) {
    let mut bool_values: HashMap<&str, (bool, bool)> = HashMap::new();
    let mut eq_values: HashMap<&str, Vec<&str>> = HashMap::new();

    for leaf in leaves {
        let QueryNode::Field { field, value } = leaf else {
            continue;
        };
        let is_boolean = matches!(
            validate::resolve_field(entity, field),
            Resolution::Known(FieldType::Boolean)
                | Resolution::Deprecated {
                    ty: FieldType::Boolean,
                    ..
                }
                | Resolution::Mapped {
                    ty: FieldType::Boolean,
                    ..
                }
        );
        if is_boolean {
            if let Some(b) = normalize_bool(value) {
                let entry = bool_values.entry(field).or_insert((false, false));
                if b {
                    entry.0 = true;
                } else {
                    entry.1 = true;
                }
                continue;
            }
        }
        eq_values.entry(field).or_default().push(value);
    }

    for (field, (saw_true, saw_false)) in bool_values {
        if saw_true && saw_false {
            stage.errors.push(format!(
                "contradictory boolean conditions on '{field}' (both true and false required)"
            ));
            stage
                .suggestions
                .push(format!("keep a single condition on '{field}' or use OR"));
        }
    }

    for (field, values) in eq_values {
        let mut distinct: Vec<&str> = values.clone();
        distinct.sort_unstable();
        distinct.dedup();
        if distinct.len() > 1 {
            stage.errors.push(format!(
                "conflicting values for '{field}' in an AND conjunction: {}",
                distinct.join(", ")
            ));
            stage.suggestions.push(format!(
                "an entity cannot have several values for '{field}'; join them with OR"
            ));
        } else if values.len() > 1 {
            stage.warnings.push(format!(
                "duplicate condition on '{field}:{}'",
                values[0]
            ));
        }
    }
}

// ---------------------------------------------------------------------------
// Stage 5: performance (advisory only)
// ---------------------------------------------------------------------------

fn run_performance(ast: &QueryNode, complexity: f64) -> StageResult {
    let mut stage = StageResult::new(Stage::PerformanceOptimization);
    let counts = ast.counts();

    if complexity > COMPLEXITY_LIMIT {
        stage.warnings.push(format!(
            "high structural complexity ({complexity:.1}); consider splitting the query"
        ));
        stage.score = (100.0 - 5.0 * (complexity - COMPLEXITY_LIMIT)).max(0.0);
    }
    if counts.wildcards > 2 {
        stage.warnings.push(format!(
            "{} wildcard patterns; reduce repeated wildcards to narrow the scan",
            counts.wildcards
        ));
        stage
            .suggestions
            .push("anchor wildcard patterns with a literal prefix where possible".to_string());
    }

    // Performance findings never fail the query.
    stage.passed = true;
    stage
}

// =============================================================================
// Tests
// =============================================================================
