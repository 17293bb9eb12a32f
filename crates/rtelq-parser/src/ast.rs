//! AST types for the telemetry query language.
//!
//! A query string like `protocol:tcp AND bytes:>1000000` parses into a tree
//! of [`QueryNode`] variants. The tree is immutable; validators and the
//! search compiler walk it with exhaustive matches.

use std::fmt;

use serde::Serialize;

// =============================================================================
// Entity types
// =============================================================================

/// The five monitored record kinds a query can target.
///
/// Drives which field set, validation rules, and field-mapping table apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Flows,
    Alarms,
    Rules,
    Devices,
    TargetLists,
}

impl EntityType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "flows" => Some(EntityType::Flows),
            "alarms" => Some(EntityType::Alarms),
            "rules" => Some(EntityType::Rules),
            "devices" => Some(EntityType::Devices),
            "target_lists" => Some(EntityType::TargetLists),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Flows => "flows",
            EntityType::Alarms => "alarms",
            EntityType::Rules => "rules",
            EntityType::Devices => "devices",
            EntityType::TargetLists => "target_lists",
        }
    }

    /// All entity types, for iteration in compatibility checks.
    pub const ALL: [EntityType; 5] = [
        EntityType::Flows,
        EntityType::Alarms,
        EntityType::Rules,
        EntityType::Devices,
        EntityType::TargetLists,
    ];
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Comparison operators
// =============================================================================

/// Comparison operator in a `field:>value` style leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonOp {
    Gt,
    Lt,
    Ge,
    Le,
    Ne,
    Eq,
}

impl ComparisonOp {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            ">" => Some(ComparisonOp::Gt),
            "<" => Some(ComparisonOp::Lt),
            ">=" => Some(ComparisonOp::Ge),
            "<=" => Some(ComparisonOp::Le),
            "!=" => Some(ComparisonOp::Ne),
            "=" => Some(ComparisonOp::Eq),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOp::Gt => ">",
            ComparisonOp::Lt => "<",
            ComparisonOp::Ge => ">=",
            ComparisonOp::Le => "<=",
            ComparisonOp::Ne => "!=",
            ComparisonOp::Eq => "=",
        }
    }

    /// True for the ordering operators (`>`, `<`, `>=`, `<=`).
    pub fn is_ordering(&self) -> bool {
        matches!(
            self,
            ComparisonOp::Gt | ComparisonOp::Lt | ComparisonOp::Ge | ComparisonOp::Le
        )
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Query nodes
// =============================================================================

/// The match-all sentinel field/value (`*` as an entire query).
pub const MATCH_ALL: &str = "*";

/// A parsed query expression.
///
/// Leaves carry a field name that must resolve — directly or via
/// alias/mapping — to a member of the target entity type's field set, or be
/// the [`MATCH_ALL`] sentinel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum QueryNode {
    /// Equality match: `field:value`. `field == "*"` matches everything.
    Field { field: String, value: String },

    /// Comparison: `field:>value`, `field:!=value`, etc.
    Comparison {
        field: String,
        op: ComparisonOp,
        value: String,
    },

    /// Inclusive interval: `field:[min TO max]`.
    Range {
        field: String,
        min: String,
        max: String,
    },

    /// Glob pattern: `field:192.168.*` (`*` multi, `?` single).
    Wildcard { field: String, pattern: String },

    /// Binary conjunction: `left AND right`.
    And {
        left: Box<QueryNode>,
        right: Box<QueryNode>,
    },

    /// Binary disjunction: `left OR right`.
    Or {
        left: Box<QueryNode>,
        right: Box<QueryNode>,
    },

    /// Unary negation: `NOT operand`.
    Not { operand: Box<QueryNode> },

    /// Parenthesized sub-tree, kept explicit so precedence round-trips.
    Group { query: Box<QueryNode> },
}

impl QueryNode {
    /// The bare `*` match-all query.
    pub fn match_all() -> Self {
        QueryNode::Field {
            field: MATCH_ALL.to_string(),
            value: MATCH_ALL.to_string(),
        }
    }

    /// True if this node is the match-all sentinel.
    pub fn is_match_all(&self) -> bool {
        matches!(self, QueryNode::Field { field, .. } if field == MATCH_ALL)
    }

    /// True for leaf nodes (field conditions, not combinators).
    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            QueryNode::Field { .. }
                | QueryNode::Comparison { .. }
                | QueryNode::Range { .. }
                | QueryNode::Wildcard { .. }
        )
    }

    /// The field name of a leaf node, if any.
    pub fn leaf_field(&self) -> Option<&str> {
        match self {
            QueryNode::Field { field, .. }
            | QueryNode::Comparison { field, .. }
            | QueryNode::Range { field, .. }
            | QueryNode::Wildcard { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Collect all leaf nodes in source order.
    pub fn leaves(&self) -> Vec<&QueryNode> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a QueryNode>) {
        match self {
            QueryNode::And { left, right } | QueryNode::Or { left, right } => {
                left.collect_leaves(out);
                right.collect_leaves(out);
            }
            QueryNode::Not { operand } => operand.collect_leaves(out),
            QueryNode::Group { query } => query.collect_leaves(out),
            leaf => out.push(leaf),
        }
    }

    /// Structural counts used for complexity scoring.
    pub fn counts(&self) -> NodeCounts {
        let mut c = NodeCounts::default();
        self.accumulate_counts(&mut c);
        c
    }

    fn accumulate_counts(&self, c: &mut NodeCounts) {
        match self {
            QueryNode::Field { .. } => c.conditions += 1,
            QueryNode::Comparison { .. } => c.conditions += 1,
            QueryNode::Range { .. } => {
                c.conditions += 1;
                c.ranges += 1;
            }
            QueryNode::Wildcard { .. } => {
                c.conditions += 1;
                c.wildcards += 1;
            }
            QueryNode::And { left, right } | QueryNode::Or { left, right } => {
                c.logical_ops += 1;
                left.accumulate_counts(c);
                right.accumulate_counts(c);
            }
            QueryNode::Not { operand } => {
                c.logical_ops += 1;
                operand.accumulate_counts(c);
            }
            QueryNode::Group { query } => {
                c.groups += 1;
                query.accumulate_counts(c);
            }
        }
    }
}

/// Structural node counts for a query tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct NodeCounts {
    pub conditions: usize,
    pub logical_ops: usize,
    pub wildcards: usize,
    pub groups: usize,
    pub ranges: usize,
}

impl NodeCounts {
    /// Weighted structural complexity of a query.
    ///
    /// `2×logical + conditions + 1.5×wildcards + groups + 2×ranges`
    pub fn complexity(&self) -> f64 {
        2.0 * self.logical_ops as f64
            + self.conditions as f64
            + 1.5 * self.wildcards as f64
            + self.groups as f64
            + 2.0 * self.ranges as f64
    }
}

// =============================================================================
// Display — query serialization (round-trips through the parser)
// =============================================================================

/// Quote a value when it would not survive re-tokenization bare.
fn quote_value(v: &str) -> String {
    let needs_quotes = v.is_empty()
        || v.chars()
            .any(|c| c.is_whitespace() || matches!(c, '(' | ')' | '"' | '\''));
    if !needs_quotes {
        return v.to_string();
    }
    let mut out = String::with_capacity(v.len() + 2);
    out.push('"');
    for c in v.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

impl fmt::Display for QueryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryNode::Field { field, value } => {
                if field == MATCH_ALL {
                    write!(f, "*")
                } else {
                    write!(f, "{field}:{}", quote_value(value))
                }
            }
            QueryNode::Comparison { field, op, value } => {
                write!(f, "{field}:{op}{}", quote_value(value))
            }
            QueryNode::Range { field, min, max } => write!(f, "{field}:[{min} TO {max}]"),
            QueryNode::Wildcard { field, pattern } => write!(f, "{field}:{pattern}"),
            QueryNode::And { left, right } => write!(f, "{left} AND {right}"),
            QueryNode::Or { left, right } => write!(f, "{left} OR {right}"),
            QueryNode::Not { operand } => write!(f, "NOT {operand}"),
            QueryNode::Group { query } => write!(f, "({query})"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
