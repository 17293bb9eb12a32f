//! Query parser: pest PEG grammar + Pratt parser, with position-accurate
//! structured errors.
//!
//! Parsing is a two-phase affair. A cheap pre-parse scan catches the common
//! structural mistakes (unmatched parens/quotes, missing colon, `=` used
//! instead of `:`, trailing logical operator) with exact byte positions and
//! quick-fix suggestions. Anything that survives the scan goes through the
//! PEG grammar; residual grammar failures are mapped back to the same
//! structured error shape.

use pest::Parser;
use pest::error::InputLocation;
use pest::iterators::Pair;
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest_derive::Parser;

use crate::ast::{ComparisonOp, QueryNode};
use crate::error::{ParseErrors, SyntaxError};

#[derive(Parser)]
#[grammar = "src/query.pest"]
struct QueryLangParser;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse a query string into a [`QueryNode`] tree.
///
/// The grammar is entity-independent; field/operator checks against a
/// specific entity type happen in [`crate::validate`].
///
/// # Examples
///
/// ```
/// use rtelq_parser::parse_query;
///
/// let ast = parse_query("protocol:tcp AND bytes:>1000000").unwrap();
/// assert_eq!(ast.leaves().len(), 2);
/// ```
pub fn parse_query(input: &str) -> Result<QueryNode, ParseErrors> {
    let pre = scan_syntax(input);
    if !pre.is_empty() {
        return Err(ParseErrors { errors: pre });
    }

    let pairs = QueryLangParser::parse(Rule::query, input)
        .map_err(|e| ParseErrors::single(pest_error_to_syntax(input, &e)))?;

    let pratt = PrattParser::new()
        .op(Op::infix(Rule::or_op, Assoc::Left))
        .op(Op::infix(Rule::and_op, Assoc::Left))
        .op(Op::prefix(Rule::not_op));

    // query = { SOI ~ expr ~ EOI }
    let query_pair = pairs.into_iter().next().expect("query rule always present");
    let expr_pair = query_pair
        .into_inner()
        .find(|p| p.as_rule() == Rule::expr)
        .expect("query must contain expr");

    Ok(parse_expr(expr_pair, &pratt))
}

// ---------------------------------------------------------------------------
// Pre-parse syntax scan
// ---------------------------------------------------------------------------

/// Scan the raw query for structural mistakes the PEG grammar reports badly.
///
/// Returns findings with byte positions; an empty vec means the input is
/// clean enough to hand to the grammar.
fn scan_syntax(input: &str) -> Vec<SyntaxError> {
    let mut errors = Vec::new();

    if input.trim().is_empty() {
        errors.push(SyntaxError::new(
            input,
            0,
            "empty query",
            "provide a search expression, e.g. severity:high, or * to match everything",
        ));
        return errors;
    }

    // Quote and paren balance, tracked byte-by-byte.
    let mut open_parens: Vec<usize> = Vec::new();
    let mut quote: Option<(char, usize)> = None;
    let mut escaped = false;

    for (pos, c) in input.char_indices() {
        if let Some((qc, _)) = quote {
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
            '"' | '\'' => quote = Some((c, pos)),
            '(' => open_parens.push(pos),
            ')' => {
                if open_parens.pop().is_none() {
                    errors.push(SyntaxError::new(
                        input,
                        pos,
                        "unmatched closing parenthesis",
                        "remove the ')' or add a matching '(' earlier in the query",
                    ));
                }
            }
            _ => {}
        }
    }

    if let Some((qc, pos)) = quote {
        errors.push(SyntaxError::new(
            input,
            pos,
            format!("unmatched {qc} quote"),
            format!("add a closing {qc} quote to terminate the value"),
        ));
        // Token-level checks below would misfire on the unterminated tail.
        return errors;
    }

    for &pos in &open_parens {
        errors.push(SyntaxError::new(
            input,
            pos,
            "unmatched opening parenthesis",
            format!("add a closing parenthesis: {input})"),
        ));
    }

    scan_tokens(input, &mut errors);
    errors
}

/// A token with its byte offset, produced outside quoted regions.
fn tokenize(input: &str) -> Vec<(usize, &str)> {
    fn flush<'a>(
        input: &'a str,
        tokens: &mut Vec<(usize, &'a str)>,
        start: &mut Option<usize>,
        end: usize,
    ) {
        if let Some(s) = start.take() {
            tokens.push((s, &input[s..end]));
        }
    }

    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (pos, c) in input.char_indices() {
        if let Some(qc) = quote {
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
                if start.is_none() {
                    start = Some(pos);
                }
                quote = Some(c);
            }
            c if c.is_whitespace() => flush(input, &mut tokens, &mut start, pos),
            '(' | ')' => {
                flush(input, &mut tokens, &mut start, pos);
                tokens.push((pos, &input[pos..pos + 1]));
            }
            _ => {
                if start.is_none() {
                    start = Some(pos);
                }
            }
        }
    }
    flush(input, &mut tokens, &mut start, input.len());
    tokens
}

fn is_logical_keyword(tok: &str) -> bool {
    tok.eq_ignore_ascii_case("AND") || tok.eq_ignore_ascii_case("OR") || tok.eq_ignore_ascii_case("NOT")
}

fn looks_like_field_name(tok: &str) -> bool {
    !tok.is_empty()
        && tok
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Token-level checks: missing colon, `=` instead of `:`, dangling operator,
/// empty values.
fn scan_tokens(input: &str, errors: &mut Vec<SyntaxError>) {
    let tokens = tokenize(input);
    let mut in_range = false;

    for (i, &(pos, tok)) in tokens.iter().enumerate() {
        // `bytes:[500 TO 1000]` spans several tokens; skip until the bracket
        // closes.
        if in_range {
            if tok.contains(']') {
                in_range = false;
            }
            continue;
        }
        if let Some(colon) = tok.find(':') {
            if tok[colon..].contains('[') && !tok.contains(']') {
                in_range = true;
                continue;
            }
        }
        if tok == "(" || tok == ")" || tok == "*" {
            continue;
        }
        if is_logical_keyword(tok) {
            // A logical operator cannot close the query. NOT as the first
            // token is fine.
            let is_last = tokens[i + 1..].iter().all(|&(_, t)| t == ")");
            if is_last {
                errors.push(SyntaxError::new(
                    input,
                    pos,
                    format!("query ends with logical operator '{}'", tok.to_uppercase()),
                    "complete the expression after the operator or remove it",
                ));
            }
            continue;
        }
        if tok.starts_with('"') || tok.starts_with('\'') {
            continue;
        }
        if let Some(colon) = tok.find(':') {
            if colon + 1 == tok.len() {
                errors.push(SyntaxError::new(
                    input,
                    pos + colon,
                    format!("missing value after ':' in '{tok}'"),
                    format!("provide a value, e.g. {tok}value"),
                ));
            }
            continue;
        }
        // No colon. `field=value` is the classic mistake; anything else is a
        // bare word that needs a colon (or quoting as part of the previous
        // value — the corrector handles that rewrite).
        if let Some(eq) = tok.find('=') {
            let (field, rest) = tok.split_at(eq);
            if looks_like_field_name(field) && !field.is_empty() {
                let value = rest.trim_start_matches('=');
                errors.push(SyntaxError::new(
                    input,
                    pos + eq,
                    format!("'=' used instead of ':' in '{tok}'"),
                    format!("use a colon to separate field and value: {field}:{value}"),
                ));
                continue;
            }
        }
        errors.push(SyntaxError::new(
            input,
            pos,
            format!("missing colon after field name '{tok}'"),
            format!("write {tok}:<value>, or quote it if it is part of the previous value"),
        ));
    }
}

// ---------------------------------------------------------------------------
// Grammar error mapping
// ---------------------------------------------------------------------------

fn pest_error_to_syntax(input: &str, err: &pest::error::Error<Rule>) -> SyntaxError {
    let position = match err.location {
        InputLocation::Pos(p) => p,
        InputLocation::Span((s, _)) => s,
    };
    // If the failure point starts a new clause right after a complete one,
    // the likely mistake is a missing AND/OR.
    let suggestion = if position > 0 && position < input.len() {
        "check the syntax near this position; adjacent conditions must be joined with AND or OR"
    } else {
        "check the query syntax"
    };
    SyntaxError::new(input, position, "invalid query syntax", suggestion)
}

// ---------------------------------------------------------------------------
// AST construction
// ---------------------------------------------------------------------------

fn parse_expr(pair: Pair<'_, Rule>, pratt: &PrattParser<Rule>) -> QueryNode {
    pratt
        .map_primary(|primary| match primary.as_rule() {
            Rule::group => {
                let inner = primary
                    .into_inner()
                    .find(|p| p.as_rule() == Rule::expr)
                    .expect("group must contain expr");
                QueryNode::Group {
                    query: Box::new(parse_expr(inner, pratt)),
                }
            }
            Rule::match_all => QueryNode::match_all(),
            Rule::clause => parse_clause(primary),
            Rule::expr => parse_expr(primary, pratt),
            other => unreachable!("unexpected primary rule: {other:?}"),
        })
        .map_prefix(|op, rhs| match op.as_rule() {
            Rule::not_op => QueryNode::Not {
                operand: Box::new(rhs),
            },
            other => unreachable!("unexpected prefix rule: {other:?}"),
        })
        .map_infix(|lhs, op, rhs| match op.as_rule() {
            Rule::and_op => QueryNode::And {
                left: Box::new(lhs),
                right: Box::new(rhs),
            },
            Rule::or_op => QueryNode::Or {
                left: Box::new(lhs),
                right: Box::new(rhs),
            },
            other => unreachable!("unexpected infix rule: {other:?}"),
        })
        .parse(pair.into_inner())
}

fn parse_clause(pair: Pair<'_, Rule>) -> QueryNode {
    let mut field = String::new();
    let mut node = None;

    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::field => field = p.as_str().to_string(),
            Rule::range => {
                let bounds: Vec<&str> = p
                    .into_inner()
                    .filter(|b| b.as_rule() == Rule::bound)
                    .map(|b| b.as_str())
                    .collect();
                node = Some(QueryNode::Range {
                    field: field.clone(),
                    min: bounds.first().unwrap_or(&"").to_string(),
                    max: bounds.get(1).unwrap_or(&"").to_string(),
                });
            }
            Rule::comparison => {
                let mut op = ComparisonOp::Eq;
                let mut value = String::new();
                for c in p.into_inner() {
                    match c.as_rule() {
                        Rule::cmp_op => {
                            op = ComparisonOp::from_str(c.as_str())
                                .expect("grammar only admits known operators");
                        }
                        Rule::value => value = unquote(c.as_str()),
                        _ => {}
                    }
                }
                node = Some(QueryNode::Comparison {
                    field: field.clone(),
                    op,
                    value,
                });
            }
            Rule::value => {
                let raw = p.as_str();
                node = Some(make_value_leaf(&field, raw));
            }
            _ => {}
        }
    }

    node.expect("clause must carry a value")
}

/// Build the leaf for a plain `field:value` clause.
///
/// A bare value containing an unescaped `*` or `?` becomes a wildcard
/// pattern; quoted values are always literal.
fn make_value_leaf(field: &str, raw: &str) -> QueryNode {
    let quoted = raw.starts_with('"') || raw.starts_with('\'');
    if !quoted && contains_unescaped_wildcard(raw) {
        return QueryNode::Wildcard {
            field: field.to_string(),
            pattern: raw.to_string(),
        };
    }
    QueryNode::Field {
        field: field.to_string(),
        value: unquote(raw),
    }
}

fn contains_unescaped_wildcard(s: &str) -> bool {
    let mut escaped = false;
    for c in s.chars() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '*' || c == '?' {
            return true;
        }
    }
    false
}

/// Strip surrounding quotes and process backslash escapes.
///
/// Inside quotes, `\` escapes the quote character, `\` itself, and the
/// wildcard characters; before anything else the backslash is kept literal
/// (important for paths and regex-ish values).
pub(crate) fn unquote(raw: &str) -> String {
    let (body, quoted) = match raw.as_bytes() {
        [b'"', .., b'"'] if raw.len() >= 2 => (&raw[1..raw.len() - 1], true),
        [b'\'', .., b'\''] if raw.len() >= 2 => (&raw[1..raw.len() - 1], true),
        _ => (raw, false),
    };

    let mut out = String::with_capacity(body.len());
    let mut escaped = false;
    for c in body.chars() {
        if escaped {
            if !matches!(c, '"' | '\'' | '\\' | '*' | '?') {
                out.push('\\');
            }
            out.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else {
            out.push(c);
        }
    }
    if escaped {
        out.push('\\');
    }
    let _ = quoted;
    out
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ComparisonOp;

    fn field(f: &str, v: &str) -> QueryNode {
        QueryNode::Field {
            field: f.into(),
            value: v.into(),
        }
    }

    #[test]
    fn test_simple_field() {
        let ast = parse_query("protocol:tcp").unwrap();
        assert_eq!(ast, field("protocol", "tcp"));
    }

    #[test]
    fn test_and_with_comparison() {
        // protocol:tcp AND bytes:>1000000
        let ast = parse_query("protocol:tcp AND bytes:>1000000").unwrap();
        assert_eq!(
            ast,
            QueryNode::And {
                left: Box::new(field("protocol", "tcp")),
                right: Box::new(QueryNode::Comparison {
                    field: "bytes".into(),
                    op: ComparisonOp::Gt,
                    value: "1000000".into(),
                }),
            }
        );
    }

    #[test]
    fn test_case_insensitive_keywords() {
        let ast = parse_query("severity:high and resolved:false").unwrap();
        assert!(matches!(ast, QueryNode::And { .. }));
        let ast = parse_query("severity:high or severity:critical").unwrap();
        assert!(matches!(ast, QueryNode::Or { .. }));
    }

    #[test]
    fn test_keyword_substring_is_identifier() {
        // "android" starts with "and" but is a value, not an operator
        let ast = parse_query("category:android").unwrap();
        assert_eq!(ast, field("category", "android"));
    }

    #[test]
    fn test_not_first_token() {
        let ast = parse_query("NOT blocked:true").unwrap();
        assert_eq!(
            ast,
            QueryNode::Not {
                operand: Box::new(field("blocked", "true")),
            }
        );
    }

    #[test]
    fn test_precedence_or_lowest() {
        // a OR b AND c == a OR (b AND c)
        let ast = parse_query("protocol:tcp OR protocol:udp AND blocked:true").unwrap();
        match ast {
            QueryNode::Or { left, right } => {
                assert_eq!(*left, field("protocol", "tcp"));
                assert!(matches!(*right, QueryNode::And { .. }));
            }
            other => panic!("expected OR at root, got {other:?}"),
        }
    }

    #[test]
    fn test_not_binds_tighter_than_and() {
        // NOT a AND b == (NOT a) AND b
        let ast = parse_query("NOT blocked:true AND protocol:tcp").unwrap();
        match ast {
            QueryNode::And { left, .. } => assert!(matches!(*left, QueryNode::Not { .. })),
            other => panic!("expected AND at root, got {other:?}"),
        }
    }

    #[test]
    fn test_group() {
        let ast = parse_query("(severity:high OR severity:critical) AND resolved:false").unwrap();
        match ast {
            QueryNode::And { left, .. } => assert!(matches!(*left, QueryNode::Group { .. })),
            other => panic!("expected AND at root, got {other:?}"),
        }
    }

    #[test]
    fn test_all_comparison_operators() {
        for (text, op) in [
            (">", ComparisonOp::Gt),
            ("<", ComparisonOp::Lt),
            (">=", ComparisonOp::Ge),
            ("<=", ComparisonOp::Le),
            ("!=", ComparisonOp::Ne),
            ("=", ComparisonOp::Eq),
        ] {
            let ast = parse_query(&format!("bytes:{text}500")).unwrap();
            assert_eq!(
                ast,
                QueryNode::Comparison {
                    field: "bytes".into(),
                    op,
                    value: "500".into(),
                },
                "operator {text}"
            );
        }
    }

    #[test]
    fn test_range() {
        let ast = parse_query("timestamp:[2024-01-01 TO 2024-12-31]").unwrap();
        assert_eq!(
            ast,
            QueryNode::Range {
                field: "timestamp".into(),
                min: "2024-01-01".into(),
                max: "2024-12-31".into(),
            }
        );
    }

    #[test]
    fn test_range_lowercase_to() {
        let ast = parse_query("bytes:[100 to 200]").unwrap();
        assert!(matches!(ast, QueryNode::Range { .. }));
    }

    #[test]
    fn test_wildcard() {
        let ast = parse_query("source_ip:192.168.*").unwrap();
        assert_eq!(
            ast,
            QueryNode::Wildcard {
                field: "source_ip".into(),
                pattern: "192.168.*".into(),
            }
        );
    }

    #[test]
    fn test_match_all() {
        let ast = parse_query("*").unwrap();
        assert!(ast.is_match_all());
    }

    #[test]
    fn test_quoted_value_preserves_whitespace() {
        let ast = parse_query("device_name:\"my laptop\"").unwrap();
        assert_eq!(ast, field("device_name", "my laptop"));
    }

    #[test]
    fn test_single_quoted_value() {
        let ast = parse_query("device_name:'home pc'").unwrap();
        assert_eq!(ast, field("device_name", "home pc"));
    }

    #[test]
    fn test_quoted_value_with_escape() {
        let ast = parse_query(r#"message:"say \"hi\"""#).unwrap();
        assert_eq!(ast, field("message", "say \"hi\""));
    }

    #[test]
    fn test_quoted_wildcard_is_literal() {
        let ast = parse_query("device_name:\"*laptop*\"").unwrap();
        assert_eq!(ast, field("device_name", "*laptop*"));
    }

    // -- error cases ---------------------------------------------------------

    #[test]
    fn test_unmatched_open_paren_position_zero() {
        let err = parse_query("(protocol:tcp").unwrap_err();
        let e = &err.errors[0];
        assert_eq!(e.position, 0);
        assert!(e.message.contains("unmatched opening parenthesis"));
        assert!(e.suggestion.contains("(protocol:tcp)"));
    }

    #[test]
    fn test_unmatched_close_paren() {
        let err = parse_query("protocol:tcp)").unwrap_err();
        assert_eq!(err.errors[0].position, 12);
        assert!(err.errors[0].message.contains("closing parenthesis"));
    }

    #[test]
    fn test_unmatched_quote() {
        let err = parse_query("device_name:\"laptop").unwrap_err();
        assert_eq!(err.errors[0].position, 12);
        assert!(err.errors[0].message.contains("quote"));
    }

    #[test]
    fn test_tokenize_slices_borrow_from_input() {
        let input = r#"a:1 (b:"two words") c:3"#;
        let tokens = tokenize(input);
        let texts: Vec<&str> = tokens.iter().map(|&(_, t)| t).collect();
        assert_eq!(texts, vec!["a:1", "(", "b:\"two words\"", ")", "c:3"]);
        // every offset/slice pair points back into the original input
        for &(pos, t) in &tokens {
            assert_eq!(&input[pos..pos + t.len()], t);
        }
    }

    #[test]
    fn test_missing_colon() {
        let err = parse_query("severity high").unwrap_err();
        assert!(
            err.errors
                .iter()
                .any(|e| e.message.contains("missing colon")),
            "expected missing-colon error: {err:?}"
        );
    }

    #[test]
    fn test_equals_instead_of_colon() {
        let err = parse_query("severity=high").unwrap_err();
        let e = &err.errors[0];
        assert!(e.message.contains("'='"));
        assert!(e.suggestion.contains("severity:high"));
        assert_eq!(e.position, 8);
    }

    #[test]
    fn test_trailing_operator() {
        let err = parse_query("protocol:tcp AND").unwrap_err();
        assert!(err.errors[0].message.contains("ends with logical operator"));
        assert_eq!(err.errors[0].position, 13);
    }

    #[test]
    fn test_trailing_operator_inside_group() {
        let err = parse_query("(protocol:tcp AND)").unwrap_err();
        assert!(
            err.errors
                .iter()
                .any(|e| e.message.contains("ends with logical operator"))
        );
    }

    #[test]
    fn test_empty_query() {
        let err = parse_query("   ").unwrap_err();
        assert_eq!(err.errors[0].position, 0);
        assert!(err.errors[0].message.contains("empty"));
    }

    #[test]
    fn test_missing_value_after_colon() {
        let err = parse_query("severity:").unwrap_err();
        assert!(err.errors[0].message.contains("missing value"));
    }

    #[test]
    fn test_errors_are_structured_not_panics() {
        for bad in ["((a:1)", "a:1 OR", "NOT", "b=2 AND c=3", "\"unterminated"] {
            assert!(parse_query(bad).is_err(), "expected error for {bad:?}");
        }
    }

    // -- round-trip ----------------------------------------------------------

    #[test]
    fn test_round_trip_structural_equality() {
        let queries = [
            "protocol:tcp AND bytes:>1000000",
            "(severity:high OR severity:critical) AND source_ip:192.168.*",
            "NOT (blocked:true AND protocol:udp)",
            "timestamp:[2024-01-01 TO 2024-12-31]",
            "device_name:\"my laptop\" OR device_name:desktop",
            "*",
            "severity:>=medium AND NOT resolved:true",
        ];
        for q in queries {
            let ast = parse_query(q).unwrap();
            let rendered = ast.to_string();
            let reparsed = parse_query(&rendered)
                .unwrap_or_else(|e| panic!("re-parse of {rendered:?} failed: {e}"));
            assert_eq!(ast, reparsed, "round-trip mismatch for {q:?}");
        }
    }
}
