//! Weighted fuzzy-scored correlation.
//!
//! For each secondary entity, every correlation field is scored against the
//! normalized primary value set: 1.0 for an exact match, otherwise the best
//! fuzzy similarity (IPv4 subnet octets, Levenshtein, numeric tolerance,
//! geographic), or 0. Field scores combine into a weighted average; AND
//! correlation additionally multiplies by a completeness penalty so missing
//! fields hurt exponentially. Every computed score is checked against
//! `[0, 1]`; a violation is a scoring bug and raises
//! [`EvalError::ScoreOutOfRange`] instead of being clamped.

use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;

use rtelq_parser::EntityType;

use crate::config::{validate_config, CorrelationOptions, CorrelationType};
use crate::entity::Entity;
use crate::error::{EvalError, Result};
use crate::mapper;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// How a field or entity matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Exact,
    Fuzzy,
    Partial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            Confidence::High
        } else if score >= 0.5 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

/// One retained secondary entity with its per-field score breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredCorrelationResult {
    pub entity: Value,
    pub correlation_score: f64,
    pub field_scores: HashMap<String, f64>,
    pub field_match_types: HashMap<String, MatchKind>,
    pub match_type: MatchKind,
    pub confidence: Confidence,
}

/// Per-field aggregate counters over retained results.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FieldStats {
    pub exact: usize,
    pub fuzzy: usize,
    pub partial: usize,
    pub average_score: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScoreDistribution {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CorrelationStats {
    pub total: usize,
    pub correlated: usize,
    pub score_distribution: ScoreDistribution,
    pub field_stats: HashMap<String, FieldStats>,
}

/// Full outcome: ranked results plus aggregates, advisory warnings, and any
/// configuration errors (which empty the result set but never raise).
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationOutcome {
    pub results: Vec<ScoredCorrelationResult>,
    pub stats: CorrelationStats,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl CorrelationOutcome {
    fn config_failure(total: usize, errors: Vec<String>) -> Self {
        CorrelationOutcome {
            results: Vec::new(),
            stats: CorrelationStats {
                total,
                ..CorrelationStats::default()
            },
            warnings: Vec::new(),
            errors,
        }
    }
}

// ---------------------------------------------------------------------------
// Soft thresholds (advisory warnings only)
// ---------------------------------------------------------------------------

const MAX_TOTAL_ITEMS: usize = 5_000;
const MAX_SIDE_ITEMS: usize = 2_000;
const MAX_FUZZY_COMPLEXITY: usize = 10_000;

// ---------------------------------------------------------------------------
// Primary value sets with quality
// ---------------------------------------------------------------------------

/// Values that carry no correlation signal.
fn value_quality(normalized: &str, field: &str) -> f64 {
    match normalized {
        "" | "unknown" | "n/a" | "none" | "null" | "-" => return 0.0,
        "127.0.0.1" | "::1" | "0.0.0.0" => return 0.0,
        _ => {}
    }
    if mapper::is_ip_field(field) && !mapper::is_wellformed_ip(normalized) {
        return 0.5;
    }
    1.0
}

struct PrimaryValues {
    /// Normalized values with positive quality, for exact and fuzzy matching.
    values: Vec<String>,
    set: HashSet<String>,
}

fn extract_primary_values(
    primary: &[Value],
    primary_type: EntityType,
    fields: &[String],
    warnings: &mut Vec<String>,
) -> HashMap<String, PrimaryValues> {
    let mut out: HashMap<String, PrimaryValues> = HashMap::new();
    for field in fields {
        let mut values = Vec::new();
        let mut set = HashSet::new();
        let mut malformed = 0usize;
        for record in primary {
            let entity = Entity::from_value(record);
            let Some(v) = mapper::get_field_value(&entity, field, primary_type) else {
                continue;
            };
            let Some(normalized) = mapper::normalize_field_value(v, field) else {
                continue;
            };
            let quality = value_quality(&normalized, field);
            if quality == 0.0 {
                continue;
            }
            if quality < 1.0 {
                malformed += 1;
            }
            if set.insert(normalized.clone()) {
                values.push(normalized);
            }
        }
        if malformed > 0 {
            warnings.push(format!(
                "{malformed} malformed IP value(s) in primary field '{field}'; comparing as plain strings"
            ));
        }
        out.insert(field.clone(), PrimaryValues { values, set });
    }
    out
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Score every secondary entity against the primary result set.
///
/// Configuration problems are reported in the outcome's `errors`; `Err` is
/// reserved for internal invariant violations (a score outside `[0, 1]`).
pub fn scored_correlation(
    primary: &[Value],
    primary_type: EntityType,
    secondary: &[Value],
    secondary_type: EntityType,
    fields: &[String],
    options: &CorrelationOptions,
) -> Result<CorrelationOutcome> {
    let config_errors = validate_config(fields, &[primary_type, secondary_type], options);
    if !config_errors.is_empty() {
        return Ok(CorrelationOutcome::config_failure(
            secondary.len(),
            config_errors,
        ));
    }

    let mut warnings = advisory_warnings(primary.len(), secondary.len(), fields.len(), options);
    let primary_values = extract_primary_values(primary, primary_type, fields, &mut warnings);

    let temporal_bounds = options
        .temporal_window
        .as_ref()
        .and_then(|w| primary_time_bounds(primary, primary_type, w.seconds()));

    let mut results: Vec<ScoredCorrelationResult> = Vec::new();

    for record in secondary {
        let entity = Entity::from_value(record);

        if let Some((lo, hi)) = temporal_bounds {
            match entity_timestamp(&entity, secondary_type) {
                Some(ts) if ts >= lo && ts <= hi => {}
                _ => continue,
            }
        }

        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;
        let mut active_fields = 0usize;
        let mut matched_fields = 0usize;
        let mut field_scores = HashMap::new();
        let mut field_match_types = HashMap::new();

        for field in fields {
            let weight = options.weights.resolve(field);
            if weight == 0.0 {
                // excluded from the weighted denominator entirely
                continue;
            }
            active_fields += 1;

            let values = &primary_values[field];
            let secondary_value = mapper::get_field_value(&entity, field, secondary_type)
                .and_then(|v| mapper::normalize_field_value(v, field));

            let score = match secondary_value {
                Some(ref sv) => check_score(
                    field_score(sv, values, field, options),
                    &format!("field '{field}'"),
                )?,
                None => 0.0,
            };

            let kind = if score >= 1.0 {
                MatchKind::Exact
            } else if score > 0.0 {
                MatchKind::Fuzzy
            } else {
                MatchKind::Partial
            };

            if score > 0.0 {
                matched_fields += 1;
            }
            weighted_sum += weight * score;
            weight_total += weight;
            field_scores.insert(field.clone(), round3(score));
            field_match_types.insert(field.clone(), kind);
        }

        let base = if weight_total > 0.0 {
            weighted_sum / weight_total
        } else {
            0.0
        };
        // The penalty denominator counts nonzero-weight fields only, so a
        // muted field cannot drag AND scores down. Runs that mute a field
        // therefore score higher than ones dividing by the full field count.
        let score = match options.correlation_type {
            CorrelationType::And if active_fields > 0 => {
                base * matched_fields as f64 / active_fields as f64
            }
            _ => base,
        };
        let score = check_score(score, "entity correlation")?;

        if score < options.minimum_score {
            continue;
        }

        let match_type = if field_match_types.values().any(|k| *k == MatchKind::Exact) {
            MatchKind::Exact
        } else if field_match_types.values().any(|k| *k == MatchKind::Fuzzy) {
            MatchKind::Fuzzy
        } else {
            MatchKind::Partial
        };

        results.push(ScoredCorrelationResult {
            entity: record.clone(),
            correlation_score: round3(score),
            field_scores,
            field_match_types,
            match_type,
            confidence: Confidence::from_score(score),
        });
    }

    results.sort_by(|a, b| b.correlation_score.total_cmp(&a.correlation_score));

    let stats = build_stats(secondary.len(), &results, fields);

    Ok(CorrelationOutcome {
        results,
        stats,
        warnings,
        errors: Vec::new(),
    })
}

fn advisory_warnings(
    primary_len: usize,
    secondary_len: usize,
    field_count: usize,
    options: &CorrelationOptions,
) -> Vec<String> {
    let mut warnings = Vec::new();
    let total = primary_len + secondary_len;
    if total > MAX_TOTAL_ITEMS {
        warnings.push(format!(
            "correlating {total} items exceeds the advised total of {MAX_TOTAL_ITEMS}; expect slow evaluation"
        ));
    }
    if primary_len > MAX_SIDE_ITEMS || secondary_len > MAX_SIDE_ITEMS {
        warnings.push(format!(
            "one result set exceeds {MAX_SIDE_ITEMS} items; consider narrowing the search"
        ));
    }
    if options.fuzzy.enabled && field_count * total > MAX_FUZZY_COMPLEXITY {
        warnings.push(format!(
            "fuzzy matching over {field_count} field(s) x {total} items exceeds a complexity of {MAX_FUZZY_COMPLEXITY}; consider disabling fuzzy matching or reducing the dataset"
        ));
    }
    warnings
}

// ---------------------------------------------------------------------------
// Field scoring
// ---------------------------------------------------------------------------

/// Score one normalized secondary value against a field's primary values.
fn field_score(secondary: &str, primary: &PrimaryValues, field: &str, options: &CorrelationOptions) -> f64 {
    if primary.set.contains(secondary) {
        return 1.0;
    }
    if !options.fuzzy.enabled {
        return 0.0;
    }

    let fuzzy = &options.fuzzy;
    let mut best: f64 = 0.0;

    for value in &primary.values {
        let candidate = if mapper::is_ip_field(field) {
            if fuzzy.ip_subnet_matching {
                ip_octet_similarity(value, secondary)
            } else {
                0.0
            }
        } else if let (Ok(a), Ok(b)) = (value.parse::<f64>(), secondary.parse::<f64>()) {
            numeric_similarity(a, b, fuzzy.numeric_tolerance)
        } else if is_geo_field(field) {
            if fuzzy.geographic_matching {
                geo_similarity(value, secondary)
            } else {
                0.0
            }
        } else {
            string_similarity(value, secondary, fuzzy.string_threshold)
        };
        best = best.max(candidate);
    }
    best
}

fn is_geo_field(field: &str) -> bool {
    matches!(field, "country" | "region" | "city")
}

/// 0.25 per matching leading octet, IPv4 only. A full four-octet match is
/// the exact path's job, so this caps at 0.75.
fn ip_octet_similarity(a: &str, b: &str) -> f64 {
    let (Ok(a), Ok(b)) = (a.parse::<Ipv4Addr>(), b.parse::<Ipv4Addr>()) else {
        return 0.0;
    };
    let a = a.octets();
    let b = b.octets();
    let shared = a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count();
    0.25 * shared.min(3) as f64
}

/// Normalized Levenshtein similarity, capped at 0.8 and gated on the
/// configured threshold.
fn string_similarity(a: &str, b: &str, threshold: f64) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 0.0;
    }
    let similarity = 1.0 - levenshtein(a, b) as f64 / max_len as f64;
    if similarity >= threshold {
        similarity.min(0.8)
    } else {
        0.0
    }
}

/// Relative-difference similarity for numeric values, capped at 0.7.
fn numeric_similarity(a: f64, b: f64, tolerance: f64) -> f64 {
    if tolerance <= 0.0 {
        return 0.0;
    }
    let scale = a.abs().max(b.abs());
    if scale == 0.0 {
        // both zero is an exact match handled upstream
        return 0.0;
    }
    let relative = (a - b).abs() / scale;
    if relative <= tolerance {
        (1.0 - relative).min(0.7)
    } else {
        0.0
    }
}

/// Simplified geographic similarity, capped at 0.6.
fn geo_similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 0.0;
    }
    let similarity = 1.0 - levenshtein(a, b) as f64 / max_len as f64;
    if similarity >= 0.5 {
        similarity.min(0.6)
    } else {
        0.0
    }
}

/// Classic two-row Levenshtein distance.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

// ---------------------------------------------------------------------------
// Score invariant
// ---------------------------------------------------------------------------

/// Enforce the `[0, 1]` score invariant. Raises instead of clamping; an
/// out-of-range score is always an internal bug.
pub(crate) fn check_score(score: f64, context: &str) -> Result<f64> {
    if (0.0..=1.0).contains(&score) {
        Ok(score)
    } else {
        Err(EvalError::ScoreOutOfRange {
            score,
            context: context.to_string(),
        })
    }
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

// ---------------------------------------------------------------------------
// Temporal window
// ---------------------------------------------------------------------------

/// `[min(primary ts) - window, max(primary ts) + window]` in epoch seconds.
/// `None` when no primary record carries a usable timestamp.
fn primary_time_bounds(
    primary: &[Value],
    primary_type: EntityType,
    window_secs: f64,
) -> Option<(f64, f64)> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for record in primary {
        let entity = Entity::from_value(record);
        if let Some(ts) = entity_timestamp(&entity, primary_type) {
            min = min.min(ts);
            max = max.max(ts);
        }
    }
    (min <= max).then_some((min - window_secs, max + window_secs))
}

fn entity_timestamp(entity: &Entity<'_>, entity_type: EntityType) -> Option<f64> {
    let v = mapper::get_field_value(entity, "timestamp", entity_type)
        .or_else(|| mapper::get_field_value(entity, "last_seen", entity_type))?;
    timestamp_seconds(v)
}

/// Epoch seconds from a timestamp value: numbers are taken as-is, strings
/// are parsed as dates.
fn timestamp_seconds(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_timestamp_string(s),
        _ => None,
    }
}

/// Parse a query-side bound (epoch number or date string) to epoch seconds.
pub(crate) fn timestamp_bound(raw: &str) -> Option<f64> {
    parse_timestamp_string(raw)
}

fn parse_timestamp_string(s: &str) -> Option<f64> {
    if let Ok(n) = s.parse::<f64>() {
        return Some(n);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp() as f64);
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc().timestamp() as f64);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp() as f64);
    }
    None
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

fn build_stats(
    total: usize,
    results: &[ScoredCorrelationResult],
    fields: &[String],
) -> CorrelationStats {
    let mut distribution = ScoreDistribution::default();
    for r in results {
        match r.confidence {
            Confidence::High => distribution.high += 1,
            Confidence::Medium => distribution.medium += 1,
            Confidence::Low => distribution.low += 1,
        }
    }

    let mut field_stats: HashMap<String, FieldStats> = HashMap::new();
    for field in fields {
        let mut stats = FieldStats::default();
        let mut sum = 0.0;
        let mut count = 0usize;
        for r in results {
            if let Some(kind) = r.field_match_types.get(field) {
                match kind {
                    MatchKind::Exact => stats.exact += 1,
                    MatchKind::Fuzzy => stats.fuzzy += 1,
                    MatchKind::Partial => stats.partial += 1,
                }
            }
            if let Some(score) = r.field_scores.get(field) {
                sum += score;
                count += 1;
            }
        }
        if count > 0 {
            stats.average_score = round3(sum / count as f64);
        }
        field_stats.insert(field.clone(), stats);
    }

    CorrelationStats {
        total,
        correlated: results.len(),
        score_distribution: distribution,
        field_stats,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CorrelationWeights, FuzzyConfig, TemporalWindow, TimeUnit};
    use serde_json::json;

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn fuzzy_options() -> CorrelationOptions {
        CorrelationOptions {
            fuzzy: FuzzyConfig {
                enabled: true,
                ..FuzzyConfig::default()
            },
            ..CorrelationOptions::default()
        }
    }

    #[test]
    fn test_subnet_fuzzy_score_three_octets() {
        // /24 neighbors score 0.75 and are flagged fuzzy
        let primary = vec![json!({"source_ip": "10.0.0.1"})];
        let secondary = vec![json!({"device_ip": "10.0.0.5"})];
        let outcome = scored_correlation(
            &primary,
            EntityType::Flows,
            &secondary,
            EntityType::Alarms,
            &fields(&["source_ip"]),
            &fuzzy_options(),
        )
        .unwrap();
        assert_eq!(outcome.results.len(), 1);
        let r = &outcome.results[0];
        assert_eq!(r.correlation_score, 0.75);
        assert_eq!(r.field_scores["source_ip"], 0.75);
        assert_eq!(r.match_type, MatchKind::Fuzzy);
        assert_eq!(r.confidence, Confidence::Medium);
    }

    #[test]
    fn test_octet_similarity_ladder() {
        assert_eq!(ip_octet_similarity("10.1.1.1", "11.0.0.0"), 0.0);
        assert_eq!(ip_octet_similarity("10.1.1.1", "10.0.0.0"), 0.25);
        assert_eq!(ip_octet_similarity("10.1.1.1", "10.1.0.0"), 0.5);
        assert_eq!(ip_octet_similarity("10.1.1.1", "10.1.1.2"), 0.75);
        // identical addresses still cap below 1.0; exact matching is separate
        assert_eq!(ip_octet_similarity("10.1.1.1", "10.1.1.1"), 0.75);
    }

    #[test]
    fn test_exact_match_scores_one() {
        let primary = vec![json!({"source_ip": "10.0.0.1"})];
        let secondary = vec![json!({"device_ip": "10.0.0.1"})];
        let outcome = scored_correlation(
            &primary,
            EntityType::Flows,
            &secondary,
            EntityType::Alarms,
            &fields(&["source_ip"]),
            &CorrelationOptions::default(),
        )
        .unwrap();
        let r = &outcome.results[0];
        assert_eq!(r.correlation_score, 1.0);
        assert_eq!(r.match_type, MatchKind::Exact);
        assert_eq!(r.confidence, Confidence::High);
    }

    #[test]
    fn test_no_fuzzy_when_disabled() {
        let primary = vec![json!({"source_ip": "10.0.0.1"})];
        let secondary = vec![json!({"device_ip": "10.0.0.5"})];
        let outcome = scored_correlation(
            &primary,
            EntityType::Flows,
            &secondary,
            EntityType::Alarms,
            &fields(&["source_ip"]),
            &CorrelationOptions::default(),
        )
        .unwrap();
        assert!(outcome.results.is_empty());
    }

    #[test]
    fn test_string_similarity_caps_and_threshold() {
        // similarity above threshold is capped at 0.8
        assert_eq!(string_similarity("laptop", "laptop1", 0.5), 0.8);
        // below threshold scores 0
        assert_eq!(string_similarity("laptop", "zzzzzz", 0.7), 0.0);
    }

    #[test]
    fn test_numeric_similarity_cap() {
        let s = numeric_similarity(100.0, 105.0, 0.1);
        assert!(s > 0.0 && s <= 0.7, "got {s}");
        assert_eq!(numeric_similarity(100.0, 200.0, 0.1), 0.0);
    }

    #[test]
    fn test_geo_similarity_cap() {
        assert!(geo_similarity("germany", "germany") <= 0.6);
        assert_eq!(geo_similarity("germany", "japan"), 0.0);
    }

    #[test]
    fn test_and_penalty_below_or_score() {
        // one of two fields matches; AND multiplies by 1/2
        let primary = vec![json!({"source_ip": "10.0.0.1", "protocol": "tcp"})];
        let secondary = vec![json!({"device_ip": "10.0.0.1", "protocol": "udp"})];
        let f = fields(&["source_ip", "protocol"]);

        let mut or_options = CorrelationOptions::default();
        or_options.minimum_score = 0.0;
        or_options.correlation_type = CorrelationType::Or;
        let or_score = scored_correlation(
            &primary,
            EntityType::Flows,
            &secondary,
            EntityType::Alarms,
            &f,
            &or_options,
        )
        .unwrap()
        .results[0]
            .correlation_score;

        let mut and_options = or_options.clone();
        and_options.correlation_type = CorrelationType::And;
        let and_score = scored_correlation(
            &primary,
            EntityType::Flows,
            &secondary,
            EntityType::Alarms,
            &f,
            &and_options,
        )
        .unwrap()
        .results[0]
            .correlation_score;

        assert!(and_score <= or_score, "{and_score} > {or_score}");
        assert_eq!(or_score, 0.5);
        assert_eq!(and_score, 0.25);
    }

    #[test]
    fn test_zero_weight_excludes_field_from_denominator() {
        let primary = vec![json!({"source_ip": "10.0.0.1", "protocol": "tcp"})];
        let secondary = vec![json!({"device_ip": "10.0.0.1", "protocol": "udp"})];
        let f = fields(&["source_ip", "protocol"]);

        let mut muted = CorrelationOptions::default();
        muted.minimum_score = 0.0;
        muted.weights = CorrelationWeights {
            weights: [("protocol".to_string(), 0.0)].into_iter().collect(),
            default_weight: None,
        };
        let score = scored_correlation(
            &primary,
            EntityType::Flows,
            &secondary,
            EntityType::Alarms,
            &f,
            &muted,
        )
        .unwrap()
        .results[0]
            .correlation_score;
        // protocol drops out entirely; source_ip alone scores 1.0
        assert_eq!(score, 1.0);

        let baseline = scored_correlation(
            &primary,
            EntityType::Flows,
            &secondary,
            EntityType::Alarms,
            &f,
            &CorrelationOptions {
                minimum_score: 0.0,
                ..CorrelationOptions::default()
            },
        )
        .unwrap()
        .results[0]
            .correlation_score;
        assert_eq!(baseline, 0.5);
    }

    #[test]
    fn test_minimum_score_filters() {
        let primary = vec![json!({"source_ip": "10.0.0.1"})];
        let secondary = vec![json!({"device_ip": "10.0.0.5"})];
        let mut options = fuzzy_options();
        options.minimum_score = 0.9;
        let outcome = scored_correlation(
            &primary,
            EntityType::Flows,
            &secondary,
            EntityType::Alarms,
            &fields(&["source_ip"]),
            &options,
        )
        .unwrap();
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.stats.correlated, 0);
        assert_eq!(outcome.stats.total, 1);
    }

    #[test]
    fn test_results_sorted_by_descending_score() {
        let primary = vec![json!({"source_ip": "10.0.0.1"})];
        let secondary = vec![
            json!({"device_ip": "10.0.0.5"}),
            json!({"device_ip": "10.0.0.1"}),
            json!({"device_ip": "10.1.0.1"}),
        ];
        let mut options = fuzzy_options();
        options.minimum_score = 0.0;
        let outcome = scored_correlation(
            &primary,
            EntityType::Flows,
            &secondary,
            EntityType::Alarms,
            &fields(&["source_ip"]),
            &options,
        )
        .unwrap();
        let scores: Vec<f64> = outcome
            .results
            .iter()
            .map(|r| r.correlation_score)
            .collect();
        assert_eq!(scores, vec![1.0, 0.75, 0.25]);
    }

    #[test]
    fn test_placeholder_values_carry_no_signal() {
        let primary = vec![
            json!({"source_ip": "0.0.0.0"}),
            json!({"source_ip": "127.0.0.1"}),
            json!({"device_name": "unknown"}),
        ];
        let secondary = vec![json!({"device_ip": "0.0.0.0"})];
        let outcome = scored_correlation(
            &primary,
            EntityType::Flows,
            &secondary,
            EntityType::Alarms,
            &fields(&["source_ip"]),
            &fuzzy_options(),
        )
        .unwrap();
        assert!(outcome.results.is_empty());
    }

    #[test]
    fn test_config_errors_reported_not_raised() {
        let f: Vec<String> = (0..6).map(|i| format!("f{i}")).collect();
        let outcome = scored_correlation(
            &[],
            EntityType::Flows,
            &[json!({})],
            EntityType::Alarms,
            &f,
            &CorrelationOptions::default(),
        )
        .unwrap();
        assert!(!outcome.errors.is_empty());
        assert!(outcome.results.is_empty());
    }

    #[test]
    fn test_score_out_of_range_raises() {
        let err = check_score(1.2, "test").unwrap_err();
        assert!(matches!(err, EvalError::ScoreOutOfRange { .. }));
        assert!(check_score(-0.01, "test").is_err());
        assert_eq!(check_score(1.0, "test").unwrap(), 1.0);
        assert_eq!(check_score(0.0, "test").unwrap(), 0.0);
    }

    #[test]
    fn test_temporal_window_restricts_matches() {
        let primary = vec![json!({"source_ip": "10.0.0.1", "ts": 1_700_000_000})];
        let secondary = vec![
            json!({"device_ip": "10.0.0.1", "ts": 1_700_000_100}),
            json!({"device_ip": "10.0.0.1", "ts": 1_700_009_999}),
        ];
        let mut options = CorrelationOptions::default();
        options.temporal_window = Some(TemporalWindow {
            size: 5.0,
            unit: TimeUnit::Minutes,
        });
        let outcome = scored_correlation(
            &primary,
            EntityType::Flows,
            &secondary,
            EntityType::Alarms,
            &fields(&["source_ip"]),
            &options,
        )
        .unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].entity["ts"], 1_700_000_100);
    }

    #[test]
    fn test_temporal_window_parses_date_strings() {
        let primary = vec![json!({"source_ip": "10.0.0.1", "ts": "2024-01-15T12:00:00Z"})];
        let secondary = vec![json!({"device_ip": "10.0.0.1", "ts": "2024-01-15T12:30:00Z"})];
        let mut options = CorrelationOptions::default();
        options.temporal_window = Some(TemporalWindow {
            size: 1.0,
            unit: TimeUnit::Hours,
        });
        let outcome = scored_correlation(
            &primary,
            EntityType::Flows,
            &secondary,
            EntityType::Alarms,
            &fields(&["source_ip"]),
            &options,
        )
        .unwrap();
        assert_eq!(outcome.results.len(), 1);
    }

    #[test]
    fn test_stats_rounded_and_counted() {
        let primary = vec![json!({"source_ip": "10.0.0.1"})];
        let secondary = vec![
            json!({"device_ip": "10.0.0.1"}),
            json!({"device_ip": "10.0.0.7"}),
        ];
        let outcome = scored_correlation(
            &primary,
            EntityType::Flows,
            &secondary,
            EntityType::Alarms,
            &fields(&["source_ip"]),
            &fuzzy_options(),
        )
        .unwrap();
        assert_eq!(outcome.stats.total, 2);
        assert_eq!(outcome.stats.correlated, 2);
        assert_eq!(outcome.stats.score_distribution.high, 1);
        assert_eq!(outcome.stats.score_distribution.medium, 1);
        let fs = &outcome.stats.field_stats["source_ip"];
        assert_eq!(fs.exact, 1);
        assert_eq!(fs.fuzzy, 1);
        // (1.0 + 0.75) / 2
        assert_eq!(fs.average_score, 0.875);
    }

    #[test]
    fn test_advisory_warning_on_large_sets() {
        let primary: Vec<Value> = (0..2_100)
            .map(|i| json!({"source_ip": format!("10.0.{}.{}", i / 250, i % 250)}))
            .collect();
        let outcome = scored_correlation(
            &primary,
            EntityType::Flows,
            &[json!({"device_ip": "10.0.0.1"})],
            EntityType::Alarms,
            &fields(&["source_ip"]),
            &CorrelationOptions::default(),
        )
        .unwrap();
        assert!(outcome
            .warnings
            .iter()
            .any(|w| w.contains("2000")),
            "warnings: {:?}",
            outcome.warnings
        );
    }

    #[test]
    fn test_all_scores_within_bounds() {
        let primary = vec![
            json!({"source_ip": "10.0.0.1", "protocol": "tcp", "device_name": "laptop"}),
            json!({"source_ip": "192.168.1.50", "protocol": "udp", "device_name": "phone"}),
        ];
        let secondary = vec![
            json!({"device_ip": "10.0.0.2", "protocol": "tcp", "device_name": "laptop2"}),
            json!({"device_ip": "192.168.1.50", "protocol": "icmp", "device_name": "phone"}),
            json!({"device_ip": "8.8.8.8", "protocol": "tcp", "device_name": "other"}),
        ];
        let mut options = fuzzy_options();
        options.minimum_score = 0.0;
        options.correlation_type = CorrelationType::And;
        let outcome = scored_correlation(
            &primary,
            EntityType::Flows,
            &secondary,
            EntityType::Alarms,
            &fields(&["source_ip", "protocol", "device_name"]),
            &options,
        )
        .unwrap();
        for r in &outcome.results {
            assert!((0.0..=1.0).contains(&r.correlation_score));
            for score in r.field_scores.values() {
                assert!((0.0..=1.0).contains(score));
            }
        }
    }
}
