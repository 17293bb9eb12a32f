//! Correlation configuration.
//!
//! All knobs arrive explicitly from the caller; nothing is read from the
//! environment. Configuration mistakes are reported as structured error
//! strings by [`validate_config`], never panics.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use rtelq_parser::{schema, EntityType};

/// Hard limit on correlation fields per request.
pub const MAX_CORRELATION_FIELDS: usize = 5;

/// Default retention threshold for scored correlation.
pub const DEFAULT_MINIMUM_SCORE: f64 = 0.3;

/// How matches across several correlation fields combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CorrelationType {
    /// Every field must match (with a completeness penalty when scoring).
    And,
    /// Any field matching suffices.
    Or,
}

impl CorrelationType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "AND" => Some(CorrelationType::And),
            "OR" => Some(CorrelationType::Or),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CorrelationType::And => "AND",
            CorrelationType::Or => "OR",
        }
    }
}

/// Fuzzy-matching configuration for scored correlation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct FuzzyConfig {
    pub enabled: bool,
    /// Minimum normalized string similarity a fuzzy string match must clear.
    pub string_threshold: f64,
    /// Relative difference two numbers may have and still count as similar.
    pub numeric_tolerance: f64,
    /// Score IPv4 pairs by shared leading octets.
    pub ip_subnet_matching: bool,
    /// Score geographic names by simplified string similarity.
    pub geographic_matching: bool,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        FuzzyConfig {
            enabled: false,
            string_threshold: 0.7,
            numeric_tolerance: 0.1,
            ip_subnet_matching: true,
            geographic_matching: false,
        }
    }
}

/// Per-field importance multipliers for scored correlation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct CorrelationWeights {
    pub weights: HashMap<String, f64>,
    /// Fallback applied to fields without an explicit weight.
    pub default_weight: Option<f64>,
}

impl CorrelationWeights {
    /// Resolve a field's weight: explicit finite value, else the default,
    /// else `0.5`; the result is clamped to `[0, 1]`.
    ///
    /// A resolved weight of exactly `0` excludes the field from the
    /// weighted average entirely, which is distinct from "unset".
    pub fn resolve(&self, field: &str) -> f64 {
        self.weights
            .get(field)
            .copied()
            .filter(|w| w.is_finite())
            .or_else(|| self.default_weight.filter(|w| w.is_finite()))
            .unwrap_or(0.5)
            .clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    pub fn seconds(&self) -> f64 {
        match self {
            TimeUnit::Seconds => 1.0,
            TimeUnit::Minutes => 60.0,
            TimeUnit::Hours => 3600.0,
            TimeUnit::Days => 86400.0,
        }
    }
}

impl TimeUnit {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "seconds" => Some(TimeUnit::Seconds),
            "minutes" => Some(TimeUnit::Minutes),
            "hours" => Some(TimeUnit::Hours),
            "days" => Some(TimeUnit::Days),
            _ => None,
        }
    }
}

/// A tolerance window around the primary set's timestamp span.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalWindow {
    pub size: f64,
    pub unit: TimeUnit,
}

impl TemporalWindow {
    pub fn seconds(&self) -> f64 {
        self.size * self.unit.seconds()
    }

    pub fn is_valid(&self) -> bool {
        self.size.is_finite() && self.size > 0.0
    }
}

/// Full configuration for one correlation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct CorrelationOptions {
    pub correlation_type: CorrelationType,
    pub weights: CorrelationWeights,
    pub fuzzy: FuzzyConfig,
    pub minimum_score: f64,
    pub temporal_window: Option<TemporalWindow>,
}

impl Default for CorrelationOptions {
    fn default() -> Self {
        CorrelationOptions {
            correlation_type: CorrelationType::Or,
            weights: CorrelationWeights::default(),
            fuzzy: FuzzyConfig::default(),
            minimum_score: DEFAULT_MINIMUM_SCORE,
            temporal_window: None,
        }
    }
}

/// Check a correlation request's configuration.
///
/// Returns structured error strings; an empty vec means the request is
/// well-formed.
pub fn validate_config(
    fields: &[String],
    entity_types: &[EntityType],
    options: &CorrelationOptions,
) -> Vec<String> {
    let mut errors = Vec::new();

    if fields.is_empty() {
        errors.push("no correlation fields supplied".to_string());
    }
    if fields.len() > MAX_CORRELATION_FIELDS {
        errors.push(format!(
            "too many correlation fields: {} (maximum {MAX_CORRELATION_FIELDS})",
            fields.len()
        ));
    }

    for field in fields {
        if !schema::correlation_compatible(field, entity_types) {
            let supported = schema::correlation_entities(field);
            if supported.is_empty() {
                errors.push(format!("'{field}' is not a correlatable field"));
            } else {
                let names: Vec<&str> = supported.iter().map(|e| e.as_str()).collect();
                errors.push(format!(
                    "field '{field}' is not shared by all requested entity types (supported: {})",
                    names.join(", ")
                ));
            }
        }
    }

    if let Some(window) = &options.temporal_window {
        if !window.is_valid() {
            errors.push(format!(
                "invalid temporal window size: {} (must be a positive number)",
                window.size
            ));
        }
    }

    if !(0.0..=1.0).contains(&options.minimum_score) {
        errors.push(format!(
            "minimum_score {} outside [0, 1]",
            options.minimum_score
        ));
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_resolution_chain() {
        let mut w = CorrelationWeights::default();
        w.weights.insert("source_ip".into(), 0.9);
        w.weights.insert("nan_field".into(), f64::NAN);
        w.default_weight = Some(0.4);

        assert_eq!(w.resolve("source_ip"), 0.9);
        // non-finite explicit weight falls through to the default
        assert_eq!(w.resolve("nan_field"), 0.4);
        assert_eq!(w.resolve("other"), 0.4);

        let bare = CorrelationWeights::default();
        assert_eq!(bare.resolve("anything"), 0.5);
    }

    #[test]
    fn test_weight_clamped() {
        let mut w = CorrelationWeights::default();
        w.weights.insert("a".into(), 7.0);
        w.weights.insert("b".into(), -3.0);
        assert_eq!(w.resolve("a"), 1.0);
        assert_eq!(w.resolve("b"), 0.0);
    }

    #[test]
    fn test_zero_weight_is_preserved() {
        let mut w = CorrelationWeights::default();
        w.weights.insert("muted".into(), 0.0);
        w.default_weight = Some(0.8);
        // explicit 0 must not fall through to the default
        assert_eq!(w.resolve("muted"), 0.0);
    }

    #[test]
    fn test_temporal_window_seconds() {
        let w = TemporalWindow {
            size: 2.0,
            unit: TimeUnit::Hours,
        };
        assert_eq!(w.seconds(), 7200.0);
        assert!(w.is_valid());
        assert!(!TemporalWindow {
            size: 0.0,
            unit: TimeUnit::Seconds
        }
        .is_valid());
    }

    #[test]
    fn test_validate_config_field_count() {
        let fields: Vec<String> = (0..6).map(|i| format!("f{i}")).collect();
        let errors = validate_config(
            &fields,
            &[EntityType::Flows],
            &CorrelationOptions::default(),
        );
        assert!(errors.iter().any(|e| e.contains("too many")));
    }

    #[test]
    fn test_validate_config_incompatible_field() {
        let errors = validate_config(
            &["severity".to_string()],
            &[EntityType::Flows, EntityType::Alarms],
            &CorrelationOptions::default(),
        );
        assert!(errors.iter().any(|e| e.contains("not shared")));
    }

    #[test]
    fn test_validate_config_clean() {
        let errors = validate_config(
            &["source_ip".to_string()],
            &[EntityType::Flows, EntityType::Alarms],
            &CorrelationOptions::default(),
        );
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn test_validate_config_bad_window() {
        let mut options = CorrelationOptions::default();
        options.temporal_window = Some(TemporalWindow {
            size: -5.0,
            unit: TimeUnit::Minutes,
        });
        let errors = validate_config(
            &["source_ip".to_string()],
            &[EntityType::Flows, EntityType::Alarms],
            &options,
        );
        assert!(errors.iter().any(|e| e.contains("temporal window")));
    }

    #[test]
    fn test_correlation_type_round_trip() {
        assert_eq!(CorrelationType::from_str("and"), Some(CorrelationType::And));
        assert_eq!(CorrelationType::from_str("OR"), Some(CorrelationType::Or));
        assert_eq!(CorrelationType::from_str("xor"), None);
        assert_eq!(CorrelationType::And.as_str(), "AND");
    }
}
