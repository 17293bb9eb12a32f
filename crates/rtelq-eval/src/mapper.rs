//! Canonical-field resolution and value normalization.
//!
//! Queries and correlation requests speak in canonical field names; the raw
//! records store the same data under entity-specific source paths. The
//! mapper walks each mapped path in order and returns the first non-null
//! value, falling back to a direct-name lookup when no mapping exists.

use serde_json::Value;

use rtelq_parser::schema;
use rtelq_parser::EntityType;

use crate::entity::Entity;

/// Resolve a canonical field against a raw record.
///
/// Tries each mapped source path in order; the first path yielding a
/// non-null value wins. Fields without a mapping fall back to a direct
/// lookup under the canonical name itself.
pub fn get_field_value<'a>(
    entity: &Entity<'a>,
    field: &str,
    entity_type: EntityType,
) -> Option<&'a Value> {
    if let Some(paths) = schema::mapping_paths(entity_type, field) {
        for path in paths {
            if let Some(v) = entity.get(path) {
                if !v.is_null() {
                    return Some(v);
                }
            }
        }
    }
    entity.get(field).filter(|v| !v.is_null())
}

/// Canonicalize a field value for comparison.
///
/// - IP fields: trimmed and lowercased; malformed addresses are kept (a
///   warning concern for the caller, not a rejection)
/// - MAC fields: separators stripped, lowercased
/// - protocol and geographic name fields: trimmed, lowercased
/// - everything else: stringified unchanged
pub fn normalize_field_value(value: &Value, field: &str) -> Option<String> {
    let raw = value_to_string(value)?;

    if is_ip_field(field) {
        return Some(raw.trim().to_ascii_lowercase());
    }
    if is_mac_field(field) {
        let stripped: String = raw
            .chars()
            .filter(|c| !matches!(c, ':' | '-' | '.'))
            .collect();
        return Some(stripped.to_ascii_lowercase());
    }
    if is_case_insensitive_field(field) {
        return Some(raw.trim().to_ascii_lowercase());
    }
    Some(raw)
}

/// Stringify scalar JSON values; objects and arrays do not normalize.
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Whether a canonical field holds an IP address.
pub fn is_ip_field(field: &str) -> bool {
    field == "ip" || field.ends_with("_ip")
}

fn is_mac_field(field: &str) -> bool {
    field == "mac"
}

fn is_case_insensitive_field(field: &str) -> bool {
    matches!(
        field,
        "protocol" | "country" | "region" | "city" | "domain" | "direction"
    )
}

/// Syntactic IPv4/IPv6 well-formedness check.
///
/// Malformed input draws a warning from callers but is never rejected
/// outright; comparison simply degrades to string equality.
pub fn is_wellformed_ip(value: &str) -> bool {
    value.parse::<std::net::IpAddr>().is_ok()
}

/// Whether a correlation field is supported by every listed entity type.
pub fn is_field_compatible(field: &str, entity_types: &[EntityType]) -> bool {
    schema::correlation_compatible(field, entity_types)
}

/// Correlation fields shared by a pair of entity types.
pub fn get_compatible_fields(a: EntityType, b: EntityType) -> Vec<&'static str> {
    schema::compatible_correlation_fields(&[a, b])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mapped_path_wins_over_direct() {
        let v = json!({"source": {"ip": "10.0.0.1"}, "source_ip": "ignored"});
        let e = Entity::from_value(&v);
        assert_eq!(
            get_field_value(&e, "source_ip", EntityType::Flows),
            Some(&json!("10.0.0.1"))
        );
    }

    #[test]
    fn test_second_path_when_first_missing() {
        let v = json!({"srcIP": "10.0.0.2"});
        let e = Entity::from_value(&v);
        assert_eq!(
            get_field_value(&e, "source_ip", EntityType::Flows),
            Some(&json!("10.0.0.2"))
        );
    }

    #[test]
    fn test_null_mapped_value_is_skipped() {
        let v = json!({"source": {"ip": null}, "srcIP": "10.0.0.3"});
        let e = Entity::from_value(&v);
        assert_eq!(
            get_field_value(&e, "source_ip", EntityType::Flows),
            Some(&json!("10.0.0.3"))
        );
    }

    #[test]
    fn test_direct_fallback_without_mapping() {
        // tags has no source-path mapping
        let v = json!({"tags": ["iot"]});
        let e = Entity::from_value(&v);
        assert_eq!(
            get_field_value(&e, "tags", EntityType::Flows),
            Some(&json!(["iot"]))
        );
    }

    #[test]
    fn test_direct_fallback_by_canonical_name() {
        let v = json!({"source_ip": "10.0.0.1"});
        let e = Entity::from_value(&v);
        assert_eq!(
            get_field_value(&e, "source_ip", EntityType::Flows),
            Some(&json!("10.0.0.1"))
        );
    }

    #[test]
    fn test_normalize_ip() {
        assert_eq!(
            normalize_field_value(&json!("  10.0.0.1 "), "source_ip"),
            Some("10.0.0.1".to_string())
        );
        assert_eq!(
            normalize_field_value(&json!("FE80::1"), "device_ip"),
            Some("fe80::1".to_string())
        );
    }

    #[test]
    fn test_normalize_mac_strips_separators() {
        assert_eq!(
            normalize_field_value(&json!("AA:BB:CC:DD:EE:FF"), "mac"),
            Some("aabbccddeeff".to_string())
        );
        assert_eq!(
            normalize_field_value(&json!("aa-bb-cc-dd-ee-ff"), "mac"),
            Some("aabbccddeeff".to_string())
        );
    }

    #[test]
    fn test_normalize_protocol_lowercases() {
        assert_eq!(
            normalize_field_value(&json!("TCP"), "protocol"),
            Some("tcp".to_string())
        );
    }

    #[test]
    fn test_normalize_leaves_other_fields_alone() {
        assert_eq!(
            normalize_field_value(&json!("My Laptop"), "device_name"),
            Some("My Laptop".to_string())
        );
        assert_eq!(
            normalize_field_value(&json!(42), "bytes"),
            Some("42".to_string())
        );
    }

    #[test]
    fn test_objects_do_not_normalize() {
        assert_eq!(normalize_field_value(&json!({"a": 1}), "device_name"), None);
    }

    #[test]
    fn test_wellformed_ip() {
        assert!(is_wellformed_ip("10.0.0.1"));
        assert!(is_wellformed_ip("fe80::1"));
        assert!(!is_wellformed_ip("10.0.0"));
        assert!(!is_wellformed_ip("not-an-ip"));
    }

    #[test]
    fn test_compatible_fields() {
        assert!(is_field_compatible(
            "source_ip",
            &[EntityType::Flows, EntityType::Alarms]
        ));
        assert!(!is_field_compatible(
            "severity",
            &[EntityType::Flows, EntityType::Alarms]
        ));
        let shared = get_compatible_fields(EntityType::Flows, EntityType::Devices);
        assert!(shared.contains(&"mac"));
        assert!(shared.contains(&"device_ip"));
    }
}
