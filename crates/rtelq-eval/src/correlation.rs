//! Exact-set correlation across two result sets.
//!
//! The simple paths here do no scoring: a secondary entity either shares a
//! normalized value with the primary set or it does not. IPv4 values get one
//! extra chance through a same-`/24` subnet comparison, reported separately
//! because it carries lower confidence. The weighted scoring engine lives in
//! [`crate::scoring`]; callers pick a path via a feature flag.

use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use serde::Serialize;
use serde_json::Value;

use rtelq_parser::EntityType;

use crate::config::CorrelationType;
use crate::entity::Entity;
use crate::mapper;

/// Outcome of exact/subnet correlation.
#[derive(Debug, Clone, Serialize)]
pub struct SimpleCorrelation {
    /// Secondary entities sharing an exact normalized value.
    pub exact: Vec<Value>,
    /// Secondary entities whose IP fell in the same /24 as a primary IP.
    /// Lower confidence than `exact`; the two sets are disjoint.
    pub subnet: Vec<Value>,
}

/// Normalized primary-side values, one set per correlation field.
pub(crate) fn primary_value_sets(
    primary: &[Value],
    primary_type: EntityType,
    fields: &[String],
) -> HashMap<String, HashSet<String>> {
    let mut sets: HashMap<String, HashSet<String>> = HashMap::new();
    for field in fields {
        let set = sets.entry(field.clone()).or_default();
        for record in primary {
            let entity = Entity::from_value(record);
            if let Some(v) = mapper::get_field_value(&entity, field, primary_type) {
                if let Some(normalized) = mapper::normalize_field_value(v, field) {
                    set.insert(normalized);
                }
            }
        }
    }
    sets
}

/// Correlate by exact normalized value, with a `/24` subnet fallback for IP
/// fields.
///
/// A secondary entity lands in `exact` if any correlation field's value is
/// present in the primary set, and in `subnet` if it only matched through
/// the IPv4 subnet comparison.
pub fn simple_correlation(
    primary: &[Value],
    primary_type: EntityType,
    secondary: &[Value],
    secondary_type: EntityType,
    fields: &[String],
) -> SimpleCorrelation {
    let sets = primary_value_sets(primary, primary_type, fields);

    let mut exact = Vec::new();
    let mut subnet = Vec::new();

    for record in secondary {
        let entity = Entity::from_value(record);
        let mut exact_hit = false;
        let mut subnet_hit = false;

        for field in fields {
            let Some(set) = sets.get(field) else { continue };
            let Some(v) = mapper::get_field_value(&entity, field, secondary_type) else {
                continue;
            };
            let Some(normalized) = mapper::normalize_field_value(v, field) else {
                continue;
            };
            if set.contains(&normalized) {
                exact_hit = true;
                break;
            }
            if mapper::is_ip_field(field)
                && set.iter().any(|p| same_subnet24(p, &normalized))
            {
                subnet_hit = true;
            }
        }

        if exact_hit {
            exact.push(record.clone());
        } else if subnet_hit {
            subnet.push(record.clone());
        }
    }

    SimpleCorrelation { exact, subnet }
}

/// AND/OR correlation over exact normalized matches only.
///
/// The legacy path used when scoring is disabled: no fuzzy matching, no
/// weights, no subnet fallback. AND requires every correlation field to
/// match; OR requires at least one.
pub fn multi_field_correlation(
    primary: &[Value],
    primary_type: EntityType,
    secondary: &[Value],
    secondary_type: EntityType,
    fields: &[String],
    correlation_type: CorrelationType,
) -> Vec<Value> {
    let sets = primary_value_sets(primary, primary_type, fields);

    secondary
        .iter()
        .filter(|record| {
            let entity = Entity::from_value(record);
            let matches = |field: &String| {
                let Some(set) = sets.get(field) else {
                    return false;
                };
                mapper::get_field_value(&entity, field, secondary_type)
                    .and_then(|v| mapper::normalize_field_value(v, field))
                    .is_some_and(|normalized| set.contains(&normalized))
            };
            match correlation_type {
                CorrelationType::And => fields.iter().all(matches),
                CorrelationType::Or => fields.iter().any(matches),
            }
        })
        .cloned()
        .collect()
}

/// Whether two IPv4 strings fall in the same /24.
///
/// IPv6 input degrades to `false`; subnet math here is IPv4-only.
pub(crate) fn same_subnet24(a: &str, b: &str) -> bool {
    let (Ok(a), Ok(b)) = (a.parse::<Ipv4Addr>(), b.parse::<Ipv4Addr>()) else {
        return false;
    };
    match Ipv4Net::new(a, 24) {
        Ok(net) => net.trunc().contains(&b),
        Err(_) => false,
    }
}
