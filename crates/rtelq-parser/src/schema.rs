//! Per-entity field schemas.
//!
//! Each searchable entity type carries a table of canonical field names with
//! a type classification, a deprecated-alias table, and an ordered list of
//! source paths the raw API objects store the value under. The validator
//! resolves unknown fields through aliases and reversed source paths before
//! giving up, and the correlation layer consults the compatibility matrix to
//! reject cross-entity fields that not all participants share.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde::Serialize;

use crate::ast::EntityType;

// ---------------------------------------------------------------------------
// Field types and operator compatibility
// ---------------------------------------------------------------------------

/// Type classification of a schema field, driving operator compatibility and
/// value validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Enum,
    Ip,
    Timestamp,
    Array,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Enum => "enum",
            FieldType::Ip => "ip",
            FieldType::Timestamp => "timestamp",
            FieldType::Array => "array",
        }
    }

    /// The operators a field of this type accepts.
    ///
    /// `:` is the plain match operator, `~` the wildcard-pattern operator,
    /// `range` the `[min TO max]` form.
    pub fn valid_operators(&self) -> &'static [&'static str] {
        match self {
            FieldType::Number | FieldType::Timestamp => {
                &[":", "=", "!=", ">", "<", ">=", "<=", "range"]
            }
            FieldType::Boolean => &[":", "="],
            FieldType::String => &[":", "=", "!=", "~", "contains", "startswith", "endswith"],
            FieldType::Enum => &[":", "=", "!=", "in", "not_in"],
            FieldType::Ip => &[":", "=", "!=", "~", "range"],
            FieldType::Array => &[":", "=", "contains", "in"],
        }
    }

    pub fn supports_operator(&self, op: &str) -> bool {
        self.valid_operators().contains(&op)
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Schema tables
// ---------------------------------------------------------------------------

type FieldTable = HashMap<&'static str, FieldType>;

macro_rules! field_table {
    ($($name:literal => $ty:ident),* $(,)?) => {
        [$(($name, FieldType::$ty)),*].into_iter().collect()
    };
}

static FLOW_FIELDS: LazyLock<FieldTable> = LazyLock::new(|| {
    field_table! {
        "source_ip" => Ip,
        "destination_ip" => Ip,
        "device_ip" => Ip,
        "device_id" => String,
        "device_name" => String,
        "mac" => String,
        "protocol" => Enum,
        "direction" => Enum,
        "category" => Enum,
        "bytes" => Number,
        "download" => Number,
        "upload" => Number,
        "duration" => Number,
        "port" => Number,
        "blocked" => Boolean,
        "timestamp" => Timestamp,
        "domain" => String,
        "region" => String,
        "city" => String,
        "country" => String,
        "asn" => String,
        "tags" => Array,
    }
});

static ALARM_FIELDS: LazyLock<FieldTable> = LazyLock::new(|| {
    field_table! {
        "source_ip" => Ip,
        "device_ip" => Ip,
        "remote_ip" => Ip,
        "severity" => Enum,
        "type" => Enum,
        "status" => Enum,
        "direction" => Enum,
        "protocol" => Enum,
        "resolved" => Boolean,
        "message" => String,
        "device_name" => String,
        "device_id" => String,
        "country" => String,
        "timestamp" => Timestamp,
        "port" => Number,
    }
});

static RULE_FIELDS: LazyLock<FieldTable> = LazyLock::new(|| {
    field_table! {
        "id" => String,
        "action" => Enum,
        "target_type" => Enum,
        "target_value" => String,
        "direction" => Enum,
        "protocol" => Enum,
        "status" => Enum,
        "hit_count" => Number,
        "notes" => String,
        "timestamp" => Timestamp,
    }
});

static DEVICE_FIELDS: LazyLock<FieldTable> = LazyLock::new(|| {
    field_table! {
        "id" => String,
        "name" => String,
        "ip" => Ip,
        "mac" => String,
        "mac_vendor" => String,
        "network_id" => String,
        "network_name" => String,
        "group_id" => String,
        "online" => Boolean,
        "ip_reserved" => Boolean,
        "last_seen" => Timestamp,
        "total_download" => Number,
        "total_upload" => Number,
    }
});

static TARGET_LIST_FIELDS: LazyLock<FieldTable> = LazyLock::new(|| {
    field_table! {
        "id" => String,
        "name" => String,
        "owner" => String,
        "category" => Enum,
        "targets" => Array,
        "notes" => String,
        "last_updated" => Timestamp,
    }
});

/// The canonical field table for an entity type.
pub fn entity_fields(entity: EntityType) -> &'static FieldTable {
    match entity {
        EntityType::Flows => &FLOW_FIELDS,
        EntityType::Alarms => &ALARM_FIELDS,
        EntityType::Rules => &RULE_FIELDS,
        EntityType::Devices => &DEVICE_FIELDS,
        EntityType::TargetLists => &TARGET_LIST_FIELDS,
    }
}

/// Look up a field's type within an entity schema.
pub fn field_type(entity: EntityType, field: &str) -> Option<FieldType> {
    entity_fields(entity).get(field).copied()
}

/// Canonical field names for an entity, sorted for stable output.
pub fn field_names(entity: EntityType) -> Vec<&'static str> {
    let mut names: Vec<&'static str> = entity_fields(entity).keys().copied().collect();
    names.sort_unstable();
    names
}

// ---------------------------------------------------------------------------
// Deprecated aliases
// ---------------------------------------------------------------------------

type AliasTable = HashMap<&'static str, &'static str>;

static FLOW_ALIASES: LazyLock<AliasTable> = LazyLock::new(|| {
    [
        ("src_ip", "source_ip"),
        ("dst_ip", "destination_ip"),
        ("dest_ip", "destination_ip"),
        ("proto", "protocol"),
        ("ts", "timestamp"),
        ("dl", "download"),
        ("ul", "upload"),
    ]
    .into_iter()
    .collect()
});

static ALARM_ALIASES: LazyLock<AliasTable> = LazyLock::new(|| {
    [
        ("alarm_type", "type"),
        ("src_ip", "source_ip"),
        ("severity_level", "severity"),
        ("ts", "timestamp"),
    ]
    .into_iter()
    .collect()
});

static RULE_ALIASES: LazyLock<AliasTable> = LazyLock::new(|| {
    [("rule_action", "action"), ("target", "target_value")]
        .into_iter()
        .collect()
});

static DEVICE_ALIASES: LazyLock<AliasTable> = LazyLock::new(|| {
    [
        ("device_name", "name"),
        ("device_ip", "ip"),
        ("last_active", "last_seen"),
    ]
    .into_iter()
    .collect()
});

static TARGET_LIST_ALIASES: LazyLock<AliasTable> =
    LazyLock::new(|| [("list_name", "name")].into_iter().collect());

/// Resolve a deprecated field name to its canonical replacement.
pub fn resolve_alias(entity: EntityType, field: &str) -> Option<&'static str> {
    let table: &AliasTable = match entity {
        EntityType::Flows => &FLOW_ALIASES,
        EntityType::Alarms => &ALARM_ALIASES,
        EntityType::Rules => &RULE_ALIASES,
        EntityType::Devices => &DEVICE_ALIASES,
        EntityType::TargetLists => &TARGET_LIST_ALIASES,
    };
    table.get(field).copied()
}

// ---------------------------------------------------------------------------
// Source-path mappings
// ---------------------------------------------------------------------------

type MappingTable = HashMap<&'static str, &'static [&'static str]>;

macro_rules! mapping_table {
    ($($name:literal => [$($path:literal),* $(,)?]),* $(,)?) => {
        [$(($name, &[$($path),*] as &'static [&'static str])),*]
            .into_iter()
            .collect()
    };
}

static FLOW_MAPPINGS: LazyLock<MappingTable> = LazyLock::new(|| {
    mapping_table! {
        "source_ip" => ["source.ip", "srcIP"],
        "destination_ip" => ["destination.ip", "dstIP"],
        "device_ip" => ["device.ip", "deviceIP"],
        "device_id" => ["device.id", "gid"],
        "device_name" => ["device.name", "deviceName"],
        "protocol" => ["protocol"],
        "bytes" => ["bytes", "total"],
        "download" => ["download"],
        "upload" => ["upload"],
        "blocked" => ["block", "blocked"],
        "timestamp" => ["ts", "timestamp"],
        "domain" => ["domain", "host"],
        "country" => ["destination.country", "country"],
        "region" => ["region"],
        "city" => ["city"],
        "port" => ["destination.port", "port"],
    }
});

static ALARM_MAPPINGS: LazyLock<MappingTable> = LazyLock::new(|| {
    mapping_table! {
        "source_ip" => ["device.ip", "device_ip"],
        "remote_ip" => ["remote.ip", "remoteIP"],
        "device_ip" => ["device.ip"],
        "device_name" => ["device.name"],
        "severity" => ["severity"],
        "type" => ["type", "alarmType"],
        "status" => ["status"],
        "resolved" => ["resolved"],
        "message" => ["message"],
        "country" => ["remote.country", "country"],
        "timestamp" => ["ts", "timestamp"],
        "port" => ["remote.port", "port"],
    }
});

static RULE_MAPPINGS: LazyLock<MappingTable> = LazyLock::new(|| {
    mapping_table! {
        "id" => ["id"],
        "action" => ["action"],
        "target_type" => ["target.type"],
        "target_value" => ["target.value"],
        "direction" => ["direction"],
        "protocol" => ["protocol"],
        "status" => ["status"],
        "hit_count" => ["hit.count", "hitCount"],
        "timestamp" => ["ts", "updateTs"],
    }
});

static DEVICE_MAPPINGS: LazyLock<MappingTable> = LazyLock::new(|| {
    mapping_table! {
        "id" => ["id", "gid"],
        "name" => ["name"],
        "ip" => ["ip", "ipAddress"],
        "mac" => ["mac"],
        "mac_vendor" => ["macVendor"],
        "network_id" => ["network.id"],
        "network_name" => ["network.name"],
        "online" => ["online"],
        "last_seen" => ["lastSeen", "lastActive"],
        "total_download" => ["totalDownload"],
        "total_upload" => ["totalUpload"],
    }
});

static TARGET_LIST_MAPPINGS: LazyLock<MappingTable> = LazyLock::new(|| {
    mapping_table! {
        "id" => ["id"],
        "name" => ["name"],
        "owner" => ["owner"],
        "category" => ["category"],
        "targets" => ["targets"],
        "notes" => ["notes"],
        "last_updated" => ["lastUpdated"],
    }
});

fn mapping_table(entity: EntityType) -> &'static MappingTable {
    match entity {
        EntityType::Flows => &FLOW_MAPPINGS,
        EntityType::Alarms => &ALARM_MAPPINGS,
        EntityType::Rules => &RULE_MAPPINGS,
        EntityType::Devices => &DEVICE_MAPPINGS,
        EntityType::TargetLists => &TARGET_LIST_MAPPINGS,
    }
}

/// Ordered source paths for a canonical field, most-preferred first.
pub fn mapping_paths(entity: EntityType, field: &str) -> Option<&'static [&'static str]> {
    mapping_table(entity).get(field).copied()
}

/// Reverse lookup: find the canonical field whose source paths include the
/// given raw name (e.g. `srcIP` resolves to `source_ip` on flows).
pub fn reverse_mapping(entity: EntityType, raw: &str) -> Option<&'static str> {
    mapping_table(entity)
        .iter()
        .find(|(_, paths)| paths.contains(&raw))
        .map(|(canonical, _)| *canonical)
}

// ---------------------------------------------------------------------------
// Correlation compatibility matrix
// ---------------------------------------------------------------------------

static CORRELATION_MATRIX: LazyLock<HashMap<&'static str, &'static [EntityType]>> =
    LazyLock::new(|| {
        use EntityType::*;
        [
            ("source_ip", &[Flows, Alarms] as &'static [EntityType]),
            ("destination_ip", &[Flows]),
            ("remote_ip", &[Alarms]),
            ("device_ip", &[Flows, Alarms, Devices]),
            ("device_id", &[Flows, Devices]),
            ("device_name", &[Flows, Alarms, Devices]),
            ("mac", &[Flows, Devices]),
            ("protocol", &[Flows, Alarms, Rules]),
            ("direction", &[Flows, Alarms, Rules]),
            ("timestamp", &[Flows, Alarms, Rules]),
            ("country", &[Flows, Alarms]),
            ("port", &[Flows, Alarms]),
            ("severity", &[Alarms]),
            ("domain", &[Flows]),
            ("target_value", &[Rules, TargetLists]),
        ]
        .into_iter()
        .collect()
    });

/// Entity types that share a correlation field. Empty when the field is not
/// correlatable at all.
pub fn correlation_entities(field: &str) -> &'static [EntityType] {
    CORRELATION_MATRIX.get(field).copied().unwrap_or(&[])
}

/// Whether a correlation field is shared by every entity type in the slice.
pub fn correlation_compatible(field: &str, entities: &[EntityType]) -> bool {
    let supported = correlation_entities(field);
    !entities.is_empty() && entities.iter().all(|e| supported.contains(e))
}

/// Correlation fields usable across all of the given entity types.
pub fn compatible_correlation_fields(entities: &[EntityType]) -> Vec<&'static str> {
    let mut fields: Vec<&'static str> = CORRELATION_MATRIX
        .iter()
        .filter(|(f, _)| correlation_compatible(f, entities))
        .map(|(f, _)| *f)
        .collect();
    fields.sort_unstable();
    fields
}

// ---------------------------------------------------------------------------
// Field suggestions
// ---------------------------------------------------------------------------

/// Maximum number of suggested field names for an unknown field.
const MAX_SUGGESTIONS: usize = 5;

/// Suggest schema fields close to an unknown name, nearest first.
///
/// Only names within an edit distance of 3 qualify; ties break
/// alphabetically so output is stable.
pub fn suggest_fields(entity: EntityType, unknown: &str) -> Vec<&'static str> {
    let mut scored: Vec<(usize, &'static str)> = entity_fields(entity)
        .keys()
        .filter_map(|&name| {
            let d = levenshtein(&unknown.to_ascii_lowercase(), name);
            (d <= 3).then_some((d, name))
        })
        .collect();
    scored.sort_unstable();
    scored
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|(_, name)| name)
        .collect()
}

/// Classic two-row Levenshtein distance.
pub(crate) fn levenshtein(a: &str, b: &str) -> usize {
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

// =============================================================================
// Tests
// =============================================================================
