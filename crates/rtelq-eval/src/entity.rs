//! Entity wrapper with dot-notation field access.
//!
//! Raw telemetry records arrive as untyped JSON from the upstream appliance
//! API. `Entity` is a thin wrapper over `serde_json::Value` that supports
//! nested access via dot notation (e.g. `device.ip`) with flat-key
//! precedence.

use serde_json::Value;

/// A reference to a JSON telemetry record for field access.
///
/// Flat keys are checked first: `"device.ip"` as a single key takes
/// precedence over `{"device": {"ip": ...}}` nested traversal.
#[derive(Debug, Clone, Copy)]
pub struct Entity<'a> {
    inner: &'a Value,
}

impl<'a> Entity<'a> {
    /// Wrap a JSON value as an entity.
    pub fn from_value(value: &'a Value) -> Self {
        Entity { inner: value }
    }

    /// Get a field value by name, supporting dot-notation for nested access.
    ///
    /// When a path segment yields an array, each element is tried and the
    /// first value resolving the remaining path wins.
    pub fn get(&self, path: &str) -> Option<&'a Value> {
        if let Some(obj) = self.inner.as_object() {
            if let Some(v) = obj.get(path) {
                return Some(v);
            }
        }

        if path.contains('.') {
            let parts: Vec<&str> = path.split('.').collect();
            return traverse(self.inner, &parts);
        }

        None
    }

    /// Access the underlying JSON value.
    pub fn as_value(&self) -> &'a Value {
        self.inner
    }
}

/// Recursively traverse a JSON value following dot-notation path segments.
fn traverse<'a>(current: &'a Value, parts: &[&str]) -> Option<&'a Value> {
    if parts.is_empty() {
        return Some(current);
    }

    let (head, rest) = (parts[0], &parts[1..]);

    match current {
        Value::Object(map) => {
            let next = map.get(head)?;
            traverse(next, rest)
        }
        Value::Array(arr) => {
            for item in arr {
                if let Some(v) = traverse(item, parts) {
                    return Some(v);
                }
            }
            None
        }
        _ => None,
    }
}
