//! Payload Adapter (C6): bidirectional transform between nested payloads
//! and the flat primitive-only metadata some backends require (spec §4.6)
//!
//! No single teacher file grounds this component directly; it is authored
//! from the general `serde_json::Value` flattening idiom used throughout
//! the corpus's payload-handling code (documented in DESIGN.md as a
//! general-idiom grounding rather than a single source file).

use crate::types::Payload;
use serde_json::{Map, Value};

/// Per-field transformation strategy (spec §4.6 "Strategies").
#[derive(Debug, Clone)]
pub enum FieldStrategy {
    /// Primitive values pass through unchanged.
    Preserve,
    /// A homogeneous scalar sequence becomes a delimited string.
    CommaSeparated,
    /// A nested mapping becomes dot-joined keys, up to `max_depth`.
    DotFlatten { max_depth: usize },
    /// Fallback for complex/cyclic/mixed structures: serialize to a JSON
    /// string, reconstructed by parsing on read.
    JsonString,
    /// A set becomes many `prefix_value = true` entries.
    BooleanFlags,
}

/// Configuration for one adapter instance. Immutable after construction
/// except through [`PayloadAdapter::with_field_strategy`] (spec §4.6
/// "immutable after construction except through an explicit update
/// method").
#[derive(Debug, Clone)]
pub struct PayloadAdapter {
    default: FieldStrategy,
    per_field: std::collections::HashMap<String, FieldStrategy>,
}

impl Default for PayloadAdapter {
    fn default() -> Self {
        Self {
            default: FieldStrategy::JsonString,
            per_field: std::collections::HashMap::new(),
        }
    }
}

impl PayloadAdapter {
    #[must_use]
    pub fn new(default: FieldStrategy) -> Self {
        Self {
            default,
            per_field: std::collections::HashMap::new(),
        }
    }

    /// Return a new adapter with `field` bound to `strategy`, leaving
    /// `self` untouched (the "explicit update method" spec §4.6 allows).
    #[must_use]
    pub fn with_field_strategy(&self, field: impl Into<String>, strategy: FieldStrategy) -> Self {
        let mut clone = self.clone();
        clone.per_field.insert(field.into(), strategy);
        clone
    }

    fn strategy_for(&self, field: &str) -> &FieldStrategy {
        self.per_field.get(field).unwrap_or(&self.default)
    }

    /// Project a nested payload down to a flat map of string keys to
    /// string/number/bool values. Per-field serialization errors are
    /// logged and that field is skipped; they must not poison the rest of
    /// the payload (spec §4.6 "Contract").
    #[must_use]
    pub fn serialize(&self, payload: &Payload) -> Map<String, Value> {
        let mut flat = Map::new();
        for (key, value) in payload {
            match serialize_field(key, value, self.strategy_for(key)) {
                Ok(entries) => flat.extend(entries),
                Err(reason) => {
                    tracing::warn!(field = %key, reason, "payload adapter: skipping field on serialize error");
                }
            }
        }
        flat
    }

    /// Reconstruct a nested payload from a flat map, inverting
    /// [`PayloadAdapter::serialize`] per the configured strategies.
    #[must_use]
    pub fn deserialize(&self, flat: &Map<String, Value>) -> Payload {
        let mut payload = Map::new();
        let mut consumed_boolean_flag_prefixes: std::collections::HashSet<String> = std::collections::HashSet::new();

        for (key, value) in flat {
            if let Some((prefix, _)) = key.split_once('_') {
                if matches!(self.strategy_for(prefix), FieldStrategy::BooleanFlags) {
                    if consumed_boolean_flag_prefixes.insert(prefix.to_string()) {
                        let members: Vec<Value> = flat
                            .iter()
                            .filter(|(k, _)| k.starts_with(&format!("{prefix}_")))
                            .filter_map(|(k, v)| {
                                (v == &Value::Bool(true))
                                    .then(|| Value::String(k[prefix.len() + 1..].to_string()))
                            })
                            .collect();
                        payload.insert(prefix.to_string(), Value::Array(members));
                    }
                    continue;
                }
            }

            if key.contains('.') {
                let root = key.split('.').next().unwrap_or(key);
                if matches!(self.strategy_for(root), FieldStrategy::DotFlatten { .. }) {
                    insert_dotted(&mut payload, key, value.clone());
                    continue;
                }
            }

            match self.strategy_for(key) {
                FieldStrategy::Preserve => {
                    payload.insert(key.clone(), value.clone());
                }
                FieldStrategy::CommaSeparated => {
                    payload.insert(key.clone(), deserialize_comma_separated(value));
                }
                FieldStrategy::JsonString => {
                    let reconstructed = value
                        .as_str()
                        .and_then(|s| serde_json::from_str(s).ok())
                        .unwrap_or_else(|| value.clone());
                    payload.insert(key.clone(), reconstructed);
                }
                FieldStrategy::DotFlatten { .. } => {
                    payload.insert(key.clone(), value.clone());
                }
                FieldStrategy::BooleanFlags => {}
            }
        }
        payload
    }
}

fn serialize_field(
    key: &str,
    value: &Value,
    strategy: &FieldStrategy,
) -> Result<Map<String, Value>, String> {
    match strategy {
        FieldStrategy::Preserve => {
            if value.is_object() || value.is_array() {
                return Err("preserve strategy requires a primitive value".to_string());
            }
            Ok(Map::from_iter([(key.to_string(), value.clone())]))
        }
        FieldStrategy::CommaSeparated => {
            let Some(items) = value.as_array() else {
                return Err("comma_separated strategy requires an array value".to_string());
            };
            let tokens = items
                .iter()
                .map(value_to_token)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Map::from_iter([(
                key.to_string(),
                Value::String(tokens.join(",")),
            )]))
        }
        FieldStrategy::DotFlatten { max_depth } => {
            let mut flat = Map::new();
            flatten_dotted(value, key.to_string(), *max_depth, &mut flat);
            Ok(flat)
        }
        FieldStrategy::JsonString => {
            let encoded = serde_json::to_string(value).map_err(|e| e.to_string())?;
            Ok(Map::from_iter([(key.to_string(), Value::String(encoded))]))
        }
        FieldStrategy::BooleanFlags => {
            let Some(items) = value.as_array() else {
                return Err("boolean_flags strategy requires an array value".to_string());
            };
            let mut flat = Map::new();
            for item in items {
                let Some(member) = item.as_str() else {
                    return Err("boolean_flags strategy requires string array members".to_string());
                };
                flat.insert(format!("{key}_{member}"), Value::Bool(true));
            }
            Ok(flat)
        }
    }
}

fn value_to_token(value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err("comma_separated strategy requires scalar array members".to_string()),
    }
}

fn flatten_dotted(value: &Value, prefix: String, depth_remaining: usize, out: &mut Map<String, Value>) {
    match value {
        Value::Object(map) if depth_remaining > 0 => {
            for (key, inner) in map {
                let next_prefix = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_dotted(inner, next_prefix, depth_remaining - 1, out);
            }
        }
        other => {
            out.insert(prefix, other.clone());
        }
    }
}

fn insert_dotted(payload: &mut Map<String, Value>, dotted_key: &str, value: Value) {
    let mut parts = dotted_key.split('.');
    let Some(first) = parts.next() else { return };
    let rest: Vec<&str> = parts.collect();
    if rest.is_empty() {
        payload.insert(first.to_string(), value);
        return;
    }
    let entry = payload
        .entry(first.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(nested) = entry {
        insert_dotted(nested, &rest.join("."), value);
    }
}

fn deserialize_comma_separated(value: &Value) -> Value {
    let Some(s) = value.as_str() else {
        return value.clone();
    };
    if s.is_empty() {
        return Value::Array(Vec::new());
    }
    Value::Array(
        s.split(',')
            .map(|token| {
                token
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or_else(|| Value::String(token.to_string()))
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_string_strategy_round_trips() {
        let adapter = PayloadAdapter::new(FieldStrategy::JsonString);
        let mut payload = Map::new();
        payload.insert("meta".to_string(), json!({"a": 1, "b": [1,2,3]}));

        let mut flat = Map::new();
        flat.insert(
            "meta".to_string(),
            Value::String(serde_json::to_string(&payload["meta"]).unwrap()),
        );
        let restored = adapter.deserialize(&flat);
        assert_eq!(restored.get("meta"), payload.get("meta"));
    }

    #[test]
    fn comma_separated_round_trips_numeric_sequence() {
        let flat = Map::from_iter([("tags".to_string(), Value::String("1,2,3".to_string()))]);
        let adapter = PayloadAdapter::new(FieldStrategy::Preserve)
            .with_field_strategy("tags", FieldStrategy::CommaSeparated);
        let restored = adapter.deserialize(&flat);
        assert_eq!(restored.get("tags"), Some(&json!([1.0, 2.0, 3.0])));
    }

    #[test]
    fn empty_sequence_becomes_empty_string_and_back() {
        assert_eq!(deserialize_comma_separated(&json!("")), json!([]));
    }

    #[test]
    fn dot_flatten_round_trips_nested_mapping() {
        let adapter = PayloadAdapter::new(FieldStrategy::Preserve)
            .with_field_strategy("meta", FieldStrategy::DotFlatten { max_depth: 3 });
        let mut flat = Map::new();
        flatten_dotted(&json!({"a": {"b": 1}}), "meta".to_string(), 3, &mut flat);
        let restored = adapter.deserialize(&flat);
        assert_eq!(restored["meta"]["a"]["b"], json!(1));
    }

    #[test]
    fn serialize_keeps_each_strategy_keyed_by_its_own_field() {
        let adapter = PayloadAdapter::new(FieldStrategy::Preserve)
            .with_field_strategy("tags", FieldStrategy::CommaSeparated)
            .with_field_strategy("meta", FieldStrategy::DotFlatten { max_depth: 3 })
            .with_field_strategy("blob", FieldStrategy::JsonString)
            .with_field_strategy("flags", FieldStrategy::BooleanFlags);

        let mut payload = Map::new();
        payload.insert("name".to_string(), json!("alice"));
        payload.insert("tags".to_string(), json!([1, 2, 3]));
        payload.insert("meta".to_string(), json!({"a": {"b": 1}}));
        payload.insert("blob".to_string(), json!({"x": [1, 2]}));
        payload.insert("flags".to_string(), json!(["urgent", "reviewed"]));

        let flat = adapter.serialize(&payload);

        assert_eq!(flat.get("name"), Some(&json!("alice")));
        assert_eq!(flat.get("tags"), Some(&json!("1,2,3")));
        assert_eq!(flat.get("meta.a.b"), Some(&json!(1)));
        assert_eq!(
            flat.get("blob"),
            Some(&json!(serde_json::to_string(&json!({"x": [1, 2]})).unwrap()))
        );
        assert_eq!(flat.get("flags_urgent"), Some(&json!(true)));
        assert_eq!(flat.get("flags_reviewed"), Some(&json!(true)));

        // "meta.a.b" must not collide with any other field's own dotted key.
        assert!(!flat.contains_key("a.b"));

        let restored = adapter.deserialize(&flat);
        assert_eq!(restored.get("name"), payload.get("name"));
        assert_eq!(restored["meta"]["a"]["b"], json!(1));
    }

    #[test]
    fn serialize_rejects_mismatched_strategy_without_poisoning_other_fields() {
        let adapter = PayloadAdapter::new(FieldStrategy::Preserve)
            .with_field_strategy("tags", FieldStrategy::CommaSeparated);

        let mut payload = Map::new();
        payload.insert("name".to_string(), json!("alice"));
        // Not an array: CommaSeparated rejects it and the field is skipped,
        // but "name" must still come through.
        payload.insert("tags".to_string(), json!("not-an-array"));

        let flat = adapter.serialize(&payload);
        assert_eq!(flat.get("name"), Some(&json!("alice")));
        assert!(!flat.contains_key("tags"));
    }
}
