//! Canonical search filter grammar (spec §3 "Search Filter")
//!
//! A filter is a conjunction of per-key predicates. Each backend's adapter
//! translates this grammar into its own dialect (spec §4.5).

use serde_json::Value;
use std::collections::HashMap;

/// A single predicate applied to one payload key.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterPredicate {
    /// Exact match against a primitive value.
    Eq(Value),
    /// Range predicate; any subset of the four bounds may be present.
    Range(RangeBounds),
    /// Value must be a member of the given set.
    AnyOf(Vec<Value>),
    /// Value must equal every element of the given set (meaningful only
    /// for array-valued payload fields).
    AllOf(Vec<Value>),
}

/// Inclusive/exclusive numeric bounds for [`FilterPredicate::Range`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeBounds {
    pub gte: Option<f64>,
    pub gt: Option<f64>,
    pub lte: Option<f64>,
    pub lt: Option<f64>,
}

impl RangeBounds {
    #[must_use]
    pub fn matches(&self, value: f64) -> bool {
        self.gte.is_none_or(|b| value >= b)
            && self.gt.is_none_or(|b| value > b)
            && self.lte.is_none_or(|b| value <= b)
            && self.lt.is_none_or(|b| value < b)
    }
}

/// Conjunction of predicates, one per payload key (spec §3: "Conjunction
/// across keys").
pub type SearchFilter = HashMap<String, FilterPredicate>;

/// Evaluate a filter against a payload using the in-process baseline's
/// reference semantics (spec §4.3 "Filter evaluation"): absent keys match
/// only when there is no predicate asking for them; range predicates on
/// non-numeric payload values are false; "any-of"/"all-of" test set
/// membership against the payload value.
#[must_use]
pub fn matches(filter: &SearchFilter, payload: &crate::types::Payload) -> bool {
    filter.iter().all(|(key, predicate)| {
        let Some(value) = payload.get(key) else {
            return false;
        };
        if value.is_null() {
            return false;
        }
        predicate_matches(predicate, value)
    })
}

fn predicate_matches(predicate: &FilterPredicate, value: &Value) -> bool {
    match predicate {
        FilterPredicate::Eq(expected) => expected == value,
        FilterPredicate::Range(bounds) => value.as_f64().is_some_and(|n| bounds.matches(n)),
        FilterPredicate::AnyOf(set) => set.contains(value),
        FilterPredicate::AllOf(set) => value
            .as_array()
            .is_some_and(|arr| set.iter().all(|want| arr.contains(want))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(pairs: &[(&str, Value)]) -> crate::types::Payload {
        pairs.iter().cloned().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn eq_matches_exact_value() {
        let filter = SearchFilter::from([("tag".to_string(), FilterPredicate::Eq(json!("x")))]);
        assert!(matches(&filter, &payload(&[("tag", json!("x"))])));
        assert!(!matches(&filter, &payload(&[("tag", json!("y"))])));
    }

    #[test]
    fn absent_key_never_matches() {
        let filter = SearchFilter::from([("rank".to_string(), FilterPredicate::Eq(json!(1)))]);
        assert!(!matches(&filter, &payload(&[("tag", json!("x"))])));
    }

    #[test]
    fn range_rejects_non_numeric() {
        let filter = SearchFilter::from([(
            "rank".to_string(),
            FilterPredicate::Range(RangeBounds {
                gte: Some(3.0),
                ..Default::default()
            }),
        )]);
        assert!(!matches(&filter, &payload(&[("rank", json!("high"))])));
        assert!(matches(&filter, &payload(&[("rank", json!(5))])));
    }

    #[test]
    fn conjunction_requires_all_keys() {
        let filter = SearchFilter::from([
            ("tag".to_string(), FilterPredicate::Eq(json!("x"))),
            (
                "rank".to_string(),
                FilterPredicate::Range(RangeBounds {
                    gte: Some(3.0),
                    ..Default::default()
                }),
            ),
        ]);
        assert!(matches(&filter, &payload(&[("tag", json!("x")), ("rank", json!(5))])));
        assert!(!matches(&filter, &payload(&[("tag", json!("x")), ("rank", json!(1))])));
    }
}
