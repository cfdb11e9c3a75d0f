//! Condition predicate DSL for trigger and show conditions.
//!
//! A [`ConditionSet`] is evaluated against an instance's JSON context. Fields
//! are addressed by dot path (`incident.severity`). A missing field fails
//! every operator except `Exists` with `value: false`.

use serde::{Deserialize, Serialize};

/// Comparison operator for a single condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOp {
    Eq,
    Ne,
    In,
    NotIn,
    Exists,
    Contains,
}

/// A single field predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Dot path into the context object.
    pub field: String,
    pub op: ConditionOp,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// A conjunction/disjunction of conditions.
///
/// The set matches when every `all` condition holds and, if `any` is
/// non-empty, at least one `any` condition holds. An empty set matches
/// everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionSet {
    #[serde(default)]
    pub all: Vec<Condition>,
    #[serde(default)]
    pub any: Vec<Condition>,
}

impl ConditionSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.all.is_empty() && self.any.is_empty()
    }

    /// Evaluate against a context object.
    #[must_use]
    pub fn matches(&self, context: &serde_json::Value) -> bool {
        if !self.all.iter().all(|c| c.matches(context)) {
            return false;
        }
        if !self.any.is_empty() && !self.any.iter().any(|c| c.matches(context)) {
            return false;
        }
        true
    }
}

impl Condition {
    #[must_use]
    pub fn matches(&self, context: &serde_json::Value) -> bool {
        let found = lookup(context, &self.field);
        match self.op {
            ConditionOp::Exists => {
                let want = self.value.as_bool().unwrap_or(true);
                found.is_some() == want
            }
            ConditionOp::Eq => found.is_some_and(|v| v == &self.value),
            ConditionOp::Ne => found.is_some_and(|v| v != &self.value),
            ConditionOp::In => found.is_some_and(|v| {
                self.value
                    .as_array()
                    .is_some_and(|candidates| candidates.contains(v))
            }),
            ConditionOp::NotIn => found.is_some_and(|v| {
                self.value
                    .as_array()
                    .is_some_and(|candidates| !candidates.contains(v))
            }),
            ConditionOp::Contains => found.is_some_and(|v| match v {
                serde_json::Value::Array(items) => items.contains(&self.value),
                serde_json::Value::String(s) => self
                    .value
                    .as_str()
                    .is_some_and(|needle| s.contains(needle)),
                _ => false,
            }),
        }
    }
}

/// Resolve a dot path inside a JSON object.
fn lookup<'a>(context: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = context;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cond(field: &str, op: ConditionOp, value: serde_json::Value) -> Condition {
        Condition {
            field: field.to_string(),
            op,
            value,
        }
    }

    #[test]
    fn empty_set_matches_everything() {
        let set = ConditionSet::default();
        assert!(set.matches(&json!({})));
        assert!(set.matches(&json!({"severity": "high"})));
    }

    #[test]
    fn eq_on_nested_path() {
        let set = ConditionSet {
            all: vec![cond("incident.severity", ConditionOp::Eq, json!("high"))],
            any: vec![],
        };
        assert!(set.matches(&json!({"incident": {"severity": "high"}})));
        assert!(!set.matches(&json!({"incident": {"severity": "low"}})));
    }

    #[test]
    fn missing_field_fails_eq_and_ne() {
        let ctx = json!({"other": 1});
        assert!(!cond("severity", ConditionOp::Eq, json!("high")).matches(&ctx));
        assert!(!cond("severity", ConditionOp::Ne, json!("high")).matches(&ctx));
    }

    #[test]
    fn exists_handles_both_polarities() {
        let ctx = json!({"injury": {"reported": true}});
        assert!(cond("injury.reported", ConditionOp::Exists, json!(true)).matches(&ctx));
        assert!(cond("injury.fatal", ConditionOp::Exists, json!(false)).matches(&ctx));
        assert!(!cond("injury.fatal", ConditionOp::Exists, json!(true)).matches(&ctx));
    }

    #[test]
    fn in_and_not_in() {
        let ctx = json!({"site": "plant-a"});
        assert!(cond("site", ConditionOp::In, json!(["plant-a", "plant-b"])).matches(&ctx));
        assert!(!cond("site", ConditionOp::In, json!(["plant-b"])).matches(&ctx));
        assert!(cond("site", ConditionOp::NotIn, json!(["plant-b"])).matches(&ctx));
        assert!(!cond("site", ConditionOp::NotIn, json!(["plant-a"])).matches(&ctx));
    }

    #[test]
    fn contains_on_arrays_and_strings() {
        let ctx = json!({"tags": ["chemical", "confined-space"], "title": "forklift incident"});
        assert!(cond("tags", ConditionOp::Contains, json!("chemical")).matches(&ctx));
        assert!(!cond("tags", ConditionOp::Contains, json!("electrical")).matches(&ctx));
        assert!(cond("title", ConditionOp::Contains, json!("forklift")).matches(&ctx));
    }

    #[test]
    fn all_and_any_combine() {
        let set = ConditionSet {
            all: vec![cond("severity", ConditionOp::Eq, json!("high"))],
            any: vec![
                cond("site", ConditionOp::Eq, json!("plant-a")),
                cond("site", ConditionOp::Eq, json!("plant-b")),
            ],
        };
        assert!(set.matches(&json!({"severity": "high", "site": "plant-b"})));
        assert!(!set.matches(&json!({"severity": "high", "site": "plant-c"})));
        assert!(!set.matches(&json!({"severity": "low", "site": "plant-a"})));
    }

    #[test]
    fn deserializes_from_template_json() {
        let set: ConditionSet = serde_json::from_value(json!({
            "all": [{"field": "severity", "op": "in", "value": ["high", "critical"]}]
        }))
        .unwrap();
        assert_eq!(set.all.len(), 1);
        assert!(set.any.is_empty());
    }
}
