//! Property values.
//!
//! Model attributes hold JSON-like data that may additionally contain
//! references to other models anywhere inside it. [`AttrValue`] is that
//! domain: the JSON scalars and containers plus a `Model` variant. The JSON
//! encoding of a `Model` is its lightweight ref (`{id, type[, subtype]}`);
//! resolving such refs back into live models is property-decoding territory
//! (see `PropertyDescriptor::from_json`).

use std::collections::BTreeMap;

use serde_json::{Map, Number, Value};

use super::ModelRc;

/// A JSON-like attribute value that may contain model references.
#[derive(Debug, Clone)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<AttrValue>),
    Map(BTreeMap<String, AttrValue>),
    Model(ModelRc),
}

impl AttrValue {
    /// Structural conversion from plain JSON. No model resolution happens
    /// here; ref-shaped objects stay maps.
    pub fn from_json_value(value: &Value) -> AttrValue {
        match value {
            Value::Null => AttrValue::Null,
            Value::Bool(b) => AttrValue::Bool(*b),
            Value::Number(n) => AttrValue::Number(n.clone()),
            Value::String(s) => AttrValue::String(s.clone()),
            Value::Array(items) => {
                AttrValue::List(items.iter().map(AttrValue::from_json_value).collect())
            }
            Value::Object(map) => AttrValue::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), AttrValue::from_json_value(v)))
                    .collect(),
            ),
        }
    }

    /// Encode to JSON. Models are encoded as their refs.
    pub fn to_json(&self) -> Value {
        match self {
            AttrValue::Null => Value::Null,
            AttrValue::Bool(b) => Value::Bool(*b),
            AttrValue::Number(n) => Value::Number(n.clone()),
            AttrValue::String(s) => Value::String(s.clone()),
            AttrValue::List(items) => Value::Array(items.iter().map(AttrValue::to_json).collect()),
            AttrValue::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<Map<String, Value>>(),
            ),
            AttrValue::Model(model) => model.model_ref().to_json(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_model(&self) -> Option<&ModelRc> {
        match self {
            AttrValue::Model(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Null)
    }
}

/// Equality is structural; models compare by id.
impl PartialEq for AttrValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (AttrValue::Null, AttrValue::Null) => true,
            (AttrValue::Bool(a), AttrValue::Bool(b)) => a == b,
            (AttrValue::Number(a), AttrValue::Number(b)) => a == b,
            (AttrValue::String(a), AttrValue::String(b)) => a == b,
            (AttrValue::List(a), AttrValue::List(b)) => a == b,
            (AttrValue::Map(a), AttrValue::Map(b)) => a == b,
            (AttrValue::Model(a), AttrValue::Model(b)) => a.id() == b.id(),
            _ => false,
        }
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Number(Number::from(value))
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        Number::from_f64(value).map_or(AttrValue::Null, AttrValue::Number)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::String(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::String(value)
    }
}

impl From<Vec<AttrValue>> for AttrValue {
    fn from(value: Vec<AttrValue>) -> Self {
        AttrValue::List(value)
    }
}

impl From<ModelRc> for AttrValue {
    fn from(value: ModelRc) -> Self {
        AttrValue::Model(value)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::ModelClass;

    #[test]
    fn json_round_trip_for_plain_data() {
        let source = json!({ "a": [1, 2.5, "x", null, true], "b": { "c": 7 } });
        let value = AttrValue::from_json_value(&source);
        assert_eq!(value.to_json(), source);
    }

    #[test]
    fn model_values_encode_as_refs() {
        let class = ModelClass::new("Widget");
        let model = class.construct(Some("m1"));
        let value = AttrValue::Model(model);
        assert_eq!(value.to_json(), json!({ "id": "m1", "type": "Widget" }));
    }

    #[test]
    fn models_compare_by_id() {
        let class = ModelClass::new("Widget");
        let a = class.construct(Some("same"));
        let b = class.construct(Some("same"));
        let c = class.construct(Some("other"));
        assert_eq!(AttrValue::Model(a.clone()), AttrValue::Model(b));
        assert_ne!(AttrValue::Model(a), AttrValue::Model(c));
    }
}
