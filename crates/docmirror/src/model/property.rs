//! Property descriptors.
//!
//! A descriptor declares one writeable attribute of a model class: its name,
//! its default, and whether its values may contain model references. The
//! descriptor also owns the JSON decode step for that attribute, resolving
//! ref-shaped objects against a table of instantiated models.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::DocumentError;

use super::value::AttrValue;
use super::ModelRc;

/// Declaration of a single model attribute.
#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    name: String,
    default: AttrValue,
    takes_refs: bool,
}

impl PropertyDescriptor {
    pub fn new(name: &str, default: AttrValue, takes_refs: bool) -> Self {
        Self {
            name: name.to_string(),
            default,
            takes_refs,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default(&self) -> &AttrValue {
        &self.default
    }

    /// Whether values of this property may contain model references.
    pub fn takes_refs(&self) -> bool {
        self.takes_refs
    }

    /// Decode a raw JSON attribute value.
    ///
    /// For reference-typed properties, ref-shaped objects anywhere inside
    /// the value are resolved against `models`; an unresolvable id fails
    /// with [`DocumentError::LoadFailure`]. Plain properties convert
    /// structurally.
    pub fn from_json(
        &self,
        value: &Value,
        models: &IndexMap<String, ModelRc>,
    ) -> Result<AttrValue, DocumentError> {
        if self.takes_refs {
            decode_with_refs(value, models)
        } else {
            Ok(AttrValue::from_json_value(value))
        }
    }
}

fn decode_with_refs(
    value: &Value,
    models: &IndexMap<String, ModelRc>,
) -> Result<AttrValue, DocumentError> {
    match value {
        Value::Object(map) if is_ref_shaped(map) => {
            let id = map
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default();
            models
                .get(id)
                .cloned()
                .map(AttrValue::Model)
                .ok_or_else(|| {
                    DocumentError::LoadFailure(format!("reference to unknown model '{id}'"))
                })
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(decode_with_refs(item, models)?);
            }
            Ok(AttrValue::List(out))
        }
        Value::Object(map) => {
            let mut out = std::collections::BTreeMap::new();
            for (key, item) in map {
                out.insert(key.clone(), decode_with_refs(item, models)?);
            }
            Ok(AttrValue::Map(out))
        }
        other => Ok(AttrValue::from_json_value(other)),
    }
}

/// A ref is `{id, type[, subtype]}`. Full model records carry `attributes`
/// alongside and are not treated as refs.
fn is_ref_shaped(map: &Map<String, Value>) -> bool {
    map.get("id").map_or(false, Value::is_string)
        && map.get("type").map_or(false, Value::is_string)
        && !map.contains_key("attributes")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::ModelClass;

    fn instances() -> IndexMap<String, ModelRc> {
        let class = ModelClass::new("Widget");
        let mut map = IndexMap::new();
        map.insert("w1".to_string(), class.construct(Some("w1")));
        map
    }

    #[test]
    fn plain_property_ignores_ref_shapes() {
        let descriptor = PropertyDescriptor::new("data", AttrValue::Null, false);
        let raw = json!({ "id": "w1", "type": "Widget" });
        let decoded = descriptor.from_json(&raw, &instances()).unwrap();
        assert!(matches!(decoded, AttrValue::Map(_)));
    }

    #[test]
    fn ref_property_resolves_nested_refs() {
        let descriptor = PropertyDescriptor::new("children", AttrValue::Null, true);
        let raw = json!([{ "id": "w1", "type": "Widget" }, 3]);
        let decoded = descriptor.from_json(&raw, &instances()).unwrap();
        match decoded {
            AttrValue::List(items) => {
                assert_eq!(items[0].as_model().unwrap().id(), "w1");
                assert_eq!(items[1], AttrValue::from(3i64));
            }
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn unresolved_ref_is_a_load_failure() {
        let descriptor = PropertyDescriptor::new("child", AttrValue::Null, true);
        let raw = json!({ "id": "missing", "type": "Widget" });
        assert!(matches!(
            descriptor.from_json(&raw, &instances()),
            Err(DocumentError::LoadFailure(_))
        ));
    }
}
