//! The model capability.
//!
//! The document graph does not know the concrete model hierarchy; it works
//! against the [`Model`] trait: identity, reference traversal, property
//! I/O, and attach/detach lifecycle. [`DynModel`] (built through
//! [`ModelClass`]) is the crate's property-bag implementation of that
//! capability, and the one the deserializer constructs from registered
//! classes.

pub mod basic;
pub mod property;
pub mod registry;
pub mod value;

pub use basic::DynModel;
pub use property::PropertyDescriptor;
pub use registry::{get_class, register_class, ModelClass};
pub use value::AttrValue;

use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use rand::Rng;
use serde_json::{Map, Value};

use crate::document::Document;

/// Shared handle to a model. Identity is the model id.
pub type ModelRc = Rc<dyn Model>;

/// What the document graph requires of a model.
///
/// Implementations must keep `references()` transitive (and cycle-safe) and
/// `attach_document` idempotent for the owning document.
pub trait Model: fmt::Debug {
    /// Globally unique id, assigned at construction when not supplied.
    fn id(&self) -> String;

    /// Class tag used for reconstruction.
    fn type_tag(&self) -> String;

    fn subtype(&self) -> Option<String> {
        None
    }

    /// The `"name"` property, when set to a string.
    fn name(&self) -> Option<String> {
        match self.get_attr("name") {
            Some(AttrValue::String(name)) => Some(name),
            _ => None,
        }
    }

    /// Lightweight JSON reference for this model.
    fn model_ref(&self) -> ModelRef {
        ModelRef {
            id: self.id(),
            type_tag: self.type_tag(),
            subtype: self.subtype(),
        }
    }

    /// Transitive closure of models reachable through reference-typed
    /// properties, including this model itself.
    fn references(&self) -> Vec<ModelRc>;

    /// Names of all writeable attributes.
    fn properties(&self) -> BTreeSet<String>;

    /// Subset of [`properties`](Model::properties) whose values may contain
    /// model references.
    fn properties_with_refs(&self) -> BTreeSet<String>;

    /// Descriptor for a declared attribute.
    fn lookup(&self, attr: &str) -> Option<PropertyDescriptor>;

    /// Current value of an attribute (explicit value or declared default).
    fn get_attr(&self, attr: &str) -> Option<AttrValue>;

    /// Assign one attribute through the normal change pipeline: no-op when
    /// unchanged, otherwise store and notify the owning document.
    fn set_attr(&self, attr: &str, value: AttrValue);

    /// Bulk-assign attributes without change notification. Deserialization
    /// initializes freshly built models through this, so initialization can
    /// never recurse into the change pipeline.
    fn update(&self, attrs: Vec<(String, AttrValue)>);

    /// Attribute snapshot with models encoded as refs.
    fn to_json_like(&self, include_defaults: bool) -> Map<String, Value>;

    /// Called by the document when this model becomes reachable.
    ///
    /// Idempotent for the same document. Panics if the model is already
    /// attached to a different document; a model belongs to at most one
    /// document at a time.
    fn attach_document(&self, document: &Document);

    /// Called by the document when this model stops being reachable.
    fn detach_document(&self);

    /// The owning document, while attached.
    fn document(&self) -> Option<Document>;
}

/// Lightweight model reference: `{id, type[, subtype]}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRef {
    pub id: String,
    pub type_tag: String,
    pub subtype: Option<String>,
}

impl ModelRef {
    pub fn to_json(&self) -> Value {
        Value::Object(self.to_json_map())
    }

    pub fn to_json_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("id".to_string(), Value::String(self.id.clone()));
        map.insert("type".to_string(), Value::String(self.type_tag.clone()));
        if let Some(subtype) = &self.subtype {
            map.insert("subtype".to_string(), Value::String(subtype.clone()));
        }
        map
    }
}

/// Models occurring directly inside `value` (no traversal into their own
/// properties).
pub fn immediate_models(value: &AttrValue) -> Vec<ModelRc> {
    fn visit(value: &AttrValue, out: &mut Vec<ModelRc>) {
        match value {
            AttrValue::Model(model) => out.push(Rc::clone(model)),
            AttrValue::List(items) => {
                for item in items {
                    visit(item, out);
                }
            }
            AttrValue::Map(entries) => {
                for item in entries.values() {
                    visit(item, out);
                }
            }
            _ => {}
        }
    }
    let mut out = Vec::new();
    visit(value, &mut out);
    out
}

/// Every model reachable from `value`: models occurring anywhere inside it,
/// expanded to their full reference closures. Deduplicated by id.
pub fn collect_models(value: &AttrValue) -> Vec<ModelRc> {
    closure_over(immediate_models(value))
}

/// The reference closure of a single model, including the model itself.
/// Cycle-safe; this is the worker behind `DynModel::references`.
pub fn gather_references(model: &ModelRc) -> Vec<ModelRc> {
    closure_over(vec![Rc::clone(model)])
}

fn closure_over(seeds: Vec<ModelRc>) -> Vec<ModelRc> {
    let mut seen: IndexMap<String, ModelRc> = IndexMap::new();
    let mut stack = seeds;
    while let Some(model) = stack.pop() {
        let id = model.id();
        if seen.contains_key(&id) {
            continue;
        }
        for attr in model.properties_with_refs() {
            if let Some(value) = model.get_attr(&attr) {
                stack.extend(immediate_models(&value));
            }
        }
        seen.insert(id, model);
    }
    seen.into_values().collect()
}

/// Generate a fresh 32-hex-character model or callback id.
pub fn make_id() -> String {
    let mut rng = rand::thread_rng();
    let (hi, lo): (u64, u64) = (rng.gen(), rng.gen());
    format!("{hi:016x}{lo:016x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linked_pair() -> (ModelRc, ModelRc) {
        let class = ModelClass::new("Widget").with_ref_property("child", AttrValue::Null);
        let a = class.construct(Some("a"));
        let b = class.construct(Some("b"));
        a.set_attr("child", AttrValue::Model(b.clone()));
        (a, b)
    }

    #[test]
    fn immediate_models_finds_models_in_containers_only() {
        let (a, _b) = linked_pair();
        let value = AttrValue::List(vec![AttrValue::Model(a), AttrValue::Bool(true)]);
        let found = immediate_models(&value);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), "a");
    }

    #[test]
    fn collect_models_expands_to_the_closure() {
        let (a, _b) = linked_pair();
        let value = AttrValue::Model(a);
        let mut ids: Vec<String> = collect_models(&value).iter().map(|m| m.id()).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn model_ref_json_shape() {
        let reference = ModelRef {
            id: "x".to_string(),
            type_tag: "Widget".to_string(),
            subtype: Some("Fancy".to_string()),
        };
        assert_eq!(
            reference.to_json(),
            serde_json::json!({ "id": "x", "type": "Widget", "subtype": "Fancy" })
        );
    }

    #[test]
    fn make_id_is_unique_enough() {
        let a = make_id();
        let b = make_id();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }
}
