//! Dynamic property-bag model.
//!
//! [`DynModel`] is the concrete [`Model`](super::Model) implementation
//! produced by [`ModelClass::construct`](super::ModelClass::construct). It
//! stores explicitly-assigned attribute values next to its class (which
//! carries the declared descriptors and defaults), and holds a weak
//! back-pointer to its owning document for change routing.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::{Map, Value};

use crate::document::{Document, WeakDocument};

use super::property::PropertyDescriptor;
use super::registry::ModelClass;
use super::value::AttrValue;
use super::{gather_references, immediate_models, Model, ModelRc};

pub struct DynModel {
    id: String,
    class: ModelClass,
    /// Explicitly assigned values; unset attributes fall back to the class
    /// defaults.
    values: RefCell<BTreeMap<String, AttrValue>>,
    document: RefCell<Option<WeakDocument>>,
    /// Weak self-handle so `references()` can include this model.
    weak_self: Weak<DynModel>,
}

impl DynModel {
    pub(crate) fn new(id: String, class: ModelClass) -> Rc<DynModel> {
        Rc::new_cyclic(|weak_self| DynModel {
            id,
            class,
            values: RefCell::new(BTreeMap::new()),
            document: RefCell::new(None),
            weak_self: weak_self.clone(),
        })
    }

    fn self_rc(&self) -> ModelRc {
        let strong: Rc<DynModel> = self
            .weak_self
            .upgrade()
            .expect("DynModel outlives its own allocation");
        strong
    }
}

impl Model for DynModel {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn type_tag(&self) -> String {
        self.class.type_tag().to_string()
    }

    fn subtype(&self) -> Option<String> {
        self.class.subtype().map(str::to_string)
    }

    fn references(&self) -> Vec<ModelRc> {
        gather_references(&self.self_rc())
    }

    fn properties(&self) -> BTreeSet<String> {
        self.class.descriptors().map(|(name, _)| name.clone()).collect()
    }

    fn properties_with_refs(&self) -> BTreeSet<String> {
        self.class
            .descriptors()
            .filter(|(_, descriptor)| descriptor.takes_refs())
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn lookup(&self, attr: &str) -> Option<PropertyDescriptor> {
        self.class.descriptor(attr).cloned()
    }

    fn get_attr(&self, attr: &str) -> Option<AttrValue> {
        if let Some(value) = self.values.borrow().get(attr) {
            return Some(value.clone());
        }
        self.class.descriptor(attr).map(|d| d.default().clone())
    }

    fn set_attr(&self, attr: &str, value: AttrValue) {
        if !self.class.has_property(attr) {
            tracing::warn!(
                model = %self.id,
                attr,
                "ignoring assignment to undeclared attribute"
            );
            return;
        }
        let old = self.get_attr(attr).unwrap_or(AttrValue::Null);
        if old == value {
            return;
        }
        self.values
            .borrow_mut()
            .insert(attr.to_string(), value.clone());
        if let Some(document) = self.document() {
            // A rewired reference changes the set of reachable models.
            if !immediate_models(&old).is_empty() || !immediate_models(&value).is_empty() {
                document.invalidate_all_models();
            }
            document.notify_change(&self.self_rc(), attr, &old, &value);
        }
    }

    fn update(&self, attrs: Vec<(String, AttrValue)>) {
        let mut values = self.values.borrow_mut();
        for (attr, value) in attrs {
            if !self.class.has_property(&attr) {
                tracing::warn!(
                    model = %self.id,
                    attr = %attr,
                    "ignoring bulk assignment to undeclared attribute"
                );
                continue;
            }
            values.insert(attr, value);
        }
    }

    fn to_json_like(&self, include_defaults: bool) -> Map<String, Value> {
        let values = self.values.borrow();
        let mut out = Map::new();
        if include_defaults {
            for (name, descriptor) in self.class.descriptors() {
                let value = values.get(name).unwrap_or_else(|| descriptor.default());
                out.insert(name.clone(), value.to_json());
            }
        } else {
            for (name, value) in values.iter() {
                out.insert(name.clone(), value.to_json());
            }
        }
        out
    }

    fn attach_document(&self, document: &Document) {
        let mut slot = self.document.borrow_mut();
        if let Some(existing) = slot.as_ref().and_then(WeakDocument::upgrade) {
            if existing.ptr_eq(document) {
                return;
            }
            panic!("model '{}' is already attached to another document", self.id);
        }
        *slot = Some(document.downgrade());
    }

    fn detach_document(&self) {
        *self.document.borrow_mut() = None;
    }

    fn document(&self) -> Option<Document> {
        self.document
            .borrow()
            .as_ref()
            .and_then(WeakDocument::upgrade)
    }
}

impl fmt::Debug for DynModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynModel")
            .field("id", &self.id)
            .field("type", &self.class.type_tag())
            .field("attached", &self.document.borrow().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelClass;

    fn widget() -> ModelClass {
        ModelClass::new("Widget")
            .with_property("value", AttrValue::Null)
            .with_ref_property("child", AttrValue::Null)
    }

    #[test]
    fn unset_attributes_fall_back_to_defaults() {
        let m = widget().construct(Some("w"));
        assert_eq!(m.get_attr("value"), Some(AttrValue::Null));
        assert_eq!(m.get_attr("tags"), Some(AttrValue::List(Vec::new())));
        assert_eq!(m.get_attr("bogus"), None);
    }

    #[test]
    fn name_reads_the_name_property() {
        let m = widget().construct(Some("w"));
        assert_eq!(m.name(), None);
        m.set_attr("name", "plot".into());
        assert_eq!(m.name(), Some("plot".to_string()));
    }

    #[test]
    fn references_include_self_and_transitive_children() {
        let class = widget();
        let a = class.construct(Some("a"));
        let b = class.construct(Some("b"));
        let c = class.construct(Some("c"));
        b.set_attr("child", AttrValue::Model(c.clone()));
        a.set_attr("child", AttrValue::Model(b.clone()));

        let mut ids: Vec<String> = a.references().iter().map(|m| m.id()).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn references_terminate_on_cycles() {
        let class = widget();
        let a = class.construct(Some("a"));
        let b = class.construct(Some("b"));
        a.set_attr("child", AttrValue::Model(b.clone()));
        b.set_attr("child", AttrValue::Model(a.clone()));

        let mut ids: Vec<String> = b.references().iter().map(|m| m.id()).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn to_json_like_with_defaults_covers_all_declared_properties() {
        let m = widget().construct(Some("w"));
        m.set_attr("value", 3i64.into());
        let snapshot = m.to_json_like(true);
        assert_eq!(snapshot.len(), 4);
        assert_eq!(snapshot["value"], serde_json::json!(3));
        assert_eq!(snapshot["child"], serde_json::Value::Null);

        let sparse = m.to_json_like(false);
        assert_eq!(sparse.len(), 1);
    }

    #[test]
    fn update_is_silent_and_skips_undeclared_attributes() {
        let m = widget().construct(Some("w"));
        m.update(vec![
            ("value".to_string(), 9i64.into()),
            ("bogus".to_string(), AttrValue::Bool(true)),
        ]);
        assert_eq!(m.get_attr("value"), Some(9i64.into()));
        assert_eq!(m.get_attr("bogus"), None);
    }
}
