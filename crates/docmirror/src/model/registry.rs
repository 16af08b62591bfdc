//! Model classes and the class registry.
//!
//! Serialized model records name their class by a type tag (plus an optional
//! subtype); reconstruction turns the tag back into a constructor through a
//! registry. The registry is thread-local: the document graph is a
//! single-threaded container, and every thread that deserializes registers
//! the classes it expects.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::rc::Rc;

use super::basic::DynModel;
use super::property::PropertyDescriptor;
use super::value::AttrValue;
use super::ModelRc;

thread_local! {
    static REGISTRY: RefCell<HashMap<String, ModelClass>> = RefCell::new(HashMap::new());
}

/// A model type: its tag, optional subtype, and declared properties.
///
/// Classes are plain values; cloning one is cheap enough that the registry
/// and every constructed model hold their own copy. Every class implicitly
/// declares `name` and `tags`.
#[derive(Debug, Clone)]
pub struct ModelClass {
    type_tag: String,
    subtype: Option<String>,
    descriptors: BTreeMap<String, PropertyDescriptor>,
}

impl ModelClass {
    pub fn new(type_tag: &str) -> Self {
        let mut descriptors = BTreeMap::new();
        descriptors.insert(
            "name".to_string(),
            PropertyDescriptor::new("name", AttrValue::Null, false),
        );
        descriptors.insert(
            "tags".to_string(),
            PropertyDescriptor::new("tags", AttrValue::List(Vec::new()), false),
        );
        Self {
            type_tag: type_tag.to_string(),
            subtype: None,
            descriptors,
        }
    }

    pub fn with_subtype(mut self, subtype: &str) -> Self {
        self.subtype = Some(subtype.to_string());
        self
    }

    /// Declare a plain (non-reference) property.
    pub fn with_property(mut self, name: &str, default: AttrValue) -> Self {
        self.descriptors
            .insert(name.to_string(), PropertyDescriptor::new(name, default, false));
        self
    }

    /// Declare a property whose values may contain model references.
    pub fn with_ref_property(mut self, name: &str, default: AttrValue) -> Self {
        self.descriptors
            .insert(name.to_string(), PropertyDescriptor::new(name, default, true));
        self
    }

    /// Register this class for reconstruction on the current thread and hand
    /// it back for further use.
    pub fn register(self) -> Self {
        register_class(&self);
        self
    }

    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    pub fn subtype(&self) -> Option<&str> {
        self.subtype.as_deref()
    }

    /// The registry key: subtype when present, else the type tag.
    pub fn key(&self) -> &str {
        self.subtype.as_deref().unwrap_or(&self.type_tag)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = (&String, &PropertyDescriptor)> {
        self.descriptors.iter()
    }

    pub fn descriptor(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.descriptors.get(name)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.descriptors.contains_key(name)
    }

    /// Construct a detached model instance of this class. A fresh id is
    /// generated when none is supplied.
    pub fn construct(&self, id: Option<&str>) -> ModelRc {
        let id = id
            .map(str::to_string)
            .unwrap_or_else(super::make_id);
        let model: Rc<DynModel> = DynModel::new(id, self.clone());
        model
    }
}

/// Register `class` on the current thread, replacing any class previously
/// registered under the same key.
pub fn register_class(class: &ModelClass) {
    REGISTRY.with(|registry| {
        registry
            .borrow_mut()
            .insert(class.key().to_string(), class.clone());
    });
}

/// Resolve a type tag (or subtype) to its class on the current thread.
pub fn get_class(tag: &str) -> Option<ModelClass> {
    REGISTRY.with(|registry| registry.borrow().get(tag).cloned())
}
