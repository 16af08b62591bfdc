//! Themes.
//!
//! A theme is a set of per-type attribute overrides. Replacing a document's
//! theme applies the overrides to every model in the document through the
//! normal attribute pipeline, so resulting changes surface as ordinary
//! `ModelChanged` events. The theme replacement itself emits no event.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::model::{AttrValue, ModelRc};

thread_local! {
    static DEFAULT_THEME: RefCell<Option<Rc<Theme>>> = const { RefCell::new(None) };
}

/// Per-type attribute overrides.
#[derive(Debug, Default)]
pub struct Theme {
    overrides: BTreeMap<String, BTreeMap<String, AttrValue>>,
}

impl Theme {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an override: models whose type tag is `type_tag` get `attr`
    /// assigned to `value` when the theme is applied.
    pub fn with_override(mut self, type_tag: &str, attr: &str, value: AttrValue) -> Self {
        self.overrides
            .entry(type_tag.to_string())
            .or_default()
            .insert(attr.to_string(), value);
        self
    }

    /// Assign this theme's overrides for the model's type, if any.
    pub fn apply_to_model(&self, model: &ModelRc) {
        if let Some(attrs) = self.overrides.get(&model.type_tag()) {
            for (attr, value) in attrs {
                model.set_attr(attr, value.clone());
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}

/// The process default theme: empty, shared, compared by identity in the
/// document's theme setter.
pub(crate) fn default_theme() -> Rc<Theme> {
    DEFAULT_THEME.with(|slot| {
        let mut slot = slot.borrow_mut();
        Rc::clone(slot.get_or_insert_with(|| Rc::new(Theme::default())))
    })
}
