//! The document graph.
//!
//! A [`Document`] owns a set of root models and maintains the invariant
//! that its model table is exactly the transitive reference closure of
//! those roots: models entering the closure are attached, models leaving it
//! are detached. Structural operations that may cascade defer the closure
//! recomputation through a reentrant freeze counter. Every observable
//! change is emitted to registered listeners as a
//! [`DocumentEvent`](crate::event::DocumentEvent).

pub mod curdoc;
mod json;
mod patch;
mod session;

pub use curdoc::current_document;
pub use session::{CallbackKind, SessionCallback, SessionCallbackFn};

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::error::DocumentError;
use crate::event::{
    DocumentEvent, ModelChangedEvent, RootAddedEvent, RootRemovedEvent, TitleChangedEvent,
};
use crate::model::{AttrValue, ModelRc};
use crate::multi_index::MultiIndex;
use crate::query::{self, Selector};
use crate::theme::{self, Theme};
use crate::validation;

/// Title given to freshly created documents.
pub const DEFAULT_TITLE: &str = "Bokeh Application";

/// A listener invoked for every document event.
pub type DocumentListener = Rc<dyn Fn(&DocumentEvent)>;

/// A receiver registered through [`Document::on_change_dispatch_to`].
pub type EventReceiverRc = Rc<RefCell<dyn crate::event::EventReceiver>>;

enum ListenerKey {
    Callback(DocumentListener),
    Receiver(EventReceiverRc),
}

struct ListenerEntry {
    key: ListenerKey,
    callback: DocumentListener,
}

pub(crate) struct DocumentInner {
    /// Root models in insertion order; membership is by model id.
    roots: RefCell<Vec<ModelRc>>,
    title: RefCell<String>,
    theme: RefCell<Rc<Theme>>,
    /// Every model reachable from a root, keyed by id.
    all_models: RefCell<IndexMap<String, ModelRc>>,
    /// name → model ids, resolved through `all_models`.
    models_by_name: RefCell<MultiIndex<String, String>>,
    /// While positive, closure recomputation is deferred.
    freeze_count: Cell<u32>,
    listeners: RefCell<Vec<ListenerEntry>>,
    pub(crate) session_callbacks: RefCell<Vec<SessionCallback>>,
}

/// Shared handle to a document. Cloning shares the same underlying state;
/// identity is compared with [`ptr_eq`](Document::ptr_eq).
#[derive(Clone)]
pub struct Document {
    pub(crate) inner: Rc<DocumentInner>,
}

/// Weak document handle held by models and session callbacks for change
/// routing without keeping the document alive.
#[derive(Clone)]
pub struct WeakDocument {
    inner: Weak<DocumentInner>,
}

impl WeakDocument {
    pub fn upgrade(&self) -> Option<Document> {
        self.inner.upgrade().map(|inner| Document { inner })
    }
}

impl Document {
    pub fn new() -> Document {
        Document {
            inner: Rc::new(DocumentInner {
                roots: RefCell::new(Vec::new()),
                title: RefCell::new(DEFAULT_TITLE.to_string()),
                theme: RefCell::new(theme::default_theme()),
                all_models: RefCell::new(IndexMap::new()),
                models_by_name: RefCell::new(MultiIndex::new()),
                freeze_count: Cell::new(0),
                listeners: RefCell::new(Vec::new()),
                session_callbacks: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Whether `self` and `other` are handles to the same document.
    pub fn ptr_eq(&self, other: &Document) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn downgrade(&self) -> WeakDocument {
        WeakDocument {
            inner: Rc::downgrade(&self.inner),
        }
    }

    // ── Roots and the model table ─────────────────────────────────────────

    /// Snapshot of the root models, in insertion order.
    pub fn roots(&self) -> Vec<ModelRc> {
        self.inner.roots.borrow().clone()
    }

    /// Snapshot of every model reachable from a root.
    pub fn models(&self) -> Vec<ModelRc> {
        self.inner.all_models.borrow().values().cloned().collect()
    }

    pub fn model_count(&self) -> usize {
        self.inner.all_models.borrow().len()
    }

    /// Add `model` as a root. No-op when it already is one; otherwise the
    /// reference closure is recomputed and `RootAdded` is emitted.
    pub fn add_root(&self, model: &ModelRc) {
        if self.is_root(model) {
            return;
        }
        self.push_freeze();
        self.inner.roots.borrow_mut().push(Rc::clone(model));
        self.pop_freeze();
        self.trigger_on_change(&DocumentEvent::RootAdded(RootAddedEvent {
            document: self.clone(),
            model: Rc::clone(model),
        }));
    }

    /// Remove `model` from the roots. No-op when it is not a root;
    /// otherwise the closure is recomputed (detaching models no longer
    /// reachable) and `RootRemoved` is emitted.
    pub fn remove_root(&self, model: &ModelRc) {
        if !self.is_root(model) {
            return;
        }
        self.push_freeze();
        let id = model.id();
        self.inner.roots.borrow_mut().retain(|root| root.id() != id);
        self.pop_freeze();
        self.trigger_on_change(&DocumentEvent::RootRemoved(RootRemovedEvent {
            document: self.clone(),
            model: Rc::clone(model),
        }));
    }

    fn is_root(&self, model: &ModelRc) -> bool {
        let id = model.id();
        self.inner.roots.borrow().iter().any(|root| root.id() == id)
    }

    /// Remove all roots (and thereby all models). The title is preserved.
    pub fn clear(&self) {
        self.push_freeze();
        loop {
            let next = self.inner.roots.borrow().first().cloned();
            match next {
                Some(root) => self.remove_root(&root),
                None => break,
            }
        }
        self.pop_freeze();
    }

    /// Move every root and the title into `dest`, leaving this document
    /// empty. `dest` is cleared first, and every root is removed from this
    /// document before any is added to `dest`, so a shared subgraph is
    /// never attached to both documents at once.
    pub fn destructively_move(&self, dest: &Document) -> Result<(), DocumentError> {
        if self.ptr_eq(dest) {
            return Err(DocumentError::SelfMove);
        }
        dest.clear();

        let mut harvested = Vec::new();
        self.push_freeze();
        loop {
            let next = self.inner.roots.borrow().first().cloned();
            match next {
                Some(root) => {
                    self.remove_root(&root);
                    harvested.push(root);
                }
                None => break,
            }
        }
        self.pop_freeze();

        for root in &harvested {
            if root.document().is_some() {
                return Err(DocumentError::DetachFailure(root.id()));
            }
        }
        let residual: Vec<String> = self.inner.all_models.borrow().keys().cloned().collect();
        if !residual.is_empty() {
            return Err(DocumentError::ResidualModels(residual));
        }

        for root in &harvested {
            dest.add_root(root);
        }
        dest.set_title(self.title());
        Ok(())
    }

    // ── Freeze protocol ───────────────────────────────────────────────────

    pub(crate) fn push_freeze(&self) {
        self.inner.freeze_count.set(self.inner.freeze_count.get() + 1);
    }

    pub(crate) fn pop_freeze(&self) {
        let count = self.inner.freeze_count.get() - 1;
        self.inner.freeze_count.set(count);
        if count == 0 {
            self.recompute_all_models();
        }
    }

    /// Recompute the closure now unless a structural operation holds a
    /// freeze, in which case the recomputation happens at the final pop.
    pub(crate) fn invalidate_all_models(&self) {
        if self.inner.freeze_count.get() == 0 {
            self.recompute_all_models();
        }
    }

    /// Rebuild `all_models` as the union of the roots' reference closures,
    /// detaching models that left and attaching models that entered.
    /// Detach runs before attach so a model moving between paths never sees
    /// both states at once. Idempotent.
    fn recompute_all_models(&self) {
        let roots = self.roots();
        let mut new_models: IndexMap<String, ModelRc> = IndexMap::new();
        for root in &roots {
            for model in root.references() {
                new_models.entry(model.id()).or_insert(model);
            }
        }

        let old_models = std::mem::take(&mut *self.inner.all_models.borrow_mut());
        let to_detach: Vec<ModelRc> = old_models
            .values()
            .filter(|model| !new_models.contains_key(&model.id()))
            .cloned()
            .collect();
        let to_attach: Vec<ModelRc> = new_models
            .values()
            .filter(|model| !old_models.contains_key(&model.id()))
            .cloned()
            .collect();

        for model in &to_detach {
            model.detach_document();
        }
        for model in &to_attach {
            model.attach_document(self);
        }

        let mut by_name = MultiIndex::new();
        for model in new_models.values() {
            if let Some(name) = model.name() {
                by_name.add(name, model.id());
            }
        }
        *self.inner.all_models.borrow_mut() = new_models;
        *self.inner.models_by_name.borrow_mut() = by_name;
    }

    // ── Lookups ───────────────────────────────────────────────────────────

    pub fn get_model_by_id(&self, id: &str) -> Option<ModelRc> {
        self.inner.all_models.borrow().get(id).cloned()
    }

    /// The unique model with the given name, or `None`. Fails with
    /// [`DocumentError::Ambiguous`] when several models share the name.
    pub fn get_model_by_name(&self, name: &str) -> Result<Option<ModelRc>, DocumentError> {
        let id = {
            let index = self.inner.models_by_name.borrow();
            index
                .get_one(name, &format!("Found more than one model named '{name}'"))?
                .cloned()
        };
        Ok(id.and_then(|id| self.get_model_by_id(&id)))
    }

    /// Models matching `selector`. A `{name: <string>}` selector uses the
    /// name index; anything else scans the model table.
    pub fn select(&self, selector: &Selector) -> Vec<ModelRc> {
        if let Some(name) = query::single_name_selector(selector) {
            let ids = self.inner.models_by_name.borrow().get_all(name);
            return ids
                .iter()
                .filter_map(|id| self.get_model_by_id(id))
                .collect();
        }
        query::find(self.models(), selector)
    }

    /// The unique model matching `selector`, or `None`. Fails with
    /// [`DocumentError::Ambiguous`] when several match.
    pub fn select_one(&self, selector: &Selector) -> Result<Option<ModelRc>, DocumentError> {
        let mut matches = self.select(selector);
        if matches.len() > 1 {
            let ids: Vec<String> = matches.iter().map(|m| m.id()).collect();
            return Err(DocumentError::Ambiguous(format!(
                "Found more than one model matching {selector:?}: {ids:?}"
            )));
        }
        Ok(matches.pop())
    }

    /// Apply each attribute update to every model matching `selector`.
    pub fn set_select(&self, selector: &Selector, updates: &[(String, AttrValue)]) {
        for model in self.select(selector) {
            for (attr, value) in updates {
                model.set_attr(attr, value.clone());
            }
        }
    }

    // ── Title and theme ───────────────────────────────────────────────────

    pub fn title(&self) -> String {
        self.inner.title.borrow().clone()
    }

    /// Set the title, emitting `TitleChanged` on an actual change.
    pub fn set_title(&self, title: impl Into<String>) {
        let title = title.into();
        let changed = {
            let mut current = self.inner.title.borrow_mut();
            if *current == title {
                false
            } else {
                *current = title.clone();
                true
            }
        };
        if changed {
            self.trigger_on_change(&DocumentEvent::TitleChanged(TitleChangedEvent {
                document: self.clone(),
                title,
            }));
        }
    }

    pub fn theme(&self) -> Rc<Theme> {
        self.inner.theme.borrow().clone()
    }

    /// Replace the theme and re-apply it to every model in the document.
    /// `None` restores the default theme; replacing a theme with itself is
    /// a no-op. The theme change itself emits no event; any model
    /// attribute changes it causes flow through the normal change pipeline.
    pub fn set_theme(&self, theme: Option<Rc<Theme>>) {
        let theme = theme.unwrap_or_else(theme::default_theme);
        if Rc::ptr_eq(&*self.inner.theme.borrow(), &theme) {
            return;
        }
        *self.inner.theme.borrow_mut() = Rc::clone(&theme);
        for model in self.models() {
            theme.apply_to_model(&model);
        }
    }

    // ── Listeners ─────────────────────────────────────────────────────────

    /// Register a listener invoked for every document event. Registering
    /// the same callback twice is a no-op.
    pub fn on_change(&self, callback: &DocumentListener) {
        let registered = self.inner.listeners.borrow().iter().any(|entry| {
            matches!(&entry.key, ListenerKey::Callback(key) if Rc::ptr_eq(key, callback))
        });
        if registered {
            return;
        }
        self.inner.listeners.borrow_mut().push(ListenerEntry {
            key: ListenerKey::Callback(Rc::clone(callback)),
            callback: Rc::clone(callback),
        });
    }

    /// Register a receiver; each event is fanned out to it through
    /// [`DocumentEvent::dispatch`]. Registering the same receiver twice is
    /// a no-op.
    pub fn on_change_dispatch_to(&self, receiver: &EventReceiverRc) {
        let registered = self.inner.listeners.borrow().iter().any(|entry| {
            matches!(&entry.key, ListenerKey::Receiver(key) if Rc::ptr_eq(key, receiver))
        });
        if registered {
            return;
        }
        let target = Rc::clone(receiver);
        let callback: DocumentListener =
            Rc::new(move |event: &DocumentEvent| event.dispatch(&mut *target.borrow_mut()));
        self.inner.listeners.borrow_mut().push(ListenerEntry {
            key: ListenerKey::Receiver(Rc::clone(receiver)),
            callback,
        });
    }

    /// Remove a listener registered with [`on_change`](Document::on_change).
    pub fn remove_on_change(&self, callback: &DocumentListener) -> Result<(), DocumentError> {
        let mut listeners = self.inner.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|entry| {
            !matches!(&entry.key, ListenerKey::Callback(key) if Rc::ptr_eq(key, callback))
        });
        if listeners.len() == before {
            Err(DocumentError::UnknownListener)
        } else {
            Ok(())
        }
    }

    /// Remove a receiver registered with
    /// [`on_change_dispatch_to`](Document::on_change_dispatch_to).
    pub fn remove_on_change_dispatch_to(
        &self,
        receiver: &EventReceiverRc,
    ) -> Result<(), DocumentError> {
        let mut listeners = self.inner.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|entry| {
            !matches!(&entry.key, ListenerKey::Receiver(key) if Rc::ptr_eq(key, receiver))
        });
        if listeners.len() == before {
            Err(DocumentError::UnknownListener)
        } else {
            Ok(())
        }
    }

    /// Invoke every listener with `event`, with this document current for
    /// the duration. Iterates a snapshot so listeners may register or
    /// remove listeners while handling the event.
    pub(crate) fn trigger_on_change(&self, event: &DocumentEvent) {
        let callbacks: Vec<DocumentListener> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .map(|entry| Rc::clone(&entry.callback))
            .collect();
        let _guard = curdoc::set_current(self);
        for callback in callbacks {
            (*callback)(event);
        }
    }

    // ── Change routing ────────────────────────────────────────────────────

    /// Called by models when an attribute changes value. Keeps the name
    /// index in step with `"name"` changes, then emits `ModelChanged`.
    pub fn notify_change(&self, model: &ModelRc, attr: &str, old: &AttrValue, new: &AttrValue) {
        if attr == "name" {
            let mut index = self.inner.models_by_name.borrow_mut();
            if let Some(old_name) = old.as_str() {
                index.remove(old_name, &model.id());
            }
            if let Some(new_name) = new.as_str() {
                index.add(new_name.to_string(), model.id());
            }
        }
        self.trigger_on_change(&DocumentEvent::ModelChanged(ModelChangedEvent {
            document: self.clone(),
            model: Rc::clone(model),
            attr: attr.to_string(),
            old: old.clone(),
            new: new.clone(),
        }));
    }

    // ── Validation ────────────────────────────────────────────────────────

    /// Run the integrity checker over each root's reference closure,
    /// returning (and logging) any issues found.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        for root in self.roots() {
            issues.extend(validation::check_integrity(&root.references()));
        }
        issues
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("title", &*self.inner.title.borrow())
            .field("roots", &self.inner.roots.borrow().len())
            .field("models", &self.inner.all_models.borrow().len())
            .finish()
    }
}
