//! Document change events.
//!
//! Every observable change to a document is described by one
//! [`DocumentEvent`] variant. Listeners receive the event itself;
//! receiver-style consumers implement [`EventReceiver`] and get the event
//! fanned out through [`DocumentEvent::dispatch`], most general hook first.

use crate::document::{Document, SessionCallback};
use crate::model::{AttrValue, ModelRc};

/// A single observable document change. Every variant carries the owning
/// document.
#[derive(Debug, Clone)]
pub enum DocumentEvent {
    ModelChanged(ModelChangedEvent),
    TitleChanged(TitleChangedEvent),
    RootAdded(RootAddedEvent),
    RootRemoved(RootRemovedEvent),
    SessionCallbackAdded(SessionCallbackEvent),
    SessionCallbackRemoved(SessionCallbackEvent),
}

/// An attribute of a reachable model changed value.
#[derive(Debug, Clone)]
pub struct ModelChangedEvent {
    pub document: Document,
    pub model: ModelRc,
    pub attr: String,
    pub old: AttrValue,
    pub new: AttrValue,
}

/// The document title changed.
#[derive(Debug, Clone)]
pub struct TitleChangedEvent {
    pub document: Document,
    pub title: String,
}

/// A model was added to the root set.
#[derive(Debug, Clone)]
pub struct RootAddedEvent {
    pub document: Document,
    pub model: ModelRc,
}

/// A model was removed from the root set.
#[derive(Debug, Clone)]
pub struct RootRemovedEvent {
    pub document: Document,
    pub model: ModelRc,
}

/// A session callback was added to or removed from the document.
#[derive(Debug, Clone)]
pub struct SessionCallbackEvent {
    pub document: Document,
    pub callback: SessionCallback,
}

impl DocumentEvent {
    /// The document this event belongs to.
    pub fn document(&self) -> &Document {
        match self {
            DocumentEvent::ModelChanged(e) => &e.document,
            DocumentEvent::TitleChanged(e) => &e.document,
            DocumentEvent::RootAdded(e) => &e.document,
            DocumentEvent::RootRemoved(e) => &e.document,
            DocumentEvent::SessionCallbackAdded(e) => &e.document,
            DocumentEvent::SessionCallbackRemoved(e) => &e.document,
        }
    }

    /// Whether this event describes a change to document content (and is
    /// therefore expressible as a patch).
    pub fn is_patch_event(&self) -> bool {
        !matches!(
            self,
            DocumentEvent::SessionCallbackAdded(_) | DocumentEvent::SessionCallbackRemoved(_)
        )
    }

    /// Fan this event out to a receiver, most general hook first:
    /// `document_changed` for everything, `document_patched` for content
    /// changes, then the variant-specific hook where one exists.
    pub fn dispatch(&self, receiver: &mut dyn EventReceiver) {
        receiver.document_changed(self);
        match self {
            DocumentEvent::ModelChanged(e) => {
                receiver.document_patched(self);
                receiver.document_model_changed(e);
            }
            DocumentEvent::TitleChanged(_)
            | DocumentEvent::RootAdded(_)
            | DocumentEvent::RootRemoved(_) => {
                receiver.document_patched(self);
            }
            DocumentEvent::SessionCallbackAdded(e) => {
                receiver.session_callback_added(e);
            }
            DocumentEvent::SessionCallbackRemoved(e) => {
                receiver.session_callback_removed(e);
            }
        }
    }
}

/// Capability hooks for receiver-style listeners. All hooks default to
/// no-ops; implement the ones of interest and register the receiver with
/// `Document::on_change_dispatch_to`.
pub trait EventReceiver {
    /// Invoked for every event.
    fn document_changed(&mut self, _event: &DocumentEvent) {}

    /// Invoked for events describing document content changes.
    fn document_patched(&mut self, _event: &DocumentEvent) {}

    /// Invoked for model attribute changes.
    fn document_model_changed(&mut self, _event: &ModelChangedEvent) {}

    /// Invoked when a session callback is added.
    fn session_callback_added(&mut self, _event: &SessionCallbackEvent) {}

    /// Invoked when a session callback is removed.
    fn session_callback_removed(&mut self, _event: &SessionCallbackEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::model::{AttrValue, ModelClass};

    #[derive(Default)]
    struct Recorder {
        calls: Vec<&'static str>,
    }

    impl EventReceiver for Recorder {
        fn document_changed(&mut self, _event: &DocumentEvent) {
            self.calls.push("changed");
        }
        fn document_patched(&mut self, _event: &DocumentEvent) {
            self.calls.push("patched");
        }
        fn document_model_changed(&mut self, _event: &ModelChangedEvent) {
            self.calls.push("model_changed");
        }
        fn session_callback_added(&mut self, _event: &SessionCallbackEvent) {
            self.calls.push("session_added");
        }
        fn session_callback_removed(&mut self, _event: &SessionCallbackEvent) {
            self.calls.push("session_removed");
        }
    }

    #[test]
    fn model_changed_dispatches_base_to_specific() {
        let doc = Document::new();
        let model = ModelClass::new("Widget").construct(Some("m"));
        let event = DocumentEvent::ModelChanged(ModelChangedEvent {
            document: doc,
            model,
            attr: "value".to_string(),
            old: AttrValue::Null,
            new: AttrValue::Bool(true),
        });

        let mut recorder = Recorder::default();
        event.dispatch(&mut recorder);
        assert_eq!(recorder.calls, vec!["changed", "patched", "model_changed"]);
    }

    #[test]
    fn title_changed_is_a_patch_event_without_a_specific_hook() {
        let doc = Document::new();
        let event = DocumentEvent::TitleChanged(TitleChangedEvent {
            document: doc,
            title: "X".to_string(),
        });

        let mut recorder = Recorder::default();
        event.dispatch(&mut recorder);
        assert_eq!(recorder.calls, vec!["changed", "patched"]);
        assert!(event.is_patch_event());
    }

    #[test]
    fn session_events_skip_the_patched_hook() {
        let doc = Document::new();
        let callback: crate::document::SessionCallbackFn = std::rc::Rc::new(|| {});
        let handle = doc.add_periodic_callback(callback, 100, None).unwrap();
        let event = DocumentEvent::SessionCallbackAdded(SessionCallbackEvent {
            document: doc,
            callback: handle,
        });

        let mut recorder = Recorder::default();
        event.dispatch(&mut recorder);
        assert_eq!(recorder.calls, vec!["changed", "session_added"]);
        assert!(!event.is_patch_event());
    }
}
