//! Shared helpers for the integration tests.

use std::cell::RefCell;
use std::rc::Rc;

use docmirror::{AttrValue, Document, DocumentEvent, DocumentListener, ModelClass};

/// Register (on this test thread) and return the standard test class: a
/// `Widget` with a plain `value` property and a reference-typed `child`.
pub fn widget_class() -> ModelClass {
    ModelClass::new("Widget")
        .with_property("value", AttrValue::Null)
        .with_ref_property("child", AttrValue::Null)
        .register()
}

/// Attach a listener that records every event. The listener handle is
/// returned alongside so tests can unregister it.
pub fn capture_events(doc: &Document) -> (Rc<RefCell<Vec<DocumentEvent>>>, DocumentListener) {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    let listener: DocumentListener =
        Rc::new(move |event: &DocumentEvent| sink.borrow_mut().push(event.clone()));
    doc.on_change(&listener);
    (events, listener)
}

/// Ids of every model in the document, sorted.
pub fn sorted_model_ids(doc: &Document) -> Vec<String> {
    let mut ids: Vec<String> = doc.models().iter().map(|m| m.id()).collect();
    ids.sort();
    ids
}
