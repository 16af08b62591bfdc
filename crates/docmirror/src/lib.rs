//! docmirror — a reactive document graph with incremental JSON
//! synchronization.
//!
//! A [`Document`] is a single-threaded container of interconnected model
//! objects. It keeps its model table equal to the transitive reference
//! closure of its roots (attaching and detaching models as the graph
//! changes), broadcasts every observable change as a typed
//! [`DocumentEvent`], serializes the whole graph to a portable JSON form,
//! and produces/consumes self-sufficient JSON patches so a remote peer can
//! mirror the document in real time.
//!
//! Models are anything implementing the [`Model`] capability; the crate
//! ships a dynamic property-bag implementation built from registered
//! [`ModelClass`]es, which is also what the deserializer constructs.
//!
//! ```
//! use docmirror::{AttrValue, Document, ModelClass};
//!
//! let class = ModelClass::new("Widget")
//!     .with_ref_property("child", AttrValue::Null)
//!     .register();
//!
//! let child = class.construct(None);
//! let root = class.construct(None);
//! root.set_attr("child", AttrValue::Model(child.clone()));
//!
//! let doc = Document::new();
//! doc.add_root(&root);
//! assert_eq!(doc.model_count(), 2);
//!
//! let replica = Document::from_json(&doc.to_json()).unwrap();
//! assert_eq!(replica.model_count(), 2);
//! ```

pub mod document;
pub mod error;
pub mod event;
pub mod model;
pub mod multi_index;
pub mod query;
pub mod theme;
pub mod validation;

pub use document::{
    current_document, CallbackKind, Document, DocumentListener, EventReceiverRc, SessionCallback,
    SessionCallbackFn, WeakDocument, DEFAULT_TITLE,
};
pub use error::DocumentError;
pub use event::{
    DocumentEvent, EventReceiver, ModelChangedEvent, RootAddedEvent, RootRemovedEvent,
    SessionCallbackEvent, TitleChangedEvent,
};
pub use model::{
    collect_models, get_class, make_id, register_class, AttrValue, DynModel, Model, ModelClass,
    ModelRc, ModelRef, PropertyDescriptor,
};
pub use multi_index::MultiIndex;
pub use query::Selector;
pub use theme::Theme;

/// Library version embedded in the full-document JSON form.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
