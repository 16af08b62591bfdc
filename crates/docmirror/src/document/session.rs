//! Session callbacks.
//!
//! The document does not schedule anything itself; it publishes callback
//! handles that a host session loop fires periodically or once after a
//! timeout. Handles are keyed by the identity of the user-supplied callback
//! so that the same callable used at add-time removes the entry again.

use std::fmt;
use std::rc::Rc;

use crate::error::DocumentError;
use crate::event::{DocumentEvent, SessionCallbackEvent};
use crate::model::make_id;

use super::{curdoc, Document, WeakDocument};

/// A schedulable user callback.
pub type SessionCallbackFn = Rc<dyn Fn()>;

/// Scheduling flavor of a session callback. Periods and timeouts are in
/// milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackKind {
    /// Fires every `period` until removed.
    Periodic { period: u64 },
    /// Fires once after `timeout`; the host session may remove it after
    /// firing.
    Timeout { timeout: u64 },
}

struct SessionCallbackInner {
    id: String,
    document: WeakDocument,
    /// The user's original callback; the identity key.
    callback: SessionCallbackFn,
    /// The user callback bound to the current-document scope.
    wrapped: SessionCallbackFn,
    kind: CallbackKind,
}

/// Handle to a registered session callback.
#[derive(Clone)]
pub struct SessionCallback {
    inner: Rc<SessionCallbackInner>,
}

impl SessionCallback {
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn kind(&self) -> CallbackKind {
        self.inner.kind
    }

    /// The period in milliseconds, for periodic callbacks.
    pub fn period(&self) -> Option<u64> {
        match self.inner.kind {
            CallbackKind::Periodic { period } => Some(period),
            CallbackKind::Timeout { .. } => None,
        }
    }

    /// The timeout in milliseconds, for timeout callbacks.
    pub fn timeout(&self) -> Option<u64> {
        match self.inner.kind {
            CallbackKind::Timeout { timeout } => Some(timeout),
            CallbackKind::Periodic { .. } => None,
        }
    }

    /// The user's original callback.
    pub fn callback(&self) -> &SessionCallbackFn {
        &self.inner.callback
    }

    /// The callback the host session should invoke: the user callback with
    /// the owning document made current for the duration.
    pub fn wrapped(&self) -> &SessionCallbackFn {
        &self.inner.wrapped
    }

    /// Unregister this callback from its document.
    pub fn remove(&self) -> Result<(), DocumentError> {
        match self.inner.document.upgrade() {
            Some(document) => document.remove_session_callback(&self.inner.callback),
            None => Err(DocumentError::UnknownCallback),
        }
    }
}

impl fmt::Debug for SessionCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCallback")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .finish()
    }
}

impl Document {
    /// Register a callback the host session should fire every `period`
    /// milliseconds. Emits `SessionCallbackAdded`.
    ///
    /// Fails with [`DocumentError::AlreadyRegistered`] when the same
    /// callback identity is already registered.
    pub fn add_periodic_callback(
        &self,
        callback: SessionCallbackFn,
        period: u64,
        id: Option<&str>,
    ) -> Result<SessionCallback, DocumentError> {
        self.add_session_callback(callback, CallbackKind::Periodic { period }, id)
    }

    /// Register a callback the host session should fire once after
    /// `timeout` milliseconds. Emits `SessionCallbackAdded`.
    pub fn add_timeout_callback(
        &self,
        callback: SessionCallbackFn,
        timeout: u64,
        id: Option<&str>,
    ) -> Result<SessionCallback, DocumentError> {
        self.add_session_callback(callback, CallbackKind::Timeout { timeout }, id)
    }

    fn add_session_callback(
        &self,
        callback: SessionCallbackFn,
        kind: CallbackKind,
        id: Option<&str>,
    ) -> Result<SessionCallback, DocumentError> {
        let duplicate = self
            .inner
            .session_callbacks
            .borrow()
            .iter()
            .any(|existing| Rc::ptr_eq(existing.callback(), &callback));
        if duplicate {
            return Err(DocumentError::AlreadyRegistered);
        }

        let weak = self.downgrade();
        let user = Rc::clone(&callback);
        let wrapped: SessionCallbackFn = Rc::new(move || match weak.upgrade() {
            Some(document) => {
                let _guard = curdoc::set_current(&document);
                (*user)();
            }
            None => (*user)(),
        });

        let handle = SessionCallback {
            inner: Rc::new(SessionCallbackInner {
                id: id.map(str::to_string).unwrap_or_else(make_id),
                document: self.downgrade(),
                callback,
                wrapped,
                kind,
            }),
        };
        self.inner
            .session_callbacks
            .borrow_mut()
            .push(handle.clone());
        self.trigger_on_change(&DocumentEvent::SessionCallbackAdded(SessionCallbackEvent {
            document: self.clone(),
            callback: handle.clone(),
        }));
        Ok(handle)
    }

    /// Remove a callback added with
    /// [`add_periodic_callback`](Document::add_periodic_callback).
    pub fn remove_periodic_callback(
        &self,
        callback: &SessionCallbackFn,
    ) -> Result<(), DocumentError> {
        self.remove_session_callback(callback)
    }

    /// Remove a callback added with
    /// [`add_timeout_callback`](Document::add_timeout_callback).
    pub fn remove_timeout_callback(
        &self,
        callback: &SessionCallbackFn,
    ) -> Result<(), DocumentError> {
        self.remove_session_callback(callback)
    }

    /// Remove a session callback by user-callback identity. Emits
    /// `SessionCallbackRemoved`; fails with
    /// [`DocumentError::UnknownCallback`] when the callback was never added.
    pub fn remove_session_callback(
        &self,
        callback: &SessionCallbackFn,
    ) -> Result<(), DocumentError> {
        let removed = {
            let mut callbacks = self.inner.session_callbacks.borrow_mut();
            callbacks
                .iter()
                .position(|existing| Rc::ptr_eq(existing.callback(), callback))
                .map(|index| callbacks.remove(index))
        };
        match removed {
            Some(handle) => {
                self.trigger_on_change(&DocumentEvent::SessionCallbackRemoved(
                    SessionCallbackEvent {
                        document: self.clone(),
                        callback: handle,
                    },
                ));
                Ok(())
            }
            None => Err(DocumentError::UnknownCallback),
        }
    }

    /// Snapshot of the registered session callbacks.
    pub fn session_callbacks(&self) -> Vec<SessionCallback> {
        self.inner.session_callbacks.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::document::current_document;

    #[test]
    fn wrapped_callback_binds_the_current_document() {
        let doc = Document::new();
        let observed = Rc::new(Cell::new(false));
        let observed_in_cb = Rc::clone(&observed);
        let doc_for_cb = doc.clone();
        let callback: SessionCallbackFn = Rc::new(move || {
            observed_in_cb.set(
                current_document()
                    .map(|current| current.ptr_eq(&doc_for_cb))
                    .unwrap_or(false),
            );
        });

        let handle = doc.add_periodic_callback(callback, 250, None).unwrap();
        assert_eq!(handle.period(), Some(250));
        assert_eq!(handle.timeout(), None);

        let wrapped = Rc::clone(handle.wrapped());
        (*wrapped)();
        assert!(observed.get());
        assert!(current_document().is_none());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let doc = Document::new();
        let callback: SessionCallbackFn = Rc::new(|| {});
        doc.add_periodic_callback(Rc::clone(&callback), 100, None)
            .unwrap();
        assert!(matches!(
            doc.add_timeout_callback(Rc::clone(&callback), 100, None),
            Err(DocumentError::AlreadyRegistered)
        ));
    }

    #[test]
    fn handle_remove_funnels_to_the_document() {
        let doc = Document::new();
        let callback: SessionCallbackFn = Rc::new(|| {});
        let handle = doc
            .add_timeout_callback(Rc::clone(&callback), 50, Some("cb-1"))
            .unwrap();
        assert_eq!(handle.id(), "cb-1");
        assert_eq!(doc.session_callbacks().len(), 1);

        handle.remove().unwrap();
        assert!(doc.session_callbacks().is_empty());
        assert!(matches!(
            handle.remove(),
            Err(DocumentError::UnknownCallback)
        ));
    }
}
