//! Current-document context.
//!
//! User callbacks (listeners and session callbacks) run with an implicit
//! "current document" they can query without threading the handle through
//! their own signatures. The slot is thread-local (the container is
//! single-threaded by contract) and scoped: a guard saves the previous
//! value and restores it on drop, so nesting and unwinding both leave the
//! slot consistent.

use std::cell::RefCell;

use super::Document;

thread_local! {
    static CURRENT_DOCUMENT: RefCell<Option<Document>> = const { RefCell::new(None) };
}

/// The document whose callback is currently executing on this thread, if
/// any.
pub fn current_document() -> Option<Document> {
    CURRENT_DOCUMENT.with(|slot| slot.borrow().clone())
}

/// Make `document` current until the returned guard drops.
pub(crate) fn set_current(document: &Document) -> CurrentDocumentGuard {
    let previous = CURRENT_DOCUMENT.with(|slot| slot.borrow_mut().replace(document.clone()));
    CurrentDocumentGuard { previous }
}

pub(crate) struct CurrentDocumentGuard {
    previous: Option<Document>,
}

impl Drop for CurrentDocumentGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT_DOCUMENT.with(|slot| *slot.borrow_mut() = previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_sets_and_restores() {
        assert!(current_document().is_none());
        let outer = Document::new();
        {
            let _outer_guard = set_current(&outer);
            assert!(current_document().unwrap().ptr_eq(&outer));

            let inner = Document::new();
            {
                let _inner_guard = set_current(&inner);
                assert!(current_document().unwrap().ptr_eq(&inner));
            }
            assert!(current_document().unwrap().ptr_eq(&outer));
        }
        assert!(current_document().is_none());
    }

    #[test]
    fn guard_restores_across_unwinding() {
        let doc = Document::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = set_current(&doc);
            panic!("listener blew up");
        }));
        assert!(result.is_err());
        assert!(current_document().is_none());
    }
}
