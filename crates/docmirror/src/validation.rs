//! Integrity checking.
//!
//! `Document::validate` hands each root's reference closure to
//! [`check_integrity`], which looks for conditions that indicate a broken
//! model graph: distinct instances sharing an id, and models simultaneously
//! attached to different documents. Issues are logged and returned; nothing
//! here mutates the graph.

use std::collections::hash_map;
use std::collections::HashMap;
use std::rc::Rc;

use crate::model::ModelRc;

/// Inspect a reference closure for integrity problems. Each issue is logged
/// via `tracing::warn!` and returned as a human-readable description.
pub fn check_integrity(models: &[ModelRc]) -> Vec<String> {
    let mut issues = Vec::new();

    let mut by_id: HashMap<String, &ModelRc> = HashMap::new();
    for model in models {
        match by_id.entry(model.id()) {
            hash_map::Entry::Occupied(slot) => {
                if !Rc::ptr_eq(slot.get(), model) {
                    issues.push(format!(
                        "two distinct model instances share id '{}'",
                        slot.key()
                    ));
                }
            }
            hash_map::Entry::Vacant(slot) => {
                slot.insert(model);
            }
        }
    }

    let mut first_doc = None;
    for model in models {
        if let Some(document) = model.document() {
            match &first_doc {
                None => first_doc = Some(document),
                Some(expected) if !expected.ptr_eq(&document) => {
                    issues.push(format!(
                        "model '{}' is attached to a different document than its graph",
                        model.id()
                    ));
                }
                Some(_) => {}
            }
        }
    }

    for issue in &issues {
        tracing::warn!(issue = %issue, "document integrity check failed");
    }
    issues
}
