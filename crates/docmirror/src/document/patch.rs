//! Patch protocol.
//!
//! A patch is `{ "events": [...], "references": [...] }`: an ordered list of
//! change records plus enough model records for a replica to realize them.
//! The generator cannot know which models the remote already holds, so it
//! conservatively ships every model transitively referenced by new values;
//! the applier deduplicates by id and reuses its live instances.

use indexmap::IndexMap;
use serde_json::{json, Value};

use crate::error::DocumentError;
use crate::event::DocumentEvent;
use crate::model::{collect_models, AttrValue, ModelRc};

use super::json::{initialize_references_json, instantiate_references_json, references_json};
use super::Document;

impl Document {
    /// Turn a batch of this document's events into a self-sufficient patch.
    ///
    /// Fails with [`DocumentError::CrossDocument`] when any event belongs to
    /// another document. Session-callback events carry no document content
    /// and produce no patch record.
    pub fn create_json_patch(&self, events: &[DocumentEvent]) -> Result<Value, DocumentError> {
        let mut references: IndexMap<String, ModelRc> = IndexMap::new();
        let mut json_events: Vec<Value> = Vec::new();

        for event in events {
            if !event.document().ptr_eq(self) {
                return Err(DocumentError::CrossDocument);
            }
            match event {
                DocumentEvent::ModelChanged(e) => {
                    // The new value may reference models the remote has
                    // never seen; ship their full closures. The patched
                    // model itself stays out of the references unless the
                    // new value literally is that model.
                    let mut value_refs: IndexMap<String, ModelRc> = IndexMap::new();
                    for model in collect_models(&e.new) {
                        value_refs.entry(model.id()).or_insert(model);
                    }
                    let new_is_target =
                        matches!(&e.new, AttrValue::Model(m) if m.id() == e.model.id());
                    if !new_is_target {
                        value_refs.shift_remove(&e.model.id());
                    }
                    for (id, model) in value_refs {
                        references.entry(id).or_insert(model);
                    }
                    json_events.push(json!({
                        "kind": "ModelChanged",
                        "model": e.model.model_ref().to_json(),
                        "attr": e.attr,
                        "new": e.new.to_json(),
                    }));
                }
                DocumentEvent::RootAdded(e) => {
                    for model in e.model.references() {
                        references.entry(model.id()).or_insert(model);
                    }
                    json_events.push(json!({
                        "kind": "RootAdded",
                        "model": e.model.model_ref().to_json(),
                    }));
                }
                DocumentEvent::RootRemoved(e) => {
                    json_events.push(json!({
                        "kind": "RootRemoved",
                        "model": e.model.model_ref().to_json(),
                    }));
                }
                DocumentEvent::TitleChanged(e) => {
                    json_events.push(json!({
                        "kind": "TitleChanged",
                        "title": e.title,
                    }));
                }
                DocumentEvent::SessionCallbackAdded(_)
                | DocumentEvent::SessionCallbackRemoved(_) => {}
            }
        }

        let mut models: Vec<ModelRc> = references.into_values().collect();
        models.sort_by_key(|model| model.id());
        Ok(json!({
            "events": json_events,
            "references": references_json(&models),
        }))
    }

    pub fn create_json_patch_string(
        &self,
        events: &[DocumentEvent],
    ) -> Result<String, DocumentError> {
        Ok(self.create_json_patch(events)?.to_string())
    }

    /// Apply a patch produced by
    /// [`create_json_patch`](Document::create_json_patch) on a peer.
    ///
    /// Existing instances are adopted wherever the patch names an id this
    /// document already holds, so remote changes land on the live objects.
    /// Mutations run through the normal change pipeline; listeners cannot
    /// distinguish local from remote origin.
    pub fn apply_json_patch(&self, patch: &Value) -> Result<(), DocumentError> {
        let references = patch
            .get("references")
            .and_then(Value::as_array)
            .ok_or_else(|| DocumentError::LoadFailure("patch has no 'references'".into()))?;
        let events = patch
            .get("events")
            .and_then(Value::as_array)
            .ok_or_else(|| DocumentError::LoadFailure("patch has no 'events'".into()))?;

        let mut instances = instantiate_references_json(references)?;

        // Adopt live instances for any referenced id we already hold.
        let adopted: Vec<(String, ModelRc)> = instances
            .keys()
            .filter_map(|id| self.get_model_by_id(id).map(|model| (id.clone(), model)))
            .collect();
        for (id, model) in adopted {
            instances.insert(id, model);
        }
        // The patched model is not always in the references; pin the live
        // instance so ModelChanged decoding resolves to it.
        for event in events {
            if let Some(id) = event
                .get("model")
                .and_then(|model| model.get("id"))
                .and_then(Value::as_str)
            {
                if let Some(model) = self.get_model_by_id(id) {
                    instances.insert(id.to_string(), model);
                }
            }
        }

        initialize_references_json(references, &instances)?;
        // Adopted live instances may have been re-initialized silently;
        // re-derive the closure and name index before replaying events.
        self.invalidate_all_models();

        for event in events {
            let kind = event
                .get("kind")
                .and_then(Value::as_str)
                .ok_or_else(|| DocumentError::UnknownPatchKind("<missing>".into()))?;
            match kind {
                "ModelChanged" => self.apply_model_changed(event, &instances)?,
                "RootAdded" => {
                    let id = event_model_id(event)?;
                    let root = instances
                        .get(id)
                        .ok_or_else(|| DocumentError::UnknownTarget(id.to_string()))?;
                    self.add_root(root);
                }
                "RootRemoved" => {
                    let id = event_model_id(event)?;
                    let root = instances
                        .get(id)
                        .ok_or_else(|| DocumentError::UnknownTarget(id.to_string()))?;
                    self.remove_root(root);
                }
                "TitleChanged" => {
                    let title = event.get("title").and_then(Value::as_str).ok_or_else(|| {
                        DocumentError::LoadFailure("TitleChanged event has no 'title'".into())
                    })?;
                    self.set_title(title);
                }
                other => return Err(DocumentError::UnknownPatchKind(other.to_string())),
            }
        }
        Ok(())
    }

    pub fn apply_json_patch_string(&self, patch: &str) -> Result<(), DocumentError> {
        let value: Value = serde_json::from_str(patch)?;
        self.apply_json_patch(&value)
    }

    fn apply_model_changed(
        &self,
        event: &Value,
        instances: &IndexMap<String, ModelRc>,
    ) -> Result<(), DocumentError> {
        let id = event_model_id(event)?;
        let target = self
            .get_model_by_id(id)
            .ok_or_else(|| DocumentError::UnknownTarget(id.to_string()))?;
        let attr = event.get("attr").and_then(Value::as_str).ok_or_else(|| {
            DocumentError::LoadFailure("ModelChanged event has no 'attr'".into())
        })?;
        if !target.properties().contains(attr) {
            tracing::warn!(
                model = %id,
                attr,
                "dropping patch for undeclared attribute"
            );
            return Ok(());
        }
        let raw = event.get("new").cloned().unwrap_or(Value::Null);
        let value = if target.properties_with_refs().contains(attr) {
            let descriptor = target.lookup(attr).ok_or_else(|| {
                DocumentError::LoadFailure(format!(
                    "no descriptor for attribute '{attr}' of '{id}'"
                ))
            })?;
            descriptor.from_json(&raw, instances)?
        } else {
            AttrValue::from_json_value(&raw)
        };
        target.set_attr(attr, value);
        Ok(())
    }
}

fn event_model_id(event: &Value) -> Result<&str, DocumentError> {
    event
        .get("model")
        .and_then(|model| model.get("id"))
        .and_then(Value::as_str)
        .ok_or_else(|| DocumentError::LoadFailure("patch event has no model ref".into()))
}
