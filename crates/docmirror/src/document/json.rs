//! Full-document JSON form.
//!
//! The wire shape is
//!
//! ```json
//! {
//!   "title": "...",
//!   "roots": {
//!     "root_ids": ["<id>", ...],
//!     "references": [ { "id": ..., "type": ..., "attributes": {...} }, ... ]
//!   },
//!   "version": "..."
//! }
//! ```
//!
//! `references` carries a record for **every** reachable model, not only the
//! roots. Reconstruction is two-phase so cyclic references resolve: first
//! every record is instantiated from its type tag, then attributes are
//! decoded against the full instance table and bulk-assigned. The phases
//! stay separate functions so the patch applier can adopt live instances
//! between them.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::{json, Map, Value};

use crate::error::DocumentError;
use crate::model::{get_class, AttrValue, ModelRc};

use super::Document;

impl Document {
    /// Serialize the whole document. Keys are sorted; `references` is
    /// ordered by model id.
    pub fn to_json(&self) -> Value {
        let roots = self.roots();
        let root_ids: Vec<Value> = roots.iter().map(|root| Value::String(root.id())).collect();

        let mut models = self.models();
        models.sort_by_key(|model| model.id());

        json!({
            "title": self.title(),
            "roots": {
                "root_ids": root_ids,
                "references": references_json(&models),
            },
            "version": crate::VERSION,
        })
    }

    /// Serialize to a string; `indent` selects pretty output with that many
    /// spaces per level, `None` compact output.
    pub fn to_json_string(&self, indent: Option<usize>) -> Result<String, DocumentError> {
        let value = self.to_json();
        match indent {
            None => Ok(value.to_string()),
            Some(width) => {
                let indent = vec![b' '; width];
                let mut out = Vec::new();
                let formatter = PrettyFormatter::with_indent(&indent);
                let mut serializer = Serializer::with_formatter(&mut out, formatter);
                value.serialize(&mut serializer)?;
                Ok(String::from_utf8(out).expect("serde_json emits UTF-8"))
            }
        }
    }

    /// Reconstruct a document from its JSON form. Roots are added in
    /// `root_ids` order; the title is assigned last.
    pub fn from_json(value: &Value) -> Result<Document, DocumentError> {
        let title = value
            .get("title")
            .and_then(Value::as_str)
            .ok_or_else(|| DocumentError::LoadFailure("document JSON has no 'title'".into()))?;
        let roots_json = value
            .get("roots")
            .and_then(Value::as_object)
            .ok_or_else(|| DocumentError::LoadFailure("document JSON has no 'roots'".into()))?;
        let root_ids = roots_json
            .get("root_ids")
            .and_then(Value::as_array)
            .ok_or_else(|| DocumentError::LoadFailure("document JSON has no 'root_ids'".into()))?;
        let references = roots_json
            .get("references")
            .and_then(Value::as_array)
            .ok_or_else(|| DocumentError::LoadFailure("document JSON has no 'references'".into()))?;

        let instances = instantiate_references_json(references)?;
        initialize_references_json(references, &instances)?;

        let doc = Document::new();
        for root_id in root_ids {
            let id = root_id.as_str().ok_or_else(|| {
                DocumentError::LoadFailure("root ids must be strings".into())
            })?;
            let root = instances.get(id).ok_or_else(|| {
                DocumentError::LoadFailure(format!(
                    "root id '{id}' has no matching reference record"
                ))
            })?;
            doc.add_root(root);
        }
        doc.set_title(title);
        Ok(doc)
    }

    pub fn from_json_string(text: &str) -> Result<Document, DocumentError> {
        let value: Value = serde_json::from_str(text)?;
        Document::from_json(&value)
    }

    /// Overwrite this document's content with the JSON-encoded document,
    /// keeping the document object (and its listeners) alive.
    pub fn replace_with_json(&self, value: &Value) -> Result<(), DocumentError> {
        let replacement = Document::from_json(value)?;
        replacement.destructively_move(self)
    }
}

/// Build a reference record per model: its ref plus the full attribute
/// snapshot.
pub(crate) fn references_json(models: &[ModelRc]) -> Vec<Value> {
    models
        .iter()
        .map(|model| {
            let mut record = model.model_ref().to_json_map();
            record.insert(
                "attributes".to_string(),
                Value::Object(model.to_json_like(true)),
            );
            Value::Object(record)
        })
        .collect()
}

/// Phase 1: construct an instance per record, resolving `subtype` (else
/// `type`) through the class registry. Attributes stay untouched.
pub(crate) fn instantiate_references_json(
    records: &[Value],
) -> Result<IndexMap<String, ModelRc>, DocumentError> {
    let mut instances = IndexMap::new();
    for record in records {
        let record = record.as_object().ok_or_else(|| {
            DocumentError::LoadFailure("reference records must be objects".into())
        })?;
        let id = record
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| DocumentError::LoadFailure("reference record has no 'id'".into()))?;
        let tag = record
            .get("subtype")
            .and_then(Value::as_str)
            .or_else(|| record.get("type").and_then(Value::as_str))
            .ok_or_else(|| DocumentError::LoadFailure("reference record has no 'type'".into()))?;
        let class = get_class(tag).ok_or_else(|| {
            DocumentError::LoadFailure(format!("unknown model type '{tag}' (id: '{id}')"))
        })?;
        instances.insert(id.to_string(), class.construct(Some(id)));
    }
    Ok(instances)
}

/// Phase 2: decode each record's attributes against the instance table and
/// bulk-assign them. Reference-typed properties resolve refs through their
/// descriptors; attributes the class does not declare are dropped with a
/// warning.
pub(crate) fn initialize_references_json(
    records: &[Value],
    instances: &IndexMap<String, ModelRc>,
) -> Result<(), DocumentError> {
    for record in records {
        let record = record.as_object().ok_or_else(|| {
            DocumentError::LoadFailure("reference records must be objects".into())
        })?;
        let id = record
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| DocumentError::LoadFailure("reference record has no 'id'".into()))?;
        let instance = instances.get(id).ok_or_else(|| {
            DocumentError::LoadFailure(format!("no instance for reference record '{id}'"))
        })?;

        let empty = Map::new();
        let attributes = record
            .get("attributes")
            .and_then(Value::as_object)
            .unwrap_or(&empty);

        let declared = instance.properties();
        let with_refs = instance.properties_with_refs();
        let mut decoded = Vec::with_capacity(attributes.len());
        for (attr, raw) in attributes {
            if !declared.contains(attr) {
                tracing::warn!(
                    model = %id,
                    attr = %attr,
                    "dropping unknown attribute while loading model"
                );
                continue;
            }
            let value = if with_refs.contains(attr) {
                let descriptor = instance.lookup(attr).ok_or_else(|| {
                    DocumentError::LoadFailure(format!(
                        "no descriptor for attribute '{attr}' of '{id}'"
                    ))
                })?;
                descriptor.from_json(raw, instances)?
            } else {
                AttrValue::from_json_value(raw)
            };
            decoded.push((attr.clone(), value));
        }
        instance.update(decoded);
    }
    Ok(())
}
