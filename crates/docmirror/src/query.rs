//! Selector matching for `select` / `select_one` / `set_select`.
//!
//! A selector is a small JSON object mapping attribute names to expected
//! values. `id` and `type` match the model's identity and class tag (the
//! latter also matches the subtype); every other key compares the model's
//! attribute, JSON-encoded, for equality.

use serde_json::{Map, Value};

use crate::model::ModelRc;

/// Attribute name → expected JSON value.
pub type Selector = Map<String, Value>;

/// The `{name: <string>}` fast-path: exactly one key, `name`, with a string
/// value. The document answers these from its name index.
pub(crate) fn single_name_selector(selector: &Selector) -> Option<&str> {
    if selector.len() != 1 {
        return None;
    }
    selector.get("name").and_then(Value::as_str)
}

/// Whether `model` satisfies every clause of `selector`.
pub fn matches(model: &ModelRc, selector: &Selector) -> bool {
    selector.iter().all(|(key, expected)| match key.as_str() {
        "id" => expected.as_str().is_some_and(|id| id == model.id()),
        "type" => expected.as_str().is_some_and(|tag| {
            tag == model.type_tag() || model.subtype().as_deref() == Some(tag)
        }),
        _ => model
            .get_attr(key)
            .is_some_and(|value| value.to_json() == *expected),
    })
}

/// Filter `models` down to those matching `selector`.
pub fn find(models: impl IntoIterator<Item = ModelRc>, selector: &Selector) -> Vec<ModelRc> {
    models
        .into_iter()
        .filter(|model| matches(model, selector))
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::{AttrValue, ModelClass};

    fn selector(value: Value) -> Selector {
        match value {
            Value::Object(map) => map,
            other => panic!("selector literal must be an object, got {other:?}"),
        }
    }

    fn sample() -> Vec<ModelRc> {
        let class = ModelClass::new("Widget").with_property("value", AttrValue::Null);
        let a = class.construct(Some("a"));
        a.set_attr("name", "alpha".into());
        a.set_attr("value", 1i64.into());
        let b = class.construct(Some("b"));
        b.set_attr("name", "beta".into());
        b.set_attr("value", 1i64.into());
        vec![a, b]
    }

    #[test]
    fn matches_by_attribute_equality() {
        let models = sample();
        let hits = find(models, &selector(json!({ "value": 1 })));
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn matches_combine_conjunctively() {
        let models = sample();
        let hits = find(models, &selector(json!({ "value": 1, "name": "beta" })));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id(), "b");
    }

    #[test]
    fn type_clause_matches_tag_and_subtype() {
        let sub = ModelClass::new("Widget").with_subtype("Fancy");
        let m = sub.construct(Some("s"));
        let models = vec![m];
        assert_eq!(find(models.clone(), &selector(json!({ "type": "Widget" }))).len(), 1);
        assert_eq!(find(models.clone(), &selector(json!({ "type": "Fancy" }))).len(), 1);
        assert_eq!(find(models, &selector(json!({ "type": "Plot" }))).len(), 0);
    }

    #[test]
    fn name_fast_path_detection() {
        assert_eq!(
            single_name_selector(&selector(json!({ "name": "x" }))),
            Some("x")
        );
        assert_eq!(
            single_name_selector(&selector(json!({ "name": "x", "value": 1 }))),
            None
        );
        assert_eq!(single_name_selector(&selector(json!({ "name": 3 }))), None);
    }
}
