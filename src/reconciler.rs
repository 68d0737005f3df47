use serde_json::{Map, Value, json};

use crate::classifier::is_truthy;
use crate::error::{PipelineError, PipelineResult};
use crate::extractor::{Pair, QUERY_INTENT};

pub const ENDPOINT_URL: &str = "endpoint_url";
pub const PAYLOAD: &str = "payload";

/// Paging fields and the value they get when left falsy.
const PAGING_DEFAULTS: &[(&str, i64)] = &[("page", 1), ("limit", 10)];

/// An API template, normally `{"endpoint_url": ..., "payload": {...}}`.
/// Without a `payload` object the template itself is the payload, minus
/// `endpoint_url`.
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadTemplate {
    /// Top-level fields, without `payload` when that is an object.
    fields: Map<String, Value>,
    payload: Option<Map<String, Value>>,
}

impl PayloadTemplate {
    /// Parse the retriever's JSON. Anything but an object is rejected.
    pub fn parse(json: &str) -> PipelineResult<Self> {
        Self::from_value(serde_json::from_str(json)?)
    }

    pub fn from_value(value: Value) -> PipelineResult<Self> {
        let mut fields = match value {
            Value::Object(fields) => fields,
            other => {
                return Err(PipelineError::ResolverParse(format!(
                    "template must be a JSON object, got: {}",
                    other
                )));
            }
        };

        let payload = if matches!(fields.get(PAYLOAD), Some(Value::Object(_))) {
            fields.shift_remove(PAYLOAD).and_then(|payload| match payload {
                Value::Object(payload) => Some(payload),
                _ => None,
            })
        } else {
            None
        };
        Ok(Self { fields, payload })
    }

    /// The endpoint URL, when present as a non-empty string.
    pub fn endpoint_url(&self) -> Option<&str> {
        self.fields
            .get(ENDPOINT_URL)
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
    }

    /// Whether the template carries a nested `payload` object.
    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    /// The mergeable payload fields.
    pub fn payload(&self) -> Map<String, Value> {
        match &self.payload {
            Some(payload) => payload.clone(),
            None => self
                .fields
                .iter()
                .filter(|(key, _)| key.as_str() != ENDPOINT_URL)
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        }
    }

    /// Set a single payload field.
    pub fn set_payload_field(&mut self, key: &str, value: Value) {
        self.payload_mut().insert(key.to_string(), value);
    }

    fn payload_mut(&mut self) -> &mut Map<String, Value> {
        match &mut self.payload {
            Some(payload) => payload,
            None => &mut self.fields,
        }
    }

    pub fn to_value(&self) -> Value {
        let mut fields = self.fields.clone();
        if let Some(payload) = &self.payload {
            fields.insert(PAYLOAD.to_string(), Value::Object(payload.clone()));
        }
        Value::Object(fields)
    }
}

/// Result of [`reconcile`].
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub template: PayloadTemplate,
    /// Keys that had to be added to the payload, never `query_intent`.
    pub missing_keys: Vec<String>,
}

/// Give falsy `page`/`limit` fields their defaults. Absent fields are left
/// absent. Idempotent.
pub fn apply_paging_defaults(payload: &mut Map<String, Value>) {
    for (field, default) in PAGING_DEFAULTS {
        if let Some(value) = payload.get_mut(*field) {
            if !is_truthy(value) {
                *value = json!(default);
            }
        }
    }
}

fn merge_entry(target: &mut Map<String, Value>, key: String, value: Value, missing: &mut Vec<String>) {
    match target.get_mut(&key) {
        Some(existing) => match (existing, value) {
            (Value::Object(existing), Value::Object(incoming)) => {
                for (nested_key, nested_value) in incoming {
                    merge_entry(existing, nested_key, nested_value, missing);
                }
            }
            (slot, value) => *slot = value,
        },
        None => {
            missing.push(key.clone());
            target.insert(key, value);
        }
    }
}

/// Merge arbitrary JSON entries into the template payload. Existing fields
/// are overwritten (last write wins), nested objects are merged field by
/// field, and every key that had to be inserted is reported as missing.
pub fn reconcile_entries<I>(mut template: PayloadTemplate, entries: I) -> Reconciliation
where
    I: IntoIterator<Item = (String, Value)>,
{
    let nested = template.has_payload();
    let payload = template.payload_mut();
    apply_paging_defaults(payload);

    let mut missing_keys = Vec::new();
    for (key, value) in entries {
        // the endpoint only ever comes from the retriever
        if !nested && key == ENDPOINT_URL {
            continue;
        }
        merge_entry(payload, key, value, &mut missing_keys);
    }

    missing_keys.retain(|key| key != QUERY_INTENT);
    Reconciliation {
        template,
        missing_keys,
    }
}

pub fn reconcile(template: PayloadTemplate, pairs: &[Pair]) -> Reconciliation {
    reconcile_entries(
        template,
        pairs
            .iter()
            .map(|p| (p.key.clone(), Value::String(p.value.clone()))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;

    fn template(value: Value) -> PayloadTemplate {
        PayloadTemplate::from_value(value).unwrap()
    }

    #[test]
    fn test_existing_empty_field_is_filled() {
        let t = template(json!({"endpoint_url": "E", "payload": {"a": "", "b": "x"}}));
        let result = reconcile(t, &[Pair::new("a", "1")]);

        assert_eq!(result.template.payload(), *json!({"a": "1", "b": "x"}).as_object().unwrap());
        assert!(result.missing_keys.is_empty());

        let completeness = classify(&result.template.payload());
        assert_eq!(completeness.populated, vec!["a", "b"]);
        assert!(completeness.empty.is_empty());
    }

    #[test]
    fn test_unknown_keys_are_inserted_and_reported() {
        let t = template(json!({"endpoint_url": "E", "payload": {"title": ""}}));
        let pairs = [
            Pair::new("query_intent", "create task"),
            Pair::new("title", "Fix bug"),
            Pair::new("category", "Tools"),
        ];
        let result = reconcile(t, &pairs);

        assert_eq!(result.missing_keys, vec!["category"]);
        let payload = result.template.payload();
        assert_eq!(payload["query_intent"], "create task");
        assert_eq!(payload["category"], "Tools");
    }

    #[test]
    fn test_last_write_wins() {
        let t = template(json!({"payload": {"status": "Opened"}}));
        let pairs = [Pair::new("status", "closed"), Pair::new("status", "assigned")];
        let result = reconcile(t, &pairs);
        assert_eq!(result.template.payload()["status"], "assigned");
        assert!(result.missing_keys.is_empty());
    }

    #[test]
    fn test_paging_defaults_fill_falsy_fields_only() {
        let t = template(json!({"payload": {"page": "", "limit": 0}}));
        let result = reconcile(t, &[]);
        assert_eq!(result.template.payload()["page"], 1);
        assert_eq!(result.template.payload()["limit"], 10);

        let t = template(json!({"payload": {"page": 3}}));
        let payload = reconcile(t, &[]).template.payload();
        assert_eq!(payload["page"], 3);
        assert!(!payload.contains_key("limit"));
    }

    #[test]
    fn test_paging_defaults_are_idempotent() {
        let mut once = json!({"page": null, "limit": "", "q": "x"}).as_object().cloned().unwrap();
        apply_paging_defaults(&mut once);
        let mut twice = once.clone();
        apply_paging_defaults(&mut twice);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_nested_objects_are_merged() {
        let t = template(json!({"payload": {"filter": {"status": "", "owner": "amy"}}}));
        let entries = vec![(
            "filter".to_string(),
            json!({"status": "closed", "category": "Tools"}),
        )];
        let result = reconcile_entries(t, entries);

        assert_eq!(
            result.template.payload()["filter"],
            json!({"status": "closed", "owner": "amy", "category": "Tools"})
        );
        assert_eq!(result.missing_keys, vec!["category"]);
    }

    #[test]
    fn test_template_without_payload_merges_at_top_level() {
        let t = template(json!({"endpoint_url": "E", "title": ""}));
        let pairs = [
            Pair::new("title", "Fix bug"),
            Pair::new("endpoint_url", "https://elsewhere"),
            Pair::new("priority", "high"),
        ];
        let result = reconcile(t, &pairs);

        assert!(!result.template.has_payload());
        assert_eq!(result.template.endpoint_url(), Some("E"));
        assert_eq!(result.missing_keys, vec!["priority"]);
        assert_eq!(
            result.template.payload(),
            *json!({"title": "Fix bug", "priority": "high"}).as_object().unwrap()
        );
    }

    #[test]
    fn test_pairs_never_supply_a_missing_endpoint() {
        let t = template(json!({"title": ""}));
        let pairs = [
            Pair::new("title", "T"),
            Pair::new("endpoint_url", "http://elsewhere.example/steal"),
        ];
        let result = reconcile(t, &pairs);

        assert_eq!(result.template.endpoint_url(), None);
        assert!(result.missing_keys.is_empty());
        assert_eq!(
            result.template.payload(),
            *json!({"title": "T"}).as_object().unwrap()
        );
    }

    #[test]
    fn test_query_intent_is_never_missing() {
        let t = template(json!({"endpoint_url": "E", "payload": {}}));
        let result = reconcile(t, &[Pair::new("query_intent", "list tasks")]);
        assert!(result.missing_keys.is_empty());
    }

    #[test]
    fn test_non_object_templates_are_rejected() {
        assert!(matches!(
            PayloadTemplate::parse("[1, 2]"),
            Err(PipelineError::ResolverParse(_))
        ));
        assert!(matches!(
            PayloadTemplate::parse("not json"),
            Err(PipelineError::ResolverParse(_))
        ));
    }

    #[test]
    fn test_status_field_is_written_into_payload() {
        let mut t = template(json!({"endpoint_url": "E", "payload": {"title": "T"}}));
        t.set_payload_field("status", json!("Closed"));
        assert_eq!(t.to_value()["payload"]["status"], "Closed");
        assert_eq!(t.endpoint_url(), Some("E"));
    }
}
