use serde::Serialize;
use serde_json::{Map, Value};

/// JSON truthiness: null, false, zero, and empty strings, arrays or objects
/// are all falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

/// Payload fields split by whether they carry a value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Completeness {
    pub populated: Vec<String>,
    pub empty: Vec<String>,
}

impl Completeness {
    /// The external call may only go out when nothing is empty.
    pub fn is_complete(&self) -> bool {
        self.empty.is_empty()
    }
}

pub fn classify(payload: &Map<String, Value>) -> Completeness {
    let (populated, empty): (Vec<_>, Vec<_>) = payload
        .iter()
        .partition(|(_, value)| is_truthy(value));

    Completeness {
        populated: populated.into_iter().map(|(k, _)| k.clone()).collect(),
        empty: empty.into_iter().map(|(k, _)| k.clone()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_truthiness() {
        for falsy in [json!(null), json!(false), json!(0), json!(0.0), json!(""), json!([]), json!({})] {
            assert!(!is_truthy(&falsy), "{} should be falsy", falsy);
        }
        for truthy in [json!(true), json!(1), json!(-2.5), json!("0"), json!([0]), json!({"a": ""})] {
            assert!(is_truthy(&truthy), "{} should be truthy", truthy);
        }
    }

    #[test]
    fn test_partition_by_value() {
        let payload = object(json!({"a": "1", "b": "", "page": 1, "limit": 0, "note": null}));
        let completeness = classify(&payload);

        assert_eq!(completeness.populated, vec!["a", "page"]);
        assert_eq!(completeness.empty, vec!["b", "limit", "note"]);
        assert!(!completeness.is_complete());
    }

    #[test]
    fn test_empty_payload_is_complete() {
        let completeness = classify(&Map::new());
        assert!(completeness.populated.is_empty());
        assert!(completeness.is_complete());
    }
}
