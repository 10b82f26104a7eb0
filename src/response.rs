//! Wire envelopes returned by the API: pages, counts, and batch entries.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RequestError;

/// One page of a list endpoint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub objects: Vec<Value>,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CountResponse {
    pub objects_count: u64,
}

/// Outcome of one request inside a batch, positionally aligned with the submission.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub code: u16,
    #[serde(default)]
    pub content: Value,
}

impl BatchEntry {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }
}

/// Decode a response body into an envelope.
pub fn parse<T: DeserializeOwned>(value: Value) -> Result<T, RequestError> {
    serde_json::from_value(value).map_err(|e| RequestError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn page_tolerates_missing_next() {
        let page: Page = parse(json!({"objects": [{"id": 1}]})).unwrap();
        assert_eq!(page.objects.len(), 1);
        assert_eq!(page.next, None);
    }

    #[test]
    fn count_requires_objects_count() {
        assert!(parse::<CountResponse>(json!({"objects": []})).is_err());
        let count: CountResponse = parse(json!({"objects_count": 12})).unwrap();
        assert_eq!(count.objects_count, 12);
    }

    #[test]
    fn batch_entry_success_range() {
        let entries: Vec<BatchEntry> =
            parse(json!([{"code": 201, "content": {}}, {"code": 404, "content": {"detail": "Not found."}}])).unwrap();
        assert!(entries[0].is_success());
        assert!(!entries[1].is_success());
    }
}
