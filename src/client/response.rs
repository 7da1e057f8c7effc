use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Payload returned by every tool.
///
/// Upstreams answer either with a JSON document or with plain text
/// (FASTA, KEGG flat files, TSV, ...). Callers match on the variant instead of
/// inspecting the payload at runtime.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ApiResponse {
    /// A JSON object or array
    Structured(Value),
    /// A non-JSON body
    Text(String),
}

/// Optional metadata attached to a response envelope
pub type Metadata = Map<String, Value>;

impl ApiResponse {
    /// Get the structured payload, if any
    #[must_use]
    pub const fn as_structured(&self) -> Option<&Value> {
        match self {
            Self::Structured(value) => Some(value),
            Self::Text(_) => None,
        }
    }

    /// Get the text payload, if any
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Structured(_) => None,
        }
    }

    /// Convert into a JSON value; text becomes a JSON string
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Structured(value) => value,
            Self::Text(text) => Value::String(text),
        }
    }

    /// Render for a human or an MCP text content block
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Structured(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
            Self::Text(text) => text.clone(),
        }
    }
}

impl From<Value> for ApiResponse {
    fn from(value: Value) -> Self {
        Self::Structured(value)
    }
}

impl From<String> for ApiResponse {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl fmt::Display for ApiResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Wrap `data` in a `{data, metadata}` envelope when metadata is present.
///
/// With no metadata (or an empty map) the payload is returned unchanged.
#[must_use]
pub fn format_response(data: impl Into<ApiResponse>, metadata: Option<Metadata>) -> ApiResponse {
    let data = data.into();
    match metadata {
        Some(metadata) if !metadata.is_empty() => {
            let mut envelope = Map::with_capacity(2);
            envelope.insert("data".to_string(), data.into_value());
            envelope.insert("metadata".to_string(), Value::Object(metadata));
            ApiResponse::Structured(Value::Object(envelope))
        }
        _ => data,
    }
}

/// Build a single-entry metadata map, e.g. `{"results": 25}`
#[must_use]
pub fn count_metadata(key: &str, count: usize) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert(key.to_string(), Value::from(count));
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_no_metadata_is_identity() {
        let data = json!({"id": 42, "name": "gizmo"});
        let result = format_response(data.clone(), None);
        assert_eq!(result, ApiResponse::Structured(data));

        let text = format_response(">sp|P00520|ABL1_MOUSE".to_string(), None);
        assert_eq!(text.as_text(), Some(">sp|P00520|ABL1_MOUSE"));
    }

    #[test]
    fn test_metadata_builds_envelope() {
        let result = format_response(json!([1, 2, 3]), Some(count_metadata("results", 3)));
        assert_eq!(
            result,
            ApiResponse::Structured(json!({"data": [1, 2, 3], "metadata": {"results": 3}}))
        );
    }

    #[test]
    fn test_text_payload_in_envelope() {
        let result = format_response("ACGT".to_string(), Some(count_metadata("length", 4)));
        assert_eq!(
            result.into_value(),
            json!({"data": "ACGT", "metadata": {"length": 4}})
        );
    }

    #[test]
    fn test_empty_metadata_is_ignored() {
        let data = json!({"a": 1});
        assert_eq!(
            format_response(data.clone(), Some(Metadata::new())),
            ApiResponse::Structured(data)
        );
    }

    #[test]
    fn test_render() {
        assert_eq!(ApiResponse::Text("x".into()).render(), "x");
        assert!(ApiResponse::Structured(json!({"a": 1})).render().contains("\"a\": 1"));
    }

    #[test]
    fn test_serializes_untagged() {
        let text = serde_json::to_value(ApiResponse::Text(">sp|P04637".to_string())).unwrap();
        assert_eq!(text, json!(">sp|P04637"));
        let structured = serde_json::to_value(ApiResponse::Structured(json!({"id": 1}))).unwrap();
        assert_eq!(structured, json!({"id": 1}));
    }
}
