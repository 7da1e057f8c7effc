//! Per-API clients.
//!
//! Each client wraps a [`BaseApiClient`](crate::client::BaseApiClient) with
//! endpoint construction and light reshaping, and answers its tools through
//! [`ToolSet`](crate::tools::ToolSet). Payloads stay untyped.

pub mod biothings;
pub mod chembl;
pub mod clinical_trials;
pub mod gwas;
pub mod kegg;
pub mod omim;
pub mod pathway_commons;
pub mod reactome;
pub mod uniprot;

pub use biothings::{BioThingsClient, BioThingsKind};
pub use chembl::ChemblClient;
pub use clinical_trials::ClinicalTrialsClient;
pub use gwas::GwasClient;
pub use kegg::KeggClient;
pub use omim::OmimClient;
pub use pathway_commons::PathwayCommonsClient;
pub use reactome::ReactomeClient;
pub use uniprot::UniProtClient;

use crate::client::{count_metadata, Metadata};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::error;

/// Percent-encode one URL path segment
pub(crate) fn segment(value: &str) -> String {
    urlencoding::encode(value.trim()).into_owned()
}

/// `{key: n}` where `n` is the length of the array at `data[field]`
pub(crate) fn array_count(data: &Value, field: &str, key: &str) -> Option<Metadata> {
    data.get(field)
        .and_then(Value::as_array)
        .map(|items| count_metadata(key, items.len()))
}

/// Match `value` against a lazily compiled pattern
pub(crate) fn matches(cell: &'static OnceLock<Option<Regex>>, pattern: &str, value: &str) -> bool {
    cell.get_or_init(|| {
        Regex::new(pattern)
            .map_err(|e| error!("Invalid identifier pattern {}: {}", pattern, e))
            .ok()
    })
        .as_ref()
        .is_some_and(|re| re.is_match(value))
}

/// Whether a JSON value counts as present (non-null, non-empty, not `false`)
pub(crate) fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
        Some(Value::Number(_)) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_segment_encoding() {
        assert_eq!(segment("hsa:7157"), "hsa%3A7157");
        assert_eq!(segment(" P00520 "), "P00520");
    }

    #[test]
    fn test_array_count() {
        let data = json!({"results": [1, 2, 3]});
        assert_eq!(
            array_count(&data, "results", "results"),
            Some(count_metadata("results", 3))
        );
        assert_eq!(array_count(&data, "hits", "hits"), None);
    }

    #[test]
    fn test_truthy() {
        assert!(!truthy(None));
        assert!(!truthy(Some(&json!([]))));
        assert!(!truthy(Some(&Value::Null)));
        assert!(truthy(Some(&json!(["P1"]))));
        assert!(truthy(Some(&json!({"a": 1}))));
    }

    #[test]
    fn test_matches_compiles_once() {
        static GOOD: OnceLock<Option<Regex>> = OnceLock::new();
        assert!(matches(&GOOD, r"^NCT\d{8}$", "NCT01234567"));
        assert!(!matches(&GOOD, r"^NCT\d{8}$", "NCT123"));
        assert!(GOOD.get().is_some_and(Option::is_some));
    }

    #[test]
    fn test_matches_rejects_when_pattern_is_invalid() {
        static BAD: OnceLock<Option<Regex>> = OnceLock::new();
        assert!(!matches(&BAD, r"^(unclosed", "unclosed"));
        assert!(BAD.get().is_some_and(Option::is_none));
    }
}
