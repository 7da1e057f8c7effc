use biomed_hub_mcp::client::{format_response, ApiResponse, Metadata};
use biomed_hub_mcp::repositories::ResponseCache;
use biomed_hub_mcp::tools::{clamp_limit, ToolArgs};
use proptest::prelude::*;
use serde_json::{json, Value};

fn json_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 ]{0,16}".prop_map(Value::from),
    ]
}

fn json_value() -> impl Strategy<Value = Value> {
    json_leaf().prop_recursive(3, 24, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,8}", inner, 0..6)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

fn metadata() -> impl Strategy<Value = Metadata> {
    prop::collection::btree_map("[a-z_]{1,10}", 0u64..10_000, 1..4)
        .prop_map(|map| map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
}

/// Envelope laws of the response formatter
mod envelope_props {
    use super::*;

    proptest! {
        #[test]
        fn test_no_metadata_is_identity(data in json_value()) {
            let formatted = format_response(data.clone(), None);
            prop_assert_eq!(formatted, ApiResponse::Structured(data));
        }

        #[test]
        fn test_identity_is_idempotent(data in json_value()) {
            let once = format_response(data, None);
            let twice = format_response(once.clone(), None);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn test_metadata_gives_exactly_two_keys(data in json_value(), meta in metadata()) {
            let envelope = format_response(data.clone(), Some(meta.clone())).into_value();
            let object = envelope.as_object().expect("envelope is an object");
            prop_assert_eq!(object.len(), 2);
            prop_assert_eq!(&object["data"], &data);
            prop_assert_eq!(&object["metadata"], &Value::Object(meta));
        }

        #[test]
        fn test_text_survives_the_envelope(text in "[ -~]{0,64}", meta in metadata()) {
            let envelope = format_response(text.clone(), Some(meta)).into_value();
            prop_assert_eq!(&envelope["data"], &Value::String(text));
        }
    }
}

mod cache_key_props {
    use super::*;

    proptest! {
        #[test]
        fn test_request_key_is_stable(url in "https://[a-z]{3,10}\\.org/[a-z0-9/]{0,20}", body in prop::collection::vec(any::<u8>(), 0..64)) {
            let a = ResponseCache::request_key("GET", &url, "application/json", &body);
            let b = ResponseCache::request_key("get", &url, "application/json", &body);
            prop_assert_eq!(&a, &b);
            prop_assert_eq!(a.len(), 64);
        }

        #[test]
        fn test_accept_header_changes_key(url in "https://[a-z]{3,10}\\.org/[a-z]{1,10}") {
            let json = ResponseCache::request_key("GET", &url, "application/json", b"");
            let text = ResponseCache::request_key("GET", &url, "*/*", b"");
            prop_assert_ne!(json, text);
        }
    }
}

mod argument_props {
    use super::*;

    proptest! {
        #[test]
        fn test_comma_list_matches_array(items in prop::collection::vec("[A-Z0-9]{1,8}", 1..8)) {
            let csv = ToolArgs::from_value(json!({"ids": items.join(", ")})).unwrap();
            let array = ToolArgs::from_value(json!({"ids": items.clone()})).unwrap();
            prop_assert_eq!(csv.list("ids").unwrap(), items.clone());
            prop_assert_eq!(array.list("ids").unwrap(), items);
        }

        #[test]
        fn test_numeric_strings_parse(n in 0u64..1_000_000) {
            let args = ToolArgs::from_value(json!({"as_number": n, "as_string": n.to_string()})).unwrap();
            prop_assert_eq!(args.int_or("as_number", 0).unwrap(), n);
            prop_assert_eq!(args.int_or("as_string", 0).unwrap(), n);
        }

        #[test]
        fn test_clamp_limit_stays_in_range(limit in any::<u64>(), max in 1u64..10_000) {
            let clamped = clamp_limit(limit, max);
            prop_assert!((1..=max).contains(&clamped));
        }
    }
}
