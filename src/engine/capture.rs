//! Variable harvesting from URLs and JSON payloads
//!
//! Both entry points are total: remote payloads have no guaranteed shape, so
//! anything that does not look like a match is skipped rather than reported.

use serde_json::Value;
use url::Url;

use super::Variables;

/// Capture query parameters named in `names` from `url` into `store`
///
/// Unparsable URLs and empty parameter values are ignored. The first
/// occurrence of a repeated parameter is used.
pub fn capture_from_url(url: &str, names: &[String], store: &mut Variables) {
    let Ok(parsed) = Url::parse(url) else {
        return;
    };

    for name in names {
        let value = parsed
            .query_pairs()
            .find(|(key, _)| key == name.as_str())
            .map(|(_, value)| value.into_owned());
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            store.insert(name.clone(), value);
        }
    }
}

/// Walk `value` in document order capturing requested variables into `store`
///
/// Object keys named in `names` with a non-empty string value are captured
/// directly; every string leaf is also tried as a URL. Later matches overwrite
/// earlier ones.
pub fn capture_from_value(value: &Value, names: &[String], store: &mut Variables) {
    if names.is_empty() {
        return;
    }

    match value {
        Value::String(text) => capture_from_url(text, names, store),
        Value::Array(items) => {
            for item in items {
                capture_from_value(item, names, store);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                if let Value::String(text) = item {
                    if !text.is_empty() && names.iter().any(|name| name == key) {
                        store.insert(key.clone(), text.clone());
                    }
                }
                capture_from_value(item, names, store);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_url_captures_non_empty_params() {
        let mut store = Variables::new();
        capture_from_url(
            "https://x?state=abc&code=&z=1",
            &names(&["state", "code", "z"]),
            &mut store,
        );
        assert_eq!(store.len(), 2);
        assert_eq!(store["state"], "abc");
        assert_eq!(store["z"], "1");
    }

    #[test]
    fn test_url_overwrites_previous_value() {
        let mut store = Variables::new();
        store.insert("code".into(), "old".into());
        capture_from_url("https://rp.example/cb?code=new", &names(&["code"]), &mut store);
        assert_eq!(store["code"], "new");
    }

    #[test]
    fn test_invalid_url_is_ignored() {
        let mut store = Variables::new();
        store.insert("state".into(), "keep".into());
        capture_from_url("not-a-url", &names(&["state"]), &mut store);
        assert_eq!(store.len(), 1);
        assert_eq!(store["state"], "keep");
    }

    #[test]
    fn test_url_decodes_params() {
        let mut store = Variables::new();
        capture_from_url(
            "https://rp.example/cb?redirect=https%3A%2F%2Fa.example%2F&x=a+b",
            &names(&["redirect", "x"]),
            &mut store,
        );
        assert_eq!(store["redirect"], "https://a.example/");
        assert_eq!(store["x"], "a b");
    }

    #[test]
    fn test_value_walks_objects_arrays_and_urls() {
        let mut store = Variables::new();
        capture_from_value(
            &json!({
                "code": "initial",
                "nested": { "state": "s1" },
                "list": [
                    "https://example.com/cb?token=xyz",
                    "not-a-url",
                    { "code": "override" }
                ]
            }),
            &names(&["code", "state", "token"]),
            &mut store,
        );
        assert_eq!(store["code"], "override");
        assert_eq!(store["state"], "s1");
        assert_eq!(store["token"], "xyz");
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_last_write_wins() {
        let mut store = Variables::new();
        capture_from_value(
            &json!([{ "code": "a" }, { "code": "b" }]),
            &names(&["code"]),
            &mut store,
        );
        assert_eq!(store["code"], "b");
    }

    #[test]
    fn test_non_string_matches_skipped() {
        let mut store = Variables::new();
        capture_from_value(
            &json!({ "code": 42, "state": null, "flag": true, "nonce": "" }),
            &names(&["code", "state", "flag", "nonce"]),
            &mut store,
        );
        assert!(store.is_empty());
    }

    #[test]
    fn test_bare_url_string_value() {
        let mut store = Variables::new();
        capture_from_value(
            &json!("https://rp.example/cb?code=abc"),
            &names(&["code"]),
            &mut store,
        );
        assert_eq!(store["code"], "abc");
    }
}
