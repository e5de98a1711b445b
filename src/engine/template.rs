//! `{{name}}` placeholder substitution over JSON values

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use super::Variables;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{([A-Za-z0-9_]+)\}\}").expect("placeholder pattern is valid")
});

/// Substitute placeholders in a single string
///
/// Placeholders whose name is not in `variables` are kept verbatim.
pub fn apply_str(text: &str, variables: &Variables) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &Captures| match variables.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Substitute placeholders in every string inside `value`
///
/// Arrays and objects are rebuilt with the same shape and key order; object
/// keys are never substituted. Numbers, booleans and null are returned as-is.
pub fn apply(value: &Value, variables: &Variables) -> Value {
    match value {
        Value::String(text) => Value::String(apply_str(text, variables)),
        Value::Array(items) => {
            Value::Array(items.iter().map(|item| apply(item, variables)).collect())
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| (key.clone(), apply(item, variables)))
                .collect(),
        ),
        other => other.clone(),
    }
}
