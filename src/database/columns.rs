//! Wire names are camelCase, column names are snake_case.

use serde_json::{Map, Value};

pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

pub fn to_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.chars() {
        if c == '_' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.push(c.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Renames the top-level keys of an object to column names. Nested jsonb values keep wire names.
pub fn snake_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let renamed: Map<String, Value> = map.into_iter().map(|(k, v)| (to_snake_case(&k), v)).collect();
            Value::Object(renamed)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn converts_both_ways() {
        assert_eq!(to_snake_case("serialNumber"), "serial_number");
        assert_eq!(to_snake_case("isActive"), "is_active");
        assert_eq!(to_snake_case("id"), "id");
        assert_eq!(to_camel_case("last_updated_by"), "lastUpdatedBy");
        assert_eq!(to_camel_case("code"), "code");
        assert_eq!(to_camel_case(&to_snake_case("bookedUntil")), "bookedUntil");
    }

    #[test]
    fn only_top_level_keys_are_renamed() {
        let doc = snake_keys(json!({
            "firstName": "A",
            "entries": [{ "accountId": 1 }]
        }));
        assert_eq!(doc["first_name"], "A");
        assert!(doc["entries"][0].get("accountId").is_some());
    }
}
