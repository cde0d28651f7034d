use serde_json::{Map, Value as JsonValue};

/// Expands dotted object keys into nested objects, recursively.
///
/// `{"customer.name": "Ada"}` becomes `{"customer": {"name": "Ada"}}`. Numeric segments
/// stay object keys; repeatable collections accept objects keyed by index.
pub(super) fn expand_dotted_keys(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(map) => {
            let mut expanded = Map::new();
            for (key, nested) in map {
                let nested = expand_dotted_keys(nested);
                let mut segments = key.split('.').filter(|segment| !segment.is_empty());
                let Some(first) = segments.next() else {
                    continue;
                };
                let rest = segments.collect::<Vec<_>>();
                let wrapped = rest.iter().rev().fold(nested, |inner, segment| {
                    let mut wrapper = Map::new();
                    wrapper.insert(segment.to_string(), inner);
                    JsonValue::Object(wrapper)
                });
                merge_into(&mut expanded, first, wrapped);
            }
            JsonValue::Object(expanded)
        }
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(expand_dotted_keys).collect()),
        other => other.clone(),
    }
}

fn merge_into(target: &mut Map<String, JsonValue>, key: &str, value: JsonValue) {
    if let JsonValue::Object(incoming) = &value
        && let Some(JsonValue::Object(existing)) = target.get_mut(key)
    {
        for (nested_key, nested_value) in incoming {
            merge_into(existing, nested_key, nested_value.clone());
        }
        return;
    }
    target.insert(key.to_string(), value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dotted_keys_become_nested_objects() {
        let expanded = expand_dotted_keys(&json!({
            "customer.name": "John Doe",
            "customer.address": "123, Lye Street",
            "no_customer": false
        }));
        assert_eq!(
            expanded,
            json!({"customer": {"name": "John Doe", "address": "123, Lye Street"}, "no_customer": false})
        );
    }

    #[test]
    fn nested_and_dotted_keys_merge() {
        let expanded = expand_dotted_keys(&json!({
            "contact": {"first_name": "Ada"},
            "contact.last_name": "Lovelace",
            "orders": [{"coffee.nickname": "Flat white"}]
        }));
        assert_eq!(
            expanded,
            json!({
                "contact": {"first_name": "Ada", "last_name": "Lovelace"},
                "orders": [{"coffee": {"nickname": "Flat white"}}]
            })
        );
    }
}
