use serde_json::Value;

/// Deep-merge `overrides` onto `defaults`.
///
/// Objects merge key by key, recursively. Every other value, arrays
/// included, replaces the default wholesale. Neither input is modified.
pub fn merge(defaults: &Value, overrides: &Value) -> Value {
    match (defaults, overrides) {
        (Value::Object(base), Value::Object(over)) => {
            let mut merged = base.clone();
            for (key, value) in over {
                let next = match base.get(key) {
                    Some(existing) => merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        (_, over) => over.clone(),
    }
}
