use serde_json::Value;

/// Normalise a worker-provided JSON value into the text column the store keeps.
///
/// Strings are stored verbatim (no surrounding quotes), numbers and booleans in
/// their plain form, `null` as the empty string and anything structured as
/// compact JSON.
pub fn value_to_db_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars_are_stored_plainly() {
        assert_eq!(value_to_db_string(&json!("93.184.216.34")), "93.184.216.34");
        assert_eq!(value_to_db_string(&json!(42)), "42");
        assert_eq!(value_to_db_string(&json!(true)), "true");
        assert_eq!(value_to_db_string(&Value::Null), "");
    }

    #[test]
    fn structured_values_become_compact_json() {
        assert_eq!(
            value_to_db_string(&json!(["1.1.1.1", "8.8.8.8"])),
            r#"["1.1.1.1","8.8.8.8"]"#
        );
        assert_eq!(value_to_db_string(&json!({"a": 1})), r#"{"a":1}"#);
    }
}
