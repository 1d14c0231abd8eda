//! Property value checks
//!
//! Turns a non-null JSON value into the normalized value stored for a
//! property, or into the single error that rejects it.

use serde_json::Value;

use crate::schema::{PropertySpec, ValueKind};
use super::error::{ConfigError, ConfigResult};

/// Text used for a value inside an error message
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::String(s) => s.clone(),
        Value::Array(_) => "array".to_string(),
        Value::Object(_) => "object".to_string(),
        other => other.to_string(),
    }
}

/// Catalog name of a JSON value's type
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "JSON_NULL",
        Value::Bool(_) => "JSON_BOOLEAN",
        Value::Number(n) if n.is_f64() => "JSON_REAL",
        Value::Number(_) => "JSON_INTEGER",
        Value::String(_) => "JSON_STRING",
        Value::Array(_) => "JSON_ARRAY",
        Value::Object(_) => "JSON_OBJECT",
    }
}

/// Validate and normalize a non-null value for `spec` on type `object`
///
/// Values equal to the spec's unset sentinel are stored as `null`.
pub fn normalize(object: &str, spec: &PropertySpec, value: &Value) -> ConfigResult<Value> {
    let invalid = || ConfigError::invalid(spec.name, render_value(value));

    let normalized = match (&spec.kind, value) {
        (ValueKind::Boolean, Value::Bool(_)) => value.clone(),
        (ValueKind::Integer { min, max }, Value::Number(n)) => match n.as_i64() {
            Some(i) if (*min..=*max).contains(&i) => value.clone(),
            _ => return Err(invalid()),
        },
        (ValueKind::IntegerSet(allowed), Value::Number(n)) => match n.as_i64() {
            Some(i) if allowed.contains(&i) => value.clone(),
            _ => return Err(invalid()),
        },
        (ValueKind::Enum(allowed), Value::String(s)) if allowed.iter().any(|a| a == s) => value.clone(),
        (ValueKind::String { max_len }, Value::String(s)) => {
            check_length(object, spec.name, s, *max_len)?;
            value.clone()
        }
        (ValueKind::StringList { max_len, .. }, Value::String(s)) => {
            check_length(object, spec.name, s, *max_len)?;
            Value::Array(vec![value.clone()])
        }
        (ValueKind::StringList { max_items, max_len }, Value::Array(items)) => {
            if items.is_empty() || items.len() > *max_items {
                return Err(invalid());
            }
            for item in items {
                match item {
                    Value::String(s) => check_length(object, spec.name, s, *max_len)?,
                    _ => return Err(invalid()),
                }
            }
            value.clone()
        }
        _ => return Err(invalid()),
    };

    if spec.unset_value.as_ref() == Some(&normalized) {
        Ok(Value::Null)
    } else {
        Ok(normalized)
    }
}

fn check_length(object: &str, property: &str, value: &str, max_len: usize) -> ConfigResult<()> {
    if value.chars().count() > max_len {
        return Err(ConfigError::TooLong {
            object: object.to_string(),
            property: property.to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use crate::schema::PropertySpec;

    #[test]
    fn test_boolean_rejects_string_and_number() {
        let spec = PropertySpec::boolean("Enabled");
        assert_eq!(normalize("Forwarder", &spec, &json!(true)).unwrap(), json!(true));
        assert_eq!(
            normalize("Forwarder", &spec, &json!("true")).unwrap_err(),
            ConfigError::invalid("Enabled", "true")
        );
        assert_eq!(
            normalize("Forwarder", &spec, &json!(1)).unwrap_err(),
            ConfigError::invalid("Enabled", "1")
        );
    }

    #[test]
    fn test_string_rejects_boolean() {
        let spec = PropertySpec::string("Source", 1024);
        assert_eq!(
            normalize("Forwarder", &spec, &json!(true)).unwrap_err(),
            ConfigError::invalid("Source", "true")
        );
        assert_eq!(
            normalize("Forwarder", &spec, &json!(1883)).unwrap_err(),
            ConfigError::invalid("Source", "1883")
        );
    }

    #[test]
    fn test_too_long_string_is_distinct_error() {
        let spec = PropertySpec::string("Selector", 4);
        let err = normalize("Forwarder", &spec, &json!("abcde")).unwrap_err();
        assert_eq!(err.code(), "CWLNA0144");
    }

    #[test]
    fn test_integer_range() {
        let spec = PropertySpec::integer("Instances", 0, 99);
        assert_eq!(normalize("Forwarder", &spec, &json!(99)).unwrap(), json!(99));
        assert!(normalize("Forwarder", &spec, &json!(100)).is_err());
        assert!(normalize("Forwarder", &spec, &json!(-1)).is_err());
        assert!(normalize("Forwarder", &spec, &json!(1.5)).is_err());
        assert!(normalize("Forwarder", &spec, &json!("1")).is_err());
    }

    #[test]
    fn test_integer_set() {
        let spec = PropertySpec::integer_set("SourceQoS", &[0, 1, 2]);
        assert_eq!(normalize("Forwarder", &spec, &json!(2)).unwrap(), json!(2));
        assert_eq!(
            normalize("Forwarder", &spec, &json!(3)).unwrap_err(),
            ConfigError::invalid("SourceQoS", "3")
        );
        assert!(normalize("Forwarder", &spec, &json!(true)).is_err());
    }

    #[test]
    fn test_string_list_normalizes_scalar() {
        let spec = PropertySpec::string_list("Topic", 16, 1024);
        assert_eq!(normalize("Forwarder", &spec, &json!("a/b")).unwrap(), json!(["a/b"]));
        assert_eq!(normalize("Forwarder", &spec, &json!(["a", "b"])).unwrap(), json!(["a", "b"]));
    }

    #[test]
    fn test_string_list_bad_array_renders_as_array() {
        let spec = PropertySpec::string_list("Topic", 16, 1024);
        let seventeen: Vec<String> = (0..17).map(|i| format!("t/{}", i)).collect();
        assert_eq!(
            normalize("Forwarder", &spec, &json!(seventeen)).unwrap_err(),
            ConfigError::invalid("Topic", "array")
        );
        assert_eq!(
            normalize("Forwarder", &spec, &json!(["ok", 5])).unwrap_err(),
            ConfigError::invalid("Topic", "array")
        );
        assert_eq!(
            normalize("Forwarder", &spec, &json!([])).unwrap_err(),
            ConfigError::invalid("Topic", "array")
        );
    }

    #[test]
    fn test_string_rejects_array() {
        let spec = PropertySpec::string("TopicMap", 1024);
        assert_eq!(
            normalize("Forwarder", &spec, &json!(["x"])).unwrap_err(),
            ConfigError::invalid("TopicMap", "array")
        );
    }

    #[test]
    fn test_unset_sentinel_stored_as_null() {
        let spec = PropertySpec::integer("Instances", 0, 99).unset_at(json!(0));
        assert_eq!(normalize("Forwarder", &spec, &json!(0)).unwrap(), Value::Null);
        assert_eq!(normalize("Forwarder", &spec, &json!(5)).unwrap(), json!(5));
    }

    #[test]
    fn test_json_type_names() {
        assert_eq!(json_type_name(&json!({})), "JSON_OBJECT");
        assert_eq!(json_type_name(&Value::Null), "JSON_NULL");
        assert_eq!(json_type_name(&json!(3)), "JSON_INTEGER");
        assert_eq!(json_type_name(&json!(3.5)), "JSON_REAL");
    }
}
