//! Property specifications
//!
//! A `PropertySpec` describes one property of a configuration object type:
//! its value kind, default, what happens when a client sends `null`, and a
//! handful of flags that the validator and the renderer consult.

use serde_json::Value;

/// Declared value kind of a property
#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    /// JSON boolean
    Boolean,

    /// Integer in an inclusive range
    Integer { min: i64, max: i64 },

    /// Integer from a fixed set of allowed values
    IntegerSet(&'static [i64]),

    /// String from a fixed set of allowed values
    Enum(&'static [&'static str]),

    /// String with a maximum length in characters
    String { max_len: usize },

    /// String or array of strings, stored as an array
    StringList { max_items: usize, max_len: usize },
}

/// What to do when a client sends `null` for a property
#[derive(Debug, Clone, PartialEq)]
pub enum NullPolicy {
    /// `null` is an invalid value
    RejectNull,

    /// `null` stores the given value
    ResetTo(Value),

    /// `null` leaves the current value in place
    NoOpOnNull,

    /// `null` clears the property; it reads back as `null`
    ClearToEmpty,
}

/// Specification of a single property
#[derive(Debug, Clone)]
pub struct PropertySpec {
    /// Property name as it appears on the wire
    pub name: &'static str,

    /// Declared value kind
    pub kind: ValueKind,

    /// Must be present once the object exists
    pub required: bool,

    /// Value filled in when an object is created without this property
    pub default: Option<Value>,

    /// Behaviour on `null`
    pub on_null: NullPolicy,

    /// A valid value that is stored as `null` (the "unset" sentinel)
    pub unset_value: Option<Value>,

    /// Never returned by GET
    pub write_only: bool,

    /// Names a file that must have been uploaded first
    pub file_ref: bool,

    /// Names an object of another type that must exist
    pub references: Option<&'static str>,
}

impl PropertySpec {
    fn new(name: &'static str, kind: ValueKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: None,
            on_null: NullPolicy::ClearToEmpty,
            unset_value: None,
            write_only: false,
            file_ref: false,
            references: None,
        }
    }

    pub fn boolean(name: &'static str) -> Self {
        Self::new(name, ValueKind::Boolean)
    }

    pub fn integer(name: &'static str, min: i64, max: i64) -> Self {
        Self::new(name, ValueKind::Integer { min, max })
    }

    pub fn integer_set(name: &'static str, allowed: &'static [i64]) -> Self {
        Self::new(name, ValueKind::IntegerSet(allowed))
    }

    pub fn one_of(name: &'static str, allowed: &'static [&'static str]) -> Self {
        Self::new(name, ValueKind::Enum(allowed))
    }

    pub fn string(name: &'static str, max_len: usize) -> Self {
        Self::new(name, ValueKind::String { max_len })
    }

    pub fn string_list(name: &'static str, max_items: usize, max_len: usize) -> Self {
        Self::new(name, ValueKind::StringList { max_items, max_len })
    }

    /// Required with no default; `null` is rejected
    pub fn required(mut self) -> Self {
        self.required = true;
        self.on_null = NullPolicy::RejectNull;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn on_null(mut self, policy: NullPolicy) -> Self {
        self.on_null = policy;
        self
    }

    pub fn unset_at(mut self, value: Value) -> Self {
        self.unset_value = Some(value);
        self
    }

    pub fn write_only(mut self) -> Self {
        self.write_only = true;
        self
    }

    pub fn uploaded_file(mut self) -> Self {
        self.file_ref = true;
        self
    }

    pub fn references(mut self, object_type: &'static str) -> Self {
        self.references = Some(object_type);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_required_rejects_null() {
        let spec = PropertySpec::string("Source", 1024).required();
        assert!(spec.required);
        assert_eq!(spec.on_null, NullPolicy::RejectNull);
    }

    #[test]
    fn test_optional_defaults_to_clear() {
        let spec = PropertySpec::string("Selector", 1024);
        assert!(!spec.required);
        assert_eq!(spec.on_null, NullPolicy::ClearToEmpty);
        assert!(spec.default.is_none());
    }

    #[test]
    fn test_builder_chain() {
        let spec = PropertySpec::integer("Instances", 0, 99)
            .on_null(NullPolicy::ResetTo(json!(99)))
            .unset_at(json!(0));
        assert_eq!(spec.kind, ValueKind::Integer { min: 0, max: 99 });
        assert_eq!(spec.on_null, NullPolicy::ResetTo(json!(99)));
        assert_eq!(spec.unset_value, Some(json!(0)));
    }
}
