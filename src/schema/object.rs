//! Configuration object types

use super::property::PropertySpec;

/// Maximum length of a named object's name
pub const MAX_OBJECT_NAME_LEN: usize = 256;

/// One component of a composite key
#[derive(Debug, Clone)]
pub struct KeyPart {
    /// Property name carrying this component
    pub name: &'static str,

    /// Name reported when the component is missing
    pub label: &'static str,

    /// Maximum length in characters
    pub max_len: usize,

    /// Object type this component must name, if any
    pub references: Option<&'static str>,

    /// Component names an uploaded file consumed on create
    pub names_file: bool,
}

impl KeyPart {
    pub fn new(name: &'static str, max_len: usize) -> Self {
        Self {
            name,
            label: name,
            max_len,
            references: None,
            names_file: false,
        }
    }

    pub fn references(mut self, object_type: &'static str) -> Self {
        self.references = Some(object_type);
        self
    }

    pub fn uploaded_file(mut self) -> Self {
        self.names_file = true;
        self
    }

    pub fn labelled(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }
}

/// How instances of a type are identified
#[derive(Debug, Clone)]
pub enum KeyShape {
    /// Exactly one bare value, e.g. `"LicensedUsage": "Production"`
    Scalar,

    /// Exactly one property bag, e.g. `"AdminEndpoint": {...}`
    Singleton,

    /// Instances keyed by a name, e.g. `"Forwarder": {"m2w": {...}}`
    Named,

    /// Instances keyed by an ordered pair of properties
    Composite([KeyPart; 2]),
}

/// A configuration object type
#[derive(Debug, Clone)]
pub struct ObjectType {
    /// Declared type name
    pub name: &'static str,

    /// Key shape
    pub shape: KeyShape,

    /// Ordered property specifications; for `Scalar` the single spec
    /// describes the value itself
    pub properties: Vec<PropertySpec>,

    /// Accepts an `Overwrite` flag inside each object's property bag
    pub overwrite_guarded: bool,

    /// Survives a reset to factory configuration
    pub reset_excluded: bool,
}

impl ObjectType {
    pub fn new(name: &'static str, shape: KeyShape) -> Self {
        Self {
            name,
            shape,
            properties: Vec::new(),
            overwrite_guarded: false,
            reset_excluded: false,
        }
    }

    pub fn property(mut self, spec: PropertySpec) -> Self {
        self.properties.push(spec);
        self
    }

    pub fn overwrite_guarded(mut self) -> Self {
        self.overwrite_guarded = true;
        self
    }

    pub fn reset_excluded(mut self) -> Self {
        self.reset_excluded = true;
        self
    }

    /// Look up a property by exact name
    pub fn spec(&self, name: &str) -> Option<&PropertySpec> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Composite key parts, if this type has a composite key
    pub fn key_parts(&self) -> Option<&[KeyPart; 2]> {
        match &self.shape {
            KeyShape::Composite(parts) => Some(parts),
            _ => None,
        }
    }

    /// Singletons and scalars cannot be deleted
    pub fn is_deletable(&self) -> bool {
        matches!(self.shape, KeyShape::Named | KeyShape::Composite(_))
    }
}
