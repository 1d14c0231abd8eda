//! Configuration document
//!
//! A `ConfigDocument` is the complete configuration state: one `ObjectSet`
//! per object type. It renders to the same JSON shape clients POST, so a
//! rendered document can be fed back through the validator unchanged.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::schema::{KeyShape, ObjectType, SchemaRegistry};
use crate::validate::{ConfigError, ConfigResult};

/// Property bag of one object instance
pub type Properties = Map<String, Value>;

/// Ordered two-part key, serialised as `first/second`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CompositeKey(pub String, pub String);

impl CompositeKey {
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self(first.into(), second.into())
    }

    pub fn first(&self) -> &str {
        &self.0
    }

    pub fn second(&self) -> &str {
        &self.1
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0, self.1)
    }
}

/// All instances of one object type
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectSet {
    Scalar(Value),
    Singleton(Properties),
    Named(BTreeMap<String, Properties>),
    Composite(BTreeMap<CompositeKey, Properties>),
}

/// Which properties a rendering includes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Client-facing: write-only properties are omitted
    Public,

    /// Persistence and export: everything
    Full,
}

/// The complete configuration state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigDocument {
    sets: BTreeMap<&'static str, ObjectSet>,
}

impl ConfigDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, object: &str) -> Option<&ObjectSet> {
        self.sets.get(object)
    }

    /// Replace every instance of a type
    pub fn put_set(&mut self, object: &'static str, set: ObjectSet) {
        self.sets.insert(object, set);
    }

    pub fn scalar(&self, object: &str) -> Option<&Value> {
        match self.sets.get(object) {
            Some(ObjectSet::Scalar(value)) => Some(value),
            _ => None,
        }
    }

    pub fn set_scalar(&mut self, object: &'static str, value: Value) {
        self.sets.insert(object, ObjectSet::Scalar(value));
    }

    pub fn singleton(&self, object: &str) -> Option<&Properties> {
        match self.sets.get(object) {
            Some(ObjectSet::Singleton(props)) => Some(props),
            _ => None,
        }
    }

    pub fn set_singleton(&mut self, object: &'static str, props: Properties) {
        self.sets.insert(object, ObjectSet::Singleton(props));
    }

    pub fn named(&self, object: &str, name: &str) -> Option<&Properties> {
        match self.sets.get(object) {
            Some(ObjectSet::Named(items)) => items.get(name),
            _ => None,
        }
    }

    pub fn named_all(&self, object: &str) -> impl Iterator<Item = (&String, &Properties)> {
        let items = match self.sets.get(object) {
            Some(ObjectSet::Named(items)) => Some(items),
            _ => None,
        };
        items.into_iter().flat_map(|m| m.iter())
    }

    pub fn has_named(&self, object: &str, name: &str) -> bool {
        self.named(object, name).is_some()
    }

    pub fn insert_named(&mut self, object: &'static str, name: String, props: Properties) {
        match self.sets.entry(object).or_insert_with(|| ObjectSet::Named(BTreeMap::new())) {
            ObjectSet::Named(items) => {
                items.insert(name, props);
            }
            other => {
                let mut items = BTreeMap::new();
                items.insert(name, props);
                *other = ObjectSet::Named(items);
            }
        }
    }

    pub fn remove_named(&mut self, object: &str, name: &str) -> Option<Properties> {
        match self.sets.get_mut(object) {
            Some(ObjectSet::Named(items)) => items.remove(name),
            _ => None,
        }
    }

    pub fn composite(&self, object: &str, key: &CompositeKey) -> Option<&Properties> {
        match self.sets.get(object) {
            Some(ObjectSet::Composite(items)) => items.get(key),
            _ => None,
        }
    }

    pub fn composite_keys(&self, object: &str) -> Vec<CompositeKey> {
        match self.sets.get(object) {
            Some(ObjectSet::Composite(items)) => items.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    pub fn insert_composite(&mut self, object: &'static str, key: CompositeKey, props: Properties) {
        match self.sets.entry(object).or_insert_with(|| ObjectSet::Composite(BTreeMap::new())) {
            ObjectSet::Composite(items) => {
                items.insert(key, props);
            }
            other => {
                let mut items = BTreeMap::new();
                items.insert(key, props);
                *other = ObjectSet::Composite(items);
            }
        }
    }

    pub fn remove_composite(&mut self, object: &str, key: &CompositeKey) -> Option<Properties> {
        match self.sets.get_mut(object) {
            Some(ObjectSet::Composite(items)) => items.remove(key),
            _ => None,
        }
    }

    /// Render every type known to the registry, keyed by type name
    pub fn to_json(&self, registry: &SchemaRegistry, view: View) -> Value {
        let mut out = Map::new();
        for ty in registry.types() {
            if let Some(value) = self.render_type(ty, view) {
                out.insert(ty.name.to_string(), value);
            }
        }
        Value::Object(out)
    }

    /// Render all instances of one type; `None` when a scalar or singleton is unset
    pub fn render_type(&self, ty: &ObjectType, view: View) -> Option<Value> {
        match &ty.shape {
            KeyShape::Scalar => self.scalar(ty.name).cloned(),
            KeyShape::Singleton => self
                .singleton(ty.name)
                .map(|props| Value::Object(visible(ty, props, view))),
            KeyShape::Named => {
                let mut items = Map::new();
                for (name, props) in self.named_all(ty.name) {
                    items.insert(name.clone(), Value::Object(visible(ty, props, view)));
                }
                Some(Value::Object(items))
            }
            KeyShape::Composite(_) => {
                let items = self
                    .composite_keys(ty.name)
                    .into_iter()
                    .filter_map(|key| self.render_composite(ty, &key, view))
                    .collect();
                Some(Value::Array(items))
            }
        }
    }

    /// Render a single composite instance with its key properties inlined
    pub fn render_composite(&self, ty: &ObjectType, key: &CompositeKey, view: View) -> Option<Value> {
        let parts = ty.key_parts()?;
        let props = self.composite(ty.name, key)?;
        let mut out = Map::new();
        out.insert(parts[0].name.to_string(), Value::String(key.first().to_string()));
        out.insert(parts[1].name.to_string(), Value::String(key.second().to_string()));
        out.extend(visible(ty, props, view));
        Some(Value::Object(out))
    }

    /// Resolve a read addressed by URI segments below the type
    pub fn select(&self, ty: &ObjectType, segments: &[&str], view: View) -> ConfigResult<Value> {
        let mut out = Map::new();
        match (&ty.shape, segments) {
            (KeyShape::Scalar | KeyShape::Singleton | KeyShape::Named | KeyShape::Composite(_), []) => {
                let value = self
                    .render_type(ty, view)
                    .ok_or_else(|| ConfigError::HttpNotFound { path: ty.name.to_string() })?;
                out.insert(ty.name.to_string(), value);
            }
            (KeyShape::Named, [name]) => {
                let props = self.named(ty.name, name).ok_or_else(|| ConfigError::HttpNotFound {
                    path: format!("{}/{}", ty.name, name),
                })?;
                let mut item = Map::new();
                item.insert(name.to_string(), Value::Object(visible(ty, props, view)));
                out.insert(ty.name.to_string(), Value::Object(item));
            }
            (KeyShape::Composite(_), [first]) => {
                let items: Vec<Value> = self
                    .composite_keys(ty.name)
                    .into_iter()
                    .filter(|key| key.first() == *first)
                    .filter_map(|key| self.render_composite(ty, &key, view))
                    .collect();
                if items.is_empty() {
                    return Err(ConfigError::not_found(ty.name, *first));
                }
                out.insert(ty.name.to_string(), Value::Array(items));
            }
            (KeyShape::Composite(_), [first, second]) => {
                let key = CompositeKey::new(*first, *second);
                let item = self
                    .render_composite(ty, &key, view)
                    .ok_or_else(|| ConfigError::not_found(ty.name, key.to_string()))?;
                out.insert(ty.name.to_string(), Value::Array(vec![item]));
            }
            _ => {
                return Err(ConfigError::bad_call(format!("{}/{}", ty.name, segments.join("/"))));
            }
        }
        Ok(Value::Object(out))
    }
}

/// Drop write-only properties for public views
fn visible(ty: &ObjectType, props: &Properties, view: View) -> Properties {
    props
        .iter()
        .filter(|(name, _)| {
            view == View::Full
                || !ty.spec(name).map(|spec| spec.write_only).unwrap_or(false)
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use crate::schema::SchemaRegistry;

    fn props(value: Value) -> Properties {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_composite_key_display() {
        let key = CompositeKey::new("TestSecProf", "TestCACertKey");
        assert_eq!(key.to_string(), "TestSecProf/TestCACertKey");
        assert_eq!(key.first(), "TestSecProf");
        assert_eq!(key.second(), "TestCACertKey");
    }

    #[test]
    fn test_render_composite_inlines_key() {
        let registry = SchemaRegistry::standard();
        let ty = registry.get("ClientCertificate").unwrap();
        let mut doc = ConfigDocument::new();
        doc.insert_composite("ClientCertificate", CompositeKey::new("SP", "cert.pem"), Properties::new());

        let rendered = doc.render_type(ty, View::Public).unwrap();
        assert_eq!(
            rendered,
            json!([{"SecurityProfileName": "SP", "CertificateName": "cert.pem"}])
        );
    }

    #[test]
    fn test_write_only_hidden_in_public_view() {
        let registry = SchemaRegistry::standard();
        let ty = registry.get("Connection").unwrap();
        let mut doc = ConfigDocument::new();
        doc.insert_named(
            "Connection",
            "c1".to_string(),
            props(json!({"MQTTServerList": ["h:1883"], "Password": "secret"})),
        );

        let public = doc.select(ty, &["c1"], View::Public).unwrap();
        assert_eq!(public, json!({"Connection": {"c1": {"MQTTServerList": ["h:1883"]}}}));

        let full = doc.render_type(ty, View::Full).unwrap();
        assert_eq!(full["c1"]["Password"], json!("secret"));
    }

    #[test]
    fn test_select_missing_named_is_http_not_found() {
        let registry = SchemaRegistry::standard();
        let ty = registry.get("Forwarder").unwrap();
        let doc = ConfigDocument::new();

        let err = doc.select(ty, &["NoBoolean"], View::Public).unwrap_err();
        assert_eq!(err, ConfigError::HttpNotFound { path: "Forwarder/NoBoolean".to_string() });
    }

    #[test]
    fn test_select_composite_by_partial_and_full_key() {
        let registry = SchemaRegistry::standard();
        let ty = registry.get("TrustedCertificate").unwrap();
        let mut doc = ConfigDocument::new();
        doc.insert_composite("TrustedCertificate", CompositeKey::new("A", "one.pem"), Properties::new());
        doc.insert_composite("TrustedCertificate", CompositeKey::new("A", "two.pem"), Properties::new());
        doc.insert_composite("TrustedCertificate", CompositeKey::new("B", "one.pem"), Properties::new());

        let partial = doc.select(ty, &["A"], View::Public).unwrap();
        assert_eq!(partial["TrustedCertificate"].as_array().unwrap().len(), 2);

        let missing = doc.select(ty, &["B", "two.pem"], View::Public).unwrap_err();
        assert_eq!(missing, ConfigError::not_found("TrustedCertificate", "B/two.pem"));

        let unknown = doc.select(ty, &["C"], View::Public).unwrap_err();
        assert_eq!(unknown, ConfigError::not_found("TrustedCertificate", "C"));
    }

    #[test]
    fn test_select_too_many_segments() {
        let registry = SchemaRegistry::standard();
        let ty = registry.get("Forwarder").unwrap();
        let doc = ConfigDocument::new();
        let err = doc.select(ty, &["a", "b"], View::Public).unwrap_err();
        assert_eq!(err.code(), "CWLNA0137");
    }
}
