//! Validator
//!
//! The validator applies a client request to a working copy of the
//! configuration document. It either succeeds, leaving the working copy in
//! its new state and describing what changed, or fails with exactly one
//! `ConfigError`. The caller decides whether the working copy is committed,
//! so a failure never leaves partial state behind.
//!
//! Types inside one request are applied in registry order rather than body
//! order, which makes the chosen error deterministic and lets a request
//! create an object and something that references it together.

pub mod error;
pub mod value;

use serde::Serialize;
use serde_json::{Map, Value};
use log::debug;

use crate::schema::{KeyPart, KeyShape, NullPolicy, ObjectType, PropertySpec, SchemaRegistry, MAX_OBJECT_NAME_LEN};
use crate::store::document::{CompositeKey, ConfigDocument, Properties};
use crate::store::files::is_valid_file_name;

pub use error::{ConfigError, ConfigResult};
pub use value::{json_type_name, normalize, render_value};

/// Request-level flag accepted inside a guarded object's property bag
pub const OVERWRITE: &str = "Overwrite";

/// Lookup of uploaded files
pub trait FileCatalog {
    /// Whether `name` has been uploaded and not yet consumed
    fn has_file(&self, name: &str) -> bool;
}

/// Knobs for one validation pass
#[derive(Debug, Clone, Copy)]
pub struct ApplyOptions {
    /// Require uploaded files for file-backed properties
    pub check_files: bool,

    /// Treat every keyed object as if `Overwrite:true` were set
    pub implicit_overwrite: bool,

    /// Store `null` for optional properties as-is instead of applying the
    /// null policy; a rendered document carries cleared values as `null`
    pub literal_nulls: bool,
}

impl ApplyOptions {
    /// Options for client requests
    pub fn request() -> Self {
        Self {
            check_files: true,
            implicit_overwrite: false,
            literal_nulls: false,
        }
    }

    /// Options for documents rebuilt from persistence, defaults or import
    pub fn rebuild() -> Self {
        Self {
            check_files: false,
            implicit_overwrite: true,
            literal_nulls: true,
        }
    }
}

/// Which instance of a type a change touched
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Target {
    Whole,
    Name(String),
    Key(CompositeKey),
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Whole => Ok(()),
            Target::Name(name) => write!(f, "{}", name),
            Target::Key(key) => write!(f, "{}", key),
        }
    }
}

/// Kind of change applied to an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChangeKind {
    Created,
    Updated,
    Replaced,
    Deleted,
}

/// One applied change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Change {
    pub object: &'static str,
    pub target: Target,
    pub kind: ChangeKind,
}

/// An uploaded file consumed by a created or replaced object
///
/// `owner` is the instance the file is installed under: the object name for
/// named types, the first key component for composite ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileClaim {
    pub object: &'static str,
    pub owner: String,
    pub file: String,
}

/// Everything a successful pass changed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    pub changes: Vec<Change>,
    pub claims: Vec<FileClaim>,
}

impl Outcome {
    fn record(&mut self, object: &'static str, target: Target, kind: ChangeKind) {
        self.changes.push(Change { object, target, kind });
    }
}

/// Applies requests to a working document
pub struct Validator<'a> {
    registry: &'a SchemaRegistry,
    files: &'a dyn FileCatalog,
    options: ApplyOptions,
}

impl<'a> Validator<'a> {
    pub fn new(registry: &'a SchemaRegistry, files: &'a dyn FileCatalog, options: ApplyOptions) -> Self {
        Self { registry, files, options }
    }

    /// Apply a POST body of the form `{"<Type>": ...}`
    pub fn apply_post(&self, doc: &mut ConfigDocument, body: &Value) -> ConfigResult<Outcome> {
        let map = match body {
            Value::Object(map) => map,
            Value::Null => return Err(ConfigError::NullObject),
            other => return Err(ConfigError::bad_call(other.to_string())),
        };

        let mut entries: Vec<(&ObjectType, &Value)> = Vec::new();
        for (key, value) in map {
            if key == "Version" {
                continue;
            }
            match self.registry.get(key) {
                Some(ty) => entries.push((ty, value)),
                None if key == OVERWRITE => {
                    return Err(ConfigError::UnknownProperty { property: key.clone() });
                }
                None => return Err(ConfigError::HttpNotFound { path: key.clone() }),
            }
        }
        if entries.is_empty() {
            return Err(ConfigError::bad_call(body.to_string()));
        }
        entries.sort_by_key(|(ty, _)| self.registry.rank(ty.name));

        let mut outcome = Outcome::default();
        for (ty, value) in entries {
            self.apply_type(doc, ty, value, &mut outcome)?;
        }
        Ok(outcome)
    }

    /// Apply a DELETE addressed by the URI segments after the type
    pub fn apply_delete(&self, doc: &mut ConfigDocument, ty: &ObjectType, segments: &[&str]) -> ConfigResult<Outcome> {
        let mut outcome = Outcome::default();
        match (&ty.shape, segments) {
            _ if !ty.is_deletable() => {
                return Err(ConfigError::DeleteNotAllowed { object: ty.name.to_string() });
            }
            (KeyShape::Named, []) => {
                return Err(ConfigError::RequiredMissing {
                    property: "Name".to_string(),
                    value: "null".to_string(),
                });
            }
            (KeyShape::Named, [name]) => self.delete_named(doc, ty, name, &mut outcome)?,
            (KeyShape::Composite(parts), [] | [_]) => {
                return Err(ConfigError::MissingKeySegments {
                    first: parts[0].name.to_string(),
                    second: parts[1].name.to_string(),
                });
            }
            (KeyShape::Composite(_), [first, second]) => {
                let key = CompositeKey::new(*first, *second);
                self.delete_composite(doc, ty, &key, &mut outcome)?;
            }
            _ => {
                return Err(ConfigError::bad_call(format!("{}/{}", ty.name, segments.join("/"))));
            }
        }
        Ok(outcome)
    }

    fn apply_type(&self, doc: &mut ConfigDocument, ty: &ObjectType, value: &Value, out: &mut Outcome) -> ConfigResult<()> {
        match &ty.shape {
            KeyShape::Scalar => self.apply_scalar(doc, ty, value, out),
            KeyShape::Singleton => match value {
                Value::Object(bag) => self.apply_singleton(doc, ty, bag, out),
                other => Err(bad_member(ty.name, other)),
            },
            KeyShape::Named => match value {
                Value::Object(items) => {
                    for (name, item) in items {
                        self.apply_named(doc, ty, name, item, out)?;
                    }
                    Ok(())
                }
                other => Err(bad_member(ty.name, other)),
            },
            KeyShape::Composite(parts) => match value {
                Value::Array(items) => {
                    for item in items {
                        self.apply_composite(doc, ty, parts, item, out)?;
                    }
                    Ok(())
                }
                other => Err(bad_member(ty.name, other)),
            },
        }
    }

    fn apply_scalar(&self, doc: &mut ConfigDocument, ty: &ObjectType, value: &Value, out: &mut Outcome) -> ConfigResult<()> {
        let spec = ty
            .properties
            .first()
            .ok_or_else(|| ConfigError::System(format!("{} has no value specification", ty.name)))?;
        let current = doc.scalar(ty.name).cloned();
        let new_value = if value.is_null() {
            match null_action(spec)? {
                Some(v) => v,
                None => match current.clone().or_else(|| spec.default.clone()) {
                    Some(v) => v,
                    None => return Ok(()),
                },
            }
        } else {
            normalize(ty.name, spec, value)?
        };

        let kind = if current.is_some() { ChangeKind::Updated } else { ChangeKind::Created };
        doc.set_scalar(ty.name, new_value);
        out.record(ty.name, Target::Whole, kind);
        Ok(())
    }

    fn apply_singleton(&self, doc: &mut ConfigDocument, ty: &ObjectType, bag: &Map<String, Value>, out: &mut Outcome) -> ConfigResult<()> {
        let existing = doc.singleton(ty.name).cloned();
        let (_, merged) = self.merge(doc, ty, existing.as_ref(), bag, false)?;
        let kind = if existing.is_some() { ChangeKind::Updated } else { ChangeKind::Created };
        doc.set_singleton(ty.name, merged);
        out.record(ty.name, Target::Whole, kind);
        Ok(())
    }

    fn apply_named(&self, doc: &mut ConfigDocument, ty: &ObjectType, name: &str, item: &Value, out: &mut Outcome) -> ConfigResult<()> {
        if name.chars().count() > MAX_OBJECT_NAME_LEN {
            return Err(ConfigError::NameTooLong {
                object: ty.name.to_string(),
                property: "Name".to_string(),
                value: name.to_string(),
            });
        }
        if name.is_empty() {
            return Err(ConfigError::RequiredMissing {
                property: "Name".to_string(),
                value: "null".to_string(),
            });
        }

        let bag = match item {
            Value::Null => return self.delete_named(doc, ty, name, out),
            Value::Object(bag) => bag,
            other => return Err(bad_member(name, other)),
        };

        let existing = doc.named(ty.name, name).cloned();
        let (overwrite, merged) = self.merge(doc, ty, existing.as_ref(), bag, false)?;

        if let Some(previous) = existing.as_ref() {
            let replaces_files = ty
                .properties
                .iter()
                .filter(|spec| spec.file_ref)
                .any(|spec| bag.contains_key(spec.name) && previous.get(spec.name) != merged.get(spec.name));
            if ty.overwrite_guarded && replaces_files && !overwrite {
                return Err(ConfigError::AlreadyExists);
            }
        }

        for spec in ty.properties.iter().filter(|spec| spec.file_ref) {
            let Some(Value::String(file)) = merged.get(spec.name) else { continue };
            let changed = existing
                .as_ref()
                .map(|previous| previous.get(spec.name) != merged.get(spec.name))
                .unwrap_or(true);
            if changed || (overwrite && bag.contains_key(spec.name)) {
                self.claim_file(ty, name, file, out)?;
            }
        }

        let kind = if existing.is_some() { ChangeKind::Updated } else { ChangeKind::Created };
        doc.insert_named(ty.name, name.to_string(), merged);
        out.record(ty.name, Target::Name(name.to_string()), kind);
        Ok(())
    }

    fn apply_composite(&self, doc: &mut ConfigDocument, ty: &ObjectType, parts: &[KeyPart; 2], item: &Value, out: &mut Outcome) -> ConfigResult<()> {
        let bag = match item {
            Value::Object(bag) => bag,
            other => return Err(bad_member(ty.name, other)),
        };

        let first = key_component(ty, &parts[0], bag)?;
        let second = key_component(ty, &parts[1], bag)?;
        for (part, value) in parts.iter().zip([&first, &second]) {
            if let Some(target) = part.references {
                if !doc.has_named(target, value) {
                    return Err(ConfigError::not_found(part.name, value.as_str()));
                }
            }
        }

        let rest: Map<String, Value> = bag
            .iter()
            .filter(|(k, _)| k.as_str() != parts[0].name && k.as_str() != parts[1].name)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let (overwrite, props) = self.merge(doc, ty, None, &rest, true)?;

        let key = CompositeKey::new(first, second);
        let exists = doc.composite(ty.name, &key).is_some();
        if exists && !overwrite && !self.options.implicit_overwrite {
            return Err(ConfigError::AlreadyExists);
        }

        for (part, value) in parts.iter().zip([key.first(), key.second()]) {
            if part.names_file {
                self.claim_file(ty, key.first(), value, out)?;
            }
        }

        let kind = if exists { ChangeKind::Replaced } else { ChangeKind::Created };
        doc.insert_composite(ty.name, key.clone(), props);
        out.record(ty.name, Target::Key(key), kind);
        Ok(())
    }

    /// Merge a request bag over existing properties
    ///
    /// Returns the `Overwrite` flag and the resulting properties. When
    /// `replace` is set, or nothing exists yet, creation defaults are filled
    /// in; required properties are checked last so type errors win.
    fn merge(
        &self,
        doc: &ConfigDocument,
        ty: &ObjectType,
        existing: Option<&Properties>,
        bag: &Map<String, Value>,
        replace: bool,
    ) -> ConfigResult<(bool, Properties)> {
        let mut overwrite = false;
        let mut result = match (replace, existing) {
            (false, Some(props)) => props.clone(),
            _ => Properties::new(),
        };

        for (key, value) in bag {
            if key == OVERWRITE {
                if !ty.overwrite_guarded {
                    return Err(ConfigError::UnknownProperty { property: key.clone() });
                }
                overwrite = match value {
                    Value::Bool(flag) => *flag,
                    other => return Err(ConfigError::invalid(OVERWRITE, render_value(other))),
                };
                continue;
            }

            let spec = ty
                .spec(key)
                .ok_or_else(|| ConfigError::UnknownProperty { property: key.clone() })?;

            if value.is_null() {
                if self.options.literal_nulls && !spec.required {
                    result.insert(key.clone(), Value::Null);
                } else if let Some(v) = null_action(spec)? {
                    result.insert(key.clone(), v);
                }
                continue;
            }

            let normalized = normalize(ty.name, spec, value)?;
            check_reference(doc, spec, &normalized)?;
            result.insert(key.clone(), normalized);
        }

        if replace || existing.is_none() {
            for spec in &ty.properties {
                if let Some(default) = &spec.default {
                    if !result.contains_key(spec.name) {
                        result.insert(spec.name.to_string(), default.clone());
                    }
                }
            }
        }

        for spec in ty.properties.iter().filter(|spec| spec.required) {
            if result.get(spec.name).map(Value::is_null).unwrap_or(true) {
                return Err(ConfigError::RequiredMissing {
                    property: spec.name.to_string(),
                    value: "null".to_string(),
                });
            }
        }

        Ok((overwrite, result))
    }

    fn claim_file(&self, ty: &ObjectType, owner: &str, file: &str, out: &mut Outcome) -> ConfigResult<()> {
        if self.options.check_files {
            if !self.files.has_file(file) {
                return Err(ConfigError::not_found(ty.name, file));
            }
            if !is_valid_file_name(owner) {
                return Err(ConfigError::invalid("Name", owner));
            }
            out.claims.push(FileClaim {
                object: ty.name,
                owner: owner.to_string(),
                file: file.to_string(),
            });
        }
        Ok(())
    }

    fn delete_named(&self, doc: &mut ConfigDocument, ty: &ObjectType, name: &str, out: &mut Outcome) -> ConfigResult<()> {
        if !doc.has_named(ty.name, name) {
            return Err(ConfigError::HttpNotFound {
                path: format!("{}/{}", ty.name, name),
            });
        }

        for (referrer, property) in self.registry.referrers(ty.name) {
            let Some(referrer_ty) = self.registry.get(referrer) else { continue };
            match referrer_ty.key_parts() {
                Some(parts) => {
                    let index = if parts[0].name == property { 0 } else { 1 };
                    for key in doc.composite_keys(referrer) {
                        let component = if index == 0 { key.first() } else { key.second() };
                        if component == name {
                            doc.remove_composite(referrer, &key);
                            debug!("Cascade delete {}/{} with {}/{}", referrer, key, ty.name, name);
                            out.record(referrer_ty.name, Target::Key(key), ChangeKind::Deleted);
                        }
                    }
                }
                None => {
                    let user = doc
                        .named_all(referrer)
                        .find(|(_, props)| props.get(property).and_then(Value::as_str) == Some(name))
                        .map(|(user_name, _)| user_name.clone());
                    if let Some(user_name) = user {
                        return Err(ConfigError::InUse {
                            object: ty.name.to_string(),
                            name: name.to_string(),
                            used_by: referrer.to_string(),
                            used_by_name: user_name,
                        });
                    }
                }
            }
        }

        doc.remove_named(ty.name, name);
        out.record(ty.name, Target::Name(name.to_string()), ChangeKind::Deleted);
        Ok(())
    }

    fn delete_composite(&self, doc: &mut ConfigDocument, ty: &ObjectType, key: &CompositeKey, out: &mut Outcome) -> ConfigResult<()> {
        if doc.remove_composite(ty.name, key).is_none() {
            return Err(ConfigError::not_found(ty.name, key.to_string()));
        }
        out.record(ty.name, Target::Key(key.clone()), ChangeKind::Deleted);
        Ok(())
    }
}

struct NoFiles;

impl FileCatalog for NoFiles {
    fn has_file(&self, _name: &str) -> bool {
        false
    }
}

/// Rebuild a document from a full rendering
///
/// Used for factory defaults, persisted state and imported configuration.
pub fn build_document(registry: &SchemaRegistry, body: &Value) -> ConfigResult<ConfigDocument> {
    let mut doc = ConfigDocument::new();
    Validator::new(registry, &NoFiles, ApplyOptions::rebuild()).apply_post(&mut doc, body)?;
    debug!("Rebuilt configuration document");
    Ok(doc)
}

/// Resolve a property's null policy
///
/// `Ok(None)` leaves the current value untouched.
fn null_action(spec: &PropertySpec) -> ConfigResult<Option<Value>> {
    match &spec.on_null {
        NullPolicy::RejectNull => Err(ConfigError::invalid(spec.name, "null")),
        NullPolicy::ResetTo(value) => Ok(Some(value.clone())),
        NullPolicy::NoOpOnNull => Ok(None),
        NullPolicy::ClearToEmpty => Ok(Some(Value::Null)),
    }
}

fn check_reference(doc: &ConfigDocument, spec: &PropertySpec, value: &Value) -> ConfigResult<()> {
    if let (Some(target), Value::String(name)) = (spec.references, value) {
        if !doc.has_named(target, name) {
            return Err(ConfigError::not_found(target, name.as_str()));
        }
    }
    Ok(())
}

/// Extract one composite key component from a request bag
fn key_component(ty: &ObjectType, part: &KeyPart, bag: &Map<String, Value>) -> ConfigResult<String> {
    match bag.get(part.name) {
        None => Err(ConfigError::RequiredMissing {
            property: part.label.to_string(),
            value: "null".to_string(),
        }),
        Some(Value::String(s)) if s.is_empty() => Err(ConfigError::RequiredMissing {
            property: part.label.to_string(),
            value: "null".to_string(),
        }),
        Some(Value::String(s)) if s.chars().count() > part.max_len => {
            if part.references.is_some() {
                Err(ConfigError::not_found(part.name, s.as_str()))
            } else {
                Err(ConfigError::TooLong {
                    object: ty.name.to_string(),
                    property: part.name.to_string(),
                    value: s.clone(),
                })
            }
        }
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(ConfigError::WrongType {
            object: ty.name.to_string(),
            name: "null".to_string(),
            property: part.name.to_string(),
            json_type: json_type_name(other),
        }),
    }
}

fn bad_member(name: &str, value: &Value) -> ConfigError {
    ConfigError::bad_call(format!("\"{}\":{}", name, value))
}
