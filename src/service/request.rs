//! Service request payloads
//!
//! Service payloads are small and validated strictly: unknown fields,
//! wrong JSON types, missing fields and bad values each map to their own
//! error code.

use serde_json::{Map, Value};

use crate::validate::{json_type_name, ConfigError, ConfigResult};
use super::lifecycle::RestartMode;

/// `POST service/restart`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartRequest {
    pub mode: RestartMode,
}

impl RestartRequest {
    pub fn parse(body: &Value) -> ConfigResult<Self> {
        let fields = Fields::new("restart", body, &["Service", "Maintenance", "Reset"])?;

        let service = fields.required_string("Service")?;
        if service != "Server" {
            return Err(ConfigError::invalid("Service", service));
        }

        let maintenance = fields.optional_string("Maintenance")?;
        let reset = fields.optional_string("Reset")?;
        let mode = match (maintenance.as_deref(), reset.as_deref()) {
            (Some(_), Some(_)) => return Err(ConfigError::PropertiesNotValid),
            (Some("start"), None) => RestartMode::EnterMaintenance,
            (Some("stop"), None) => RestartMode::LeaveMaintenance,
            (Some(other), None) => return Err(ConfigError::invalid("Maintenance", other)),
            (None, Some("config")) => RestartMode::ResetConfig,
            (None, Some(other)) => return Err(ConfigError::invalid("Reset", other)),
            (None, None) => RestartMode::Normal,
        };
        Ok(Self { mode })
    }
}

/// `POST service/import`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRequest {
    pub file_name: String,
    pub password: String,
    pub disable_objects: bool,
    pub apply_config: bool,
}

impl ImportRequest {
    pub fn parse(body: &Value) -> ConfigResult<Self> {
        let fields = Fields::new("import", body, &["FileName", "Password", "DisableObjects", "ApplyConfig"])?;
        Ok(Self {
            file_name: fields.required_string("FileName")?,
            password: fields.required_string("Password")?,
            disable_objects: fields.boolean("DisableObjects", true)?,
            apply_config: fields.boolean("ApplyConfig", false)?,
        })
    }
}

/// `POST service/export`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub file_name: String,
    pub password: String,
}

impl ExportRequest {
    pub fn parse(body: &Value) -> ConfigResult<Self> {
        let fields = Fields::new("export", body, &["FileName", "Password"])?;
        Ok(Self {
            file_name: fields.required_string("FileName")?,
            password: fields.required_string("Password")?,
        })
    }
}

struct Fields<'a> {
    action: &'static str,
    map: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    fn new(action: &'static str, body: &'a Value, allowed: &[&str]) -> ConfigResult<Self> {
        let map = match body {
            Value::Object(map) => map,
            Value::Null => return Err(ConfigError::NullObject),
            other => return Err(ConfigError::bad_call(other.to_string())),
        };
        if let Some(unknown) = map.keys().find(|k| !allowed.iter().any(|a| a == k)) {
            return Err(ConfigError::InvalidArgument { name: unknown.clone() });
        }
        Ok(Self { action, map })
    }

    fn wrong_type(&self, name: &str, value: &Value) -> ConfigError {
        ConfigError::WrongType {
            object: self.action.to_string(),
            name: "null".to_string(),
            property: name.to_string(),
            json_type: json_type_name(value),
        }
    }

    fn optional_string(&self, name: &str) -> ConfigResult<Option<String>> {
        match self.map.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.is_empty() => Err(ConfigError::invalid(name, "")),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(self.wrong_type(name, other)),
        }
    }

    fn required_string(&self, name: &str) -> ConfigResult<String> {
        self.optional_string(name)?.ok_or_else(|| ConfigError::RequiredMissing {
            property: name.to_string(),
            value: "null".to_string(),
        })
    }

    fn boolean(&self, name: &str, default: bool) -> ConfigResult<bool> {
        match self.map.get(name) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::String(s)) => Err(ConfigError::invalid(name, s.as_str())),
            Some(other) => Err(self.wrong_type(name, other)),
        }
    }
}
