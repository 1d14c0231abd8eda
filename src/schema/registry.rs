//! Object schema registry
//!
//! The registry owns every object type the API knows about and the factory
//! default document. Types are kept in dependency order: a type appears after
//! every type it references, so validating a batch type by type sees
//! referenced objects created earlier in the same batch.

use serde_json::{json, Value};

use super::object::{KeyPart, KeyShape, ObjectType};
use super::property::{NullPolicy, PropertySpec};

/// Maximum length of most free-form strings
const MAX_STRING_LEN: usize = 1024;

/// Maximum number of topics a forwarder subscribes to
pub const MAX_FORWARDER_TOPICS: usize = 16;

/// Maximum length of a security profile name
pub const MAX_SECURITY_PROFILE_NAME_LEN: usize = 32;

/// Maximum length of a certificate file name
pub const MAX_CERTIFICATE_NAME_LEN: usize = 255;

/// Object types plus the factory default document
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    types: Vec<ObjectType>,
    defaults: Value,
}

impl SchemaRegistry {
    /// Build a registry from explicit types and defaults
    pub fn new(types: Vec<ObjectType>, defaults: Value) -> Self {
        Self { types, defaults }
    }

    /// The appliance's object types
    pub fn standard() -> Self {
        let types = vec![
            ObjectType::new("LicensedUsage", KeyShape::Scalar)
                .property(
                    PropertySpec::one_of("LicensedUsage", &["Developers", "NonProduction", "Production"])
                        .required()
                        .default_value(json!("Developers")),
                )
                .reset_excluded(),
            ObjectType::new("ServerName", KeyShape::Scalar).property(
                PropertySpec::string("ServerName", 256)
                    .default_value(json!(""))
                    .on_null(NullPolicy::ResetTo(json!(""))),
            ),
            ObjectType::new("AdminEndpoint", KeyShape::Singleton)
                .property(PropertySpec::integer("Port", 1, 65535).required().default_value(json!(9089)))
                .property(PropertySpec::string("Interface", 256).required().default_value(json!("All")))
                .property(PropertySpec::string("SecurityProfile", 256))
                .reset_excluded(),
            ObjectType::new("CertificateProfile", KeyShape::Named)
                .property(PropertySpec::string("Certificate", MAX_CERTIFICATE_NAME_LEN).required().uploaded_file())
                .property(PropertySpec::string("Key", MAX_CERTIFICATE_NAME_LEN).required().uploaded_file())
                .overwrite_guarded(),
            ObjectType::new("SecurityProfile", KeyShape::Named)
                .property(PropertySpec::string("CertificateProfile", 256).required().references("CertificateProfile"))
                .property(
                    PropertySpec::boolean("UsePasswordAuthentication")
                        .default_value(json!(true))
                        .on_null(NullPolicy::ResetTo(json!(true))),
                )
                .property(
                    PropertySpec::one_of("MinimumProtocolMethod", &["TLSv1.2", "TLSv1.3"])
                        .default_value(json!("TLSv1.2"))
                        .on_null(NullPolicy::ResetTo(json!("TLSv1.2"))),
                ),
            ObjectType::new(
                "ClientCertificate",
                KeyShape::Composite([
                    KeyPart::new("SecurityProfileName", MAX_SECURITY_PROFILE_NAME_LEN)
                        .references("SecurityProfile")
                        .labelled("SecurityProfile"),
                    KeyPart::new("CertificateName", MAX_CERTIFICATE_NAME_LEN).uploaded_file(),
                ]),
            )
            .overwrite_guarded(),
            ObjectType::new(
                "TrustedCertificate",
                KeyShape::Composite([
                    KeyPart::new("SecurityProfileName", MAX_SECURITY_PROFILE_NAME_LEN)
                        .references("SecurityProfile")
                        .labelled("SecurityProfile"),
                    KeyPart::new("TrustedCertificate", MAX_CERTIFICATE_NAME_LEN).uploaded_file(),
                ]),
            )
            .overwrite_guarded(),
            ObjectType::new("Connection", KeyShape::Named)
                .property(PropertySpec::string_list("MQTTServerList", 16, MAX_STRING_LEN).required())
                .property(PropertySpec::string("ClientID", MAX_STRING_LEN))
                .property(
                    PropertySpec::one_of("Version", &["3.1.1", "5.0"])
                        .default_value(json!("5.0"))
                        .on_null(NullPolicy::ResetTo(json!("5.0"))),
                )
                .property(PropertySpec::string("Username", MAX_STRING_LEN))
                .property(PropertySpec::string("Password", MAX_STRING_LEN).write_only())
                .property(
                    PropertySpec::boolean("EnableTLS")
                        .default_value(json!(false))
                        .on_null(NullPolicy::ResetTo(json!(false))),
                ),
            ObjectType::new("Forwarder", KeyShape::Named)
                .property(PropertySpec::string_list("Topic", MAX_FORWARDER_TOPICS, MAX_STRING_LEN).required())
                .property(
                    PropertySpec::boolean("Enabled")
                        .default_value(json!(true))
                        .on_null(NullPolicy::ResetTo(json!(false))),
                )
                .property(PropertySpec::string("Source", MAX_STRING_LEN).required().references("Connection"))
                .property(PropertySpec::string("Destination", MAX_STRING_LEN).required().references("Connection"))
                .property(PropertySpec::string("TopicMap", MAX_STRING_LEN))
                .property(PropertySpec::string("Selector", MAX_STRING_LEN))
                .property(
                    PropertySpec::integer("Instances", 0, 99)
                        .on_null(NullPolicy::ResetTo(json!(99)))
                        .unset_at(json!(0)),
                )
                .property(
                    PropertySpec::integer_set("SourceQoS", &[0, 1, 2])
                        .default_value(json!(1))
                        .on_null(NullPolicy::NoOpOnNull),
                ),
        ];

        let defaults = json!({
            "LicensedUsage": "Developers",
            "ServerName": "",
            "AdminEndpoint": {
                "Port": 9089,
                "Interface": "All",
                "SecurityProfile": null
            },
            "Connection": {
                "WIoTP": {
                    "MQTTServerList": ["messaging.internetofthings.ibmcloud.com:8883"],
                    "Version": "3.1.1",
                    "EnableTLS": true
                },
                "MqttServer": {
                    "MQTTServerList": ["127.0.0.1:1883"],
                    "ClientID": "appliance-forwarder",
                    "Version": "5.0"
                }
            },
            "Forwarder": {
                "m2w": {
                    "Topic": ["wiotp/+/+/+/+"],
                    "Enabled": true,
                    "Source": "MqttServer",
                    "Destination": "WIoTP",
                    "TopicMap": "iot-2/${Topic1*}"
                }
            }
        });

        Self::new(types, defaults)
    }

    /// Types in dependency order
    pub fn types(&self) -> impl Iterator<Item = &ObjectType> {
        self.types.iter()
    }

    /// Exact-case lookup, used for request bodies
    pub fn get(&self, name: &str) -> Option<&ObjectType> {
        self.types.iter().find(|t| t.name == name)
    }

    /// Case-insensitive lookup, used for URI type segments
    pub fn lookup(&self, name: &str) -> Option<&ObjectType> {
        self.get(name)
            .or_else(|| self.types.iter().find(|t| t.name.eq_ignore_ascii_case(name)))
    }

    /// Position of a type in dependency order
    pub fn rank(&self, name: &str) -> usize {
        self.types
            .iter()
            .position(|t| t.name == name)
            .unwrap_or(usize::MAX)
    }

    /// Factory default document as a POST body
    pub fn defaults(&self) -> &Value {
        &self.defaults
    }

    /// Types kept as-is by a reset to factory configuration
    pub fn reset_exclusions(&self) -> Vec<&'static str> {
        self.types
            .iter()
            .filter(|t| t.reset_excluded)
            .map(|t| t.name)
            .collect()
    }

    /// Every `(type, property)` whose value names an object of `target`
    pub fn referrers(&self, target: &str) -> Vec<(&'static str, &'static str)> {
        let mut found = Vec::new();
        for ty in &self.types {
            for spec in &ty.properties {
                if spec.references == Some(target) {
                    found.push((ty.name, spec.name));
                }
            }
            if let Some(parts) = ty.key_parts() {
                for part in parts {
                    if part.references == Some(target) {
                        found.push((ty.name, part.name));
                    }
                }
            }
        }
        found
    }
}
