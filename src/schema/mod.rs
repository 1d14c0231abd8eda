//! Object schema module
//!
//! Declares the configuration object types served by the API, their
//! properties and per-property null policies, and the factory default
//! document.

pub mod object;
pub mod property;
pub mod registry;

pub use object::{KeyPart, KeyShape, ObjectType, MAX_OBJECT_NAME_LEN};
pub use property::{NullPolicy, PropertySpec, ValueKind};
pub use registry::SchemaRegistry;
