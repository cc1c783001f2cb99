//! Conversion registry
//!
//! Two lookup directions: schema type to host value kind (unmarshal) and
//! host value kind to schema type (marshal). The default tables are built
//! once, process-wide and immutable; a field mapping may carry an override
//! table that is consulted first.

use std::collections::HashMap;
use std::sync::LazyLock;

use super::schema::SchemaType;
use crate::error::BindError;
use crate::value::ValueKind;

static DEFAULTS: LazyLock<ConversionRegistry> = LazyLock::new(ConversionRegistry::builtin);

/// Bidirectional schema-type/host-kind table.
#[derive(Debug, Clone)]
pub struct ConversionRegistry {
    schema_to_host: HashMap<SchemaType, ValueKind>,
    host_to_schema: HashMap<ValueKind, SchemaType>,
}

impl ConversionRegistry {
    /// The shared default table. Built on first use, read-only after.
    pub fn defaults() -> &'static ConversionRegistry {
        &DEFAULTS
    }

    fn builtin() -> Self {
        let mut schema_to_host = HashMap::new();
        let mut host_to_schema = HashMap::new();

        let pairs: [(SchemaType, ValueKind); 14] = [
            (SchemaType::string(), ValueKind::Text),
            (SchemaType::any_simple_type(), ValueKind::Text),
            (SchemaType::boolean(), ValueKind::Boolean),
            (SchemaType::int(), ValueKind::Integer),
            (SchemaType::integer(), ValueKind::Integer),
            (SchemaType::long(), ValueKind::Integer),
            (SchemaType::double(), ValueKind::Double),
            (SchemaType::float(), ValueKind::Double),
            (SchemaType::decimal(), ValueKind::Double),
            (SchemaType::date(), ValueKind::Date),
            (SchemaType::time(), ValueKind::Time),
            (SchemaType::date_time(), ValueKind::DateTime),
            (SchemaType::base64_binary(), ValueKind::Bytes),
            (SchemaType::hex_binary(), ValueKind::Bytes),
        ];
        for (schema, host) in pairs {
            schema_to_host.insert(schema, host);
        }

        // Canonical schema type per host kind
        let canonical: [(ValueKind, SchemaType); 8] = [
            (ValueKind::Text, SchemaType::string()),
            (ValueKind::Boolean, SchemaType::boolean()),
            (ValueKind::Integer, SchemaType::int()),
            (ValueKind::Double, SchemaType::double()),
            (ValueKind::Date, SchemaType::date()),
            (ValueKind::Time, SchemaType::time()),
            (ValueKind::DateTime, SchemaType::date_time()),
            (ValueKind::Bytes, SchemaType::base64_binary()),
        ];
        for (host, schema) in canonical {
            host_to_schema.insert(host, schema);
        }

        ConversionRegistry {
            schema_to_host,
            host_to_schema,
        }
    }

    pub fn default_host_type_for(&self, schema_type: &SchemaType) -> Option<ValueKind> {
        self.schema_to_host.get(schema_type).copied()
    }

    pub fn default_schema_type_for(&self, kind: ValueKind) -> Option<&SchemaType> {
        self.host_to_schema.get(&kind)
    }
}

/// Per-field conversion overrides, consulted before the default table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversionOverrides {
    schema_to_host: HashMap<SchemaType, ValueKind>,
    host_to_schema: HashMap<ValueKind, SchemaType>,
}

impl ConversionOverrides {
    pub fn new() -> Self {
        ConversionOverrides::default()
    }

    /// Register a pairing in both directions for this field.
    pub fn add_conversion(&mut self, schema_type: SchemaType, host_kind: ValueKind) {
        self.schema_to_host.insert(schema_type.clone(), host_kind);
        self.host_to_schema.insert(host_kind, schema_type);
    }

    /// Remove a pairing added by [`add_conversion`](Self::add_conversion).
    pub fn remove_conversion(&mut self, schema_type: &SchemaType) {
        self.schema_to_host.remove(schema_type);
        self.host_to_schema
            .retain(|_, schema| schema != schema_type);
    }

    pub fn host_type_for(&self, schema_type: &SchemaType) -> Option<ValueKind> {
        self.schema_to_host.get(schema_type).copied()
    }

    pub fn schema_type_for(&self, kind: ValueKind) -> Option<&SchemaType> {
        self.host_to_schema.get(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.schema_to_host.is_empty() && self.host_to_schema.is_empty()
    }
}

/// Host kind for `schema_type`: field overrides first, then the defaults.
pub fn resolve_host_type(
    schema_type: &SchemaType,
    overrides: Option<&ConversionOverrides>,
) -> Result<ValueKind, BindError> {
    if let Some(kind) = overrides.and_then(|o| o.host_type_for(schema_type)) {
        return Ok(kind);
    }
    ConversionRegistry::defaults()
        .default_host_type_for(schema_type)
        .ok_or_else(|| BindError::UnsupportedConversion {
            value: schema_type.to_string(),
            target: "a host value type".to_string(),
        })
}

/// Schema type for a host kind: field overrides first, then the defaults.
pub fn resolve_schema_type(
    kind: ValueKind,
    overrides: Option<&ConversionOverrides>,
) -> Result<SchemaType, BindError> {
    if let Some(schema) = overrides.and_then(|o| o.schema_type_for(kind)) {
        return Ok(schema.clone());
    }
    ConversionRegistry::defaults()
        .default_schema_type_for(kind)
        .cloned()
        .ok_or_else(|| BindError::UnsupportedConversion {
            value: format!("{:?} value", kind),
            target: "a schema type".to_string(),
        })
}
