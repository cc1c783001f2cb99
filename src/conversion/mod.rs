//! Schema-type/host-type conversion
//!
//! Maps between schema type identifiers (`xsd:date`, `xsd:int`, ...) and
//! host value kinds, with process-wide immutable defaults and per-field
//! overrides, plus the lexical rendering/parsing for each builtin type.

pub mod convert;
pub mod registry;
pub mod schema;

pub use convert::{convert_union, lexical_to_value, parse_union, value_to_lexical};
pub use registry::{resolve_host_type, resolve_schema_type, ConversionOverrides, ConversionRegistry};
pub use schema::SchemaType;
