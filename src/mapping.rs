//! Field mappings
//!
//! One mapping binds a host attribute name to a compiled field path plus
//! conversion information. Three capabilities cover the mapping surface:
//! direct values, union-typed values and composite (nested object) values.
//! A mapping belongs to exactly one descriptor and is frozen once the
//! descriptor initializes.

use crate::conversion::registry::ConversionOverrides;
use crate::conversion::schema::SchemaType;
use crate::conversion::{convert_union, lexical_to_value, parse_union, resolve_schema_type, value_to_lexical};
use crate::error::BindError;
use crate::namespace::NamespaceResolver;
use crate::path::PathExpression;
use crate::value::{Value, ValueKind};

/// What a mapping does with the value it addresses.
#[derive(Debug, Clone, PartialEq)]
pub enum MappingKind {
    /// One simple value, converted through at most one schema type.
    Direct,
    /// One simple value matched against several schema types in
    /// declaration order.
    Union,
    /// A nested mapped object (or a collection of them); the referenced
    /// class is resolved through the binding context at marshal time.
    Composite { reference_class: String },
}

/// A single attribute-to-path binding.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMapping {
    attribute_name: String,
    path: PathExpression,
    kind: MappingKind,
    /// Empty means the schema type is decided per value at marshal time.
    schema_types: Vec<SchemaType>,
    container: bool,
    uses_single_node: bool,
    is_cdata: bool,
    nillable: bool,
    overrides: Option<ConversionOverrides>,
}

impl FieldMapping {
    /// A direct mapping; the path is compiled here, so grammar errors fail
    /// descriptor construction.
    pub fn direct(attribute_name: &str, path: &str) -> Result<Self, BindError> {
        Ok(FieldMapping {
            attribute_name: attribute_name.to_string(),
            path: PathExpression::compile(path)?,
            kind: MappingKind::Direct,
            schema_types: Vec::new(),
            container: false,
            uses_single_node: false,
            is_cdata: false,
            nillable: false,
            overrides: None,
        })
    }

    /// A union mapping trying `schema_types` in the given order.
    pub fn union(
        attribute_name: &str,
        path: &str,
        schema_types: Vec<SchemaType>,
    ) -> Result<Self, BindError> {
        let mut mapping = FieldMapping::direct(attribute_name, path)?;
        mapping.kind = MappingKind::Union;
        mapping.schema_types = schema_types;
        Ok(mapping)
    }

    /// A composite mapping nesting an object of `reference_class`.
    pub fn composite(
        attribute_name: &str,
        path: &str,
        reference_class: &str,
    ) -> Result<Self, BindError> {
        let mut mapping = FieldMapping::direct(attribute_name, path)?;
        mapping.kind = MappingKind::Composite {
            reference_class: reference_class.to_string(),
        };
        Ok(mapping)
    }

    /// Declare the schema type of a direct mapping. Also recorded on the
    /// path's terminal fragment for marshal-time dispatch.
    pub fn set_schema_type(&mut self, schema_type: SchemaType) -> &mut Self {
        self.path.set_leaf_schema_type(schema_type.clone());
        self.schema_types = vec![schema_type];
        self
    }

    /// Mark the field collection-valued. Unmarshalling a container field
    /// always yields a `Value::List`, gathering every matching sibling
    /// node (or splitting the single node under
    /// [`set_uses_single_node`](Self::set_uses_single_node)).
    pub fn set_container(&mut self, container: bool) -> &mut Self {
        self.container = container;
        self
    }

    /// Collection values are joined into one node (space-separated list
    /// form) instead of one sibling element per entry.
    pub fn set_uses_single_node(&mut self, uses_single_node: bool) -> &mut Self {
        self.uses_single_node = uses_single_node;
        self
    }

    /// Emit this field's text inside a CDATA section.
    pub fn set_is_cdata(&mut self, is_cdata: bool) -> &mut Self {
        self.is_cdata = is_cdata;
        self
    }

    /// Emit `xsi:nil="true"` for null values instead of omitting the
    /// element.
    pub fn set_nillable(&mut self, nillable: bool) -> &mut Self {
        self.nillable = nillable;
        self
    }

    /// Field-scoped conversion override, consulted before the defaults.
    pub fn add_conversion(&mut self, schema_type: SchemaType, host_kind: ValueKind) -> &mut Self {
        self.overrides
            .get_or_insert_with(ConversionOverrides::new)
            .add_conversion(schema_type, host_kind);
        self
    }

    pub fn remove_conversion(&mut self, schema_type: &SchemaType) -> &mut Self {
        if let Some(overrides) = &mut self.overrides {
            overrides.remove_conversion(schema_type);
            if overrides.is_empty() {
                self.overrides = None;
            }
        }
        self
    }

    /// Resolve path prefixes against the owning descriptor's resolver.
    /// Called once during descriptor initialization.
    pub(crate) fn initialize(&mut self, resolver: &NamespaceResolver) -> Result<(), BindError> {
        self.path.resolve_namespaces(resolver)
    }

    pub fn attribute_name(&self) -> &str {
        &self.attribute_name
    }

    pub fn path(&self) -> &PathExpression {
        &self.path
    }

    pub fn kind(&self) -> &MappingKind {
        &self.kind
    }

    pub fn schema_types(&self) -> &[SchemaType] {
        &self.schema_types
    }

    pub fn is_container(&self) -> bool {
        self.container
    }

    pub fn uses_single_node(&self) -> bool {
        self.uses_single_node
    }

    pub fn is_cdata(&self) -> bool {
        self.is_cdata
    }

    pub fn is_nillable(&self) -> bool {
        self.nillable
    }

    pub fn overrides(&self) -> Option<&ConversionOverrides> {
        self.overrides.as_ref()
    }

    /// The nested class for composite mappings.
    pub fn reference_class(&self) -> Option<&str> {
        match &self.kind {
            MappingKind::Composite { reference_class } => Some(reference_class),
            _ => None,
        }
    }

    /// Render one simple value through this mapping's conversion setup.
    pub fn lexical_for(&self, value: &Value) -> Result<String, BindError> {
        match &self.kind {
            MappingKind::Union => {
                let (_, lexical) = convert_union(value, &self.schema_types)?;
                Ok(lexical)
            }
            _ => match self.schema_types.first() {
                Some(schema_type) => value_to_lexical(value, schema_type),
                None => {
                    // No declared type: derive one from the value itself
                    let schema_type = resolve_schema_type(value.kind(), self.overrides())?;
                    value_to_lexical(value, &schema_type)
                }
            },
        }
    }

    /// Parse one text node or attribute value back into a host value.
    pub fn value_from(&self, text: &str) -> Result<Value, BindError> {
        match &self.kind {
            MappingKind::Union => parse_union(text, &self.schema_types, self.overrides()),
            _ => match self.schema_types.first() {
                Some(schema_type) => lexical_to_value(text, schema_type, self.overrides()),
                None => Ok(Value::Text(text.to_string())),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_direct_mapping_untyped() {
        let mapping = FieldMapping::direct("name", "name/text()").unwrap();
        assert_eq!(mapping.attribute_name(), "name");
        assert_eq!(mapping.lexical_for(&Value::Text("Ada".into())).unwrap(), "Ada");
        assert_eq!(
            mapping.value_from("Ada").unwrap(),
            Value::Text("Ada".to_string())
        );
    }

    #[test]
    fn test_direct_mapping_typed() {
        let mut mapping = FieldMapping::direct("since", "since/text()").unwrap();
        mapping.set_schema_type(SchemaType::date());

        assert_eq!(
            mapping.path().tail().leaf_schema_type,
            Some(SchemaType::date())
        );
        let date = NaiveDate::from_ymd_opt(2020, 6, 1).unwrap();
        assert_eq!(mapping.lexical_for(&Value::Date(date)).unwrap(), "2020-06-01");
        assert_eq!(mapping.value_from("2020-06-01").unwrap(), Value::Date(date));
    }

    #[test]
    fn test_union_mapping_order() {
        let mapping = FieldMapping::union(
            "when",
            "when/text()",
            vec![SchemaType::date(), SchemaType::int()],
        )
        .unwrap();

        assert_eq!(mapping.lexical_for(&Value::Integer(5)).unwrap(), "5");
        assert_eq!(
            mapping.value_from("2020-06-01").unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(2020, 6, 1).unwrap())
        );
        assert_eq!(mapping.value_from("17").unwrap(), Value::Integer(17));
    }

    #[test]
    fn test_conversion_override() {
        let mut mapping = FieldMapping::direct("raw", "raw/text()").unwrap();
        mapping.set_schema_type(SchemaType::date());
        mapping.add_conversion(SchemaType::date(), ValueKind::Text);

        assert_eq!(
            mapping.value_from("2020-06-01").unwrap(),
            Value::Text("2020-06-01".to_string())
        );

        mapping.remove_conversion(&SchemaType::date());
        assert_eq!(
            mapping.value_from("2020-06-01").unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(2020, 6, 1).unwrap())
        );
    }

    #[test]
    fn test_composite_reference_class() {
        let mapping = FieldMapping::composite("address", "address", "Address").unwrap();
        assert_eq!(mapping.reference_class(), Some("Address"));
    }

    #[test]
    fn test_bad_path_fails_construction() {
        assert!(FieldMapping::direct("x", "a//b").is_err());
    }
}
