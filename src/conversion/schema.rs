//! Schema type identifiers
//!
//! A schema type is a qualified name, usually one of the XML Schema
//! built-ins but also any user-declared global complex type (those drive
//! `xsi:type` lookup rather than value conversion).

use std::fmt;

use crate::core::qname::{ns, QualifiedName};

/// Namespace-qualified schema type reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaType(QualifiedName);

impl SchemaType {
    pub fn new(name: QualifiedName) -> Self {
        SchemaType(name)
    }

    /// A type in the XML Schema namespace.
    pub fn xsd(local_name: &str) -> Self {
        SchemaType(QualifiedName::new(Some(ns::XSD), local_name))
    }

    pub fn qualified_name(&self) -> &QualifiedName {
        &self.0
    }

    pub fn local_name(&self) -> &str {
        self.0.local_name()
    }

    pub fn namespace_uri(&self) -> Option<&str> {
        self.0.namespace_uri()
    }

    /// True for types in the XML Schema namespace.
    pub fn is_builtin(&self) -> bool {
        self.0.namespace_uri() == Some(ns::XSD)
    }

    pub fn string() -> Self {
        Self::xsd("string")
    }

    pub fn boolean() -> Self {
        Self::xsd("boolean")
    }

    pub fn int() -> Self {
        Self::xsd("int")
    }

    pub fn integer() -> Self {
        Self::xsd("integer")
    }

    pub fn long() -> Self {
        Self::xsd("long")
    }

    pub fn double() -> Self {
        Self::xsd("double")
    }

    pub fn float() -> Self {
        Self::xsd("float")
    }

    pub fn decimal() -> Self {
        Self::xsd("decimal")
    }

    pub fn date() -> Self {
        Self::xsd("date")
    }

    pub fn time() -> Self {
        Self::xsd("time")
    }

    pub fn date_time() -> Self {
        Self::xsd("dateTime")
    }

    pub fn base64_binary() -> Self {
        Self::xsd("base64Binary")
    }

    pub fn hex_binary() -> Self {
        Self::xsd("hexBinary")
    }

    pub fn any_simple_type() -> Self {
        Self::xsd("anySimpleType")
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<QualifiedName> for SchemaType {
    fn from(name: QualifiedName) -> Self {
        SchemaType(name)
    }
}
