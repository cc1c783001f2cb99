//! Reader events
//!
//! Event types for pull-style parsing. Events borrow from the input
//! buffer; text and attribute values are Cow so entity-free content stays
//! zero-copy.

use std::borrow::Cow;

use crate::core::qname::split_prefixed;

/// One parsing event.
#[derive(Debug, Clone)]
pub enum XmlEvent<'a> {
    /// XML declaration: `<?xml version="1.0"?>`
    XmlDeclaration {
        version: Cow<'a, str>,
        encoding: Option<Cow<'a, str>>,
        standalone: Option<bool>,
    },
    /// Start of an element: `<name attrs...>`
    StartElement(StartElement<'a>),
    /// Empty element: `<name attrs.../>`
    EmptyElement(StartElement<'a>),
    /// End of an element: `</name>`
    EndElement(EndElement<'a>),
    /// Text content between tags, entities decoded
    Text(Cow<'a, str>),
    /// CDATA section content, verbatim
    CData(&'a str),
    /// Comment content
    Comment(&'a str),
    /// Processing instruction: `<?target data?>`
    ProcessingInstruction {
        target: &'a str,
        data: Option<&'a str>,
    },
    /// DOCTYPE declaration body
    DocType(&'a str),
}

/// Start element event data.
#[derive(Debug, Clone)]
pub struct StartElement<'a> {
    /// Full element name (may include prefix)
    pub name: &'a str,
    /// Local name (after colon)
    pub local_name: &'a str,
    /// Namespace prefix (before colon), if any
    pub prefix: Option<&'a str>,
    /// Attributes in document order
    pub attributes: Vec<RawAttribute<'a>>,
}

impl<'a> StartElement<'a> {
    pub fn new(name: &'a str, attributes: Vec<RawAttribute<'a>>) -> Self {
        let (prefix, local_name) = split_prefixed(name);
        StartElement {
            name,
            local_name,
            prefix,
            attributes,
        }
    }

    pub fn attribute_value(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_ref())
    }
}

/// One parsed attribute, value entity-decoded.
#[derive(Debug, Clone)]
pub struct RawAttribute<'a> {
    pub name: &'a str,
    pub local_name: &'a str,
    pub prefix: Option<&'a str>,
    pub value: Cow<'a, str>,
}

impl<'a> RawAttribute<'a> {
    pub fn new(name: &'a str, value: Cow<'a, str>) -> Self {
        let (prefix, local_name) = split_prefixed(name);
        RawAttribute {
            name,
            local_name,
            prefix,
            value,
        }
    }

    /// True for `xmlns` and `xmlns:*` declarations.
    pub fn is_namespace_declaration(&self) -> bool {
        self.name == "xmlns" || self.prefix == Some("xmlns")
    }

    /// The prefix being declared; `None` for the default declaration.
    pub fn declared_prefix(&self) -> Option<&'a str> {
        if self.prefix == Some("xmlns") {
            Some(self.local_name)
        } else {
            None
        }
    }
}

/// End element event data.
#[derive(Debug, Clone)]
pub struct EndElement<'a> {
    pub name: &'a str,
    pub local_name: &'a str,
    pub prefix: Option<&'a str>,
}

impl<'a> EndElement<'a> {
    pub fn new(name: &'a str) -> Self {
        let (prefix, local_name) = split_prefixed(name);
        EndElement {
            name,
            local_name,
            prefix,
        }
    }
}
