//! Type descriptors
//!
//! One descriptor per mapped class: its ordered field mappings, default
//! root element(s), namespace resolver, optional inheritance parent and
//! document-preservation flag. Descriptors are configured, then frozen by
//! [`initialize`](TypeDescriptor::initialize) when registered with a
//! binding context; after that they are shared read-only across calls.

use crate::conversion::schema::SchemaType;
use crate::core::qname::QualifiedName;
use crate::core::qname::split_prefixed;
use crate::error::BindError;
use crate::mapping::FieldMapping;
use crate::namespace::NamespaceResolver;

/// A declared default root element, kept in raw form until the descriptor
/// initializes against its namespace resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct RootElement {
    raw: String,
    prefix: Option<String>,
    local_name: String,
    namespace_uri: Option<String>,
}

impl RootElement {
    fn parse(raw: &str) -> Self {
        let (prefix, local) = split_prefixed(raw);
        RootElement {
            raw: raw.to_string(),
            prefix: prefix.map(str::to_string),
            local_name: local.to_string(),
            namespace_uri: None,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    pub fn namespace_uri(&self) -> Option<&str> {
        self.namespace_uri.as_deref()
    }

    /// Resolved identity, valid after descriptor initialization.
    pub fn qualified_name(&self) -> QualifiedName {
        QualifiedName::new(self.namespace_uri.as_deref(), &self.local_name)
    }
}

/// Per-class binding metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    host_class: String,
    field_mappings: Vec<FieldMapping>,
    root_elements: Vec<RootElement>,
    namespace_resolver: NamespaceResolver,
    inheritance_parent: Option<String>,
    preserve_document: bool,
    schema_type_reference: Option<SchemaType>,
    initialized: bool,
}

impl TypeDescriptor {
    pub fn new(host_class: &str) -> Self {
        TypeDescriptor {
            host_class: host_class.to_string(),
            field_mappings: Vec::new(),
            root_elements: Vec::new(),
            namespace_resolver: NamespaceResolver::new(),
            inheritance_parent: None,
            preserve_document: false,
            schema_type_reference: None,
            initialized: false,
        }
    }

    /// Compile `path` and store a direct mapping for `attribute_name`.
    /// The returned reference configures the new mapping in place.
    pub fn add_field(
        &mut self,
        attribute_name: &str,
        path: &str,
    ) -> Result<&mut FieldMapping, BindError> {
        let mapping = FieldMapping::direct(attribute_name, path)?;
        self.field_mappings.push(mapping);
        let last = self.field_mappings.len() - 1;
        Ok(&mut self.field_mappings[last])
    }

    /// Store a pre-built mapping (union, composite, or a configured direct
    /// mapping).
    pub fn add_mapping(&mut self, mapping: FieldMapping) -> &mut FieldMapping {
        self.field_mappings.push(mapping);
        let last = self.field_mappings.len() - 1;
        &mut self.field_mappings[last]
    }

    /// Declare a default root element, `local` or `prefix:local`. The first
    /// declared root is the one used when marshalling without an envelope.
    pub fn add_root_element(&mut self, name: &str) -> &mut Self {
        self.root_elements.push(RootElement::parse(name));
        self
    }

    /// Replace all declared roots with one default root element.
    pub fn set_default_root_element(&mut self, name: &str) -> &mut Self {
        self.root_elements.clear();
        self.add_root_element(name)
    }

    pub fn set_namespace_resolver(&mut self, resolver: NamespaceResolver) -> &mut Self {
        self.namespace_resolver = resolver;
        self
    }

    pub fn set_inheritance_parent(&mut self, parent_class: &str) -> &mut Self {
        self.inheritance_parent = Some(parent_class.to_string());
        self
    }

    pub fn set_preserve_document(&mut self, preserve: bool) -> &mut Self {
        self.preserve_document = preserve;
        self
    }

    /// Global schema type this class corresponds to, used for `xsi:type`
    /// lookup and emission.
    pub fn set_schema_type_reference(&mut self, schema_type: SchemaType) -> &mut Self {
        self.schema_type_reference = Some(schema_type);
        self
    }

    /// Resolve root-element and path prefixes against the resolver and
    /// freeze the descriptor. Prefixed roots with no binding fail here,
    /// before any marshal call can trip over them.
    pub fn initialize(&mut self) -> Result<(), BindError> {
        if self.initialized {
            return Ok(());
        }
        for root in &mut self.root_elements {
            match &root.prefix {
                Some(prefix) => match self.namespace_resolver.resolve_uri(prefix) {
                    Some(uri) => root.namespace_uri = Some(uri.to_string()),
                    None => {
                        return Err(BindError::NamespaceResolution {
                            name: root.raw.clone(),
                            reason: format!("prefix '{}' is not bound", prefix),
                        })
                    }
                },
                None => {
                    root.namespace_uri = self
                        .namespace_resolver
                        .default_namespace_uri()
                        .map(str::to_string);
                }
            }
        }
        for mapping in &mut self.field_mappings {
            mapping.initialize(&self.namespace_resolver)?;
        }
        self.initialized = true;
        Ok(())
    }

    pub fn host_class(&self) -> &str {
        &self.host_class
    }

    pub fn field_mappings(&self) -> &[FieldMapping] {
        &self.field_mappings
    }

    pub fn mapping_for(&self, attribute_name: &str) -> Option<&FieldMapping> {
        self.field_mappings
            .iter()
            .find(|m| m.attribute_name() == attribute_name)
    }

    pub fn root_elements(&self) -> &[RootElement] {
        &self.root_elements
    }

    /// The first declared root, if any.
    pub fn default_root(&self) -> Option<&RootElement> {
        self.root_elements.first()
    }

    pub fn namespace_resolver(&self) -> &NamespaceResolver {
        &self.namespace_resolver
    }

    pub fn namespace_resolver_mut(&mut self) -> &mut NamespaceResolver {
        &mut self.namespace_resolver
    }

    pub fn inheritance_parent(&self) -> Option<&str> {
        self.inheritance_parent.as_deref()
    }

    pub fn preserve_document(&self) -> bool {
        self.preserve_document
    }

    pub fn schema_type_reference(&self) -> Option<&SchemaType> {
        self.schema_type_reference.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Root-envelope decision: `false` iff some declared root's resolved
    /// identity equals the given element identity, where an absent and an
    /// empty namespace are the same thing. `true` otherwise, including
    /// when no root is declared at all.
    pub fn should_wrap_object(
        &self,
        element_namespace: Option<&str>,
        element_local_name: &str,
    ) -> bool {
        !self.root_elements.iter().any(|root| {
            root.qualified_name()
                .matches(element_namespace, element_local_name)
        })
    }
}
