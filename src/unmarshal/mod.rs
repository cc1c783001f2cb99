//! XML-to-object unmarshalling
//!
//! One [`Unmarshaller`] call parses input into an arena tree (UTF-16
//! input transcodes first) and inverts the marshal walk:
//!
//! - the root descriptor comes from an `xsi:type` global-type lookup
//!   when the attribute is present, else from the root element's
//!   qualified name
//! - every field mapping resolves its node chain against the tree and
//!   converts through the mapping's schema types; absent nodes read as
//!   `Value::Null` (an empty `Value::List` for container fields), and
//!   `xsi:nil="true"` reads as `Value::Null`
//! - a root matching no descriptor comes back wrapped in a
//!   [`RootEnvelope`]: text-only roots carry a best-effort simple value,
//!   anything else carries a generic object built from the subtree
//!
//! Descriptors with document preservation retain the parsed tree in the
//! context's preservation store, keyed by the new object's instance key.

use std::io::Read;
use std::sync::Arc;

use tracing::debug;

use crate::context::BindingContext;
use crate::conversion::{lexical_to_value, SchemaType};
use crate::core::qname::{ns, QualifiedName};
use crate::descriptor::TypeDescriptor;
use crate::error::BindError;
use crate::mapping::{FieldMapping, MappingKind};
use crate::path::PathFragment;
use crate::root::RootEnvelope;
use crate::tree::{Document, NodeId};
use crate::value::{DataObject, Value};

/// What one unmarshal call produced: a mapped object, or an envelope
/// around a root no descriptor claimed.
#[derive(Debug, Clone, PartialEq)]
pub enum UnmarshalResult {
    Object(DataObject),
    Envelope(RootEnvelope),
}

impl UnmarshalResult {
    pub fn as_object(&self) -> Option<&DataObject> {
        match self {
            UnmarshalResult::Object(object) => Some(object),
            UnmarshalResult::Envelope(_) => None,
        }
    }

    pub fn into_object(self) -> Option<DataObject> {
        match self {
            UnmarshalResult::Object(object) => Some(object),
            UnmarshalResult::Envelope(_) => None,
        }
    }

    pub fn into_envelope(self) -> Option<RootEnvelope> {
        match self {
            UnmarshalResult::Object(_) => None,
            UnmarshalResult::Envelope(envelope) => Some(envelope),
        }
    }
}

/// Driver for XML-to-object calls. Obtained from
/// [`BindingContext::create_unmarshaller`]; carries no per-call state.
pub struct Unmarshaller<'a> {
    context: &'a BindingContext,
}

impl<'a> Unmarshaller<'a> {
    pub fn new(context: &'a BindingContext) -> Self {
        Unmarshaller { context }
    }

    /// Unmarshal a document held in a string.
    pub fn unmarshal_from_str(&self, text: &str) -> Result<UnmarshalResult, BindError> {
        let doc = Document::parse_str(text)?;
        self.unmarshal_owned(doc)
    }

    /// Unmarshal raw bytes, detecting and transcoding UTF-16 input.
    pub fn unmarshal_from_bytes(&self, bytes: Vec<u8>) -> Result<UnmarshalResult, BindError> {
        let doc = Document::parse_bytes(bytes)?;
        self.unmarshal_owned(doc)
    }

    /// Unmarshal everything a reader yields.
    pub fn unmarshal_from_reader<R: Read>(
        &self,
        reader: &mut R,
    ) -> Result<UnmarshalResult, BindError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        self.unmarshal_from_bytes(bytes)
    }

    /// Unmarshal an already parsed document from its root element.
    pub fn unmarshal_from_document(&self, doc: &Document) -> Result<UnmarshalResult, BindError> {
        let root = doc.root_element().ok_or_else(|| BindError::MalformedDocument {
            reason: "document has no root element".to_string(),
            offset: 0,
        })?;
        self.unmarshal_from_node(doc, root)
    }

    /// Unmarshal a subtree rooted at `node`, which must be an element.
    pub fn unmarshal_from_node(
        &self,
        doc: &Document,
        node: NodeId,
    ) -> Result<UnmarshalResult, BindError> {
        if !doc.get(node).is_some_and(|n| n.is_element()) {
            return Err(BindError::MalformedDocument {
                reason: "unmarshal target is not an element node".to_string(),
                offset: 0,
            });
        }
        let (result, retain) = self.read_root(doc, node)?;
        if let Some(key) = retain {
            self.context.preservation().retain(key, doc.clone(), node);
        }
        Ok(result)
    }

    fn unmarshal_owned(&self, doc: Document) -> Result<UnmarshalResult, BindError> {
        let root = doc.root_element().ok_or_else(|| BindError::MalformedDocument {
            reason: "document has no root element".to_string(),
            offset: 0,
        })?;
        let (result, retain) = self.read_root(&doc, root)?;
        if let Some(key) = retain {
            self.context.preservation().retain(key, doc, root);
        }
        Ok(result)
    }

    /// Read the root element, returning the result and the instance key
    /// to retain when the descriptor preserves documents.
    fn read_root(
        &self,
        doc: &Document,
        root: NodeId,
    ) -> Result<(UnmarshalResult, Option<u64>), BindError> {
        if let Some(descriptor) = self.resolve_descriptor(doc, root)? {
            let object = self.read_object(doc, root, &descriptor)?;
            let retain = descriptor
                .preserve_document()
                .then(|| object.instance_key());
            debug!(class = %descriptor.host_class(), "unmarshalled object");
            return Ok((UnmarshalResult::Object(object), retain));
        }
        debug!(
            root = %doc.local_name(root),
            "no descriptor for root element, wrapping in an envelope"
        );
        Ok((
            UnmarshalResult::Envelope(self.read_envelope(doc, root)),
            None,
        ))
    }

    /// Descriptor for the root: the xsi:type global-type lookup wins when
    /// the attribute names a registered type, else the root QName lookup.
    fn resolve_descriptor(
        &self,
        doc: &Document,
        root: NodeId,
    ) -> Result<Option<Arc<TypeDescriptor>>, BindError> {
        if let Some(type_name) = doc.attribute(root, Some(ns::XSI), "type") {
            let qname = resolve_type_name(doc, root, type_name)?;
            if let Some(descriptor) = self.context.descriptor_for_schema_type(&qname) {
                return Ok(Some(descriptor));
            }
        }
        Ok(self.context.descriptor_for_root(&doc.qualified_name(root)))
    }

    fn read_object(
        &self,
        doc: &Document,
        element: NodeId,
        descriptor: &TypeDescriptor,
    ) -> Result<DataObject, BindError> {
        let mut object = DataObject::new(descriptor.host_class());
        for mapping in descriptor.field_mappings() {
            let value = self.read_field(doc, element, mapping)?;
            object.set(mapping.attribute_name(), value);
        }
        Ok(object)
    }

    fn read_field(
        &self,
        doc: &Document,
        element: NodeId,
        mapping: &FieldMapping,
    ) -> Result<Value, BindError> {
        let path = mapping.path();
        let fragments = path.fragments();

        if path.is_self_path() {
            return textual_value(mapping, &doc.text_content(element));
        }

        if path.targets_attribute() {
            let leaf = fragments.len() - 1;
            let parent = match walk_steps(doc, element, &fragments[..leaf]) {
                Some(id) => id,
                None => return Ok(absent(mapping)),
            };
            let fragment = &fragments[leaf];
            return match doc.attribute(
                parent,
                fragment.namespace_uri.as_deref(),
                &fragment.local_name,
            ) {
                Some(text) => textual_value(mapping, text),
                None => Ok(absent(mapping)),
            };
        }

        let leaf = if fragments.last().is_some_and(|f| f.is_text) {
            fragments.len() - 1
        } else {
            fragments.len()
        };
        if leaf == 0 {
            // bare text() path, content of the mapped element itself
            return textual_value(mapping, &doc.text_content(element));
        }
        let leaf_fragment = &fragments[leaf - 1];
        let parent = match walk_steps(doc, element, &fragments[..leaf - 1]) {
            Some(id) => id,
            None => return Ok(absent(mapping)),
        };

        if let MappingKind::Composite { .. } = mapping.kind() {
            if mapping.is_container() {
                let mut items = Vec::new();
                for child in doc.child_elements_named(
                    parent,
                    leaf_fragment.namespace_uri.as_deref(),
                    &leaf_fragment.local_name,
                ) {
                    items.push(self.composite_value(doc, child, mapping)?);
                }
                return Ok(Value::List(items));
            }
            return match find_step(doc, parent, leaf_fragment) {
                Some(child) => self.composite_value(doc, child, mapping),
                None => Ok(Value::Null),
            };
        }

        if mapping.is_container() && !mapping.uses_single_node() {
            let mut items = Vec::new();
            for child in doc.child_elements_named(
                parent,
                leaf_fragment.namespace_uri.as_deref(),
                &leaf_fragment.local_name,
            ) {
                items.push(self.element_value(doc, child, mapping)?);
            }
            return Ok(Value::List(items));
        }

        match find_step(doc, parent, leaf_fragment) {
            Some(node) => {
                if is_nil(doc, node) {
                    Ok(Value::Null)
                } else {
                    textual_value(mapping, &doc.text_content(node))
                }
            }
            None => Ok(absent(mapping)),
        }
    }

    fn element_value(
        &self,
        doc: &Document,
        node: NodeId,
        mapping: &FieldMapping,
    ) -> Result<Value, BindError> {
        if is_nil(doc, node) {
            return Ok(Value::Null);
        }
        mapping.value_from(&doc.text_content(node))
    }

    fn composite_value(
        &self,
        doc: &Document,
        element: NodeId,
        mapping: &FieldMapping,
    ) -> Result<Value, BindError> {
        if is_nil(doc, element) {
            return Ok(Value::Null);
        }
        let descriptor = self.composite_descriptor(doc, element, mapping)?;
        Ok(Value::Object(self.read_object(doc, element, &descriptor)?))
    }

    /// Descriptor for a nested element: an xsi:type naming a registered
    /// global type overrides the mapping's reference class.
    fn composite_descriptor(
        &self,
        doc: &Document,
        element: NodeId,
        mapping: &FieldMapping,
    ) -> Result<Arc<TypeDescriptor>, BindError> {
        if let Some(type_name) = doc.attribute(element, Some(ns::XSI), "type") {
            let qname = resolve_type_name(doc, element, type_name)?;
            if let Some(descriptor) = self.context.descriptor_for_schema_type(&qname) {
                return Ok(descriptor);
            }
        }
        let reference = mapping.reference_class().unwrap_or_default();
        self.context.descriptor_for_class(reference)
    }

    // ----- envelope fallback -----

    fn read_envelope(&self, doc: &Document, root: NodeId) -> RootEnvelope {
        let nil = is_nil(doc, root);
        let payload = if nil {
            Value::Null
        } else if doc.child_elements(root).next().is_some() {
            Value::Object(tree_to_object(doc, root))
        } else {
            best_effort_value(&doc.text_content(root))
        };

        let mut envelope = RootEnvelope::new(doc.local_name(root), payload);
        if let Some(uri) = doc.namespace_uri(root) {
            envelope.set_namespace_uri(uri);
        }
        if let Some(label) = doc.encoding_label() {
            envelope.set_encoding(label);
        }
        if let Some(version) = doc.xml_version() {
            envelope.set_xml_version(version);
        }
        if let Some(location) = doc.attribute(root, Some(ns::XSI), "schemaLocation") {
            envelope.set_schema_location(location);
        }
        if let Some(location) = doc.attribute(root, Some(ns::XSI), "noNamespaceSchemaLocation") {
            envelope.set_no_namespace_schema_location(location);
        }
        if nil {
            envelope.set_nil(true);
        }
        envelope
    }
}

// ----- helpers -----

/// Null for scalar fields, an empty list for container fields.
fn absent(mapping: &FieldMapping) -> Value {
    if mapping.is_container() {
        Value::List(Vec::new())
    } else {
        Value::Null
    }
}

/// Convert node or attribute text; container fields split on whitespace
/// and convert each token.
fn textual_value(mapping: &FieldMapping, text: &str) -> Result<Value, BindError> {
    if mapping.is_container() {
        let mut items = Vec::new();
        for token in text.split_whitespace() {
            items.push(mapping.value_from(token)?);
        }
        return Ok(Value::List(items));
    }
    mapping.value_from(text)
}

fn is_nil(doc: &Document, node: NodeId) -> bool {
    matches!(
        doc.attribute(node, Some(ns::XSI), "nil"),
        Some("true") | Some("1")
    )
}

/// Follow element steps without creating anything.
fn walk_steps(doc: &Document, from: NodeId, fragments: &[PathFragment]) -> Option<NodeId> {
    let mut current = from;
    for fragment in fragments {
        current = find_step(doc, current, fragment)?;
    }
    Some(current)
}

fn find_step(doc: &Document, parent: NodeId, fragment: &PathFragment) -> Option<NodeId> {
    match fragment.index {
        Some(position) => doc
            .child_elements_named(
                parent,
                fragment.namespace_uri.as_deref(),
                &fragment.local_name,
            )
            .nth((position as usize).saturating_sub(1)),
        None => doc.find_child_element(
            parent,
            fragment.namespace_uri.as_deref(),
            &fragment.local_name,
        ),
    }
}

/// Resolve a `prefix:local` type name against the declarations in scope
/// at `element`; unprefixed names take the default namespace.
fn resolve_type_name(
    doc: &Document,
    element: NodeId,
    name: &str,
) -> Result<QualifiedName, BindError> {
    match name.split_once(':') {
        Some((prefix, local)) => match scope_uri(doc, element, Some(prefix)) {
            Some(uri) => Ok(QualifiedName::new(Some(uri), local)),
            None => Err(BindError::NamespaceResolution {
                name: name.to_string(),
                reason: format!("prefix '{}' is not declared in scope", prefix),
            }),
        },
        None => Ok(QualifiedName::new(scope_uri(doc, element, None), name)),
    }
}

/// Innermost declaration of `prefix` (or of the default namespace) in
/// scope at `element`.
fn scope_uri<'d>(doc: &'d Document, element: NodeId, prefix: Option<&str>) -> Option<&'d str> {
    let mut current = Some(element);
    while let Some(id) = current {
        let node = doc.get(id)?;
        for attr in &node.attributes {
            if doc.strings.get(attr.namespace_id) != ns::XMLNS {
                continue;
            }
            let declares = match prefix {
                Some(p) => {
                    doc.strings.get_nonempty(attr.prefix_id) == Some("xmlns")
                        && doc.strings.get(attr.name_id) == p
                }
                None => {
                    doc.strings.get_nonempty(attr.prefix_id).is_none()
                        && doc.strings.get(attr.name_id) == "xmlns"
                }
            };
            if declares {
                // An empty value undeclares the binding
                return if attr.value.is_empty() {
                    None
                } else {
                    Some(attr.value.as_str())
                };
            }
        }
        current = node.parent;
    }
    None
}

/// Generic object for an unclaimed subtree: attributes and text-only
/// children become text fields, nested elements recurse, repeated names
/// collect into lists.
fn tree_to_object(doc: &Document, element: NodeId) -> DataObject {
    let mut object = DataObject::new(doc.local_name(element));
    if let Some(node) = doc.get(element) {
        for attr in &node.attributes {
            let uri = doc.strings.get(attr.namespace_id);
            if uri == ns::XMLNS || uri == ns::XSI {
                continue;
            }
            push_generic_field(
                &mut object,
                doc.strings.get(attr.name_id),
                Value::Text(attr.value.clone()),
            );
        }
    }
    for child in doc.child_elements(element) {
        let value = if doc.child_elements(child).next().is_some() {
            Value::Object(tree_to_object(doc, child))
        } else {
            Value::Text(doc.text_content(child))
        };
        push_generic_field(&mut object, doc.local_name(child), value);
    }
    object
}

fn push_generic_field(object: &mut DataObject, name: &str, value: Value) {
    match object.get_mut(name) {
        Some(Value::List(items)) => items.push(value),
        Some(existing) => {
            let prior = std::mem::replace(existing, Value::Null);
            *existing = Value::List(vec![prior, value]);
        }
        None => object.set(name, value),
    }
}

/// Typed reading of an unclaimed simple root: integers, then doubles,
/// then booleans, else the raw text.
fn best_effort_value(text: &str) -> Value {
    for schema_type in [SchemaType::long(), SchemaType::double(), SchemaType::boolean()] {
        if let Ok(value) = lexical_to_value(text, &schema_type, None) {
            return value;
        }
    }
    Value::Text(text.to_string())
}
