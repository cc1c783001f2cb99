//! Object-to-XML marshalling
//!
//! One [`Marshaller`] call turns a mapped object or a [`RootEnvelope`]
//! into a document, a fragment, a tree or SAX callbacks:
//!
//! - record: the output abstraction and the streaming text writer
//! - node_record: record that assembles an arena document
//! - sax_record: record that drives a content handler
//!
//! The call resolves the root identity (envelope, declared default root,
//! or the root borrowed from the inheritance ancestor), copies the
//! descriptor's namespace resolver, decides `xsi:type` and schema
//! location attributes, and walks the field mappings in declaration
//! order. Mappings whose paths share leading element steps are emitted
//! into one shared grouping element. A descriptor with document
//! preservation enabled is merged into its retained tree instead, so
//! unmapped content survives the round trip.

pub mod node_record;
pub mod record;
pub mod sax_record;

pub use node_record::NodeRecord;
pub use record::{replay_document, MarshalRecord, WriterRecord};
pub use sax_record::SaxRecord;

use std::borrow::Cow;
use std::io::Write;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::context::BindingContext;
use crate::conversion::{resolve_schema_type, value_to_lexical, SchemaType};
use crate::core::qname::ns;
use crate::descriptor::TypeDescriptor;
use crate::error::{BindError, ErrorHandler, ErrorResolution};
use crate::mapping::{FieldMapping, MappingKind};
use crate::namespace::NamespaceResolver;
use crate::path::PathFragment;
use crate::root::RootEnvelope;
use crate::sax::ContentHandler;
use crate::tree::{serialize_document, Document, NodeId, SerializeOptions};
use crate::value::{DataObject, Value};

static NULL_VALUE: Value = Value::Null;

/// What one marshal call starts from: a plain value or an envelope that
/// overrides the root identity.
#[derive(Debug, Clone, PartialEq)]
pub enum MarshalSource {
    Value(Value),
    Envelope(RootEnvelope),
}

impl From<Value> for MarshalSource {
    fn from(value: Value) -> Self {
        MarshalSource::Value(value)
    }
}

impl From<DataObject> for MarshalSource {
    fn from(object: DataObject) -> Self {
        MarshalSource::Value(Value::Object(object))
    }
}

impl From<&DataObject> for MarshalSource {
    fn from(object: &DataObject) -> Self {
        MarshalSource::Value(Value::Object(object.snapshot()))
    }
}

impl From<RootEnvelope> for MarshalSource {
    fn from(envelope: RootEnvelope) -> Self {
        MarshalSource::Envelope(envelope)
    }
}

/// Callbacks fired around each object, the root first and composite
/// children as they are reached.
#[allow(unused_variables)]
pub trait MarshalListener {
    fn before_marshal(&mut self, object: &DataObject) {}
    fn after_marshal(&mut self, object: &DataObject) {}
}

/// Root identity for one call, resolved from the envelope or descriptor.
struct RootIdentity {
    prefix: Option<String>,
    local_name: String,
    namespace_uri: Option<String>,
    /// The identity came from an envelope, explicit or synthesized; only
    /// wrapped roots can carry an `xsi:type` discriminator.
    wrapped: bool,
}

/// One mapping still to emit, with the next path step to take.
#[derive(Clone, Copy)]
struct PendingField<'v> {
    mapping: &'v FieldMapping,
    value: &'v Value,
    step: usize,
}

/// Mappings sharing one leading element step.
struct FieldGroup<'v> {
    fragment: &'v PathFragment,
    members: Vec<PendingField<'v>>,
}

/// Driver for object-to-XML calls. Obtained from
/// [`BindingContext::create_marshaller`]; per-call state lives on the
/// call stack, so one instance can serve many sequential calls.
pub struct Marshaller<'a> {
    context: &'a BindingContext,
    formatted: bool,
    fragment: bool,
    encoding: String,
    schema_location: Option<String>,
    no_namespace_schema_location: Option<String>,
    listener: Option<Box<dyn MarshalListener>>,
    error_handler: Option<Box<dyn ErrorHandler>>,
}

impl<'a> Marshaller<'a> {
    pub fn new(context: &'a BindingContext) -> Self {
        Marshaller {
            context,
            formatted: true,
            fragment: false,
            encoding: "UTF-8".to_string(),
            schema_location: None,
            no_namespace_schema_location: None,
            listener: None,
            error_handler: None,
        }
    }

    /// Pretty-print output with three-space indentation. On by default.
    pub fn set_formatted_output(&mut self, formatted: bool) -> &mut Self {
        self.formatted = formatted;
        self
    }

    pub fn formatted_output(&self) -> bool {
        self.formatted
    }

    /// Suppress the XML declaration and document events.
    pub fn set_fragment(&mut self, fragment: bool) -> &mut Self {
        self.fragment = fragment;
        self
    }

    pub fn is_fragment(&self) -> bool {
        self.fragment
    }

    /// Encoding label for the declaration and for byte output.
    pub fn set_encoding(&mut self, encoding: &str) -> &mut Self {
        self.encoding = encoding.to_string();
        self
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    /// Value for an `xsi:schemaLocation` attribute on the root element.
    pub fn set_schema_location(&mut self, location: &str) -> &mut Self {
        self.schema_location = Some(location.to_string());
        self
    }

    pub fn schema_location(&self) -> Option<&str> {
        self.schema_location.as_deref()
    }

    /// Value for an `xsi:noNamespaceSchemaLocation` attribute.
    pub fn set_no_namespace_schema_location(&mut self, location: &str) -> &mut Self {
        self.no_namespace_schema_location = Some(location.to_string());
        self
    }

    pub fn no_namespace_schema_location(&self) -> Option<&str> {
        self.no_namespace_schema_location.as_deref()
    }

    /// Install before/after callbacks fired per marshalled object.
    pub fn set_marshal_listener<L: MarshalListener + 'static>(&mut self, listener: L) -> &mut Self {
        self.listener = Some(Box::new(listener));
        self
    }

    /// Install a handler consulted when a field value fails to convert.
    /// Without one every conversion failure propagates.
    pub fn set_error_handler<H: ErrorHandler + 'static>(&mut self, handler: H) -> &mut Self {
        self.error_handler = Some(Box::new(handler));
        self
    }

    /// Convert one field value to text, routing failures through the
    /// installed error handler.
    fn field_lexical(&self, mapping: &FieldMapping, value: &Value) -> Result<String, BindError> {
        let error = match joined_lexical(mapping, value) {
            Ok(text) => return Ok(text),
            Err(error) => error,
        };
        let handler = match &self.error_handler {
            Some(handler) => handler,
            None => return Err(error),
        };
        match handler.handle(&error) {
            ErrorResolution::Rethrow => Err(error),
            ErrorResolution::Retry => joined_lexical(mapping, value),
            ErrorResolution::Substitute(replacement) => {
                warn!(
                    field = mapping.attribute_name(),
                    "error handler substituted a field value"
                );
                joined_lexical(mapping, &replacement)
            }
        }
    }

    // ----- entry points -----

    /// Marshal into an owned string.
    pub fn marshal_to_string(
        &mut self,
        source: impl Into<MarshalSource>,
    ) -> Result<String, BindError> {
        let source = source.into();
        self.render(&source)
    }

    /// Marshal into a byte sink, encoding per [`Self::set_encoding`].
    pub fn marshal_to_writer<W: Write>(
        &mut self,
        source: impl Into<MarshalSource>,
        writer: &mut W,
    ) -> Result<(), BindError> {
        let source = source.into();
        let label = self.effective_encoding(&source);
        let text = self.render(&source)?;
        let bytes = encode_output(&text, &label)?;
        writer.write_all(&bytes)?;
        Ok(())
    }

    /// Marshal into a detached document tree.
    pub fn marshal_to_document(
        &mut self,
        source: impl Into<MarshalSource>,
    ) -> Result<Document, BindError> {
        let source = source.into();
        if let Some(doc) = self.preserved_output(&source)? {
            return Ok(doc);
        }
        let mut record = NodeRecord::new();
        self.emit(&source, &mut record)?;
        Ok(record.into_document())
    }

    /// Marshal as SAX callbacks. Fragment mode suppresses the
    /// start/end-document notifications.
    pub fn marshal_to_handler<H: ContentHandler>(
        &mut self,
        source: impl Into<MarshalSource>,
        handler: &mut H,
    ) -> Result<(), BindError> {
        let source = source.into();
        if let Some(doc) = self.preserved_output(&source)? {
            let mut record = SaxRecord::new(handler);
            return replay_document(&doc, &mut record, !self.fragment);
        }
        let mut record = SaxRecord::new(handler);
        self.emit(&source, &mut record)
    }

    /// Marshal into a caller-supplied record.
    pub fn marshal_to_record<R: MarshalRecord>(
        &mut self,
        source: impl Into<MarshalSource>,
        record: &mut R,
    ) -> Result<(), BindError> {
        let source = source.into();
        if let Some(doc) = self.preserved_output(&source)? {
            return replay_document(&doc, record, !self.fragment);
        }
        self.emit(&source, record)
    }

    // ----- text rendering -----

    fn render(&mut self, source: &MarshalSource) -> Result<String, BindError> {
        if let Some(doc) = self.preserved_output(source)? {
            // preserved layout wins over the formatted option
            let options = SerializeOptions {
                formatted: false,
                xml_declaration: !self.fragment,
                encoding: Some(self.effective_encoding(source)),
            };
            return Ok(serialize_document(&doc, &options));
        }
        if self.formatted {
            let mut record = NodeRecord::new();
            self.emit(source, &mut record)?;
            let options = SerializeOptions {
                formatted: true,
                xml_declaration: !self.fragment,
                encoding: Some(self.effective_encoding(source)),
            };
            Ok(serialize_document(&record.into_document(), &options))
        } else {
            let mut record = WriterRecord::new();
            self.emit(source, &mut record)?;
            Ok(record.into_string())
        }
    }

    fn effective_encoding(&self, source: &MarshalSource) -> String {
        match source {
            MarshalSource::Envelope(envelope) => {
                envelope.encoding().unwrap_or(&self.encoding).to_string()
            }
            MarshalSource::Value(_) => self.encoding.clone(),
        }
    }

    // ----- the marshal pass -----

    fn emit<R: MarshalRecord>(
        &mut self,
        source: &MarshalSource,
        record: &mut R,
    ) -> Result<(), BindError> {
        let (payload, envelope) = match source {
            MarshalSource::Value(value) => (value, None),
            MarshalSource::Envelope(envelope) => (envelope.payload(), Some(envelope)),
        };
        match payload {
            Value::Null if envelope.is_none() => return Err(BindError::NullArgument("object")),
            Value::List(_) => {
                return Err(BindError::Validation {
                    class: "collection".to_string(),
                    reason: "a collection cannot form a document root".to_string(),
                })
            }
            _ => {}
        }

        let object = match payload {
            Value::Object(object) => Some(object),
            _ => None,
        };
        let descriptor = match object {
            Some(object) => Some(self.context.descriptor_for_object(object)?),
            None => None,
        };

        // Root identity: the envelope as given, else the declared default
        // root, else the root borrowed from the inheritance ancestor
        let root = match (envelope, &descriptor) {
            (Some(envelope), _) => RootIdentity {
                prefix: None,
                local_name: envelope.local_name().to_string(),
                namespace_uri: envelope.namespace_uri().map(str::to_string),
                wrapped: true,
            },
            (None, Some(descriptor)) => match descriptor.default_root() {
                Some(declared) => RootIdentity {
                    prefix: declared.prefix().map(str::to_string),
                    local_name: declared.local_name().to_string(),
                    namespace_uri: declared.namespace_uri().map(str::to_string),
                    wrapped: false,
                },
                None => {
                    let ancestor = self.context.inheritance_root(descriptor);
                    let declared = ancestor.default_root().ok_or_else(|| BindError::Validation {
                        class: descriptor.host_class().to_string(),
                        reason: "no default root element declared".to_string(),
                    })?;
                    RootIdentity {
                        prefix: declared.prefix().map(str::to_string),
                        local_name: declared.local_name().to_string(),
                        namespace_uri: declared.namespace_uri().map(str::to_string),
                        wrapped: true,
                    }
                }
            },
            (None, None) => {
                return Err(BindError::Validation {
                    class: "simple value".to_string(),
                    reason: "simple values need a root envelope to name the root element"
                        .to_string(),
                })
            }
        };

        // An xsi:type discriminator is written only for wrapped roots of
        // hinted descriptors whose identity matches no declared root
        let type_attribute: Option<SchemaType> = match &descriptor {
            Some(descriptor) if root.wrapped => {
                let hinted = descriptor.inheritance_parent().is_some()
                    || descriptor.schema_type_reference().is_some();
                if hinted
                    && descriptor
                        .should_wrap_object(root.namespace_uri.as_deref(), &root.local_name)
                {
                    descriptor.schema_type_reference().cloned()
                } else {
                    None
                }
            }
            _ => None,
        };

        let schema_location: Option<String> = envelope
            .and_then(|e| e.schema_location())
            .map(str::to_string)
            .or_else(|| self.schema_location.clone());
        let no_namespace_location: Option<String> = envelope
            .and_then(|e| e.no_namespace_schema_location())
            .map(str::to_string)
            .or_else(|| self.no_namespace_schema_location.clone());
        let root_nil = envelope.is_some_and(|e| e.is_nil());

        let mut resolver = match &descriptor {
            Some(descriptor) => descriptor.namespace_resolver().clone(),
            None => NamespaceResolver::new(),
        };

        // Bind everything the root attributes will reference before the
        // declarations are emitted
        let needs_xsi = type_attribute.is_some()
            || root_nil
            || schema_location.is_some()
            || no_namespace_location.is_some()
            || descriptor
                .as_ref()
                .is_some_and(|d| d.field_mappings().iter().any(|m| m.is_nillable()));
        if needs_xsi && resolver.resolve_prefix(ns::XSI).is_none() {
            let prefix = resolver.generate_prefix(Some(ns::XSI_PREFIX));
            resolver.put(prefix, ns::XSI);
        }
        if let Some(schema_type) = &type_attribute {
            if let Some(uri) = schema_type.namespace_uri() {
                if resolver.resolve_prefix(uri).is_none() {
                    let prefix = resolver.generate_prefix(None);
                    resolver.put(prefix, uri);
                }
            }
        }
        let root_prefix: Option<String> = match (&root.prefix, &root.namespace_uri) {
            (Some(prefix), _) => Some(prefix.clone()),
            (None, Some(uri)) => {
                if resolver.default_namespace_uri() == Some(uri.as_str()) {
                    None
                } else if let Some(prefix) = resolver.resolve_prefix(uri) {
                    Some(prefix.to_string())
                } else {
                    let prefix = resolver.generate_prefix(None);
                    resolver.put(prefix.clone(), uri.clone());
                    Some(prefix)
                }
            }
            (None, None) => None,
        };

        if let Some(descriptor) = &descriptor {
            debug!(
                class = %descriptor.host_class(),
                root = %root.local_name,
                "marshalling object"
            );
        }

        if !self.fragment {
            let version = match envelope {
                Some(envelope) => envelope.xml_version().unwrap_or("1.0"),
                None => "1.0",
            };
            let encoding = self.effective_encoding(source);
            record.start_document(version, Some(&encoding))?;
        }

        if let Some(object) = object {
            self.notify_before(object);
        }
        record.open_element(
            root_prefix.as_deref(),
            &root.local_name,
            root.namespace_uri.as_deref(),
        )?;
        if let Some(uri) = resolver.default_namespace_uri() {
            record.namespace_declaration(None, uri)?;
        }
        for (prefix, uri) in resolver.namespaces() {
            record.namespace_declaration(Some(prefix), uri)?;
        }
        if let Some(location) = &schema_location {
            let xsi = xsi_prefix(record, &resolver)?;
            record.attribute(Some(&xsi), "schemaLocation", Some(ns::XSI), location)?;
        }
        if let Some(location) = &no_namespace_location {
            let xsi = xsi_prefix(record, &resolver)?;
            record.attribute(
                Some(&xsi),
                "noNamespaceSchemaLocation",
                Some(ns::XSI),
                location,
            )?;
        }
        if let Some(schema_type) = &type_attribute {
            write_type_attribute(record, &resolver, schema_type)?;
        }
        if root_nil {
            write_nil_attribute(record, &resolver)?;
        }

        match (object, &descriptor) {
            (Some(object), Some(descriptor)) if !root_nil => {
                let fields = pending_fields(descriptor, object);
                self.write_fields(record, &resolver, fields)?;
            }
            _ => {
                if !root_nil && !matches!(payload, Value::Null) {
                    let schema_type = resolve_schema_type(payload.kind(), None)?;
                    let text = value_to_lexical(payload, &schema_type)?;
                    record.characters(&text)?;
                }
            }
        }

        record.close_element()?;
        if let Some(object) = object {
            self.notify_after(object);
        }
        if !self.fragment {
            record.end_document()?;
        }
        Ok(())
    }

    /// Emit one level of mappings into the currently open element.
    /// Attributes and nil markers go first, while the start tag is still
    /// open, then character content, then grouped child elements.
    fn write_fields<'v, R: MarshalRecord>(
        &mut self,
        record: &mut R,
        scope: &NamespaceResolver,
        fields: Vec<PendingField<'v>>,
    ) -> Result<(), BindError> {
        let mut content: Vec<(&'v FieldMapping, &'v Value)> = Vec::new();
        let mut groups: Vec<FieldGroup<'v>> = Vec::new();

        for field in &fields {
            let fragments = field.mapping.path().fragments();
            if field.step >= fragments.len() {
                content.push((field.mapping, field.value));
                continue;
            }
            let fragment = &fragments[field.step];
            if fragment.is_attribute {
                if !matches!(field.value, Value::Null) {
                    let text = self.field_lexical(field.mapping, field.value)?;
                    record.attribute(
                        fragment.prefix.as_deref(),
                        &fragment.local_name,
                        fragment.namespace_uri.as_deref(),
                        &text,
                    )?;
                }
            } else if fragment.is_text || fragment.is_self {
                content.push((field.mapping, field.value));
            } else {
                let advanced = PendingField {
                    step: field.step + 1,
                    ..*field
                };
                match groups
                    .iter_mut()
                    .find(|group| group.fragment.raw_name == fragment.raw_name)
                {
                    Some(group) => group.members.push(advanced),
                    None => groups.push(FieldGroup {
                        fragment,
                        members: vec![advanced],
                    }),
                }
            }
        }

        for (mapping, value) in &content {
            if matches!(value, Value::Null) && mapping.is_nillable() {
                write_nil_attribute(record, scope)?;
            }
        }
        for (mapping, value) in content {
            if matches!(value, Value::Null) {
                continue;
            }
            self.write_value(record, scope, mapping, value)?;
        }
        for group in groups {
            self.write_group(record, scope, group)?;
        }
        Ok(())
    }

    fn write_group<R: MarshalRecord>(
        &mut self,
        record: &mut R,
        scope: &NamespaceResolver,
        group: FieldGroup<'_>,
    ) -> Result<(), BindError> {
        let fragment = group.fragment;

        // A repeated value owns its element name: one element per item
        if let [member] = group.members.as_slice() {
            if member_is_value(member) {
                if let Value::List(items) = member.value {
                    if !member.mapping.uses_single_node() {
                        for item in items {
                            self.write_item(record, scope, fragment, member.mapping, item)?;
                        }
                        return Ok(());
                    }
                }
            }
        }

        let live = group
            .members
            .iter()
            .any(|m| !matches!(m.value, Value::Null) || m.mapping.is_nillable());
        if !live {
            return Ok(());
        }

        record.open_element(
            fragment.prefix.as_deref(),
            &fragment.local_name,
            fragment.namespace_uri.as_deref(),
        )?;
        self.write_fields(record, scope, group.members)?;
        record.close_element()?;
        Ok(())
    }

    fn write_item<R: MarshalRecord>(
        &mut self,
        record: &mut R,
        scope: &NamespaceResolver,
        fragment: &PathFragment,
        mapping: &FieldMapping,
        item: &Value,
    ) -> Result<(), BindError> {
        if matches!(item, Value::Null) && !mapping.is_nillable() {
            return Ok(());
        }
        record.open_element(
            fragment.prefix.as_deref(),
            &fragment.local_name,
            fragment.namespace_uri.as_deref(),
        )?;
        if matches!(item, Value::Null) {
            write_nil_attribute(record, scope)?;
        } else {
            self.write_value(record, scope, mapping, item)?;
        }
        record.close_element()?;
        Ok(())
    }

    /// Write one value into the open element: nested object content for
    /// composite mappings, converted text otherwise.
    fn write_value<R: MarshalRecord>(
        &mut self,
        record: &mut R,
        scope: &NamespaceResolver,
        mapping: &FieldMapping,
        value: &Value,
    ) -> Result<(), BindError> {
        if let MappingKind::Composite { .. } = mapping.kind() {
            return match value {
                Value::Object(object) => self.write_composite(record, scope, mapping, object),
                _ => Err(BindError::Validation {
                    class: mapping.reference_class().unwrap_or_default().to_string(),
                    reason: format!(
                        "field '{}' requires an object value",
                        mapping.attribute_name()
                    ),
                }),
            };
        }
        let text = self.field_lexical(mapping, value)?;
        if mapping.is_cdata() {
            record.cdata(&text)
        } else {
            record.characters(&text)
        }
    }

    fn write_composite<R: MarshalRecord>(
        &mut self,
        record: &mut R,
        scope: &NamespaceResolver,
        mapping: &FieldMapping,
        object: &DataObject,
    ) -> Result<(), BindError> {
        let descriptor = self.composite_descriptor(mapping, object)?;
        if mapping.reference_class() != Some(descriptor.host_class()) {
            if let Some(schema_type) = descriptor.schema_type_reference() {
                write_type_attribute(record, scope, schema_type)?;
            }
        }
        let child_scope = extend_scope(record, scope, descriptor.namespace_resolver())?;
        self.notify_before(object);
        let fields = pending_fields(&descriptor, object);
        self.write_fields(record, &child_scope, fields)?;
        self.notify_after(object);
        Ok(())
    }

    /// Descriptor for a nested object: the object's own class when it is
    /// registered, the declared reference class otherwise.
    fn composite_descriptor(
        &self,
        mapping: &FieldMapping,
        object: &DataObject,
    ) -> Result<Arc<TypeDescriptor>, BindError> {
        if let Some(reference) = mapping.reference_class() {
            if object.class_name() == reference || !self.context.has_class(object.class_name()) {
                return self.context.descriptor_for_class(reference);
            }
        }
        self.context.descriptor_for_object(object)
    }

    // ----- document preservation -----

    /// When the descriptor preserves documents and a retained tree exists
    /// for this instance, merge into a copy of that tree.
    fn preserved_output(&mut self, source: &MarshalSource) -> Result<Option<Document>, BindError> {
        let object = match source {
            MarshalSource::Value(Value::Object(object)) => object,
            _ => return Ok(None),
        };
        if !self.context.has_class(object.class_name()) {
            return Ok(None);
        }
        let descriptor = self.context.descriptor_for_object(object)?;
        if !descriptor.preserve_document() {
            return Ok(None);
        }
        let retained = match self.context.preservation().lookup(object.instance_key()) {
            Some(entry) => entry,
            None => return Ok(None),
        };
        debug!(
            key = object.instance_key(),
            "merging into a preserved document"
        );
        let mut doc = retained.document.clone();
        let node = retained.node;
        self.notify_before(object);
        self.merge_object(&mut doc, node, object, &descriptor)?;
        self.notify_after(object);
        Ok(Some(doc))
    }

    fn merge_object(
        &mut self,
        doc: &mut Document,
        element: NodeId,
        object: &DataObject,
        descriptor: &TypeDescriptor,
    ) -> Result<(), BindError> {
        for mapping in descriptor.field_mappings() {
            let value = object.get(mapping.attribute_name()).unwrap_or(&NULL_VALUE);
            self.merge_field(doc, element, mapping, value)?;
        }
        Ok(())
    }

    fn merge_field(
        &mut self,
        doc: &mut Document,
        element: NodeId,
        mapping: &FieldMapping,
        value: &Value,
    ) -> Result<(), BindError> {
        let path = mapping.path();
        let fragments = path.fragments();

        if path.is_self_path() {
            match value {
                Value::Null => doc.set_text_content(element, ""),
                _ => {
                    let text = self.field_lexical(mapping, value)?;
                    doc.set_text_content(element, text);
                }
            }
            return Ok(());
        }

        if path.targets_attribute() {
            let leaf = fragments.len() - 1;
            let parent = ensure_chain(doc, element, &fragments[..leaf]);
            let fragment = &fragments[leaf];
            match value {
                Value::Null => {
                    doc.remove_attribute(
                        parent,
                        fragment.namespace_uri.as_deref(),
                        &fragment.local_name,
                    );
                }
                _ => {
                    let text = self.field_lexical(mapping, value)?;
                    doc.set_attribute(
                        parent,
                        fragment.prefix.as_deref(),
                        &fragment.local_name,
                        fragment.namespace_uri.as_deref(),
                        text,
                    );
                }
            }
            return Ok(());
        }

        // The last element step carries the value; a trailing text() step
        // only marks the content position
        let leaf = if fragments.last().is_some_and(|f| f.is_text) {
            fragments.len() - 1
        } else {
            fragments.len()
        };
        if leaf == 0 {
            // bare text() path, content of the mapped element itself
            match value {
                Value::Null => doc.set_text_content(element, ""),
                _ => {
                    let text = self.field_lexical(mapping, value)?;
                    doc.set_text_content(element, text);
                }
            }
            return Ok(());
        }
        let leaf_fragment = &fragments[leaf - 1];
        let parent = ensure_chain(doc, element, &fragments[..leaf - 1]);

        if let MappingKind::Composite { .. } = mapping.kind() {
            return self.merge_composite(doc, parent, leaf_fragment, mapping, value);
        }

        match value {
            Value::Null => {
                if let Some(existing) = doc.find_child_element(
                    parent,
                    leaf_fragment.namespace_uri.as_deref(),
                    &leaf_fragment.local_name,
                ) {
                    if mapping.is_nillable() {
                        doc.set_text_content(existing, "");
                        doc.set_attribute(
                            existing,
                            Some(ns::XSI_PREFIX),
                            "nil",
                            Some(ns::XSI),
                            "true",
                        );
                    } else {
                        doc.remove_child(parent, existing);
                    }
                }
            }
            Value::List(items) if !mapping.uses_single_node() => {
                let existing: Vec<NodeId> = doc
                    .child_elements_named(
                        parent,
                        leaf_fragment.namespace_uri.as_deref(),
                        &leaf_fragment.local_name,
                    )
                    .collect();
                for id in existing {
                    doc.remove_child(parent, id);
                }
                for item in items {
                    if matches!(item, Value::Null) {
                        continue;
                    }
                    let text = self.field_lexical(mapping, item)?;
                    let leaf_id = create_leaf(doc, parent, leaf_fragment);
                    set_leaf_text(doc, leaf_id, mapping, text);
                }
            }
            _ => {
                let text = self.field_lexical(mapping, value)?;
                let leaf_id = ensure_child(doc, parent, leaf_fragment);
                set_leaf_text(doc, leaf_id, mapping, text);
            }
        }
        Ok(())
    }

    fn merge_composite(
        &mut self,
        doc: &mut Document,
        parent: NodeId,
        fragment: &PathFragment,
        mapping: &FieldMapping,
        value: &Value,
    ) -> Result<(), BindError> {
        match value {
            Value::Null => {
                let existing: Vec<NodeId> = doc
                    .child_elements_named(
                        parent,
                        fragment.namespace_uri.as_deref(),
                        &fragment.local_name,
                    )
                    .collect();
                for id in existing {
                    doc.remove_child(parent, id);
                }
            }
            Value::Object(object) => {
                let element = ensure_child(doc, parent, fragment);
                let descriptor = self.composite_descriptor(mapping, object)?;
                self.notify_before(object);
                self.merge_object(doc, element, object, &descriptor)?;
                self.notify_after(object);
            }
            Value::List(items) => {
                let existing: Vec<NodeId> = doc
                    .child_elements_named(
                        parent,
                        fragment.namespace_uri.as_deref(),
                        &fragment.local_name,
                    )
                    .collect();
                for (index, item) in items.iter().enumerate() {
                    let object = match item {
                        Value::Object(object) => object,
                        Value::Null => continue,
                        _ => {
                            return Err(BindError::Validation {
                                class: mapping.reference_class().unwrap_or_default().to_string(),
                                reason: format!(
                                    "field '{}' requires object values",
                                    mapping.attribute_name()
                                ),
                            })
                        }
                    };
                    let element = match existing.get(index) {
                        Some(&id) => id,
                        None => create_leaf(doc, parent, fragment),
                    };
                    let descriptor = self.composite_descriptor(mapping, object)?;
                    self.notify_before(object);
                    self.merge_object(doc, element, object, &descriptor)?;
                    self.notify_after(object);
                }
                for &extra in existing.iter().skip(items.len()) {
                    doc.remove_child(parent, extra);
                }
            }
            _ => {
                return Err(BindError::Validation {
                    class: mapping.reference_class().unwrap_or_default().to_string(),
                    reason: format!(
                        "field '{}' requires an object value",
                        mapping.attribute_name()
                    ),
                })
            }
        }
        Ok(())
    }

    fn notify_before(&mut self, object: &DataObject) {
        if let Some(listener) = self.listener.as_mut() {
            listener.before_marshal(object);
        }
    }

    fn notify_after(&mut self, object: &DataObject) {
        if let Some(listener) = self.listener.as_mut() {
            listener.after_marshal(object);
        }
    }
}

// ----- helpers -----

fn pending_fields<'v>(descriptor: &'v TypeDescriptor, object: &'v DataObject) -> Vec<PendingField<'v>> {
    descriptor
        .field_mappings()
        .iter()
        .map(|mapping| PendingField {
            mapping,
            value: object.get(mapping.attribute_name()).unwrap_or(&NULL_VALUE),
            step: 0,
        })
        .collect()
}

/// True when the member's remaining path is just this element's content.
fn member_is_value(member: &PendingField<'_>) -> bool {
    let fragments = member.mapping.path().fragments();
    member.step >= fragments.len()
        || (member.step + 1 == fragments.len() && fragments[member.step].is_text)
}

/// Convert one value to text; list values are joined with single spaces,
/// null items skipped.
fn joined_lexical(mapping: &FieldMapping, value: &Value) -> Result<String, BindError> {
    match value {
        Value::List(items) => {
            let mut out = String::new();
            let mut first = true;
            for item in items {
                if matches!(item, Value::Null) {
                    continue;
                }
                if !first {
                    out.push(' ');
                }
                out.push_str(&mapping.lexical_for(item)?);
                first = false;
            }
            Ok(out)
        }
        _ => mapping.lexical_for(value),
    }
}

/// Declare bindings from `additions` that the current scope lacks on the
/// open element, returning the widened scope.
fn extend_scope<'s, R: MarshalRecord>(
    record: &mut R,
    scope: &'s NamespaceResolver,
    additions: &NamespaceResolver,
) -> Result<Cow<'s, NamespaceResolver>, BindError> {
    let mut extended = Cow::Borrowed(scope);
    for (prefix, uri) in additions.namespaces() {
        if extended.resolve_uri(prefix) != Some(uri) {
            record.namespace_declaration(Some(prefix), uri)?;
            extended.to_mut().put(prefix, uri);
        }
    }
    if let Some(uri) = additions.default_namespace_uri() {
        if extended.default_namespace_uri() != Some(uri) {
            record.namespace_declaration(None, uri)?;
            extended.to_mut().set_default_namespace_uri(uri);
        }
    }
    Ok(extended)
}

/// The prefix for the schema-instance namespace, declaring it on the open
/// element when the scope has no binding.
fn xsi_prefix<R: MarshalRecord>(
    record: &mut R,
    scope: &NamespaceResolver,
) -> Result<String, BindError> {
    if let Some(prefix) = scope.resolve_prefix(ns::XSI) {
        return Ok(prefix.to_string());
    }
    record.namespace_declaration(Some(ns::XSI_PREFIX), ns::XSI)?;
    Ok(ns::XSI_PREFIX.to_string())
}

fn write_nil_attribute<R: MarshalRecord>(
    record: &mut R,
    scope: &NamespaceResolver,
) -> Result<(), BindError> {
    let xsi = xsi_prefix(record, scope)?;
    record.attribute(Some(&xsi), "nil", Some(ns::XSI), "true")
}

fn write_type_attribute<R: MarshalRecord>(
    record: &mut R,
    scope: &NamespaceResolver,
    schema_type: &SchemaType,
) -> Result<(), BindError> {
    let value = match schema_type.namespace_uri() {
        Some(uri) => match scope.resolve_prefix(uri) {
            Some(prefix) => format!("{}:{}", prefix, schema_type.local_name()),
            None => {
                let prefix = scope.generate_prefix(None);
                record.namespace_declaration(Some(&prefix), uri)?;
                format!("{}:{}", prefix, schema_type.local_name())
            }
        },
        None => schema_type.local_name().to_string(),
    };
    let xsi = xsi_prefix(record, scope)?;
    record.attribute(Some(&xsi), "type", Some(ns::XSI), &value)
}

fn ensure_chain(doc: &mut Document, from: NodeId, fragments: &[PathFragment]) -> NodeId {
    let mut current = from;
    for fragment in fragments {
        current = ensure_child(doc, current, fragment);
    }
    current
}

fn ensure_child(doc: &mut Document, parent: NodeId, fragment: &PathFragment) -> NodeId {
    let found = match fragment.index {
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
    };
    match found {
        Some(id) => id,
        None => create_leaf(doc, parent, fragment),
    }
}

fn create_leaf(doc: &mut Document, parent: NodeId, fragment: &PathFragment) -> NodeId {
    let id = doc.create_element(
        fragment.prefix.as_deref(),
        &fragment.local_name,
        fragment.namespace_uri.as_deref(),
    );
    doc.append_child(parent, id);
    id
}

fn set_leaf_text(doc: &mut Document, leaf: NodeId, mapping: &FieldMapping, text: String) {
    doc.remove_attribute(leaf, Some(ns::XSI), "nil");
    if mapping.is_cdata() {
        doc.set_text_content(leaf, "");
        let node = doc.create_cdata(text);
        doc.append_child(leaf, node);
    } else {
        doc.set_text_content(leaf, text);
    }
}

/// Encode finished markup for a byte sink.
fn encode_output(text: &str, label: &str) -> Result<Vec<u8>, BindError> {
    match label.to_ascii_uppercase().as_str() {
        "UTF-8" | "UTF8" => Ok(text.as_bytes().to_vec()),
        "UTF-16" => {
            let mut bytes = vec![0xFE, 0xFF];
            for unit in text.encode_utf16() {
                bytes.extend_from_slice(&unit.to_be_bytes());
            }
            Ok(bytes)
        }
        "UTF-16BE" => {
            let mut bytes = Vec::with_capacity(text.len() * 2);
            for unit in text.encode_utf16() {
                bytes.extend_from_slice(&unit.to_be_bytes());
            }
            Ok(bytes)
        }
        "UTF-16LE" => {
            let mut bytes = Vec::with_capacity(text.len() * 2);
            for unit in text.encode_utf16() {
                bytes.extend_from_slice(&unit.to_le_bytes());
            }
            Ok(bytes)
        }
        _ => Err(BindError::UnsupportedConversion {
            value: label.to_string(),
            target: "an output encoding".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::qname::QualifiedName;
    use crate::sax::{EventCollector, SaxEvent};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn customer_context() -> BindingContext {
        let mut context = BindingContext::new();
        let mut descriptor = TypeDescriptor::new("Customer");
        descriptor.set_default_root_element("customer");
        descriptor.add_field("name", "name/text()").unwrap();
        context.register_descriptor(descriptor).unwrap();
        context
    }

    fn customer(name: &str) -> DataObject {
        DataObject::new("Customer").with("name", name)
    }

    #[test]
    fn test_fragment_unformatted_output() {
        let context = customer_context();
        let mut marshaller = context.create_marshaller();
        marshaller.set_fragment(true).set_formatted_output(false);
        let out = marshaller.marshal_to_string(customer("Ada")).unwrap();
        assert_eq!(out, "<customer><name>Ada</name></customer>");
    }

    #[test]
    fn test_formatted_output_with_declaration() {
        let context = customer_context();
        let mut marshaller = context.create_marshaller();
        let out = marshaller.marshal_to_string(customer("Ada")).unwrap();
        assert_eq!(
            out,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <customer>\n   <name>Ada</name>\n</customer>"
        );
    }

    #[test]
    fn test_attribute_and_shared_grouping_element() {
        let mut context = BindingContext::new();
        let mut descriptor = TypeDescriptor::new("Customer");
        descriptor.set_default_root_element("customer");
        descriptor.add_field("id", "@id").unwrap();
        descriptor.add_field("street", "address/street/text()").unwrap();
        descriptor.add_field("city", "address/city/text()").unwrap();
        context.register_descriptor(descriptor).unwrap();

        let object = DataObject::new("Customer")
            .with("id", Value::Integer(7))
            .with("street", "12 Main")
            .with("city", "Toronto");
        let mut marshaller = context.create_marshaller();
        marshaller.set_fragment(true).set_formatted_output(false);
        let out = marshaller.marshal_to_string(object).unwrap();
        assert_eq!(
            out,
            "<customer id=\"7\"><address><street>12 Main</street>\
             <city>Toronto</city></address></customer>"
        );
    }

    #[test]
    fn test_collection_fields() {
        let mut context = BindingContext::new();
        let mut descriptor = TypeDescriptor::new("Customer");
        descriptor.set_default_root_element("customer");
        descriptor.add_field("emails", "email").unwrap();
        descriptor
            .add_field("tags", "tags/text()")
            .unwrap()
            .set_uses_single_node(true);
        context.register_descriptor(descriptor).unwrap();

        let object = DataObject::new("Customer")
            .with(
                "emails",
                vec![Value::Text("a@x".into()), Value::Text("b@x".into())],
            )
            .with("tags", vec![Value::Text("vip".into()), Value::Text("eu".into())]);
        let mut marshaller = context.create_marshaller();
        marshaller.set_fragment(true).set_formatted_output(false);
        let out = marshaller.marshal_to_string(object).unwrap();
        assert_eq!(
            out,
            "<customer><email>a@x</email><email>b@x</email><tags>vip eu</tags></customer>"
        );
    }

    #[test]
    fn test_envelope_overrides_root_name() {
        let context = customer_context();
        let envelope = RootEnvelope::new("client", customer("Ada"));
        let mut marshaller = context.create_marshaller();
        marshaller.set_fragment(true).set_formatted_output(false);
        let out = marshaller.marshal_to_string(envelope).unwrap();
        assert_eq!(out, "<client><name>Ada</name></client>");
    }

    #[test]
    fn test_envelope_carries_simple_value() {
        let context = BindingContext::new();
        let mut marshaller = context.create_marshaller();
        marshaller.set_fragment(true).set_formatted_output(false);
        let out = marshaller
            .marshal_to_string(RootEnvelope::new("count", Value::Integer(5)))
            .unwrap();
        assert_eq!(out, "<count>5</count>");
    }

    #[test]
    fn test_simple_value_without_envelope_rejected() {
        let context = BindingContext::new();
        let mut marshaller = context.create_marshaller();
        let err = marshaller
            .marshal_to_string(Value::Text("loose".into()))
            .unwrap_err();
        assert_eq!(err.code(), 25006);
    }

    #[test]
    fn test_null_object_rejected() {
        let context = BindingContext::new();
        let mut marshaller = context.create_marshaller();
        let err = marshaller.marshal_to_string(Value::Null).unwrap_err();
        assert_eq!(err.code(), 25001);
    }

    #[test]
    fn test_collection_root_rejected() {
        let context = BindingContext::new();
        let mut marshaller = context.create_marshaller();
        let err = marshaller
            .marshal_to_string(Value::List(vec![Value::Integer(1)]))
            .unwrap_err();
        assert_eq!(err.code(), 25006);
    }

    #[test]
    fn test_unmapped_object_rejected() {
        let context = BindingContext::new();
        let mut marshaller = context.create_marshaller();
        let err = marshaller
            .marshal_to_string(DataObject::new("Ghost"))
            .unwrap_err();
        assert_eq!(err.code(), 25003);
    }

    #[test]
    fn test_inherited_root_writes_type_discriminator() {
        let mut context = BindingContext::new();
        let mut parent = TypeDescriptor::new("Person");
        parent.set_default_root_element("person");
        parent.add_field("name", "name/text()").unwrap();
        context.register_descriptor(parent).unwrap();

        let mut child = TypeDescriptor::new("Employee");
        child.set_inheritance_parent("Person");
        child.set_schema_type_reference(SchemaType::new(QualifiedName::new(
            Some("http://hr"),
            "employee-type",
        )));
        child.add_field("name", "name/text()").unwrap();
        context.register_descriptor(child).unwrap();

        let object = DataObject::new("Employee").with("name", "Grace");
        let mut marshaller = context.create_marshaller();
        marshaller.set_fragment(true).set_formatted_output(false);
        let out = marshaller.marshal_to_string(object).unwrap();
        assert!(out.starts_with("<person "), "root should come from the ancestor: {out}");
        assert!(out.contains("xsi:type=\"ns0:employee-type\""), "{out}");
        assert!(out.contains("xmlns:ns0=\"http://hr\""), "{out}");
        assert!(out.contains("xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\""), "{out}");
    }

    #[test]
    fn test_nillable_field_writes_nil_marker() {
        let mut context = BindingContext::new();
        let mut descriptor = TypeDescriptor::new("Customer");
        descriptor.set_default_root_element("customer");
        descriptor.add_field("name", "name/text()").unwrap();
        descriptor
            .add_field("nickname", "nickname/text()")
            .unwrap()
            .set_nillable(true);
        descriptor.add_field("fax", "fax/text()").unwrap();
        context.register_descriptor(descriptor).unwrap();

        let mut marshaller = context.create_marshaller();
        marshaller.set_fragment(true).set_formatted_output(false);
        let out = marshaller.marshal_to_string(customer("Ada")).unwrap();
        assert_eq!(
            out,
            "<customer xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\">\
             <name>Ada</name><nickname xsi:nil=\"true\"/></customer>"
        );
    }

    #[test]
    fn test_cdata_field() {
        let mut context = BindingContext::new();
        let mut descriptor = TypeDescriptor::new("Customer");
        descriptor.set_default_root_element("customer");
        descriptor
            .add_field("notes", "notes/text()")
            .unwrap()
            .set_is_cdata(true);
        context.register_descriptor(descriptor).unwrap();

        let object = DataObject::new("Customer").with("notes", "<b>bold</b>");
        let mut marshaller = context.create_marshaller();
        marshaller.set_fragment(true).set_formatted_output(false);
        let out = marshaller.marshal_to_string(object).unwrap();
        assert_eq!(out, "<customer><notes><![CDATA[<b>bold</b>]]></notes></customer>");
    }

    #[test]
    fn test_composite_object() {
        let mut context = BindingContext::new();
        let mut address = TypeDescriptor::new("Address");
        address.add_field("city", "city/text()").unwrap();
        context.register_descriptor(address).unwrap();

        let mut descriptor = TypeDescriptor::new("Customer");
        descriptor.set_default_root_element("customer");
        descriptor.add_field("name", "name/text()").unwrap();
        descriptor.add_mapping(FieldMapping::composite("address", "address", "Address").unwrap());
        context.register_descriptor(descriptor).unwrap();

        let object = DataObject::new("Customer")
            .with("name", "Ada")
            .with("address", DataObject::new("Address").with("city", "Toronto"));
        let mut marshaller = context.create_marshaller();
        marshaller.set_fragment(true).set_formatted_output(false);
        let out = marshaller.marshal_to_string(object).unwrap();
        assert_eq!(
            out,
            "<customer><name>Ada</name><address><city>Toronto</city></address></customer>"
        );
    }

    #[test]
    fn test_namespaced_root_with_declared_prefix() {
        let mut context = BindingContext::new();
        let mut resolver = NamespaceResolver::new();
        resolver.put("c", "http://crm");
        let mut descriptor = TypeDescriptor::new("Customer");
        descriptor.set_namespace_resolver(resolver);
        descriptor.set_default_root_element("c:customer");
        descriptor.add_field("name", "name/text()").unwrap();
        context.register_descriptor(descriptor).unwrap();

        let mut marshaller = context.create_marshaller();
        marshaller.set_fragment(true).set_formatted_output(false);
        let out = marshaller.marshal_to_string(customer("Ada")).unwrap();
        assert_eq!(
            out,
            "<c:customer xmlns:c=\"http://crm\"><name>Ada</name></c:customer>"
        );
    }

    #[test]
    fn test_schema_location_attributes() {
        let context = customer_context();
        let mut marshaller = context.create_marshaller();
        marshaller
            .set_fragment(true)
            .set_formatted_output(false)
            .set_schema_location("http://crm crm.xsd")
            .set_no_namespace_schema_location("local.xsd");
        let out = marshaller.marshal_to_string(customer("Ada")).unwrap();
        assert!(out.contains("xsi:schemaLocation=\"http://crm crm.xsd\""), "{out}");
        assert!(out.contains("xsi:noNamespaceSchemaLocation=\"local.xsd\""), "{out}");
        assert!(out.contains("xmlns:xsi="), "{out}");
    }

    #[test]
    fn test_marshal_to_document_tree() {
        let context = customer_context();
        let mut marshaller = context.create_marshaller();
        let doc = marshaller.marshal_to_document(customer("Ada")).unwrap();
        let root = doc.root_element().unwrap();
        assert_eq!(doc.local_name(root), "customer");
        let name = doc.find_child_element(root, None, "name").unwrap();
        assert_eq!(doc.text_content(name), "Ada");
    }

    #[test]
    fn test_marshal_to_handler_events() {
        let context = customer_context();
        let mut collector = EventCollector::new();
        let mut marshaller = context.create_marshaller();
        marshaller
            .marshal_to_handler(customer("Ada"), &mut collector)
            .unwrap();
        let events = collector.events();
        assert_eq!(events[0], SaxEvent::StartDocument);
        assert!(matches!(
            &events[1],
            SaxEvent::StartElement { local_name, .. } if local_name == "customer"
        ));
        assert!(events.contains(&SaxEvent::Characters("Ada".to_string())));
        assert_eq!(events[events.len() - 1], SaxEvent::EndDocument);
    }

    #[test]
    fn test_listener_fires_per_object() {
        struct Recorder(Rc<RefCell<Vec<String>>>);
        impl MarshalListener for Recorder {
            fn before_marshal(&mut self, object: &DataObject) {
                self.0.borrow_mut().push(format!("before {}", object.class_name()));
            }
            fn after_marshal(&mut self, object: &DataObject) {
                self.0.borrow_mut().push(format!("after {}", object.class_name()));
            }
        }

        let mut context = BindingContext::new();
        let mut address = TypeDescriptor::new("Address");
        address.add_field("city", "city/text()").unwrap();
        context.register_descriptor(address).unwrap();
        let mut descriptor = TypeDescriptor::new("Customer");
        descriptor.set_default_root_element("customer");
        descriptor.add_mapping(FieldMapping::composite("address", "address", "Address").unwrap());
        context.register_descriptor(descriptor).unwrap();

        let calls = Rc::new(RefCell::new(Vec::new()));
        let object = DataObject::new("Customer")
            .with("address", DataObject::new("Address").with("city", "Kyiv"));
        let mut marshaller = context.create_marshaller();
        marshaller.set_marshal_listener(Recorder(calls.clone()));
        marshaller.marshal_to_string(object).unwrap();
        assert_eq!(
            *calls.borrow(),
            vec![
                "before Customer".to_string(),
                "before Address".to_string(),
                "after Address".to_string(),
                "after Customer".to_string(),
            ]
        );
    }

    #[test]
    fn test_preserved_document_keeps_foreign_content() {
        let mut context = BindingContext::new();
        let mut descriptor = TypeDescriptor::new("Customer");
        descriptor.set_default_root_element("customer");
        descriptor.add_field("name", "name/text()").unwrap();
        descriptor.set_preserve_document(true);
        context.register_descriptor(descriptor).unwrap();

        let doc = Document::parse_str(
            "<customer exported=\"yes\"><note>keep me</note><name>Old</name></customer>",
        )
        .unwrap();
        let root = doc.root_element().unwrap();
        let object = DataObject::new("Customer").with("name", "New");
        context.preservation().retain(object.instance_key(), doc, root);

        let mut marshaller = context.create_marshaller();
        marshaller.set_fragment(true);
        let out = marshaller.marshal_to_string(object).unwrap();
        assert_eq!(
            out,
            "<customer exported=\"yes\"><note>keep me</note><name>New</name></customer>"
        );
    }

    #[test]
    fn test_utf16_byte_output() {
        let context = customer_context();
        let mut marshaller = context.create_marshaller();
        marshaller
            .set_fragment(true)
            .set_formatted_output(false)
            .set_encoding("UTF-16");
        let mut buffer: Vec<u8> = Vec::new();
        marshaller
            .marshal_to_writer(customer("Ada"), &mut buffer)
            .unwrap();
        assert_eq!(&buffer[..2], &[0xFE, 0xFF]);
        // "<" big-endian
        assert_eq!(&buffer[2..4], &[0x00, 0x3C]);
    }

    #[test]
    fn test_unknown_encoding_rejected() {
        let context = customer_context();
        let mut marshaller = context.create_marshaller();
        marshaller.set_encoding("EBCDIC");
        let mut buffer: Vec<u8> = Vec::new();
        let err = marshaller
            .marshal_to_writer(customer("Ada"), &mut buffer)
            .unwrap_err();
        assert_eq!(err.code(), 25005);
    }

    #[test]
    fn test_error_handler_substitutes_field_value() {
        struct Zeroing;
        impl ErrorHandler for Zeroing {
            fn handle(&self, _error: &BindError) -> ErrorResolution {
                ErrorResolution::Substitute(Value::Integer(0))
            }
        }

        let mut context = BindingContext::new();
        let mut descriptor = TypeDescriptor::new("Customer");
        descriptor.set_default_root_element("customer");
        descriptor
            .add_field("id", "@id")
            .unwrap()
            .set_schema_type(SchemaType::int());
        context.register_descriptor(descriptor).unwrap();

        let object = DataObject::new("Customer").with("id", "not-a-number");
        let mut marshaller = context.create_marshaller();
        marshaller.set_fragment(true).set_formatted_output(false);
        let err = marshaller.marshal_to_string(object.clone()).unwrap_err();
        assert_eq!(err.code(), 25005);

        marshaller.set_error_handler(Zeroing);
        let out = marshaller.marshal_to_string(object).unwrap();
        assert_eq!(out, "<customer id=\"0\"/>");
    }
}
