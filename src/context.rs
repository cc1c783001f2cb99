//! Binding context
//!
//! Owns every registered descriptor plus the document preservation
//! store shared across marshal and unmarshal operations. Descriptors are initialized once at
//! registration and shared immutably afterwards.
//!
//! Indexing rules:
//! - by class: later registrations for the same class replace earlier ones
//! - by root element name: the first registration wins and keeps the name
//! - by schema type: the first registration wins

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::core::qname::QualifiedName;
use crate::descriptor::TypeDescriptor;
use crate::error::BindError;
use crate::marshal::Marshaller;
use crate::preserve::DocumentPreservationStore;
use crate::unmarshal::Unmarshaller;
use crate::validate::Validator;
use crate::value::DataObject;

/// Anything that yields a batch of descriptors for ingestion, a project
/// or session assembled away from the context.
pub trait DescriptorSource {
    fn descriptors(self) -> Vec<TypeDescriptor>;
}

impl DescriptorSource for Vec<TypeDescriptor> {
    fn descriptors(self) -> Vec<TypeDescriptor> {
        self
    }
}

impl DescriptorSource for TypeDescriptor {
    fn descriptors(self) -> Vec<TypeDescriptor> {
        vec![self]
    }
}

/// Registry of descriptors plus shared runtime services
#[derive(Debug)]
pub struct BindingContext {
    by_class: HashMap<String, Arc<TypeDescriptor>>,
    by_root: HashMap<QualifiedName, Arc<TypeDescriptor>>,
    by_schema_type: HashMap<QualifiedName, Arc<TypeDescriptor>>,
    preservation: DocumentPreservationStore,
}

impl BindingContext {
    pub fn new() -> Self {
        BindingContext {
            by_class: HashMap::new(),
            by_root: HashMap::new(),
            by_schema_type: HashMap::new(),
            preservation: DocumentPreservationStore::new(),
        }
    }

    /// Initialize and index a descriptor
    pub fn register_descriptor(&mut self, mut descriptor: TypeDescriptor) -> Result<(), BindError> {
        descriptor.initialize()?;
        let descriptor = Arc::new(descriptor);
        let class = descriptor.host_class().to_string();

        for root in descriptor.root_elements() {
            match self.by_root.entry(root.qualified_name()) {
                Entry::Vacant(slot) => {
                    slot.insert(Arc::clone(&descriptor));
                }
                Entry::Occupied(slot) => {
                    debug!(
                        class = %class,
                        root = %root.raw(),
                        bound_to = %slot.get().host_class(),
                        "root element name already bound, keeping first registration"
                    );
                }
            }
        }

        if let Some(schema_type) = descriptor.schema_type_reference() {
            self.by_schema_type
                .entry(schema_type.qualified_name().clone())
                .or_insert_with(|| Arc::clone(&descriptor));
        }

        debug!(
            class = %class,
            mappings = descriptor.field_mappings().len(),
            roots = descriptor.root_elements().len(),
            "registered descriptor"
        );
        self.by_class.insert(class, descriptor);
        Ok(())
    }

    /// Register every descriptor a source yields, in its order. The first
    /// registration failure stops ingestion and propagates.
    pub fn add_source<S: DescriptorSource>(&mut self, source: S) -> Result<(), BindError> {
        for descriptor in source.descriptors() {
            self.register_descriptor(descriptor)?;
        }
        Ok(())
    }

    /// Bind an already-registered class to an additional root element
    /// name. A name that is already bound keeps its first registration.
    pub fn add_descriptor_by_qname(
        &mut self,
        name: QualifiedName,
        class: &str,
    ) -> Result<(), BindError> {
        let descriptor = self.descriptor_for_class(class)?;
        match self.by_root.entry(name) {
            Entry::Vacant(slot) => {
                slot.insert(descriptor);
            }
            Entry::Occupied(slot) => {
                debug!(
                    class = %class,
                    bound_to = %slot.get().host_class(),
                    "root element name already bound, keeping first registration"
                );
            }
        }
        Ok(())
    }

    /// Descriptor for a host class name
    pub fn descriptor_for_class(&self, class: &str) -> Result<Arc<TypeDescriptor>, BindError> {
        self.by_class
            .get(class)
            .cloned()
            .ok_or_else(|| BindError::DescriptorNotFound {
                class: class.to_string(),
            })
    }

    /// Descriptor for an object, by its class name
    pub fn descriptor_for_object(&self, object: &DataObject) -> Result<Arc<TypeDescriptor>, BindError> {
        self.descriptor_for_class(object.class_name())
    }

    /// Descriptor bound to a root element name, if any
    pub fn descriptor_for_root(&self, name: &QualifiedName) -> Option<Arc<TypeDescriptor>> {
        self.by_root.get(name).cloned()
    }

    /// Descriptor bound to a global schema type name, if any
    pub fn descriptor_for_schema_type(&self, name: &QualifiedName) -> Option<Arc<TypeDescriptor>> {
        self.by_schema_type.get(name).cloned()
    }

    /// Whether a class has a registered descriptor
    pub fn has_class(&self, class: &str) -> bool {
        self.by_class.contains_key(class)
    }

    /// Number of registered descriptors
    pub fn descriptor_count(&self) -> usize {
        self.by_class.len()
    }

    /// Topmost descriptor of an inheritance chain; the descriptor itself
    /// when it has no registered parent
    pub fn inheritance_root(&self, descriptor: &Arc<TypeDescriptor>) -> Arc<TypeDescriptor> {
        let mut current = Arc::clone(descriptor);
        let mut seen: HashSet<String> = HashSet::new();
        loop {
            let parent = match current.inheritance_parent() {
                Some(p) => p.to_string(),
                None => break,
            };
            if !seen.insert(parent.clone()) {
                break;
            }
            match self.by_class.get(&parent) {
                Some(next) => current = Arc::clone(next),
                None => break,
            }
        }
        current
    }

    /// Shared document preservation store
    pub fn preservation(&self) -> &DocumentPreservationStore {
        &self.preservation
    }

    /// Create a marshaller bound to this context
    pub fn create_marshaller(&self) -> Marshaller<'_> {
        Marshaller::new(self)
    }

    /// Create an unmarshaller bound to this context
    pub fn create_unmarshaller(&self) -> Unmarshaller<'_> {
        Unmarshaller::new(self)
    }

    /// Create a validator bound to this context
    pub fn create_validator(&self) -> Validator<'_> {
        Validator::new(self)
    }
}

impl Default for BindingContext {
    fn default() -> Self {
        BindingContext::new()
    }
}
