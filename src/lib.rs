//! xmlbind - declarative object-to-XML data binding
//!
//! Converts dynamic object graphs to XML and back, driven by per-class
//! descriptors that map attribute names to compiled field paths:
//!
//! - [`TypeDescriptor`]: field mappings, default root element(s),
//!   namespace resolver, inheritance link, preservation flag
//! - [`BindingContext`]: descriptor registry indexed by class, root
//!   element name and global schema type
//! - [`Marshaller`]: object graph to string, byte stream, arena tree or
//!   SAX callbacks
//! - [`Unmarshaller`]: the inverse walk, with a [`RootEnvelope`] fallback
//!   for roots no descriptor claims
//! - [`Validator`]: the marshal walk without output, with failures routed
//!   through an [`ErrorHandler`]
//!
//! ```
//! use xmlbind::{BindingContext, DataObject, TypeDescriptor};
//!
//! let mut context = BindingContext::new();
//! let mut descriptor = TypeDescriptor::new("Customer");
//! descriptor.set_default_root_element("customer");
//! descriptor.add_field("name", "name/text()").unwrap();
//! context.register_descriptor(descriptor).unwrap();
//!
//! let mut marshaller = context.create_marshaller();
//! marshaller.set_fragment(true).set_formatted_output(false);
//! let xml = marshaller
//!     .marshal_to_string(DataObject::new("Customer").with("name", "Ada"))
//!     .unwrap();
//! assert_eq!(xml, "<customer><name>Ada</name></customer>");
//! ```
//!
//! Descriptors are mutated only during setup; once registered they are
//! shared immutably, so a context serves concurrent marshal and
//! unmarshal calls as long as registration has finished.

pub mod context;
pub mod conversion;
pub mod core;
pub mod descriptor;
pub mod error;
pub mod mapping;
pub mod marshal;
pub mod namespace;
pub mod path;
pub mod preserve;
pub mod reader;
pub mod root;
pub mod sax;
pub mod tree;
pub mod unmarshal;
pub mod validate;
pub mod value;

pub use context::{BindingContext, DescriptorSource};
pub use conversion::{ConversionRegistry, SchemaType};
pub use core::qname::QualifiedName;
pub use descriptor::TypeDescriptor;
pub use error::{BindError, ErrorHandler, ErrorResolution};
pub use mapping::{FieldMapping, MappingKind};
pub use marshal::{MarshalListener, MarshalRecord, MarshalSource, Marshaller};
pub use namespace::NamespaceResolver;
pub use path::PathExpression;
pub use root::RootEnvelope;
pub use sax::{ContentHandler, EventCollector, SaxAttribute, SaxEvent};
pub use tree::Document;
pub use unmarshal::{UnmarshalResult, Unmarshaller};
pub use validate::Validator;
pub use value::{DataObject, Value, ValueKind};
