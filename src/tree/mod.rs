//! Arena document tree
//!
//! - document: the mutable arena and its parser
//! - node: node storage and attribute records
//! - serialize: exact and formatted writers
//! - strings: interning pool for names, prefixes and URIs

pub mod document;
pub mod node;
pub mod serialize;
pub mod strings;

pub use document::{ChildIter, Document, DOCUMENT};
pub use node::{Attr, Node, NodeId, NodeKind};
pub use serialize::{serialize_document, serialize_node, SerializeOptions};
pub use strings::StringPool;
