//! Core XML text primitives
//!
//! Building blocks shared by the reader, the tree serializer, and the
//! marshal records:
//! - Entities: escaping on output, entity decoding on input (zero-copy when possible)
//! - Encoding: UTF-16 detection and conversion to UTF-8 for unmarshal input
//! - QName: qualified-name value type and prefix splitting

pub mod encoding;
pub mod entities;
pub mod qname;

pub use qname::QualifiedName;
