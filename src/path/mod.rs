//! Field-path expressions
//!
//! A field path locates one value inside the XML shape of a mapped class:
//! a chain of element steps ending in an element, attribute or text()
//! step. Paths are compiled once at binding-setup time and shared
//! read-only afterwards.

pub mod compiler;
pub mod fragment;

pub use fragment::PathFragment;

use std::fmt;

use crate::conversion::schema::SchemaType;
use crate::error::BindError;
use crate::namespace::NamespaceResolver;

/// A compiled field path: fragments in chain order, never empty.
///
/// The terminal fragment decides attribute-vs-element dispatch and carries
/// the leaf schema type, so it is reachable in O(1) via [`tail`](Self::tail).
#[derive(Debug, Clone, PartialEq)]
pub struct PathExpression {
    raw: String,
    fragments: Vec<PathFragment>,
}

impl PathExpression {
    /// Compile a path string. Grammar violations abort binding setup.
    pub fn compile(path: &str) -> Result<Self, BindError> {
        let fragments = compiler::compile(path)?;
        Ok(PathExpression {
            raw: path.to_string(),
            fragments,
        })
    }

    /// The original path string.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn head(&self) -> &PathFragment {
        &self.fragments[0]
    }

    /// Terminal fragment of the chain.
    pub fn tail(&self) -> &PathFragment {
        &self.fragments[self.fragments.len() - 1]
    }

    pub fn fragments(&self) -> &[PathFragment] {
        &self.fragments
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// True for the `.` path, which maps a value onto the element itself.
    pub fn is_self_path(&self) -> bool {
        self.fragments.len() == 1 && self.fragments[0].is_self
    }

    /// True when the path addresses an attribute.
    pub fn targets_attribute(&self) -> bool {
        self.tail().is_attribute
    }

    /// True when the path ends in `text()`.
    pub fn targets_text(&self) -> bool {
        self.tail().is_text
    }

    /// Fill each prefixed fragment's namespace URI from `resolver`, and
    /// give unprefixed element fragments the default namespace URI when
    /// one is set. Attributes never take the default namespace. Called
    /// during descriptor initialization, before the chain is shared.
    pub fn resolve_namespaces(&mut self, resolver: &NamespaceResolver) -> Result<(), BindError> {
        for frag in &mut self.fragments {
            if let Some(prefix) = &frag.prefix {
                match resolver.resolve_uri(prefix) {
                    Some(uri) => frag.namespace_uri = Some(uri.to_string()),
                    None => {
                        return Err(BindError::NamespaceResolution {
                            name: frag.raw_name.clone(),
                            reason: format!("prefix '{}' is not bound", prefix),
                        })
                    }
                }
            } else if frag.is_element() {
                frag.namespace_uri = resolver.default_namespace_uri().map(str::to_string);
            }
        }
        Ok(())
    }

    /// Bind a schema type to the terminal fragment. Part of field-mapping
    /// construction, never called on a shared expression.
    pub fn set_leaf_schema_type(&mut self, schema_type: SchemaType) {
        let last = self.fragments.len() - 1;
        self.fragments[last].leaf_schema_type = Some(schema_type);
    }
}

impl fmt::Display for PathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_access() {
        let expr = PathExpression::compile("a/b/@c").unwrap();
        assert_eq!(expr.len(), 3);
        assert_eq!(expr.head().local_name, "a");
        assert!(expr.tail().is_attribute);
        assert!(expr.targets_attribute());
    }

    #[test]
    fn test_resolve_namespaces() {
        let mut resolver = NamespaceResolver::new();
        resolver.put("ns", "http://example.com/ns");

        let mut expr = PathExpression::compile("ns:a/b/@c").unwrap();
        expr.resolve_namespaces(&resolver).unwrap();

        assert_eq!(
            expr.fragments()[0].namespace_uri.as_deref(),
            Some("http://example.com/ns")
        );
        // No default namespace set, so the unprefixed element stays bare
        assert_eq!(expr.fragments()[1].namespace_uri, None);
    }

    #[test]
    fn test_resolve_default_namespace_skips_attributes() {
        let mut resolver = NamespaceResolver::new();
        resolver.set_default_namespace_uri("http://example.com/default");

        let mut expr = PathExpression::compile("a/@b").unwrap();
        expr.resolve_namespaces(&resolver).unwrap();

        assert_eq!(
            expr.fragments()[0].namespace_uri.as_deref(),
            Some("http://example.com/default")
        );
        assert_eq!(expr.fragments()[1].namespace_uri, None);
    }

    #[test]
    fn test_unbound_prefix_fails() {
        let resolver = NamespaceResolver::new();
        let mut expr = PathExpression::compile("nope:a").unwrap();
        let err = expr.resolve_namespaces(&resolver).unwrap_err();
        assert_eq!(err.code(), 25004);
    }
}
