//! Namespace resolution
//!
//! Prefix/URI table attached to a [`TypeDescriptor`](crate::descriptor::TypeDescriptor)
//! and copied into each output record before emission. Insertion order is
//! preserved because it decides the order of `xmlns:` declarations on the
//! root element. The `xml` and `xmlns` prefixes are built in and never
//! stored, so they never show up as declarations.

use indexmap::IndexMap;

use crate::core::qname::ns;

/// Ordered prefix-to-URI table plus one optional default namespace URI.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamespaceResolver {
    /// prefix -> URI, insertion ordered
    bindings: IndexMap<String, String>,
    default_uri: Option<String>,
}

impl NamespaceResolver {
    pub fn new() -> Self {
        NamespaceResolver {
            bindings: IndexMap::new(),
            default_uri: None,
        }
    }

    /// Bind `prefix` to `uri`. Re-binding an existing prefix replaces its
    /// URI but keeps the prefix's original position in declaration order.
    pub fn put(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        let prefix = prefix.into();
        if prefix == "xml" || prefix == "xmlns" {
            return;
        }
        self.bindings.insert(prefix, uri.into());
    }

    /// Remove a binding. Rarely needed; declaration order of the remaining
    /// prefixes is unchanged.
    pub fn remove(&mut self, prefix: &str) -> Option<String> {
        self.bindings.shift_remove(prefix)
    }

    /// Find the prefix bound to `uri`. When several prefixes map to the same
    /// URI the first-registered one wins.
    pub fn resolve_prefix(&self, uri: &str) -> Option<&str> {
        if uri == ns::XML {
            return Some("xml");
        }
        self.bindings
            .iter()
            .find(|(_, u)| u.as_str() == uri)
            .map(|(p, _)| p.as_str())
    }

    /// Find the URI bound to `prefix`.
    pub fn resolve_uri(&self, prefix: &str) -> Option<&str> {
        match prefix {
            "xml" => Some(ns::XML),
            "xmlns" => Some(ns::XMLNS),
            _ => self.bindings.get(prefix).map(String::as_str),
        }
    }

    /// Produce a prefix not currently bound. Uses `hint` if it is free,
    /// otherwise scans `ns0`, `ns1`, ... for the smallest unused suffix.
    pub fn generate_prefix(&self, hint: Option<&str>) -> String {
        if let Some(hint) = hint {
            if !hint.is_empty() && !self.bindings.contains_key(hint) {
                return hint.to_string();
            }
        }
        let mut n = 0u32;
        loop {
            let candidate = format!("ns{}", n);
            if !self.bindings.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    pub fn set_default_namespace_uri(&mut self, uri: impl Into<String>) {
        let uri = uri.into();
        self.default_uri = if uri.is_empty() { None } else { Some(uri) };
    }

    pub fn default_namespace_uri(&self) -> Option<&str> {
        self.default_uri.as_deref()
    }

    /// All bindings in insertion order, for copying into another resolver.
    pub fn namespaces(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings.iter().map(|(p, u)| (p.as_str(), u.as_str()))
    }

    /// Copy every binding (and the default URI, if set) from `other`,
    /// preserving `other`'s declaration order for prefixes new to `self`.
    pub fn merge_from(&mut self, other: &NamespaceResolver) {
        for (prefix, uri) in other.namespaces() {
            if !self.bindings.contains_key(prefix) {
                self.bindings.insert(prefix.to_string(), uri.to_string());
            }
        }
        if self.default_uri.is_none() {
            self.default_uri = other.default_uri.clone();
        }
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_and_resolve() {
        let mut resolver = NamespaceResolver::new();
        resolver.put("foo", "http://example.com/foo");

        assert_eq!(resolver.resolve_uri("foo"), Some("http://example.com/foo"));
        assert_eq!(resolver.resolve_prefix("http://example.com/foo"), Some("foo"));
        assert_eq!(resolver.resolve_uri("bar"), None);
    }

    #[test]
    fn test_first_registered_prefix_wins() {
        let mut resolver = NamespaceResolver::new();
        resolver.put("a", "http://example.com/shared");
        resolver.put("b", "http://example.com/shared");

        assert_eq!(resolver.resolve_prefix("http://example.com/shared"), Some("a"));
    }

    #[test]
    fn test_generate_prefix_skips_registered() {
        let mut resolver = NamespaceResolver::new();
        resolver.put("ns0", "http://a");

        assert_eq!(resolver.generate_prefix(None), "ns1");
        assert_eq!(resolver.generate_prefix(Some("xsi")), "xsi");
        assert_eq!(resolver.generate_prefix(Some("ns0")), "ns1");
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut resolver = NamespaceResolver::new();
        resolver.put("z", "http://z");
        resolver.put("a", "http://a");
        resolver.put("m", "http://m");

        let prefixes: Vec<&str> = resolver.namespaces().map(|(p, _)| p).collect();
        assert_eq!(prefixes, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_merge_keeps_existing_bindings() {
        let mut target = NamespaceResolver::new();
        target.put("p", "http://target");

        let mut source = NamespaceResolver::new();
        source.put("p", "http://source");
        source.put("q", "http://q");
        source.set_default_namespace_uri("http://default");

        target.merge_from(&source);
        assert_eq!(target.resolve_uri("p"), Some("http://target"));
        assert_eq!(target.resolve_uri("q"), Some("http://q"));
        assert_eq!(target.default_namespace_uri(), Some("http://default"));
    }

    #[test]
    fn test_builtin_prefixes() {
        let resolver = NamespaceResolver::new();
        assert_eq!(
            resolver.resolve_uri("xml"),
            Some("http://www.w3.org/XML/1998/namespace")
        );
        assert_eq!(resolver.namespaces().count(), 0);
    }
}
