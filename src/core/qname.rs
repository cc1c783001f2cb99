//! Qualified names
//!
//! (namespace URI, local name) pairs as used for root-element identity and
//! schema-type references. Namespace equality treats an absent URI and an
//! empty URI as the same thing, so the pair is normalized at construction.

use memchr::memchr;
use std::fmt;

/// Well-known namespace URIs.
pub mod ns {
    /// XML Schema namespace (schema built-in types).
    pub const XSD: &str = "http://www.w3.org/2001/XMLSchema";
    /// XML Schema instance namespace (`xsi:type`, `xsi:nil`, schema locations).
    pub const XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
    /// The implicitly bound `xml` prefix namespace.
    pub const XML: &str = "http://www.w3.org/XML/1998/namespace";
    /// Namespace of `xmlns` declarations themselves.
    pub const XMLNS: &str = "http://www.w3.org/2000/xmlns/";

    /// Conventional prefix for [`XSI`], generated when unbound.
    pub const XSI_PREFIX: &str = "xsi";
}

/// A namespace-qualified name. The URI is `None` for names in no namespace;
/// an empty URI string normalizes to `None` so both spellings compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    namespace_uri: Option<String>,
    local_name: String,
}

impl QualifiedName {
    pub fn new(namespace_uri: Option<&str>, local_name: impl Into<String>) -> Self {
        QualifiedName {
            namespace_uri: namespace_uri.filter(|u| !u.is_empty()).map(str::to_string),
            local_name: local_name.into(),
        }
    }

    /// Name in no namespace.
    pub fn local(local_name: impl Into<String>) -> Self {
        QualifiedName {
            namespace_uri: None,
            local_name: local_name.into(),
        }
    }

    pub fn namespace_uri(&self) -> Option<&str> {
        self.namespace_uri.as_deref()
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// Whether this name matches the given (URI, local) identity under the
    /// `None` ≡ `""` namespace rule.
    pub fn matches(&self, namespace_uri: Option<&str>, local_name: &str) -> bool {
        let other_uri = namespace_uri.filter(|u| !u.is_empty());
        self.namespace_uri.as_deref() == other_uri && self.local_name == local_name
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace_uri {
            Some(uri) => write!(f, "{{{}}}{}", uri, self.local_name),
            None => write!(f, "{}", self.local_name),
        }
    }
}

/// Split a raw XML name into optional prefix and local name at the first colon.
pub fn split_prefixed(name: &str) -> (Option<&str>, &str) {
    match memchr(b':', name.as_bytes()) {
        Some(pos) => (Some(&name[..pos]), &name[pos + 1..]),
        None => (None, name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_uri_equals_absent() {
        let a = QualifiedName::new(Some(""), "person");
        let b = QualifiedName::local("person");
        assert_eq!(a, b);
        assert!(a.matches(None, "person"));
        assert!(b.matches(Some(""), "person"));
    }

    #[test]
    fn test_matches_requires_both_parts() {
        let qn = QualifiedName::new(Some("http://x"), "Person");
        assert!(qn.matches(Some("http://x"), "Person"));
        assert!(!qn.matches(Some("http://y"), "Person"));
        assert!(!qn.matches(Some("http://x"), "Employee"));
    }

    #[test]
    fn test_split_prefixed() {
        assert_eq!(split_prefixed("ns:local"), (Some("ns"), "local"));
        assert_eq!(split_prefixed("plain"), (None, "plain"));
        assert_eq!(split_prefixed(":odd"), (Some(""), "odd"));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            QualifiedName::new(Some("http://x"), "a").to_string(),
            "{http://x}a"
        );
        assert_eq!(QualifiedName::local("a").to_string(), "a");
    }
}
