//! Path fragments
//!
//! One fragment per `/`-separated segment of a field path. Fragments are
//! built once by the compiler and frozen; the marshaller only reads them.

use crate::conversion::schema::SchemaType;

/// A single step in a compiled field path.
#[derive(Debug, Clone, PartialEq)]
pub struct PathFragment {
    /// Original segment text, including any leading `/` or `@` and any
    /// `[n]` suffix, kept for diagnostics and path reconstruction.
    pub raw_name: String,
    /// Name without prefix or index. Empty for `text()` and `.` fragments.
    pub local_name: String,
    pub prefix: Option<String>,
    /// Filled in when the owning expression is resolved against a
    /// namespace resolver.
    pub namespace_uri: Option<String>,
    pub is_attribute: bool,
    pub is_text: bool,
    /// The `.` fragment; only legal as the sole fragment of a path.
    pub is_self: bool,
    /// First fragment of a path that began with `/`.
    pub is_rooted: bool,
    /// True when the successor fragment is an attribute or text fragment,
    /// so direct values under this element collapse into it.
    pub has_trailing_text: bool,
    /// Positional index from `name[n]` syntax, 1-based.
    pub index: Option<u32>,
    /// Schema type bound to the terminal fragment by its field mapping.
    pub leaf_schema_type: Option<SchemaType>,
}

impl PathFragment {
    /// An element-name fragment, prefix split off by the compiler.
    pub fn element(raw_name: &str, local_name: &str, prefix: Option<&str>) -> Self {
        PathFragment {
            raw_name: raw_name.to_string(),
            local_name: local_name.to_string(),
            prefix: prefix.map(str::to_string),
            namespace_uri: None,
            is_attribute: false,
            is_text: false,
            is_self: false,
            is_rooted: false,
            has_trailing_text: false,
            index: None,
            leaf_schema_type: None,
        }
    }

    /// An `@name` fragment.
    pub fn attribute(raw_name: &str, local_name: &str, prefix: Option<&str>) -> Self {
        PathFragment {
            is_attribute: true,
            ..PathFragment::element(raw_name, local_name, prefix)
        }
    }

    /// The `text()` fragment.
    pub fn text() -> Self {
        PathFragment {
            is_text: true,
            ..PathFragment::element("text()", "", None)
        }
    }

    /// The `.` fragment.
    pub fn current() -> Self {
        PathFragment {
            is_self: true,
            ..PathFragment::element(".", "", None)
        }
    }

    /// `prefix:local` when prefixed, else the bare local name.
    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.local_name),
            None => self.local_name.clone(),
        }
    }

    /// True for fragments that name an element (not attribute/text/self).
    #[inline]
    pub fn is_element(&self) -> bool {
        !self.is_attribute && !self.is_text && !self.is_self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_fragment() {
        let frag = PathFragment::text();
        assert!(frag.is_text);
        assert!(!frag.is_element());
        assert_eq!(frag.raw_name, "text()");
        assert_eq!(frag.local_name, "");
    }

    #[test]
    fn test_qualified_name() {
        let plain = PathFragment::element("child", "child", None);
        assert_eq!(plain.qualified_name(), "child");

        let prefixed = PathFragment::element("ns:child", "child", Some("ns"));
        assert_eq!(prefixed.qualified_name(), "ns:child");
    }
}
