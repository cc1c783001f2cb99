//! Field-path compiler
//!
//! Turns a path string such as `@name`, `text()`, `full-name/text()` or
//! `/ns:root/child[2]/@attr` into a fragment chain. Grammar:
//!
//! ```text
//! path    := "." | segment ("/" segment)*
//! segment := "@" qname | "text()" | qname ["[" digits "]"]
//! qname   := [prefix ":"] localName
//! ```
//!
//! Compilation happens once at binding-setup time; any grammar violation
//! is fatal to descriptor construction.

use memchr::memchr;

use super::fragment::PathFragment;
use crate::error::BindError;

/// Compile a path string into its ordered fragment chain.
///
/// Returns the fragments in chain order; the vector is never empty on
/// success. The caller (PathExpression) retains the raw string.
pub fn compile(path: &str) -> Result<Vec<PathFragment>, BindError> {
    if path.is_empty() {
        return Err(error(path, "path is empty"));
    }

    // "." stands alone; a self fragment inside a longer chain is rejected
    // below by the segment parser.
    if path == "." {
        return Ok(vec![PathFragment::current()]);
    }

    let rooted = path.starts_with('/');
    let body = if rooted { &path[1..] } else { path };
    if body.is_empty() {
        return Err(error(path, "path has no segments"));
    }

    let mut fragments = Vec::new();
    for (i, token) in body.split('/').enumerate() {
        if token.is_empty() {
            return Err(error(path, "empty segment"));
        }
        let mut frag = parse_segment(path, token)?;
        if i == 0 && rooted {
            frag.is_rooted = true;
            frag.raw_name.insert(0, '/');
        }
        fragments.push(frag);
    }

    // Attribute and text steps terminate a chain; "." cannot appear in one.
    for (i, frag) in fragments.iter().enumerate() {
        let terminal = i + 1 == fragments.len();
        if frag.is_self {
            return Err(error(path, "'.' is only valid as the whole path"));
        }
        if !terminal && (frag.is_attribute || frag.is_text) {
            return Err(error(path, "attribute or text() segment must be last"));
        }
    }

    // An element whose successor is an attribute or text() receives direct
    // values as its own text content.
    for i in 0..fragments.len().saturating_sub(1) {
        if fragments[i + 1].is_attribute || fragments[i + 1].is_text {
            fragments[i].has_trailing_text = true;
        }
    }

    Ok(fragments)
}

fn parse_segment(path: &str, token: &str) -> Result<PathFragment, BindError> {
    if token == "." {
        return Ok(PathFragment::current());
    }
    if token == "text()" {
        return Ok(PathFragment::text());
    }

    if let Some(name) = token.strip_prefix('@') {
        if name.is_empty() {
            return Err(error(path, "attribute segment has no name"));
        }
        if memchr(b'[', name.as_bytes()).is_some() {
            return Err(error(path, "index not allowed on attribute segment"));
        }
        let (prefix, local) = split_qname(path, name)?;
        return Ok(PathFragment::attribute(token, local, prefix));
    }

    // Optional [n] index suffix
    let (name, index) = match memchr(b'[', token.as_bytes()) {
        Some(open) => {
            let digits = token[open + 1..]
                .strip_suffix(']')
                .ok_or_else(|| error(path, "unterminated index"))?;
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(error(path, "index must be one or more digits"));
            }
            let n: u32 = digits
                .parse()
                .map_err(|_| error(path, "index out of range"))?;
            (&token[..open], Some(n))
        }
        None => (token, None),
    };

    if name.is_empty() {
        return Err(error(path, "segment has no name"));
    }
    let (prefix, local) = split_qname(path, name)?;
    let mut frag = PathFragment::element(token, local, prefix);
    frag.index = index;
    Ok(frag)
}

/// Split `prefix:local`, rejecting empty halves.
fn split_qname<'a>(path: &str, name: &'a str) -> Result<(Option<&'a str>, &'a str), BindError> {
    match memchr(b':', name.as_bytes()) {
        Some(colon) => {
            let (prefix, local) = (&name[..colon], &name[colon + 1..]);
            if prefix.is_empty() || local.is_empty() {
                return Err(error(path, "malformed prefixed name"));
            }
            Ok((Some(prefix), local))
        }
        None => Ok((None, name)),
    }
}

fn error(path: &str, reason: &str) -> BindError {
    BindError::PathCompilation {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_attribute() {
        let frags = compile("@name").unwrap();
        assert_eq!(frags.len(), 1);
        assert!(frags[0].is_attribute);
        assert_eq!(frags[0].local_name, "name");
        assert_eq!(frags[0].raw_name, "@name");
    }

    #[test]
    fn test_single_text() {
        let frags = compile("text()").unwrap();
        assert_eq!(frags.len(), 1);
        assert!(frags[0].is_text);
    }

    #[test]
    fn test_self_path() {
        let frags = compile(".").unwrap();
        assert_eq!(frags.len(), 1);
        assert!(frags[0].is_self);
    }

    #[test]
    fn test_chain_with_attribute_leaf() {
        let frags = compile("a/b/@c").unwrap();
        assert_eq!(frags.len(), 3);
        assert!(frags[0].is_element());
        assert!(frags[1].is_element());
        assert!(frags[2].is_attribute);
        // b has a trailing attribute, a does not
        assert!(!frags[0].has_trailing_text);
        assert!(frags[1].has_trailing_text);
    }

    #[test]
    fn test_trailing_text() {
        let frags = compile("full-name/text()").unwrap();
        assert_eq!(frags.len(), 2);
        assert!(frags[0].has_trailing_text);
        assert!(frags[1].is_text);
    }

    #[test]
    fn test_rooted_prefixed_indexed() {
        let frags = compile("/ns:root/child[2]/@attr").unwrap();
        assert_eq!(frags.len(), 3);
        assert!(frags[0].is_rooted);
        assert_eq!(frags[0].raw_name, "/ns:root");
        assert_eq!(frags[0].prefix.as_deref(), Some("ns"));
        assert_eq!(frags[0].local_name, "root");
        assert_eq!(frags[1].index, Some(2));
        assert_eq!(frags[1].local_name, "child");
        assert!(frags[2].is_attribute);
    }

    #[test]
    fn test_empty_path_rejected() {
        assert!(compile("").is_err());
        assert!(compile("/").is_err());
    }

    #[test]
    fn test_empty_segment_rejected() {
        assert!(compile("a//b").is_err());
        assert!(compile("a/").is_err());
    }

    #[test]
    fn test_malformed_index_rejected() {
        assert!(compile("a[").is_err());
        assert!(compile("a[]").is_err());
        assert!(compile("a[x]").is_err());
        assert!(compile("a[2").is_err());
    }

    #[test]
    fn test_self_inside_chain_rejected() {
        assert!(compile("a/./b").is_err());
    }

    #[test]
    fn test_nonterminal_attribute_rejected() {
        assert!(compile("a/@b/c").is_err());
        assert!(compile("text()/a").is_err());
    }

    #[test]
    fn test_malformed_qname_rejected() {
        assert!(compile(":a").is_err());
        assert!(compile("a:").is_err());
        assert!(compile("@:x").is_err());
    }
}
