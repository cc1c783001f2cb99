//! Tree serialization
//!
//! Two modes:
//! - exact: emits the tree verbatim, iteratively, so depth is unbounded
//! - formatted: three-space indentation, one element per line
//!
//! Formatted output keeps elements with only textual content on a single
//! line and writes mixed content exactly, since reformatting it would
//! change the data. Namespace declarations are ordinary attributes here;
//! the writer never synthesizes them.

use super::document::{Document, DOCUMENT};
use super::node::{Node, NodeId, NodeKind};
use crate::core::entities::{escape_attribute, escape_text};

const INDENT: &str = "   ";

/// Output options for tree serialization
#[derive(Debug, Clone)]
pub struct SerializeOptions {
    /// Pretty-print with three-space indentation
    pub formatted: bool,
    /// Emit an XML declaration before the root
    pub xml_declaration: bool,
    /// Encoding label written into the declaration
    pub encoding: Option<String>,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        SerializeOptions {
            formatted: false,
            xml_declaration: true,
            encoding: Some("UTF-8".to_string()),
        }
    }
}

/// Serialize a whole document
pub fn serialize_document(doc: &Document, options: &SerializeOptions) -> String {
    let mut out = String::new();
    if options.xml_declaration {
        write_declaration(doc, options, &mut out);
    }
    if options.formatted {
        write_formatted(doc, DOCUMENT, 0, &mut out);
        if out.ends_with('\n') {
            out.pop();
        }
    } else {
        write_exact(doc, DOCUMENT, &mut out);
    }
    out
}

/// Serialize a single node and its subtree, without a declaration
pub fn serialize_node(doc: &Document, id: NodeId, options: &SerializeOptions) -> String {
    let mut out = String::new();
    if options.formatted {
        write_formatted(doc, id, 0, &mut out);
        if out.ends_with('\n') {
            out.pop();
        }
    } else {
        write_exact(doc, id, &mut out);
    }
    out
}

fn write_declaration(doc: &Document, options: &SerializeOptions, out: &mut String) {
    out.push_str("<?xml version=\"");
    out.push_str(doc.xml_version().unwrap_or("1.0"));
    out.push('"');
    if let Some(label) = options.encoding.as_deref() {
        out.push_str(" encoding=\"");
        out.push_str(label);
        out.push('"');
    }
    if let Some(standalone) = doc.standalone() {
        out.push_str(if standalone {
            " standalone=\"yes\""
        } else {
            " standalone=\"no\""
        });
    }
    out.push_str("?>");
    if options.formatted {
        out.push('\n');
    }
}

enum Entry {
    Enter(NodeId),
    Close(NodeId),
}

/// Verbatim serialization with an explicit stack
fn write_exact(doc: &Document, id: NodeId, out: &mut String) {
    let mut stack = vec![Entry::Enter(id)];
    while let Some(entry) = stack.pop() {
        match entry {
            Entry::Enter(nid) => {
                let node = match doc.get(nid) {
                    Some(n) => n,
                    None => continue,
                };
                match node.kind {
                    NodeKind::Document => push_children(doc, node, &mut stack),
                    NodeKind::Element => {
                        write_start_tag(doc, node, !node.has_children(), out);
                        if node.has_children() {
                            stack.push(Entry::Close(nid));
                            push_children(doc, node, &mut stack);
                        }
                    }
                    NodeKind::Text => escape_text(&node.content, out),
                    NodeKind::CData => write_cdata(&node.content, out),
                    NodeKind::Comment => {
                        out.push_str("<!--");
                        out.push_str(&node.content);
                        out.push_str("-->");
                    }
                    NodeKind::ProcessingInstruction => write_pi(doc, node, out),
                }
            }
            Entry::Close(nid) => {
                if let Some(node) = doc.get(nid) {
                    write_end_tag(doc, node, out);
                }
            }
        }
    }
}

/// Push children in reverse so the first child is processed first
fn push_children(doc: &Document, node: &Node, stack: &mut Vec<Entry>) {
    let mut child = node.last_child;
    while let Some(cid) = child {
        stack.push(Entry::Enter(cid));
        child = doc.get(cid).and_then(|n| n.prev_sibling);
    }
}

fn write_formatted(doc: &Document, id: NodeId, depth: usize, out: &mut String) {
    let node = match doc.get(id) {
        Some(n) => n,
        None => return,
    };
    match node.kind {
        NodeKind::Document => {
            for child in doc.children(id) {
                write_formatted(doc, child, depth, out);
            }
        }
        NodeKind::Element => {
            push_indent(depth, out);
            if !node.has_children() {
                write_start_tag(doc, node, true, out);
                out.push('\n');
            } else if has_element_content(doc, node) {
                if has_significant_text(doc, node) {
                    write_exact(doc, id, out);
                    out.push('\n');
                } else {
                    write_start_tag(doc, node, false, out);
                    out.push('\n');
                    for child in doc.children(id) {
                        if is_ignorable_whitespace(doc, child) {
                            continue;
                        }
                        write_formatted(doc, child, depth + 1, out);
                    }
                    push_indent(depth, out);
                    write_end_tag(doc, node, out);
                    out.push('\n');
                }
            } else {
                // Textual content only stays on one line
                write_start_tag(doc, node, false, out);
                for child in doc.children(id) {
                    write_exact(doc, child, out);
                }
                write_end_tag(doc, node, out);
                out.push('\n');
            }
        }
        // Document-level text is rejected at parse; element text is
        // handled by its parent above
        NodeKind::Text => {}
        NodeKind::CData => {
            push_indent(depth, out);
            write_cdata(&node.content, out);
            out.push('\n');
        }
        NodeKind::Comment => {
            push_indent(depth, out);
            out.push_str("<!--");
            out.push_str(&node.content);
            out.push_str("-->");
            out.push('\n');
        }
        NodeKind::ProcessingInstruction => {
            push_indent(depth, out);
            write_pi(doc, node, out);
            out.push('\n');
        }
    }
}

fn has_element_content(doc: &Document, node: &Node) -> bool {
    let mut child = node.first_child;
    while let Some(cid) = child {
        match doc.get(cid) {
            Some(c) if c.is_element() => return true,
            Some(c) => child = c.next_sibling,
            None => return false,
        }
    }
    false
}

fn has_significant_text(doc: &Document, node: &Node) -> bool {
    let mut child = node.first_child;
    while let Some(cid) = child {
        let c = match doc.get(cid) {
            Some(c) => c,
            None => return false,
        };
        match c.kind {
            NodeKind::CData => return true,
            NodeKind::Text if !c.content.bytes().all(|b| b.is_ascii_whitespace()) => return true,
            _ => {}
        }
        child = c.next_sibling;
    }
    false
}

fn is_ignorable_whitespace(doc: &Document, id: NodeId) -> bool {
    doc.get(id).is_some_and(|n| {
        n.kind == NodeKind::Text && n.content.bytes().all(|b| b.is_ascii_whitespace())
    })
}

fn push_indent(depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

fn write_start_tag(doc: &Document, node: &Node, self_close: bool, out: &mut String) {
    out.push('<');
    push_qualified(doc, node.prefix_id, node.name_id, out);
    for attr in &node.attributes {
        out.push(' ');
        push_qualified(doc, attr.prefix_id, attr.name_id, out);
        out.push_str("=\"");
        escape_attribute(&attr.value, out);
        out.push('"');
    }
    out.push_str(if self_close { "/>" } else { ">" });
}

fn write_end_tag(doc: &Document, node: &Node, out: &mut String) {
    out.push_str("</");
    push_qualified(doc, node.prefix_id, node.name_id, out);
    out.push('>');
}

fn push_qualified(doc: &Document, prefix_id: u32, name_id: u32, out: &mut String) {
    if let Some(prefix) = doc.strings.get_nonempty(prefix_id) {
        out.push_str(prefix);
        out.push(':');
    }
    out.push_str(doc.strings.get(name_id));
}

/// CDATA cannot contain `]]>`; split it across sections
pub(crate) fn write_cdata(content: &str, out: &mut String) {
    out.push_str("<![CDATA[");
    let mut rest = content;
    while let Some(pos) = rest.find("]]>") {
        out.push_str(&rest[..pos + 2]);
        out.push_str("]]><![CDATA[");
        rest = &rest[pos + 2..];
    }
    out.push_str(rest);
    out.push_str("]]>");
}

fn write_pi(doc: &Document, node: &Node, out: &mut String) {
    out.push_str("<?");
    out.push_str(doc.strings.get(node.name_id));
    if !node.content.is_empty() {
        out.push(' ');
        out.push_str(&node.content);
    }
    out.push_str("?>");
}
