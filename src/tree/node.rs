//! Tree nodes
//!
//! Uses NodeId (u32) for compact, cache-friendly node references. Names
//! and namespace URIs are interned; text content and attribute values are
//! owned by the node so preservation-mode merges can rewrite them in
//! place.

/// Compact node identifier (index into arena)
pub type NodeId = u32;

/// Type of tree node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Document root
    Document,
    /// Element node
    Element,
    /// Text content
    Text,
    /// CDATA section
    CData,
    /// Comment
    Comment,
    /// Processing instruction
    ProcessingInstruction,
}

/// An attribute stored on its element.
#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    /// Interned local name
    pub name_id: u32,
    /// Interned prefix, or 0
    pub prefix_id: u32,
    /// Interned namespace URI, or 0
    pub namespace_id: u32,
    /// Owned value, mutable across merges
    pub value: String,
}

/// A node in the arena.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub first_child: Option<NodeId>,
    pub last_child: Option<NodeId>,
    pub prev_sibling: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
    /// Interned local name (elements) or PI target
    pub name_id: u32,
    /// Interned namespace prefix, or 0
    pub prefix_id: u32,
    /// Interned namespace URI, or 0
    pub namespace_id: u32,
    /// Text/CDATA/comment content or PI data; empty for elements
    pub content: String,
    /// Attributes in document order (elements only)
    pub attributes: Vec<Attr>,
    /// Depth in the tree, document node at 0
    pub depth: u16,
}

impl Node {
    fn blank(kind: NodeKind) -> Self {
        Node {
            kind,
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
            name_id: 0,
            prefix_id: 0,
            namespace_id: 0,
            content: String::new(),
            attributes: Vec::new(),
            depth: 0,
        }
    }

    pub fn document() -> Self {
        Node::blank(NodeKind::Document)
    }

    pub fn element(name_id: u32, prefix_id: u32, namespace_id: u32) -> Self {
        Node {
            name_id,
            prefix_id,
            namespace_id,
            ..Node::blank(NodeKind::Element)
        }
    }

    pub fn text(content: String) -> Self {
        Node {
            content,
            ..Node::blank(NodeKind::Text)
        }
    }

    pub fn cdata(content: String) -> Self {
        Node {
            content,
            ..Node::blank(NodeKind::CData)
        }
    }

    pub fn comment(content: String) -> Self {
        Node {
            content,
            ..Node::blank(NodeKind::Comment)
        }
    }

    pub fn processing_instruction(target_id: u32, data: String) -> Self {
        Node {
            name_id: target_id,
            content: data,
            ..Node::blank(NodeKind::ProcessingInstruction)
        }
    }

    #[inline]
    pub fn is_element(&self) -> bool {
        self.kind == NodeKind::Element
    }

    #[inline]
    pub fn is_text(&self) -> bool {
        self.kind == NodeKind::Text
    }

    /// Text or CDATA
    #[inline]
    pub fn is_textual(&self) -> bool {
        matches!(self.kind, NodeKind::Text | NodeKind::CData)
    }

    #[inline]
    pub fn has_children(&self) -> bool {
        self.first_child.is_some()
    }

    #[inline]
    pub fn has_attributes(&self) -> bool {
        !self.attributes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_node() {
        let doc = Node::document();
        assert_eq!(doc.kind, NodeKind::Document);
        assert!(doc.parent.is_none());
        assert_eq!(doc.depth, 0);
    }

    #[test]
    fn test_element_node() {
        let elem = Node::element(1, 0, 2);
        assert!(elem.is_element());
        assert_eq!(elem.name_id, 1);
        assert_eq!(elem.namespace_id, 2);
        assert!(!elem.has_attributes());
    }

    #[test]
    fn test_textual_nodes() {
        assert!(Node::text("a".into()).is_textual());
        assert!(Node::cdata("b".into()).is_textual());
        assert!(!Node::comment("c".into()).is_textual());
    }
}
