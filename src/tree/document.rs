//! Arena-based XML document
//!
//! Mutable DOM storage with:
//! - Arena allocation for nodes, NodeId indices for traversal
//! - String interning for names, prefixes and namespace URIs
//! - Owned text and attribute values so merges can rewrite them in place
//!
//! Parsing is strict: tag mismatches, multiple roots, text at document
//! level and unclosed tags are rejected. Namespace prefixes are resolved
//! during the build; an unbound prefix leaves the node in no namespace
//! rather than failing, and `xmlns` declarations are also kept as plain
//! attributes so a serialized document round-trips.

use super::node::{Attr, Node, NodeId};
use super::strings::StringPool;
use crate::core::encoding::convert_to_utf8;
use crate::core::qname::{ns, QualifiedName};
use crate::error::BindError;
use crate::reader::events::{StartElement, XmlEvent};
use crate::reader::SliceReader;

/// Id of the document node
pub const DOCUMENT: NodeId = 0;

/// An XML document stored in arena format
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    /// Interned strings
    pub strings: StringPool,
    root_element: Option<NodeId>,
    xml_version: Option<String>,
    encoding_label: Option<String>,
    standalone: Option<bool>,
}

impl Document {
    /// Create an empty document containing only the document node
    pub fn new() -> Self {
        let mut doc = Document {
            nodes: Vec::with_capacity(64),
            strings: StringPool::new(),
            root_element: None,
            xml_version: None,
            encoding_label: None,
            standalone: None,
        };
        doc.nodes.push(Node::document());
        doc
    }

    /// Parse a document from raw bytes, converting UTF-16 input to UTF-8
    pub fn parse_bytes(input: Vec<u8>) -> Result<Self, BindError> {
        let utf8 = convert_to_utf8(input)?;
        let text = std::str::from_utf8(&utf8).map_err(|e| BindError::MalformedDocument {
            reason: format!("input is not valid UTF-8: {e}"),
            offset: e.valid_up_to(),
        })?;
        Self::parse_str(text)
    }

    /// Parse a document from a UTF-8 string slice
    pub fn parse_str(text: &str) -> Result<Self, BindError> {
        let mut doc = Document::new();
        doc.build_from_events(text)?;
        Ok(doc)
    }

    /// Build the tree from reader events
    fn build_from_events(&mut self, text: &str) -> Result<(), BindError> {
        let mut reader = SliceReader::new(text);
        let mut stack: Vec<NodeId> = vec![DOCUMENT];
        // Full tag names (prefix included) of open elements, for matching
        let mut open_names: Vec<String> = Vec::new();
        // The `xml` prefix is bound implicitly for the whole document
        let xml_binding = (self.strings.intern("xml"), self.strings.intern(ns::XML));
        let mut prefix_scopes: Vec<Vec<(u32, u32)>> = vec![vec![xml_binding]];
        let mut default_scopes: Vec<Option<u32>> = vec![None];
        let mut seen_root = false;

        while let Some(event) = reader.next_event()? {
            let offset = reader.position();
            match event {
                XmlEvent::StartElement(elem) => {
                    if stack.len() == 1 {
                        if seen_root {
                            return Err(malformed("content after the root element", offset));
                        }
                        seen_root = true;
                    }
                    open_names.push(elem.name.to_string());
                    self.handle_element(
                        elem,
                        false,
                        &mut stack,
                        &mut prefix_scopes,
                        &mut default_scopes,
                    );
                }

                XmlEvent::EmptyElement(elem) => {
                    if stack.len() == 1 {
                        if seen_root {
                            return Err(malformed("content after the root element", offset));
                        }
                        seen_root = true;
                    }
                    self.handle_element(
                        elem,
                        true,
                        &mut stack,
                        &mut prefix_scopes,
                        &mut default_scopes,
                    );
                }

                XmlEvent::EndElement(end) => {
                    match open_names.pop() {
                        Some(open) if open == end.name => {}
                        Some(open) => {
                            return Err(malformed(
                                format!("tag mismatch: <{open}> closed with </{}>", end.name),
                                offset,
                            ));
                        }
                        None => {
                            return Err(malformed(
                                format!("end tag </{}> without a matching start tag", end.name),
                                offset,
                            ));
                        }
                    }
                    stack.pop();
                    prefix_scopes.pop();
                    default_scopes.pop();
                }

                XmlEvent::Text(content) => {
                    if stack.len() == 1 {
                        if content.bytes().all(|b| b.is_ascii_whitespace()) {
                            continue;
                        }
                        return Err(malformed("text content at document level", offset));
                    }
                    // Whitespace-only runs inside elements are kept verbatim
                    let parent_id = *stack.last().unwrap_or(&DOCUMENT);
                    let node_id = self.push_node(Node::text(content.into_owned()));
                    self.attach(parent_id, node_id);
                }

                XmlEvent::CData(content) => {
                    if stack.len() == 1 {
                        return Err(malformed("CDATA section at document level", offset));
                    }
                    let parent_id = *stack.last().unwrap_or(&DOCUMENT);
                    let node_id = self.push_node(Node::cdata(content.to_string()));
                    self.attach(parent_id, node_id);
                }

                XmlEvent::Comment(content) => {
                    let parent_id = *stack.last().unwrap_or(&DOCUMENT);
                    let node_id = self.push_node(Node::comment(content.to_string()));
                    self.attach(parent_id, node_id);
                }

                XmlEvent::ProcessingInstruction { target, data } => {
                    let parent_id = *stack.last().unwrap_or(&DOCUMENT);
                    let target_id = self.strings.intern(target);
                    let node_id = self.push_node(Node::processing_instruction(
                        target_id,
                        data.unwrap_or("").to_string(),
                    ));
                    self.attach(parent_id, node_id);
                }

                XmlEvent::XmlDeclaration {
                    version,
                    encoding,
                    standalone,
                } => {
                    self.xml_version = Some(version.into_owned());
                    self.encoding_label = encoding.map(|e| e.into_owned());
                    self.standalone = standalone;
                }

                // Accepted and dropped; no DTD processing is done
                XmlEvent::DocType(_) => {}
            }
        }

        if let Some(open) = open_names.first() {
            return Err(malformed(format!("unclosed tag <{open}>"), text.len()));
        }
        if self.root_element.is_none() {
            return Err(malformed("document has no root element", text.len()));
        }
        Ok(())
    }

    /// Create an element node from a start tag, resolving its namespaces
    fn handle_element(
        &mut self,
        elem: StartElement<'_>,
        is_empty: bool,
        stack: &mut Vec<NodeId>,
        prefix_scopes: &mut Vec<Vec<(u32, u32)>>,
        default_scopes: &mut Vec<Option<u32>>,
    ) {
        let parent_id = *stack.last().unwrap_or(&DOCUMENT);

        let name_id = self.strings.intern(elem.local_name);
        let prefix_id = elem.prefix.map_or(0, |p| self.strings.intern(p));

        // Collect declarations on this element before resolving anything;
        // a declaration may appear after the attribute that uses it
        let mut scope_prefixes: Vec<(u32, u32)> = Vec::new();
        let mut scope_default: Option<u32> = None;
        let mut attributes: Vec<Attr> = Vec::with_capacity(elem.attributes.len());
        let xmlns_ns_id = self.strings.intern(ns::XMLNS);
        for attr in &elem.attributes {
            let mut namespace_id = 0;
            if attr.is_namespace_declaration() {
                let uri_id = self.strings.intern(attr.value.as_ref());
                match attr.declared_prefix() {
                    Some(prefix) => scope_prefixes.push((self.strings.intern(prefix), uri_id)),
                    None => scope_default = Some(uri_id),
                }
                namespace_id = xmlns_ns_id;
            }
            attributes.push(Attr {
                name_id: self.strings.intern(attr.local_name),
                prefix_id: attr.prefix.map_or(0, |p| self.strings.intern(p)),
                namespace_id,
                value: attr.value.clone().into_owned(),
            });
        }

        // Prefixed attributes resolve through the scopes; unprefixed ones
        // never take the default namespace
        let xmlns_id = self.strings.intern("xmlns");
        for attr in &mut attributes {
            if attr.prefix_id != 0 && attr.prefix_id != xmlns_id {
                attr.namespace_id = resolve_prefix_id(attr.prefix_id, &scope_prefixes, prefix_scopes);
            }
        }

        let namespace_id = if prefix_id != 0 {
            resolve_prefix_id(prefix_id, &scope_prefixes, prefix_scopes)
        } else {
            scope_default
                .or_else(|| default_scopes.iter().rev().find_map(|d| *d))
                .unwrap_or(0)
        };

        let mut node = Node::element(name_id, prefix_id, namespace_id);
        node.attributes = attributes;
        let node_id = self.push_node(node);
        self.attach(parent_id, node_id);

        if !is_empty {
            stack.push(node_id);
            prefix_scopes.push(scope_prefixes);
            default_scopes.push(scope_default);
        }
    }

    // ----- node creation -----

    fn push_node(&mut self, node: Node) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(node);
        id
    }

    /// Create a detached element node
    pub fn create_element(
        &mut self,
        prefix: Option<&str>,
        local_name: &str,
        namespace_uri: Option<&str>,
    ) -> NodeId {
        let name_id = self.strings.intern(local_name);
        let prefix_id = prefix.map_or(0, |p| self.strings.intern(p));
        let namespace_id = namespace_uri.map_or(0, |u| self.strings.intern(u));
        self.push_node(Node::element(name_id, prefix_id, namespace_id))
    }

    /// Create a detached text node
    pub fn create_text(&mut self, content: impl Into<String>) -> NodeId {
        self.push_node(Node::text(content.into()))
    }

    /// Create a detached CDATA node
    pub fn create_cdata(&mut self, content: impl Into<String>) -> NodeId {
        self.push_node(Node::cdata(content.into()))
    }

    /// Create a detached comment node
    pub fn create_comment(&mut self, content: impl Into<String>) -> NodeId {
        self.push_node(Node::comment(content.into()))
    }

    /// Create a detached processing instruction node
    pub fn create_processing_instruction(
        &mut self,
        target: &str,
        data: impl Into<String>,
    ) -> NodeId {
        let target_id = self.strings.intern(target);
        self.push_node(Node::processing_instruction(target_id, data.into()))
    }

    // ----- structure -----

    /// Append `child` as the last child of `parent`
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.attach(parent, child);
    }

    /// Link into the sibling chain and track the root element
    fn attach(&mut self, parent_id: NodeId, child_id: NodeId) {
        {
            let depth = self.nodes[parent_id as usize].depth + 1;
            let node = &mut self.nodes[child_id as usize];
            node.parent = Some(parent_id);
            node.depth = depth;
        }

        let last_child_opt = self.nodes[parent_id as usize].last_child;
        if let Some(last_id) = last_child_opt {
            self.nodes[child_id as usize].prev_sibling = Some(last_id);
            self.nodes[last_id as usize].next_sibling = Some(child_id);
        } else {
            self.nodes[parent_id as usize].first_child = Some(child_id);
        }
        self.nodes[parent_id as usize].last_child = Some(child_id);

        if self.root_element.is_none()
            && parent_id == DOCUMENT
            && self.nodes[child_id as usize].is_element()
        {
            self.root_element = Some(child_id);
        }
    }

    /// Unlink `child` from `parent`; the node stays in the arena detached
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) {
        let (prev, next) = {
            let node = &self.nodes[child as usize];
            if node.parent != Some(parent) {
                return;
            }
            (node.prev_sibling, node.next_sibling)
        };
        match prev {
            Some(p) => self.nodes[p as usize].next_sibling = next,
            None => self.nodes[parent as usize].first_child = next,
        }
        match next {
            Some(n) => self.nodes[n as usize].prev_sibling = prev,
            None => self.nodes[parent as usize].last_child = prev,
        }
        {
            let node = &mut self.nodes[child as usize];
            node.parent = None;
            node.prev_sibling = None;
            node.next_sibling = None;
        }
        if self.root_element == Some(child) {
            let next_root = self.child_elements(DOCUMENT).next();
            self.root_element = next_root;
        }
    }

    // ----- accessors -----

    /// Get a node by ID
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id as usize)
    }

    /// Get a mutable node by ID
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id as usize)
    }

    /// Root element ID, if the document has one
    pub fn root_element(&self) -> Option<NodeId> {
        self.root_element
    }

    /// Total number of arena slots, detached nodes included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Version from the XML declaration, if one was parsed
    pub fn xml_version(&self) -> Option<&str> {
        self.xml_version.as_deref()
    }

    /// Encoding label from the XML declaration, if one was parsed
    pub fn encoding_label(&self) -> Option<&str> {
        self.encoding_label.as_deref()
    }

    /// Standalone flag from the XML declaration, if one was parsed
    pub fn standalone(&self) -> Option<bool> {
        self.standalone
    }

    /// Record declaration fields on a programmatically built document
    pub fn set_declaration(
        &mut self,
        version: Option<&str>,
        encoding: Option<&str>,
        standalone: Option<bool>,
    ) {
        self.xml_version = version.map(str::to_string);
        self.encoding_label = encoding.map(str::to_string);
        self.standalone = standalone;
    }

    /// Local name of a node ("" for non-named nodes)
    pub fn local_name(&self, id: NodeId) -> &str {
        self.get(id).map_or("", |n| self.strings.get(n.name_id))
    }

    /// Namespace prefix of a node
    pub fn prefix(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(|n| self.strings.get_nonempty(n.prefix_id))
    }

    /// Namespace URI of a node
    pub fn namespace_uri(&self, id: NodeId) -> Option<&str> {
        self.get(id)
            .and_then(|n| self.strings.get_nonempty(n.namespace_id))
    }

    /// Qualified name of an element
    pub fn qualified_name(&self, id: NodeId) -> QualifiedName {
        QualifiedName::new(self.namespace_uri(id), self.local_name(id))
    }

    /// Whether `id` is an element with the given namespace and local name;
    /// an absent namespace and the empty URI compare equal
    pub fn element_matches(&self, id: NodeId, namespace_uri: Option<&str>, local_name: &str) -> bool {
        match self.get(id) {
            Some(node) => {
                node.is_element()
                    && self.strings.get(node.name_id) == local_name
                    && self.strings.get(node.namespace_id) == namespace_uri.unwrap_or("")
            }
            None => false,
        }
    }

    /// Iterate over the children of a node
    pub fn children(&self, id: NodeId) -> ChildIter<'_> {
        ChildIter {
            doc: self,
            next: self.get(id).and_then(|n| n.first_child),
        }
    }

    /// Iterate over the element children of a node
    pub fn child_elements(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .filter(move |&c| self.get(c).is_some_and(|n| n.is_element()))
    }

    /// First child element matching a namespace and local name
    pub fn find_child_element(
        &self,
        parent: NodeId,
        namespace_uri: Option<&str>,
        local_name: &str,
    ) -> Option<NodeId> {
        self.children(parent)
            .find(|&c| self.element_matches(c, namespace_uri, local_name))
    }

    /// All child elements matching a namespace and local name
    pub fn child_elements_named<'a>(
        &'a self,
        parent: NodeId,
        namespace_uri: Option<&'a str>,
        local_name: &'a str,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.children(parent)
            .filter(move |&c| self.element_matches(c, namespace_uri, local_name))
    }

    // ----- attributes -----

    /// Set an attribute, replacing any existing one with the same
    /// namespace and local name
    pub fn set_attribute(
        &mut self,
        element: NodeId,
        prefix: Option<&str>,
        local_name: &str,
        namespace_uri: Option<&str>,
        value: impl Into<String>,
    ) {
        let name_id = self.strings.intern(local_name);
        let prefix_id = prefix.map_or(0, |p| self.strings.intern(p));
        let namespace_id = namespace_uri.map_or(0, |u| self.strings.intern(u));
        let value = value.into();
        if let Some(node) = self.nodes.get_mut(element as usize) {
            if let Some(attr) = node
                .attributes
                .iter_mut()
                .find(|a| a.name_id == name_id && a.namespace_id == namespace_id)
            {
                attr.prefix_id = prefix_id;
                attr.value = value;
            } else {
                node.attributes.push(Attr {
                    name_id,
                    prefix_id,
                    namespace_id,
                    value,
                });
            }
        }
    }

    /// Attribute value by namespace and local name
    pub fn attribute(
        &self,
        element: NodeId,
        namespace_uri: Option<&str>,
        local_name: &str,
    ) -> Option<&str> {
        let node = self.get(element)?;
        let uri = namespace_uri.unwrap_or("");
        node.attributes
            .iter()
            .find(|a| {
                self.strings.get(a.name_id) == local_name && self.strings.get(a.namespace_id) == uri
            })
            .map(|a| a.value.as_str())
    }

    /// Remove an attribute; returns whether one was present
    pub fn remove_attribute(
        &mut self,
        element: NodeId,
        namespace_uri: Option<&str>,
        local_name: &str,
    ) -> bool {
        let uri = namespace_uri.unwrap_or("");
        let found = match self.get(element) {
            Some(node) => node.attributes.iter().position(|a| {
                self.strings.get(a.name_id) == local_name && self.strings.get(a.namespace_id) == uri
            }),
            None => None,
        };
        match found {
            Some(idx) => {
                self.nodes[element as usize].attributes.remove(idx);
                true
            }
            None => false,
        }
    }

    // ----- text -----

    /// Concatenated direct textual children of an element, or the
    /// content of a textual node itself
    pub fn text_content(&self, id: NodeId) -> String {
        let node = match self.get(id) {
            Some(n) => n,
            None => return String::new(),
        };
        if node.is_textual() {
            return node.content.clone();
        }
        let mut out = String::new();
        let mut child = node.first_child;
        while let Some(cid) = child {
            let c = &self.nodes[cid as usize];
            if c.is_textual() {
                out.push_str(&c.content);
            }
            child = c.next_sibling;
        }
        out
    }

    /// Replace the direct textual children with a single text node;
    /// element children are kept in place
    pub fn set_text_content(&mut self, id: NodeId, text: impl Into<String>) {
        let textual: Vec<NodeId> = self
            .children(id)
            .filter(|&c| self.get(c).is_some_and(|n| n.is_textual()))
            .collect();
        for child in textual {
            self.remove_child(id, child);
        }
        let text = text.into();
        if !text.is_empty() {
            let node_id = self.create_text(text);
            self.append_child(id, node_id);
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Document::new()
    }
}

/// Resolve a prefix against the local declarations, then the open scopes
/// from innermost out; unbound prefixes map to no namespace
fn resolve_prefix_id(prefix_id: u32, local: &[(u32, u32)], outer: &[Vec<(u32, u32)>]) -> u32 {
    for &(p, u) in local.iter().rev() {
        if p == prefix_id {
            return u;
        }
    }
    for scope in outer.iter().rev() {
        for &(p, u) in scope.iter().rev() {
            if p == prefix_id {
                return u;
            }
        }
    }
    0
}

#[inline]
fn malformed(reason: impl Into<String>, offset: usize) -> BindError {
    BindError::MalformedDocument {
        reason: reason.into(),
        offset,
    }
}

/// Iterator over child nodes
pub struct ChildIter<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl<'a> Iterator for ChildIter<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.get(current).and_then(|n| n.next_sibling);
        Some(current)
    }
}
