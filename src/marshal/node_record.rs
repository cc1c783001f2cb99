//! Document-building record
//!
//! Collects marshal events into a detached [`Document`]. Serves DOM
//! output directly and acts as the build stage for formatted text, which
//! serializes the finished tree afterwards.

use super::record::MarshalRecord;
use crate::core::qname::ns;
use crate::error::BindError;
use crate::tree::{Document, NodeId, DOCUMENT};

/// Marshal record that assembles an arena document.
#[derive(Debug)]
pub struct NodeRecord {
    document: Document,
    open: Vec<NodeId>,
}

impl NodeRecord {
    pub fn new() -> Self {
        NodeRecord {
            document: Document::new(),
            open: vec![DOCUMENT],
        }
    }

    /// The finished tree.
    pub fn into_document(self) -> Document {
        self.document
    }

    fn current(&self) -> NodeId {
        *self.open.last().unwrap_or(&DOCUMENT)
    }

    fn current_element(&self, what: &str) -> Result<NodeId, BindError> {
        let id = self.current();
        if id == DOCUMENT {
            return Err(BindError::MalformedDocument {
                reason: format!("{what} written outside an element"),
                offset: 0,
            });
        }
        Ok(id)
    }
}

impl Default for NodeRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl MarshalRecord for NodeRecord {
    fn start_document(&mut self, version: &str, encoding: Option<&str>) -> Result<(), BindError> {
        self.document.set_declaration(Some(version), encoding, None);
        Ok(())
    }

    fn end_document(&mut self) -> Result<(), BindError> {
        Ok(())
    }

    fn open_element(
        &mut self,
        prefix: Option<&str>,
        local_name: &str,
        namespace_uri: Option<&str>,
    ) -> Result<(), BindError> {
        let parent = self.current();
        let element = self.document.create_element(prefix, local_name, namespace_uri);
        self.document.append_child(parent, element);
        self.open.push(element);
        Ok(())
    }

    fn namespace_declaration(&mut self, prefix: Option<&str>, uri: &str) -> Result<(), BindError> {
        let element = self.current_element("namespace declaration")?;
        match prefix {
            Some(prefix) => {
                self.document
                    .set_attribute(element, Some("xmlns"), prefix, Some(ns::XMLNS), uri)
            }
            None => self
                .document
                .set_attribute(element, None, "xmlns", Some(ns::XMLNS), uri),
        }
        Ok(())
    }

    fn attribute(
        &mut self,
        prefix: Option<&str>,
        local_name: &str,
        namespace_uri: Option<&str>,
        value: &str,
    ) -> Result<(), BindError> {
        let element = self.current_element("attribute")?;
        self.document
            .set_attribute(element, prefix, local_name, namespace_uri, value);
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<(), BindError> {
        let parent = self.current_element("text")?;
        let node = self.document.create_text(text);
        self.document.append_child(parent, node);
        Ok(())
    }

    fn cdata(&mut self, text: &str) -> Result<(), BindError> {
        let parent = self.current_element("CDATA")?;
        let node = self.document.create_cdata(text);
        self.document.append_child(parent, node);
        Ok(())
    }

    fn comment(&mut self, text: &str) -> Result<(), BindError> {
        let parent = self.current();
        let node = self.document.create_comment(text);
        self.document.append_child(parent, node);
        Ok(())
    }

    fn processing_instruction(
        &mut self,
        target: &str,
        data: Option<&str>,
    ) -> Result<(), BindError> {
        let parent = self.current();
        let node = self
            .document
            .create_processing_instruction(target, data.unwrap_or(""));
        self.document.append_child(parent, node);
        Ok(())
    }

    fn close_element(&mut self) -> Result<(), BindError> {
        if self.open.len() <= 1 {
            return Err(BindError::MalformedDocument {
                reason: "no open element to close".to_string(),
                offset: 0,
            });
        }
        self.open.pop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{serialize_node, SerializeOptions};

    #[test]
    fn test_node_record_builds_tree() {
        let mut record = NodeRecord::new();
        record.open_element(None, "customer", None).unwrap();
        record.attribute(None, "id", None, "7").unwrap();
        record.open_element(None, "name", None).unwrap();
        record.characters("Ada").unwrap();
        record.close_element().unwrap();
        record.close_element().unwrap();

        let doc = record.into_document();
        let root = doc.root_element().unwrap();
        assert_eq!(doc.local_name(root), "customer");
        assert_eq!(doc.attribute(root, None, "id"), Some("7"));

        let options = SerializeOptions {
            xml_declaration: false,
            ..SerializeOptions::default()
        };
        assert_eq!(
            serialize_node(&doc, root, &options),
            "<customer id=\"7\"><name>Ada</name></customer>"
        );
    }

    #[test]
    fn test_node_record_namespace_declarations() {
        let mut record = NodeRecord::new();
        record
            .open_element(Some("p"), "root", Some("http://x"))
            .unwrap();
        record.namespace_declaration(Some("p"), "http://x").unwrap();
        record.namespace_declaration(None, "http://d").unwrap();
        record.close_element().unwrap();

        let doc = record.into_document();
        let root = doc.root_element().unwrap();
        assert_eq!(doc.namespace_uri(root), Some("http://x"));
        assert_eq!(doc.attribute(root, Some(ns::XMLNS), "p"), Some("http://x"));
        assert_eq!(
            doc.attribute(root, Some(ns::XMLNS), "xmlns"),
            Some("http://d")
        );
    }

    #[test]
    fn test_node_record_rejects_top_level_attribute() {
        let mut record = NodeRecord::new();
        let err = record.attribute(None, "a", None, "1").unwrap_err();
        assert_eq!(err.code(), 25007);
    }
}
