//! Marshal records
//!
//! A record is the output half of a marshal call. The marshaller drives
//! the record through one pass of document, element, attribute and
//! character events; the record turns that stream into a concrete output
//! form:
//!
//! - [`WriterRecord`]: unformatted markup appended to an owned string
//! - [`NodeRecord`](super::NodeRecord): a detached document tree
//! - [`SaxRecord`](super::SaxRecord): content-handler callbacks
//!
//! Attributes and namespace declarations may arrive at any point between
//! `open_element` and the first child event, so records that cannot
//! reorder their output keep the start tag open until then.

use crate::core::entities::{escape_attribute, escape_text};
use crate::error::BindError;
use crate::tree::node::NodeKind;
use crate::tree::serialize::write_cdata;
use crate::tree::{Document, NodeId, DOCUMENT};

/// Output sink for one marshal traversal.
///
/// Implementations own any buffering; every method reports failures as
/// [`BindError`] so a sink backed by fallible output can abort the call.
pub trait MarshalRecord {
    /// Begin the document. Writes the XML declaration where one applies.
    fn start_document(&mut self, version: &str, encoding: Option<&str>) -> Result<(), BindError>;

    /// Finish the document.
    fn end_document(&mut self) -> Result<(), BindError>;

    /// Open an element. Attributes and namespace declarations may follow
    /// until the first child event arrives.
    fn open_element(
        &mut self,
        prefix: Option<&str>,
        local_name: &str,
        namespace_uri: Option<&str>,
    ) -> Result<(), BindError>;

    /// Declare a namespace on the open element; `None` declares the
    /// default namespace.
    fn namespace_declaration(&mut self, prefix: Option<&str>, uri: &str) -> Result<(), BindError>;

    /// Write an attribute on the open element.
    fn attribute(
        &mut self,
        prefix: Option<&str>,
        local_name: &str,
        namespace_uri: Option<&str>,
        value: &str,
    ) -> Result<(), BindError>;

    /// Character content.
    fn characters(&mut self, text: &str) -> Result<(), BindError>;

    /// Character content wrapped in a CDATA section.
    fn cdata(&mut self, text: &str) -> Result<(), BindError>;

    /// A comment.
    fn comment(&mut self, text: &str) -> Result<(), BindError>;

    /// A processing instruction.
    fn processing_instruction(&mut self, target: &str, data: Option<&str>)
        -> Result<(), BindError>;

    /// Close the innermost open element.
    fn close_element(&mut self) -> Result<(), BindError>;
}

/// Lifecycle of a [`WriterRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Fresh,
    Writing,
    Finished,
}

/// Marshal record that streams unformatted markup into an owned string.
///
/// Start tags are held open until the first child event so attributes can
/// still be appended, and an element closed without content collapses to
/// the self-closing form.
#[derive(Debug)]
pub struct WriterRecord {
    out: String,
    open_tags: Vec<String>,
    tag_open: bool,
    state: WriterState,
}

impl WriterRecord {
    pub fn new() -> Self {
        WriterRecord {
            out: String::with_capacity(256),
            open_tags: Vec::new(),
            tag_open: false,
            state: WriterState::Fresh,
        }
    }

    /// The markup written so far.
    pub fn as_str(&self) -> &str {
        &self.out
    }

    /// Consume the record, returning the finished markup.
    pub fn into_string(self) -> String {
        self.out
    }

    fn check_writable(&mut self) -> Result<(), BindError> {
        if self.state == WriterState::Finished {
            return Err(self.misuse("document already finished"));
        }
        self.state = WriterState::Writing;
        Ok(())
    }

    fn close_start_tag(&mut self) {
        if self.tag_open {
            self.out.push('>');
            self.tag_open = false;
        }
    }

    fn misuse(&self, reason: &str) -> BindError {
        BindError::MalformedDocument {
            reason: reason.to_string(),
            offset: self.out.len(),
        }
    }
}

impl Default for WriterRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl MarshalRecord for WriterRecord {
    fn start_document(&mut self, version: &str, encoding: Option<&str>) -> Result<(), BindError> {
        if self.state != WriterState::Fresh {
            return Err(self.misuse("document already started"));
        }
        self.state = WriterState::Writing;
        self.out.push_str("<?xml version=\"");
        self.out.push_str(version);
        self.out.push('"');
        if let Some(label) = encoding {
            self.out.push_str(" encoding=\"");
            self.out.push_str(label);
            self.out.push('"');
        }
        self.out.push_str("?>");
        Ok(())
    }

    fn end_document(&mut self) -> Result<(), BindError> {
        if self.tag_open || !self.open_tags.is_empty() {
            return Err(self.misuse("document finished with open elements"));
        }
        self.state = WriterState::Finished;
        Ok(())
    }

    fn open_element(
        &mut self,
        prefix: Option<&str>,
        local_name: &str,
        _namespace_uri: Option<&str>,
    ) -> Result<(), BindError> {
        self.check_writable()?;
        self.close_start_tag();
        let mut qualified = String::with_capacity(local_name.len() + 8);
        if let Some(prefix) = prefix {
            qualified.push_str(prefix);
            qualified.push(':');
        }
        qualified.push_str(local_name);
        self.out.push('<');
        self.out.push_str(&qualified);
        self.open_tags.push(qualified);
        self.tag_open = true;
        Ok(())
    }

    fn namespace_declaration(&mut self, prefix: Option<&str>, uri: &str) -> Result<(), BindError> {
        if !self.tag_open {
            return Err(self.misuse("namespace declared outside a start tag"));
        }
        self.out.push(' ');
        match prefix {
            Some(prefix) => {
                self.out.push_str("xmlns:");
                self.out.push_str(prefix);
            }
            None => self.out.push_str("xmlns"),
        }
        self.out.push_str("=\"");
        escape_attribute(uri, &mut self.out);
        self.out.push('"');
        Ok(())
    }

    fn attribute(
        &mut self,
        prefix: Option<&str>,
        local_name: &str,
        _namespace_uri: Option<&str>,
        value: &str,
    ) -> Result<(), BindError> {
        if !self.tag_open {
            return Err(self.misuse("attribute written outside a start tag"));
        }
        self.out.push(' ');
        if let Some(prefix) = prefix {
            self.out.push_str(prefix);
            self.out.push(':');
        }
        self.out.push_str(local_name);
        self.out.push_str("=\"");
        escape_attribute(value, &mut self.out);
        self.out.push('"');
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<(), BindError> {
        self.check_writable()?;
        self.close_start_tag();
        escape_text(text, &mut self.out);
        Ok(())
    }

    fn cdata(&mut self, text: &str) -> Result<(), BindError> {
        self.check_writable()?;
        self.close_start_tag();
        write_cdata(text, &mut self.out);
        Ok(())
    }

    fn comment(&mut self, text: &str) -> Result<(), BindError> {
        self.check_writable()?;
        self.close_start_tag();
        self.out.push_str("<!--");
        self.out.push_str(text);
        self.out.push_str("-->");
        Ok(())
    }

    fn processing_instruction(
        &mut self,
        target: &str,
        data: Option<&str>,
    ) -> Result<(), BindError> {
        self.check_writable()?;
        self.close_start_tag();
        self.out.push_str("<?");
        self.out.push_str(target);
        if let Some(data) = data {
            if !data.is_empty() {
                self.out.push(' ');
                self.out.push_str(data);
            }
        }
        self.out.push_str("?>");
        Ok(())
    }

    fn close_element(&mut self) -> Result<(), BindError> {
        let qualified = match self.open_tags.pop() {
            Some(name) => name,
            None => return Err(self.misuse("no open element to close")),
        };
        if self.tag_open {
            self.out.push_str("/>");
            self.tag_open = false;
        } else {
            self.out.push_str("</");
            self.out.push_str(&qualified);
            self.out.push('>');
        }
        Ok(())
    }
}

/// Replay a finished document tree into a record, comments and processing
/// instructions included. Used when a preserved document is marshalled to
/// a streaming or SAX sink.
pub fn replay_document<R: MarshalRecord>(
    doc: &Document,
    record: &mut R,
    document_events: bool,
) -> Result<(), BindError> {
    if document_events {
        record.start_document(
            doc.xml_version().unwrap_or("1.0"),
            doc.encoding_label().or(Some("UTF-8")),
        )?;
    }
    for child in doc.children(DOCUMENT) {
        replay_node(doc, child, record)?;
    }
    if document_events {
        record.end_document()?;
    }
    Ok(())
}

fn replay_node<R: MarshalRecord>(
    doc: &Document,
    id: NodeId,
    record: &mut R,
) -> Result<(), BindError> {
    let node = match doc.get(id) {
        Some(node) => node,
        None => return Ok(()),
    };
    match node.kind {
        NodeKind::Element => {
            record.open_element(doc.prefix(id), doc.local_name(id), doc.namespace_uri(id))?;
            for attr in &node.attributes {
                let name = doc.strings.get(attr.name_id);
                match doc.strings.get_nonempty(attr.prefix_id) {
                    Some("xmlns") => record.namespace_declaration(Some(name), &attr.value)?,
                    None if name == "xmlns" => {
                        record.namespace_declaration(None, &attr.value)?;
                    }
                    prefix => record.attribute(
                        prefix,
                        name,
                        doc.strings.get_nonempty(attr.namespace_id),
                        &attr.value,
                    )?,
                }
            }
            for child in doc.children(id) {
                replay_node(doc, child, record)?;
            }
            record.close_element()?;
        }
        NodeKind::Text => record.characters(&node.content)?,
        NodeKind::CData => record.cdata(&node.content)?,
        NodeKind::Comment => record.comment(&node.content)?,
        NodeKind::ProcessingInstruction => {
            let data = if node.content.is_empty() {
                None
            } else {
                Some(node.content.as_str())
            };
            record.processing_instruction(doc.strings.get(node.name_id), data)?;
        }
        NodeKind::Document => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_nested_elements() {
        let mut record = WriterRecord::new();
        record.open_element(None, "customer", None).unwrap();
        record.open_element(None, "name", None).unwrap();
        record.characters("Ada").unwrap();
        record.close_element().unwrap();
        record.close_element().unwrap();
        record.end_document().unwrap();
        assert_eq!(record.as_str(), "<customer><name>Ada</name></customer>");
    }

    #[test]
    fn test_writer_declaration_and_attributes() {
        let mut record = WriterRecord::new();
        record.start_document("1.0", Some("UTF-8")).unwrap();
        record.open_element(Some("p"), "root", Some("http://x")).unwrap();
        record.namespace_declaration(Some("p"), "http://x").unwrap();
        record.attribute(None, "label", None, "a \"b\" <c>").unwrap();
        record.close_element().unwrap();
        assert_eq!(
            record.as_str(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <p:root xmlns:p=\"http://x\" label=\"a &quot;b&quot; &lt;c>\"/>"
        );
    }

    #[test]
    fn test_writer_escapes_text() {
        let mut record = WriterRecord::new();
        record.open_element(None, "t", None).unwrap();
        record.characters("1 < 2 & 3 > 2").unwrap();
        record.close_element().unwrap();
        assert_eq!(record.as_str(), "<t>1 &lt; 2 &amp; 3 &gt; 2</t>");
    }

    #[test]
    fn test_writer_cdata() {
        let mut record = WriterRecord::new();
        record.open_element(None, "script", None).unwrap();
        record.cdata("if (a < b) then").unwrap();
        record.close_element().unwrap();
        assert_eq!(record.as_str(), "<script><![CDATA[if (a < b) then]]></script>");
    }

    #[test]
    fn test_writer_attribute_after_content_rejected() {
        let mut record = WriterRecord::new();
        record.open_element(None, "a", None).unwrap();
        record.characters("x").unwrap();
        let err = record.attribute(None, "late", None, "1").unwrap_err();
        assert_eq!(err.code(), 25007);
    }

    #[test]
    fn test_writer_unbalanced_close_rejected() {
        let mut record = WriterRecord::new();
        assert!(record.close_element().is_err());
    }

    #[test]
    fn test_replay_round_trips_markup() {
        let text = "<order xmlns:p=\"http://x\" status=\"open\">\
                    <!-- audit --><p:item>5</p:item><?page 2?></order>";
        let doc = Document::parse_str(text).unwrap();
        let mut record = WriterRecord::new();
        replay_document(&doc, &mut record, false).unwrap();
        assert_eq!(record.as_str(), text);
    }
}
