//! Content-handler record
//!
//! Adapts marshal events to [`ContentHandler`] callbacks. A SAX
//! start-element event carries the complete attribute set, so each start
//! tag is held back until the first child event or the close arrives;
//! prefix mappings collected in between are reported just before it.

use super::record::MarshalRecord;
use crate::error::BindError;
use crate::sax::{ContentHandler, SaxAttribute};

/// An element whose start event has not been reported yet.
#[derive(Debug, Default)]
struct PendingElement {
    namespace_uri: Option<String>,
    local_name: String,
    qualified_name: String,
    attributes: Vec<SaxAttribute>,
    /// (prefix, uri); "" is the default namespace
    mappings: Vec<(String, String)>,
}

/// An element already reported to the handler.
#[derive(Debug)]
struct OpenElement {
    namespace_uri: Option<String>,
    local_name: String,
    qualified_name: String,
    prefixes: Vec<String>,
}

/// Marshal record that drives a [`ContentHandler`].
pub struct SaxRecord<'h, H: ContentHandler> {
    handler: &'h mut H,
    pending: Option<PendingElement>,
    open: Vec<OpenElement>,
}

impl<'h, H: ContentHandler> SaxRecord<'h, H> {
    pub fn new(handler: &'h mut H) -> Self {
        SaxRecord {
            handler,
            pending: None,
            open: Vec::new(),
        }
    }

    fn flush_pending(&mut self) -> Result<(), BindError> {
        let pending = match self.pending.take() {
            Some(pending) => pending,
            None => return Ok(()),
        };
        for (prefix, uri) in &pending.mappings {
            self.handler.start_prefix_mapping(prefix, uri)?;
        }
        self.handler.start_element(
            pending.namespace_uri.as_deref(),
            &pending.local_name,
            &pending.qualified_name,
            &pending.attributes,
        )?;
        self.open.push(OpenElement {
            namespace_uri: pending.namespace_uri,
            local_name: pending.local_name,
            qualified_name: pending.qualified_name,
            prefixes: pending.mappings.into_iter().map(|(p, _)| p).collect(),
        });
        Ok(())
    }

    fn misuse(&self, reason: &str) -> BindError {
        BindError::MalformedDocument {
            reason: reason.to_string(),
            offset: 0,
        }
    }
}

fn qualified(prefix: Option<&str>, local_name: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}:{local_name}"),
        None => local_name.to_string(),
    }
}

impl<H: ContentHandler> MarshalRecord for SaxRecord<'_, H> {
    fn start_document(&mut self, _version: &str, _encoding: Option<&str>) -> Result<(), BindError> {
        self.handler.start_document()
    }

    fn end_document(&mut self) -> Result<(), BindError> {
        self.handler.end_document()
    }

    fn open_element(
        &mut self,
        prefix: Option<&str>,
        local_name: &str,
        namespace_uri: Option<&str>,
    ) -> Result<(), BindError> {
        self.flush_pending()?;
        self.pending = Some(PendingElement {
            namespace_uri: namespace_uri.map(str::to_string),
            local_name: local_name.to_string(),
            qualified_name: qualified(prefix, local_name),
            attributes: Vec::new(),
            mappings: Vec::new(),
        });
        Ok(())
    }

    fn namespace_declaration(&mut self, prefix: Option<&str>, uri: &str) -> Result<(), BindError> {
        match self.pending.as_mut() {
            Some(pending) => {
                pending
                    .mappings
                    .push((prefix.unwrap_or("").to_string(), uri.to_string()));
                Ok(())
            }
            None => Err(self.misuse("namespace declared outside a start tag")),
        }
    }

    fn attribute(
        &mut self,
        prefix: Option<&str>,
        local_name: &str,
        namespace_uri: Option<&str>,
        value: &str,
    ) -> Result<(), BindError> {
        match self.pending.as_mut() {
            Some(pending) => {
                pending.attributes.push(SaxAttribute {
                    namespace_uri: namespace_uri.map(str::to_string),
                    local_name: local_name.to_string(),
                    qualified_name: qualified(prefix, local_name),
                    value: value.to_string(),
                });
                Ok(())
            }
            None => Err(self.misuse("attribute written outside a start tag")),
        }
    }

    fn characters(&mut self, text: &str) -> Result<(), BindError> {
        self.flush_pending()?;
        self.handler.characters(text)
    }

    fn cdata(&mut self, text: &str) -> Result<(), BindError> {
        self.flush_pending()?;
        self.handler.cdata(text)
    }

    fn comment(&mut self, text: &str) -> Result<(), BindError> {
        self.flush_pending()?;
        self.handler.comment(text)
    }

    fn processing_instruction(
        &mut self,
        target: &str,
        data: Option<&str>,
    ) -> Result<(), BindError> {
        self.flush_pending()?;
        self.handler.processing_instruction(target, data.unwrap_or(""))
    }

    fn close_element(&mut self) -> Result<(), BindError> {
        self.flush_pending()?;
        let element = match self.open.pop() {
            Some(element) => element,
            None => return Err(self.misuse("no open element to close")),
        };
        self.handler.end_element(
            element.namespace_uri.as_deref(),
            &element.local_name,
            &element.qualified_name,
        )?;
        for prefix in element.prefixes.iter().rev() {
            self.handler.end_prefix_mapping(prefix)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sax::{EventCollector, SaxEvent};

    #[test]
    fn test_sax_record_defers_start_element() {
        let mut collector = EventCollector::new();
        {
            let mut record = SaxRecord::new(&mut collector);
            record.start_document("1.0", Some("UTF-8")).unwrap();
            record
                .open_element(Some("p"), "root", Some("http://x"))
                .unwrap();
            record.namespace_declaration(Some("p"), "http://x").unwrap();
            record.attribute(None, "id", None, "1").unwrap();
            record.characters("hi").unwrap();
            record.close_element().unwrap();
            record.end_document().unwrap();
        }

        let events = collector.events();
        assert_eq!(events[0], SaxEvent::StartDocument);
        assert_eq!(
            events[1],
            SaxEvent::PrefixMapping {
                prefix: "p".to_string(),
                uri: "http://x".to_string(),
            }
        );
        match &events[2] {
            SaxEvent::StartElement {
                namespace_uri,
                qualified_name,
                attributes,
                ..
            } => {
                assert_eq!(namespace_uri.as_deref(), Some("http://x"));
                assert_eq!(qualified_name, "p:root");
                assert_eq!(attributes.len(), 1);
                assert_eq!(attributes[0].value, "1");
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(events[3], SaxEvent::Characters("hi".to_string()));
        assert_eq!(
            events[4],
            SaxEvent::EndElement {
                qualified_name: "p:root".to_string(),
            }
        );
        assert_eq!(
            events[5],
            SaxEvent::EndPrefixMapping {
                prefix: "p".to_string(),
            }
        );
        assert_eq!(events[6], SaxEvent::EndDocument);
    }

    #[test]
    fn test_sax_record_empty_element_still_reported() {
        let mut collector = EventCollector::new();
        {
            let mut record = SaxRecord::new(&mut collector);
            record.open_element(None, "empty", None).unwrap();
            record.close_element().unwrap();
        }
        let events = collector.events();
        assert!(matches!(events[0], SaxEvent::StartElement { .. }));
        assert!(matches!(events[1], SaxEvent::EndElement { .. }));
    }
}
