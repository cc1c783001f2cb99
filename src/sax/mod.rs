//! SAX (Simple API for XML) Module
//!
//! Event-based output surface for marshalling:
//!
//! ```text
//! Marshaller ---> ContentHandler ---> caller's sink
//! ```
//!
//! `ContentHandler` methods default to no-ops so a sink only implements
//! the callbacks it cares about. `cdata` falls back to `characters` for
//! handlers without lexical support. `EventCollector` records every
//! callback as an owned `SaxEvent`, which is also what the tests use.

use crate::error::BindError;

/// An attribute reported with `start_element`
#[derive(Debug, Clone, PartialEq)]
pub struct SaxAttribute {
    pub namespace_uri: Option<String>,
    pub local_name: String,
    /// Prefixed form as written, e.g. `ns0:id`
    pub qualified_name: String,
    pub value: String,
}

/// Receiver for marshalling events
#[allow(unused_variables)]
pub trait ContentHandler {
    fn start_document(&mut self) -> Result<(), BindError> {
        Ok(())
    }

    fn end_document(&mut self) -> Result<(), BindError> {
        Ok(())
    }

    /// Reports a namespace binding opening on the next element
    fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) -> Result<(), BindError> {
        Ok(())
    }

    fn end_prefix_mapping(&mut self, prefix: &str) -> Result<(), BindError> {
        Ok(())
    }

    fn start_element(
        &mut self,
        namespace_uri: Option<&str>,
        local_name: &str,
        qualified_name: &str,
        attributes: &[SaxAttribute],
    ) -> Result<(), BindError> {
        Ok(())
    }

    fn end_element(
        &mut self,
        namespace_uri: Option<&str>,
        local_name: &str,
        qualified_name: &str,
    ) -> Result<(), BindError> {
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<(), BindError> {
        Ok(())
    }

    /// Lexical CDATA callback; plain character data by default
    fn cdata(&mut self, text: &str) -> Result<(), BindError> {
        self.characters(text)
    }

    fn comment(&mut self, text: &str) -> Result<(), BindError> {
        Ok(())
    }

    fn processing_instruction(&mut self, target: &str, data: &str) -> Result<(), BindError> {
        Ok(())
    }
}

/// Owned record of a single handler callback
#[derive(Debug, Clone, PartialEq)]
pub enum SaxEvent {
    StartDocument,
    EndDocument,
    PrefixMapping {
        prefix: String,
        uri: String,
    },
    EndPrefixMapping {
        prefix: String,
    },
    StartElement {
        namespace_uri: Option<String>,
        local_name: String,
        qualified_name: String,
        attributes: Vec<SaxAttribute>,
    },
    EndElement {
        qualified_name: String,
    },
    Characters(String),
    CData(String),
    Comment(String),
    ProcessingInstruction {
        target: String,
        data: String,
    },
}

/// Collector that gathers every callback as an owned event
#[derive(Debug, Default)]
pub struct EventCollector {
    events: Vec<SaxEvent>,
}

impl EventCollector {
    /// Create a new collector
    pub fn new() -> Self {
        Self {
            events: Vec::with_capacity(64),
        }
    }

    /// Get the collected events as a slice
    pub fn events(&self) -> &[SaxEvent] {
        &self.events
    }

    /// Take the collected events
    pub fn take_events(&mut self) -> Vec<SaxEvent> {
        std::mem::take(&mut self.events)
    }

    /// Get number of collected events
    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}

impl ContentHandler for EventCollector {
    fn start_document(&mut self) -> Result<(), BindError> {
        self.events.push(SaxEvent::StartDocument);
        Ok(())
    }

    fn end_document(&mut self) -> Result<(), BindError> {
        self.events.push(SaxEvent::EndDocument);
        Ok(())
    }

    fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) -> Result<(), BindError> {
        self.events.push(SaxEvent::PrefixMapping {
            prefix: prefix.to_string(),
            uri: uri.to_string(),
        });
        Ok(())
    }

    fn end_prefix_mapping(&mut self, prefix: &str) -> Result<(), BindError> {
        self.events.push(SaxEvent::EndPrefixMapping {
            prefix: prefix.to_string(),
        });
        Ok(())
    }

    fn start_element(
        &mut self,
        namespace_uri: Option<&str>,
        local_name: &str,
        qualified_name: &str,
        attributes: &[SaxAttribute],
    ) -> Result<(), BindError> {
        self.events.push(SaxEvent::StartElement {
            namespace_uri: namespace_uri.map(str::to_string),
            local_name: local_name.to_string(),
            qualified_name: qualified_name.to_string(),
            attributes: attributes.to_vec(),
        });
        Ok(())
    }

    fn end_element(
        &mut self,
        _namespace_uri: Option<&str>,
        _local_name: &str,
        qualified_name: &str,
    ) -> Result<(), BindError> {
        self.events.push(SaxEvent::EndElement {
            qualified_name: qualified_name.to_string(),
        });
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<(), BindError> {
        self.events.push(SaxEvent::Characters(text.to_string()));
        Ok(())
    }

    fn cdata(&mut self, text: &str) -> Result<(), BindError> {
        self.events.push(SaxEvent::CData(text.to_string()));
        Ok(())
    }

    fn comment(&mut self, text: &str) -> Result<(), BindError> {
        self.events.push(SaxEvent::Comment(text.to_string()));
        Ok(())
    }

    fn processing_instruction(&mut self, target: &str, data: &str) -> Result<(), BindError> {
        self.events.push(SaxEvent::ProcessingInstruction {
            target: target.to_string(),
            data: data.to_string(),
        });
        Ok(())
    }
}
