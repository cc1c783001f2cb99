//! Root envelopes
//!
//! A root envelope overrides the static root identity of a payload for one
//! marshal call, or carries the raw root identity out of an unmarshal call
//! that matched no descriptor. Envelopes live for the duration of a call
//! and are never persisted.

use crate::core::qname::QualifiedName;
use crate::value::Value;

/// Dynamic root wrapper around one payload value.
#[derive(Debug, Clone, PartialEq)]
pub struct RootEnvelope {
    payload: Value,
    local_name: String,
    namespace_uri: Option<String>,
    encoding: Option<String>,
    xml_version: Option<String>,
    schema_location: Option<String>,
    no_namespace_schema_location: Option<String>,
    nil: bool,
}

impl RootEnvelope {
    pub fn new(local_name: &str, payload: impl Into<Value>) -> Self {
        RootEnvelope {
            payload: payload.into(),
            local_name: local_name.to_string(),
            namespace_uri: None,
            encoding: None,
            xml_version: None,
            schema_location: None,
            no_namespace_schema_location: None,
            nil: false,
        }
    }

    pub fn set_namespace_uri(&mut self, uri: &str) -> &mut Self {
        self.namespace_uri = if uri.is_empty() {
            None
        } else {
            Some(uri.to_string())
        };
        self
    }

    pub fn set_encoding(&mut self, encoding: &str) -> &mut Self {
        self.encoding = Some(encoding.to_string());
        self
    }

    pub fn set_xml_version(&mut self, version: &str) -> &mut Self {
        self.xml_version = Some(version.to_string());
        self
    }

    pub fn set_schema_location(&mut self, location: &str) -> &mut Self {
        self.schema_location = Some(location.to_string());
        self
    }

    pub fn set_no_namespace_schema_location(&mut self, location: &str) -> &mut Self {
        self.no_namespace_schema_location = Some(location.to_string());
        self
    }

    /// Mark the root element as `xsi:nil="true"` with no content.
    pub fn set_nil(&mut self, nil: bool) -> &mut Self {
        self.nil = nil;
        self
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn into_payload(self) -> Value {
        self.payload
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    pub fn namespace_uri(&self) -> Option<&str> {
        self.namespace_uri.as_deref()
    }

    pub fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    pub fn xml_version(&self) -> Option<&str> {
        self.xml_version.as_deref()
    }

    pub fn schema_location(&self) -> Option<&str> {
        self.schema_location.as_deref()
    }

    pub fn no_namespace_schema_location(&self) -> Option<&str> {
        self.no_namespace_schema_location.as_deref()
    }

    pub fn is_nil(&self) -> bool {
        self.nil
    }

    /// The envelope's element identity.
    pub fn qualified_name(&self) -> QualifiedName {
        QualifiedName::new(self.namespace_uri.as_deref(), &self.local_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_identity() {
        let mut envelope = RootEnvelope::new("invoice", Value::Text("x".into()));
        envelope.set_namespace_uri("http://billing");

        let qname = envelope.qualified_name();
        assert_eq!(qname.local_name(), "invoice");
        assert_eq!(qname.namespace_uri(), Some("http://billing"));
    }

    #[test]
    fn test_empty_namespace_normalizes() {
        let mut envelope = RootEnvelope::new("note", Value::Null);
        envelope.set_namespace_uri("");
        assert_eq!(envelope.namespace_uri(), None);
    }
}
