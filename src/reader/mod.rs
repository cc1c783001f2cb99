//! XML Reader Module
//!
//! Pull parser over a UTF-8 string slice:
//! - SliceReader: single-pass event reader, zero-copy where possible
//! - Events: XML event types for pull parsing
//!
//! Bytes are decoded to UTF-8 once up front (see `core::encoding`), so the
//! reader only ever sees `&str` and borrows names and unescaped values
//! straight from the input.

pub mod events;

use std::borrow::Cow;

use memchr::{memchr, memmem};

use crate::core::entities::decode_text;
use crate::error::BindError;
use events::{EndElement, RawAttribute, StartElement, XmlEvent};

/// Pull parser yielding `XmlEvent`s from a string slice
pub struct SliceReader<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> SliceReader<'a> {
    /// Create a reader positioned at the start of `input`
    pub fn new(input: &'a str) -> Self {
        SliceReader { input, pos: 0 }
    }

    /// Byte offset of the next unread character
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Get the next XML event, or `None` at end of input
    pub fn next_event(&mut self) -> Result<Option<XmlEvent<'a>>, BindError> {
        if self.pos >= self.input.len() {
            return Ok(None);
        }

        if self.bytes()[self.pos] != b'<' {
            return self.read_text().map(Some);
        }

        let rest = &self.input[self.pos..];
        if rest.starts_with("</") {
            self.read_end_tag().map(Some)
        } else if rest.starts_with("<!--") {
            self.read_comment().map(Some)
        } else if rest.starts_with("<![CDATA[") {
            self.read_cdata().map(Some)
        } else if rest.starts_with("<!DOCTYPE") {
            self.read_doctype().map(Some)
        } else if rest.starts_with("<?") {
            self.read_processing_instruction().map(Some)
        } else if rest.starts_with("<!") {
            Err(self.error("unsupported markup declaration"))
        } else {
            self.read_start_tag().map(Some)
        }
    }

    #[inline]
    fn bytes(&self) -> &'a [u8] {
        self.input.as_bytes()
    }

    fn error(&self, reason: impl Into<String>) -> BindError {
        malformed(reason, self.pos)
    }

    /// Character data up to the next `<`
    fn read_text(&mut self) -> Result<XmlEvent<'a>, BindError> {
        let start = self.pos;
        let end = match memchr(b'<', &self.bytes()[start..]) {
            Some(off) => start + off,
            None => self.input.len(),
        };
        self.pos = end;
        Ok(XmlEvent::Text(decode_text(&self.input[start..end])))
    }

    fn read_end_tag(&mut self) -> Result<XmlEvent<'a>, BindError> {
        let start = self.pos + 2;
        let close = memchr(b'>', &self.bytes()[start..])
            .ok_or_else(|| self.error("unterminated end tag"))?;
        // Trailing whitespace before `>` is allowed
        let name = self.input[start..start + close].trim_end();
        if !valid_name(name) {
            return Err(self.error(format!("malformed end tag `</{name}>`")));
        }
        self.pos = start + close + 1;
        Ok(XmlEvent::EndElement(EndElement::new(name)))
    }

    fn read_comment(&mut self) -> Result<XmlEvent<'a>, BindError> {
        let start = self.pos + 4;
        let close = memmem::find(&self.bytes()[start..], b"-->")
            .ok_or_else(|| self.error("unterminated comment"))?;
        let content = &self.input[start..start + close];
        self.pos = start + close + 3;
        Ok(XmlEvent::Comment(content))
    }

    fn read_cdata(&mut self) -> Result<XmlEvent<'a>, BindError> {
        let start = self.pos + 9;
        let close = memmem::find(&self.bytes()[start..], b"]]>")
            .ok_or_else(|| self.error("unterminated CDATA section"))?;
        let content = &self.input[start..start + close];
        self.pos = start + close + 3;
        Ok(XmlEvent::CData(content))
    }

    /// Scan past a DOCTYPE declaration, honoring an internal subset
    fn read_doctype(&mut self) -> Result<XmlEvent<'a>, BindError> {
        let start = self.pos;
        let bytes = self.bytes();
        let mut depth = 0usize;
        let mut idx = start + 9;
        while idx < bytes.len() {
            match bytes[idx] {
                b'[' => depth += 1,
                b']' => depth = depth.saturating_sub(1),
                b'>' if depth == 0 => {
                    let content = &self.input[start..idx + 1];
                    self.pos = idx + 1;
                    return Ok(XmlEvent::DocType(content));
                }
                _ => {}
            }
            idx += 1;
        }
        Err(self.error("unterminated DOCTYPE declaration"))
    }

    fn read_processing_instruction(&mut self) -> Result<XmlEvent<'a>, BindError> {
        let start = self.pos + 2;
        let close = memmem::find(&self.bytes()[start..], b"?>")
            .ok_or_else(|| self.error("unterminated processing instruction"))?;
        let content = &self.input[start..start + close];

        let (target, data) = match content.find(|c: char| c.is_ascii_whitespace()) {
            Some(ws) => {
                let data = content[ws..].trim_start();
                (&content[..ws], (!data.is_empty()).then_some(data))
            }
            None => (content, None),
        };
        if !valid_name(target) {
            return Err(self.error("processing instruction without a target"));
        }

        let data_offset = start + target.len();
        self.pos = start + close + 2;
        if target == "xml" {
            return parse_xml_declaration(data.unwrap_or(""), data_offset);
        }
        Ok(XmlEvent::ProcessingInstruction { target, data })
    }

    fn read_start_tag(&mut self) -> Result<XmlEvent<'a>, BindError> {
        let bytes = self.bytes();
        let start = self.pos + 1;

        // Find the closing `>` outside quoted attribute values
        let mut idx = start;
        let mut in_quote = 0u8;
        loop {
            if idx >= bytes.len() {
                return Err(self.error("unterminated start tag"));
            }
            let b = bytes[idx];
            if in_quote != 0 {
                if b == in_quote {
                    in_quote = 0;
                }
            } else {
                match b {
                    b'"' | b'\'' => in_quote = b,
                    b'>' => break,
                    b'<' => return Err(malformed("`<` inside a tag", idx)),
                    _ => {}
                }
            }
            idx += 1;
        }

        let is_empty = idx > start && bytes[idx - 1] == b'/';
        let content_end = if is_empty { idx - 1 } else { idx };
        let content = &self.input[start..content_end];

        let cbytes = content.as_bytes();
        let mut name_end = 0;
        while name_end < cbytes.len() && !cbytes[name_end].is_ascii_whitespace() {
            name_end += 1;
        }
        let name = &content[..name_end];
        if !valid_name(name) {
            return Err(malformed(format!("malformed element name `{name}`"), start));
        }

        let attributes = parse_attribute_list(&content[name_end..], start + name_end)?;
        self.pos = idx + 1;

        let element = StartElement::new(name, attributes);
        Ok(if is_empty {
            XmlEvent::EmptyElement(element)
        } else {
            XmlEvent::StartElement(element)
        })
    }
}

impl<'a> Iterator for SliceReader<'a> {
    type Item = Result<XmlEvent<'a>, BindError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_event().transpose()
    }
}

#[inline]
fn malformed(reason: impl Into<String>, offset: usize) -> BindError {
    BindError::MalformedDocument {
        reason: reason.into(),
        offset,
    }
}

/// Cheap name check; full NameChar validation is not attempted
fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && !name
            .bytes()
            .any(|b| b.is_ascii_whitespace() || matches!(b, b'/' | b'=' | b'"' | b'\'' | b'<' | b'>'))
}

/// Parse `name="value"` pairs; `base` is the byte offset of `content`
/// in the whole input, used for error positions
fn parse_attribute_list(content: &str, base: usize) -> Result<Vec<RawAttribute<'_>>, BindError> {
    let bytes = content.as_bytes();
    let mut attrs: Vec<RawAttribute<'_>> = Vec::new();
    let mut pos = 0;

    loop {
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos >= bytes.len() {
            return Ok(attrs);
        }

        let name_start = pos;
        while pos < bytes.len() && !bytes[pos].is_ascii_whitespace() && bytes[pos] != b'=' {
            pos += 1;
        }
        let name = &content[name_start..pos];
        if !valid_name(name) {
            return Err(malformed("malformed attribute name", base + name_start));
        }

        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos >= bytes.len() || bytes[pos] != b'=' {
            return Err(malformed(
                format!("attribute `{name}` has no value"),
                base + pos,
            ));
        }
        pos += 1;
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos >= bytes.len() || (bytes[pos] != b'"' && bytes[pos] != b'\'') {
            return Err(malformed(
                format!("attribute `{name}` value is not quoted"),
                base + pos,
            ));
        }
        let quote = bytes[pos];
        pos += 1;
        let value_start = pos;
        let close = memchr(quote, &bytes[pos..]).ok_or_else(|| {
            malformed(
                format!("attribute `{name}` value is not terminated"),
                base + pos,
            )
        })?;
        let value = decode_text(&content[value_start..value_start + close]);
        pos = value_start + close + 1;

        if attrs.iter().any(|a| a.name == name) {
            return Err(malformed(
                format!("duplicate attribute `{name}`"),
                base + name_start,
            ));
        }
        attrs.push(RawAttribute::new(name, value));
    }
}

/// Pseudo-attributes of `<?xml ...?>`; unknown ones are ignored
fn parse_xml_declaration(data: &str, offset: usize) -> Result<XmlEvent<'_>, BindError> {
    let mut version = Cow::Borrowed("1.0");
    let mut encoding = None;
    let mut standalone = None;
    for attr in parse_attribute_list(data, offset)? {
        match attr.name {
            "version" => version = attr.value,
            "encoding" => encoding = Some(attr.value),
            "standalone" => standalone = Some(attr.value.as_ref() == "yes"),
            _ => {}
        }
    }
    Ok(XmlEvent::XmlDeclaration {
        version,
        encoding,
        standalone,
    })
}
