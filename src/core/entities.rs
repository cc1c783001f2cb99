//! XML entity handling
//!
//! Input side: decodes the five built-in entities and numeric character
//! references. Uses Cow for zero-copy when no `&` is present.
//! Output side: escapes element text and attribute values into a caller
//! buffer. Attribute escaping also encodes tab, LF and CR as character
//! references so the values survive attribute-value normalization.

use memchr::memchr;
use std::borrow::Cow;

/// Decode text content, handling entity references
///
/// Returns Borrowed if no entities present (zero-copy),
/// returns Owned if entities were decoded. Unknown named entities are
/// kept verbatim; the binding layer carries no DTD to resolve them.
#[inline]
pub fn decode_text(input: &str) -> Cow<'_, str> {
    // Fast path: check if there are any entities using SIMD
    if memchr(b'&', input.as_bytes()).is_none() {
        return Cow::Borrowed(input);
    }
    // Slow path: decode entities
    Cow::Owned(decode_entities(input))
}

/// Decode all entity references in the input
fn decode_entities(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut result = String::with_capacity(input.len());
    let mut pos = 0;

    // '&' and ';' are ASCII, so every slice below lands on a char boundary
    while pos < bytes.len() {
        if let Some(amp_pos) = memchr(b'&', &bytes[pos..]) {
            // Copy everything before the entity
            result.push_str(&input[pos..pos + amp_pos]);
            pos += amp_pos;

            // Find the semicolon
            if let Some(semi_offset) = memchr(b';', &bytes[pos..]) {
                let entity = &input[pos + 1..pos + semi_offset];

                if let Some(decoded) = decode_entity(entity) {
                    result.push(decoded);
                    pos += semi_offset + 1;
                } else {
                    // Unknown entity, keep as-is
                    result.push('&');
                    pos += 1;
                }
            } else {
                // No semicolon found, keep the ampersand
                result.push('&');
                pos += 1;
            }
        } else {
            // No more entities, copy the rest
            result.push_str(&input[pos..]);
            break;
        }
    }

    result
}

/// Decode a single entity (without & and ;)
fn decode_entity(entity: &str) -> Option<char> {
    if entity.is_empty() {
        return None;
    }

    // Numeric character reference
    if let Some(numeric) = entity.strip_prefix('#') {
        return decode_numeric_entity(numeric);
    }

    // Named entity
    match entity {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => None,
    }
}

/// Decode a numeric character reference
fn decode_numeric_entity(entity: &str) -> Option<char> {
    if entity.is_empty() {
        return None;
    }

    let codepoint = if entity.starts_with('x') || entity.starts_with('X') {
        // Hexadecimal: &#xHHHH;
        u32::from_str_radix(&entity[1..], 16).ok()?
    } else {
        // Decimal: &#DDDD;
        entity.parse::<u32>().ok()?
    };

    char::from_u32(codepoint)
}

/// Escape element text content into `buf`
#[inline]
pub fn escape_text(input: &str, buf: &mut String) {
    // Fast path: check if any escaping needed
    if !input.bytes().any(|b| matches!(b, b'<' | b'>' | b'&')) {
        buf.push_str(input);
        return;
    }

    for c in input.chars() {
        match c {
            '<' => buf.push_str("&lt;"),
            '>' => buf.push_str("&gt;"),
            '&' => buf.push_str("&amp;"),
            _ => buf.push(c),
        }
    }
}

/// Escape a double-quoted attribute value into `buf`
#[inline]
pub fn escape_attribute(input: &str, buf: &mut String) {
    if !input
        .bytes()
        .any(|b| matches!(b, b'<' | b'&' | b'"' | b'\t' | b'\n' | b'\r'))
    {
        buf.push_str(input);
        return;
    }

    for c in input.chars() {
        match c {
            '<' => buf.push_str("&lt;"),
            '&' => buf.push_str("&amp;"),
            '"' => buf.push_str("&quot;"),
            '\t' => buf.push_str("&#9;"),
            '\n' => buf.push_str("&#10;"),
            '\r' => buf.push_str("&#13;"),
            _ => buf.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_entities() {
        let result = decode_text("Hello, World!");
        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(result.as_ref(), "Hello, World!");
    }

    #[test]
    fn test_basic_entities() {
        let result = decode_text("&lt;hello&gt; &amp; &quot;world&quot; &apos;x&apos;");
        assert_eq!(result.as_ref(), "<hello> & \"world\" 'x'");
    }

    #[test]
    fn test_numeric_decimal() {
        let result = decode_text("&#65;&#66;&#67;");
        assert_eq!(result.as_ref(), "ABC");
    }

    #[test]
    fn test_numeric_hex() {
        let result = decode_text("&#x41;&#x42;&#x43;");
        assert_eq!(result.as_ref(), "ABC");
    }

    #[test]
    fn test_unicode_entity() {
        let result = decode_text("&#x1F600;");
        assert_eq!(result.as_ref(), "\u{1F600}");
    }

    #[test]
    fn test_unknown_entity() {
        let result = decode_text("&unknown;");
        assert_eq!(result.as_ref(), "&unknown;");
    }

    #[test]
    fn test_escape_text() {
        let mut buf = String::new();
        escape_text("a < b & c > d", &mut buf);
        assert_eq!(buf, "a &lt; b &amp; c &gt; d");
    }

    #[test]
    fn test_escape_attribute_control_chars() {
        let mut buf = String::new();
        escape_attribute("line1\nline2\t\"q\"", &mut buf);
        assert_eq!(buf, "line1&#10;line2&#9;&quot;q&quot;");
    }
}
