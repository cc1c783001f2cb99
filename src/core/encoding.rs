//! XML encoding detection and conversion
//!
//! Detects UTF-16 input from the BOM or leading byte pattern and converts
//! it to UTF-8 before parsing. Everything downstream works on UTF-8 bytes.

use crate::error::BindError;

/// Detected encoding of raw XML input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl XmlEncoding {
    /// Detect encoding from byte order mark or initial bytes
    pub fn detect(input: &[u8]) -> Self {
        if input.len() < 2 {
            return XmlEncoding::Utf8;
        }

        // Check for BOM
        match (input[0], input[1]) {
            // UTF-16 LE BOM: 0xFF 0xFE
            (0xFF, 0xFE) => XmlEncoding::Utf16Le,
            // UTF-16 BE BOM: 0xFE 0xFF
            (0xFE, 0xFF) => XmlEncoding::Utf16Be,
            // UTF-8 BOM: 0xEF 0xBB 0xBF (detected but treated as UTF-8)
            (0xEF, 0xBB) if input.len() >= 3 && input[2] == 0xBF => XmlEncoding::Utf8,
            // No BOM - check for UTF-16 pattern (< preceded or followed by null)
            (0x00, b'<') => XmlEncoding::Utf16Be,
            (b'<', 0x00) => XmlEncoding::Utf16Le,
            _ => XmlEncoding::Utf8,
        }
    }
}

/// Convert raw XML input to UTF-8
///
/// UTF-8 input passes through (minus any BOM); UTF-16 LE/BE input is
/// transcoded. Returns [`BindError::MalformedDocument`] on truncated or
/// invalid UTF-16 sequences.
pub fn convert_to_utf8(input: Vec<u8>) -> Result<Vec<u8>, BindError> {
    let encoding = XmlEncoding::detect(&input);

    match encoding {
        XmlEncoding::Utf8 => {
            // Skip UTF-8 BOM if present
            if input.starts_with(&[0xEF, 0xBB, 0xBF]) {
                Ok(input[3..].to_vec())
            } else {
                Ok(input)
            }
        }
        XmlEncoding::Utf16Le => convert_utf16_to_utf8(&input, &[0xFF, 0xFE], u16::from_le_bytes),
        XmlEncoding::Utf16Be => convert_utf16_to_utf8(&input, &[0xFE, 0xFF], u16::from_be_bytes),
    }
}

fn convert_utf16_to_utf8(
    input: &[u8],
    bom: &[u8],
    combine: fn([u8; 2]) -> u16,
) -> Result<Vec<u8>, BindError> {
    // Skip BOM if present
    let start = if input.starts_with(bom) { 2 } else { 0 };
    let bytes = &input[start..];

    if bytes.len() % 2 != 0 {
        return Err(BindError::MalformedDocument {
            reason: "UTF-16 input has an odd number of bytes".to_string(),
            offset: input.len(),
        });
    }

    let code_units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|chunk| combine([chunk[0], chunk[1]]))
        .collect();

    String::from_utf16(&code_units)
        .map(|s| s.into_bytes())
        .map_err(|e| BindError::MalformedDocument {
            reason: format!("invalid UTF-16: {}", e),
            offset: start,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_utf8() {
        assert_eq!(XmlEncoding::detect(b"<root/>"), XmlEncoding::Utf8);
        assert_eq!(XmlEncoding::detect(b"<?xml"), XmlEncoding::Utf8);
    }

    #[test]
    fn test_detect_utf8_bom() {
        assert_eq!(
            XmlEncoding::detect(&[0xEF, 0xBB, 0xBF, b'<']),
            XmlEncoding::Utf8
        );
    }

    #[test]
    fn test_detect_utf16_le_bom() {
        assert_eq!(
            XmlEncoding::detect(&[0xFF, 0xFE, b'<', 0x00]),
            XmlEncoding::Utf16Le
        );
    }

    #[test]
    fn test_detect_utf16_be_pattern() {
        // No BOM, null before '<'
        assert_eq!(
            XmlEncoding::detect(&[0x00, b'<', 0x00, b'r']),
            XmlEncoding::Utf16Be
        );
    }

    #[test]
    fn test_convert_utf16_le() {
        let utf16_le = vec![
            0xFF, 0xFE, // BOM
            b'<', 0x00, b'r', 0x00, b'/', 0x00, b'>', 0x00,
        ];
        let result = convert_to_utf8(utf16_le).unwrap();
        assert_eq!(result, b"<r/>");
    }

    #[test]
    fn test_convert_utf16_be() {
        let utf16_be = vec![
            0xFE, 0xFF, // BOM
            0x00, b'<', 0x00, b'r', 0x00, b'/', 0x00, b'>',
        ];
        let result = convert_to_utf8(utf16_be).unwrap();
        assert_eq!(result, b"<r/>");
    }

    #[test]
    fn test_utf8_passthrough_strips_bom() {
        let mut input = vec![0xEF, 0xBB, 0xBF];
        input.extend_from_slice(b"<root/>");
        let result = convert_to_utf8(input).unwrap();
        assert_eq!(result, b"<root/>");
    }

    #[test]
    fn test_odd_length_rejected() {
        let bad = vec![0xFF, 0xFE, b'<'];
        assert!(convert_to_utf8(bad).is_err());
    }
}
