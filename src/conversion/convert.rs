//! Value/lexical conversion
//!
//! Renders host values into the lexical space of a schema type (marshal)
//! and parses lexical text back into host values (unmarshal). Union fields
//! try their schema types in declaration order; the first success wins and
//! the error of the last attempt is the one surfaced when all fail.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::registry::{resolve_host_type, ConversionOverrides};
use super::schema::SchemaType;
use crate::error::BindError;
use crate::value::{Value, ValueKind};

/// Render `value` in the lexical space of `schema_type`.
///
/// Coercions follow the schema type: text that parses as the target type
/// is accepted and canonicalized, a dateTime truncates to a date, and so
/// on. Anything else fails with an unsupported-conversion error.
pub fn value_to_lexical(value: &Value, schema_type: &SchemaType) -> Result<String, BindError> {
    if !schema_type.is_builtin() {
        return Err(unsupported(value, schema_type));
    }

    match schema_type.local_name() {
        "string" | "anySimpleType" => render_any(value).ok_or_else(|| unsupported(value, schema_type)),
        "boolean" => render_boolean(value).ok_or_else(|| unsupported(value, schema_type)),
        "int" | "integer" | "long" => {
            render_integer(value).ok_or_else(|| unsupported(value, schema_type))
        }
        "double" | "float" | "decimal" => {
            render_double(value).ok_or_else(|| unsupported(value, schema_type))
        }
        "date" => render_date(value).ok_or_else(|| unsupported(value, schema_type)),
        "time" => render_time(value).ok_or_else(|| unsupported(value, schema_type)),
        "dateTime" => render_date_time(value).ok_or_else(|| unsupported(value, schema_type)),
        "base64Binary" => render_base64(value).ok_or_else(|| unsupported(value, schema_type)),
        "hexBinary" => render_hex(value).ok_or_else(|| unsupported(value, schema_type)),
        _ => Err(unsupported(value, schema_type)),
    }
}

/// Parse lexical `text` into the host value the registry names for
/// `schema_type`, honoring per-field overrides.
pub fn lexical_to_value(
    text: &str,
    schema_type: &SchemaType,
    overrides: Option<&ConversionOverrides>,
) -> Result<Value, BindError> {
    let kind = resolve_host_type(schema_type, overrides)?;
    parse_as_kind(text, kind, schema_type)
}

/// Try a union field's schema types in declaration order against `value`.
/// Returns the winning type with its lexical form.
pub fn convert_union(
    value: &Value,
    schema_types: &[SchemaType],
) -> Result<(SchemaType, String), BindError> {
    let mut last_err = None;
    for schema_type in schema_types {
        match value_to_lexical(value, schema_type) {
            Ok(lexical) => return Ok((schema_type.clone(), lexical)),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| BindError::UnsupportedConversion {
        value: describe(value),
        target: "an empty union".to_string(),
    }))
}

/// Union counterpart for the unmarshal direction.
pub fn parse_union(
    text: &str,
    schema_types: &[SchemaType],
    overrides: Option<&ConversionOverrides>,
) -> Result<Value, BindError> {
    let mut last_err = None;
    for schema_type in schema_types {
        match lexical_to_value(text, schema_type, overrides) {
            Ok(value) => return Ok(value),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| BindError::UnsupportedConversion {
        value: format!("text '{}'", text),
        target: "an empty union".to_string(),
    }))
}

fn render_any(value: &Value) -> Option<String> {
    match value {
        Value::Boolean(b) => Some(b.to_string()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Double(d) => Some(d.to_string()),
        Value::Text(s) => Some(s.clone()),
        Value::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
        Value::Time(t) => Some(t.format("%H:%M:%S%.f").to_string()),
        Value::DateTime(dt) => Some(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
        Value::Bytes(b) => Some(BASE64.encode(b)),
        Value::Null | Value::List(_) | Value::Object(_) => None,
    }
}

fn render_boolean(value: &Value) -> Option<String> {
    match value {
        Value::Boolean(b) => Some(b.to_string()),
        Value::Integer(0) => Some("false".to_string()),
        Value::Integer(1) => Some("true".to_string()),
        Value::Text(s) => match s.trim() {
            "true" | "1" => Some("true".to_string()),
            "false" | "0" => Some("false".to_string()),
            _ => None,
        },
        _ => None,
    }
}

fn render_integer(value: &Value) -> Option<String> {
    match value {
        Value::Integer(i) => Some(i.to_string()),
        Value::Double(d) if d.fract() == 0.0 && d.is_finite() => Some((*d as i64).to_string()),
        Value::Text(s) => s.trim().parse::<i64>().ok().map(|i| i.to_string()),
        _ => None,
    }
}

fn render_double(value: &Value) -> Option<String> {
    match value {
        Value::Double(d) => Some(d.to_string()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Text(s) => s.trim().parse::<f64>().ok().map(|d| d.to_string()),
        _ => None,
    }
}

fn render_date(value: &Value) -> Option<String> {
    let date = match value {
        Value::Date(d) => *d,
        Value::DateTime(dt) => dt.date(),
        Value::Text(s) => parse_date(s.trim())?,
        _ => return None,
    };
    Some(date.format("%Y-%m-%d").to_string())
}

fn render_time(value: &Value) -> Option<String> {
    let time = match value {
        Value::Time(t) => *t,
        Value::DateTime(dt) => dt.time(),
        Value::Text(s) => parse_time(s.trim())?,
        _ => return None,
    };
    Some(time.format("%H:%M:%S%.f").to_string())
}

fn render_date_time(value: &Value) -> Option<String> {
    let dt = match value {
        Value::DateTime(dt) => *dt,
        Value::Date(d) => d.and_time(NaiveTime::MIN),
        Value::Text(s) => parse_date_time(s.trim())?,
        _ => return None,
    };
    Some(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
}

fn render_base64(value: &Value) -> Option<String> {
    match value {
        Value::Bytes(b) => Some(BASE64.encode(b)),
        Value::Text(s) => BASE64.decode(s.trim()).ok().map(|b| BASE64.encode(b)),
        _ => None,
    }
}

fn render_hex(value: &Value) -> Option<String> {
    match value {
        Value::Bytes(b) => Some(hex::encode_upper(b)),
        Value::Text(s) => hex::decode(s.trim()).ok().map(hex::encode_upper),
        _ => None,
    }
}

fn parse_as_kind(text: &str, kind: ValueKind, schema_type: &SchemaType) -> Result<Value, BindError> {
    let fail = || BindError::UnsupportedConversion {
        value: format!("text '{}'", text),
        target: schema_type.to_string(),
    };

    match kind {
        ValueKind::Text => Ok(Value::Text(text.to_string())),
        ValueKind::Boolean => match text.trim() {
            "true" | "1" => Ok(Value::Boolean(true)),
            "false" | "0" => Ok(Value::Boolean(false)),
            _ => Err(fail()),
        },
        ValueKind::Integer => text
            .trim()
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| fail()),
        ValueKind::Double => text
            .trim()
            .parse::<f64>()
            .map(Value::Double)
            .map_err(|_| fail()),
        ValueKind::Date => parse_date(text.trim()).map(Value::Date).ok_or_else(fail),
        ValueKind::Time => parse_time(text.trim()).map(Value::Time).ok_or_else(fail),
        ValueKind::DateTime => parse_date_time(text.trim())
            .map(Value::DateTime)
            .ok_or_else(fail),
        ValueKind::Bytes => {
            let decoded = if schema_type.local_name() == "hexBinary" {
                hex::decode(text.trim()).ok()
            } else {
                BASE64.decode(text.trim()).ok()
            };
            decoded.map(Value::Bytes).ok_or_else(fail)
        }
        ValueKind::Null | ValueKind::List | ValueKind::Object => Err(fail()),
    }
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}

fn parse_time(text: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(text, "%H:%M:%S%.f").ok()
}

fn parse_date_time(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt);
    }
    // Zoned forms (trailing Z or offset) normalize to UTC
    chrono::DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.naive_utc())
}

fn unsupported(value: &Value, schema_type: &SchemaType) -> BindError {
    BindError::UnsupportedConversion {
        value: describe(value),
        target: schema_type.to_string(),
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Boolean(b) => format!("boolean '{}'", b),
        Value::Integer(i) => format!("integer '{}'", i),
        Value::Double(d) => format!("double '{}'", d),
        Value::Text(s) => format!("text '{}'", s),
        Value::Bytes(b) => format!("{} bytes", b.len()),
        Value::Date(d) => format!("date '{}'", d.format("%Y-%m-%d")),
        Value::Time(t) => format!("time '{}'", t.format("%H:%M:%S")),
        Value::DateTime(dt) => format!("dateTime '{}'", dt.format("%Y-%m-%dT%H:%M:%S")),
        Value::List(_) => "a list".to_string(),
        Value::Object(o) => format!("object of class '{}'", o.class_name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_scalars() {
        assert_eq!(
            value_to_lexical(&Value::Boolean(true), &SchemaType::boolean()).unwrap(),
            "true"
        );
        assert_eq!(
            value_to_lexical(&Value::Integer(42), &SchemaType::int()).unwrap(),
            "42"
        );
        assert_eq!(
            value_to_lexical(&Value::Text("hi".into()), &SchemaType::string()).unwrap(),
            "hi"
        );
    }

    #[test]
    fn test_date_lexicals() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(
            value_to_lexical(&Value::Date(date), &SchemaType::date()).unwrap(),
            "2024-01-15"
        );

        let dt = date.and_hms_opt(13, 20, 5).unwrap();
        assert_eq!(
            value_to_lexical(&Value::DateTime(dt), &SchemaType::date_time()).unwrap(),
            "2024-01-15T13:20:05"
        );
        // dateTime truncates to date
        assert_eq!(
            value_to_lexical(&Value::DateTime(dt), &SchemaType::date()).unwrap(),
            "2024-01-15"
        );
    }

    #[test]
    fn test_binary_lexicals() {
        let bytes = Value::Bytes(vec![0xDE, 0xAD]);
        assert_eq!(
            value_to_lexical(&bytes, &SchemaType::hex_binary()).unwrap(),
            "DEAD"
        );
        assert_eq!(
            value_to_lexical(&bytes, &SchemaType::base64_binary()).unwrap(),
            "3q0="
        );
    }

    #[test]
    fn test_parse_round() {
        let value = lexical_to_value("2024-01-15", &SchemaType::date(), None).unwrap();
        assert_eq!(
            value,
            Value::Date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
        );

        let value = lexical_to_value("false", &SchemaType::boolean(), None).unwrap();
        assert_eq!(value, Value::Boolean(false));
    }

    #[test]
    fn test_parse_zoned_date_time() {
        let value = lexical_to_value("2024-01-15T10:00:00Z", &SchemaType::date_time(), None);
        assert_eq!(
            value.unwrap(),
            Value::DateTime(
                NaiveDate::from_ymd_opt(2024, 1, 15)
                    .unwrap()
                    .and_hms_opt(10, 0, 0)
                    .unwrap()
            )
        );
    }

    #[test]
    fn test_parse_with_override() {
        // Field declares xsd:date but keeps the raw text in the object
        let mut overrides = ConversionOverrides::new();
        overrides.add_conversion(SchemaType::date(), ValueKind::Text);

        let value = lexical_to_value("2024-01-15", &SchemaType::date(), Some(&overrides)).unwrap();
        assert_eq!(value, Value::Text("2024-01-15".to_string()));
    }

    #[test]
    fn test_union_first_success_wins() {
        let types = [SchemaType::date(), SchemaType::int()];
        let (winner, lexical) = convert_union(&Value::Integer(7), &types).unwrap();
        assert_eq!(winner, SchemaType::int());
        assert_eq!(lexical, "7");
    }

    #[test]
    fn test_union_surfaces_last_error() {
        let types = [SchemaType::date(), SchemaType::int()];
        let err = convert_union(&Value::Boolean(true), &types).unwrap_err();
        match err {
            BindError::UnsupportedConversion { target, .. } => {
                assert!(target.ends_with("int"), "unexpected target: {}", target);
            }
            other => panic!("wrong error: {}", other),
        }
    }

    #[test]
    fn test_union_text_coercion() {
        // Text that parses as a date binds to the date branch
        let types = [SchemaType::date(), SchemaType::int()];
        let (winner, lexical) =
            convert_union(&Value::Text("2024-02-29".into()), &types).unwrap();
        assert_eq!(winner, SchemaType::date());
        assert_eq!(lexical, "2024-02-29");
    }
}
