//! Dynamic host value model.
//!
//! The engine binds XML to a tagged value union rather than to concrete
//! structs, so descriptors can be built entirely at runtime. A value's
//! variant is decided once when it is read; downstream code matches on the
//! tag instead of re-testing runtime types.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::IndexMap;

/// A field value inside a bound object graph.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent/nil value.
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    Text(String),
    /// Raw octets (base64/hex schema types).
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    /// Collection-valued field: one sibling node per element, or a
    /// space-joined single node when the mapping uses one.
    List(Vec<Value>),
    /// Nested object marshalled through its own descriptor.
    Object(DataObject),
}

/// Variant tag of a [`Value`], used as the host-type side of schema-type
/// conversion lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Boolean,
    Integer,
    Double,
    Text,
    Bytes,
    Date,
    Time,
    DateTime,
    List,
    Object,
}

impl Value {
    /// Variant tag of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Integer(_) => ValueKind::Integer,
            Value::Double(_) => ValueKind::Double,
            Value::Text(_) => ValueKind::Text,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::Date(_) => ValueKind::Date,
            Value::Time(_) => ValueKind::Time,
            Value::DateTime(_) => ValueKind::DateTime,
            Value::List(_) => ValueKind::List,
            Value::Object(_) => ValueKind::Object,
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrow the text content if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<DataObject> for Value {
    fn from(obj: DataObject) -> Self {
        Value::Object(obj)
    }
}

/// Allocator for per-instance object keys. Keys identify an instance across
/// marshal calls (document preservation) and are never reused.
static NEXT_INSTANCE_KEY: AtomicU64 = AtomicU64::new(1);

fn next_instance_key() -> u64 {
    NEXT_INSTANCE_KEY.fetch_add(1, Ordering::Relaxed)
}

/// A dynamic record bound to XML through a type descriptor: a class name
/// plus ordered named fields.
///
/// Equality compares class and fields only; the instance key is identity,
/// not state, and every constructed or cloned object gets a fresh one.
#[derive(Debug)]
pub struct DataObject {
    class: String,
    fields: IndexMap<String, Value>,
    instance_key: u64,
}

impl DataObject {
    pub fn new(class: impl Into<String>) -> Self {
        DataObject {
            class: class.into(),
            fields: IndexMap::new(),
            instance_key: next_instance_key(),
        }
    }

    /// Class name used to resolve this object's descriptor.
    pub fn class_name(&self) -> &str {
        &self.class
    }

    /// Stable identity of this instance, used as the document-preservation
    /// record key.
    pub fn instance_key(&self) -> u64 {
        self.instance_key
    }

    /// Set a field, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Builder-style [`DataObject::set`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields.get_mut(name)
    }

    /// Iterate fields in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Copy carrying the same instance key. Backs marshalling from a
    /// borrowed object, where the copy stands in for this instance.
    pub(crate) fn snapshot(&self) -> DataObject {
        DataObject {
            class: self.class.clone(),
            fields: self.fields.clone(),
            instance_key: self.instance_key,
        }
    }
}

impl Clone for DataObject {
    fn clone(&self) -> Self {
        DataObject {
            class: self.class.clone(),
            fields: self.fields.clone(),
            instance_key: next_instance_key(),
        }
    }
}

impl PartialEq for DataObject {
    fn eq(&self, other: &Self) -> bool {
        self.class == other.class && self.fields == other.fields
    }
}
