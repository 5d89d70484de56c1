//! Decoded trace events.
//!
//! Every reader produces the same representation: a name, an absolute
//! timestamp in nanoseconds and two field maps (payload and context).

use std::collections::BTreeMap;
use std::fmt;

/// A single decoded field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    String(String),
    Enum { label: Option<String>, value: i64 },
    Array(Vec<FieldValue>),
    Struct(Vec<(String, FieldValue)>),
}

impl FieldValue {
    /// Integer view of the value, if it has one that fits in `i64`
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Unsigned(v) => i64::try_from(*v).ok(),
            Self::Signed(v) => Some(*v),
            Self::Enum { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Integer view of the value, if it is a non-negative integer
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Unsigned(v) => Some(*v),
            Self::Signed(v) => u64::try_from(*v).ok(),
            Self::Enum { value, .. } => u64::try_from(*value).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::Enum { label, .. } => label.as_deref(),
            _ => None,
        }
    }

    /// Look up a direct member of a structure value
    pub fn member(&self, name: &str) -> Option<&FieldValue> {
        match self {
            Self::Struct(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsigned(v) => write!(f, "{}", v),
            Self::Signed(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::String(s) => write!(f, "\"{}\"", s),
            Self::Enum { label: Some(l), value } => write!(f, "{} ({})", l, value),
            Self::Enum { label: None, value } => write!(f, "{}", value),
            Self::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Self::Struct(fields) => {
                write!(f, "{{ ")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} = {}", name, value)?;
                }
                write!(f, " }}")
            }
        }
    }
}

/// One recorded trace event
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Full event name including provider (e.g. "HPX:chunk_start")
    pub name: String,

    /// Nanoseconds since the Epoch (or since an arbitrary origin for
    /// traces without an absolute clock)
    pub timestamp: i64,

    /// Payload fields
    pub fields: BTreeMap<String, FieldValue>,

    /// Stream, packet and event context fields
    pub context: BTreeMap<String, FieldValue>,
}

impl Event {
    pub fn new(name: impl Into<String>, timestamp: i64) -> Self {
        Self {
            name: name.into(),
            timestamp,
            fields: BTreeMap::new(),
            context: BTreeMap::new(),
        }
    }

    /// Builder-style payload field insertion, handy for synthetic traces
    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Look up a field by name: payload first, then context
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name).or_else(|| self.context.get(name))
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(FieldValue::as_i64)
    }

    pub fn get_u64(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(FieldValue::as_u64)
    }
}
