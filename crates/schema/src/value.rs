//! Decoded values and record instances

use std::collections::BTreeMap;

/// A decoded field value.
///
/// `Absent` (key missing from the input) and `Null` (explicit JSON null) are
/// kept distinct: absent fields are omitted on encode, null fields are sent
/// as `null`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Absent,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Untyped JSON from a `PrimitiveKind::Any` field.
    Json(serde_json::Value),
    Record(Record),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// Resolved union member: the variant tag and its decoded record.
    Variant { tag: String, record: Record },
}

static ABSENT: Value = Value::Absent;

impl Value {
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for both `Absent` and `Null`.
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Absent | Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            Value::Variant { record, .. } => Some(record),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Tuple(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Variant tag and record of a resolved union value.
    pub fn as_variant(&self) -> Option<(&str, &Record)> {
        match self {
            Value::Variant { tag, record } => Some((tag, record)),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Absent => "absent",
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Json(_) => "json",
            Value::Record(_) => "record",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Map(_) => "map",
            Value::Variant { .. } => "variant",
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Value::Record(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// A record instance: field name to value, tagged with its schema name.
///
/// Decoded records hold an entry for every field of the effective table.
/// Records built by hand may omit fields; missing entries read as `Absent`.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    schema: String,
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Field value, or `Absent` when the record has no entry.
    pub fn get(&self, name: &str) -> &Value {
        self.fields.get(name).unwrap_or(&ABSENT)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Builder-style [`Record::set`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn remove(&mut self, name: &str) -> Value {
        self.fields.remove(name).unwrap_or(Value::Absent)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).as_i64()
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).as_bool()
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).as_str()
    }

    pub fn get_record(&self, name: &str) -> Option<&Record> {
        self.get(name).as_record()
    }

    pub fn get_list(&self, name: &str) -> Option<&[Value]> {
        self.get(name).as_list()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_entry_reads_as_absent() {
        let record = Record::new("Problem");
        assert!(record.get("title").is_absent());
        assert!(record.get("title").is_missing());
    }

    #[test]
    fn option_none_becomes_null() {
        let record = Record::new("Problem").with("difficulty", None::<i64>);
        assert!(record.get("difficulty").is_null());
        assert!(!record.get("difficulty").is_absent());
    }

    #[test]
    fn typed_getters() {
        let record = Record::new("Problem")
            .with("pid", "P1001")
            .with("difficulty", 1)
            .with("tags", vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(record.get_str("pid"), Some("P1001"));
        assert_eq!(record.get_i64("difficulty"), Some(1));
        assert_eq!(record.get_list("tags").map(<[Value]>::len), Some(2));
        assert_eq!(record.get_bool("pid"), None);
    }

    #[test]
    fn int_widens_for_float_reads() {
        assert_eq!(Value::Int(3).as_f64(), Some(3.0));
        assert_eq!(Value::Float(2.5).as_i64(), None);
    }

    #[test]
    fn remove_returns_absent_when_missing() {
        let mut record = Record::new("X").with("a", true);
        assert_eq!(record.remove("a"), Value::Bool(true));
        assert_eq!(record.remove("a"), Value::Absent);
        assert!(record.is_empty());
    }
}
