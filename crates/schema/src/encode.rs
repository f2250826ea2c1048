//! Record → JSON encoding for request bodies and query strings
//!
//! Only writable fields are emitted. Absent fields are omitted, null fields
//! are sent as JSON `null`. For any record whose read-only fields are absent,
//! `decode(encode(r)) == r`.

use std::collections::BTreeMap;

use serde_json::{Map, Number, Value as JsonValue};

use crate::descriptor::{Descriptor, Field, MapKey, PrimitiveKind};
use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::value::{Record, Value};

const ROOT: &str = "$";

impl Registry {
    /// Encode the writable subset of a record using its own schema.
    pub fn encode(&self, record: &Record) -> Result<JsonValue> {
        self.encode_record(record.schema(), record, ROOT)
    }

    /// Render a parameters record as query pairs.
    ///
    /// Missing values are dropped; scalars render as plain text. Nested
    /// shapes are not representable in a query string.
    pub fn encode_query(&self, record: &Record) -> Result<Vec<(String, String)>> {
        let fields = self.effective_fields(record.schema())?;
        reject_undeclared(record.schema(), record, fields)?;

        let mut pairs = Vec::new();
        for (name, field) in fields {
            if !field.writable {
                continue;
            }
            let rendered = match record.get(name) {
                Value::Absent | Value::Null => continue,
                Value::Bool(b) => b.to_string(),
                Value::Int(i) => i.to_string(),
                Value::Float(f) => f.to_string(),
                Value::Str(s) => s.clone(),
                Value::Json(JsonValue::String(s)) => s.clone(),
                Value::Json(other) if !other.is_object() && !other.is_array() => other.to_string(),
                other => {
                    return Err(Error::TypeMismatch {
                        path: format!("{ROOT}.{name}"),
                        expected: "scalar",
                        found: other.type_name(),
                    });
                }
            };
            pairs.push((name.clone(), rendered));
        }
        Ok(pairs)
    }

    fn encode_record(&self, schema: &str, record: &Record, path: &str) -> Result<JsonValue> {
        let fields = self.effective_fields(schema)?;
        reject_undeclared(schema, record, fields)?;

        let mut object = Map::new();
        for (name, field) in fields {
            if !field.writable {
                continue;
            }
            let value = record.get(name);
            if value.is_absent() {
                continue;
            }
            let encoded = self.encode_at(&field.descriptor, value, &format!("{path}.{name}"))?;
            object.insert(name.clone(), encoded);
        }
        Ok(JsonValue::Object(object))
    }

    fn encode_at(&self, descriptor: &Descriptor, value: &Value, path: &str) -> Result<JsonValue> {
        if value.is_missing() {
            return Ok(JsonValue::Null);
        }

        match (descriptor, value) {
            (Descriptor::Primitive(kind), _) => encode_primitive(*kind, value, path),
            (Descriptor::Record(schema), Value::Record(record)) => {
                self.encode_record(schema, record, path)
            }
            (Descriptor::Sequence(element), Value::List(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| self.encode_at(element, item, &format!("{path}[{i}]")))
                .collect::<Result<Vec<_>>>()
                .map(JsonValue::Array),
            (Descriptor::Tuple(elements), Value::Tuple(items) | Value::List(items)) => {
                if items.len() != elements.len() {
                    return Err(Error::ArityMismatch {
                        path: path.to_string(),
                        expected: elements.len(),
                        found: items.len(),
                    });
                }
                elements
                    .iter()
                    .zip(items)
                    .enumerate()
                    .map(|(i, (element, item))| self.encode_at(element, item, &format!("{path}[{i}]")))
                    .collect::<Result<Vec<_>>>()
                    .map(JsonValue::Array)
            }
            (Descriptor::Mapping { key, value: element }, Value::Map(map)) => {
                let mut object = Map::new();
                for (k, v) in map {
                    if *key == MapKey::Integer && k.parse::<i64>().is_err() {
                        return Err(Error::InvalidMapKey {
                            path: path.to_string(),
                            key: k.clone(),
                        });
                    }
                    object.insert(k.clone(), self.encode_at(element, v, &format!("{path}.{k}"))?);
                }
                Ok(JsonValue::Object(object))
            }
            (Descriptor::Union(union), Value::Variant { tag, record }) => {
                let variant = union.variant_by_tag(tag).ok_or_else(|| Error::NoVariantMatched {
                    path: path.to_string(),
                })?;
                self.encode_record(&variant.schema, record, path)
            }
            (descriptor, other) => Err(Error::TypeMismatch {
                path: path.to_string(),
                expected: descriptor.label(),
                found: other.type_name(),
            }),
        }
    }
}

fn reject_undeclared(schema: &str, record: &Record, fields: &BTreeMap<String, Field>) -> Result<()> {
    match record.fields().find(|(name, _)| !fields.contains_key(*name)) {
        Some((name, _)) => Err(Error::UnknownField {
            schema: schema.to_string(),
            field: name.to_string(),
        }),
        None => Ok(()),
    }
}

fn encode_primitive(kind: PrimitiveKind, value: &Value, path: &str) -> Result<JsonValue> {
    let encoded = match (kind, value) {
        (PrimitiveKind::Bool, Value::Bool(b)) => Some(JsonValue::Bool(*b)),
        (PrimitiveKind::Int, Value::Int(i)) => Some(JsonValue::from(*i)),
        (PrimitiveKind::Float, Value::Float(f)) => Number::from_f64(*f).map(JsonValue::Number),
        (PrimitiveKind::Float, Value::Int(i)) => Number::from_f64(*i as f64).map(JsonValue::Number),
        (PrimitiveKind::String, Value::Str(s)) => Some(JsonValue::String(s.clone())),
        (PrimitiveKind::Any, Value::Json(v)) => Some(v.clone()),
        (PrimitiveKind::Any, Value::Bool(b)) => Some(JsonValue::Bool(*b)),
        (PrimitiveKind::Any, Value::Int(i)) => Some(JsonValue::from(*i)),
        (PrimitiveKind::Any, Value::Float(f)) => Number::from_f64(*f).map(JsonValue::Number),
        (PrimitiveKind::Any, Value::Str(s)) => Some(JsonValue::String(s.clone())),
        _ => None,
    };
    encoded.ok_or_else(|| Error::TypeMismatch {
        path: path.to_string(),
        expected: kind.label(),
        found: value.type_name(),
    })
}
