//! JSON → Record decoding

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

use crate::descriptor::{Descriptor, MapKey, PrimitiveKind};
use crate::error::{Error, Result, json_type};
use crate::registry::Registry;
use crate::union::resolve_variant;
use crate::value::{Record, Value};

const ROOT: &str = "$";

impl Registry {
    /// Decode a raw JSON object into a record of the named schema.
    ///
    /// Every field of the effective table is decoded exactly once; input keys
    /// the schema does not declare are dropped.
    pub fn decode(&self, schema: &str, raw: &JsonValue) -> Result<Record> {
        self.decode_record(schema, raw, ROOT)
    }

    /// Decode a raw JSON value against a standalone descriptor.
    pub fn decode_value(&self, descriptor: &Descriptor, raw: &JsonValue) -> Result<Value> {
        self.decode_at(descriptor, raw, ROOT)
    }

    fn decode_record(&self, schema: &str, raw: &JsonValue, path: &str) -> Result<Record> {
        let object = raw.as_object().ok_or_else(|| Error::NotAnObject {
            path: path.to_string(),
            found: json_type(raw),
        })?;
        let fields = self.effective_fields(schema)?;

        let mut record = Record::new(schema);
        for (name, field) in fields {
            let value = match object.get(name) {
                Some(raw_field) => {
                    self.decode_at(&field.descriptor, raw_field, &format!("{path}.{name}"))?
                }
                None => Value::Absent,
            };
            record.set(name.clone(), value);
        }
        Ok(record)
    }

    fn decode_at(&self, descriptor: &Descriptor, raw: &JsonValue, path: &str) -> Result<Value> {
        // The server sends null for unset optionals of any shape
        if raw.is_null() {
            return Ok(Value::Null);
        }

        match descriptor {
            Descriptor::Primitive(kind) => decode_primitive(*kind, raw, path),
            Descriptor::Record(schema) => self.decode_record(schema, raw, path).map(Value::Record),
            Descriptor::Sequence(element) => {
                let items = expect_array(raw, "list", path)?;
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.decode_at(element, item, &format!("{path}[{i}]")))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::List)
            }
            Descriptor::Tuple(elements) => {
                let items = expect_array(raw, "tuple", path)?;
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
                    .map(|(i, (element, item))| self.decode_at(element, item, &format!("{path}[{i}]")))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::Tuple)
            }
            Descriptor::Mapping { key, value } => {
                let object = raw.as_object().ok_or_else(|| Error::NotAnObject {
                    path: path.to_string(),
                    found: json_type(raw),
                })?;
                let mut map = BTreeMap::new();
                for (k, v) in object {
                    if *key == MapKey::Integer && k.parse::<i64>().is_err() {
                        return Err(Error::InvalidMapKey {
                            path: path.to_string(),
                            key: k.clone(),
                        });
                    }
                    map.insert(k.clone(), self.decode_at(value, v, &format!("{path}.{k}"))?);
                }
                Ok(Value::Map(map))
            }
            Descriptor::Union(union) => {
                let object = raw.as_object().ok_or_else(|| Error::NotAnObject {
                    path: path.to_string(),
                    found: json_type(raw),
                })?;
                let variant = resolve_variant(union, object).ok_or_else(|| Error::NoVariantMatched {
                    path: path.to_string(),
                })?;
                let record = self.decode_record(&variant.schema, raw, path)?;
                Ok(Value::Variant {
                    tag: variant.tag.clone(),
                    record,
                })
            }
        }
    }
}

fn expect_array<'a>(raw: &'a JsonValue, expected: &'static str, path: &str) -> Result<&'a Vec<JsonValue>> {
    raw.as_array().ok_or_else(|| Error::TypeMismatch {
        path: path.to_string(),
        expected,
        found: json_type(raw),
    })
}

fn decode_primitive(kind: PrimitiveKind, raw: &JsonValue, path: &str) -> Result<Value> {
    let value = match kind {
        PrimitiveKind::Bool => raw.as_bool().map(Value::Bool),
        PrimitiveKind::Int => raw.as_i64().map(Value::Int),
        PrimitiveKind::Float => raw.as_f64().map(Value::Float),
        PrimitiveKind::String => raw.as_str().map(|s| Value::Str(s.to_owned())),
        PrimitiveKind::Any => Some(Value::Json(raw.clone())),
    };
    value.ok_or_else(|| Error::TypeMismatch {
        path: path.to_string(),
        expected: kind.label(),
        found: json_type(raw),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Probe, UnionDescriptor};
    use crate::registry::SchemaBuilder;
    use serde_json::json;

    fn registry() -> Registry {
        Registry::builder()
            .schema(
                SchemaBuilder::new("UserSummary")
                    .field("uid", Descriptor::int())
                    .field("name", Descriptor::string()),
            )
            .schema(
                SchemaBuilder::new("Team")
                    .field("id", Descriptor::int())
                    .field("name", Descriptor::string())
                    .field("isPremium", Descriptor::bool()),
            )
            .schema(
                SchemaBuilder::new("Problem")
                    .field("pid", Descriptor::string())
                    .writable("title", Descriptor::string())
                    .writable("difficulty", Descriptor::int())
                    .writable("samples", Descriptor::list(Descriptor::tuple([
                        Descriptor::string(),
                        Descriptor::string(),
                    ])))
                    .field("tagNames", Descriptor::int_keyed_map(Descriptor::string()))
                    .field("author", Descriptor::record("UserSummary"))
                    .field(
                        "provider",
                        Descriptor::union(
                            UnionDescriptor::new()
                                .variant("user", "UserSummary", Probe::has_key("uid"))
                                .variant("team", "Team", Probe::Always),
                        ),
                    )
                    .field("score", Descriptor::float())
                    .field("extra", Descriptor::any()),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn decodes_primitives_and_marks_missing_absent() {
        let record = registry()
            .decode("Problem", &json!({"pid": "P1001", "title": "A+B", "difficulty": 1}))
            .unwrap();
        assert_eq!(record.schema(), "Problem");
        assert_eq!(record.get_str("pid"), Some("P1001"));
        assert_eq!(record.get_i64("difficulty"), Some(1));
        assert!(record.get("author").is_absent());
        assert!(record.get("samples").is_absent());
        // Every declared field has an entry
        assert_eq!(record.len(), 9);
    }

    #[test]
    fn null_nested_record_is_no_value() {
        let record = registry().decode("Problem", &json!({"author": null})).unwrap();
        assert!(record.get("author").is_null());
    }

    #[test]
    fn null_primitive_is_no_value_regardless_of_kind() {
        let record = registry()
            .decode("Problem", &json!({"difficulty": null, "title": null, "score": null}))
            .unwrap();
        assert!(record.get("difficulty").is_null());
        assert!(record.get("title").is_null());
        assert!(record.get("score").is_null());
    }

    #[test]
    fn empty_array_is_empty_list_not_null() {
        let record = registry().decode("Problem", &json!({"samples": []})).unwrap();
        assert_eq!(record.get("samples"), &Value::List(vec![]));
    }

    #[test]
    fn sequence_preserves_input_order() {
        let record = registry()
            .decode(
                "Problem",
                &json!({"samples": [["1 2", "3"], ["4 5", "9"], ["0 0", "0"]]}),
            )
            .unwrap();
        let samples = record.get_list("samples").unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(
            samples[1],
            Value::Tuple(vec![Value::Str("4 5".into()), Value::Str("9".into())])
        );
    }

    #[test]
    fn tuple_arity_mismatch_is_an_error() {
        let err = registry()
            .decode("Problem", &json!({"samples": [["1 2", "3", "extra"]]}))
            .unwrap_err();
        assert_eq!(
            err,
            Error::ArityMismatch {
                path: "$.samples[0]".into(),
                expected: 2,
                found: 3
            }
        );

        let err = registry()
            .decode("Problem", &json!({"samples": [["only"]]}))
            .unwrap_err();
        assert!(matches!(err, Error::ArityMismatch { found: 1, .. }));
    }

    #[test]
    fn mapping_keeps_keys_verbatim() {
        let record = registry()
            .decode("Problem", &json!({"tagNames": {"151": "状压", "464": "状压 DP"}}))
            .unwrap();
        let map = record.get("tagNames").as_map().unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["151"], Value::Str("状压".into()));
        assert_eq!(map["464"], Value::Str("状压 DP".into()));
    }

    #[test]
    fn integer_keyed_mapping_rejects_text_keys() {
        let err = registry()
            .decode("Problem", &json!({"tagNames": {"dp": "x"}}))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidMapKey { key, .. } if key == "dp"));
    }

    #[test]
    fn union_resolves_user_and_team() {
        let registry = registry();
        let user = registry
            .decode("Problem", &json!({"provider": {"uid": 7, "name": "kkksc03"}}))
            .unwrap();
        let (tag, record) = user.get("provider").as_variant().unwrap();
        assert_eq!(tag, "user");
        assert_eq!(record.schema(), "UserSummary");
        assert_eq!(record.get_i64("uid"), Some(7));

        let team = registry
            .decode("Problem", &json!({"provider": {"id": 7, "isPremium": true}}))
            .unwrap();
        let (tag, record) = team.get("provider").as_variant().unwrap();
        assert_eq!(tag, "team");
        assert_eq!(record.get_bool("isPremium"), Some(true));
    }

    #[test]
    fn undeclared_keys_are_dropped() {
        let record = registry()
            .decode("Problem", &json!({"pid": "P1", "totallyUnknown": 42}))
            .unwrap();
        assert!(record.fields().all(|(name, _)| name != "totallyUnknown"));
    }

    #[test]
    fn non_object_input_is_an_error() {
        let err = registry().decode("Problem", &json!([1, 2])).unwrap_err();
        assert_eq!(
            err,
            Error::NotAnObject {
                path: "$".into(),
                found: "array"
            }
        );
    }

    #[test]
    fn primitive_type_mismatch_reports_path() {
        let err = registry()
            .decode("Problem", &json!({"author": {"uid": "seven"}}))
            .unwrap_err();
        assert_eq!(
            err,
            Error::TypeMismatch {
                path: "$.author.uid".into(),
                expected: "int",
                found: "string"
            }
        );
    }

    #[test]
    fn float_accepts_integers_and_any_passes_through() {
        let record = registry()
            .decode("Problem", &json!({"score": 100, "extra": {"k": [1, 2]}}))
            .unwrap();
        assert_eq!(record.get("score"), &Value::Float(100.0));
        assert_eq!(record.get("extra"), &Value::Json(json!({"k": [1, 2]})));
    }

    #[test]
    fn unknown_schema_is_an_error() {
        let err = registry().decode("Contest", &json!({})).unwrap_err();
        assert_eq!(err, Error::UnknownSchema("Contest".into()));
    }

    #[test]
    fn standalone_descriptor_decode() {
        let value = registry()
            .decode_value(&Descriptor::list(Descriptor::int()), &json!([3, 1, 2]))
            .unwrap();
        assert_eq!(value, Value::List(vec![Value::Int(3), Value::Int(1), Value::Int(2)]));
    }
}
