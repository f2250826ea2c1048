//! Field descriptors
//!
//! A [`Descriptor`] describes the wire shape of one field. Descriptors are
//! plain immutable values; record references are by schema name and are
//! checked when the [`Registry`](crate::Registry) is built.

use serde_json::{Map, Value as JsonValue};

/// Scalar kinds accepted by [`Descriptor::Primitive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    Bool,
    Int,
    /// Any JSON number; integers widen to `f64`.
    Float,
    String,
    /// Untyped pass-through of the raw JSON value.
    Any,
}

impl PrimitiveKind {
    pub fn label(&self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Float => "float",
            PrimitiveKind::String => "string",
            PrimitiveKind::Any => "any",
        }
    }
}

/// Key constraint for [`Descriptor::Mapping`].
///
/// Keys are always kept verbatim as strings. `Integer` additionally requires
/// every key to parse as an integer (e.g. maps keyed by tag id).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapKey {
    String,
    Integer,
}

/// Structural test used to pick a union variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    /// Matches when the key is present with a non-null value.
    HasKey(String),
    /// Always matches. Used for the fallback variant.
    Always,
}

impl Probe {
    pub fn has_key(key: impl Into<String>) -> Self {
        Probe::HasKey(key.into())
    }

    pub fn matches(&self, object: &Map<String, JsonValue>) -> bool {
        match self {
            Probe::HasKey(key) => object.get(key).is_some_and(|v| !v.is_null()),
            Probe::Always => true,
        }
    }
}

/// One alternative of a union: a tag, the schema it decodes with, and its probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub tag: String,
    pub schema: String,
    pub probe: Probe,
}

/// Ordered list of union variants. Declaration order is probe order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnionDescriptor {
    variants: Vec<Variant>,
}

impl UnionDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn variant(mut self, tag: impl Into<String>, schema: impl Into<String>, probe: Probe) -> Self {
        self.variants.push(Variant {
            tag: tag.into(),
            schema: schema.into(),
            probe,
        });
        self
    }

    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    pub fn variant_by_tag(&self, tag: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.tag == tag)
    }
}

/// Wire shape of a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Descriptor {
    Primitive(PrimitiveKind),
    /// Nested record decoded with the named schema.
    Record(String),
    /// Ordered list, every element sharing one descriptor.
    Sequence(Box<Descriptor>),
    /// Fixed-length positional list.
    Tuple(Vec<Descriptor>),
    /// JSON object with arbitrary keys.
    Mapping { key: MapKey, value: Box<Descriptor> },
    /// Untagged union resolved by structural probes.
    Union(UnionDescriptor),
}

impl Descriptor {
    pub fn bool() -> Self {
        Descriptor::Primitive(PrimitiveKind::Bool)
    }

    pub fn int() -> Self {
        Descriptor::Primitive(PrimitiveKind::Int)
    }

    pub fn float() -> Self {
        Descriptor::Primitive(PrimitiveKind::Float)
    }

    pub fn string() -> Self {
        Descriptor::Primitive(PrimitiveKind::String)
    }

    pub fn any() -> Self {
        Descriptor::Primitive(PrimitiveKind::Any)
    }

    pub fn record(schema: impl Into<String>) -> Self {
        Descriptor::Record(schema.into())
    }

    pub fn list(element: Descriptor) -> Self {
        Descriptor::Sequence(Box::new(element))
    }

    pub fn tuple(elements: impl IntoIterator<Item = Descriptor>) -> Self {
        Descriptor::Tuple(elements.into_iter().collect())
    }

    pub fn map(value: Descriptor) -> Self {
        Descriptor::Mapping {
            key: MapKey::String,
            value: Box::new(value),
        }
    }

    pub fn int_keyed_map(value: Descriptor) -> Self {
        Descriptor::Mapping {
            key: MapKey::Integer,
            value: Box::new(value),
        }
    }

    pub fn union(union: UnionDescriptor) -> Self {
        Descriptor::Union(union)
    }

    /// Shape label for error messages.
    pub fn label(&self) -> &'static str {
        match self {
            Descriptor::Primitive(kind) => kind.label(),
            Descriptor::Record(_) => "record",
            Descriptor::Sequence(_) => "list",
            Descriptor::Tuple(_) => "tuple",
            Descriptor::Mapping { .. } => "map",
            Descriptor::Union(_) => "union",
        }
    }

    /// Collect every schema name this descriptor refers to, recursively.
    pub(crate) fn collect_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Descriptor::Primitive(_) => {}
            Descriptor::Record(name) => out.push(name),
            Descriptor::Sequence(element) => element.collect_references(out),
            Descriptor::Tuple(elements) => {
                for element in elements {
                    element.collect_references(out);
                }
            }
            Descriptor::Mapping { value, .. } => value.collect_references(out),
            Descriptor::Union(union) => {
                for variant in union.variants() {
                    out.push(&variant.schema);
                }
            }
        }
    }
}

/// A declared field: its shape plus whether it is sent back on encode.
///
/// Fields are read-only unless declared writable; server-computed values such
/// as identifiers are decoded but never encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub descriptor: Descriptor,
    pub writable: bool,
}

impl Field {
    pub fn read_only(descriptor: Descriptor) -> Self {
        Self {
            descriptor,
            writable: false,
        }
    }

    pub fn writable(descriptor: Descriptor) -> Self {
        Self {
            descriptor,
            writable: true,
        }
    }
}
