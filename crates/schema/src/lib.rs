//! Schema-driven data binding for loosely-typed JSON payloads
//!
//! Record types are declared once at startup as field tables in a
//! [`Registry`]. The registry decodes raw JSON into [`Record`] values and
//! encodes the writable subset of a record back into JSON for request bodies.
//!
//! Binding rules:
//! 1. Fields missing from the input decode to [`Value::Absent`]
//! 2. JSON `null` decodes to [`Value::Null`] for every descriptor kind
//! 3. Undeclared input keys are dropped and never re-encoded
//! 4. Only fields declared `writable` are emitted by [`Registry::encode`]
//! 5. Unions carry no tag on the wire; the first variant whose probe matches wins

mod decode;
pub mod descriptor;
mod encode;
pub mod error;
pub mod registry;
pub mod union;
pub mod value;

pub use descriptor::{Descriptor, Field, MapKey, PrimitiveKind, Probe, UnionDescriptor, Variant};
pub use error::{Error, Result};
pub use registry::{Registry, RegistryBuilder, Schema, SchemaBuilder};
pub use union::resolve_variant;
pub use value::{Record, Value};
