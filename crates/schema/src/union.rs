//! Structural-probe union resolution
//!
//! The wire format carries no discriminant. A union value is assigned to the
//! first declared variant whose probe matches the raw object, so declaration
//! order decides ties: an object carrying both `uid` and `id` resolves to the
//! user variant when `uid` is probed first.

use serde_json::{Map, Value as JsonValue};

use crate::descriptor::{UnionDescriptor, Variant};

/// Pick the variant for a raw JSON object, first matching probe wins.
pub fn resolve_variant<'a>(
    union: &'a UnionDescriptor,
    object: &Map<String, JsonValue>,
) -> Option<&'a Variant> {
    union.variants().iter().find(|v| v.probe.matches(object))
}
