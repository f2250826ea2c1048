//! Schema registry and schema composition
//!
//! Schemas are declared with [`SchemaBuilder`] and frozen into a [`Registry`]
//! by [`RegistryBuilder::build`]. Building resolves every schema's effective
//! field table (parent table overridden by the child's own entries) and checks
//! that every parent and record reference names a registered schema, so decode
//! and encode never meet a dangling reference.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use crate::descriptor::{Descriptor, Field};
use crate::error::{Error, Result};

/// Declaration of one record type.
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    name: String,
    parent: Option<String>,
    fields: Vec<(String, Field)>,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            fields: Vec::new(),
        }
    }

    /// Inherit the parent's fields; own fields override by name.
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Declare a read-only field.
    pub fn field(mut self, name: impl Into<String>, descriptor: Descriptor) -> Self {
        self.fields.push((name.into(), Field::read_only(descriptor)));
        self
    }

    /// Declare a field that is emitted on encode.
    pub fn writable(mut self, name: impl Into<String>, descriptor: Descriptor) -> Self {
        self.fields.push((name.into(), Field::writable(descriptor)));
        self
    }
}

/// A registered record type with its resolved field table.
#[derive(Debug, Clone)]
pub struct Schema {
    name: String,
    parent: Option<String>,
    own: BTreeMap<String, Field>,
    effective: BTreeMap<String, Field>,
}

impl Schema {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Fields declared directly on this schema.
    pub fn own_fields(&self) -> &BTreeMap<String, Field> {
        &self.own
    }

    /// Parent table overridden by own entries.
    pub fn fields(&self) -> &BTreeMap<String, Field> {
        &self.effective
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.effective.get(name)
    }
}

/// Collects schema declarations before validation.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    schemas: Vec<SchemaBuilder>,
}

impl RegistryBuilder {
    pub fn schema(mut self, schema: SchemaBuilder) -> Self {
        self.schemas.push(schema);
        self
    }

    /// Validate declarations and resolve composed field tables.
    pub fn build(self) -> Result<Registry> {
        let mut declared: HashMap<String, SchemaBuilder> = HashMap::new();
        for schema in self.schemas {
            if declared.contains_key(&schema.name) {
                return Err(Error::DuplicateSchema(schema.name));
            }
            declared.insert(schema.name.clone(), schema);
        }

        for schema in declared.values() {
            if let Some(parent) = &schema.parent
                && !declared.contains_key(parent)
            {
                return Err(Error::UnresolvedReference {
                    schema: schema.name.clone(),
                    target: parent.clone(),
                });
            }
        }

        let mut schemas = HashMap::with_capacity(declared.len());
        for (name, builder) in &declared {
            let effective = resolve_effective(name, &declared)?;
            // Duplicate names within one declaration: last writer wins
            let own: BTreeMap<String, Field> = builder.fields.iter().cloned().collect();
            schemas.insert(
                name.clone(),
                Schema {
                    name: name.clone(),
                    parent: builder.parent.clone(),
                    own,
                    effective,
                },
            );
        }

        for schema in schemas.values() {
            let mut refs = Vec::new();
            for field in schema.effective.values() {
                field.descriptor.collect_references(&mut refs);
            }
            if let Some(missing) = refs.into_iter().find(|r| !schemas.contains_key(*r)) {
                return Err(Error::UnresolvedReference {
                    schema: schema.name.clone(),
                    target: missing.to_string(),
                });
            }
        }

        debug!(schemas = schemas.len(), "schema registry built");
        Ok(Registry { schemas })
    }
}

/// Fold the ancestor chain root-first so nearer declarations win.
fn resolve_effective(
    name: &str,
    declared: &HashMap<String, SchemaBuilder>,
) -> Result<BTreeMap<String, Field>> {
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut current = Some(name);

    while let Some(n) = current {
        if !seen.insert(n) {
            return Err(Error::InheritanceCycle(name.to_string()));
        }
        let builder = declared
            .get(n)
            .ok_or_else(|| Error::UnknownSchema(n.to_string()))?;
        chain.push(builder);
        current = builder.parent.as_deref();
    }

    let mut effective = BTreeMap::new();
    for builder in chain.iter().rev() {
        for (field, descriptor) in &builder.fields {
            effective.insert(field.clone(), descriptor.clone());
        }
    }
    Ok(effective)
}

/// Immutable set of record types, built once at startup and shared.
#[derive(Debug, Clone)]
pub struct Registry {
    schemas: HashMap<String, Schema>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn get(&self, name: &str) -> Result<&Schema> {
        self.schemas
            .get(name)
            .ok_or_else(|| Error::UnknownSchema(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    /// Effective field table of a schema (parent ∪ own, own winning).
    pub fn effective_fields(&self, name: &str) -> Result<&BTreeMap<String, Field>> {
        self.get(name).map(Schema::fields)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
