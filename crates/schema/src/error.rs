//! Error types for schema construction and data binding

/// Structural errors raised while building a registry or binding data.
///
/// Decode and encode errors carry the JSON path of the offending value
/// (`$.problems[3].provider`). These errors are never retryable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("expected object at {path}, found {found}")]
    NotAnObject { path: String, found: &'static str },

    #[error("arity mismatch at {path}: expected {expected} elements, found {found}")]
    ArityMismatch {
        path: String,
        expected: usize,
        found: usize,
    },

    #[error("type mismatch at {path}: expected {expected}, found {found}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("no union variant matched at {path}")]
    NoVariantMatched { path: String },

    #[error("invalid map key {key:?} at {path}: expected an integer key")]
    InvalidMapKey { path: String, key: String },

    #[error("unknown schema: {0}")]
    UnknownSchema(String),

    #[error("schema registered twice: {0}")]
    DuplicateSchema(String),

    #[error("schema {schema} references unknown schema {target}")]
    UnresolvedReference { schema: String, target: String },

    #[error("inheritance cycle through schema {0}")]
    InheritanceCycle(String),

    #[error("field {field} is not declared by schema {schema}")]
    UnknownField { schema: String, field: String },
}

/// Result alias for schema operations.
pub type Result<T> = std::result::Result<T, Error>;

/// JSON type label used in mismatch errors.
pub(crate) fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(n) if n.is_f64() => "float",
        serde_json::Value::Number(_) => "int",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
