//! Error taxonomy
//!
//! Runtime failures:
//! - `CastError`: a raw value cannot be coerced to a field's declared kind
//! - `ValidatorError`: a single validator rejected a value
//! - `FieldError`: the per-path slot, either of the above
//! - `ValidationError`: aggregate keyed by field path, returned from
//!   `Form::validate`
//!
//! Build-time failures:
//! - `SchemaError`: structurally invalid declarations; fatal to schema
//!   construction, a half-built form is unrepresentable

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::value::Value;

/// Failed coercion of a raw value into a field's declared kind.
#[derive(Debug, Clone, Error)]
#[error("cast to {kind} failed for value `{value}` at path `{path}`")]
pub struct CastError {
    /// Kind the value was being cast to
    pub kind: &'static str,
    /// Display form of the offending value
    pub value: String,
    /// Field path the cast ran under
    pub path: String,
}

impl CastError {
    pub fn new(kind: &'static str, value: &Value, path: &str) -> Self {
        Self {
            kind,
            value: value.to_display_string(),
            path: path.to_string(),
        }
    }

    /// Rethrows an element failure under an enclosing array path.
    pub(crate) fn at_path(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }
}

/// A single validator rejected a value.
#[derive(Debug, Clone)]
pub struct ValidatorError {
    /// Field path the validator ran under
    pub path: String,
    /// Validator tag, e.g. `"required"`, `"min"`, `"enum"`
    pub tag: String,
    /// The value that was tested, when one was present
    pub value: Option<Value>,
}

impl ValidatorError {
    pub fn new(path: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            tag: tag.into(),
            value: None,
        }
    }

    pub fn with_value(
        path: impl Into<String>,
        tag: impl Into<String>,
        value: Option<Value>,
    ) -> Self {
        Self {
            path: path.into(),
            tag: tag.into(),
            value,
        }
    }
}

impl fmt::Display for ValidatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validator \"{}\" failed for path {}", self.tag, self.path)?;
        if let Some(value) = &self.value {
            write!(f, " with value `{}`", value)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidatorError {}

/// The failure recorded for one path.
#[derive(Debug, Clone, Error)]
pub enum FieldError {
    #[error(transparent)]
    Cast(#[from] CastError),
    #[error(transparent)]
    Validator(#[from] ValidatorError),
}

impl FieldError {
    /// The validator tag, when the failure came from a validator.
    pub fn tag(&self) -> Option<&str> {
        match self {
            FieldError::Cast(_) => None,
            FieldError::Validator(err) => Some(&err.tag),
        }
    }

    /// The path the failure was recorded under.
    pub fn path(&self) -> &str {
        match self {
            FieldError::Cast(err) => &err.path,
            FieldError::Validator(err) => &err.path,
        }
    }
}

/// Aggregate validation failure, one slot per failing path.
///
/// Paths that validated cleanly are absent, never present with an empty slot.
#[derive(Debug, Clone, Default)]
pub struct ValidationError {
    pub errors: BTreeMap<String, FieldError>,
}

impl ValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn get(&self, path: &str) -> Option<&FieldError> {
        self.errors.get(path)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed")?;
        let mut first = true;
        for err in self.errors.values() {
            write!(f, "{} {}", if first { ":" } else { "," }, err)?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Build-time schema configuration failure.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid value for field path `{0}`")]
    InvalidFieldSpec(String),

    #[error("undefined type `{name}` at path `{path}`")]
    UndefinedType { name: String, path: String },

    #[error("cannot set nested path `{path}`: parent path `{parent}` is already a {kind} field")]
    NestedConflict {
        path: String,
        parent: String,
        kind: &'static str,
    },

    #[error("cannot declare field at `{0}`: path is already a nested container")]
    LeafConflict(String),

    #[error("virtual path `{0}` conflicts with a declared field")]
    VirtualConflict(String),

    #[error("invalid pattern for path `{path}`: {source}")]
    InvalidPattern {
        path: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid default for path `{path}`: {source}")]
    InvalidDefault {
        path: String,
        #[source]
        source: CastError,
    },

    #[error("invalid enum member for path `{path}`: {source}")]
    InvalidEnumMember {
        path: String,
        #[source]
        source: CastError,
    },

    #[error("invalid options for path `{path}`: {message}")]
    InvalidOptions { path: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cast_error_message() {
        let err = CastError::new("number", &Value::String("abc".into()), "age");
        assert_eq!(
            err.to_string(),
            "cast to number failed for value `abc` at path `age`"
        );
    }

    #[test]
    fn test_validator_error_message_with_value() {
        let err = ValidatorError::with_value("age", "min", Some(Value::Number(17.0)));
        assert_eq!(
            err.to_string(),
            "validator \"min\" failed for path age with value `17`"
        );
    }

    #[test]
    fn test_validator_error_message_without_value() {
        let err = ValidatorError::new("name", "required");
        assert_eq!(err.to_string(), "validator \"required\" failed for path name");
    }

    #[test]
    fn test_validation_error_aggregates_by_path() {
        let mut agg = ValidationError::new();
        agg.errors.insert(
            "age".into(),
            FieldError::Validator(ValidatorError::new("age", "min")),
        );
        assert_eq!(agg.len(), 1);
        assert!(agg.get("age").is_some());
        assert!(agg.get("name").is_none());
        assert_eq!(agg.get("age").unwrap().tag(), Some("min"));
    }
}
