//! Field kind dispatch
//!
//! The closed set of field kinds, one variant per primitive, selected once at
//! schema-compile time through the type registry. Each variant defines its
//! coercion rules and its required-value check; dispatch is an exhaustive
//! match, never a runtime type-name inspection.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::errors::CastError;
use crate::field::Field;
use crate::form::Form;
use crate::value::Value;

/// Element caster for array fields.
#[derive(Debug, Clone)]
pub enum Caster {
    /// Primitive element kind
    Field(Box<Field>),
    /// Array of sub-documents described by a nested form
    Form(Box<Form>),
}

/// The closed set of field kinds.
#[derive(Debug, Clone)]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    Date,
    /// Untyped leaf declared by an empty options map
    Mixed,
    /// Homogeneous list; elements run through the caster when one is set
    Array { caster: Option<Caster> },
}

impl FieldKind {
    /// Returns the kind name for error messages and exported attributes
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Date => "date",
            FieldKind::Mixed => "mixed",
            FieldKind::Array { .. } => "array",
        }
    }

    /// Coerces a raw value into this kind.
    ///
    /// Casting is idempotent: a value already of the declared kind passes
    /// through unchanged. `Null` passes through every kind.
    pub fn cast(&self, value: Value, path: &str) -> Result<Value, CastError> {
        match self {
            FieldKind::String => cast_string(value, path),
            FieldKind::Number => cast_number(value, path),
            FieldKind::Boolean => Ok(cast_boolean(value)),
            FieldKind::Date => cast_date(value, path),
            FieldKind::Mixed => Ok(value),
            FieldKind::Array { caster } => cast_array(value, caster.as_ref(), path),
        }
    }

    /// The kind-specific predicate behind the `required` validator.
    pub fn check_required(&self, value: &Value) -> bool {
        match self {
            FieldKind::String => matches!(value, Value::String(s) if !s.is_empty()),
            FieldKind::Number => matches!(value, Value::Number(_)),
            FieldKind::Boolean => matches!(value, Value::Bool(_)),
            FieldKind::Date => matches!(value, Value::Date(_)),
            FieldKind::Mixed => !value.is_null(),
            FieldKind::Array { .. } => {
                matches!(value, Value::Array(items) if !items.is_empty())
            }
        }
    }

    /// Rendering hint for the exported `attributes` map, when the kind has
    /// one.
    pub fn attribute_type(&self) -> Option<&'static str> {
        match self {
            FieldKind::Number => Some("number"),
            FieldKind::Boolean => Some("checkbox"),
            FieldKind::Date => Some("date"),
            FieldKind::String | FieldKind::Mixed | FieldKind::Array { .. } => None,
        }
    }
}

fn cast_string(value: Value, path: &str) -> Result<Value, CastError> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::String(_) => Ok(value),
        Value::Number(_) | Value::Bool(_) | Value::Date(_) => {
            Ok(Value::String(value.to_display_string()))
        }
        // reference-like values reduce to their identifier
        Value::Object(ref map) => match map.get("_id") {
            Some(Value::String(id)) => Ok(Value::String(id.clone())),
            _ => Err(CastError::new("string", &value, path)),
        },
        Value::Array(_) => Err(CastError::new("string", &value, path)),
    }
}

fn cast_number(value: Value, path: &str) -> Result<Value, CastError> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Number(_) => Ok(value),
        Value::String(ref s) => {
            if s.is_empty() {
                return Ok(Value::Null);
            }
            match s.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => Ok(Value::Number(n)),
                _ => Err(CastError::new("number", &value, path)),
            }
        }
        _ => Err(CastError::new("number", &value, path)),
    }
}

fn cast_boolean(value: Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::Bool(_) => value,
        Value::String(ref s) => match s.as_str() {
            "0" | "false" => Value::Bool(false),
            "true" => Value::Bool(true),
            _ => Value::Bool(value.is_truthy()),
        },
        other => Value::Bool(other.is_truthy()),
    }
}

fn cast_date(value: Value, path: &str) -> Result<Value, CastError> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Date(_) => Ok(value),
        Value::String(ref s) if s.is_empty() => Ok(Value::Null),
        // numbers and numeric strings are epoch milliseconds
        Value::Number(millis) => match date_from_millis(millis) {
            Some(date) => Ok(Value::Date(date)),
            None => Err(CastError::new("date", &value, path)),
        },
        Value::String(ref s) => {
            let parsed = match s.trim().parse::<f64>() {
                Ok(millis) => date_from_millis(millis),
                Err(_) => parse_date_string(s),
            };
            match parsed {
                Some(date) => Ok(Value::Date(date)),
                None => Err(CastError::new("date", &value, path)),
            }
        }
        _ => Err(CastError::new("date", &value, path)),
    }
}

fn date_from_millis(millis: f64) -> Option<DateTime<Utc>> {
    if !millis.is_finite() {
        return None;
    }
    Utc.timestamp_millis_opt(millis as i64).single()
}

/// Accepted date string forms: RFC 3339, RFC 2822, and `YYYY-MM-DD`
/// (midnight UTC).
fn parse_date_string(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(s) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(date) = DateTime::parse_from_rfc2822(s) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(day) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&day.and_hms_opt(0, 0, 0)?));
    }
    None
}

fn cast_array(value: Value, caster: Option<&Caster>, path: &str) -> Result<Value, CastError> {
    // a scalar is wrapped into a one-element array and recast
    let items = match value {
        Value::Array(items) => items,
        other => vec![other],
    };

    let mut cast_items = Vec::with_capacity(items.len());
    for item in items {
        let cast = match caster {
            None => item,
            Some(Caster::Field(field)) => {
                field.cast(item).map_err(|err| err.at_path(path))?
            }
            Some(Caster::Form(form)) => {
                form.cast_document(item).map_err(|err| err.at_path(path))?
            }
        };
        cast_items.push(cast);
    }
    Ok(Value::Array(cast_items))
}
