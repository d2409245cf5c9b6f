//! formcast - schema-driven coercion and validation for loosely-typed input
//!
//! A nested declarative shape is compiled once into a flat map of typed field
//! handlers. Input data flows in through [`Form::set`], which resolves each
//! key to a [`Field`], applies setters, casts the result and mutates the live
//! data container. [`Form::validate`] fans out every field's validators
//! (synchronous and asynchronous alike) and aggregates failures into one
//! [`ValidationError`] keyed by field path. [`Form::get`] and
//! [`Form::export`] read back through getters and produce a presentation
//! tree.
//!
//! ```
//! use formcast::{Form, Value};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), formcast::SchemaError> {
//! let mut form = Form::new(&json!({
//!     "email": { "type": "string", "lowercase": true, "required": true },
//!     "age": { "type": "number", "min": 18 },
//!     "tags": { "type": "array", "cast": "string" },
//! }))?;
//!
//! form.set("email", "AVENUE@Q.COM").set("age", "21").set("tags", "solo");
//!
//! assert_eq!(form.get("email"), Some(Value::String("avenue@q.com".into())));
//! assert_eq!(form.get("age"), Some(Value::Number(21.0)));
//! assert_eq!(form.get("tags"), Some(Value::Array(vec![Value::from("solo")])));
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod field;
pub mod form;
pub mod kind;
pub mod options;
pub mod path;
pub mod registry;
pub mod value;
pub mod virtuals;

pub use errors::{CastError, FieldError, SchemaError, ValidationError, ValidatorError};
pub use field::Field;
pub use form::Form;
pub use kind::{Caster, FieldKind};
pub use options::{FieldOptions, FormOptions};
pub use path::{PathToken, PathType};
pub use registry::{KindTag, TypeRegistry};
pub use value::Value;
pub use virtuals::VirtualField;
