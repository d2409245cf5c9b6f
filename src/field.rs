//! Typed field handlers
//!
//! A `Field` owns one path's pipeline: coercion through its kind, setter and
//! getter transforms, a default value source, and an ordered list of tagged
//! validators. Validators are joined structurally during validation: every
//! rule yields a future handle (immediately ready for synchronous rules) and
//! the set is awaited together.

use std::fmt;
use std::sync::Arc;

use futures_util::future::{self, BoxFuture, FutureExt};
use regex::Regex;
use serde_json::{Map, Value as JsonValue};

use crate::errors::{CastError, SchemaError, ValidatorError};
use crate::kind::FieldKind;
use crate::options::{FieldOptions, FormOptions};
use crate::value::Value;

/// Transform applied by a setter or getter.
pub type Transform = Arc<dyn Fn(Value, &Field) -> Value + Send + Sync>;

/// Synchronous validator predicate.
pub type SyncValidator = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Asynchronous validator returning a future handle.
pub type AsyncValidator = Arc<dyn Fn(Value) -> BoxFuture<'static, bool> + Send + Sync>;

/// Source of a field's default value.
#[derive(Clone)]
pub enum DefaultValue {
    /// Cast once at declaration time
    Literal(Value),
    /// Invoked lazily with the live document; the result is cast at read time
    Generator(Arc<dyn Fn(&Value) -> Value + Send + Sync>),
}

/// A single validation rule.
#[derive(Clone)]
pub enum ValidatorRule {
    /// Kind-specific presence check
    Required,
    /// Lower numeric bound, inclusive
    Min(f64),
    /// Upper numeric bound, inclusive
    Max(f64),
    /// Membership in the field's accumulated enum values
    Enum,
    /// Regular-expression test; null and empty strings pass
    Pattern(Regex),
    Sync(SyncValidator),
    Async(AsyncValidator),
}

/// A tagged validator entry. The tag keys error messages and removal.
#[derive(Clone)]
pub struct ValidatorEntry {
    pub tag: String,
    pub rule: ValidatorRule,
}

/// Typed handler for one declared field path.
#[derive(Clone)]
pub struct Field {
    path: String,
    kind: FieldKind,
    validators: Vec<ValidatorEntry>,
    setters: Vec<Transform>,
    getters: Vec<Transform>,
    default: Option<DefaultValue>,
    options: FieldOptions,
    enum_members: Vec<Value>,
}

impl Field {
    /// Creates a bare field with no options applied.
    pub fn new(path: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            path: path.into(),
            kind,
            validators: Vec::new(),
            setters: Vec::new(),
            getters: Vec::new(),
            default: None,
            options: FieldOptions::default(),
            enum_members: Vec::new(),
        }
    }

    /// Creates a field and applies its declaration options.
    ///
    /// Invalid options (bad pattern, uncastable default or enum member) fail
    /// construction.
    pub(crate) fn with_options(
        path: impl Into<String>,
        kind: FieldKind,
        options: FieldOptions,
        form_options: &FormOptions,
    ) -> Result<Self, SchemaError> {
        let mut field = Self::new(path, kind);
        field.options = options;

        if matches!(field.kind, FieldKind::String) {
            if field.options.lowercase {
                field.setter(|value, _| match value {
                    Value::String(s) => Value::String(s.to_lowercase()),
                    other => other,
                });
            }
            if field.options.uppercase {
                field.setter(|value, _| match value {
                    Value::String(s) => Value::String(s.to_uppercase()),
                    other => other,
                });
            }
            if field.options.trim || form_options.auto_trim {
                field.setter(|value, _| match value {
                    Value::String(s) => Value::String(s.trim().to_string()),
                    other => other,
                });
            }
        }

        if let Some(pattern) = field.options.pattern.clone() {
            let regex = Regex::new(&pattern).map_err(|source| SchemaError::InvalidPattern {
                path: field.path.clone(),
                source,
            })?;
            field.pattern(regex, "regexp");
        }

        if let Some(members) = field.options.enum_values.clone() {
            let members: Vec<Value> = members.iter().map(Value::from_json).collect();
            field
                .enum_values(&members)
                .map_err(|source| SchemaError::InvalidEnumMember {
                    path: source.path.clone(),
                    source,
                })?;
        }

        if matches!(field.kind, FieldKind::Number) {
            if let Some(min) = field.options.min {
                field.min(Some(min));
            }
            if let Some(max) = field.options.max {
                field.max(Some(max));
            }
        }

        if field.options.required {
            field.required(true);
        }

        match field.options.default.clone() {
            Some(default) => {
                field
                    .default_value(Value::from_json(&default))
                    .map_err(|source| SchemaError::InvalidDefault {
                        path: source.path.clone(),
                        source,
                    })?;
            }
            // each instance gets its own array, never a shared default
            None if matches!(field.kind, FieldKind::Array { .. }) => {
                field.default_fn(|_| Value::Array(Vec::new()));
            }
            None => {}
        }

        Ok(field)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn options(&self) -> &FieldOptions {
        &self.options
    }

    /// Accumulated enum members, in declaration order.
    pub fn enum_members(&self) -> &[Value] {
        &self.enum_members
    }

    /// Registered validator tags, in declaration order.
    pub fn validator_tags(&self) -> Vec<&str> {
        self.validators.iter().map(|entry| entry.tag.as_str()).collect()
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Appends a setter. Setters run in reverse declaration order: the last
    /// registered runs first.
    pub fn setter(
        &mut self,
        transform: impl Fn(Value, &Field) -> Value + Send + Sync + 'static,
    ) -> &mut Self {
        self.setters.push(Arc::new(transform));
        self
    }

    /// Appends a getter. Getters run in reverse declaration order.
    pub fn getter(
        &mut self,
        transform: impl Fn(Value, &Field) -> Value + Send + Sync + 'static,
    ) -> &mut Self {
        self.getters.push(Arc::new(transform));
        self
    }

    /// Toggles the built-in required validator, keyed by the `"required"`
    /// tag.
    pub fn required(&mut self, required: bool) -> &mut Self {
        if required {
            self.options.required = true;
            if !self.validators.iter().any(|entry| entry.tag == "required") {
                self.validators.push(ValidatorEntry {
                    tag: "required".to_string(),
                    rule: ValidatorRule::Required,
                });
            }
        } else {
            self.options.required = false;
            self.validators.retain(|entry| entry.tag != "required");
        }
        self
    }

    /// Appends a synchronous validator under the given tag.
    pub fn validate_with(
        &mut self,
        tag: impl Into<String>,
        predicate: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> &mut Self {
        self.validators.push(ValidatorEntry {
            tag: tag.into(),
            rule: ValidatorRule::Sync(Arc::new(predicate)),
        });
        self
    }

    /// Appends an asynchronous validator under the given tag. The future
    /// reports the outcome; mixing sync and async entries is supported.
    pub fn validate_async<F, Fut>(&mut self, tag: impl Into<String>, predicate: F) -> &mut Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = bool> + Send + 'static,
    {
        self.validators.push(ValidatorEntry {
            tag: tag.into(),
            rule: ValidatorRule::Async(Arc::new(move |value| predicate(value).boxed())),
        });
        self
    }

    /// Appends a regular-expression validator. Null and empty-string values
    /// pass.
    pub fn pattern(&mut self, regex: Regex, tag: impl Into<String>) -> &mut Self {
        self.validators.push(ValidatorEntry {
            tag: tag.into(),
            rule: ValidatorRule::Pattern(regex),
        });
        self
    }

    /// Sets the inclusive lower bound. Redeclaring replaces the prior bound;
    /// `None` removes it entirely.
    pub fn min(&mut self, value: Option<f64>) -> &mut Self {
        self.validators.retain(|entry| entry.tag != "min");
        self.options.min = None;
        if let Some(min) = value {
            self.validators.push(ValidatorEntry {
                tag: "min".to_string(),
                rule: ValidatorRule::Min(min),
            });
            self.options.min = Some(min);
        }
        self
    }

    /// Sets the inclusive upper bound. Redeclaring replaces the prior bound;
    /// `None` removes it entirely.
    pub fn max(&mut self, value: Option<f64>) -> &mut Self {
        self.validators.retain(|entry| entry.tag != "max");
        self.options.max = None;
        if let Some(max) = value {
            self.validators.push(ValidatorEntry {
                tag: "max".to_string(),
                rule: ValidatorRule::Max(max),
            });
            self.options.max = Some(max);
        }
        self
    }

    /// Adds enumeration members and the coinciding validator. Members are
    /// cast through the field first; re-declaring accumulates.
    pub fn enum_values(&mut self, members: &[Value]) -> Result<&mut Self, CastError> {
        let mut cast_members = Vec::with_capacity(members.len());
        for member in members {
            cast_members.push(self.cast(member.clone())?);
        }
        self.enum_members.extend(cast_members);

        if !self.validators.iter().any(|entry| entry.tag == "enum") {
            self.validators.push(ValidatorEntry {
                tag: "enum".to_string(),
                rule: ValidatorRule::Enum,
            });
        }
        Ok(self)
    }

    /// Removes the enum validator and its accumulated members.
    pub fn enum_clear(&mut self) -> &mut Self {
        self.validators.retain(|entry| entry.tag != "enum");
        self.enum_members.clear();
        self
    }

    /// Records a literal default, cast immediately.
    pub fn default_value(&mut self, value: Value) -> Result<&mut Self, CastError> {
        let cast = self.cast(value)?;
        self.default = Some(DefaultValue::Literal(cast));
        Ok(self)
    }

    /// Records a default generator, invoked lazily with the live document.
    pub fn default_fn(
        &mut self,
        generator: impl Fn(&Value) -> Value + Send + Sync + 'static,
    ) -> &mut Self {
        self.default = Some(DefaultValue::Generator(Arc::new(generator)));
        self
    }

    // ------------------------------------------------------------------
    // Pipeline
    // ------------------------------------------------------------------

    /// Coerces a raw value into this field's kind.
    pub fn cast(&self, value: Value) -> Result<Value, CastError> {
        self.kind.cast(value, &self.path)
    }

    /// The kind-specific presence check behind the required validator.
    pub fn check_required(&self, value: &Value) -> bool {
        self.kind.check_required(value)
    }

    /// Runs setters in reverse declaration order, then casts the result.
    ///
    /// A null produced by the setter chain short-circuits the cast.
    pub fn apply_setters(&self, value: Value) -> Result<Value, CastError> {
        if self.setters.is_empty() {
            if value.is_null() {
                return Ok(value);
            }
            return self.cast(value);
        }

        let mut current = value;
        for setter in self.setters.iter().rev() {
            current = setter(current, self);
        }
        if current.is_null() {
            return Ok(current);
        }
        // cast only after all setters have run
        self.cast(current)
    }

    /// Runs getters in reverse declaration order; no-op without getters.
    pub fn apply_getters(&self, value: Value) -> Value {
        let mut current = value;
        for getter in self.getters.iter().rev() {
            current = getter(current, self);
        }
        current
    }

    /// Produces the default for the given document, when one is declared.
    ///
    /// Generator results are cast at read time.
    pub fn default_for(&self, doc: &Value) -> Option<Result<Value, CastError>> {
        match &self.default {
            None => None,
            Some(DefaultValue::Literal(value)) => Some(Ok(value.clone())),
            Some(DefaultValue::Generator(generator)) => {
                let value = generator(doc);
                if value.is_null() {
                    Some(Ok(value))
                } else {
                    Some(self.cast(value))
                }
            }
        }
    }

    /// Runs every validator for this field and joins the set.
    ///
    /// The future resolves only after all validators have reported. The first
    /// failing entry in declaration order produces the single reported error;
    /// later failures are absorbed.
    pub async fn do_validate(&self, value: Option<&Value>) -> Result<(), ValidatorError> {
        if self.validators.is_empty() {
            return Ok(());
        }

        let handles: Vec<BoxFuture<'static, bool>> = self
            .validators
            .iter()
            .map(|entry| self.rule_future(entry, value))
            .collect();
        let results = future::join_all(handles).await;

        for (entry, passed) in self.validators.iter().zip(results) {
            if !passed {
                return Err(ValidatorError::with_value(
                    self.path.as_str(),
                    entry.tag.as_str(),
                    value.cloned(),
                ));
            }
        }
        Ok(())
    }

    /// One future handle per rule; synchronous rules resolve immediately.
    ///
    /// Absent values pass every built-in rule except `required`; custom
    /// validators always run, seeing null for an absent value.
    fn rule_future(&self, entry: &ValidatorEntry, value: Option<&Value>) -> BoxFuture<'static, bool> {
        let passed = match &entry.rule {
            ValidatorRule::Required => match value {
                Some(v) => self.check_required(v),
                None => false,
            },
            ValidatorRule::Min(min) => match value {
                None | Some(Value::Null) => true,
                Some(Value::Number(n)) => n >= min,
                Some(_) => false,
            },
            ValidatorRule::Max(max) => match value {
                None | Some(Value::Null) => true,
                Some(Value::Number(n)) => n <= max,
                Some(_) => false,
            },
            ValidatorRule::Enum => match value {
                None => true,
                Some(v) => self.enum_members.contains(v),
            },
            ValidatorRule::Pattern(regex) => match value {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) if s.is_empty() => true,
                Some(v) => regex.is_match(&v.to_display_string()),
            },
            ValidatorRule::Sync(predicate) => {
                let value = value.cloned().unwrap_or(Value::Null);
                predicate(&value)
            }
            ValidatorRule::Async(predicate) => {
                return predicate(value.cloned().unwrap_or(Value::Null));
            }
        };
        future::ready(passed).boxed()
    }

    // ------------------------------------------------------------------
    // Export
    // ------------------------------------------------------------------

    /// The field's options decorated with rendering hints under
    /// `attributes`: `required` as a bare attribute, and the kind's
    /// `type`/`min`/`max` where applicable.
    pub fn export(&self) -> JsonValue {
        let mut exported = match serde_json::to_value(&self.options) {
            Ok(JsonValue::Object(map)) => map,
            _ => Map::new(),
        };

        let attributes = exported
            .entry("attributes".to_string())
            .or_insert_with(|| JsonValue::Object(Map::new()));
        if let Some(attributes) = attributes.as_object_mut() {
            if self.options.required {
                attributes.insert("required".to_string(), JsonValue::Null);
            } else {
                attributes.remove("required");
            }

            if let Some(kind) = self.kind.attribute_type() {
                attributes.insert("type".to_string(), JsonValue::String(kind.to_string()));
            }

            if matches!(self.kind, FieldKind::Number) {
                match self.options.min.and_then(serde_json::Number::from_f64) {
                    Some(min) => {
                        attributes.insert("min".to_string(), JsonValue::Number(min));
                    }
                    None => {
                        attributes.remove("min");
                    }
                }
                match self.options.max.and_then(serde_json::Number::from_f64) {
                    Some(max) => {
                        attributes.insert("max".to_string(), JsonValue::Number(max));
                    }
                    None => {
                        attributes.remove("max");
                    }
                }
            }
        }

        JsonValue::Object(exported)
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("path", &self.path)
            .field("kind", &self.kind.type_name())
            .field("validators", &self.validator_tags())
            .field("setters", &self.setters.len())
            .field("getters", &self.getters.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string_field() -> Field {
        Field::new("name", FieldKind::String)
    }

    fn number_field() -> Field {
        Field::new("age", FieldKind::Number)
    }

    #[test]
    fn test_setters_run_in_reverse_declaration_order() {
        let mut field = string_field();
        field.setter(|value, _| match value {
            Value::String(s) => Value::String(format!("{}a", s)),
            other => other,
        });
        field.setter(|value, _| match value {
            Value::String(s) => Value::String(format!("{}b", s)),
            other => other,
        });

        // last registered runs first
        let out = field.apply_setters(Value::String("x".into())).unwrap();
        assert_eq!(out, Value::String("xba".into()));
    }

    #[test]
    fn test_getters_run_in_reverse_declaration_order() {
        let mut field = string_field();
        field.getter(|value, _| match value {
            Value::String(s) => Value::String(format!("{}1", s)),
            other => other,
        });
        field.getter(|value, _| match value {
            Value::String(s) => Value::String(format!("{}2", s)),
            other => other,
        });

        assert_eq!(
            field.apply_getters(Value::String("x".into())),
            Value::String("x21".into())
        );
    }

    #[test]
    fn test_null_from_setters_short_circuits_cast() {
        let mut field = number_field();
        field.setter(|_, _| Value::Null);
        let out = field.apply_setters(Value::String("abc".into())).unwrap();
        assert_eq!(out, Value::Null);
    }

    #[test]
    fn test_min_redeclaration_last_call_wins() {
        let mut field = number_field();
        field.min(Some(10.0));
        field.min(Some(20.0));
        assert_eq!(field.validator_tags(), vec!["min"]);
        assert_eq!(field.options().min, Some(20.0));

        field.min(None);
        assert!(field.validator_tags().is_empty());
        assert_eq!(field.options().min, None);
    }

    #[test]
    fn test_required_toggle_removes_tagged_entry() {
        let mut field = string_field();
        field.required(true);
        field.validate_with("custom", |_| true);
        assert_eq!(field.validator_tags(), vec!["required", "custom"]);

        field.required(false);
        assert_eq!(field.validator_tags(), vec!["custom"]);
        assert!(!field.options().required);
    }

    #[test]
    fn test_enum_accumulates() {
        let mut field = string_field();
        field.enum_values(&[Value::from("a")]).unwrap();
        field.enum_values(&[Value::from("b")]).unwrap();
        assert_eq!(field.enum_members().len(), 2);
        // one validator entry regardless of how many declarations
        assert_eq!(field.validator_tags(), vec!["enum"]);
    }

    #[tokio::test]
    async fn test_do_validate_passes_without_validators() {
        let field = string_field();
        assert!(field.do_validate(Some(&Value::from("x"))).await.is_ok());
    }

    #[tokio::test]
    async fn test_min_max_window() {
        let mut field = number_field();
        field.min(Some(18.0)).max(Some(65.0));

        assert!(field.do_validate(Some(&Value::Number(18.0))).await.is_ok());
        assert!(field.do_validate(Some(&Value::Number(65.0))).await.is_ok());

        let err = field
            .do_validate(Some(&Value::Number(17.0)))
            .await
            .unwrap_err();
        assert_eq!(err.tag, "min");

        let err = field
            .do_validate(Some(&Value::Number(66.0)))
            .await
            .unwrap_err();
        assert_eq!(err.tag, "max");
    }

    #[tokio::test]
    async fn test_absent_value_passes_bounds_but_fails_required() {
        let mut field = number_field();
        field.min(Some(18.0));
        assert!(field.do_validate(None).await.is_ok());

        field.required(true);
        let err = field.do_validate(None).await.unwrap_err();
        assert_eq!(err.tag, "required");
    }

    #[tokio::test]
    async fn test_enum_membership() {
        let mut field = string_field();
        field
            .enum_values(&[Value::from("a"), Value::from("b")])
            .unwrap();

        assert!(field.do_validate(Some(&Value::from("a"))).await.is_ok());
        assert!(field.do_validate(None).await.is_ok());

        let err = field.do_validate(Some(&Value::from("c"))).await.unwrap_err();
        assert_eq!(err.tag, "enum");
        let err = field.do_validate(Some(&Value::Null)).await.unwrap_err();
        assert_eq!(err.tag, "enum");
    }

    #[tokio::test]
    async fn test_mixed_sync_and_async_reports_single_error() {
        let mut field = string_field();
        field.validate_with("sync-check", |_| false);
        field.validate_async("async-check", |_| async {
            tokio::task::yield_now().await;
            true
        });

        // exactly one error, from the failing entry, after both complete
        let err = field.do_validate(Some(&Value::from("x"))).await.unwrap_err();
        assert_eq!(err.tag, "sync-check");
    }

    #[tokio::test]
    async fn test_pattern_passes_null_and_empty() {
        let mut field = string_field();
        field.pattern(Regex::new("^a").unwrap(), "regexp");

        assert!(field.do_validate(Some(&Value::from("apples"))).await.is_ok());
        assert!(field.do_validate(Some(&Value::from(""))).await.is_ok());
        assert!(field.do_validate(Some(&Value::Null)).await.is_ok());

        let err = field
            .do_validate(Some(&Value::from("invalid")))
            .await
            .unwrap_err();
        assert_eq!(err.tag, "regexp");
    }

    #[test]
    fn test_literal_default_is_cast_at_declaration() {
        let mut field = number_field();
        field.default_value(Value::from("4.5")).unwrap();
        let default = field.default_for(&Value::Null).unwrap().unwrap();
        assert_eq!(default, Value::Number(4.5));

        assert!(field.default_value(Value::from("abc")).is_err());
    }

    #[test]
    fn test_export_decorates_attributes() {
        let mut field = number_field();
        field.required(true).min(Some(18.0));

        let exported = field.export();
        assert_eq!(exported["attributes"]["type"], "number");
        assert_eq!(exported["attributes"]["min"], 18.0);
        assert!(exported["attributes"].get("max").is_none());
        assert_eq!(exported["attributes"]["required"], JsonValue::Null);

        field.required(false);
        let exported = field.export();
        assert!(exported["attributes"].get("required").is_none());
    }
}
