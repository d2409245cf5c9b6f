//! Schema-level and field-level options

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Schema-level options, merged over defaults at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FormOptions {
    /// Named external sources a middleware adapter merges input from,
    /// in precedence order
    pub data_sources: Vec<String>,
    /// Trim every string field on write
    pub auto_trim: bool,
    /// Expose the exported tree to the view layer automatically
    pub auto_locals: bool,
    /// Keep undeclared input around instead of ignoring it
    pub pass_through: bool,
    /// Validator tag to message template, rendered against `{data: ...}`
    pub errors: HashMap<String, String>,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            data_sources: vec!["body".into(), "query".into(), "params".into()],
            auto_trim: false,
            auto_locals: true,
            pass_through: false,
            errors: HashMap::new(),
        }
    }
}

/// Per-field declaration options.
///
/// Parsed from the declaration's options map; unrecognized entries (labels,
/// placeholders, rendering extras) are carried through and re-exported.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldOptions {
    #[serde(skip_serializing_if = "is_false")]
    pub required: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<JsonValue>,

    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<JsonValue>>,

    /// Regular expression the value must match
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    #[serde(skip_serializing_if = "is_false")]
    pub lowercase: bool,

    #[serde(skip_serializing_if = "is_false")]
    pub uppercase: bool,

    #[serde(skip_serializing_if = "is_false")]
    pub trim: bool,

    /// Rendering hints decorated by `Field::export`
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, JsonValue>,

    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Renders a message template, substituting `{data.*}` placeholders from the
/// given context.
///
/// Unresolvable placeholders are left in place.
pub(crate) fn render_template(template: &str, context: &JsonValue) -> String {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    let placeholder = PLACEHOLDER
        .get_or_init(|| Regex::new(r"\{([A-Za-z0-9_.]+)\}").expect("placeholder pattern"));

    placeholder
        .replace_all(template, |caps: &regex::Captures<'_>| {
            let mut current = context;
            for segment in caps[1].split('.') {
                match current.get(segment) {
                    Some(next) => current = next,
                    None => return caps[0].to_string(),
                }
            }
            match current {
                JsonValue::String(s) => s.clone(),
                other => other.to_string(),
            }
        })
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_form_options_defaults() {
        let options = FormOptions::default();
        assert_eq!(options.data_sources, vec!["body", "query", "params"]);
        assert!(!options.auto_trim);
        assert!(options.auto_locals);
        assert!(!options.pass_through);
    }

    #[test]
    fn test_form_options_from_json() {
        let options: FormOptions = serde_json::from_value(json!({
            "autoTrim": true,
            "errors": { "min": "too small" }
        }))
        .unwrap();
        assert!(options.auto_trim);
        assert_eq!(options.errors["min"], "too small");
        assert!(options.auto_locals);
    }

    #[test]
    fn test_field_options_carry_extras() {
        let options: FieldOptions = serde_json::from_value(json!({
            "required": true,
            "min": 18,
            "label": "Age"
        }))
        .unwrap();
        assert!(options.required);
        assert_eq!(options.min, Some(18.0));
        assert_eq!(options.extra["label"], json!("Age"));

        let exported = serde_json::to_value(&options).unwrap();
        assert_eq!(exported["label"], json!("Age"));
        assert!(exported.get("max").is_none());
    }

    #[test]
    fn test_render_template() {
        let context = json!({ "data": { "min": 18, "label": "Age" } });
        assert_eq!(
            render_template("{data.label} must be at least {data.min}", &context),
            "Age must be at least 18"
        );
        assert_eq!(
            render_template("{data.unknown} stays", &context),
            "{data.unknown} stays"
        );
    }
}
