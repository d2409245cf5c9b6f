//! Form aggregate
//!
//! Compiles a declarative shape into a flat path-to-field map plus a tree
//! mirror of the declared structure, owns the live data container, and
//! orchestrates set/get/validate/export across the whole field set.
//!
//! # Invariants
//!
//! - A path is a scalar field or a nested container, never both; conflicts
//!   fail at schema-build time
//! - Validation is exhaustive: every declared path reports before the
//!   aggregate result is produced
//! - One writer per form instance; a form models one submission

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Mutex;

use futures_util::future;
use serde_json::{json, Map, Value as JsonValue};
use tracing::debug;

use crate::errors::{CastError, FieldError, SchemaError, ValidationError, ValidatorError};
use crate::field::Field;
use crate::kind::{Caster, FieldKind};
use crate::options::{render_template, FieldOptions, FormOptions};
use crate::path::{self, PathToken, PathType};
use crate::registry::{KindTag, TypeRegistry};
use crate::value::Value;
use crate::virtuals::VirtualField;

/// Node in the declared-shape tree mirror.
#[derive(Debug, Clone)]
enum TreeNode {
    Branch(BTreeMap<String, TreeNode>),
    Leaf(&'static str),
    Virtual,
}

/// Schema-driven coercion and validation over one submission's data.
pub struct Form {
    options: FormOptions,
    registry: TypeRegistry,
    /// Flat path to field map
    paths: HashMap<String, Field>,
    /// Declaration order of `paths` keys
    order: Vec<String>,
    /// Nested mirror of the declared shape, for conflict detection
    tree: BTreeMap<String, TreeNode>,
    /// Prefixes known to be object containers
    nested: HashSet<String>,
    /// Memoized positional resolutions
    subpaths: Mutex<HashMap<String, Option<Field>>>,
    virtuals: HashMap<String, VirtualField>,
    /// Live data container, mutated by `set`
    data: Value,
    /// Failures recorded before or during a validation sweep
    pending: Option<ValidationError>,
}

impl Form {
    /// Compiles a declarative shape with default options.
    pub fn new(shape: &JsonValue) -> Result<Self, SchemaError> {
        Self::with_options(shape, FormOptions::default())
    }

    /// Compiles a declarative shape with explicit options.
    pub fn with_options(shape: &JsonValue, options: FormOptions) -> Result<Self, SchemaError> {
        Self::with_registry(shape, options, TypeRegistry::builtin())
    }

    /// Compiles a declarative shape against an explicit type registry.
    pub fn with_registry(
        shape: &JsonValue,
        options: FormOptions,
        registry: TypeRegistry,
    ) -> Result<Self, SchemaError> {
        let mut form = Self {
            options,
            registry,
            paths: HashMap::new(),
            order: Vec::new(),
            tree: BTreeMap::new(),
            nested: HashSet::new(),
            subpaths: Mutex::new(HashMap::new()),
            virtuals: HashMap::new(),
            data: Value::Object(BTreeMap::new()),
            pending: None,
        };
        match shape {
            JsonValue::Object(_) => form.add(shape, "")?,
            JsonValue::Null => {}
            _ => return Err(SchemaError::InvalidFieldSpec(String::new())),
        }
        debug!(paths = form.order.len(), "schema compiled");
        Ok(form)
    }

    pub fn options(&self) -> &FormOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut FormOptions {
        &mut self.options
    }

    /// The live data container.
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Declared paths in declaration order.
    pub fn declared_paths(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Declared paths whose options mark them required, in declaration
    /// order.
    pub fn required_paths(&self) -> Vec<&str> {
        self.order
            .iter()
            .filter(|p| {
                self.paths
                    .get(*p)
                    .map(|field| field.options().required)
                    .unwrap_or(false)
            })
            .map(String::as_str)
            .collect()
    }

    // ------------------------------------------------------------------
    // Declaration
    // ------------------------------------------------------------------

    /// Declares fields from a nested shape description.
    ///
    /// An object value with no `type` key (or whose `type` is itself an
    /// object carrying `type`) is a nested container and is recursed into;
    /// an empty object declares an untyped leaf; everything else declares a
    /// typed leaf.
    pub fn add(&mut self, shape: &JsonValue, prefix: &str) -> Result<(), SchemaError> {
        let map = match shape.as_object() {
            Some(map) => map,
            None => {
                return Err(SchemaError::InvalidFieldSpec(
                    prefix.trim_end_matches('.').to_string(),
                ))
            }
        };

        for (key, spec) in map {
            let full = format!("{}{}", prefix, key);
            if spec.is_null() {
                return Err(SchemaError::InvalidFieldSpec(full));
            }

            if let Some(obj) = spec.as_object() {
                let container = match obj.get("type") {
                    None => true,
                    Some(t) => t.as_object().map_or(false, |tm| tm.contains_key("type")),
                };
                if container {
                    if obj.is_empty() {
                        self.declare(&full, spec)?;
                    } else {
                        self.nested.insert(full.clone());
                        self.add(spec, &format!("{}.", full))?;
                    }
                    continue;
                }
            }

            self.declare(&full, spec)?;
        }
        Ok(())
    }

    /// Declares one typed leaf at `path`.
    pub fn declare(&mut self, path: &str, spec: &JsonValue) -> Result<&mut Self, SchemaError> {
        let field = self.interpret_as_type(path, spec)?;
        self.tree_insert(path, TreeNode::Leaf(field.kind().type_name()))?;

        // seed the declared default into the live container
        if let Some(default) = field.default_for(&self.data) {
            let default = default.map_err(|source| SchemaError::InvalidDefault {
                path: path.to_string(),
                source,
            })?;
            if !default.is_null() {
                path::set(&mut self.data, &path::parse(path), default);
            }
        }

        if !self.paths.contains_key(path) {
            self.order.push(path.to_string());
        }
        self.paths.insert(path.to_string(), field);
        self.clear_positional_memo();
        Ok(self)
    }

    /// Normalizes a shorthand declaration into a concrete field.
    ///
    /// Accepted shorthands: a bare type-name string, `{ "type": X, ...
    /// options }`, an array literal `[X]`, and `"type": "array"` with a
    /// `cast` entry.
    pub fn interpret_as_type(&self, path: &str, spec: &JsonValue) -> Result<Field, SchemaError> {
        let (type_val, options_map) = normalize_spec(spec);

        let array_literal_cast = type_val.as_array().map(|items| items.first().cloned());
        let named_tag = type_val.as_str().and_then(|name| self.registry.lookup(name));

        if array_literal_cast.is_some() || named_tag == Some(KindTag::Array) {
            let cast_spec = match array_literal_cast {
                Some(first) => first,
                None => options_map.get("cast").cloned(),
            };
            let caster = self.build_caster(path, cast_spec)?;
            let options = parse_field_options(path, &options_map)?;
            return Field::with_options(path, FieldKind::Array { caster }, options, &self.options);
        }

        // untyped leaf declared by an empty options map
        if type_val.as_object().map_or(false, |m| m.is_empty())
            && !options_map.contains_key("type")
        {
            let options = parse_field_options(path, &options_map)?;
            return Field::with_options(path, FieldKind::Mixed, options, &self.options);
        }

        let kind = match named_tag {
            Some(KindTag::String) => FieldKind::String,
            Some(KindTag::Number) => FieldKind::Number,
            Some(KindTag::Boolean) => FieldKind::Boolean,
            Some(KindTag::Date) => FieldKind::Date,
            Some(KindTag::Mixed) => FieldKind::Mixed,
            Some(KindTag::Array) => FieldKind::Array { caster: None },
            None => {
                let name = type_val
                    .as_str()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| type_val.to_string());
                return Err(SchemaError::UndefinedType {
                    name,
                    path: path.to_string(),
                });
            }
        };

        let options = parse_field_options(path, &options_map)?;
        Field::with_options(path, kind, options, &self.options)
    }

    /// Builds an array's element caster from its `cast` spec.
    fn build_caster(
        &self,
        path: &str,
        cast_spec: Option<JsonValue>,
    ) -> Result<Option<Caster>, SchemaError> {
        let spec = match cast_spec {
            None | Some(JsonValue::Null) => return Ok(None),
            Some(spec) => spec,
        };

        if let Some(map) = spec.as_object() {
            if is_nested_shape(map) {
                // a full nested shape makes this an array of sub-documents
                let sub = Form::with_registry(&spec, self.options.clone(), self.registry.clone())?;
                return Ok(Some(Caster::Form(Box::new(sub))));
            }
        }

        let inner = self.interpret_as_type(path, &spec)?;
        Ok(Some(Caster::Field(Box::new(inner))))
    }

    /// Inserts a leaf or virtual into the tree mirror, rejecting conflicting
    /// declarations in either direction.
    fn tree_insert(&mut self, path: &str, node: TreeNode) -> Result<(), SchemaError> {
        let segments: Vec<&str> = path.split('.').collect();
        let (last, parents) = match segments.split_last() {
            Some(parts) => parts,
            None => return Err(SchemaError::InvalidFieldSpec(path.to_string())),
        };

        let mut branch = &mut self.tree;
        let mut walked: Vec<&str> = Vec::new();
        for segment in parents.iter().copied() {
            walked.push(segment);
            let entry = branch
                .entry(segment.to_string())
                .or_insert_with(|| TreeNode::Branch(BTreeMap::new()));
            match entry {
                TreeNode::Branch(children) => branch = children,
                TreeNode::Leaf(kind) => {
                    return Err(SchemaError::NestedConflict {
                        path: path.to_string(),
                        parent: walked.join("."),
                        kind: *kind,
                    })
                }
                TreeNode::Virtual => {
                    return Err(SchemaError::VirtualConflict(path.to_string()))
                }
            }
        }

        match (branch.get(*last), &node) {
            (Some(TreeNode::Branch(_)), _) => {
                return Err(SchemaError::LeafConflict(path.to_string()))
            }
            (Some(TreeNode::Leaf(_)), TreeNode::Virtual) => {
                return Err(SchemaError::VirtualConflict(path.to_string()))
            }
            _ => {}
        }
        branch.insert(last.to_string(), node);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    /// Resolves a path to its field: exact match first, then positional
    /// resolution for index-bearing paths. Positional results are memoized.
    pub fn path(&self, path: &str) -> Option<Field> {
        if let Some(field) = self.paths.get(path) {
            return Some(field.clone());
        }
        if let Ok(memo) = self.subpaths.lock() {
            if let Some(hit) = memo.get(path) {
                return hit.clone();
            }
        }

        let tokens = path::parse(path);
        if !path::has_index(&tokens) {
            return None;
        }
        let resolved = self.resolve_positional(&tokens);
        if let Ok(mut memo) = self.subpaths.lock() {
            memo.insert(path.to_string(), resolved.clone());
        }
        resolved
    }

    /// Mutable access to an exactly-declared field, for post-hoc
    /// registration of validators, transforms, bounds or defaults.
    pub fn path_mut(&mut self, path: &str) -> Option<&mut Field> {
        self.clear_positional_memo();
        self.paths.get_mut(path)
    }

    /// Classifies a path for `set` dispatch.
    pub fn path_type(&self, path: &str) -> PathType {
        if self.paths.contains_key(path) {
            return PathType::Real;
        }
        if self.virtuals.contains_key(path) {
            return PathType::Virtual;
        }
        if self.nested.contains(path) {
            return PathType::Nested;
        }
        let tokens = path::parse(path);
        if path::has_index(&tokens) && self.path(path).is_some() {
            return PathType::Real;
        }
        PathType::AdhocOrUndefined
    }

    /// Walks an index-bearing path against the schema: the leading key run
    /// names the entry point, interior indices are skipped, interior keys
    /// descend through array-of-sub-form casters, and a trailing index
    /// resolves to an array's element caster.
    fn resolve_positional(&self, tokens: &[PathToken]) -> Option<Field> {
        let mut idx = 0;
        let mut head: Vec<&str> = Vec::new();
        while let Some(PathToken::Key(key)) = tokens.get(idx) {
            head.push(key);
            idx += 1;
        }
        if head.is_empty() {
            return None;
        }
        let mut current = self.paths.get(&head.join("."))?.clone();

        while idx < tokens.len() {
            match &tokens[idx] {
                PathToken::Index(_) => {
                    if idx + 1 == tokens.len() {
                        let inner = match current.kind() {
                            FieldKind::Array {
                                caster: Some(Caster::Field(inner)),
                            } => Some((**inner).clone()),
                            // a trailing index on an array of sub-documents
                            // addresses the array field itself
                            FieldKind::Array {
                                caster: Some(Caster::Form(_)),
                            } => None,
                            _ => return None,
                        };
                        return Some(inner.unwrap_or(current));
                    }
                    idx += 1;
                }
                PathToken::Key(_) => {
                    let mut run: Vec<&str> = Vec::new();
                    while let Some(PathToken::Key(key)) = tokens.get(idx) {
                        run.push(key);
                        idx += 1;
                    }
                    let next = match current.kind() {
                        FieldKind::Array {
                            caster: Some(Caster::Form(sub)),
                        } => sub.path(&run.join(".")),
                        _ => None,
                    }?;
                    current = next;
                }
            }
        }
        Some(current)
    }

    fn clear_positional_memo(&self) {
        if let Ok(mut memo) = self.subpaths.lock() {
            memo.clear();
        }
    }

    // ------------------------------------------------------------------
    // Data flow
    // ------------------------------------------------------------------

    /// Sets one path. Setters and the cast run for declared fields; a cast
    /// failure is recorded for the next validation sweep and the raw value
    /// is written through so consumers can re-render what was submitted.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> &mut Self {
        self.set_path(path, value.into(), false);
        self
    }

    /// Like `set`, but an object value on a nested path merges into the
    /// existing subtree instead of replacing it.
    pub fn merge(&mut self, path: &str, value: impl Into<Value>) -> &mut Self {
        self.set_path(path, value.into(), true);
        self
    }

    /// Sets a bag of path/value pairs, e.g. a merged request body. Object
    /// values recurse with an extended prefix unless the target is a
    /// virtual.
    pub fn set_object(&mut self, bag: &Value) -> &mut Self {
        self.set_bag(bag, "");
        self
    }

    /// Sets from another form's live data.
    pub fn set_form(&mut self, other: &Form) -> &mut Self {
        let data = other.data.clone();
        self.set_bag(&data, "");
        self
    }

    fn set_bag(&mut self, bag: &Value, prefix: &str) {
        let entries: Vec<(String, Value)> = match bag {
            Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            _ => return,
        };
        for (key, value) in entries {
            let full = if prefix.is_empty() {
                key
            } else {
                format!("{}.{}", prefix, key)
            };
            if matches!(value, Value::Object(_)) && self.path_type(&full) != PathType::Virtual {
                self.set_bag(&value, &full);
            } else {
                self.set_path(&full, value, false);
            }
        }
    }

    fn set_path(&mut self, path: &str, value: Value, merge: bool) {
        // nested path with an object value: clear the subtree, then merge
        if self.path_type(path) == PathType::Nested {
            if let Value::Object(_) = value {
                if !merge {
                    path::set(&mut self.data, &path::parse(path), Value::Null);
                }
                self.set_bag(&value, path);
                return;
            }
        }

        if let Some(virt) = self.virtuals.get(path).cloned() {
            virt.apply_setters(value, &mut self.data);
            return;
        }

        let tokens = path::parse(path);
        let field = match self.path(path) {
            Some(field) => field,
            None => {
                // undeclared path: the raw value is written verbatim
                path::set(&mut self.data, &tokens, value);
                return;
            }
        };

        if value.is_null() {
            path::set(&mut self.data, &tokens, value);
            return;
        }

        match field.apply_setters(value.clone()) {
            Ok(cast) => path::set(&mut self.data, &tokens, cast),
            Err(err) => {
                debug!(path = path, error = %err, "cast failed on set, recorded for validation");
                self.invalidate(path, err);
                path::set(&mut self.data, &tokens, value);
            }
        }
    }

    /// Reads a path through its getters.
    ///
    /// A declared field's absent value falls back to its default; absent
    /// intermediates yield `None`.
    pub fn get(&self, path: &str) -> Option<Value> {
        let tokens = path::parse(path);

        if let Some(virt) = self.virtuals.get(path) {
            let raw = path::get(&self.data, &tokens)
                .cloned()
                .unwrap_or(Value::Null);
            return Some(virt.apply_getters(raw, &self.data));
        }

        let field = self.path(path);
        let raw = path::get(&self.data, &tokens).cloned();
        let value = match raw {
            Some(value) => Some(value),
            None => match &field {
                Some(field) => match field.default_for(&self.data) {
                    Some(Ok(default)) => Some(default),
                    _ => None,
                },
                None => None,
            },
        };

        match (field, value) {
            (Some(field), Some(value)) => Some(field.apply_getters(value)),
            (_, value) => value,
        }
    }

    /// Raw read, no getters.
    pub fn get_value(&self, path: &str) -> Option<Value> {
        path::get(&self.data, &path::parse(path)).cloned()
    }

    /// Raw write, no setters, no cast.
    pub fn set_value(&mut self, path: &str, value: Value) -> &mut Self {
        path::set(&mut self.data, &path::parse(path), value);
        self
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    /// Validates every declared path and aggregates failures.
    ///
    /// The sweep is exhaustive: each path's validators run to completion and
    /// failures are collected per path, never short-circuiting across
    /// fields. Failures recorded earlier through `invalidate` (including
    /// cast failures from `set`) are folded into the same aggregate. A form
    /// with no declared paths resolves immediately.
    pub async fn validate(&mut self) -> Result<(), ValidationError> {
        let mut aggregate = self.pending.take();

        let jobs: Vec<(String, Option<Value>, Field)> = self
            .order
            .iter()
            .filter_map(|path| {
                self.paths
                    .get(path)
                    .map(|field| (path.clone(), self.get_value(path), field.clone()))
            })
            .collect();

        let results = future::join_all(jobs.into_iter().map(|(path, value, field)| async move {
            let outcome = field.do_validate(value.as_ref()).await;
            (path, outcome)
        }))
        .await;

        for (path, outcome) in results {
            if let Err(err) = outcome {
                aggregate
                    .get_or_insert_with(ValidationError::new)
                    .errors
                    .insert(path, FieldError::Validator(err));
            }
        }

        match aggregate {
            Some(aggregate) if !aggregate.is_empty() => Err(aggregate),
            _ => Ok(()),
        }
    }

    /// Records a failure for `path`, creating the aggregate lazily. The next
    /// `validate` folds it into its result.
    pub fn invalidate(&mut self, path: &str, err: impl Into<FieldError>) {
        self.pending
            .get_or_insert_with(ValidationError::new)
            .errors
            .insert(path.to_string(), err.into());
    }

    /// Records a bare-tag failure for `path`, with or without the offending
    /// value.
    pub fn invalidate_msg(&mut self, path: &str, tag: &str, value: Option<Value>) {
        let err = ValidatorError::with_value(path, tag, value);
        self.invalidate(path, FieldError::Validator(err));
    }

    // ------------------------------------------------------------------
    // Export
    // ------------------------------------------------------------------

    /// Builds the presentation tree: for every declared path a
    /// `{ value, data }` node nested by path segments, plus `error` when the
    /// given aggregate holds that path.
    ///
    /// When the schema options map the validator tag to a message template,
    /// the template is rendered against `{ data: <exported field options> }`;
    /// otherwise the error's own message is used.
    pub fn export(&self, err: Option<&ValidationError>) -> JsonValue {
        let mut result = JsonValue::Object(Map::new());

        for path in &self.order {
            let field = match self.paths.get(path) {
                Some(field) => field,
                None => continue,
            };
            let data = field.export();

            let mut node = Map::new();
            node.insert(
                "value".to_string(),
                self.get(path).map(|v| v.to_json()).unwrap_or(JsonValue::Null),
            );
            node.insert("data".to_string(), data.clone());

            if let Some(field_err) = err.and_then(|aggregate| aggregate.get(path)) {
                let message = field_err
                    .tag()
                    .and_then(|tag| self.options.errors.get(tag))
                    .map(|template| render_template(template, &json!({ "data": data })))
                    .unwrap_or_else(|| field_err.to_string());
                node.insert("error".to_string(), JsonValue::String(message));
            }

            set_json(&mut result, &path::parse(path), JsonValue::Object(node));
        }

        result
    }

    // ------------------------------------------------------------------
    // Virtuals
    // ------------------------------------------------------------------

    /// Declares (or returns) a virtual at `name`, creating intermediate tree
    /// nodes along the walk.
    pub fn virtual_path(&mut self, name: &str) -> Result<&mut VirtualField, SchemaError> {
        if self.paths.contains_key(name) {
            return Err(SchemaError::VirtualConflict(name.to_string()));
        }
        if !self.virtuals.contains_key(name) {
            self.tree_insert(name, TreeNode::Virtual)?;
        }
        Ok(self
            .virtuals
            .entry(name.to_string())
            .or_insert_with(|| VirtualField::new(name)))
    }

    /// The virtual declared at `name`, if any.
    pub fn virtual_field(&self, name: &str) -> Option<&VirtualField> {
        self.virtuals.get(name)
    }

    // ------------------------------------------------------------------
    // Array-of-sub-form support
    // ------------------------------------------------------------------

    /// Casts one array element through this form's declared sub-paths:
    /// present values run setters and cast, absent values take their
    /// defaults.
    pub(crate) fn cast_document(&self, value: Value) -> Result<Value, CastError> {
        let mut doc = match value {
            Value::Object(_) => value,
            other => return Err(CastError::new("object", &other, "")),
        };

        for path in &self.order {
            let field = match self.paths.get(path) {
                Some(field) => field,
                None => continue,
            };
            let tokens = path::parse(path);
            match path::get(&doc, &tokens).cloned() {
                Some(raw) => {
                    let cast = field.apply_setters(raw)?;
                    path::set(&mut doc, &tokens, cast);
                }
                None => {
                    if let Some(default) = field.default_for(&doc) {
                        let default = default?;
                        if !default.is_null() {
                            path::set(&mut doc, &tokens, default);
                        }
                    }
                }
            }
        }
        Ok(doc)
    }
}

impl Clone for Form {
    fn clone(&self) -> Self {
        Self {
            options: self.options.clone(),
            registry: self.registry.clone(),
            paths: self.paths.clone(),
            order: self.order.clone(),
            tree: self.tree.clone(),
            nested: self.nested.clone(),
            subpaths: Mutex::new(HashMap::new()),
            virtuals: self.virtuals.clone(),
            data: self.data.clone(),
            pending: self.pending.clone(),
        }
    }
}

impl fmt::Debug for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Form")
            .field("paths", &self.order)
            .field("nested", &self.nested)
            .field("virtuals", &self.virtuals.keys().collect::<Vec<_>>())
            .field("data", &self.data)
            .finish()
    }
}

fn normalize_spec(spec: &JsonValue) -> (JsonValue, Map<String, JsonValue>) {
    match spec {
        JsonValue::Object(map) => {
            let type_val = match map.get("type") {
                Some(t) if !t.as_object().map_or(false, |tm| tm.contains_key("type")) => t.clone(),
                _ => JsonValue::Object(Map::new()),
            };
            (type_val, map.clone())
        }
        other => (other.clone(), Map::new()),
    }
}

fn is_nested_shape(map: &Map<String, JsonValue>) -> bool {
    if map.is_empty() {
        return false;
    }
    match map.get("type") {
        None => true,
        Some(t) => t.as_object().map_or(false, |tm| tm.contains_key("type")),
    }
}

fn parse_field_options(
    path: &str,
    map: &Map<String, JsonValue>,
) -> Result<FieldOptions, SchemaError> {
    let mut map = map.clone();
    map.remove("type");
    map.remove("cast");
    serde_json::from_value(JsonValue::Object(map)).map_err(|err| SchemaError::InvalidOptions {
        path: path.to_string(),
        message: err.to_string(),
    })
}

/// Nests a node into the export tree by path tokens.
fn set_json(target: &mut JsonValue, tokens: &[PathToken], value: JsonValue) {
    match tokens.split_first() {
        None => *target = value,
        Some((PathToken::Key(key), rest)) => {
            if !target.is_object() {
                *target = JsonValue::Object(Map::new());
            }
            if let Some(map) = target.as_object_mut() {
                set_json(map.entry(key.clone()).or_insert(JsonValue::Null), rest, value);
            }
        }
        Some((PathToken::Index(index), rest)) => {
            if !target.is_array() {
                *target = JsonValue::Array(Vec::new());
            }
            if let Some(items) = target.as_array_mut() {
                if items.len() <= *index {
                    items.resize(index + 1, JsonValue::Null);
                }
                set_json(&mut items[*index], rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape() -> JsonValue {
        json!({
            "name": { "type": "string", "required": true },
            "age": { "type": "number", "min": 18 },
            "tags": { "type": "array", "cast": "string" },
            "profile": {
                "city": "string",
                "zip": "string"
            }
        })
    }

    #[test]
    fn test_compiles_flat_paths_and_nested_prefixes() {
        let form = Form::new(&shape()).unwrap();
        assert!(form.path("name").is_some());
        assert!(form.path("profile.city").is_some());
        assert_eq!(form.path_type("profile"), PathType::Nested);
        assert_eq!(form.path_type("name"), PathType::Real);
        assert_eq!(form.path_type("unknown"), PathType::AdhocOrUndefined);
    }

    #[test]
    fn test_shorthand_declarations() {
        let form = Form::new(&json!({
            "a": "string",
            "b": { "type": "number" },
            "c": ["string"],
            "d": {}
        }))
        .unwrap();
        assert_eq!(form.path("a").unwrap().kind().type_name(), "string");
        assert_eq!(form.path("b").unwrap().kind().type_name(), "number");
        assert_eq!(form.path("c").unwrap().kind().type_name(), "array");
        assert_eq!(form.path("d").unwrap().kind().type_name(), "mixed");
    }

    #[test]
    fn test_field_named_type_declares_nested_path() {
        // { meta: { type: { type: "string" } } } declares meta.type
        let form = Form::new(&json!({
            "meta": { "type": { "type": "string" } }
        }))
        .unwrap();
        assert!(form.path("meta.type").is_some());
        assert_eq!(form.path_type("meta"), PathType::Nested);
    }

    #[test]
    fn test_undefined_type_name_fails_construction() {
        let err = Form::new(&json!({ "x": "wibble" })).unwrap_err();
        match err {
            SchemaError::UndefinedType { name, path } => {
                assert_eq!(name, "wibble");
                assert_eq!(path, "x");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_null_field_spec_fails_construction() {
        let err = Form::new(&json!({ "x": null })).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidFieldSpec(path) if path == "x"));
    }

    #[test]
    fn test_leaf_under_leaf_conflicts() {
        let mut form = Form::new(&json!({ "name": "string" })).unwrap();
        let err = form.declare("name.first", &json!("string")).unwrap_err();
        assert!(matches!(err, SchemaError::NestedConflict { .. }));
    }

    #[test]
    fn test_leaf_over_nested_container_conflicts() {
        let mut form = Form::new(&json!({ "profile": { "city": "string" } })).unwrap();
        let err = form.declare("profile", &json!("string")).unwrap_err();
        assert!(matches!(err, SchemaError::LeafConflict(_)));
    }

    #[test]
    fn test_positional_resolution_to_array_caster() {
        let form = Form::new(&shape()).unwrap();
        let caster = form.path("tags.0").unwrap();
        assert_eq!(caster.kind().type_name(), "string");
        assert_eq!(form.path_type("tags.2"), PathType::Real);
        // memoized
        assert!(form.path("tags.0").is_some());
    }

    #[test]
    fn test_positional_resolution_through_sub_forms() {
        let form = Form::new(&json!({
            "children": { "type": "array", "cast": { "name": "string", "born": "date" } }
        }))
        .unwrap();

        let name = form.path("children.0.name").unwrap();
        assert_eq!(name.kind().type_name(), "string");
        assert_eq!(form.path_type("children.3.born"), PathType::Real);
        assert!(form.path("children.0.missing").is_none());
    }

    #[test]
    fn test_indexing_into_a_scalar_resolves_nothing() {
        let form = Form::new(&shape()).unwrap();
        assert!(form.path("name.0").is_none());
        assert_eq!(form.path_type("name.0"), PathType::AdhocOrUndefined);
    }

    #[test]
    fn test_required_paths_in_declaration_order() {
        let form = Form::new(&json!({
            "a": { "type": "string", "required": true },
            "b": "string",
            "c": { "type": "number", "required": true }
        }))
        .unwrap();
        assert_eq!(form.required_paths(), vec!["a", "c"]);
    }

    #[test]
    fn test_array_defaults_are_instance_independent() {
        let shape = json!({ "tags": { "type": "array", "cast": "string" } });
        let template = Form::new(&shape).unwrap();

        let mut first = template.clone();
        let second = template.clone();

        first.set("tags", Value::Array(vec![Value::from("x")]));
        assert_eq!(
            first.get("tags"),
            Some(Value::Array(vec![Value::from("x")]))
        );
        assert_eq!(second.get("tags"), Some(Value::Array(vec![])));
    }
}
