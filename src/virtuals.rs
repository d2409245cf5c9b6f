//! Virtual fields
//!
//! A virtual is a computed, non-stored field addressed like a real path but
//! backed only by getter and setter chains. Getters are document-scoped:
//! they see the live data container. Setters may write through to it.

use std::fmt;
use std::sync::Arc;

use crate::value::Value;

type VirtualGetter = Arc<dyn Fn(Value, &Value) -> Value + Send + Sync>;
type VirtualSetter = Arc<dyn Fn(Value, &mut Value) -> Value + Send + Sync>;

/// Computed field declared through `Form::virtual_path`.
#[derive(Clone)]
pub struct VirtualField {
    path: String,
    getters: Vec<VirtualGetter>,
    setters: Vec<VirtualSetter>,
}

impl VirtualField {
    pub(crate) fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            getters: Vec::new(),
            setters: Vec::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Appends a getter receiving the value so far and the live document.
    /// Getters run in reverse declaration order.
    pub fn getter(
        &mut self,
        transform: impl Fn(Value, &Value) -> Value + Send + Sync + 'static,
    ) -> &mut Self {
        self.getters.push(Arc::new(transform));
        self
    }

    /// Appends a setter receiving the incoming value and the live document;
    /// the returned value feeds the next setter. Setters run in reverse
    /// declaration order.
    pub fn setter(
        &mut self,
        transform: impl Fn(Value, &mut Value) -> Value + Send + Sync + 'static,
    ) -> &mut Self {
        self.setters.push(Arc::new(transform));
        self
    }

    pub(crate) fn apply_getters(&self, value: Value, doc: &Value) -> Value {
        let mut current = value;
        for getter in self.getters.iter().rev() {
            current = getter(current, doc);
        }
        current
    }

    pub(crate) fn apply_setters(&self, value: Value, doc: &mut Value) -> Value {
        let mut current = value;
        for setter in self.setters.iter().rev() {
            current = setter(current, doc);
        }
        current
    }
}

impl fmt::Debug for VirtualField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualField")
            .field("path", &self.path)
            .field("getters", &self.getters.len())
            .field("setters", &self.setters.len())
            .finish()
    }
}
