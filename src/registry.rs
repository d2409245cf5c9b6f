//! Field type registry
//!
//! An explicitly-scoped lookup table from declared type names to kind tags.
//! Each form owns its registry; nothing is resolved through ambient global
//! state, and resolution happens once at schema-compile time.

use std::collections::HashMap;

/// Tag for one of the built-in field kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindTag {
    String,
    Number,
    Boolean,
    Date,
    Array,
    Mixed,
}

/// Name to kind-tag lookup table. Names are case-insensitive.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: HashMap<String, KindTag>,
}

impl TypeRegistry {
    /// The built-in names: `string`, `number`, `boolean` (alias `bool`),
    /// `date`, `array`, `mixed`.
    pub fn builtin() -> Self {
        let mut types = HashMap::new();
        for (name, tag) in [
            ("string", KindTag::String),
            ("number", KindTag::Number),
            ("boolean", KindTag::Boolean),
            ("bool", KindTag::Boolean),
            ("date", KindTag::Date),
            ("array", KindTag::Array),
            ("mixed", KindTag::Mixed),
        ] {
            types.insert(name.to_string(), tag);
        }
        Self { types }
    }

    /// Registers an extra name for a kind, e.g. an alias used by a legacy
    /// shape definition.
    pub fn register(&mut self, name: impl Into<String>, tag: KindTag) -> &mut Self {
        self.types.insert(name.into().to_ascii_lowercase(), tag);
        self
    }

    pub fn lookup(&self, name: &str) -> Option<KindTag> {
        self.types.get(&name.to_ascii_lowercase()).copied()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
