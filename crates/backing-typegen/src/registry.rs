//! Raw backing type expressions for schema types that need no import.
//!
//! Built-in scalars map to TypeScript primitives. A config's
//! `backing_type_map` is layered on top and may override any of them or map
//! custom scalars such as `DateTime` to `Date`.

use std::collections::HashMap;

use crate::config::TypegenConfig;

/// Schema type name -> raw TypeScript type expression.
///
/// # Built-in mappings
///
/// | Schema type | Backing type |
/// |-------------|--------------|
/// | `String` | `string` |
/// | `ID` | `string` |
/// | `Int` | `number` |
/// | `Float` | `number` |
/// | `Boolean` | `boolean` |
///
/// # Custom mappings
///
/// ```
/// use backing_typegen::BackingTypeMap;
///
/// let mut map = BackingTypeMap::with_builtins();
/// map.register("DateTime", "Date");
/// assert_eq!(map.get("DateTime"), Some("Date"));
/// assert_eq!(map.get("Int"), Some("number"));
/// ```
#[derive(Debug, Clone)]
pub struct BackingTypeMap {
    mappings: HashMap<String, String>,
}

impl BackingTypeMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self {
            mappings: HashMap::new(),
        }
    }

    /// Create a map pre-populated with the built-in scalar mappings.
    pub fn with_builtins() -> Self {
        let mut map = Self::new();
        map.register_builtins();
        map
    }

    /// Built-in scalars plus the config's `backing_type_map`.
    pub fn from_config(config: &TypegenConfig) -> Self {
        let mut map = Self::with_builtins();
        for (type_name, expr) in &config.backing_type_map {
            map.register(type_name.clone(), expr.clone());
        }
        map
    }

    /// Register the built-in scalar mappings.
    pub fn register_builtins(&mut self) {
        self.register("String", "string");
        self.register("ID", "string");
        self.register("Int", "number");
        self.register("Float", "number");
        self.register("Boolean", "boolean");
    }

    /// Map a schema type to a raw expression, replacing any existing mapping.
    pub fn register(&mut self, type_name: impl Into<String>, expr: impl Into<String>) {
        self.mappings.insert(type_name.into(), expr.into());
    }

    pub fn get(&self, type_name: &str) -> Option<&str> {
        self.mappings.get(type_name).map(String::as_str)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.mappings.contains_key(type_name)
    }

    /// Remove a mapping.
    pub fn unregister(&mut self, type_name: &str) -> Option<String> {
        self.mappings.remove(type_name)
    }
}

impl Default for BackingTypeMap {
    fn default() -> Self {
        Self::with_builtins()
    }
}
