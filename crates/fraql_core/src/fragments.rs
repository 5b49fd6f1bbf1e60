//! Fragment registry.
//!
//! Owns the flattened fragment definitions and supports incremental
//! registration: new trees deep-merge into the stored tree and the flat
//! map is rebuilt wholesale, never patched in place.

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{ComposeError, ComposeResult};
use crate::flatten::{flatten, normalize_path};

/// Flat mapping from normalized fragment name to its definition text.
pub type FragmentMap = IndexMap<String, String>;

/// Registered fragments, flat and ready for resolution.
///
/// Definitions are stored as `"\nfragment <name> <body>"`. Normalized names
/// that collide overwrite silently: last registered wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FragmentRegistry {
    tree: Value,
    flat: FragmentMap,
}

impl FragmentRegistry {
    /// Builds a registry from a nested fragment tree.
    pub fn new(tree: Value) -> ComposeResult<Self> {
        let flat = build_fragments(&tree)?;
        Ok(Self { tree, flat })
    }

    /// Deep-merges `tree` into the registered fragments and rebuilds.
    ///
    /// New leaves override colliding paths; objects merge key-by-key, so
    /// fragments not touched by `tree` survive unchanged.
    pub fn register(&mut self, tree: Value) -> ComposeResult<()> {
        let merged = deep_merge(self.tree.take(), tree);
        self.flat = build_fragments(&merged)?;
        self.tree = merged;
        Ok(())
    }

    /// Looks up a definition by dotted path (or already-normalized name).
    pub fn get(&self, path: &str) -> Option<&str> {
        self.flat.get(&normalize_path(path)).map(String::as_str)
    }

    /// Returns the trimmed definition text for a dotted path.
    pub fn definition(&self, path: &str) -> ComposeResult<&str> {
        self.get(path)
            .map(str::trim)
            .ok_or_else(|| ComposeError::FragmentNotFound(path.to_string()))
    }

    /// The flat `name -> definition` view.
    pub fn fragments(&self) -> &FragmentMap {
        &self.flat
    }

    /// True when no fragment is registered.
    pub fn is_empty(&self) -> bool {
        self.flat.is_empty()
    }
}

/// Flattens `tree` and wraps every leaf `v` named `n` as `"\nfragment n v"`.
///
/// A leaf must be a string starting with a type condition; anything else is
/// rejected here, at registration time, not at use time.
fn build_fragments(tree: &Value) -> ComposeResult<FragmentMap> {
    let mut out = FragmentMap::new();
    for (name, leaf) in flatten(tree) {
        let body = leaf
            .as_str()
            .filter(|body| has_type_condition(body))
            .ok_or_else(|| ComposeError::FragmentFormat(name.clone()))?;
        let definition = format!("\nfragment {} {}", name, body);
        out.insert(name, definition);
    }
    Ok(out)
}

/// `on <TypeName>`: the `on` keyword, whitespace, then a name.
fn has_type_condition(body: &str) -> bool {
    match body.strip_prefix("on") {
        Some(rest) => {
            rest.starts_with(char::is_whitespace)
                && rest
                    .trim_start()
                    .starts_with(|c: char| c.is_alphanumeric() || c == '_')
        }
        None => false,
    }
}

/// Recursive merge: objects combine key-by-key, any other pairing is
/// replaced by the incoming value.
fn deep_merge(base: Value, incoming: Value) -> Value {
    match (base, incoming) {
        (Value::Object(mut base_fields), Value::Object(incoming_fields)) => {
            for (key, value) in incoming_fields {
                let merged = match base_fields.get_mut(&key) {
                    Some(existing) => deep_merge(existing.take(), value),
                    None => value,
                };
                base_fields.insert(key, merged);
            }
            Value::Object(base_fields)
        }
        (_, incoming) => incoming,
    }
}
