//! Variable-type auto-declaration.
//!
//! Rewrites the `(@autodeclare)` marker into a GraphQL variable-declaration
//! clause inferred from the runtime variable bag. `(@autotype)` is the
//! older spelling of the same marker and is treated as a synonym.

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{ComposeError, ComposeResult};

/// A variable bag.
///
/// Keys may carry a `!Type` override suffix (`"id!ID"`); the annotation is
/// stripped by [`clean_keys`] before the bag goes on the wire. Insertion
/// order is preserved so declaration output is deterministic.
pub type Variables = IndexMap<String, Value>;

/// The two historical marker spellings, treated as synonyms.
pub const AUTODECLARE_MARKERS: [&str; 2] = ["(@autodeclare)", "(@autotype)"];

/// A variable name with its resolved wire type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedType {
    pub name: String,
    pub gql_type: String,
}

/// Resolves the wire type for a possibly-annotated variable key.
///
/// A non-empty `!Type` suffix always wins. Otherwise the type follows the
/// value's kind: string -> `String`, boolean -> `Boolean`, integral number
/// -> `Int`, fractional number -> `Float`. A key whose name ends in `id`
/// (any casing) and carries no annotation at all resolves to `ID`. Null,
/// arrays and objects have no scalar mapping and fail.
pub fn find_type(key_definition: &str, value: &Value) -> ComposeResult<DetectedType> {
    let (name, annotation) = match key_definition.split_once('!') {
        Some((name, annotation)) => (name, Some(annotation)),
        None => (key_definition, None),
    };

    if let Some(forced) = annotation.filter(|forced| !forced.is_empty()) {
        return Ok(DetectedType {
            name: name.to_string(),
            gql_type: forced.to_string(),
        });
    }

    let inferred = scalar_type(value).ok_or_else(|| ComposeError::UnsupportedType {
        key: name.to_string(),
        kind: json_kind(value).to_string(),
    })?;

    // an empty annotation ("user_id!") opts out of ID inference
    let gql_type = if annotation.is_none() && ends_with_id(name) {
        "ID".to_string()
    } else {
        inferred
    };
    Ok(DetectedType {
        name: name.to_string(),
        gql_type,
    })
}

/// Replaces the first auto-declare marker with a parenthesized declaration
/// list built from `variables`, or with nothing when the bag is empty.
/// Every declared type is non-null. Queries without a marker pass through
/// unchanged.
pub fn auto_declare(query: &str, variables: &Variables) -> ComposeResult<String> {
    let marker = match find_marker(query) {
        Some(marker) => marker,
        None => return Ok(query.to_string()),
    };

    if variables.is_empty() {
        return Ok(query.replacen(marker, "", 1));
    }

    let mut declarations = Vec::with_capacity(variables.len());
    for (key, value) in variables {
        let detected = find_type(key, value)?;
        declarations.push(format!("${}: {}!", detected.name, detected.gql_type));
    }
    let clause = format!("({})", declarations.join(", "));
    Ok(query.replacen(marker, &clause, 1))
}

/// Strips `!Type` annotations from every key. Idempotent: cleaning an
/// already-clean bag is a no-op.
pub fn clean_keys(variables: &Variables) -> Variables {
    variables
        .iter()
        .map(|(key, value)| {
            let name = match key.split_once('!') {
                Some((name, _)) => name,
                None => key.as_str(),
            };
            (name.to_string(), value.clone())
        })
        .collect()
}

/// The earliest marker occurrence, either spelling.
fn find_marker(query: &str) -> Option<&'static str> {
    AUTODECLARE_MARKERS
        .iter()
        .filter_map(|marker| query.find(marker).map(|position| (position, *marker)))
        .min_by_key(|(position, _)| *position)
        .map(|(_, marker)| marker)
}

fn scalar_type(value: &Value) -> Option<String> {
    let scalar = match value {
        Value::String(_) => "String".to_string(),
        Value::Bool(_) => "Boolean".to_string(),
        Value::Number(number) => {
            let integral = number.is_i64()
                || number.is_u64()
                || number.as_f64().is_some_and(|float| float.fract() == 0.0);
            if integral {
                "Int".to_string()
            } else {
                "Float".to_string()
            }
        }
        _ => return None,
    };
    Some(scalar)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Mirrors the `/_?id$/i` naming convention: the key's last two characters
/// spell `id` in any casing.
fn ends_with_id(name: &str) -> bool {
    name.len() >= 2
        && name.is_char_boundary(name.len() - 2)
        && name[name.len() - 2..].eq_ignore_ascii_case("id")
}
