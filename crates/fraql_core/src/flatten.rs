//! Namespace flattener.
//!
//! Converts a nested fragment-definition tree into a flat mapping keyed by
//! the joined path name: `{a: {b: {c: 1}}}` becomes `{"a_b_c": 1}`.

use indexmap::IndexMap;
use serde_json::Value;

/// Separator used when joining path segments: `auth.login` -> `auth_login`.
pub const PATH_SEPARATOR: &str = "_";

/// Replaces the dots of a fragment path with [`PATH_SEPARATOR`].
pub fn normalize_path(path: &str) -> String {
    path.replace('.', PATH_SEPARATOR)
}

/// Flattens a nested tree into `joined_path -> leaf` entries.
///
/// Objects and arrays are internal nodes (an array contributes the element
/// index as a path segment); strings, numbers and booleans are leaves.
/// `null` entries flatten to nothing and are dropped. Nesting depth is
/// unbounded; the input is a tree, so no cycle handling is needed.
pub fn flatten(tree: &Value) -> IndexMap<String, Value> {
    let mut out = IndexMap::new();
    flatten_into(tree, "", &mut out);
    out
}

fn flatten_into(node: &Value, prefix: &str, out: &mut IndexMap<String, Value>) {
    match node {
        Value::Object(fields) => {
            for (name, child) in fields {
                insert_child(child, prefix, name, out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                insert_child(child, prefix, &index.to_string(), out);
            }
        }
        _ => {}
    }
}

fn insert_child(child: &Value, prefix: &str, name: &str, out: &mut IndexMap<String, Value>) {
    match child {
        Value::Object(_) | Value::Array(_) => {
            flatten_into(child, &format!("{}{}{}", prefix, name, PATH_SEPARATOR), out);
        }
        Value::Null => {}
        leaf => {
            out.insert(format!("{}{}", prefix, name), leaf.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn leaves_pass_through_unchanged() {
        assert_eq!(flatten(&json!({"a": 1})), IndexMap::from([("a".to_string(), json!(1))]));
        assert_eq!(
            flatten(&json!({"a_b_c": 1})),
            IndexMap::from([("a_b_c".to_string(), json!(1))])
        );
    }

    #[test]
    fn nested_paths_join_with_separator() {
        assert_eq!(
            flatten(&json!({"a": {"b": {"c": 1}}})),
            IndexMap::from([("a_b_c".to_string(), json!(1))])
        );
        assert_eq!(
            flatten(&json!({"a": {"b": {"c": 1}}, "d": {"e": {"f": 2}}})),
            IndexMap::from([
                ("a_b_c".to_string(), json!(1)),
                ("d_e_f".to_string(), json!(2)),
            ])
        );
    }

    #[test]
    fn deep_trees_and_arrays_flatten() {
        let tree = json!({
            "a": {
                "b": {
                    "c": {
                        "g": {"h": 1, "j": 2},
                        "l": {"m": [3], "n": 4}
                    }
                }
            },
            "d": {"e": {"f": 5}}
        });
        assert_eq!(
            flatten(&tree),
            IndexMap::from([
                ("a_b_c_g_h".to_string(), json!(1)),
                ("a_b_c_g_j".to_string(), json!(2)),
                ("a_b_c_l_m_0".to_string(), json!(3)),
                ("a_b_c_l_n".to_string(), json!(4)),
                ("d_e_f".to_string(), json!(5)),
            ])
        );
    }

    #[test]
    fn null_leaves_are_dropped() {
        assert_eq!(flatten(&json!({"a": null, "b": {"c": null}})), IndexMap::<String, Value>::new());
    }

    #[test]
    fn normalize_replaces_every_dot() {
        assert_eq!(normalize_path("a.b.c"), "a_b_c");
        assert_eq!(normalize_path("plain"), "plain");
    }
}
