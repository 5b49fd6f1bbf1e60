//! Fragment resolver.
//!
//! Finds every fragment-spread token in a query, pulls the referenced
//! definitions (and their own dependencies) out of the registry, rewrites
//! the spreads to normalized names and appends the definitions after the
//! query body.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::error::{ComposeError, ComposeResult};
use crate::flatten::normalize_path;
use crate::fragments::FragmentRegistry;

/// `...path.to.fragment`, whitespace after the dots tolerated.
fn spread_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\.\.\.\s*([A-Za-z0-9._]+)").unwrap())
}

/// Resolves every spread in `query` against `registry`.
///
/// Returns the rewritten query followed by the collected definitions,
/// dependencies ahead of dependents, deduplicated in first-seen order.
/// GraphQL itself does not care about fragment order; it is preserved for
/// determinism.
pub fn resolve_fragments(query: &str, registry: &FragmentRegistry) -> ComposeResult<String> {
    let mut collected: Vec<String> = Vec::new();
    collect(query, registry, &mut Vec::new(), &mut collected)?;

    let rewritten = rewrite_spreads(query);

    let mut parts: Vec<&str> = vec![&rewritten];
    for definition in &collected {
        // first-seen dedup, and skip definitions the caller inlined by hand
        if parts.contains(&definition.as_str()) || rewritten.contains(definition.as_str()) {
            continue;
        }
        parts.push(definition);
    }
    Ok(parts.join("\n"))
}

fn collect(
    text: &str,
    registry: &FragmentRegistry,
    stack: &mut Vec<String>,
    out: &mut Vec<String>,
) -> ComposeResult<()> {
    for caps in spread_pattern().captures_iter(text) {
        let path = &caps[1];
        // `... on Type` is an inline spread, not a fragment reference
        if path == "on" {
            continue;
        }
        let name = normalize_path(path);
        let definition = registry
            .get(path)
            .ok_or_else(|| ComposeError::FragmentNotFound(path.to_string()))?
            .to_string();
        if stack.contains(&name) {
            return Err(ComposeError::RecursiveFragment(path.to_string()));
        }
        stack.push(name);
        // a definition's own spreads land ahead of the definition itself
        collect(&definition, registry, stack, out)?;
        stack.pop();
        out.push(definition);
    }
    Ok(())
}

/// Rewrites `...a.b.c` to `... a_b_c` so spreads match the appended
/// definition names.
fn rewrite_spreads(query: &str) -> String {
    spread_pattern()
        .replace_all(query, |caps: &Captures<'_>| {
            format!("... {}", normalize_path(&caps[1]))
        })
        .into_owned()
}
