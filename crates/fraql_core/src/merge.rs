//! Merged-query construction.
//!
//! Several buffered operations can go out as one network call: each is
//! rewritten under a namespace alias (fields and variables alike), the
//! rewritten bodies are glued into a single auto-declared operation, and
//! the variable bags are united under prefixed keys. Rewriting is
//! idempotent at the document level because every alias is unique.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::declare::{Variables, AUTODECLARE_MARKERS};
use crate::query::OperationKind;

/// A buffered operation waiting for `commit`.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOperation {
    /// Namespace prefix for this operation's fields and variables.
    pub alias: String,
    /// The raw operation text as handed to `query`/`mutate`/`subscribe`.
    pub query: String,
    /// The caller's variable bag, not yet prefixed.
    pub variables: Variables,
}

/// Combines buffered operations into one auto-declared document plus the
/// union of their prefixed variable bags.
///
/// The merged document still carries its `(@autodeclare)` marker and any
/// fragment spreads; it is meant to flow through the normal assembler.
pub fn merge_operations(operations: &[PendingOperation]) -> (String, Variables) {
    let mut bodies = Vec::with_capacity(operations.len());
    let mut variables = Variables::new();
    let mut keyword = OperationKind::default().keyword();

    for (index, operation) in operations.iter().enumerate() {
        let (kind, body) = strip_operation(&operation.query);
        if index == 0 {
            if let Some(kind) = kind {
                keyword = kind.keyword();
            }
        }
        let body = prefix_variables(body.trim(), &operation.alias);
        bodies.push(alias_head_field(&body, &operation.alias));

        for (key, value) in &operation.variables {
            variables.insert(prefix_variable_key(key, &operation.alias), value.clone());
        }
    }

    let document = format!("{} (@autodeclare) {{\n{}\n }}", keyword, bodies.join("\n"));
    (document, variables)
}

/// Strips the operation keyword, any auto-declare marker and the outer
/// braces, leaving the bare selection set.
fn strip_operation(query: &str) -> (Option<OperationKind>, &str) {
    let mut rest = query.trim();
    let mut kind = None;

    for candidate in [
        OperationKind::Query,
        OperationKind::Mutation,
        OperationKind::Subscription,
    ] {
        if let Some(after) = rest.strip_prefix(candidate.keyword()) {
            if after.starts_with(|c: char| c.is_whitespace() || c == '(' || c == '{') {
                kind = Some(candidate);
                rest = after.trim_start();
                break;
            }
        }
    }

    for marker in AUTODECLARE_MARKERS {
        if let Some(after) = rest.strip_prefix(marker) {
            rest = after.trim_start();
            break;
        }
    }

    if let Some(inner) = rest.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
        rest = inner;
    }
    (kind, rest)
}

fn variable_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$([A-Za-z0-9_]+)").unwrap())
}

/// `$id` -> `$<alias>__id`.
fn prefix_variables(body: &str, alias: &str) -> String {
    variable_pattern()
        .replace_all(body, |caps: &Captures<'_>| {
            format!("${}__{}", alias, &caps[1])
        })
        .into_owned()
}

fn head_field_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)(\s*:)?").unwrap())
}

/// Namespaces the leading field under the alias, introducing a field alias
/// when the selection does not already carry one.
fn alias_head_field(body: &str, alias: &str) -> String {
    head_field_pattern()
        .replace(body, |caps: &Captures<'_>| match caps.get(2) {
            Some(colon) => format!("{}_{}{}", alias, &caps[1], colon.as_str()),
            None => format!("{}_{}:{}", alias, &caps[1], &caps[1]),
        })
        .into_owned()
}

/// Prefixes the name part of a variable key, keeping any `!Type` suffix.
fn prefix_variable_key(key: &str, alias: &str) -> String {
    match key.split_once('!') {
        Some((name, annotation)) => format!("{}__{}!{}", alias, name, annotation),
        None => format!("{}__{}", alias, key),
    }
}
