//! Query assembler.
//!
//! Order is fixed and significant: fragments resolve first, types declare
//! second. Declaring first would miss variable usages introduced by
//! fragments, and resolving afterwards could leave the marker inside
//! appended fragment text.

use crate::declare::{auto_declare, Variables};
use crate::error::ComposeResult;
use crate::fragments::FragmentRegistry;
use crate::resolve::resolve_fragments;

/// The three GraphQL operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationKind {
    #[default]
    Query,
    Mutation,
    Subscription,
}

impl OperationKind {
    pub const fn keyword(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Subscription => "subscription",
        }
    }
}

/// Builds the final request document from raw operation text.
pub fn build_query(
    query: &str,
    variables: &Variables,
    registry: &FragmentRegistry,
) -> ComposeResult<String> {
    let resolved = resolve_fragments(query, registry)?;
    auto_declare(&resolved, variables)
}

/// Prepends the operation keyword to a bare body, optionally wrapping it
/// with an auto-declare parameter list.
pub fn with_operation(kind: OperationKind, body: &str, declare: bool) -> String {
    if declare {
        format!("{} (@autodeclare) {{ {} }}", kind.keyword(), body)
    } else {
        format!("{} {} ", kind.keyword(), body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_fragments_before_declaring() {
        let registry = FragmentRegistry::new(json!({"user": "on User {name}"})).unwrap();
        let variables = Variables::from([("id".to_string(), json!(7))]);

        let doc = build_query(
            "query (@autodeclare) { x(id: $id) { ...user } }",
            &variables,
            &registry,
        )
        .unwrap();

        assert_eq!(
            doc,
            "query ($id: ID!) { x(id: $id) { ... user } }\n\nfragment user on User {name}"
        );
    }

    #[test]
    fn keyword_prefixes() {
        assert_eq!(
            with_operation(OperationKind::Query, "{ x }", false),
            "query { x } "
        );
        assert_eq!(
            with_operation(OperationKind::Mutation, "createUser { id }", true),
            "mutation (@autodeclare) { createUser { id } }"
        );
        assert_eq!(OperationKind::Subscription.keyword(), "subscription");
    }
}
