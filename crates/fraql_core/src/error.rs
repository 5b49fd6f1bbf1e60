//! Composition-time error taxonomy.

use thiserror::Error;

/// Errors raised while composing a request document.
///
/// These are programmer errors in query or fragment authoring: they are
/// never retried and surface synchronously to the caller. Transport
/// failures use a separate type in `fraql_client`, so the two can never be
/// confused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ComposeError {
    /// A spread token referenced a path that is not registered.
    #[error("fragment `{0}` not found")]
    FragmentNotFound(String),

    /// A fragment spreads itself, directly or through other fragments.
    #[error("recursive fragment usage detected on `{0}`")]
    RecursiveFragment(String),

    /// A registered fragment body does not begin with `on <TypeName>`.
    #[error("fragment `{0}` must start with `on {{TypeName}}`")]
    FragmentFormat(String),

    /// Auto-declare met a value whose kind has no GraphQL scalar mapping.
    #[error("`{kind}` is not a declarable type for variable `{key}`")]
    UnsupportedType { key: String, kind: String },

    /// `commit` was called for a merge bucket with no buffered operations.
    #[error("nothing to commit for merge `{0}`")]
    EmptyMerge(String),
}

pub type ComposeResult<T> = Result<T, ComposeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_input() {
        let err = ComposeError::FragmentNotFound("auth.user".to_string());
        assert_eq!(err.to_string(), "fragment `auth.user` not found");

        let err = ComposeError::UnsupportedType {
            key: "filter".to_string(),
            kind: "object".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "`object` is not a declarable type for variable `filter`"
        );
    }
}
