//! GraphQL-over-HTTP client built on [`fraql_core`].
//!
//! Wraps the composition pipeline (fragment registry, spread resolution,
//! variable auto-declaration, merged requests) in a client that dispatches
//! finished documents to a GraphQL endpoint.
//!
//! ```no_run
//! use fraql_client::{GraphqlClient, Variables};
//! use serde_json::json;
//!
//! # async fn example() -> fraql_client::ClientResult<()> {
//! let client = GraphqlClient::new("http://localhost:4000/graphql");
//! client.fragment(json!({"user": "on User { id, name }"}))?;
//!
//! let data = client
//!     .query("user(id: $id) { ...user }")
//!     .declared()
//!     .send(Variables::from([("id".to_string(), json!(1))]))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub(crate) mod http;

pub use client::{
    ClientOptions, GraphqlClient, GraphqlError, Method, Operation, Request, Response,
};
pub use error::{ClientError, ClientResult, ErrorCode, TransportError};

pub use fraql_core::{ComposeError, FragmentRegistry, OperationKind, Variables};
