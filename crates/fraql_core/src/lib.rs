//! Query-composition engine for fraql.
//!
//! This crate turns raw operation text plus a bag of reusable fragment
//! definitions into a complete GraphQL request document:
//! - `flatten`: nested fragment trees to flat, `_`-joined names
//! - `fragments`: the fragment registry with deep-merge registration
//! - `resolve`: recursive fragment-spread resolution and deduplication
//! - `declare`: `(@autodeclare)` variable-type inference
//! - `merge`: batching several buffered operations into one document
//! - `query`: the assembler tying resolution and declaration together
//!
//! Everything here is synchronous and pure; network dispatch lives in
//! `fraql_client`.

pub mod declare;
pub mod error;
pub mod flatten;
pub mod fragments;
pub mod merge;
pub mod query;
pub mod resolve;

pub use declare::{auto_declare, clean_keys, find_type, DetectedType, Variables};
pub use error::{ComposeError, ComposeResult};
pub use flatten::{flatten, normalize_path, PATH_SEPARATOR};
pub use fragments::{FragmentMap, FragmentRegistry};
pub use merge::{merge_operations, PendingOperation};
pub use query::{build_query, with_operation, OperationKind};
pub use resolve::resolve_fragments;
