//! SQLite backend for the clause graph.
//!
//! Nodes and relationships live in two generic tables, so the store is a
//! small property graph: labels, JSON property bags, owner links for
//! cascading deletes, and optional embedding blobs on excerpt nodes.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
