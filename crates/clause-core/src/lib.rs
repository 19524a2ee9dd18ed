//! Core types and trait definitions for the clause graph.
//!
//! This crate is deliberately free of HTTP and database dependencies. It
//! holds the extracted-document model, the provision taxonomy, identity
//! resolution, the graph write plan, the store and embedder abstractions, and
//! the rule evaluation that turns a contract into a validation report.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod contract;
pub mod document;
pub mod embed;
pub mod error;
pub mod graph;
pub mod identity;
pub mod provision;
pub mod standards;
pub mod store;
pub mod validation;

mod legacy;
mod text;

pub use error::{Error, Result};
