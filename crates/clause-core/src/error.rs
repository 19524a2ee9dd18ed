//! Error types for `clause-core`.
//!
//! Every contract-scoped variant names the contract (or, when identity
//! resolution itself failed, the source document) so a failed batch entry can
//! be traced without re-running the batch.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// No stable identifier could be derived for a document.
  #[error("cannot resolve contract id for {source_ref}: {reason}")]
  Identity { source_ref: String, reason: String },

  /// A structurally required field is missing.
  #[error("cannot ingest contract {contract_id}: {reason}")]
  Ingestion { contract_id: String, reason: String },

  /// The store timed out or lost its connection on every attempt.
  #[error("store unavailable for {scope} after {attempts} attempt(s): {message}")]
  StoreTransient {
    scope:    String,
    attempts: u32,
    message:  String,
  },

  /// Constraint violation, malformed query or corrupt data; never retried.
  #[error("store error for {scope}: {message}")]
  Store { scope: String, message: String },

  #[error("client not registered: {0}")]
  UnknownClient(String),

  #[error("contract not found: {0}")]
  UnknownContract(String),

  #[error("operation on {scope} was cancelled before commit")]
  Cancelled { scope: String },

  #[error("invalid standards for client {client_id:?}: {reason}")]
  InvalidStandards { client_id: String, reason: String },

  /// The embedding function failed for a query that needs it.
  #[error("embedding failed: {0}")]
  Embedding(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// Whether retrying the same call later may succeed.
  pub fn is_retryable(&self) -> bool {
    matches!(self, Self::StoreTransient { .. })
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
