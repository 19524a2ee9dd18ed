//! The `GraphStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `clause-store-sqlite`).
//! The engine depends on this abstraction, not on any concrete backend, and
//! adds timeouts, retries and cancellation on top of it.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
  contract::{ContractId, Reported},
  graph::{ContractGraph, StoredNode},
  provision::{CapType, ProvisionCategory},
};

// ─── Failure classification ──────────────────────────────────────────────────

/// How the engine should treat a backend error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
  /// Timeout, busy database, dropped connection: retry with backoff.
  Transient,
  /// The write was abandoned before commit because its token fired.
  Cancelled,
  /// A derived id already belongs to a contract with a different fingerprint.
  Collision,
  /// Constraint violation, malformed query, corrupt data: never retried.
  Fatal,
}

/// Implemented by every backend error type.
pub trait StoreFailure {
  fn failure_kind(&self) -> FailureKind;
}

// ─── Query and result types ──────────────────────────────────────────────────

/// Counts reported by one upsert.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
pub struct WriteSummary {
  pub created:   usize,
  pub updated:   usize,
  pub unchanged: usize,
  /// Nodes from an earlier ingestion that the new document no longer has.
  pub removed:   usize,
}

/// A row in contract listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractSummary {
  pub contract_id:    ContractId,
  pub name:           Reported<String>,
  pub agreement_type: Reported<String>,
  pub effective_date: Reported<String>,
  pub created_at:     DateTime<Utc>,
  pub updated_at:     DateTime<Utc>,
}

/// Parameters for [`GraphStore::liability_caps`]. Only caps with a known
/// amount ever match; unparsed or missing amounts are non-matching.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapQuery {
  /// Strictly greater than.
  pub above:    Option<f64>,
  /// Less than or equal to.
  pub at_most:  Option<f64>,
  pub cap_type: Option<CapType>,
  pub limit:    Option<usize>,
}

/// A contract matched by a liability-cap filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapMatch {
  pub contract:   ContractSummary,
  pub cap_amount: f64,
  pub currency:   Reported<String>,
  pub cap_type:   Reported<CapType>,
}

/// How many nodes and relationships one contract occupies.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
pub struct GraphSize {
  pub nodes:         usize,
  pub relationships: usize,
}

/// The text fields keyword search looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchField {
  /// Verbatim excerpt text.
  ExcerptText,
  AgreementType,
  PartyName,
  ObligationType,
}

/// A node whose text contains the searched keyword.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordMatch {
  pub node_id:     Uuid,
  pub contract_id: ContractId,
  pub field:       SearchField,
  pub text:        String,
}

/// An excerpt still waiting for an embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingExcerpt {
  pub node_id: Uuid,
  pub text:    String,
}

/// An excerpt with its vector, for similarity ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedExcerpt {
  pub node_id:     Uuid,
  pub contract_id: ContractId,
  pub category:    ProvisionCategory,
  pub text:        String,
  pub embedding:   Vec<f32>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a transactional property-graph backend.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait GraphStore: Send + Sync {
  type Error: std::error::Error + StoreFailure + Send + Sync + 'static;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Apply one contract's plan as a single transaction: merge every node by
  /// id, insert missing relationships and drop nodes the plan no longer
  /// contains. Checks `cancel` before committing; a cancelled write leaves
  /// no trace. Concurrent upserts of the same contract serialise here.
  fn upsert_contract(
    &self,
    graph: ContractGraph,
    cancel: CancellationToken,
  ) -> impl Future<Output = Result<WriteSummary, Self::Error>> + Send + '_;

  /// Delete a contract and everything it owns in one transaction. Returns
  /// `false` if the contract did not exist.
  fn delete_contract(
    &self,
    contract_id: ContractId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Store an embedding on an excerpt node.
  fn set_embedding(
    &self,
    node_id: Uuid,
    embedding: Vec<f32>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Every node owned (transitively) by the contract, the contract node
  /// included. `None` if the contract does not exist.
  fn contract_nodes(
    &self,
    contract_id: ContractId,
  ) -> impl Future<Output = Result<Option<Vec<StoredNode>>, Self::Error>>
  + Send
  + '_;

  /// Node and relationship counts for one contract. `None` if the contract
  /// does not exist.
  fn graph_size(
    &self,
    contract_id: ContractId,
  ) -> impl Future<Output = Result<Option<GraphSize>, Self::Error>> + Send + '_;

  /// All contracts, ordered by id.
  fn list_contracts(
    &self,
  ) -> impl Future<Output = Result<Vec<ContractSummary>, Self::Error>> + Send + '_;

  /// Contracts whose liability cap matches `query`, ordered by cap amount
  /// descending, then contract id ascending.
  fn liability_caps<'a>(
    &'a self,
    query: &'a CapQuery,
  ) -> impl Future<Output = Result<Vec<CapMatch>, Self::Error>> + Send + 'a;

  /// Contracts that reference (`present = true`) or do not reference the
  /// named framework, ordered by id. Names compare case- and
  /// punctuation-insensitively.
  fn contracts_by_framework(
    &self,
    framework: String,
    present: bool,
  ) -> impl Future<Output = Result<Vec<ContractSummary>, Self::Error>> + Send + '_;

  /// Excerpts of one contract that have no embedding yet.
  fn excerpts_without_embedding(
    &self,
    contract_id: ContractId,
  ) -> impl Future<Output = Result<Vec<PendingExcerpt>, Self::Error>> + Send + '_;

  /// Nodes whose searchable text contains `keyword` literally, ignoring
  /// ASCII case. Ordered by contract id, then field, then natural key.
  fn keyword_search(
    &self,
    keyword: String,
    limit: Option<usize>,
  ) -> impl Future<Output = Result<Vec<KeywordMatch>, Self::Error>> + Send + '_;

  /// Every embedded excerpt whose vector has `dimensions` components.
  fn embedded_excerpts(
    &self,
    dimensions: usize,
  ) -> impl Future<Output = Result<Vec<EmbeddedExcerpt>, Self::Error>> + Send + '_;
}
