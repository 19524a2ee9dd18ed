//! The Graph Writer: decode, plan and apply one contract atomically.

use std::sync::Arc;

use clause_core::{
  Result,
  contract::ContractId,
  document::ExtractedDocument,
  graph,
  identity::ResolvedIdentity,
  store::{GraphStore, WriteSummary},
};
use tokio_util::sync::CancellationToken;

use crate::{config::EngineConfig, guard::StoreGuard};

pub struct GraphWriter<S> {
  store: Arc<S>,
  guard: StoreGuard,
}

impl<S: GraphStore> GraphWriter<S> {
  pub fn new(store: Arc<S>, config: &EngineConfig) -> Self {
    Self {
      store,
      guard: StoreGuard::new(config),
    }
  }

  /// Merge the document into the graph under `identity`. Either every node
  /// of the contract is written or none is.
  pub async fn upsert(
    &self,
    identity: &ResolvedIdentity,
    doc: &ExtractedDocument,
    cancel: &CancellationToken,
  ) -> Result<WriteSummary> {
    let contract = doc.decode(identity.contract_id.clone(), identity.source.clone())?;
    let plan = graph::plan(&contract, identity.fingerprint().map(str::to_owned))?;
    let scope = identity.contract_id.to_string();

    let store = &*self.store;
    let summary = self
      .guard
      .call(&scope, cancel, |token| store.upsert_contract(plan.clone(), token))
      .await?;

    tracing::info!(
      contract_id = %scope,
      created = summary.created,
      updated = summary.updated,
      unchanged = summary.unchanged,
      removed = summary.removed,
      "contract written"
    );
    Ok(summary)
  }

  /// Remove a contract and everything it owns. `false` if it did not exist.
  pub async fn delete(
    &self,
    contract_id: &ContractId,
    cancel: &CancellationToken,
  ) -> Result<bool> {
    let scope = contract_id.to_string();
    let store = &*self.store;
    let existed = self
      .guard
      .call(&scope, cancel, |_| store.delete_contract(contract_id.clone()))
      .await?;
    if existed {
      tracing::info!(contract_id = %scope, "contract deleted");
    }
    Ok(existed)
  }
}
