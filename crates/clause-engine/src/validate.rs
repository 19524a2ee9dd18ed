//! The Validation Engine.

use std::sync::Arc;

use clause_core::{
  Error, Result,
  contract::ContractId,
  embed::Embedder,
  store::GraphStore,
  validation::{self, ValidationReport},
};
use tokio_util::sync::CancellationToken;

use crate::{query::QueryService, registry::StandardsRegistry};

pub struct ValidationEngine<S, E> {
  registry: Arc<StandardsRegistry>,
  queries:  Arc<QueryService<S, E>>,
}

impl<S: GraphStore, E: Embedder> ValidationEngine<S, E> {
  pub fn new(
    registry: Arc<StandardsRegistry>,
    queries: Arc<QueryService<S, E>>,
  ) -> Self {
    Self { registry, queries }
  }

  /// Check the stored contract against a registered client's rules.
  ///
  /// The client is looked up first, so an unknown client is reported even
  /// when the contract is missing too.
  pub async fn validate(
    &self,
    contract_id: &ContractId,
    client_id: &str,
    cancel: &CancellationToken,
  ) -> Result<ValidationReport> {
    let standards = self
      .registry
      .get(client_id)
      .ok_or_else(|| Error::UnknownClient(client_id.to_owned()))?;
    let contract = self.queries.contract(contract_id, cancel).await?;
    if cancel.is_cancelled() {
      return Err(Error::Cancelled {
        scope: contract_id.to_string(),
      });
    }

    let report = validation::evaluate(&contract, &standards);
    tracing::info!(
      contract_id = %contract_id,
      client_id,
      overall = %report.overall_status,
      risk_score = report.risk_score,
      "contract validated"
    );
    Ok(report)
  }
}
