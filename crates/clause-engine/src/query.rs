//! The Query Service: side-effect-free reads over the graph.

use std::{cmp::Ordering, sync::Arc, time::Duration};

use clause_core::{
  Error, Result,
  contract::{Contract, ContractId},
  embed::{EmbedError, Embedder, cosine_similarity},
  graph,
  provision::ProvisionCategory,
  store::{CapMatch, CapQuery, ContractSummary, GraphSize, GraphStore, KeywordMatch},
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{config::EngineConfig, guard::StoreGuard};

/// Aggregate over every liability cap with a known amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapStatistics {
  pub count:   usize,
  pub min:     Option<f64>,
  pub max:     Option<f64>,
  pub average: Option<f64>,
}

/// One excerpt ranked against a query text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredExcerpt {
  pub node_id:     Uuid,
  pub contract_id: ContractId,
  pub category:    ProvisionCategory,
  pub text:        String,
  pub score:       f64,
}

pub struct QueryService<S, E> {
  store:         Arc<S>,
  embedder:      Arc<E>,
  guard:         StoreGuard,
  embed_timeout: Duration,
}

impl<S: GraphStore, E: Embedder> QueryService<S, E> {
  pub fn new(store: Arc<S>, embedder: Arc<E>, config: &EngineConfig) -> Self {
    Self {
      store,
      embedder,
      guard: StoreGuard::new(config),
      embed_timeout: config.embed_timeout(),
    }
  }

  /// The full contract as currently stored.
  pub async fn get_contract(&self, contract_id: &ContractId) -> Result<Contract> {
    self.contract(contract_id, &CancellationToken::new()).await
  }

  pub(crate) async fn contract(
    &self,
    contract_id: &ContractId,
    cancel: &CancellationToken,
  ) -> Result<Contract> {
    let store = &*self.store;
    let nodes = self
      .guard
      .call(contract_id.as_str(), cancel, |_| {
        store.contract_nodes(contract_id.clone())
      })
      .await?
      .ok_or_else(|| Error::UnknownContract(contract_id.to_string()))?;
    graph::assemble(contract_id, nodes)
  }

  /// Node and relationship counts of one stored contract.
  pub async fn graph_size(&self, contract_id: &ContractId) -> Result<GraphSize> {
    let store = &*self.store;
    self
      .guard
      .call(contract_id.as_str(), &CancellationToken::new(), |_| {
        store.graph_size(contract_id.clone())
      })
      .await?
      .ok_or_else(|| Error::UnknownContract(contract_id.to_string()))
  }

  pub async fn list_contracts(&self) -> Result<Vec<ContractSummary>> {
    let store = &*self.store;
    self
      .guard
      .call("list_contracts", &CancellationToken::new(), |_| {
        store.list_contracts()
      })
      .await
  }

  /// Contracts whose cap matches `query`; largest cap first, then by id.
  pub async fn find_liability_caps(&self, query: &CapQuery) -> Result<Vec<CapMatch>> {
    let store = &*self.store;
    self
      .guard
      .call("liability_caps", &CancellationToken::new(), |_| {
        store.liability_caps(query)
      })
      .await
  }

  pub async fn contracts_with_liability_cap_above(
    &self,
    amount: f64,
  ) -> Result<Vec<CapMatch>> {
    self
      .find_liability_caps(&CapQuery {
        above: Some(amount),
        ..Default::default()
      })
      .await
  }

  pub async fn contracts_with_framework(
    &self,
    framework: &str,
  ) -> Result<Vec<ContractSummary>> {
    self.by_framework(framework, true).await
  }

  pub async fn contracts_missing_framework(
    &self,
    framework: &str,
  ) -> Result<Vec<ContractSummary>> {
    self.by_framework(framework, false).await
  }

  async fn by_framework(
    &self,
    framework: &str,
    present: bool,
  ) -> Result<Vec<ContractSummary>> {
    let store = &*self.store;
    self
      .guard
      .call(framework, &CancellationToken::new(), |_| {
        store.contracts_by_framework(framework.to_owned(), present)
      })
      .await
  }

  pub async fn liability_cap_statistics(&self) -> Result<CapStatistics> {
    let caps = self.find_liability_caps(&CapQuery::default()).await?;
    let amounts: Vec<f64> = caps.iter().map(|c| c.cap_amount).collect();
    let count = amounts.len();
    let sum: f64 = amounts.iter().sum();

    Ok(CapStatistics {
      count,
      min: amounts.iter().copied().reduce(f64::min),
      max: amounts.iter().copied().reduce(f64::max),
      average: (count > 0).then(|| sum / count as f64),
    })
  }

  /// Excerpts, agreement types, party names and obligation types containing
  /// `keyword`. Works without an embedder; a blank keyword matches nothing.
  pub async fn keyword_search(
    &self,
    keyword: &str,
    limit: Option<usize>,
  ) -> Result<Vec<KeywordMatch>> {
    let keyword = keyword.trim();
    if keyword.is_empty() || limit == Some(0) {
      return Ok(Vec::new());
    }
    let store = &*self.store;
    self
      .guard
      .call("keyword_search", &CancellationToken::new(), |_| {
        store.keyword_search(keyword.to_owned(), limit)
      })
      .await
  }

  /// Excerpts most similar to `query`, best first.
  ///
  /// Empty when the embedder is unavailable or nothing has been embedded at
  /// the embedder's width. Fails only if embedding the query itself fails.
  pub async fn similar_excerpts(
    &self,
    query: &str,
    top_k: usize,
  ) -> Result<Vec<ScoredExcerpt>> {
    if top_k == 0 || !self.embedder.is_available() {
      return Ok(Vec::new());
    }

    let dimensions = self.embedder.dimensions();
    let store = &*self.store;
    let candidates = self
      .guard
      .call("similar_excerpts", &CancellationToken::new(), |_| {
        store.embedded_excerpts(dimensions)
      })
      .await?;
    if candidates.is_empty() {
      return Ok(Vec::new());
    }

    let query_vec = match tokio::time::timeout(
      self.embed_timeout,
      self.embedder.embed(query.to_owned()),
    )
    .await
    {
      Ok(Ok(vector)) => vector,
      Ok(Err(EmbedError::Unavailable(reason))) => {
        tracing::info!(reason, "embedder became unavailable, no semantic results");
        return Ok(Vec::new());
      }
      Ok(Err(e)) => return Err(Error::Embedding(e.to_string())),
      Err(_) => {
        return Err(Error::Embedding(format!(
          "query embedding timed out after {}ms",
          self.embed_timeout.as_millis()
        )));
      }
    };

    let mut scored: Vec<ScoredExcerpt> = candidates
      .into_iter()
      .filter_map(|c| {
        let score = cosine_similarity(&query_vec, &c.embedding)?;
        Some(ScoredExcerpt {
          node_id: c.node_id,
          contract_id: c.contract_id,
          category: c.category,
          text: c.text,
          score,
        })
      })
      .collect();
    scored.sort_by(|a, b| {
      b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.contract_id.as_str().cmp(b.contract_id.as_str()))
        .then_with(|| a.node_id.cmp(&b.node_id))
    });
    scored.truncate(top_k);
    Ok(scored)
  }
}
