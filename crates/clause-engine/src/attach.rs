//! The Embedding Attacher: best-effort vectors for excerpts that lack one.
//!
//! A pass never fails because of the embedding function. An unavailable
//! embedder skips the pass; a failing excerpt is recorded and the rest carry
//! on. Only store errors while listing pending excerpts abort the pass.

use std::{
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  time::Duration,
};

use clause_core::{
  Result,
  contract::ContractId,
  embed::{EmbedError, Embedder},
  store::{GraphStore, PendingExcerpt},
};
use serde::{Deserialize, Serialize};
use tokio::{sync::Semaphore, task::JoinSet};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{config::EngineConfig, guard::StoreGuard};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachStatus {
  /// Every pending excerpt was attempted.
  Completed,
  /// The embedding capability is not configured; nothing was attempted.
  Unavailable,
  /// The pass stopped early; unattempted excerpts stay pending.
  Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcerptFailure {
  pub node_id: Uuid,
  pub reason:  String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachSummary {
  pub status:   AttachStatus,
  /// Excerpts without an embedding when the pass started.
  pub pending:  usize,
  pub embedded: usize,
  pub failures: Vec<ExcerptFailure>,
}

impl AttachSummary {
  fn skipped(status: AttachStatus) -> Self {
    Self {
      status,
      pending: 0,
      embedded: 0,
      failures: Vec::new(),
    }
  }
}

pub struct EmbeddingAttacher<S, E> {
  store:                Arc<S>,
  embedder:             Arc<E>,
  guard:                StoreGuard,
  embed_timeout:        Duration,
  concurrency:          usize,
  /// Unavailability is reported once per attacher, not once per contract.
  reported_unavailable: AtomicBool,
}

impl<S, E> EmbeddingAttacher<S, E>
where
  S: GraphStore + 'static,
  E: Embedder + 'static,
{
  pub fn new(store: Arc<S>, embedder: Arc<E>, config: &EngineConfig) -> Self {
    Self {
      store,
      embedder,
      guard: StoreGuard::new(config),
      embed_timeout: config.embed_timeout(),
      concurrency: config.embed_concurrency.max(1),
      reported_unavailable: AtomicBool::new(false),
    }
  }

  pub async fn attach_embeddings(
    &self,
    contract_id: &ContractId,
    cancel: &CancellationToken,
  ) -> Result<AttachSummary> {
    if !self.embedder.is_available() {
      self.report_unavailable("no embedding credentials configured");
      return Ok(AttachSummary::skipped(AttachStatus::Unavailable));
    }

    let scope = contract_id.to_string();
    let store = &*self.store;
    let pending = self
      .guard
      .call(&scope, cancel, |_| {
        store.excerpts_without_embedding(contract_id.clone())
      })
      .await?;
    let total = pending.len();

    let semaphore = Arc::new(Semaphore::new(self.concurrency));
    let mut tasks = JoinSet::new();
    for (index, excerpt) in pending.into_iter().enumerate() {
      let job = Job {
        store:     self.store.clone(),
        embedder:  self.embedder.clone(),
        guard:     self.guard.clone(),
        timeout:   self.embed_timeout,
        scope:     scope.clone(),
        cancel:    cancel.clone(),
        semaphore: semaphore.clone(),
      };
      tasks.spawn(async move { (index, excerpt.node_id, job.run(excerpt).await) });
    }

    let mut outcomes = Vec::with_capacity(total);
    while let Some(joined) = tasks.join_next().await {
      match joined {
        Ok(outcome) => outcomes.push(outcome),
        Err(e) => tracing::error!(contract_id = %scope, error = %e, "embedding task panicked"),
      }
    }
    outcomes.sort_by_key(|(index, ..)| *index);

    let mut summary = AttachSummary::skipped(AttachStatus::Completed);
    summary.pending = total;
    for (_, node_id, outcome) in outcomes {
      match outcome {
        Outcome::Embedded => summary.embedded += 1,
        Outcome::Skipped => summary.status = AttachStatus::Cancelled,
        Outcome::Unavailable(reason) => {
          self.report_unavailable(&reason);
          summary.failures.push(ExcerptFailure { node_id, reason });
        }
        Outcome::Failed(reason) => {
          tracing::warn!(contract_id = %scope, %node_id, error = %reason, "excerpt not embedded");
          summary.failures.push(ExcerptFailure { node_id, reason });
        }
      }
    }
    if cancel.is_cancelled() {
      summary.status = AttachStatus::Cancelled;
    }

    tracing::info!(
      contract_id = %scope,
      pending = summary.pending,
      embedded = summary.embedded,
      failed = summary.failures.len(),
      "embedding pass finished"
    );
    Ok(summary)
  }

  fn report_unavailable(&self, reason: &str) {
    if !self.reported_unavailable.swap(true, Ordering::Relaxed) {
      tracing::info!(reason, "embeddings unavailable, semantic search disabled");
    }
  }
}

// ─── Per-excerpt job ─────────────────────────────────────────────────────────

enum Outcome {
  Embedded,
  Skipped,
  Unavailable(String),
  Failed(String),
}

struct Job<S, E> {
  store:     Arc<S>,
  embedder:  Arc<E>,
  guard:     StoreGuard,
  timeout:   Duration,
  scope:     String,
  cancel:    CancellationToken,
  semaphore: Arc<Semaphore>,
}

impl<S: GraphStore, E: Embedder> Job<S, E> {
  async fn run(self, excerpt: PendingExcerpt) -> Outcome {
    let _permit = tokio::select! {
      biased;
      _ = self.cancel.cancelled() => return Outcome::Skipped,
      permit = self.semaphore.acquire() => match permit {
        Ok(permit) => permit,
        Err(_) => return Outcome::Skipped,
      },
    };

    let vector = match tokio::time::timeout(
      self.timeout,
      self.embedder.embed(excerpt.text),
    )
    .await
    {
      Ok(Ok(vector)) => vector,
      Ok(Err(EmbedError::Unavailable(reason))) => return Outcome::Unavailable(reason),
      Ok(Err(e)) => return Outcome::Failed(e.to_string()),
      Err(_) => {
        return Outcome::Failed(format!(
          "embedding timed out after {}ms",
          self.timeout.as_millis()
        ));
      }
    };

    let expected = self.embedder.dimensions();
    if vector.len() != expected {
      return Outcome::Failed(format!(
        "embedding has {} dimensions, expected {expected}",
        vector.len()
      ));
    }

    let store = &*self.store;
    match self
      .guard
      .call(&self.scope, &self.cancel, |_| {
        store.set_embedding(excerpt.node_id, vector.clone())
      })
      .await
    {
      Ok(()) => Outcome::Embedded,
      Err(clause_core::Error::Cancelled { .. }) => Outcome::Skipped,
      Err(e) => Outcome::Failed(e.to_string()),
    }
  }
}
