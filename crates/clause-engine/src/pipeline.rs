//! Ingestion: identity → write → embeddings, for one document or a batch.
//!
//! In a batch every document succeeds or fails on its own; one contract's
//! error never stops the others.

use std::sync::Arc;

use clause_core::{
  Result,
  contract::{ContractId, IdentitySource},
  document::ExtractedDocument,
  embed::Embedder,
  identity,
  store::{GraphStore, WriteSummary},
};
use serde::{Deserialize, Serialize};
use tokio::{sync::Semaphore, task::JoinSet};
use tokio_util::sync::CancellationToken;

use crate::{
  attach::{AttachSummary, EmbeddingAttacher},
  writer::GraphWriter,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestSummary {
  pub contract_id: ContractId,
  pub source:      IdentitySource,
  pub write:       WriteSummary,
  /// `None` when listing pending excerpts failed; the contract itself is
  /// committed either way.
  pub embeddings:  Option<AttachSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BatchOutcome {
  Ingested(IngestSummary),
  Failed { error: String, retryable: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEntry {
  pub source_ref: String,
  #[serde(flatten)]
  pub outcome:    BatchOutcome,
}

/// Per-document results in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
  pub entries: Vec<BatchEntry>,
}

impl BatchReport {
  pub fn succeeded(&self) -> usize {
    self
      .entries
      .iter()
      .filter(|e| matches!(e.outcome, BatchOutcome::Ingested(_)))
      .count()
  }

  pub fn failed(&self) -> usize { self.entries.len() - self.succeeded() }
}

pub struct Ingestor<S, E> {
  writer:      Arc<GraphWriter<S>>,
  attacher:    Arc<EmbeddingAttacher<S, E>>,
  concurrency: usize,
}

impl<S, E> Ingestor<S, E>
where
  S: GraphStore + 'static,
  E: Embedder + 'static,
{
  pub fn new(
    writer: Arc<GraphWriter<S>>,
    attacher: Arc<EmbeddingAttacher<S, E>>,
    concurrency: usize,
  ) -> Self {
    Self {
      writer,
      attacher,
      concurrency: concurrency.max(1),
    }
  }

  pub async fn ingest(
    &self,
    doc: &ExtractedDocument,
    cancel: &CancellationToken,
  ) -> Result<IngestSummary> {
    let resolved = identity::resolve(doc)?;
    let write = self.writer.upsert(&resolved, doc, cancel).await?;

    let embeddings = match self
      .attacher
      .attach_embeddings(&resolved.contract_id, cancel)
      .await
    {
      Ok(summary) => Some(summary),
      Err(e) => {
        tracing::warn!(contract_id = %resolved.contract_id, error = %e, "embedding pass aborted");
        None
      }
    };

    Ok(IngestSummary {
      contract_id: resolved.contract_id,
      source: resolved.source,
      write,
      embeddings,
    })
  }

  /// Ingest `docs` with at most the configured number in flight. Entries
  /// come back in input order.
  pub async fn ingest_batch(
    self: &Arc<Self>,
    docs: Vec<ExtractedDocument>,
    cancel: &CancellationToken,
  ) -> BatchReport {
    let semaphore = Arc::new(Semaphore::new(self.concurrency));
    let mut tasks = JoinSet::new();
    let total = docs.len();
    let mut source_refs = Vec::with_capacity(total);

    for (index, doc) in docs.into_iter().enumerate() {
      let source_ref = doc.source_ref();
      source_refs.push(source_ref.clone());
      let ingestor = self.clone();
      let semaphore = semaphore.clone();
      let cancel = cancel.clone();
      tasks.spawn(async move {
        let result = match semaphore.acquire().await {
          Ok(_permit) => ingestor.ingest(&doc, &cancel).await,
          Err(_) => Err(clause_core::Error::Cancelled { scope: source_ref }),
        };
        (index, result)
      });
    }

    // A slot left empty belongs to a task that panicked.
    let mut results: Vec<Option<Result<IngestSummary>>> =
      (0..total).map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
      match joined {
        Ok((index, result)) => {
          if let Some(slot) = results.get_mut(index) {
            *slot = Some(result);
          }
        }
        Err(e) => tracing::error!(error = %e, "ingestion task panicked"),
      }
    }

    let entries: Vec<BatchEntry> = source_refs
      .into_iter()
      .zip(results)
      .map(|(source_ref, result)| {
        let outcome = match result {
          Some(Ok(summary)) => BatchOutcome::Ingested(summary),
          Some(Err(e)) => {
            tracing::warn!(source = %source_ref, error = %e, "document not ingested");
            BatchOutcome::Failed {
              retryable: e.is_retryable(),
              error:     e.to_string(),
            }
          }
          None => BatchOutcome::Failed {
            error:     format!("ingestion of {source_ref} aborted unexpectedly"),
            retryable: false,
          },
        };
        BatchEntry { source_ref, outcome }
      })
      .collect();

    let report = BatchReport { entries };
    tracing::info!(
      documents = total,
      succeeded = report.succeeded(),
      failed = report.failed(),
      "batch ingested"
    );
    report
  }
}
