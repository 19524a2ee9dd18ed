//! Async services over a [`GraphStore`] and an [`Embedder`].
//!
//! Every store call goes through one guard that bounds it with a timeout,
//! retries transient failures with exponential backoff and honours a
//! [`CancellationToken`](tokio_util::sync::CancellationToken).
//!
//! [`Engine`] wires the services together; each one can also be built alone.

pub mod attach;
pub mod config;
mod guard;
pub mod pipeline;
pub mod query;
pub mod registry;
pub mod validate;
pub mod writer;


use std::sync::Arc;

use clause_core::{embed::Embedder, store::GraphStore};

pub use self::{
  attach::{AttachStatus, AttachSummary, EmbeddingAttacher},
  config::{EngineConfig, RetryPolicy},
  pipeline::{BatchEntry, BatchOutcome, BatchReport, IngestSummary, Ingestor},
  query::{CapStatistics, QueryService, ScoredExcerpt},
  registry::StandardsRegistry,
  validate::ValidationEngine,
  writer::GraphWriter,
};

/// All services sharing one store, one embedder and one registry.
pub struct Engine<S, E> {
  pub writer:    Arc<GraphWriter<S>>,
  pub attacher:  Arc<EmbeddingAttacher<S, E>>,
  pub queries:   Arc<QueryService<S, E>>,
  pub registry:  Arc<StandardsRegistry>,
  pub validator: Arc<ValidationEngine<S, E>>,
  pub ingestor:  Arc<Ingestor<S, E>>,
}

impl<S, E> Engine<S, E>
where
  S: GraphStore + 'static,
  E: Embedder + 'static,
{
  pub fn new(
    store: Arc<S>,
    embedder: Arc<E>,
    registry: Arc<StandardsRegistry>,
    config: &EngineConfig,
  ) -> Self {
    let writer = Arc::new(GraphWriter::new(store.clone(), config));
    let attacher =
      Arc::new(EmbeddingAttacher::new(store.clone(), embedder.clone(), config));
    let queries = Arc::new(QueryService::new(store, embedder, config));
    let validator =
      Arc::new(ValidationEngine::new(registry.clone(), queries.clone()));
    let ingestor = Arc::new(Ingestor::new(
      writer.clone(),
      attacher.clone(),
      config.ingest_concurrency,
    ));

    Self {
      writer,
      attacher,
      queries,
      registry,
      validator,
      ingestor,
    }
  }
}

impl<S, E> Clone for Engine<S, E> {
  fn clone(&self) -> Self {
    Self {
      writer:    self.writer.clone(),
      attacher:  self.attacher.clone(),
      queries:   self.queries.clone(),
      registry:  self.registry.clone(),
      validator: self.validator.clone(),
      ingestor:  self.ingestor.clone(),
    }
  }
}
