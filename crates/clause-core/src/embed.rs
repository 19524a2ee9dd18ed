//! The embedding function as an optional external capability.

use std::future::Future;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbedError {
  /// No credential or endpoint is configured. Not a failure: the caller
  /// degrades to structured queries only.
  #[error("embedding capability unavailable: {0}")]
  Unavailable(String),

  #[error("embedding request failed: {0}")]
  Failed(String),
}

/// Text → fixed-length vector.
pub trait Embedder: Send + Sync {
  /// Length of every vector [`embed`](Self::embed) returns.
  fn dimensions(&self) -> usize;

  /// `false` when calls would only return [`EmbedError::Unavailable`].
  fn is_available(&self) -> bool;

  fn embed(
    &self,
    text: String,
  ) -> impl Future<Output = Result<Vec<f32>, EmbedError>> + Send + '_;
}

/// An embedder that is never available.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEmbedder;

impl Embedder for NoEmbedder {
  fn dimensions(&self) -> usize { 0 }

  fn is_available(&self) -> bool { false }

  async fn embed(&self, _text: String) -> Result<Vec<f32>, EmbedError> {
    Err(EmbedError::Unavailable("no embedder configured".to_owned()))
  }
}

/// Cosine similarity in `[-1, 1]`. `None` when lengths differ or either
/// vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
  if a.len() != b.len() || a.is_empty() {
    return None;
  }
  let mut dot = 0.0f64;
  let mut norm_a = 0.0f64;
  let mut norm_b = 0.0f64;
  for (x, y) in a.iter().zip(b) {
    let (x, y) = (f64::from(*x), f64::from(*y));
    dot += x * y;
    norm_a += x * x;
    norm_b += y * y;
  }
  if norm_a == 0.0 || norm_b == 0.0 {
    return None;
  }
  Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}
