//! Embedder backed by an OpenAI-compatible `/embeddings` endpoint.

use std::time::Duration;

use anyhow::Context as _;
use clause_core::embed::{EmbedError, Embedder};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::settings::EmbeddingConfig;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
  model:      &'a str,
  input:      &'a str,
  dimensions: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
  data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
  embedding: Vec<f32>,
}

/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct HttpEmbedder {
  client: Client,
  config: EmbeddingConfig,
}

impl HttpEmbedder {
  pub fn new(config: EmbeddingConfig) -> anyhow::Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self) -> String {
    format!("{}/embeddings", self.config.base_url.trim_end_matches('/'))
  }

  fn api_key(&self) -> Option<&str> {
    self.config.api_key.as_deref().filter(|k| !k.trim().is_empty())
  }
}

impl Embedder for HttpEmbedder {
  fn dimensions(&self) -> usize { self.config.dimensions }

  fn is_available(&self) -> bool { self.api_key().is_some() }

  async fn embed(&self, text: String) -> Result<Vec<f32>, EmbedError> {
    let Some(key) = self.api_key() else {
      return Err(EmbedError::Unavailable("no API key configured".to_owned()));
    };

    let resp = self
      .client
      .post(self.url())
      .bearer_auth(key)
      .json(&EmbeddingRequest {
        model:      &self.config.model,
        input:      &text,
        dimensions: self.config.dimensions,
      })
      .send()
      .await
      .map_err(|e| EmbedError::Failed(format!("POST /embeddings failed: {e}")))?;

    match resp.status() {
      s if s.is_success() => {}
      StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
        return Err(EmbedError::Unavailable(format!(
          "credential rejected ({})",
          resp.status()
        )));
      }
      s => return Err(EmbedError::Failed(format!("POST /embeddings → {s}"))),
    }

    let body: EmbeddingResponse = resp
      .json()
      .await
      .map_err(|e| EmbedError::Failed(format!("deserialising embedding: {e}")))?;
    first_embedding(body)
  }
}

fn first_embedding(body: EmbeddingResponse) -> Result<Vec<f32>, EmbedError> {
  body
    .data
    .into_iter()
    .next()
    .map(|d| d.embedding)
    .ok_or_else(|| EmbedError::Failed("response carried no embedding".to_owned()))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn embedder(api_key: Option<&str>) -> HttpEmbedder {
    HttpEmbedder::new(EmbeddingConfig {
      api_key: api_key.map(str::to_owned),
      ..EmbeddingConfig::default()
    })
    .unwrap()
  }

  #[tokio::test]
  async fn without_key_is_unavailable() {
    let e = embedder(None);
    assert!(!e.is_available());
    assert_eq!(e.dimensions(), 1536);
    assert!(matches!(
      e.embed("indemnity".into()).await,
      Err(EmbedError::Unavailable(_))
    ));
  }

  #[test]
  fn blank_key_counts_as_missing() {
    assert!(!embedder(Some("  ")).is_available());
    assert!(embedder(Some("sk-test")).is_available());
  }

  #[test]
  fn url_joins_base() {
    let e = HttpEmbedder::new(EmbeddingConfig {
      base_url: "http://localhost:11434/v1/".to_owned(),
      ..EmbeddingConfig::default()
    })
    .unwrap();
    assert_eq!(e.url(), "http://localhost:11434/v1/embeddings");
  }

  #[test]
  fn response_parsing() {
    let body: EmbeddingResponse = serde_json::from_str(
      r#"{"object":"list","data":[{"index":0,"embedding":[0.5,-1.0]}],"model":"m"}"#,
    )
    .unwrap();
    assert_eq!(first_embedding(body).unwrap(), vec![0.5, -1.0]);

    let empty: EmbeddingResponse = serde_json::from_str(r#"{"data":[]}"#).unwrap();
    assert!(matches!(first_embedding(empty), Err(EmbedError::Failed(_))));
  }
}
