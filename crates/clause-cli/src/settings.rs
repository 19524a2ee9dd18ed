//! Layered configuration: `clause.toml`, then `CLAUSE_*` environment variables.
//!
//! Nested keys use a double underscore, e.g. `CLAUSE_ENGINE__RETRY__MAX_ATTEMPTS=6`
//! or `CLAUSE_EMBEDDING__API_KEY=...`.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clause_engine::EngineConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
  pub store_path:    PathBuf,
  pub host:          String,
  pub port:          u16,
  pub engine:        EngineConfig,
  pub embedding:     EmbeddingConfig,
  /// Directory of `*.toml` / `*.json` client standards registered at startup.
  pub standards_dir: Option<PathBuf>,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      store_path:    PathBuf::from("~/.local/share/clause/clause.db"),
      host:          "127.0.0.1".to_owned(),
      port:          8080,
      engine:        EngineConfig::default(),
      embedding:     EmbeddingConfig::default(),
      standards_dir: None,
    }
  }
}

/// Settings for an OpenAI-compatible `/embeddings` endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
  pub base_url:   String,
  pub model:      String,
  pub dimensions: usize,
  /// Falls back to `OPENAI_API_KEY`. Without a key the embedder reports
  /// itself unavailable.
  pub api_key:    Option<String>,
}

impl Default for EmbeddingConfig {
  fn default() -> Self {
    Self {
      base_url:   "https://api.openai.com/v1".to_owned(),
      model:      "text-embedding-3-small".to_owned(),
      dimensions: 1536,
      api_key:    None,
    }
  }
}

impl AppConfig {
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("CLAUSE")
          .prefix_separator("_")
          .separator("__"),
      )
      .build()
      .context("failed to read config file")?;

    let mut cfg: AppConfig = settings
      .try_deserialize()
      .context("failed to deserialise AppConfig")?;

    if cfg.embedding.api_key.is_none() {
      cfg.embedding.api_key = std::env::var("OPENAI_API_KEY").ok();
    }
    cfg.store_path = expand_tilde(&cfg.store_path);
    cfg.standards_dir = cfg.standards_dir.as_deref().map(expand_tilde);
    Ok(cfg)
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use std::io::Write as _;

  use super::*;

  #[test]
  fn missing_file_yields_defaults() {
    let cfg = AppConfig::load(Path::new("/nonexistent/clause.toml")).unwrap();
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.embedding.dimensions, 1536);
    assert_eq!(cfg.engine.retry.max_attempts, 4);
  }

  #[test]
  fn file_values_override_defaults() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
      file,
      "port = 9000\nstandards_dir = \"standards\"\n\n[engine]\nembed_concurrency = 2\n\n[engine.retry]\nmax_attempts = 7"
    )
    .unwrap();

    let cfg = AppConfig::load(file.path()).unwrap();
    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.engine.embed_concurrency, 2);
    assert_eq!(cfg.engine.ingest_concurrency, 4);
    assert_eq!(cfg.engine.retry.max_attempts, 7);
    assert_eq!(cfg.standards_dir.as_deref(), Some(Path::new("standards")));
  }

  #[test]
  fn tilde_expansion() {
    let home = std::env::var("HOME").unwrap_or_default();
    if home.is_empty() {
      return;
    }
    assert_eq!(
      expand_tilde(Path::new("~/x.db")),
      PathBuf::from(home).join("x.db")
    );
    assert_eq!(expand_tilde(Path::new("/abs/x.db")), PathBuf::from("/abs/x.db"));
  }
}
