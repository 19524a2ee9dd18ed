//! Client standards files: one `ClientStandards` per `*.toml` or `*.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, bail};
use clause_core::standards::ClientStandards;
use clause_engine::StandardsRegistry;

/// Parse one standards file, choosing the format by extension.
pub fn load_file(path: &Path) -> anyhow::Result<ClientStandards> {
  let text = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read {}", path.display()))?;
  let standards = match path.extension().and_then(|e| e.to_str()) {
    Some("toml") => toml::from_str(&text)
      .with_context(|| format!("invalid TOML in {}", path.display()))?,
    Some("json") => serde_json::from_str(&text)
      .with_context(|| format!("invalid JSON in {}", path.display()))?,
    _ => bail!("unsupported standards file {}", path.display()),
  };
  Ok(standards)
}

/// Standards files directly under `dir`, sorted by file name.
pub fn standards_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
  let mut files = Vec::new();
  let entries = std::fs::read_dir(dir)
    .with_context(|| format!("failed to read standards dir {}", dir.display()))?;
  for entry in entries {
    let path = entry?.path();
    let ext = path.extension().and_then(|e| e.to_str());
    if path.is_file() && matches!(ext, Some("toml" | "json")) {
      files.push(path);
    }
  }
  files.sort();
  Ok(files)
}

/// Register every standards file under `dir`. A later file with the same
/// `client_id` replaces an earlier one.
pub fn register_dir(registry: &StandardsRegistry, dir: &Path) -> anyhow::Result<usize> {
  let files = standards_files(dir)?;
  for path in &files {
    let standards = load_file(path)?;
    registry
      .register(standards)
      .with_context(|| format!("rejected standards in {}", path.display()))?;
  }
  Ok(files.len())
}
