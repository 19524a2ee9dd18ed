//! Engine tuning: timeouts, worker counts and the store retry policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Limits applied by every engine service. All fields default, so an empty
/// `[engine]` table is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Upper bound on one store call, per attempt.
  pub store_timeout_ms:   u64,
  /// Upper bound on one embedding call.
  pub embed_timeout_ms:   u64,
  /// Concurrent embedding calls per attach pass.
  pub embed_concurrency:  usize,
  /// Concurrent documents per ingestion batch.
  pub ingest_concurrency: usize,
  pub retry:              RetryPolicy,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      store_timeout_ms:   10_000,
      embed_timeout_ms:   30_000,
      embed_concurrency:  4,
      ingest_concurrency: 4,
      retry:              RetryPolicy::default(),
    }
  }
}

impl EngineConfig {
  pub fn store_timeout(&self) -> Duration {
    Duration::from_millis(self.store_timeout_ms)
  }

  pub fn embed_timeout(&self) -> Duration {
    Duration::from_millis(self.embed_timeout_ms)
  }
}

/// Bounded exponential backoff for transient store failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
  /// Total attempts, the first included.
  pub max_attempts:       u32,
  pub initial_backoff_ms: u64,
  pub max_backoff_ms:     u64,
  pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts:       4,
      initial_backoff_ms: 100,
      max_backoff_ms:     5_000,
      backoff_multiplier: 2.0,
    }
  }
}

impl RetryPolicy {
  /// Delay before retrying after failed attempt number `attempt` (1-based).
  pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(32) as i32;
    let ms = self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(exponent);
    let capped = if ms.is_finite() {
      ms.min(self.max_backoff_ms as f64)
    } else {
      self.max_backoff_ms as f64
    };
    Duration::from_millis(capped.max(0.0) as u64)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn backoff_grows_then_caps() {
    let policy = RetryPolicy::default();
    let delays: Vec<u64> = (1..=8)
      .map(|a| policy.delay_for_attempt(a).as_millis() as u64)
      .collect();
    assert_eq!(delays, [100, 200, 400, 800, 1600, 3200, 5000, 5000]);
  }

  #[test]
  fn partial_config_keeps_defaults() {
    let config: EngineConfig =
      serde_json::from_value(serde_json::json!({ "embed_concurrency": 8 }))
        .unwrap();
    assert_eq!(config.embed_concurrency, 8);
    assert_eq!(config.store_timeout_ms, 10_000);
    assert_eq!(config.retry, RetryPolicy::default());
  }
}
