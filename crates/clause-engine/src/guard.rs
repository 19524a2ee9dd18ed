//! Timeouts, retries and cancellation around every store call.

use std::{future::Future, time::Duration};

use clause_core::{
  Error, Result,
  store::{FailureKind, StoreFailure},
};
use tokio_util::sync::CancellationToken;

use crate::config::{EngineConfig, RetryPolicy};

#[derive(Debug, Clone)]
pub(crate) struct StoreGuard {
  timeout: Duration,
  retry:   RetryPolicy,
}

impl StoreGuard {
  pub fn new(config: &EngineConfig) -> Self {
    Self {
      timeout: config.store_timeout(),
      retry:   config.retry.clone(),
    }
  }

  /// Run `op` until it succeeds, fails fatally, runs out of attempts or
  /// `cancel` fires.
  ///
  /// Each attempt gets a child of `cancel`, which is also cancelled when the
  /// attempt times out, so a write that outlives its caller still rolls back.
  /// `scope` names the contract (or query) in errors and logs.
  pub async fn call<T, E, F, Fut>(
    &self,
    scope: &str,
    cancel: &CancellationToken,
    mut op: F,
  ) -> Result<T>
  where
    F: FnMut(CancellationToken) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: std::error::Error + StoreFailure,
  {
    let cancelled = || Error::Cancelled {
      scope: scope.to_owned(),
    };
    let max_attempts = self.retry.max_attempts.max(1);
    let mut attempt = 1;

    loop {
      let token = cancel.child_token();
      let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(cancelled()),
        r = tokio::time::timeout(self.timeout, op(token.clone())) => r,
      };

      let message = match outcome {
        Ok(Ok(value)) => return Ok(value),
        Ok(Err(e)) => match e.failure_kind() {
          FailureKind::Transient => e.to_string(),
          FailureKind::Cancelled => return Err(cancelled()),
          FailureKind::Collision => {
            return Err(Error::Identity {
              source_ref: scope.to_owned(),
              reason:     e.to_string(),
            });
          }
          FailureKind::Fatal => {
            return Err(Error::Store {
              scope:   scope.to_owned(),
              message: e.to_string(),
            });
          }
        },
        Err(_) => {
          token.cancel();
          format!("timed out after {}ms", self.timeout.as_millis())
        }
      };

      if attempt >= max_attempts {
        tracing::error!(scope, attempts = attempt, error = %message, "store call gave up");
        return Err(Error::StoreTransient {
          scope: scope.to_owned(),
          attempts: attempt,
          message,
        });
      }

      let backoff = self.retry.delay_for_attempt(attempt);
      tracing::warn!(
        scope,
        attempt,
        backoff_ms = backoff.as_millis() as u64,
        error = %message,
        "store call failed, retrying"
      );
      tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(cancelled()),
        _ = tokio::time::sleep(backoff) => {}
      }
      attempt += 1;
    }
  }
}
