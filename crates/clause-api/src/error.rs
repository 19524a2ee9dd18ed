//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// The request was well-formed but its content cannot be ingested or
  /// registered.
  #[error("unprocessable: {0}")]
  Unprocessable(String),

  /// Retry later: the store was unreachable or the call was cancelled.
  #[error("unavailable: {0}")]
  Unavailable(String),

  #[error("engine error: {0}")]
  Engine(#[source] clause_core::Error),
}

impl From<clause_core::Error> for ApiError {
  fn from(e: clause_core::Error) -> Self {
    use clause_core::Error as E;
    match e {
      E::UnknownClient(_) | E::UnknownContract(_) => Self::NotFound(e.to_string()),
      E::Identity { .. } | E::Ingestion { .. } | E::InvalidStandards { .. } => {
        Self::Unprocessable(e.to_string())
      }
      E::StoreTransient { .. } | E::Cancelled { .. } => {
        Self::Unavailable(e.to_string())
      }
      other => Self::Engine(other),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Unprocessable(m) => (StatusCode::UNPROCESSABLE_ENTITY, m.clone()),
      ApiError::Unavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m.clone()),
      ApiError::Engine(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
