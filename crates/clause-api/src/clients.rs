//! Handlers for `/clients` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/clients` | Registered client ids, sorted |
//! | `POST` | `/clients` | Body: a `ClientStandards` document; replaces by id |

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use clause_core::{embed::Embedder, standards::ClientStandards, store::GraphStore};
use clause_engine::Engine;
use serde::Serialize;

use crate::error::ApiError;

/// `GET /clients`
pub async fn list<S, E>(State(engine): State<Arc<Engine<S, E>>>) -> Json<Vec<String>>
where
  S: GraphStore + 'static,
  E: Embedder + 'static,
{
  Json(engine.registry.client_ids())
}

#[derive(Debug, Serialize)]
pub struct Registered {
  pub client_id: String,
  pub rules:     usize,
  pub replaced:  bool,
}

/// `POST /clients`
pub async fn register<S, E>(
  State(engine): State<Arc<Engine<S, E>>>,
  Json(standards): Json<ClientStandards>,
) -> Result<(StatusCode, Json<Registered>), ApiError>
where
  S: GraphStore + 'static,
  E: Embedder + 'static,
{
  let client_id = standards.client_id.clone();
  let rules = standards.rules.len();
  let previous = engine.registry.register(standards)?;
  let status = if previous.is_some() {
    StatusCode::OK
  } else {
    StatusCode::CREATED
  };
  Ok((status, Json(Registered {
    client_id,
    rules,
    replaced: previous.is_some(),
  })))
}
