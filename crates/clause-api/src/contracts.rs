//! Handlers for `/contracts` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/contracts` | Summaries ordered by id |
//! | `POST`   | `/contracts` | Body: `{"document":{...},"source_name":"a.json"}` |
//! | `GET`    | `/contracts/{id}` | 404 if not found |
//! | `DELETE` | `/contracts/{id}` | Cascades; 204 or 404 |
//! | `GET`    | `/contracts/{id}/size` | Node and relationship counts |
//! | `GET`    | `/contracts/{id}/validation/{client_id}` | Validation report |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use clause_core::{
  contract::{Contract, ContractId},
  document::ExtractedDocument,
  embed::Embedder,
  store::{ContractSummary, GraphSize, GraphStore},
  validation::ValidationReport,
};
use clause_engine::{Engine, IngestSummary};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::error::ApiError;

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /contracts`
pub async fn list<S, E>(
  State(engine): State<Arc<Engine<S, E>>>,
) -> Result<Json<Vec<ContractSummary>>, ApiError>
where
  S: GraphStore + 'static,
  E: Embedder + 'static,
{
  Ok(Json(engine.queries.list_contracts().await?))
}

// ─── Ingest ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct IngestBody {
  pub document:    serde_json::Value,
  #[serde(default)]
  pub source_name: Option<String>,
}

/// `POST /contracts`
pub async fn ingest<S, E>(
  State(engine): State<Arc<Engine<S, E>>>,
  Json(body): Json<IngestBody>,
) -> Result<(StatusCode, Json<IngestSummary>), ApiError>
where
  S: GraphStore + 'static,
  E: Embedder + 'static,
{
  if !body.document.is_object() {
    return Err(ApiError::BadRequest("document must be a JSON object".to_owned()));
  }
  let doc = ExtractedDocument::new(body.document, body.source_name);
  let summary = engine.ingestor.ingest(&doc, &CancellationToken::new()).await?;
  let status = if summary.write.created > 0 {
    StatusCode::CREATED
  } else {
    StatusCode::OK
  };
  Ok((status, Json(summary)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /contracts/{id}`
pub async fn get_one<S, E>(
  State(engine): State<Arc<Engine<S, E>>>,
  Path(id): Path<String>,
) -> Result<Json<Contract>, ApiError>
where
  S: GraphStore + 'static,
  E: Embedder + 'static,
{
  Ok(Json(engine.queries.get_contract(&ContractId::new(id)).await?))
}

/// `GET /contracts/{id}/size`
pub async fn size<S, E>(
  State(engine): State<Arc<Engine<S, E>>>,
  Path(id): Path<String>,
) -> Result<Json<GraphSize>, ApiError>
where
  S: GraphStore + 'static,
  E: Embedder + 'static,
{
  Ok(Json(engine.queries.graph_size(&ContractId::new(id)).await?))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /contracts/{id}`
pub async fn delete_one<S, E>(
  State(engine): State<Arc<Engine<S, E>>>,
  Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
  S: GraphStore + 'static,
  E: Embedder + 'static,
{
  let id = ContractId::new(id);
  if engine.writer.delete(&id, &CancellationToken::new()).await? {
    Ok(StatusCode::NO_CONTENT)
  } else {
    Err(ApiError::NotFound(format!("contract {id} not found")))
  }
}

// ─── Validate ─────────────────────────────────────────────────────────────────

/// `GET /contracts/{id}/validation/{client_id}`
pub async fn validate<S, E>(
  State(engine): State<Arc<Engine<S, E>>>,
  Path((id, client_id)): Path<(String, String)>,
) -> Result<Json<ValidationReport>, ApiError>
where
  S: GraphStore + 'static,
  E: Embedder + 'static,
{
  let report = engine
    .validator
    .validate(&ContractId::new(id), &client_id, &CancellationToken::new())
    .await?;
  Ok(Json(report))
}
