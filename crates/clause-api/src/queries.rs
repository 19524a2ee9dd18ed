//! Read-only query endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/liability-caps` | `?above=&at_most=&cap_type=&limit=` |
//! | `GET`  | `/liability-caps/stats` | Count, min, max, average |
//! | `GET`  | `/frameworks/{name}/contracts` | `?missing=true` for the complement |
//! | `GET`  | `/excerpts/similar` | `?q=<text>&top_k=5` |
//! | `GET`  | `/search` | `?q=<keyword>&limit=` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use clause_core::{
  embed::Embedder,
  provision::CapType,
  store::{CapMatch, CapQuery, ContractSummary, GraphStore, KeywordMatch},
};
use clause_engine::{CapStatistics, Engine, ScoredExcerpt};
use serde::Deserialize;

use crate::error::ApiError;

const DEFAULT_TOP_K: usize = 5;

// ─── Liability caps ───────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct CapParams {
  pub above:    Option<f64>,
  pub at_most:  Option<f64>,
  pub cap_type: Option<String>,
  pub limit:    Option<usize>,
}

/// `GET /liability-caps`
pub async fn liability_caps<S, E>(
  State(engine): State<Arc<Engine<S, E>>>,
  Query(params): Query<CapParams>,
) -> Result<Json<Vec<CapMatch>>, ApiError>
where
  S: GraphStore + 'static,
  E: Embedder + 'static,
{
  let query = CapQuery {
    above:    params.above,
    at_most:  params.at_most,
    cap_type: params.cap_type.as_deref().map(CapType::parse),
    limit:    params.limit,
  };
  Ok(Json(engine.queries.find_liability_caps(&query).await?))
}

/// `GET /liability-caps/stats`
pub async fn liability_cap_stats<S, E>(
  State(engine): State<Arc<Engine<S, E>>>,
) -> Result<Json<CapStatistics>, ApiError>
where
  S: GraphStore + 'static,
  E: Embedder + 'static,
{
  Ok(Json(engine.queries.liability_cap_statistics().await?))
}

// ─── Frameworks ───────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct FrameworkParams {
  #[serde(default)]
  pub missing: bool,
}

/// `GET /frameworks/{name}/contracts[?missing=true]`
pub async fn framework_contracts<S, E>(
  State(engine): State<Arc<Engine<S, E>>>,
  Path(name): Path<String>,
  Query(params): Query<FrameworkParams>,
) -> Result<Json<Vec<ContractSummary>>, ApiError>
where
  S: GraphStore + 'static,
  E: Embedder + 'static,
{
  let contracts = if params.missing {
    engine.queries.contracts_missing_framework(&name).await?
  } else {
    engine.queries.contracts_with_framework(&name).await?
  };
  Ok(Json(contracts))
}

// ─── Similar excerpts ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SimilarParams {
  pub q:     String,
  pub top_k: Option<usize>,
}

/// `GET /excerpts/similar?q=<text>[&top_k=<n>]`
pub async fn similar_excerpts<S, E>(
  State(engine): State<Arc<Engine<S, E>>>,
  Query(params): Query<SimilarParams>,
) -> Result<Json<Vec<ScoredExcerpt>>, ApiError>
where
  S: GraphStore + 'static,
  E: Embedder + 'static,
{
  if params.q.trim().is_empty() {
    return Err(ApiError::BadRequest("q must not be empty".to_owned()));
  }
  let top_k = params.top_k.unwrap_or(DEFAULT_TOP_K);
  Ok(Json(engine.queries.similar_excerpts(&params.q, top_k).await?))
}

// ─── Keyword search ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SearchParams {
  pub q:     String,
  pub limit: Option<usize>,
}

/// `GET /search?q=<keyword>[&limit=<n>]`
pub async fn keyword_search<S, E>(
  State(engine): State<Arc<Engine<S, E>>>,
  Query(params): Query<SearchParams>,
) -> Result<Json<Vec<KeywordMatch>>, ApiError>
where
  S: GraphStore + 'static,
  E: Embedder + 'static,
{
  if params.q.trim().is_empty() {
    return Err(ApiError::BadRequest("q must not be empty".to_owned()));
  }
  Ok(Json(engine.queries.keyword_search(&params.q, params.limit).await?))
}
