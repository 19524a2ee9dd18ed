//! JSON REST API for the clause graph.
//!
//! Exposes an axum [`Router`] backed by a [`clause_engine::Engine`] over any
//! [`GraphStore`] and [`Embedder`]. Auth, TLS, and transport concerns are the
//! caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", clause_api::api_router(engine.clone()))
//! ```

pub mod clients;
pub mod contracts;
pub mod error;
pub mod queries;

use std::sync::Arc;

use axum::{Router, routing::get};
use clause_core::{embed::Embedder, store::GraphStore};
use clause_engine::Engine;

pub use error::ApiError;

/// Build a fully-materialised API router for `engine`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, E>(engine: Arc<Engine<S, E>>) -> Router<()>
where
  S: GraphStore + 'static,
  E: Embedder + 'static,
{
  Router::new()
    // Contracts
    .route(
      "/contracts",
      get(contracts::list::<S, E>).post(contracts::ingest::<S, E>),
    )
    .route(
      "/contracts/{id}",
      get(contracts::get_one::<S, E>).delete(contracts::delete_one::<S, E>),
    )
    .route("/contracts/{id}/size", get(contracts::size::<S, E>))
    .route(
      "/contracts/{id}/validation/{client_id}",
      get(contracts::validate::<S, E>),
    )
    // Queries
    .route("/liability-caps", get(queries::liability_caps::<S, E>))
    .route("/liability-caps/stats", get(queries::liability_cap_stats::<S, E>))
    .route(
      "/frameworks/{name}/contracts",
      get(queries::framework_contracts::<S, E>),
    )
    .route("/excerpts/similar", get(queries::similar_excerpts::<S, E>))
    .route("/search", get(queries::keyword_search::<S, E>))
    // Clients
    .route("/clients", get(clients::list::<S, E>).post(clients::register::<S, E>))
    .with_state(engine)
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use clause_core::embed::NoEmbedder;
  use clause_engine::{EngineConfig, StandardsRegistry};
  use clause_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  use super::*;

  async fn engine() -> Arc<Engine<SqliteStore, NoEmbedder>> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    Arc::new(Engine::new(
      Arc::new(store),
      Arc::new(NoEmbedder),
      Arc::new(StandardsRegistry::new()),
      &EngineConfig::default(),
    ))
  }

  async fn send(
    engine: &Arc<Engine<SqliteStore, NoEmbedder>>,
    method: &str,
    uri: &str,
    body: Option<Value>,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
      Some(v) => {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        Body::from(v.to_string())
      }
      None => Body::empty(),
    };
    let resp = api_router(engine.clone())
      .oneshot(builder.body(body).unwrap())
      .await
      .unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
      .await
      .unwrap();
    let value = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
  }

  fn contract(id: &str, cap: u64) -> Value {
    json!({
      "document": {
        "contract_id": id,
        "agreement_name": "Master Services Agreement",
        "parties": [{ "name": "Acme Corp" }],
        "liability_cap": { "cap_amount": cap, "cap_type": "aggregate" },
        "compliance_frameworks": [{ "framework_name": "ISO 27001" }]
      },
      "source_name": format!("{id}.json")
    })
  }

  fn standards() -> Value {
    json!({
      "client_id": "acme-bank",
      "client_name": "Acme Bank",
      "rules": [{
        "rule_name": "max_liability_cap",
        "kind": "threshold",
        "metric": { "name": "liability_cap_amount" },
        "bound": "max",
        "value": 5000000
      }]
    })
  }

  // ── Contracts ────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn ingest_then_reingest() {
    let engine = engine().await;
    let (status, body) = send(&engine, "POST", "/contracts", Some(contract("c-1", 10))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["contract_id"], "c-1");
    assert_eq!(body["embeddings"]["status"], "unavailable");

    let (status, body) = send(&engine, "POST", "/contracts", Some(contract("c-1", 10))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["write"]["created"], 0);
  }

  #[tokio::test]
  async fn ingest_without_parties_is_unprocessable() {
    let engine = engine().await;
    let body = json!({ "document": { "contract_id": "c-1", "parties": [] } });
    let (status, body) = send(&engine, "POST", "/contracts", Some(body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("c-1"));
  }

  #[tokio::test]
  async fn ingest_rejects_non_object_documents() {
    let engine = engine().await;
    let body = json!({ "document": [1, 2, 3] });
    let (status, _) = send(&engine, "POST", "/contracts", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn get_list_and_delete() {
    let engine = engine().await;
    send(&engine, "POST", "/contracts", Some(contract("c-1", 10))).await;

    let (status, body) = send(&engine, "GET", "/contracts", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = send(&engine, "GET", "/contracts/c-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["contract_id"], "c-1");
    assert_eq!(body["provisions"][0]["category"], "liability_cap");

    let (status, _) = send(&engine, "DELETE", "/contracts/c-1", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&engine, "DELETE", "/contracts/c-1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, body) = send(&engine, "GET", "/contracts/c-1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
  }

  // ── Queries ──────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn liability_cap_filters() {
    let engine = engine().await;
    for (id, cap) in [("a", 100), ("b", 300), ("c", 200)] {
      send(&engine, "POST", "/contracts", Some(contract(id, cap))).await;
    }

    let (_, body) = send(&engine, "GET", "/liability-caps?above=150", None).await;
    let ids: Vec<_> = body
      .as_array()
      .unwrap()
      .iter()
      .map(|m| m["contract"]["contract_id"].as_str().unwrap().to_owned())
      .collect();
    assert_eq!(ids, ["b", "c"]);

    let (_, body) = send(&engine, "GET", "/liability-caps?cap_type=aggregate&limit=1", None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (_, body) = send(&engine, "GET", "/liability-caps/stats", None).await;
    assert_eq!(body["count"], 3);
    assert_eq!(body["average"], 200.0);
  }

  #[tokio::test]
  async fn framework_membership() {
    let engine = engine().await;
    send(&engine, "POST", "/contracts", Some(contract("c-1", 10))).await;

    let (_, with) = send(&engine, "GET", "/frameworks/iso27001/contracts", None).await;
    assert_eq!(with.as_array().unwrap().len(), 1);
    let (_, without) =
      send(&engine, "GET", "/frameworks/iso27001/contracts?missing=true", None).await;
    assert!(without.as_array().unwrap().is_empty());
  }

  #[tokio::test]
  async fn similar_without_embeddings_is_empty() {
    let engine = engine().await;
    let (status, body) = send(&engine, "GET", "/excerpts/similar?q=liability", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
  }

  #[tokio::test]
  async fn keyword_search_and_size() {
    let engine = engine().await;
    send(&engine, "POST", "/contracts", Some(contract("c-1", 10))).await;

    let (status, body) = send(&engine, "GET", "/search?q=acme", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["contract_id"], "c-1");
    assert_eq!(body[0]["field"], "party_name");

    let (status, _) = send(&engine, "GET", "/search?q=%20", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&engine, "GET", "/contracts/c-1/size", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["nodes"], 4);
    assert_eq!(body["relationships"], 3);
    let (status, _) = send(&engine, "GET", "/contracts/nope/size", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  // ── Clients and validation ───────────────────────────────────────────────

  #[tokio::test]
  async fn register_and_validate() {
    let engine = engine().await;
    let (status, body) = send(&engine, "POST", "/clients", Some(standards())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["replaced"], false);

    let (_, ids) = send(&engine, "GET", "/clients", None).await;
    assert_eq!(ids, json!(["acme-bank"]));

    send(&engine, "POST", "/contracts", Some(contract("c-1", 6_000_000))).await;
    let (status, report) =
      send(&engine, "GET", "/contracts/c-1/validation/acme-bank", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["overall_status"], "FAIL");
    assert_eq!(report["rule_results"][0]["status"], "FAIL");
    assert_eq!(report["risk_score"], 10);
  }

  #[tokio::test]
  async fn invalid_standards_are_unprocessable() {
    let engine = engine().await;
    let mut body = standards();
    body["client_id"] = json!("");
    let (status, _) = send(&engine, "POST", "/clients", Some(body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  }

  #[tokio::test]
  async fn validation_of_unknown_client_is_404() {
    let engine = engine().await;
    let (status, body) =
      send(&engine, "GET", "/contracts/c-1/validation/nobody", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("nobody"));
  }
}
