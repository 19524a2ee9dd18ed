//! Integration tests for `SqliteStore` against an in-memory database.

use clause_core::{
  contract::{Contract, ContractId, IdentitySource},
  document::ExtractedDocument,
  graph::{self, ContractGraph},
  identity,
  provision::{CapType, ProvisionCategory},
  store::{
    CapQuery, FailureKind, GraphStore, KeywordMatch, SearchField, StoreFailure,
    WriteSummary,
  },
};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn decode(id: &str, raw: Value) -> Contract {
  ExtractedDocument::new(raw, None)
    .decode(ContractId::from(id), IdentitySource::Explicit)
    .unwrap()
}

fn plan(id: &str, raw: Value) -> ContractGraph {
  graph::plan(&decode(id, raw), None).unwrap()
}

fn msa() -> Value {
  json!({
    "agreement_name": "Master Services Agreement",
    "agreement_type": "MSA",
    "effective_date": "2024-01-01",
    "parties": [{ "name": "Acme Corp", "role": "Provider" }, "Globex"],
    "liability_cap": {
      "cap_amount": "$1,000,000",
      "cap_type": "aggregate",
      "excerpts": ["Liability shall not exceed $1,000,000."]
    },
    "obligations": [
      { "obligation_type": "delivery", "excerpts": ["Deliver reports monthly."] }
    ],
    "compliance_frameworks": [{ "framework_name": "SOC 2 Type II" }]
  })
}

fn with_cap(amount: Value, cap_type: &str) -> Value {
  json!({
    "parties": ["Acme"],
    "liability_cap": { "cap_amount": amount, "cap_type": cap_type }
  })
}

async fn upsert(s: &SqliteStore, graph: ContractGraph) -> WriteSummary {
  s.upsert_contract(graph, CancellationToken::new()).await.unwrap()
}

// ─── Upsert ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn first_upsert_creates_every_node() {
  let s = store().await;
  let graph = plan("c-1", msa());
  let total = graph.nodes.len();

  let summary = upsert(&s, graph).await;
  assert_eq!(summary.created, total);
  assert_eq!(summary.updated + summary.unchanged + summary.removed, 0);
}

#[tokio::test]
async fn re_upserting_the_same_document_changes_nothing() {
  let s = store().await;
  upsert(&s, plan("c-1", msa())).await;
  let before = s.contract_nodes(ContractId::from("c-1")).await.unwrap().unwrap();

  let graph = plan("c-1", msa());
  let total = graph.nodes.len();
  let summary = upsert(&s, graph).await;
  assert_eq!(summary, WriteSummary { unchanged: total, ..Default::default() });

  let after = s.contract_nodes(ContractId::from("c-1")).await.unwrap().unwrap();
  assert_eq!(before.len(), after.len());
}

#[tokio::test]
async fn changed_attributes_update_in_place() {
  let s = store().await;
  upsert(&s, plan("c-1", msa())).await;

  let mut raw = msa();
  raw["liability_cap"]["cap_amount"] = json!(2_000_000);
  let summary = upsert(&s, plan("c-1", raw)).await;
  assert_eq!(summary.updated, 1);
  assert_eq!(summary.created, 0);
  assert_eq!(summary.removed, 0);

  let caps = s.liability_caps(&CapQuery::default()).await.unwrap();
  assert_eq!(caps.len(), 1);
  assert_eq!(caps[0].cap_amount, 2_000_000.0);
}

#[tokio::test]
async fn provisions_dropped_from_the_document_are_pruned() {
  let s = store().await;
  upsert(&s, plan("c-1", msa())).await;

  let mut raw = msa();
  raw.as_object_mut().unwrap().remove("obligations");
  let summary = upsert(&s, plan("c-1", raw.clone())).await;
  // The obligation and its one excerpt.
  assert_eq!(summary.removed, 2);

  let nodes = s.contract_nodes(ContractId::from("c-1")).await.unwrap().unwrap();
  let rebuilt = graph::assemble(&ContractId::from("c-1"), nodes).unwrap();
  assert_eq!(rebuilt, decode("c-1", raw));
}

#[tokio::test]
async fn pruning_keeps_embeddings_of_surviving_excerpts() {
  let s = store().await;
  upsert(&s, plan("c-1", msa())).await;
  let id = ContractId::from("c-1");

  for pending in s.excerpts_without_embedding(id.clone()).await.unwrap() {
    s.set_embedding(pending.node_id, vec![1.0, 0.0]).await.unwrap();
  }

  let mut raw = msa();
  raw["obligations"][0]["excerpts"] = json!(["Deliver reports weekly."]);
  upsert(&s, plan("c-1", raw)).await;

  let pending = s.excerpts_without_embedding(id).await.unwrap();
  assert_eq!(pending.len(), 1);
  assert_eq!(pending[0].text, "Deliver reports weekly.");
  assert_eq!(s.embedded_excerpts(2).await.unwrap().len(), 1);
}

#[tokio::test]
async fn derived_id_with_a_different_fingerprint_is_a_collision() {
  let s = store().await;
  let doc = ExtractedDocument::new(msa(), None);
  let resolved = identity::resolve(&doc).unwrap();
  let contract = doc
    .decode(resolved.contract_id.clone(), resolved.source.clone())
    .unwrap();

  let first = graph::plan(&contract, resolved.fingerprint().map(str::to_owned)).unwrap();
  upsert(&s, first).await;

  let forged = graph::plan(&contract, Some("something-else".to_owned())).unwrap();
  let err = s
    .upsert_contract(forged, CancellationToken::new())
    .await
    .unwrap_err();
  assert_eq!(err.failure_kind(), FailureKind::Collision);
  assert!(matches!(err, Error::IdentityCollision { stored, .. }
    if Some(stored.as_str()) == resolved.fingerprint()));
}

#[tokio::test]
async fn ids_shaped_like_child_keys_stay_separate_contracts() {
  let s = store().await;
  upsert(&s, plan("x", json!({ "parties": ["Acme"] }))).await;

  let summary = upsert(&s, plan("x/party:acme", json!({ "parties": ["Other"] }))).await;
  assert_eq!(summary, WriteSummary { created: 2, ..Default::default() });

  let ids: Vec<_> = s
    .list_contracts()
    .await
    .unwrap()
    .into_iter()
    .map(|c| c.contract_id.to_string())
    .collect();
  assert_eq!(ids, ["x", "x/party:acme"]);

  let x = s.contract_nodes(ContractId::from("x")).await.unwrap().unwrap();
  let x = graph::assemble(&ContractId::from("x"), x).unwrap();
  assert_eq!(x, decode("x", json!({ "parties": ["Acme"] })));
}

#[tokio::test]
async fn node_held_by_another_contract_is_a_collision() {
  let s = store().await;
  let first = plan("a", msa());
  let taken = first.nodes[1].node_id;
  upsert(&s, first).await;

  let mut second = plan("b", msa());
  second.nodes[1].node_id = taken;
  let err = s
    .upsert_contract(second, CancellationToken::new())
    .await
    .unwrap_err();
  assert_eq!(err.failure_kind(), FailureKind::Collision);
  assert!(matches!(&err, Error::NodeConflict { held_by, .. } if held_by == "a"));

  // Nothing of `b` was committed and `a` is intact.
  assert!(s.contract_nodes(ContractId::from("b")).await.unwrap().is_none());
  let a = s.contract_nodes(ContractId::from("a")).await.unwrap().unwrap();
  assert_eq!(graph::assemble(&ContractId::from("a"), a).unwrap(), decode("a", msa()));
}

#[tokio::test]
async fn cancelled_upsert_leaves_no_trace() {
  let s = store().await;
  let cancel = CancellationToken::new();
  cancel.cancel();

  let err = s.upsert_contract(plan("c-1", msa()), cancel).await.unwrap_err();
  assert_eq!(err.failure_kind(), FailureKind::Cancelled);
  assert!(s.contract_nodes(ContractId::from("c-1")).await.unwrap().is_none());
  assert!(s.list_contracts().await.unwrap().is_empty());
}

// ─── Delete ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn delete_cascades_to_owned_nodes() {
  let s = store().await;
  upsert(&s, plan("c-1", msa())).await;
  upsert(&s, plan("c-2", msa())).await;

  assert!(s.delete_contract(ContractId::from("c-1")).await.unwrap());
  assert!(s.contract_nodes(ContractId::from("c-1")).await.unwrap().is_none());
  assert!(s.contract_nodes(ContractId::from("c-2")).await.unwrap().is_some());
  assert!(
    s.excerpts_without_embedding(ContractId::from("c-1"))
      .await
      .unwrap()
      .is_empty()
  );
}

#[tokio::test]
async fn deleting_a_missing_contract_returns_false() {
  let s = store().await;
  assert!(!s.delete_contract(ContractId::from("nope")).await.unwrap());
}

// ─── Reads ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_contract_has_no_nodes() {
  let s = store().await;
  assert!(s.contract_nodes(ContractId::from("nope")).await.unwrap().is_none());
}

#[tokio::test]
async fn stored_nodes_assemble_into_the_decoded_contract() {
  let s = store().await;
  upsert(&s, plan("c-1", msa())).await;
  let nodes = s.contract_nodes(ContractId::from("c-1")).await.unwrap().unwrap();
  let rebuilt = graph::assemble(&ContractId::from("c-1"), nodes).unwrap();
  assert_eq!(rebuilt, decode("c-1", msa()));
}

#[tokio::test]
async fn list_is_ordered_by_contract_id() {
  let s = store().await;
  for id in ["c-3", "c-1", "c-2"] {
    upsert(&s, plan(id, msa())).await;
  }
  let ids: Vec<_> = s
    .list_contracts()
    .await
    .unwrap()
    .into_iter()
    .map(|c| c.contract_id.to_string())
    .collect();
  assert_eq!(ids, ["c-1", "c-2", "c-3"]);
}

#[tokio::test]
async fn caps_are_ordered_by_amount_then_id() {
  let s = store().await;
  upsert(&s, plan("b", with_cap(json!(500_000), "aggregate"))).await;
  upsert(&s, plan("a", with_cap(json!(500_000), "aggregate"))).await;
  upsert(&s, plan("c", with_cap(json!(2_000_000), "per incident"))).await;
  upsert(&s, plan("d", with_cap(json!(100), "aggregate"))).await;

  let caps = s.liability_caps(&CapQuery::default()).await.unwrap();
  let ids: Vec<_> = caps.iter().map(|m| m.contract.contract_id.as_str()).collect();
  assert_eq!(ids, ["c", "a", "b", "d"]);
}

#[tokio::test]
async fn cap_filters_apply_bounds_type_and_limit() {
  let s = store().await;
  upsert(&s, plan("a", with_cap(json!(500_000), "aggregate"))).await;
  upsert(&s, plan("b", with_cap(json!(1_000_000), "aggregate"))).await;
  upsert(&s, plan("c", with_cap(json!(2_000_000), "per incident"))).await;

  let above = CapQuery { above: Some(500_000.0), ..Default::default() };
  let ids = |caps: Vec<clause_core::store::CapMatch>| {
    caps
      .into_iter()
      .map(|m| m.contract.contract_id.to_string())
      .collect::<Vec<_>>()
  };
  assert_eq!(ids(s.liability_caps(&above).await.unwrap()), ["c", "b"]);

  let at_most = CapQuery { at_most: Some(1_000_000.0), ..Default::default() };
  assert_eq!(ids(s.liability_caps(&at_most).await.unwrap()), ["b", "a"]);

  let typed = CapQuery {
    cap_type: Some(CapType::Aggregate),
    limit: Some(1),
    ..Default::default()
  };
  assert_eq!(ids(s.liability_caps(&typed).await.unwrap()), ["b"]);
}

#[tokio::test]
async fn unparsed_cap_amounts_never_match() {
  let s = store().await;
  upsert(
    &s,
    plan("a", with_cap(json!("fees paid in the prior twelve months"), "aggregate")),
  )
  .await;
  upsert(&s, plan("b", json!({ "parties": ["Acme"] }))).await;

  assert!(s.liability_caps(&CapQuery::default()).await.unwrap().is_empty());
  let above_zero = CapQuery { above: Some(0.0), ..Default::default() };
  assert!(s.liability_caps(&above_zero).await.unwrap().is_empty());
}

#[tokio::test]
async fn framework_lookup_splits_present_and_missing() {
  let s = store().await;
  upsert(&s, plan("with", msa())).await;
  upsert(&s, plan("without", json!({ "parties": ["Acme"] }))).await;

  let present = s
    .contracts_by_framework("soc2 type ii".to_owned(), true)
    .await
    .unwrap();
  assert_eq!(present.len(), 1);
  assert_eq!(present[0].contract_id.as_str(), "with");

  let missing = s
    .contracts_by_framework("SOC 2 Type II".to_owned(), false)
    .await
    .unwrap();
  assert_eq!(missing.len(), 1);
  assert_eq!(missing[0].contract_id.as_str(), "without");
}

// ─── Embeddings ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn embeddings_move_excerpts_out_of_pending() {
  let s = store().await;
  upsert(&s, plan("c-1", msa())).await;
  let id = ContractId::from("c-1");

  let pending = s.excerpts_without_embedding(id.clone()).await.unwrap();
  assert_eq!(pending.len(), 2);

  s.set_embedding(pending[0].node_id, vec![0.5, 0.5, 0.0]).await.unwrap();
  assert_eq!(s.excerpts_without_embedding(id.clone()).await.unwrap().len(), 1);

  let embedded = s.embedded_excerpts(3).await.unwrap();
  assert_eq!(embedded.len(), 1);
  assert_eq!(embedded[0].node_id, pending[0].node_id);
  assert_eq!(embedded[0].contract_id, id);
  assert_eq!(embedded[0].embedding, vec![0.5, 0.5, 0.0]);
  assert!(matches!(
    embedded[0].category,
    ProvisionCategory::LiabilityCap | ProvisionCategory::Obligation
  ));

  // Vectors of another width are invisible to a query of this width.
  assert!(s.embedded_excerpts(4).await.unwrap().is_empty());
}

#[tokio::test]
async fn embedding_a_missing_node_fails() {
  let s = store().await;
  let err = s.set_embedding(Uuid::from_u128(0xdead_beef), vec![1.0]).await.unwrap_err();
  assert!(matches!(err, Error::NodeNotFound(_)));
  assert_eq!(err.failure_kind(), FailureKind::Fatal);
}

// ─── Size and keyword search ─────────────────────────────────────────────────

#[tokio::test]
async fn graph_size_counts_nodes_and_relationships() {
  let s = store().await;
  let graph = plan("c-1", msa());
  let (nodes, edges) = (graph.nodes.len(), graph.edges.len());
  upsert(&s, graph).await;

  let size = s.graph_size(ContractId::from("c-1")).await.unwrap().unwrap();
  assert_eq!(size.nodes, nodes);
  assert_eq!(size.relationships, edges);

  upsert(&s, plan("c-1", msa())).await;
  assert_eq!(s.graph_size(ContractId::from("c-1")).await.unwrap(), Some(size));
  assert!(s.graph_size(ContractId::from("nope")).await.unwrap().is_none());
}

#[tokio::test]
async fn keyword_search_covers_text_type_party_and_obligation() {
  let s = store().await;
  upsert(&s, plan("c-1", msa())).await;
  upsert(&s, plan("c-2", json!({ "parties": ["Initech"] }))).await;

  let fields = |hits: Vec<KeywordMatch>| {
    hits
      .into_iter()
      .map(|m| (m.contract_id.to_string(), m.field))
      .collect::<Vec<_>>()
  };

  let hits = s.keyword_search("MONTHLY".to_owned(), None).await.unwrap();
  assert_eq!(fields(hits), [("c-1".to_owned(), SearchField::ExcerptText)]);

  let hits = s.keyword_search("msa".to_owned(), None).await.unwrap();
  assert_eq!(fields(hits), [("c-1".to_owned(), SearchField::AgreementType)]);

  let hits = s.keyword_search("initech".to_owned(), None).await.unwrap();
  assert_eq!(fields(hits), [("c-2".to_owned(), SearchField::PartyName)]);

  let hits = s.keyword_search("deliver".to_owned(), None).await.unwrap();
  assert_eq!(fields(hits), [
    ("c-1".to_owned(), SearchField::ExcerptText),
    ("c-1".to_owned(), SearchField::ObligationType),
  ]);
}

#[tokio::test]
async fn keyword_search_is_literal_and_limited() {
  let s = store().await;
  upsert(&s, plan("c-1", msa())).await;

  assert!(s.keyword_search("%".to_owned(), None).await.unwrap().is_empty());
  assert!(s.keyword_search("no such words".to_owned(), None).await.unwrap().is_empty());

  let all = s.keyword_search("a".to_owned(), None).await.unwrap();
  assert!(all.len() > 1);
  let one = s.keyword_search("a".to_owned(), Some(1)).await.unwrap();
  assert_eq!(one, all[..1]);
}
