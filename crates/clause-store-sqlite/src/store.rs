//! [`SqliteStore`], the SQLite implementation of [`GraphStore`].

use std::{collections::HashSet, path::Path};

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use clause_core::{
  contract::ContractId,
  graph::{ContractGraph, NodeKind, StoredNode},
  provision::framework_matches,
  store::{
    CapMatch, CapQuery, ContractSummary, EmbeddedExcerpt, GraphSize, GraphStore,
    KeywordMatch, PendingExcerpt, WriteSummary,
  },
};

use crate::{
  Error, Result,
  encode::{
    RawCap, RawContract, RawEmbedded, RawKeywordMatch, RawNode, decode_uuid,
    encode_dt,
    encode_embedding, encode_uuid,
  },
  schema::SCHEMA,
};

const CONTRACT_LABEL: &str = "Contract";
const EXCERPT_LABEL: &str = "Excerpt";

/// One branch per searchable field, tagged with the rank that
/// [`RawKeywordMatch::into_match`] maps back to a `SearchField`.
const KEYWORD_SEARCH: &str = "
SELECT node_id, contract_id, field, value FROM (
  SELECT node_id, contract_id, natural_key, 0 AS field,
         json_extract(properties, '$.text') AS value
    FROM nodes WHERE label = 'Excerpt'
  UNION ALL
  SELECT node_id, contract_id, natural_key, 1,
         json_extract(properties, '$.agreement_type.value')
    FROM nodes WHERE label = 'Contract'
  UNION ALL
  SELECT node_id, contract_id, natural_key, 2,
         json_extract(properties, '$.name.value')
    FROM nodes WHERE label = 'Party'
  UNION ALL
  SELECT node_id, contract_id, natural_key, 3,
         json_extract(properties, '$.obligation_type.value')
    FROM nodes WHERE label = 'Obligation'
)
WHERE value IS NOT NULL AND instr(lower(value), lower(?1)) > 0
ORDER BY contract_id, field, natural_key
LIMIT ?2";

/// What the upsert transaction decided, before it is turned into a result.
enum UpsertOutcome {
  Applied(WriteSummary),
  Collision { stored: String },
  /// A planned node id is already held by another contract's node.
  NodeConflict { node_id: Uuid, held_by: String },
  Cancelled,
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A clause graph store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted and every call
/// runs on its one background thread, so writes are serialised.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests and throwaway runs.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Contract ids that have a compliance framework matching `framework`.
  async fn framework_holders(&self, framework: String) -> Result<HashSet<String>> {
    let rows: Vec<(String, Option<String>)> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT p.contract_id, json_extract(p.properties, '$.framework_name')
             FROM nodes p
            WHERE p.label = 'ComplianceFramework'",
        )?;
        let rows = stmt
          .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(
      rows
        .into_iter()
        .filter(|(_, name)| {
          name.as_deref().is_some_and(|n| framework_matches(n, &framework))
        })
        .map(|(id, _)| id)
        .collect(),
    )
  }
}

fn raw_contract(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawContract> {
  Ok(RawContract {
    contract_id: row.get(0)?,
    properties:  row.get(1)?,
    created_at:  row.get(2)?,
    updated_at:  row.get(3)?,
  })
}

// ─── GraphStore impl ─────────────────────────────────────────────────────────

impl GraphStore for SqliteStore {
  type Error = Error;

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn upsert_contract(
    &self,
    graph: ContractGraph,
    cancel: CancellationToken,
  ) -> Result<WriteSummary> {
    let contract_id = graph.contract_id.to_string();
    let incoming = graph.fingerprint.clone();
    let now = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call({
        let contract_id = contract_id.clone();
        move |conn| {
          let tx = conn.transaction()?;

          let stored: Option<Option<String>> = tx
            .query_row(
              "SELECT fingerprint FROM nodes
                WHERE contract_id = ?1 AND label = 'Contract'",
              rusqlite::params![contract_id],
              |r| r.get(0),
            )
            .optional()?;
          if let (Some(Some(stored)), Some(incoming)) = (&stored, &graph.fingerprint)
            && stored != incoming
          {
            return Ok(UpsertOutcome::Collision {
              stored: stored.clone(),
            });
          }

          let mut summary = WriteSummary::default();
          let mut planned = HashSet::with_capacity(graph.nodes.len());

          for node in &graph.nodes {
            let id = encode_uuid(node.node_id);
            planned.insert(id.clone());
            let fingerprint = match node.kind {
              NodeKind::Contract => graph.fingerprint.clone(),
              _ => None,
            };

            let existing: Option<(String, String, String)> = tx
              .query_row(
                "SELECT contract_id, label, content_hash FROM nodes
                  WHERE node_id = ?1",
                rusqlite::params![id],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
              )
              .optional()?;
            if let Some((held_by, label, _)) = &existing
              && (*held_by != contract_id || label != node.kind.label())
            {
              return Ok(UpsertOutcome::NodeConflict {
                node_id: node.node_id,
                held_by: held_by.clone(),
              });
            }

            match existing.map(|(.., hash)| hash) {
              None => {
                tx.execute(
                  "INSERT INTO nodes (
                     node_id, contract_id, label, natural_key, owner_id,
                     ordinal, properties, content_hash, fingerprint,
                     created_at, updated_at
                   ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
                  rusqlite::params![
                    id,
                    contract_id,
                    node.kind.label(),
                    node.natural_key,
                    node.owner_id.map(encode_uuid),
                    node.ordinal,
                    node.properties.to_string(),
                    node.content_hash,
                    fingerprint,
                    now,
                  ],
                )?;
                summary.created += 1;
              }
              Some(hash) if hash == node.content_hash => summary.unchanged += 1,
              Some(_) => {
                tx.execute(
                  "UPDATE nodes
                      SET ordinal = ?2, properties = ?3, content_hash = ?4,
                          fingerprint = COALESCE(?5, fingerprint),
                          updated_at = ?6
                    WHERE node_id = ?1 AND contract_id = ?7 AND label = ?8",
                  rusqlite::params![
                    id,
                    node.ordinal,
                    node.properties.to_string(),
                    node.content_hash,
                    fingerprint,
                    now,
                    contract_id,
                    node.kind.label(),
                  ],
                )?;
                summary.updated += 1;
              }
            }
          }

          for edge in &graph.edges {
            tx.execute(
              "INSERT OR IGNORE INTO relationships (from_id, rel_type, to_id)
               VALUES (?1, ?2, ?3)",
              rusqlite::params![
                encode_uuid(edge.from),
                edge.rel_type,
                encode_uuid(edge.to),
              ],
            )?;
          }

          let existing_ids: Vec<String> = {
            let mut stmt =
              tx.prepare("SELECT node_id FROM nodes WHERE contract_id = ?1")?;
            stmt
              .query_map(rusqlite::params![contract_id], |r| r.get(0))?
              .collect::<rusqlite::Result<Vec<_>>>()?
          };
          for stale in existing_ids.iter().filter(|id| !planned.contains(*id)) {
            // Owned nodes go with their owner; a zero-row delete is fine.
            tx.execute(
              "DELETE FROM nodes WHERE node_id = ?1",
              rusqlite::params![stale],
            )?;
            summary.removed += 1;
          }

          if cancel.is_cancelled() {
            return Ok(UpsertOutcome::Cancelled);
          }
          tx.commit()?;
          Ok(UpsertOutcome::Applied(summary))
        }
      })
      .await?;

    match outcome {
      UpsertOutcome::Applied(summary) => {
        tracing::debug!(
          contract_id = %contract_id,
          created = summary.created,
          updated = summary.updated,
          unchanged = summary.unchanged,
          removed = summary.removed,
          "upserted contract graph"
        );
        Ok(summary)
      }
      UpsertOutcome::Collision { stored } => Err(Error::IdentityCollision {
        contract_id,
        stored,
        incoming: incoming.unwrap_or_default(),
      }),
      UpsertOutcome::NodeConflict { node_id, held_by } => {
        Err(Error::NodeConflict {
          contract_id,
          node_id,
          held_by,
        })
      }
      UpsertOutcome::Cancelled => Err(Error::Cancelled(contract_id)),
    }
  }

  async fn delete_contract(&self, contract_id: ContractId) -> Result<bool> {
    let id = contract_id.to_string();
    let removed = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "DELETE FROM nodes WHERE contract_id = ?1 AND label = ?2",
          rusqlite::params![id, CONTRACT_LABEL],
        )?;
        Ok(n)
      })
      .await?;
    Ok(removed > 0)
  }

  async fn set_embedding(&self, node_id: Uuid, embedding: Vec<f32>) -> Result<()> {
    let id = encode_uuid(node_id);
    let dim = embedding.len() as i64;
    let blob = encode_embedding(&embedding);

    let n = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE nodes SET embedding = ?2, embedding_dim = ?3
            WHERE node_id = ?1 AND label = ?4",
          rusqlite::params![id, blob, dim, EXCERPT_LABEL],
        )?)
      })
      .await?;

    if n == 0 {
      return Err(Error::NodeNotFound(node_id));
    }
    Ok(())
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn contract_nodes(
    &self,
    contract_id: ContractId,
  ) -> Result<Option<Vec<StoredNode>>> {
    let id = contract_id.to_string();

    let raws: Vec<RawNode> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT node_id, label, owner_id, ordinal, properties,
                  embedding IS NOT NULL
             FROM nodes
            WHERE contract_id = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id], |row| {
            Ok(RawNode {
              node_id:    row.get(0)?,
              label:      row.get(1)?,
              owner_id:   row.get(2)?,
              ordinal:    row.get(3)?,
              properties: row.get(4)?,
              embedded:   row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    if raws.is_empty() {
      return Ok(None);
    }
    raws
      .into_iter()
      .map(RawNode::into_stored)
      .collect::<Result<Vec<_>>>()
      .map(Some)
  }

  async fn graph_size(&self, contract_id: ContractId) -> Result<Option<GraphSize>> {
    let id = contract_id.to_string();

    let counts: (i64, i64) = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT
             (SELECT COUNT(*) FROM nodes WHERE contract_id = ?1),
             (SELECT COUNT(*) FROM relationships r
                JOIN nodes n ON n.node_id = r.from_id
               WHERE n.contract_id = ?1)",
          rusqlite::params![id],
          |r| Ok((r.get(0)?, r.get(1)?)),
        )?)
      })
      .await?;

    Ok(match counts {
      (0, _) => None,
      (nodes, relationships) => Some(GraphSize {
        nodes:         nodes as usize,
        relationships: relationships as usize,
      }),
    })
  }

  async fn list_contracts(&self) -> Result<Vec<ContractSummary>> {
    let raws: Vec<RawContract> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT contract_id, properties, created_at, updated_at
             FROM nodes
            WHERE label = 'Contract'
            ORDER BY contract_id",
        )?;
        let rows = stmt
          .query_map([], raw_contract)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawContract::into_summary).collect()
  }

  async fn liability_caps<'a>(&'a self, query: &'a CapQuery) -> Result<Vec<CapMatch>> {
    let above = query.above;
    let at_most = query.at_most;

    let raws: Vec<RawCap> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT c.contract_id, c.properties, c.created_at, c.updated_at,
                  p.properties
             FROM nodes p
             JOIN nodes c ON c.node_id = p.owner_id
            WHERE p.label = 'LiabilityCap'
              AND json_extract(p.properties, '$.cap_amount.kind') = 'known'
              AND (?1 IS NULL OR json_extract(p.properties, '$.cap_amount.value') > ?1)
              AND (?2 IS NULL OR json_extract(p.properties, '$.cap_amount.value') <= ?2)
            ORDER BY json_extract(p.properties, '$.cap_amount.value') DESC,
                     c.contract_id ASC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![above, at_most], |row| {
            Ok(RawCap {
              contract:       raw_contract(row)?,
              cap_properties: row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let matches = raws
      .into_iter()
      .map(RawCap::into_cap_match)
      .collect::<Result<Vec<_>>>()?
      .into_iter()
      .filter(|m| match &query.cap_type {
        Some(wanted) => m.cap_type.stated() == Some(wanted),
        None => true,
      });

    Ok(match query.limit {
      Some(limit) => matches.take(limit).collect(),
      None => matches.collect(),
    })
  }

  async fn contracts_by_framework(
    &self,
    framework: String,
    present: bool,
  ) -> Result<Vec<ContractSummary>> {
    let holders = self.framework_holders(framework).await?;
    Ok(
      self
        .list_contracts()
        .await?
        .into_iter()
        .filter(|c| holders.contains(c.contract_id.as_str()) == present)
        .collect(),
    )
  }

  async fn excerpts_without_embedding(
    &self,
    contract_id: ContractId,
  ) -> Result<Vec<PendingExcerpt>> {
    let id = contract_id.to_string();

    let rows: Vec<(String, String)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT node_id, json_extract(properties, '$.text')
             FROM nodes
            WHERE contract_id = ?1 AND label = ?2 AND embedding IS NULL
            ORDER BY natural_key",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id, EXCERPT_LABEL], |row| {
            Ok((row.get(0)?, row.get(1)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(node_id, text)| {
        Ok(PendingExcerpt {
          node_id: decode_uuid(&node_id)?,
          text,
        })
      })
      .collect()
  }

  async fn keyword_search(
    &self,
    keyword: String,
    limit: Option<usize>,
  ) -> Result<Vec<KeywordMatch>> {
    // SQLite treats a negative LIMIT as "no limit".
    let limit = limit.map_or(-1, |l| l as i64);

    let raws: Vec<RawKeywordMatch> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(KEYWORD_SEARCH)?;
        let rows = stmt
          .query_map(rusqlite::params![keyword, limit], |row| {
            Ok(RawKeywordMatch {
              node_id:     row.get(0)?,
              contract_id: row.get(1)?,
              field:       row.get(2)?,
              text:        row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawKeywordMatch::into_match).collect()
  }

  async fn embedded_excerpts(&self, dimensions: usize) -> Result<Vec<EmbeddedExcerpt>> {
    let dim = dimensions as i64;

    let raws: Vec<RawEmbedded> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT e.node_id, e.contract_id, o.label,
                  json_extract(e.properties, '$.text'), e.embedding
             FROM nodes e
             JOIN nodes o ON o.node_id = e.owner_id
            WHERE e.label = ?1
              AND e.embedding IS NOT NULL
              AND e.embedding_dim = ?2
            ORDER BY e.contract_id, e.natural_key",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![EXCERPT_LABEL, dim], |row| {
            Ok(RawEmbedded {
              node_id:     row.get(0)?,
              contract_id: row.get(1)?,
              owner_label: row.get(2)?,
              text:        row.get(3)?,
              embedding:   row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEmbedded::into_embedded).collect()
  }
}
