//! Encoding and decoding helpers between domain types and the plain-text and
//! blob representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, UUIDs hyphenated lowercase strings,
//! property bags compact JSON, and embeddings little-endian `f32` blobs.

use chrono::{DateTime, Utc};
use clause_core::{
  contract::{ContractAttributes, ContractId},
  graph::StoredNode,
  provision::{LiabilityCap, ProvisionCategory},
  store::{CapMatch, ContractSummary, EmbeddedExcerpt, KeywordMatch, SearchField},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Embedding ───────────────────────────────────────────────────────────────

pub fn encode_embedding(vector: &[f32]) -> Vec<u8> {
  let mut bytes = Vec::with_capacity(vector.len() * 4);
  for value in vector {
    bytes.extend_from_slice(&value.to_le_bytes());
  }
  bytes
}

pub fn decode_embedding(blob: &[u8]) -> Result<Vec<f32>> {
  if blob.len() % 4 != 0 {
    return Err(Error::InvalidValue(format!(
      "embedding blob of {} bytes is not a whole number of f32s",
      blob.len()
    )));
  }
  Ok(
    blob
      .chunks_exact(4)
      .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
      .collect(),
  )
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw columns of one `nodes` row.
pub struct RawNode {
  pub node_id:    String,
  pub label:      String,
  pub owner_id:   Option<String>,
  pub ordinal:    i64,
  pub properties: String,
  pub embedded:   bool,
}

impl RawNode {
  pub fn into_stored(self) -> Result<StoredNode> {
    Ok(StoredNode {
      node_id:    decode_uuid(&self.node_id)?,
      label:      self.label,
      owner_id:   self.owner_id.as_deref().map(decode_uuid).transpose()?,
      ordinal:    u32::try_from(self.ordinal).map_err(|_| {
        Error::InvalidValue(format!("negative ordinal {}", self.ordinal))
      })?,
      properties: serde_json::from_str(&self.properties)?,
      embedded:   self.embedded,
    })
  }
}

/// Raw columns of a contract root row.
pub struct RawContract {
  pub contract_id: String,
  pub properties:  String,
  pub created_at:  String,
  pub updated_at:  String,
}

impl RawContract {
  pub fn into_summary(self) -> Result<ContractSummary> {
    let attributes: ContractAttributes = serde_json::from_str(&self.properties)?;
    Ok(ContractSummary {
      contract_id:    ContractId::new(self.contract_id),
      name:           attributes.name,
      agreement_type: attributes.agreement_type,
      effective_date: attributes.effective_date,
      created_at:     decode_dt(&self.created_at)?,
      updated_at:     decode_dt(&self.updated_at)?,
    })
  }
}

/// A contract root joined with its liability-cap node.
pub struct RawCap {
  pub contract:       RawContract,
  pub cap_properties: String,
}

impl RawCap {
  pub fn into_cap_match(self) -> Result<CapMatch> {
    let cap: LiabilityCap = serde_json::from_str(&self.cap_properties)?;
    let contract = self.contract.into_summary()?;
    let cap_amount = cap.cap_amount.known().ok_or_else(|| {
      Error::InvalidValue(format!(
        "cap on {} matched a known-amount filter without one",
        contract.contract_id
      ))
    })?;
    Ok(CapMatch {
      contract,
      cap_amount,
      currency: cap.currency,
      cap_type: cap.cap_type,
    })
  }
}

/// An excerpt row joined with its owning provision's label.
pub struct RawEmbedded {
  pub node_id:     String,
  pub contract_id: String,
  pub owner_label: String,
  pub text:        String,
  pub embedding:   Vec<u8>,
}

impl RawEmbedded {
  pub fn into_embedded(self) -> Result<EmbeddedExcerpt> {
    let category =
      ProvisionCategory::from_label(&self.owner_label).ok_or_else(|| {
        Error::InvalidValue(format!(
          "excerpt owned by non-provision label {:?}",
          self.owner_label
        ))
      })?;
    Ok(EmbeddedExcerpt {
      node_id: decode_uuid(&self.node_id)?,
      contract_id: ContractId::new(self.contract_id),
      category,
      text: self.text,
      embedding: decode_embedding(&self.embedding)?,
    })
  }
}

/// A keyword-search hit; `field` is the rank column of the search query.
pub struct RawKeywordMatch {
  pub node_id:     String,
  pub contract_id: String,
  pub field:       i64,
  pub text:        String,
}

impl RawKeywordMatch {
  pub fn into_match(self) -> Result<KeywordMatch> {
    let field = match self.field {
      0 => SearchField::ExcerptText,
      1 => SearchField::AgreementType,
      2 => SearchField::PartyName,
      3 => SearchField::ObligationType,
      other => {
        return Err(Error::InvalidValue(format!("unknown search field {other}")));
      }
    };
    Ok(KeywordMatch {
      node_id: decode_uuid(&self.node_id)?,
      contract_id: ContractId::new(self.contract_id),
      field,
      text: self.text,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn embedding_blob_is_little_endian_f32() {
    let v = vec![1.0f32, -0.5, 0.25];
    let blob = encode_embedding(&v);
    assert_eq!(blob.len(), 12);
    assert_eq!(&blob[0..4], &1.0f32.to_le_bytes());
    assert_eq!(decode_embedding(&blob).unwrap(), v);
  }

  #[test]
  fn truncated_blob_is_rejected() {
    assert!(decode_embedding(&[0, 0, 128]).is_err());
  }
}
