//! Identity resolution: every document maps to one stable contract id,
//! independent of processing order and never drawn from a counter.
//!
//! Policy:
//! 1. An explicit `contract_id` (top level, then `agreement.contract_id`) is
//!    used verbatim.
//! 2. Otherwise a content fingerprint is built from the case-folded agreement
//!    name, effective date and sorted party names. The id is `ctr_` followed by
//!    32 hex digits of a SHA-256 over that fingerprint.
//! 3. A fingerprint missing any of its three parts is weak; the normalised
//!    source filename is then mixed into the id so that two sparse documents
//!    from different files do not merge. Strong fingerprints ignore the
//!    filename, so a renamed file keeps its id.

use crate::{
  Error, Result,
  contract::{ContractId, IdentitySource},
  document::ExtractedDocument,
  text,
};

/// The outcome of identity resolution for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
  pub contract_id: ContractId,
  pub source:      IdentitySource,
}

impl ResolvedIdentity {
  /// The fingerprint the store should guard against collisions, if any.
  pub fn fingerprint(&self) -> Option<&str> {
    match &self.source {
      IdentitySource::Derived { fingerprint } => Some(fingerprint),
      IdentitySource::Explicit => None,
    }
  }
}

/// A canonical content digest plus whether it had all of its inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
  pub digest: String,
  pub weak:   bool,
}

pub fn resolve(doc: &ExtractedDocument) -> Result<ResolvedIdentity> {
  if let Some(id) = doc.explicit_id() {
    return Ok(ResolvedIdentity {
      contract_id: ContractId::new(id),
      source:      IdentitySource::Explicit,
    });
  }

  let Some(fp) = fingerprint(doc) else {
    return Err(Error::Identity {
      source_ref: doc.source_ref(),
      reason:     "no contract_id, agreement name or party names to \
                   fingerprint"
        .to_owned(),
    });
  };

  let mut seed = fp.digest.clone();
  if fp.weak
    && let Some(name) = doc.source_name.as_deref().map(normalize_filename)
    && !name.is_empty()
  {
    seed.push('\u{1f}');
    seed.push_str(&name);
  }
  let mut digest = text::sha256_hex(seed.as_bytes());
  digest.truncate(32);

  Ok(ResolvedIdentity {
    contract_id: ContractId::new(format!("ctr_{digest}")),
    source:      IdentitySource::Derived {
      fingerprint: fp.digest,
    },
  })
}

/// Build the content fingerprint. `None` when there is neither an agreement
/// name nor a single party name.
pub fn fingerprint(doc: &ExtractedDocument) -> Option<Fingerprint> {
  let a = doc.agreement();
  let field = |key: &str| {
    a.get(key)
      .and_then(|v| v.as_str())
      .map(text::normalize)
      .filter(|s| !s.is_empty())
  };

  let name = field("agreement_name");
  let date = field("effective_date");
  let mut parties: Vec<String> = a
    .get("parties")
    .and_then(|p| p.as_array())
    .map(|items| {
      items
        .iter()
        .filter_map(|p| p.as_str().or_else(|| p.get("name")?.as_str()))
        .map(text::normalize)
        .filter(|s| !s.is_empty())
        .collect()
    })
    .unwrap_or_default();
  parties.sort();
  parties.dedup();

  if name.is_none() && parties.is_empty() {
    return None;
  }

  let weak = name.is_none() || date.is_none() || parties.is_empty();
  let canonical = format!(
    "name={}\u{1f}date={}\u{1f}parties={}",
    name.unwrap_or_default(),
    date.unwrap_or_default(),
    parties.join("\u{1e}"),
  );
  Some(Fingerprint {
    digest: text::sha256_hex(canonical.as_bytes()),
    weak,
  })
}

/// Strip directories and the final extension, then case-fold.
fn normalize_filename(name: &str) -> String {
  let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
  let stem = match base.rsplit_once('.') {
    Some((stem, _)) if !stem.is_empty() => stem,
    _ => base,
  };
  text::normalize(stem)
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn doc(raw: serde_json::Value, name: &str) -> ExtractedDocument {
    ExtractedDocument::new(raw, Some(name.to_owned()))
  }

  fn full() -> serde_json::Value {
    json!({
      "agreement": {
        "agreement_name": "Master Services Agreement",
        "effective_date": "2024-01-01",
        "parties": [{ "name": "Acme Corp" }, { "name": "Globex" }]
      }
    })
  }

  #[test]
  fn explicit_id_is_used_verbatim() {
    let id = resolve(&doc(json!({ "contract_id": "MSA-001" }), "x.json")).unwrap();
    assert_eq!(id.contract_id.as_str(), "MSA-001");
    assert_eq!(id.source, IdentitySource::Explicit);
    assert_eq!(id.fingerprint(), None);
  }

  #[test]
  fn strong_fingerprint_survives_rename() {
    let a = resolve(&doc(full(), "data/MSA.json")).unwrap();
    let b = resolve(&doc(full(), "/other/place/renamed-copy.JSON")).unwrap();
    assert_eq!(a, b);
    assert!(a.contract_id.as_str().starts_with("ctr_"));
    assert_eq!(a.contract_id.as_str().len(), 36);
  }

  #[test]
  fn fingerprint_ignores_case_whitespace_and_party_order() {
    let shuffled = json!({
      "agreement": {
        "agreement_name": "  master   services AGREEMENT ",
        "effective_date": "2024-01-01",
        "parties": ["globex", { "name": "ACME corp" }]
      }
    });
    assert_eq!(
      resolve(&doc(full(), "a.json")).unwrap(),
      resolve(&doc(shuffled, "b.json")).unwrap()
    );
  }

  #[test]
  fn different_content_yields_different_ids() {
    let mut other = full();
    other["agreement"]["effective_date"] = json!("2025-01-01");
    assert_ne!(
      resolve(&doc(full(), "a.json")).unwrap().contract_id,
      resolve(&doc(other, "a.json")).unwrap().contract_id
    );
  }

  #[test]
  fn weak_fingerprint_mixes_in_the_filename() {
    let sparse = json!({ "parties": ["Acme"] });
    let a = resolve(&doc(sparse.clone(), "dir/one.json")).unwrap();
    let b = resolve(&doc(sparse.clone(), "two.json")).unwrap();
    let a_again = resolve(&doc(sparse, "elsewhere/ONE.json")).unwrap();
    assert_ne!(a.contract_id, b.contract_id);
    assert_eq!(a.contract_id, a_again.contract_id);
  }

  #[test]
  fn empty_document_cannot_be_identified() {
    let err = resolve(&doc(json!({}), "empty.json")).unwrap_err();
    match err {
      Error::Identity { source_ref, .. } => assert_eq!(source_ref, "empty.json"),
      other => panic!("unexpected error: {other}"),
    }
  }
}
