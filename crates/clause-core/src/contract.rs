//! The contract entity and the value wrappers used throughout the provision
//! taxonomy.
//!
//! Extraction output is unreliable: fields go missing, numbers arrive as
//! prose. Every optional scalar is therefore a [`Reported`] value, which makes
//! "the document did not say" an explicit state instead of a silent default.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::provision::{LiabilityCap, Provision, ProvisionCategory};

// ─── Value wrappers ──────────────────────────────────────────────────────────

/// A value the source document either stated or left out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Reported<T> {
  Stated(T),
  /// Absent, null, or malformed in the source document.
  Unknown,
}

impl<T> Default for Reported<T> {
  fn default() -> Self { Self::Unknown }
}

impl<T> Reported<T> {
  pub fn stated(&self) -> Option<&T> {
    match self {
      Self::Stated(v) => Some(v),
      Self::Unknown => None,
    }
  }

  pub fn is_unknown(&self) -> bool { matches!(self, Self::Unknown) }

  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Reported<U> {
    match self {
      Self::Stated(v) => Reported::Stated(f(v)),
      Self::Unknown => Reported::Unknown,
    }
  }
}

impl<T> From<Option<T>> for Reported<T> {
  fn from(value: Option<T>) -> Self {
    value.map_or(Self::Unknown, Self::Stated)
  }
}

/// A monetary amount as extracted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Amount {
  Known(f64),
  /// Present in the document but not a number (e.g. "fees paid in the prior
  /// twelve months"). The raw text is kept for reporting.
  Unparsed(String),
  #[default]
  Unknown,
}

impl Amount {
  pub fn known(&self) -> Option<f64> {
    match self {
      Self::Known(v) => Some(*v),
      _ => None,
    }
  }
}

/// An amount with its currency, e.g. `total_contract_value`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Money {
  pub amount:   Amount,
  pub currency: Reported<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoverningLaw {
  pub country: Reported<String>,
  pub state:   Reported<String>,
}

// ─── Identity ────────────────────────────────────────────────────────────────

/// A stable contract identifier. Never sequential; see
/// [`crate::identity::resolve`].
#[derive(
  Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ContractId(String);

impl ContractId {
  pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for ContractId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl AsRef<str> for ContractId {
  fn as_ref(&self) -> &str { &self.0 }
}

impl From<&str> for ContractId {
  fn from(value: &str) -> Self { Self(value.to_owned()) }
}

impl From<String> for ContractId {
  fn from(value: String) -> Self { Self(value) }
}

/// Where a contract's id came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdentitySource {
  /// Taken verbatim from the document.
  #[default]
  Explicit,
  /// Derived from a content fingerprint; the fingerprint is kept so a later
  /// document hashing to the same id with different content is detected.
  Derived { fingerprint: String },
}

// ─── Parties ─────────────────────────────────────────────────────────────────

/// A party to the agreement. Role and incorporation metadata are frequently
/// missing; they are never inferred.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Party {
  pub name:                  Reported<String>,
  pub role:                  Reported<String>,
  pub incorporation_country: Reported<String>,
  pub incorporation_state:   Reported<String>,
}

// ─── Contract ────────────────────────────────────────────────────────────────

/// Scalar attributes stored on the contract node itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractAttributes {
  pub identity:        IdentitySource,
  pub name:            Reported<String>,
  pub agreement_type:  Reported<String>,
  pub effective_date:  Reported<String>,
  pub expiration_date: Reported<String>,
  pub agreement_date:  Reported<String>,
  pub renewal_term:    Reported<String>,
  pub auto_renewal:    Reported<bool>,
  pub total_value:     Reported<Money>,
  pub governing_law:   Reported<GoverningLaw>,
}

/// One provision together with the verbatim text supporting it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionRecord {
  #[serde(flatten)]
  pub provision: Provision,
  /// Deduplicated, in document order.
  pub excerpts:  Vec<String>,
}

/// The root entity: one legal agreement and its extracted provisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
  pub contract_id: ContractId,
  #[serde(flatten)]
  pub attributes:  ContractAttributes,
  pub parties:     Vec<Party>,
  pub provisions:  Vec<ProvisionRecord>,
}

impl Contract {
  pub fn provisions_of(
    &self,
    category: ProvisionCategory,
  ) -> impl Iterator<Item = &Provision> + '_ {
    self
      .provisions
      .iter()
      .map(|r| &r.provision)
      .filter(move |p| p.category() == category)
  }

  pub fn has(&self, category: ProvisionCategory) -> bool {
    self.provisions_of(category).next().is_some()
  }

  pub fn liability_cap(&self) -> Option<&LiabilityCap> {
    self.provisions.iter().find_map(|r| match &r.provision {
      Provision::LiabilityCap(cap) => Some(cap),
      _ => None,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reported_round_trips_through_tagged_json() {
    let stated = Reported::Stated("Licensor".to_owned());
    let json = serde_json::to_value(&stated).unwrap();
    assert_eq!(json, serde_json::json!({ "state": "stated", "value": "Licensor" }));

    let unknown: Reported<String> =
      serde_json::from_value(serde_json::json!({ "state": "unknown" })).unwrap();
    assert!(unknown.is_unknown());
  }

  #[test]
  fn missing_party_fields_default_to_unknown() {
    let party: Party =
      serde_json::from_value(serde_json::json!({
        "name": { "state": "stated", "value": "Acme" }
      }))
      .unwrap();
    assert_eq!(party.name.stated().map(String::as_str), Some("Acme"));
    assert!(party.role.is_unknown());
    assert!(party.incorporation_country.is_unknown());
  }
}
