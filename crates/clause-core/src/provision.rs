//! The provision taxonomy: one closed variant per clause category.
//!
//! Each variant carries a payload struct whose optional fields are
//! [`Reported`]; list fields are plain vectors where "empty" and "not stated"
//! carry the same meaning.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
  Result,
  contract::{Amount, Reported},
};

// ─── Category ────────────────────────────────────────────────────────────────

/// The discriminant of a [`Provision`]. The snake_case form is the serde and
/// storage tag; [`label`](Self::label) is the graph node label.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::EnumIter,
  strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProvisionCategory {
  LiabilityCap,
  Indemnification,
  Obligation,
  PaymentTerms,
  IntellectualProperty,
  Confidentiality,
  DataProtection,
  ComplianceFramework,
  Warranty,
  Termination,
  Insurance,
  Restriction,
  ChangeOfControl,
  ForceMajeure,
  DisputeResolution,
}

impl ProvisionCategory {
  /// Node label in the property graph.
  pub fn label(self) -> &'static str {
    match self {
      Self::LiabilityCap => "LiabilityCap",
      Self::Indemnification => "Indemnification",
      Self::Obligation => "Obligation",
      Self::PaymentTerms => "PaymentTerms",
      Self::IntellectualProperty => "IntellectualProperty",
      Self::Confidentiality => "Confidentiality",
      Self::DataProtection => "DataProtection",
      Self::ComplianceFramework => "ComplianceFramework",
      Self::Warranty => "Warranty",
      Self::Termination => "Termination",
      Self::Insurance => "InsuranceRequirement",
      Self::Restriction => "Restriction",
      Self::ChangeOfControl => "ChangeOfControl",
      Self::ForceMajeure => "ForceMajeure",
      Self::DisputeResolution => "DisputeResolution",
    }
  }

  pub fn from_label(label: &str) -> Option<Self> {
    use strum::IntoEnumIterator;
    Self::iter().find(|c| c.label() == label)
  }

  /// Relationship type from the contract to a provision of this category.
  pub fn relationship(self) -> &'static str {
    match self {
      Self::LiabilityCap => "HAS_LIABILITY_CAP",
      Self::Indemnification => "HAS_INDEMNIFICATION",
      Self::Obligation => "HAS_OBLIGATION",
      Self::PaymentTerms => "HAS_PAYMENT_TERMS",
      Self::IntellectualProperty => "HAS_IP_PROVISION",
      Self::Confidentiality => "HAS_CONFIDENTIALITY",
      Self::DataProtection => "HAS_DATA_PROTECTION",
      Self::ComplianceFramework => "COMPLIES_WITH",
      Self::Warranty => "HAS_WARRANTY",
      Self::Termination => "HAS_TERMINATION_PROVISIONS",
      Self::Insurance => "HAS_INSURANCE_REQUIREMENT",
      Self::Restriction => "HAS_RESTRICTION",
      Self::ChangeOfControl => "HAS_CHANGE_OF_CONTROL",
      Self::ForceMajeure => "HAS_FORCE_MAJEURE",
      Self::DisputeResolution => "HAS_DISPUTE_RESOLUTION",
    }
  }

  /// At most one provision of this category per contract.
  pub fn is_singleton(self) -> bool {
    !matches!(
      self,
      Self::Indemnification
        | Self::Obligation
        | Self::IntellectualProperty
        | Self::ComplianceFramework
        | Self::Warranty
        | Self::Restriction
    )
  }
}

// ─── Enumerated attributes ───────────────────────────────────────────────────

/// How a liability cap is measured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapType {
  Aggregate,
  PerIncident,
  Annual,
  Unlimited,
  Other(String),
}

impl CapType {
  pub fn parse(raw: &str) -> Self {
    match crate::text::fold(raw).as_str() {
      "aggregate" | "total" | "cumulative" => Self::Aggregate,
      "perincident" | "perclaim" | "peroccurrence" => Self::PerIncident,
      "annual" | "peryear" | "yearly" => Self::Annual,
      "unlimited" | "uncapped" | "none" => Self::Unlimited,
      _ => Self::Other(raw.trim().to_owned()),
    }
  }
}

impl fmt::Display for CapType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Aggregate => f.write_str("aggregate"),
      Self::PerIncident => f.write_str("per_incident"),
      Self::Annual => f.write_str("annual"),
      Self::Unlimited => f.write_str("unlimited"),
      Self::Other(s) => f.write_str(s),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IpType {
  Ownership,
  License,
  JointOwnership,
  Assignment,
  Other(String),
}

impl IpType {
  pub fn parse(raw: &str) -> Self {
    match crate::text::fold(raw).as_str() {
      "ownership" => Self::Ownership,
      "license" | "licence" => Self::License,
      "jointownership" => Self::JointOwnership,
      "assignment" => Self::Assignment,
      _ => Self::Other(raw.trim().to_owned()),
    }
  }
}

impl fmt::Display for IpType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Ownership => f.write_str("ownership"),
      Self::License => f.write_str("license"),
      Self::JointOwnership => f.write_str("joint_ownership"),
      Self::Assignment => f.write_str("assignment"),
      Self::Other(s) => f.write_str(s),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeMethod {
  Arbitration,
  Litigation,
  Mediation,
  Negotiation,
  Other(String),
}

impl DisputeMethod {
  pub fn parse(raw: &str) -> Self {
    match crate::text::fold(raw).as_str() {
      "arbitration" | "bindingarbitration" => Self::Arbitration,
      "litigation" | "courts" | "court" => Self::Litigation,
      "mediation" => Self::Mediation,
      "negotiation" => Self::Negotiation,
      _ => Self::Other(raw.trim().to_owned()),
    }
  }
}

impl fmt::Display for DisputeMethod {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Arbitration => f.write_str("arbitration"),
      Self::Litigation => f.write_str("litigation"),
      Self::Mediation => f.write_str("mediation"),
      Self::Negotiation => f.write_str("negotiation"),
      Self::Other(s) => f.write_str(s),
    }
  }
}

// ─── Liability and risk ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiabilityCap {
  pub cap_amount:        Amount,
  pub currency:          Reported<String>,
  pub cap_type:          Reported<CapType>,
  pub calculation_basis: Reported<String>,
  pub applies_to_party:  Reported<String>,
  pub carve_outs:        Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Indemnification {
  pub indemnitor:  Reported<String>,
  pub indemnitee:  Reported<String>,
  pub scope:       Reported<String>,
  pub triggers:    Vec<String>,
  pub limitations: Vec<String>,
}

/// One required coverage inside an insurance requirement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Coverage {
  pub insurance_type:              Reported<String>,
  pub minimum_coverage:            Amount,
  pub currency:                    Reported<String>,
  pub additional_insured_required: Reported<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Insurance {
  pub coverages:      Vec<Coverage>,
  pub proof_required: Reported<bool>,
}

// ─── Performance ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Obligation {
  pub obligation_type:        Reported<String>,
  pub obligated_party:        Reported<String>,
  pub description:            Reported<String>,
  pub deadline:               Reported<String>,
  pub deliverables:           Vec<String>,
  pub performance_standards:  Reported<String>,
  pub consequences_of_breach: Reported<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentTerms {
  pub payment_schedule:     Reported<String>,
  pub payment_method:       Reported<String>,
  pub currency:             Reported<String>,
  pub late_payment_penalty: Reported<String>,
  pub pricing_model:        Reported<String>,
  pub price_increases:      Reported<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Warranty {
  pub warranty_type:      Reported<String>,
  pub warrantor:          Reported<String>,
  pub warranty_statement: Reported<String>,
  pub duration:           Reported<String>,
  pub remedies:           Vec<String>,
  pub disclaimers:        Vec<String>,
}

// ─── Intellectual property ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LicenseDetails {
  pub license_type:  Reported<String>,
  pub scope:         Reported<String>,
  pub territory:     Reported<String>,
  pub duration:      Reported<String>,
  pub sublicensable: Reported<bool>,
  pub transferable:  Reported<bool>,
  pub perpetual:     Reported<bool>,
  pub irrevocable:   Reported<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntellectualProperty {
  pub ip_type:        Reported<IpType>,
  pub owner:          Reported<String>,
  pub subject_matter: Reported<String>,
  pub license:        Reported<LicenseDetails>,
}

// ─── Confidentiality and data ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Confidentiality {
  pub duration:              Reported<String>,
  pub surviving_termination: Reported<bool>,
  pub exceptions:            Vec<String>,
  pub return_obligations:    Reported<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataProtection {
  pub gdpr_compliant:                Reported<bool>,
  pub data_processing_agreement:     Reported<bool>,
  pub data_subject_rights:           Vec<String>,
  pub breach_notification_period:    Reported<String>,
  pub data_location_restrictions:    Vec<String>,
  pub subprocessor_consent_required: Reported<bool>,
}

/// A compliance framework the contract references. Documents without a
/// framework name do not produce one of these.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplianceFramework {
  pub framework_name:         String,
  pub certification_required: Reported<bool>,
  pub audit_rights:           Reported<bool>,
  pub audit_frequency:        Reported<String>,
  pub specific_requirements:  Vec<String>,
}

/// Name matching shared by framework queries and framework rules, ignoring
/// case and punctuation: `"SOC 2 Type II"` answers to `"soc2"`.
pub fn framework_matches(stored: &str, requested: &str) -> bool {
  crate::text::mentions(stored, requested)
}

// ─── Termination ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvenienceTermination {
  pub allowed:         Reported<bool>,
  pub notice_period:   Reported<String>,
  pub termination_fee: Reported<String>,
  pub allowed_parties: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CauseTermination {
  pub breach_types:    Vec<String>,
  pub cure_period:     Reported<String>,
  pub notice_required: Reported<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostTerminationObligation {
  pub obligation:        Reported<String>,
  pub responsible_party: Reported<String>,
  pub duration:          Reported<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Termination {
  pub convenience:                  Reported<ConvenienceTermination>,
  pub cause:                        Reported<CauseTermination>,
  pub post_termination_obligations: Vec<PostTerminationObligation>,
  pub surviving_clauses:            Vec<String>,
}

// ─── Restrictions and control ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Restriction {
  pub restriction_type: Reported<String>,
  pub restricted_party: Reported<String>,
  pub description:      Reported<String>,
  pub duration:         Reported<String>,
  pub geographic_scope: Reported<String>,
  pub exceptions:       Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeOfControl {
  pub triggers_termination:  Reported<bool>,
  pub requires_consent:      Reported<bool>,
  pub notification_required: Reported<bool>,
  pub affected_party:        Reported<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForceMajeure {
  pub covered_events:             Vec<String>,
  pub notice_period:              Reported<String>,
  pub suspension_of_obligations:  Reported<bool>,
  pub termination_allowed:        Reported<bool>,
  pub termination_trigger_period: Reported<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisputeResolution {
  pub method:          Reported<DisputeMethod>,
  pub venue:           Reported<String>,
  pub jurisdiction:    Reported<String>,
  pub governing_rules: Reported<String>,
}

// ─── Provision ───────────────────────────────────────────────────────────────

/// A typed clause. The variant is the category; the payload is stored as the
/// node's property bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", content = "attributes", rename_all = "snake_case")]
pub enum Provision {
  LiabilityCap(LiabilityCap),
  Indemnification(Indemnification),
  Obligation(Obligation),
  PaymentTerms(PaymentTerms),
  IntellectualProperty(IntellectualProperty),
  Confidentiality(Confidentiality),
  DataProtection(DataProtection),
  ComplianceFramework(ComplianceFramework),
  Warranty(Warranty),
  Termination(Termination),
  Insurance(Insurance),
  Restriction(Restriction),
  ChangeOfControl(ChangeOfControl),
  ForceMajeure(ForceMajeure),
  DisputeResolution(DisputeResolution),
}

impl Provision {
  pub fn category(&self) -> ProvisionCategory {
    match self {
      Self::LiabilityCap(_) => ProvisionCategory::LiabilityCap,
      Self::Indemnification(_) => ProvisionCategory::Indemnification,
      Self::Obligation(_) => ProvisionCategory::Obligation,
      Self::PaymentTerms(_) => ProvisionCategory::PaymentTerms,
      Self::IntellectualProperty(_) => ProvisionCategory::IntellectualProperty,
      Self::Confidentiality(_) => ProvisionCategory::Confidentiality,
      Self::DataProtection(_) => ProvisionCategory::DataProtection,
      Self::ComplianceFramework(_) => ProvisionCategory::ComplianceFramework,
      Self::Warranty(_) => ProvisionCategory::Warranty,
      Self::Termination(_) => ProvisionCategory::Termination,
      Self::Insurance(_) => ProvisionCategory::Insurance,
      Self::Restriction(_) => ProvisionCategory::Restriction,
      Self::ChangeOfControl(_) => ProvisionCategory::ChangeOfControl,
      Self::ForceMajeure(_) => ProvisionCategory::ForceMajeure,
      Self::DisputeResolution(_) => ProvisionCategory::DisputeResolution,
    }
  }

  /// Serialise the payload (without the category tag) for a node's property
  /// bag.
  pub fn to_json(&self) -> Result<serde_json::Value> {
    let full = serde_json::to_value(self)?;
    Ok(full.get("attributes").cloned().unwrap_or(serde_json::Value::Null))
  }

  /// Rebuild from a stored category and property bag.
  pub fn from_parts(
    category: ProvisionCategory,
    attributes: serde_json::Value,
  ) -> Result<Self> {
    let wrapped = serde_json::json!({
      "category": category.as_ref(),
      "attributes": attributes,
    });
    Ok(serde_json::from_value(wrapped)?)
  }
}

#[cfg(test)]
mod tests {
  use strum::IntoEnumIterator;

  use super::*;

  #[test]
  fn labels_round_trip_for_every_category() {
    for category in ProvisionCategory::iter() {
      assert_eq!(ProvisionCategory::from_label(category.label()), Some(category));
    }
    assert_eq!(ProvisionCategory::from_label("Contract"), None);
  }

  #[test]
  fn payload_survives_storage_round_trip() {
    let provision = Provision::LiabilityCap(LiabilityCap {
      cap_amount: Amount::Known(5_000_000.0),
      currency: Reported::Stated("USD".into()),
      cap_type: Reported::Stated(CapType::Aggregate),
      carve_outs: vec!["gross negligence".into()],
      ..Default::default()
    });
    let json = provision.to_json().unwrap();
    let back =
      Provision::from_parts(ProvisionCategory::LiabilityCap, json).unwrap();
    assert_eq!(back, provision);
  }

  #[test]
  fn enumerated_values_parse_leniently() {
    assert_eq!(CapType::parse("Per-Incident"), CapType::PerIncident);
    assert_eq!(CapType::parse("AGGREGATE"), CapType::Aggregate);
    assert_eq!(CapType::parse("twice annual fees"), CapType::Other("twice annual fees".into()));
    assert_eq!(IpType::parse("joint ownership"), IpType::JointOwnership);
    assert_eq!(DisputeMethod::parse("Binding Arbitration"), DisputeMethod::Arbitration);
  }

  #[test]
  fn only_list_categories_repeat() {
    assert!(ProvisionCategory::LiabilityCap.is_singleton());
    assert!(ProvisionCategory::Insurance.is_singleton());
    assert!(!ProvisionCategory::Obligation.is_singleton());
    assert!(!ProvisionCategory::ComplianceFramework.is_singleton());
  }
}
