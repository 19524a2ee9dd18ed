//! Client standards: a named, ordered list of rules a contract is checked
//! against.
//!
//! Standards are plain data loaded from TOML or JSON, e.g.
//!
//! ```toml
//! client_id   = "acme-bank"
//! client_name = "Acme Bank"
//!
//! [[rules]]
//! rule_name = "max_liability_cap"
//! kind      = "threshold"
//! metric    = { name = "liability_cap_amount" }
//! bound     = "max"
//! value     = 5000000
//! ```
//!
//! Rule order is significant: reports list results in registration order.

use std::{collections::HashSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result, provision::ProvisionCategory};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientStandards {
  pub client_id:   String,
  pub client_name: String,
  #[serde(default)]
  pub rules:       Vec<Rule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
  pub rule_name: String,
  #[serde(flatten)]
  pub kind:      RuleKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleKind {
  /// "If the measured value exists, it must respect the bound." A contract
  /// without the underlying provision is not applicable.
  Threshold {
    metric: Metric,
    bound:  Bound,
    value:  f64,
  },
  /// Every member must be observed along `dimension`.
  RequiredSet {
    dimension: SetDimension,
    members:   Vec<String>,
  },
  /// The category must exist; when `minimum` is set its value must reach it.
  RequiredPresence {
    category: ProvisionCategory,
    #[serde(default)]
    minimum:  Option<Minimum>,
  },
  /// Every stated value of an enumerated attribute must be one of `allowed`.
  RequiredValue {
    attribute: Attribute,
    allowed:   Vec<String>,
  },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bound {
  Max,
  Min,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Minimum {
  pub metric: Metric,
  pub value:  f64,
}

// ─── Metrics ─────────────────────────────────────────────────────────────────

/// A numeric quantity read from one provision category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Metric {
  LiabilityCapAmount,
  /// Minimum coverage of the insurance type whose name mentions
  /// `insurance_type`.
  InsuranceCoverage { insurance_type: String },
  BreachNotificationHours,
  /// The highest uptime percentage stated by any obligation.
  SlaUptimePercent,
}

impl Metric {
  pub fn category(&self) -> ProvisionCategory {
    match self {
      Self::LiabilityCapAmount => ProvisionCategory::LiabilityCap,
      Self::InsuranceCoverage { .. } => ProvisionCategory::Insurance,
      Self::BreachNotificationHours => ProvisionCategory::DataProtection,
      Self::SlaUptimePercent => ProvisionCategory::Obligation,
    }
  }
}

impl fmt::Display for Metric {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::LiabilityCapAmount => f.write_str("liability cap amount"),
      Self::InsuranceCoverage { insurance_type } => {
        write!(f, "{insurance_type} insurance coverage")
      }
      Self::BreachNotificationHours => {
        f.write_str("breach notification period")
      }
      Self::SlaUptimePercent => f.write_str("SLA uptime"),
    }
  }
}

// ─── Set dimensions and attributes ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetDimension {
  ComplianceFrameworks,
  LiabilityCarveOuts,
  Deliverables,
  ProvisionCategories,
}

impl fmt::Display for SetDimension {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::ComplianceFrameworks => "compliance frameworks",
      Self::LiabilityCarveOuts => "liability carve-outs",
      Self::Deliverables => "deliverables",
      Self::ProvisionCategories => "provision categories",
    })
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
  CapType,
  IpType,
  DisputeMethod,
  GdprCompliant,
  AuditRights,
  TerminationForConvenience,
  Sublicensable,
}

impl Attribute {
  pub fn category(self) -> ProvisionCategory {
    match self {
      Self::CapType => ProvisionCategory::LiabilityCap,
      Self::IpType | Self::Sublicensable => {
        ProvisionCategory::IntellectualProperty
      }
      Self::DisputeMethod => ProvisionCategory::DisputeResolution,
      Self::GdprCompliant => ProvisionCategory::DataProtection,
      Self::AuditRights => ProvisionCategory::ComplianceFramework,
      Self::TerminationForConvenience => ProvisionCategory::Termination,
    }
  }

  /// Yes/no attributes; their allowed values are read as flags.
  pub fn is_flag(self) -> bool {
    matches!(
      self,
      Self::GdprCompliant
        | Self::AuditRights
        | Self::TerminationForConvenience
        | Self::Sublicensable
    )
  }
}

impl fmt::Display for Attribute {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::CapType => "cap type",
      Self::IpType => "IP type",
      Self::DisputeMethod => "dispute resolution method",
      Self::GdprCompliant => "GDPR compliance",
      Self::AuditRights => "audit rights",
      Self::TerminationForConvenience => "termination for convenience",
      Self::Sublicensable => "sublicensing",
    })
  }
}

// ─── Validation ──────────────────────────────────────────────────────────────

impl ClientStandards {
  /// Reject definitions that could never evaluate meaningfully.
  pub fn validate(&self) -> Result<()> {
    let invalid = |reason: String| Error::InvalidStandards {
      client_id: self.client_id.clone(),
      reason,
    };

    if self.client_id.trim().is_empty() {
      return Err(invalid("client_id is empty".to_owned()));
    }

    let mut names = HashSet::new();
    for rule in &self.rules {
      let name = rule.rule_name.trim();
      if name.is_empty() {
        return Err(invalid("a rule has an empty rule_name".to_owned()));
      }
      if !names.insert(name) {
        return Err(invalid(format!("duplicate rule_name {name:?}")));
      }

      match &rule.kind {
        RuleKind::Threshold { value, .. } if !value.is_finite() => {
          return Err(invalid(format!("rule {name:?}: value is not finite")));
        }
        RuleKind::RequiredSet { members, .. } if members.is_empty() => {
          return Err(invalid(format!("rule {name:?}: members is empty")));
        }
        RuleKind::RequiredSet {
          dimension: SetDimension::ProvisionCategories,
          members,
        } => {
          if let Some(bad) = members
            .iter()
            .find(|m| ProvisionCategory::from_str(m.trim()).is_err())
          {
            return Err(invalid(format!(
              "rule {name:?}: {bad:?} is not a provision category"
            )));
          }
        }
        RuleKind::RequiredPresence {
          category,
          minimum: Some(minimum),
        } => {
          if minimum.metric.category() != *category {
            return Err(invalid(format!(
              "rule {name:?}: metric {} does not belong to {category}",
              minimum.metric
            )));
          }
          if !minimum.value.is_finite() {
            return Err(invalid(format!(
              "rule {name:?}: minimum is not finite"
            )));
          }
        }
        RuleKind::RequiredValue { allowed, .. } if allowed.is_empty() => {
          return Err(invalid(format!("rule {name:?}: allowed is empty")));
        }
        _ => {}
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const TOML_STANDARDS: &str = r#"
client_id   = "acme-bank"
client_name = "Acme Bank"

[[rules]]
rule_name = "max_liability_cap"
kind      = "threshold"
metric    = { name = "liability_cap_amount" }
bound     = "max"
value     = 5000000

[[rules]]
rule_name = "required_frameworks"
kind      = "required_set"
dimension = "compliance_frameworks"
members   = ["SOC2", "GDPR"]

[[rules]]
rule_name = "insurance"
kind      = "required_presence"
category  = "insurance"
minimum   = { metric = { name = "insurance_coverage", insurance_type = "general liability" }, value = 2000000 }

[[rules]]
rule_name = "cap_type"
kind      = "required_value"
attribute = "cap_type"
allowed   = ["aggregate", "per_incident"]
"#;

  #[test]
  fn parses_all_rule_kinds_in_order() {
    let s: ClientStandards = toml::from_str(TOML_STANDARDS).unwrap();
    s.validate().unwrap();
    let names: Vec<_> = s.rules.iter().map(|r| r.rule_name.as_str()).collect();
    assert_eq!(
      names,
      ["max_liability_cap", "required_frameworks", "insurance", "cap_type"]
    );
    assert_eq!(
      s.rules[0].kind,
      RuleKind::Threshold {
        metric: Metric::LiabilityCapAmount,
        bound:  Bound::Max,
        value:  5_000_000.0,
      }
    );
  }

  #[test]
  fn parses_json_standards() {
    let s: ClientStandards = serde_json::from_value(serde_json::json!({
      "client_id": "c",
      "client_name": "C",
      "rules": [{
        "rule_name": "breach",
        "kind": "threshold",
        "metric": { "name": "breach_notification_hours" },
        "bound": "max",
        "value": 72
      }]
    }))
    .unwrap();
    s.validate().unwrap();
  }

  #[test]
  fn duplicate_rule_names_are_rejected() {
    let mut s: ClientStandards = toml::from_str(TOML_STANDARDS).unwrap();
    s.rules[1].rule_name = "max_liability_cap".into();
    assert!(matches!(s.validate(), Err(Error::InvalidStandards { .. })));
  }

  #[test]
  fn mismatched_presence_metric_is_rejected() {
    let s = ClientStandards {
      client_id:   "c".into(),
      client_name: "C".into(),
      rules:       vec![Rule {
        rule_name: "r".into(),
        kind:      RuleKind::RequiredPresence {
          category: ProvisionCategory::Insurance,
          minimum:  Some(Minimum {
            metric: Metric::LiabilityCapAmount,
            value:  1.0,
          }),
        },
      }],
    };
    assert!(s.validate().is_err());
  }

  #[test]
  fn unknown_category_in_set_is_rejected() {
    let s = ClientStandards {
      client_id:   "c".into(),
      client_name: "C".into(),
      rules:       vec![Rule {
        rule_name: "r".into(),
        kind:      RuleKind::RequiredSet {
          dimension: SetDimension::ProvisionCategories,
          members:   vec!["liability_cap".into(), "unicorns".into()],
        },
      }],
    };
    assert!(s.validate().is_err());
  }
}
