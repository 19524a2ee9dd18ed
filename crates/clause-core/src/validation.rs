//! Rule evaluation and report aggregation.
//!
//! Evaluation is a pure function of a contract and a client's standards, so
//! re-running it on unchanged data yields an identical report. Results keep
//! the order in which the rules were registered.

use std::{collections::HashSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
  contract::{Amount, Contract, ContractId, Reported},
  provision::{CapType, Provision, ProvisionCategory, framework_matches},
  standards::{
    Attribute, Bound, ClientStandards, Metric, Rule, RuleKind, SetDimension,
  },
  text,
};

/// Risk contribution of one failed rule.
pub const FAIL_WEIGHT: u32 = 10;
/// Risk contribution of one rule that could not be decided.
pub const WARNING_WEIGHT: u32 = 3;

// ─── Report types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleStatus {
  Pass,
  Fail,
  Warning,
  NotApplicable,
}

impl fmt::Display for RuleStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Pass => "PASS",
      Self::Fail => "FAIL",
      Self::Warning => "WARNING",
      Self::NotApplicable => "NOT_APPLICABLE",
    })
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallStatus {
  Pass,
  Warning,
  Fail,
}

impl fmt::Display for OverallStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Pass => "PASS",
      Self::Warning => "WARNING",
      Self::Fail => "FAIL",
    })
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleResult {
  pub rule_name:      String,
  pub status:         RuleStatus,
  /// `None` when nothing relevant was found on the contract.
  pub observed_value: Option<String>,
  pub required_value: String,
  pub explanation:    String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
  pub contract_id:    ContractId,
  pub client_id:      String,
  pub client_name:    String,
  pub rule_results:   Vec<RuleResult>,
  pub overall_status: OverallStatus,
  /// Weighted count of failures and warnings; an ordering heuristic only.
  pub risk_score:     u32,
}

// ─── Evaluation ──────────────────────────────────────────────────────────────

pub fn evaluate(
  contract: &Contract,
  standards: &ClientStandards,
) -> ValidationReport {
  let rule_results: Vec<RuleResult> = standards
    .rules
    .iter()
    .map(|rule| evaluate_rule(contract, rule))
    .collect();
  let (overall_status, risk_score) = aggregate(&rule_results);

  ValidationReport {
    contract_id: contract.contract_id.clone(),
    client_id: standards.client_id.clone(),
    client_name: standards.client_name.clone(),
    rule_results,
    overall_status,
    risk_score,
  }
}

/// FAIL beats WARNING beats PASS; NOT_APPLICABLE does not count.
pub fn aggregate(results: &[RuleResult]) -> (OverallStatus, u32) {
  let fails = results.iter().filter(|r| r.status == RuleStatus::Fail).count();
  let warnings = results
    .iter()
    .filter(|r| r.status == RuleStatus::Warning)
    .count();

  let overall = if fails > 0 {
    OverallStatus::Fail
  } else if warnings > 0 {
    OverallStatus::Warning
  } else {
    OverallStatus::Pass
  };
  let score = fails as u32 * FAIL_WEIGHT + warnings as u32 * WARNING_WEIGHT;
  (overall, score)
}

pub fn evaluate_rule(contract: &Contract, rule: &Rule) -> RuleResult {
  let (status, observed_value, required_value, explanation) = match &rule.kind
  {
    RuleKind::Threshold {
      metric,
      bound,
      value,
    } => threshold(contract, metric, *bound, *value),
    RuleKind::RequiredSet { dimension, members } => {
      required_set(contract, *dimension, members)
    }
    RuleKind::RequiredPresence { category, minimum } => {
      let (metric, value) = match minimum {
        Some(m) => (Some(&m.metric), m.value),
        None => (None, 0.0),
      };
      presence(contract, *category, metric, value)
    }
    RuleKind::RequiredValue { attribute, allowed } => {
      required_value(contract, *attribute, allowed)
    }
  };

  RuleResult {
    rule_name: rule.rule_name.clone(),
    status,
    observed_value,
    required_value,
    explanation,
  }
}

type Outcome = (RuleStatus, Option<String>, String, String);

// ─── Observation ─────────────────────────────────────────────────────────────

/// What a contract says about one metric.
#[derive(Debug, Clone, PartialEq)]
enum Observation {
  /// The metric's provision category is not on the contract.
  ProvisionAbsent,
  /// The provision exists but has no entry for the measured item.
  EntryAbsent,
  /// Stated but unparseable (`Some(raw)`), or not stated (`None`).
  Undetermined(Option<String>),
  Value(f64),
}

fn observe(contract: &Contract, metric: &Metric) -> Observation {
  match metric {
    Metric::LiabilityCapAmount => {
      let Some(cap) = contract.liability_cap() else {
        return Observation::ProvisionAbsent;
      };
      match (&cap.cap_amount, cap.cap_type.stated()) {
        (Amount::Known(v), _) => Observation::Value(*v),
        (Amount::Unknown, Some(CapType::Unlimited)) => {
          Observation::Value(f64::INFINITY)
        }
        (Amount::Unparsed(raw), _) => Observation::Undetermined(Some(raw.clone())),
        (Amount::Unknown, _) => Observation::Undetermined(None),
      }
    }

    Metric::InsuranceCoverage { insurance_type } => {
      let Some(insurance) = contract
        .provisions_of(ProvisionCategory::Insurance)
        .find_map(|p| match p {
          Provision::Insurance(i) => Some(i),
          _ => None,
        })
      else {
        return Observation::ProvisionAbsent;
      };
      let coverage = insurance.coverages.iter().find(|c| {
        c.insurance_type
          .stated()
          .is_some_and(|t| text::mentions(t, insurance_type))
      });
      match coverage.map(|c| &c.minimum_coverage) {
        None => Observation::EntryAbsent,
        Some(Amount::Known(v)) => Observation::Value(*v),
        Some(Amount::Unparsed(raw)) => Observation::Undetermined(Some(raw.clone())),
        Some(Amount::Unknown) => Observation::Undetermined(None),
      }
    }

    Metric::BreachNotificationHours => {
      let Some(dp) = contract
        .provisions_of(ProvisionCategory::DataProtection)
        .find_map(|p| match p {
          Provision::DataProtection(d) => Some(d),
          _ => None,
        })
      else {
        return Observation::ProvisionAbsent;
      };
      match dp.breach_notification_period.stated() {
        None => Observation::Undetermined(None),
        Some(raw) => text::parse_hours(raw).map_or_else(
          || Observation::Undetermined(Some(raw.clone())),
          Observation::Value,
        ),
      }
    }

    Metric::SlaUptimePercent => {
      if !contract.has(ProvisionCategory::Obligation) {
        return Observation::ProvisionAbsent;
      }
      contract
        .provisions
        .iter()
        .filter_map(|r| match &r.provision {
          Provision::Obligation(o) => Some((o, &r.excerpts)),
          _ => None,
        })
        .flat_map(|(o, excerpts)| {
          [&o.performance_standards, &o.description]
            .into_iter()
            .filter_map(Reported::stated)
            .chain(excerpts.iter())
            .flat_map(|t| text::percentages(t))
            .collect::<Vec<_>>()
        })
        .filter(|p| (0.0..=100.0).contains(p))
        .reduce(f64::max)
        .map_or(Observation::EntryAbsent, Observation::Value)
    }
  }
}

fn show(metric: &Metric, value: f64) -> String {
  match metric {
    Metric::LiabilityCapAmount | Metric::InsuranceCoverage { .. } => {
      text::format_amount(value)
    }
    Metric::BreachNotificationHours => format!("{} hours", number(value)),
    Metric::SlaUptimePercent => format!("{}%", number(value)),
  }
}

fn number(value: f64) -> String {
  if value.fract() == 0.0 && value.is_finite() {
    format!("{value:.0}")
  } else {
    value.to_string()
  }
}

fn bound_text(metric: &Metric, bound: Bound, value: f64) -> String {
  match bound {
    Bound::Max => format!("at most {}", show(metric, value)),
    Bound::Min => format!("at least {}", show(metric, value)),
  }
}

/// Compare a determined value against its bound.
fn compare(metric: &Metric, bound: Bound, limit: f64, observed: f64) -> Outcome {
  let shown = show(metric, observed);
  let (ok, verb) = match bound {
    Bound::Max => (observed <= limit, "exceeds the maximum of"),
    Bound::Min => (observed >= limit, "is below the minimum of"),
  };
  let explanation = if ok {
    format!("{metric} of {shown} satisfies the requirement")
  } else {
    format!("{metric} of {shown} {verb} {}", show(metric, limit))
  };
  (
    if ok { RuleStatus::Pass } else { RuleStatus::Fail },
    Some(shown),
    bound_text(metric, bound, limit),
    explanation,
  )
}

fn undetermined(metric: &Metric, raw: Option<String>, required: String) -> Outcome {
  let explanation = match &raw {
    Some(raw) => format!("{metric} is stated as {raw:?} and could not be read as a number"),
    None => format!("{metric} is not stated although the provision exists"),
  };
  (RuleStatus::Warning, raw, required, explanation)
}

// ─── Rule kinds ──────────────────────────────────────────────────────────────

fn threshold(contract: &Contract, metric: &Metric, bound: Bound, limit: f64) -> Outcome {
  let required = bound_text(metric, bound, limit);
  match observe(contract, metric) {
    Observation::ProvisionAbsent => (
      RuleStatus::NotApplicable,
      None,
      required,
      format!(
        "contract has no {} provision; the rule applies only when one exists",
        metric.category()
      ),
    ),
    Observation::EntryAbsent => (
      RuleStatus::NotApplicable,
      None,
      required,
      format!("no {metric} is stated; the rule applies only when one exists"),
    ),
    Observation::Undetermined(raw) => undetermined(metric, raw, required),
    Observation::Value(v) => compare(metric, bound, limit, v),
  }
}

fn presence(
  contract: &Contract,
  category: ProvisionCategory,
  minimum: Option<&Metric>,
  limit: f64,
) -> Outcome {
  let required = match minimum {
    Some(metric) => format!(
      "{category} present with {metric} {}",
      bound_text(metric, Bound::Min, limit)
    ),
    None => format!("{category} present"),
  };

  if !contract.has(category) {
    return (
      RuleStatus::Fail,
      None,
      required,
      format!("contract has no {category} provision"),
    );
  }
  let Some(metric) = minimum else {
    return (
      RuleStatus::Pass,
      Some("present".to_owned()),
      required,
      format!("{category} provision is present"),
    );
  };

  match observe(contract, metric) {
    Observation::ProvisionAbsent | Observation::EntryAbsent => (
      RuleStatus::Fail,
      None,
      required,
      format!("{category} provision does not state any {metric}"),
    ),
    Observation::Undetermined(raw) => undetermined(metric, raw, required),
    Observation::Value(v) => {
      let (status, observed, _, explanation) =
        compare(metric, Bound::Min, limit, v);
      (status, observed, required, explanation)
    }
  }
}

fn observed_set(contract: &Contract, dimension: SetDimension) -> Vec<String> {
  let mut out: Vec<String> = match dimension {
    SetDimension::ComplianceFrameworks => contract
      .provisions_of(ProvisionCategory::ComplianceFramework)
      .filter_map(|p| match p {
        Provision::ComplianceFramework(f) => Some(f.framework_name.clone()),
        _ => None,
      })
      .collect(),
    SetDimension::LiabilityCarveOuts => contract
      .liability_cap()
      .map(|c| c.carve_outs.clone())
      .unwrap_or_default(),
    SetDimension::Deliverables => contract
      .provisions_of(ProvisionCategory::Obligation)
      .filter_map(|p| match p {
        Provision::Obligation(o) => Some(o.deliverables.clone()),
        _ => None,
      })
      .flatten()
      .collect(),
    SetDimension::ProvisionCategories => contract
      .provisions
      .iter()
      .map(|r| r.provision.category().to_string())
      .collect(),
  };
  // First occurrence wins, so the observed value keeps document order.
  let mut seen = HashSet::new();
  out.retain(|v| seen.insert(v.clone()));
  out
}

fn required_set(
  contract: &Contract,
  dimension: SetDimension,
  members: &[String],
) -> Outcome {
  let observed = observed_set(contract, dimension);
  let matches = |required: &str| match dimension {
    SetDimension::ProvisionCategories => {
      ProvisionCategory::from_str(required.trim())
        .is_ok_and(|c| contract.has(c))
    }
    SetDimension::ComplianceFrameworks => {
      observed.iter().any(|o| framework_matches(o, required))
    }
    _ => observed.iter().any(|o| text::mentions(o, required)),
  };
  let missing: Vec<&str> = members
    .iter()
    .map(String::as_str)
    .filter(|m| !matches(m))
    .collect();

  let observed_value = if observed.is_empty() {
    None
  } else {
    Some(observed.join(", "))
  };
  let required = members.join(", ");

  if missing.is_empty() {
    (
      RuleStatus::Pass,
      observed_value,
      required,
      format!("all required {dimension} are present"),
    )
  } else {
    (
      RuleStatus::Fail,
      observed_value,
      required,
      format!("missing {dimension}: {}", missing.join(", ")),
    )
  }
}

/// Every stated value of `attribute` across the contract (`None` entries are
/// provisions that leave it unstated). `None` overall when the category is
/// absent.
fn attribute_values(
  contract: &Contract,
  attribute: Attribute,
) -> Option<Vec<Option<String>>> {
  let flag = |r: &Reported<bool>| r.stated().map(bool::to_string);
  let values: Vec<Option<String>> = contract
    .provisions_of(attribute.category())
    .map(|p| match (attribute, p) {
      (Attribute::CapType, Provision::LiabilityCap(c)) => {
        c.cap_type.stated().map(ToString::to_string)
      }
      (Attribute::IpType, Provision::IntellectualProperty(ip)) => {
        ip.ip_type.stated().map(ToString::to_string)
      }
      (Attribute::Sublicensable, Provision::IntellectualProperty(ip)) => {
        ip.license.stated().and_then(|l| flag(&l.sublicensable))
      }
      (Attribute::DisputeMethod, Provision::DisputeResolution(d)) => {
        d.method.stated().map(ToString::to_string)
      }
      (Attribute::GdprCompliant, Provision::DataProtection(d)) => {
        flag(&d.gdpr_compliant)
      }
      (Attribute::AuditRights, Provision::ComplianceFramework(f)) => {
        flag(&f.audit_rights)
      }
      (Attribute::TerminationForConvenience, Provision::Termination(t)) => {
        t.convenience.stated().and_then(|c| flag(&c.allowed))
      }
      _ => None,
    })
    .collect();
  if values.is_empty() { None } else { Some(values) }
}

fn required_value(
  contract: &Contract,
  attribute: Attribute,
  allowed: &[String],
) -> Outcome {
  let canonical = |v: &str| {
    if attribute.is_flag()
      && let Some(b) = text::parse_flag(v)
    {
      return b.to_string();
    }
    text::fold(v)
  };
  let allowed_keys: Vec<String> = allowed.iter().map(|a| canonical(a)).collect();
  let required = format!("one of {}", allowed.join(", "));

  let Some(values) = attribute_values(contract, attribute) else {
    return (
      RuleStatus::NotApplicable,
      None,
      required,
      format!(
        "contract has no {} provision; the rule applies only when one exists",
        attribute.category()
      ),
    );
  };

  let stated: Vec<&str> = values.iter().flatten().map(String::as_str).collect();
  let observed_value = if stated.is_empty() {
    None
  } else {
    Some(stated.join(", "))
  };
  let rejected: Vec<&str> = stated
    .iter()
    .copied()
    .filter(|v| !allowed_keys.contains(&canonical(v)))
    .collect();

  if !rejected.is_empty() {
    (
      RuleStatus::Fail,
      observed_value,
      required,
      format!("{attribute} {} is not allowed", rejected.join(", ")),
    )
  } else if values.iter().any(Option::is_none) {
    (
      RuleStatus::Warning,
      observed_value,
      required,
      format!("{attribute} is not stated on every {} provision", attribute.category()),
    )
  } else {
    (
      RuleStatus::Pass,
      observed_value,
      required,
      format!("{attribute} is allowed"),
    )
  }
}

// ─── Rendering ───────────────────────────────────────────────────────────────

impl fmt::Display for ValidationReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(
      f,
      "Validation of contract {} against {} ({})",
      self.contract_id, self.client_name, self.client_id
    )?;
    for r in &self.rule_results {
      writeln!(f, "  [{}] {}", r.status, r.rule_name)?;
      writeln!(
        f,
        "      observed: {}",
        r.observed_value.as_deref().unwrap_or("-")
      )?;
      writeln!(f, "      required: {}", r.required_value)?;
      writeln!(f, "      {}", r.explanation)?;
    }
    write!(
      f,
      "Overall: {} (risk score {})",
      self.overall_status, self.risk_score
    )
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::{
    contract::IdentitySource,
    document::ExtractedDocument,
    standards::Minimum,
  };

  fn contract(raw: serde_json::Value) -> Contract {
    ExtractedDocument::new(raw, None)
      .decode(ContractId::from("c-1"), IdentitySource::Explicit)
      .unwrap()
  }

  fn rule(name: &str, kind: RuleKind) -> Rule {
    Rule {
      rule_name: name.to_owned(),
      kind,
    }
  }

  fn standards(rules: Vec<Rule>) -> ClientStandards {
    ClientStandards {
      client_id: "acme".into(),
      client_name: "Acme Bank".into(),
      rules,
    }
  }

  #[test]
  fn observed_set_drops_repeats_that_are_not_adjacent() {
    let c = contract(json!({
      "parties": ["Acme"],
      "obligations": [
        { "obligation_type": "a", "deliverables": ["report", "audit"] },
        { "obligation_type": "b", "deliverables": ["report"] }
      ]
    }));
    let result = evaluate_rule(
      &c,
      &rule("deliverables", RuleKind::RequiredSet {
        dimension: SetDimension::Deliverables,
        members:   vec!["report".into()],
      }),
    );
    assert_eq!(result.status, RuleStatus::Pass);
    assert_eq!(result.observed_value.as_deref(), Some("report, audit"));
  }

  fn max_cap(value: f64) -> RuleKind {
    RuleKind::Threshold {
      metric: Metric::LiabilityCapAmount,
      bound: Bound::Max,
      value,
    }
  }

  fn insurance_presence() -> RuleKind {
    RuleKind::RequiredPresence {
      category: ProvisionCategory::Insurance,
      minimum:  None,
    }
  }

  #[test]
  fn cap_above_maximum_fails_with_one_result() {
    let c = contract(json!({
      "parties": ["Acme"],
      "liability_cap": { "cap_amount": 6000000, "cap_type": "aggregate" }
    }));
    let report = evaluate(&c, &standards(vec![rule("max_liability_cap", max_cap(5_000_000.0))]));

    assert_eq!(report.overall_status, OverallStatus::Fail);
    assert_eq!(report.risk_score, FAIL_WEIGHT);
    let fails: Vec<_> = report
      .rule_results
      .iter()
      .filter(|r| r.status == RuleStatus::Fail)
      .collect();
    assert_eq!(fails.len(), 1);
    assert_eq!(fails[0].rule_name, "max_liability_cap");
    assert_eq!(fails[0].observed_value.as_deref(), Some("6,000,000"));
    assert_eq!(fails[0].required_value, "at most 5,000,000");
  }

  #[test]
  fn re_evaluation_is_identical() {
    let c = contract(json!({
      "parties": ["Acme"],
      "liability_cap": { "cap_amount": 6000000 }
    }));
    let s = standards(vec![
      rule("a", max_cap(5_000_000.0)),
      rule("b", insurance_presence()),
    ]);
    assert_eq!(evaluate(&c, &s), evaluate(&c, &s));
  }

  #[test]
  fn results_follow_registration_order() {
    let c = contract(json!({ "parties": ["Acme"] }));
    let s = standards(vec![
      rule("C", insurance_presence()),
      rule("A", max_cap(1.0)),
      rule("B", insurance_presence()),
    ]);
    let names: Vec<_> = evaluate(&c, &s)
      .rule_results
      .into_iter()
      .map(|r| r.rule_name)
      .collect();
    assert_eq!(names, ["C", "A", "B"]);
  }

  #[test]
  fn absent_provisions_fail_presence_but_skip_thresholds() {
    let c = contract(json!({ "parties": ["Acme"] }));
    let report = evaluate(
      &c,
      &standards(vec![
        rule("needs_insurance", insurance_presence()),
        rule("cap_if_any", max_cap(5_000_000.0)),
      ]),
    );
    assert_eq!(report.rule_results[0].status, RuleStatus::Fail);
    assert_eq!(report.rule_results[1].status, RuleStatus::NotApplicable);
    assert_eq!(report.overall_status, OverallStatus::Fail);
  }

  #[test]
  fn unparseable_cap_is_a_warning() {
    let c = contract(json!({
      "parties": ["Acme"],
      "liability_cap": { "cap_amount": "fees paid in the prior twelve months" }
    }));
    let report = evaluate(&c, &standards(vec![rule("cap", max_cap(5_000_000.0))]));
    assert_eq!(report.rule_results[0].status, RuleStatus::Warning);
    assert_eq!(report.overall_status, OverallStatus::Warning);
    assert_eq!(report.risk_score, WARNING_WEIGHT);
  }

  #[test]
  fn unlimited_cap_exceeds_any_maximum() {
    let c = contract(json!({
      "parties": ["Acme"],
      "liability_cap": { "cap_type": "unlimited" }
    }));
    let report = evaluate(&c, &standards(vec![rule("cap", max_cap(5_000_000.0))]));
    assert_eq!(report.rule_results[0].status, RuleStatus::Fail);
    assert_eq!(report.rule_results[0].observed_value.as_deref(), Some("unlimited"));
  }

  #[test]
  fn required_frameworks_name_missing_members() {
    let c = contract(json!({
      "parties": ["Acme"],
      "compliance_frameworks": [{ "framework_name": "SOC 2 Type II" }]
    }));
    let report = evaluate(
      &c,
      &standards(vec![rule("frameworks", RuleKind::RequiredSet {
        dimension: SetDimension::ComplianceFrameworks,
        members:   vec!["SOC2".into(), "GDPR".into()],
      })]),
    );
    let r = &report.rule_results[0];
    assert_eq!(r.status, RuleStatus::Fail);
    assert!(r.explanation.contains("GDPR"));
    assert!(!r.explanation.contains("SOC2"));
  }

  #[test]
  fn insurance_minimum_coverage_by_type() {
    let c = contract(json!({
      "parties": ["Acme"],
      "insurance": {
        "types": [
          { "insurance_type": "General Liability", "minimum_coverage": "$1,000,000" },
          { "insurance_type": "Cyber", "minimum_coverage": 5000000 }
        ]
      }
    }));
    let presence = |insurance_type: &str| RuleKind::RequiredPresence {
      category: ProvisionCategory::Insurance,
      minimum:  Some(Minimum {
        metric: Metric::InsuranceCoverage {
          insurance_type: insurance_type.to_owned(),
        },
        value:  2_000_000.0,
      }),
    };
    let report = evaluate(
      &c,
      &standards(vec![
        rule("gl", presence("general liability")),
        rule("cyber", presence("cyber")),
        rule("e_and_o", presence("errors and omissions")),
      ]),
    );
    let statuses: Vec<_> = report.rule_results.iter().map(|r| r.status).collect();
    assert_eq!(statuses, [RuleStatus::Fail, RuleStatus::Pass, RuleStatus::Fail]);
  }

  #[test]
  fn breach_window_and_sla_are_read_from_text() {
    let c = contract(json!({
      "parties": ["Acme"],
      "data_protection": { "breach_notification_period": "within 3 business days" },
      "obligations": [{ "performance_standards": "99.5% monthly uptime" }]
    }));
    let report = evaluate(
      &c,
      &standards(vec![
        rule("breach", RuleKind::Threshold {
          metric: Metric::BreachNotificationHours,
          bound:  Bound::Max,
          value:  48.0,
        }),
        rule("sla", RuleKind::Threshold {
          metric: Metric::SlaUptimePercent,
          bound:  Bound::Min,
          value:  99.9,
        }),
      ]),
    );
    assert_eq!(report.rule_results[0].status, RuleStatus::Fail);
    assert_eq!(report.rule_results[0].observed_value.as_deref(), Some("72 hours"));
    assert_eq!(report.rule_results[1].status, RuleStatus::Fail);
    assert_eq!(report.rule_results[1].observed_value.as_deref(), Some("99.5%"));
  }

  #[test]
  fn enumerated_values_compare_leniently() {
    let c = contract(json!({
      "parties": ["Acme"],
      "liability_cap": { "cap_amount": 1, "cap_type": "Per Incident" },
      "data_protection": { "gdpr_compliant": "yes" },
      "intellectual_property": [
        { "ip_type": "license", "license_details": { "sublicensable": true } },
        { "ip_type": "license" }
      ]
    }));
    let value = |attribute, allowed: &[&str]| RuleKind::RequiredValue {
      attribute,
      allowed: allowed.iter().map(|s| s.to_string()).collect(),
    };
    let report = evaluate(
      &c,
      &standards(vec![
        rule("cap_type", value(Attribute::CapType, &["aggregate", "per-incident"])),
        rule("gdpr", value(Attribute::GdprCompliant, &["yes"])),
        rule("sublicense", value(Attribute::Sublicensable, &["false"])),
        rule("dispute", value(Attribute::DisputeMethod, &["arbitration"])),
      ]),
    );
    let statuses: Vec<_> = report.rule_results.iter().map(|r| r.status).collect();
    assert_eq!(statuses, [
      RuleStatus::Pass,
      RuleStatus::Pass,
      RuleStatus::Fail,
      RuleStatus::NotApplicable,
    ]);
  }

  #[test]
  fn report_renders_in_rule_order() {
    let c = contract(json!({ "parties": ["Acme"] }));
    let report = evaluate(
      &c,
      &standards(vec![
        rule("first", insurance_presence()),
        rule("second", max_cap(1.0)),
      ]),
    );
    let rendered = report.to_string();
    let first = rendered.find("[FAIL] first").unwrap();
    let second = rendered.find("[NOT_APPLICABLE] second").unwrap();
    assert!(first < second);
    assert!(rendered.ends_with("Overall: FAIL (risk score 10)"));
  }

  #[test]
  fn statuses_serialise_in_screaming_case() {
    assert_eq!(
      serde_json::to_value(RuleStatus::NotApplicable).unwrap(),
      json!("NOT_APPLICABLE")
    );
  }
}
