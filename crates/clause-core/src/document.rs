//! The extraction output as it arrives, and its lenient decoding into a
//! [`Contract`].
//!
//! Decoding never fails on optional data. A field that is missing, null or of
//! the wrong shape becomes [`Reported::Unknown`]; a provision block of the
//! wrong shape becomes a provision with every field unknown. The only hard
//! failure is a document with no parties at all.

use serde_json::{Map, Value};

use crate::{
  Error, Result,
  contract::{
    Amount, Contract, ContractAttributes, ContractId, GoverningLaw,
    IdentitySource, Money, Party, ProvisionRecord, Reported,
  },
  provision::{
    CapType, CauseTermination, ChangeOfControl, ComplianceFramework,
    Confidentiality, ConvenienceTermination, Coverage, DataProtection,
    DisputeMethod, DisputeResolution, ForceMajeure, Indemnification, Insurance,
    IntellectualProperty, IpType, LiabilityCap, LicenseDetails, Obligation,
    PaymentTerms, PostTerminationObligation, Provision, Restriction,
    Termination, Warranty,
  },
  text,
};

/// One extraction result, plus the name of the file it came from (if any).
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
  pub raw:         Value,
  pub source_name: Option<String>,
}

impl ExtractedDocument {
  /// Documents in the older extraction layout are rewritten into the
  /// current one on the way in.
  pub fn new(raw: Value, source_name: Option<String>) -> Self {
    Self {
      raw: crate::legacy::adapt(raw),
      source_name,
    }
  }

  /// Parse a JSON document. The error names the source so a failing batch
  /// entry is traceable.
  pub fn from_slice(bytes: &[u8], source_name: Option<String>) -> Result<Self> {
    let raw = serde_json::from_slice(bytes).map_err(|e| Error::Identity {
      source_ref: source_name
        .clone()
        .unwrap_or_else(|| "<unnamed document>".to_owned()),
      reason:     format!("not valid JSON: {e}"),
    })?;
    Ok(Self::new(raw, source_name))
  }

  /// Human-readable reference for errors raised before an id exists.
  pub fn source_ref(&self) -> String {
    self
      .source_name
      .clone()
      .unwrap_or_else(|| "<unnamed document>".to_owned())
  }

  /// The `agreement` object, or the document root when the extractor wrote
  /// the agreement fields at the top level.
  pub fn agreement(&self) -> &Value {
    match self.raw.get("agreement") {
      Some(a) if a.is_object() => a,
      _ => &self.raw,
    }
  }

  /// An identifier carried by the document itself, top-level first.
  pub fn explicit_id(&self) -> Option<String> {
    [self.raw.get("contract_id"), self.agreement().get("contract_id")]
      .into_iter()
      .flatten()
      .find_map(id_value)
  }

  /// Decode into a contract under an already-resolved id.
  pub fn decode(
    &self,
    contract_id: ContractId,
    identity: IdentitySource,
  ) -> Result<Contract> {
    let a = self.agreement();

    let parties: Vec<Party> = entries(a.get("parties"))
      .into_iter()
      .filter_map(decode_party)
      .collect();
    if parties.is_empty() {
      return Err(Error::Ingestion {
        contract_id: contract_id.to_string(),
        reason:      "document lists no parties".to_owned(),
      });
    }

    let attributes = ContractAttributes {
      identity,
      name: string(a.get("agreement_name")),
      agreement_type: string(a.get("agreement_type")),
      effective_date: string(a.get("effective_date")),
      expiration_date: string(a.get("expiration_date")),
      agreement_date: string(a.get("agreement_date")),
      renewal_term: string(a.get("renewal_term")),
      auto_renewal: flag(a.get("auto_renewal")),
      total_value: block(a.get("total_contract_value")).map_or(
        Reported::Unknown,
        |m| {
          Reported::Stated(Money {
            amount:   amount(m.get("amount")),
            currency: string(m.get("currency")),
          })
        },
      ),
      governing_law: block(a.get("governing_law")).map_or(
        Reported::Unknown,
        |m| {
          Reported::Stated(GoverningLaw {
            country: string(m.get("country")),
            state:   string(m.get("state")),
          })
        },
      ),
    };

    Ok(Contract {
      contract_id,
      attributes,
      parties,
      provisions: decode_provisions(a),
    })
  }
}

// ─── Provisions ──────────────────────────────────────────────────────────────

fn decode_provisions(a: &Value) -> Vec<ProvisionRecord> {
  let mut out = Vec::new();
  let mut push = |provision: Provision, m: &Map<String, Value>| {
    out.push(ProvisionRecord { provision, excerpts: excerpts(m) });
  };

  if let Some(m) = gated_block(a.get("liability_cap"), "exists") {
    push(Provision::LiabilityCap(decode_liability_cap(&m)), &m);
  }
  for m in blocks(a.get("indemnification")) {
    push(
      Provision::Indemnification(Indemnification {
        indemnitor:  string(m.get("indemnitor")),
        indemnitee:  string(m.get("indemnitee")),
        scope:       string(m.get("scope")),
        triggers:    list(m.get("triggers")),
        limitations: list(m.get("limitations")),
      }),
      &m,
    );
  }
  for m in blocks(a.get("obligations")) {
    push(
      Provision::Obligation(Obligation {
        obligation_type:        string(m.get("obligation_type")),
        obligated_party:        string(m.get("obligated_party")),
        description:            string(m.get("description")),
        deadline:               string(m.get("deadline")),
        deliverables:           list(m.get("deliverables")),
        performance_standards:  string(m.get("performance_standards")),
        consequences_of_breach: string(m.get("consequences_of_breach")),
      }),
      &m,
    );
  }
  if let Some(m) = gated_block(a.get("payment_terms"), "exists") {
    push(
      Provision::PaymentTerms(PaymentTerms {
        payment_schedule:     string(m.get("payment_schedule")),
        payment_method:       string(m.get("payment_method")),
        currency:             string(m.get("currency")),
        late_payment_penalty: string(m.get("late_payment_penalty")),
        pricing_model:        string(m.get("pricing_model")),
        price_increases:      string(m.get("price_increases")),
      }),
      &m,
    );
  }
  for m in blocks(a.get("intellectual_property")) {
    push(Provision::IntellectualProperty(decode_ip(&m)), &m);
  }
  if let Some(m) = gated_block(a.get("confidentiality"), "exists") {
    push(
      Provision::Confidentiality(Confidentiality {
        duration:              string(m.get("duration")),
        surviving_termination: flag(m.get("surviving_termination")),
        exceptions:            list(m.get("exceptions")),
        return_obligations:    flag(m.get("return_obligations")),
      }),
      &m,
    );
  }
  if let Some(m) = gated_block(a.get("data_protection"), "exists") {
    push(
      Provision::DataProtection(DataProtection {
        gdpr_compliant:                flag(m.get("gdpr_compliant")),
        data_processing_agreement:     flag(m.get("data_processing_agreement")),
        data_subject_rights:           list(m.get("data_subject_rights")),
        breach_notification_period:    string(
          m.get("breach_notification_period"),
        ),
        data_location_restrictions:    list(
          m.get("data_location_restrictions"),
        ),
        subprocessor_consent_required: flag(
          m.get("subprocessor_consent_required"),
        ),
      }),
      &m,
    );
  }
  for m in blocks(a.get("compliance_frameworks")) {
    // A framework reference without a name carries nothing to match on.
    let Reported::Stated(framework_name) = string(m.get("framework_name"))
    else {
      continue;
    };
    push(
      Provision::ComplianceFramework(ComplianceFramework {
        framework_name,
        certification_required: flag(m.get("certification_required")),
        audit_rights: flag(m.get("audit_rights")),
        audit_frequency: string(m.get("audit_frequency")),
        specific_requirements: list(m.get("specific_requirements")),
      }),
      &m,
    );
  }
  for m in blocks(a.get("warranties")) {
    push(
      Provision::Warranty(Warranty {
        warranty_type:      string(m.get("warranty_type")),
        warrantor:          string(m.get("warrantor")),
        warranty_statement: string(m.get("warranty_statement")),
        duration:           string(m.get("duration")),
        remedies:           list(m.get("remedies")),
        disclaimers:        list(m.get("disclaimers")),
      }),
      &m,
    );
  }
  if let Some(m) = gated_block(a.get("termination"), "exists") {
    push(Provision::Termination(decode_termination(&m)), &m);
  }
  if let Some(m) = gated_block(a.get("insurance"), "required") {
    push(Provision::Insurance(decode_insurance(&m)), &m);
  }
  for m in blocks(a.get("restrictions")) {
    push(
      Provision::Restriction(Restriction {
        restriction_type: string(m.get("restriction_type")),
        restricted_party: string(m.get("restricted_party")),
        description:      string(m.get("description")),
        duration:         string(m.get("duration")),
        geographic_scope: string(m.get("geographic_scope")),
        exceptions:       list(m.get("exceptions")),
      }),
      &m,
    );
  }
  if let Some(m) = gated_block(a.get("change_of_control"), "exists") {
    push(
      Provision::ChangeOfControl(ChangeOfControl {
        triggers_termination:  flag(m.get("triggers_termination")),
        requires_consent:      flag(m.get("requires_consent")),
        notification_required: flag(m.get("notification_required")),
        affected_party:        string(m.get("affected_party")),
      }),
      &m,
    );
  }
  if let Some(m) = gated_block(a.get("force_majeure"), "exists") {
    push(
      Provision::ForceMajeure(ForceMajeure {
        covered_events:             list(m.get("covered_events")),
        notice_period:              string(m.get("notice_period")),
        suspension_of_obligations:  flag(m.get("suspension_of_obligations")),
        termination_allowed:        flag(m.get("termination_allowed")),
        termination_trigger_period: string(
          m.get("termination_trigger_period"),
        ),
      }),
      &m,
    );
  }
  if let Some(m) = gated_block(a.get("dispute_resolution"), "exists") {
    push(
      Provision::DisputeResolution(DisputeResolution {
        method:          string(m.get("method")).map(|s| DisputeMethod::parse(&s)),
        venue:           string(m.get("venue")),
        jurisdiction:    string(m.get("jurisdiction")),
        governing_rules: string(m.get("governing_rules")),
      }),
      &m,
    );
  }

  out
}

fn decode_liability_cap(m: &Map<String, Value>) -> LiabilityCap {
  LiabilityCap {
    cap_amount:        amount(m.get("cap_amount")),
    currency:          string(m.get("currency")),
    cap_type:          string(m.get("cap_type")).map(|s| CapType::parse(&s)),
    calculation_basis: string(m.get("calculation_basis")),
    applies_to_party:  string(m.get("applies_to_party")),
    carve_outs:        list(m.get("carve_outs")),
  }
}

fn decode_ip(m: &Map<String, Value>) -> IntellectualProperty {
  IntellectualProperty {
    ip_type:        string(m.get("ip_type")).map(|s| IpType::parse(&s)),
    owner:          string(m.get("owner")),
    subject_matter: string(m.get("subject_matter")),
    license:        block(m.get("license_details")).map_or(
      Reported::Unknown,
      |l| {
        Reported::Stated(LicenseDetails {
          license_type:  string(l.get("license_type")),
          scope:         string(l.get("scope")),
          territory:     string(l.get("territory")),
          duration:      string(l.get("duration")),
          sublicensable: flag(l.get("sublicensable")),
          transferable:  flag(l.get("transferable")),
          perpetual:     flag(l.get("perpetual")),
          irrevocable:   flag(l.get("irrevocable")),
        })
      },
    ),
  }
}

fn decode_termination(m: &Map<String, Value>) -> Termination {
  Termination {
    convenience:                  block(m.get("termination_for_convenience"))
      .map_or(Reported::Unknown, |c| {
        Reported::Stated(ConvenienceTermination {
          allowed:         flag(c.get("allowed")),
          notice_period:   string(c.get("notice_period")),
          termination_fee: string(c.get("termination_fee")),
          allowed_parties: list(c.get("allowed_parties")),
        })
      }),
    cause:                        block(m.get("termination_for_cause")).map_or(
      Reported::Unknown,
      |c| {
        Reported::Stated(CauseTermination {
          breach_types:    list(c.get("breach_types")),
          cure_period:     string(c.get("cure_period")),
          notice_required: flag(c.get("notice_required")),
        })
      },
    ),
    post_termination_obligations: blocks(
      m.get("post_termination_obligations"),
    )
    .into_iter()
    .map(|o| PostTerminationObligation {
      obligation:        string(o.get("obligation")),
      responsible_party: string(o.get("responsible_party")),
      duration:          string(o.get("duration")),
    })
    .collect(),
    surviving_clauses:            list(m.get("surviving_clauses")),
  }
}

fn decode_insurance(m: &Map<String, Value>) -> Insurance {
  Insurance {
    coverages:      blocks(m.get("types"))
      .into_iter()
      .map(|t| Coverage {
        insurance_type:              string(t.get("insurance_type")),
        minimum_coverage:            amount(t.get("minimum_coverage")),
        currency:                    string(t.get("currency")),
        additional_insured_required: flag(
          t.get("additional_insured_required"),
        ),
      })
      .collect(),
    proof_required: flag(m.get("proof_required")),
  }
}

fn decode_party(entry: &Value) -> Option<Party> {
  match entry {
    Value::String(s) if !s.trim().is_empty() => Some(Party {
      name: Reported::Stated(s.trim().to_owned()),
      ..Default::default()
    }),
    Value::Object(m) => Some(Party {
      name:                  string(m.get("name")),
      role:                  string(m.get("role")),
      incorporation_country: string(m.get("incorporation_country")),
      incorporation_state:   string(m.get("incorporation_state")),
    }),
    _ => None,
  }
}

// ─── Lenient accessors ───────────────────────────────────────────────────────

fn id_value(v: &Value) -> Option<String> {
  match v {
    Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

fn string(v: Option<&Value>) -> Reported<String> {
  match v {
    Some(Value::String(s)) if !s.trim().is_empty() => {
      Reported::Stated(s.trim().to_owned())
    }
    Some(Value::Number(n)) => Reported::Stated(n.to_string()),
    Some(Value::Bool(b)) => Reported::Stated(b.to_string()),
    _ => Reported::Unknown,
  }
}

fn flag(v: Option<&Value>) -> Reported<bool> {
  match v {
    Some(Value::Bool(b)) => Reported::Stated(*b),
    Some(Value::String(s)) => text::parse_flag(s).into(),
    Some(Value::Number(n)) => match n.as_i64() {
      Some(0) => Reported::Stated(false),
      Some(1) => Reported::Stated(true),
      _ => Reported::Unknown,
    },
    _ => Reported::Unknown,
  }
}

fn amount(v: Option<&Value>) -> Amount {
  match v {
    None | Some(Value::Null) => Amount::Unknown,
    Some(Value::Number(n)) => {
      n.as_f64().filter(|f| f.is_finite()).map_or_else(
        || Amount::Unparsed(n.to_string()),
        Amount::Known,
      )
    }
    Some(Value::String(s)) if s.trim().is_empty() => Amount::Unknown,
    Some(Value::String(s)) => text::parse_amount(s)
      .map_or_else(|| Amount::Unparsed(s.trim().to_owned()), Amount::Known),
    Some(other) => Amount::Unparsed(other.to_string()),
  }
}

/// Strings from an array (or a lone string), trimmed, empties dropped.
fn list(v: Option<&Value>) -> Vec<String> {
  let items: Vec<&Value> = match v {
    Some(Value::Array(items)) => items.iter().collect(),
    Some(single @ Value::String(_)) => vec![single],
    _ => Vec::new(),
  };
  items
    .into_iter()
    .filter_map(|i| i.as_str())
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(str::to_owned)
    .collect()
}

fn excerpts(m: &Map<String, Value>) -> Vec<String> {
  let mut seen = Vec::new();
  for e in list(m.get("excerpts")) {
    if !seen.contains(&e) {
      seen.push(e);
    }
  }
  seen
}

fn block(v: Option<&Value>) -> Option<&Map<String, Value>> {
  v.and_then(Value::as_object)
}

/// Array elements (or a lone value) that can stand for a provision block.
fn entries(v: Option<&Value>) -> Vec<&Value> {
  match v {
    Some(Value::Array(items)) => items.iter().collect(),
    Some(Value::Null) | None => Vec::new(),
    Some(single) => vec![single],
  }
}

fn blocks(v: Option<&Value>) -> Vec<Map<String, Value>> {
  entries(v)
    .into_iter()
    .filter_map(|e| match e {
      Value::Object(m) => Some(m.clone()),
      Value::Null => None,
      _ => Some(Map::new()),
    })
    .collect()
}

/// A singleton provision block. Absent, null and `false` mean "no such
/// provision"; so does an explicit `gate: false` flag inside the block. Any
/// other non-object value yields an empty block whose fields decode as
/// unknown.
fn gated_block(v: Option<&Value>, gate: &str) -> Option<Map<String, Value>> {
  let m = match v? {
    Value::Null | Value::Bool(false) => return None,
    Value::Object(m) => m.clone(),
    _ => Map::new(),
  };
  match flag(m.get(gate)) {
    Reported::Stated(false) => None,
    _ => Some(m),
  }
}
