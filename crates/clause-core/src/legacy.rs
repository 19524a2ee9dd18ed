//! Rewrites documents in the older extraction layout into the current one.
//!
//! The older layout nests the agreement basics under
//! `basic_agreement_information` (with `contract_type` and `auto_renew` for
//! `agreement_type` and `auto_renewal`), governing law and disputes under
//! `governing_law_and_dispute_resolution`, and carries provisions as generic
//! top-level `clauses`: each a `title`, `excerpts` and named `variables`.
//!
//! Every step only fills fields the current layout leaves empty, so a current
//! document passes through unchanged.

use serde_json::{Map, Value};

const BASICS: &str = "basic_agreement_information";
const LAW_AND_DISPUTES: &str = "governing_law_and_dispute_resolution";

/// `(older name, current name)` for the agreement basics.
const BASIC_FIELDS: &[(&str, &str)] = &[
  ("agreement_name", "agreement_name"),
  ("contract_type", "agreement_type"),
  ("agreement_type", "agreement_type"),
  ("agreement_date", "agreement_date"),
  ("effective_date", "effective_date"),
  ("expiration_date", "expiration_date"),
  ("renewal_term", "renewal_term"),
  ("auto_renew", "auto_renewal"),
  ("total_contract_value", "total_contract_value"),
  ("parties", "parties"),
];

/// Where a clause lands in the current layout.
#[derive(Clone, Copy)]
enum Slot {
  /// A singleton block such as `liability_cap`.
  Single(&'static str),
  /// An entry of a list such as `warranties`; the clause title fills the
  /// named field when the variables leave it empty.
  Listed(&'static str, Option<&'static str>),
}

/// Title keywords, first match wins. Anything else is an obligation.
const CLAUSE_SLOTS: &[(&[&str], Slot)] = &[
  (&["liabilit"], Slot::Single("liability_cap")),
  (&["indemn"], Slot::Listed("indemnification", None)),
  (&["force majeure"], Slot::Single("force_majeure")),
  (&["change of control"], Slot::Single("change_of_control")),
  (&["data protection", "privacy", "personal data"], Slot::Single("data_protection")),
  (&["confidential", "non-disclosure"], Slot::Single("confidentiality")),
  (&["payment", "invoic", "fees"], Slot::Single("payment_terms")),
  (&["warrant"], Slot::Listed("warranties", Some("warranty_type"))),
  (&["terminat"], Slot::Single("termination")),
  (&["insurance"], Slot::Single("insurance")),
  (&["dispute", "arbitrat"], Slot::Single("dispute_resolution")),
  (
    &["intellectual property", "licen"],
    Slot::Listed("intellectual_property", Some("subject_matter")),
  ),
  (
    &["non-compet", "non-solicit", "exclusiv", "restrict"],
    Slot::Listed("restrictions", Some("restriction_type")),
  ),
];

const OBLIGATION: Slot = Slot::Listed("obligations", Some("obligation_type"));

/// Rewrite `raw` into the current layout. Non-object documents are returned
/// as they are.
pub(crate) fn adapt(mut raw: Value) -> Value {
  let Some(root) = raw.as_object_mut() else {
    return raw;
  };
  let clauses = match root.remove("clauses") {
    Some(Value::Array(clauses)) => clauses,
    Some(other) => {
      root.insert("clauses".to_owned(), other);
      Vec::new()
    }
    None => Vec::new(),
  };

  let nested = matches!(root.get("agreement"), Some(Value::Object(_)));
  if !nested {
    adapt_agreement(root, &clauses);
  } else if let Some(Value::Object(agreement)) = root.get_mut("agreement") {
    adapt_agreement(agreement, &clauses);
  }
  raw
}

fn adapt_agreement(agreement: &mut Map<String, Value>, clauses: &[Value]) {
  promote_basics(agreement);
  promote_law_and_disputes(agreement);
  for clause in clauses.iter().filter_map(Value::as_object) {
    place_clause(agreement, clause);
  }
}

fn promote_basics(agreement: &mut Map<String, Value>) {
  let basics = match agreement.remove(BASICS) {
    Some(Value::Object(b)) => b,
    _ => Map::new(),
  };
  for (older, current) in BASIC_FIELDS {
    // Aliases written directly on the agreement count too.
    let value = basics
      .get(*older)
      .or_else(|| (older != current).then(|| agreement.get(*older)).flatten())
      .cloned();
    if let Some(value) = value {
      fill(agreement, current, value);
    }
  }
}

fn promote_law_and_disputes(agreement: &mut Map<String, Value>) {
  let Some(Value::Object(section)) = agreement.remove(LAW_AND_DISPUTES) else {
    return;
  };
  let field = |name: &str| section.get(name).cloned().unwrap_or(Value::Null);

  let mut law = Map::new();
  law.insert("country".to_owned(), field("governing_country"));
  law.insert("state".to_owned(), field("governing_state"));
  if law.values().any(|v| !v.is_null()) {
    fill(agreement, "governing_law", Value::Object(law));
  }

  let method = section
    .get("dispute_resolution_method")
    .and_then(Value::as_str)
    .map(|m| Value::String(m.trim().to_lowercase()))
    .unwrap_or(Value::Null);
  let rules = match field("rules") {
    Value::Null => field("rules_governing_dispute_resolution"),
    rules => rules,
  };
  let mut disputes = Map::new();
  disputes.insert("method".to_owned(), method);
  disputes.insert("venue".to_owned(), field("venue"));
  disputes.insert("jurisdiction".to_owned(), field("jurisdiction"));
  disputes.insert("governing_rules".to_owned(), rules);
  if disputes.values().any(|v| !v.is_null()) {
    fill(agreement, "dispute_resolution", Value::Object(disputes));
  }
}

fn place_clause(agreement: &mut Map<String, Value>, clause: &Map<String, Value>) {
  let title = clause
    .get("title")
    .and_then(Value::as_str)
    .map(str::trim)
    .unwrap_or_default();
  let lowered = title.to_lowercase();
  let slot = CLAUSE_SLOTS
    .iter()
    .find(|(keywords, _)| keywords.iter().any(|k| lowered.contains(k)))
    .map_or(OBLIGATION, |(_, slot)| *slot);

  let mut block = variables(clause);
  if let Some(excerpts) = clause.get("excerpts") {
    block.insert("excerpts".to_owned(), excerpts.clone());
  }

  match slot {
    Slot::Single(key) => merge_single(agreement, key, block),
    Slot::Listed(key, title_field) => {
      if let Some(field) = title_field
        && !title.is_empty()
      {
        fill(&mut block, field, Value::String(title.to_owned()));
      }
      if key == "obligations"
        && let Some(obligor) = clause.get("obligor")
      {
        fill(&mut block, "obligated_party", obligor.clone());
      }
      push_listed(agreement, key, block);
    }
  }
}

/// A clause's named variables as a block; the first of a repeated name wins.
fn variables(clause: &Map<String, Value>) -> Map<String, Value> {
  let mut block = Map::new();
  let vars = clause.get("variables").and_then(Value::as_array);
  for var in vars.into_iter().flatten().filter_map(Value::as_object) {
    let Some(name) = var
      .get("name")
      .and_then(Value::as_str)
      .map(str::trim)
      .filter(|n| !n.is_empty())
    else {
      continue;
    };
    let value = var.get("value").cloned().unwrap_or(Value::Null);
    block.entry(name.to_owned()).or_insert(value);
  }
  block
}

/// Merge into a singleton block: fields already present win, excerpts
/// accumulate.
fn merge_single(agreement: &mut Map<String, Value>, key: &str, block: Map<String, Value>) {
  match agreement.get_mut(key) {
    Some(Value::Object(existing)) => {
      for (field, value) in block {
        if field == "excerpts" {
          append_excerpts(existing, value);
        } else {
          fill(existing, &field, value);
        }
      }
    }
    Some(Value::Null) | None => {
      agreement.insert(key.to_owned(), Value::Object(block));
    }
    // `false` or another explicit value: the document already said.
    Some(_) => {}
  }
}

fn push_listed(agreement: &mut Map<String, Value>, key: &str, block: Map<String, Value>) {
  match agreement.get_mut(key) {
    Some(Value::Array(items)) => items.push(Value::Object(block)),
    Some(Value::Object(single)) => {
      let single = Value::Object(std::mem::take(single));
      agreement.insert(key.to_owned(), Value::Array(vec![single, Value::Object(block)]));
    }
    _ => {
      agreement.insert(key.to_owned(), Value::Array(vec![Value::Object(block)]));
    }
  }
}

fn append_excerpts(block: &mut Map<String, Value>, more: Value) {
  let more = match more {
    Value::Array(items) => items,
    Value::Null => return,
    single => vec![single],
  };
  match block.get_mut("excerpts") {
    Some(Value::Array(items)) => items.extend(more),
    _ => {
      block.insert("excerpts".to_owned(), Value::Array(more));
    }
  }
}

/// Set `key` unless it already holds a non-null value.
fn fill(map: &mut Map<String, Value>, key: &str, value: Value) {
  if value.is_null() {
    return;
  }
  match map.get(key) {
    Some(existing) if !existing.is_null() => {}
    _ => {
      map.insert(key.to_owned(), value);
    }
  }
}
