//! The graph write plan for one contract, and its inverse.
//!
//! [`plan`] turns a decoded [`Contract`] into nodes and relationships keyed by
//! natural keys, so that applying the same plan twice touches the same rows.
//! [`assemble`] rebuilds a contract from the nodes a store returns.
//!
//! Ownership is strict: the contract owns its parties and provisions, each
//! provision owns its excerpts. Stores rely on `owner_id` to cascade deletes.
//!
//! Natural keys are scoped to their contract:
//!
//! | Node      | Key                                        |
//! |-----------|--------------------------------------------|
//! | Contract  | `contract`                                 |
//! | Party     | `party:{normalised name}` (or `#{n}`)      |
//! | Provision | `{category}:{disambiguator}`               |
//! | Excerpt   | `{provision key}/excerpt:{hash of text}`   |
//!
//! Free text inside a key is escaped so it cannot forge a separator. Node ids
//! are v5 UUIDs of the key under a namespace derived from the contract id, so
//! two contracts never share a node id whatever their ids contain.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  contract::{Contract, ContractAttributes, ContractId, Party, ProvisionRecord},
  provision::{Provision, ProvisionCategory},
  text,
};

/// Root namespace; each contract's node namespace is a v5 UUID under it.
const NODE_NAMESPACE: Uuid =
  Uuid::from_u128(0x6c61_7573_652d_4e4f_4445_2d4e_5331_0001);

pub const PARTY_RELATIONSHIP: &str = "IS_PARTY_TO";
pub const EXCERPT_RELATIONSHIP: &str = "HAS_EXCERPT";

// ─── Plan types ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
  Contract,
  Party,
  Provision(ProvisionCategory),
  Excerpt,
}

impl NodeKind {
  pub fn label(self) -> &'static str {
    match self {
      Self::Contract => "Contract",
      Self::Party => "Party",
      Self::Provision(category) => category.label(),
      Self::Excerpt => "Excerpt",
    }
  }

  pub fn from_label(label: &str) -> Option<Self> {
    match label {
      "Contract" => Some(Self::Contract),
      "Party" => Some(Self::Party),
      "Excerpt" => Some(Self::Excerpt),
      other => ProvisionCategory::from_label(other).map(Self::Provision),
    }
  }
}

/// One node to merge by natural key.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpec {
  /// v5 UUID of `natural_key` in the contract's namespace.
  pub node_id:      Uuid,
  pub kind:         NodeKind,
  pub natural_key:  String,
  pub owner_id:     Option<Uuid>,
  /// Position among siblings in the source document.
  pub ordinal:      u32,
  pub properties:   serde_json::Value,
  /// Digest of `properties` and `ordinal`; equal hashes mean "unchanged".
  pub content_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeSpec {
  pub from:     Uuid,
  pub to:       Uuid,
  pub rel_type: &'static str,
}

/// Everything one contract writes, owners before the nodes they own.
#[derive(Debug, Clone)]
pub struct ContractGraph {
  pub contract_id: ContractId,
  /// Present for derived ids; the store rejects a write whose fingerprint
  /// differs from the one already stored under the same id.
  pub fingerprint: Option<String>,
  pub nodes:       Vec<NodeSpec>,
  pub edges:       Vec<EdgeSpec>,
}

/// A node as a store returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredNode {
  pub node_id:    Uuid,
  pub label:      String,
  pub owner_id:   Option<Uuid>,
  pub ordinal:    u32,
  pub properties: serde_json::Value,
  pub embedded:   bool,
}

// ─── Planning ────────────────────────────────────────────────────────────────

pub const ROOT_KEY: &str = "contract";

/// The namespace every node id of `contract_id` is derived under.
pub fn contract_namespace(contract_id: &ContractId) -> Uuid {
  Uuid::new_v5(&NODE_NAMESPACE, contract_id.as_str().as_bytes())
}

pub fn node_id(contract_id: &ContractId, natural_key: &str) -> Uuid {
  Uuid::new_v5(&contract_namespace(contract_id), natural_key.as_bytes())
}

/// Percent-escape the characters keys use as separators.
fn key_part(raw: &str) -> String {
  let mut out = String::with_capacity(raw.len());
  for c in raw.chars() {
    match c {
      '%' => out.push_str("%25"),
      '/' => out.push_str("%2F"),
      ':' => out.push_str("%3A"),
      '~' => out.push_str("%7E"),
      c => out.push(c),
    }
  }
  out
}

pub fn plan(
  contract: &Contract,
  fingerprint: Option<String>,
) -> Result<ContractGraph> {
  let mut nodes = Vec::new();
  let mut edges = Vec::new();

  let id = &contract.contract_id;
  let root = spec(
    id,
    NodeKind::Contract,
    ROOT_KEY.to_owned(),
    None,
    0,
    serde_json::to_value(&contract.attributes)?,
  );
  let root_id = root.node_id;
  nodes.push(root);

  let mut party_keys = Keys::default();
  for (i, party) in contract.parties.iter().enumerate() {
    let ordinal = i as u32;
    let tail = match party.name.stated() {
      Some(name) => key_part(&text::normalize(name)),
      None => format!("#{ordinal}"),
    };
    let key = party_keys.claim(format!("party:{tail}"));
    let node = spec(
      id,
      NodeKind::Party,
      key,
      Some(root_id),
      ordinal,
      serde_json::to_value(party)?,
    );
    edges.push(EdgeSpec {
      from:     node.node_id,
      to:       root_id,
      rel_type: PARTY_RELATIONSHIP,
    });
    nodes.push(node);
  }

  let mut provision_keys = Keys::default();
  for (i, record) in contract.provisions.iter().enumerate() {
    let category = record.provision.category();
    let key = provision_keys.claim(format!(
      "{category}:{}",
      disambiguator(&record.provision, record.excerpts.first().map(String::as_str)),
    ));
    let node = spec(
      id,
      NodeKind::Provision(category),
      key.clone(),
      Some(root_id),
      i as u32,
      record.provision.to_json()?,
    );
    let provision_id = node.node_id;
    edges.push(EdgeSpec {
      from:     root_id,
      to:       provision_id,
      rel_type: category.relationship(),
    });
    nodes.push(node);

    let mut excerpt_keys = Keys::default();
    for (j, excerpt) in record.excerpts.iter().enumerate() {
      let excerpt_key = excerpt_keys
        .claim(format!("{key}/excerpt:{}", text::short_hash(&[excerpt.as_str()])));
      let node = spec(
        id,
        NodeKind::Excerpt,
        excerpt_key,
        Some(provision_id),
        j as u32,
        serde_json::json!({ "text": excerpt }),
      );
      edges.push(EdgeSpec {
        from:     provision_id,
        to:       node.node_id,
        rel_type: EXCERPT_RELATIONSHIP,
      });
      nodes.push(node);
    }
  }

  Ok(ContractGraph {
    contract_id: contract.contract_id.clone(),
    fingerprint,
    nodes,
    edges,
  })
}

/// The category-specific part of a provision's natural key. Singletons need
/// none; repeatable categories hash the fields that tell siblings apart.
fn disambiguator(provision: &Provision, first_excerpt: Option<&str>) -> String {
  if provision.category().is_singleton() {
    return String::new();
  }
  let s = |r: &crate::contract::Reported<String>| {
    r.stated().map(String::as_str).map(text::normalize).unwrap_or_default()
  };
  let excerpt = first_excerpt.map(text::normalize).unwrap_or_default();

  match provision {
    Provision::Obligation(o) => {
      text::short_hash(&[&s(&o.obligation_type), &excerpt])
    }
    Provision::Indemnification(i) => text::short_hash(&[
      &s(&i.indemnitor),
      &s(&i.indemnitee),
      &excerpt,
    ]),
    Provision::IntellectualProperty(ip) => {
      let ip_type = ip
        .ip_type
        .stated()
        .map(|t| t.to_string())
        .unwrap_or_default();
      text::short_hash(&[&ip_type, &s(&ip.subject_matter), &excerpt])
    }
    Provision::ComplianceFramework(f) => text::fold(&f.framework_name),
    Provision::Warranty(w) => {
      text::short_hash(&[&s(&w.warranty_type), &excerpt])
    }
    Provision::Restriction(r) => {
      text::short_hash(&[&s(&r.restriction_type), &excerpt])
    }
    _ => String::new(),
  }
}

fn spec(
  contract_id: &ContractId,
  kind: NodeKind,
  natural_key: String,
  owner_id: Option<Uuid>,
  ordinal: u32,
  properties: serde_json::Value,
) -> NodeSpec {
  // `serde_json::Map` is ordered, so the rendering is canonical.
  let content_hash =
    text::sha256_hex(format!("{ordinal}\u{1f}{properties}").as_bytes());
  NodeSpec {
    node_id: node_id(contract_id, &natural_key),
    kind,
    natural_key,
    owner_id,
    ordinal,
    properties,
    content_hash,
  }
}

/// Hands out natural keys, suffixing `~2`, `~3`, ... when two siblings in one
/// document produce the same key.
#[derive(Default)]
struct Keys {
  seen: HashMap<String, u32>,
}

impl Keys {
  fn claim(&mut self, key: String) -> String {
    let count = self.seen.entry(key.clone()).or_insert(0);
    *count += 1;
    if *count == 1 {
      key
    } else {
      format!("{key}~{count}")
    }
  }
}

// ─── Assembly ────────────────────────────────────────────────────────────────

/// Rebuild a contract from its stored nodes.
pub fn assemble(contract_id: &ContractId, nodes: Vec<StoredNode>) -> Result<Contract> {
  let corrupt = |message: String| Error::Store {
    scope: contract_id.to_string(),
    message,
  };

  let mut root = None;
  let mut parties = Vec::new();
  let mut provisions = Vec::new();
  let mut excerpts: HashMap<Uuid, BTreeMap<u32, String>> = HashMap::new();

  for node in nodes {
    let kind = NodeKind::from_label(&node.label)
      .ok_or_else(|| corrupt(format!("unknown node label {:?}", node.label)))?;
    match kind {
      NodeKind::Contract => {
        let attributes: ContractAttributes =
          serde_json::from_value(node.properties)?;
        root = Some((node.node_id, attributes));
      }
      NodeKind::Party => {
        let party: Party = serde_json::from_value(node.properties)?;
        parties.push((node.ordinal, party));
      }
      NodeKind::Provision(category) => {
        let provision = Provision::from_parts(category, node.properties)?;
        provisions.push((node.ordinal, node.node_id, provision));
      }
      NodeKind::Excerpt => {
        let owner = node
          .owner_id
          .ok_or_else(|| corrupt(format!("excerpt {} has no owner", node.node_id)))?;
        let text = node
          .properties
          .get("text")
          .and_then(|t| t.as_str())
          .ok_or_else(|| corrupt(format!("excerpt {} has no text", node.node_id)))?
          .to_owned();
        excerpts.entry(owner).or_default().insert(node.ordinal, text);
      }
    }
  }

  let Some((_, attributes)) = root else {
    return Err(Error::UnknownContract(contract_id.to_string()));
  };

  parties.sort_by_key(|(ordinal, _)| *ordinal);
  provisions.sort_by_key(|(ordinal, ..)| *ordinal);

  Ok(Contract {
    contract_id: contract_id.clone(),
    attributes,
    parties: parties.into_iter().map(|(_, p)| p).collect(),
    provisions: provisions
      .into_iter()
      .map(|(_, id, provision)| ProvisionRecord {
        provision,
        excerpts: excerpts
          .remove(&id)
          .map(|e| e.into_values().collect())
          .unwrap_or_default(),
      })
      .collect(),
  })
}
