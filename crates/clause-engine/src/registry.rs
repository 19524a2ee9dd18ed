//! The Standards Registry: client standards keyed by client id.
//!
//! Registration replaces an entry wholesale behind a lock, so a concurrent
//! validation sees either the old standards or the new ones.

use std::{
  collections::HashMap,
  sync::{Arc, PoisonError, RwLock},
};

use clause_core::{Result, standards::ClientStandards};

#[derive(Debug, Default)]
pub struct StandardsRegistry {
  entries: RwLock<HashMap<String, Arc<ClientStandards>>>,
}

impl StandardsRegistry {
  pub fn new() -> Self { Self::default() }

  /// Validate and store `standards`, replacing any entry for the same
  /// client. Returns the replaced entry.
  pub fn register(
    &self,
    standards: ClientStandards,
  ) -> Result<Option<Arc<ClientStandards>>> {
    standards.validate()?;
    let client_id = standards.client_id.clone();
    let rules = standards.rules.len();
    let previous = self
      .entries
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(client_id.clone(), Arc::new(standards));
    tracing::info!(client_id = %client_id, rules, replaced = previous.is_some(), "registered client standards");
    Ok(previous)
  }

  pub fn get(&self, client_id: &str) -> Option<Arc<ClientStandards>> {
    self
      .entries
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .get(client_id)
      .cloned()
  }

  pub fn unregister(&self, client_id: &str) -> Option<Arc<ClientStandards>> {
    self
      .entries
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(client_id)
  }

  /// Registered client ids, sorted.
  pub fn client_ids(&self) -> Vec<String> {
    let mut ids: Vec<String> = self
      .entries
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .keys()
      .cloned()
      .collect();
    ids.sort();
    ids
  }
}

#[cfg(test)]
mod tests {
  use clause_core::standards::{Bound, Metric, Rule, RuleKind};

  use super::*;

  fn standards(client_id: &str, cap: f64) -> ClientStandards {
    ClientStandards {
      client_id:   client_id.to_owned(),
      client_name: "Acme Bank".to_owned(),
      rules:       vec![Rule {
        rule_name: "max_liability_cap".to_owned(),
        kind:      RuleKind::Threshold {
          metric: Metric::LiabilityCapAmount,
          bound:  Bound::Max,
          value:  cap,
        },
      }],
    }
  }

  #[test]
  fn register_replaces_and_returns_previous() {
    let registry = StandardsRegistry::new();
    assert!(registry.register(standards("acme", 1.0)).unwrap().is_none());
    let previous = registry.register(standards("acme", 2.0)).unwrap().unwrap();
    assert_eq!(*previous, standards("acme", 1.0));
    assert_eq!(*registry.get("acme").unwrap(), standards("acme", 2.0));
  }

  #[test]
  fn invalid_standards_are_not_registered() {
    let registry = StandardsRegistry::new();
    assert!(registry.register(standards("", 1.0)).is_err());
    assert!(registry.client_ids().is_empty());
  }

  #[test]
  fn client_ids_are_sorted() {
    let registry = StandardsRegistry::new();
    for id in ["zeta", "alpha", "mid"] {
      registry.register(standards(id, 1.0)).unwrap();
    }
    assert_eq!(registry.client_ids(), ["alpha", "mid", "zeta"]);
    assert!(registry.unregister("mid").is_some());
    assert_eq!(registry.client_ids(), ["alpha", "zeta"]);
  }

  #[test]
  fn concurrent_readers_see_whole_entries() {
    let registry = Arc::new(StandardsRegistry::new());
    registry.register(standards("acme", 0.0)).unwrap();

    let writer = {
      let registry = registry.clone();
      std::thread::spawn(move || {
        for i in 1..200 {
          registry.register(standards("acme", f64::from(i))).unwrap();
        }
      })
    };
    for _ in 0..200 {
      let entry = registry.get("acme").unwrap();
      assert_eq!(entry.rules.len(), 1);
      assert_eq!(entry.client_name, "Acme Bank");
    }
    writer.join().unwrap();
  }
}
