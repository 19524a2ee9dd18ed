//! Error type for `clause-store-sqlite`.

use clause_core::store::{FailureKind, StoreFailure};
use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored value that should be impossible given the schema.
  #[error("invalid stored value: {0}")]
  InvalidValue(String),

  #[error("node not found: {0}")]
  NodeNotFound(uuid::Uuid),

  /// A derived contract id is already held by a contract with a different
  /// fingerprint.
  #[error(
    "contract {contract_id} already stored with fingerprint {stored}, \
     refusing fingerprint {incoming}"
  )]
  IdentityCollision {
    contract_id: String,
    stored:      String,
    incoming:    String,
  },

  /// A node id planned for one contract is already stored for another.
  #[error("node {node_id} of contract {contract_id} is already held by contract {held_by}")]
  NodeConflict {
    contract_id: String,
    node_id:     uuid::Uuid,
    held_by:     String,
  },

  #[error("write for contract {0} cancelled before commit")]
  Cancelled(String),
}

impl StoreFailure for Error {
  fn failure_kind(&self) -> FailureKind {
    match self {
      Self::Database(tokio_rusqlite::Error::ConnectionClosed) => {
        FailureKind::Transient
      }
      Self::Database(tokio_rusqlite::Error::Rusqlite(
        rusqlite::Error::SqliteFailure(e, _),
      )) if matches!(
        e.code,
        ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
      ) =>
      {
        FailureKind::Transient
      }
      Self::IdentityCollision { .. } | Self::NodeConflict { .. } => {
        FailureKind::Collision
      }
      Self::Cancelled(_) => FailureKind::Cancelled,
      _ => FailureKind::Fatal,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
