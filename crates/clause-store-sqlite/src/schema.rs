//! SQL schema for the clause graph store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Every graph node. `node_id` is a v5 UUID of `natural_key` under the
-- contract's namespace, so merging by natural key is a primary-key lookup.
CREATE TABLE IF NOT EXISTS nodes (
    node_id       TEXT PRIMARY KEY,
    contract_id   TEXT NOT NULL,
    label         TEXT NOT NULL,   -- 'Contract' | 'Party' | 'Excerpt' | provision label
    natural_key   TEXT NOT NULL,
    owner_id      TEXT REFERENCES nodes(node_id) ON DELETE CASCADE,
    ordinal       INTEGER NOT NULL DEFAULT 0,
    properties    TEXT NOT NULL,   -- JSON property bag
    content_hash  TEXT NOT NULL,
    fingerprint   TEXT,            -- contract nodes with derived ids only
    embedding     BLOB,            -- little-endian f32, excerpt nodes only
    embedding_dim INTEGER,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    UNIQUE (contract_id, natural_key)
);

CREATE TABLE IF NOT EXISTS relationships (
    from_id  TEXT NOT NULL REFERENCES nodes(node_id) ON DELETE CASCADE,
    rel_type TEXT NOT NULL,
    to_id    TEXT NOT NULL REFERENCES nodes(node_id) ON DELETE CASCADE,
    PRIMARY KEY (from_id, rel_type, to_id)
);

-- At most one root per contract id.
CREATE UNIQUE INDEX IF NOT EXISTS nodes_contract_root_idx
    ON nodes(contract_id) WHERE label = 'Contract';

CREATE INDEX IF NOT EXISTS nodes_contract_idx     ON nodes(contract_id);
CREATE INDEX IF NOT EXISTS nodes_label_idx        ON nodes(label);
CREATE INDEX IF NOT EXISTS nodes_owner_idx        ON nodes(owner_id);
CREATE INDEX IF NOT EXISTS relationships_to_idx   ON relationships(to_id);

PRAGMA user_version = 2;
";
