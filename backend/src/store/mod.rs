//! # Association Store
//!
//! Durable record of the copy state of every (template, storage pool) pair,
//! kept in the `template_spool_ref` table of a SQLite database.
//!
//! ## Sub-modules:
//! - `queries`: read paths, including the topology-scoped lookups that semi-join
//!   associations against the pools resolved by [`Topology`].
//! - `progress`: write paths. Progress reports go through a single conditional
//!   upsert gated on job lineage, so concurrent reporters never lose updates and
//!   a superseded job can never overwrite a newer state.
//! - `row`: the typed row mapper every query shares.
//!
//! Each operation opens its own connection. SQLite serializes writers on the
//! database lock while WAL mode lets readers keep a consistent snapshot, so the
//! store needs no application-level mutex and unrelated pairs never wait on one.

mod error;
mod progress;
mod queries;
mod row;

pub use error::{Result, StoreError};

use crate::topology::Topology;
use log::info;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS template_spool_ref (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    pool_id INTEGER NOT NULL,
    template_id INTEGER NOT NULL,
    download_state TEXT NOT NULL,
    download_pct INTEGER NOT NULL DEFAULT 0 CHECK (download_pct BETWEEN 0 AND 100),
    error_str TEXT NOT NULL DEFAULT '',
    local_path TEXT NOT NULL DEFAULT '',
    job_id INTEGER,
    last_updated INTEGER NOT NULL,
    UNIQUE (pool_id, template_id),
    CHECK (download_state <> 'DOWNLOADED' OR (local_path <> '' AND download_pct = 100)),
    CHECK (download_state <> 'DOWNLOAD_ERROR' OR error_str <> '')
);
CREATE INDEX IF NOT EXISTS idx_template_spool_ref_template_state
    ON template_spool_ref (template_id, download_state);
";

#[derive(Clone, Debug)]
pub struct AssociationStore {
    db_path: PathBuf,
    topology: Topology,
}

impl AssociationStore {
    /// Opens (or creates) the store at `db_path` and makes sure the
    /// association table exists. Topology is read from the same database.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        let topology = Topology::new(&db_path);
        Self::with_topology(db_path, topology)
    }

    /// Opens the store with a topology view backed by another database.
    pub fn with_topology(db_path: impl AsRef<Path>, topology: Topology) -> Result<Self> {
        let store = Self {
            db_path: db_path.as_ref().to_path_buf(),
            topology,
        };
        let conn = store.connect()?;
        conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get::<_, String>(0))?;
        conn.execute_batch(SCHEMA)?;
        info!("Association store ready at {}", store.db_path.display());
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(conn)
    }
}
