//! Read-only view of the datacenter → pod → host → storage pool inventory.
//!
//! The inventory service owns the `host` and `storage_pool_host_ref` tables; the
//! tracker only reads them to resolve which pools a host, pod or datacenter can
//! reach. Nothing in this module writes to them.

use rusqlite::{params, Connection, OpenFlags};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("topology lookup failed: {0}")]
    Lookup(#[from] rusqlite::Error),
}

const POOLS_FOR_HOST: &str = "SELECT DISTINCT ph.pool_id FROM storage_pool_host_ref ph \
     JOIN host h ON ph.host_id = h.id WHERE h.id = ?1";

const POOLS_IN_SCOPE: &str = "SELECT DISTINCT ph.pool_id FROM storage_pool_host_ref ph \
     JOIN host h ON ph.host_id = h.id \
     WHERE h.data_center_id = ?1 AND (?2 IS NULL OR h.pod_id = ?2)";

#[derive(Clone, Debug)]
pub struct Topology {
    db_path: PathBuf,
}

impl Topology {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, TopologyError> {
        // No SQLITE_OPEN_CREATE: a missing inventory is an error, never a
        // fresh empty database. Read-write so WAL databases open without their
        // -shm file; query_only keeps the connection from writing.
        let conn = Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.pragma_update(None, "query_only", true)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(conn)
    }

    /// Pools attached to `host_id`.
    pub fn pools_for_host(&self, host_id: i64) -> Result<BTreeSet<i64>, TopologyError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(POOLS_FOR_HOST)?;
        let pools = stmt
            .query_map(params![host_id], |row| row.get(0))?
            .collect::<Result<BTreeSet<i64>, _>>()?;
        Ok(pools)
    }

    /// Pools attached to at least one host in the datacenter, optionally
    /// narrowed to one pod. A pool shared by several hosts is returned once.
    pub fn pools_in_scope(
        &self,
        datacenter_id: i64,
        pod_id: Option<i64>,
    ) -> Result<BTreeSet<i64>, TopologyError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(POOLS_IN_SCOPE)?;
        let pools = stmt
            .query_map(params![datacenter_id, pod_id], |row| row.get(0))?
            .collect::<Result<BTreeSet<i64>, _>>()?;
        Ok(pools)
    }
}
