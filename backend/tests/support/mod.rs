#![allow(dead_code)]

use backend::store::AssociationStore;
use rusqlite::{params, Connection};
use std::path::Path;
use tempfile::TempDir;

/// A store in a fresh database. Keep the `TempDir` alive for the test's duration.
pub fn temp_store() -> (TempDir, AssociationStore) {
    let dir = TempDir::new().expect("temp dir");
    let store = AssociationStore::open(dir.path().join("tracker.sqlite")).expect("open store");
    (dir, store)
}

/// Stands in for the inventory service: creates its tables and attaches hosts
/// `(host_id, pod_id, datacenter_id)` and pool memberships `(pool_id, host_id)`.
pub fn seed_topology(db_path: &Path, hosts: &[(i64, i64, i64)], members: &[(i64, i64)]) {
    let conn = Connection::open(db_path).expect("open inventory");
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS host (
             id INTEGER PRIMARY KEY,
             pod_id INTEGER NOT NULL,
             data_center_id INTEGER NOT NULL
         );
         CREATE TABLE IF NOT EXISTS storage_pool_host_ref (
             pool_id INTEGER NOT NULL,
             host_id INTEGER NOT NULL,
             PRIMARY KEY (pool_id, host_id)
         );",
    )
    .expect("inventory schema");
    for (id, pod_id, data_center_id) in hosts {
        conn.execute(
            "INSERT OR REPLACE INTO host (id, pod_id, data_center_id) VALUES (?1, ?2, ?3)",
            params![id, pod_id, data_center_id],
        )
        .expect("insert host");
    }
    for (pool_id, host_id) in members {
        conn.execute(
            "INSERT OR IGNORE INTO storage_pool_host_ref (pool_id, host_id) VALUES (?1, ?2)",
            params![pool_id, host_id],
        )
        .expect("insert pool member");
    }
}

/// Moves a pool from every host it was attached to onto `host_id`.
pub fn move_pool(db_path: &Path, pool_id: i64, host_id: i64) {
    let conn = Connection::open(db_path).expect("open inventory");
    conn.execute(
        "DELETE FROM storage_pool_host_ref WHERE pool_id = ?1",
        params![pool_id],
    )
    .expect("detach pool");
    conn.execute(
        "INSERT INTO storage_pool_host_ref (pool_id, host_id) VALUES (?1, ?2)",
        params![pool_id, host_id],
    )
    .expect("attach pool");
}
