use super::row::{map_association, select_associations};
use super::{AssociationStore, Result};
use common::model::association::{DownloadState, TemplatePoolAssociation};
use log::warn;
use rusqlite::{params, Connection, OptionalExtension, Params};
use std::collections::BTreeSet;

const BY_POOL: &str = select_associations!("WHERE pool_id = ?1 ORDER BY id");

const BY_TEMPLATE: &str = select_associations!("WHERE template_id = ?1 ORDER BY id");

const BY_PAIR: &str = select_associations!("WHERE pool_id = ?1 AND template_id = ?2");

const BY_STATUS: &str = select_associations!(
    "WHERE template_id = ?1 AND download_state = ?2 AND (?3 IS NULL OR pool_id = ?3) ORDER BY id"
);

const BY_STATES_ANY: &str = select_associations!(
    "WHERE template_id = ?1 AND download_state IN (SELECT value FROM json_each(?2)) ORDER BY id"
);

// Pool ids arrive as a JSON array so the statement text stays fixed whatever
// the size of the set.
const IN_POOLS: &str = select_associations!(
    "WHERE template_id = ?1 AND (?2 IS NULL OR download_state = ?2) \
     AND pool_id IN (SELECT value FROM json_each(?3)) ORDER BY id"
);

const READY_IN_POOLS: &str = "SELECT EXISTS (SELECT 1 FROM template_spool_ref \
     WHERE template_id = ?1 AND download_state = 'DOWNLOADED' \
     AND pool_id IN (SELECT value FROM json_each(?2)))";

fn list<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<TemplatePoolAssociation>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, map_association)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

impl AssociationStore {
    pub fn list_by_pool(&self, pool_id: i64) -> Result<Vec<TemplatePoolAssociation>> {
        list(&self.connect()?, BY_POOL, params![pool_id])
    }

    pub fn list_by_template(&self, template_id: i64) -> Result<Vec<TemplatePoolAssociation>> {
        list(&self.connect()?, BY_TEMPLATE, params![template_id])
    }

    /// The association for the pair, if there is one.
    pub fn find(&self, pool_id: i64, template_id: i64) -> Result<Option<TemplatePoolAssociation>> {
        let conn = self.connect()?;
        let found = conn
            .query_row(BY_PAIR, params![pool_id, template_id], map_association)
            .optional()?;
        Ok(found)
    }

    /// Associations of `template_id` in `state`, optionally limited to one pool.
    pub fn list_by_status(
        &self,
        template_id: i64,
        state: DownloadState,
        pool_id: Option<i64>,
    ) -> Result<Vec<TemplatePoolAssociation>> {
        list(
            &self.connect()?,
            BY_STATUS,
            params![template_id, state.as_str(), pool_id],
        )
    }

    /// Associations of `template_id` in `state` whose pool is attached to a host
    /// in the datacenter (and pod, when given).
    ///
    /// # Arguments
    /// * `template_id` - The template to look for.
    /// * `state` - Only associations in this state are returned.
    /// * `datacenter_id` - The datacenter the pool's host must be in.
    /// * `pod_id` - Narrows the scope to one pod of that datacenter.
    ///
    /// # Returns
    /// The matching associations ordered by id, each once even when its pool is
    /// shared by several hosts in scope. An inventory that cannot be read makes
    /// every pool unreachable: the result is empty rather than an error.
    pub fn list_by_status_in_topology(
        &self,
        template_id: i64,
        state: DownloadState,
        datacenter_id: i64,
        pod_id: Option<i64>,
    ) -> Result<Vec<TemplatePoolAssociation>> {
        let pools = match self.topology.pools_in_scope(datacenter_id, pod_id) {
            Ok(pools) => pools,
            Err(e) => {
                warn!(
                    "Treating datacenter {} pod {:?} as unreachable: {}",
                    datacenter_id, pod_id, e
                );
                return Ok(Vec::new());
            }
        };
        self.list_in_pools(template_id, Some(state), &pools)
    }

    /// Associations of `template_id` whose state is any of `states`.
    pub fn list_by_states_any(
        &self,
        template_id: i64,
        states: &[DownloadState],
    ) -> Result<Vec<TemplatePoolAssociation>> {
        if states.is_empty() {
            return Ok(Vec::new());
        }
        let names: Vec<&str> = states.iter().map(DownloadState::as_str).collect();
        let names = serde_json::to_string(&names)?;
        list(&self.connect()?, BY_STATES_ANY, params![template_id, names])
    }

    /// Associations of `template_id` on any pool attached to `host_id`.
    pub fn list_by_host_template(
        &self,
        host_id: i64,
        template_id: i64,
    ) -> Result<Vec<TemplatePoolAssociation>> {
        let pools = match self.topology.pools_for_host(host_id) {
            Ok(pools) => pools,
            Err(e) => {
                warn!("Treating host {} as unreachable: {}", host_id, e);
                return Ok(Vec::new());
            }
        };
        self.list_in_pools(template_id, None, &pools)
    }

    /// The first (lowest id) association of `template_id` reachable from `host_id`.
    pub fn find_by_host_template(
        &self,
        host_id: i64,
        template_id: i64,
    ) -> Result<Option<TemplatePoolAssociation>> {
        Ok(self
            .list_by_host_template(host_id, template_id)?
            .into_iter()
            .next())
    }

    /// Whether `host_id` can use `template_id` without staging a copy.
    ///
    /// # Arguments
    /// * `template_id` - The template the orchestrator wants to place.
    /// * `host_id` - The host that would use it.
    ///
    /// # Returns
    /// `true` iff some pool attached to the host holds a `DOWNLOADED` copy.
    /// Missing associations and unreadable topology give `false`.
    pub fn is_available(&self, template_id: i64, host_id: i64) -> Result<bool> {
        let pools = match self.topology.pools_for_host(host_id) {
            Ok(pools) => pools,
            Err(e) => {
                warn!("Treating host {} as unreachable: {}", host_id, e);
                return Ok(false);
            }
        };
        if pools.is_empty() {
            return Ok(false);
        }
        let pools = serde_json::to_string(&pools)?;
        let conn = self.connect()?;
        let ready: bool = conn.query_row(READY_IN_POOLS, params![template_id, pools], |row| {
            row.get(0)
        })?;
        Ok(ready)
    }

    fn list_in_pools(
        &self,
        template_id: i64,
        state: Option<DownloadState>,
        pools: &BTreeSet<i64>,
    ) -> Result<Vec<TemplatePoolAssociation>> {
        if pools.is_empty() {
            return Ok(Vec::new());
        }
        let pools = serde_json::to_string(pools)?;
        list(
            &self.connect()?,
            IN_POOLS,
            params![template_id, state.map(|s| s.as_str()), pools],
        )
    }
}
