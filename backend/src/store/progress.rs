use super::row::{map_association, select_associations, to_millis};
use super::{AssociationStore, Result, StoreError};
use chrono::Utc;
use common::jobs::{ProgressOutcome, ProgressReport};
use common::model::association::{check_state_tuple, DownloadState, TemplatePoolAssociation};
use log::{debug, info};
use rusqlite::params;

/// Lineage-gated upsert. The `DO UPDATE` only fires when the incoming report
/// belongs to a newer job, or to the same job with a timestamp no older than
/// the stored one; otherwise nothing changes and `changes()` is 0.
const RECORD_PROGRESS: &str = "
INSERT INTO template_spool_ref
    (pool_id, template_id, download_state, download_pct, error_str, local_path, job_id, last_updated)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
ON CONFLICT (pool_id, template_id) DO UPDATE SET
    download_state = excluded.download_state,
    download_pct = excluded.download_pct,
    error_str = excluded.error_str,
    local_path = excluded.local_path,
    job_id = excluded.job_id,
    last_updated = excluded.last_updated
WHERE (template_spool_ref.job_id IS NULL
        AND (excluded.job_id IS NOT NULL
             OR excluded.last_updated >= template_spool_ref.last_updated))
   OR excluded.job_id > template_spool_ref.job_id
   OR (excluded.job_id = template_spool_ref.job_id
       AND excluded.last_updated >= template_spool_ref.last_updated)
";

const UPSERT: &str = "
INSERT INTO template_spool_ref
    (pool_id, template_id, download_state, download_pct, error_str, local_path, job_id, last_updated)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
ON CONFLICT (pool_id, template_id) DO UPDATE SET
    download_state = excluded.download_state,
    download_pct = excluded.download_pct,
    error_str = excluded.error_str,
    local_path = excluded.local_path,
    job_id = excluded.job_id,
    last_updated = excluded.last_updated
";

const BY_PAIR: &str = select_associations!("WHERE pool_id = ?1 AND template_id = ?2");

const CREATE: &str = "
INSERT INTO template_spool_ref (pool_id, template_id, download_state, download_pct, last_updated)
VALUES (?1, ?2, ?3, 0, ?4)
ON CONFLICT (pool_id, template_id) DO NOTHING
";

impl AssociationStore {
    /// Applies a progress report from a transfer worker.
    ///
    /// Creates the association when the pair has none. A report from an older
    /// job than the stored one, or an older report of the same job, is discarded
    /// and `ProgressOutcome::Stale` is returned; that is never an error.
    pub fn record_progress(&self, report: &ProgressReport) -> Result<ProgressOutcome> {
        check_state_tuple(
            report.state,
            report.percent,
            &report.error_text,
            &report.local_path,
        )
        .map_err(|violation| StoreError::InconsistentState {
            pool_id: report.pool_id,
            template_id: report.template_id,
            violation,
        })?;
        let error_str = match report.state {
            DownloadState::DownloadError => report.error_text.as_str(),
            _ => "",
        };

        let conn = self.connect()?;
        let changed = conn.execute(
            RECORD_PROGRESS,
            params![
                report.pool_id,
                report.template_id,
                report.state.as_str(),
                report.percent,
                error_str,
                report.local_path,
                report.job_id,
                to_millis(&report.reported_at),
            ],
        )?;

        if changed == 0 {
            debug!(
                "Discarded stale {} report for pool {}, template {} from job {:?}",
                report.state, report.pool_id, report.template_id, report.job_id
            );
            return Ok(ProgressOutcome::Stale);
        }
        Ok(ProgressOutcome::Applied)
    }

    /// Marks an in-flight copy as cancelled. The worker owning `job_id` is
    /// expected to stop once it observes the state.
    pub fn abandon(
        &self,
        pool_id: i64,
        template_id: i64,
        job_id: Option<i64>,
    ) -> Result<ProgressOutcome> {
        let report = ProgressReport::new(pool_id, template_id, DownloadState::Abandoned, job_id);
        self.record_progress(&report)
    }

    /// Inserts `association`, or replaces every field of the existing one for
    /// the same pair. Returns the stored row.
    pub fn upsert(&self, association: &TemplatePoolAssociation) -> Result<TemplatePoolAssociation> {
        association
            .check_invariants()
            .map_err(|violation| StoreError::InconsistentState {
                pool_id: association.pool_id,
                template_id: association.template_id,
                violation,
            })?;
        let error_str = match association.download_state {
            DownloadState::DownloadError => association.error_string.as_str(),
            _ => "",
        };

        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute(
            UPSERT,
            params![
                association.pool_id,
                association.template_id,
                association.download_state.as_str(),
                association.download_percent,
                error_str,
                association.local_path,
                association.job_id,
                to_millis(&association.last_updated),
            ],
        )?;
        let stored = tx.query_row(
            BY_PAIR,
            params![association.pool_id, association.template_id],
            map_association,
        )?;
        tx.commit()?;
        Ok(stored)
    }

    /// Creates the initial association for a pair the orchestrator has just
    /// scheduled a copy for. An existing association is returned untouched.
    pub fn create(
        &self,
        pool_id: i64,
        template_id: i64,
        state: DownloadState,
    ) -> Result<TemplatePoolAssociation> {
        if !state.is_initial() {
            return Err(StoreError::InvalidInitialState(state));
        }
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let inserted = tx.execute(
            CREATE,
            params![pool_id, template_id, state.as_str(), to_millis(&Utc::now())],
        )?;
        let stored = tx.query_row(
            BY_PAIR,
            params![pool_id, template_id],
            map_association,
        )?;
        tx.commit()?;
        if inserted == 1 {
            info!(
                "Associated template {} with pool {} as {}",
                template_id, pool_id, state
            );
        }
        Ok(stored)
    }

    /// Removes the association for the pair. Returns whether one existed.
    pub fn remove(&self, pool_id: i64, template_id: i64) -> Result<bool> {
        let conn = self.connect()?;
        let removed = conn.execute(
            "DELETE FROM template_spool_ref WHERE pool_id = ?1 AND template_id = ?2",
            params![pool_id, template_id],
        )?;
        if removed > 0 {
            info!(
                "Removed association of template {} with pool {}",
                template_id, pool_id
            );
        }
        Ok(removed > 0)
    }

    /// Drops every association of a decommissioned pool.
    pub fn remove_by_pool(&self, pool_id: i64) -> Result<usize> {
        let conn = self.connect()?;
        let removed = conn.execute(
            "DELETE FROM template_spool_ref WHERE pool_id = ?1",
            params![pool_id],
        )?;
        info!("Removed {} associations of pool {}", removed, pool_id);
        Ok(removed)
    }

    /// Drops every association of a template deleted system-wide.
    pub fn remove_by_template(&self, template_id: i64) -> Result<usize> {
        let conn = self.connect()?;
        let removed = conn.execute(
            "DELETE FROM template_spool_ref WHERE template_id = ?1",
            params![template_id],
        )?;
        info!("Removed {} associations of template {}", removed, template_id);
        Ok(removed)
    }
}
