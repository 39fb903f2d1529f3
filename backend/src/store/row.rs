//! Typed row mapping for `template_spool_ref`.
//!
//! Every query selecting associations goes through `select_associations!` so the
//! column order always matches `map_association`.

use chrono::{DateTime, Utc};
use common::model::association::{DownloadState, TemplatePoolAssociation};
use rusqlite::types::Type;
use rusqlite::Row;

macro_rules! select_associations {
    ($tail:literal) => {
        concat!(
            "SELECT id, pool_id, template_id, download_state, download_pct, ",
            "error_str, local_path, job_id, last_updated ",
            "FROM template_spool_ref ",
            $tail
        )
    };
}
pub(crate) use select_associations;

pub(crate) fn map_association(row: &Row<'_>) -> rusqlite::Result<TemplatePoolAssociation> {
    let state: String = row.get(3)?;
    let download_state = state
        .parse::<DownloadState>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;
    let last_updated: i64 = row.get(8)?;
    Ok(TemplatePoolAssociation {
        id: row.get(0)?,
        pool_id: row.get(1)?,
        template_id: row.get(2)?,
        download_state,
        download_percent: row.get(4)?,
        error_string: row.get(5)?,
        local_path: row.get(6)?,
        job_id: row.get(7)?,
        last_updated: from_millis(last_updated)?,
    })
}

/// Timestamps are stored as integer milliseconds so they compare numerically in SQL.
pub(crate) fn to_millis(at: &DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(ms: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or(rusqlite::Error::IntegralValueOutOfRange(8, ms))
}
