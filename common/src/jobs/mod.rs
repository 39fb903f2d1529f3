use crate::model::association::DownloadState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A progress report sent by the worker performing a transfer.
///
/// Reports are fire-and-forget: the worker does not wait to learn whether the
/// report was applied or discarded as stale.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgressReport {
    pub pool_id: i64,
    pub template_id: i64,
    pub state: DownloadState,
    #[serde(default)]
    pub percent: u8,
    #[serde(default)]
    pub error_text: String,
    #[serde(default)]
    pub local_path: String,
    #[serde(default)]
    pub job_id: Option<i64>,
    /// When the worker observed this state. Orders reports within one job.
    #[serde(default = "Utc::now")]
    pub reported_at: DateTime<Utc>,
}

impl ProgressReport {
    pub fn new(pool_id: i64, template_id: i64, state: DownloadState, job_id: Option<i64>) -> Self {
        Self {
            pool_id,
            template_id,
            state,
            percent: 0,
            error_text: String::new(),
            local_path: String::new(),
            job_id,
            reported_at: Utc::now(),
        }
    }

    pub fn percent(mut self, percent: u8) -> Self {
        self.percent = percent;
        self
    }

    pub fn error_text(mut self, error_text: impl Into<String>) -> Self {
        self.error_text = error_text.into();
        self
    }

    pub fn local_path(mut self, local_path: impl Into<String>) -> Self {
        self.local_path = local_path.into();
        self
    }

    pub fn reported_at(mut self, reported_at: DateTime<Utc>) -> Self {
        self.reported_at = reported_at;
        self
    }
}

/// What happened to a progress report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressOutcome {
    /// The report was written (inserted or updated).
    Applied,
    /// The report came from a superseded job, or is older than the stored one
    /// for the same job, and was discarded.
    Stale,
}
