use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Semantic state of the copy of one template into one storage pool.
///
/// The serialized form (`"DOWNLOAD_IN_PROGRESS"`, ...) is also the value stored
/// in the `download_state` column, so renaming a variant is a schema change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DownloadState {
    NotDownloaded,
    DownloadInProgress,
    Downloaded,
    DownloadError,
    Abandoned,
    Unknown,
}

impl DownloadState {
    pub const ALL: [DownloadState; 6] = [
        DownloadState::NotDownloaded,
        DownloadState::DownloadInProgress,
        DownloadState::Downloaded,
        DownloadState::DownloadError,
        DownloadState::Abandoned,
        DownloadState::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadState::NotDownloaded => "NOT_DOWNLOADED",
            DownloadState::DownloadInProgress => "DOWNLOAD_IN_PROGRESS",
            DownloadState::Downloaded => "DOWNLOADED",
            DownloadState::DownloadError => "DOWNLOAD_ERROR",
            DownloadState::Abandoned => "ABANDONED",
            DownloadState::Unknown => "UNKNOWN",
        }
    }

    /// States an orchestrator may create a fresh association in.
    pub fn is_initial(&self) -> bool {
        matches!(
            self,
            DownloadState::NotDownloaded | DownloadState::DownloadInProgress
        )
    }
}

impl fmt::Display for DownloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown download state: {0:?}")]
pub struct ParseDownloadStateError(pub String);

impl FromStr for DownloadState {
    type Err = ParseDownloadStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        DownloadState::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ParseDownloadStateError(s.to_string()))
    }
}

/// A combination of fields that no association may ever be stored with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("download percent {0} is outside 0..=100")]
    PercentOutOfRange(u8),
    #[error("DOWNLOADED requires a local path")]
    MissingLocalPath,
    #[error("DOWNLOADED requires 100 percent, got {0}")]
    IncompleteDownload(u8),
    #[error("DOWNLOAD_ERROR requires an error string")]
    MissingErrorText,
}

/// Checks a (state, percent, error, path) tuple against the association invariants.
///
/// Used both for full records handed to `upsert` and for progress reports, so a
/// write that would break an invariant is rejected before it reaches storage.
pub fn check_state_tuple(
    state: DownloadState,
    percent: u8,
    error_text: &str,
    local_path: &str,
) -> Result<(), InvariantViolation> {
    if percent > 100 {
        return Err(InvariantViolation::PercentOutOfRange(percent));
    }
    match state {
        DownloadState::Downloaded => {
            if local_path.trim().is_empty() {
                return Err(InvariantViolation::MissingLocalPath);
            }
            if percent != 100 {
                return Err(InvariantViolation::IncompleteDownload(percent));
            }
        }
        DownloadState::DownloadError if error_text.trim().is_empty() => {
            return Err(InvariantViolation::MissingErrorText);
        }
        _ => {}
    }
    Ok(())
}

/// The tracked relationship between one template and one storage pool.
///
/// `id` is a surrogate assigned by the store; a pair that is removed and later
/// associated again gets a new `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplatePoolAssociation {
    #[serde(default)]
    pub id: i64,
    pub template_id: i64,
    pub pool_id: i64,
    pub download_state: DownloadState,
    #[serde(default)]
    pub download_percent: u8,
    #[serde(default = "Utc::now")]
    pub last_updated: DateTime<Utc>,
    /// Empty unless `download_state` is `DOWNLOAD_ERROR`.
    #[serde(default)]
    pub error_string: String,
    #[serde(default)]
    pub local_path: String,
    /// The transfer job currently authoritative for this association.
    #[serde(default)]
    pub job_id: Option<i64>,
}

impl TemplatePoolAssociation {
    pub fn new(pool_id: i64, template_id: i64, download_state: DownloadState) -> Self {
        Self {
            id: 0,
            template_id,
            pool_id,
            download_state,
            download_percent: 0,
            last_updated: Utc::now(),
            error_string: String::new(),
            local_path: String::new(),
            job_id: None,
        }
    }

    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        check_state_tuple(
            self.download_state,
            self.download_percent,
            &self.error_string,
            &self.local_path,
        )
    }

    /// True when the template bytes are usable from this pool.
    pub fn is_ready(&self) -> bool {
        self.download_state == DownloadState::Downloaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_names_match_storage_form() {
        for state in DownloadState::ALL {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{}\"", state.as_str()));
            assert_eq!(state.as_str().parse::<DownloadState>().unwrap(), state);
        }
    }

    #[test]
    fn parse_is_case_insensitive_and_rejects_garbage() {
        assert_eq!(
            " downloaded ".parse::<DownloadState>().unwrap(),
            DownloadState::Downloaded
        );
        assert!("COPYING".parse::<DownloadState>().is_err());
    }

    #[test]
    fn downloaded_needs_path_and_full_percent() {
        assert_eq!(
            check_state_tuple(DownloadState::Downloaded, 100, "", ""),
            Err(InvariantViolation::MissingLocalPath)
        );
        assert_eq!(
            check_state_tuple(DownloadState::Downloaded, 99, "", "/data/t"),
            Err(InvariantViolation::IncompleteDownload(99))
        );
        assert!(check_state_tuple(DownloadState::Downloaded, 100, "", "/data/t").is_ok());
    }

    #[test]
    fn error_state_needs_text() {
        assert_eq!(
            check_state_tuple(DownloadState::DownloadError, 40, "  ", ""),
            Err(InvariantViolation::MissingErrorText)
        );
        assert!(check_state_tuple(DownloadState::DownloadError, 40, "timeout", "").is_ok());
    }

    #[test]
    fn percent_is_bounded() {
        assert_eq!(
            check_state_tuple(DownloadState::DownloadInProgress, 101, "", ""),
            Err(InvariantViolation::PercentOutOfRange(101))
        );
    }

    #[test]
    fn fresh_association_is_not_ready() {
        let assoc = TemplatePoolAssociation::new(9, 5, DownloadState::NotDownloaded);
        assert!(!assoc.is_ready());
        assert!(assoc.check_invariants().is_ok());
        assert_eq!(assoc.job_id, None);
    }
}
