use crate::model::association::{DownloadState, ParseDownloadStateError};
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize)]
/// Request payload for creating the initial association of a template and a pool.
/// `state` defaults to `NOT_DOWNLOADED`.
pub struct CreateAssociationRequest {
    pub pool_id: i64,
    pub template_id: i64,
    #[serde(default)]
    pub state: Option<DownloadState>,
}

#[derive(Deserialize, Serialize, Default)]
/// Optional pool filter for status listings.
pub struct StatusQuery {
    pub pool_id: Option<i64>,
}

#[derive(Deserialize, Serialize)]
/// Topology scope for status listings.
pub struct TopologyQuery {
    pub datacenter_id: i64,
    pub pod_id: Option<i64>,
}

#[derive(Deserialize, Serialize)]
/// Comma separated list of states, e.g. `DOWNLOADED,DOWNLOAD_IN_PROGRESS`.
pub struct StatesQuery {
    pub states: String,
}

impl StatesQuery {
    pub fn parse(&self) -> Result<Vec<DownloadState>, ParseDownloadStateError> {
        self.states
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(str::parse)
            .collect()
    }
}

#[derive(Deserialize, Serialize, Default)]
/// Job the cancellation is issued on behalf of.
pub struct AbandonQuery {
    pub job_id: Option<i64>,
}

#[derive(Deserialize, Serialize, Debug, PartialEq, Eq)]
pub struct AvailabilityResponse {
    pub template_id: i64,
    pub host_id: i64,
    pub available: bool,
}
