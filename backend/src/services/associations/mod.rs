//! # Association Service Module
//!
//! HTTP surface of the association store. Every route lives under
//! `/api/associations`; handlers run the blocking store call on Actix's blocking
//! pool and answer with JSON.
//!
//! ## Sub-modules:
//! - `list`: listings by pool, template, state, state set and topology scope.
//! - `get`: single-association lookups and host availability.
//! - `save`: orchestrator-side creation and full-record upserts.
//! - `progress`: worker progress reports (queued) and cancellation.
//! - `remove`: removal of one pair, a whole pool or a whole template.

mod get;
mod list;
mod progress;
mod remove;
mod save;

use crate::store::{self, AssociationStore, StoreError};
use actix_web::web::{self, delete, get, post, put, scope};
use actix_web::{HttpResponse, Scope};

/// The base path for all association endpoints.
const API_PATH: &str = "/api/associations";

/// Configures and returns the Actix `Scope` for all association routes.
///
/// # Registered Routes:
///
/// *   **`POST /`** and **`PUT /`**: create the initial association / upsert a full record.
/// *   **`POST /progress`**: queue a worker progress report, answers `202 Accepted`.
/// *   **`GET|DELETE /pool/{pool_id}`**: list / remove every association of a pool.
/// *   **`GET|DELETE /pool/{pool_id}/template/{template_id}`**: find / remove one pair.
/// *   **`POST /pool/{pool_id}/template/{template_id}/abandon?job_id=`**: cancel a copy.
/// *   **`GET|DELETE /template/{template_id}`**: list / remove every association of a template.
/// *   **`GET /template/{template_id}/status/{state}?pool_id=`**
/// *   **`GET /template/{template_id}/topology/{state}?datacenter_id=&pod_id=`**
/// *   **`GET /template/{template_id}/states?states=A,B`**
/// *   **`GET /template/{template_id}/host/{host_id}`**: first association reachable from a host.
/// *   **`GET /template/{template_id}/host/{host_id}/available`**
pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("", post().to(save::create))
        .route("", put().to(save::upsert))
        .route("/progress", post().to(progress::process))
        .route("/pool/{pool_id}", get().to(list::by_pool))
        .route("/pool/{pool_id}", delete().to(remove::pool))
        .route("/pool/{pool_id}/template/{template_id}", get().to(get::find))
        .route("/pool/{pool_id}/template/{template_id}", delete().to(remove::pair))
        .route(
            "/pool/{pool_id}/template/{template_id}/abandon",
            post().to(progress::abandon),
        )
        .route("/template/{template_id}", get().to(list::by_template))
        .route("/template/{template_id}", delete().to(remove::template))
        .route("/template/{template_id}/status/{state}", get().to(list::by_status))
        .route("/template/{template_id}/topology/{state}", get().to(list::by_topology))
        .route("/template/{template_id}/states", get().to(list::by_states))
        .route("/template/{template_id}/host/{host_id}", get().to(get::find_by_host))
        .route(
            "/template/{template_id}/host/{host_id}/available",
            get().to(get::available),
        )
}

/// Runs a store operation on the blocking pool and maps failures to responses.
async fn run<T, F>(store: web::Data<AssociationStore>, op: F) -> Result<T, HttpResponse>
where
    F: FnOnce(&AssociationStore) -> store::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let store = store.into_inner();
    match web::block(move || op(&store)).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(store_error_response(&e)),
        Err(e) => Err(HttpResponse::InternalServerError().body(format!("Blocking task failed: {}", e))),
    }
}

fn store_error_response(e: &StoreError) -> HttpResponse {
    match e {
        StoreError::InconsistentState { .. } | StoreError::InvalidInitialState(_) => {
            HttpResponse::BadRequest().body(e.to_string())
        }
        StoreError::Storage(_) | StoreError::Serialization(_) => {
            HttpResponse::ServiceUnavailable().body(format!("Error accessing associations: {}", e))
        }
    }
}
