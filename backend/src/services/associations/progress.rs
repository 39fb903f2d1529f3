//! # Progress Reporting Service
//!
//! Entry point for transfer workers. Reports are validated here and handed to
//! the progress updater in `job_controller::state`, which applies them in the
//! background and retries transient storage failures. Cancellation goes through
//! the store directly so the caller gets the outcome.

use super::run;
use crate::job_controller::state::ReportQueue;
use crate::store::AssociationStore;
use actix_web::{web, HttpResponse, Responder};
use common::jobs::ProgressReport;
use common::model::association::check_state_tuple;
use common::requests::AbandonQuery;

/// Actix web handler for `POST /api/associations/progress`.
///
/// Workers report fire-and-forget. Reports that can never be stored are refused
/// up front; everything else is queued for the progress updater, whether or not
/// it later turns out to be stale.
///
/// # Arguments
/// * `payload` - The worker's `ProgressReport` as JSON.
/// * `queue` - Sending side of the progress updater channel.
///
/// # Returns
/// - `202 Accepted` once the report is queued.
/// - `400 Bad Request` when the state tuple breaks an invariant.
/// - `503 Service Unavailable` when the updater is no longer running.
pub(crate) async fn process(
    payload: web::Json<ProgressReport>,
    queue: web::Data<ReportQueue>,
) -> impl Responder {
    let report = payload.into_inner();
    if let Err(violation) = check_state_tuple(
        report.state,
        report.percent,
        &report.error_text,
        &report.local_path,
    ) {
        return HttpResponse::BadRequest().body(violation.to_string());
    }
    match queue.submit(report).await {
        Ok(()) => HttpResponse::Accepted().finish(),
        Err(e) => HttpResponse::ServiceUnavailable().body(e),
    }
}

/// `POST /api/associations/pool/{pool_id}/template/{template_id}/abandon?job_id=`
///
/// Applied synchronously so the caller learns whether its cancellation won.
///
/// # Returns
/// - `200 OK` with the `ProgressOutcome`, `"Applied"` or `"Stale"`.
/// - `503 Service Unavailable` when the database cannot be written.
pub(crate) async fn abandon(
    path: web::Path<(i64, i64)>,
    query: web::Query<AbandonQuery>,
    store: web::Data<AssociationStore>,
) -> impl Responder {
    let (pool_id, template_id) = path.into_inner();
    let job_id = query.job_id;
    match run(store, move |s| s.abandon(pool_id, template_id, job_id)).await {
        Ok(outcome) => HttpResponse::Ok().json(outcome),
        Err(response) => response,
    }
}
