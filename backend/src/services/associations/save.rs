use super::run;
use crate::store::AssociationStore;
use actix_web::{web, HttpResponse, Responder};
use common::model::association::{DownloadState, TemplatePoolAssociation};
use common::requests::CreateAssociationRequest;

/// `POST /api/associations`
///
/// Creates the association the orchestrator needs before a copy starts. Calling
/// it again for an existing pair returns the stored association unchanged.
///
/// # Arguments
/// * `payload` - Pool, template and an optional initial state
///   (`NOT_DOWNLOADED` when omitted).
/// * `store` - The shared association store.
///
/// # Returns
/// - `200 OK` with the stored association.
/// - `400 Bad Request` when the initial state is neither `NOT_DOWNLOADED` nor
///   `DOWNLOAD_IN_PROGRESS`.
pub(crate) async fn create(
    payload: web::Json<CreateAssociationRequest>,
    store: web::Data<AssociationStore>,
) -> impl Responder {
    let CreateAssociationRequest {
        pool_id,
        template_id,
        state,
    } = payload.into_inner();
    let state = state.unwrap_or(DownloadState::NotDownloaded);
    match run(store, move |s| s.create(pool_id, template_id, state)).await {
        Ok(association) => HttpResponse::Ok().json(association),
        Err(response) => response,
    }
}

/// `PUT /api/associations`
///
/// Inserts or replaces the full record keyed by (template, pool). The job lineage
/// gate does not apply; use `/progress` for worker reports.
pub(crate) async fn upsert(
    payload: web::Json<TemplatePoolAssociation>,
    store: web::Data<AssociationStore>,
) -> impl Responder {
    let association = payload.into_inner();
    match run(store, move |s| s.upsert(&association)).await {
        Ok(stored) => HttpResponse::Ok().json(stored),
        Err(response) => response,
    }
}
