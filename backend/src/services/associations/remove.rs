use super::run;
use crate::store::AssociationStore;
use actix_web::{web, HttpResponse, Responder};
use serde_json::json;

/// Actix web handler for `DELETE /api/associations/pool/{pool_id}/template/{template_id}`.
///
/// # Returns
/// - `204 No Content` when the association was removed.
/// - `404 Not Found` when the pair had none.
pub(crate) async fn pair(
    path: web::Path<(i64, i64)>,
    store: web::Data<AssociationStore>,
) -> impl Responder {
    let (pool_id, template_id) = path.into_inner();
    match run(store, move |s| s.remove(pool_id, template_id)).await {
        Ok(true) => HttpResponse::NoContent().finish(),
        Ok(false) => HttpResponse::NotFound().body("Association not found"),
        Err(response) => response,
    }
}

/// `DELETE /api/associations/pool/{pool_id}`, for a decommissioned pool.
/// Answers `{"removed": n}`.
pub(crate) async fn pool(path: web::Path<i64>, store: web::Data<AssociationStore>) -> impl Responder {
    let pool_id = path.into_inner();
    match run(store, move |s| s.remove_by_pool(pool_id)).await {
        Ok(removed) => HttpResponse::Ok().json(json!({ "removed": removed })),
        Err(response) => response,
    }
}

/// `DELETE /api/associations/template/{template_id}`, for a template deleted everywhere.
pub(crate) async fn template(
    path: web::Path<i64>,
    store: web::Data<AssociationStore>,
) -> impl Responder {
    let template_id = path.into_inner();
    match run(store, move |s| s.remove_by_template(template_id)).await {
        Ok(removed) => HttpResponse::Ok().json(json!({ "removed": removed })),
        Err(response) => response,
    }
}
