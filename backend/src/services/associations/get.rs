//! # Association Lookup Service
//!
//! Single-association reads for the orchestrator: one pair by id, the first
//! association of a template reachable from a host, and whether a host can use
//! a template right away.

use super::run;
use crate::store::AssociationStore;
use actix_web::{web, HttpResponse, Responder};
use common::requests::AvailabilityResponse;

/// Actix web handler for `GET /api/associations/pool/{pool_id}/template/{template_id}`.
///
/// # Arguments
/// * `path` - `(pool_id, template_id)` taken from the URL.
/// * `store` - The shared association store.
///
/// # Returns
/// - `200 OK` with the association as JSON.
/// - `404 Not Found` when the pair has none.
/// - `503 Service Unavailable` when the database cannot be read.
pub(crate) async fn find(
    path: web::Path<(i64, i64)>,
    store: web::Data<AssociationStore>,
) -> impl Responder {
    let (pool_id, template_id) = path.into_inner();
    match run(store, move |s| s.find(pool_id, template_id)).await {
        Ok(Some(association)) => HttpResponse::Ok().json(association),
        Ok(None) => HttpResponse::NotFound().body("Association not found"),
        Err(response) => response,
    }
}

/// Actix web handler for `GET /api/associations/template/{template_id}/host/{host_id}`.
///
/// Resolves the pools attached to the host and returns the association with
/// the lowest id among them.
///
/// # Arguments
/// * `path` - `(template_id, host_id)` taken from the URL.
/// * `store` - The shared association store.
///
/// # Returns
/// - `200 OK` with the association as JSON.
/// - `404 Not Found` when no reachable pool holds the template, or the host
///   cannot be resolved.
pub(crate) async fn find_by_host(
    path: web::Path<(i64, i64)>,
    store: web::Data<AssociationStore>,
) -> impl Responder {
    let (template_id, host_id) = path.into_inner();
    match run(store, move |s| s.find_by_host_template(host_id, template_id)).await {
        Ok(Some(association)) => HttpResponse::Ok().json(association),
        Ok(None) => HttpResponse::NotFound().body("Association not found"),
        Err(response) => response,
    }
}

/// Actix web handler for `GET /api/associations/template/{template_id}/host/{host_id}/available`.
///
/// # Returns
/// - `200 OK` with an `AvailabilityResponse`; `available` is true only when a
///   pool reachable from the host holds a `DOWNLOADED` copy.
pub(crate) async fn available(
    path: web::Path<(i64, i64)>,
    store: web::Data<AssociationStore>,
) -> impl Responder {
    let (template_id, host_id) = path.into_inner();
    match run(store, move |s| s.is_available(template_id, host_id)).await {
        Ok(available) => HttpResponse::Ok().json(AvailabilityResponse {
            template_id,
            host_id,
            available,
        }),
        Err(response) => response,
    }
}
