//! # Association Listing Service
//!
//! Read-only listings behind the `GET` routes of `/api/associations`. Each
//! handler maps one store query to a JSON array; an empty array is a normal
//! answer, never a `404`.

use super::run;
use crate::store::AssociationStore;
use actix_web::{web, HttpResponse, Responder};
use common::model::association::DownloadState;
use common::requests::{StatesQuery, StatusQuery, TopologyQuery};

/// Actix web handler for `GET /api/associations/pool/{pool_id}`.
///
/// # Returns
/// - `200 OK` with every association of the pool.
/// - `503 Service Unavailable` when the database cannot be read.
pub(crate) async fn by_pool(path: web::Path<i64>, store: web::Data<AssociationStore>) -> impl Responder {
    let pool_id = path.into_inner();
    match run(store, move |s| s.list_by_pool(pool_id)).await {
        Ok(rows) => HttpResponse::Ok().json(rows),
        Err(response) => response,
    }
}

/// `GET /api/associations/template/{template_id}`
pub(crate) async fn by_template(
    path: web::Path<i64>,
    store: web::Data<AssociationStore>,
) -> impl Responder {
    let template_id = path.into_inner();
    match run(store, move |s| s.list_by_template(template_id)).await {
        Ok(rows) => HttpResponse::Ok().json(rows),
        Err(response) => response,
    }
}

/// Actix web handler for `GET /api/associations/template/{template_id}/status/{state}?pool_id=`.
///
/// # Arguments
/// * `path` - `(template_id, state)`; the state uses its wire name, e.g. `DOWNLOADED`.
/// * `query` - Optional `pool_id` narrowing the listing to one pool.
/// * `store` - The shared association store.
///
/// # Returns
/// - `200 OK` with the matching associations.
/// - `404 Not Found` from Actix when the state segment is not a known state.
pub(crate) async fn by_status(
    path: web::Path<(i64, DownloadState)>,
    query: web::Query<StatusQuery>,
    store: web::Data<AssociationStore>,
) -> impl Responder {
    let (template_id, state) = path.into_inner();
    let pool_id = query.pool_id;
    match run(store, move |s| s.list_by_status(template_id, state, pool_id)).await {
        Ok(rows) => HttpResponse::Ok().json(rows),
        Err(response) => response,
    }
}

/// Actix web handler for `GET /api/associations/template/{template_id}/topology/{state}?datacenter_id=&pod_id=`.
///
/// # Arguments
/// * `path` - `(template_id, state)`.
/// * `query` - The datacenter and an optional pod inside it.
/// * `store` - The shared association store.
///
/// # Returns
/// - `200 OK` with the associations whose pool has a host in scope, each once.
///   An unreadable inventory yields an empty array.
pub(crate) async fn by_topology(
    path: web::Path<(i64, DownloadState)>,
    query: web::Query<TopologyQuery>,
    store: web::Data<AssociationStore>,
) -> impl Responder {
    let (template_id, state) = path.into_inner();
    let TopologyQuery {
        datacenter_id,
        pod_id,
    } = query.into_inner();
    match run(store, move |s| {
        s.list_by_status_in_topology(template_id, state, datacenter_id, pod_id)
    })
    .await
    {
        Ok(rows) => HttpResponse::Ok().json(rows),
        Err(response) => response,
    }
}

/// Actix web handler for `GET /api/associations/template/{template_id}/states?states=A,B`.
///
/// # Returns
/// - `200 OK` with the associations in any of the listed states.
/// - `400 Bad Request` when a listed state is unknown.
pub(crate) async fn by_states(
    path: web::Path<i64>,
    query: web::Query<StatesQuery>,
    store: web::Data<AssociationStore>,
) -> impl Responder {
    let template_id = path.into_inner();
    let states = match query.parse() {
        Ok(states) => states,
        Err(e) => return HttpResponse::BadRequest().body(e.to_string()),
    };
    match run(store, move |s| s.list_by_states_any(template_id, &states)).await {
        Ok(rows) => HttpResponse::Ok().json(rows),
        Err(response) => response,
    }
}
