use actix_web::{web, App, HttpServer};
use backend::config::TrackerConfig;
use backend::job_controller::state::{start_report_updater, ReportQueue};
use backend::services;
use backend::store::AssociationStore;
use env_logger::Env;
use log::info;
use std::io;

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = TrackerConfig::from_env()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let store = AssociationStore::open(&config.db_path).map_err(io::Error::other)?;

    // Start the progress updater; handlers only enqueue reports.
    let (queue, rx) = ReportQueue::new(config.report_queue_capacity);
    let updater_store = store.clone();
    let workers = config.report_workers;
    tokio::spawn(async move {
        start_report_updater(updater_store, rx, workers).await;
    });

    info!("Template tracker running at {}", config.url());

    HttpServer::new(move || {
        App::new()
            .app_data(web::JsonConfig::default().limit(64 * 1024))
            .app_data(web::Data::new(store.clone()))
            .app_data(web::Data::new(queue.clone()))
            .service(services::associations::configure_routes())
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
