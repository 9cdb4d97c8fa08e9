use actix_web::{App, HttpServer, web};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod app;
mod db;
mod model;
mod service;

use app::AppState;
use model::Config;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present (ignore if missing)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let bind_addr = config.bind_addr();

    let state = match AppState::new(&config).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize application");
            return Err(std::io::Error::other(e));
        }
    };

    let db_pool = web::Data::new(state.db_pool);
    let triage_service = web::Data::new(state.triage_service);
    let feedback_service = web::Data::new(state.feedback_service);

    tracing::info!("Starting DLP triage server on {}", bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(db_pool.clone())
            .app_data(triage_service.clone())
            .app_data(feedback_service.clone())
            .configure(api::incidents::configure)
            .configure(api::feedback::configure)
            .configure(api::health::configure)
            .configure(api::openapi::configure)
    })
    .bind(&bind_addr)?
    .run()
    .await
}
