mod auth;
mod config;
mod middleware;

mod db;
mod error;
mod importer;
mod mailer;
mod models;
mod notifier;
mod routes;

use std::sync::Arc;

use crate::{config::Config, mailer::LogMailer, models::AppState, notifier::SimulatedSender};

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use axum::extract::DefaultBodyLimit;
use axum::http::header;
use tracing_subscriber::EnvFilter;

// Room for multipart boundaries and the other form fields around the file.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;
    let pool = db::connect_pg(&cfg.database_url).await?;
    db::migrate(&pool).await?;

    if cfg.require_account_activation {
        tracing::info!("new accounts require email activation");
    }

    let state = AppState {
        db: pool,
        session_ttl_hours: cfg.session_ttl_hours,
        account_token_ttl_hours: cfg.account_token_ttl_hours,
        require_account_activation: cfg.require_account_activation,
        public_base_url: cfg.public_base_url.clone(),
        reminder_lead_hours: cfg.reminder_lead_hours,
        max_upload_bytes: cfg.max_upload_bytes,
        mailer: Arc::new(LogMailer),
        sender: Arc::new(SimulatedSender),
    };

    // Browser front-ends call the API from another origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]);

    let app = routes::router(state)
        .layer(DefaultBodyLimit::max(cfg.max_upload_bytes + MULTIPART_OVERHEAD_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
