//! Reefbook API server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use reefbook_realtime::hub::Hub;
use reefbook_scheduler::health::ProcStatusSampler;
use reefbook_scheduler::runner::Scheduler;
use reefbook_scheduler::weather::NoWeather;
use reefbook_store::schema::ensure_schema;

mod auth;
mod config;
mod directory;
mod error;
mod notifier;
mod routes;
mod state;
#[cfg(test)]
mod testing;

use config::Config;
use error::AppError;
use state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting Reefbook API server");

    let config = Config::from_env()?;
    let hub = Arc::new(Hub::new(config.max_live_connections));

    let state = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .connect(url)
                .await?;
            ensure_schema(&pool).await?;
            tracing::info!("Connected to PostgreSQL");
            AppState::postgres(pool, &config, Arc::clone(&hub))
        }
        None => {
            tracing::warn!("DATABASE_URL is not set; bookings live in process memory");
            AppState::in_memory(&config, Arc::clone(&hub))
        }
    };

    let scheduler = Scheduler {
        config: config.scheduler,
        policy: config.policy.clone(),
        clock: Arc::clone(&state.clock),
        bookings: Arc::clone(&state.bookings),
        experiences: Arc::clone(&state.experiences),
        notifications: Arc::clone(&state.notifications),
        directory: Arc::clone(&state.directory),
        weather: Arc::new(NoWeather),
        sampler: Arc::new(ProcStatusSampler),
        hub: Arc::clone(&hub),
    }
    .spawn();

    // Build router.
    // TODO: Replace CorsLayer::permissive() with restricted origins for production.
    let app = Router::new()
        .merge(routes::health::router())
        .nest(
            "/api/bookings",
            routes::bookings::router().merge(routes::experiences::booking_router()),
        )
        .nest("/api/experiences", routes::experiences::router())
        .nest("/api/packages", routes::packages::router())
        .nest("/api/payments", routes::payments::router())
        .nest("/api/notifications", routes::notifications::router())
        .nest("/api/admin", routes::admin::router())
        .nest("/api", routes::realtime::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    // Start server.
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The serve future resolves once in-flight requests finish; stop the
    // background sweeps before exiting.
    scheduler.shutdown().await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(%error, "Failed to listen for the shutdown signal");
    }
}
