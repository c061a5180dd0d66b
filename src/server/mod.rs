mod handlers;
mod state;

use axum::routing::{get, post};
use axum::Router;
use state::AppState;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::finder::FacilityFinder;

pub fn build_router(finder: Arc<FacilityFinder>) -> Router {
    let state = Arc::new(AppState { finder });

    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/facilities", get(handlers::facilities))
        .route("/api/search", get(handlers::search))
        .route("/api/refresh", post(handlers::refresh))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the JSON API until the process is stopped. Kicks off an initial
/// background fetch so the first `/api/facilities` call has data.
pub async fn start(finder: Arc<FacilityFinder>, host: &str, port: u16) -> std::io::Result<()> {
    let initial = finder.clone().spawn_refresh();
    tokio::spawn(async move {
        match initial.await {
            Ok(outcome) => info!(?outcome, "initial fetch finished"),
            Err(e) => error!(error = %e, "initial fetch task panicked"),
        }
    });

    let app = build_router(finder);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("clinic finder listening on http://{}", addr);
    axum::serve(listener, app).await
}
