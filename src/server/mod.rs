mod handlers;
mod state;

use axum::http::{header, HeaderValue};
use axum::routing::{get, post};
use axum::Router;
use state::AppState;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;

use crate::sources::Registry;

pub fn build_router(registry: Registry) -> Router {
    let state = Arc::new(AppState::new(registry));

    Router::new()
        .route("/nearestNJson", get(handlers::nearest_json))
        .route("/nearestNJsonByZipCode", get(handlers::nearest_json_by_zip_code))
        .route("/api/sources", get(handlers::list_sources))
        .route("/api/sources/{name}/refresh", post(handlers::refresh_source))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start(registry: Registry, host: &str, port: u16) -> std::io::Result<()> {
    let sources = registry.names().join(", ");
    let app = build_router(registry);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(%addr, %sources, "lilyfarm server listening");

    axum::serve(listener, app).await
}
