use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::warn;

use invox_core::MAX_UPLOAD_BYTES;

use crate::state::AppState;

use super::{extract, handlers, invoices};

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_dir = state.config().storage.upload_dir.clone();
    let cors = cors_layer(&state);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/extract", post(extract::extract_invoice))
        .route("/invoices/upload", post(invoices::upload_invoice))
        .route("/invoices", get(invoices::list_invoices))
        .route("/invoices/{id}", get(invoices::get_invoice))
        .route("/invoices/{id}", put(invoices::update_invoice))
        .route("/invoices/{id}", delete(invoices::delete_invoice))
        .nest_service("/uploads", ServeDir::new(upload_dir))
        // Leave headroom above the upload ceiling so oversized payloads are
        // rejected with a clear message instead of a body-limit error.
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 1024 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(state: &AppState) -> CorsLayer {
    match state.config().cors.as_ref() {
        Some(cors) => match cors.allowed_origin.parse::<HeaderValue>() {
            Ok(origin) => CorsLayer::new()
                .allow_origin(origin)
                .allow_methods(Any)
                .allow_headers(Any),
            Err(_) => {
                warn!(
                    "Invalid CORS origin '{}', falling back to permissive",
                    cors.allowed_origin
                );
                CorsLayer::permissive()
            }
        },
        None => CorsLayer::permissive(),
    }
}
