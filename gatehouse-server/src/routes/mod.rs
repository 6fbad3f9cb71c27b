//! HTTP routes.

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware::from_fn,
    routing::{get, post},
};

use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use crate::app::{AppError, AppErrorKind, AppState, app_rest_headers, log_app_errors};

pub mod page;
pub mod verify;

/// Builds the app router.
pub fn router(state: AppState) -> Router {
    Router::<AppState>::new()
        .route("/", get(page::index))
        .route("/verify/callback", get(page::index))
        .route("/verify/process", post(verify::process))
        .route("/health", get(health))
        .fallback(not_found)
        .layer(from_fn(app_rest_headers))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request| {
                    let method = req.method();
                    let uri = req.uri().path();

                    // axum automatically adds this extension.
                    let matched_path = req
                        .extensions()
                        .get::<MatchedPath>()
                        .map(|matched_path| matched_path.as_str());

                    tracing::debug_span!("request", %method, %uri, matched_path)
                })
                // errors are logged by `log_app_errors`
                .on_failure(()),
        )
        .layer(from_fn(log_app_errors))
        .layer(CompressionLayer::new())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn not_found() -> AppError {
    AppErrorKind::NotFound.into()
}
