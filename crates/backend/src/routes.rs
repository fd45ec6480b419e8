use axum::{
    http::{header, Method, StatusCode},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{auth, relay, AppState};

pub fn app_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        // Login routes
        .route("/auth/google", get(auth::google_login))
        .route("/auth/google/callback", get(auth::google_callback))
        .route("/logout", get(auth::logout))
        .route("/api/me", get(auth::me))
        // Support request routes
        .route("/api/requests", post(relay::handlers::submit_request))
        .route(
            "/api/requests/:category",
            get(relay::handlers::list_requests),
        )
}

pub fn build_router(state: AppState, cors_origins: Option<&[String]>) -> Router {
    app_routes()
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(cors_origins))
        .with_state(state)
}

async fn health_check() -> StatusCode {
    StatusCode::OK
}

/// Build CORS layer from the configured origins.
///
/// With no origins configured, defaults to permissive CORS (for development only).
fn build_cors_layer(allowed_origins: Option<&[String]>) -> CorsLayer {
    match allowed_origins {
        Some(origins) => {
            let origins: Vec<_> = origins
                .iter()
                .filter_map(|s| s.trim().parse().ok())
                .collect();

            if origins.is_empty() {
                tracing::warn!(
                    "CORS_ALLOWED_ORIGINS is set but empty, using permissive CORS (not recommended for production)"
                );
                CorsLayer::permissive()
            } else {
                tracing::info!("CORS configured for origins: {:?}", origins);
                CorsLayer::new()
                    .allow_origin(AllowOrigin::list(origins))
                    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE])
                    .allow_credentials(true)
            }
        }
        None => {
            tracing::warn!(
                "CORS_ALLOWED_ORIGINS not set, using permissive CORS (not recommended for production)"
            );
            CorsLayer::permissive()
        }
    }
}
