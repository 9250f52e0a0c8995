//! Router configuration for the HTTP API.
//!
//! This module sets up all routes, middleware (CORS, compression, tracing,
//! panic recovery), and creates the axum router ready for serving.

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use super::error::handle_panic;
use super::handlers;
use super::state::AppState;
use crate::config::ServerConfig;

/// CORS for the configured front-end origins. Credentials are allowed, so
/// methods and headers are mirrored instead of wildcarded.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Create the main application router with all routes and middleware.
pub fn create_router(state: AppState, config: &ServerConfig) -> Router {
    let queries = Router::new()
        .route("/main", get(handlers::list_main_queries))
        .route("/main/{id}/results", get(handlers::main_query_results))
        .route("/auxiliary", get(handlers::list_auxiliary_queries))
        .route(
            "/auxiliary/{id}/results",
            get(handlers::auxiliary_query_results),
        );

    let installations = Router::new()
        .route("/{id}", get(handlers::get_installation))
        .route("/{id}/consumption", get(handlers::consumption_history))
        .route("/{id}/frauds", get(handlers::fraud_history))
        .route("/{id}/service-notes", get(handlers::service_notes))
        .route(
            "/{id}/status",
            get(handlers::current_status).put(handlers::update_status),
        )
        .route("/{id}/status/history", get(handlers::status_history));

    let areas = Router::new()
        .route("/municipalities", get(handlers::list_municipalities))
        .route(
            "/municipalities/{name}/geometry",
            get(handlers::municipality_geometry),
        )
        .route("/metrics", post(handlers::area_metrics));

    let api = Router::new()
        .nest("/queries", queries)
        .nest("/installations", installations)
        .nest("/areas", areas);

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .nest("/api", api)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors_origins))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::LocalRepository;
    use crate::db::repository::FullRepository;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn router() -> Router {
        let repo = Arc::new(LocalRepository::new()) as Arc<dyn FullRepository>;
        create_router(AppState::new(repo), &ServerConfig::default())
    }

    #[tokio::test]
    async fn test_root_banner() {
        let response = router()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cors_allows_configured_origin() {
        let response = router()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(header::ORIGIN, "http://localhost:5173")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "http://localhost:5173"
        );
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
                .unwrap(),
            "true"
        );
    }

    #[tokio::test]
    async fn test_cors_rejects_unknown_origin() {
        let response = router()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(header::ORIGIN, "https://evil.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }
}
