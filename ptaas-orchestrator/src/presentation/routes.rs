//! Route definitions and server setup

use axum::http::StatusCode;
use axum::{
    Router, middleware,
    response::{IntoResponse, Response},
    routing::{delete, get},
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use ptaas_core::Config;

use crate::domain::entities::{
    ActiveScanRecord, ArtifactObject, CompletedLogEntry, Finding, FindingSummary, ImportResult,
    ScanResult,
};
use crate::domain::value_objects::{ScanMode, ScanType, Severity};
use crate::presentation::{
    controllers::{
        OrchestratorState,
        dojo::{get_finding, list_engagements, list_findings, list_products, list_tests},
        health::health_check,
        results::{delete_artifact, download_result, list_artifacts},
        scans::{get_scan, list_active, list_completed, submit_scan},
    },
    middleware::logging_middleware,
    models::*,
};

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::presentation::controllers::scans::submit_scan,
        crate::presentation::controllers::scans::get_scan,
        crate::presentation::controllers::scans::list_active,
        crate::presentation::controllers::scans::list_completed,
        crate::presentation::controllers::results::download_result,
        crate::presentation::controllers::results::list_artifacts,
        crate::presentation::controllers::results::delete_artifact,
        crate::presentation::controllers::dojo::list_findings,
        crate::presentation::controllers::dojo::get_finding,
        crate::presentation::controllers::dojo::list_products,
        crate::presentation::controllers::dojo::list_engagements,
        crate::presentation::controllers::dojo::list_tests,
        crate::presentation::controllers::health::health_check
    ),
    components(
        schemas(
            ScanSubmission,
            ScanAcceptedResponse,
            ScanStatusResponse,
            ErrorResponse,
            HealthResponse,
            DependencyConfiguration,
            ActiveScanRecord,
            CompletedLogEntry,
            ArtifactObject,
            FindingSummary,
            ScanResult,
            ImportResult,
            Finding,
            ScanType,
            ScanMode,
            Severity
        )
    ),
    tags(
        (name = "scans", description = "Scan submission, status and tracking"),
        (name = "results", description = "Raw scan artifacts"),
        (name = "findings", description = "Vulnerability management proxies"),
        (name = "health", description = "Service health")
    ),
    info(
        title = "PTaaS API",
        version = "0.1.0",
        description = "Queue network, web application and SQL injection scans, follow their progress and collect their results.",
        license(
            name = "AGPL-3.0",
            url = "https://www.gnu.org/licenses/agpl-3.0.html"
        )
    ),
    servers(
        (url = "http://localhost:8000", description = "Local development server")
    )
)]
pub struct ApiDoc;

async fn root_handler() -> Response {
    axum::Json(serde_json::json!({
        "name": "PTaaS API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Penetration testing as a service scan orchestrator",
        "endpoints": {
            "health": "/health",
            "api": "/api/v1",
            "docs": "/docs"
        }
    }))
    .into_response()
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let methods = [
        axum::http::Method::GET,
        axum::http::Method::POST,
        axum::http::Method::DELETE,
        axum::http::Method::OPTIONS,
    ];
    let headers = [
        axum::http::header::CONTENT_TYPE,
        axum::http::header::ACCEPT,
        axum::http::header::ORIGIN,
    ];

    if allowed_origins.len() == 1 && allowed_origins[0] == "*" {
        tracing::warn!("CORS: Using wildcard origin (*); restrict allowed_origins in production");
        return CorsLayer::new()
            .allow_origin(tower_http::cors::AllowOrigin::any())
            .allow_methods(methods)
            .allow_headers(headers)
            .max_age(Duration::from_secs(3600));
    }

    let origins: Vec<axum::http::HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| {
            axum::http::HeaderValue::from_str(origin)
                .map_err(|_| {
                    tracing::warn!(origin, "Invalid CORS origin in config; skipping");
                })
                .ok()
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(headers)
        .max_age(Duration::from_secs(3600))
}

/// Create the application router with its middleware stack
pub fn create_router(orchestrator_state: OrchestratorState, config: Arc<Config>) -> Router {
    // `{scan}` is a scan type on POST and a job id on GET
    let scan_routes = Router::new()
        .route("/scans/active", get(list_active))
        .route("/scans/completed", get(list_completed))
        .route("/scans/{scan}", get(get_scan).post(submit_scan));

    let result_routes = Router::new()
        .route("/results/{job_id}/download", get(download_result))
        .route("/artifacts", get(list_artifacts))
        .route("/artifacts/{key}", delete(delete_artifact));

    let dojo_routes = Router::new()
        .route("/findings", get(list_findings))
        .route("/findings/{id}", get(get_finding))
        .route("/dojo/products", get(list_products))
        .route("/dojo/engagements", get(list_engagements))
        .route("/dojo/tests", get(list_tests));

    let api_routes = Router::new()
        .merge(scan_routes)
        .merge(result_routes)
        .merge(dojo_routes);

    let health_routes = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check));

    let mut router = Router::new()
        .nest("/api/v1", api_routes)
        .merge(health_routes);

    // Conditionally expose Swagger UI based on configuration (avoid leaking docs in production).
    if config.server.enable_docs {
        router =
            router.merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));
    }

    let service_builder = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.server.allowed_origins))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.server.request_timeout_seconds),
        ))
        .layer(middleware::from_fn(logging_middleware));

    router
        .layer(service_builder)
        .with_state(orchestrator_state)
}
