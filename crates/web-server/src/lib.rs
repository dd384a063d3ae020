//! # MarketLens Web Server
//!
//! The HTTP face of the analysis pipeline: start a job, poll it, fetch its result.
//!
//! ## Public API
//!
//! - `AppState`: the shared state all handlers can access.
//! - `build_router`: the full router with its middleware stack, used by the server and by tests.
//! - `run_server`: binds the listener and serves until the shutdown signal fires.

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use configuration::ServerSettings;
use orchestrator::JobOrchestrator;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;

/// The shared application state that all handlers can access.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: JobOrchestrator,
    pub server: ServerSettings,
}

/// Request bodies are a couple of short strings.
const MAX_BODY_BYTES: usize = 16 * 1024;

fn cors_layer(server: &ServerSettings) -> CorsLayer {
    let origins = server.allowed_origins();
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(%origin, "Ignoring invalid CORS origin.");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(AllowHeaders::any())
        .expose_headers([middleware::X_REQUEST_ID.clone()])
}

/// Builds the application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let analysis = Router::new()
        .route("/run", post(handlers::run_analysis))
        .route("/:job_id/status", get(handlers::get_job_status))
        .route("/:job_id", get(handlers::get_analysis_result))
        .route("/ticker/:symbol/latest", get(handlers::get_latest_for_ticker))
        .route_layer(axum::middleware::from_fn_with_state(
            Arc::clone(&state),
            middleware::require_api_token,
        ));

    let cors = cors_layer(&state.server);

    // --- DEFINE THE APPLICATION ROUTES ---
    Router::new()
        .route("/api/health", get(handlers::health))
        .nest("/api/analysis", analysis)
        .fallback(handlers::fallback)
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::fill_error_path))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        // This middleware will automatically log information about every incoming request.
        .layer(TraceLayer::new_for_http())
        // Outermost, so every span below carries the request id.
        .layer(axum::middleware::from_fn(middleware::request_id))
}

/// The main function to configure and run the web server.
///
/// Serves until `shutdown` resolves, then lets in-flight requests finish.
pub async fn run_server(
    state: Arc<AppState>,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Web server started and listening on {}", addr);

    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

    tracing::info!("Web server stopped accepting connections.");
    Ok(())
}
