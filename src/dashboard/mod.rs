//! Dashboard: Axum web server for observing and steering a running game.
//!
//! Serves a JSON API over the session and pipeline snapshots and forwards
//! control requests to their owning tasks. CORS enabled for local
//! front-end development.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{delete, get, post},
    Router,
};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

pub use routes::{AppState, DashboardState};

/// Bind the dashboard port and serve on a background task.
pub async fn spawn_dashboard(state: AppState, port: u16) -> Result<JoinHandle<()>> {
    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind dashboard port {port}"))?;
    info!(port, "Dashboard server starting on http://localhost:{port}");

    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Dashboard server error");
        }
    }))
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        // Reads
        .route("/health", get(routes::health))
        .route("/api/state", get(routes::get_state))
        .route("/api/events", get(routes::get_events))
        .route("/api/configs", get(routes::get_configs).post(routes::save_config))
        .route("/api/configs/:id", delete(routes::delete_config))
        // Session controls
        .route("/api/lane", post(routes::post_lane))
        .route("/api/click", post(routes::post_click))
        .route("/api/pause", post(routes::post_pause))
        .route("/api/resume", post(routes::post_resume))
        .route("/api/autopilot", post(routes::post_autopilot))
        .route("/api/settings", post(routes::post_settings))
        .route("/api/mode", post(routes::post_mode))
        .route("/api/restart", post(routes::post_restart))
        .route("/api/exit-ride", post(routes::post_exit_ride))
        // Pipeline controls
        .route("/api/speed", post(routes::post_speed))
        .route("/api/forecasts/:id/predict", post(routes::post_predict))
        .route("/api/quizzes/:id/answer", post(routes::post_answer))
        .route("/api/events/:id/analyze", post(routes::post_analyze))
        .route("/api/events/:id/trade", post(routes::post_trade))
        .route("/api/coach", post(routes::post_coach))
        .route("/api/liquidate", post(routes::post_liquidate))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
