//! Dashboard API route handlers.
//!
//! Reads come straight from the session and pipeline watch channels; writes
//! are forwarded as commands and applied by the owning task. All endpoints
//! speak JSON. State is shared via `Arc<DashboardState>`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, RwLock};
use tracing::{debug, error, info, warn};

use crate::engine::geometry::LANE_COUNT;
use crate::engine::session::SessionCommand;
use crate::engine::state::GameState;
use crate::llm::ContentGenerator;
use crate::market::OrderService;
use crate::pipeline::{FeedMode, PipelineMessage, PipelineSnapshot};
use crate::storage::{self, SavedConfigs};
use crate::types::{GameConfig, GameError, GameEvent, GameMode, Outcome};

/// Reply used when the coach cannot be reached.
pub const COACH_FALLBACK: &str =
    "I'm having trouble connecting right now. Keep an eye on the momentum!";

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    pub session: mpsc::Sender<SessionCommand>,
    pub game: watch::Receiver<GameState>,
    pub pipeline: mpsc::Sender<PipelineMessage>,
    pub events: watch::Receiver<PipelineSnapshot>,
    pub generator: Arc<dyn ContentGenerator>,
    /// Present in live mode only.
    pub orders: Option<Arc<dyn OrderService>>,
    pub saved: RwLock<SavedConfigs>,
    pub storage_path: String,
    pub start_time: DateTime<Utc>,
}

pub type AppState = Arc<DashboardState>;

impl DashboardState {
    async fn send_session(&self, command: SessionCommand) -> Result<(), ApiError> {
        self.session
            .send(command)
            .await
            .map_err(|_| ApiError::from(GameError::ChannelClosed))
    }

    async fn send_pipeline(&self, message: PipelineMessage) -> Result<(), ApiError> {
        self.pipeline
            .send(message)
            .await
            .map_err(|_| ApiError::from(GameError::ChannelClosed))
    }

    fn snapshot(&self) -> PipelineSnapshot {
        self.events.borrow().clone()
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unavailable(String),
    Upstream(anyhow::Error),
    Internal(anyhow::Error),
}

impl From<GameError> for ApiError {
    fn from(err: GameError) -> Self {
        match err {
            GameError::UnknownEvent(id) => ApiError::NotFound(format!("Event not found: {id}")),
            GameError::InvalidLane { .. } | GameError::Storage(_) | GameError::Config(_) => {
                ApiError::BadRequest(err.to_string())
            }
            GameError::ChannelClosed => ApiError::Unavailable(err.to_string()),
            other => ApiError::Upstream(other.into()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            ApiError::Upstream(err) => {
                warn!(error = %err, "Upstream call failed");
                (StatusCode::BAD_GATEWAY, err.to_string())
            }
            ApiError::Internal(err) => {
                error!(error = %err, "Dashboard request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub mode: FeedMode,
    pub uptime_secs: i64,
}

#[derive(Debug, Deserialize)]
pub struct LaneRequest {
    pub lane: usize,
}

#[derive(Debug, Deserialize)]
pub struct ClickRequest {
    pub x: f64,
}

#[derive(Debug, Deserialize)]
pub struct SettingsRequest {
    pub stop_pct: f64,
    pub min_momentum: f64,
}

#[derive(Debug, Deserialize)]
pub struct ModeRequest {
    pub mode: GameMode,
}

#[derive(Debug, Deserialize)]
pub struct SpeedRequest {
    pub speed: f64,
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub prediction: Outcome,
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub answer: usize,
}

#[derive(Debug, Deserialize)]
pub struct TradeRequest {
    pub quantity: f64,
    #[serde(default)]
    pub stop_loss: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct CoachRequest {
    pub question: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoachResponse {
    pub reply: String,
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        mode: state.events.borrow().mode,
        uptime_secs: (Utc::now() - state.start_time).num_seconds(),
    })
}

/// GET /api/state
pub async fn get_state(State(state): State<AppState>) -> Json<GameState> {
    Json(state.game.borrow().clone())
}

/// GET /api/events
pub async fn get_events(State(state): State<AppState>) -> Json<PipelineSnapshot> {
    Json(state.snapshot())
}

/// GET /api/configs
pub async fn get_configs(State(state): State<AppState>) -> Json<Vec<GameConfig>> {
    Json(state.saved.read().await.all())
}

// ---------------------------------------------------------------------------
// Saved configs
// ---------------------------------------------------------------------------

/// POST /api/configs
pub async fn save_config(
    State(state): State<AppState>,
    Json(config): Json<GameConfig>,
) -> Result<StatusCode, ApiError> {
    let mut saved = state.saved.write().await;
    let id = config.id.clone();
    saved.upsert(config)?;
    storage::save_configs(&saved, Some(&state.storage_path))?;
    info!(config_id = %id, "Custom config saved");
    Ok(StatusCode::CREATED)
}

/// DELETE /api/configs/:id
pub async fn delete_config(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let mut saved = state.saved.write().await;
    if saved.remove(&id).is_none() {
        return Err(ApiError::NotFound(format!("Config not found: {id}")));
    }
    storage::save_configs(&saved, Some(&state.storage_path))?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Session controls
// ---------------------------------------------------------------------------

/// POST /api/lane
pub async fn post_lane(
    State(state): State<AppState>,
    Json(req): Json<LaneRequest>,
) -> Result<StatusCode, ApiError> {
    if req.lane >= LANE_COUNT {
        return Err(GameError::InvalidLane {
            lane: req.lane,
            lane_count: LANE_COUNT,
        }
        .into());
    }
    state.send_session(SessionCommand::SwitchLane(req.lane)).await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/click
pub async fn post_click(
    State(state): State<AppState>,
    Json(req): Json<ClickRequest>,
) -> Result<StatusCode, ApiError> {
    state.send_session(SessionCommand::Click(req.x)).await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/pause
pub async fn post_pause(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.send_session(SessionCommand::Pause).await?;
    state.send_pipeline(PipelineMessage::SetPlaying(false)).await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/resume
pub async fn post_resume(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.send_session(SessionCommand::Resume).await?;
    state.send_pipeline(PipelineMessage::SetPlaying(true)).await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/autopilot
pub async fn post_autopilot(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.send_session(SessionCommand::ToggleAutopilot).await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/settings
pub async fn post_settings(
    State(state): State<AppState>,
    Json(req): Json<SettingsRequest>,
) -> Result<StatusCode, ApiError> {
    if !(req.stop_pct > 0.0 && req.stop_pct <= 1.0) {
        return Err(ApiError::BadRequest("stop_pct must be in (0, 1]".into()));
    }
    if !(req.min_momentum >= 0.0) {
        return Err(ApiError::BadRequest("min_momentum must be non-negative".into()));
    }
    state
        .send_session(SessionCommand::UpdateSettings {
            stop_pct: req.stop_pct,
            min_momentum: req.min_momentum,
        })
        .await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/mode
pub async fn post_mode(
    State(state): State<AppState>,
    Json(req): Json<ModeRequest>,
) -> Result<StatusCode, ApiError> {
    state.send_session(SessionCommand::SetMode(req.mode)).await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/restart
pub async fn post_restart(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.send_session(SessionCommand::Restart).await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/exit-ride
pub async fn post_exit_ride(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.send_session(SessionCommand::ExitRide).await?;
    Ok(StatusCode::ACCEPTED)
}

// ---------------------------------------------------------------------------
// Pipeline controls
// ---------------------------------------------------------------------------

/// POST /api/speed
pub async fn post_speed(
    State(state): State<AppState>,
    Json(req): Json<SpeedRequest>,
) -> Result<StatusCode, ApiError> {
    if !(req.speed > 0.0) {
        return Err(ApiError::BadRequest("speed must be positive".into()));
    }
    state.send_pipeline(PipelineMessage::SetSpeed(req.speed)).await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/forecasts/:id/predict
pub async fn post_predict(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<PredictRequest>,
) -> Result<StatusCode, ApiError> {
    if !matches!(state.snapshot().event(&id), Some(GameEvent::Forecast(_))) {
        return Err(GameError::UnknownEvent(id).into());
    }
    state
        .send_pipeline(PipelineMessage::Predict {
            id,
            prediction: req.prediction,
        })
        .await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/quizzes/:id/answer
pub async fn post_answer(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AnswerRequest>,
) -> Result<StatusCode, ApiError> {
    if !matches!(state.snapshot().event(&id), Some(GameEvent::Quiz(_))) {
        return Err(GameError::UnknownEvent(id).into());
    }
    state
        .send_pipeline(PipelineMessage::AnswerQuiz {
            id,
            answer: req.answer,
        })
        .await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/events/:id/analyze
pub async fn post_analyze(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.snapshot().market_event(&id).is_none() {
        return Err(GameError::UnknownEvent(id).into());
    }
    state.send_pipeline(PipelineMessage::Analyze(id)).await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/events/:id/trade
pub async fn post_trade(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<TradeRequest>,
) -> Result<StatusCode, ApiError> {
    if !(req.quantity > 0.0) {
        return Err(ApiError::BadRequest("quantity must be positive".into()));
    }
    if state.snapshot().market_event(&id).is_none() {
        return Err(GameError::UnknownEvent(id).into());
    }
    state
        .send_pipeline(PipelineMessage::SettleTrade {
            id,
            quantity: req.quantity,
            stop_loss: req.stop_loss,
        })
        .await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/coach
pub async fn post_coach(
    State(state): State<AppState>,
    Json(req): Json<CoachRequest>,
) -> Result<Json<CoachResponse>, ApiError> {
    let question = req.question.trim();
    if question.is_empty() {
        return Err(ApiError::BadRequest("question must not be empty".into()));
    }
    let context = state.snapshot().coach_context();
    let reply = match state.generator.coach_reply(question, &context).await {
        Ok(reply) if !reply.trim().is_empty() => reply,
        Ok(_) => COACH_FALLBACK.to_string(),
        Err(e) => {
            warn!(error = %e, "Coach reply failed");
            COACH_FALLBACK.to_string()
        }
    };
    debug!(question, "Coach answered");
    Ok(Json(CoachResponse { reply }))
}

/// POST /api/liquidate
pub async fn post_liquidate(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    let Some(orders) = state.orders.as_ref() else {
        return Err(ApiError::BadRequest(
            "Liquidation is only available in live mode".into(),
        ));
    };
    orders
        .close_all_positions()
        .await
        .map_err(ApiError::Upstream)?;
    info!("All positions closed");
    Ok(StatusCode::OK)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        assert!(matches!(
            ApiError::from(GameError::UnknownEvent("event-1".into())),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from(GameError::InvalidLane { lane: 9, lane_count: 5 }),
            ApiError::BadRequest(_)
        ));
        assert!(matches!(
            ApiError::from(GameError::ChannelClosed),
            ApiError::Unavailable(_)
        ));
        assert!(matches!(
            ApiError::from(GameError::Generation {
                model: "gemini".into(),
                message: "503".into()
            }),
            ApiError::Upstream(_)
        ));
    }

    #[test]
    fn test_error_status_codes() {
        let resp = ApiError::NotFound("x".into()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let resp = ApiError::Internal(anyhow::anyhow!("disk")).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_trade_request_stop_optional() {
        let req: TradeRequest = serde_json::from_str(r#"{"quantity": 3}"#).unwrap();
        assert_eq!(req.quantity, 3.0);
        assert!(req.stop_loss.is_none());
    }

    #[test]
    fn test_mode_request_snake_case() {
        let req: ModeRequest = serde_json::from_str(r#"{"mode": "momentum_only"}"#).unwrap();
        assert_eq!(req.mode, GameMode::MomentumOnly);
    }
}
