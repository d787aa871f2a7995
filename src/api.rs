//! HTTP endpoints.
//!
//! `/api/play/*` drives the server-side game controller and requires a
//! login. The `auth`, `game` and `profile` routes keep the request and
//! response shapes the browser client already speaks.

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_cookies::{Cookie, CookieManagerLayer, Cookies};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{self, SESSION_COOKIE};
use crate::error::{ApiError, GameError};
use crate::scoring::{resolve, round_points};
use crate::state::AppState;
use crate::types::*;

/// Build the application router
pub fn router(state: Arc<AppState>, allowed_origins: &[String]) -> Router {
    let play_routes = Router::new()
        .route("/play/start", post(play_start))
        .route("/play/state", get(play_state))
        .route("/play/select", post(play_select))
        .route("/play/advance", post(play_advance))
        .route("/play/end", post(play_end))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_user,
        ));

    let api = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/user", get(current_user))
        .route("/game/start", get(game_start))
        .route("/game/nextMeme", get(next_meme))
        .route("/game/submitAnswer", post(submit_answer))
        .route("/game/recordGameHistory", post(record_game_history))
        .route("/profile/{user_id}/scores", get(profile_scores))
        .route("/profile/{user_id}/totalScore", get(profile_total_score))
        .merge(play_routes);

    Router::new()
        .nest("/api", api)
        .layer(CookieManagerLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(allowed_origins))
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Skipping invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: &str) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
        })
    }
}

/// A meme with its candidate captions
#[derive(Debug, Serialize)]
pub struct MemeRound {
    pub meme: Meme,
    pub captions: Vec<Caption>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswerRequest {
    pub user_id: UserId,
    pub meme_id: MemeId,
    pub caption_id: CaptionId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordHistoryRequest {
    pub user_id: UserId,
    pub meme_id: MemeId,
    pub caption_id: Option<CaptionId>,
    pub score: Option<i64>,
    pub timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectRequest {
    pub caption_id: CaptionId,
}

// Auth

async fn login(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Json(req): Json<LoginRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user = auth::authenticate(state.identity.as_ref(), &req.username, &req.password)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid username or password".to_string()))?;

    let token = state.logins.create(user.id).await;
    cookies.add(auth::session_cookie(token));
    tracing::info!("User {} logged in", user.username);

    Ok(MessageResponse::new("Logged in"))
}

async fn logout(State(state): State<Arc<AppState>>, cookies: Cookies) -> Json<MessageResponse> {
    if let Some(cookie) = cookies.get(SESSION_COOKIE) {
        if let Some(user_id) = state.logins.remove(cookie.value()).await {
            tracing::info!("User {} logged out", user_id);
        }
    }
    cookies.remove(Cookie::build((SESSION_COOKIE, "")).path("/").build());
    MessageResponse::new("Logged out")
}

async fn current_user(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
) -> Result<Json<UserInfo>, ApiError> {
    auth::current_user(&state, &cookies)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::from(GameError::Unauthorized))
}

// Content and scores

async fn draw_meme(state: &AppState, min_captions: usize) -> Result<MemeRound, ApiError> {
    let meme = state
        .content
        .random_meme()
        .await?
        .ok_or_else(|| ApiError::Internal("No meme found".to_string()))?;

    let captions = state.content.captions_for_meme(meme.id).await?;
    if captions.len() < min_captions {
        return Err(ApiError::Internal(if captions.is_empty() {
            "No captions found for this meme".to_string()
        } else {
            "Not enough captions found for this meme".to_string()
        }));
    }

    Ok(MemeRound { meme, captions })
}

async fn game_start(State(state): State<Arc<AppState>>) -> Result<Json<MemeRound>, ApiError> {
    Ok(Json(draw_meme(&state, 1).await?))
}

async fn next_meme(State(state): State<Arc<AppState>>) -> Result<Json<MemeRound>, ApiError> {
    Ok(Json(draw_meme(&state, state.config.min_captions).await?))
}

async fn submit_answer(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubmitAnswerRequest>,
) -> Result<Json<Value>, ApiError> {
    let captions = state.content.captions_for_meme(req.meme_id).await?;
    if captions.is_empty() {
        return Err(ApiError::Internal(
            "No captions found for this meme".to_string(),
        ));
    }

    let outcome = resolve(&captions, req.caption_id);
    let score = round_points(outcome, state.config.correct_reward);
    state
        .scores
        .append_score(ScoreRecord {
            user_id: req.user_id,
            meme_id: req.meme_id,
            caption_id: req.caption_id,
            score,
            timestamp: now_iso(),
        })
        .await?;

    Ok(Json(json!({ "score": score })))
}

async fn record_game_history(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RecordHistoryRequest>,
) -> Result<Json<Value>, ApiError> {
    let score = req
        .score
        .ok_or_else(|| ApiError::BadRequest("score is required".to_string()))?;

    let id = state
        .scores
        .append_history(HistoryRecord {
            user_id: req.user_id,
            meme_id: req.meme_id,
            caption_id: req.caption_id,
            score,
            timestamp: req.timestamp.unwrap_or_else(now_iso),
        })
        .await?;
    tracing::info!("Recorded game history {} for user {}", id, req.user_id);

    Ok(Json(json!({
        "message": "Game history recorded successfully",
        "result": { "id": id },
    })))
}

async fn profile_scores(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<UserId>,
) -> Result<Json<Vec<ScoreEntry>>, ApiError> {
    Ok(Json(state.scores.scores_for_user(user_id).await?))
}

async fn profile_total_score(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<UserId>,
) -> Result<Json<Value>, ApiError> {
    let total = state.scores.total_score(user_id).await?;
    Ok(Json(json!({ "totalScore": total })))
}

// Server-side play

async fn play_start(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<UserInfo>,
) -> Result<Json<RoundView>, ApiError> {
    Ok(Json(state.start_game(user.id).await?))
}

async fn play_state(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<UserInfo>,
) -> Result<Json<RoundView>, ApiError> {
    state
        .game_view(user.id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No game in progress".to_string()))
}

async fn play_select(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<UserInfo>,
    Json(req): Json<SelectRequest>,
) -> Result<Json<RoundView>, ApiError> {
    Ok(Json(state.select_caption(user.id, req.caption_id).await?))
}

async fn play_advance(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<UserInfo>,
) -> Result<Json<RoundView>, ApiError> {
    Ok(Json(state.advance_round(user.id).await?))
}

async fn play_end(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<UserInfo>,
) -> Result<Json<GameSummary>, ApiError> {
    Ok(Json(state.end_game(user.id).await?))
}
