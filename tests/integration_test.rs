use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use meme_match::api;
use meme_match::auth::{generate_salt, hash_passphrase};
use meme_match::state::AppState;
use meme_match::store::MemoryStore;
use meme_match::types::*;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const BEST: CaptionId = 1;
const WRONG: CaptionId = 5;

async fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    store
        .add_meme(
            Meme {
                id: 1,
                image_url: "/memes/meme1.jpg".to_string(),
            },
            (1..=7)
                .map(|id| Caption {
                    id,
                    text: format!("caption {}", id),
                    is_best_match: id == 1 || id == 2,
                })
                .collect(),
        )
        .await;

    let salt = generate_salt();
    store
        .add_user(User {
            id: 1,
            username: "user1".to_string(),
            name: "Player One".to_string(),
            hash: hash_passphrase("password", &salt),
            salt,
        })
        .await;
    store
}

/// End-to-end game: correct pick, wrong pick, timeout, game complete
#[tokio::test(start_paused = true)]
async fn test_full_game_flow() {
    let store = seeded_store().await;
    let state = AppState::with_store(GameConfig::default(), store.clone());

    // 1. Start: a meme with at least two captions
    let view = state.start_game(1).await.expect("game should start");
    assert_eq!(view.phase, GamePhase::RoundActive);
    assert_eq!(view.round, 1);
    assert!(view.meme.is_some());
    assert!(view.captions.len() >= 2);

    // 2. Correct pick
    let view = state.select_caption(1, BEST).await.unwrap();
    assert_eq!(view.outcome, RoundOutcome::Correct);
    assert_eq!(view.score, 5);

    // 3. Advance: selection cleared, timer reset
    let view = state.advance_round(1).await.unwrap();
    assert_eq!(view.round, 2);
    assert_eq!(view.selected_caption_id, None);
    assert_eq!(view.remaining_seconds, 30);

    // 4. Wrong pick resets the score
    let view = state.select_caption(1, WRONG).await.unwrap();
    assert_eq!(view.outcome, RoundOutcome::Incorrect);
    assert_eq!(view.score, 0);

    // 5. Third round runs out of time
    state.advance_round(1).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_secs(31)).await;
    let view = state.game_view(1).await.unwrap();
    assert_eq!(view.round, 3);
    assert_eq!(view.outcome, RoundOutcome::TimedOut);
    assert_eq!(view.score, 0);

    // 6. Past the round limit the game is complete
    let view = state.advance_round(1).await.unwrap();
    assert_eq!(view.phase, GamePhase::GameComplete);

    let history = store.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].score, 0);
    assert_eq!(history[0].caption_id, None);

    // Two selections were persisted, the timeout was not
    let scores = store.scores().await;
    assert_eq!(
        scores.iter().map(|s| s.score).collect::<Vec<_>>(),
        vec![5, 0]
    );

    let summary = state.end_game(1).await.unwrap();
    assert!(summary.completed);
    assert_eq!(summary.rounds.len(), 3);
    assert_eq!(summary.rounds[2].outcome, RoundOutcome::TimedOut);
    assert_eq!(store.history().await.len(), 1);
}

// HTTP surface

async fn app() -> (Router, MemoryStore) {
    let store = seeded_store().await;
    let state = Arc::new(AppState::with_store(GameConfig::default(), store.clone()));
    let router = api::router(state, &["http://localhost:3000".to_string()]);
    (router, store)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Option<String>, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.to_string());
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, cookie, body)
}

fn post_json(uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

async fn login(app: &Router) -> String {
    let (status, cookie, body) = send(
        app,
        post_json(
            "/api/auth/login",
            None,
            json!({ "username": "user1", "password": "password" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Logged in");
    cookie.expect("login should set a session cookie")
}

#[tokio::test]
async fn test_login_and_current_user() {
    let (app, _) = app().await;

    let (status, _, body) = send(&app, get("/api/auth/user", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let cookie = login(&app).await;
    assert!(cookie.starts_with("session="));

    let (status, _, body) = send(&app, get("/api/auth/user", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "user1");
    assert_eq!(body["name"], "Player One");
    assert!(body.get("hash").is_none());

    let (status, _, body) =
        send(&app, post_json("/api/auth/logout", Some(&cookie), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Logged out");

    let (status, _, _) = send(&app, get("/api/auth/user", Some(&cookie))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_bad_credentials() {
    let (app, _) = app().await;
    let (status, cookie, body) = send(
        &app,
        post_json(
            "/api/auth/login",
            None,
            json!({ "username": "user1", "password": "wrong" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(cookie.is_none());
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_play_requires_login() {
    let (app, _) = app().await;
    let (status, _, body) = send(&app, post_json("/api/play/start", None, json!({}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Not authenticated");
}

#[tokio::test]
async fn test_play_over_http() {
    let (app, store) = app().await;
    let cookie = login(&app).await;

    let (status, _, _) = send(&app, get("/api/play/state", Some(&cookie))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, body) =
        send(&app, post_json("/api/play/start", Some(&cookie), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    let view: RoundView = serde_json::from_value(body).unwrap();
    assert_eq!(view.phase, GamePhase::RoundActive);

    // Advancing an unresolved round is a conflict
    let (status, _, _) = send(&app, post_json("/api/play/advance", Some(&cookie), json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _, _) = send(
        &app,
        post_json("/api/play/select", Some(&cookie), json!({ "captionId": 999 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, body) = send(
        &app,
        post_json("/api/play/select", Some(&cookie), json!({ "captionId": BEST })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "correct");
    assert_eq!(body["score"], 5);
    assert_eq!(body["phase"], "ROUND_RESOLVED");

    let (status, _, body) = send(&app, post_json("/api/play/end", Some(&cookie), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["score"], 5);
    assert_eq!(body["completed"], false);
    assert_eq!(store.history().await.len(), 1);

    let (status, _, _) = send(&app, get("/api/play/state", Some(&cookie))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_game_start_and_next_meme() {
    let (app, _) = app().await;

    let (status, _, body) = send(&app, get("/api/game/start", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meme"]["image_url"], "/memes/meme1.jpg");
    assert_eq!(body["captions"].as_array().map(|c| c.len()), Some(7));
    assert!(body["captions"][0]["is_best_match"].is_boolean());

    let (status, _, _) = send(&app, get("/api/game/nextMeme", None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_game_start_without_content() {
    let state = Arc::new(AppState::with_store(GameConfig::default(), MemoryStore::new()));
    let app = api::router(state, &[]);

    let (status, _, body) = send(&app, get("/api/game/start", None)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "No meme found");
}

async fn app_with_captions(count: i64) -> Router {
    let store = MemoryStore::new();
    store
        .add_meme(
            Meme {
                id: 1,
                image_url: "/memes/meme1.jpg".to_string(),
            },
            (1..=count)
                .map(|id| Caption {
                    id,
                    text: format!("caption {}", id),
                    is_best_match: id == 1,
                })
                .collect(),
        )
        .await;
    let state = Arc::new(AppState::with_store(GameConfig::default(), store));
    api::router(state, &[])
}

#[tokio::test]
async fn test_caption_thresholds() {
    // One caption is enough to start, not enough for the next meme
    let app = app_with_captions(1).await;

    let (status, _, body) = send(&app, get("/api/game/start", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["captions"].as_array().map(|c| c.len()), Some(1));

    let (status, _, body) = send(&app, get("/api/game/nextMeme", None)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Not enough captions found for this meme");

    // No captions at all
    let app = app_with_captions(0).await;

    let (status, _, body) = send(&app, get("/api/game/start", None)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "No captions found for this meme");

    let (status, _, _) = send(&app, get("/api/game/nextMeme", None)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_submit_answer_and_totals() {
    let (app, store) = app().await;

    let (status, _, body) = send(
        &app,
        post_json(
            "/api/game/submitAnswer",
            None,
            json!({ "userId": 1, "memeId": 1, "captionId": 2 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["score"], 5);

    let (_, _, body) = send(
        &app,
        post_json(
            "/api/game/submitAnswer",
            None,
            json!({ "userId": 1, "memeId": 1, "captionId": WRONG }),
        ),
    )
    .await;
    assert_eq!(body["score"], 0);
    let stored = store.scores().await;
    assert_eq!(stored.len(), 2);
    // Same timestamp format as scores written by the game controller
    for record in &stored {
        assert_eq!(record.timestamp.len(), 24);
        assert!(record.timestamp.ends_with('Z'));
    }

    let (status, _, body) = send(&app, get("/api/profile/1/totalScore", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalScore"], 5);

    let (_, _, body) = send(&app, get("/api/profile/2/totalScore", None)).await;
    assert_eq!(body["totalScore"], 0);

    let (status, _, body) = send(&app, get("/api/profile/1/scores", None)).await;
    assert_eq!(status, StatusCode::OK);
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["image_url"], "/memes/meme1.jpg");
}

#[tokio::test]
async fn test_submit_answer_persistence_failure() {
    let (app, store) = app().await;
    store.set_fail_writes(true);

    let (status, _, body) = send(
        &app,
        post_json(
            "/api/game/submitAnswer",
            None,
            json!({ "userId": 1, "memeId": 1, "captionId": BEST }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_record_game_history() {
    let (app, store) = app().await;

    let (status, _, body) = send(
        &app,
        post_json(
            "/api/game/recordGameHistory",
            None,
            json!({ "userId": 1, "memeId": 1, "captionId": 2 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _, body) = send(
        &app,
        post_json(
            "/api/game/recordGameHistory",
            None,
            json!({
                "userId": 1,
                "memeId": 1,
                "captionId": 2,
                "score": 10,
                "timestamp": "2024-06-01T10:00:00Z"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Game history recorded successfully");
    assert_eq!(body["result"]["id"], 1);

    let history = store.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].score, 10);
    assert_eq!(history[0].timestamp, "2024-06-01T10:00:00Z");
}
