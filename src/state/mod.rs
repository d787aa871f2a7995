mod session;

pub use session::SessionHandle;

use crate::auth::LoginSessions;
use crate::store::{ContentStore, IdentityProvider, ScoreStore};
use crate::types::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: GameConfig,
    pub content: Arc<dyn ContentStore>,
    pub scores: Arc<dyn ScoreStore>,
    pub identity: Arc<dyn IdentityProvider>,
    /// Cookie tokens of logged-in users
    pub logins: LoginSessions,
    /// One game controller per user
    pub games: Arc<RwLock<HashMap<UserId, SessionHandle>>>,
}

impl AppState {
    pub fn new(
        config: GameConfig,
        content: Arc<dyn ContentStore>,
        scores: Arc<dyn ScoreStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            config,
            content,
            scores,
            identity,
            logins: LoginSessions::new(),
            games: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// State backed by a single store implementing every store trait
    pub fn with_store<S>(config: GameConfig, store: S) -> Self
    where
        S: ContentStore + ScoreStore + IdentityProvider + Clone + 'static,
    {
        Self::new(
            config,
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GameError;
    use crate::store::MemoryStore;
    use std::time::Duration;

    async fn seeded_state(config: GameConfig) -> AppState {
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
                        is_best_match: id <= 2,
                    })
                    .collect(),
            )
            .await;
        AppState::with_store(config, store)
    }

    #[tokio::test]
    async fn test_no_game_before_start() {
        let state = seeded_state(GameConfig::default()).await;
        assert!(state.game_view(1).await.is_none());

        let result = state.advance_round(1).await;
        assert!(matches!(
            result,
            Err(GameError::InvalidTransition {
                phase: GamePhase::Idle,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_games_are_per_user() {
        let state = seeded_state(GameConfig::default()).await;
        state.start_game(1).await.unwrap();
        state.start_game(2).await.unwrap();

        state.select_caption(1, 1).await.unwrap();

        let first = state.game_view(1).await.unwrap();
        let second = state.game_view(2).await.unwrap();
        assert_eq!(first.phase, GamePhase::RoundResolved);
        assert_eq!(first.score, 5);
        assert_eq!(second.phase, GamePhase::RoundActive);
        assert_eq!(second.score, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watcher_expires_round() {
        let state = seeded_state(GameConfig::default()).await;
        state.start_game(1).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30_500)).await;

        let view = state.game_view(1).await.unwrap();
        assert_eq!(view.phase, GamePhase::RoundResolved);
        assert_eq!(view.outcome, RoundOutcome::TimedOut);
        assert_eq!(view.score, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_selection_beats_expiry() {
        let state = seeded_state(GameConfig::default()).await;
        state.start_game(1).await.unwrap();

        tokio::time::sleep(Duration::from_millis(29_500)).await;
        state.select_caption(1, 2).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        let view = state.game_view(1).await.unwrap();
        assert_eq!(view.outcome, RoundOutcome::Correct);
        assert_eq!(view.score, 5);
    }

    #[tokio::test]
    async fn test_end_game_drops_session() {
        let state = seeded_state(GameConfig {
            round_limit: 1,
            ..GameConfig::default()
        })
        .await;
        state.start_game(1).await.unwrap();
        state.select_caption(1, 1).await.unwrap();
        let view = state.advance_round(1).await.unwrap();
        assert_eq!(view.phase, GamePhase::GameComplete);

        let summary = state.end_game(1).await.unwrap();
        assert!(summary.completed);
        assert_eq!(summary.score, 5);
        assert!(state.game_view(1).await.is_none());
    }
}
