use super::AppState;
use crate::controller::{ArmedExpiry, GameController, Selection};
use crate::error::GameError;
use crate::types::*;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A user's game controller, shared with its expiry watchers
pub type SessionHandle = Arc<Mutex<GameController>>;

/// Wait for a round countdown and apply it to the controller.
///
/// The controller ignores the expiry if the round was already resolved or
/// a newer round was armed in the meantime.
fn spawn_expiry_watcher(handle: SessionHandle, armed: ArmedExpiry) {
    tokio::spawn(async move {
        if !armed.expiry.wait().await {
            return;
        }
        let mut controller = handle.lock().await;
        if controller.expire_round(armed.epoch) {
            tracing::debug!("Round countdown {} expired", armed.epoch);
        }
    });
}

fn watch_armed_round(handle: &SessionHandle, controller: &mut GameController) {
    if let Some(armed) = controller.take_armed_expiry() {
        spawn_expiry_watcher(handle.clone(), armed);
    }
}

fn no_game() -> GameError {
    GameError::InvalidTransition {
        operation: "play",
        phase: GamePhase::Idle,
    }
}

impl AppState {
    async fn session(&self, user_id: UserId) -> Option<SessionHandle> {
        self.games.read().await.get(&user_id).cloned()
    }

    /// Start a new game, replacing the user's current one
    pub async fn start_game(&self, user_id: UserId) -> Result<RoundView, GameError> {
        let handle = self.session(user_id).await.unwrap_or_else(|| {
            Arc::new(Mutex::new(GameController::new(
                self.config.clone(),
                self.content.clone(),
                self.scores.clone(),
            )))
        });

        let mut controller = handle.lock().await;
        let view = controller.start_game(user_id).await?;
        watch_armed_round(&handle, &mut controller);
        drop(controller);

        self.games.write().await.insert(user_id, handle);
        Ok(view)
    }

    pub async fn game_view(&self, user_id: UserId) -> Option<RoundView> {
        let handle = self.session(user_id).await?;
        let view = handle.lock().await.view();
        Some(view)
    }

    pub async fn select_caption(
        &self,
        user_id: UserId,
        caption_id: CaptionId,
    ) -> Result<RoundView, GameError> {
        let handle = self.session(user_id).await.ok_or_else(no_game)?;
        let mut controller = handle.lock().await;
        if controller.select_caption(caption_id).await? == Selection::Ignored {
            tracing::debug!("User {} selection of {} ignored", user_id, caption_id);
        }
        Ok(controller.view())
    }

    pub async fn advance_round(&self, user_id: UserId) -> Result<RoundView, GameError> {
        let handle = self.session(user_id).await.ok_or_else(no_game)?;
        let mut controller = handle.lock().await;
        let view = controller.advance_round().await?;
        watch_armed_round(&handle, &mut controller);
        Ok(view)
    }

    /// End the user's game and forget it
    pub async fn end_game(&self, user_id: UserId) -> Result<GameSummary, GameError> {
        let handle = self.session(user_id).await.ok_or_else(no_game)?;
        let summary = handle.lock().await.end_game().await?;

        let mut games = self.games.write().await;
        if games.get(&user_id).is_some_and(|h| Arc::ptr_eq(h, &handle)) {
            games.remove(&user_id);
        }
        Ok(summary)
    }
}
