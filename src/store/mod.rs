//! Storage collaborators of the game.
//!
//! The controller and the HTTP layer only see these traits. `memory` keeps
//! everything in process (tests, demos); `sqlite` is the persistent backend.

mod memory;
mod sqlite;

use async_trait::async_trait;

use crate::types::*;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while talking to a store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Memes and the captions attached to them
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// One meme picked uniformly at random, `None` if there are none
    async fn random_meme(&self) -> StoreResult<Option<Meme>>;

    /// All captions linked to a meme, with the best-match flag for that meme
    async fn captions_for_meme(&self, meme_id: MemeId) -> StoreResult<Vec<Caption>>;
}

/// Append-only score and history records
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Store one scored selection, returning its row id
    async fn append_score(&self, record: ScoreRecord) -> StoreResult<i64>;

    /// Store a finished-game record, returning its row id
    async fn append_history(&self, record: HistoryRecord) -> StoreResult<i64>;

    /// Sum of all stored round points of a user (0 with no rows)
    async fn total_score(&self, user_id: UserId) -> StoreResult<i64>;

    /// Stored scores of a user joined with their memes, newest first
    async fn scores_for_user(&self, user_id: UserId) -> StoreResult<Vec<ScoreEntry>>;
}

/// Lookup of registered users. Passphrase checking lives in `auth`.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn user_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    async fn user_by_id(&self, id: UserId) -> StoreResult<Option<User>>;
}
