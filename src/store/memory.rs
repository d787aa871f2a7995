use async_trait::async_trait;
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{ContentStore, IdentityProvider, ScoreStore, StoreError, StoreResult};
use crate::types::*;

/// In-process implementation of every store trait
#[derive(Clone, Default)]
pub struct MemoryStore {
    memes: Arc<RwLock<Vec<Meme>>>,
    captions: Arc<RwLock<HashMap<MemeId, Vec<Caption>>>>,
    users: Arc<RwLock<Vec<User>>>,
    scores: Arc<RwLock<Vec<(i64, ScoreRecord)>>>,
    history: Arc<RwLock<Vec<HistoryRecord>>>,
    /// When set, every write fails with `Unavailable`
    fail_writes: Arc<AtomicBool>,
    /// When set, every content read fails with `Unavailable`
    fail_reads: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a meme together with its captions
    pub async fn add_meme(&self, meme: Meme, captions: Vec<Caption>) {
        self.captions.write().await.insert(meme.id, captions);
        self.memes.write().await.push(meme);
    }

    pub async fn add_user(&self, user: User) {
        self.users.write().await.push(user);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// All stored score records in insertion order
    pub async fn scores(&self) -> Vec<ScoreRecord> {
        self.scores
            .read()
            .await
            .iter()
            .map(|(_, r)| r.clone())
            .collect()
    }

    /// All stored history records in insertion order
    pub async fn history(&self) -> Vec<HistoryRecord> {
        self.history.read().await.clone()
    }

    fn check_writes(&self) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }

    fn check_reads(&self) -> StoreResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("reads disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn random_meme(&self) -> StoreResult<Option<Meme>> {
        self.check_reads()?;
        let memes = self.memes.read().await;
        if memes.is_empty() {
            return Ok(None);
        }
        let idx = rand::rng().random_range(0..memes.len());
        Ok(memes.get(idx).cloned())
    }

    async fn captions_for_meme(&self, meme_id: MemeId) -> StoreResult<Vec<Caption>> {
        self.check_reads()?;
        Ok(self
            .captions
            .read()
            .await
            .get(&meme_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl ScoreStore for MemoryStore {
    async fn append_score(&self, record: ScoreRecord) -> StoreResult<i64> {
        self.check_writes()?;
        let mut scores = self.scores.write().await;
        let id = scores.len() as i64 + 1;
        scores.push((id, record));
        Ok(id)
    }

    async fn append_history(&self, record: HistoryRecord) -> StoreResult<i64> {
        self.check_writes()?;
        let mut history = self.history.write().await;
        history.push(record);
        Ok(history.len() as i64)
    }

    async fn total_score(&self, user_id: UserId) -> StoreResult<i64> {
        Ok(self
            .scores
            .read()
            .await
            .iter()
            .filter(|(_, r)| r.user_id == user_id)
            .map(|(_, r)| r.score)
            .sum())
    }

    async fn scores_for_user(&self, user_id: UserId) -> StoreResult<Vec<ScoreEntry>> {
        let memes = self.memes.read().await;
        let scores = self.scores.read().await;

        // Inner join on memes, like the SQL backend
        let mut entries: Vec<ScoreEntry> = scores
            .iter()
            .filter(|(_, r)| r.user_id == user_id)
            .filter_map(|(id, r)| {
                let meme = memes.iter().find(|m| m.id == r.meme_id)?;
                Some(ScoreEntry {
                    id: *id,
                    user_id: r.user_id,
                    meme_id: r.meme_id,
                    caption_id: Some(r.caption_id),
                    score: r.score,
                    timestamp: r.timestamp.clone(),
                    image_url: meme.image_url.clone(),
                })
            })
            .collect();

        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(entries)
    }
}

#[async_trait]
impl IdentityProvider for MemoryStore {
    async fn user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn user_by_id(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }
}
