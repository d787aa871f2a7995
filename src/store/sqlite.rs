use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use super::{ContentStore, IdentityProvider, ScoreStore, StoreResult};
use crate::auth::{generate_salt, hash_passphrase};
use crate::types::*;

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        salt TEXT NOT NULL,
        hash TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS memes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        image_url TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS captions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        text TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS meme_captions (
        meme_id INTEGER NOT NULL REFERENCES memes(id),
        caption_id INTEGER NOT NULL REFERENCES captions(id),
        is_best_match INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (meme_id, caption_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS scores (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        meme_id INTEGER NOT NULL,
        caption_id INTEGER,
        score INTEGER NOT NULL,
        timestamp TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS game_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        meme_id INTEGER NOT NULL,
        caption_id INTEGER,
        score INTEGER NOT NULL,
        timestamp TEXT NOT NULL
    )"#,
];

/// Demo content: (image, [(caption, best match)])
const DEMO_MEMES: &[(&str, &[(&str, bool)])] = &[
    (
        "/memes/meme1.jpg",
        &[
            ("When the code works on the first try", true),
            ("Me pretending to understand the meeting", false),
            ("Monday morning energy", false),
            ("When you find the bug was a missing semicolon", true),
            ("Weekend plans vs. reality", false),
            ("That feeling when the build is green", false),
            ("Waiting for the coffee to kick in", false),
        ],
    ),
    (
        "/memes/meme2.jpg",
        &[
            ("Nobody: / My cat at 3am:", true),
            ("When the Wi-Fi drops during a call", false),
            ("Me explaining my tabs to the browser", false),
            ("When someone says 'quick question'", true),
            ("Deadline in one hour", false),
            ("That one group project member", false),
            ("Trying to look busy when the boss walks by", false),
        ],
    ),
    (
        "/memes/meme3.jpg",
        &[
            ("Me after one gym session", false),
            ("When the pizza arrives early", true),
            ("Reading the terms and conditions", false),
            ("When you hear your name in a meeting", false),
            ("Leaving the house after a week indoors", true),
            ("Opening the fridge for the tenth time", false),
            ("When autocorrect ruins the message", false),
        ],
    ),
];

/// Demo accounts: (username, display name, passphrase)
const DEMO_USERS: &[(&str, &str, &str)] = &[
    ("user1", "Player One", "password"),
    ("user2", "Player Two", "password"),
];

/// SQLite-backed implementation of every store trait
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect and make sure the schema exists
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn meme_count(&self) -> StoreResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM memes")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Register a user, hashing the passphrase with a fresh salt
    pub async fn insert_user(
        &self,
        username: &str,
        name: &str,
        passphrase: &str,
    ) -> StoreResult<UserId> {
        let salt = generate_salt();
        let hash = hash_passphrase(passphrase, &salt);
        let result =
            sqlx::query("INSERT INTO users (username, name, salt, hash) VALUES (?, ?, ?, ?)")
                .bind(username)
                .bind(name)
                .bind(&salt)
                .bind(&hash)
                .execute(&self.pool)
                .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn insert_meme(&self, image_url: &str) -> StoreResult<MemeId> {
        let result = sqlx::query("INSERT INTO memes (image_url) VALUES (?)")
            .bind(image_url)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn insert_caption(&self, text: &str) -> StoreResult<CaptionId> {
        let result = sqlx::query("INSERT INTO captions (text) VALUES (?)")
            .bind(text)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Attach a caption to a meme; `best` marks it a best match for that meme
    pub async fn link_caption(
        &self,
        meme_id: MemeId,
        caption_id: CaptionId,
        best: bool,
    ) -> StoreResult<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO meme_captions (meme_id, caption_id, is_best_match) \
             VALUES (?, ?, ?)",
        )
        .bind(meme_id)
        .bind(caption_id)
        .bind(best)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Fill an empty database with demo users, memes and captions.
    /// Returns false if there was content already.
    pub async fn seed_demo(&self) -> StoreResult<bool> {
        if self.meme_count().await? > 0 {
            return Ok(false);
        }

        for (username, name, passphrase) in DEMO_USERS {
            if self.user_by_username(username).await?.is_none() {
                self.insert_user(username, name, passphrase).await?;
            }
        }

        for (image_url, captions) in DEMO_MEMES {
            let meme_id = self.insert_meme(image_url).await?;
            for (text, best) in captions.iter() {
                let caption_id = self.insert_caption(text).await?;
                self.link_caption(meme_id, caption_id, *best).await?;
            }
        }

        tracing::info!(
            "Seeded {} demo memes and {} demo users",
            DEMO_MEMES.len(),
            DEMO_USERS.len()
        );
        Ok(true)
    }
}

#[async_trait]
impl ContentStore for SqliteStore {
    async fn random_meme(&self) -> StoreResult<Option<Meme>> {
        let meme = sqlx::query_as::<_, Meme>(
            "SELECT id, image_url FROM memes ORDER BY RANDOM() LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(meme)
    }

    async fn captions_for_meme(&self, meme_id: MemeId) -> StoreResult<Vec<Caption>> {
        let captions = sqlx::query_as::<_, Caption>(
            "SELECT captions.id, captions.text, meme_captions.is_best_match \
             FROM captions JOIN meme_captions ON captions.id = meme_captions.caption_id \
             WHERE meme_captions.meme_id = ?",
        )
        .bind(meme_id)
        .fetch_all(&self.pool)
        .await?;

        if captions.is_empty() {
            tracing::warn!("No captions found for meme {}", meme_id);
        }
        Ok(captions)
    }
}

#[async_trait]
impl ScoreStore for SqliteStore {
    async fn append_score(&self, record: ScoreRecord) -> StoreResult<i64> {
        let result = sqlx::query(
            "INSERT INTO scores (user_id, meme_id, caption_id, score, timestamp) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(record.user_id)
        .bind(record.meme_id)
        .bind(record.caption_id)
        .bind(record.score)
        .bind(&record.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn append_history(&self, record: HistoryRecord) -> StoreResult<i64> {
        let result = sqlx::query(
            "INSERT INTO game_history (user_id, meme_id, caption_id, score, timestamp) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(record.user_id)
        .bind(record.meme_id)
        .bind(record.caption_id)
        .bind(record.score)
        .bind(&record.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn total_score(&self, user_id: UserId) -> StoreResult<i64> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(score), 0) FROM scores WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    async fn scores_for_user(&self, user_id: UserId) -> StoreResult<Vec<ScoreEntry>> {
        let entries = sqlx::query_as::<_, ScoreEntry>(
            "SELECT scores.id, scores.user_id, scores.meme_id, scores.caption_id, scores.score, \
             scores.timestamp, memes.image_url \
             FROM scores JOIN memes ON scores.meme_id = memes.id \
             WHERE scores.user_id = ? \
             ORDER BY scores.timestamp DESC, scores.id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }
}

#[async_trait]
impl IdentityProvider for SqliteStore {
    async fn user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, name, salt, hash FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn user_by_id(&self, id: UserId) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, name, salt, hash FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }
}
