use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Opaque ID types
pub type UserId = i64;
pub type MemeId = i64;
pub type CaptionId = i64;

/// Current UTC time as stored on every record: RFC 3339 with millisecond
/// precision and a `Z` suffix, so stored timestamps sort lexically
pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Meme {
    pub id: MemeId,
    pub image_url: String,
}

/// A caption as delivered for one particular meme. `is_best_match` is
/// relative to that meme only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Caption {
    pub id: CaptionId,
    pub text: String,
    pub is_best_match: bool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub name: String,
    pub salt: String,
    pub hash: String,
}

/// What clients get to see of a user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserInfo {
    pub id: UserId,
    pub username: String,
    pub name: String,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            name: user.name.clone(),
        }
    }
}

/// One scored selection. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRecord {
    pub user_id: UserId,
    pub meme_id: MemeId,
    pub caption_id: CaptionId,
    pub score: i64,
    pub timestamp: String, // ISO8601
}

/// A stored score joined with its meme, as listed on the profile page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct ScoreEntry {
    pub id: i64,
    pub user_id: UserId,
    pub meme_id: MemeId,
    pub caption_id: Option<CaptionId>,
    pub score: i64,
    pub timestamp: String,
    pub image_url: String,
}

/// Final record of a finished game
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub user_id: UserId,
    pub meme_id: MemeId,
    pub caption_id: Option<CaptionId>,
    pub score: i64,
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GamePhase {
    Idle,
    RoundActive,
    RoundResolved,
    GameComplete,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoundOutcome {
    Pending,
    Correct,
    Incorrect,
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct GameConfig {
    pub round_limit: u32,
    pub round_seconds: u32,
    /// Length of one countdown unit
    pub tick: Duration,
    pub captions_per_round: usize,
    pub correct_reward: i64,
    pub min_captions: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            round_limit: 3,
            round_seconds: 30,
            tick: Duration::from_secs(1),
            captions_per_round: 7,
            correct_reward: 5,
            min_captions: 2,
        }
    }
}

/// Caption as shown to a player. The best-match flag stays hidden until the
/// round is resolved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CaptionView {
    pub id: CaptionId,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_best_match: Option<bool>,
}

/// Snapshot of a game session for rendering
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoundView {
    pub phase: GamePhase,
    pub round: u32,
    pub round_limit: u32,
    pub meme: Option<Meme>,
    pub captions: Vec<CaptionView>,
    pub selected_caption_id: Option<CaptionId>,
    pub outcome: RoundOutcome,
    pub remaining_seconds: u32,
    pub score: i64,
    pub message: Option<String>,
}

/// Result of a finished (or abandoned) game
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameSummary {
    pub user_id: UserId,
    pub rounds: Vec<CompletedRound>,
    pub score: i64,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompletedRound {
    pub round: u32,
    pub meme_id: MemeId,
    pub caption_id: Option<CaptionId>,
    pub outcome: RoundOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_iso_format() {
        let ts = now_iso();
        // e.g. 2024-06-01T10:00:00.123Z
        assert_eq!(ts.len(), 24);
        assert!(ts.ends_with('Z'));
        assert_eq!(&ts[19..20], ".");
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }
}
