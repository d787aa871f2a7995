//! Game round controller.
//!
//! One controller drives one user's game through
//! `Idle -> RoundActive -> RoundResolved -> (RoundActive | GameComplete)`.
//! Store failures leave the state untouched so the caller can retry. The
//! countdown runs on a [`RoundTimer`]; its expiry is handed out as an
//! [`ArmedExpiry`] and fed back through [`GameController::expire_round`].

use rand::seq::SliceRandom;
use std::sync::Arc;

use crate::error::GameError;
use crate::scoring::{apply_outcome, resolve, round_points};
use crate::store::{ContentStore, ScoreStore};
use crate::timer::{Expiry, RoundTimer};
use crate::types::*;

const MSG_CORRECT: &str = "Congratulations! You selected one of the most appropriate captions.";
const MSG_INCORRECT: &str = "Sorry, you did not select one of the most appropriate captions.";
const MSG_TIMED_OUT: &str = "Time's up! You did not select a caption.";

/// Expiry of the countdown of one specific round
#[derive(Debug)]
pub struct ArmedExpiry {
    pub epoch: u64,
    pub expiry: Expiry,
}

/// Result of a caption selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Accepted(RoundOutcome),
    /// The round was already resolved; nothing changed
    Ignored,
}

struct Round {
    meme: Meme,
    captions: Vec<Caption>,
    selection: Option<CaptionId>,
    outcome: RoundOutcome,
    message: Option<String>,
}

impl Round {
    fn new(meme: Meme, captions: Vec<Caption>) -> Self {
        Self {
            meme,
            captions,
            selection: None,
            outcome: RoundOutcome::Pending,
            message: None,
        }
    }

    fn summary(&self, number: u32) -> CompletedRound {
        CompletedRound {
            round: number,
            meme_id: self.meme.id,
            caption_id: self.selection,
            outcome: self.outcome,
        }
    }
}

struct GameSession {
    user_id: UserId,
    round_no: u32,
    score: i64,
    current: Round,
    completed: Vec<CompletedRound>,
    history_recorded: bool,
}

pub struct GameController {
    config: GameConfig,
    content: Arc<dyn ContentStore>,
    scores: Arc<dyn ScoreStore>,
    phase: GamePhase,
    session: Option<GameSession>,
    timer: RoundTimer,
    /// Bumped every time a round countdown is armed
    epoch: u64,
    armed: Option<ArmedExpiry>,
}

/// Shuffle-then-truncate helper for the candidate set.
///
/// If none of the first `limit` captions is a best match but a later one
/// is, that caption is swapped into the last kept slot.
pub fn pick_candidates(mut captions: Vec<Caption>, limit: usize) -> Vec<Caption> {
    if captions.len() <= limit {
        return captions;
    }
    if limit == 0 {
        return Vec::new();
    }
    if !captions[..limit].iter().any(|c| c.is_best_match) {
        if let Some(pos) = captions[limit..].iter().position(|c| c.is_best_match) {
            captions.swap(limit - 1, limit + pos);
        }
    }
    captions.truncate(limit);
    captions
}

impl GameController {
    pub fn new(
        config: GameConfig,
        content: Arc<dyn ContentStore>,
        scores: Arc<dyn ScoreStore>,
    ) -> Self {
        let timer = RoundTimer::new(config.tick);
        Self {
            config,
            content,
            scores,
            phase: GamePhase::Idle,
            session: None,
            timer,
            epoch: 0,
            armed: None,
        }
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.session.as_ref().map(|s| s.user_id)
    }

    pub fn score(&self) -> i64 {
        self.session.as_ref().map_or(0, |s| s.score)
    }

    pub fn round_no(&self) -> u32 {
        self.session.as_ref().map_or(0, |s| s.round_no)
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.timer.remaining()
    }

    /// Hand out the expiry of the most recently armed round, once
    pub fn take_armed_expiry(&mut self) -> Option<ArmedExpiry> {
        self.armed.take()
    }

    /// Start a fresh game for a user, replacing whatever was going on
    pub async fn start_game(&mut self, user_id: UserId) -> Result<RoundView, GameError> {
        let round = self.draw_round().await?;

        self.session = Some(GameSession {
            user_id,
            round_no: 1,
            score: 0,
            current: round,
            completed: Vec::new(),
            history_recorded: false,
        });
        self.phase = GamePhase::RoundActive;
        self.arm_timer();

        tracing::info!("User {} started a game", user_id);
        Ok(self.view())
    }

    /// Pick a caption for the active round.
    ///
    /// Only the first selection counts. Anything arriving after the round
    /// was resolved (by a selection or by the timer) is ignored.
    pub async fn select_caption(&mut self, caption_id: CaptionId) -> Result<Selection, GameError> {
        if self.phase != GamePhase::RoundActive {
            tracing::debug!("Ignoring selection of caption {} while {:?}", caption_id, self.phase);
            return Ok(Selection::Ignored);
        }
        // The countdown already hit zero; its expiry just hasn't been applied yet
        if self.timer.remaining() == 0 && !self.timer.is_running() {
            tracing::debug!(
                "Selection of caption {} arrived after the countdown ended",
                caption_id
            );
            self.time_out();
            return Ok(Selection::Ignored);
        }
        let reward = self.config.correct_reward;
        let Some(session) = self.session.as_ref() else {
            return Ok(Selection::Ignored);
        };
        if session.current.selection.is_some() {
            return Ok(Selection::Ignored);
        }
        if !session.current.captions.iter().any(|c| c.id == caption_id) {
            return Err(GameError::UnknownCaption(caption_id));
        }

        let outcome = resolve(&session.current.captions, caption_id);
        let record = ScoreRecord {
            user_id: session.user_id,
            meme_id: session.current.meme.id,
            caption_id,
            score: round_points(outcome, reward),
            timestamp: now_iso(),
        };

        // Persist before touching any state so a failure can be retried
        self.scores.append_score(record).await?;

        self.timer.cancel();
        self.armed = None;
        if let Some(session) = self.session.as_mut() {
            session.current.selection = Some(caption_id);
            session.current.outcome = outcome;
            session.current.message = Some(
                match outcome {
                    RoundOutcome::Correct => MSG_CORRECT,
                    _ => MSG_INCORRECT,
                }
                .to_string(),
            );
            session.score = apply_outcome(session.score, outcome, reward);
            tracing::debug!(
                "User {} round {}: {:?}, score now {}",
                session.user_id,
                session.round_no,
                outcome,
                session.score
            );
        }
        self.phase = GamePhase::RoundResolved;

        Ok(Selection::Accepted(outcome))
    }

    /// Apply a countdown expiry. Returns false when it no longer applies
    /// (stale epoch, or the round was resolved by a selection first).
    pub fn expire_round(&mut self, epoch: u64) -> bool {
        if self.phase != GamePhase::RoundActive || epoch != self.epoch {
            return false;
        }
        self.time_out()
    }

    /// Resolve the active round as timed out
    fn time_out(&mut self) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };

        session.current.outcome = RoundOutcome::TimedOut;
        session.current.message = Some(MSG_TIMED_OUT.to_string());
        self.timer.cancel();
        self.armed = None;
        self.phase = GamePhase::RoundResolved;

        tracing::debug!("User {} round {} timed out", session.user_id, session.round_no);
        true
    }

    /// Move on from a resolved round: draw the next one, or finish the game
    /// once the round limit is reached.
    pub async fn advance_round(&mut self) -> Result<RoundView, GameError> {
        if self.phase != GamePhase::RoundResolved {
            return Err(GameError::InvalidTransition {
                operation: "advance the round",
                phase: self.phase,
            });
        }
        let round_no = self.round_no();

        if round_no < self.config.round_limit {
            let next = self.draw_round().await?;
            if let Some(session) = self.session.as_mut() {
                let done = session.current.summary(session.round_no);
                session.completed.push(done);
                session.round_no += 1;
                session.current = next;
            }
            self.phase = GamePhase::RoundActive;
            self.arm_timer();
        } else {
            if let Some(session) = self.session.as_mut() {
                let done = session.current.summary(session.round_no);
                session.completed.push(done);
            }
            self.phase = GamePhase::GameComplete;
            self.record_history().await;
        }

        Ok(self.view())
    }

    /// Finish the game, record its history and go back to `Idle`.
    ///
    /// A failing history write is logged and otherwise ignored.
    pub async fn end_game(&mut self) -> Result<GameSummary, GameError> {
        match self.phase {
            GamePhase::RoundResolved => {
                if let Some(session) = self.session.as_mut() {
                    let done = session.current.summary(session.round_no);
                    session.completed.push(done);
                }
            }
            GamePhase::GameComplete => {}
            phase => {
                return Err(GameError::InvalidTransition {
                    operation: "end the game",
                    phase,
                });
            }
        }

        self.record_history().await;

        let completed = self.phase == GamePhase::GameComplete;
        self.timer.cancel();
        self.armed = None;
        self.phase = GamePhase::Idle;

        let session = self.session.take().ok_or(GameError::InvalidTransition {
            operation: "end the game",
            phase: GamePhase::Idle,
        })?;
        tracing::info!(
            "User {} ended a game with score {}",
            session.user_id,
            session.score
        );

        Ok(GameSummary {
            user_id: session.user_id,
            rounds: session.completed,
            score: session.score,
            completed,
        })
    }

    /// Snapshot for rendering
    pub fn view(&self) -> RoundView {
        let Some(session) = self.session.as_ref() else {
            return RoundView {
                phase: self.phase,
                round: 0,
                round_limit: self.config.round_limit,
                meme: None,
                captions: Vec::new(),
                selected_caption_id: None,
                outcome: RoundOutcome::Pending,
                remaining_seconds: 0,
                score: 0,
                message: None,
            };
        };

        let reveal = self.phase != GamePhase::RoundActive;
        let captions = session
            .current
            .captions
            .iter()
            .map(|c| CaptionView {
                id: c.id,
                text: c.text.clone(),
                is_best_match: reveal.then_some(c.is_best_match),
            })
            .collect();

        RoundView {
            phase: self.phase,
            round: session.round_no,
            round_limit: self.config.round_limit,
            meme: Some(session.current.meme.clone()),
            captions,
            selected_caption_id: session.current.selection,
            outcome: session.current.outcome,
            remaining_seconds: self.timer.remaining(),
            score: session.score,
            message: session.current.message.clone(),
        }
    }

    /// Fetch a meme and a usable candidate set for a new round
    async fn draw_round(&self) -> Result<Round, GameError> {
        let meme = self
            .content
            .random_meme()
            .await?
            .ok_or_else(|| GameError::ContentUnavailable("No meme found".to_string()))?;

        let mut captions = self.content.captions_for_meme(meme.id).await?;
        if captions.len() < self.config.min_captions {
            return Err(GameError::ContentUnavailable(format!(
                "Not enough captions found for meme {}",
                meme.id
            )));
        }

        captions.shuffle(&mut rand::rng());
        let captions = pick_candidates(captions, self.config.captions_per_round);
        Ok(Round::new(meme, captions))
    }

    fn arm_timer(&mut self) {
        self.epoch += 1;
        let expiry = self.timer.start(self.config.round_seconds);
        self.armed = Some(ArmedExpiry {
            epoch: self.epoch,
            expiry,
        });
    }

    /// Write the game history once per game. Failures are logged only.
    async fn record_history(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.history_recorded {
            return;
        }
        session.history_recorded = true;

        let record = HistoryRecord {
            user_id: session.user_id,
            meme_id: session.current.meme.id,
            caption_id: session.current.selection,
            score: session.score,
            timestamp: now_iso(),
        };
        match self.scores.append_history(record).await {
            Ok(id) => tracing::info!("Recorded game history {} for user {}", id, session.user_id),
            Err(e) => tracing::warn!(
                "Failed to record game history for user {}: {}",
                session.user_id,
                e
            ),
        }
    }
}
