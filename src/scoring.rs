//! Caption resolution and the scoring policy.

use crate::types::{Caption, CaptionId, RoundOutcome};

/// Resolve a chosen caption against the candidate set of the current meme.
///
/// Returns `Correct` iff the chosen id belongs to a caption flagged as a best
/// match for this meme. Ids that are not in the set resolve to `Incorrect`.
pub fn resolve(captions: &[Caption], chosen: CaptionId) -> RoundOutcome {
    let hit = captions
        .iter()
        .any(|c| c.id == chosen && c.is_best_match);
    if hit {
        RoundOutcome::Correct
    } else {
        RoundOutcome::Incorrect
    }
}

/// Points stored for a single round
pub fn round_points(outcome: RoundOutcome, reward: i64) -> i64 {
    match outcome {
        RoundOutcome::Correct => reward,
        _ => 0,
    }
}

/// New cumulative score after a round.
///
/// A correct pick adds the reward. An incorrect pick wipes the whole
/// cumulative score. Pending and timed-out rounds leave it alone.
pub fn apply_outcome(cumulative: i64, outcome: RoundOutcome, reward: i64) -> i64 {
    match outcome {
        RoundOutcome::Correct => cumulative + reward,
        RoundOutcome::Incorrect => 0,
        RoundOutcome::Pending | RoundOutcome::TimedOut => cumulative,
    }
}
