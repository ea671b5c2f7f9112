//! Rating collaborator interface.
//!
//! Fitness comes from a human. The engine hands a [`Rater`] one asset pair
//! at a time and blocks until it answers with a score, a skip, or a request
//! to stop.

use std::io;
use std::path::PathBuf;

use crate::schema::{GenomeKey, LeaderboardEntry};

/// Lowest score a rater may give.
pub const MIN_SCORE: f32 = 0.0;
/// Highest score a rater may give.
pub const MAX_SCORE: f32 = 10.0;

/// Answer to a rating request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RatingOutcome {
    /// A score in `[MIN_SCORE, MAX_SCORE]`.
    Scored(f32),
    /// The rater declined to score this pair.
    Skipped,
    /// Stop the run. With `show_results` the interim results view is shown
    /// first and decides whether the run really ends.
    Terminate { show_results: bool },
}

/// One asset pair to rate.
#[derive(Debug, Clone)]
pub struct RatingRequest<'a> {
    pub key: GenomeKey,
    pub image_path: PathBuf,
    pub audio_path: PathBuf,
    /// Current leaderboard, for display alongside the pair.
    pub leaderboard: &'a [LeaderboardEntry],
}

/// Rating errors.
#[derive(Debug, thiserror::Error)]
pub enum RatingError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Score {0} is outside [0, 10]")]
    ScoreOutOfRange(f32),
}

/// A blocking source of human ratings.
pub trait Rater {
    /// Rate one pair.
    fn rate(&mut self, request: &RatingRequest<'_>) -> Result<RatingOutcome, RatingError>;

    /// Show the interim results view. Returns `true` to end the run.
    fn show_results(
        &mut self,
        leaderboard: &[LeaderboardEntry],
        fitness_history: &[f32],
    ) -> Result<bool, RatingError>;
}

impl<R: Rater + ?Sized> Rater for &mut R {
    fn rate(&mut self, request: &RatingRequest<'_>) -> Result<RatingOutcome, RatingError> {
        (**self).rate(request)
    }

    fn show_results(
        &mut self,
        leaderboard: &[LeaderboardEntry],
        fitness_history: &[f32],
    ) -> Result<bool, RatingError> {
        (**self).show_results(leaderboard, fitness_history)
    }
}

/// Check that a score is finite and within range.
pub fn validate_score(score: f32) -> Result<f32, RatingError> {
    if score.is_finite() && (MIN_SCORE..=MAX_SCORE).contains(&score) {
        Ok(score)
    } else {
        Err(RatingError::ScoreOutOfRange(score))
    }
}

/// Rater that replays a script, for tests.
#[cfg(test)]
pub(crate) struct ScriptedRater {
    /// Outcomes handed out in order; once empty every pair scores by `fallback`.
    pub script: std::collections::VecDeque<RatingOutcome>,
    pub fallback: fn(GenomeKey) -> f32,
    /// Answer of the results view.
    pub end_on_results: bool,
    /// Every pair the rater was asked about.
    pub requests: Vec<GenomeKey>,
    /// Fitness histories seen by the results view.
    pub results_shown: Vec<Vec<f32>>,
}

#[cfg(test)]
impl ScriptedRater {
    pub fn new(script: Vec<RatingOutcome>, fallback: fn(GenomeKey) -> f32) -> Self {
        Self {
            script: script.into(),
            fallback,
            end_on_results: true,
            requests: Vec::new(),
            results_shown: Vec::new(),
        }
    }
}

#[cfg(test)]
impl Rater for ScriptedRater {
    fn rate(&mut self, request: &RatingRequest<'_>) -> Result<RatingOutcome, RatingError> {
        self.requests.push(request.key);
        Ok(self
            .script
            .pop_front()
            .unwrap_or_else(|| RatingOutcome::Scored((self.fallback)(request.key))))
    }

    fn show_results(
        &mut self,
        _leaderboard: &[LeaderboardEntry],
        fitness_history: &[f32],
    ) -> Result<bool, RatingError> {
        self.results_shown.push(fitness_history.to_vec());
        Ok(self.end_on_results)
    }
}
