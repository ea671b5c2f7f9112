//! Fitness memoization keyed by discrete genome identity.

use std::collections::HashMap;

use crate::compute::{CorpusError, EmbeddingCorpus, Modality};
use crate::schema::{GenomeKey, LeaderboardEntry};

use super::rating::{RatingError, RatingOutcome, validate_score};

/// What the cache remembers about a pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CachedRating {
    Scored(f32),
    Skipped,
}

/// Result of evaluating one genome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Evaluation {
    /// A real score, either fresh or from the cache.
    Scored { score: f32, cached: bool },
    /// The pair was skipped, now or earlier. Counts as 0.0 fitness.
    Skipped { cached: bool },
    /// The rater asked to stop; nothing was cached.
    Terminate { show_results: bool },
}

impl Evaluation {
    /// Fitness contributed to the generation, `None` on termination.
    pub fn fitness(&self) -> Option<f32> {
        match self {
            Evaluation::Scored { score, .. } => Some(*score),
            Evaluation::Skipped { .. } => Some(0.0),
            Evaluation::Terminate { .. } => None,
        }
    }

    /// Whether the answer came from the cache.
    pub fn is_cached(&self) -> bool {
        matches!(
            self,
            Evaluation::Scored { cached: true, .. } | Evaluation::Skipped { cached: true }
        )
    }
}

/// Grow-only map from asset pair to rating.
#[derive(Debug, Default)]
pub struct EvaluationCache {
    entries: HashMap<GenomeKey, CachedRating>,
    hits: u64,
    requests: u64,
}

impl EvaluationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate a pair, asking `rate` only if the pair was never rated.
    ///
    /// `rate` receives the cache so it can build the current leaderboard.
    /// Scores outside `[0, 10]` are rejected and not cached.
    pub fn evaluate<F, E>(&mut self, key: GenomeKey, rate: F) -> Result<Evaluation, E>
    where
        F: FnOnce(&Self) -> Result<RatingOutcome, E>,
        E: From<RatingError>,
    {
        if let Some(cached) = self.entries.get(&key) {
            self.hits += 1;
            log::debug!("Cache hit for {:?}: {:?}", key, cached);
            return Ok(match *cached {
                CachedRating::Scored(score) => Evaluation::Scored {
                    score,
                    cached: true,
                },
                CachedRating::Skipped => Evaluation::Skipped { cached: true },
            });
        }

        self.requests += 1;
        let evaluation = match rate(&*self)? {
            RatingOutcome::Scored(score) => {
                let score = validate_score(score)?;
                self.entries.insert(key, CachedRating::Scored(score));
                Evaluation::Scored {
                    score,
                    cached: false,
                }
            }
            RatingOutcome::Skipped => {
                self.entries.insert(key, CachedRating::Skipped);
                Evaluation::Skipped { cached: false }
            }
            RatingOutcome::Terminate { show_results } => Evaluation::Terminate { show_results },
        };
        Ok(evaluation)
    }

    /// Cached rating of a pair.
    pub fn get(&self, key: &GenomeKey) -> Option<CachedRating> {
        self.entries.get(key).copied()
    }

    /// Highest real scores, resolved to asset identifiers.
    ///
    /// Skipped pairs are excluded. Equal scores are ordered by key.
    pub fn top_k(
        &self,
        n: usize,
        corpus: &EmbeddingCorpus,
    ) -> Result<Vec<LeaderboardEntry>, CorpusError> {
        let mut scored: Vec<(GenomeKey, f32)> = self
            .entries
            .iter()
            .filter_map(|(key, rating)| match rating {
                CachedRating::Scored(score) => Some((*key, *score)),
                CachedRating::Skipped => None,
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        scored
            .into_iter()
            .take(n)
            .map(|(key, score)| {
                Ok(LeaderboardEntry {
                    key,
                    image: corpus.identifier(Modality::Image, key.image_index)?.to_string(),
                    audio: corpus.identifier(Modality::Audio, key.audio_index)?.to_string(),
                    score,
                })
            })
            .collect()
    }

    /// Number of distinct pairs cached (including skips).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evaluations answered without asking the rater.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Times the rater was asked.
    pub fn requests(&self) -> u64 {
        self.requests
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::test_corpus;

    fn rate_with(
        outcome: RatingOutcome,
    ) -> impl FnOnce(&EvaluationCache) -> Result<RatingOutcome, RatingError> {
        move |_| Ok(outcome)
    }

    #[test]
    fn test_score_is_cached() {
        let mut cache = EvaluationCache::new();
        let key = GenomeKey::new(1, 2);

        let first = cache
            .evaluate(key, rate_with(RatingOutcome::Scored(7.0)))
            .unwrap();
        assert_eq!(
            first,
            Evaluation::Scored {
                score: 7.0,
                cached: false
            }
        );

        let mut called = false;
        let second = cache
            .evaluate(key, |_| -> Result<RatingOutcome, RatingError> {
                called = true;
                Ok(RatingOutcome::Scored(1.0))
            })
            .unwrap();
        assert!(!called);
        assert_eq!(
            second,
            Evaluation::Scored {
                score: 7.0,
                cached: true
            }
        );
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.requests(), 1);
    }

    #[test]
    fn test_skip_is_remembered() {
        let mut cache = EvaluationCache::new();
        let key = GenomeKey::new(0, 0);

        let first = cache.evaluate(key, rate_with(RatingOutcome::Skipped)).unwrap();
        assert_eq!(first, Evaluation::Skipped { cached: false });
        assert_eq!(first.fitness(), Some(0.0));
        assert!(!first.is_cached());

        let second = cache
            .evaluate(key, rate_with(RatingOutcome::Scored(9.0)))
            .unwrap();
        assert_eq!(second, Evaluation::Skipped { cached: true });
        assert!(second.is_cached());
        assert_eq!(cache.get(&key), Some(CachedRating::Skipped));
    }

    #[test]
    fn test_terminate_caches_nothing() {
        let mut cache = EvaluationCache::new();
        let key = GenomeKey::new(3, 3);

        let outcome = cache
            .evaluate(key, rate_with(RatingOutcome::Terminate { show_results: true }))
            .unwrap();
        assert_eq!(outcome, Evaluation::Terminate { show_results: true });
        assert_eq!(outcome.fitness(), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_out_of_range_score_rejected() {
        let mut cache = EvaluationCache::new();
        let result: Result<Evaluation, RatingError> =
            cache.evaluate(GenomeKey::new(0, 1), rate_with(RatingOutcome::Scored(11.0)));
        assert!(matches!(result, Err(RatingError::ScoreOutOfRange(_))));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_rate_sees_current_cache() {
        let mut cache = EvaluationCache::new();
        cache
            .evaluate(GenomeKey::new(0, 0), rate_with(RatingOutcome::Scored(2.0)))
            .unwrap();

        cache
            .evaluate(GenomeKey::new(1, 1), |c: &EvaluationCache| {
                assert_eq!(c.len(), 1);
                Ok::<_, RatingError>(RatingOutcome::Scored(3.0))
            })
            .unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_top_k() {
        let corpus = test_corpus();
        let mut cache = EvaluationCache::new();
        let ratings = [
            (GenomeKey::new(0, 0), RatingOutcome::Scored(4.0)),
            (GenomeKey::new(1, 2), RatingOutcome::Scored(9.0)),
            (GenomeKey::new(2, 1), RatingOutcome::Skipped),
            (GenomeKey::new(3, 3), RatingOutcome::Scored(6.5)),
            (GenomeKey::new(4, 0), RatingOutcome::Scored(6.5)),
        ];
        for (key, outcome) in ratings {
            cache.evaluate(key, rate_with(outcome)).unwrap();
        }

        let top = cache.top_k(3, &corpus).unwrap();
        assert_eq!(top.len(), 3);
        assert_eq!(top[0].score, 9.0);
        assert_eq!(top[0].image, "img_1.png");
        assert_eq!(top[0].audio, "snd_2.mp3");
        assert_eq!(top[1].key, GenomeKey::new(3, 3));
        assert_eq!(top[2].key, GenomeKey::new(4, 0));

        // Skips never appear.
        let all = cache.top_k(10, &corpus).unwrap();
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn test_top_k_bad_index() {
        let corpus = test_corpus();
        let mut cache = EvaluationCache::new();
        cache
            .evaluate(GenomeKey::new(99, 0), rate_with(RatingOutcome::Scored(5.0)))
            .unwrap();
        assert!(matches!(
            cache.top_k(3, &corpus),
            Err(CorpusError::AssetResolution { index: 99, .. })
        ));
    }
}
