//! The interactive generation loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::compute::{CorpusError, EmbeddingCorpus, Modality};
use crate::schema::{
    ConfigError, EvolutionConfig, EvolutionHistory, EvolutionProgress, EvolutionResult,
    EvolutionStats, GenerationBest, Genome, HistorySummary, LeaderboardEntry, ScoredGenome,
    StopReason,
};

use super::adaptive::{AdaptiveController, AdaptiveState};
use super::cache::{Evaluation, EvaluationCache};
use super::genome::GenomeRng;
use super::mutation::MutationEngine;
use super::rating::{Rater, RatingError, RatingRequest};
use super::selection::MatingSelector;

/// Errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Corpus error: {0}")]
    Corpus(#[from] CorpusError),
    #[error("Rating error: {0}")]
    Rating(#[from] RatingError),
}

/// Summary of one evaluated generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationReport {
    /// Generation number (0-based).
    pub generation: usize,
    /// Individuals that received a fitness value.
    pub evaluated: usize,
    /// Mean fitness, `None` when nothing was evaluated.
    pub average_fitness: Option<f32>,
    /// Individuals answered from the cache.
    pub duplicate_count: usize,
    /// Whether a new population was bred.
    pub reproduced: bool,
    /// Whether the adaptive controller raised the mutation rate.
    pub rate_raised: bool,
}

/// How a generation step ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GenerationOutcome {
    Completed(GenerationReport),
    /// The rater ended the run.
    Terminated,
    /// The cancel handle was set.
    Cancelled,
}

/// Evolution engine that runs the interactive search.
pub struct EvolutionEngine {
    config: EvolutionConfig,
    corpus: Arc<EmbeddingCorpus>,
    rng: GenomeRng,
    mutation: MutationEngine,
    controller: AdaptiveController,
    state: AdaptiveState,
    cache: EvaluationCache,
    population: Vec<Genome>,
    history: EvolutionHistory,
    generation: usize,
    last_report: Option<GenerationReport>,
    cancelled: Arc<AtomicBool>,
}

impl EvolutionEngine {
    /// Create a new evolution engine.
    pub fn new(config: EvolutionConfig, corpus: Arc<EmbeddingCorpus>) -> Result<Self, ConfigError> {
        config.validate()?;

        let rng = match config.random_seed {
            Some(seed) => GenomeRng::new(seed),
            None => GenomeRng::random(),
        };
        let mutation = MutationEngine::new(&config.statistics);
        let controller = AdaptiveController::new(config.mutation.clone());
        let state = controller.initial_state();

        Ok(Self {
            config,
            corpus,
            rng,
            mutation,
            controller,
            state,
            cache: EvaluationCache::new(),
            population: Vec::new(),
            history: EvolutionHistory::default(),
            generation: 0,
            last_report: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Start from a given population instead of a random one.
    pub fn with_population(mut self, population: Vec<Genome>) -> Self {
        self.population = population;
        self
    }

    /// Get cancellation handle.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Seed generation 0 with random corpus rows.
    pub fn initialize(&mut self) -> Result<(), CorpusError> {
        self.population = (0..self.config.population_size)
            .map(|_| self.rng.random_genome(&self.corpus))
            .collect::<Result<_, _>>()?;
        self.generation = 0;
        Ok(())
    }

    pub fn population(&self) -> &[Genome] {
        &self.population
    }

    pub fn history(&self) -> &EvolutionHistory {
        &self.history
    }

    pub fn adaptive_state(&self) -> &AdaptiveState {
        &self.state
    }

    pub fn cache(&self) -> &EvaluationCache {
        &self.cache
    }

    /// Generations evaluated so far.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Current leaderboard.
    pub fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, CorpusError> {
        self.cache.top_k(self.config.leaderboard_size, &self.corpus)
    }

    /// Evaluate one genome through the cache.
    fn evaluate<R: Rater>(&mut self, index: usize, rater: &mut R) -> Result<Evaluation, EvolutionError> {
        let key = self.population[index].key();
        let corpus = &self.corpus;
        let assets = &self.config.assets;
        let top_n = self.config.leaderboard_size;

        self.cache.evaluate::<_, EvolutionError>(key, |cache| {
            let image = corpus.identifier(Modality::Image, key.image_index)?;
            let audio = corpus.identifier(Modality::Audio, key.audio_index)?;
            log::info!("Individual {} with image {} and audio {}", index + 1, image, audio);

            let leaderboard = cache.top_k(top_n, corpus)?;
            let request = RatingRequest {
                key,
                image_path: assets.asset_path(Modality::Image, image),
                audio_path: assets.asset_path(Modality::Audio, audio),
                leaderboard: &leaderboard,
            };
            Ok(rater.rate(&request)?)
        })
    }

    /// Append the mean of a partial generation to the history.
    fn flush_partial(&mut self, scored: &[ScoredGenome]) {
        if let Some(average) = average_fitness(scored) {
            log::info!(
                "Recording partial generation: {} rated, average {:.2}",
                scored.len(),
                average
            );
            self.history.average_fitness.push(average);
        }
    }

    /// Evaluate the current population and breed the next one.
    pub fn step_generation<R: Rater>(
        &mut self,
        rater: &mut R,
    ) -> Result<GenerationOutcome, EvolutionError> {
        log::info!(
            "=== Generation {}/{} ===",
            self.generation + 1,
            self.config.generation_count
        );

        let mut scored = Vec::with_capacity(self.population.len());
        let mut duplicates = 0;
        let mut partial_flushed = false;

        for index in 0..self.population.len() {
            let evaluation = self.evaluate(index, rater)?;
            if evaluation.is_cached() {
                duplicates += 1;
            }

            match evaluation {
                Evaluation::Scored { score, .. } => {
                    log::debug!("Individual {} scored {}", index + 1, score);
                }
                Evaluation::Skipped { .. } => {
                    log::debug!("Individual {} skipped", index + 1);
                }
                Evaluation::Terminate { show_results } => {
                    self.flush_partial(&scored);
                    partial_flushed = true;
                    if !show_results {
                        log::info!("Run terminated by rater");
                        return Ok(GenerationOutcome::Terminated);
                    }

                    let leaderboard = self.leaderboard()?;
                    if rater.show_results(&leaderboard, &self.history.average_fitness)? {
                        log::info!("Run terminated from results view");
                        return Ok(GenerationOutcome::Terminated);
                    }
                    log::info!("Continuing with {} rated individuals", scored.len());
                    break;
                }
            }

            if let Some(fitness) = evaluation.fitness() {
                scored.push(ScoredGenome {
                    genome: self.population[index].clone(),
                    fitness,
                });
            }

            if self.cancelled.load(Ordering::Relaxed) {
                self.flush_partial(&scored);
                return Ok(GenerationOutcome::Cancelled);
            }
        }

        let generation = self.generation;
        self.generation += 1;

        let Some(average) = average_fitness(&scored) else {
            log::warn!("No evaluations in generation {}; keeping population", generation + 1);
            let report = GenerationReport {
                generation,
                evaluated: 0,
                average_fitness: None,
                duplicate_count: duplicates,
                reproduced: false,
                rate_raised: false,
            };
            self.last_report = Some(report);
            return Ok(GenerationOutcome::Completed(report));
        };

        if !partial_flushed {
            self.history.average_fitness.push(average);
        }
        log::info!("Generation average fitness: {:.2}", average);

        let evaluated = scored.len();
        let selector = MatingSelector::new(
            &self.corpus,
            &self.mutation,
            &self.config.selection,
            self.config.population_size,
            self.state.mutation_rate,
        );

        let (reproduced, rate_raised) = match selector.next_generation(&mut self.rng, scored)? {
            Some(offspring) => {
                self.history.generation_best.push(GenerationBest {
                    generation,
                    key: offspring.best.genome.key(),
                    fitness: offspring.best.fitness,
                });
                self.population = offspring.children;

                let raised = self.controller.observe(
                    &mut self.state,
                    average,
                    duplicates,
                    self.config.population_size,
                );
                self.history.mutation_rate.push(self.state.mutation_rate);
                (true, raised)
            }
            None => {
                log::warn!(
                    "Only {} individual rated; keeping population for the next generation",
                    evaluated
                );
                (false, false)
            }
        };

        let report = GenerationReport {
            generation,
            evaluated,
            average_fitness: Some(average),
            duplicate_count: duplicates,
            reproduced,
            rate_raised,
        };
        self.last_report = Some(report);
        Ok(GenerationOutcome::Completed(report))
    }

    /// Get current progress.
    pub fn progress(&self) -> EvolutionProgress {
        EvolutionProgress {
            generation: self.generation,
            total_generations: self.config.generation_count,
            population_size: self.population.len(),
            average_fitness: self.last_report.and_then(|r| r.average_fitness),
            best_fitness_seen: self.state.best_fitness_seen,
            mutation_rate: self.state.mutation_rate,
            stagnation_streak: self.state.stagnation_streak,
            duplicate_count: self.last_report.map_or(0, |r| r.duplicate_count),
        }
    }

    /// Check if evolution should stop.
    fn should_stop(&self) -> Option<StopReason> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Some(StopReason::Cancelled);
        }

        if self.generation >= self.config.generation_count {
            return Some(StopReason::MaxGenerations);
        }

        None
    }

    /// Run evolution with progress callback.
    pub fn run_with_callback<R, F>(
        &mut self,
        rater: &mut R,
        mut callback: F,
    ) -> Result<EvolutionResult, EvolutionError>
    where
        R: Rater,
        F: FnMut(&EvolutionProgress),
    {
        let start_time = std::time::Instant::now();

        if self.population.is_empty() {
            self.initialize()?;
        }

        let stop_reason = loop {
            if let Some(reason) = self.should_stop() {
                break reason;
            }

            match self.step_generation(rater)? {
                GenerationOutcome::Completed(_) => callback(&self.progress()),
                GenerationOutcome::Terminated => break StopReason::Terminated,
                GenerationOutcome::Cancelled => break StopReason::Cancelled,
            }
        };

        let leaderboard = self.leaderboard()?;
        let summary = HistorySummary::from_history(&self.history.average_fitness);

        log::info!("Stopped: {:?}", stop_reason);
        for (i, entry) in leaderboard.iter().enumerate() {
            log::info!(
                "{}. {} + {} - score {:.2}",
                i + 1,
                entry.image,
                entry.audio,
                entry.score
            );
        }

        Ok(EvolutionResult {
            leaderboard,
            stats: EvolutionStats {
                generations: self.generation,
                ratings_requested: self.cache.requests(),
                cache_hits: self.cache.hits(),
                cached_pairs: self.cache.len(),
                final_mutation_rate: self.state.mutation_rate,
                elapsed_seconds: start_time.elapsed().as_secs_f64(),
                stop_reason,
            },
            summary,
            history: self.history.clone(),
        })
    }

    /// Run evolution (blocking).
    pub fn run<R: Rater>(&mut self, rater: &mut R) -> Result<EvolutionResult, EvolutionError> {
        self.run_with_callback(rater, |_| {})
    }
}

fn average_fitness(scored: &[ScoredGenome]) -> Option<f32> {
    if scored.is_empty() {
        None
    } else {
        Some(scored.iter().map(|s| s.fitness).sum::<f32>() / scored.len() as f32)
    }
}
