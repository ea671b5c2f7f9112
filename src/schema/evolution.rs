//! Evolution data types: genomes, history, progress and results.
//!
//! These are plain serde types shared between the engine and whatever
//! presents its output (the CLI, a results file, a rating frontend).

use serde::{Deserialize, Serialize};

// ============================================================================
// Genome Representation
// ============================================================================

/// Discrete identity of a genome: the corpus rows it currently snaps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GenomeKey {
    pub image_index: usize,
    pub audio_index: usize,
}

impl GenomeKey {
    pub fn new(image_index: usize, audio_index: usize) -> Self {
        Self {
            image_index,
            audio_index,
        }
    }
}

/// One candidate meme.
///
/// The vectors are the continuous genetic payload and drift away from the
/// corpus rows after mutation. The indices only name the nearest discrete
/// assets, which is what the rater is shown and what the cache is keyed by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    /// Corpus row of the image this genome currently snaps to.
    pub image_index: usize,
    /// Corpus row of the audio clip this genome currently snaps to.
    pub audio_index: usize,
    /// Continuous image embedding.
    pub image_vector: Vec<f32>,
    /// Continuous audio embedding.
    pub audio_vector: Vec<f32>,
}

impl Genome {
    /// Discrete identity used for caching.
    pub fn key(&self) -> GenomeKey {
        GenomeKey::new(self.image_index, self.audio_index)
    }
}

/// A genome tagged with the fitness it earned in one generation.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredGenome {
    pub genome: Genome,
    pub fitness: f32,
}

// ============================================================================
// Progress and Result Types
// ============================================================================

/// Best individual of a single generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationBest {
    /// Generation number (0-based).
    pub generation: usize,
    pub key: GenomeKey,
    pub fitness: f32,
}

/// Per-generation history, for reporting only.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct EvolutionHistory {
    /// Average fitness per completed (or flushed partial) generation.
    pub average_fitness: Vec<f32>,
    /// Top individual of each generation that reproduced.
    pub generation_best: Vec<GenerationBest>,
    /// Mutation rate in effect after each generation's adaptive update.
    pub mutation_rate: Vec<f32>,
}

/// Leaderboard row resolved back to asset identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub key: GenomeKey,
    pub image: String,
    pub audio: String,
    pub score: f32,
}

/// Progress update emitted after every generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionProgress {
    /// Generations completed so far.
    pub generation: usize,
    /// Total generations planned.
    pub total_generations: usize,
    /// Size of the population that will be evaluated next.
    pub population_size: usize,
    /// Average fitness of the generation just evaluated.
    pub average_fitness: Option<f32>,
    /// Best average fitness seen by the adaptive controller.
    pub best_fitness_seen: f32,
    /// Current mutation rate.
    pub mutation_rate: f32,
    /// Consecutive generations without improvement.
    pub stagnation_streak: usize,
    /// Individuals answered from the cache in the last generation.
    pub duplicate_count: usize,
}

/// Best, mean and worst of the recorded generation averages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistorySummary {
    pub best: f32,
    pub mean: f32,
    pub worst: f32,
}

impl HistorySummary {
    /// Summarize a fitness history; `None` when it is empty.
    pub fn from_history(history: &[f32]) -> Option<Self> {
        if history.is_empty() {
            return None;
        }
        let best = history.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let worst = history.iter().copied().fold(f32::INFINITY, f32::min);
        let mean = history.iter().sum::<f32>() / history.len() as f32;
        Some(Self { best, mean, worst })
    }
}

/// Final result of an evolution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionResult {
    /// Highest-scoring rated pairs.
    pub leaderboard: Vec<LeaderboardEntry>,
    /// Statistics from the run.
    pub stats: EvolutionStats,
    /// Summary of the fitness history, if any generation was recorded.
    pub summary: Option<HistorySummary>,
    /// Full history for analysis.
    pub history: EvolutionHistory,
}

/// Statistics from an evolution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionStats {
    /// Generations that reached the end of evaluation.
    pub generations: usize,
    /// Requests sent to the rater.
    pub ratings_requested: u64,
    /// Evaluations answered from the cache.
    pub cache_hits: u64,
    /// Distinct pairs in the cache.
    pub cached_pairs: usize,
    /// Mutation rate when the run stopped.
    pub final_mutation_rate: f32,
    /// Time taken (in seconds).
    pub elapsed_seconds: f64,
    /// Reason for stopping.
    pub stop_reason: StopReason,
}

/// Reason evolution stopped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// Reached the configured generation count.
    MaxGenerations,
    /// The rater asked to stop.
    Terminated,
    /// Cancelled through the engine's cancel handle.
    Cancelled,
}
