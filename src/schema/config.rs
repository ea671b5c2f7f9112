//! Configuration types for an evolution run.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::compute::Modality;

/// Top-level configuration for an interactive evolution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Number of genomes per generation.
    #[serde(default = "default_population_size")]
    pub population_size: usize,
    /// Maximum number of generations to run.
    #[serde(default = "default_generation_count")]
    pub generation_count: usize,
    /// Number of entries shown on the leaderboard.
    #[serde(default = "default_leaderboard_size")]
    pub leaderboard_size: usize,
    /// Adaptive mutation-rate settings.
    #[serde(default)]
    pub mutation: MutationConfig,
    /// Parent selection and crossover settings.
    #[serde(default)]
    pub selection: SelectionConfig,
    /// Per-modality embedding statistics used to scale mutations.
    #[serde(default)]
    pub statistics: EmbeddingStatistics,
    /// Embedding tables and asset directories.
    #[serde(default)]
    pub assets: AssetConfig,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: default_population_size(),
            generation_count: default_generation_count(),
            leaderboard_size: default_leaderboard_size(),
            mutation: MutationConfig::default(),
            selection: SelectionConfig::default(),
            statistics: EmbeddingStatistics::default(),
            assets: AssetConfig::default(),
            random_seed: None,
        }
    }
}

fn default_population_size() -> usize {
    10
}
fn default_generation_count() -> usize {
    100
}
fn default_leaderboard_size() -> usize {
    3
}

/// Adaptive mutation-rate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationConfig {
    /// Mutation rate at generation 0.
    #[serde(default = "default_initial_rate")]
    pub initial_rate: f32,
    /// Upper clamp for the mutation rate.
    #[serde(default = "default_max_rate")]
    pub max_rate: f32,
    /// Rate increase per stagnant generation when an adjustment fires.
    #[serde(default = "default_increment")]
    pub increment: f32,
    /// Consecutive stagnant generations that trigger an adjustment.
    #[serde(default = "default_stagnation_limit")]
    pub stagnation_limit: usize,
    /// Average fitness must beat the best seen by more than this to count
    /// as an improvement.
    #[serde(default = "default_improvement_threshold")]
    pub improvement_threshold: f32,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            initial_rate: default_initial_rate(),
            max_rate: default_max_rate(),
            increment: default_increment(),
            stagnation_limit: default_stagnation_limit(),
            improvement_threshold: default_improvement_threshold(),
        }
    }
}

fn default_initial_rate() -> f32 {
    0.2
}
fn default_max_rate() -> f32 {
    0.5
}
fn default_increment() -> f32 {
    0.02
}
fn default_stagnation_limit() -> usize {
    3
}
fn default_improvement_threshold() -> f32 {
    0.01
}

/// Parent selection and crossover configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Added to every score before computing selection weights.
    #[serde(default = "default_weight_epsilon")]
    pub weight_epsilon: f64,
    /// Probability of arithmetic (mean) crossover; uniform crossover otherwise.
    #[serde(default = "default_arithmetic_crossover_probability")]
    pub arithmetic_crossover_probability: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            weight_epsilon: default_weight_epsilon(),
            arithmetic_crossover_probability: default_arithmetic_crossover_probability(),
        }
    }
}

fn default_weight_epsilon() -> f64 {
    1e-8
}
fn default_arithmetic_crossover_probability() -> f64 {
    0.5
}

/// Empirical value statistics for one embedding modality.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ModalityStatistics {
    /// Typical standard deviation of a coordinate.
    pub std: f32,
    /// Lower bound for substituted values.
    pub min: f32,
    /// Upper bound for substituted values.
    pub max: f32,
}

impl ModalityStatistics {
    /// Statistics measured on the image embedding table.
    pub const IMAGE: Self = Self {
        std: 0.6,
        min: -9.0,
        max: 4.0,
    };

    /// Statistics measured on the audio embedding table.
    pub const AUDIO: Self = Self {
        std: 0.04,
        min: -0.15,
        max: 0.15,
    };
}

/// Statistics for both modalities.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingStatistics {
    pub image: ModalityStatistics,
    pub audio: ModalityStatistics,
}

impl Default for EmbeddingStatistics {
    fn default() -> Self {
        Self {
            image: ModalityStatistics::IMAGE,
            audio: ModalityStatistics::AUDIO,
        }
    }
}

impl EmbeddingStatistics {
    /// Statistics for the given modality.
    pub fn get(&self, modality: Modality) -> &ModalityStatistics {
        match modality {
            Modality::Image => &self.image,
            Modality::Audio => &self.audio,
        }
    }
}

/// Locations of the embedding tables and the assets they describe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    /// CSV file with image embeddings.
    #[serde(default = "default_image_embeddings")]
    pub image_embeddings: PathBuf,
    /// CSV file with audio embeddings.
    #[serde(default = "default_audio_embeddings")]
    pub audio_embeddings: PathBuf,
    /// Directory containing the image files named in the table.
    #[serde(default = "default_image_dir")]
    pub image_dir: PathBuf,
    /// Directory containing the audio files named in the table.
    #[serde(default = "default_audio_dir")]
    pub audio_dir: PathBuf,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            image_embeddings: default_image_embeddings(),
            audio_embeddings: default_audio_embeddings(),
            image_dir: default_image_dir(),
            audio_dir: default_audio_dir(),
        }
    }
}

fn default_image_embeddings() -> PathBuf {
    PathBuf::from("image_embeddings.csv")
}
fn default_audio_embeddings() -> PathBuf {
    PathBuf::from("audio_embeddings.csv")
}
fn default_image_dir() -> PathBuf {
    PathBuf::from("imagens")
}
fn default_audio_dir() -> PathBuf {
    PathBuf::from("audios")
}

impl AssetConfig {
    /// Path of an asset file for the given modality.
    pub fn asset_path(&self, modality: Modality, identifier: &str) -> PathBuf {
        match modality {
            Modality::Image => self.image_dir.join(identifier),
            Modality::Audio => self.audio_dir.join(identifier),
        }
    }
}

impl EvolutionConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population_size < 2 {
            return Err(ConfigError::PopulationTooSmall);
        }
        if self.generation_count == 0 {
            return Err(ConfigError::NoGenerations);
        }
        if self.leaderboard_size == 0 {
            return Err(ConfigError::EmptyLeaderboard);
        }

        let m = &self.mutation;
        let rate_ok = |r: f32| (0.0..=1.0).contains(&r);
        if !rate_ok(m.initial_rate) || !rate_ok(m.max_rate) || m.initial_rate > m.max_rate {
            return Err(ConfigError::InvalidMutationRate {
                initial: m.initial_rate,
                max: m.max_rate,
            });
        }
        if !(m.increment >= 0.0) {
            return Err(ConfigError::InvalidIncrement(m.increment));
        }
        if m.stagnation_limit == 0 {
            return Err(ConfigError::InvalidStagnationLimit);
        }

        if !(self.selection.weight_epsilon > 0.0) {
            return Err(ConfigError::InvalidEpsilon(self.selection.weight_epsilon));
        }
        let p = self.selection.arithmetic_crossover_probability;
        if !(0.0..=1.0).contains(&p) {
            return Err(ConfigError::InvalidProbability(p));
        }

        for modality in [Modality::Image, Modality::Audio] {
            let stats = self.statistics.get(modality);
            if !(stats.min < stats.max) || !(stats.std >= 0.0) {
                return Err(ConfigError::InvalidStatistics(modality));
            }
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Population size must be at least 2")]
    PopulationTooSmall,
    #[error("Generation count must be non-zero")]
    NoGenerations,
    #[error("Leaderboard size must be non-zero")]
    EmptyLeaderboard,
    #[error("Mutation rates must satisfy 0 <= initial ({initial}) <= max ({max}) <= 1")]
    InvalidMutationRate { initial: f32, max: f32 },
    #[error("Mutation increment must be non-negative, got {0}")]
    InvalidIncrement(f32),
    #[error("Stagnation limit must be non-zero")]
    InvalidStagnationLimit,
    #[error("Selection weight epsilon must be positive, got {0}")]
    InvalidEpsilon(f64),
    #[error("Crossover probability must be in [0, 1], got {0}")]
    InvalidProbability(f64),
    #[error("Statistics for {0} modality need min < max and std >= 0")]
    InvalidStatistics(Modality),
}
