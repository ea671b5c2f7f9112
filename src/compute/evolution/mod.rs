//! Interactive evolutionary search over image-audio pairings.
//!
//! A human rates each (image, audio) pair; the engine breeds the next
//! population from those ratings.
//!
//! # Overview
//!
//! - **Genome Operations** (`genome`): Random genomes, crossover and snapping
//!   continuous vectors back onto corpus rows
//! - **Mutation** (`mutation`): Substitute, scale and jitter operators
//! - **Selection** (`selection`): Elitist plus weighted-random mating
//! - **Adaptive Rate** (`adaptive`): Raises the mutation rate on stagnation
//!   or duplicate pressure
//! - **Evaluation Cache** (`cache`): Never asks about the same pair twice
//! - **Rating** (`rating`): The `Rater` seam between engine and human
//! - **Search** (`search`): The generation loop
//! - **Archive** (`archive`): JSON export of finished runs
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use meme_evo::compute::EmbeddingCorpus;
//! use meme_evo::compute::evolution::EvolutionEngine;
//! use meme_evo::console::ConsoleRater;
//! use meme_evo::schema::EvolutionConfig;
//!
//! let config = EvolutionConfig::default();
//! let corpus = EmbeddingCorpus::load(
//!     &config.assets.image_embeddings,
//!     &config.assets.audio_embeddings,
//! ).unwrap();
//!
//! let mut engine = EvolutionEngine::new(config, Arc::new(corpus)).unwrap();
//! let mut rater = ConsoleRater::stdio();
//! let result = engine.run_with_callback(&mut rater, |progress| {
//!     println!("Generation {}: rate = {:.2}",
//!         progress.generation, progress.mutation_rate);
//! }).unwrap();
//!
//! for entry in &result.leaderboard {
//!     println!("{} + {}: {:.1}", entry.image, entry.audio, entry.score);
//! }
//! ```

mod adaptive;
mod archive;
mod cache;
mod genome;
mod mutation;
mod rating;
mod search;
mod selection;

pub use adaptive::{AdaptiveController, AdaptiveState};
pub use archive::{RunExport, export_file_name, load_result, save_result};
pub use cache::{CachedRating, Evaluation, EvaluationCache};
pub use genome::GenomeRng;
pub use mutation::{MutationEngine, MutationOperator};
pub use rating::{
    MAX_SCORE, MIN_SCORE, Rater, RatingError, RatingOutcome, RatingRequest, validate_score,
};
pub use search::{EvolutionEngine, EvolutionError, GenerationOutcome, GenerationReport};
pub use selection::{MatingSelector, Offspring, selection_weights};
