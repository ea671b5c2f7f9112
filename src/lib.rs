//! Meme evolution - Interactive evolutionary search over image-audio pairs.
//!
//! Images and audio clips are represented by pre-computed embedding vectors.
//! A genome pairs one image with one audio clip; a human rates each pairing
//! and the engine breeds the next population from those ratings.
//!
//! # Architecture
//!
//! - `schema`: Configuration and result types
//! - `compute`: Embedding corpus and the evolutionary search
//! - `console`: Terminal rater used by the binary
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use meme_evo::{
//!     compute::{EmbeddingCorpus, evolution::EvolutionEngine},
//!     console::ConsoleRater,
//!     schema::EvolutionConfig,
//! };
//!
//! let config = EvolutionConfig::default();
//! let corpus = EmbeddingCorpus::load("image_embeddings.csv", "audio_embeddings.csv").unwrap();
//!
//! let mut engine = EvolutionEngine::new(config, Arc::new(corpus)).unwrap();
//! let result = engine.run(&mut ConsoleRater::stdio()).unwrap();
//!
//! println!("Best pairing: {:?}", result.leaderboard.first());
//! ```

pub mod compute;
pub mod console;
pub mod schema;

// Re-export commonly used types
pub use compute::EmbeddingCorpus;
pub use compute::evolution::EvolutionEngine;
pub use schema::EvolutionConfig;
