//! Compute module - Embedding corpus and evolutionary search.

mod corpus;

pub mod evolution;

pub use corpus::*;
