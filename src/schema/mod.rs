//! Schema module - Configuration and data types for evolution runs.

mod config;
mod evolution;

pub use config::*;
pub use evolution::*;
