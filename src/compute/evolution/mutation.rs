//! Point mutation of embedding vectors.
//!
//! A mutation touches a handful of coordinates, each with one or more of
//! three operators scaled by the modality's value statistics.

use rand::Rng;
use rand::seq::SliceRandom;
use rand_distr::{Distribution, Uniform};

use crate::compute::Modality;
use crate::schema::{EmbeddingStatistics, ModalityStatistics};

/// Per-coordinate mutation operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOperator {
    /// Replace with a value uniform in `[min, max]`.
    Substitute,
    /// Multiply by a factor uniform in `[0.95, 1.05]`.
    Scale,
    /// Add a value uniform in `[-0.05 std, 0.05 std]`.
    Jitter,
}

impl MutationOperator {
    /// Application order when several operators hit the same coordinate.
    pub const ALL: [MutationOperator; 3] = [
        MutationOperator::Substitute,
        MutationOperator::Scale,
        MutationOperator::Jitter,
    ];
}

const SCALE_SPAN: f32 = 0.05;
const JITTER_FRACTION: f32 = 0.05;

/// Sampling distributions for one modality.
#[derive(Debug, Clone, Copy)]
struct OperatorDistributions {
    substitute: Uniform<f32>,
    scale: Uniform<f32>,
    jitter: Uniform<f32>,
}

impl OperatorDistributions {
    fn new(stats: &ModalityStatistics) -> Self {
        let jitter = JITTER_FRACTION * stats.std;
        Self {
            substitute: Uniform::new_inclusive(stats.min, stats.max),
            scale: Uniform::new_inclusive(1.0 - SCALE_SPAN, 1.0 + SCALE_SPAN),
            jitter: Uniform::new_inclusive(-jitter, jitter),
        }
    }

    fn apply<R: Rng + ?Sized>(&self, op: MutationOperator, value: f32, rng: &mut R) -> f32 {
        match op {
            MutationOperator::Substitute => self.substitute.sample(rng),
            MutationOperator::Scale => value * self.scale.sample(rng),
            MutationOperator::Jitter => value + self.jitter.sample(rng),
        }
    }
}

/// Stochastic vector mutation driven by the current mutation rate.
#[derive(Debug, Clone)]
pub struct MutationEngine {
    image: OperatorDistributions,
    audio: OperatorDistributions,
}

impl MutationEngine {
    /// Build from validated statistics (`min <= max`, `std >= 0`).
    pub fn new(statistics: &EmbeddingStatistics) -> Self {
        Self {
            image: OperatorDistributions::new(&statistics.image),
            audio: OperatorDistributions::new(&statistics.audio),
        }
    }

    fn distributions(&self, modality: Modality) -> &OperatorDistributions {
        match modality {
            Modality::Image => &self.image,
            Modality::Audio => &self.audio,
        }
    }

    /// Mutate a vector with probability `rate`.
    ///
    /// When the mutation does not fire the input is handed back untouched.
    /// Otherwise `k` in `[1, max(1, len / 20)]` positions are drawn with
    /// replacement; each operator fires on a position with probability
    /// `rate / 3`, and if none does exactly one is picked at random.
    pub fn mutate<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        mut vector: Vec<f32>,
        modality: Modality,
        rate: f32,
    ) -> Vec<f32> {
        if vector.is_empty() || rng.r#gen::<f32>() >= rate {
            return vector;
        }

        let dists = self.distributions(modality);
        let count = rng.gen_range(1..=(vector.len() / 20).max(1));

        for _ in 0..count {
            let idx = rng.gen_range(0..vector.len());
            for op in self.pick_operators(rng, rate) {
                vector[idx] = dists.apply(op, vector[idx], rng);
            }
        }

        vector
    }

    /// Operators to apply at one position, in application order.
    fn pick_operators<R: Rng + ?Sized>(&self, rng: &mut R, rate: f32) -> Vec<MutationOperator> {
        let chosen: Vec<MutationOperator> = MutationOperator::ALL
            .into_iter()
            .filter(|_| rng.r#gen::<f32>() < rate / 3.0)
            .collect();

        if chosen.is_empty() {
            // ALL is non-empty, so choose always yields an operator.
            MutationOperator::ALL
                .choose(rng)
                .copied()
                .into_iter()
                .collect()
        } else {
            chosen
        }
    }
}
