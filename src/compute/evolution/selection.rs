//! Next-generation construction from a rated population.
//!
//! The top individual mates with weighted-random partners for the first
//! half of the new population; weighted-random pairs from the rest of the
//! population fill the remaining slots. A pair of parents produces at most
//! one child per generation.

use std::collections::HashSet;

use rand::Rng;
use rand::distributions::WeightedIndex;
use rand::seq::index;
use rand_distr::Distribution;

use crate::compute::{CorpusError, EmbeddingCorpus, Modality};
use crate::schema::{Genome, ScoredGenome, SelectionConfig};

use super::genome::GenomeRng;
use super::mutation::MutationEngine;

/// Consecutive repeated pairs before drawing uniformly from unused pairs.
/// Near-zero weights would otherwise make the remaining pairs unreachable.
const MAX_REDRAWS: usize = 64;

/// Output of one reproduction step.
#[derive(Debug, Clone)]
pub struct Offspring {
    /// The new population. May be shorter than the requested size when the
    /// pool of unused parent pairs runs out.
    pub children: Vec<Genome>,
    /// Parent ranks of each child (0 is the top individual), in child order.
    pub pairings: Vec<(usize, usize)>,
    /// Top individual of the generation that produced these children.
    pub best: ScoredGenome,
}

/// Builds the next population from a scored one.
pub struct MatingSelector<'a> {
    corpus: &'a EmbeddingCorpus,
    mutation: &'a MutationEngine,
    config: &'a SelectionConfig,
    population_size: usize,
    mutation_rate: f32,
}

impl<'a> MatingSelector<'a> {
    pub fn new(
        corpus: &'a EmbeddingCorpus,
        mutation: &'a MutationEngine,
        config: &'a SelectionConfig,
        population_size: usize,
        mutation_rate: f32,
    ) -> Self {
        Self {
            corpus,
            mutation,
            config,
            population_size,
            mutation_rate,
        }
    }

    /// Produce the next population.
    ///
    /// Returns `None` when fewer than two individuals were scored.
    pub fn next_generation(
        &self,
        rng: &mut GenomeRng,
        mut scored: Vec<ScoredGenome>,
    ) -> Result<Option<Offspring>, CorpusError> {
        if scored.len() < 2 {
            return Ok(None);
        }

        // Stable sort keeps population order among equal scores.
        scored.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));

        let pool_len = scored.len() - 1;
        let scores: Vec<f32> = scored[1..].iter().map(|s| s.fitness).collect();
        let weights = selection_weights(&scores, self.config.weight_epsilon);
        let sampler = WeightedIndex::new(&weights).ok();

        let mut children = Vec::with_capacity(self.population_size);
        let mut pairings = Vec::with_capacity(self.population_size);
        let mut used: HashSet<(usize, usize)> = HashSet::new();

        // Phase 1: the top individual (index 0) with weighted partners.
        let phase1_target = (self.population_size / 2).min(pool_len);
        let mut misses = 0;
        while children.len() < phase1_target {
            let partner = match &sampler {
                Some(dist) if misses < MAX_REDRAWS => 1 + dist.sample(rng),
                _ => {
                    let free: Vec<usize> = (1..=pool_len)
                        .filter(|&p| !used.contains(&pair(0, p)))
                        .collect();
                    free[rng.gen_range(0..free.len())]
                }
            };
            if used.insert(pair(0, partner)) {
                misses = 0;
                pairings.push((0, partner));
                children.push(self.breed(rng, &scored[0].genome, &scored[partner].genome)?);
            } else {
                misses += 1;
            }
        }

        // Phase 2: weighted pairs from the non-top pool.
        let pool_pairs = pool_len * pool_len.saturating_sub(1) / 2;
        let mut pool_pairs_used = 0;
        let mut misses = 0;
        while children.len() < self.population_size {
            if pool_len < 2 || pool_pairs_used == pool_pairs {
                log::warn!(
                    "Parent pairs exhausted: next population has {} of {} genomes",
                    children.len(),
                    self.population_size
                );
                break;
            }

            let (a, b) = if misses < MAX_REDRAWS {
                let (a, b) = draw_two(rng, &weights);
                (a + 1, b + 1)
            } else {
                let free: Vec<(usize, usize)> = (1..=pool_len)
                    .flat_map(|a| (a + 1..=pool_len).map(move |b| (a, b)))
                    .filter(|p| !used.contains(p))
                    .collect();
                free[rng.gen_range(0..free.len())]
            };
            if used.insert(pair(a, b)) {
                misses = 0;
                pool_pairs_used += 1;
                pairings.push((a, b));
                children.push(self.breed(rng, &scored[a].genome, &scored[b].genome)?);
            } else {
                misses += 1;
            }
        }

        let best = scored.swap_remove(0);
        Ok(Some(Offspring {
            children,
            pairings,
            best,
        }))
    }

    /// Crossover, mutate and snap one child.
    ///
    /// The child keeps its mutated continuous vectors; only the indices are
    /// taken from the corpus.
    pub fn breed(
        &self,
        rng: &mut GenomeRng,
        parent1: &Genome,
        parent2: &Genome,
    ) -> Result<Genome, CorpusError> {
        let (image, audio) =
            rng.crossover(parent1, parent2, self.config.arithmetic_crossover_probability);

        let image_vector = self
            .mutation
            .mutate(rng, image, Modality::Image, self.mutation_rate);
        let audio_vector = self
            .mutation
            .mutate(rng, audio, Modality::Audio, self.mutation_rate);

        let image_index = rng.snap(self.corpus, Modality::Image, &image_vector, self.mutation_rate)?;
        let audio_index = rng.snap(self.corpus, Modality::Audio, &audio_vector, self.mutation_rate)?;

        Ok(Genome {
            image_index,
            audio_index,
            image_vector,
            audio_vector,
        })
    }
}

/// Normalized selection weights `(s + eps) / sum(s + eps)`.
pub fn selection_weights(scores: &[f32], epsilon: f64) -> Vec<f64> {
    let shifted: Vec<f64> = scores.iter().map(|&s| s as f64 + epsilon).collect();
    let total: f64 = shifted.iter().sum();
    if total > 0.0 {
        shifted.into_iter().map(|w| w / total).collect()
    } else {
        vec![0.0; scores.len()]
    }
}

/// Draw two distinct pool indices by weight, falling back to a uniform
/// draw when the weights cannot support it.
fn draw_two<R: Rng + ?Sized>(rng: &mut R, weights: &[f64]) -> (usize, usize) {
    if let Ok(first_dist) = WeightedIndex::new(weights) {
        let first = first_dist.sample(rng);
        let mut rest = weights.to_vec();
        rest[first] = 0.0;
        if let Ok(second_dist) = WeightedIndex::new(&rest) {
            return (first, second_dist.sample(rng));
        }
    }

    let picked = index::sample(rng, weights.len(), 2);
    (picked.index(0), picked.index(1))
}

/// Unordered pair key.
fn pair(a: usize, b: usize) -> (usize, usize) {
    if a <= b { (a, b) } else { (b, a) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::test_corpus;
    use crate::schema::EmbeddingStatistics;

    fn scored_population(corpus: &EmbeddingCorpus, scores: &[f32], seed: u64) -> Vec<ScoredGenome> {
        let mut rng = GenomeRng::new(seed);
        scores
            .iter()
            .map(|&fitness| ScoredGenome {
                genome: rng.random_genome(corpus).unwrap(),
                fitness,
            })
            .collect()
    }

    #[test]
    fn test_selection_weights_normalized() {
        let weights = selection_weights(&[8.0, 7.0, 0.0], 1e-8);
        let total: f64 = weights.iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!(weights[0] > weights[1]);
        assert!(weights[2] > 0.0);
    }

    #[test]
    fn test_all_zero_scores_give_equal_weights() {
        let weights = selection_weights(&[0.0, 0.0, 0.0, 0.0], 1e-8);
        for w in &weights {
            assert!((w - 0.25).abs() < 1e-12);
        }
    }

    #[test]
    fn test_draw_two_distinct() {
        let mut rng = GenomeRng::new(5);
        for _ in 0..200 {
            let (a, b) = draw_two(&mut rng, &[0.5, 0.3, 0.2]);
            assert_ne!(a, b);
        }
    }

    #[test]
    fn test_draw_two_zero_weights_falls_back() {
        let mut rng = GenomeRng::new(6);
        for _ in 0..50 {
            let (a, b) = draw_two(&mut rng, &[0.0, 0.0, 0.0]);
            assert_ne!(a, b);
            assert!(a < 3 && b < 3);
        }
    }

    #[test]
    fn test_draw_two_single_positive_weight_falls_back() {
        let mut rng = GenomeRng::new(8);
        let (a, b) = draw_two(&mut rng, &[0.0, 1.0, 0.0]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_full_population_from_ten() {
        let corpus = test_corpus();
        let mutation = MutationEngine::new(&EmbeddingStatistics::default());
        let config = SelectionConfig::default();
        let selector = MatingSelector::new(&corpus, &mutation, &config, 10, 0.2);

        let scores = [9.0, 8.0, 7.0, 6.0, 5.0, 4.0, 3.0, 2.0, 1.0, 0.0];
        let population = scored_population(&corpus, &scores, 1);
        let top = population[0].genome.clone();

        let mut rng = GenomeRng::new(2);
        let offspring = selector
            .next_generation(&mut rng, population)
            .unwrap()
            .unwrap();

        assert_eq!(offspring.children.len(), 10);
        assert_eq!(offspring.best.fitness, 9.0);

        // First half: the top individual with five distinct partners.
        let (phase1, phase2) = offspring.pairings.split_at(5);
        let partners: HashSet<usize> = phase1
            .iter()
            .map(|&(a, b)| {
                assert_eq!(a, 0);
                b
            })
            .collect();
        assert_eq!(partners.len(), 5);
        // Second half: pairs drawn from the other nine only.
        for &(a, b) in phase2 {
            assert!(a != 0 && b != 0 && a != b);
        }
        let unique: HashSet<_> = offspring.pairings.iter().map(|&(a, b)| pair(a, b)).collect();
        assert_eq!(unique.len(), 10);
        assert_eq!(offspring.best.genome, top);
        for child in &offspring.children {
            assert!(child.image_index < corpus.table(Modality::Image).len());
            assert!(child.audio_index < corpus.table(Modality::Audio).len());
        }
    }

    #[test]
    fn test_population_order_does_not_matter_for_best() {
        let corpus = test_corpus();
        let mutation = MutationEngine::new(&EmbeddingStatistics::default());
        let config = SelectionConfig::default();
        let selector = MatingSelector::new(&corpus, &mutation, &config, 4, 0.2);

        let population = scored_population(&corpus, &[1.0, 3.0, 10.0, 2.0], 3);
        let expected = population[2].genome.clone();
        let mut rng = GenomeRng::new(4);
        let offspring = selector
            .next_generation(&mut rng, population)
            .unwrap()
            .unwrap();

        assert_eq!(offspring.best.genome, expected);
        assert_eq!(offspring.best.fitness, 10.0);
    }

    #[test]
    fn test_short_population_when_pairs_run_out() {
        let corpus = test_corpus();
        let mutation = MutationEngine::new(&EmbeddingStatistics::default());
        let config = SelectionConfig::default();
        // Three scored parents: two pairs with the top, one pair in the pool.
        let selector = MatingSelector::new(&corpus, &mutation, &config, 10, 0.2);

        let population = scored_population(&corpus, &[5.0, 4.0, 3.0], 5);
        let mut rng = GenomeRng::new(6);
        let offspring = selector
            .next_generation(&mut rng, population)
            .unwrap()
            .unwrap();

        assert_eq!(offspring.children.len(), 3);
    }

    #[test]
    fn test_near_zero_weights_still_fill_population() {
        let corpus = test_corpus();
        let mutation = MutationEngine::new(&EmbeddingStatistics::default());
        let config = SelectionConfig::default();
        let selector = MatingSelector::new(&corpus, &mutation, &config, 6, 0.2);

        let population = scored_population(&corpus, &[9.0, 8.0, 0.0, 0.0, 0.0, 0.0], 13);
        let mut rng = GenomeRng::new(14);
        let offspring = selector
            .next_generation(&mut rng, population)
            .unwrap()
            .unwrap();

        assert_eq!(offspring.children.len(), 6);
        let unique: HashSet<_> = offspring.pairings.iter().map(|&(a, b)| pair(a, b)).collect();
        assert_eq!(unique.len(), 6);
    }

    #[test]
    fn test_two_parents_give_one_child() {
        let corpus = test_corpus();
        let mutation = MutationEngine::new(&EmbeddingStatistics::default());
        let config = SelectionConfig::default();
        let selector = MatingSelector::new(&corpus, &mutation, &config, 10, 0.2);

        let population = scored_population(&corpus, &[5.0, 4.0], 7);
        let mut rng = GenomeRng::new(8);
        let offspring = selector
            .next_generation(&mut rng, population)
            .unwrap()
            .unwrap();

        assert_eq!(offspring.children.len(), 1);
    }

    #[test]
    fn test_single_parent_returns_none() {
        let corpus = test_corpus();
        let mutation = MutationEngine::new(&EmbeddingStatistics::default());
        let config = SelectionConfig::default();
        let selector = MatingSelector::new(&corpus, &mutation, &config, 10, 0.2);

        let population = scored_population(&corpus, &[5.0], 9);
        let mut rng = GenomeRng::new(10);
        assert!(selector.next_generation(&mut rng, population).unwrap().is_none());
    }

    #[test]
    fn test_next_generation_deterministic() {
        let corpus = test_corpus();
        let mutation = MutationEngine::new(&EmbeddingStatistics::default());
        let config = SelectionConfig::default();
        let selector = MatingSelector::new(&corpus, &mutation, &config, 6, 0.4);

        let run = || {
            let population = scored_population(&corpus, &[6.0, 2.0, 9.0, 1.0, 4.0, 0.0], 11);
            let mut rng = GenomeRng::new(12);
            selector
                .next_generation(&mut rng, population)
                .unwrap()
                .unwrap()
                .children
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_breed_keeps_continuous_vectors() {
        let corpus = test_corpus();
        let mutation = MutationEngine::new(&EmbeddingStatistics::default());
        let config = SelectionConfig {
            arithmetic_crossover_probability: 1.0,
            ..Default::default()
        };
        let selector = MatingSelector::new(&corpus, &mutation, &config, 2, 0.0);

        let mut rng = GenomeRng::new(13);
        let p1 = Genome {
            image_index: 0,
            audio_index: 0,
            image_vector: corpus.vector(Modality::Image, 0).unwrap().to_vec(),
            audio_vector: corpus.vector(Modality::Audio, 0).unwrap().to_vec(),
        };
        let p2 = Genome {
            image_index: 3,
            audio_index: 1,
            image_vector: corpus.vector(Modality::Image, 3).unwrap().to_vec(),
            audio_vector: corpus.vector(Modality::Audio, 1).unwrap().to_vec(),
        };

        let child = selector.breed(&mut rng, &p1, &p2).unwrap();
        // Mean of rows 0 and 3 sits halfway; the vector is not a corpus row.
        assert_ne!(
            child.image_vector,
            corpus.vector(Modality::Image, child.image_index).unwrap()
        );
        assert!(child.image_index == 1 || child.image_index == 2);
    }
}
