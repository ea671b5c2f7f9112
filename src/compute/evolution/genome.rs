//! Genome manipulation utilities for evolutionary search.
//!
//! Provides random generation, crossover, and projection of continuous
//! vectors back onto the corpus ("snapping").

use rand::prelude::*;

use crate::compute::{CorpusError, EmbeddingCorpus, Modality};
use crate::schema::Genome;

/// Random number generator wrapper for genome operations.
///
/// Every random decision of a run goes through one of these so a fixed
/// seed reproduces the run exactly.
pub struct GenomeRng {
    rng: StdRng,
}

impl GenomeRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create with random seed.
    pub fn random() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Draw an independent random row from each modality.
    ///
    /// The row vectors are copied verbatim and become the genome's
    /// mutable genetic payload.
    pub fn random_genome(&mut self, corpus: &EmbeddingCorpus) -> Result<Genome, CorpusError> {
        let image_index = self
            .rng
            .gen_range(0..corpus.table(Modality::Image).len());
        let audio_index = self
            .rng
            .gen_range(0..corpus.table(Modality::Audio).len());

        Ok(Genome {
            image_index,
            audio_index,
            image_vector: corpus.vector(Modality::Image, image_index)?.to_vec(),
            audio_vector: corpus.vector(Modality::Audio, audio_index)?.to_vec(),
        })
    }

    /// Combine the vectors of two parents.
    ///
    /// With probability `arithmetic_probability` both child vectors are the
    /// elementwise mean of the parents; otherwise each coordinate is taken
    /// from either parent with equal probability. Returns the
    /// `(image, audio)` vectors before mutation and snapping.
    pub fn crossover(
        &mut self,
        parent1: &Genome,
        parent2: &Genome,
        arithmetic_probability: f64,
    ) -> (Vec<f32>, Vec<f32>) {
        if self.rng.gen_bool(arithmetic_probability) {
            (
                mean(&parent1.image_vector, &parent2.image_vector),
                mean(&parent1.audio_vector, &parent2.audio_vector),
            )
        } else {
            let image = self.uniform_mix(&parent1.image_vector, &parent2.image_vector);
            let audio = self.uniform_mix(&parent1.audio_vector, &parent2.audio_vector);
            (image, audio)
        }
    }

    fn uniform_mix(&mut self, a: &[f32], b: &[f32]) -> Vec<f32> {
        a.iter()
            .zip(b)
            .map(|(&x, &y)| if self.rng.gen_bool(0.5) { x } else { y })
            .collect()
    }

    /// Project a vector onto a corpus row.
    ///
    /// Takes the nearest row, except that with probability `rate` (and when
    /// the corpus has at least two rows) the second-nearest is taken.
    pub fn snap(
        &mut self,
        corpus: &EmbeddingCorpus,
        modality: Modality,
        vector: &[f32],
        rate: f32,
    ) -> Result<usize, CorpusError> {
        let ranked = corpus.nearest_neighbors(vector, modality)?;
        let nearest = ranked.first().ok_or(CorpusError::EmptyCorpus(modality))?;

        if self.rng.r#gen::<f32>() < rate
            && let Some(second) = ranked.get(1)
        {
            return Ok(second.index);
        }
        Ok(nearest.index)
    }
}

impl RngCore for GenomeRng {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.rng.try_fill_bytes(dest)
    }
}

/// Elementwise mean of two vectors.
fn mean(a: &[f32], b: &[f32]) -> Vec<f32> {
    a.iter().zip(b).map(|(x, y)| (x + y) / 2.0).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::test_corpus;

    #[test]
    fn test_random_genome() {
        let corpus = test_corpus();
        let mut rng = GenomeRng::new(42);

        for _ in 0..20 {
            let genome = rng.random_genome(&corpus).unwrap();
            assert_eq!(
                genome.image_vector,
                corpus.vector(Modality::Image, genome.image_index).unwrap()
            );
            assert_eq!(
                genome.audio_vector,
                corpus.vector(Modality::Audio, genome.audio_index).unwrap()
            );
        }
    }

    #[test]
    fn test_arithmetic_crossover() {
        let corpus = test_corpus();
        let mut rng = GenomeRng::new(1);
        let g1 = rng.random_genome(&corpus).unwrap();
        let g2 = rng.random_genome(&corpus).unwrap();

        let (image, audio) = rng.crossover(&g1, &g2, 1.0);
        for ((c, a), b) in image.iter().zip(&g1.image_vector).zip(&g2.image_vector) {
            assert!((c - (a + b) / 2.0).abs() < 1e-6);
        }
        assert_eq!(audio.len(), g1.audio_vector.len());
    }

    #[test]
    fn test_uniform_crossover_takes_parent_genes() {
        let corpus = test_corpus();
        let mut rng = GenomeRng::new(2);
        let g1 = rng.random_genome(&corpus).unwrap();
        let g2 = rng.random_genome(&corpus).unwrap();

        let (image, audio) = rng.crossover(&g1, &g2, 0.0);
        for (i, value) in image.iter().enumerate() {
            assert!(*value == g1.image_vector[i] || *value == g2.image_vector[i]);
        }
        for (i, value) in audio.iter().enumerate() {
            assert!(*value == g1.audio_vector[i] || *value == g2.audio_vector[i]);
        }
    }

    #[test]
    fn test_crossover_deterministic() {
        let corpus = test_corpus();
        let run = |seed| {
            let mut rng = GenomeRng::new(seed);
            let g1 = rng.random_genome(&corpus).unwrap();
            let g2 = rng.random_genome(&corpus).unwrap();
            rng.crossover(&g1, &g2, 0.5)
        };
        assert_eq!(run(9), run(9));
    }

    #[test]
    fn test_snap_exact_row() {
        let corpus = test_corpus();
        let mut rng = GenomeRng::new(3);
        let row = corpus.vector(Modality::Image, 2).unwrap().to_vec();

        // Rate 0 never diversifies.
        assert_eq!(rng.snap(&corpus, Modality::Image, &row, 0.0).unwrap(), 2);
    }

    #[test]
    fn test_snap_second_nearest_at_full_rate() {
        let corpus = test_corpus();
        let mut rng = GenomeRng::new(4);
        let row = corpus.vector(Modality::Image, 0).unwrap().to_vec();

        assert_eq!(rng.snap(&corpus, Modality::Image, &row, 1.0).unwrap(), 1);
    }

    #[test]
    fn test_snap_single_row_corpus() {
        use crate::compute::{CorpusEntry, CorpusTable};

        let single = |modality| {
            CorpusTable::new(
                modality,
                vec![CorpusEntry {
                    identifier: "only".into(),
                    vector: vec![1.0, 2.0],
                }],
            )
            .unwrap()
        };
        let corpus =
            EmbeddingCorpus::new(single(Modality::Image), single(Modality::Audio)).unwrap();
        let mut rng = GenomeRng::new(5);

        assert_eq!(
            rng.snap(&corpus, Modality::Audio, &[9.0, 9.0], 1.0).unwrap(),
            0
        );
    }
}
