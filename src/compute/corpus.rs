//! Embedding corpus: fixed tables of precomputed asset embeddings.
//!
//! Each modality has one ordered table of `(identifier, vector)` rows. The
//! tables are loaded once and never mutated; genomes refer to rows by index.

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Asset modality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Image,
    Audio,
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modality::Image => f.write_str("image"),
            Modality::Audio => f.write_str("audio"),
        }
    }
}

impl FromStr for Modality {
    type Err = CorpusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(Modality::Image),
            "audio" => Ok(Modality::Audio),
            _ => Err(CorpusError::InvalidModality(s.to_string())),
        }
    }
}

/// Corpus errors.
#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("Unknown modality tag: {0:?}")]
    InvalidModality(String),
    #[error("No {modality} asset at index {index} (corpus has {len} rows)")]
    AssetResolution {
        modality: Modality,
        index: usize,
        len: usize,
    },
    #[error("{modality} vector has dimension {found}, expected {expected}")]
    DimensionMismatch {
        modality: Modality,
        expected: usize,
        found: usize,
    },
    #[error("{0} corpus has no rows")]
    EmptyCorpus(Modality),
    #[error("Line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// One corpus row.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusEntry {
    /// Asset filename.
    pub identifier: String,
    pub vector: Vec<f32>,
}

/// A ranked corpus row returned by a nearest-neighbour query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub distance: f32,
}

/// Ordered embedding table for a single modality.
#[derive(Debug, Clone)]
pub struct CorpusTable {
    modality: Modality,
    dimension: usize,
    entries: Vec<CorpusEntry>,
}

impl CorpusTable {
    /// Build a table, checking that every row shares one dimensionality.
    pub fn new(modality: Modality, entries: Vec<CorpusEntry>) -> Result<Self, CorpusError> {
        let dimension = entries
            .first()
            .map(|e| e.vector.len())
            .ok_or(CorpusError::EmptyCorpus(modality))?;

        if let Some(bad) = entries.iter().find(|e| e.vector.len() != dimension) {
            return Err(CorpusError::DimensionMismatch {
                modality,
                expected: dimension,
                found: bad.vector.len(),
            });
        }

        Ok(Self {
            modality,
            dimension,
            entries,
        })
    }

    /// Parse a CSV table: a header row, then `identifier,v0,v1,...` rows.
    pub fn from_csv_reader<R: BufRead>(modality: Modality, reader: R) -> Result<Self, CorpusError> {
        let mut entries = Vec::new();

        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            // Header row carries column names only.
            if i == 0 || line.trim().is_empty() {
                continue;
            }

            let record = split_record(&line).map_err(|message| CorpusError::Parse {
                line: i + 1,
                message,
            })?;
            let mut fields = record.into_iter();
            let identifier = fields
                .next()
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty())
                .ok_or_else(|| CorpusError::Parse {
                    line: i + 1,
                    message: "missing identifier".into(),
                })?;

            let vector = fields
                .map(|f| {
                    f.trim().parse::<f32>().map_err(|e| CorpusError::Parse {
                        line: i + 1,
                        message: format!("bad value {:?}: {}", f.trim(), e),
                    })
                })
                .collect::<Result<Vec<f32>, _>>()?;

            entries.push(CorpusEntry { identifier, vector });
        }

        Self::new(modality, entries)
    }

    /// Load a CSV table from disk.
    pub fn load<P: AsRef<Path>>(modality: Modality, path: P) -> Result<Self, CorpusError> {
        let file = File::open(path)?;
        Self::from_csv_reader(modality, BufReader::new(file))
    }

    pub fn modality(&self) -> Modality {
        self.modality
    }

    /// Length of every vector in this table.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Row at `index`.
    pub fn entry(&self, index: usize) -> Result<&CorpusEntry, CorpusError> {
        self.entries.get(index).ok_or(CorpusError::AssetResolution {
            modality: self.modality,
            index,
            len: self.entries.len(),
        })
    }

    /// Rank all rows by ascending Euclidean distance to `vector`.
    ///
    /// Ties are broken by ascending index.
    pub fn nearest_neighbors(&self, vector: &[f32]) -> Result<Vec<Neighbor>, CorpusError> {
        if vector.len() != self.dimension {
            return Err(CorpusError::DimensionMismatch {
                modality: self.modality,
                expected: self.dimension,
                found: vector.len(),
            });
        }

        let mut ranked: Vec<Neighbor> = self
            .entries
            .par_iter()
            .enumerate()
            .map(|(index, entry)| Neighbor {
                index,
                distance: euclidean(vector, &entry.vector),
            })
            .collect();

        ranked.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.index.cmp(&b.index))
        });
        Ok(ranked)
    }
}

/// Image and audio tables, shared read-only for the whole run.
#[derive(Debug, Clone)]
pub struct EmbeddingCorpus {
    image: CorpusTable,
    audio: CorpusTable,
}

impl EmbeddingCorpus {
    /// Pair an image table with an audio table.
    pub fn new(image: CorpusTable, audio: CorpusTable) -> Result<Self, CorpusError> {
        if image.modality() != Modality::Image {
            return Err(CorpusError::InvalidModality(image.modality().to_string()));
        }
        if audio.modality() != Modality::Audio {
            return Err(CorpusError::InvalidModality(audio.modality().to_string()));
        }
        Ok(Self { image, audio })
    }

    /// Load both tables from CSV files.
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(
        image_csv: P,
        audio_csv: Q,
    ) -> Result<Self, CorpusError> {
        let image = CorpusTable::load(Modality::Image, image_csv)?;
        let audio = CorpusTable::load(Modality::Audio, audio_csv)?;
        log::info!(
            "Loaded corpus: {} images (dim {}), {} audio clips (dim {})",
            image.len(),
            image.dimension(),
            audio.len(),
            audio.dimension()
        );
        Self::new(image, audio)
    }

    /// Table for a modality.
    pub fn table(&self, modality: Modality) -> &CorpusTable {
        match modality {
            Modality::Image => &self.image,
            Modality::Audio => &self.audio,
        }
    }

    /// Rank the rows of one modality by distance to `vector`.
    pub fn nearest_neighbors(
        &self,
        vector: &[f32],
        modality: Modality,
    ) -> Result<Vec<Neighbor>, CorpusError> {
        self.table(modality).nearest_neighbors(vector)
    }

    /// Same as [`nearest_neighbors`](Self::nearest_neighbors), with the
    /// modality given as a textual tag.
    pub fn nearest_neighbors_by_tag(
        &self,
        vector: &[f32],
        tag: &str,
    ) -> Result<Vec<Neighbor>, CorpusError> {
        self.nearest_neighbors(vector, tag.parse()?)
    }

    /// Identifier (filename) of a row.
    pub fn identifier(&self, modality: Modality, index: usize) -> Result<&str, CorpusError> {
        self.table(modality)
            .entry(index)
            .map(|e| e.identifier.as_str())
    }

    /// Vector of a row.
    pub fn vector(&self, modality: Modality, index: usize) -> Result<&[f32], CorpusError> {
        self.table(modality).entry(index).map(|e| e.vector.as_slice())
    }
}

/// Split one CSV record into fields.
///
/// A field may be wrapped in double quotes, in which case it can contain
/// commas and `""` stands for a literal quote.
fn split_record(line: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
        } else {
            match c {
                ',' => fields.push(std::mem::take(&mut field)),
                '"' if field.trim().is_empty() => {
                    field.clear();
                    in_quotes = true;
                }
                _ => field.push(c),
            }
        }
    }

    if in_quotes {
        return Err("unterminated quoted field".into());
    }
    fields.push(field);
    Ok(fields)
}

/// Plain Euclidean distance, no normalization.
fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Small in-memory corpus for tests.
#[cfg(test)]
pub(crate) fn test_corpus() -> EmbeddingCorpus {
    let image = CorpusTable::new(
        Modality::Image,
        (0..8)
            .map(|i| CorpusEntry {
                identifier: format!("img_{i}.png"),
                vector: (0..8).map(|d| (i * 8 + d) as f32 * 0.5 - 16.0).collect(),
            })
            .collect(),
    )
    .unwrap();
    let audio = CorpusTable::new(
        Modality::Audio,
        (0..6)
            .map(|i| CorpusEntry {
                identifier: format!("snd_{i}.mp3"),
                vector: (0..4).map(|d| (i * 4 + d) as f32 * 0.01 - 0.1).collect(),
            })
            .collect(),
    )
    .unwrap();
    EmbeddingCorpus::new(image, audio).unwrap()
}
