//! JSON export of finished runs.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::schema::{EvolutionConfig, EvolutionResult};

/// Exported run format.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RunExport {
    /// Configuration the run used.
    pub config: EvolutionConfig,
    /// Leaderboard, statistics and history.
    pub result: EvolutionResult,
}

/// File name for a run inside an output directory.
pub fn export_file_name(result: &EvolutionResult) -> String {
    let best = result.leaderboard.first().map_or(0.0, |e| e.score);
    format!("run_gen{}_best{:.1}.json", result.stats.generations, best)
}

/// Save a run as pretty JSON.
///
/// If `path` is an existing directory the file is named by
/// [`export_file_name`]; otherwise `path` is the file to write and missing
/// parent directories are created.
pub fn save_result<P: AsRef<Path>>(
    path: P,
    config: &EvolutionConfig,
    result: &EvolutionResult,
) -> io::Result<PathBuf> {
    let path = path.as_ref();
    let path = if path.is_dir() {
        path.join(export_file_name(result))
    } else {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        path.to_path_buf()
    };

    let export = RunExport {
        config: config.clone(),
        result: result.clone(),
    };
    let json = serde_json::to_string_pretty(&export)?;
    fs::write(&path, json)?;

    log::info!("Saved run to {}", path.display());
    Ok(path)
}

/// Load a run export from file.
pub fn load_result<P: AsRef<Path>>(path: P) -> io::Result<RunExport> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        EvolutionHistory, EvolutionStats, GenomeKey, HistorySummary, LeaderboardEntry, StopReason,
    };

    fn test_result() -> EvolutionResult {
        let history = EvolutionHistory {
            average_fitness: vec![4.5, 5.25, 6.0],
            generation_best: Vec::new(),
            mutation_rate: vec![0.2, 0.2, 0.22],
        };
        EvolutionResult {
            leaderboard: vec![LeaderboardEntry {
                key: GenomeKey::new(3, 1),
                image: "cat.jpg".to_string(),
                audio: "laugh.wav".to_string(),
                score: 9.0,
            }],
            stats: EvolutionStats {
                generations: 3,
                ratings_requested: 25,
                cache_hits: 5,
                cached_pairs: 25,
                final_mutation_rate: 0.22,
                elapsed_seconds: 12.5,
                stop_reason: StopReason::MaxGenerations,
            },
            summary: HistorySummary::from_history(&history.average_fitness),
            history,
        }
    }

    #[test]
    fn test_save_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = test_result();

        let path = save_result(dir.path(), &EvolutionConfig::default(), &result).unwrap();

        assert_eq!(path.file_name().unwrap(), "run_gen3_best9.0.json");
        let loaded = load_result(&path).unwrap();
        assert_eq!(loaded.result.leaderboard, result.leaderboard);
        assert_eq!(loaded.result.history, result.history);
        assert_eq!(loaded.result.stats.stop_reason, StopReason::MaxGenerations);
        assert_eq!(loaded.config.population_size, 10);
    }

    #[test]
    fn test_save_to_nested_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("runs").join("latest.json");

        let path = save_result(&target, &EvolutionConfig::default(), &test_result()).unwrap();

        assert_eq!(path, target);
        assert!(target.exists());
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();

        let err = load_result(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
