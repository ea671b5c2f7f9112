//! Meme evolution CLI - Rate image and audio pairings in the terminal.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use meme_evo::{
    compute::{
        EmbeddingCorpus, Modality,
        evolution::{EvolutionEngine, save_result},
    },
    console::ConsoleRater,
    schema::EvolutionConfig,
};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.get(1).is_some_and(|a| a == "--example") {
        print_example_config();
        return;
    }

    if args.get(1).is_some_and(|a| a == "--help" || a == "-h") {
        print_usage(&args[0]);
        return;
    }

    // Load configuration
    let config: EvolutionConfig = match args.get(1) {
        Some(path) => {
            let config_str = fs::read_to_string(path).unwrap_or_else(|e| {
                eprintln!("Error reading config file: {}", e);
                std::process::exit(1);
            });
            serde_json::from_str(&config_str).unwrap_or_else(|e| {
                eprintln!("Error parsing config: {}", e);
                std::process::exit(1);
            })
        }
        None => EvolutionConfig::default(),
    };
    let output_path = args.get(2).map(PathBuf::from);

    let corpus = EmbeddingCorpus::load(
        &config.assets.image_embeddings,
        &config.assets.audio_embeddings,
    )
    .unwrap_or_else(|e| {
        eprintln!("Error loading embeddings: {}", e);
        std::process::exit(1);
    });

    println!("Meme Evolution");
    println!("==============");
    println!(
        "Corpus: {} images, {} audio clips",
        corpus.table(Modality::Image).len(),
        corpus.table(Modality::Audio).len()
    );
    println!(
        "Population: {}, generations: {}",
        config.population_size, config.generation_count
    );
    println!();

    let mut engine = EvolutionEngine::new(config.clone(), Arc::new(corpus)).unwrap_or_else(|e| {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    });

    let mut rater = ConsoleRater::stdio();
    let result = engine
        .run_with_callback(&mut rater, |progress| {
            if let Some(average) = progress.average_fitness {
                println!(
                    "Generation {}/{}: average {:.2}, mutation rate {:.2}",
                    progress.generation, progress.total_generations, average, progress.mutation_rate
                );
            }
        })
        .unwrap_or_else(|e| {
            eprintln!("Evolution failed: {}", e);
            std::process::exit(1);
        });

    println!();
    println!("=== TOP {} ===", result.leaderboard.len());
    for (i, entry) in result.leaderboard.iter().enumerate() {
        println!(
            "{}. {} + {} - score {:.2}",
            i + 1,
            entry.image,
            entry.audio,
            entry.score
        );
    }

    if let Some(summary) = &result.summary {
        println!();
        println!("=== FITNESS HISTORY ===");
        println!("Best: {:.2}", summary.best);
        println!("Mean: {:.2}", summary.mean);
        println!("Worst: {:.2}", summary.worst);
    }

    println!();
    println!(
        "Generations: {}, ratings: {}, cache hits: {} ({:.1}s)",
        result.stats.generations,
        result.stats.ratings_requested,
        result.stats.cache_hits,
        result.stats.elapsed_seconds
    );

    if let Some(path) = output_path {
        match save_result(&path, &config, &result) {
            Ok(saved) => println!("Saved result to {}", saved.display()),
            Err(e) => {
                eprintln!("Error saving result: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} [config.json] [output.json]", program);
    eprintln!();
    eprintln!("Evolve image and audio pairings from your ratings.");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  config.json  Path to evolution configuration (default settings if omitted)");
    eprintln!("  output.json  File or directory to save the run result to");
    eprintln!();
    eprintln!("Example configuration is generated with --example flag.");
}

fn print_example_config() {
    match serde_json::to_string_pretty(&EvolutionConfig::default()) {
        Ok(json) => {
            println!("Example configuration (config.json):");
            println!("{}", json);
        }
        Err(e) => eprintln!("Error serializing config: {}", e),
    }
}
