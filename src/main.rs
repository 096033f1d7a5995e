//! NEURODRIVE - CLI Entry Point
//!
//! Evolves car controllers on a drawn track.

use clap::{Parser, Subcommand};
use neurodrive::checkpoint::{Checkpoint, CheckpointManager, FINAL_CHECKPOINT};
use neurodrive::stats::GenerationStats;
use neurodrive::{benchmark, demo_track, Config, SimulationDriver, Track};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Checkpoints kept in the output directory
const MAX_CHECKPOINTS: usize = 10;

#[derive(Parser)]
#[command(name = "neurodrive")]
#[command(version)]
#[command(about = "Neuroevolution of cars learning to drive a drawn track")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a new simulation
    Run {
        /// Configuration file (YAML)
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,

        /// Track file (JSON list of [x, y] points); the demo loop is used when omitted
        #[arg(short, long)]
        track: Option<PathBuf>,

        /// Number of generations to evolve
        #[arg(short, long, default_value = "50")]
        generations: u32,

        /// Output directory for checkpoints
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Random seed for reproducibility
        #[arg(long)]
        seed: Option<u64>,

        /// Quiet mode (minimal output)
        #[arg(short, long)]
        quiet: bool,
    },

    /// Resume simulation from checkpoint
    Resume {
        /// Checkpoint file to resume from
        #[arg(short, long)]
        checkpoint: PathBuf,

        /// Number of additional generations
        #[arg(short, long, default_value = "50")]
        generations: u32,

        /// Output directory
        #[arg(short, long, default_value = "output")]
        output: PathBuf,
    },

    /// Run performance benchmark
    Benchmark {
        /// Number of generations
        #[arg(short, long, default_value = "3")]
        generations: u32,

        /// Population size
        #[arg(short, long, default_value = "40")]
        population: usize,
    },

    /// Generate default configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "config.yaml")]
        output: PathBuf,

        /// Also write the demo track as JSON
        #[arg(long)]
        track: Option<PathBuf>,
    },

    /// Analyze a checkpoint file
    Analyze {
        /// Checkpoint file
        checkpoint: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            track,
            generations,
            output,
            seed,
            quiet,
        } => run_simulation(config, track, generations, output, seed, quiet),

        Commands::Resume {
            checkpoint,
            generations,
            output,
        } => resume_simulation(checkpoint, generations, output),

        Commands::Benchmark {
            generations,
            population,
        } => run_benchmark(generations, population),

        Commands::Init { output, track } => generate_config(output, track),

        Commands::Analyze { checkpoint } => analyze_checkpoint(checkpoint),
    }
}

/// Cap log verbosity at the configured level
fn apply_log_level(config: &Config) {
    match config.logging.log_level.parse::<log::LevelFilter>() {
        Ok(level) => log::set_max_level(level.min(log::max_level())),
        Err(_) => log::warn!("Unknown log level {:?}, keeping default", config.logging.log_level),
    }
}

fn run_simulation(
    config_path: PathBuf,
    track_path: Option<PathBuf>,
    generations: u32,
    output: PathBuf,
    seed: Option<u64>,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    // Load or create config
    let config = if config_path.exists() {
        println!("Loading config from: {:?}", config_path);
        Config::from_file(&config_path)?
    } else {
        println!("Using default configuration");
        Config::default()
    };
    apply_log_level(&config);

    let track = match &track_path {
        Some(path) => {
            println!("Loading track from: {:?}", path);
            Track::from_file(path, config.track.clone())?
        }
        None => {
            println!("Using demo track");
            demo_track(&config)
        }
    };

    std::fs::create_dir_all(&output)?;

    let mut driver = if let Some(s) = seed {
        println!("Using seed: {}", s);
        SimulationDriver::new_with_seed(track, config.clone(), s)
    } else {
        SimulationDriver::new(track, config.clone())
    };

    println!("Starting simulation");
    println!("  Population: {}", config.evolution.population_size);
    println!("  Track length: {:.0}", driver.track().length());
    println!("  Ticks per generation: {}", config.simulation.generation_ticks);
    println!("  Generations: {}", generations);
    println!();

    evolve(&mut driver, generations, &output, quiet)?;

    let final_path = output.join(FINAL_CHECKPOINT);
    driver.create_checkpoint().save(&final_path)?;
    println!("Final checkpoint: {:?}", final_path);

    save_stats(&driver, &output)?;

    Ok(())
}

fn resume_simulation(
    checkpoint_path: PathBuf,
    generations: u32,
    output: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Loading checkpoint: {:?}", checkpoint_path);

    let checkpoint = Checkpoint::load(&checkpoint_path)?;
    apply_log_level(&checkpoint.config);
    let mut driver = SimulationDriver::from_checkpoint(checkpoint);

    println!("Resumed at generation {}", driver.generation());
    println!("Population: {}", driver.population.size());
    println!("Running {} additional generations", generations);
    println!();

    std::fs::create_dir_all(&output)?;
    evolve(&mut driver, generations, &output, false)?;
    save_stats(&driver, &output)?;

    Ok(())
}

/// Run generations, printing summaries and saving periodic checkpoints
fn evolve(
    driver: &mut SimulationDriver,
    generations: u32,
    output: &Path,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut checkpoint_mgr = CheckpointManager::new(
        output.to_string_lossy().to_string(),
        driver.config.logging.checkpoint_interval,
        MAX_CHECKPOINTS,
    );

    let start = Instant::now();
    let mut ticks = 0u64;
    let mut last: Option<GenerationStats> = None;

    driver.run_with_callback(generations, |driver, stats| {
        ticks += u64::from(stats.ticks);
        if !quiet {
            println!("{}", stats.summary());
        }

        if checkpoint_mgr.should_save(driver.generation()) {
            match checkpoint_mgr.save(&driver.create_checkpoint()) {
                Ok(path) => {
                    if !quiet {
                        println!("  Checkpoint saved: {}", path);
                    }
                }
                Err(e) => eprintln!("  Checkpoint error: {}", e),
            }
        }
        last = Some(stats.clone());
    });

    let elapsed = start.elapsed().as_secs_f64();

    println!();
    println!("=== Simulation Complete ===");
    println!("Time: {:.2}s", elapsed);
    println!("Generation: {}", driver.generation());
    if elapsed > 0.0 {
        println!("Speed: {:.1} ticks/s", ticks as f64 / elapsed);
    }
    if let Some(stats) = last {
        println!("Last generation: best {:.1}, {} at goal", stats.best_score, stats.goals);
    }
    match driver.fastest.all_time {
        Some(t) => println!("Fastest finish: {} ticks", t),
        None => println!("Fastest finish: none yet"),
    }

    Ok(())
}

fn save_stats(driver: &SimulationDriver, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let stats_path = output.join("stats_history.json");
    let stats_str = stats_path
        .to_str()
        .ok_or_else(|| format!("Non UTF-8 output path: {:?}", stats_path))?;
    driver.stats_history.save(stats_str)?;
    println!("Stats history: {:?}", stats_path);
    Ok(())
}

fn run_benchmark(generations: u32, population: usize) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== NEURODRIVE Benchmark ===");
    println!("Generations: {}", generations);
    println!("Population: {}", population);
    println!();

    let result = benchmark(generations, population);
    println!("{}", result);

    Ok(())
}

fn generate_config(output: PathBuf, track: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    config.save(&output)?;
    println!("Configuration saved to: {:?}", output);

    if let Some(path) = track {
        demo_track(&config).save_points(&path)?;
        println!("Demo track saved to: {:?}", path);
    }
    Ok(())
}

fn analyze_checkpoint(checkpoint_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Checkpoint Analysis ===");
    println!("File: {:?}", checkpoint_path);
    println!();

    let checkpoint = Checkpoint::load(&checkpoint_path)?;

    println!("Generation: {}", checkpoint.generation);
    println!("Population: {}", checkpoint.controllers.len());
    println!("Seed: {}", checkpoint.random_seed);
    println!(
        "Track: {} samples, length {:.0}",
        checkpoint.track.len(),
        checkpoint.track.length()
    );
    match checkpoint.fastest_all_time {
        Some(t) => println!("Fastest finish: {} ticks", t),
        None => println!("Fastest finish: none"),
    }

    if let Some(first) = checkpoint.controllers.first() {
        println!();
        println!(
            "Controller: {} inputs, {} hidden, {} outputs ({} weights)",
            first.n_inputs(),
            first.n_hidden(),
            first.n_outputs(),
            first.parameter_count()
        );

        let weights: Vec<f64> = checkpoint
            .controllers
            .iter()
            .flat_map(|c| c.w1.iter().chain(c.w2.iter()).copied())
            .collect();
        if !weights.is_empty() {
            let mean_abs = weights.iter().map(|w| w.abs()).sum::<f64>() / weights.len() as f64;
            let max_abs = weights.iter().fold(0.0f64, |m, w| m.max(w.abs()));
            println!("Mean |weight|: {:.3}", mean_abs);
            println!("Max |weight|: {:.3}", max_abs);
        }
    }

    println!();
    println!(
        "Checkpoint size: {:.2} MB",
        checkpoint.size_bytes() as f64 / 1_000_000.0
    );

    Ok(())
}
