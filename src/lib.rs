//! # NEURODRIVE
//!
//! Neuroevolution of cars learning to drive a drawn track.
//!
//! ## Features
//!
//! - **Geometric**: road, runoff and wall zones classified from the centerline
//! - **Parallel**: every car ticks on its own Rayon task
//! - **Evolvable**: elitist selection with proportional offspring allocation
//! - **Configurable**: YAML configuration files
//! - **Reproducible**: Seeded random number generation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use neurodrive::{Config, SimulationDriver, Track, Vec2};
//!
//! let config = Config::default();
//! let track = Track::arc(Vec2::new(800.0, 450.0), Vec2::new(600.0, 300.0), 300.0, config.track.clone());
//!
//! let mut driver = SimulationDriver::new(track, config);
//! driver.run(20);
//!
//! println!("Generation: {}", driver.generation());
//! println!("Fastest finish: {:?}", driver.fastest.all_time);
//! ```
//!
//! ## Drawing a track
//!
//! ```rust
//! use neurodrive::{Track, Vec2, Zone};
//! use neurodrive::config::TrackConfig;
//!
//! let mut track = Track::new(TrackConfig::default());
//! track.add_point(Vec2::new(0.0, 0.0));
//! track.add_point(Vec2::new(200.0, 0.0));
//! track.smooth();
//!
//! assert_eq!(track.classify(&Vec2::new(50.0, 10.0)), Zone::Road);
//! ```
//!
//! ## Checkpoints
//!
//! ```rust,no_run
//! use neurodrive::{Config, SimulationDriver, Track, Vec2};
//! use neurodrive::checkpoint::Checkpoint;
//!
//! let config = Config::default();
//! let track = Track::arc(Vec2::new(400.0, 300.0), Vec2::new(300.0, 200.0), 270.0, config.track.clone());
//! let mut driver = SimulationDriver::new(track, config);
//! driver.run(10);
//!
//! let checkpoint = driver.create_checkpoint();
//! checkpoint.save("checkpoint.bin").unwrap();
//!
//! let loaded = Checkpoint::load("checkpoint.bin").unwrap();
//! let restored = SimulationDriver::from_checkpoint(loaded);
//! ```

pub mod car;
pub mod checkpoint;
pub mod config;
pub mod evolution;
pub mod grid;
pub mod neural;
pub mod population;
pub mod simulation;
pub mod stats;
pub mod track;

// Re-export main types
pub use car::{Car, CarState};
pub use config::Config;
pub use neural::Controller;
pub use population::Population;
pub use simulation::SimulationDriver;
pub use track::{Track, Vec2, Zone};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Built-in open loop used when no track file is given
pub fn demo_track(config: &Config) -> Track {
    Track::arc(
        Vec2::new(800.0, 450.0),
        Vec2::new(600.0, 300.0),
        300.0,
        config.track.clone(),
    )
}

/// Run a quick benchmark on the demo track
pub fn benchmark(generations: u32, population: usize) -> BenchmarkResult {
    use std::time::Instant;

    let mut config = Config::default();
    config.evolution.population_size = population;

    let mut driver = SimulationDriver::new_with_seed(demo_track(&config), config, 0);

    let start = Instant::now();
    let mut ticks = 0u64;
    let mut best_score = f64::NEG_INFINITY;
    driver.run_with_callback(generations, |_, stats| {
        ticks += u64::from(stats.ticks);
        best_score = best_score.max(stats.best_score);
    });
    let elapsed = start.elapsed().as_secs_f64();

    BenchmarkResult {
        generations,
        population,
        ticks,
        elapsed_secs: elapsed,
        ticks_per_second: if elapsed > 0.0 { ticks as f64 / elapsed } else { 0.0 },
        best_score,
    }
}

/// Benchmark result
#[derive(Debug, Clone)]
pub struct BenchmarkResult {
    pub generations: u32,
    pub population: usize,
    pub ticks: u64,
    pub elapsed_secs: f64,
    pub ticks_per_second: f64,
    pub best_score: f64,
}

impl std::fmt::Display for BenchmarkResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Benchmark Results ===")?;
        writeln!(f, "Generations: {}", self.generations)?;
        writeln!(f, "Population: {}", self.population)?;
        writeln!(f, "Ticks: {}", self.ticks)?;
        writeln!(f, "Time: {:.3}s", self.elapsed_secs)?;
        writeln!(f, "Speed: {:.1} ticks/s", self.ticks_per_second)?;
        writeln!(f, "Best score: {:.1}", self.best_score)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_demo_track_is_ready() {
        let track = demo_track(&Config::default());
        assert_eq!(track.state(), crate::track::TrackState::Ready);
        assert!(track.length() > 1000.0);
    }

    #[test]
    fn test_benchmark() {
        let result = benchmark(1, 4);

        assert_eq!(result.generations, 1);
        assert!(result.ticks > 0);
        assert!(result.best_score.is_finite());
    }
}
