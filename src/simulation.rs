//! Simulation driver - generation loop over one track.

use crate::checkpoint::Checkpoint;
use crate::config::Config;
use crate::population::Population;
use crate::stats::{FastestTimes, GenerationStats, StatsHistory};
use crate::track::Track;
use rand::prelude::*;
use std::sync::Arc;

/// Owns a track and the population evolving on it
pub struct SimulationDriver {
    // Environment
    track: Arc<Track>,

    // Population
    pub population: Population,

    // State
    /// Ticks elapsed in the running generation
    pub tick: u32,

    // Configuration
    pub config: Config,

    // Statistics
    pub stats_history: StatsHistory,
    pub fastest: FastestTimes,

    seed: u64,
}

impl SimulationDriver {
    /// Create a new driver with the given configuration
    pub fn new(track: Track, config: Config) -> Self {
        let seed = rand::thread_rng().gen();
        Self::new_with_seed(track, config, seed)
    }

    /// Create a new driver with a specific seed for reproducibility
    pub fn new_with_seed(track: Track, config: Config, seed: u64) -> Self {
        let track = Arc::new(track);
        let population = Population::new_with_seed(Arc::clone(&track), config.clone(), seed);

        log::info!(
            "Simulation started: {} cars, track {:.0} units ({} samples), seed {}",
            population.size(),
            track.length(),
            track.len(),
            seed
        );

        Self {
            stats_history: StatsHistory::new(config.logging.stats_interval),
            track,
            population,
            tick: 0,
            config,
            fastest: FastestTimes::default(),
            seed,
        }
    }

    /// Restore a driver from a checkpoint
    ///
    /// The restored generation starts again from its first tick.
    pub fn from_checkpoint(checkpoint: Checkpoint) -> Self {
        let track = Arc::new(checkpoint.track);
        let population = Population::from_controllers(
            Arc::clone(&track),
            checkpoint.config.clone(),
            checkpoint.controllers,
            checkpoint.generation,
            checkpoint.random_seed,
        );

        Self {
            stats_history: StatsHistory::new(checkpoint.config.logging.stats_interval),
            track,
            population,
            tick: 0,
            config: checkpoint.config,
            fastest: FastestTimes {
                all_time: checkpoint.fastest_all_time,
                ..FastestTimes::default()
            },
            seed: checkpoint.random_seed,
        }
    }

    /// Create checkpoint of current state
    pub fn create_checkpoint(&self) -> Checkpoint {
        Checkpoint::new(
            self.population.generation(),
            self.config.clone(),
            (*self.track).clone(),
            self.population.controllers(),
            self.fastest.all_time,
            self.seed,
        )
    }

    /// Replace the track and start over from a fresh random population
    pub fn reset_track(&mut self, track: Track) {
        self.track = Arc::new(track);
        self.seed = self.seed.wrapping_add(1);
        self.population = Population::new_with_seed(Arc::clone(&self.track), self.config.clone(), self.seed);
        self.tick = 0;
        self.fastest = FastestTimes::default();
        self.stats_history = StatsHistory::new(self.config.logging.stats_interval);

        log::info!("Track replaced ({} samples), population reset", self.track.len());
    }

    /// Advance every car one tick
    ///
    /// Returns the finished generation's stats when the tick budget runs out
    /// or every car has crashed.
    pub fn step(&mut self) -> Option<GenerationStats> {
        self.population.tick_all();
        self.tick += 1;

        // Cars that reached the goal on this tick
        let finished = self
            .population
            .cars()
            .iter()
            .filter(|car| car.finish_tick() == Some(car.ticks()))
            .filter_map(|car| car.finish_tick())
            .min();
        if let Some(ticks) = finished {
            self.fastest.record(ticks);
        }

        if self.tick >= self.config.simulation.generation_ticks || self.population.all_done() {
            Some(self.end_generation())
        } else {
            None
        }
    }

    /// Finalize fitness, breed the next generation and record stats
    fn end_generation(&mut self) -> GenerationStats {
        let generation = self.population.generation();

        self.population.evaluate_fitness();
        let mut stats = GenerationStats::from_cars(generation, self.tick, self.population.cars());

        self.population.select_and_breed();
        stats.top_share = self.population.pcts().first().copied().unwrap_or(0.0);

        self.fastest.roll_over();
        self.tick = 0;

        if self.stats_history.should_record(generation) {
            self.stats_history.record(stats.clone());
        }

        log::info!("{}", stats.summary());
        stats
    }

    /// Run a single generation to completion
    pub fn run_generation(&mut self) -> GenerationStats {
        loop {
            if let Some(stats) = self.step() {
                return stats;
            }
        }
    }

    /// Run simulation for specified number of generations
    pub fn run(&mut self, generations: u32) {
        for _ in 0..generations {
            self.run_generation();
        }
    }

    /// Run simulation with callback after each generation
    pub fn run_with_callback<F>(&mut self, generations: u32, mut callback: F)
    where
        F: FnMut(&SimulationDriver, &GenerationStats),
    {
        for _ in 0..generations {
            let stats = self.run_generation();
            callback(self, &stats);
        }
    }

    #[inline]
    pub fn track(&self) -> &Track {
        &self.track
    }

    #[inline]
    pub fn generation(&self) -> u32 {
        self.population.generation()
    }

    /// Fraction of the tick budget used by the running generation
    pub fn progress(&self) -> f64 {
        let budget = self.config.simulation.generation_ticks.max(1);
        f64::from(self.tick) / f64::from(budget)
    }

    /// Get seed for reproducibility
    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackConfig;
    use crate::track::Vec2;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.evolution.population_size = 12;
        config.simulation.generation_ticks = 60;
        config
    }

    fn test_track() -> Track {
        Track::arc(Vec2::new(400.0, 300.0), Vec2::new(250.0, 180.0), 270.0, TrackConfig::default())
    }

    #[test]
    fn test_driver_creation() {
        let driver = SimulationDriver::new_with_seed(test_track(), test_config(), 1);
        assert_eq!(driver.generation(), 0);
        assert_eq!(driver.tick, 0);
        assert_eq!(driver.population.cars().len(), 12);
        assert_eq!(driver.seed(), 1);
        assert_eq!(driver.progress(), 0.0);
    }

    #[test]
    fn test_generation_ends_within_budget() {
        let mut driver = SimulationDriver::new_with_seed(test_track(), test_config(), 2);
        let stats = driver.run_generation();

        assert!(stats.ticks >= 1 && stats.ticks <= 60);
        assert_eq!(stats.generation, 0);
        assert_eq!(stats.population, 12);
        assert_eq!(driver.generation(), 1);
        assert_eq!(driver.tick, 0);
        assert_eq!(driver.stats_history.snapshots.len(), 1);
    }

    #[test]
    fn test_all_crashed_ends_generation_early() {
        // Nobody can drive on an empty track
        let mut driver = SimulationDriver::new_with_seed(Track::new(TrackConfig::default()), test_config(), 3);
        let stats = driver.step().expect("generation should end on the first tick");
        assert_eq!(stats.ticks, 1);
        assert_eq!(stats.crashed, 12);
        assert_eq!(driver.population.cars().len(), 12);
    }

    #[test]
    fn test_run_with_callback() {
        let mut driver = SimulationDriver::new_with_seed(test_track(), test_config(), 4);
        let mut seen = Vec::new();
        driver.run_with_callback(3, |d, stats| seen.push((d.generation(), stats.generation)));
        assert_eq!(seen, vec![(1, 0), (2, 1), (3, 2)]);
    }

    #[test]
    fn test_checkpoint_roundtrip() {
        let mut driver = SimulationDriver::new_with_seed(test_track(), test_config(), 5);
        driver.run(2);
        driver.fastest.all_time = Some(42);

        let restored = SimulationDriver::from_checkpoint(driver.create_checkpoint());
        assert_eq!(restored.generation(), 2);
        assert_eq!(restored.seed(), driver.seed());
        assert_eq!(restored.fastest.all_time, Some(42));
        assert_eq!(restored.population.controllers(), driver.population.controllers());
        assert_eq!(restored.track().points(), driver.track().points());
    }

    #[test]
    fn test_reset_track() {
        let mut driver = SimulationDriver::new_with_seed(test_track(), test_config(), 6);
        driver.run(1);
        driver.reset_track(Track::arc(
            Vec2::new(300.0, 300.0),
            Vec2::new(200.0, 200.0),
            180.0,
            TrackConfig::default(),
        ));
        assert_eq!(driver.generation(), 0);
        assert_eq!(driver.fastest, FastestTimes::default());
        assert!(driver.stats_history.snapshots.is_empty());
    }

    #[test]
    fn test_seeded_drivers_match() {
        let mut a = SimulationDriver::new_with_seed(test_track(), test_config(), 7);
        let mut b = SimulationDriver::new_with_seed(test_track(), test_config(), 7);
        let sa = a.run_generation();
        let sb = b.run_generation();
        assert_eq!(sa, sb);
    }
}
