//! Population of cars sharing one track, evolved generation by generation.

use crate::car::{Car, CarState};
use crate::config::Config;
use crate::evolution::{by_score_desc, EvolutionEngine};
use crate::neural::Controller;
use crate::track::Track;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::sync::Arc;

/// A fixed-size generation of cars
pub struct Population {
    // Shared, read-only while a generation runs
    track: Arc<Track>,

    // Cars of the current generation
    cars: Vec<Car>,
    size: usize,

    // State
    generation: u32,
    pcts: Vec<f64>,

    // Configuration
    config: Config,
    engine: EvolutionEngine,

    // Random number generator (seeded for reproducibility)
    rng: ChaCha8Rng,
    seed: u64,
}

impl Population {
    /// Create a population of `config.evolution.population_size` random controllers
    pub fn new(track: Arc<Track>, config: Config) -> Self {
        let seed = rand::thread_rng().gen();
        Self::new_with_seed(track, config, seed)
    }

    /// Create a population with a specific seed for reproducibility
    pub fn new_with_seed(track: Arc<Track>, config: Config, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let size = config.evolution.population_size;
        let n_inputs = config.n_inputs();

        let controllers: Vec<Controller> = (0..size)
            .map(|_| Controller::random(n_inputs, config.neural.n_hidden, config.neural.n_outputs, &mut rng))
            .collect();

        Self::assemble(track, config, controllers, 0, rng, seed)
    }

    /// Restore a population from saved controllers
    ///
    /// The population size follows the number of controllers given.
    pub fn from_controllers(
        track: Arc<Track>,
        config: Config,
        controllers: Vec<Controller>,
        generation: u32,
        seed: u64,
    ) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(u64::from(generation)));
        Self::assemble(track, config, controllers, generation, rng, seed)
    }

    fn assemble(
        track: Arc<Track>,
        config: Config,
        controllers: Vec<Controller>,
        generation: u32,
        rng: ChaCha8Rng,
        seed: u64,
    ) -> Self {
        if track.len() < 2 {
            log::warn!("Population created on a degenerate track with {} points", track.len());
        }

        let cars: Vec<Car> = controllers
            .into_iter()
            .map(|controller| Car::new(&track, controller, &config))
            .collect();

        Self {
            size: cars.len(),
            cars,
            track,
            generation,
            pcts: Vec::new(),
            engine: EvolutionEngine::from_config(&config),
            config,
            rng,
            seed,
        }
    }

    /// Advance every car by one tick
    ///
    /// Cars only read the shared track, so they tick in parallel; the call
    /// returns once every car has finished.
    pub fn tick_all(&mut self) {
        let track = &*self.track;
        let config = &self.config;
        self.cars.par_iter_mut().for_each(|car| car.tick(track, config));
    }

    /// Finalize fitness of every car (goal bonuses)
    pub fn evaluate_fitness(&mut self) {
        for car in &mut self.cars {
            car.finalize_fitness(&self.config.scoring);
        }
    }

    /// Replace the cars with the next generation
    ///
    /// Cars are ranked by a stable descending sort, so equal scores keep
    /// their previous relative order.
    pub fn select_and_breed(&mut self) {
        self.sort_by_score();

        let ranked: Vec<(f64, &Controller)> = self.cars.iter().map(|c| (c.score(), c.controller())).collect();
        let offspring = self.engine.breed(&ranked, self.size, &mut self.rng);

        let cars: Vec<Car> = offspring
            .controllers
            .into_iter()
            .map(|controller| Car::new(&self.track, controller, &self.config))
            .collect();

        self.cars = cars;
        self.pcts = offspring.shares;
        self.generation += 1;

        log::debug!("Generation {} created with {} cars", self.generation, self.cars.len());
    }

    /// Sort cars best first (stable)
    pub fn sort_by_score(&mut self) {
        self.cars.sort_by(|a, b| by_score_desc(a.score(), b.score()));
    }

    /// True when every car has crashed
    pub fn all_done(&self) -> bool {
        self.cars.iter().all(|car| car.state() == CarState::Crashed)
    }

    /// Cars of the current generation
    #[inline]
    pub fn cars(&self) -> &[Car] {
        &self.cars
    }

    /// Highest-scoring car; ties go to the earlier car
    pub fn best(&self) -> Option<&Car> {
        self.cars
            .iter()
            .reduce(|best, car| if by_score_desc(best.score(), car.score()).is_gt() { car } else { best })
    }

    /// Offspring share percentages from the last breeding, best parent first
    #[inline]
    pub fn pcts(&self) -> &[f64] {
        &self.pcts
    }

    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn track(&self) -> &Arc<Track> {
        &self.track
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get seed for reproducibility
    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Clone every controller, in car order
    pub fn controllers(&self) -> Vec<Controller> {
        self.cars.iter().map(|c| c.controller().clone()).collect()
    }
}
