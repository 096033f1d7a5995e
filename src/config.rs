//! Configuration system for NEURODRIVE runs.
//!
//! Supports YAML configuration files with sensible defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub track: TrackConfig,
    pub car: CarConfig,
    pub sensors: SensorConfig,
    pub scoring: ScoringConfig,
    pub neural: NeuralConfig,
    pub evolution: EvolutionConfig,
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Track band widths, all in world units
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackConfig {
    /// Full width of the drivable road
    pub road_width: f64,
    /// Width of the runoff (grass) band on each side of the road
    pub runoff_width: f64,
    /// Width of the wall band outside the runoff
    pub wall_width: f64,
    /// Diameter of the goal disc around the final centerline point
    pub goal_width: f64,
}

/// Friction coefficients for one surface type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceFriction {
    /// Fraction of forward speed lost per tick
    pub forward_resistance: f64,
    /// Fraction of lateral speed removed while sliding slowly
    pub lateral_static: f64,
    /// Fraction of lateral speed removed once the car is sliding
    pub lateral_kinetic: f64,
}

/// Car physics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarConfig {
    /// Velocity gained per tick at full throttle
    pub acceleration_rate: f64,
    /// Heading change per tick at full lock and zero speed, in degrees
    pub turn_rate: f64,
    /// Speed cap
    pub max_velocity: f64,
    /// Radius of the collision ring
    pub collision_radius: f64,
    /// Number of evenly spaced points sampled on the collision ring
    pub collision_samples: usize,
    /// Lateral speed below which static friction applies
    pub max_static_lateral: f64,
    pub road_friction: SurfaceFriction,
    pub grass_friction: SurfaceFriction,
}

/// Distance sensor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Number of rays cast per tick
    pub rays: usize,
    /// Angular sweep centered on the heading, in degrees
    pub arc: f64,
    /// Maximum ray length
    pub max_distance: f64,
    /// Distance advanced per ray march step
    pub step: f64,
}

/// What happens to the score while a car sits in a terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalScoring {
    /// Crash penalty and goal reward accrue on every tick spent crashed or parked at the goal
    EveryTick,
    /// Crash penalty is applied once on impact; parked ticks add nothing
    Once,
}

/// Scoring constants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Added every tick spent on grass (negative)
    pub grass_penalty: f64,
    /// Added on crash and scaled into the start-area progress penalty (negative)
    pub crash_penalty: f64,
    /// Progress reward multiplier once past the threshold
    pub distance_reward: f64,
    /// Added per parked tick at the goal under `TerminalScoring::EveryTick`
    pub goal_reward: f64,
    /// One-time bonus granted by fitness finalization when the goal was reached
    pub end_goal_reward: f64,
    /// Traveled fraction above which progress is rewarded instead of penalized
    pub progress_threshold: f64,
    pub terminal: TerminalScoring,
}

/// Controller topology. Input width is derived from the sensor count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeuralConfig {
    /// Number of hidden neurons
    pub n_hidden: usize,
    /// Number of output neurons (the first two drive throttle and steering)
    pub n_outputs: usize,
}

/// How the next generation is filled after proportional allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReproductionPolicy {
    /// Shortfall is filled with mutated copies of uniformly chosen non-elite cars
    ProportionalNonEliteFill,
    /// Best controller survives unmutated; shortfall is filled from the elite set
    ChampionEliteFill,
}

/// Genetic algorithm configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Number of cars per generation
    pub population_size: usize,
    /// Fraction of the sorted population kept as parents
    pub elite_fraction: f64,
    /// Lower bound on the elite set size
    pub min_elites: usize,
    /// Probability of perturbing each weight
    pub mutation_rate: f64,
    /// Perturbations are drawn from [-strength, strength]
    pub mutation_strength: f64,
    /// Added to the normalized score total before computing shares
    pub share_epsilon: f64,
    pub policy: ReproductionPolicy,
}

/// Generation pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Tick budget per generation
    pub generation_ticks: u32,
}

/// Logging and checkpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Generations between checkpoints
    pub checkpoint_interval: u32,
    /// Generations between stats snapshots
    pub stats_interval: u32,
    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            track: TrackConfig::default(),
            car: CarConfig::default(),
            sensors: SensorConfig::default(),
            scoring: ScoringConfig::default(),
            neural: NeuralConfig::default(),
            evolution: EvolutionConfig::default(),
            simulation: SimulationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            road_width: 50.0,
            runoff_width: 50.0,
            wall_width: 20.0,
            goal_width: 50.0,
        }
    }
}

impl Default for CarConfig {
    fn default() -> Self {
        Self {
            acceleration_rate: 0.2,
            turn_rate: 15.0,
            max_velocity: 20.0,
            collision_radius: 5.0,
            collision_samples: 8,
            max_static_lateral: 0.2,
            road_friction: SurfaceFriction {
                forward_resistance: 0.0,
                lateral_static: 0.8,
                lateral_kinetic: 0.4,
            },
            grass_friction: SurfaceFriction {
                forward_resistance: 0.1,
                lateral_static: 0.3,
                lateral_kinetic: 0.2,
            },
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            rays: 8,
            arc: 360.0,
            max_distance: 150.0,
            step: 1.0,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            grass_penalty: -10.0,
            crash_penalty: -20.0,
            distance_reward: 50.0,
            goal_reward: 100.0,
            end_goal_reward: 1000.0,
            progress_threshold: 0.2,
            terminal: TerminalScoring::EveryTick,
        }
    }
}

impl Default for NeuralConfig {
    fn default() -> Self {
        Self {
            n_hidden: 10,
            n_outputs: 2,
        }
    }
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 40,
            elite_fraction: 0.2,
            min_elites: 2,
            mutation_rate: 0.1,
            mutation_strength: 0.5,
            share_epsilon: 1e-6,
            policy: ReproductionPolicy::ProportionalNonEliteFill,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        // 30 seconds at 60 ticks per second
        Self {
            generation_ticks: 1800,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: 10,
            stats_interval: 1,
            log_level: "info".to_string(),
        }
    }
}

impl NeuralConfig {
    /// Extra inputs appended after the sensor readings: speed, heading, state, progress
    pub const STATE_INPUTS: usize = 4;
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Controller input width implied by the sensor configuration
    pub fn n_inputs(&self) -> usize {
        self.sensors.rays + NeuralConfig::STATE_INPUTS
    }

    /// Distance between resampled centerline points
    pub fn segment_length(&self) -> f64 {
        self.track.road_width / 4.0
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        let t = &self.track;
        if !(t.road_width > 0.0) || t.runoff_width < 0.0 || !(t.wall_width > 0.0) || t.goal_width < 0.0 {
            return Err("track widths must be positive (runoff and goal may be zero)".to_string());
        }
        if !(self.car.max_velocity > 0.0) {
            return Err("max_velocity must be > 0".to_string());
        }
        let c = &self.car;
        if !c.acceleration_rate.is_finite() || !c.turn_rate.is_finite() || !c.max_static_lateral.is_finite() {
            return Err("car acceleration_rate, turn_rate and max_static_lateral must be finite".to_string());
        }
        if !(c.collision_radius >= 0.0) || !c.collision_radius.is_finite() {
            return Err("collision_radius must be finite and >= 0".to_string());
        }
        for friction in [&c.road_friction, &c.grass_friction] {
            let coefficients = [friction.forward_resistance, friction.lateral_static, friction.lateral_kinetic];
            if !coefficients.iter().all(|k| (0.0..=1.0).contains(k)) {
                return Err("friction coefficients must be between 0 and 1".to_string());
            }
        }
        if self.car.collision_samples == 0 {
            return Err("collision_samples must be > 0".to_string());
        }
        if !(self.sensors.step > 0.0) || !(self.sensors.max_distance >= 0.0) || !self.sensors.max_distance.is_finite() {
            return Err("sensor step must be > 0 and max_distance >= 0".to_string());
        }
        let sc = &self.scoring;
        let constants = [
            sc.grass_penalty,
            sc.crash_penalty,
            sc.distance_reward,
            sc.goal_reward,
            sc.end_goal_reward,
        ];
        if !constants.iter().all(|v| v.is_finite()) {
            return Err("scoring constants must be finite".to_string());
        }
        if !(0.0..=1.0).contains(&sc.progress_threshold) {
            return Err("progress_threshold must be between 0 and 1".to_string());
        }
        if self.neural.n_hidden == 0 {
            return Err("n_hidden must be > 0".to_string());
        }
        if self.neural.n_outputs < 2 {
            return Err("n_outputs must be >= 2 (throttle and steering)".to_string());
        }
        let e = &self.evolution;
        if e.population_size == 0 {
            return Err("population_size must be > 0".to_string());
        }
        if !(0.0..=1.0).contains(&e.elite_fraction) {
            return Err("elite_fraction must be between 0 and 1".to_string());
        }
        if e.min_elites < 2 {
            return Err("min_elites must be >= 2".to_string());
        }
        if !(0.0..=1.0).contains(&e.mutation_rate) {
            return Err("mutation_rate must be between 0 and 1".to_string());
        }
        if !(e.mutation_strength >= 0.0) || !e.mutation_strength.is_finite() {
            return Err("mutation_strength must be finite and >= 0".to_string());
        }
        if !(e.share_epsilon > 0.0) {
            return Err("share_epsilon must be > 0".to_string());
        }
        if self.simulation.generation_ticks == 0 {
            return Err("generation_ticks must be > 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.n_inputs(), 12);
        assert_eq!(config.segment_length(), 12.5);
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let loaded: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.evolution.population_size, loaded.evolution.population_size);
        assert_eq!(loaded.evolution.policy, ReproductionPolicy::ProportionalNonEliteFill);
        assert_eq!(loaded.scoring.terminal, TerminalScoring::EveryTick);
    }

    #[test]
    fn test_policy_yaml_names() {
        let yaml = serde_yaml::to_string(&ReproductionPolicy::ChampionEliteFill).unwrap();
        assert_eq!(yaml.trim(), "champion_elite_fill");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        config.evolution.population_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.neural.n_outputs = 1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.evolution.elite_fraction = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.evolution.mutation_strength = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.evolution.mutation_strength = -0.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.scoring.crash_penalty = f64::INFINITY;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.scoring.progress_threshold = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.car.collision_radius = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_min_elites_below_two_rejected() {
        for min_elites in [0, 1] {
            let mut config = Config::default();
            config.evolution.min_elites = min_elites;
            assert!(config.validate().is_err(), "min_elites {} accepted", min_elites);
        }
    }

    #[test]
    fn test_nan_strength_in_yaml_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        let yaml = serde_yaml::to_string(&Config::default())
            .unwrap()
            .replace("mutation_strength: 0.5", "mutation_strength: .nan");
        assert!(yaml.contains(".nan"));
        std::fs::write(&path, yaml).unwrap();

        assert!(Config::from_file(&path).is_err());
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        let mut config = Config::default();
        config.evolution.population_size = 12;
        config.save(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.evolution.population_size, 12);
    }
}
