//! Statistics tracking for generations and fastest finishes.

use crate::car::{Car, CarState};
use serde::{Deserialize, Serialize};

/// Statistics snapshot taken at the end of a generation
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    /// Generation the snapshot describes
    pub generation: u32,
    /// Ticks simulated in the generation
    pub ticks: u32,
    /// Number of cars
    pub population: usize,
    /// Highest final score
    pub best_score: f64,
    /// Mean final score
    pub mean_score: f64,
    /// Lowest final score
    pub worst_score: f64,
    /// Cars that reached the goal
    pub goals: usize,
    /// Cars that crashed
    pub crashed: usize,
    /// Cars still driving when the budget ran out
    pub driving: usize,
    /// Fastest goal finish, in ticks
    pub fastest_finish: Option<u32>,
    /// Offspring share of the best parent, in percent
    pub top_share: f64,
}

impl GenerationStats {
    /// Collect stats from the cars of a finished generation
    pub fn from_cars(generation: u32, ticks: u32, cars: &[Car]) -> Self {
        let mut stats = Self {
            generation,
            ticks,
            population: cars.len(),
            ..Self::default()
        };

        if cars.is_empty() {
            return stats;
        }

        let scores = cars.iter().map(|c| c.score()).filter(|s| s.is_finite());
        stats.best_score = scores.clone().fold(f64::NEG_INFINITY, f64::max);
        stats.worst_score = scores.clone().fold(f64::INFINITY, f64::min);
        let (sum, count) = scores.fold((0.0, 0usize), |(sum, n), s| (sum + s, n + 1));
        if count == 0 {
            stats.best_score = 0.0;
            stats.worst_score = 0.0;
        } else {
            stats.mean_score = sum / count as f64;
        }

        for car in cars {
            match car.state() {
                CarState::Goal => stats.goals += 1,
                CarState::Crashed => stats.crashed += 1,
                CarState::OnRoad | CarState::OnGrass => stats.driving += 1,
            }
        }
        stats.fastest_finish = cars.iter().filter_map(|c| c.finish_tick()).min();

        stats
    }

    /// Format stats as a one-line summary
    pub fn summary(&self) -> String {
        let fastest = self
            .fastest_finish
            .map_or_else(|| "-".to_string(), |t| t.to_string());
        format!(
            "Gen:{:4} | Ticks:{:5} | Best:{:9.1} | Mean:{:9.1} | Goal:{:3} | Crash:{:3} | Fastest:{:>5} | Top:{:5.1}%",
            self.generation,
            self.ticks,
            self.best_score,
            self.mean_score,
            self.goals,
            self.crashed,
            fastest,
            self.top_share,
        )
    }
}

/// Fastest goal finishes, in ticks
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FastestTimes {
    /// Generation currently running
    pub current: Option<u32>,
    /// Generation that just finished
    pub previous: Option<u32>,
    /// Best over every generation seen
    pub all_time: Option<u32>,
}

impl FastestTimes {
    /// Record a finish in the running generation
    pub fn record(&mut self, ticks: u32) {
        self.current = Some(self.current.map_or(ticks, |c| c.min(ticks)));
        self.all_time = Some(self.all_time.map_or(ticks, |a| a.min(ticks)));
    }

    /// Close the running generation
    pub fn roll_over(&mut self) {
        self.previous = self.current.take();
    }
}

/// Historical statistics tracker
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StatsHistory {
    /// All recorded snapshots
    pub snapshots: Vec<GenerationStats>,
    /// Recording interval, in generations
    pub interval: u32,
}

impl StatsHistory {
    /// Create new history with recording interval
    pub fn new(interval: u32) -> Self {
        Self {
            snapshots: Vec::new(),
            interval: interval.max(1),
        }
    }

    /// True when `generation` falls on the recording interval
    pub fn should_record(&self, generation: u32) -> bool {
        generation % self.interval.max(1) == 0
    }

    /// Record a stats snapshot
    pub fn record(&mut self, stats: GenerationStats) {
        self.snapshots.push(stats);
    }

    pub fn latest(&self) -> Option<&GenerationStats> {
        self.snapshots.last()
    }

    /// Best score over time
    pub fn best_series(&self) -> Vec<(u32, f64)> {
        self.snapshots.iter().map(|s| (s.generation, s.best_score)).collect()
    }

    /// Mean score over time
    pub fn mean_series(&self) -> Vec<(u32, f64)> {
        self.snapshots.iter().map(|s| (s.generation, s.mean_score)).collect()
    }

    /// Goal count over time
    pub fn goal_series(&self) -> Vec<(u32, usize)> {
        self.snapshots.iter().map(|s| (s.generation, s.goals)).collect()
    }

    /// Save history to file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    /// Load history from file
    pub fn load(path: &str) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}
