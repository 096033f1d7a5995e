//! Evolution mechanics: elitist selection and proportional reproduction.

use crate::config::{Config, ReproductionPolicy};
use crate::neural::{Controller, MutationConfig};
use rand::Rng;
use std::cmp::Ordering;

/// Smallest elite set that still allows proportional allocation
pub const MIN_ELITES: usize = 2;

/// Evolution engine for managing controller genetics
#[derive(Clone, Debug)]
pub struct EvolutionEngine {
    pub mutation_config: MutationConfig,
    pub elite_fraction: f64,
    pub min_elites: usize,
    pub share_epsilon: f64,
    pub policy: ReproductionPolicy,
}

/// Controllers for the next generation plus each elite parent's share
#[derive(Clone, Debug, Default)]
pub struct Offspring {
    pub controllers: Vec<Controller>,
    /// Percentage of the next generation attributed to each elite, best first
    pub shares: Vec<f64>,
}

/// Sort key that ranks NaN below every real score
#[inline]
pub fn rank_key(score: f64) -> f64 {
    if score.is_nan() {
        f64::NEG_INFINITY
    } else {
        score
    }
}

/// Descending comparison by score, usable with stable sorts
#[inline]
pub fn by_score_desc(a: f64, b: f64) -> Ordering {
    rank_key(b).total_cmp(&rank_key(a))
}

impl EvolutionEngine {
    /// Create evolution engine from config
    pub fn from_config(config: &Config) -> Self {
        Self {
            mutation_config: MutationConfig {
                weight_mutation_rate: config.evolution.mutation_rate,
                weight_mutation_strength: config.evolution.mutation_strength,
            },
            elite_fraction: config.evolution.elite_fraction,
            min_elites: config.evolution.min_elites,
            share_epsilon: config.evolution.share_epsilon,
            policy: config.evolution.policy,
        }
    }

    /// Size of the elite set for a population of `population` cars
    ///
    /// Never below two unless the population itself is smaller.
    pub fn elite_count(&self, population: usize) -> usize {
        let by_fraction = (population as f64 * self.elite_fraction).floor() as usize;
        by_fraction.max(self.min_elites).max(MIN_ELITES).min(population)
    }

    /// Fraction of the next generation owed to each elite
    ///
    /// Scores are shifted so the weakest elite sits at zero, then divided by
    /// their sum plus `share_epsilon`, so an all-equal elite set yields zeros
    /// instead of dividing by zero.
    pub fn offspring_shares(&self, elite_scores: &[f64]) -> Vec<f64> {
        let min = elite_scores.iter().copied().fold(f64::INFINITY, f64::min);
        let normalized: Vec<f64> = elite_scores.iter().map(|&s| s - min).collect();
        let total = normalized.iter().sum::<f64>() + self.share_epsilon;
        normalized.into_iter().map(|s| s / total).collect()
    }

    /// Clone and mutate a parent controller
    pub fn child<R: Rng + ?Sized>(&self, parent: &Controller, rng: &mut R) -> Controller {
        let mut child = parent.clone();
        child.mutate_with(&self.mutation_config, rng);
        child
    }

    /// Produce exactly `size` controllers from a population ranked best first
    pub fn breed<R: Rng + ?Sized>(&self, ranked: &[(f64, &Controller)], size: usize, rng: &mut R) -> Offspring {
        if ranked.is_empty() || size == 0 {
            return Offspring::default();
        }

        let (elites, rest) = ranked.split_at(self.elite_count(ranked.len()));
        let elite_scores: Vec<f64> = elites.iter().map(|&(score, _)| score).collect();
        let shares = self.offspring_shares(&elite_scores);

        let mut controllers = Vec::with_capacity(size);

        if self.policy == ReproductionPolicy::ChampionEliteFill {
            controllers.push(elites[0].1.clone());
        }

        for (&(_, parent), &share) in elites.iter().zip(&shares) {
            let count = (share * size as f64).floor() as usize;
            for _ in 0..count {
                if controllers.len() >= size {
                    break;
                }
                controllers.push(self.child(parent, rng));
            }
        }

        let pool = match self.policy {
            ReproductionPolicy::ProportionalNonEliteFill if !rest.is_empty() => rest,
            _ => elites,
        };
        let proportional = controllers.len();
        while controllers.len() < size {
            let (_, parent) = pool[rng.gen_range(0..pool.len())];
            controllers.push(self.child(parent, rng));
        }

        log::debug!(
            "Bred {} controllers: {} elites, {} proportional, {} fill",
            controllers.len(),
            elites.len(),
            proportional,
            size - proportional
        );

        Offspring {
            controllers,
            shares: shares.into_iter().map(|s| s * 100.0).collect(),
        }
    }
}
