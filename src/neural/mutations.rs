//! Controller weight mutations.

use super::network::Controller;
use rand::Rng;

/// Configuration for mutation operations
#[derive(Clone, Debug)]
pub struct MutationConfig {
    /// Probability of mutating each weight
    pub weight_mutation_rate: f64,
    /// Perturbations are uniform in [-strength, strength]
    pub weight_mutation_strength: f64,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            weight_mutation_rate: 0.1,
            weight_mutation_strength: Controller::DEFAULT_MUTATION_STRENGTH,
        }
    }
}

impl Controller {
    pub const DEFAULT_MUTATION_STRENGTH: f64 = 0.5;

    /// Perturb each weight with probability `rate` by a uniform step in [-0.5, 0.5]
    pub fn mutate<R: Rng + ?Sized>(&mut self, rate: f64, rng: &mut R) {
        self.mutate_weights(rate, Self::DEFAULT_MUTATION_STRENGTH, rng);
    }

    /// Apply mutations according to config
    pub fn mutate_with<R: Rng + ?Sized>(&mut self, config: &MutationConfig, rng: &mut R) {
        self.mutate_weights(config.weight_mutation_rate, config.weight_mutation_strength, rng);
    }

    /// Mutate weights with given rate and strength
    ///
    /// Weights are left unclamped and may drift outside [-1, 1] over generations.
    /// A non-finite strength leaves the weights untouched.
    pub fn mutate_weights<R: Rng + ?Sized>(&mut self, rate: f64, strength: f64, rng: &mut R) {
        if !strength.is_finite() {
            log::debug!("Ignoring mutation with non-finite strength {}", strength);
            return;
        }
        let strength = strength.abs();
        for layer in [&mut self.w1, &mut self.w2] {
            layer.mapv_inplace(|w| {
                if rng.gen::<f64>() < rate {
                    w + rng.gen_range(-strength..=strength)
                } else {
                    w
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_weight_mutation() {
        let mut rng = ChaCha8Rng::seed_from_u64(10);
        let mut net = Controller::random(12, 10, 2, &mut rng);
        let original = net.clone();

        net.mutate(1.0, &mut rng);

        let changed = net
            .w1
            .iter()
            .zip(original.w1.iter())
            .any(|(a, b)| (a - b).abs() > 1e-12);
        assert!(changed, "Weights should change after mutation");

        for (a, b) in net.w2.iter().zip(original.w2.iter()) {
            assert!((a - b).abs() <= 0.5 + 1e-12);
        }
    }

    #[test]
    fn test_zero_rate_is_identity() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut net = Controller::random(6, 4, 2, &mut rng);
        let original = net.clone();

        net.mutate(0.0, &mut rng);
        assert_eq!(net, original);
    }

    #[test]
    fn test_clone_then_mutate_leaves_original() {
        let mut rng = ChaCha8Rng::seed_from_u64(12);
        let parent = Controller::random(12, 10, 2, &mut rng);
        let snapshot = parent.to_flat();

        let mut child = parent.clone();
        for _ in 0..20 {
            child.mutate(1.0, &mut rng);
        }

        assert_eq!(parent.to_flat(), snapshot);
        assert_ne!(child.to_flat(), snapshot);
    }

    #[test]
    fn test_weights_are_not_clamped() {
        let mut rng = ChaCha8Rng::seed_from_u64(13);
        let mut net = Controller::zeros(4, 4, 2);
        let config = MutationConfig {
            weight_mutation_rate: 1.0,
            weight_mutation_strength: 10.0,
        };

        for _ in 0..50 {
            net.mutate_with(&config, &mut rng);
        }

        assert!(net.is_valid());
        assert!(net.w1.iter().chain(net.w2.iter()).any(|w| w.abs() > 1.0));
    }

    #[test]
    fn test_non_finite_strength_is_ignored() {
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        let mut net = Controller::random(4, 3, 2, &mut rng);
        let before = net.clone();

        net.mutate_weights(1.0, f64::NAN, &mut rng);
        net.mutate_weights(1.0, f64::INFINITY, &mut rng);
        assert_eq!(net, before);
    }
}
