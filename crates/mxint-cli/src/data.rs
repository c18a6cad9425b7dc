//! Float input generation for the harness

use clap::ValueEnum;
use mxint_core::dims::Dims;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

#[derive(ValueEnum, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Pattern {
    /// a[i] = ((i % 17) - 8) / 8, w[i] = ((i % 19) - 9) / 9
    Ramp,
    /// Uniform in [-1, 1] from a seeded generator
    Random,
}

/// Float activations (M x K) and weights (K x N), both roughly in [-1, 1]
pub struct FloatInputs {
    pub activations: Vec<f32>,
    pub weights: Vec<f32>,
}

pub fn generate(dims: &Dims, pattern: Pattern, seed: u64) -> FloatInputs {
    match pattern {
        Pattern::Ramp => FloatInputs {
            activations: (0..dims.activation_len())
                .map(|i| ((i % 17) as f32 - 8.0) / 8.0)
                .collect(),
            weights: (0..dims.weight_len()).map(|i| ((i % 19) as f32 - 9.0) / 9.0).collect(),
        },
        Pattern::Random => {
            let mut rng = StdRng::seed_from_u64(seed);
            FloatInputs {
                activations: (0..dims.activation_len())
                    .map(|_| rng.random_range(-1.0f32..=1.0))
                    .collect(),
                weights: (0..dims.weight_len()).map(|_| rng.random_range(-1.0f32..=1.0)).collect(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_pattern() {
        let dims = Dims::new(16, 16, 16).unwrap();
        let inputs = generate(&dims, Pattern::Ramp, 0);
        assert_eq!(inputs.activations.len(), 256);
        assert_eq!(inputs.activations[0], -1.0);
        assert_eq!(inputs.activations[16], 1.0);
        assert_eq!(inputs.weights[9], 0.0);
    }

    #[test]
    fn test_random_pattern_is_seeded() {
        let dims = Dims::new(16, 32, 16).unwrap();
        let a = generate(&dims, Pattern::Random, 42);
        let b = generate(&dims, Pattern::Random, 42);
        assert_eq!(a.activations, b.activations);
        assert_eq!(a.weights, b.weights);
        assert!(a.weights.iter().all(|w| (-1.0..=1.0).contains(w)));
    }
}
