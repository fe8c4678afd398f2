// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Temperature-scaled categorical sampling.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use thiserror::Error;

use crate::codec::Token;

/// Added to every probability before taking its log
const EPSILON: f64 = 1e-9;

/// Sampling errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SamplerError {
    /// No probabilities to draw from
    #[error("empty distribution")]
    EmptyDistribution,
    /// More entries than a token can index
    #[error("distribution has {0} entries, tokens index at most 256")]
    TooManyTokens(usize),
    /// Negative, NaN or infinite probability
    #[error("invalid probability {value} at index {index}")]
    InvalidProbability { index: usize, value: f32 },
    /// Temperature must be positive and finite
    #[error("temperature must be positive, got {0}")]
    InvalidTemperature(f64),
}

/// Draw one token from `distribution` sharpened or flattened by `temperature`.
///
/// Weights are `exp(ln(p + 1e-9) / temperature)`, shifted by the largest
/// log-weight first so low temperatures cannot overflow.
pub fn sample<R: Rng + ?Sized>(distribution: &[f32], temperature: f64, rng: &mut R) -> Result<Token, SamplerError> {
    if distribution.is_empty() {
        return Err(SamplerError::EmptyDistribution);
    }
    if distribution.len() > Token::MAX as usize + 1 {
        return Err(SamplerError::TooManyTokens(distribution.len()));
    }
    if !(temperature > 0.0 && temperature.is_finite()) {
        return Err(SamplerError::InvalidTemperature(temperature));
    }

    let mut logits = Vec::with_capacity(distribution.len());
    for (index, &p) in distribution.iter().enumerate() {
        if !p.is_finite() || p < 0.0 {
            return Err(SamplerError::InvalidProbability { index, value: p });
        }
        logits.push((p as f64 + EPSILON).ln() / temperature);
    }

    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let weights: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();

    // The largest weight is exactly 1.0, so construction cannot fail
    let index = match WeightedIndex::new(&weights) {
        Ok(dist) => dist.sample(rng),
        Err(_) => argmax(&weights),
    };
    Ok(index as Token)
}

/// Index of the largest value (first on ties)
pub fn argmax<T: PartialOrd + Copy>(values: &[T]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_low_temperature_picks_argmax() {
        let mut rng = StdRng::seed_from_u64(1);
        let dist = [0.1, 0.2, 0.4, 0.3];
        for _ in 0..1000 {
            assert_eq!(sample(&dist, 0.01, &mut rng).unwrap(), 2);
        }
    }

    #[test]
    fn test_uniform_at_unit_temperature() {
        let mut rng = StdRng::seed_from_u64(42);
        let dist = [0.25f32; 4];
        let draws = 40_000;
        let mut counts = [0usize; 4];
        for _ in 0..draws {
            counts[sample(&dist, 1.0, &mut rng).unwrap() as usize] += 1;
        }
        for count in counts {
            let freq = count as f64 / draws as f64;
            assert!((freq - 0.25).abs() < 0.02, "frequency {} too far from uniform", freq);
        }
    }

    #[test]
    fn test_high_temperature_flattens() {
        let mut rng = StdRng::seed_from_u64(3);
        let dist = [0.9, 0.1];
        let draws = 20_000;
        let minority = (0..draws)
            .filter(|_| sample(&dist, 100.0, &mut rng).unwrap() == 1)
            .count();
        let freq = minority as f64 / draws as f64;
        // Near 0.5 at high temperature, against 0.1 at T = 1
        assert!(freq > 0.4, "minority frequency {}", freq);
    }

    #[test]
    fn test_zero_probability_still_reachable_only_by_epsilon() {
        let mut rng = StdRng::seed_from_u64(5);
        let dist = [0.0, 1.0];
        for _ in 0..1000 {
            assert_eq!(sample(&dist, 1.0, &mut rng).unwrap(), 1);
        }
    }

    #[test]
    fn test_seeded_draws_repeat() {
        let dist = [0.2, 0.3, 0.1, 0.4];
        let draw = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..50).map(|_| sample(&dist, 1.0, &mut rng).unwrap()).collect::<Vec<_>>()
        };
        assert_eq!(draw(9), draw(9));
    }

    #[test]
    fn test_invalid_inputs() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(sample(&[], 1.0, &mut rng), Err(SamplerError::EmptyDistribution));
        assert_eq!(sample(&[1.0], 0.0, &mut rng), Err(SamplerError::InvalidTemperature(0.0)));
        assert!(matches!(
            sample(&[0.5, f32::NAN], 1.0, &mut rng),
            Err(SamplerError::InvalidProbability { index: 1, .. })
        ));
        assert!(matches!(
            sample(&[-0.1, 1.1], 1.0, &mut rng),
            Err(SamplerError::InvalidProbability { index: 0, .. })
        ));
        assert_eq!(sample(&vec![0.0; 300], 1.0, &mut rng), Err(SamplerError::TooManyTokens(300)));
    }

    #[test]
    fn test_argmax_first_on_ties() {
        assert_eq!(argmax(&[1, 3, 3, 2]), 1);
        assert_eq!(argmax(&[0.5]), 0);
    }
}
