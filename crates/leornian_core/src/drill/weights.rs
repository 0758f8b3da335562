//! Draw weights for the drill pool.
//!
//! # Invariants
//! - Output has exactly one weight per input flag, every weight `> 0`.
//! - Weights are relative; nothing here normalizes them.
//! - Pure: randomness only enters in [`pick_weighted_index`].

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

/// Curve exponent of the default weighting.
pub const WEIGHT_POWER: f64 = 5.0;

/// Computes draw weights for a pool ordered from most to least recently
/// reviewed.
///
/// For 1-based position `x` in a pool of `N`, the default weight is
/// `p * (x/N)^(p-1)`; a promoted position gets the flatter `p * (x/N)`.
/// The last position always weighs `p` under the default curve.
pub fn generate_weights(promoted: &[bool]) -> Vec<f64> {
    let n = promoted.len() as f64;
    promoted
        .iter()
        .enumerate()
        .map(|(index, is_promoted)| {
            let position = (index + 1) as f64 / n;
            if *is_promoted {
                WEIGHT_POWER * position
            } else {
                WEIGHT_POWER * position.powf(WEIGHT_POWER - 1.0)
            }
        })
        .collect()
}

/// Draws one index with probability `weights[i] / sum(weights)`.
///
/// Returns `None` for an empty slice or weights that cannot form a
/// distribution (non-finite, negative, all zero).
pub fn pick_weighted_index<R: Rng + ?Sized>(rng: &mut R, weights: &[f64]) -> Option<usize> {
    let distribution = WeightedIndex::new(weights).ok()?;
    Some(distribution.sample(rng))
}
