#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Weighted random choices used by the panda's decision making.
//!
//! Every function takes the random source explicitly so callers can seed it.
//! Weights are proportional: an item with weight `w` out of a total `W` is
//! chosen with probability `w / W`. Items with weight zero are never chosen
//! unless every weight is zero, in which case the choice falls back to a
//! uniform pick over all items so a non-empty input always yields a result.

use pet_panda_core::{Activity, Vitals};
use rand::{
    distributions::{Distribution, WeightedError, WeightedIndex},
    Rng,
};

/// Constant weight given to doing nothing when the panda decides what to do.
pub const IDLE_WEIGHT: f64 = 1.0;

/// Which end of the size spectrum a shoot choice leans towards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShootPreference {
    /// Bigger shoots are more likely; used when picking something to eat.
    Tallest,
    /// Smaller shoots are more likely; used when picking something to grow.
    Shortest,
}

/// Chooses an index with probability proportional to its weight.
///
/// Returns `None` only when `weights` is empty. Negative or non-finite weights
/// count as zero.
pub fn choose_index<R>(rng: &mut R, weights: &[f64]) -> Option<usize>
where
    R: Rng + ?Sized,
{
    if weights.is_empty() {
        return None;
    }

    match WeightedIndex::new(weights.iter().map(|weight| sanitize(*weight))) {
        Ok(distribution) => Some(distribution.sample(rng)),
        Err(WeightedError::NoItem) => None,
        Err(_) => Some(rng.gen_range(0..weights.len())),
    }
}

/// Chooses one of the identifiers in `options` by weight.
pub fn pick<'a, R, T>(rng: &mut R, options: &'a [(T, f64)]) -> Option<&'a T>
where
    R: Rng + ?Sized,
{
    let weights: Vec<f64> = options.iter().map(|(_, weight)| *weight).collect();
    choose_index(rng, &weights).map(|index| &options[index].0)
}

/// Computes jittered selection weights for shoots of the given sizes.
///
/// Each size is scaled by a random factor in `[1, 2)` so the biggest shoot
/// does not always win. With [`ShootPreference::Shortest`] the weights are
/// mirrored around their maximum, which turns the largest weight into zero.
pub fn shoot_weights<R>(rng: &mut R, sizes: &[u32], preference: ShootPreference) -> Vec<f64>
where
    R: Rng + ?Sized,
{
    let jittered: Vec<f64> = sizes
        .iter()
        .map(|size| f64::from(*size) * (rng.gen::<f64>() + 1.0))
        .collect();

    match preference {
        ShootPreference::Tallest => jittered,
        ShootPreference::Shortest => {
            let max = jittered.iter().copied().fold(0.0_f64, f64::max);
            jittered.into_iter().map(|weight| max - weight).collect()
        }
    }
}

/// Chooses the index of a shoot, biased by size according to `preference`.
///
/// Returns `None` when there are no shoots to choose from.
pub fn choose_shoot<R>(rng: &mut R, sizes: &[u32], preference: ShootPreference) -> Option<usize>
where
    R: Rng + ?Sized,
{
    let weights = shoot_weights(rng, sizes, preference);
    choose_index(rng, &weights)
}

/// Decides what an idle panda does next.
///
/// Hunger, tiredness and boredom weigh eating, resting and walking; staying
/// idle always carries [`IDLE_WEIGHT`].
pub fn choose_activity<R>(rng: &mut R, vitals: Vitals) -> Activity
where
    R: Rng + ?Sized,
{
    let options = Activity::ALL.map(|activity| {
        let weight = match activity {
            Activity::Eating => f64::from(vitals.hunger),
            Activity::Resting => f64::from(vitals.tiredness),
            Activity::Walking => f64::from(vitals.boredom),
            Activity::Idle => IDLE_WEIGHT,
        };
        (activity, weight)
    });

    pick(rng, &options).copied().unwrap_or(Activity::Idle)
}

fn sanitize(weight: f64) -> f64 {
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn sanitize_clears_negative_and_non_finite_weights() {
        assert_eq!(sanitize(-3.0), 0.0);
        assert_eq!(sanitize(f64::NAN), 0.0);
        assert_eq!(sanitize(f64::INFINITY), 0.0);
        assert_eq!(sanitize(2.5), 2.5);
    }

    #[test]
    fn shortest_preference_zeroes_the_largest_weight() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let weights = shoot_weights(&mut rng, &[10, 1_000], ShootPreference::Shortest);

        assert_eq!(weights[1], 0.0);
        assert!(weights[0] > 0.0);
    }

    #[test]
    fn empty_input_yields_nothing() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        assert_eq!(choose_index(&mut rng, &[]), None);
        assert_eq!(choose_shoot(&mut rng, &[], ShootPreference::Tallest), None);
    }
}
