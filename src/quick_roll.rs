//! Physics-free rolls
//!
//! Uniform integer rolls for hosts that want a number without animating a
//! throw, plus a histogram helper for checking fairness.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::dice::DieType;
use crate::notation::Notation;

/// One physics-free roll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DieRoll {
    /// Number of sides
    pub d: u32,
    pub result: i32,
    pub modifier: i32,
}

impl DieRoll {
    pub fn total(&self) -> i32 {
        self.result + self.modifier
    }
}

/// Roll a `sides`-sided die uniformly in `1..=sides`. A zero-sided die
/// always rolls 0.
pub fn roll_die<R: Rng>(rng: &mut R, sides: u32, modifier: i32) -> DieRoll {
    let result = if sides == 0 {
        0
    } else {
        rng.random_range(1..=sides) as i32
    };
    DieRoll {
        d: sides,
        result,
        modifier,
    }
}

/// Roll `die` uniformly over its face range. The result is externally
/// visible, so a d10 shows 0-9 and a d100 shows tens.
pub fn roll_face<R: Rng>(rng: &mut R, die: DieType) -> i32 {
    let range = die.face_range();
    die.to_external_value(rng.random_range(range.lo..=range.hi))
}

/// Roll every die of `notation` without physics, in die order. Forced results
/// are reported as given; the other dice roll uniformly.
pub fn roll_notation<R: Rng>(rng: &mut R, notation: &Notation) -> Vec<i32> {
    notation
        .dice()
        .into_iter()
        .zip(notation.forced_results())
        .map(|(die, forced)| match forced {
            Some(face) => die.to_external_value(face),
            None => roll_face(rng, die),
        })
        .collect()
}

/// Histogram of `count` rolls of a `sides`-sided die
pub fn roll_distribution<R: Rng>(rng: &mut R, sides: u32, count: u32) -> BTreeMap<i32, u32> {
    let mut histogram = BTreeMap::new();
    for _ in 0..count {
        *histogram.entry(roll_die(rng, sides, 0).result).or_insert(0) += 1;
    }
    log::debug!("Rolled d{} {} times: {:?}", sides, count, histogram);
    histogram
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn test_roll_in_range() {
        let mut rng = Pcg32::seed_from_u64(5);
        for _ in 0..1000 {
            let roll = roll_die(&mut rng, 20, 3);
            assert!((1..=20).contains(&roll.result));
            assert_eq!(roll.total(), roll.result + 3);
        }
    }

    #[test]
    fn test_zero_sided() {
        let mut rng = Pcg32::seed_from_u64(5);
        assert_eq!(roll_die(&mut rng, 0, 2).total(), 2);
    }

    #[test]
    fn test_roll_face_uses_face_range() {
        let mut rng = Pcg32::seed_from_u64(8);
        let mut d10 = BTreeMap::new();
        let mut d100 = BTreeMap::new();
        for _ in 0..2000 {
            *d10.entry(roll_face(&mut rng, DieType::D10)).or_insert(0) += 1;
            *d100.entry(roll_face(&mut rng, DieType::D100)).or_insert(0) += 1;
        }
        assert_eq!(d10.keys().copied().collect::<Vec<_>>(), (0..=9).collect::<Vec<_>>());
        assert_eq!(
            d100.keys().copied().collect::<Vec<_>>(),
            (0..=9).map(|t| t * 10).collect::<Vec<_>>()
        );

        for _ in 0..200 {
            assert!((1..=20).contains(&roll_face(&mut rng, DieType::D20)));
        }
    }

    #[test]
    fn test_roll_notation_honours_forced_results() {
        let mut rng = Pcg32::seed_from_u64(9);
        let notation = Notation::parse("2d6@3 + d100@70 + d10@0 + d6@9 + bogus");
        for _ in 0..100 {
            let values = roll_notation(&mut rng, &notation);
            assert_eq!(values.len(), 5);
            assert_eq!(values[0], 3);
            assert!((1..=6).contains(&values[1]));
            assert_eq!(&values[2..4], &[70, 0]);
            // Out-of-range forced value rolls normally
            assert!((1..=6).contains(&values[4]));
        }
        assert!(roll_notation(&mut rng, &Notation::parse("")).is_empty());
    }

    #[test]
    fn test_distribution_roughly_uniform() {
        let mut rng = Pcg32::seed_from_u64(20);
        let histogram = roll_distribution(&mut rng, 20, 100_000);
        assert_eq!(histogram.len(), 20);
        assert_eq!(histogram.values().sum::<u32>(), 100_000);
        for (&face, &n) in &histogram {
            assert!((4000..6000).contains(&n), "face {} rolled {} times", face, n);
        }
    }
}
