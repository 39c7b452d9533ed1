//! Throw gestures
//!
//! Converts a pointer swipe (or a synthetic "roll" button press) into the
//! normalised direction and boost the throw generator consumes.

use std::time::Duration;

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::settings::Settings;

/// Swipes held longer than this count as this long
pub const MAX_SWIPE: Duration = Duration::from_millis(2000);
/// Boost falls off with swipe time relative to this window
const BOOST_WINDOW_MS: f32 = 2500.0;

/// Direction and strength of a throw
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gesture {
    /// Unit vector in desk space (y up)
    pub direction: Vec2,
    pub boost: f32,
}

impl Gesture {
    /// Shortest swipe that counts as a throw on a desk of this size
    pub fn min_distance(settings: &Settings) -> f32 {
        (settings.desk_half_width * settings.desk_half_height * 0.01).sqrt()
    }

    /// Gesture from a screen-space swipe (y down). Swipes shorter than
    /// [`Gesture::min_distance`] are ignored.
    pub fn from_swipe(delta: Vec2, held: Duration, settings: &Settings) -> Option<Self> {
        let dist = delta.length();
        if !(dist >= Self::min_distance(settings)) {
            log::debug!("Swipe of {:.1} too short to throw", dist);
            return None;
        }

        let ms = held.min(MAX_SWIPE).as_secs_f32() * 1000.0;
        let boost = ((BOOST_WINDOW_MS - ms) / BOOST_WINDOW_MS).sqrt() * dist * 2.0;
        Some(Self {
            direction: Vec2::new(delta.x / dist, -delta.y / dist),
            boost,
        })
    }

    pub fn from_points(
        start: Vec2,
        end: Vec2,
        held: Duration,
        settings: &Settings,
    ) -> Option<Self> {
        Self::from_swipe(end - start, held, settings)
    }

    /// Random throw for a "roll" button
    pub fn random<R: Rng>(rng: &mut R, settings: &Settings) -> Self {
        let mut vector = Vec2::new(
            (rng.random::<f32>() * 2.0 - 1.0) * settings.desk_half_width,
            -(rng.random::<f32>() * 2.0 - 1.0) * settings.desk_half_height,
        );
        let mut dist = vector.length();
        if dist <= f32::EPSILON {
            vector = Vec2::X;
            dist = 1.0;
        }
        let boost = (rng.random::<f32>() + 3.0) * dist;
        Self {
            direction: vector / dist,
            boost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn test_short_swipe_ignored() {
        let settings = Settings::default();
        // sqrt(500 * 300 * 0.01) ~ 38.7
        let held = Duration::from_millis(100);
        assert!(Gesture::from_swipe(Vec2::new(20.0, 20.0), held, &settings).is_none());
        assert!(Gesture::from_swipe(Vec2::new(40.0, 0.0), held, &settings).is_some());
    }

    #[test]
    fn test_swipe_flips_screen_y() {
        let settings = Settings::default();
        let g = Gesture::from_points(
            Vec2::new(100.0, 400.0),
            Vec2::new(100.0, 100.0),
            Duration::ZERO,
            &settings,
        );
        let Some(g) = g else {
            panic!("swipe should throw");
        };
        assert_eq!(g.direction, Vec2::new(0.0, 1.0));
        assert!((g.boost - 600.0).abs() < 1e-3);
    }

    #[test]
    fn test_slow_swipe_clamped() {
        let settings = Settings::default();
        let delta = Vec2::new(200.0, 0.0);
        let slow = Gesture::from_swipe(delta, Duration::from_secs(2), &settings);
        let slower = Gesture::from_swipe(delta, Duration::from_secs(60), &settings);
        assert!(slow.is_some());
        assert_eq!(slow, slower);
        // sqrt(500 / 2500) * 400
        let boost = slow.map_or(0.0, |g| g.boost);
        assert!((boost - 178.885).abs() < 1e-2);
    }

    #[test]
    fn test_random_gesture_is_unit() {
        let settings = Settings::default();
        let mut rng = Pcg32::seed_from_u64(11);
        for _ in 0..100 {
            let g = Gesture::random(&mut rng, &settings);
            assert!((g.direction.length() - 1.0).abs() < 1e-4);
            assert!(g.boost >= 0.0);
        }
    }
}
