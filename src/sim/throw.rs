//! Throw vector generation
//!
//! Turns a 2D gesture into per-die initial conditions. Pure apart from the
//! random source: no simulation happens here.

use std::f32::consts::TAU;

use glam::{Quat, Vec2, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::dice::DieType;
use crate::rotate_vec2;
use crate::settings::Settings;

/// Random initial orientation: rotation axis and angle fraction in `[0, 1)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RandomAxis {
    pub axis: Vec3,
    /// Fraction of a full turn
    pub angle: f32,
}

impl RandomAxis {
    /// Uniformly distributed rotation (Shoemake's subgroup algorithm)
    pub fn uniform<R: Rng>(rng: &mut R) -> Self {
        let (u1, u2, u3) = (rng.random::<f32>(), rng.random::<f32>(), rng.random::<f32>());
        let (a, b) = ((1.0 - u1).sqrt(), u1.sqrt());
        let (s2, c2) = (TAU * u2).sin_cos();
        let (s3, c3) = (TAU * u3).sin_cos();
        let q = Quat::from_xyzw(a * s2, a * c2, b * s3, b * c3).normalize();
        let (axis, angle) = q.to_axis_angle();
        Self {
            axis,
            angle: angle / TAU,
        }
    }

    pub fn orientation(&self) -> Quat {
        Quat::from_axis_angle(self.axis.normalize_or(Vec3::Z), self.angle * TAU)
    }
}

/// Initial kinematic state of one thrown die
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThrowVector {
    pub die: DieType,
    pub position: Vec3,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub random_axis: RandomAxis,
}

/// Deviate `direction` by a random angle inside the throw cone. Exact-zero
/// components are nudged off zero so later ratios stay finite.
pub fn deviate<R: Rng>(direction: Vec2, cone: f32, rng: &mut R) -> Vec2 {
    let angle = rng.random::<f32>() * cone - cone / 2.0;
    let mut v = rotate_vec2(direction, angle);
    if v.x == 0.0 {
        v.x = crate::consts::AXIS_EPSILON;
    }
    if v.y == 0.0 {
        v.y = crate::consts::AXIS_EPSILON;
    }
    v
}

/// Generate one throw vector per die.
///
/// `direction` is the gesture vector normalised by its length; `boost` is the
/// throw strength derived from the gesture.
pub fn generate<R: Rng>(
    dice: &[DieType],
    direction: Vec2,
    boost: f32,
    settings: &Settings,
    rng: &mut R,
) -> Vec<ThrowVector> {
    dice.iter()
        .map(|&die| {
            let vec = deviate(direction, settings.throw_cone, rng);

            // Start in the corner opposite the throw direction
            let fraction = settings.start_fraction;
            let corner = |c: f32| if c > 0.0 { -fraction } else { fraction };
            let mut position = Vec3::new(
                settings.desk_half_width * corner(vec.x),
                settings.desk_half_height * corner(vec.y),
                rng.random::<f32>() * settings.start_height_span + settings.start_height_min,
            );
            // Pull the off-axis coordinate in for diagonal throws
            let skew = (vec.x / vec.y).abs();
            if skew > 1.0 {
                position.y /= skew;
            } else {
                position.x *= skew;
            }

            let vel = deviate(direction, settings.throw_cone, rng);
            let linear_velocity = Vec3::new(vel.x * boost, vel.y * boost, settings.drop_speed);

            let inertia = die.inertia();
            let jitter = settings.spin_jitter;
            let angular_velocity = Vec3::new(
                -(rng.random::<f32>() * vec.y * jitter + inertia * vec.y),
                rng.random::<f32>() * vec.x * jitter + inertia * vec.x,
                0.0,
            );

            let random_axis = RandomAxis::uniform(rng);

            ThrowVector {
                die,
                position,
                linear_velocity,
                angular_velocity,
                random_axis,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn test_deviate_stays_in_cone() {
        let mut rng = Pcg32::seed_from_u64(7);
        let dir = Vec2::new(1.0, 0.0);
        let cone = std::f32::consts::PI / 5.0;
        for _ in 0..200 {
            let v = deviate(dir, cone, &mut rng);
            assert!(v.angle_to(dir).abs() <= cone / 2.0 + 1e-4);
            assert!(v.x != 0.0 && v.y != 0.0);
        }
    }

    #[test]
    fn test_deviate_replaces_zero_axis() {
        let mut rng = Pcg32::seed_from_u64(1);
        let v = deviate(Vec2::ZERO, 0.5, &mut rng);
        assert_eq!(v, Vec2::splat(crate::consts::AXIS_EPSILON));
    }

    #[test]
    fn test_generate_one_vector_per_die_in_order() {
        let settings = Settings::default();
        let mut rng = Pcg32::seed_from_u64(42);
        let dice = [DieType::D4, DieType::D20, DieType::D100];
        let vectors = generate(&dice, Vec2::new(0.6, 0.8), 900.0, &settings, &mut rng);

        assert_eq!(vectors.len(), 3);
        for (v, die) in vectors.iter().zip(dice) {
            assert_eq!(v.die, die);
            assert_eq!(v.linear_velocity.z, settings.drop_speed);
            // Thrown up-right, so the die starts bottom-left
            assert!(v.position.x <= 0.0 && v.position.y < 0.0);
            assert!(v.position.z >= settings.start_height_min);
            assert!(v.position.x.abs() <= settings.desk_half_width);
            assert!(v.position.y.abs() <= settings.desk_half_height);
            assert!(v.linear_velocity.x > 0.0 && v.linear_velocity.y > 0.0);
        }
    }

    #[test]
    fn test_generate_is_reproducible() {
        let settings = Settings::default();
        let dice = [DieType::D6; 3];
        let direction = Vec2::new(-1.0, 0.2);
        let a = generate(&dice, direction, 500.0, &settings, &mut Pcg32::seed_from_u64(9));
        let b = generate(&dice, direction, 500.0, &settings, &mut Pcg32::seed_from_u64(9));
        assert_eq!(a, b);
    }

    #[test]
    fn test_spin_scales_with_inertia() {
        let settings = Settings {
            spin_jitter: 0.0,
            throw_cone: 0.0,
            ..Settings::default()
        };
        let mut rng = Pcg32::seed_from_u64(3);
        let dice = [DieType::D6, DieType::D4];
        let v = generate(&dice, Vec2::new(0.0, 1.0), 100.0, &settings, &mut rng);
        assert!((v[0].angular_velocity.x + 13.0).abs() < 1e-4);
        assert!((v[1].angular_velocity.x + 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_random_orientation_covers_every_octant() {
        let mut rng = Pcg32::seed_from_u64(11);
        let mut octants = [0u32; 8];
        let mut mean = Vec3::ZERO;
        let n = 8000;
        for _ in 0..n {
            let axis = RandomAxis::uniform(&mut rng);
            assert!((0.0..=1.0).contains(&axis.angle));
            let up = axis.orientation() * Vec3::Z;
            assert!((up.length() - 1.0).abs() < 1e-4);
            mean += up;
            let octant: usize = [up.x, up.y, up.z]
                .iter()
                .enumerate()
                .map(|(bit, &c)| usize::from(c > 0.0) << bit)
                .sum();
            octants[octant] += 1;
        }
        // Each octant expects 1000
        for (i, &count) in octants.iter().enumerate() {
            assert!((800..1200).contains(&count), "octant {} hit {} times", i, count);
        }
        assert!((mean / n as f32).length() < 0.05, "mean direction {:?}", mean / n as f32);
    }
}
