//! Rigid body contract between the dice core and a physics world
//!
//! The core only needs per-body kinematic state, a fixed-step advance, and
//! body add/remove. Any engine can sit behind [`PhysicsWorld`].

use std::sync::Arc;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::geometry::DieGeometry;
use super::throw::ThrowVector;
use crate::dice::DieType;
use crate::error::PhysicsError;
use crate::settings::Settings;

/// Handle to a body inside a physics world
pub type BodyId = u32;

/// Kinematic state of one simulated body
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyState {
    pub position: Vec3,
    pub quaternion: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
}

impl Default for BodyState {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            quaternion: Quat::IDENTITY,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
        }
    }
}

impl BodyState {
    /// Initial condition for a thrown die
    pub fn from_throw(vector: &ThrowVector) -> Self {
        Self {
            position: vector.position,
            quaternion: vector.random_axis.orientation(),
            linear_velocity: vector.linear_velocity,
            angular_velocity: vector.angular_velocity,
        }
    }

    /// True when every linear and angular component is below `epsilon`
    #[inline]
    pub fn is_below(&self, epsilon: f32) -> bool {
        self.linear_velocity.abs().max_element() < epsilon
            && self.angular_velocity.abs().max_element() < epsilon
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite()
            && self.quaternion.is_finite()
            && self.linear_velocity.is_finite()
            && self.angular_velocity.is_finite()
    }
}

/// Everything a world needs to create a die body
#[derive(Debug, Clone)]
pub struct BodyDesc {
    pub die: DieType,
    pub mass: f32,
    pub geometry: Arc<DieGeometry>,
    pub state: BodyState,
    pub linear_damping: f32,
    pub angular_damping: f32,
}

impl BodyDesc {
    pub fn for_throw(
        vector: &ThrowVector,
        geometry: Arc<DieGeometry>,
        settings: &Settings,
    ) -> Self {
        Self {
            die: vector.die,
            mass: vector.die.mass(),
            geometry,
            state: BodyState::from_throw(vector),
            linear_damping: settings.linear_damping,
            angular_damping: settings.angular_damping,
        }
    }
}

/// Minimal rigid-body world used by the tray
pub trait PhysicsWorld {
    /// Add a body and return its handle
    fn add_body(&mut self, desc: BodyDesc) -> BodyId;

    /// Remove a body; unknown handles are an error
    fn remove_body(&mut self, id: BodyId) -> Result<(), PhysicsError>;

    fn body(&self, id: BodyId) -> Option<&BodyState>;

    fn body_mut(&mut self, id: BodyId) -> Option<&mut BodyState>;

    /// Advance the world by `dt` seconds
    fn step(&mut self, dt: f32) -> Result<(), PhysicsError>;
}

/// Position and rotation copied to the render side every tick
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl From<&BodyState> for Transform {
    fn from(state: &BodyState) -> Self {
        Self {
            position: state.position,
            rotation: state.quaternion,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_below_checks_every_axis() {
        let mut state = BodyState::default();
        assert!(state.is_below(6.0));

        state.angular_velocity = Vec3::new(0.0, -6.5, 0.0);
        assert!(!state.is_below(6.0));

        state.angular_velocity = Vec3::ZERO;
        state.linear_velocity = Vec3::new(5.9, -5.9, 5.9);
        assert!(state.is_below(6.0));
    }

    #[test]
    fn test_non_finite_detected() {
        let mut state = BodyState::default();
        assert!(state.is_finite());
        state.position.x = f32::NAN;
        assert!(!state.is_finite());
    }
}
