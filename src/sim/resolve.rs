//! Outcome resolution
//!
//! Reading a settled die means finding the labelled face whose rotated normal
//! is closest to the up reference. Forcing a value never steers the physics:
//! a headless run learns which face lands up, then the die's labels are
//! rotated so that face carries the required value.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::body::{BodyState, PhysicsWorld};
use super::geometry::DieGeometry;
use super::scheduler::DieInstance;
use super::settle::SettleDetector;
use crate::dice::DieType;
use crate::error::{PhysicsError, ResolveError};
use crate::wrap_inclusive;

/// Reference direction a die's value is read against.
///
/// d4 labels its corners, so its value comes from the face resting on the desk.
pub fn up_reference(die: DieType) -> Vec3 {
    match die {
        DieType::D4 => Vec3::NEG_Z,
        _ => Vec3::Z,
    }
}

/// Internal face value showing on a die with the given orientation
pub fn read_face(geometry: &DieGeometry, orientation: Quat) -> Result<i32, ResolveError> {
    let reference = up_reference(geometry.die);
    let mut closest: Option<(f32, i32)> = None;

    for face in geometry.labelled_faces() {
        let angle = (orientation * face.normal).angle_between(reference);
        if angle < closest.map_or(std::f32::consts::TAU, |(a, _)| a) {
            closest = Some((angle, face.material - 1));
        }
    }

    closest
        .map(|(_, value)| value)
        .ok_or(ResolveError::NoFaceFound { die: geometry.die })
}

/// Externally visible value (d100 reads in tens)
pub fn read_value(geometry: &DieGeometry, orientation: Quat) -> Result<i32, ResolveError> {
    read_face(geometry, orientation).map(|face| geometry.die.to_external_value(face))
}

/// Constant label shift for one die, wrapping inside its face range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeMap {
    pub die: DieType,
    pub offset: i32,
}

impl OutcomeMap {
    /// Map that makes the face showing `natural` display `forced` instead.
    /// Both are internal face values; an out-of-range `forced` yields `None`.
    pub fn between(die: DieType, natural: i32, forced: i32) -> Option<Self> {
        if !die.face_range().contains(forced) {
            log::warn!("Ignoring forced {} result {}: outside face range", die, forced);
            return None;
        }
        Some(Self {
            die,
            offset: forced - natural,
        })
    }

    /// Label a face with value `value` carries after the shift
    pub fn remap(&self, value: i32) -> i32 {
        let range = self.die.face_range();
        wrap_inclusive(value + self.offset, range.lo, range.hi)
    }

    /// Rewrite every labelled face of `geometry`
    pub fn apply(&self, geometry: &mut DieGeometry) {
        for face in geometry.faces.iter_mut().filter(|f| !f.is_blank()) {
            face.material = self.remap(face.material - 1) + 1;
        }
    }
}

/// Current state of every die body, in slot order
pub fn body_states<W: PhysicsWorld>(
    world: &W,
    dice: &[DieInstance],
) -> Result<Vec<BodyState>, PhysicsError> {
    dice.iter()
        .map(|d| world.body(d.body).copied().ok_or(PhysicsError::UnknownBody(d.body)))
        .collect()
}

/// Internal face values of every die as the bodies currently lie
pub fn read_faces<W: PhysicsWorld>(
    world: &W,
    dice: &[DieInstance],
) -> Result<Vec<i32>, ResolveError> {
    dice.iter()
        .map(|d| {
            let state = world.body(d.body).ok_or(PhysicsError::UnknownBody(d.body))?;
            read_face(&d.geometry, state.quaternion)
        })
        .collect()
}

/// Headless pre-simulation: step at a fixed rate with no rendering until the
/// detector reports the throw finished, then read the natural face values.
///
/// Bounded by the detector's time ceiling.
pub fn emulate_throw<W: PhysicsWorld>(
    world: &mut W,
    dice: &[DieInstance],
    detector: &mut SettleDetector,
    step: f32,
) -> Result<Vec<i32>, ResolveError> {
    detector.reset(dice.len());
    let mut tick = 0u64;
    let mut sim_time = 0.0f32;

    while !detector.observe(tick, sim_time, &body_states(world, dice)?) {
        tick += 1;
        world.step(step)?;
        sim_time += step;
    }

    let faces = read_faces(world, dice)?;
    log::debug!(
        "Pre-simulation settled after {} ticks ({:.2}s): {:?}",
        tick,
        sim_time,
        faces
    );
    Ok(faces)
}
