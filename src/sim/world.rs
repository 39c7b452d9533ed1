//! Reference physics world
//!
//! A small deterministic rigid-body integrator good enough to tumble dice
//! across a walled desk and let them come to rest flat on a face. It keeps no
//! state beyond its bodies, so two worlds fed the same bodies and steps
//! produce bit-identical trajectories.

use std::collections::BTreeMap;
use std::sync::Arc;

use glam::{Quat, Vec2, Vec3};

use super::body::{BodyDesc, BodyId, BodyState, PhysicsWorld};
use super::geometry::DieGeometry;
use crate::dice::DieType;
use crate::error::PhysicsError;
use crate::settings::Settings;

/// Vertical restitution against the desk
const DESK_RESTITUTION: f32 = 0.3;
/// Restitution against the barrier walls
const BARRIER_RESTITUTION: f32 = 0.6;
/// Restitution between dice
const DICE_RESTITUTION: f32 = 0.5;
/// Horizontal sliding friction rate while touching the desk (1/s)
const SLIDE_FRICTION: f32 = 3.0;
/// Spin decay rate while touching the desk (1/s)
const ROLL_FRICTION: f32 = 8.0;
/// Gain of the torque tipping the die onto its nearest face
const FACE_ALIGN_GAIN: f32 = 60.0;
/// Bounces slower than this many steps of gravity are absorbed
const REST_BOUNCE_STEPS: f32 = 4.0;
/// Dice collide as vertical cylinders of this fraction of their radius
const DICE_CONTACT_FRACTION: f32 = 0.85;

#[derive(Debug, Clone)]
struct TableBody {
    die: DieType,
    mass: f32,
    geometry: Arc<DieGeometry>,
    state: BodyState,
    linear_damping: f32,
    angular_damping: f32,
}

impl TableBody {
    fn contact_radius(&self) -> f32 {
        self.geometry.radius * DICE_CONTACT_FRACTION
    }

    /// Vertices in world space
    fn world_vertices(&self) -> impl Iterator<Item = Vec3> + '_ {
        let (q, p) = (self.state.quaternion, self.state.position);
        self.geometry.vertices.iter().map(move |&v| q * v + p)
    }

    /// Face normal (world space) pointing most nearly straight down
    fn lowest_face_normal(&self) -> Option<Vec3> {
        let q = self.state.quaternion;
        self.geometry
            .faces
            .iter()
            .map(|f| q * f.normal)
            .min_by(|a, b| a.z.total_cmp(&b.z))
    }
}

/// Walled desk with gravity along -z and the desk surface at z = 0
#[derive(Debug, Clone)]
pub struct TableWorld {
    bodies: BTreeMap<BodyId, TableBody>,
    next_id: BodyId,
    gravity: Vec3,
    /// Barrier half-extents
    bounds: Vec2,
}

impl TableWorld {
    pub fn new(settings: &Settings) -> Self {
        Self {
            bodies: BTreeMap::new(),
            next_id: 0,
            gravity: Vec3::new(0.0, 0.0, settings.gravity_z),
            bounds: Vec2::new(settings.desk_half_width, settings.desk_half_height)
                * settings.barrier_fraction,
        }
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    /// Barrier half-extents on x and y
    pub fn bounds(&self) -> Vec2 {
        self.bounds
    }

    fn integrate(&mut self, dt: f32) {
        let gravity = self.gravity;
        let rest_bounce = gravity.length() * dt * REST_BOUNCE_STEPS;

        for body in self.bodies.values_mut() {
            let s = &mut body.state;
            s.linear_velocity += gravity * dt;
            s.linear_velocity *= (1.0 - body.linear_damping).powf(dt);
            s.angular_velocity *= (1.0 - body.angular_damping).powf(dt);

            s.position += s.linear_velocity * dt;
            let turn = Quat::from_scaled_axis(s.angular_velocity * dt);
            s.quaternion = (turn * s.quaternion).normalize();

            desk_contact(body, dt, rest_bounce);
        }
    }

    /// Horizontal push-apart between overlapping dice
    fn collide_dice(&mut self) {
        let ids: Vec<BodyId> = self.bodies.keys().copied().collect();
        for (i, &a) in ids.iter().enumerate() {
            for &b in &ids[i + 1..] {
                let (Some(first), Some(second)) = (self.bodies.get(&a), self.bodies.get(&b)) else {
                    continue;
                };
                let delta = (second.state.position - first.state.position).truncate();
                let reach = first.contact_radius() + second.contact_radius();
                let dist = delta.length();
                if dist >= reach {
                    continue;
                }

                let normal = if dist > f32::EPSILON { delta / dist } else { Vec2::X };
                let (ma, mb) = (first.mass, second.mass);
                let inv = 1.0 / (ma + mb);
                let va = first.state.linear_velocity.truncate();
                let vb = second.state.linear_velocity.truncate();
                let closing = (vb - va).dot(normal);
                let overlap = reach - dist;

                // Separate in proportion to the other body's mass
                let push_a = -normal * overlap * mb * inv;
                let push_b = normal * overlap * ma * inv;
                let (impulse_a, impulse_b) = if closing < 0.0 {
                    let j = -(1.0 + DICE_RESTITUTION) * closing * ma * mb * inv;
                    (-normal * j / ma, normal * j / mb)
                } else {
                    (Vec2::ZERO, Vec2::ZERO)
                };

                if let Some(body) = self.bodies.get_mut(&a) {
                    body.state.position += push_a.extend(0.0);
                    body.state.linear_velocity += impulse_a.extend(0.0);
                }
                if let Some(body) = self.bodies.get_mut(&b) {
                    body.state.position += push_b.extend(0.0);
                    body.state.linear_velocity += impulse_b.extend(0.0);
                }
            }
        }
    }
}

fn desk_contact(body: &mut TableBody, dt: f32, rest_bounce: f32) {
    let lowest = body.world_vertices().map(|v| v.z).fold(f32::INFINITY, f32::min);
    if lowest >= 0.0 {
        return;
    }

    let align = body.lowest_face_normal();
    let s = &mut body.state;
    s.position.z -= lowest;
    if s.linear_velocity.z < 0.0 {
        let bounce = -s.linear_velocity.z * DESK_RESTITUTION;
        s.linear_velocity.z = if bounce < rest_bounce { 0.0 } else { bounce };
    }

    let slide = (-SLIDE_FRICTION * dt).exp();
    s.linear_velocity.x *= slide;
    s.linear_velocity.y *= slide;
    s.angular_velocity *= (-ROLL_FRICTION * dt).exp();

    if let Some(normal) = align {
        s.angular_velocity += normal.cross(Vec3::NEG_Z) * FACE_ALIGN_GAIN * dt;
    }
}

fn barrier_contact(body: &mut TableBody, bounds: Vec2) {
    let (mut min, mut max) = (Vec2::splat(f32::INFINITY), Vec2::splat(f32::NEG_INFINITY));
    for v in body.world_vertices() {
        min = min.min(v.truncate());
        max = max.max(v.truncate());
    }

    let s = &mut body.state;
    for axis in 0..2 {
        if max[axis] > bounds[axis] {
            s.position[axis] -= max[axis] - bounds[axis];
            if s.linear_velocity[axis] > 0.0 {
                s.linear_velocity[axis] *= -BARRIER_RESTITUTION;
            }
        } else if min[axis] < -bounds[axis] {
            s.position[axis] += -bounds[axis] - min[axis];
            if s.linear_velocity[axis] < 0.0 {
                s.linear_velocity[axis] *= -BARRIER_RESTITUTION;
            }
        }
    }
}

impl PhysicsWorld for TableWorld {
    fn add_body(&mut self, desc: BodyDesc) -> BodyId {
        self.next_id += 1;
        let id = self.next_id;
        log::trace!("Adding {} body {}", desc.die, id);
        self.bodies.insert(
            id,
            TableBody {
                die: desc.die,
                mass: desc.mass,
                geometry: desc.geometry,
                state: desc.state,
                linear_damping: desc.linear_damping,
                angular_damping: desc.angular_damping,
            },
        );
        id
    }

    fn remove_body(&mut self, id: BodyId) -> Result<(), PhysicsError> {
        self.bodies
            .remove(&id)
            .map(|body| log::trace!("Removed {} body {}", body.die, id))
            .ok_or(PhysicsError::UnknownBody(id))
    }

    fn body(&self, id: BodyId) -> Option<&BodyState> {
        self.bodies.get(&id).map(|b| &b.state)
    }

    fn body_mut(&mut self, id: BodyId) -> Option<&mut BodyState> {
        self.bodies.get_mut(&id).map(|b| &mut b.state)
    }

    fn step(&mut self, dt: f32) -> Result<(), PhysicsError> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(PhysicsError::Step(format!("invalid timestep {}", dt)));
        }

        self.integrate(dt);
        self.collide_dice();
        let bounds = self.bounds;
        for body in self.bodies.values_mut() {
            barrier_contact(body, bounds);
        }

        match self.bodies.iter().find(|(_, b)| !b.state.is_finite()) {
            Some((&id, _)) => Err(PhysicsError::NonFinite(id)),
            None => Ok(()),
        }
    }
}
