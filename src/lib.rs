//! Dice Tray - dice notation and deterministic outcome resolution
//!
//! Core modules:
//! - `notation`: Dice notation grammar (parse/stringify)
//! - `dice`: Die catalogue (types, face ranges, mass/inertia tables)
//! - `sim`: Throw vectors, settle detection, outcome resolution, scheduling
//! - `gesture`: Swipe/button input to throw strength
//! - `settings`: Tunable simulation configuration
//! - `quick_roll`: Physics-free rolls

pub mod dice;
pub mod error;
pub mod gesture;
pub mod notation;
pub mod quick_roll;
pub mod settings;
pub mod sim;

pub use dice::{DieType, FaceRange};
pub use error::{NotationError, PhysicsError, ResolveError, SettingsError};
pub use gesture::Gesture;
pub use notation::{Notation, RollTerm};
pub use settings::{Settings, SimQuality};

use glam::Vec2;

/// Simulation configuration constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Frame gaps longer than this are treated as a stall and replaced by one step
    pub const STALL_SECS: f32 = 3.0;
    /// Hard ceiling on simulated time for one throw
    pub const SETTLE_CEILING_SECS: f32 = 10.0;

    /// Velocity threshold under which a die counts as resting (all axes)
    pub const SETTLE_EPSILON: f32 = 6.0;
    /// Ticks a die must stay under the threshold before it is stopped
    pub const SETTLE_DEBOUNCE_TICKS: u64 = 3;

    /// Gravity along z (scaled to desk units)
    pub const GRAVITY_Z: f32 = -9.8 * 800.0;

    /// Desk half-extents
    pub const DESK_HALF_WIDTH: f32 = 500.0;
    pub const DESK_HALF_HEIGHT: f32 = 300.0;
    /// Barrier planes sit at this fraction of the desk half-extents
    pub const BARRIER_FRACTION: f32 = 0.93;

    /// Base dice size
    pub const DICE_SCALE: f32 = 50.0;

    /// Total width of the random deviation cone applied to a throw direction (36°)
    pub const THROW_CONE: f32 = std::f32::consts::PI / 5.0;
    /// Replacement for an exact-zero direction component
    pub const AXIS_EPSILON: f32 = 0.01;
    /// Initial downward velocity of a thrown die
    pub const THROW_DROP_SPEED: f32 = -10.0;
    /// Dice start between these heights above the desk
    pub const START_HEIGHT_MIN: f32 = 200.0;
    pub const START_HEIGHT_SPAN: f32 = 200.0;
    /// Dice start at this fraction of the desk half-extents
    pub const START_FRACTION: f32 = 0.9;
    /// Extra spin randomness scale
    pub const SPIN_JITTER: f32 = 5.0;

    /// Body damping
    pub const LINEAR_DAMPING: f32 = 0.1;
    pub const ANGULAR_DAMPING: f32 = 0.1;
}

/// Rotate a 2D vector by `angle` radians
#[inline]
pub fn rotate_vec2(v: Vec2, angle: f32) -> Vec2 {
    let (sin, cos) = angle.sin_cos();
    Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

/// Wrap `value` into the inclusive range `[lo, hi]` by whole range widths
#[inline]
pub fn wrap_inclusive(mut value: i32, lo: i32, hi: i32) -> i32 {
    let width = hi - lo + 1;
    while value > hi {
        value -= width;
    }
    while value < lo {
        value += width;
    }
    value
}
