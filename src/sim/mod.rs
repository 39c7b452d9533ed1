//! Deterministic dice simulation
//!
//! Everything between a gesture and a readable result lives here:
//! - Throw vectors are pure functions of the gesture and a seeded RNG
//! - Physics advances with a fixed step when results are forced
//! - Bodies are iterated in slot order so reruns reproduce exactly
//! - No rendering dependencies: hosts copy [`Transform`]s out each tick

pub mod body;
pub mod geometry;
pub mod resolve;
pub mod scheduler;
pub mod settle;
pub mod throw;
pub mod world;

pub use body::{BodyDesc, BodyId, BodyState, PhysicsWorld, Transform};
pub use geometry::{DieGeometry, Face, GeometryCache, face_label};
pub use resolve::{OutcomeMap, emulate_throw, read_face, read_value};
pub use scheduler::{DieInstance, NextTick, RollOutcome, RunToken, TickResult, Tray};
pub use settle::{SettleConfig, SettleDetector, SettleState};
pub use throw::{RandomAxis, ThrowVector};
pub use world::TableWorld;
