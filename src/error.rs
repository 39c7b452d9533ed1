//! Error types
//!
//! Notation errors are per-term and never abort parsing; they are stored on
//! the offending `RollTerm`. The remaining errors surface from the simulation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dice::DieType;

/// Why a notation segment could not be turned into dice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotationError {
    #[error("unrecognized notation")]
    Unrecognized,
    #[error("superfluous characters")]
    SuperfluousCharacters,
    #[error("invalid dice type")]
    InvalidDiceType,
}

/// Failure reported by a physics collaborator
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PhysicsError {
    #[error("unknown body {0}")]
    UnknownBody(u32),
    #[error("non-finite state on body {0}")]
    NonFinite(u32),
    #[error("physics step failed: {0}")]
    Step(String),
}

/// Failure while resolving a throw's outcome
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    /// Geometry has no labelled face; reading it would report a wrong value
    #[error("unable to find closest face on {die}")]
    NoFaceFound { die: DieType },
    #[error(transparent)]
    Physics(#[from] PhysicsError),
}

/// Failure loading or saving settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid settings json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("settings io: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid setting {field}: {value}")]
    Invalid { field: &'static str, value: f32 },
}
