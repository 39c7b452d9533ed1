//! Simulation settings
//!
//! Every tunable of the throw, settle, and scheduling pipeline. Hosts may
//! persist these as JSON; missing fields fall back to defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::SettingsError;

/// Simulation quality levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SimQuality {
    Fast,
    #[default]
    Balanced,
    Precise,
}

impl SimQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimQuality::Fast => "Fast",
            SimQuality::Balanced => "Balanced",
            SimQuality::Precise => "Precise",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "fast" | "low" => Some(SimQuality::Fast),
            "balanced" | "medium" => Some(SimQuality::Balanced),
            "precise" | "high" => Some(SimQuality::Precise),
            _ => None,
        }
    }

    /// Fixed physics step for this level
    pub fn fixed_step(&self) -> f32 {
        match self {
            SimQuality::Fast => 1.0 / 30.0,
            SimQuality::Balanced => SIM_DT,
            SimQuality::Precise => 1.0 / 120.0,
        }
    }

    /// Debounce ticks covering the same wall time at this level's step
    pub fn debounce_ticks(&self) -> u64 {
        let window = SETTLE_DEBOUNCE_TICKS as f32 * SIM_DT;
        (window / self.fixed_step()).ceil() as u64
    }
}

/// Simulation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub quality: SimQuality,

    // === Scheduling ===
    /// Fixed physics step (seconds)
    pub fixed_step: f32,
    /// Frame gaps above this are treated as a stall (seconds)
    pub stall_secs: f32,
    /// Step by real elapsed time when no results are forced
    pub adaptive_timestep: bool,

    // === Settling ===
    /// Per-axis velocity threshold for a resting die
    pub settle_epsilon: f32,
    /// Ticks a die must stay under the threshold
    pub settle_debounce_ticks: u64,
    /// Simulated time after which a throw is finished regardless
    pub settle_ceiling_secs: f32,

    // === World ===
    pub gravity_z: f32,
    pub desk_half_width: f32,
    pub desk_half_height: f32,
    /// Barrier planes as a fraction of the desk half-extents
    pub barrier_fraction: f32,
    pub dice_scale: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,

    // === Throw ===
    /// Width of the random deviation cone (radians)
    pub throw_cone: f32,
    pub start_height_min: f32,
    pub start_height_span: f32,
    pub start_fraction: f32,
    pub spin_jitter: f32,
    pub drop_speed: f32,

    /// Forced throws use freshly generated vectors for the visible run
    /// instead of replaying the pre-simulated ones. Label shifts are still
    /// applied, but the dice no longer follow the pre-simulated path, so
    /// exact landing on the forced values is not guaranteed.
    pub rerandomize_forced_throw: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            quality: SimQuality::Balanced,

            fixed_step: SIM_DT,
            stall_secs: STALL_SECS,
            adaptive_timestep: true,

            settle_epsilon: SETTLE_EPSILON,
            settle_debounce_ticks: SETTLE_DEBOUNCE_TICKS,
            settle_ceiling_secs: SETTLE_CEILING_SECS,

            gravity_z: GRAVITY_Z,
            desk_half_width: DESK_HALF_WIDTH,
            desk_half_height: DESK_HALF_HEIGHT,
            barrier_fraction: BARRIER_FRACTION,
            dice_scale: DICE_SCALE,
            linear_damping: LINEAR_DAMPING,
            angular_damping: ANGULAR_DAMPING,

            throw_cone: THROW_CONE,
            start_height_min: START_HEIGHT_MIN,
            start_height_span: START_HEIGHT_SPAN,
            start_fraction: START_FRACTION,
            spin_jitter: SPIN_JITTER,
            drop_speed: THROW_DROP_SPEED,

            rerandomize_forced_throw: false,
        }
    }
}

impl Settings {
    /// Create settings from a quality preset (applies preset defaults)
    pub fn from_preset(preset: SimQuality) -> Self {
        let mut settings = Self::default();
        settings.apply_preset(preset);
        settings
    }

    /// Apply a quality preset (updates step-dependent settings)
    pub fn apply_preset(&mut self, preset: SimQuality) {
        self.quality = preset;
        self.fixed_step = preset.fixed_step();
        self.settle_debounce_ticks = preset.debounce_ticks();
    }

    /// Parse and validate settings
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the scheduler cannot run with: non-finite numbers and
    /// non-positive step, ceiling, or dice scale
    pub fn validate(&self) -> Result<(), SettingsError> {
        let fields = [
            ("fixed_step", self.fixed_step),
            ("stall_secs", self.stall_secs),
            ("settle_epsilon", self.settle_epsilon),
            ("settle_ceiling_secs", self.settle_ceiling_secs),
            ("gravity_z", self.gravity_z),
            ("desk_half_width", self.desk_half_width),
            ("desk_half_height", self.desk_half_height),
            ("barrier_fraction", self.barrier_fraction),
            ("dice_scale", self.dice_scale),
            ("linear_damping", self.linear_damping),
            ("angular_damping", self.angular_damping),
            ("throw_cone", self.throw_cone),
            ("start_height_min", self.start_height_min),
            ("start_height_span", self.start_height_span),
            ("start_fraction", self.start_fraction),
            ("spin_jitter", self.spin_jitter),
            ("drop_speed", self.drop_speed),
        ];
        if let Some(&(field, value)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(SettingsError::Invalid { field, value });
        }

        let positive = [
            ("fixed_step", self.fixed_step),
            ("settle_ceiling_secs", self.settle_ceiling_secs),
            ("dice_scale", self.dice_scale),
        ];
        match positive.iter().find(|(_, v)| *v <= 0.0) {
            Some(&(field, value)) => Err(SettingsError::Invalid { field, value }),
            None => Ok(()),
        }
    }

    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load settings from a JSON file, falling back to defaults when the file
    /// is missing
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(json) => {
                let settings = Self::from_json(&json)?;
                log::info!("Loaded settings from {}", path.display());
                Ok(settings)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::info!("Using default settings");
                Ok(Self::default())
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        std::fs::write(path.as_ref(), self.to_json()?)?;
        log::info!("Settings saved");
        Ok(())
    }
}
