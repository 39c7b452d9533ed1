//! Die catalogue
//!
//! Fixed set of supported polyhedral dice with their displayed value ranges
//! and the physical constants used when throwing them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported die types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DieType {
    D4,
    D6,
    D8,
    D10,
    D12,
    D20,
    D100,
}

/// Inclusive range of values a die face can display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRange {
    pub lo: i32,
    pub hi: i32,
}

impl FaceRange {
    pub const fn new(lo: i32, hi: i32) -> Self {
        Self { lo, hi }
    }

    /// Number of distinct values in the range
    #[inline]
    pub fn width(&self) -> i32 {
        self.hi - self.lo + 1
    }

    #[inline]
    pub fn contains(&self, value: i32) -> bool {
        value >= self.lo && value <= self.hi
    }
}

impl DieType {
    /// All die types in declaration order
    pub const ALL: [DieType; 7] = [
        DieType::D4,
        DieType::D6,
        DieType::D8,
        DieType::D10,
        DieType::D12,
        DieType::D20,
        DieType::D100,
    ];

    /// Nominal size as written in notation ("d<size>")
    pub fn size(&self) -> u32 {
        match self {
            DieType::D4 => 4,
            DieType::D6 => 6,
            DieType::D8 => 8,
            DieType::D10 => 10,
            DieType::D12 => 12,
            DieType::D20 => 20,
            DieType::D100 => 100,
        }
    }

    /// Look up a die by its nominal size; arbitrary sizes are not dice
    pub fn from_size(size: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.size() == size)
    }

    /// Internal face range. d10 and d100 share the `[0, 9]` range; d100 faces
    /// represent tens.
    pub fn face_range(&self) -> FaceRange {
        match self {
            DieType::D4 => FaceRange::new(1, 4),
            DieType::D6 => FaceRange::new(1, 6),
            DieType::D8 => FaceRange::new(1, 8),
            DieType::D10 => FaceRange::new(0, 9),
            DieType::D12 => FaceRange::new(1, 12),
            DieType::D20 => FaceRange::new(1, 20),
            DieType::D100 => FaceRange::new(0, 9),
        }
    }

    /// Multiplier between internal face value and externally visible value
    pub fn value_scale(&self) -> i32 {
        match self {
            DieType::D100 => 10,
            _ => 1,
        }
    }

    /// Convert an externally visible value to the internal face value
    pub fn to_face_value(&self, external: i32) -> i32 {
        external / self.value_scale()
    }

    /// Convert an internal face value to the externally visible value
    pub fn to_external_value(&self, face: i32) -> i32 {
        face * self.value_scale()
    }

    /// Rigid body mass
    pub fn mass(&self) -> f32 {
        match self {
            DieType::D4 => 300.0,
            DieType::D6 => 300.0,
            DieType::D8 => 340.0,
            DieType::D10 => 350.0,
            DieType::D12 => 350.0,
            DieType::D20 => 400.0,
            DieType::D100 => 350.0,
        }
    }

    /// Spin factor applied to a throw; lighter-looking dice tumble less
    pub fn inertia(&self) -> f32 {
        match self {
            DieType::D4 => 5.0,
            DieType::D6 => 13.0,
            DieType::D8 => 10.0,
            DieType::D10 => 9.0,
            DieType::D12 => 8.0,
            DieType::D20 => 6.0,
            DieType::D100 => 9.0,
        }
    }

    /// Body radius relative to the dice scale
    pub fn radius_factor(&self) -> f32 {
        match self {
            DieType::D4 => 1.2,
            DieType::D6 => 0.9,
            DieType::D8 => 1.0,
            DieType::D10 | DieType::D100 => 0.9,
            DieType::D12 => 0.9,
            DieType::D20 => 1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DieType::D4 => "d4",
            DieType::D6 => "d6",
            DieType::D8 => "d8",
            DieType::D10 => "d10",
            DieType::D12 => "d12",
            DieType::D20 => "d20",
            DieType::D100 => "d100",
        }
    }
}

impl fmt::Display for DieType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DieType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let size = s.strip_prefix('d').ok_or(())?;
        if size.is_empty() || !size.bytes().all(|b| b.is_ascii_digit()) {
            return Err(());
        }
        size.parse().ok().and_then(Self::from_size).ok_or(())
    }
}
