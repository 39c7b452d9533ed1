//! Settle detection
//!
//! Per-die state machine deciding when a throw has come to rest:
//!
//! ```text
//! Moving --(all velocity components < eps)--> PendingStop { since }
//! PendingStop --(tick - since > debounce)--> Stopped
//! PendingStop --(any component >= eps)--> Moving
//! ```
//!
//! The throw is finished when every die is stopped, or unconditionally once
//! simulated time reaches the ceiling.

use serde::{Deserialize, Serialize};

use super::body::BodyState;
use crate::settings::Settings;

/// Settle state of one die
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettleState {
    Moving,
    /// Below threshold since the given tick
    PendingStop { since: u64 },
    Stopped,
}

/// Thresholds for settle detection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SettleConfig {
    /// Velocity threshold (every axis, linear and angular)
    pub epsilon: f32,
    /// Ticks a die must stay below threshold
    pub debounce_ticks: u64,
    /// Simulated time after which the throw is finished regardless
    pub ceiling_secs: f32,
}

impl From<&Settings> for SettleConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            epsilon: settings.settle_epsilon,
            debounce_ticks: settings.settle_debounce_ticks,
            ceiling_secs: settings.settle_ceiling_secs,
        }
    }
}

/// Side table of settle states, indexed by die slot
#[derive(Debug, Clone)]
pub struct SettleDetector {
    config: SettleConfig,
    states: Vec<SettleState>,
    timed_out: bool,
}

impl SettleDetector {
    pub fn new(config: SettleConfig, dice: usize) -> Self {
        Self {
            config,
            states: vec![SettleState::Moving; dice],
            timed_out: false,
        }
    }

    /// Forget all progress and track `dice` fresh bodies
    pub fn reset(&mut self, dice: usize) {
        self.states.clear();
        self.states.resize(dice, SettleState::Moving);
        self.timed_out = false;
    }

    pub fn config(&self) -> &SettleConfig {
        &self.config
    }

    pub fn state(&self, index: usize) -> Option<SettleState> {
        self.states.get(index).copied()
    }

    pub fn states(&self) -> &[SettleState] {
        &self.states
    }

    /// Whether the last observation hit the time ceiling
    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    /// Update every die from its body state and report whether the throw is
    /// finished. `bodies` must yield one state per die slot, in slot order.
    pub fn observe<'a>(
        &mut self,
        tick: u64,
        sim_time: f32,
        bodies: impl IntoIterator<Item = &'a BodyState>,
    ) -> bool {
        if sim_time >= self.config.ceiling_secs {
            if !self.timed_out {
                log::debug!("Settle ceiling reached at {:.2}s", sim_time);
            }
            self.timed_out = true;
            return true;
        }

        let mut finished = true;
        for (state, body) in self.states.iter_mut().zip(bodies) {
            if *state == SettleState::Stopped {
                continue;
            }
            if body.is_below(self.config.epsilon) {
                match *state {
                    SettleState::PendingStop { since }
                        if tick.saturating_sub(since) > self.config.debounce_ticks =>
                    {
                        *state = SettleState::Stopped;
                        continue;
                    }
                    SettleState::PendingStop { .. } => {}
                    _ => *state = SettleState::PendingStop { since: tick },
                }
            } else {
                *state = SettleState::Moving;
            }
            finished = false;
        }
        finished
    }
}
