//! Dice presentation state machine.
//!
//! The server owns the value; this only decides what the die looks like and
//! when the roll sound should play.
//!
//! # State Diagram
//!
//! ```text
//!              new face                 roll time elapsed
//! ┌─────────┐ ─────────▶ ┌─────────┐ ───────────────────▶ ┌─────────┐
//! │ Neutral │            │ Rolling │                      │ Settled │
//! └─────────┘ ◀───────── └─────────┘ ◀─────────────────── └─────────┘
//!      ▲        null /        │          different face        │
//!      │        invalid       │                                │
//!      └──────────────────────┴────────────────────────────────┘
//!                           null / invalid
//! ```

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::config::DEFAULT_DICE_ROLL_MS;

/// Valid die faces.
pub const FACES: std::ops::RangeInclusive<i64> = 1..=6;

/// What a snapshot says about the die.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiceReading {
    /// No new information
    Unchanged,
    /// No roll yet this turn
    Cleared,
    /// Raw value from the wire, not yet validated
    Face(i64),
    /// Present but not an integer
    Malformed,
}

/// Visual state of the die.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiceFace {
    #[default]
    Neutral,
    Rolling {
        target: u8,
        settle_at: Instant,
    },
    Settled(u8),
}

impl DiceFace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Rolling { .. } => "rolling",
            Self::Settled(_) => "settled",
        }
    }

    /// The face shown, or being rolled toward.
    pub fn target(&self) -> Option<u8> {
        match self {
            Self::Neutral => None,
            Self::Rolling { target, .. } => Some(*target),
            Self::Settled(face) => Some(*face),
        }
    }
}

/// Result of feeding a reading to the die.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiceOutcome {
    /// Nothing changed
    Unchanged,
    /// A new roll started; play the roll sound
    Rolled { face: u8 },
    /// Reset to neutral
    Cleared,
    /// Unusable value, reset to neutral. `None` when it was not an integer.
    Rejected { value: Option<i64> },
}

/// Die presentation state.
#[derive(Debug, Clone)]
pub struct DiceState {
    face: DiceFace,
    roll_duration: Duration,
}

impl Default for DiceState {
    fn default() -> Self {
        Self::new()
    }
}

impl DiceState {
    pub fn new() -> Self {
        Self::with_roll_duration(Duration::from_millis(DEFAULT_DICE_ROLL_MS))
    }

    pub fn with_roll_duration(roll_duration: Duration) -> Self {
        Self {
            face: DiceFace::Neutral,
            roll_duration,
        }
    }

    pub fn face(&self) -> DiceFace {
        self.face
    }

    /// Settled face, if any.
    pub fn shown(&self) -> Option<u8> {
        match self.face {
            DiceFace::Settled(face) => Some(face),
            _ => None,
        }
    }

    pub fn is_rolling(&self) -> bool {
        matches!(self.face, DiceFace::Rolling { .. })
    }

    /// Feed the latest authoritative reading.
    pub fn observe(&mut self, reading: DiceReading, now: Instant) -> DiceOutcome {
        match reading {
            DiceReading::Unchanged => DiceOutcome::Unchanged,
            DiceReading::Cleared => {
                if self.face == DiceFace::Neutral {
                    return DiceOutcome::Unchanged;
                }
                self.face = DiceFace::Neutral;
                DiceOutcome::Cleared
            }
            DiceReading::Face(value) if !FACES.contains(&value) => {
                warn!(value, "dice value out of range, resetting die");
                self.face = DiceFace::Neutral;
                DiceOutcome::Rejected { value: Some(value) }
            }
            DiceReading::Malformed => {
                warn!("dice value is not an integer, resetting die");
                self.face = DiceFace::Neutral;
                DiceOutcome::Rejected { value: None }
            }
            DiceReading::Face(value) => {
                let face = value as u8;
                if self.face.target() == Some(face) {
                    debug!(face, "duplicate dice value ignored");
                    return DiceOutcome::Unchanged;
                }
                // Replacing the state drops any pending settle.
                self.face = DiceFace::Rolling {
                    target: face,
                    settle_at: now + self.roll_duration,
                };
                DiceOutcome::Rolled { face }
            }
        }
    }

    /// Settle the die if its roll time has elapsed. Returns the settled face.
    pub fn poll(&mut self, now: Instant) -> Option<u8> {
        match self.face {
            DiceFace::Rolling { target, settle_at } if settle_at <= now => {
                self.face = DiceFace::Settled(target);
                Some(target)
            }
            _ => None,
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match self.face {
            DiceFace::Rolling { settle_at, .. } => Some(settle_at),
            _ => None,
        }
    }

    /// Drop any roll in flight and show nothing.
    pub fn reset(&mut self) {
        self.face = DiceFace::Neutral;
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "state": self.face.as_str(),
            "face": self.face.target()
        })
    }
}
