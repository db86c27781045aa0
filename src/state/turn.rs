//! Turn state machine.
//!
//! Tracks the coarse phase of the current turn and gates input. The server
//! dictates every edge except leaving `Animating`, which only an animation
//! completion may do.
//!
//! # State Diagram
//!
//! ```text
//!   server: ROLLING      server: MOVING       animation started
//! ┌─────────┐ ───────────────▶ ┌────────┐ ─────────────────▶ ┌───────────┐
//! │ Rolling │                  │ Moving │                    │ Animating │
//! └─────────┘ ◀─────────────── └────────┘                    └─────┬─────┘
//!      ▲                                                           │
//!      └──────────── animation completed (resume server phase) ────┘
//!
//!   any phase ── server: GAMEOVER ──▶ ┌──────────┐
//!                                     │ GameOver │ (absorbing)
//!                                     └──────────┘
//! ```

use std::fmt;

use super::snapshot::TurnState;

/// Local turn phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TurnPhase {
    /// Die is live for the current actor
    #[default]
    Rolling,
    /// Legal-move markers are live
    Moving,
    /// A move is being shown; no board input
    Animating,
    /// Terminal
    GameOver,
}

impl TurnPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rolling => "rolling",
            Self::Moving => "moving",
            Self::Animating => "animating",
            Self::GameOver => "game_over",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::GameOver)
    }
}

impl From<TurnState> for TurnPhase {
    fn from(state: TurnState) -> Self {
        match state {
            TurnState::Rolling => Self::Rolling,
            TurnState::Moving => Self::Moving,
            TurnState::GameOver => Self::GameOver,
        }
    }
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Turn transition events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnEvent {
    /// `turnState` of the newest snapshot
    Server(TurnState),
    AnimationStarted,
    AnimationCompleted,
}

/// Error when a turn transition is invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: TurnPhase,
    pub event: TurnEvent,
    pub reason: &'static str,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid transition from {} via {:?}: {}",
            self.from, self.event, self.reason
        )
    }
}

impl std::error::Error for InvalidTransition {}

/// Turn state machine.
#[derive(Debug, Clone, Default)]
pub struct TurnMachine {
    phase: TurnPhase,
    /// Latest server phase, resumed when an animation completes
    resume: Option<TurnState>,
}

impl TurnMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// Phase the machine will take once the running animation completes.
    pub fn resume_phase(&self) -> TurnPhase {
        self.resume.map(TurnPhase::from).unwrap_or_default()
    }

    /// Apply an event, returning the new state or an error.
    pub fn apply(&self, event: TurnEvent) -> Result<Self, InvalidTransition> {
        let mut next = self.clone();
        next.apply_mut(event)?;
        Ok(next)
    }

    /// Apply an event in place, returning error if invalid.
    pub fn apply_mut(&mut self, event: TurnEvent) -> Result<(), InvalidTransition> {
        self.phase = self.transition(&event)?;
        if let TurnEvent::Server(state) = event {
            self.resume = Some(state);
        }
        Ok(())
    }

    fn transition(&self, event: &TurnEvent) -> Result<TurnPhase, InvalidTransition> {
        use TurnEvent::*;
        use TurnPhase::*;

        let invalid = |reason: &'static str| InvalidTransition {
            from: self.phase,
            event: *event,
            reason,
        };

        match (self.phase, event) {
            (GameOver, _) => Err(invalid("Game is over")),

            // Game over wins from anywhere, even mid-animation
            (_, Server(TurnState::GameOver)) => Ok(GameOver),

            // Held until the animation completes
            (Animating, Server(_)) => Ok(Animating),
            (_, Server(state)) => Ok(TurnPhase::from(*state)),

            (Animating, AnimationStarted) => Err(invalid("Already animating")),
            (_, AnimationStarted) => Ok(Animating),

            (Animating, AnimationCompleted) => Ok(self.resume_phase()),
            (_, AnimationCompleted) => Err(invalid("No animation in progress")),
        }
    }

    pub fn is_animating(&self) -> bool {
        self.phase == TurnPhase::Animating
    }

    pub fn is_game_over(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Die accepts taps.
    pub fn can_roll(&self) -> bool {
        self.phase == TurnPhase::Rolling
    }

    /// Tokens accept taps.
    pub fn can_move(&self) -> bool {
        self.phase == TurnPhase::Moving
    }
}
