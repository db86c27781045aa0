//! Client-side board state.
//!
//! - `board` - colors, positions, tokens, forward walks
//! - `geometry` - logical position → board coordinate
//! - `snapshot` - authoritative server snapshots
//! - `dice` - die presentation state machine
//! - `turn` - turn phase state machine
//! - `sequencer` - snapshot diffing and move animation
//! - `notify` - presentation listeners
//! - `config` - timings and local player
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                             ClientState                              │
//! │                                                                      │
//! │   snapshot ──┬──▶ DiceState ───────── roll sound ──┐                 │
//! │              │                                     ▼                 │
//! │              ├──▶ TurnMachine ◀──┐            ┌──────────┐           │
//! │              │      ▲            │ started /  │ Notifier │──▶ hooks  │
//! │              │      │ phase      │ completed  └──────────┘           │
//! │              │      │            │                 ▲                 │
//! │              └──▶ Sequencer ─────┘   local turn / game over          │
//! │                   (baseline, mailbox, active task)                   │
//! │                          │                                           │
//! │                          ▼                                           │
//! │                 frames ──▶ host renderer                             │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```

pub mod board;
pub mod config;
pub mod dice;
pub mod geometry;
pub mod notify;
pub mod sequencer;
pub mod snapshot;
pub mod turn;

use std::fmt;
use std::time::Instant;

use tracing::debug;

pub use board::{walk, Color, Position, Token, ARROW_SQUARES, HOME_STRETCH_LEN, TRACK_LEN};
pub use config::{AnimationMode, AnimationTiming, ClientConfig, ConfigError};
pub use dice::{DiceFace, DiceOutcome, DiceReading, DiceState};
pub use geometry::{BoardGeometry, Coord, Geometry};
pub use notify::{Notice, Notifier, Subscription};
pub use sequencer::{
    detect_move, AnimationTask, Completion, CompletionKind, Frame, PathError, Sequencer,
    SequencerEvent, TokenMove,
};
pub use snapshot::{GameSnapshot, LegalMove, MoveKind, SnapshotError, TurnState};
pub use turn::{InvalidTransition, TurnEvent, TurnMachine, TurnPhase};

/// Request for the game server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRequest {
    Roll,
    Move { token_id: String },
}

impl ClientRequest {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Roll => serde_json::json!({"type": "roll"}),
            Self::Move { token_id } => serde_json::json!({"type": "move", "token_id": token_id}),
        }
    }
}

/// Why a tap was not turned into a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputRejected {
    GameOver,
    WrongPhase(TurnPhase),
    AnimationInProgress,
    NotYourTurn,
    NotLegal(String),
}

impl fmt::Display for InputRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GameOver => write!(f, "Game is over"),
            Self::WrongPhase(phase) => write!(f, "Not allowed while {}", phase),
            Self::AnimationInProgress => write!(f, "A move is still animating"),
            Self::NotYourTurn => write!(f, "It's not your turn"),
            Self::NotLegal(token_id) => write!(f, "Token {} has no legal move", token_id),
        }
    }
}

impl std::error::Error for InputRejected {}

/// Combined client state.
///
/// Owns every state machine and routes sequencer completions into the
/// turn machine. The host feeds snapshots and clock readings and renders
/// what comes back.
#[derive(Debug)]
pub struct ClientState<G = BoardGeometry> {
    config: ClientConfig,
    turn: TurnMachine,
    dice: DiceState,
    sequencer: Sequencer<G>,
    notifier: Notifier,
    /// Newest snapshot, for turn metadata; the board is drawn from the sequencer baseline
    latest: Option<GameSnapshot>,
}

impl ClientState<BoardGeometry> {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_geometry(config, BoardGeometry::new())
    }
}

impl<G: Geometry> ClientState<G> {
    pub fn with_geometry(config: ClientConfig, geometry: G) -> Self {
        let sequencer = Sequencer::new(geometry, config.timing.clone())
            .with_arrow_marker(config.arrow_marker.clone());
        Self {
            dice: DiceState::with_roll_duration(config.timing.dice_roll()),
            turn: TurnMachine::new(),
            sequencer,
            notifier: Notifier::new(),
            latest: None,
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn phase(&self) -> TurnPhase {
        self.turn.phase()
    }

    pub fn turn(&self) -> &TurnMachine {
        &self.turn
    }

    pub fn dice(&self) -> &DiceState {
        &self.dice
    }

    pub fn sequencer(&self) -> &Sequencer<G> {
        &self.sequencer
    }

    pub fn latest(&self) -> Option<&GameSnapshot> {
        self.latest.as_ref()
    }

    pub fn subscribe<F>(&mut self, listener: F) -> Subscription
    where
        F: FnMut(&Notice) + 'static,
    {
        self.notifier.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        self.notifier.unsubscribe(subscription)
    }

    /// Parse and apply a JSON snapshot.
    pub fn handle_json(
        &mut self,
        text: &str,
        now: Instant,
    ) -> Result<Vec<SequencerEvent>, SnapshotError> {
        let snapshot = GameSnapshot::from_json(text)?;
        Ok(self.handle_snapshot(snapshot, now))
    }

    /// Apply a new authoritative snapshot.
    pub fn handle_snapshot(&mut self, snapshot: GameSnapshot, now: Instant) -> Vec<SequencerEvent> {
        // Anything overdue happened before this snapshot arrived.
        let mut events = self.tick(now);

        if let DiceOutcome::Rolled { face } = self.dice.observe(snapshot.dice_reading(), now) {
            self.notifier.publish(&Notice::DiceRolled { face });
        }

        let message_changed = !snapshot.message.is_empty()
            && self.latest.as_ref().map(|s| s.message.as_str()) != Some(snapshot.message.as_str());
        if message_changed {
            self.notifier.publish(&Notice::Message(snapshot.message.clone()));
        }

        let previous_color = self.latest.as_ref().and_then(|s| s.current_color);
        let turn_state = snapshot.turn_state;
        self.latest = Some(snapshot.clone());

        // Board first, so a move enters Animating and the server phase is
        // held until it completes.
        let reconciled = self.sequencer.reconcile(snapshot, now);
        self.route(&reconciled);
        let before = (self.turn.phase(), previous_color);
        self.apply_turn(TurnEvent::Server(turn_state), before);

        events.extend(reconciled);
        events
    }

    /// Advance timers to `now`.
    pub fn tick(&mut self, now: Instant) -> Vec<SequencerEvent> {
        self.dice.poll(now);
        let events = self.sequencer.poll(now);
        self.route(&events);
        events
    }

    /// Earliest instant at which [`tick`](Self::tick) has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.dice.next_deadline(), self.sequencer.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Tap on the die.
    ///
    /// The countdown is never consulted; the server decides whether the
    /// roll is still allowed.
    pub fn request_roll(&self) -> Result<ClientRequest, InputRejected> {
        match self.turn.phase() {
            TurnPhase::GameOver => return Err(InputRejected::GameOver),
            TurnPhase::Rolling => {}
            phase => return Err(InputRejected::WrongPhase(phase)),
        }
        if !self.is_local_turn() {
            return Err(InputRejected::NotYourTurn);
        }
        Ok(ClientRequest::Roll)
    }

    /// Tap on a token.
    pub fn request_move(&self, token_id: &str) -> Result<ClientRequest, InputRejected> {
        match self.turn.phase() {
            TurnPhase::GameOver => return Err(InputRejected::GameOver),
            TurnPhase::Animating => return Err(InputRejected::AnimationInProgress),
            TurnPhase::Moving => {}
            phase => return Err(InputRejected::WrongPhase(phase)),
        }
        if self.sequencer.is_animating() {
            return Err(InputRejected::AnimationInProgress);
        }
        if !self.is_local_turn() {
            return Err(InputRejected::NotYourTurn);
        }
        if !self.latest.as_ref().is_some_and(|s| s.is_legal(token_id)) {
            return Err(InputRejected::NotLegal(token_id.to_string()));
        }
        Ok(ClientRequest::Move {
            token_id: token_id.to_string(),
        })
    }

    /// Legal moves that can be tapped right now.
    pub fn markers(&self) -> Vec<&LegalMove> {
        let Some(latest) = &self.latest else {
            return Vec::new();
        };
        if !self.turn.can_move() || !self.is_local_turn() {
            return Vec::new();
        }
        let animating = self.sequencer.animating_token();
        latest
            .legal_moves
            .iter()
            .filter(|m| Some(m.token_id.as_str()) != animating)
            .collect()
    }

    /// Check if the local player is the current actor.
    ///
    /// Spectators never are. A snapshot without `currentColor` leaves the
    /// decision to the server.
    pub fn is_local_turn(&self) -> bool {
        let Some(local) = self.config.local_color else {
            return false;
        };
        match self.latest.as_ref().and_then(|s| s.current_color) {
            Some(current) => current == local,
            None => true,
        }
    }

    /// Seconds left on the current actor's countdown. Display only.
    pub fn countdown_remaining(&self, now: chrono::DateTime<chrono::Utc>) -> Option<i64> {
        let deadline = self.latest.as_ref()?.turn_deadline?;
        Some((deadline - now).num_seconds().max(0))
    }

    /// Tear down: cancel animation, drop listeners.
    ///
    /// The client is left as freshly constructed, so a later snapshot is
    /// adopted as a new baseline.
    pub fn shutdown(&mut self) {
        debug!(
            listeners = self.notifier.listener_count(),
            phase = self.turn.phase().as_str(),
            "client shut down"
        );
        self.sequencer.shutdown();
        self.dice.reset();
        self.notifier.clear();
        self.turn = TurnMachine::new();
        self.latest = None;
    }

    /// Render model for the board.
    pub fn view(&self) -> serde_json::Value {
        let active = self.sequencer.active();
        let tokens: Vec<serde_json::Value> = self
            .sequencer
            .baseline()
            .map(|board| {
                board
                    .tokens
                    .iter()
                    .map(|token| self.token_view(token, active))
                    .collect()
            })
            .unwrap_or_default();

        let markers: Vec<serde_json::Value> = self
            .markers()
            .into_iter()
            .map(|m| {
                let mut obj = m.to_json();
                obj["arrow"] = serde_json::json!(m.final_position.is_arrow_square());
                obj
            })
            .collect();

        serde_json::json!({
            "phase": self.turn.phase().as_str(),
            "dice": self.dice.to_json(),
            "tokens": tokens,
            "markers": markers,
            "message": self.latest.as_ref().map(|s| s.message.as_str()),
            "animating": self.sequencer.animating_token()
        })
    }

    fn token_view(&self, token: &Token, active: Option<&AnimationTask>) -> serde_json::Value {
        let mut obj = token.to_json();
        match active.filter(|task| task.token_id == token.id) {
            Some(task) => {
                let frame = task.frame();
                obj["x"] = serde_json::json!(frame.coord.x);
                obj["y"] = serde_json::json!(frame.coord.y);
                obj["scale"] = serde_json::json!(frame.scale);
                obj["opacity"] = serde_json::json!(frame.opacity);
            }
            None => {
                if let Some(coord) = self.sequencer.geometry().coord(token, token.position) {
                    obj["x"] = serde_json::json!(coord.x);
                    obj["y"] = serde_json::json!(coord.y);
                }
                obj["scale"] = serde_json::json!(1.0);
                obj["opacity"] = serde_json::json!(1.0);
            }
        }
        obj
    }

    fn route(&mut self, events: &[SequencerEvent]) {
        let mut events = events.iter().peekable();
        while let Some(event) = events.next() {
            let turn_event = match event {
                SequencerEvent::Started { .. } => TurnEvent::AnimationStarted,
                SequencerEvent::Completed(Completion {
                    kind: CompletionKind::Animated,
                    task_id,
                }) => {
                    // A deferred move chained at the same instant keeps the
                    // turn held in Animating.
                    if let Some(SequencerEvent::Started { task_id: next, .. }) = events.peek() {
                        debug!(finished = ?task_id, next, "chained animation, turn stays held");
                        events.next();
                        continue;
                    }
                    TurnEvent::AnimationCompleted
                }
                _ => continue,
            };
            let before = self.turn_marker();
            self.apply_turn(turn_event, before);
        }
    }

    fn turn_marker(&self) -> (TurnPhase, Option<Color>) {
        (
            self.turn.phase(),
            self.latest.as_ref().and_then(|s| s.current_color),
        )
    }

    fn apply_turn(&mut self, event: TurnEvent, before: (TurnPhase, Option<Color>)) {
        if let Err(err) = self.turn.apply_mut(event) {
            debug!(error = %err, "turn event ignored");
            return;
        }
        let after = self.turn_marker();
        if after == before {
            return;
        }
        match after.0 {
            TurnPhase::GameOver if before.0 != TurnPhase::GameOver => {
                self.notifier.publish(&Notice::GameOver);
            }
            TurnPhase::Rolling if self.is_local_turn() => {
                self.notifier.publish(&Notice::LocalTurn);
            }
            _ => {}
        }
    }
}
