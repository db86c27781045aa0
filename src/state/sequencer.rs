//! Board reconciliation and animation sequencing.
//!
//! Turns "previous snapshot → new snapshot" into a single animated move and
//! reports completion exactly once per resolved diff.
//!
//! # Flow
//!
//! ```text
//!  snapshot ──▶ reconcile ──┬── task active ──▶ mailbox (latest wins)
//!                           │
//!                           └── idle ──▶ diff vs baseline
//!                                          │
//!                     ┌────────────────────┼──────────────────────┐
//!                     ▼                    ▼                      ▼
//!               nothing moved       path unmappable       token moved
//!             Completed(NoOp)     Completed(Aborted)   Started + Frame(0)
//!                                                             │ poll
//!                                                             ▼
//!                                          Frame(1) .. Frame(last), hold
//!                                                             │
//!                                                             ▼
//!                                       Completed(Animated) ──▶ drain mailbox
//! ```
//!
//! Time is explicit: the host calls [`Sequencer::poll`] at or after
//! [`Sequencer::next_deadline`]. Overdue steps are replayed from their own
//! deadlines, so a late poll yields the same frames as a punctual one.
//!
//! Only the latest deferred snapshot is kept. If two moves land while one
//! animation plays, the middle state is never shown and the next diff spans
//! both; the first moved token in snapshot order is animated.

use std::fmt;
use std::time::Instant;

use tracing::{debug, warn};

use super::board::{walk, Color, Position, Token};
use super::config::{AnimationMode, AnimationTiming};
use super::geometry::{Coord, Geometry};
use super::snapshot::GameSnapshot;

/// A detected position change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMove {
    /// Token as it appears in the new snapshot
    pub token: Token,
    pub from: Position,
    pub to: Position,
}

/// Find the token that moved between two snapshots.
///
/// Tokens knocked back to the yard snap there without animation and are
/// not candidates.
pub fn detect_move(previous: &GameSnapshot, next: &GameSnapshot) -> Option<TokenMove> {
    let mut moves = next
        .tokens
        .iter()
        .filter_map(|token| {
            let before = previous.token(&token.id)?;
            (before.position != token.position).then(|| TokenMove {
                token: token.clone(),
                from: before.position,
                to: token.position,
            })
        })
        .filter(|m| m.to != Position::Yard);

    let first = moves.next()?;
    let others = moves.count();
    if others > 0 {
        warn!(
            token = %first.token.id,
            others,
            "several tokens moved in one transition, animating the first"
        );
    }
    Some(first)
}

/// Path that holds the origin for the first half and the destination for the rest.
pub fn teleport_path(from: Coord, to: Coord, frames: usize) -> Vec<Coord> {
    let half = frames / 2;
    (0..frames).map(|i| if i < half { from } else { to }).collect()
}

/// Scale and opacity of teleport frame `step`: 1 → 0 over the first half, 0 → 1 over the second.
pub fn teleport_envelope(step: usize, frames: usize) -> f32 {
    let half = frames / 2;
    let value = if step < half {
        let span = half.saturating_sub(1).max(1) as f32;
        1.0 - step as f32 / span
    } else {
        let span = (frames - half).saturating_sub(1).max(1) as f32;
        (step - half) as f32 / span
    };
    value.clamp(0.0, 1.0)
}

/// Why a move could not be animated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// No forward walk connects the two positions
    Unreachable { from: Position, to: Position },
    /// Geometry has no coordinate for this position
    Unmapped(Position),
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable { from, to } => write!(f, "No path from {} to {}", from, to),
            Self::Unmapped(position) => write!(f, "No coordinate for {}", position),
        }
    }
}

impl std::error::Error for PathError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Stepping,
    Holding,
}

/// The one animation in flight.
#[derive(Debug, Clone)]
pub struct AnimationTask {
    pub id: u64,
    pub token_id: String,
    pub color: Color,
    /// Never shorter than two coordinates
    pub path: Vec<Coord>,
    pub current_step: usize,
    pub mode: AnimationMode,
    stage: Stage,
    due: Instant,
}

impl AnimationTask {
    pub fn last_step(&self) -> usize {
        self.path.len() - 1
    }

    pub fn is_holding(&self) -> bool {
        self.stage == Stage::Holding
    }

    /// When the task next needs a poll.
    pub fn due(&self) -> Instant {
        self.due
    }

    pub fn frame(&self) -> Frame {
        let envelope = match self.mode {
            AnimationMode::Normal => 1.0,
            AnimationMode::Teleport => teleport_envelope(self.current_step, self.path.len()),
        };
        Frame {
            task_id: self.id,
            token_id: self.token_id.clone(),
            step: self.current_step,
            coord: self.path[self.current_step],
            scale: envelope,
            opacity: envelope,
        }
    }
}

/// One rendered animation frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub task_id: u64,
    pub token_id: String,
    pub step: usize,
    pub coord: Coord,
    pub scale: f32,
    pub opacity: f32,
}

impl Frame {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "tokenId": self.token_id,
            "step": self.step,
            "x": self.coord.x,
            "y": self.coord.y,
            "scale": self.scale,
            "opacity": self.opacity
        })
    }
}

/// How a diff was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionKind {
    /// A started task played to the end
    Animated,
    /// Nothing to animate
    NoOp,
    /// Path could not be built
    Aborted,
}

/// Completion signal, one per resolved diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    /// Set only for `Animated`
    pub task_id: Option<u64>,
    pub kind: CompletionKind,
}

impl Completion {
    fn animated(task_id: u64) -> Self {
        Self {
            task_id: Some(task_id),
            kind: CompletionKind::Animated,
        }
    }

    fn no_op() -> Self {
        Self {
            task_id: None,
            kind: CompletionKind::NoOp,
        }
    }

    fn aborted() -> Self {
        Self {
            task_id: None,
            kind: CompletionKind::Aborted,
        }
    }
}

/// Sequencer output, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum SequencerEvent {
    Started {
        task_id: u64,
        token_id: String,
        mode: AnimationMode,
    },
    Frame(Frame),
    Completed(Completion),
}

/// Snapshot differ and animation driver.
#[derive(Debug)]
pub struct Sequencer<G> {
    geometry: G,
    timing: AnimationTiming,
    arrow_marker: Option<String>,
    /// Last snapshot a diff was resolved against
    baseline: Option<GameSnapshot>,
    /// Newest snapshot that arrived mid-animation
    mailbox: Option<GameSnapshot>,
    active: Option<AnimationTask>,
    next_task_id: u64,
}

impl<G: Geometry> Sequencer<G> {
    pub fn new(geometry: G, timing: AnimationTiming) -> Self {
        Self {
            geometry,
            timing,
            arrow_marker: None,
            baseline: None,
            mailbox: None,
            active: None,
            next_task_id: 0,
        }
    }

    pub fn with_arrow_marker(mut self, marker: Option<String>) -> Self {
        self.arrow_marker = marker;
        self
    }

    pub fn geometry(&self) -> &G {
        &self.geometry
    }

    pub fn active(&self) -> Option<&AnimationTask> {
        self.active.as_ref()
    }

    pub fn is_animating(&self) -> bool {
        self.active.is_some()
    }

    /// Id of the token currently animating.
    pub fn animating_token(&self) -> Option<&str> {
        self.active.as_ref().map(|t| t.token_id.as_str())
    }

    pub fn has_deferred(&self) -> bool {
        self.mailbox.is_some()
    }

    /// Snapshot the board is currently drawn from.
    pub fn baseline(&self) -> Option<&GameSnapshot> {
        self.baseline.as_ref()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.active.as_ref().map(|t| t.due)
    }

    /// Feed a new snapshot.
    ///
    /// While a task is active the snapshot is parked and nothing is emitted.
    pub fn reconcile(&mut self, snapshot: GameSnapshot, now: Instant) -> Vec<SequencerEvent> {
        if self.active.is_some() {
            if self.mailbox.replace(snapshot).is_some() {
                debug!("deferred snapshot superseded, intermediate move will not animate");
            } else {
                debug!("animation in progress, snapshot deferred");
            }
            return Vec::new();
        }
        self.resolve(snapshot, now)
    }

    /// Advance the active task to `now`.
    pub fn poll(&mut self, now: Instant) -> Vec<SequencerEvent> {
        let mut events = Vec::new();

        while let Some(task) = self.active.as_mut() {
            if task.due > now {
                break;
            }
            match task.stage {
                Stage::Stepping => {
                    task.current_step += 1;
                    events.push(SequencerEvent::Frame(task.frame()));
                    if task.current_step >= task.last_step() {
                        task.stage = Stage::Holding;
                        task.due += self.timing.hold(task.mode);
                    } else {
                        task.due += self.timing.step(task.mode);
                    }
                }
                Stage::Holding => {
                    let task_id = task.id;
                    let finished_at = task.due;
                    self.active = None;
                    debug!(task_id, "animation complete");
                    events.push(SequencerEvent::Completed(Completion::animated(task_id)));

                    if let Some(deferred) = self.mailbox.take() {
                        events.extend(self.resolve(deferred, finished_at));
                    }
                }
            }
        }

        events
    }

    /// Drop the active task and any deferred snapshot without signalling.
    pub fn shutdown(&mut self) {
        if let Some(task) = self.active.take() {
            debug!(task_id = task.id, "animation cancelled");
        }
        self.mailbox = None;
        self.baseline = None;
    }

    fn resolve(&mut self, snapshot: GameSnapshot, now: Instant) -> Vec<SequencerEvent> {
        let arrow = snapshot.is_arrow_move(self.arrow_marker.as_deref());
        let Some(previous) = self.baseline.replace(snapshot) else {
            debug!("first snapshot adopted as baseline");
            return vec![SequencerEvent::Completed(Completion::no_op())];
        };
        let moved = self
            .baseline
            .as_ref()
            .and_then(|next| detect_move(&previous, next));
        let Some(moved) = moved else {
            return vec![SequencerEvent::Completed(Completion::no_op())];
        };

        match self.build_task(&moved, arrow, now) {
            Ok(Some(task)) => {
                debug!(
                    task_id = task.id,
                    token = %task.token_id,
                    from = %moved.from,
                    to = %moved.to,
                    mode = task.mode.as_str(),
                    "animation started"
                );
                let events = vec![
                    SequencerEvent::Started {
                        task_id: task.id,
                        token_id: task.token_id.clone(),
                        mode: task.mode,
                    },
                    SequencerEvent::Frame(task.frame()),
                ];
                self.active = Some(task);
                events
            }
            Ok(None) => vec![SequencerEvent::Completed(Completion::no_op())],
            Err(err) => {
                warn!(token = %moved.token.id, error = %err, "animation aborted");
                vec![SequencerEvent::Completed(Completion::aborted())]
            }
        }
    }

    /// Build the task for a move, or `None` if there is nothing to show.
    fn build_task(
        &mut self,
        moved: &TokenMove,
        arrow: bool,
        now: Instant,
    ) -> Result<Option<AnimationTask>, PathError> {
        let (path, mode) = if arrow {
            let from = self.locate(&moved.token, moved.from)?;
            let to = self.locate(&moved.token, moved.to)?;
            (
                teleport_path(from, to, self.timing.teleport_frames),
                AnimationMode::Teleport,
            )
        } else {
            let squares = walk(moved.token.color, moved.from, moved.to).ok_or(
                PathError::Unreachable {
                    from: moved.from,
                    to: moved.to,
                },
            )?;
            let path = squares
                .into_iter()
                .map(|square| self.locate(&moved.token, square))
                .collect::<Result<Vec<_>, _>>()?;
            (path, AnimationMode::Normal)
        };

        if path.len() < 2 {
            return Ok(None);
        }

        self.next_task_id += 1;
        Ok(Some(AnimationTask {
            id: self.next_task_id,
            token_id: moved.token.id.clone(),
            color: moved.token.color,
            path,
            current_step: 0,
            mode,
            stage: Stage::Stepping,
            due: now + self.timing.step(mode),
        }))
    }

    fn locate(&self, token: &Token, position: Position) -> Result<Coord, PathError> {
        self.geometry
            .coord(token, position)
            .ok_or(PathError::Unmapped(position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::geometry::BoardGeometry;
    use crate::state::snapshot::{MoveKind, TurnState};
    use std::time::Duration;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn board(red: Position) -> GameSnapshot {
        GameSnapshot::new(
            vec![
                Token::new("red-0", Color::Red, red),
                Token::new("blue-0", Color::Blue, Position::Yard),
            ],
            TurnState::Rolling,
        )
    }

    fn sequencer() -> Sequencer<BoardGeometry> {
        Sequencer::new(BoardGeometry::new(), AnimationTiming::default())
    }

    fn coord(position: Position) -> Coord {
        let token = Token::new("red-0", Color::Red, position);
        BoardGeometry::new().coord(&token, position).unwrap()
    }

    fn completions(events: &[SequencerEvent]) -> Vec<Completion> {
        events
            .iter()
            .filter_map(|e| match e {
                SequencerEvent::Completed(c) => Some(*c),
                _ => None,
            })
            .collect()
    }

    fn frames(events: &[SequencerEvent]) -> Vec<Frame> {
        events
            .iter()
            .filter_map(|e| match e {
                SequencerEvent::Frame(f) => Some(f.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_first_snapshot_is_noop() {
        let mut seq = sequencer();
        let events = seq.reconcile(board(Position::path(3)), Instant::now());
        assert_eq!(completions(&events), vec![Completion::no_op()]);
        assert!(seq.active().is_none());
        assert!(seq.baseline().is_some());
    }

    #[test]
    fn test_identical_snapshots_complete_without_task() {
        let now = Instant::now();
        let mut seq = sequencer();
        seq.reconcile(board(Position::path(3)), now);

        let events = seq.reconcile(board(Position::path(3)), now);
        assert_eq!(events, vec![SequencerEvent::Completed(Completion::no_op())]);
        assert!(seq.active().is_none());
        assert_eq!(seq.next_deadline(), None);
    }

    #[test]
    fn test_walk_timing() {
        let t0 = Instant::now();
        let mut seq = sequencer();
        seq.reconcile(board(Position::path(10)), t0);

        let started = seq.reconcile(board(Position::path(13)), t0);
        let task = seq.active().unwrap();
        assert_eq!(task.mode, AnimationMode::Normal);
        assert_eq!(
            task.path,
            vec![
                coord(Position::path(10)),
                coord(Position::path(11)),
                coord(Position::path(12)),
                coord(Position::path(13)),
            ]
        );
        assert_eq!(frames(&started)[0].coord, coord(Position::path(10)));

        // Three 300ms steps
        assert!(seq.poll(t0 + ms(299)).is_empty());
        assert_eq!(frames(&seq.poll(t0 + ms(300)))[0].step, 1);
        assert_eq!(frames(&seq.poll(t0 + ms(600)))[0].step, 2);
        let last = seq.poll(t0 + ms(900));
        assert_eq!(frames(&last)[0].coord, coord(Position::path(13)));
        assert!(seq.active().unwrap().is_holding());

        // Then a 150ms hold
        assert!(seq.poll(t0 + ms(1049)).is_empty());
        let done = seq.poll(t0 + ms(1050));
        assert_eq!(completions(&done), vec![Completion::animated(1)]);
        assert!(seq.active().is_none());
    }

    #[test]
    fn test_late_poll_catches_up() {
        let t0 = Instant::now();
        let mut seq = sequencer();
        seq.reconcile(board(Position::path(10)), t0);
        seq.reconcile(board(Position::path(13)), t0);

        let events = seq.poll(t0 + ms(5000));
        let steps: Vec<usize> = frames(&events).iter().map(|f| f.step).collect();
        assert_eq!(steps, vec![1, 2, 3]);
        assert_eq!(completions(&events).len(), 1);
        assert!(seq.poll(t0 + ms(10_000)).is_empty());
    }

    #[test]
    fn test_teleport_path() {
        let t0 = Instant::now();
        let mut seq = sequencer();
        seq.reconcile(board(Position::path(4)), t0);

        let arrow = board(Position::path(5)).with_move_kind(MoveKind::Arrow);
        let started = seq.reconcile(arrow, t0);
        assert!(matches!(
            started[0],
            SequencerEvent::Started { mode: AnimationMode::Teleport, .. }
        ));

        let task = seq.active().unwrap();
        let from = coord(Position::path(4));
        let to = coord(Position::path(5));
        assert_eq!(task.path.len(), 10);
        assert_eq!(task.path[4], from);
        assert_eq!(task.path[5], to);
        assert!(task.path[..5].iter().all(|c| *c == from));
        assert!(task.path[5..].iter().all(|c| *c == to));

        let mut opacity = vec![frames(&started)[0].opacity];
        let events = seq.poll(t0 + ms(900));
        opacity.extend(frames(&events).iter().map(|f| f.opacity));
        assert_eq!(opacity.len(), 10);
        assert_eq!(opacity[0], 1.0);
        assert_eq!(opacity[4], 0.0);
        assert_eq!(opacity[9], 1.0);
        assert!(completions(&events).is_empty());

        // 200ms hold after the last 100ms frame
        assert!(seq.poll(t0 + ms(1099)).is_empty());
        assert_eq!(completions(&seq.poll(t0 + ms(1100))).len(), 1);
    }

    #[test]
    fn test_legacy_arrow_marker() {
        let t0 = Instant::now();
        let mut seq = sequencer().with_arrow_marker(Some("arrow".to_string()));
        seq.reconcile(board(Position::path(17)), t0);

        seq.reconcile(
            board(Position::path(18)).with_message("Red took the arrow!"),
            t0,
        );
        assert_eq!(seq.active().unwrap().mode, AnimationMode::Teleport);
    }

    #[test]
    fn test_yard_entry_is_single_step() {
        let t0 = Instant::now();
        let mut seq = sequencer();
        seq.reconcile(board(Position::Yard), t0);
        seq.reconcile(board(Position::path(0)), t0);

        let task = seq.active().unwrap();
        assert_eq!(task.path.len(), 2);
        assert_eq!(task.last_step(), 1);
    }

    #[test]
    fn test_capture_is_not_animated() {
        let t0 = Instant::now();
        let mut seq = sequencer();
        let before = GameSnapshot::new(
            vec![
                Token::new("red-0", Color::Red, Position::path(20)),
                Token::new("blue-0", Color::Blue, Position::path(22)),
            ],
            TurnState::Rolling,
        );
        let after = GameSnapshot::new(
            vec![
                Token::new("red-0", Color::Red, Position::path(22)),
                Token::new("blue-0", Color::Blue, Position::Yard),
            ],
            TurnState::Rolling,
        );
        seq.reconcile(before, t0);
        seq.reconcile(after, t0);

        assert_eq!(seq.animating_token(), Some("red-0"));
    }

    #[test]
    fn test_several_movers_animate_first_and_snap_rest() {
        let t0 = Instant::now();
        let mut seq = sequencer();
        let before = GameSnapshot::new(
            vec![
                Token::new("red-0", Color::Red, Position::path(10)),
                Token::new("blue-0", Color::Blue, Position::path(40)),
            ],
            TurnState::Rolling,
        );
        let after = GameSnapshot::new(
            vec![
                Token::new("red-0", Color::Red, Position::path(12)),
                Token::new("blue-0", Color::Blue, Position::path(42)),
            ],
            TurnState::Rolling,
        );
        seq.reconcile(before, t0);
        let events = seq.reconcile(after, t0);

        let started: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                SequencerEvent::Started { token_id, .. } => Some(token_id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(started, vec!["red-0"]);
        assert_eq!(
            seq.baseline()
                .and_then(|b| b.token("blue-0"))
                .map(|t| t.position),
            Some(Position::path(42))
        );

        // Blue never gets a task of its own
        let events = seq.poll(t0 + ms(10_000));
        assert_eq!(completions(&events), vec![Completion::animated(1)]);
        assert!(seq.active().is_none());
    }

    #[test]
    fn test_unreachable_move_aborts() {
        let t0 = Instant::now();
        let mut seq = sequencer();
        seq.reconcile(board(Position::home_stretch(Color::Red, 3)), t0);

        let events = seq.reconcile(board(Position::home_stretch(Color::Red, 1)), t0);
        assert_eq!(completions(&events), vec![Completion::aborted()]);
        assert!(seq.active().is_none());
    }

    #[test]
    fn test_unmapped_position_aborts() {
        struct TrackOnly;
        impl Geometry for TrackOnly {
            fn coord(&self, _: &Token, position: Position) -> Option<Coord> {
                match position {
                    Position::Path { index } => Some(Coord::new(index as f32 / 52.0, 0.0)),
                    _ => None,
                }
            }
        }

        let t0 = Instant::now();
        let mut seq = Sequencer::new(TrackOnly, AnimationTiming::default());
        seq.reconcile(board(Position::path(49)), t0);

        let events = seq.reconcile(board(Position::home_stretch(Color::Red, 0)), t0);
        assert_eq!(completions(&events), vec![Completion::aborted()]);

        // Baseline still advanced, so the next diff starts from the new position
        let events = seq.reconcile(board(Position::home_stretch(Color::Red, 0)), t0);
        assert_eq!(completions(&events), vec![Completion::no_op()]);
    }

    #[test]
    fn test_snapshots_deferred_while_animating() {
        let t0 = Instant::now();
        let mut seq = sequencer();
        seq.reconcile(board(Position::path(10)), t0);
        seq.reconcile(board(Position::path(12)), t0);

        // Two more moves arrive before the first finishes
        assert!(seq.reconcile(board(Position::path(14)), t0 + ms(100)).is_empty());
        assert!(seq.reconcile(board(Position::path(16)), t0 + ms(200)).is_empty());
        assert!(seq.has_deferred());

        // First task: 2 steps (600ms) + hold (150ms)
        let events = seq.poll(t0 + ms(750));
        assert_eq!(completions(&events), vec![Completion::animated(1)]);

        // Coalesced: 12 -> 16 in one task, starting when the first finished
        let task = seq.active().unwrap();
        assert_eq!(task.id, 2);
        assert_eq!(task.path.first(), Some(&coord(Position::path(12))));
        assert_eq!(task.path.last(), Some(&coord(Position::path(16))));
        assert_eq!(task.path.len(), 5);
        assert_eq!(seq.next_deadline(), Some(t0 + ms(1050)));
        assert!(!seq.has_deferred());
    }

    #[test]
    fn test_shutdown_cancels_without_completion() {
        let t0 = Instant::now();
        let mut seq = sequencer();
        seq.reconcile(board(Position::path(10)), t0);
        seq.reconcile(board(Position::path(13)), t0);

        seq.shutdown();
        assert!(seq.poll(t0 + ms(5000)).is_empty());
        assert!(seq.baseline().is_none());
    }

    #[test]
    fn test_teleport_envelope() {
        let values: Vec<f32> = (0..10).map(|s| teleport_envelope(s, 10)).collect();
        assert_eq!(values, vec![1.0, 0.75, 0.5, 0.25, 0.0, 0.0, 0.25, 0.5, 0.75, 1.0]);

        // Odd frame counts put the extra frame on the destination side
        let odd: Vec<f32> = (0..11).map(|s| teleport_envelope(s, 11)).collect();
        assert_eq!(odd[4], 0.0);
        assert_eq!(odd[5], 0.0);
        assert_eq!(odd[10], 1.0);
    }
}
