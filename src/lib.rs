//! Ludo Client State Library
//!
//! This crate reconciles authoritative Ludo board snapshots into turn phases
//! and move animations for a browser client.
//!
//! # Overview
//!
//! The state module provides:
//!
//! - **Turn State Machine** - Tracks the phase of the current turn (rolling,
//!   moving, animating, game over) and gates input accordingly.
//!
//! - **Dice Presentation** - Decides when the die rolls, settles, or resets,
//!   and when the roll sound plays, from the server's value.
//!
//! - **Reconciliation & Animation** - Diffs consecutive snapshots, builds the
//!   walked or teleport path for the moved token, steps it on a fixed cadence,
//!   and signals completion exactly once.
//!
//! - **Notifications** - Presentation hooks subscribe for roll sounds, turn
//!   prompts, messages, and game over.
//!
//! # Design Principles
//!
//! 1. **The server is the source of truth** - Positions are never changed
//!    locally; animation frames are cosmetic.
//!
//! 2. **State machines validate transitions** - Invalid turn events are
//!    rejected with clear errors instead of corrupting state.
//!
//! 3. **No networking, no real timers** - The host feeds snapshots and clock
//!    readings and schedules one wake-up at [`ClientState::next_deadline`].
//!
//! 4. **Serialization-ready** - Snapshots and config come from JSON; views go
//!    back out as JSON.
//!
//! # Example
//!
//! ```rust
//! use std::time::{Duration, Instant};
//! use ludo_state::state::{ClientConfig, ClientState, Color, TurnPhase};
//!
//! let mut client = ClientState::new(ClientConfig::for_color(Color::Red));
//! let t0 = Instant::now();
//!
//! client
//!     .handle_json(
//!         r#"{"tokens": [{"id": "red-0", "color": "red", "position": {"kind": "path", "index": 10}}],
//!             "diceValue": 3, "turnState": "MOVING", "currentColor": "red",
//!             "legalMoves": [{"tokenId": "red-0", "finalPosition": {"kind": "path", "index": 13}}]}"#,
//!         t0,
//!     )
//!     .unwrap();
//! assert_eq!(client.request_move("red-0").unwrap().to_json()["type"], "move");
//!
//! // The server applies the move and hands the die back to red
//! client
//!     .handle_json(
//!         r#"{"tokens": [{"id": "red-0", "color": "red", "position": {"kind": "path", "index": 13}}],
//!             "diceValue": null, "turnState": "ROLLING", "currentColor": "red"}"#,
//!         t0,
//!     )
//!     .unwrap();
//! assert_eq!(client.phase(), TurnPhase::Animating);
//! assert!(client.request_roll().is_err());
//!
//! // Three 300ms steps and a 150ms hold later, the die is live again
//! client.tick(t0 + Duration::from_millis(1050));
//! assert_eq!(client.phase(), TurnPhase::Rolling);
//! assert!(client.request_roll().is_ok());
//! ```

pub mod state;

// Re-export everything from state module at crate root
pub use state::*;
