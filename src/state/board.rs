//! Board topology.
//!
//! Colors, logical token positions, and the forward walk a token takes
//! between two positions. Nothing here knows about screen coordinates;
//! see [`geometry`](super::geometry) for that.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Cells on the shared circular track.
pub const TRACK_LEN: i64 = 52;

/// Cells in each color's private home stretch.
pub const HOME_STRETCH_LEN: i64 = 6;

/// Track squares that auto-advance a token that lands on them.
pub const ARROW_SQUARES: [i64; 4] = [4, 17, 30, 43];

/// Token colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Green,
    Yellow,
    Blue,
}

impl Color {
    pub const ALL: [Color; 4] = [Color::Red, Color::Green, Color::Yellow, Color::Blue];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Blue => "blue",
        }
    }

    /// Track index where this color's tokens enter from the yard.
    pub fn start_index(&self) -> i64 {
        match self {
            Self::Red => 0,
            Self::Green => 13,
            Self::Yellow => 26,
            Self::Blue => 39,
        }
    }

    /// Last shared-track square before this color turns into its home stretch.
    pub fn home_entry_index(&self) -> i64 {
        (self.start_index() + TRACK_LEN - 2) % TRACK_LEN
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical position of a token.
///
/// Indexes are kept as wide as the wire allows; out-of-range values
/// survive decoding and are rejected by [`Position::is_valid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Position {
    /// Not yet entered the circuit
    Yard,

    /// On the shared track
    Path { index: i64 },

    /// On a color-private final stretch
    HomeStretch { color: Color, index: i64 },
}

impl Position {
    pub fn path(index: i64) -> Self {
        Self::Path { index }
    }

    pub fn home_stretch(color: Color, index: i64) -> Self {
        Self::HomeStretch { color, index }
    }

    /// Check if the index is within the bounds of its variant.
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Yard => true,
            Self::Path { index } => (0..TRACK_LEN).contains(index),
            Self::HomeStretch { index, .. } => (0..HOME_STRETCH_LEN).contains(index),
        }
    }

    /// Check if this is one of the arrow squares.
    pub fn is_arrow_square(&self) -> bool {
        matches!(self, Self::Path { index } if ARROW_SQUARES.contains(index))
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Yard => serde_json::json!({"kind": "yard"}),
            Self::Path { index } => serde_json::json!({"kind": "path", "index": index}),
            Self::HomeStretch { color, index } => serde_json::json!({
                "kind": "homeStretch",
                "color": color.as_str(),
                "index": index
            }),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yard => write!(f, "YARD"),
            Self::Path { index } => write!(f, "PATH({})", index),
            Self::HomeStretch { color, index } => write!(f, "HOME_STRETCH({}, {})", color, index),
        }
    }
}

/// A game piece as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub color: Color,
    pub position: Position,
}

impl Token {
    pub fn new(id: impl Into<String>, color: Color, position: Position) -> Self {
        Self {
            id: id.into(),
            color,
            position,
        }
    }

    /// Yard slot (0..4), taken from the trailing digit of the id.
    pub fn yard_slot(&self) -> u8 {
        self.id
            .chars()
            .last()
            .and_then(|c| c.to_digit(10))
            .map(|d| (d % 4) as u8)
            .unwrap_or(0)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "color": self.color.as_str(),
            "position": self.position.to_json()
        })
    }
}

/// Expand a move into the logical squares it passes through.
///
/// Both endpoints are included, so a one-square advance yields two entries
/// and identical positions yield one. Returns `None` when `to` cannot be
/// reached from `from` by walking forward as a `color` token.
pub fn walk(color: Color, from: Position, to: Position) -> Option<Vec<Position>> {
    if !from.is_valid() || !to.is_valid() {
        return None;
    }
    if from == to {
        return Some(vec![from]);
    }

    match (from, to) {
        (Position::Yard, Position::Path { .. }) => Some(vec![from, to]),

        (Position::Path { index: a }, Position::Path { index: b }) => {
            let mut squares = vec![from];
            squares.extend(track_run(a, b));
            Some(squares)
        }

        (Position::Path { index: a }, Position::HomeStretch { color: c, index: k }) if c == color => {
            let mut squares = vec![from];
            squares.extend(track_run(a, color.home_entry_index()));
            squares.extend((0..=k).map(|i| Position::home_stretch(color, i)));
            Some(squares)
        }

        (
            Position::HomeStretch { color: c1, index: i },
            Position::HomeStretch { color: c2, index: k },
        ) if c1 == c2 && c1 == color && k > i => {
            Some((i..=k).map(|j| Position::home_stretch(color, j)).collect())
        }

        _ => None,
    }
}

/// Track squares after `from` up to and including `to`, wrapping at the end.
fn track_run(from: i64, to: i64) -> Vec<Position> {
    let mut squares = Vec::new();
    let mut index = from;
    while index != to {
        index = (index + 1) % TRACK_LEN;
        squares.push(Position::path(index));
    }
    squares
}
