//! Authoritative game snapshots.
//!
//! The server pushes a whole-state replacement after every change. The
//! client keeps read-only copies and never writes positions back.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use super::board::{Color, Position, Token};
use super::dice::DiceReading;

/// Turn phase as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TurnState {
    Rolling,
    Moving,
    GameOver,
}

impl TurnState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rolling => "ROLLING",
            Self::Moving => "MOVING",
            Self::GameOver => "GAMEOVER",
        }
    }
}

/// How the server resolved the last move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveKind {
    #[default]
    Normal,
    /// Landed on an arrow square and was carried forward
    Arrow,
}

/// A move the current actor may select.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegalMove {
    pub token_id: String,
    pub final_position: Position,
}

impl LegalMove {
    pub fn new(token_id: impl Into<String>, final_position: Position) -> Self {
        Self {
            token_id: token_id.into(),
            final_position,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "tokenId": self.token_id,
            "finalPosition": self.final_position.to_json()
        })
    }
}

/// Full game state at one instant.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub tokens: Vec<Token>,

    /// `None`: field absent. `Some(Null)`: explicit null. Other values are
    /// kept raw and judged by [`GameSnapshot::dice_reading`].
    #[serde(default, deserialize_with = "present")]
    pub dice_value: Option<serde_json::Value>,

    pub turn_state: TurnState,

    #[serde(default)]
    pub legal_moves: Vec<LegalMove>,

    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub move_kind: MoveKind,

    /// Whose turn it is
    #[serde(default)]
    pub current_color: Option<Color>,

    /// When the current actor's countdown runs out (display only)
    #[serde(default)]
    pub turn_deadline: Option<chrono::DateTime<chrono::Utc>>,
}

/// Marks a field as present so `null` and absent stay distinguishable.
fn present<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

impl GameSnapshot {
    pub fn new(tokens: Vec<Token>, turn_state: TurnState) -> Self {
        Self {
            tokens,
            dice_value: None,
            turn_state,
            legal_moves: Vec::new(),
            message: String::new(),
            move_kind: MoveKind::Normal,
            current_color: None,
            turn_deadline: None,
        }
    }

    pub fn from_json(text: &str) -> Result<Self, SnapshotError> {
        serde_json::from_str(text).map_err(SnapshotError)
    }

    pub fn with_dice(mut self, value: Option<i64>) -> Self {
        self.dice_value = Some(serde_json::json!(value));
        self
    }

    pub fn with_legal_moves(mut self, moves: Vec<LegalMove>) -> Self {
        self.legal_moves = moves;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_move_kind(mut self, kind: MoveKind) -> Self {
        self.move_kind = kind;
        self
    }

    pub fn with_current_color(mut self, color: Color) -> Self {
        self.current_color = Some(color);
        self
    }

    pub fn with_deadline(mut self, deadline: chrono::DateTime<chrono::Utc>) -> Self {
        self.turn_deadline = Some(deadline);
        self
    }

    /// Find a token by id.
    pub fn token(&self, id: &str) -> Option<&Token> {
        self.tokens.iter().find(|t| t.id == id)
    }

    pub fn dice_reading(&self) -> DiceReading {
        match &self.dice_value {
            None => DiceReading::Unchanged,
            Some(serde_json::Value::Null) => DiceReading::Cleared,
            Some(value) => value
                .as_i64()
                .map_or(DiceReading::Malformed, DiceReading::Face),
        }
    }

    pub fn is_legal(&self, token_id: &str) -> bool {
        self.legal_moves.iter().any(|m| m.token_id == token_id)
    }

    /// Check if this snapshot resolves an arrow move.
    ///
    /// `moveKind` wins; `marker` is matched case-insensitively against the
    /// message for servers that only announce it in text.
    pub fn is_arrow_move(&self, marker: Option<&str>) -> bool {
        if self.move_kind == MoveKind::Arrow {
            return true;
        }
        match marker {
            Some(marker) if !marker.is_empty() => self
                .message
                .to_lowercase()
                .contains(&marker.to_lowercase()),
            _ => false,
        }
    }
}

/// Snapshot could not be decoded.
#[derive(Debug)]
pub struct SnapshotError(pub serde_json::Error);

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Malformed snapshot: {}", self.0)
    }
}

impl std::error::Error for SnapshotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SNAPSHOT: &str = r#"{
        "tokens": [
            {"id": "red-0", "color": "red", "position": {"kind": "path", "index": 10}},
            {"id": "green-0", "color": "green", "position": {"kind": "yard"}}
        ],
        "diceValue": 3,
        "turnState": "MOVING",
        "legalMoves": [{"tokenId": "red-0", "finalPosition": {"kind": "path", "index": 13}}],
        "message": "Red rolled a 3",
        "currentColor": "red",
        "turnDeadline": "2026-10-19T12:00:30Z"
    }"#;

    #[test]
    fn test_parse_snapshot() {
        let snapshot = GameSnapshot::from_json(SNAPSHOT).unwrap();
        assert_eq!(snapshot.tokens.len(), 2);
        assert_eq!(snapshot.turn_state, TurnState::Moving);
        assert_eq!(snapshot.dice_reading(), DiceReading::Face(3));
        assert_eq!(snapshot.move_kind, MoveKind::Normal);
        assert_eq!(snapshot.current_color, Some(Color::Red));
        assert!(snapshot.is_legal("red-0"));
        assert!(!snapshot.is_legal("green-0"));
        assert_eq!(
            snapshot.turn_deadline,
            Some(chrono::Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 30).unwrap())
        );
        assert_eq!(
            snapshot.token("red-0").map(|t| t.position),
            Some(Position::path(10))
        );
    }

    #[test]
    fn test_dice_value_tri_state() {
        let absent = GameSnapshot::from_json(r#"{"tokens": [], "turnState": "ROLLING"}"#).unwrap();
        assert_eq!(absent.dice_reading(), DiceReading::Unchanged);

        let null = GameSnapshot::from_json(r#"{"tokens": [], "diceValue": null, "turnState": "ROLLING"}"#)
            .unwrap();
        assert_eq!(null.dice_reading(), DiceReading::Cleared);
    }

    #[test]
    fn test_odd_wire_values_still_decode() {
        let snapshot = GameSnapshot::from_json(
            r#"{"tokens": [{"id": "red-0", "color": "red", "position": {"kind": "path", "index": 300}}],
                "diceValue": 3.5, "turnState": "ROLLING"}"#,
        )
        .unwrap();
        assert_eq!(snapshot.turn_state, TurnState::Rolling);
        assert_eq!(snapshot.dice_reading(), DiceReading::Malformed);
        assert!(!snapshot.tokens[0].position.is_valid());

        let text = GameSnapshot::from_json(r#"{"tokens": [], "diceValue": "six", "turnState": "MOVING"}"#)
            .unwrap();
        assert_eq!(text.dice_reading(), DiceReading::Malformed);
    }

    #[test]
    fn test_game_over_wire_name() {
        let snapshot =
            GameSnapshot::from_json(r#"{"tokens": [], "turnState": "GAMEOVER"}"#).unwrap();
        assert_eq!(snapshot.turn_state, TurnState::GameOver);
    }

    #[test]
    fn test_arrow_detection() {
        let structured = GameSnapshot::new(vec![], TurnState::Rolling).with_move_kind(MoveKind::Arrow);
        assert!(structured.is_arrow_move(None));

        let legacy = GameSnapshot::new(vec![], TurnState::Rolling)
            .with_message("Red hit an ARROW and jumped ahead");
        assert!(legacy.is_arrow_move(Some("arrow")));
        assert!(!legacy.is_arrow_move(None));

        let plain = GameSnapshot::new(vec![], TurnState::Rolling).with_message("Red moved");
        assert!(!plain.is_arrow_move(Some("arrow")));
    }

    #[test]
    fn test_malformed_snapshot() {
        let err = GameSnapshot::from_json(r#"{"tokens": 5}"#).unwrap_err();
        assert!(err.to_string().starts_with("Malformed snapshot"));
    }
}
