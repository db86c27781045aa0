//! Board geometry.
//!
//! Maps logical positions to normalized board coordinates. Hosts with their
//! own artwork implement [`Geometry`]; [`BoardGeometry`] covers the classic
//! 15x15 layout (red yard top-left, going clockwise).

use serde::Serialize;

use super::board::{Color, Position, Token, HOME_STRETCH_LEN, TRACK_LEN};

/// Cells per board side.
pub const BOARD_CELLS: f32 = 15.0;

/// Normalized board coordinate, both axes in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coord {
    pub x: f32,
    pub y: f32,
}

impl Coord {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Center of a grid cell.
    pub fn cell(row: f32, col: f32) -> Self {
        Self {
            x: (col + 0.5) / BOARD_CELLS,
            y: (row + 0.5) / BOARD_CELLS,
        }
    }
}

/// Coordinate lookup for token positions.
pub trait Geometry {
    /// Coordinate for `token` standing at `position`, or `None` if unmapped.
    fn coord(&self, token: &Token, position: Position) -> Option<Coord>;
}

/// Track cells as (row, col), starting at red's entry square and running clockwise.
#[rustfmt::skip]
const TRACK_CELLS: [(u8, u8); TRACK_LEN as usize] = [
    (6, 1), (6, 2), (6, 3), (6, 4), (6, 5),
    (5, 6), (4, 6), (3, 6), (2, 6), (1, 6), (0, 6),
    (0, 7), (0, 8),
    (1, 8), (2, 8), (3, 8), (4, 8), (5, 8),
    (6, 9), (6, 10), (6, 11), (6, 12), (6, 13), (6, 14),
    (7, 14), (8, 14),
    (8, 13), (8, 12), (8, 11), (8, 10), (8, 9),
    (9, 8), (10, 8), (11, 8), (12, 8), (13, 8), (14, 8),
    (14, 7), (14, 6),
    (13, 6), (12, 6), (11, 6), (10, 6), (9, 6),
    (8, 5), (8, 4), (8, 3), (8, 2), (8, 1), (8, 0),
    (7, 0), (6, 0),
];

/// Slot offsets inside a 6x6 yard, in cells.
const YARD_SLOTS: [(f32, f32); 4] = [(1.5, 1.5), (1.5, 3.5), (3.5, 1.5), (3.5, 3.5)];

/// The standard 15x15 board.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoardGeometry;

impl BoardGeometry {
    pub fn new() -> Self {
        Self
    }

    fn yard_origin(color: Color) -> (f32, f32) {
        match color {
            Color::Red => (0.0, 0.0),
            Color::Green => (0.0, 9.0),
            Color::Yellow => (9.0, 9.0),
            Color::Blue => (9.0, 0.0),
        }
    }

    fn home_cell(color: Color, index: i64) -> (i64, i64) {
        match color {
            Color::Red => (7, 1 + index),
            Color::Green => (1 + index, 7),
            Color::Yellow => (7, 13 - index),
            Color::Blue => (13 - index, 7),
        }
    }
}

impl Geometry for BoardGeometry {
    fn coord(&self, token: &Token, position: Position) -> Option<Coord> {
        match position {
            Position::Yard => {
                let (row, col) = Self::yard_origin(token.color);
                let (dr, dc) = YARD_SLOTS[token.yard_slot() as usize];
                Some(Coord::cell(row + dr, col + dc))
            }
            Position::Path { index } => {
                let (row, col) = *usize::try_from(index)
                    .ok()
                    .and_then(|i| TRACK_CELLS.get(i))?;
                Some(Coord::cell(row as f32, col as f32))
            }
            Position::HomeStretch { color, index } => {
                if !(0..HOME_STRETCH_LEN).contains(&index) {
                    return None;
                }
                let (row, col) = Self::home_cell(color, index);
                Some(Coord::cell(row as f32, col as f32))
            }
        }
    }
}
