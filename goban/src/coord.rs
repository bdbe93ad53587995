//! Textual coordinate codec for game records.
//!
//! Record coordinates are two lowercase letters, `a` = 0, column first:
//! `"ab"` is column 0, row 1. An empty value (or `tt` on boards up to 19,
//! per long-standing record-format practice) denotes a pass.

use crate::types::{Coord, Vertex};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoordError {
    #[error("coordinate value {0:?} is malformed")]
    Malformed(String),
    #[error("coordinate value {0:?} is outside the board")]
    OutOfBounds(String),
}

/// Encode a coordinate as its two-letter record form.
pub fn encode(coord: Coord) -> String {
    let col = (b'a' + coord.col) as char;
    let row = (b'a' + coord.row) as char;
    let mut s = String::with_capacity(2);
    s.push(col);
    s.push(row);
    s
}

/// Encode a vertex; a pass becomes the empty value.
pub fn encode_vertex(vertex: Vertex) -> String {
    match vertex {
        Vertex::Play(c) => encode(c),
        Vertex::Pass => String::new(),
    }
}

/// Decode a two-letter record coordinate, bounded by `size`.
pub fn decode(value: &str, size: u8) -> Result<Coord, CoordError> {
    let bytes = value.as_bytes();
    if bytes.len() != 2 {
        return Err(CoordError::Malformed(value.to_string()));
    }
    if !bytes[0].is_ascii_lowercase() || !bytes[1].is_ascii_lowercase() {
        return Err(CoordError::Malformed(value.to_string()));
    }
    let coord = Coord::new(bytes[0] - b'a', bytes[1] - b'a');
    if !coord.in_bounds(size) {
        return Err(CoordError::OutOfBounds(value.to_string()));
    }
    Ok(coord)
}

/// Decode a record value as a vertex. Empty values are a pass; `tt` is also
/// a pass on boards of 19 or smaller (where it cannot be a real point).
pub fn decode_vertex(value: &str, size: u8) -> Result<Vertex, CoordError> {
    if value.is_empty() || (value == "tt" && size <= 19) {
        return Ok(Vertex::Pass);
    }
    decode(value, size).map(Vertex::Play)
}
