//! Go Text Protocol vocabulary: vertex text form and line parsing.

pub mod parser;

pub use parser::{parse_gtp_line, GtpMessage};

use goban::{Color, Coord, Vertex};

/// Column letters in protocol order. `I` is skipped by convention.
const COLUMN_LETTERS: &[u8] = b"ABCDEFGHJKLMNOPQRST";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GtpError {
    #[error("malformed message: {0}")]
    MalformedMessage(String),
    #[error("unknown message: {0}")]
    UnknownMessage(String),
    #[error("invalid vertex: {0}")]
    InvalidVertex(String),
    #[error("engine reported failure: {0}")]
    Failure(String),
}

/// Format a vertex for the wire. Rows count from the bottom, so row 0 (the
/// top of the record grid) prints as the board size.
pub fn format_vertex(vertex: Vertex, size: u8) -> String {
    match vertex {
        Vertex::Pass => "pass".to_string(),
        Vertex::Play(coord) => {
            let col = COLUMN_LETTERS[coord.col as usize] as char;
            let row = size - coord.row;
            format!("{col}{row}")
        }
    }
}

/// Parse a wire vertex ("Q16", "pass").
pub fn parse_vertex(s: &str, size: u8) -> Result<Vertex, GtpError> {
    if s.eq_ignore_ascii_case("pass") {
        return Ok(Vertex::Pass);
    }
    let bytes = s.as_bytes();
    if bytes.len() < 2 {
        return Err(GtpError::InvalidVertex(s.to_string()));
    }
    let letter = bytes[0].to_ascii_uppercase();
    let col = COLUMN_LETTERS[..size as usize]
        .iter()
        .position(|c| *c == letter)
        .ok_or_else(|| GtpError::InvalidVertex(s.to_string()))?;
    let number: u8 = s[1..]
        .parse()
        .map_err(|_| GtpError::InvalidVertex(s.to_string()))?;
    if number == 0 || number > size {
        return Err(GtpError::InvalidVertex(s.to_string()));
    }
    Ok(Vertex::Play(Coord::new(col as u8, size - number)))
}

pub fn format_color(color: Color) -> &'static str {
    match color {
        Color::Black => "B",
        Color::White => "W",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goban::BOARD_SIZE;

    #[test]
    fn test_format_vertex() {
        // top-left record point is A19 on the wire
        assert_eq!(format_vertex(Vertex::Play(Coord::new(0, 0)), BOARD_SIZE), "A19");
        assert_eq!(
            format_vertex(Vertex::Play(Coord::new(18, 18)), BOARD_SIZE),
            "T1"
        );
        // column 8 skips the letter I
        assert_eq!(format_vertex(Vertex::Play(Coord::new(8, 3)), BOARD_SIZE), "J16");
        assert_eq!(format_vertex(Vertex::Pass, BOARD_SIZE), "pass");
    }

    #[test]
    fn test_parse_vertex_round_trip() {
        for col in 0..BOARD_SIZE {
            for row in 0..BOARD_SIZE {
                let vertex = Vertex::Play(Coord::new(col, row));
                let text = format_vertex(vertex, BOARD_SIZE);
                assert_eq!(parse_vertex(&text, BOARD_SIZE), Ok(vertex), "{text}");
            }
        }
    }

    #[test]
    fn test_parse_vertex_rejects_bad_input() {
        assert!(parse_vertex("I5", BOARD_SIZE).is_err());
        assert!(parse_vertex("Z3", BOARD_SIZE).is_err());
        assert!(parse_vertex("A0", BOARD_SIZE).is_err());
        assert!(parse_vertex("A20", BOARD_SIZE).is_err());
        assert!(parse_vertex("", BOARD_SIZE).is_err());
        assert!(parse_vertex("7", BOARD_SIZE).is_err());
    }

    #[test]
    fn test_parse_vertex_case_insensitive() {
        assert_eq!(
            parse_vertex("q16", BOARD_SIZE),
            Ok(Vertex::Play(Coord::new(15, 3)))
        );
        assert_eq!(parse_vertex("PASS", BOARD_SIZE), Ok(Vertex::Pass));
    }
}
