//! Parsing of streamed engine response lines.
//!
//! The analyze family of commands answers with plain text: a `=`/`?` status
//! line, zero or more `info` lines each carrying one evaluation sample, and
//! for generate requests a `play <vertex>` line naming the chosen move.
//! Responses end with a blank line, which callers skip before this parser
//! sees anything.

use super::{parse_vertex, GtpError};
use crate::{Evaluation, GeneratedMove};

/// One decoded response line.
#[derive(Debug, Clone, PartialEq)]
pub enum GtpMessage {
    /// `= payload` — command acknowledged; payload may be empty.
    Success(String),
    /// `? message` — command rejected by the engine.
    Failure(String),
    /// `play <vertex>` — the move chosen by a generate request.
    Play(GeneratedMove),
    /// `info …` — one evaluation sample.
    Info(Evaluation),
}

/// Parse a single non-blank response line.
pub fn parse_gtp_line(line: &str, board_size: u8) -> Result<GtpMessage, GtpError> {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix('=') {
        let payload = rest.trim();
        // The first report of an analyze response rides on the status line:
        // "= info move ...". Same for "= play ...".
        if payload.starts_with("info ") || payload.starts_with("play ") {
            return parse_gtp_line(payload, board_size);
        }
        // A bare generate response may arrive as "= Q16" directly.
        if let Some(mv) = parse_generated_move(payload, board_size) {
            return Ok(GtpMessage::Play(mv));
        }
        return Ok(GtpMessage::Success(payload.to_string()));
    }
    if let Some(rest) = line.strip_prefix('?') {
        return Ok(GtpMessage::Failure(rest.trim().to_string()));
    }

    let tokens: Vec<&str> = line.split_whitespace().collect();
    match tokens.first() {
        Some(&"play") => {
            let arg = tokens
                .get(1)
                .ok_or_else(|| GtpError::MalformedMessage(line.to_string()))?;
            parse_generated_move(arg, board_size)
                .map(GtpMessage::Play)
                .ok_or_else(|| GtpError::MalformedMessage(line.to_string()))
        }
        Some(&"info") => Ok(GtpMessage::Info(parse_info_line(
            &tokens[1..],
            board_size,
        ))),
        _ => Err(GtpError::UnknownMessage(line.to_string())),
    }
}

fn parse_generated_move(s: &str, board_size: u8) -> Option<GeneratedMove> {
    if s.eq_ignore_ascii_case("resign") {
        return Some(GeneratedMove::Resign);
    }
    parse_vertex(s, board_size).ok().map(GeneratedMove::Vertex)
}

/// Keyword-scan an `info` line. Unknown keywords are skipped, so new engine
/// fields never break parsing.
fn parse_info_line(tokens: &[&str], board_size: u8) -> Evaluation {
    let mut eval = Evaluation::default();
    let mut i = 0;

    while i < tokens.len() {
        match tokens[i] {
            // Reports can carry several candidate blocks on one line,
            // "info move D4 ... info move Q16 ...". The first (best) block
            // is the sample; the rest are discarded.
            "info" => break,
            "move" => {
                i += 1;
                eval.mv = tokens
                    .get(i)
                    .and_then(|s| parse_vertex(s, board_size).ok());
            }
            "visits" => {
                i += 1;
                eval.visits = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "winrate" => {
                i += 1;
                eval.winrate = tokens
                    .get(i)
                    .and_then(|s| s.parse::<f64>().ok())
                    .filter(|w| (0.0..=1.0).contains(w));
            }
            "scoreMean" | "scoreLead" => {
                i += 1;
                if eval.score_lead.is_none() {
                    eval.score_lead = tokens.get(i).and_then(|s| s.parse().ok());
                }
            }
            "pv" => {
                // Collect vertices until the next keyword
                i += 1;
                while i < tokens.len() && !is_keyword(tokens[i]) {
                    if let Ok(vertex) = parse_vertex(tokens[i], board_size) {
                        eval.pv.push(vertex);
                    }
                    i += 1;
                }
                continue; // Don't increment i again
            }
            _ => {
                // Unknown keyword, skip
            }
        }
        i += 1;
    }

    eval
}

fn is_keyword(token: &str) -> bool {
    matches!(
        token,
        "info"
            | "move"
            | "visits"
            | "winrate"
            | "scoreMean"
            | "scoreLead"
            | "scoreStdev"
            | "scoreSelfplay"
            | "utility"
            | "utilityLcb"
            | "lcb"
            | "prior"
            | "order"
            | "weight"
            | "pv"
            | "pvVisits"
            | "isSymmetryOf"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use goban::{Coord, Vertex, BOARD_SIZE};

    #[test]
    fn test_parse_play_line() {
        let msg = parse_gtp_line("play Q16", BOARD_SIZE).unwrap();
        assert_eq!(
            msg,
            GtpMessage::Play(GeneratedMove::Vertex(Vertex::Play(Coord::new(15, 3))))
        );
        let msg = parse_gtp_line("play pass", BOARD_SIZE).unwrap();
        assert_eq!(msg, GtpMessage::Play(GeneratedMove::Vertex(Vertex::Pass)));
        let msg = parse_gtp_line("play resign", BOARD_SIZE).unwrap();
        assert_eq!(msg, GtpMessage::Play(GeneratedMove::Resign));
    }

    #[test]
    fn test_parse_info_line() {
        let msg = parse_gtp_line(
            "info move Q16 visits 50 winrate 0.4523 scoreMean -1.2 order 0 pv Q16 D4 C16",
            BOARD_SIZE,
        )
        .unwrap();
        let eval = match msg {
            GtpMessage::Info(e) => e,
            other => panic!("wrong message type: {other:?}"),
        };
        assert_eq!(eval.mv, Some(Vertex::Play(Coord::new(15, 3))));
        assert_eq!(eval.visits, Some(50));
        assert_eq!(eval.winrate, Some(0.4523));
        assert_eq!(eval.score_lead, Some(-1.2));
        assert_eq!(eval.pv.len(), 3);
        assert_eq!(eval.pv[1], Vertex::Play(Coord::new(3, 15)));
    }

    #[test]
    fn test_first_info_block_wins() {
        let msg = parse_gtp_line(
            "= info move Q16 winrate 0.48 pv Q16 D4 info move C16 winrate 0.44",
            BOARD_SIZE,
        )
        .unwrap();
        let eval = match msg {
            GtpMessage::Info(e) => e,
            other => panic!("wrong message type: {other:?}"),
        };
        assert_eq!(eval.mv, Some(Vertex::Play(Coord::new(15, 3))));
        assert_eq!(eval.winrate, Some(0.48));
        assert_eq!(eval.pv.len(), 2);
    }

    #[test]
    fn test_info_line_pv_stops_at_keyword() {
        let msg = parse_gtp_line("info move D4 pv D4 Q16 weight 12", BOARD_SIZE).unwrap();
        let eval = match msg {
            GtpMessage::Info(e) => e,
            other => panic!("wrong message type: {other:?}"),
        };
        assert_eq!(eval.pv.len(), 2);
    }

    #[test]
    fn test_info_line_out_of_range_winrate_dropped() {
        let msg = parse_gtp_line("info move D4 winrate 1.7", BOARD_SIZE).unwrap();
        let eval = match msg {
            GtpMessage::Info(e) => e,
            other => panic!("wrong message type: {other:?}"),
        };
        assert_eq!(eval.winrate, None);
    }

    #[test]
    fn test_status_lines() {
        assert_eq!(
            parse_gtp_line("= ", BOARD_SIZE).unwrap(),
            GtpMessage::Success(String::new())
        );
        assert_eq!(
            parse_gtp_line("=2.16.0", BOARD_SIZE).unwrap(),
            GtpMessage::Success("2.16.0".to_string())
        );
        assert_eq!(
            parse_gtp_line("? unknown command", BOARD_SIZE).unwrap(),
            GtpMessage::Failure("unknown command".to_string())
        );
        // a bare genmove answer carries the vertex on the status line
        assert_eq!(
            parse_gtp_line("= D4", BOARD_SIZE).unwrap(),
            GtpMessage::Play(GeneratedMove::Vertex(Vertex::Play(Coord::new(3, 15))))
        );
    }

    #[test]
    fn test_unknown_line_is_error() {
        assert!(matches!(
            parse_gtp_line("kata something", BOARD_SIZE),
            Err(GtpError::UnknownMessage(_))
        ));
    }
}
