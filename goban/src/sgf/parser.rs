//! Recursive-descent parser for the record grammar.
//!
//! A record is `'(' sequence ')'`; a sequence is zero or more `';'`-led
//! nodes; each node carries properties of the form `KEY[value]...` where
//! `]` and `\` inside a value are escaped with a backslash. A parenthesized
//! group following a node is a child variation branching from that node.
//!
//! Unknown property keys are kept as opaque extras and never fail the
//! parse; unbalanced parentheses or brackets do.

use super::{GameTree, NodeId, NodeProps};
use crate::coord;
use crate::types::{Color, BOARD_SIZE};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("record does not start with '('")]
    MissingOpen,
    #[error("unbalanced parenthesis at byte {0}")]
    UnbalancedParen(usize),
    #[error("unterminated property value starting at byte {0}")]
    UnterminatedValue(usize),
    #[error("record contains no nodes")]
    Empty,
}

/// Parse a record into a tree. Parsing is side-effect-free and
/// deterministic: the same text always yields a structurally equal tree.
pub fn parse(text: &str) -> Result<GameTree, ParseError> {
    let mut parser = Parser {
        bytes: text.as_bytes(),
        pos: 0,
        tree: GameTree::new(),
    };
    parser.skip_whitespace();
    if parser.peek() != Some(b'(') {
        return Err(ParseError::MissingOpen);
    }
    parser.pos += 1;
    parser.parse_sequence(None)?;
    if parser.tree.node_count() == 0 {
        return Err(ParseError::Empty);
    }
    Ok(parser.tree)
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
    tree: GameTree,
}

impl Parser<'_> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    /// Parse one `( ... )` body: a linear node sequence where each later
    /// node hangs off the previous one, plus nested variations attached to
    /// whichever node is current when they appear.
    fn parse_sequence(&mut self, parent: Option<NodeId>) -> Result<(), ParseError> {
        let mut current = parent;
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(ParseError::UnbalancedParen(self.pos)),
                Some(b';') => {
                    self.pos += 1;
                    let id = self.tree.push_node(current);
                    let props = self.parse_props()?;
                    self.tree.node_mut(id).props = props;
                    current = Some(id);
                }
                Some(b'(') => {
                    self.pos += 1;
                    self.parse_sequence(current)?;
                }
                Some(b')') => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(_) => {
                    // Stray byte between nodes; skip it rather than failing
                    // the whole record.
                    self.pos += 1;
                }
            }
        }
    }

    /// Parse the properties of one node, up to the next structural token.
    fn parse_props(&mut self) -> Result<NodeProps, ParseError> {
        let mut props = NodeProps::default();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None | Some(b';') | Some(b'(') | Some(b')') => break,
                Some(b) if b.is_ascii_uppercase() => {
                    let key = self.parse_ident();
                    let values = self.parse_values()?;
                    if !values.is_empty() {
                        apply_property(&mut props, &key, values);
                    }
                }
                Some(_) => {
                    // Lowercase letters from long-form keys and other noise.
                    self.pos += 1;
                }
            }
        }
        Ok(props)
    }

    fn parse_ident(&mut self) -> String {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_uppercase()) {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned()
    }

    fn parse_values(&mut self) -> Result<Vec<String>, ParseError> {
        let mut values = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek() != Some(b'[') {
                break;
            }
            let start = self.pos;
            self.pos += 1;
            let mut value = Vec::new();
            let mut closed = false;
            while let Some(b) = self.peek() {
                self.pos += 1;
                match b {
                    b'\\' => {
                        if let Some(escaped) = self.peek() {
                            value.push(escaped);
                            self.pos += 1;
                        }
                    }
                    b']' => {
                        closed = true;
                        break;
                    }
                    _ => value.push(b),
                }
            }
            if !closed {
                return Err(ParseError::UnterminatedValue(start));
            }
            values.push(String::from_utf8_lossy(&value).into_owned());
        }
        Ok(values)
    }
}

/// Attach one recognized property to the node, or file it under `extra`.
/// Move and setup values that do not decode to an on-board point are
/// dropped; a bad coordinate in one branch must not sink the record.
fn apply_property(props: &mut NodeProps, key: &str, values: Vec<String>) {
    match key {
        "B" | "W" => {
            let color = if key == "B" { Color::Black } else { Color::White };
            if let Ok(vertex) = coord::decode_vertex(&values[0], BOARD_SIZE) {
                props.mv = Some((color, vertex));
            }
        }
        "AB" => {
            props.setup_black.extend(
                values
                    .iter()
                    .filter_map(|v| coord::decode(v, BOARD_SIZE).ok()),
            );
        }
        "AW" => {
            props.setup_white.extend(
                values
                    .iter()
                    .filter_map(|v| coord::decode(v, BOARD_SIZE).ok()),
            );
        }
        "C" => {
            props.comment = values.into_iter().next();
        }
        "PL" => {
            props.player_to_play = match values[0].as_str() {
                "B" | "b" => Some(Color::Black),
                "W" | "w" => Some(Color::White),
                _ => None,
            };
        }
        "GN" => {
            props.game_name = values.into_iter().next();
        }
        _ => {
            props.extra.push((key.to_string(), values));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Coord, Vertex};

    #[test]
    fn test_linear_record() {
        let tree = parse("(;GN[test];B[pd];W[dp])").unwrap();
        assert_eq!(tree.node_count(), 3);
        let line = tree.main_line();
        assert_eq!(line.len(), 2);
        assert_eq!(
            tree.node(line[0]).props.mv,
            Some((Color::Black, Vertex::Play(Coord::new(15, 3))))
        );
        assert_eq!(
            tree.node(line[1]).props.mv,
            Some((Color::White, Vertex::Play(Coord::new(3, 15))))
        );
    }

    #[test]
    fn test_variations_preserve_order() {
        let tree = parse("(;B[aa](;W[bb];B[cc])(;W[dd])(;W[ee]))").unwrap();
        let first = tree.main_line()[0];
        let children = tree.children(first);
        assert_eq!(children.len(), 3);
        let coords: Vec<_> = children
            .iter()
            .map(|c| tree.node(*c).props.mv.unwrap().1)
            .collect();
        assert_eq!(
            coords,
            vec![
                Vertex::Play(Coord::new(1, 1)),
                Vertex::Play(Coord::new(3, 3)),
                Vertex::Play(Coord::new(4, 4)),
            ]
        );
    }

    #[test]
    fn test_parent_links() {
        let tree = parse("(;B[aa](;W[bb])(;W[cc]))").unwrap();
        let root = tree.root();
        let first = tree.main_line()[0];
        assert_eq!(tree.parent(first), Some(root));
        for child in tree.children(first) {
            assert_eq!(tree.parent(*child), Some(first));
        }
    }

    #[test]
    fn test_escaped_values() {
        let tree = parse(r"(;C[a \] b \\ c])").unwrap();
        assert_eq!(
            tree.node(tree.root()).props.comment.as_deref(),
            Some(r"a ] b \ c")
        );
    }

    #[test]
    fn test_setup_and_player_to_play() {
        let tree = parse("(;AB[aa][bb]AW[cc]PL[W])").unwrap();
        let props = &tree.node(tree.root()).props;
        assert_eq!(props.setup_black, vec![Coord::new(0, 0), Coord::new(1, 1)]);
        assert_eq!(props.setup_white, vec![Coord::new(2, 2)]);
        assert_eq!(props.player_to_play, Some(Color::White));
    }

    #[test]
    fn test_unknown_keys_tolerated() {
        let tree = parse("(;FF[4]SZ[19]KM[7.5];B[aa])").unwrap();
        let props = &tree.node(tree.root()).props;
        assert_eq!(props.extra.len(), 3);
        assert_eq!(props.extra[0], ("FF".to_string(), vec!["4".to_string()]));
        assert_eq!(tree.main_line().len(), 1);
    }

    #[test]
    fn test_pass_and_bad_coordinates() {
        let tree = parse("(;B[])").unwrap();
        assert_eq!(
            tree.node(tree.root()).props.mv,
            Some((Color::Black, Vertex::Pass))
        );
        // 'z' decodes past the board edge; the move is dropped, the node kept
        let tree = parse("(;B[zz]C[still here])").unwrap();
        let props = &tree.node(tree.root()).props;
        assert_eq!(props.mv, None);
        assert_eq!(props.comment.as_deref(), Some("still here"));
    }

    #[test]
    fn test_unbalanced_inputs_fail() {
        assert_eq!(parse("(;B[aa]"), Err(ParseError::UnbalancedParen(7)));
        assert!(matches!(
            parse("(;B[aa"),
            Err(ParseError::UnterminatedValue(3))
        ));
        assert_eq!(parse(";B[aa]"), Err(ParseError::MissingOpen));
        assert_eq!(parse("()"), Err(ParseError::Empty));
        assert_eq!(parse(""), Err(ParseError::MissingOpen));
    }

    #[test]
    fn test_whitespace_tolerated() {
        let tree = parse("(\n  ;B[aa]\n  (;W[bb])\n)").unwrap();
        assert_eq!(tree.node_count(), 3);
    }

    #[test]
    fn test_parse_is_idempotent() {
        let text = "(;GN[x]AB[aa][bb];B[cc](;W[dd];B[ee])(;W[ff]C[bad]))";
        let first = parse(text).unwrap();
        let second = parse(text).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.node_count(), second.node_count());

        let moves_of = |t: &GameTree| {
            t.main_line()
                .iter()
                .filter_map(|id| t.move_at(*id))
                .collect::<Vec<_>>()
        };
        assert_eq!(moves_of(&first), moves_of(&second));
        assert_eq!(first.setup_stones(), second.setup_stones());
    }

    #[test]
    fn test_main_line_matches_source_order() {
        // First-encountered branch at every fork is canonical.
        let text = "(;B[aa](;W[bb](;B[cc])(;B[dd]))(;W[ee]))";
        let tree = parse(text).unwrap();
        let coords: Vec<_> = tree
            .main_line()
            .iter()
            .filter_map(|id| tree.move_at(*id))
            .map(|s| s.coord)
            .collect();
        assert_eq!(
            coords,
            vec![Coord::new(0, 0), Coord::new(1, 1), Coord::new(2, 2)]
        );
    }
}
