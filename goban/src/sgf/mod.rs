//! In-memory game-record trees.
//!
//! Nodes live in an arena owned by the tree; parent and child links are
//! plain indices, so there are no reference cycles and no shared ownership.
//! The first child of every node is the main line; later children are
//! recorded alternatives in encounter order.

pub mod parser;

pub use parser::{parse, ParseError};

use crate::types::{Color, Coord, Stone, Vertex};
use smallvec::SmallVec;

/// Index of a node within its owning [`GameTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Recognized properties of a node, plus a fallback bag for everything the
/// trainer does not interpret.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeProps {
    /// `B`/`W`: the move this node plays, if any.
    pub mv: Option<(Color, Vertex)>,
    /// `AB`: black setup stones, placed without capture resolution.
    pub setup_black: Vec<Coord>,
    /// `AW`: white setup stones.
    pub setup_white: Vec<Coord>,
    /// `C`: free-text annotation.
    pub comment: Option<String>,
    /// `PL`: which color moves first from this position.
    pub player_to_play: Option<Color>,
    /// `GN`: record title.
    pub game_name: Option<String>,
    /// Unrecognized keys, kept verbatim.
    pub extra: Vec<(String, Vec<String>)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub parent: Option<NodeId>,
    pub children: SmallVec<[NodeId; 2]>,
    pub props: NodeProps,
}

/// A parsed game record. Read-only after parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct GameTree {
    nodes: Vec<Node>,
}

impl GameTree {
    pub(crate) fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub(crate) fn push_node(&mut self, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            parent,
            children: SmallVec::new(),
            props: NodeProps::default(),
        });
        if let Some(parent) = parent {
            self.nodes[parent.index()].children.push(id);
        }
        id
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// The record's first node. Every parsed tree has one.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).children.first().copied()
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.node(id).children.is_empty()
    }

    /// The move recorded at `id`, if it plays one on the board (a pass or a
    /// setup-only node yields `None`).
    pub fn move_at(&self, id: NodeId) -> Option<Stone> {
        match self.node(id).props.mv {
            Some((color, Vertex::Play(coord))) => Some(Stone::new(coord, color)),
            _ => None,
        }
    }

    /// Walk first children from the root and collect the node ids of the
    /// canonical line, root excluded.
    pub fn main_line(&self) -> Vec<NodeId> {
        let mut line = Vec::new();
        let mut cursor = self.root();
        while let Some(next) = self.first_child(cursor) {
            line.push(next);
            cursor = next;
        }
        line
    }

    /// Setup stones declared on the root node, black first.
    pub fn setup_stones(&self) -> Vec<Stone> {
        let props = &self.node(self.root()).props;
        let mut stones = Vec::with_capacity(props.setup_black.len() + props.setup_white.len());
        stones.extend(
            props
                .setup_black
                .iter()
                .map(|c| Stone::new(*c, Color::Black)),
        );
        stones.extend(
            props
                .setup_white
                .iter()
                .map(|c| Stone::new(*c, Color::White)),
        );
        stones
    }

    /// Record title: `GN` if present, else the root annotation.
    pub fn title(&self) -> Option<&str> {
        let props = &self.node(self.root()).props;
        props
            .game_name
            .as_deref()
            .or(props.comment.as_deref())
    }

    /// Look up `color` playing `coord` among the children of `id`. Returns
    /// the matching child and whether it is the main-line (first) child.
    pub fn find_child_move(
        &self,
        id: NodeId,
        color: Color,
        coord: Coord,
    ) -> Option<(NodeId, bool)> {
        let children = self.children(id);
        let first = children.first().copied();
        children
            .iter()
            .find(|child| {
                self.node(**child).props.mv == Some((color, Vertex::Play(coord)))
            })
            .map(|child| (*child, Some(*child) == first))
    }

    /// Follow first children from `id` while the recorded move belongs to
    /// `color`, collecting at most `cap` nodes. Used for refutation and
    /// auto-response playback.
    pub fn first_child_chain<F>(&self, id: NodeId, cap: usize, mut keep: F) -> Vec<NodeId>
    where
        F: FnMut(&Node) -> bool,
    {
        let mut chain = Vec::new();
        let mut cursor = id;
        while chain.len() < cap {
            let next = match self.first_child(cursor) {
                Some(n) => n,
                None => break,
            };
            if !keep(self.node(next)) {
                break;
            }
            chain.push(next);
            cursor = next;
        }
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(text: &str) -> GameTree {
        parse(text).unwrap()
    }

    #[test]
    fn test_main_line_follows_first_children() {
        let t = tree("(;GN[t];B[pd](;W[dp];B[qf])(;W[dd]))");
        let line = t.main_line();
        let moves: Vec<_> = line.iter().filter_map(|id| t.move_at(*id)).collect();
        assert_eq!(moves.len(), 3);
        assert_eq!(moves[0].color, Color::Black);
        assert_eq!(moves[1].coord, Coord::new(3, 15));
        assert_eq!(moves[2].coord, Coord::new(16, 5));
    }

    #[test]
    fn test_find_child_move() {
        let t = tree("(;B[aa](;W[bb])(;W[cc]))");
        let after_first = t.main_line()[0];
        let (main, is_main) = t
            .find_child_move(after_first, Color::White, Coord::new(1, 1))
            .unwrap();
        assert!(is_main);
        assert!(!t.is_leaf(after_first));
        assert!(t.is_leaf(main));

        let (_, is_main) = t
            .find_child_move(after_first, Color::White, Coord::new(2, 2))
            .unwrap();
        assert!(!is_main);

        // color must match, not just the point
        assert!(t
            .find_child_move(after_first, Color::Black, Coord::new(1, 1))
            .is_none());
    }

    #[test]
    fn test_setup_stones_black_first() {
        let t = tree("(;AB[aa][bb]AW[cc])");
        let stones = t.setup_stones();
        assert_eq!(stones.len(), 3);
        assert_eq!(stones[0], Stone::new(Coord::new(0, 0), Color::Black));
        assert_eq!(stones[2], Stone::new(Coord::new(2, 2), Color::White));
    }

    #[test]
    fn test_title_prefers_game_name() {
        let t = tree("(;GN[Pattern 4]C[some note];B[aa])");
        assert_eq!(t.title(), Some("Pattern 4"));
        let t = tree("(;C[only a note];B[aa])");
        assert_eq!(t.title(), Some("only a note"));
    }

    #[test]
    fn test_first_child_chain_cap_and_predicate() {
        let t = tree("(;B[aa];W[bb];B[cc];W[dd];B[ee])");
        let line = t.main_line();
        let chain = t.first_child_chain(line[0], 2, |_| true);
        assert_eq!(chain.len(), 2);
        let chain = t.first_child_chain(line[0], 10, |n| {
            matches!(n.props.mv, Some((Color::White, _)))
        });
        assert_eq!(chain.len(), 1);
    }
}
