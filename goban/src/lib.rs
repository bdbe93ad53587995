pub mod board;
pub mod board_display;
pub mod coord;
pub mod sgf;
pub mod types;

pub use board::{Board, MoveError};
pub use coord::{decode, decode_vertex, encode, encode_vertex, CoordError};
pub use sgf::{parse, GameTree, Node, NodeId, NodeProps, ParseError};
pub use types::{Color, Coord, Stone, Vertex, BOARD_SIZE};
