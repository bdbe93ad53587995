//! Board state and capture resolution under area-scoring rules.
//!
//! `Board` is an immutable-style snapshot: applying a move produces a new
//! board, so a caller that keeps the previous snapshot can roll back without
//! replaying. Setup stones are placed directly and skip capture resolution.

use crate::types::{Color, Coord, Stone, BOARD_SIZE};
use smallvec::SmallVec;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    #[error("point ({0}, {1}) is outside the board")]
    OutOfBounds(u8, u8),
    #[error("point ({0}, {1}) is already occupied")]
    Occupied(u8, u8),
    #[error("playing at ({0}, {1}) would be suicide")]
    Suicide(u8, u8),
}

/// The set of stones on the board at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    size: u8,
    cells: Vec<Option<Color>>,
}

impl Board {
    pub fn new(size: u8) -> Self {
        Self {
            size,
            cells: vec![None; size as usize * size as usize],
        }
    }

    pub fn size(&self) -> u8 {
        self.size
    }

    fn idx(&self, coord: Coord) -> usize {
        coord.row as usize * self.size as usize + coord.col as usize
    }

    pub fn get(&self, coord: Coord) -> Option<Color> {
        if !coord.in_bounds(self.size) {
            return None;
        }
        self.cells[self.idx(coord)]
    }

    pub fn is_empty(&self, coord: Coord) -> bool {
        self.get(coord).is_none()
    }

    /// Iterate over all stones currently on the board, in row-major order.
    pub fn stones(&self) -> impl Iterator<Item = Stone> + '_ {
        self.cells.iter().enumerate().filter_map(move |(i, cell)| {
            cell.map(|color| {
                let coord = Coord::new(
                    (i % self.size as usize) as u8,
                    (i / self.size as usize) as u8,
                );
                Stone::new(coord, color)
            })
        })
    }

    pub fn stone_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    fn neighbors(&self, coord: Coord) -> SmallVec<[Coord; 4]> {
        let mut out = SmallVec::new();
        if coord.col > 0 {
            out.push(Coord::new(coord.col - 1, coord.row));
        }
        if coord.col + 1 < self.size {
            out.push(Coord::new(coord.col + 1, coord.row));
        }
        if coord.row > 0 {
            out.push(Coord::new(coord.col, coord.row - 1));
        }
        if coord.row + 1 < self.size {
            out.push(Coord::new(coord.col, coord.row + 1));
        }
        out
    }

    /// Place a setup stone directly, without capture resolution. An occupied
    /// point is overwritten, matching how records re-declare setup positions.
    pub fn place_setup(&mut self, stone: Stone) -> Result<(), MoveError> {
        if !stone.coord.in_bounds(self.size) {
            return Err(MoveError::OutOfBounds(stone.coord.col, stone.coord.row));
        }
        let idx = self.idx(stone.coord);
        self.cells[idx] = Some(stone.color);
        Ok(())
    }

    /// Apply one move, resolving captures, and return the resulting board.
    ///
    /// Opposite-color neighbor groups are flooded at most once each via a
    /// shared visited set. A move whose own group ends with zero liberties
    /// after removals — meaning it captured nothing — is rejected as suicide
    /// and the input board is untouched.
    pub fn apply_move(&self, stone: Stone) -> Result<Board, MoveError> {
        if !stone.coord.in_bounds(self.size) {
            return Err(MoveError::OutOfBounds(stone.coord.col, stone.coord.row));
        }
        if self.get(stone.coord).is_some() {
            return Err(MoveError::Occupied(stone.coord.col, stone.coord.row));
        }

        let mut next = self.clone();
        let idx = next.idx(stone.coord);
        next.cells[idx] = Some(stone.color);

        let opponent = stone.color.opponent();
        let mut visited = vec![false; next.cells.len()];
        let mut captured: Vec<usize> = Vec::new();

        for neighbor in next.neighbors(stone.coord) {
            let ni = next.idx(neighbor);
            if visited[ni] || next.cells[ni] != Some(opponent) {
                continue;
            }
            let (group, has_liberty) = next.flood_group(neighbor, &mut visited);
            if !has_liberty {
                captured.extend(group);
            }
        }

        for i in captured.iter() {
            next.cells[*i] = None;
        }

        // Own-group liberties are re-checked against the post-removal board.
        let mut own_visited = vec![false; next.cells.len()];
        let (_, has_liberty) = next.flood_group(stone.coord, &mut own_visited);
        if !has_liberty {
            return Err(MoveError::Suicide(stone.coord.col, stone.coord.row));
        }

        Ok(next)
    }

    /// Flood-fill the group containing `start`, marking every member in
    /// `visited`. Returns the member cell indices and whether the group has
    /// at least one liberty.
    fn flood_group(&self, start: Coord, visited: &mut [bool]) -> (Vec<usize>, bool) {
        let color = self.cells[self.idx(start)];
        debug_assert!(color.is_some());

        let mut stack = vec![start];
        let mut group = Vec::new();
        let mut has_liberty = false;
        visited[self.idx(start)] = true;

        while let Some(coord) = stack.pop() {
            group.push(self.idx(coord));
            for neighbor in self.neighbors(coord) {
                let ni = self.idx(neighbor);
                match self.cells[ni] {
                    None => has_liberty = true,
                    cell if cell == color && !visited[ni] => {
                        visited[ni] = true;
                        stack.push(neighbor);
                    }
                    _ => {}
                }
            }
        }

        (group, has_liberty)
    }

    /// Count the liberties of the group at `coord`. Zero if the point is
    /// empty.
    pub fn group_liberties(&self, coord: Coord) -> usize {
        let color = match self.get(coord) {
            Some(c) => c,
            None => return 0,
        };

        let mut stack = vec![coord];
        let mut visited = vec![false; self.cells.len()];
        let mut liberties = vec![false; self.cells.len()];
        visited[self.idx(coord)] = true;

        while let Some(c) = stack.pop() {
            for neighbor in self.neighbors(c) {
                let ni = self.idx(neighbor);
                match self.cells[ni] {
                    None => liberties[ni] = true,
                    Some(col) if col == color && !visited[ni] => {
                        visited[ni] = true;
                        stack.push(neighbor);
                    }
                    _ => {}
                }
            }
        }

        liberties.iter().filter(|l| **l).count()
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new(BOARD_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stone(col: u8, row: u8, color: Color) -> Stone {
        Stone::new(Coord::new(col, row), color)
    }

    fn board_with(stones: &[(u8, u8, Color)]) -> Board {
        let mut board = Board::default();
        for (col, row, color) in stones {
            board.place_setup(stone(*col, *row, *color)).unwrap();
        }
        board
    }

    #[test]
    fn test_single_stone_capture_on_fourth_surround() {
        // White at (5,5), Black on three sides; the fourth side captures.
        let board = board_with(&[
            (5, 5, Color::White),
            (4, 5, Color::Black),
            (6, 5, Color::Black),
            (5, 4, Color::Black),
        ]);
        assert_eq!(board.get(Coord::new(5, 5)), Some(Color::White));

        let after = board.apply_move(stone(5, 6, Color::Black)).unwrap();
        assert_eq!(after.get(Coord::new(5, 5)), None);
        assert_eq!(after.get(Coord::new(5, 6)), Some(Color::Black));
    }

    #[test]
    fn test_group_with_liberty_is_preserved() {
        // Two-stone white group with one remaining liberty survives intact.
        let board = board_with(&[
            (5, 5, Color::White),
            (6, 5, Color::White),
            (4, 5, Color::Black),
            (5, 4, Color::Black),
            (6, 4, Color::Black),
            (5, 6, Color::Black),
            (6, 6, Color::Black),
        ]);
        // (7,5) is still open; a non-filling black move captures nothing.
        let after = board.apply_move(stone(10, 10, Color::Black)).unwrap();
        assert_eq!(after.get(Coord::new(5, 5)), Some(Color::White));
        assert_eq!(after.get(Coord::new(6, 5)), Some(Color::White));
    }

    #[test]
    fn test_multi_stone_group_captured_entirely() {
        let board = board_with(&[
            (5, 5, Color::White),
            (6, 5, Color::White),
            (4, 5, Color::Black),
            (5, 4, Color::Black),
            (6, 4, Color::Black),
            (5, 6, Color::Black),
            (6, 6, Color::Black),
        ]);
        let after = board.apply_move(stone(7, 5, Color::Black)).unwrap();
        assert_eq!(after.get(Coord::new(5, 5)), None);
        assert_eq!(after.get(Coord::new(6, 5)), None);
    }

    #[test]
    fn test_corner_capture() {
        let board = board_with(&[(0, 0, Color::White), (1, 0, Color::Black)]);
        let after = board.apply_move(stone(0, 1, Color::Black)).unwrap();
        assert_eq!(after.get(Coord::new(0, 0)), None);
    }

    #[test]
    fn test_occupied_rejected_without_mutation() {
        let board = board_with(&[(3, 3, Color::Black)]);
        let err = board.apply_move(stone(3, 3, Color::White)).unwrap_err();
        assert_eq!(err, MoveError::Occupied(3, 3));
        assert_eq!(board.get(Coord::new(3, 3)), Some(Color::Black));
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let board = Board::default();
        let err = board.apply_move(stone(19, 0, Color::Black)).unwrap_err();
        assert_eq!(err, MoveError::OutOfBounds(19, 0));
    }

    #[test]
    fn test_suicide_rejected() {
        // Empty point at (0,0) whose only neighbors are white: playing black
        // there captures nothing and leaves the stone with no liberties.
        let board = board_with(&[(1, 0, Color::White), (0, 1, Color::White)]);
        let err = board.apply_move(stone(0, 0, Color::Black)).unwrap_err();
        assert_eq!(err, MoveError::Suicide(0, 0));
    }

    #[test]
    fn test_capture_takes_precedence_over_suicide() {
        // Black fills white's last liberty at (0,0); white (1,0) and (0,1)
        // enclose it, but (1,0) itself is down to its last liberty and dies,
        // so the move is legal.
        let board = board_with(&[
            (1, 0, Color::White),
            (0, 1, Color::White),
            (2, 0, Color::Black),
            (1, 1, Color::Black),
            (0, 2, Color::Black),
        ]);
        let after = board.apply_move(stone(0, 0, Color::Black)).unwrap();
        assert_eq!(after.get(Coord::new(1, 0)), None);
        assert_eq!(after.get(Coord::new(0, 1)), None);
        assert_eq!(after.get(Coord::new(0, 0)), Some(Color::Black));
    }

    #[test]
    fn test_group_shared_between_neighbors_scanned_once() {
        // A U-shaped white group touches the played point on three sides, so
        // the capture scan enters the same group from three neighbors. It
        // must be removed exactly once.
        let board = board_with(&[
            (5, 5, Color::White),
            (5, 6, Color::White),
            (6, 6, Color::White),
            (7, 6, Color::White),
            (7, 5, Color::White),
            (4, 5, Color::Black),
            (5, 4, Color::Black),
            (4, 6, Color::Black),
            (5, 7, Color::Black),
            (6, 7, Color::Black),
            (8, 6, Color::Black),
            (7, 7, Color::Black),
            (8, 5, Color::Black),
            (7, 4, Color::Black),
        ]);
        let after = board.apply_move(stone(6, 5, Color::Black)).unwrap();
        for (col, row) in [(5, 5), (5, 6), (6, 6), (7, 6), (7, 5)] {
            assert_eq!(after.get(Coord::new(col, row)), None);
        }
        assert_eq!(after.stone_count(), 10);
    }

    #[test]
    fn test_group_liberties() {
        let board = board_with(&[(5, 5, Color::White), (6, 5, Color::White)]);
        assert_eq!(board.group_liberties(Coord::new(5, 5)), 6);
        assert_eq!(board.group_liberties(Coord::new(0, 0)), 0);
    }

    #[test]
    fn test_setup_overwrites() {
        let mut board = Board::default();
        board.place_setup(stone(3, 3, Color::Black)).unwrap();
        board.place_setup(stone(3, 3, Color::White)).unwrap();
        assert_eq!(board.get(Coord::new(3, 3)), Some(Color::White));
        assert!(board.place_setup(stone(19, 19, Color::Black)).is_err());
    }

    #[test]
    fn test_apply_move_is_pure() {
        let board = board_with(&[
            (5, 5, Color::White),
            (4, 5, Color::Black),
            (6, 5, Color::Black),
            (5, 4, Color::Black),
        ]);
        let before = board.clone();
        let _ = board.apply_move(stone(5, 6, Color::Black)).unwrap();
        assert_eq!(board, before);
    }
}
