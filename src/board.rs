//! Threes board engine: 4x4 tile-index grid with slide and place operations.
//!
//! Cells hold tile *indices* rather than face values:
//!
//! | index | 0 | 1 | 2 | 3 | 4 | 5 | ... | k |
//! |-------|---|---|---|---|---|---|-----|---|
//! | face  | - | 1 | 2 | 3 | 6 | 12 | ... | 3 * 2^(k-3) |
//!
//! Cell `i` sits at row `i / 4`, column `i % 4`.

use std::fmt;
use std::ops::Index;

/// Number of cells on the board.
pub const BOARD_CELLS: usize = 16;

/// Board width and height.
pub const BOARD_SIZE: usize = 4;

/// Highest tile index the engine will ever create.
///
/// Keeps every cell inside the 4-bit packing used by the feature hash.
pub const MAX_TILE: u8 = 15;

/// Slide direction.
///
/// The numeric code (0-3) is the action encoding used on the wire and in
/// the extended feature key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Direction {
    /// Slide toward row 0
    Up = 0,
    /// Slide toward column 3
    Right = 1,
    /// Slide toward row 3
    Down = 2,
    /// Slide toward column 0
    Left = 3,
}

impl Direction {
    /// All four directions in code order.
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Right,
        Direction::Down,
        Direction::Left,
    ];

    /// 2-bit direction code.
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decode a direction code.
    ///
    /// # Examples
    ///
    /// ```
    /// use tritile::board::Direction;
    ///
    /// assert_eq!(Direction::from_code(2), Some(Direction::Down));
    /// assert_eq!(Direction::from_code(4), None);
    /// ```
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Direction::Up),
            1 => Some(Direction::Right),
            2 => Some(Direction::Down),
            3 => Some(Direction::Left),
            _ => None,
        }
    }

    /// The opposite direction.
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Right => Direction::Left,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
        }
    }

    /// Short symbol used in logs (`#U`, `#R`, `#D`, `#L`).
    pub fn symbol(self) -> &'static str {
        match self {
            Direction::Up => "#U",
            Direction::Right => "#R",
            Direction::Down => "#D",
            Direction::Left => "#L",
        }
    }

    /// Cell indices of line `line` (0-3), ordered from the edge the tiles
    /// slide toward to the far edge.
    #[inline]
    fn line(self, line: usize) -> [usize; 4] {
        match self {
            Direction::Up => [line, line + 4, line + 8, line + 12],
            Direction::Down => [line + 12, line + 8, line + 4, line],
            Direction::Left => [line * 4, line * 4 + 1, line * 4 + 2, line * 4 + 3],
            Direction::Right => [line * 4 + 3, line * 4 + 2, line * 4 + 1, line * 4],
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Face value of a tile index.
///
/// # Examples
///
/// ```
/// use tritile::board::tile_value;
///
/// assert_eq!(tile_value(0), 0);
/// assert_eq!(tile_value(2), 2);
/// assert_eq!(tile_value(3), 3);
/// assert_eq!(tile_value(7), 48);
/// ```
#[inline]
pub fn tile_value(tile: u8) -> u32 {
    match tile {
        0..=2 => tile as u32,
        k => 3 << (k - 3),
    }
}

/// Score contributed by a tile: `3^(k-2)` for indices of 3 and up, zero
/// for the 1 and 2 tiles.
#[inline]
pub fn tile_score(tile: u8) -> u32 {
    if tile >= 3 {
        3u32.pow(tile as u32 - 2)
    } else {
        0
    }
}

/// Result of pushing `moving` onto `target`.
#[inline]
fn merge(target: u8, moving: u8) -> Option<u8> {
    match (target, moving) {
        (1, 2) | (2, 1) => Some(3),
        (a, b) if a == b && a >= 3 && a < MAX_TILE => Some(a + 1),
        _ => None,
    }
}

/// Slide one line toward index 0. Returns true if anything moved.
///
/// The first tile that can move (into a gap or through a merge) advances
/// one cell and drags every tile behind it along.
fn slide_line(line: &mut [u8; 4]) -> bool {
    for i in 1..4 {
        if line[i] == 0 {
            continue;
        }
        let target = line[i - 1];
        let landed = if target == 0 {
            line[i]
        } else if let Some(merged) = merge(target, line[i]) {
            merged
        } else {
            continue;
        };
        line[i - 1] = landed;
        line.copy_within(i + 1.., i);
        line[3] = 0;
        return true;
    }
    false
}

/// Threes board.
///
/// Copy-sized (17 bytes) so the policy can probe every direction on a
/// private copy.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Board {
    cells: [u8; BOARD_CELLS],
    last_move: Option<Direction>,
}

impl Board {
    /// Empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a board from raw tile indices (row-major).
    ///
    /// Values above [`MAX_TILE`] are clamped.
    pub fn from_cells(cells: [u8; BOARD_CELLS]) -> Self {
        let mut board = Self::new();
        for (dst, src) in board.cells.iter_mut().zip(cells) {
            *dst = src.min(MAX_TILE);
        }
        board
    }

    /// Raw cells (row-major).
    #[inline]
    pub fn cells(&self) -> &[u8; BOARD_CELLS] {
        &self.cells
    }

    /// Tile index at `pos`.
    #[inline]
    pub fn cell(&self, pos: usize) -> u8 {
        self.cells[pos]
    }

    /// Direction of the slide that produced the current state, if any.
    #[inline]
    pub fn last_move(&self) -> Option<Direction> {
        self.last_move
    }

    /// Largest tile index on the board.
    pub fn max_tile(&self) -> u8 {
        self.cells.iter().copied().max().unwrap_or(0)
    }

    /// Number of empty cells.
    pub fn empty_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c == 0).count()
    }

    /// Game score of the board.
    pub fn score(&self) -> u32 {
        self.cells.iter().map(|&c| tile_score(c)).sum()
    }

    /// Apply a slide.
    ///
    /// Returns the merge reward (score gained), or `None` when the slide
    /// changes no cell. An illegal slide leaves the board untouched.
    ///
    /// # Examples
    ///
    /// ```
    /// use tritile::board::{Board, Direction};
    ///
    /// let mut board = Board::from_cells([
    ///     1, 2, 0, 0,
    ///     0, 0, 0, 0,
    ///     0, 0, 0, 0,
    ///     0, 0, 0, 0,
    /// ]);
    /// assert_eq!(board.slide(Direction::Up), None);
    /// assert_eq!(board.slide(Direction::Left), Some(3));
    /// assert_eq!(board.cell(0), 3);
    /// assert_eq!(board.last_move(), Some(Direction::Left));
    /// ```
    pub fn slide(&mut self, dir: Direction) -> Option<u32> {
        let before = self.score();
        let mut moved = false;

        for line_idx in 0..BOARD_SIZE {
            let idx = dir.line(line_idx);
            let mut line = idx.map(|i| self.cells[i]);
            if slide_line(&mut line) {
                moved = true;
                for (k, &i) in idx.iter().enumerate() {
                    self.cells[i] = line[k];
                }
            }
        }

        if !moved {
            return None;
        }
        self.last_move = Some(dir);
        Some(self.score() - before)
    }

    /// Place `tile` at `pos`. Fails (returns false) on an occupied cell,
    /// an out-of-range position, or an invalid tile index.
    pub fn place(&mut self, pos: usize, tile: u8) -> bool {
        if pos >= BOARD_CELLS || tile == 0 || tile > MAX_TILE || self.cells[pos] != 0 {
            return false;
        }
        self.cells[pos] = tile;
        true
    }

    /// Whether `dir` is a legal slide.
    pub fn can_slide(&self, dir: Direction) -> bool {
        let mut probe = *self;
        probe.slide(dir).is_some()
    }

    /// True when no direction is legal.
    pub fn is_terminal(&self) -> bool {
        !Direction::ALL.iter().any(|&dir| self.can_slide(dir))
    }
}

impl Index<usize> for Board {
    type Output = u8;

    fn index(&self, pos: usize) -> &u8 {
        &self.cells[pos]
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Board")
            .field("cells", &self.cells)
            .field("last_move", &self.last_move)
            .finish()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "+------------------------+")?;
        for row in self.cells.chunks(BOARD_SIZE) {
            write!(f, "|")?;
            for &tile in row {
                write!(f, "{:>6}", tile_value(tile))?;
            }
            writeln!(f, "|")?;
        }
        write!(f, "+------------------------+")
    }
}
