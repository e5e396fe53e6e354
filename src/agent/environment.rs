//! Tile-placing environment.
//!
//! After every slide the environment drops one tile onto the edge the
//! slide uncovered: an upward slide opens the bottom row, a leftward slide
//! the right column, and so on. Before the episode's first slide (no
//! direction yet) any cell is eligible.
//!
//! Tiles come from a small bag of `{1, 2, 3}` that is reshuffled whenever
//! it runs dry. In the hint variant the bag holds four copies of each, a
//! rare bonus tile appears once the board has grown, and the next tile is
//! drawn one step early so the player can see it.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::agent::Action;
use crate::agent::baseline::seeded_rng;
use crate::board::{BOARD_CELLS, Board, Direction};
use crate::config::{AgentConfig, ConfigError};
use crate::learning::LearningError;
use crate::pattern::FeatureScheme;

/// Placements made before the first slide.
pub const INITIAL_TILES: usize = 9;

/// Smallest board maximum at which bonus tiles can appear.
pub const BONUS_THRESHOLD: u8 = 7;

/// Bonus tile probability, as `numerator / denominator`.
pub const BONUS_ODDS: (u32, u32) = (1, 21);

/// Tiles in one bag copy.
pub const BAG_TILES: [u8; 3] = [1, 2, 3];

const ALL_CELLS: [u8; BOARD_CELLS] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15];
const TOP_EDGE: [u8; 4] = [0, 1, 2, 3];
const BOTTOM_EDGE: [u8; 4] = [12, 13, 14, 15];
const LEFT_EDGE: [u8; 4] = [0, 4, 8, 12];
const RIGHT_EDGE: [u8; 4] = [3, 7, 11, 15];

/// Cells eligible for the next tile after a slide in `last_move`.
///
/// # Examples
///
/// ```
/// use tritile::agent::candidate_cells;
/// use tritile::board::Direction;
///
/// assert_eq!(candidate_cells(Some(Direction::Up)), &[12, 13, 14, 15]);
/// assert_eq!(candidate_cells(None).len(), 16);
/// ```
pub fn candidate_cells(last_move: Option<Direction>) -> &'static [u8] {
    match last_move {
        Some(Direction::Up) => &BOTTOM_EDGE,
        Some(Direction::Down) => &TOP_EDGE,
        Some(Direction::Right) => &LEFT_EDGE,
        Some(Direction::Left) => &RIGHT_EDGE,
        None => &ALL_CELLS,
    }
}

/// Finite multiset of basic tiles, drawn without replacement.
#[derive(Clone, Debug)]
pub struct TileBag {
    copies: usize,
    tiles: Vec<u8>,
}

impl TileBag {
    /// Bag holding `copies` of each of 1, 2, 3.
    pub fn new(copies: usize) -> Self {
        Self {
            copies: copies.max(1),
            tiles: Vec::with_capacity(copies.max(1) * BAG_TILES.len()),
        }
    }

    /// Tiles per full bag.
    pub fn capacity(&self) -> usize {
        self.copies * BAG_TILES.len()
    }

    /// Tiles left before the next refill.
    pub fn remaining(&self) -> usize {
        self.tiles.len()
    }

    /// Draw one tile, refilling and shuffling first if empty.
    pub fn draw<R: Rng + ?Sized>(&mut self, rng: &mut R) -> u8 {
        if self.tiles.is_empty() {
            for _ in 0..self.copies {
                self.tiles.extend_from_slice(&BAG_TILES);
            }
            self.tiles.shuffle(rng);
        }
        // Refilled above, so never empty here.
        self.tiles.pop().unwrap_or(BAG_TILES[0])
    }

    /// Empty the bag; the next draw refills it.
    pub fn reset(&mut self) {
        self.tiles.clear();
    }
}

/// The environment side of an episode.
#[derive(Debug)]
pub struct Environment {
    config: AgentConfig,
    rng: StdRng,
    bag: TileBag,
    bonus_enabled: bool,
    next_tile: Option<u8>,
}

impl Environment {
    /// Build from a `key=value` argument string.
    ///
    /// `features=hint` selects the hint variant. `bag=N` overrides the
    /// number of copies of each tile in the bag.
    pub fn new(args: &str) -> Result<Self, LearningError> {
        let config = AgentConfig::with_defaults("name=random role=environment", args)?;
        let hint_variant = config.features == FeatureScheme::Hint;

        let copies = match config.property("bag") {
            Ok(value) => value.parse::<usize>().map_err(|_| ConfigError::InvalidValue {
                key: "bag".to_string(),
                value,
            })?,
            Err(_) if hint_variant => 4,
            Err(_) => 1,
        };

        Ok(Self {
            rng: seeded_rng(config.seed),
            bag: TileBag::new(copies),
            bonus_enabled: hint_variant,
            next_tile: None,
            config,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn bag(&self) -> &TileBag {
        &self.bag
    }

    /// Reset per-episode state.
    pub fn open_episode(&mut self) {
        self.bag.reset();
        self.next_tile = None;
    }

    /// The tile that the next [`Environment::place`] will use, drawing it
    /// now if it has not been drawn yet.
    pub fn hint(&mut self, board: &Board) -> u8 {
        match self.next_tile {
            Some(tile) => tile,
            None => {
                let tile = self.draw_tile(board);
                self.next_tile = Some(tile);
                tile
            }
        }
    }

    /// Choose where and what to place on `board`.
    ///
    /// Eligible cells follow `board.last_move()`. Returns [`Action::Null`]
    /// if every eligible cell is occupied.
    pub fn place(&mut self, board: &Board) -> Action {
        let mut cells = [0u8; BOARD_CELLS];
        let candidates = candidate_cells(board.last_move());
        let cells = &mut cells[..candidates.len()];
        cells.copy_from_slice(candidates);
        cells.shuffle(&mut self.rng);

        let Some(&position) = cells.iter().find(|&&pos| board.cell(pos as usize) == 0) else {
            return Action::Null;
        };

        let tile = match self.next_tile.take() {
            Some(tile) => tile,
            None => self.draw_tile(board),
        };
        Action::Place { position, tile }
    }

    fn draw_tile(&mut self, board: &Board) -> u8 {
        let max = board.max_tile();
        if self.bonus_enabled
            && max >= BONUS_THRESHOLD
            && self.rng.random_ratio(BONUS_ODDS.0, BONUS_ODDS.1)
        {
            return self.rng.random_range(4..=max - 3);
        }
        self.bag.draw(&mut self.rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_bag_yields_each_tile_once_per_cycle() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut bag = TileBag::new(1);
        for _ in 0..10 {
            let mut cycle: Vec<u8> = (0..3).map(|_| bag.draw(&mut rng)).collect();
            cycle.sort_unstable();
            assert_eq!(cycle, vec![1, 2, 3]);
            assert_eq!(bag.remaining(), 0);
        }
    }

    #[test]
    fn test_twelve_tile_bag() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut bag = TileBag::new(4);
        assert_eq!(bag.capacity(), 12);
        let mut counts = [0usize; 4];
        for _ in 0..12 {
            counts[bag.draw(&mut rng) as usize] += 1;
        }
        assert_eq!(&counts[1..], &[4, 4, 4]);
    }

    #[test]
    fn test_opening_placement_uses_any_cell() {
        let mut env = Environment::new("seed=9").unwrap();
        let mut board = Board::new();
        for _ in 0..INITIAL_TILES {
            let action = env.place(&board);
            assert!(action.apply(&mut board).is_some());
        }
        assert_eq!(board.empty_count(), BOARD_CELLS - INITIAL_TILES);
    }

    #[test]
    fn test_placement_on_uncovered_edge() {
        let mut env = Environment::new("seed=4").unwrap();
        let mut board = Board::from_cells([0, 0, 0, 0, 0, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        board.slide(Direction::Left);
        for _ in 0..30 {
            match env.place(&board) {
                Action::Place { position, .. } => assert!(RIGHT_EDGE.contains(&position)),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_full_edge_yields_null() {
        let mut env = Environment::new("seed=4").unwrap();
        let mut board = Board::from_cells([0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 3, 1, 3, 0]);
        board.slide(Direction::Right);
        // Row 3 shifted right; the left edge now has an empty cell at 12.
        assert_eq!(board.cell(12), 0);
        assert!(matches!(env.place(&board), Action::Place { position: 0 | 4 | 8 | 12, .. }));

        let mut blocked = Board::from_cells([1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 3]);
        assert_eq!(blocked.slide(Direction::Up), Some(0));
        // Up uncovers the bottom row; fill it to leave nothing to place on.
        for pos in 13..16 {
            assert!(blocked.place(pos, 3));
        }
        assert_eq!(env.place(&blocked), Action::Null);
    }

    #[test]
    fn test_hint_is_the_next_placed_tile() {
        let mut env = Environment::new("seed=21 features=hint").unwrap();
        assert_eq!(env.bag().capacity(), 12);
        let board = Board::new();
        for _ in 0..20 {
            let hint = env.hint(&board);
            assert_eq!(env.hint(&board), hint, "hint must be stable until placed");
            match env.place(&board) {
                Action::Place { tile, .. } => assert_eq!(tile, hint),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_bonus_tiles_in_range() {
        let mut env = Environment::new("seed=8 features=hint").unwrap();
        let board = Board::from_cells([9, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        let mut bonus = 0;
        for _ in 0..2000 {
            let tile = env.draw_tile(&board);
            assert!((1..=6).contains(&tile), "tile {} out of range", tile);
            if tile >= 4 {
                bonus += 1;
            }
        }
        // Expected about 2000 / 21 = 95.
        assert!((40..=160).contains(&bonus), "bonus count {}", bonus);
    }

    #[test]
    fn test_base_variant_never_gives_bonus() {
        let mut env = Environment::new("seed=8").unwrap();
        let board = Board::from_cells([12, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        for _ in 0..500 {
            assert!(env.draw_tile(&board) <= 3);
        }
    }

    #[test]
    fn test_invalid_bag_size() {
        assert!(Environment::new("bag=many").is_err());
        assert_eq!(Environment::new("bag=2").unwrap().bag().capacity(), 6);
    }
}
