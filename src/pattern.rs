//! Tuple definitions and feature hashing.
//!
//! The network reads the board through 8 groups of 4 six-cell tuples.
//! Every group is a symmetry image (rotation or reflection) of group 0,
//! so instance `j` of each group sees the "same" part of the board from a
//! different orientation. Instance `j` of every group reads and writes
//! weight table `j`, which ties the 8 orientations onto 4 physical tables.
//!
//! # Key schemes
//!
//! - [`FeatureScheme::Base`]: the six tile indices packed as hex digits
//!   (24 bits).
//! - [`FeatureScheme::Hint`]: the base key shifted left by 6 bits with
//!   `(direction << 4) | hint` in the low bits (30 bits).

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

use crate::board::{BOARD_CELLS, BOARD_SIZE, Board, Direction, MAX_TILE};

/// Number of tuple groups (orientations).
pub const NUM_GROUPS: usize = 8;

/// Tuples per group; also the number of physical weight tables.
pub const NUM_INSTANCES: usize = 4;

/// Cells per tuple.
pub const TUPLE_LEN: usize = 6;

/// Feature lookups per evaluation (8 groups x 4 instances).
pub const NUM_FEATURES: usize = NUM_GROUPS * NUM_INSTANCES;

/// Number of physical weight tables.
pub const NUM_TABLES: usize = NUM_INSTANCES;

/// Six board positions read in order.
pub type Tuple = [u8; TUPLE_LEN];

/// Group 0 of the default layout; the other seven groups are its
/// symmetry images.
pub const BASE_TUPLES: [Tuple; NUM_INSTANCES] = [
    [0, 1, 2, 3, 4, 5],
    [4, 5, 6, 7, 8, 9],
    [7, 6, 5, 11, 10, 9],
    [15, 14, 13, 11, 10, 9],
];

/// Tuple loading and validation errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TupleError {
    /// A tuple references a cell outside the board
    #[error("Invalid tuple position: {0}")]
    InvalidPosition(u8),

    /// A CSV row has the wrong number of cells, or a group/instance is
    /// missing, duplicated, or out of range
    #[error("Tuple layout mismatch: {0}")]
    ShapeMismatch(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(String),

    /// CSV parse error
    #[error("CSV parse error: {0}")]
    Csv(String),
}

/// Symmetry of the 4x4 board, in the group order of the default layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Symmetry {
    /// Identity
    Identity,
    /// 90 degrees clockwise
    Rotate90,
    /// 180 degrees
    Rotate180,
    /// 270 degrees clockwise
    Rotate270,
    /// Mirror across the vertical axis
    MirrorColumns,
    /// Mirror across the anti-diagonal
    AntiTranspose,
    /// Mirror across the horizontal axis
    MirrorRows,
    /// Mirror across the main diagonal
    Transpose,
}

impl Symmetry {
    /// All eight symmetries; index `g` produces tuple group `g`.
    pub const ALL: [Symmetry; NUM_GROUPS] = [
        Symmetry::Identity,
        Symmetry::Rotate90,
        Symmetry::Rotate180,
        Symmetry::Rotate270,
        Symmetry::MirrorColumns,
        Symmetry::AntiTranspose,
        Symmetry::MirrorRows,
        Symmetry::Transpose,
    ];

    /// Image of cell `pos` under this symmetry.
    #[inline]
    pub fn apply(self, pos: u8) -> u8 {
        let n = BOARD_SIZE as u8 - 1;
        let (r, c) = (pos / 4, pos % 4);
        let (r, c) = match self {
            Symmetry::Identity => (r, c),
            Symmetry::Rotate90 => (c, n - r),
            Symmetry::Rotate180 => (n - r, n - c),
            Symmetry::Rotate270 => (n - c, r),
            Symmetry::MirrorColumns => (r, n - c),
            Symmetry::AntiTranspose => (n - c, n - r),
            Symmetry::MirrorRows => (n - r, c),
            Symmetry::Transpose => (c, r),
        };
        r * 4 + c
    }
}

/// Which feature key scheme the network uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FeatureScheme {
    /// Afterstate only (24-bit keys)
    #[default]
    Base,
    /// Afterstate plus move direction and next-tile hint (30-bit keys)
    Hint,
}

impl FromStr for FeatureScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "base" => Ok(FeatureScheme::Base),
            "hint" => Ok(FeatureScheme::Hint),
            other => Err(format!("unknown feature scheme '{}'", other)),
        }
    }
}

impl fmt::Display for FeatureScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureScheme::Base => write!(f, "base"),
            FeatureScheme::Hint => write!(f, "hint"),
        }
    }
}

/// Move and hint context folded into extended keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeatureContext {
    /// Slide that produced the afterstate
    pub direction: Direction,
    /// Tile index the environment will place next
    pub hint: u8,
}

impl FeatureContext {
    /// Create a new context.
    pub fn new(direction: Direction, hint: u8) -> Self {
        Self { direction, hint }
    }

    /// The 6 low bits of an extended key.
    #[inline]
    pub fn bits(&self) -> u32 {
        debug_assert!(self.hint <= MAX_TILE, "hint {} exceeds 4 bits", self.hint);
        ((self.direction.code() as u32) << 4) | (self.hint as u32 & 0xF)
    }
}

/// Pack the six cells of `tuple` into a 24-bit key.
///
/// # Examples
///
/// ```
/// use tritile::board::Board;
/// use tritile::pattern::tuple_key;
///
/// let board = Board::from_cells([1, 2, 3, 4, 5, 6, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
/// assert_eq!(tuple_key(&board, &[0, 1, 2, 3, 4, 5]), 0x123456);
/// ```
#[inline]
pub fn tuple_key(board: &Board, tuple: &Tuple) -> u32 {
    tuple.iter().fold(0u32, |key, &pos| {
        let tile = board.cell(pos as usize);
        debug_assert!(tile <= MAX_TILE, "tile {} exceeds 4 bits", tile);
        key * 16 + tile as u32
    })
}

/// Lookup key of one tuple under `scheme`.
///
/// The hint scheme without a context (an afterstate nobody moved into)
/// uses zero for the six context bits.
#[inline]
pub fn feature_key(
    board: &Board,
    tuple: &Tuple,
    scheme: FeatureScheme,
    context: Option<FeatureContext>,
) -> i32 {
    let base = tuple_key(board, tuple);
    let key = match scheme {
        FeatureScheme::Base => base,
        FeatureScheme::Hint => (base << 6) | context.map_or(0, |ctx| ctx.bits()),
    };
    key as i32
}

/// Static tuple layout: 8 groups x 4 instances x 6 cells.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TupleSet {
    groups: [[Tuple; NUM_INSTANCES]; NUM_GROUPS],
}

/// CSV row: `group,instance,cells` with cells whitespace-separated.
#[derive(Debug, Deserialize)]
struct TupleCsv {
    group: usize,
    instance: usize,
    cells: String,
}

impl TupleSet {
    /// Expand `base` (group 0) into all 8 groups via [`Symmetry::ALL`].
    pub fn from_base(base: [Tuple; NUM_INSTANCES]) -> Result<Self, TupleError> {
        validate_tuples(&base)?;
        let groups = Symmetry::ALL.map(|sym| base.map(|tuple| tuple.map(|pos| sym.apply(pos))));
        Ok(Self { groups })
    }

    /// Use an explicit layout.
    pub fn from_groups(groups: [[Tuple; NUM_INSTANCES]; NUM_GROUPS]) -> Result<Self, TupleError> {
        for group in &groups {
            validate_tuples(group)?;
        }
        Ok(Self { groups })
    }

    /// Load a layout from CSV (`group,instance,cells`), one row per tuple.
    ///
    /// Every (group, instance) pair must appear exactly once.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self, TupleError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TupleError::Io(format!("File not found: {}", path.display())));
        }

        let mut reader = csv::Reader::from_path(path)
            .map_err(|e| TupleError::Csv(format!("Failed to open CSV: {}", e)))?;

        let mut groups = [[[0u8; TUPLE_LEN]; NUM_INSTANCES]; NUM_GROUPS];
        let mut seen = [[false; NUM_INSTANCES]; NUM_GROUPS];

        for (idx, result) in reader.deserialize().enumerate() {
            let record: TupleCsv = result.map_err(|e| {
                TupleError::Csv(format!("Failed to parse CSV at line {}: {}", idx + 2, e))
            })?;

            if record.group >= NUM_GROUPS || record.instance >= NUM_INSTANCES {
                return Err(TupleError::ShapeMismatch(format!(
                    "group {} instance {} out of range",
                    record.group, record.instance
                )));
            }
            if seen[record.group][record.instance] {
                return Err(TupleError::ShapeMismatch(format!(
                    "group {} instance {} defined twice",
                    record.group, record.instance
                )));
            }

            let cells = record
                .cells
                .split_whitespace()
                .map(|tok| {
                    tok.parse::<u8>()
                        .map_err(|_| TupleError::Csv(format!("Invalid cell '{}'", tok)))
                })
                .collect::<Result<Vec<u8>, TupleError>>()?;

            let tuple: Tuple = cells.try_into().map_err(|v: Vec<u8>| {
                TupleError::ShapeMismatch(format!(
                    "group {} instance {}: expected {} cells, found {}",
                    record.group,
                    record.instance,
                    TUPLE_LEN,
                    v.len()
                ))
            })?;

            groups[record.group][record.instance] = tuple;
            seen[record.group][record.instance] = true;
        }

        if let Some(g) = seen.iter().position(|row| row.iter().any(|&s| !s)) {
            return Err(TupleError::ShapeMismatch(format!("group {} is incomplete", g)));
        }

        Self::from_groups(groups)
    }

    /// Cells of instance `instance` in group `group`.
    #[inline]
    pub fn cells(&self, group: usize, instance: usize) -> &Tuple {
        &self.groups[group][instance]
    }

    /// Iterate `(group, instance, cells)` in group-major order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &Tuple)> {
        self.groups.iter().enumerate().flat_map(|(g, group)| {
            group
                .iter()
                .enumerate()
                .map(move |(j, tuple)| (g, j, tuple))
        })
    }

    /// All 32 keys for `board`, indexed `group * 4 + instance`.
    ///
    /// Key `k` belongs to weight table `k % 4`.
    pub fn extract_keys(
        &self,
        board: &Board,
        scheme: FeatureScheme,
        context: Option<FeatureContext>,
    ) -> [i32; NUM_FEATURES] {
        let mut keys = [0i32; NUM_FEATURES];
        self.extract_keys_into(board, scheme, context, &mut keys);
        keys
    }

    /// Write the 32 keys into a caller-owned buffer.
    pub fn extract_keys_into(
        &self,
        board: &Board,
        scheme: FeatureScheme,
        context: Option<FeatureContext>,
        out: &mut [i32; NUM_FEATURES],
    ) {
        for (g, j, tuple) in self.iter() {
            out[g * NUM_INSTANCES + j] = feature_key(board, tuple, scheme, context);
        }
    }
}

impl Default for TupleSet {
    fn default() -> Self {
        let groups = Symmetry::ALL.map(|sym| BASE_TUPLES.map(|tuple| tuple.map(|pos| sym.apply(pos))));
        Self { groups }
    }
}

fn validate_tuples(tuples: &[Tuple]) -> Result<(), TupleError> {
    for tuple in tuples {
        if let Some(&pos) = tuple.iter().find(|&&pos| pos as usize >= BOARD_CELLS) {
            return Err(TupleError::InvalidPosition(pos));
        }
    }
    Ok(())
}
