//! Sparse weight tables and afterstate evaluation.
//!
//! Four [`WeightTable`]s hold the network parameters. Each table is a
//! sparse map from feature key to value; keys never written read as 0.0.
//! The [`Evaluator`] sums the 32 looked-up weights of an afterstate and
//! applies TD updates to the same 32 entries.

use std::collections::HashMap;
use std::io::{self, Read, Write};

use crate::board::Board;
use crate::pattern::{FeatureContext, FeatureScheme, NUM_FEATURES, NUM_TABLES, TupleSet};

/// Sparse map from feature key to weight.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WeightTable {
    entries: HashMap<i32, f64>,
}

impl WeightTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Weight for `key`, 0.0 if never written.
    #[inline]
    pub fn get(&self, key: i32) -> f64 {
        self.entries.get(&key).copied().unwrap_or(0.0)
    }

    /// Overwrite the weight for `key`.
    pub fn set(&mut self, key: i32, value: f64) {
        self.entries.insert(key, value);
    }

    /// Add `delta` to the weight for `key`, creating it at 0.0 first.
    #[inline]
    pub fn accumulate(&mut self, key: i32, delta: f64) {
        *self.entries.entry(key).or_insert(0.0) += delta;
    }

    /// Number of entries ever written.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no entry has been written.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(key, weight)` in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (i32, f64)> + '_ {
        self.entries.iter().map(|(&k, &v)| (k, v))
    }

    /// Serialize as a `u64` entry count followed by `(i32 key, f64 value)`
    /// pairs in host byte order.
    ///
    /// Keys are written in ascending order so identical tables produce
    /// identical bytes.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let mut keys: Vec<i32> = self.entries.keys().copied().collect();
        keys.sort_unstable();

        writer.write_all(&(keys.len() as u64).to_ne_bytes())?;
        for key in keys {
            writer.write_all(&key.to_ne_bytes())?;
            writer.write_all(&self.get(key).to_ne_bytes())?;
        }
        Ok(())
    }

    /// Read a table written by [`WeightTable::write_to`].
    pub fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut count_buf = [0u8; 8];
        reader.read_exact(&mut count_buf)?;
        let count = u64::from_ne_bytes(count_buf);

        let mut entries = HashMap::new();
        let mut key_buf = [0u8; 4];
        let mut value_buf = [0u8; 8];
        for _ in 0..count {
            reader.read_exact(&mut key_buf)?;
            reader.read_exact(&mut value_buf)?;
            entries.insert(i32::from_ne_bytes(key_buf), f64::from_ne_bytes(value_buf));
        }
        Ok(Self { entries })
    }
}

/// N-tuple network evaluator.
///
/// Feature `k` (ordered `group * 4 + instance`) reads table `k % 4`, so
/// the 8 symmetric groups share 4 tables.
#[derive(Clone, Debug)]
pub struct Evaluator {
    tuples: TupleSet,
    scheme: FeatureScheme,
    tables: [WeightTable; NUM_TABLES],
}

impl Evaluator {
    /// Create an evaluator with all-zero weights.
    pub fn new(tuples: TupleSet, scheme: FeatureScheme) -> Self {
        Self {
            tuples,
            scheme,
            tables: Default::default(),
        }
    }

    /// Key scheme in use.
    pub fn scheme(&self) -> FeatureScheme {
        self.scheme
    }

    /// Tuple layout in use.
    pub fn tuples(&self) -> &TupleSet {
        &self.tuples
    }

    /// The four weight tables.
    pub fn tables(&self) -> &[WeightTable; NUM_TABLES] {
        &self.tables
    }

    /// Replace all four tables.
    pub fn set_tables(&mut self, tables: [WeightTable; NUM_TABLES]) {
        self.tables = tables;
    }

    /// Total entries across all tables.
    pub fn entry_count(&self) -> usize {
        self.tables.iter().map(WeightTable::len).sum()
    }

    /// The 32 feature keys for an afterstate.
    #[inline]
    pub fn keys(&self, board: &Board, context: Option<FeatureContext>) -> [i32; NUM_FEATURES] {
        self.tuples.extract_keys(board, self.scheme, context)
    }

    /// Sum of the 32 weights looked up for `board`.
    ///
    /// A board whose keys were never written evaluates to 0.0.
    ///
    /// # Examples
    ///
    /// ```
    /// use tritile::board::Board;
    /// use tritile::evaluator::Evaluator;
    /// use tritile::pattern::{FeatureScheme, TupleSet};
    ///
    /// let eval = Evaluator::new(TupleSet::default(), FeatureScheme::Base);
    /// assert_eq!(eval.evaluate(&Board::new(), None), 0.0);
    /// ```
    pub fn evaluate(&self, board: &Board, context: Option<FeatureContext>) -> f64 {
        self.keys(board, context)
            .iter()
            .enumerate()
            .map(|(k, &key)| self.tables[k % NUM_TABLES].get(key))
            .sum()
    }

    /// Add `delta` to each of the 32 entries of `board`.
    ///
    /// Symmetric boards can map several features onto the same entry;
    /// that entry then receives `delta` once per occurrence.
    pub fn update(&mut self, board: &Board, context: Option<FeatureContext>, delta: f64) {
        let keys = self.keys(board, context);
        for (k, &key) in keys.iter().enumerate() {
            self.tables[k % NUM_TABLES].accumulate(key, delta);
        }
    }
}
