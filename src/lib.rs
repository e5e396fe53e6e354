//! tritile - n-tuple network TD(0) self-play for Threes
//!
//! - [`board`]: 4x4 Threes board, slides and placements
//! - [`pattern`]: 6-cell tuple layout and feature keys
//! - [`evaluator`]: sparse weight tables and the value function
//! - [`config`]: `key=value` agent arguments
//! - [`agent`]: the TD player, baselines, and the tile-placing environment
//! - [`learning`]: TD updates, episodes, weight files, snapshots, training loop

pub mod agent;
pub mod board;
pub mod config;
pub mod evaluator;
pub mod learning;
pub mod pattern;
