//! TD(0) self-play learning.
//!
//! # Overview
//!
//! After every episode the player replays its afterstates backwards and
//! moves each one's value toward the reward plus value of the afterstate
//! that followed it. The final afterstate is moved toward zero.
//!
//! # Architecture
//!
//! ```text
//! TrainingEngine
//!     |-- play_episode (player/environment lockstep)
//!     |       |-- Player::act          -> EpisodeBuffer::push
//!     |       |-- Environment::place
//!     |-- Player::observe_outcome
//!     |       |-- TdLearner::update    (drains EpisodeBuffer)
//!     |-- SnapshotManager (optional periodic weight snapshots)
//!     |-- TrainingLogger  (block statistics)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use tritile::learning::{TrainingConfig, TrainingEngine};
//!
//! let config = TrainingConfig::default();
//! let mut engine = TrainingEngine::new(config)?;
//! let stats = engine.run()?;
//! engine.finish()?;
//! println!("{} episodes", stats.episodes);
//! # Ok::<(), tritile::learning::LearningError>(())
//! ```

use thiserror::Error;

use crate::config::ConfigError;
use crate::pattern::TupleError;

pub mod checkpoint;
pub mod error_handler;
pub mod game_history;
pub mod logger;
pub mod self_play;
pub mod td_learner;
pub mod training_engine;

pub use checkpoint::{
    SNAPSHOT_MAGIC, SnapshotHeader, SnapshotManager, load_weights, read_weights, save_weights,
    write_weights,
};
pub use error_handler::{is_divergent, save_with_retry};
pub use game_history::{EpisodeBuffer, Transition};
pub use logger::{BlockStats, TrainingLogger};
pub use self_play::{EpisodeResult, play_episode};
pub use td_learner::{TdLearner, TdUpdateStats};
pub use training_engine::{TrainingConfig, TrainingEngine, TrainingStats};

/// Learning system error type.
///
/// # Recovery
///
/// | Variant | Recovery |
/// |---------|----------|
/// | `Io` | Fatal for the weight file; retried once for snapshots |
/// | `InvalidWeights` | Report, abort construction |
/// | `InvalidSnapshot` | Report, fall back to an older snapshot or a fresh start |
/// | `Config` / `Tuples` | Report configuration issue, abort |
/// | `EvaluationDivergence` | Log warning, keep training |
/// | `Interrupted` | Persist weights, exit |
#[derive(Error, Debug)]
pub enum LearningError {
    /// I/O errors (weight file, snapshots, logs)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Weight file truncated or with the wrong number of tables
    #[error("Invalid weight file: {0}")]
    InvalidWeights(String),

    /// Snapshot with bad magic, version, or checksum
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// Agent configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Tuple layout error
    #[error("Tuple layout error: {0}")]
    Tuples(#[from] TupleError),

    /// Weights became NaN or infinite
    #[error("Evaluation diverged: {0}")]
    EvaluationDivergence(String),

    /// Training interrupted (SIGINT/SIGTERM)
    #[error("Training interrupted")]
    Interrupted,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let learning_err: LearningError = io_err.into();
        assert!(matches!(learning_err, LearningError::Io(_)));
    }

    #[test]
    fn test_config_error_conversion() {
        let err: LearningError = ConfigError::MissingKey("save".to_string()).into();
        assert!(err.to_string().contains("Configuration"));
        assert!(err.to_string().contains("save"));
    }

    #[test]
    fn test_tuple_error_conversion() {
        let err: LearningError = TupleError::InvalidPosition(20).into();
        assert!(matches!(err, LearningError::Tuples(_)));
    }

    #[test]
    fn test_invalid_weights_message() {
        let err = LearningError::InvalidWeights("expected 4 tables, found 2".to_string());
        assert!(err.to_string().contains("weight file"));
    }

    #[test]
    fn test_interrupted_error() {
        assert!(LearningError::Interrupted.to_string().contains("interrupted"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<LearningError>();
        assert_sync::<LearningError>();
    }
}
