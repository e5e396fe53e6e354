//! TD-learning player.
//!
//! # Overview
//!
//! Forward policy: for each legal slide, score it as
//! `reward + V(afterstate)` and keep the strictly best one (the first legal
//! slide seeds the maximum, ties keep the earlier direction). The chosen
//! afterstate is recorded in the episode buffer, and at episode end the
//! [`TdLearner`] replays the buffer backwards.
//!
//! Weights are loaded from `load=` at construction and written to `save=`
//! by [`Player::persist`], or on drop if training happened since the last
//! save.

use crate::agent::{Action, EpisodeOutcome, Player};
use crate::board::{Board, Direction};
use crate::config::AgentConfig;
use crate::evaluator::{Evaluator, WeightTable};
use crate::learning::checkpoint::{load_weights, save_weights};
use crate::learning::game_history::{EpisodeBuffer, Transition};
use crate::learning::td_learner::{TdLearner, TdUpdateStats};
use crate::learning::LearningError;
use crate::pattern::{FeatureContext, TupleSet};

const DEFAULT_ARGS: &str = "name=td role=player";

/// Slide chosen by the policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MoveChoice {
    /// Winning direction
    pub direction: Direction,
    /// Afterstate it produces
    pub after: Board,
    /// Merge reward
    pub reward: u32,
    /// Context folded into the afterstate's keys
    pub context: Option<FeatureContext>,
    /// `reward + V(after)`
    pub value: f64,
}

/// N-tuple TD(0) player.
#[derive(Debug)]
pub struct TdPlayer {
    config: AgentConfig,
    evaluator: Evaluator,
    learner: TdLearner,
    buffer: EpisodeBuffer,
    dirty: bool,
}

impl TdPlayer {
    /// Build from a `key=value` argument string.
    ///
    /// # Errors
    ///
    /// - `LearningError::Config` on malformed arguments
    /// - `LearningError::Tuples` if `tuples=` cannot be loaded
    /// - `LearningError::Io` / `InvalidWeights` if `load=` cannot be read
    pub fn new(args: &str) -> Result<Self, LearningError> {
        Self::from_config(AgentConfig::with_defaults(DEFAULT_ARGS, args)?)
    }

    /// Build from a parsed configuration.
    pub fn from_config(config: AgentConfig) -> Result<Self, LearningError> {
        let tuples = match &config.tuples {
            Some(path) => TupleSet::from_csv(path)?,
            None => TupleSet::default(),
        };

        let mut evaluator = Evaluator::new(tuples, config.features);
        if let Some(init) = &config.init {
            log::debug!("{}: init={} with 4 empty tables", config.name, init);
        }
        if let Some(path) = &config.load {
            evaluator.set_tables(load_weights(path)?);
            log::info!(
                "{}: loaded {} weights from {}",
                config.name,
                evaluator.entry_count(),
                path.display()
            );
        }

        Ok(Self {
            learner: TdLearner::new(config.alpha),
            config,
            evaluator,
            buffer: EpisodeBuffer::new(),
            dirty: false,
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn evaluator_mut(&mut self) -> &mut Evaluator {
        &mut self.evaluator
    }

    /// Transitions recorded so far in the current episode.
    pub fn buffer(&self) -> &EpisodeBuffer {
        &self.buffer
    }

    /// Best slide for `board` without recording it.
    ///
    /// Returns `None` when no direction is legal.
    pub fn select_move(&self, board: &Board, hint: Option<u8>) -> Option<MoveChoice> {
        let mut best: Option<MoveChoice> = None;

        for direction in Direction::ALL {
            let mut after = *board;
            let Some(reward) = after.slide(direction) else {
                continue;
            };
            let context = hint.map(|h| FeatureContext::new(direction, h));
            let value = reward as f64 + self.evaluator.evaluate(&after, context);

            if best.is_none_or(|b| value > b.value) {
                best = Some(MoveChoice {
                    direction,
                    after,
                    reward,
                    context,
                    value,
                });
            }
        }

        best
    }

    /// Train on the recorded episode and clear the buffer.
    pub fn train_episode(&mut self) -> TdUpdateStats {
        let stats = self.learner.update(&mut self.buffer, &mut self.evaluator);
        if stats.transitions > 0 {
            self.dirty = true;
        }
        stats
    }
}

impl Player for TdPlayer {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn open_episode(&mut self) {
        self.buffer.clear();
    }

    fn act(&mut self, board: &Board, hint: Option<u8>) -> Action {
        match self.select_move(board, hint) {
            Some(choice) => {
                self.buffer
                    .push(Transition::new(choice.after, choice.reward, choice.context));
                Action::Slide(choice.direction)
            }
            None => Action::Null,
        }
    }

    fn observe_outcome(&mut self, _outcome: &EpisodeOutcome) -> Option<TdUpdateStats> {
        Some(self.train_episode())
    }

    fn persist(&mut self) -> Result<(), LearningError> {
        if let Some(path) = &self.config.save {
            save_weights(path, self.evaluator.tables())?;
            log::info!(
                "{}: saved {} weights to {}",
                self.config.name,
                self.evaluator.entry_count(),
                path.display()
            );
        }
        self.dirty = false;
        Ok(())
    }

    fn weights(&self) -> Option<&[WeightTable]> {
        Some(self.evaluator.tables())
    }
}

impl Drop for TdPlayer {
    fn drop(&mut self) {
        if self.dirty
            && self.config.save.is_some()
            && let Err(e) = self.persist()
        {
            log::error!("{}: failed to save weights on drop: {}", self.config.name, e);
        }
    }
}
