//! Backward TD(0) learner.
//!
//! # Algorithm
//!
//! The episode buffer is consumed as a stack, most recent afterstate first:
//!
//! 1. Terminal step: the last afterstate has target 0.
//!    `error = 0 - V(last)`.
//! 2. Interior steps: for each older afterstate `prev` with successor `cur`,
//!    `error = V(cur) + cur.reward - V(prev)`.
//! 3. Each step adds `error * alpha / 32` to the 32 entries of the updated
//!    afterstate, so the aggregate step size does not depend on how many
//!    tuples participate.
//!
//! `V(cur)` is read after `cur` itself was updated.

use crate::evaluator::Evaluator;
use crate::learning::game_history::EpisodeBuffer;
use crate::pattern::NUM_FEATURES;

/// Per-episode update statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TdUpdateStats {
    /// Transitions consumed
    pub transitions: usize,
    /// Weight entry updates applied (32 per transition)
    pub weights_updated: u64,
    /// Mean absolute TD error
    pub avg_td_error: f64,
    /// Largest absolute TD error
    pub max_td_error: f64,
}

/// TD(0) learner holding the learning rate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TdLearner {
    alpha: f32,
}

impl TdLearner {
    /// Create a learner with learning rate `alpha`.
    pub fn new(alpha: f32) -> Self {
        Self { alpha }
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn set_alpha(&mut self, alpha: f32) {
        self.alpha = alpha;
    }

    /// Step size applied to each of the 32 entries per unit of TD error.
    #[inline]
    pub fn step(&self) -> f64 {
        self.alpha as f64 / NUM_FEATURES as f64
    }

    /// Replay `buffer` backwards, updating `evaluator`, and clear it.
    ///
    /// An empty buffer (the player never moved) updates nothing.
    pub fn update(&self, buffer: &mut EpisodeBuffer, evaluator: &mut Evaluator) -> TdUpdateStats {
        let Some(last) = buffer.pop() else {
            return TdUpdateStats::default();
        };

        let step = self.step();
        let mut stats = TdUpdateStats::default();
        let mut total_error = 0.0f64;

        let mut record = |stats: &mut TdUpdateStats, error: f64| {
            let magnitude = error.abs();
            total_error += magnitude;
            stats.max_td_error = stats.max_td_error.max(magnitude);
            stats.transitions += 1;
            stats.weights_updated += NUM_FEATURES as u64;
        };

        let error = 0.0 - evaluator.evaluate(&last.after, last.context);
        evaluator.update(&last.after, last.context, error * step);
        record(&mut stats, error);

        let mut cur = last;
        while let Some(prev) = buffer.pop() {
            let target = evaluator.evaluate(&cur.after, cur.context) + cur.reward as f64;
            let error = target - evaluator.evaluate(&prev.after, prev.context);
            evaluator.update(&prev.after, prev.context, error * step);
            record(&mut stats, error);
            cur = prev;
        }

        buffer.clear();
        stats.avg_td_error = total_error / stats.transitions as f64;
        stats
    }
}
