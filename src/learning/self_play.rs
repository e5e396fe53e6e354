//! One self-play episode.
//!
//! The player and the environment alternate in lockstep:
//!
//! 1. The environment opens with [`INITIAL_TILES`] placements anywhere.
//! 2. The environment announces the next tile (`hint`).
//! 3. The player slides, or returns [`Action::Null`] to end the episode.
//! 4. The environment places the announced tile on the uncovered edge.
//!
//! When the episode ends the player receives the outcome and, if it
//! learns, trains on what it recorded.

use std::time::{Duration, Instant};

use crate::agent::environment::INITIAL_TILES;
use crate::agent::{Action, Environment, EpisodeOutcome, Player};
use crate::board::Board;
use crate::learning::td_learner::TdUpdateStats;

/// Result of one episode.
#[derive(Clone, Debug)]
pub struct EpisodeResult {
    /// Board score at the end
    pub score: u32,
    /// Sum of slide rewards
    pub total_reward: u64,
    /// Slides made
    pub moves: u32,
    /// Largest tile index reached
    pub max_tile: u8,
    /// Wall time spent playing and training
    pub duration: Duration,
    /// Board when the episode ended
    pub final_board: Board,
    /// Training statistics, for learning players
    pub td_stats: Option<TdUpdateStats>,
}

/// Play one episode from an empty board.
///
/// # Examples
///
/// ```
/// use tritile::agent::{Environment, RandomPlayer};
/// use tritile::learning::play_episode;
///
/// let mut player = RandomPlayer::new("seed=1")?;
/// let mut env = Environment::new("seed=2")?;
/// let result = play_episode(&mut player, &mut env);
/// assert!(result.final_board.is_terminal());
/// # Ok::<(), tritile::learning::LearningError>(())
/// ```
pub fn play_episode<P: Player + ?Sized>(player: &mut P, env: &mut Environment) -> EpisodeResult {
    let start = Instant::now();
    player.open_episode();
    env.open_episode();

    let mut board = Board::new();
    for _ in 0..INITIAL_TILES {
        if env.place(&board).apply(&mut board).is_none() {
            break;
        }
    }

    let mut moves = 0u32;
    let mut total_reward = 0u64;
    loop {
        let hint = env.hint(&board);
        let action = player.act(&board, Some(hint));
        if action.is_null() {
            break;
        }

        let Action::Slide(_) = action else {
            log::warn!("{}: ignoring non-slide action {}", player.name(), action);
            break;
        };
        let Some(reward) = action.apply(&mut board) else {
            log::warn!("{}: illegal slide {} ends the episode", player.name(), action);
            break;
        };
        moves += 1;
        total_reward += reward as u64;

        if env.place(&board).apply(&mut board).is_none() {
            log::warn!("{}: no cell to place on after {}", env.name(), action);
            break;
        }
    }

    let outcome = EpisodeOutcome {
        score: board.score(),
        moves,
        max_tile: board.max_tile(),
    };
    let td_stats = player.observe_outcome(&outcome);

    EpisodeResult {
        score: outcome.score,
        total_reward,
        moves,
        max_tile: outcome.max_tile,
        duration: start.elapsed(),
        final_board: board,
        td_stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{GreedyPlayer, PriorityPlayer, TdPlayer};

    #[test]
    fn test_episode_ends_on_terminal_board() {
        let mut player = GreedyPlayer::new("seed=3").unwrap();
        let mut env = Environment::new("seed=4").unwrap();
        let result = play_episode(&mut player, &mut env);
        assert!(result.final_board.is_terminal());
        assert!(result.moves > 0);
        assert!(result.td_stats.is_none());
    }

    #[test]
    fn test_reward_accounts_for_score_growth() {
        let mut player = PriorityPlayer::new("").unwrap();
        let mut env = Environment::new("seed=5").unwrap();
        let result = play_episode(&mut player, &mut env);
        // Opening placements contribute score without reward.
        assert!(result.total_reward <= result.score as u64);
        assert_eq!(result.score, result.final_board.score());
    }

    #[test]
    fn test_td_player_trains_every_move() {
        let mut player = TdPlayer::new("alpha=0.1").unwrap();
        let mut env = Environment::new("seed=6").unwrap();
        let result = play_episode(&mut player, &mut env);
        let stats = result.td_stats.unwrap();
        assert_eq!(stats.transitions, result.moves as usize);
        assert!(player.buffer().is_empty());
    }

    #[test]
    fn test_seeded_episode_is_reproducible() {
        let run = || {
            let mut player = GreedyPlayer::new("seed=10").unwrap();
            let mut env = Environment::new("seed=20 features=hint").unwrap();
            let result = play_episode(&mut player, &mut env);
            (result.score, result.moves, result.final_board)
        };
        assert_eq!(run(), run());
    }
}
