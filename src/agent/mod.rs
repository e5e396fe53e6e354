//! Players and the tile-placing environment.
//!
//! # Overview
//!
//! Every move-making strategy implements [`Player`]. The TD learner and
//! the non-learning baselines are siblings behind that one trait; the
//! learning state (weights, learning rate, episode buffer) lives inside
//! [`TdPlayer`] rather than in a shared base.
//!
//! The [`Environment`] is the opposing side: it places a tile after every
//! slide and announces the next tile ahead of time.

use std::fmt;
use std::str::FromStr;

use crate::board::{Board, Direction};
use crate::config::ConfigError;
use crate::evaluator::WeightTable;
use crate::learning::{LearningError, TdUpdateStats};

pub mod baseline;
pub mod environment;
pub mod td_player;

pub use baseline::{GreedyPlayer, PriorityPlayer, RandomPlayer};
pub use environment::{Environment, TileBag, candidate_cells};
pub use td_player::TdPlayer;

/// One move by either side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// No legal move; ends the episode
    Null,
    /// Player slide
    Slide(Direction),
    /// Environment tile placement
    Place {
        /// Cell index 0..16
        position: u8,
        /// Tile index
        tile: u8,
    },
}

impl Action {
    /// Apply to `board`.
    ///
    /// # Returns
    ///
    /// The slide reward (0 for a placement), or `None` if the action is
    /// illegal on `board` or is [`Action::Null`].
    pub fn apply(&self, board: &mut Board) -> Option<u32> {
        match *self {
            Action::Null => None,
            Action::Slide(dir) => board.slide(dir),
            Action::Place { position, tile } => {
                board.place(position as usize, tile).then_some(0)
            }
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Action::Null)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Null => write!(f, "??"),
            Action::Slide(dir) => write!(f, "{}", dir.symbol()),
            Action::Place { position, tile } => write!(f, "{:X}{:X}", position, tile),
        }
    }
}

/// Final state of an episode, handed to players at its end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EpisodeOutcome {
    /// Board score at the end
    pub score: u32,
    /// Slides made by the player
    pub moves: u32,
    /// Largest tile index reached
    pub max_tile: u8,
}

/// A move-making strategy.
pub trait Player {
    /// Display name from the `name=` key.
    fn name(&self) -> &str;

    /// Called before the first move of an episode.
    fn open_episode(&mut self) {}

    /// Choose a slide for `board`, or [`Action::Null`] if none is legal.
    ///
    /// `hint` is the tile the environment will place next, when known.
    fn act(&mut self, board: &Board, hint: Option<u8>) -> Action;

    /// Called once after the episode ends. Learning players train here.
    fn observe_outcome(&mut self, _outcome: &EpisodeOutcome) -> Option<TdUpdateStats> {
        None
    }

    /// Write learned state to the `save=` path, if any.
    fn persist(&mut self) -> Result<(), LearningError> {
        Ok(())
    }

    /// Learned weight tables, for players that have them.
    fn weights(&self) -> Option<&[WeightTable]> {
        None
    }
}

/// Player strategies selectable at construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlayerKind {
    /// TD(0) n-tuple learner
    #[default]
    Td,
    /// Uniformly random legal slide
    Random,
    /// First legal slide in a fixed order
    Priority,
    /// Slide with the largest immediate reward
    Greedy,
}

impl FromStr for PlayerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "td" | "learning" => Ok(PlayerKind::Td),
            "random" => Ok(PlayerKind::Random),
            "priority" => Ok(PlayerKind::Priority),
            "greedy" => Ok(PlayerKind::Greedy),
            _ => Err(ConfigError::InvalidValue {
                key: "player".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for PlayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlayerKind::Td => "td",
            PlayerKind::Random => "random",
            PlayerKind::Priority => "priority",
            PlayerKind::Greedy => "greedy",
        };
        f.write_str(name)
    }
}

/// Build a player of `kind` from a `key=value` argument string.
///
/// # Errors
///
/// Configuration errors, and for the TD player any failure to read the
/// `load=` weight file or `tuples=` layout.
pub fn create_player(kind: PlayerKind, args: &str) -> Result<Box<dyn Player>, LearningError> {
    Ok(match kind {
        PlayerKind::Td => Box::new(TdPlayer::new(args)?),
        PlayerKind::Random => Box::new(RandomPlayer::new(args)?),
        PlayerKind::Priority => Box::new(PriorityPlayer::new(args)?),
        PlayerKind::Greedy => Box::new(GreedyPlayer::new(args)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_apply_place() {
        let mut board = Board::new();
        let action = Action::Place { position: 5, tile: 3 };
        assert_eq!(action.apply(&mut board), Some(0));
        assert_eq!(board.cell(5), 3);
        assert_eq!(action.apply(&mut board), None);
    }

    #[test]
    fn test_action_apply_null() {
        let mut board = Board::new();
        assert_eq!(Action::Null.apply(&mut board), None);
        assert!(Action::Null.is_null());
    }

    #[test]
    fn test_action_display() {
        assert_eq!(Action::Slide(Direction::Up).to_string(), "#U");
        assert_eq!(Action::Place { position: 12, tile: 3 }.to_string(), "C3");
        assert_eq!(Action::Null.to_string(), "??");
    }

    #[test]
    fn test_player_kind_parse() {
        assert_eq!("td".parse::<PlayerKind>(), Ok(PlayerKind::Td));
        assert_eq!("Greedy".parse::<PlayerKind>(), Ok(PlayerKind::Greedy));
        assert!("alphabeta".parse::<PlayerKind>().is_err());
    }

    #[test]
    fn test_create_every_kind() {
        for kind in [
            PlayerKind::Td,
            PlayerKind::Random,
            PlayerKind::Priority,
            PlayerKind::Greedy,
        ] {
            let player = create_player(kind, "seed=1").unwrap();
            assert!(!player.name().is_empty());
        }
    }
}
