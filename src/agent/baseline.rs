//! Non-learning reference players.
//!
//! Each baseline owns its generator, seeded from `seed=` when given so
//! runs are reproducible.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::agent::{Action, Player};
use crate::board::{Board, Direction};
use crate::config::AgentConfig;
use crate::learning::LearningError;

/// Generator seeded from `seed`, or from the OS when absent.
pub(crate) fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Uniformly random legal slide.
#[derive(Debug)]
pub struct RandomPlayer {
    config: AgentConfig,
    rng: StdRng,
}

impl RandomPlayer {
    pub fn new(args: &str) -> Result<Self, LearningError> {
        let config = AgentConfig::with_defaults("name=random role=player", args)?;
        Ok(Self {
            rng: seeded_rng(config.seed),
            config,
        })
    }
}

impl Player for RandomPlayer {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn act(&mut self, board: &Board, _hint: Option<u8>) -> Action {
        let mut order = Direction::ALL;
        order.shuffle(&mut self.rng);
        order
            .into_iter()
            .find(|&dir| board.can_slide(dir))
            .map_or(Action::Null, Action::Slide)
    }
}

/// First legal slide in a fixed order (Up, Right, Down, Left unless
/// `order=` says otherwise, e.g. `order=LDRU`).
#[derive(Debug)]
pub struct PriorityPlayer {
    config: AgentConfig,
    order: Vec<Direction>,
}

impl PriorityPlayer {
    pub fn new(args: &str) -> Result<Self, LearningError> {
        let config = AgentConfig::with_defaults("name=priority role=player", args)?;
        let order = match config.property("order") {
            Ok(order_arg) => parse_order(&order_arg)?,
            Err(_) => Direction::ALL.to_vec(),
        };
        Ok(Self { config, order })
    }

    pub fn order(&self) -> &[Direction] {
        &self.order
    }
}

fn parse_order(order_arg: &str) -> Result<Vec<Direction>, LearningError> {
    let invalid = || crate::config::ConfigError::InvalidValue {
        key: "order".to_string(),
        value: order_arg.to_string(),
    };
    let order = order_arg
        .chars()
        .map(|c| match c.to_ascii_uppercase() {
            'U' => Ok(Direction::Up),
            'R' => Ok(Direction::Right),
            'D' => Ok(Direction::Down),
            'L' => Ok(Direction::Left),
            _ => Err(invalid()),
        })
        .collect::<Result<Vec<_>, _>>()?;
    if order.is_empty() {
        return Err(invalid().into());
    }
    Ok(order)
}

impl Player for PriorityPlayer {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn act(&mut self, board: &Board, _hint: Option<u8>) -> Action {
        self.order
            .iter()
            .copied()
            .find(|&dir| board.can_slide(dir))
            .map_or(Action::Null, Action::Slide)
    }
}

/// Slide with the largest immediate reward; ties are broken by a shuffled
/// direction order.
#[derive(Debug)]
pub struct GreedyPlayer {
    config: AgentConfig,
    rng: StdRng,
}

impl GreedyPlayer {
    pub fn new(args: &str) -> Result<Self, LearningError> {
        let config = AgentConfig::with_defaults("name=greedy role=player", args)?;
        Ok(Self {
            rng: seeded_rng(config.seed),
            config,
        })
    }
}

impl Player for GreedyPlayer {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn act(&mut self, board: &Board, _hint: Option<u8>) -> Action {
        let mut order = Direction::ALL;
        order.shuffle(&mut self.rng);

        let mut best: Option<(Direction, u32)> = None;
        for dir in order {
            let mut probe = *board;
            if let Some(reward) = probe.slide(dir)
                && best.is_none_or(|(_, r)| reward > r)
            {
                best = Some((dir, reward));
            }
        }
        best.map_or(Action::Null, |(dir, _)| Action::Slide(dir))
    }
}
