//! Episode buffer.
//!
//! The player appends one [`Transition`] per slide it makes. The trainer
//! drains the buffer from the back at episode end.

use crate::board::Board;
use crate::pattern::FeatureContext;

/// Typical upper bound on moves per episode, used to pre-size buffers.
pub const EXPECTED_MOVES_PER_EPISODE: usize = 1024;

/// One recorded afterstate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    /// Board right after the slide, before the environment places a tile
    pub after: Board,
    /// Merge reward of the slide that produced `after`
    pub reward: u32,
    /// Slide direction and upcoming tile; `None` under the base scheme
    pub context: Option<FeatureContext>,
}

impl Transition {
    /// Create a new transition.
    pub fn new(after: Board, reward: u32, context: Option<FeatureContext>) -> Self {
        Self {
            after,
            reward,
            context,
        }
    }
}

/// Transitions of the current episode, oldest first.
#[derive(Clone, Debug, Default)]
pub struct EpisodeBuffer {
    transitions: Vec<Transition>,
}

impl EpisodeBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self {
            transitions: Vec::with_capacity(EXPECTED_MOVES_PER_EPISODE),
        }
    }

    /// Append a transition.
    #[inline]
    pub fn push(&mut self, transition: Transition) {
        self.transitions.push(transition);
    }

    /// Remove and return the most recent transition.
    #[inline]
    pub fn pop(&mut self) -> Option<Transition> {
        self.transitions.pop()
    }

    /// Most recent transition.
    pub fn last(&self) -> Option<&Transition> {
        self.transitions.last()
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Oldest-first iteration.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Transition> {
        self.transitions.iter()
    }

    /// Drop all transitions, keeping the allocation.
    pub fn clear(&mut self) {
        self.transitions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Direction;

    fn transition(reward: u32) -> Transition {
        let mut cells = [0u8; 16];
        cells[0] = 3;
        Transition::new(Board::from_cells(cells), reward, None)
    }

    #[test]
    fn test_push_pop_is_lifo() {
        let mut buffer = EpisodeBuffer::new();
        buffer.push(transition(1));
        buffer.push(transition(2));
        buffer.push(transition(3));
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.pop().map(|t| t.reward), Some(3));
        assert_eq!(buffer.pop().map(|t| t.reward), Some(2));
        assert_eq!(buffer.last().map(|t| t.reward), Some(1));
    }

    #[test]
    fn test_iter_is_oldest_first() {
        let mut buffer = EpisodeBuffer::new();
        for r in 0..5 {
            buffer.push(transition(r));
        }
        let rewards: Vec<u32> = buffer.iter().map(|t| t.reward).collect();
        assert_eq!(rewards, vec![0, 1, 2, 3, 4]);
        let reversed: Vec<u32> = buffer.iter().rev().map(|t| t.reward).collect();
        assert_eq!(reversed, vec![4, 3, 2, 1, 0]);
    }

    #[test]
    fn test_clear() {
        let mut buffer = EpisodeBuffer::new();
        buffer.push(Transition::new(
            Board::new(),
            0,
            Some(FeatureContext::new(Direction::Left, 2)),
        ));
        buffer.clear();
        assert!(buffer.is_empty());
        assert!(buffer.pop().is_none());
    }
}
