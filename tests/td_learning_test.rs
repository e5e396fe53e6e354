//! Integration tests for the value function, policy and TD trainer.

use tritile::agent::{Action, Environment, Player, TdPlayer};
use tritile::board::{BOARD_CELLS, Board, Direction};
use tritile::evaluator::{Evaluator, WeightTable};
use tritile::learning::{EpisodeBuffer, TdLearner, Transition, play_episode};
use tritile::pattern::{
    FeatureContext, FeatureScheme, NUM_FEATURES, NUM_TABLES, TupleSet, feature_key,
};

const TERMINAL: [u8; BOARD_CELLS] = [1, 3, 1, 3, 4, 5, 4, 5, 1, 3, 1, 3, 4, 5, 4, 5];

fn sample_board() -> Board {
    Board::from_cells([1, 2, 3, 0, 0, 4, 0, 0, 2, 0, 5, 0, 3, 0, 0, 1])
}

// ========== Policy ==========

#[test]
fn test_single_legal_direction_is_chosen_and_recorded() {
    // A full unmergeable top row over an empty board can only move down.
    let board = Board::from_cells([3, 4, 3, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    for dir in [Direction::Up, Direction::Right, Direction::Left] {
        assert!(!board.can_slide(dir), "{:?} should be illegal", dir);
    }
    let mut expected = board;
    let reward = expected.slide(Direction::Down).unwrap();

    let mut player = TdPlayer::new("seed=1").unwrap();
    assert_eq!(player.act(&board, Some(2)), Action::Slide(Direction::Down));

    assert_eq!(player.buffer().len(), 1);
    let recorded = player.buffer().last().copied().unwrap();
    assert_eq!(recorded.after, expected);
    assert_eq!(recorded.reward, reward);
    assert_eq!(recorded.context, Some(FeatureContext::new(Direction::Down, 2)));
}

#[test]
fn test_terminal_board_ends_episode() {
    let board = Board::from_cells(TERMINAL);
    assert!(board.is_terminal());

    let mut player = TdPlayer::new("").unwrap();
    assert!(player.act(&board, Some(1)).is_null());
    assert!(player.buffer().is_empty());
}

#[test]
fn test_episode_stops_at_terminal_board() {
    let mut player = TdPlayer::new("alpha=0.1").unwrap();
    let mut env = Environment::new("seed=31").unwrap();
    for _ in 0..5 {
        let result = play_episode(&mut player, &mut env);
        assert!(result.final_board.is_terminal());
        assert!(player.buffer().is_empty());
    }
}

// ========== Feature hashing ==========

#[test]
fn test_keys_are_deterministic() {
    let tuples = TupleSet::default();
    let board = sample_board();
    let context = Some(FeatureContext::new(Direction::Left, 3));
    for scheme in [FeatureScheme::Base, FeatureScheme::Hint] {
        let first = tuples.extract_keys(&board, scheme, context);
        for _ in 0..10 {
            assert_eq!(tuples.extract_keys(&board, scheme, context), first);
        }
    }
}

#[test]
fn test_cells_outside_tuple_do_not_change_key() {
    let tuples = TupleSet::default();
    let board = sample_board();
    for (g, i, tuple) in tuples.iter() {
        let outside = (0..BOARD_CELLS as u8).find(|pos| !tuple.contains(pos)).unwrap();
        let mut cells = *board.cells();
        cells[outside as usize] = if cells[outside as usize] == 7 { 8 } else { 7 };
        let changed = Board::from_cells(cells);

        assert_eq!(
            feature_key(&board, tuple, FeatureScheme::Base, None),
            feature_key(&changed, tuple, FeatureScheme::Base, None),
            "group {} instance {}",
            g,
            i
        );
    }
}

#[test]
fn test_hint_changes_extended_key_only() {
    let tuples = TupleSet::default();
    let board = sample_board();
    let tuple = tuples.cells(0, 0);
    let a = Some(FeatureContext::new(Direction::Up, 1));
    let b = Some(FeatureContext::new(Direction::Up, 2));

    assert_eq!(
        feature_key(&board, tuple, FeatureScheme::Base, a),
        feature_key(&board, tuple, FeatureScheme::Base, b)
    );
    assert_ne!(
        feature_key(&board, tuple, FeatureScheme::Hint, a),
        feature_key(&board, tuple, FeatureScheme::Hint, b)
    );
}

// ========== Weight sharing ==========

#[test]
fn test_weight_reaches_only_features_on_same_table_and_key() {
    let board = sample_board();
    let mut evaluator = Evaluator::new(TupleSet::default(), FeatureScheme::Base);
    let keys = evaluator.keys(&board, None);

    let mut tables: [WeightTable; NUM_TABLES] = Default::default();
    tables[0].set(keys[0], 1.0);
    evaluator.set_tables(tables);

    let sharing = (0..NUM_FEATURES)
        .filter(|&k| k % NUM_TABLES == 0 && keys[k] == keys[0])
        .count();
    assert!(sharing >= 1);
    assert_eq!(evaluator.evaluate(&board, None), sharing as f64);
}

#[test]
fn test_update_is_visible_through_symmetric_board() {
    // Group g's instance j reads table j, so rotating the board moves
    // a feature between groups without changing its table.
    let board = sample_board();
    let rotated = Board::from_cells(std::array::from_fn(|pos| {
        let (r, c) = (pos / 4, pos % 4);
        // Inverse of the 90 degree cell map (r, c) -> (c, 3 - r).
        board.cell((3 - c) * 4 + r)
    }));

    let mut evaluator = Evaluator::new(TupleSet::default(), FeatureScheme::Base);
    evaluator.update(&board, None, 1.0);
    assert_eq!(
        evaluator.evaluate(&rotated, None),
        evaluator.evaluate(&board, None)
    );
}

// ========== Trainer ==========

#[test]
fn test_backward_replay_consumes_buffer() {
    let mut evaluator = Evaluator::new(TupleSet::default(), FeatureScheme::Base);
    let learner = TdLearner::new(0.1);

    let mut buffer = EpisodeBuffer::new();
    let mut board = Board::from_cells([3, 3, 0, 0, 0, 1, 0, 0, 0, 0, 2, 0, 0, 0, 0, 0]);
    for dir in [Direction::Left, Direction::Down, Direction::Right] {
        if let Some(reward) = board.slide(dir) {
            buffer.push(Transition::new(board, reward, None));
        }
    }
    let recorded = buffer.len();

    let stats = learner.update(&mut buffer, &mut evaluator);
    assert_eq!(stats.transitions, recorded);
    assert!(buffer.is_empty());
    assert!(evaluator.entry_count() > 0);
}

#[test]
fn test_trained_player_outscores_untrained() {
    const EVAL_EPISODES: usize = 100;

    let mean_score = |player: &mut TdPlayer| {
        let mut env = Environment::new("seed=2024").unwrap();
        let total: u64 = (0..EVAL_EPISODES)
            .map(|_| play_episode(&mut *player, &mut env).score as u64)
            .sum();
        total as f64 / EVAL_EPISODES as f64
    };

    let mut untrained = TdPlayer::new("alpha=0").unwrap();
    let baseline = mean_score(&mut untrained);

    let mut learner = TdPlayer::new("alpha=0.1").unwrap();
    let mut env = Environment::new("seed=99").unwrap();
    for _ in 0..1000 {
        play_episode(&mut learner, &mut env);
    }
    let trained_tables = learner.evaluator().tables().clone();

    let mut frozen = TdPlayer::new("alpha=0").unwrap();
    frozen.evaluator_mut().set_tables(trained_tables);
    let trained = mean_score(&mut frozen);

    assert!(
        trained > baseline,
        "trained {:.1} vs untrained {:.1}",
        trained,
        baseline
    );
}
