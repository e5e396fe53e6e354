//! Integration tests for tile placement and the tile bag.

use rand::SeedableRng;
use rand::rngs::StdRng;
use tritile::agent::{Action, Environment, TileBag, candidate_cells};
use tritile::board::{BOARD_CELLS, Board, Direction};

#[test]
fn test_base_bag_frequencies_converge_to_one_third() {
    const DRAWS: usize = 10_000;
    let mut rng = StdRng::seed_from_u64(12345);
    let mut bag = TileBag::new(1);

    let mut counts = [0usize; 4];
    for _ in 0..DRAWS {
        counts[bag.draw(&mut rng) as usize] += 1;
    }
    assert_eq!(counts[0], 0);
    for tile in 1..=3 {
        let freq = counts[tile] as f64 / DRAWS as f64;
        assert!((freq - 1.0 / 3.0).abs() < 0.01, "tile {} frequency {}", tile, freq);
    }
}

#[test]
fn test_environment_tile_frequencies() {
    let mut env = Environment::new("seed=5").unwrap();
    let mut counts = [0usize; 4];
    let mut draws = 0;
    for _ in 0..3000 {
        env.open_episode();
        let board = Board::new();
        for _ in 0..3 {
            match env.place(&board) {
                Action::Place { tile, .. } => {
                    counts[tile as usize] += 1;
                    draws += 1;
                }
                other => panic!("unexpected {:?}", other),
            }
        }
    }
    // Each episode opens with a fresh bag, so every 3 draws are one of each.
    assert_eq!(&counts[1..], &[draws / 3, draws / 3, draws / 3]);
}

#[test]
fn test_placement_lands_on_revealed_edge() {
    let mut env = Environment::new("seed=9").unwrap();
    let mut checked = 0;

    for _ in 0..500 {
        let mut board = Board::new();
        for _ in 0..9 {
            env.place(&board).apply(&mut board);
        }

        for dir in Direction::ALL {
            let mut after = board;
            if after.slide(dir).is_none() {
                continue;
            }
            let edge = candidate_cells(Some(dir));
            assert!(edge.iter().any(|&pos| after.cell(pos as usize) == 0));

            match env.place(&after) {
                Action::Place { position, .. } => {
                    assert!(edge.contains(&position), "{:?} placed at {}", dir, position);
                    assert_eq!(after.cell(position as usize), 0);
                    checked += 1;
                }
                other => panic!("unexpected {:?} after {:?}", other, dir),
            }
        }
    }
    assert!(checked >= 500);
}

#[test]
fn test_revealed_edges_are_opposite_the_slide() {
    assert_eq!(candidate_cells(Some(Direction::Up)), &[12, 13, 14, 15]);
    assert_eq!(candidate_cells(Some(Direction::Down)), &[0, 1, 2, 3]);
    assert_eq!(candidate_cells(Some(Direction::Left)), &[3, 7, 11, 15]);
    assert_eq!(candidate_cells(Some(Direction::Right)), &[0, 4, 8, 12]);
    assert_eq!(candidate_cells(None).len(), BOARD_CELLS);
}

#[test]
fn test_hint_variant_announces_placed_tile() {
    let mut env = Environment::new("seed=3 features=hint").unwrap();
    let mut board = Board::new();
    for _ in 0..9 {
        env.place(&board).apply(&mut board);
    }

    let mut after = board;
    let dir = Direction::ALL
        .into_iter()
        .find(|&d| board.can_slide(d))
        .unwrap();
    after.slide(dir);

    let hint = env.hint(&after);
    match env.place(&after) {
        Action::Place { tile, .. } => assert_eq!(tile, hint),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_seeded_environments_agree() {
    let mut a = Environment::new("seed=44").unwrap();
    let mut b = Environment::new("seed=44").unwrap();
    let board = Board::new();
    for _ in 0..50 {
        assert_eq!(a.place(&board), b.place(&board));
    }
}
