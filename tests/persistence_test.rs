//! Integration tests for the weight file and snapshots.

use std::fs;

use tempfile::tempdir;
use tritile::agent::{Environment, Player, TdPlayer};
use tritile::evaluator::WeightTable;
use tritile::learning::{
    LearningError, SnapshotManager, load_weights, play_episode, read_weights, save_weights,
    write_weights,
};
use tritile::pattern::NUM_TABLES;

fn sample_tables() -> [WeightTable; NUM_TABLES] {
    let mut tables: [WeightTable; NUM_TABLES] = Default::default();
    tables[0].set(0, 1.5);
    tables[0].set(-7, -0.25);
    tables[1].set(0x3F_FFFF, 1e-9);
    tables[3].set(i32::MAX, 123456.789);
    // tables[2] stays empty
    tables
}

// ========== Weight file ==========

#[test]
fn test_weight_file_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("weights.bin");
    let tables = sample_tables();

    save_weights(&path, &tables).unwrap();
    let loaded = load_weights(&path).unwrap();
    assert_eq!(loaded, tables);
    assert_eq!(loaded[0].get(-7), -0.25);
    assert_eq!(loaded[0].get(42), 0.0);
    assert!(loaded[2].is_empty());
}

#[test]
fn test_weight_file_layout() {
    let mut bytes = Vec::new();
    write_weights(&mut bytes, &sample_tables()).unwrap();
    // u32 table count, then per table u64 count + 12 bytes per entry.
    assert_eq!(bytes.len(), 4 + 4 * 8 + 4 * 12);
    assert_eq!(u32::from_ne_bytes(bytes[0..4].try_into().unwrap()), 4);
    assert_eq!(u64::from_ne_bytes(bytes[4..12].try_into().unwrap()), 2);
}

#[test]
fn test_wrong_table_count_rejected() {
    let mut bytes = Vec::new();
    write_weights(&mut bytes, &sample_tables()[..3]).unwrap();
    let err = read_weights(&mut bytes.as_slice()).unwrap_err();
    assert!(matches!(err, LearningError::InvalidWeights(_)));
}

#[test]
fn test_truncated_weight_file_rejected() {
    let mut bytes = Vec::new();
    write_weights(&mut bytes, &sample_tables()).unwrap();
    bytes.truncate(bytes.len() - 5);
    let err = read_weights(&mut bytes.as_slice()).unwrap_err();
    assert!(matches!(err, LearningError::InvalidWeights(_)));
}

#[test]
fn test_missing_weight_file_is_io_error() {
    let dir = tempdir().unwrap();
    let err = load_weights(dir.path().join("absent.bin")).unwrap_err();
    assert!(matches!(err, LearningError::Io(_)));
}

#[test]
fn test_player_resumes_from_saved_weights() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("weights.bin");
    let args = format!("load={0} save={0} alpha=0.1", path.display());

    save_weights(&path, &<[WeightTable; NUM_TABLES]>::default()).unwrap();
    let trained = {
        let mut player = TdPlayer::new(&args).unwrap();
        let mut env = Environment::new("seed=8").unwrap();
        for _ in 0..3 {
            play_episode(&mut player, &mut env);
        }
        player.persist().unwrap();
        player.evaluator().tables().clone()
    };

    let resumed = TdPlayer::new(&args).unwrap();
    assert_eq!(resumed.evaluator().tables(), &trained);
    assert!(resumed.evaluator().entry_count() > 0);
}

// ========== Snapshots ==========

#[test]
fn test_snapshot_round_trip_compressed_and_plain() {
    for compress in [false, true] {
        let dir = tempdir().unwrap();
        let manager = SnapshotManager::new(dir.path(), 0, compress).unwrap();
        let path = manager.save(1200, &sample_tables()).unwrap();

        let (header, tables) = manager.load(&path).unwrap();
        assert_eq!(header.episodes, 1200);
        assert_eq!(header.is_compressed(), compress);
        assert_eq!(tables, sample_tables());
    }
}

#[test]
fn test_corrupted_snapshot_detected() {
    let dir = tempdir().unwrap();
    let manager = SnapshotManager::new(dir.path(), 0, false).unwrap();
    let path = manager.save(10, &sample_tables()).unwrap();

    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    fs::write(&path, &bytes).unwrap();

    let err = manager.load(&path).unwrap_err();
    assert!(matches!(err, LearningError::InvalidSnapshot(_)));
}

#[test]
fn test_bad_magic_detected() {
    let dir = tempdir().unwrap();
    let manager = SnapshotManager::new(dir.path(), 0, false).unwrap();
    let path = manager.save(10, &sample_tables()).unwrap();

    let mut bytes = fs::read(&path).unwrap();
    bytes[0] = b'X';
    fs::write(&path, &bytes).unwrap();
    assert!(matches!(
        manager.verify(&path),
        Err(LearningError::InvalidSnapshot(_))
    ));
}

#[test]
fn test_retention_keeps_newest() {
    let dir = tempdir().unwrap();
    let manager = SnapshotManager::new(dir.path(), 2, false).unwrap();
    for episodes in [100, 200, 300, 400] {
        manager.save(episodes, &sample_tables()).unwrap();
    }

    let mut kept: Vec<u64> = manager.list().unwrap().into_iter().map(|(e, _)| e).collect();
    kept.sort_unstable();
    assert_eq!(kept, vec![300, 400]);

    let (header, _) = manager.load_latest().unwrap().unwrap();
    assert_eq!(header.episodes, 400);
}

#[test]
fn test_empty_snapshot_dir() {
    let dir = tempdir().unwrap();
    let manager = SnapshotManager::new(dir.path().join("new"), 3, false).unwrap();
    assert!(manager.snapshot_dir().exists());
    assert!(manager.find_latest().unwrap().is_none());
    assert!(manager.load_latest().unwrap().is_none());
}
