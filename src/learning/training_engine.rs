//! Multi-episode training loop.
//!
//! # Architecture
//!
//! ```text
//! TrainingEngine
//!     |-- Box<dyn Player>   (TD learner or a baseline)
//!     |-- Environment       (tile placement, hint)
//!     |-- SnapshotManager   (every `snapshot_every` episodes, optional)
//!     |-- TrainingLogger    (block statistics to a log file, optional)
//! ```
//!
//! Episodes run back to back on one thread. Every `block` episodes the
//! engine summarizes the block, hands the summary to the caller, and
//! checks the weights for divergence. On SIGINT/SIGTERM the loop stops
//! after the current episode; [`TrainingEngine::finish`] then persists the
//! player as on a normal exit.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use crate::agent::{Environment, Player, PlayerKind, create_player};
use crate::learning::LearningError;
use crate::learning::checkpoint::{DEFAULT_RETENTION_COUNT, SnapshotManager};
use crate::learning::error_handler::{find_divergent, save_with_retry};
use crate::learning::logger::{BlockStats, TrainingLogger};
use crate::learning::self_play::{EpisodeResult, play_episode};

/// Default number of episodes per run.
pub const DEFAULT_TOTAL_EPISODES: u64 = 1000;

/// Default episodes per statistics block.
pub const DEFAULT_BLOCK_SIZE: u64 = 1000;

/// Process-wide interrupt flag; `ctrlc` allows a single handler.
static GLOBAL_INTERRUPTED: OnceLock<Result<Arc<AtomicBool>, String>> = OnceLock::new();

/// Install the SIGINT/SIGTERM handler once and return its flag.
fn setup_signal_handler() -> Result<Arc<AtomicBool>, LearningError> {
    let result = GLOBAL_INTERRUPTED.get_or_init(|| {
        let flag = Arc::new(AtomicBool::new(false));
        let flag_clone = Arc::clone(&flag);
        ctrlc::set_handler(move || {
            flag_clone.store(true, Ordering::SeqCst);
        })
        .map(|_| flag)
        .map_err(|e| format!("Failed to set signal handler: {}", e))
    });

    match result {
        Ok(flag) => Ok(Arc::clone(flag)),
        Err(e) => Err(LearningError::Io(std::io::Error::other(e.clone()))),
    }
}

/// Training run configuration.
#[derive(Clone, Debug)]
pub struct TrainingConfig {
    /// Episodes to play.
    pub total: u64,
    /// Episodes per statistics block (0 = one block for the whole run).
    pub block: u64,
    /// Player strategy.
    pub player: PlayerKind,
    /// Player `key=value` arguments.
    pub play_args: String,
    /// Environment `key=value` arguments.
    pub evil_args: String,
    /// Directory for the training log file.
    pub log_dir: Option<PathBuf>,
    /// Directory for periodic weight snapshots.
    pub snapshot_dir: Option<PathBuf>,
    /// Episodes between snapshots (0 disables them).
    pub snapshot_every: u64,
    /// Snapshots kept on disk (0 = all).
    pub snapshot_retention: usize,
    /// Gzip snapshot payloads.
    pub compress_snapshots: bool,
    /// Install the SIGINT/SIGTERM handler.
    pub handle_interrupts: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            total: DEFAULT_TOTAL_EPISODES,
            block: DEFAULT_BLOCK_SIZE,
            player: PlayerKind::Td,
            play_args: String::new(),
            evil_args: String::new(),
            log_dir: None,
            snapshot_dir: None,
            snapshot_every: 0,
            snapshot_retention: DEFAULT_RETENTION_COUNT,
            compress_snapshots: false,
            handle_interrupts: false,
        }
    }
}

/// Whole-run summary.
#[derive(Clone, Debug, Default)]
pub struct TrainingStats {
    /// Episodes completed.
    pub episodes: u64,
    /// Wall time in seconds.
    pub elapsed_secs: f64,
    pub episodes_per_sec: f64,
    pub avg_score: f64,
    pub max_score: u32,
    /// Slides over all episodes.
    pub total_moves: u64,
    /// Snapshots written.
    pub snapshots: u64,
    /// Stopped early by a signal.
    pub interrupted: bool,
}

/// Drives episodes between one player and one environment.
pub struct TrainingEngine {
    config: TrainingConfig,
    player: Box<dyn Player>,
    env: Environment,
    logger: Option<TrainingLogger>,
    snapshots: Option<SnapshotManager>,
    episodes: u64,
    score_sum: u64,
    max_score: u32,
    total_moves: u64,
    snapshot_count: u64,
    stopped_early: bool,
    block_results: Vec<EpisodeResult>,
    start_time: Instant,
    interrupted: Arc<AtomicBool>,
}

impl TrainingEngine {
    /// Build the player, environment, logger and snapshot manager.
    ///
    /// # Errors
    ///
    /// - `LearningError::Config` on malformed player/environment arguments
    /// - `LearningError::Io` / `InvalidWeights` if the player's `load=`
    ///   file cannot be read, or a directory cannot be created
    pub fn new(config: TrainingConfig) -> Result<Self, LearningError> {
        let player = create_player(config.player, &config.play_args)?;
        let env = Environment::new(&config.evil_args)?;

        let logger = match &config.log_dir {
            Some(dir) => Some(TrainingLogger::new(dir)?),
            None => None,
        };
        let snapshots = match &config.snapshot_dir {
            Some(dir) if config.snapshot_every > 0 => Some(SnapshotManager::new(
                dir,
                config.snapshot_retention,
                config.compress_snapshots,
            )?),
            _ => None,
        };

        let interrupted = if config.handle_interrupts {
            setup_signal_handler()?
        } else {
            Arc::new(AtomicBool::new(false))
        };

        Ok(Self {
            block_results: Vec::with_capacity(Self::block_size(&config).min(4096) as usize),
            config,
            player,
            env,
            logger,
            snapshots,
            episodes: 0,
            score_sum: 0,
            max_score: 0,
            total_moves: 0,
            snapshot_count: 0,
            stopped_early: false,
            start_time: Instant::now(),
            interrupted,
        })
    }

    fn block_size(config: &TrainingConfig) -> u64 {
        match config.block {
            0 => config.total.max(1),
            n => n,
        }
    }

    /// Play the configured number of episodes.
    pub fn run(&mut self) -> Result<TrainingStats, LearningError> {
        self.run_with(|_| {})
    }

    /// Play the configured number of episodes, calling `on_block` with
    /// each block summary.
    pub fn run_with<F>(&mut self, mut on_block: F) -> Result<TrainingStats, LearningError>
    where
        F: FnMut(&BlockStats),
    {
        let block = Self::block_size(&self.config);
        self.info(&format!(
            "Starting: {} episodes, block {}, player {} ({})",
            self.config.total,
            block,
            self.player.name(),
            self.config.player
        ));

        while self.episodes < self.config.total {
            if self.is_interrupted() {
                self.stopped_early = true;
                self.warn("Training interrupted by signal");
                break;
            }

            let result = play_episode(self.player.as_mut(), &mut self.env);
            self.record(result);

            if self.episodes.is_multiple_of(block) || self.episodes == self.config.total {
                self.close_block(&mut on_block);
            }
            if self.config.snapshot_every > 0
                && self.episodes.is_multiple_of(self.config.snapshot_every)
            {
                self.save_snapshot();
            }
        }

        if !self.block_results.is_empty() {
            self.close_block(&mut on_block);
        }
        Ok(self.stats())
    }

    fn record(&mut self, result: EpisodeResult) {
        self.episodes += 1;
        self.score_sum += result.score as u64;
        self.max_score = self.max_score.max(result.score);
        self.total_moves += result.moves as u64;
        self.block_results.push(result);
    }

    fn close_block<F: FnMut(&BlockStats)>(&mut self, on_block: &mut F) {
        let stats = BlockStats::from_episodes(self.episodes, &self.block_results);
        self.block_results.clear();

        if let Some(logger) = &self.logger {
            logger.log_block(&stats);
            logger.log_progress(self.episodes, self.config.total);
        }
        on_block(&stats);

        if let Some(tables) = self.player.weights()
            && let Some((table, key, value)) = find_divergent(tables)
        {
            self.warn(&format!(
                "Evaluation diverged at episode {}: table {} key {} = {}",
                self.episodes, table, key, value
            ));
        }
    }

    /// Write a snapshot of the player's weights, if it has any. A failed
    /// save is retried once, then logged; training continues either way.
    fn save_snapshot(&mut self) {
        let (Some(manager), Some(tables)) = (&self.snapshots, self.player.weights()) else {
            return;
        };
        let episodes = self.episodes;
        match save_with_retry(|| manager.save(episodes, tables)) {
            Ok(path) => {
                self.snapshot_count += 1;
                if let Some(logger) = &self.logger {
                    logger.log_snapshot(episodes, &path);
                }
            }
            Err(e) => self.warn(&format!("Snapshot at episode {} failed: {}", episodes, e)),
        }
    }

    fn info(&self, message: &str) {
        log::info!("{}", message);
        if let Some(logger) = &self.logger {
            logger.log_info(message);
        }
    }

    fn warn(&self, message: &str) {
        log::warn!("{}", message);
        if let Some(logger) = &self.logger {
            logger.log_warning(message);
        }
    }

    /// Summary of everything played so far.
    pub fn stats(&self) -> TrainingStats {
        let elapsed_secs = self.start_time.elapsed().as_secs_f64();
        TrainingStats {
            episodes: self.episodes,
            elapsed_secs,
            episodes_per_sec: if elapsed_secs > 0.0 {
                self.episodes as f64 / elapsed_secs
            } else {
                0.0
            },
            avg_score: if self.episodes > 0 {
                self.score_sum as f64 / self.episodes as f64
            } else {
                0.0
            },
            max_score: self.max_score,
            total_moves: self.total_moves,
            snapshots: self.snapshot_count,
            interrupted: self.stopped_early,
        }
    }

    /// Persist the player and close the log.
    ///
    /// # Errors
    ///
    /// - `LearningError::Io` if the player's `save=` file cannot be written
    pub fn finish(mut self) -> Result<TrainingStats, LearningError> {
        let persisted = self.player.persist();
        let stats = self.stats();

        match &persisted {
            Ok(()) => self.info(&format!(
                "Training stopped: {} episodes, {:.1}s elapsed, {:.2} episodes/sec",
                stats.episodes, stats.elapsed_secs, stats.episodes_per_sec
            )),
            Err(e) => self.warn(&format!("Failed to persist {}: {}", self.player.name(), e)),
        }
        if let Some(logger) = self.logger.take() {
            logger.shutdown()?;
        }

        persisted.map(|()| stats)
    }

    pub fn episodes(&self) -> u64 {
        self.episodes
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn player(&self) -> &dyn Player {
        self.player.as_ref()
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn log_path(&self) -> Option<&std::path::Path> {
        self.logger.as_ref().map(|l| l.log_path())
    }

    /// Shared interrupt flag; setting it stops the run after the current
    /// episode.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupted)
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }
}
