//! Training statistics and the file logger.
//!
//! [`BlockStats`] summarizes each block of episodes (average and max
//! score, episode length, throughput, and how often each tile was reached).
//! [`TrainingLogger`] appends those summaries to
//! `<log_dir>/training_YYYYMMDD_HHMMSS.log` from a background writer
//! thread, so file I/O never stalls the training loop.

use std::fmt::Write as _;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Local;

use crate::board::{MAX_TILE, tile_value};
use crate::learning::LearningError;
use crate::learning::self_play::EpisodeResult;

/// Statistics for one block of episodes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BlockStats {
    /// Episodes completed since the run started.
    pub episodes_completed: u64,
    /// Episodes in this block.
    pub block_size: usize,
    /// Mean final score.
    pub avg_score: f64,
    /// Best final score.
    pub max_score: u32,
    /// Mean slides per episode.
    pub avg_moves: f64,
    /// Slides per second of wall time within the block.
    pub moves_per_sec: f64,
    /// Mean absolute TD error, for learning players.
    pub avg_td_error: Option<f64>,
    /// `(tile, reached %, ended-at %)` for every max tile seen, ascending.
    ///
    /// `reached` is the share of episodes whose max tile is at least
    /// `tile`; `ended-at` is the share whose max tile is exactly `tile`.
    pub tile_reach: Vec<(u8, f64, f64)>,
}

impl BlockStats {
    /// Summarize `results`.
    pub fn from_episodes(episodes_completed: u64, results: &[EpisodeResult]) -> Self {
        if results.is_empty() {
            return Self {
                episodes_completed,
                ..Self::default()
            };
        }

        let n = results.len() as f64;
        let total_score: u64 = results.iter().map(|r| r.score as u64).sum();
        let total_moves: u64 = results.iter().map(|r| r.moves as u64).sum();
        let total_secs: f64 = results.iter().map(|r| r.duration.as_secs_f64()).sum();

        let td_errors: Vec<f64> = results
            .iter()
            .filter_map(|r| r.td_stats.map(|s| s.avg_td_error))
            .collect();
        let avg_td_error =
            (!td_errors.is_empty()).then(|| td_errors.iter().sum::<f64>() / td_errors.len() as f64);

        let mut ended_at = [0usize; MAX_TILE as usize + 1];
        for r in results {
            ended_at[r.max_tile as usize] += 1;
        }
        let mut tile_reach = Vec::new();
        let mut at_least = results.len();
        for (tile, &count) in ended_at.iter().enumerate() {
            if count > 0 {
                tile_reach.push((
                    tile as u8,
                    at_least as f64 * 100.0 / n,
                    count as f64 * 100.0 / n,
                ));
            }
            at_least -= count;
        }

        Self {
            episodes_completed,
            block_size: results.len(),
            avg_score: total_score as f64 / n,
            max_score: results.iter().map(|r| r.score).max().unwrap_or(0),
            avg_moves: total_moves as f64 / n,
            moves_per_sec: if total_secs > 0.0 {
                total_moves as f64 / total_secs
            } else {
                0.0
            },
            avg_td_error,
            tile_reach,
        }
    }

    /// Multi-line summary in the usual block report form:
    ///
    /// ```text
    /// 1000    avg = 1422, max = 5637, ops = 183422
    ///         48      100%    (2.1%)
    ///         96      97.9%   (31.6%)
    /// ```
    pub fn summary(&self) -> String {
        let mut out = format!(
            "{}\tavg = {:.0}, max = {}, ops = {:.0}",
            self.episodes_completed, self.avg_score, self.max_score, self.moves_per_sec
        );
        if let Some(err) = self.avg_td_error {
            let _ = write!(out, ", td = {:.4}", err);
        }
        for &(tile, reached, exact) in &self.tile_reach {
            let _ = write!(
                out,
                "\n\t{}\t{}%\t({}%)",
                tile_value(tile),
                round1(reached),
                round1(exact)
            );
        }
        out
    }
}

fn round1(pct: f64) -> f64 {
    (pct * 10.0).round() / 10.0
}

#[derive(Clone, Debug)]
enum LogMessage {
    Block(BlockStats),
    Snapshot(u64, PathBuf),
    Progress(u64, u64, Duration),
    Warning(String),
    Info(String),
    Shutdown,
}

/// Asynchronous training log writer.
///
/// # Example
///
/// ```no_run
/// use tritile::learning::TrainingLogger;
///
/// let logger = TrainingLogger::new("logs/")?;
/// logger.log_info("starting");
/// logger.shutdown()?;
/// # Ok::<(), tritile::learning::LearningError>(())
/// ```
pub struct TrainingLogger {
    sender: Sender<LogMessage>,
    writer_handle: Option<JoinHandle<()>>,
    start_time: Instant,
    log_path: PathBuf,
}

impl TrainingLogger {
    /// Create the log directory if needed, open a fresh timestamped log
    /// file, and start the writer thread.
    ///
    /// # Errors
    ///
    /// - `LearningError::Io` if directory creation or file open fails
    pub fn new<P: AsRef<Path>>(log_dir: P) -> Result<Self, LearningError> {
        let log_dir = log_dir.as_ref().to_path_buf();
        if !log_dir.exists() {
            fs::create_dir_all(&log_dir)?;
        }

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let log_path = log_dir.join(format!("training_{}.log", timestamp));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let (sender, receiver) = mpsc::channel();
        let writer_handle = Self::start_writer_thread(file, receiver);

        let logger = Self {
            sender,
            writer_handle: Some(writer_handle),
            start_time: Instant::now(),
            log_path,
        };
        logger.log_info("Training logger initialized");
        Ok(logger)
    }

    fn start_writer_thread(file: File, receiver: Receiver<LogMessage>) -> JoinHandle<()> {
        thread::spawn(move || {
            let mut writer = BufWriter::new(file);
            while let Ok(msg) = receiver.recv() {
                if let LogMessage::Shutdown = msg {
                    break;
                }
                if let Err(e) = Self::write_message(&mut writer, &msg) {
                    eprintln!("Logger error: {}", e);
                }
            }
            let _ = writer.flush();
        })
    }

    fn write_message<W: Write>(writer: &mut W, msg: &LogMessage) -> std::io::Result<()> {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");

        match msg {
            LogMessage::Block(stats) => {
                writeln!(
                    writer,
                    "[{}] BLOCK {:>9} | avg:{:>9.1} max:{:>8} | moves:{:>7.1} | {:.0} ops",
                    timestamp,
                    stats.episodes_completed,
                    stats.avg_score,
                    stats.max_score,
                    stats.avg_moves,
                    stats.moves_per_sec
                )?;
                for &(tile, reached, exact) in &stats.tile_reach {
                    writeln!(
                        writer,
                        "    {:>6} {:>6.1}% ({:.1}%)",
                        tile_value(tile),
                        reached,
                        exact
                    )?;
                }
            }
            LogMessage::Snapshot(episodes, path) => {
                writeln!(
                    writer,
                    "[{}] SNAPSHOT {:>9} -> {}",
                    timestamp,
                    episodes,
                    path.display()
                )?;
            }
            LogMessage::Progress(current, target, eta) => {
                let progress = *current as f64 / (*target).max(1) as f64 * 100.0;
                let eta_secs = eta.as_secs();
                writeln!(
                    writer,
                    "[{}] PROGRESS {:>9}/{} ({:.1}%) | ETA: {}h {:02}m",
                    timestamp,
                    current,
                    target,
                    progress,
                    eta_secs / 3600,
                    (eta_secs % 3600) / 60
                )?;
            }
            LogMessage::Warning(msg) => writeln!(writer, "[{}] WARNING: {}", timestamp, msg)?,
            LogMessage::Info(msg) => writeln!(writer, "[{}] INFO: {}", timestamp, msg)?,
            LogMessage::Shutdown => {}
        }

        writer.flush()
    }

    /// Queue a block summary.
    pub fn log_block(&self, stats: &BlockStats) {
        let _ = self.sender.send(LogMessage::Block(stats.clone()));
    }

    /// Queue a snapshot notice.
    pub fn log_snapshot(&self, episodes: u64, path: &Path) {
        let _ = self
            .sender
            .send(LogMessage::Snapshot(episodes, path.to_path_buf()));
    }

    /// Queue a progress line with the estimated time remaining.
    pub fn log_progress(&self, current: u64, target: u64) {
        let eta = self.eta(current, target);
        let _ = self.sender.send(LogMessage::Progress(current, target, eta));
    }

    pub fn log_warning(&self, message: &str) {
        let _ = self.sender.send(LogMessage::Warning(message.to_string()));
    }

    pub fn log_info(&self, message: &str) {
        let _ = self.sender.send(LogMessage::Info(message.to_string()));
    }

    /// Estimated time remaining at the current episode rate.
    pub fn eta(&self, current: u64, target: u64) -> Duration {
        if current == 0 {
            return Duration::ZERO;
        }
        let rate = current as f64 / self.start_time.elapsed().as_secs_f64();
        if !rate.is_finite() || rate <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(target.saturating_sub(current) as f64 / rate)
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Flush pending messages and stop the writer thread.
    pub fn shutdown(mut self) -> Result<(), LearningError> {
        let _ = self.sender.send(LogMessage::Shutdown);
        if let Some(handle) = self.writer_handle.take() {
            handle
                .join()
                .map_err(|_| LearningError::Io(std::io::Error::other("Logger thread panicked")))?;
        }
        Ok(())
    }
}

impl Drop for TrainingLogger {
    fn drop(&mut self) {
        let _ = self.sender.send(LogMessage::Shutdown);
        if let Some(handle) = self.writer_handle.take() {
            let _ = handle.join();
        }
    }
}
