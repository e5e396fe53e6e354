//! Train or evaluate a Threes player.
//!
//! ```text
//! tritile --total=100000 --block=10000 \
//!     --play="load=weights.bin save=weights.bin alpha=0.1" \
//!     --evil="seed=42"
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use tritile::agent::PlayerKind;
use tritile::learning::checkpoint::DEFAULT_RETENTION_COUNT;
use tritile::learning::{TrainingConfig, TrainingEngine};

#[derive(Parser, Debug)]
#[command(name = "tritile", version, about = "Self-play TD learning for Threes")]
struct Args {
    /// Episodes to play
    #[arg(long, default_value_t = 1000)]
    total: u64,

    /// Episodes per statistics block (0 = whole run)
    #[arg(long, default_value_t = 0)]
    block: u64,

    /// Player arguments, e.g. "load=w.bin save=w.bin alpha=0.1"
    #[arg(long, default_value = "")]
    play: String,

    /// Environment arguments, e.g. "seed=7 features=hint"
    #[arg(long, default_value = "")]
    evil: String,

    /// Player strategy: td, random, priority, greedy
    #[arg(long, default_value = "td")]
    player: PlayerKind,

    /// Write a training log file into this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Write weight snapshots into this directory
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Episodes between snapshots
    #[arg(long, default_value_t = 0)]
    snapshot_every: u64,

    /// Snapshots to keep (0 = all)
    #[arg(long, default_value_t = DEFAULT_RETENTION_COUNT)]
    snapshot_keep: usize,

    /// Gzip snapshot payloads
    #[arg(long, default_value_t = false)]
    compress: bool,
}

impl Args {
    fn training_config(self) -> TrainingConfig {
        TrainingConfig {
            total: self.total,
            block: self.block,
            player: self.player,
            play_args: self.play,
            evil_args: self.evil,
            log_dir: self.log_dir,
            snapshot_dir: self.snapshot_dir,
            snapshot_every: self.snapshot_every,
            snapshot_retention: self.snapshot_keep,
            compress_snapshots: self.compress,
            handle_interrupts: true,
        }
    }
}

fn main() -> ExitCode {
    let config = Args::parse().training_config();

    let mut engine = match TrainingEngine::new(config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("tritile: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let run = engine.run_with(|block| println!("{}", block.summary()));
    if let Err(e) = &run {
        eprintln!("tritile: {}", e);
    }

    match engine.finish() {
        Ok(stats) if run.is_ok() => {
            if stats.interrupted {
                eprintln!("tritile: interrupted after {} episodes", stats.episodes);
            }
            ExitCode::SUCCESS
        }
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("tritile: {}", e);
            ExitCode::FAILURE
        }
    }
}
