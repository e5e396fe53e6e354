//! Relaunch the training binary in a loop.
//!
//! Each run resumes from the weight file the previous run saved, so a long
//! training session survives as a chain of short processes.

use std::path::PathBuf;
use std::process::{Command, ExitCode};

use clap::Parser;

const DEFAULT_ARGS: [&str; 3] = [
    "--total=100000",
    "--block=10000",
    "--play=load=weights.bin save=weights.bin alpha=0.1",
];

#[derive(Parser, Debug)]
#[command(name = "autorun", version, about = "Run tritile repeatedly")]
struct Args {
    /// Runs to perform (0 = until a run fails)
    #[arg(long, default_value_t = 0)]
    runs: u64,

    /// Training binary to launch
    #[arg(long, default_value = "tritile")]
    program: PathBuf,

    /// Arguments for each run; defaults to a 100000-episode block
    /// resuming from and saving to weights.bin
    #[arg(last = true)]
    run_args: Vec<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let run_args: Vec<String> = if args.run_args.is_empty() {
        DEFAULT_ARGS.iter().map(|s| s.to_string()).collect()
    } else {
        args.run_args
    };

    let mut completed = 0u64;
    while args.runs == 0 || completed < args.runs {
        let status = match Command::new(&args.program).args(&run_args).status() {
            Ok(status) => status,
            Err(e) => {
                eprintln!("autorun: cannot launch {}: {}", args.program.display(), e);
                return ExitCode::FAILURE;
            }
        };
        if !status.success() {
            eprintln!("autorun: run {} failed: {}", completed + 1, status);
            return ExitCode::FAILURE;
        }
        completed += 1;
        eprintln!("autorun: completed run {}", completed);
    }

    ExitCode::SUCCESS
}
