//! Desaprender CLI
//!
//! # Usage
//!
//! ```bash
//! # Train a checkpoint on synthetic blobs
//! desaprender train -o checkpoints/mlp_blobs_best.json
//!
//! # Unlearn class 1 with random relabeling under a saliency mask
//! desaprender unlearn -c checkpoints/mlp_blobs_best.json --class-to-forget 1 --use-mask
//!
//! # One run per method, repeated three times
//! desaprender unlearn --class-to-forget 1 --load exp --nexp 3
//! ```

use clap::Parser;
use desaprender::cli::{init_tracing, run_command, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level());

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
