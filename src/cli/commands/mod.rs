//! CLI command implementations

mod train;
mod unlearn;

use crate::cli::{Cli, Command};
use crate::Result;

/// Execute a CLI command based on the parsed arguments
pub fn run_command(cli: Cli) -> Result<()> {
    let level = cli.log_level();
    match cli.command {
        Command::Train(args) => train::run_train(&args, level).map(|_| ()),
        Command::Unlearn(args) => unlearn::run_unlearn(&args, level).map(|_| ()),
    }
}
