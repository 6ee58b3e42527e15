//! Command-line interface
//!
//! `train` writes a checkpoint; `unlearn` runs unlearning experiments on it.

mod args;
mod commands;
mod logging;

pub use args::{Cli, Command, TrainArgs, UnlearnArgs};
pub use commands::run_command;
pub use logging::{init_tracing, LogLevel};
