//! Checkpoint I/O
//!
//! Checkpoints are JSON or YAML, chosen by file extension, and hold the
//! model's parameters, the configuration it was trained with and,
//! optionally, the optimizer state.

mod checkpoint;
mod format;
mod state;

pub use checkpoint::{load_checkpoint, save_checkpoint, Checkpoint, CheckpointConfig};
pub use format::CheckpointFormat;
pub use state::{ModelState, ParameterInfo};
