//! Experiment configuration
//!
//! [`Settings`] describes one unlearning run; [`ExperimentSource`] expands
//! the `--load` argument into the list of settings to run.

mod experiments;
mod settings;

pub use experiments::ExperimentSource;
pub use settings::Settings;
