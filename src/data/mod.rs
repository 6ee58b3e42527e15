//! Datasets, loaders and the forget/retain partition

mod dataset;
mod forget;
mod loader;
mod source;
mod splits;

pub use dataset::{Dataset, Example};
pub use forget::{ForgetSelector, ForgetSet};
pub use loader::{Batch, Batches, DataLoader};
pub use source::{BlobsConfig, DataSource};
pub use splits::{SplitConfig, UnlearningSplits};
