//! # Desaprender: saliency-masked machine unlearning
//!
//! Given a classifier trained on a labeled dataset and a split of its
//! training data into a *forget* and a *retain* subset, desaprender updates
//! the model so that it treats the forget subset like unseen data while
//! keeping its accuracy elsewhere. How much was forgotten is measured with a
//! loss-based membership inference attack.
//!
//! ## Architecture
//!
//! - `autograd`: tape-based reverse-mode differentiation over flat tensors
//! - `nn`: classifiers (`Linear`, `Mlp`) behind the `Classifier` trait
//! - `optim`: SGD and learning-rate scheduling
//! - `data`: datasets, loaders, forget sets and the five-way split
//! - `train`: cross-entropy loss and the supervised training driver
//! - `forest`: random forests and ROC AUC for the attack
//! - `unlearn`: saliency masks, strategies, masked updates, evaluation, MIA
//! - `experiment`: end-to-end runs with tracking and aggregation
//! - `io`, `tracking`, `config`, `cli`: checkpoints, run records, settings,
//!   command line
//!
//! ## Example
//!
//! ```
//! use desaprender::data::{BlobsConfig, ForgetSelector, SplitConfig, UnlearningSplits};
//! use desaprender::nn::{Mlp, ModelSpec};
//! use desaprender::unlearn::build_mask;
//! use desaprender::Device;
//!
//! # fn main() -> desaprender::Result<()> {
//! let (train, test) = BlobsConfig {
//!     num_classes: 3,
//!     num_features: 4,
//!     ..Default::default()
//! }
//! .generate()?;
//! let forget = ForgetSelector::Class { class: 0 };
//! let splits = UnlearningSplits::build(train, test, &forget, SplitConfig::default())?;
//!
//! let spec = ModelSpec {
//!     name: "mlp".into(),
//!     input_dim: 4,
//!     hidden: vec![8],
//!     num_classes: 3,
//! };
//! let model = Mlp::new(&spec, 0)?;
//! let mask = build_mask(&model, &splits.forget, 0.1, 0.5, Device::Cpu)?;
//! assert_eq!(mask.len(), 4);
//! # Ok(())
//! # }
//! ```

pub mod autograd;
pub mod cli;
pub mod config;
pub mod data;
pub mod device;
pub mod error;
pub mod experiment;
pub mod forest;
pub mod io;
pub mod nn;
pub mod optim;
pub mod tracking;
pub mod train;
pub mod unlearn;

pub use autograd::Tensor;
pub use device::Device;
pub use error::{Error, Result};
