//! Random forest classifier and ROC AUC
//!
//! Used by the membership-inference attack to separate member from
//! non-member losses.

mod criterion;
mod ensemble;
mod metrics;
mod tree;

pub use criterion::Criterion;
pub use ensemble::{ForestConfig, RandomForest};
pub use metrics::roc_auc;
pub use tree::{DecisionTree, LeafInfo, Node, TreeConfig, TreeSplit};
