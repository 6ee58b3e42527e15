//! Dataset sources: synthetic Gaussian blobs or JSON files

use super::{Dataset, Example};
use crate::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Isotropic Gaussian clusters, one per class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobsConfig {
    pub num_classes: usize,
    pub num_features: usize,
    pub train_per_class: usize,
    pub test_per_class: usize,
    /// Cluster standard deviation
    pub spread: f32,
    /// Half-width of the box cluster centers are drawn from
    pub center_box: f32,
    pub seed: u64,
}

impl Default for BlobsConfig {
    fn default() -> Self {
        Self {
            num_classes: 4,
            num_features: 8,
            train_per_class: 200,
            test_per_class: 50,
            spread: 1.5,
            center_box: 4.0,
            seed: 0,
        }
    }
}

impl BlobsConfig {
    /// Draw train and test sets from the same cluster centers
    pub fn generate(&self) -> Result<(Dataset, Dataset)> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let centers: Vec<Vec<f32>> = (0..self.num_classes)
            .map(|_| {
                (0..self.num_features)
                    .map(|_| rng.random_range(-self.center_box..=self.center_box))
                    .collect()
            })
            .collect();

        let mut sample = |per_class: usize| -> Vec<Example> {
            // Interleave classes so prefixes stay balanced
            (0..per_class)
                .flat_map(|_| 0..self.num_classes)
                .map(|label| {
                    let features = centers[label]
                        .iter()
                        .map(|c| c + self.spread * standard_normal(&mut rng))
                        .collect();
                    Example::new(features, label)
                })
                .collect::<Vec<_>>()
        };

        let train = sample(self.train_per_class);
        let test = sample(self.test_per_class);
        Ok((
            Dataset::new("blobs_train", train, self.num_classes)?,
            Dataset::new("blobs_test", test, self.num_classes)?,
        ))
    }
}

/// Box-Muller transform over two uniforms
fn standard_normal(rng: &mut StdRng) -> f32 {
    let u1: f32 = rng.random::<f32>().max(f32::MIN_POSITIVE);
    let u2: f32 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (std::f32::consts::TAU * u2).cos()
}

/// Where the train and test sets come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataSource {
    Blobs(BlobsConfig),
    Files { train: PathBuf, test: PathBuf },
}

impl Default for DataSource {
    fn default() -> Self {
        Self::Blobs(BlobsConfig::default())
    }
}

impl DataSource {
    /// Load `(train, test)`
    pub fn load(&self) -> Result<(Dataset, Dataset)> {
        match self {
            Self::Blobs(config) => config.generate(),
            Self::Files { train, test } => {
                Ok((Dataset::from_json_file(train)?, Dataset::from_json_file(test)?))
            }
        }
    }

    /// Short name recorded in checkpoints and run configs
    pub fn name(&self) -> String {
        match self {
            Self::Blobs(_) => "blobs".to_string(),
            Self::Files { train, .. } => train
                .file_stem()
                .map_or_else(|| "files".to_string(), |s| s.to_string_lossy().into_owned()),
        }
    }
}
