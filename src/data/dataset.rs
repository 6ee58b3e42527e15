//! In-memory labeled dataset

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One labeled feature vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub features: Vec<f32>,
    pub label: usize,
}

impl Example {
    pub fn new(features: Vec<f32>, label: usize) -> Self {
        Self { features, label }
    }
}

/// On-disk dataset layout
#[derive(Debug, Serialize, Deserialize)]
struct DatasetFile {
    #[serde(default)]
    name: Option<String>,
    num_classes: usize,
    examples: Vec<Example>,
}

/// Dense classification dataset
///
/// An example's identity index is its position in `examples`.
#[derive(Debug, Clone)]
pub struct Dataset {
    name: String,
    examples: Vec<Example>,
    num_features: usize,
    num_classes: usize,
}

impl Dataset {
    /// Create a dataset, validating feature widths and labels
    pub fn new(
        name: impl Into<String>,
        examples: Vec<Example>,
        num_classes: usize,
    ) -> Result<Self> {
        let name = name.into();
        let num_features = examples.first().map_or(0, |e| e.features.len());

        for (i, example) in examples.iter().enumerate() {
            if example.features.len() != num_features {
                return Err(Error::InvalidInput(format!(
                    "{name}: example {i} has {} features, expected {num_features}",
                    example.features.len()
                )));
            }
            if example.label >= num_classes {
                return Err(Error::InvalidInput(format!(
                    "{name}: example {i} has label {} but only {num_classes} classes",
                    example.label
                )));
            }
            if let Some(bad) = example.features.iter().find(|v| !v.is_finite()) {
                return Err(Error::NonFinite {
                    what: format!("{name} feature in example {i}"),
                    value: *bad,
                });
            }
        }

        Ok(Self {
            name,
            examples,
            num_features,
            num_classes,
        })
    }

    /// Load a dataset from a JSON file
    ///
    /// Layout: `{"name": "...", "num_classes": K, "examples": [{"features": [...], "label": 0}]}`
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let file: DatasetFile = serde_json::from_str(&content)?;
        let name = file.name.unwrap_or_else(|| {
            path.file_stem()
                .map_or_else(|| "dataset".to_string(), |s| s.to_string_lossy().into_owned())
        });
        Self::new(name, file.examples, file.num_classes)
    }

    /// Write the dataset as JSON
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = DatasetFile {
            name: Some(self.name.clone()),
            num_classes: self.num_classes,
            examples: self.examples.clone(),
        };
        std::fs::write(path, serde_json::to_string(&file)?)?;
        Ok(())
    }

    /// Dataset name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of examples
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Feature width
    pub fn num_features(&self) -> usize {
        self.num_features
    }

    /// Number of classes
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Example by identity index
    pub fn get(&self, index: usize) -> Option<&Example> {
        self.examples.get(index)
    }

    /// All examples
    pub fn examples(&self) -> &[Example] {
        &self.examples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_new_validates_width() {
        let examples = vec![Example::new(vec![1.0, 2.0], 0), Example::new(vec![1.0], 1)];
        assert!(matches!(
            Dataset::new("bad", examples, 2),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_new_validates_labels() {
        let examples = vec![Example::new(vec![1.0], 3)];
        assert!(Dataset::new("bad", examples, 3).is_err());
    }

    #[test]
    fn test_new_rejects_nan_features() {
        let examples = vec![Example::new(vec![f32::NAN], 0)];
        assert!(matches!(
            Dataset::new("bad", examples, 1),
            Err(Error::NonFinite { .. })
        ));
    }

    #[test]
    fn test_json_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("toy.json");
        let ds = Dataset::new(
            "toy",
            vec![Example::new(vec![0.5, 1.5], 1), Example::new(vec![2.0, -1.0], 0)],
            2,
        )
        .unwrap();
        ds.save_json(&path).unwrap();

        let loaded = Dataset::from_json_file(&path).unwrap();
        assert_eq!(loaded.name(), "toy");
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.num_features(), 2);
        assert_eq!(loaded.get(0), ds.get(0));
    }

    #[test]
    fn test_json_name_defaults_to_file_stem() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("points.json");
        let content = r#"{"num_classes": 2, "examples": [{"features": [1.0], "label": 1}]}"#;
        std::fs::write(&path, content).unwrap();
        assert_eq!(Dataset::from_json_file(&path).unwrap().name(), "points");
    }
}
