//! Serializable parameter state of a classifier

use crate::nn::Classifier;
use crate::{Error, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Information about one stored parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterInfo {
    /// Parameter name (e.g. "layers.0.weight")
    pub name: String,
    pub shape: Vec<usize>,
}

impl ParameterInfo {
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }
}

/// Named parameters with their values flattened into one buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelState {
    pub parameters: Vec<ParameterInfo>,
    pub data: Vec<f32>,
}

impl ModelState {
    /// Snapshot every parameter of `model`, in declaration order
    pub fn capture(model: &dyn Classifier) -> Self {
        let mut data = Vec::with_capacity(model.num_parameters());
        let parameters = model
            .named_parameters()
            .into_iter()
            .map(|(name, tensor)| {
                data.extend(tensor.data().iter().copied());
                ParameterInfo {
                    name,
                    shape: tensor.shape().to_vec(),
                }
            })
            .collect();
        Self { parameters, data }
    }

    /// Total number of stored values
    pub fn numel(&self) -> usize {
        self.parameters.iter().map(ParameterInfo::numel).sum()
    }

    /// Copy stored values into `model`
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when the model has a parameter the state lacks,
    /// [`Error::ShapeMismatch`] when shapes differ, and
    /// [`Error::Serialization`] when the data buffer is truncated.
    pub fn apply_to(&self, model: &mut dyn Classifier) -> Result<()> {
        if self.data.len() != self.numel() {
            return Err(Error::Serialization(format!(
                "model state holds {} values but its parameters need {}",
                self.data.len(),
                self.numel()
            )));
        }

        let mut offset = 0;
        let mut slices = HashMap::with_capacity(self.parameters.len());
        for info in &self.parameters {
            let end = offset + info.numel();
            slices.insert(info.name.as_str(), (info, &self.data[offset..end]));
            offset = end;
        }

        for (name, param) in model.named_parameters_mut() {
            let (info, values) = slices
                .get(name.as_str())
                .ok_or_else(|| Error::Config(format!("checkpoint has no parameter '{name}'")))?;
            if info.shape != param.shape() {
                return Err(Error::ShapeMismatch {
                    name,
                    expected: param.shape().to_vec(),
                    actual: info.shape.clone(),
                });
            }
            *param.data_mut() = Array1::from(values.to_vec());
        }
        Ok(())
    }
}
