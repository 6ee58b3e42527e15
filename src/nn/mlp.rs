//! Multi-layer perceptron classifier

use super::{Classifier, Linear, ModelSpec};
use crate::autograd::relu;
use crate::{Error, Result, Tensor};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Stack of [`Linear`] layers with ReLU between them
///
/// With no hidden layers this is multinomial logistic regression.
/// Parameter names follow `layers.{i}.weight` / `layers.{i}.bias`.
pub struct Mlp {
    name: String,
    layers: Vec<Linear>,
    input_dim: usize,
    hidden: Vec<usize>,
    num_classes: usize,
}

impl Mlp {
    /// Build and initialize a classifier from its description
    pub fn new(spec: &ModelSpec, seed: u64) -> Result<Self> {
        if spec.input_dim == 0 {
            return Err(Error::Config("model input_dim must be > 0".into()));
        }
        if spec.num_classes < 2 {
            return Err(Error::Config(format!(
                "model needs at least 2 classes, got {}",
                spec.num_classes
            )));
        }
        if let Some(pos) = spec.hidden.iter().position(|&h| h == 0) {
            return Err(Error::Config(format!("hidden layer {pos} has zero width")));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut dims = Vec::with_capacity(spec.hidden.len() + 2);
        dims.push(spec.input_dim);
        dims.extend_from_slice(&spec.hidden);
        dims.push(spec.num_classes);

        let layers = dims
            .windows(2)
            .map(|w| Linear::new(w[0], w[1], &mut rng))
            .collect();

        Ok(Self {
            name: spec.name.clone(),
            layers,
            input_dim: spec.input_dim,
            hidden: spec.hidden.clone(),
            num_classes: spec.num_classes,
        })
    }

    /// Layers in forward order
    pub fn layers(&self) -> &[Linear] {
        &self.layers
    }
}

impl Classifier for Mlp {
    fn forward(&self, inputs: &Tensor, batch: usize) -> Result<Tensor> {
        if inputs.len() != batch * self.input_dim {
            return Err(Error::ShapeMismatch {
                name: "classifier.input".to_string(),
                expected: vec![batch, self.input_dim],
                actual: inputs.shape().to_vec(),
            });
        }

        let last = self.layers.len() - 1;
        let mut h = inputs.clone();
        for (i, layer) in self.layers.iter().enumerate() {
            h = layer.forward(&h, batch)?;
            if i < last {
                h = relu(&h);
            }
        }
        Ok(h)
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn input_dim(&self) -> usize {
        self.input_dim
    }

    fn spec(&self) -> ModelSpec {
        ModelSpec {
            name: self.name.clone(),
            input_dim: self.input_dim,
            hidden: self.hidden.clone(),
            num_classes: self.num_classes,
        }
    }

    fn named_parameters(&self) -> Vec<(String, &Tensor)> {
        self.layers
            .iter()
            .enumerate()
            .flat_map(|(i, layer)| {
                [
                    (format!("layers.{i}.weight"), &layer.weight),
                    (format!("layers.{i}.bias"), &layer.bias),
                ]
            })
            .collect()
    }

    fn named_parameters_mut(&mut self) -> Vec<(String, &mut Tensor)> {
        self.layers
            .iter_mut()
            .enumerate()
            .flat_map(|(i, layer)| {
                [
                    (format!("layers.{i}.weight"), &mut layer.weight),
                    (format!("layers.{i}.bias"), &mut layer.bias),
                ]
            })
            .collect()
    }
}
