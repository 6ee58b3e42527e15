//! Fully connected layer

use crate::autograd::linear;
use crate::{Result, Tensor};
use rand::rngs::StdRng;
use rand::Rng;

/// Affine layer `y = x · W + b`
///
/// Weight shape: `[in_features, out_features]` (row-major).
/// Bias shape: `[out_features]`.
pub struct Linear {
    /// Weight `[in_features, out_features]`
    pub weight: Tensor,
    /// Bias `[out_features]`
    pub bias: Tensor,
    in_features: usize,
    out_features: usize,
}

impl Linear {
    /// Create a layer with uniform `±1/sqrt(in_features)` initialization
    pub fn new(in_features: usize, out_features: usize, rng: &mut StdRng) -> Self {
        let bound = 1.0 / (in_features.max(1) as f32).sqrt();
        let mut sample = |n: usize| -> Vec<f32> {
            (0..n).map(|_| rng.random_range(-bound..bound)).collect()
        };

        let weight = Tensor::from_shape_vec(
            &[in_features, out_features],
            sample(in_features * out_features),
            true,
        );
        let bias = Tensor::from_vec(sample(out_features), true);

        Self {
            weight,
            bias,
            in_features,
            out_features,
        }
    }

    /// Forward pass over a `[batch, in_features]` input
    pub fn forward(&self, x: &Tensor, batch: usize) -> Result<Tensor> {
        linear(x, &self.weight, &self.bias, batch)
    }

    /// Input dimension
    pub fn in_features(&self) -> usize {
        self.in_features
    }

    /// Output dimension
    pub fn out_features(&self) -> usize {
        self.out_features
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_linear_shapes() {
        let mut rng = StdRng::seed_from_u64(0);
        let layer = Linear::new(4, 3, &mut rng);
        assert_eq!(layer.weight.shape(), &[4, 3]);
        assert_eq!(layer.bias.len(), 3);

        let x = Tensor::from_shape_vec(&[2, 4], vec![0.5; 8], false);
        let y = layer.forward(&x, 2).unwrap();
        assert_eq!(y.shape(), &[2, 3]);
    }

    #[test]
    fn test_init_is_bounded_and_seeded() {
        let a = Linear::new(16, 4, &mut StdRng::seed_from_u64(7));
        let b = Linear::new(16, 4, &mut StdRng::seed_from_u64(7));
        assert_eq!(a.weight.data(), b.weight.data());
        assert!(a.weight.data().iter().all(|w| w.abs() <= 0.25));
    }
}
