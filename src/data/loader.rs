//! Mini-batch iteration over a subset of a dataset

use super::Dataset;
use crate::{Device, Tensor};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::cell::Cell;
use std::rc::Rc;

/// A batch of examples with their identity indices
#[derive(Clone)]
pub struct Batch {
    /// Features `[batch, num_features]`
    pub inputs: Tensor,
    /// Class labels
    pub labels: Vec<usize>,
    /// Identity indices into the source dataset
    pub indices: Vec<usize>,
}

impl Batch {
    /// Number of examples
    pub fn size(&self) -> usize {
        self.labels.len()
    }

    /// Place the batch on a device
    pub fn to_device(self, device: Device) -> Self {
        // Host-only build: every device resolves to the cpu
        debug_assert!(device.resolve().is_cpu());
        self
    }
}

/// Iterates a fixed subset of a dataset in batches
///
/// Shuffling loaders draw a new permutation per pass, seeded by
/// `seed + pass`, so repeated runs see the same sequence of orders.
pub struct DataLoader {
    dataset: Rc<Dataset>,
    indices: Vec<usize>,
    batch_size: usize,
    shuffle_seed: Option<u64>,
    pass: Cell<u64>,
}

impl DataLoader {
    /// Loader over `indices` in fixed order
    pub fn new(dataset: Rc<Dataset>, indices: Vec<usize>, batch_size: usize) -> Self {
        Self {
            dataset,
            indices,
            batch_size: batch_size.max(1),
            shuffle_seed: None,
            pass: Cell::new(0),
        }
    }

    /// Reshuffle on every pass
    pub fn shuffled(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    /// Number of examples
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Check if the loader yields nothing
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Number of batches per pass
    pub fn num_batches(&self) -> usize {
        self.indices.len().div_ceil(self.batch_size)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Identity indices covered by this loader
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Underlying dataset
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Start a pass over the data
    pub fn iter(&self) -> Batches<'_> {
        let mut order = self.indices.clone();
        if let Some(seed) = self.shuffle_seed {
            let pass = self.pass.get();
            self.pass.set(pass + 1);
            order.shuffle(&mut StdRng::seed_from_u64(seed.wrapping_add(pass)));
        }
        Batches {
            loader: self,
            order,
            position: 0,
        }
    }
}

impl<'a> IntoIterator for &'a DataLoader {
    type Item = Batch;
    type IntoIter = Batches<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// One pass over a [`DataLoader`]
pub struct Batches<'a> {
    loader: &'a DataLoader,
    order: Vec<usize>,
    position: usize,
}

impl Iterator for Batches<'_> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        if self.position >= self.order.len() {
            return None;
        }
        let end = (self.position + self.loader.batch_size).min(self.order.len());
        let indices = self.order[self.position..end].to_vec();
        self.position = end;

        let dataset = &self.loader.dataset;
        let width = dataset.num_features();
        let mut features = Vec::with_capacity(indices.len() * width);
        let mut labels = Vec::with_capacity(indices.len());
        for &i in &indices {
            // Loaders are built from indices of this dataset
            let example = &dataset.examples()[i];
            features.extend_from_slice(&example.features);
            labels.push(example.label);
        }

        Some(Batch {
            inputs: Tensor::from_shape_vec(&[indices.len(), width], features, false),
            labels,
            indices,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.order.len() - self.position).div_ceil(self.loader.batch_size);
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Example;

    fn dataset(n: usize) -> Rc<Dataset> {
        let examples = (0..n)
            .map(|i| Example::new(vec![i as f32, -(i as f32)], i % 2))
            .collect();
        Rc::new(Dataset::new("toy", examples, 2).unwrap())
    }

    #[test]
    fn test_batches_cover_subset_in_order() {
        let loader = DataLoader::new(dataset(10), vec![1, 3, 5, 7, 9], 2);
        let batches: Vec<Batch> = loader.iter().collect();
        assert_eq!(batches.len(), 3);
        assert_eq!(loader.num_batches(), 3);
        assert_eq!(batches[0].indices, vec![1, 3]);
        assert_eq!(batches[2].indices, vec![9]);
        assert_eq!(batches[0].inputs.shape(), &[2, 2]);
        assert_eq!(batches[0].inputs.data().to_vec(), vec![1.0, -1.0, 3.0, -3.0]);
        assert_eq!(batches[1].labels, vec![1, 1]);
    }

    #[test]
    fn test_shuffle_changes_per_pass_and_is_reproducible() {
        let a = DataLoader::new(dataset(50), (0..50).collect(), 50).shuffled(4);
        let b = DataLoader::new(dataset(50), (0..50).collect(), 50).shuffled(4);

        let first: Vec<usize> = a.iter().flat_map(|b| b.indices).collect();
        let second: Vec<usize> = a.iter().flat_map(|b| b.indices).collect();
        let replay: Vec<usize> = b.iter().flat_map(|b| b.indices).collect();

        assert_ne!(first, second);
        assert_eq!(first, replay);

        let mut sorted = first.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_empty_loader() {
        let loader = DataLoader::new(dataset(4), vec![], 8);
        assert!(loader.is_empty());
        assert_eq!(loader.iter().count(), 0);
    }

    #[test]
    fn test_batch_to_device_keeps_data() {
        let loader = DataLoader::new(dataset(3), vec![0, 1, 2], 3);
        let batch = loader.iter().next().unwrap().to_device(Device::Cuda(0));
        assert_eq!(batch.size(), 3);
    }
}
