mod batcher;
mod bitmap;
mod idx;
mod source;

pub use batcher::{Batch, Batcher, Batches};
pub use bitmap::read_bitmap;
pub use source::{EVAL_LEN, MnistSource, TRAIN_LEN};

use ndarray::prelude::*;
use serde::Deserialize;

use crate::{MlErr, Result};

/// The amount of digit classes.
pub const CLASSES: usize = 10;

/// The side of the square digit images.
pub const IMAGE_SIDE: usize = 28;

/// How raw `0..=255` pixel intensities are turned into model inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// Intensities are kept as they are.
    Raw,
    /// Intensities are scaled into `[0, 1]`.
    Normalized,
    /// Scaled into `[0, 1]` and then standardized with the corpus mean and deviation.
    Standardized,
}

impl Normalization {
    pub const MEAN: f32 = 0.1307;
    pub const STD: f32 = 0.3081;

    pub fn apply(self, pixel: u8) -> f32 {
        let raw = pixel as f32;

        match self {
            Normalization::Raw => raw,
            Normalization::Normalized => raw / 255.,
            Normalization::Standardized => (raw / 255. - Self::MEAN) / Self::STD,
        }
    }
}

/// An ordered, non empty set of labeled images.
///
/// The images are held as one `(len, 1, 28, 28)` tensor, parallel to the labels.
#[derive(Debug, Clone)]
pub struct Dataset {
    images: Array4<f32>,
    labels: Vec<u8>,
}

impl Dataset {
    /// Creates a new `Dataset`.
    ///
    /// # Arguments
    /// * `images` - The `(len, channels, height, width)` images.
    /// * `labels` - One label per image.
    ///
    /// # Returns
    /// A new `Dataset` or an error if it would be empty or the lengths disagree.
    pub fn new(images: Array4<f32>, labels: Vec<u8>) -> Result<Self> {
        if labels.is_empty() {
            return Err(MlErr::DataUnavailable("the dataset holds no samples".into()));
        }

        if images.len_of(Axis(0)) != labels.len() {
            return Err(MlErr::ShapeMismatch {
                what: "dataset images",
                got: images.shape().to_vec(),
                expected: format!("[{}, _, _, _]", labels.len()),
            });
        }

        Ok(Self { images, labels })
    }

    /// Creates a new `Dataset` out of row major `28x28` raw pixel images.
    ///
    /// # Arguments
    /// * `pixels` - The raw pixels of every image, one after the other.
    /// * `labels` - One label per image.
    /// * `normalization` - How the pixels are turned into inputs.
    pub fn from_pixels(pixels: &[u8], labels: Vec<u8>, normalization: Normalization) -> Result<Self> {
        let shape = (labels.len(), 1, IMAGE_SIDE, IMAGE_SIDE);
        let values = pixels.iter().map(|&p| normalization.apply(p)).collect();

        let images = Array4::from_shape_vec(shape, values).map_err(|_| MlErr::SizeMismatch {
            what: "dataset pixels",
            got: pixels.len(),
            expected: labels.len() * IMAGE_SIDE * IMAGE_SIDE,
        })?;

        Self::new(images, labels)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn images(&self) -> ArrayView4<'_, f32> {
        self.images.view()
    }

    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    /// Returns the image and the label at `idx` (panics if out of bounds).
    pub fn sample(&self, idx: usize) -> (ArrayView3<'_, f32>, u8) {
        (self.images.index_axis(Axis(0), idx), self.labels[idx])
    }

    /// Gathers the samples at `indices`, in that order, into a batch.
    fn gather(&self, indices: &[usize]) -> Batch {
        Batch {
            images: self.images.select(Axis(0), indices),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizations() {
        assert_eq!(Normalization::Raw.apply(255), 255.);
        assert_eq!(Normalization::Normalized.apply(255), 1.);
        assert!((Normalization::Standardized.apply(0) + 0.1307 / 0.3081).abs() < 1e-6);
    }

    #[test]
    fn empty_dataset_is_unavailable() {
        let err = Dataset::new(Array4::zeros((0, 1, 28, 28)), vec![]).unwrap_err();
        assert!(matches!(err, MlErr::DataUnavailable(_)));
    }

    #[test]
    fn images_and_labels_must_agree() {
        let err = Dataset::new(Array4::zeros((3, 1, 28, 28)), vec![1, 2]).unwrap_err();
        assert!(matches!(err, MlErr::ShapeMismatch { .. }));
    }

    #[test]
    fn from_pixels_lays_out_each_image() {
        let mut pixels = vec![0u8; 2 * 784];
        pixels[784 + 28] = 255;

        let dataset = Dataset::from_pixels(&pixels, vec![4, 7], Normalization::Normalized).unwrap();
        let (image, label) = dataset.sample(1);

        assert_eq!(dataset.len(), 2);
        assert_eq!(label, 7);
        assert_eq!(image[[0, 1, 0]], 1.);
        assert_eq!(image.sum(), 1.);
    }
}
