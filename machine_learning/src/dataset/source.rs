use std::{
    path::PathBuf,
    sync::OnceLock,
};

use log::info;
use mnist::{Mnist, MnistBuilder};

use super::{Dataset, IMAGE_SIDE, Normalization, idx};
use crate::{MlErr, Result};

/// The amount of samples in the training files.
pub const TRAIN_LEN: usize = 60_000;
/// The amount of samples in the evaluation files.
pub const EVAL_LEN: usize = 10_000;

const TRAIN_IMAGES: &str = "train-images-idx3-ubyte";
const TRAIN_LABELS: &str = "train-labels-idx1-ubyte";
const EVAL_IMAGES: &str = "t10k-images-idx3-ubyte";
const EVAL_LABELS: &str = "t10k-labels-idx1-ubyte";

#[derive(Debug)]
struct Splits {
    training: Dataset,
    evaluation: Dataset,
}

/// The handwritten digit corpus, read from the four IDX files in a local directory.
///
/// The files are read on the first request for either split and kept for as long as the source
/// lives.
#[derive(Debug)]
pub struct MnistSource {
    dir: PathBuf,
    normalization: Normalization,
    train_len: usize,
    eval_len: usize,
    splits: OnceLock<Splits>,
}

impl MnistSource {
    /// Creates a new `MnistSource`, nothing is read until a split is requested.
    ///
    /// # Arguments
    /// * `dir` - The directory holding the IDX files.
    /// * `normalization` - How the pixels are turned into model inputs.
    pub fn new<P: Into<PathBuf>>(dir: P, normalization: Normalization) -> Self {
        Self {
            dir: dir.into(),
            normalization,
            train_len: TRAIN_LEN,
            eval_len: EVAL_LEN,
            splits: OnceLock::new(),
        }
    }

    /// Keeps only the first `train_len` training and `eval_len` evaluation samples.
    ///
    /// # Returns
    /// An error if a length is zero or larger than its split.
    pub fn with_lengths(mut self, train_len: usize, eval_len: usize) -> Result<Self> {
        if !(1..=TRAIN_LEN).contains(&train_len) || !(1..=EVAL_LEN).contains(&eval_len) {
            return Err(MlErr::InvalidConfig(format!(
                "split lengths must be in 1..={TRAIN_LEN} and 1..={EVAL_LEN}, got {train_len} and {eval_len}"
            )));
        }

        self.train_len = train_len;
        self.eval_len = eval_len;
        Ok(self)
    }

    pub fn training_samples(&self) -> Result<&Dataset> {
        Ok(&self.splits()?.training)
    }

    pub fn evaluation_samples(&self) -> Result<&Dataset> {
        Ok(&self.splits()?.evaluation)
    }

    fn splits(&self) -> Result<&Splits> {
        if let Some(splits) = self.splits.get() {
            return Ok(splits);
        }

        let splits = self.load()?;
        Ok(self.splits.get_or_init(|| splits))
    }

    fn load(&self) -> Result<Splits> {
        if !self.dir.is_dir() {
            return Err(MlErr::DataUnavailable(format!(
                "{} is not a directory",
                self.dir.display()
            )));
        }

        idx::check_images(&self.dir.join(TRAIN_IMAGES), TRAIN_LEN)?;
        idx::check_labels(&self.dir.join(TRAIN_LABELS), TRAIN_LEN)?;
        idx::check_images(&self.dir.join(EVAL_IMAGES), EVAL_LEN)?;
        idx::check_labels(&self.dir.join(EVAL_LABELS), EVAL_LEN)?;

        let base_path = format!("{}/", self.dir.display());
        let Mnist {
            trn_img,
            trn_lbl,
            tst_img,
            tst_lbl,
            ..
        } = MnistBuilder::new()
            .base_path(&base_path)
            .training_images_filename(TRAIN_IMAGES)
            .training_labels_filename(TRAIN_LABELS)
            .test_images_filename(EVAL_IMAGES)
            .test_labels_filename(EVAL_LABELS)
            .label_format_digit()
            .training_set_length(TRAIN_LEN as u32)
            .validation_set_length(0)
            .test_set_length(EVAL_LEN as u32)
            .finalize();

        let pixels = IMAGE_SIDE * IMAGE_SIDE;
        let training = self.split(&trn_img, trn_lbl, self.train_len, pixels)?;
        let evaluation = self.split(&tst_img, tst_lbl, self.eval_len, pixels)?;

        info!(
            "loaded {} training and {} evaluation samples from {}",
            training.len(),
            evaluation.len(),
            self.dir.display()
        );

        Ok(Splits {
            training,
            evaluation,
        })
    }

    fn split(&self, images: &[u8], mut labels: Vec<u8>, len: usize, pixels: usize) -> Result<Dataset> {
        let images = images.get(..len * pixels).ok_or_else(|| {
            MlErr::DataUnavailable(format!("the corpus holds less than {len} images"))
        })?;
        labels.truncate(len);

        Dataset::from_pixels(images, labels, self.normalization)
    }
}

#[cfg(test)]
mod tests {
    use std::{env, fs, path::Path, ptr};

    use super::*;

    /// Writes an IDX file whose `i`-th item is filled with `i % 256`.
    fn write_idx(path: &Path, magic: u32, count: usize, item_len: usize) {
        let mut header = vec![magic, count as u32];
        if item_len > 1 {
            header.extend([IMAGE_SIDE as u32, IMAGE_SIDE as u32]);
        }

        let mut bytes: Vec<u8> = header.iter().flat_map(|w| w.to_be_bytes()).collect();
        bytes.reserve(count * item_len);
        for i in 0..count {
            bytes.extend(std::iter::repeat_n((i % 256) as u8, item_len));
        }

        fs::write(path, bytes).unwrap();
    }

    fn synthetic_corpus() -> PathBuf {
        let dir = env::temp_dir().join("machine_learning_synthetic_corpus");
        fs::create_dir_all(&dir).unwrap();

        let pixels = IMAGE_SIDE * IMAGE_SIDE;
        write_idx(&dir.join(TRAIN_IMAGES), 0x0803, TRAIN_LEN, pixels);
        write_idx(&dir.join(TRAIN_LABELS), 0x0801, TRAIN_LEN, 1);
        write_idx(&dir.join(EVAL_IMAGES), 0x0803, EVAL_LEN, pixels);
        write_idx(&dir.join(EVAL_LABELS), 0x0801, EVAL_LEN, 1);

        dir
    }

    #[test]
    fn loads_a_prefix_of_each_split_once() {
        let source = MnistSource::new(synthetic_corpus(), Normalization::Normalized)
            .with_lengths(100, 50)
            .unwrap();

        let training = source.training_samples().unwrap();
        let evaluation = source.evaluation_samples().unwrap();

        assert_eq!((training.len(), evaluation.len()), (100, 50));
        assert_eq!(training.labels()[..12], [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]);
        assert_eq!(evaluation.labels()[49], 49);

        let (image, label) = training.sample(37);
        assert_eq!(label, 37);
        assert_eq!(image.dim(), (1, IMAGE_SIDE, IMAGE_SIDE));
        assert!(image.iter().all(|&v| v == Normalization::Normalized.apply(37)));

        assert!(ptr::eq(training, source.training_samples().unwrap()));
        assert!(ptr::eq(evaluation, source.evaluation_samples().unwrap()));
    }

    #[test]
    fn missing_directory_is_unavailable() {
        let source = MnistSource::new(
            env::temp_dir().join("machine_learning_no_corpus_here"),
            Normalization::Normalized,
        );

        assert!(matches!(source.training_samples(), Err(MlErr::DataUnavailable(_))));
        assert!(matches!(source.evaluation_samples(), Err(MlErr::DataUnavailable(_))));
    }

    #[test]
    fn empty_directory_is_unavailable() {
        let dir = env::temp_dir().join("machine_learning_empty_corpus");
        std::fs::create_dir_all(&dir).unwrap();

        let source = MnistSource::new(dir, Normalization::Standardized);
        let err = source.training_samples().unwrap_err();

        assert!(err.to_string().contains(TRAIN_IMAGES), "{err}");
    }

    #[test]
    fn split_lengths_are_bounded() {
        let source = || MnistSource::new("data", Normalization::Raw);

        assert!(source().with_lengths(100, 100).is_ok());
        assert!(source().with_lengths(0, 100).is_err());
        assert!(source().with_lengths(100, EVAL_LEN + 1).is_err());
    }
}
