//! MNIST splits and the top-level loader.

use std::path::Path;

use tracing::{info, instrument};

use crate::download::maybe_download;
use crate::error::MnistError;
use crate::idx::{read_images, read_labels};

/// Default mirror the four archive files are fetched from.
pub const DEFAULT_SOURCE_URL: &str = "https://storage.googleapis.com/cvdf-datasets/mnist/";

/// Default number of training examples held out for validation.
pub const DEFAULT_VALIDATION_SIZE: usize = 5000;

const TRAIN_IMAGES: &str = "train-images-idx3-ubyte.gz";
const TRAIN_LABELS: &str = "train-labels-idx1-ubyte.gz";
const TEST_IMAGES: &str = "t10k-images-idx3-ubyte.gz";
const TEST_LABELS: &str = "t10k-labels-idx1-ubyte.gz";

/// Images with their labels, index-aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
    images: Vec<Vec<f32>>,
    labels: Vec<usize>,
}

impl DataSet {
    /// Pair `images` with `labels`.
    ///
    /// # Errors
    ///
    /// Returns [`MnistError::LengthMismatch`] when the two differ in length.
    pub fn new(images: Vec<Vec<f32>>, labels: Vec<usize>) -> Result<Self, MnistError> {
        if images.len() != labels.len() {
            return Err(MnistError::LengthMismatch {
                images: images.len(),
                labels: labels.len(),
            });
        }
        Ok(Self { images, labels })
    }

    /// Flattened pixel rows in `[0, 1]`.
    #[must_use]
    pub fn images(&self) -> &[Vec<f32>] {
        &self.images
    }

    /// Digit labels in `0..10`.
    #[must_use]
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Number of examples.
    #[must_use]
    pub fn num_examples(&self) -> usize {
        self.labels.len()
    }

    /// Split off the first `at` examples as their own data set.
    fn split_front(mut self, at: usize) -> (Self, Self) {
        let rest_images = self.images.split_off(at);
        let rest_labels = self.labels.split_off(at);
        (
            self,
            Self {
                images: rest_images,
                labels: rest_labels,
            },
        )
    }
}

/// The three MNIST splits.
#[derive(Debug, Clone, PartialEq)]
pub struct Datasets {
    /// Training examples after the validation hold-out.
    pub train: DataSet,
    /// The first `validation_size` training examples.
    pub validation: DataSet,
    /// The 10k test examples.
    pub test: DataSet,
}

/// Loader options.
///
/// # Defaults
///
/// | Field | Default |
/// |---|---|
/// | `source_url` | `https://storage.googleapis.com/cvdf-datasets/mnist/` |
/// | `validation_size` | 5000 |
#[derive(Debug, Clone)]
pub struct ReadOptions {
    source_url: String,
    validation_size: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            source_url: DEFAULT_SOURCE_URL.to_string(),
            validation_size: DEFAULT_VALIDATION_SIZE,
        }
    }
}

impl ReadOptions {
    /// Fetch files from `source_url`, which must end with `/`.
    #[must_use]
    pub fn with_source_url(mut self, source_url: impl Into<String>) -> Self {
        self.source_url = source_url.into();
        self
    }

    /// Hold out this many training examples for validation.
    #[must_use]
    pub fn with_validation_size(mut self, validation_size: usize) -> Self {
        self.validation_size = validation_size;
        self
    }

    /// Return the download mirror.
    #[must_use]
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// Return the validation hold-out size.
    #[must_use]
    pub fn validation_size(&self) -> usize {
        self.validation_size
    }
}

fn read_split(
    images_file: &str,
    labels_file: &str,
    data_dir: &Path,
    options: &ReadOptions,
) -> Result<DataSet, MnistError> {
    let images = read_images(&maybe_download(images_file, data_dir, &options.source_url)?)?;
    let labels = read_labels(&maybe_download(labels_file, data_dir, &options.source_url)?)?;
    DataSet::new(images, labels)
}

/// Load the train, validation, and test splits, downloading any archive not
/// already cached in `data_dir`.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | download variants | a missing file could not be fetched |
/// | decoding variants | a file is not a valid gzipped IDX file |
/// | [`MnistError::LengthMismatch`] | image and label files disagree |
/// | [`MnistError::ValidationSizeTooLarge`] | `validation_size` exceeds the training set |
#[instrument(skip(data_dir, options), fields(data_dir = %data_dir.as_ref().display()))]
pub fn read_data_sets(
    data_dir: impl AsRef<Path>,
    options: &ReadOptions,
) -> Result<Datasets, MnistError> {
    let data_dir = data_dir.as_ref();

    let train = read_split(TRAIN_IMAGES, TRAIN_LABELS, data_dir, options)?;
    let test = read_split(TEST_IMAGES, TEST_LABELS, data_dir, options)?;

    if options.validation_size > train.num_examples() {
        return Err(MnistError::ValidationSizeTooLarge {
            validation_size: options.validation_size,
            n_train: train.num_examples(),
        });
    }
    let (validation, train) = train.split_front(options.validation_size);

    info!(
        n_train = train.num_examples(),
        n_validation = validation.num_examples(),
        n_test = test.num_examples(),
        "loaded MNIST"
    );
    Ok(Datasets {
        train,
        validation,
        test,
    })
}
