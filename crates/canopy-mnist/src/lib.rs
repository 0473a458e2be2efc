//! MNIST handwritten digits: cached download, IDX decoding, and splits.

mod dataset;
mod download;
mod error;
mod idx;

pub use dataset::{
    DEFAULT_SOURCE_URL, DEFAULT_VALIDATION_SIZE, DataSet, Datasets, ReadOptions, read_data_sets,
};
pub use download::maybe_download;
pub use error::MnistError;
pub use idx::{IMAGE_MAGIC, LABEL_MAGIC, read_images, read_labels};
