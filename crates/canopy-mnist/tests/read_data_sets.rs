//! End-to-end loader tests against small gzipped IDX fixtures in a temp dir.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;
use tempfile::TempDir;

use canopy_mnist::{IMAGE_MAGIC, LABEL_MAGIC, MnistError, ReadOptions, read_data_sets};

/// Mirror that refuses connections, so any download attempt fails fast.
const OFFLINE_URL: &str = "http://127.0.0.1:9/";

fn write_gz(path: &Path, bytes: &[u8]) {
    let mut encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap();
}

/// Write a 2x2-pixel image file whose i-th image is filled with value `i`,
/// and a label file whose i-th label is `i % 10`.
fn write_split(dir: &Path, images_file: &str, labels_file: &str, n: u32) {
    let mut images: Vec<u8> = [IMAGE_MAGIC, n, 2, 2]
        .iter()
        .flat_map(|f| f.to_be_bytes())
        .collect();
    for i in 0..n {
        images.extend_from_slice(&[i as u8; 4]);
    }
    write_gz(&dir.join(images_file), &images);

    let mut labels: Vec<u8> = [LABEL_MAGIC, n].iter().flat_map(|f| f.to_be_bytes()).collect();
    labels.extend((0..n).map(|i| (i % 10) as u8));
    write_gz(&dir.join(labels_file), &labels);
}

fn write_fixtures(dir: &Path, n_train: u32, n_test: u32) {
    write_split(
        dir,
        "train-images-idx3-ubyte.gz",
        "train-labels-idx1-ubyte.gz",
        n_train,
    );
    write_split(
        dir,
        "t10k-images-idx3-ubyte.gz",
        "t10k-labels-idx1-ubyte.gz",
        n_test,
    );
}

#[test]
fn splits_cached_files() {
    let dir = TempDir::new().unwrap();
    write_fixtures(dir.path(), 12, 5);
    let options = ReadOptions::default()
        .with_source_url(OFFLINE_URL)
        .with_validation_size(3);

    let data = read_data_sets(dir.path(), &options).unwrap();

    assert_eq!(data.validation.num_examples(), 3);
    assert_eq!(data.train.num_examples(), 9);
    assert_eq!(data.test.num_examples(), 5);
    assert_eq!(data.validation.labels(), &[0, 1, 2]);
    assert_eq!(data.train.labels()[0], 3);
    assert_eq!(data.train.images()[0], vec![3.0 / 255.0; 4]);
    assert!(data.test.images().iter().all(|row| row.len() == 4));
}

#[test]
fn validation_larger_than_train_rejected() {
    let dir = TempDir::new().unwrap();
    write_fixtures(dir.path(), 4, 2);
    let options = ReadOptions::default()
        .with_source_url(OFFLINE_URL)
        .with_validation_size(5);

    let err = read_data_sets(dir.path(), &options).unwrap_err();
    assert!(matches!(
        err,
        MnistError::ValidationSizeTooLarge { validation_size: 5, n_train: 4 }
    ));
}

#[test]
fn mismatched_files_rejected() {
    let dir = TempDir::new().unwrap();
    write_fixtures(dir.path(), 6, 2);
    // Replace the training labels with a shorter file.
    let labels: Vec<u8> = [LABEL_MAGIC, 5]
        .iter()
        .flat_map(|f| f.to_be_bytes())
        .chain([0, 1, 2, 3, 4])
        .collect();
    write_gz(&dir.path().join("train-labels-idx1-ubyte.gz"), &labels);

    let err = read_data_sets(dir.path(), &ReadOptions::default().with_source_url(OFFLINE_URL))
        .unwrap_err();
    assert!(matches!(err, MnistError::LengthMismatch { images: 6, labels: 5 }));
}

#[test]
fn missing_file_triggers_download() {
    let dir = TempDir::new().unwrap();
    let options = ReadOptions::default().with_source_url(OFFLINE_URL);

    let err = read_data_sets(dir.path(), &options).unwrap_err();
    assert!(matches!(err, MnistError::Download { .. }));
    assert!(!dir.path().join("train-images-idx3-ubyte.gz").exists());
}
