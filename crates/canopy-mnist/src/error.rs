//! Error types for canopy-mnist.

use std::path::PathBuf;

/// Errors from downloading, decoding, and splitting the MNIST files.
#[derive(Debug, thiserror::Error)]
pub enum MnistError {
    /// Returned when the data directory cannot be created.
    #[error("failed to create data directory {path}")]
    CreateDir {
        /// Directory that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the HTTP request fails before a response arrives.
    #[error("failed to download {url}")]
    Download {
        /// URL that was requested.
        url: String,
        /// Underlying transport error.
        source: Box<ureq::Error>,
    },

    /// Returned when the server answers with an error status.
    #[error("failed to download {url}: HTTP {status}")]
    HttpStatus {
        /// URL that was requested.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// Returned when a downloaded or cached file cannot be written.
    #[error("failed to write {path}")]
    WriteFile {
        /// File that was being written.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a data file cannot be read or decompressed.
    #[error("failed to read {path}")]
    ReadFile {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when an IDX file starts with the wrong magic number.
    #[error("invalid magic number {found} in {path}, expected {expected}")]
    BadMagic {
        /// Offending file.
        path: PathBuf,
        /// Magic number for this kind of file.
        expected: u32,
        /// Magic number actually read.
        found: u32,
    },

    /// Returned when image dimensions are zero-sized or too large to address.
    #[error("invalid IDX image header in {path}: {n_images} images of {rows}x{cols}")]
    InvalidHeader {
        /// Offending file.
        path: PathBuf,
        /// Image count from the header.
        n_images: u32,
        /// Rows per image from the header.
        rows: u32,
        /// Columns per image from the header.
        cols: u32,
    },

    /// Returned when an IDX file is shorter than its header claims.
    #[error("truncated IDX file {path}: expected {expected} bytes, found {found}")]
    Truncated {
        /// Offending file.
        path: PathBuf,
        /// Bytes required by the header.
        expected: usize,
        /// Bytes present after decompression.
        found: usize,
    },

    /// Returned when images and labels differ in count.
    #[error("images.len(): {images} labels.len(): {labels}")]
    LengthMismatch {
        /// Number of images.
        images: usize,
        /// Number of labels.
        labels: usize,
    },

    /// Returned when more validation examples are requested than exist.
    #[error("validation size should be between 0 and {n_train}, received {validation_size}")]
    ValidationSizeTooLarge {
        /// Requested validation examples.
        validation_size: usize,
        /// Training examples available.
        n_train: usize,
    },
}
