//! Gzip-compressed IDX file decoding.
//!
//! IDX headers are big-endian `u32`s: a magic number, the item count, and for
//! image files the row and column counts. Pixel and label bytes follow.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use tracing::{debug, instrument};

use crate::error::MnistError;

/// Magic number of an IDX3 image file.
pub const IMAGE_MAGIC: u32 = 2051;

/// Magic number of an IDX1 label file.
pub const LABEL_MAGIC: u32 = 2049;

/// Decode a gzipped IDX3 image file into flattened rows scaled to `[0, 1]`.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`MnistError::ReadFile`] | open or gzip decoding failed |
/// | [`MnistError::BadMagic`] | magic number is not 2051 |
/// | [`MnistError::InvalidHeader`] | zero-sized or overflowing image dimensions |
/// | [`MnistError::Truncated`] | fewer pixels than the header declares |
#[instrument(fields(path = %path.display()))]
pub fn read_images(path: &Path) -> Result<Vec<Vec<f32>>, MnistError> {
    let bytes = decompress(path)?;
    let images = parse_images(&bytes, path)?;
    debug!(n_images = images.len(), "decoded images");
    Ok(images)
}

/// Decode a gzipped IDX1 label file.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`MnistError::ReadFile`] | open or gzip decoding failed |
/// | [`MnistError::BadMagic`] | magic number is not 2049 |
/// | [`MnistError::Truncated`] | fewer labels than the header declares |
#[instrument(fields(path = %path.display()))]
pub fn read_labels(path: &Path) -> Result<Vec<usize>, MnistError> {
    let bytes = decompress(path)?;
    let labels = parse_labels(&bytes, path)?;
    debug!(n_labels = labels.len(), "decoded labels");
    Ok(labels)
}

fn decompress(path: &Path) -> Result<Vec<u8>, MnistError> {
    let read_err = |e| MnistError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    };
    let file = File::open(path).map_err(read_err)?;
    let mut bytes = Vec::new();
    GzDecoder::new(file)
        .read_to_end(&mut bytes)
        .map_err(read_err)?;
    Ok(bytes)
}

/// Read the `index`-th big-endian `u32` of the header.
fn header_field(bytes: &[u8], index: usize, path: &Path) -> Result<u32, MnistError> {
    let start = index * 4;
    let Some(field) = bytes.get(start..start + 4) else {
        return Err(MnistError::Truncated {
            path: path.to_path_buf(),
            expected: start + 4,
            found: bytes.len(),
        });
    };
    Ok(u32::from_be_bytes([field[0], field[1], field[2], field[3]]))
}

fn check_magic(bytes: &[u8], expected: u32, path: &Path) -> Result<(), MnistError> {
    let found = header_field(bytes, 0, path)?;
    if found != expected {
        return Err(MnistError::BadMagic {
            path: path.to_path_buf(),
            expected,
            found,
        });
    }
    Ok(())
}

/// Slice `len` payload bytes after a header of `header_len` bytes.
fn payload<'a>(
    bytes: &'a [u8],
    header_len: usize,
    len: usize,
    path: &Path,
) -> Result<&'a [u8], MnistError> {
    let end = header_len.checked_add(len).unwrap_or(usize::MAX);
    bytes
        .get(header_len..end)
        .ok_or_else(|| MnistError::Truncated {
            path: path.to_path_buf(),
            expected: end,
            found: bytes.len(),
        })
}

pub(crate) fn parse_images(bytes: &[u8], path: &Path) -> Result<Vec<Vec<f32>>, MnistError> {
    check_magic(bytes, IMAGE_MAGIC, path)?;
    let n_images = header_field(bytes, 1, path)?;
    let rows = header_field(bytes, 2, path)?;
    let cols = header_field(bytes, 3, path)?;
    let invalid = || MnistError::InvalidHeader {
        path: path.to_path_buf(),
        n_images,
        rows,
        cols,
    };

    if n_images == 0 {
        return Ok(Vec::new());
    }
    let pixels_per_image = (rows as usize)
        .checked_mul(cols as usize)
        .filter(|&n| n > 0)
        .ok_or_else(invalid)?;
    let total = (n_images as usize)
        .checked_mul(pixels_per_image)
        .ok_or_else(invalid)?;

    let pixels = payload(bytes, 16, total, path)?;
    Ok(pixels
        .chunks_exact(pixels_per_image)
        .map(|image| image.iter().map(|&p| f32::from(p) / 255.0).collect())
        .collect())
}

pub(crate) fn parse_labels(bytes: &[u8], path: &Path) -> Result<Vec<usize>, MnistError> {
    check_magic(bytes, LABEL_MAGIC, path)?;
    let n_labels = header_field(bytes, 1, path)? as usize;
    let labels = payload(bytes, 8, n_labels, path)?;
    Ok(labels.iter().map(|&l| usize::from(l)).collect())
}
