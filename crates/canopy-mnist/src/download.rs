//! Cached downloads of the dataset files.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use tracing::{debug, info, instrument};

use crate::error::MnistError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Largest file accepted from the server; the training images are ~10 MB.
const MAX_DOWNLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Return a shared HTTP agent with consistent timeouts.
fn agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(READ_TIMEOUT)
            .build()
    })
}

/// Return `work_dir/filename`, downloading it from `source_url` first if absent.
///
/// The body is streamed to a `.tmp` sibling and renamed into place, so an
/// interrupted download never leaves a partial file under the final name.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`MnistError::CreateDir`] | `work_dir` cannot be created |
/// | [`MnistError::Download`] | the request failed in transport |
/// | [`MnistError::HttpStatus`] | the server returned an error status |
/// | [`MnistError::WriteFile`] | writing or renaming the file failed |
#[instrument(skip(work_dir), fields(work_dir = %work_dir.display()))]
pub fn maybe_download(
    filename: &str,
    work_dir: &Path,
    source_url: &str,
) -> Result<PathBuf, MnistError> {
    fs::create_dir_all(work_dir).map_err(|e| MnistError::CreateDir {
        path: work_dir.to_path_buf(),
        source: e,
    })?;

    let dest = work_dir.join(filename);
    if dest.exists() {
        debug!(path = %dest.display(), "using cached file");
        return Ok(dest);
    }

    let url = format!("{source_url}{filename}");
    let response = match agent().get(&url).call() {
        Ok(response) => response,
        Err(ureq::Error::Status(status, _)) => {
            return Err(MnistError::HttpStatus { url, status });
        }
        Err(err) => {
            return Err(MnistError::Download {
                url,
                source: Box::new(err),
            });
        }
    };

    let size = write_atomically(response.into_reader(), &dest, MAX_DOWNLOAD_BYTES)?;
    info!(url = %url, size_bytes = size, "downloaded");
    Ok(dest)
}

/// Stream `reader` into a `.tmp` sibling of `dest`, then rename it into place.
/// The `.tmp` file is removed if the copy fails. Returns the bytes written.
fn write_atomically(
    reader: impl Read,
    dest: &Path,
    max_bytes: usize,
) -> Result<usize, MnistError> {
    let tmp = dest.with_extension("tmp");
    let write_err = |e: io::Error| MnistError::WriteFile {
        path: tmp.clone(),
        source: e,
    };
    let mut file = File::create(&tmp).map_err(write_err)?;
    let copied = copy_bounded(reader, &mut file, max_bytes).and_then(|size| {
        file.flush()?;
        Ok(size)
    });
    drop(file);
    let size = match copied {
        Ok(size) => size,
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            return Err(write_err(e));
        }
    };
    fs::rename(&tmp, dest).map_err(|e| MnistError::WriteFile {
        path: dest.to_path_buf(),
        source: e,
    })?;
    Ok(size)
}

fn copy_bounded(
    reader: impl Read,
    writer: &mut impl Write,
    max_bytes: usize,
) -> Result<usize, io::Error> {
    let mut limited = reader.take(max_bytes as u64 + 1);
    let mut total = 0usize;
    let mut buf = [0u8; 64 * 1024];
    loop {
        let read = limited.read(&mut buf)?;
        if read == 0 {
            break;
        }
        total += read;
        if total > max_bytes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("response exceeded {max_bytes} bytes"),
            ));
        }
        writer.write_all(&buf[..read])?;
    }
    Ok(total)
}
