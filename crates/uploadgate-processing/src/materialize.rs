//! Staging of upload payloads for the scanner.
//!
//! The scanner only accepts a filesystem path, so every payload is copied into a private temp
//! file first. The copy is bounded by the policy size limit: at most `limit + 1` bytes are ever
//! read from the source, whatever the caller claimed about its size.

use std::io;
use std::path::Path;

use tempfile::NamedTempFile;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use uploadgate_core::ByteSource;

const SCAN_FILE_PREFIX: &str = "uploadgate-";
const SCAN_FILE_SUFFIX: &str = ".scan";

#[derive(Debug, thiserror::Error)]
pub enum MaterializeError {
    #[error("payload exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("failed to stage payload: {0}")]
    Io(#[from] io::Error),
}

/// A staged payload owned by exactly one validation call.
///
/// The file is created with `O_EXCL` and owner-only permissions, and is unlinked when this
/// value is dropped, including when the owning future is cancelled.
#[derive(Debug)]
pub struct ScanFile {
    file: NamedTempFile,
    bytes_written: u64,
}

impl ScanFile {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Bytes actually copied from the source.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Delete now and report failures instead of ignoring them in `Drop`.
    pub fn remove(self) -> io::Result<()> {
        self.file.close()
    }
}

/// Copy `source` into a fresh scan file under `dir` (OS temp dir when `None`).
pub async fn materialize(
    source: ByteSource,
    dir: Option<&Path>,
    limit: u64,
) -> Result<ScanFile, MaterializeError> {
    if matches!(source.known_len(), Some(len) if len > limit) {
        return Err(MaterializeError::TooLarge { limit });
    }

    let mut builder = tempfile::Builder::new();
    builder.prefix(SCAN_FILE_PREFIX).suffix(SCAN_FILE_SUFFIX);
    let file = match dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };

    let mut out = tokio::fs::File::from_std(file.as_file().try_clone()?);
    let bytes_written = match source {
        ByteSource::Memory(data) => {
            out.write_all(&data).await?;
            data.len() as u64
        }
        ByteSource::File(path) => {
            let input = tokio::fs::File::open(&path).await?;
            copy_bounded(input, &mut out, limit).await?
        }
        ByteSource::Stream(reader) => copy_bounded(reader, &mut out, limit).await?,
    };
    out.flush().await?;
    drop(out);

    Ok(ScanFile {
        file,
        bytes_written,
    })
}

async fn copy_bounded<R>(
    reader: R,
    out: &mut tokio::fs::File,
    limit: u64,
) -> Result<u64, MaterializeError>
where
    R: AsyncRead + Unpin,
{
    let mut bounded = reader.take(limit.saturating_add(1));
    let copied = tokio::io::copy(&mut bounded, out).await?;
    if copied > limit {
        return Err(MaterializeError::TooLarge { limit });
    }
    Ok(copied)
}
