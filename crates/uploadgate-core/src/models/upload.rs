//! Upload descriptors handed to the validator by a form handler

use std::fmt;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use bytes::Bytes;
use tokio::io::AsyncRead;

/// Where the uploaded bytes can be read from.
pub enum ByteSource {
    /// Payload already buffered in memory.
    Memory(Bytes),
    /// Payload spooled to disk by the web framework.
    File(PathBuf),
    /// Payload still arriving.
    Stream(Pin<Box<dyn AsyncRead + Send>>),
}

impl ByteSource {
    pub fn stream<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        ByteSource::Stream(Box::pin(reader))
    }

    /// Length known without reading, if any.
    pub fn known_len(&self) -> Option<u64> {
        match self {
            ByteSource::Memory(data) => Some(data.len() as u64),
            ByteSource::File(_) | ByteSource::Stream(_) => None,
        }
    }
}

impl fmt::Debug for ByteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ByteSource::Memory(data) => f.debug_tuple("Memory").field(&data.len()).finish(),
            ByteSource::File(path) => f.debug_tuple("File").field(path).finish(),
            ByteSource::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Which form field an artifact arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadSlot {
    File,
    Image,
}

impl UploadSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadSlot::File => "file",
            UploadSlot::Image => "image",
        }
    }
}

impl fmt::Display for UploadSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One uploaded payload plus the client-supplied metadata describing it.
///
/// Everything except the bytes themselves is untrusted.
#[derive(Debug)]
pub struct UploadArtifact {
    pub declared_filename: String,
    pub declared_content_type: Option<String>,
    /// Bytes actually received by the caller, not a client-declared header.
    pub byte_size: u64,
    pub source: ByteSource,
}

impl UploadArtifact {
    pub fn new(
        declared_filename: impl Into<String>,
        declared_content_type: Option<String>,
        byte_size: u64,
        source: ByteSource,
    ) -> Self {
        Self {
            declared_filename: declared_filename.into(),
            declared_content_type,
            byte_size,
            source,
        }
    }

    /// Build from an in-memory buffer; the size is the buffer length.
    pub fn from_bytes(
        declared_filename: impl Into<String>,
        declared_content_type: Option<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        let data = data.into();
        let byte_size = data.len() as u64;
        Self::new(
            declared_filename,
            declared_content_type,
            byte_size,
            ByteSource::Memory(data),
        )
    }

    /// Suffix after the final `.` of the last path component, lowercased.
    /// Empty when the name has no dot or ends with one.
    pub fn declared_extension(&self) -> String {
        declared_extension(&self.declared_filename)
    }
}

/// Suffix after the final `.` of the last path component, lowercased.
pub fn declared_extension(filename: &str) -> String {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);
    name.rsplit_once('.')
        .map(|(_, ext)| ext.trim().to_lowercase())
        .unwrap_or_default()
}

/// A single form submission: an optional file, an optional image and the file type the
/// user selected for them.
#[derive(Debug, Default)]
pub struct UploadDescriptor {
    pub file: Option<UploadArtifact>,
    pub image: Option<UploadArtifact>,
    pub asserted_file_type: Option<String>,
}

impl UploadDescriptor {
    pub fn with_file(file: UploadArtifact) -> Self {
        Self {
            file: Some(file),
            ..Default::default()
        }
    }

    pub fn with_image(image: UploadArtifact) -> Self {
        Self {
            image: Some(image),
            ..Default::default()
        }
    }

    pub fn asserting_file_type(mut self, file_type: impl Into<String>) -> Self {
        self.asserted_file_type = Some(file_type.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.file.is_none() && self.image.is_none()
    }

    /// Present artifacts in check order: file first, then image.
    pub fn into_artifacts(self) -> Vec<(UploadSlot, UploadArtifact)> {
        [
            self.file.map(|a| (UploadSlot::File, a)),
            self.image.map(|a| (UploadSlot::Image, a)),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}
