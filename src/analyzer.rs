//! ALFA Media Vault - Collaborator Interfaces
//!
//! Media decoding and the remote vision model are injected into the
//! pipelines through these two traits.

use base64::{engine::general_purpose::STANDARD as B64, Engine};

use crate::error::VaultResult;
use crate::model::{MediaDimensions, MediaType};

/// A file handed to the vault for import
#[derive(Clone)]
pub struct RawFile {
    pub name: String,
    /// MIME type declared by the source, if any
    pub mime_type: Option<String>,
    pub data: Vec<u8>,
}

impl RawFile {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: None,
            data,
        }
    }

    pub fn with_mime(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Read a file from disk, named after its last path component
    pub fn read(path: &std::path::Path) -> VaultResult<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();
        Ok(Self::new(name, std::fs::read(path)?))
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

impl std::fmt::Debug for RawFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.data.len())
            .finish()
    }
}

/// Result of classifying a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detected {
    pub media_type: MediaType,
    pub mime_type: String,
}

/// An encoded image ready for the vision endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl PreparedImage {
    /// `data:<mime>;base64,<payload>`
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, B64.encode(&self.data))
    }
}

/// Media decoding capability
pub trait MediaAnalyzer: Send + Sync {
    /// Classify a file; `None` if it is neither an image nor a video
    fn detect_type(&self, file: &RawFile) -> Option<Detected>;

    /// Width, height and duration
    fn metadata(&self, file: &RawFile, media_type: MediaType) -> VaultResult<MediaDimensions>;

    /// Encoded preview image
    fn thumbnail(&self, file: &RawFile, media_type: MediaType) -> VaultResult<Vec<u8>>;

    /// Image for the vision model: a frame for videos, a re-encode for images
    fn prepare_for_vision(
        &self,
        data: &[u8],
        media_type: MediaType,
        mime_type: &str,
    ) -> VaultResult<PreparedImage>;
}

/// Remote vision model
pub trait VisionAnalyzer: Send + Sync {
    /// Model name recorded on tagged items
    fn model(&self) -> &str;

    /// Free-text answer to `prompt` about `image`
    fn analyze(&self, image: &PreparedImage, prompt: &str) -> VaultResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_uri() {
        let image = PreparedImage { mime_type: "image/jpeg".into(), data: b"abc".to_vec() };
        assert_eq!(image.data_uri(), "data:image/jpeg;base64,YWJj");
    }
}
