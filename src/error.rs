//! ALFA Media Vault - Error Types

use thiserror::Error;

/// Result type for vault operations
pub type VaultResult<T> = Result<T, VaultError>;

/// Vault error types
#[derive(Error, Debug)]
pub enum VaultError {
    // ═══════════════════════════════════════════════════════════════
    // KEY / CRYPTO ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Vault is locked")]
    Locked,

    #[error("Vault password is already set")]
    AlreadyInitialized,

    #[error("Vault password has not been set up")]
    NotInitialized,

    #[error("Invalid password")]
    InvalidPassword,

    /// Wrong key, wrong IV or tampered ciphertext. Never distinguished further.
    #[error("Decryption failed")]
    Decryption,

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    // ═══════════════════════════════════════════════════════════════
    // STORE ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Duplicate key in {collection}: {key}")]
    DuplicateKey { collection: &'static str, key: String },

    #[error("Record not found in {collection}: {id}")]
    NotFound { collection: &'static str, id: String },

    #[error("Unknown index '{index}' on {collection}")]
    UnknownIndex { collection: &'static str, index: String },

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Category cannot be deleted: {0}")]
    ProtectedCategory(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    // ═══════════════════════════════════════════════════════════════
    // MEDIA ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Unsupported media type: {0}")]
    UnsupportedType(String),

    #[error("File too large: {size} bytes (max: {max})")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Thumbnail generation failed: {0}")]
    ThumbnailFailed(String),

    #[error("Image processing error: {0}")]
    ImageError(String),

    // ═══════════════════════════════════════════════════════════════
    // AI ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Vision endpoint error: {0}")]
    VisionFailed(String),

    #[error("No active AI configuration")]
    NoActiveAiConfig,

    // ═══════════════════════════════════════════════════════════════
    // PIPELINE ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Import of '{file_name}' failed: {source}")]
    Import {
        file_name: String,
        source: Box<VaultError>,
    },

    #[error("Tagging of item {item_id} failed: {source}")]
    Tag {
        item_id: String,
        source: Box<VaultError>,
    },

    // ═══════════════════════════════════════════════════════════════
    // IO / SERIALIZATION ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}

impl VaultError {
    /// Wrap an error with the file it was importing
    pub fn import(file_name: impl Into<String>, source: VaultError) -> Self {
        VaultError::Import {
            file_name: file_name.into(),
            source: Box::new(source),
        }
    }

    /// Wrap an error with the item it was tagging
    pub fn tag(item_id: impl Into<String>, source: VaultError) -> Self {
        VaultError::Tag {
            item_id: item_id.into(),
            source: Box::new(source),
        }
    }

    /// The underlying error, with pipeline context stripped
    pub fn root_cause(&self) -> &VaultError {
        match self {
            VaultError::Import { source, .. } | VaultError::Tag { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }

    /// Whether the operation failed because the vault is locked
    pub fn is_locked(&self) -> bool {
        matches!(self.root_cause(), VaultError::Locked)
    }

    /// Check if this is a security-critical error
    pub fn is_security_critical(&self) -> bool {
        matches!(
            self.root_cause(),
            VaultError::Decryption | VaultError::InvalidPassword
        )
    }
}

impl From<rusqlite::Error> for VaultError {
    fn from(e: rusqlite::Error) -> Self {
        VaultError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(e: serde_json::Error) -> Self {
        VaultError::SerializationError(e.to_string())
    }
}

impl From<bincode::Error> for VaultError {
    fn from(e: bincode::Error) -> Self {
        VaultError::SerializationError(e.to_string())
    }
}

impl From<image::ImageError> for VaultError {
    fn from(e: image::ImageError) -> Self {
        VaultError::ImageError(e.to_string())
    }
}

impl From<base64::DecodeError> for VaultError {
    fn from(e: base64::DecodeError) -> Self {
        VaultError::DeserializationError(e.to_string())
    }
}

#[cfg(feature = "vision-http")]
impl From<reqwest::Error> for VaultError {
    fn from(e: reqwest::Error) -> Self {
        VaultError::VisionFailed(e.to_string())
    }
}
