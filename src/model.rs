//! ALFA Media Vault - Data Model
//!
//! Records persisted in the [`RecordStore`](crate::store::RecordStore).
//! Binary payloads only ever appear as [`EncryptedBlob`]s, secrets as
//! [`EncryptedText`]s.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::{EncryptedBlob, EncryptedText};
use crate::error::{VaultError, VaultResult};
use crate::store::{Collection, Record};

/// Id of the sentinel category that receives items of deleted categories
pub const UNCATEGORIZED_ID: &str = "uncategorized";

/// Max length of category names, tags
pub const MAX_NAME_LEN: usize = 50;

/// Max number of AI tags per item
pub const MAX_TAGS: usize = 10;

/// Index value format for timestamps (fixed width, sorts lexically)
pub(crate) fn index_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

// ═══════════════════════════════════════════════════════════════════════════
// CATEGORY
// ═══════════════════════════════════════════════════════════════════════════

/// User-defined grouping of media items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub description: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
}

impl Category {
    /// Create a new category with a fresh id
    pub fn new(name: &str, description: &str, color: &str) -> VaultResult<Self> {
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            name: Self::validate_name(name)?,
            description: description.to_string(),
            color: color.to_string(),
            created_at: Utc::now(),
        })
    }

    /// The sentinel category
    pub fn uncategorized() -> Self {
        Self {
            id: UNCATEGORIZED_ID.to_string(),
            name: "Uncategorized".to_string(),
            description: "Items without a category".to_string(),
            color: "#9e9e9e".to_string(),
            created_at: Utc::now(),
        }
    }

    /// Trim and check a category name: non-empty, at most 50 characters
    pub fn validate_name(name: &str) -> VaultResult<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(VaultError::InvalidRecord("category name is empty".into()));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(VaultError::InvalidRecord(format!(
                "category name longer than {} characters",
                MAX_NAME_LEN
            )));
        }
        Ok(name.to_string())
    }

    pub fn is_uncategorized(&self) -> bool {
        self.id == UNCATEGORIZED_ID
    }
}

impl Record for Category {
    const COLLECTION: Collection = Collection::Categories;

    fn id(&self) -> &str {
        &self.id
    }

    fn index_values(&self) -> Vec<(&'static str, String)> {
        vec![("name", self.name.clone())]
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// MEDIA ITEM
// ═══════════════════════════════════════════════════════════════════════════

/// Kind of media payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dimensions reported by a media analyzer
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaDimensions {
    pub width: u32,
    pub height: u32,
    /// Seconds, 0 for images
    pub duration: f64,
}

/// One imported image or video.
///
/// The encrypted payloads are set once at construction and only readable
/// afterwards; tags and category are the only mutable parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: String,
    pub category_id: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub file_name: String,
    pub file_size: u64,
    pub width: u32,
    pub height: u32,
    pub duration: f64,
    pub mime_type: String,
    thumbnail: EncryptedBlob,
    file: EncryptedBlob,
    ai_tags: Vec<String>,
    ai_prompt: Option<String>,
    ai_model: Option<String>,
    ai_response: Option<String>,
    pub created_at: DateTime<Utc>,
    last_tagged: Option<DateTime<Utc>>,
}

/// Everything needed to build a [`MediaItem`] except its identity
#[derive(Debug, Clone)]
pub struct NewMediaItem {
    pub category_id: String,
    pub media_type: MediaType,
    pub file_name: String,
    pub file_size: u64,
    pub mime_type: String,
    pub dimensions: MediaDimensions,
    pub thumbnail: EncryptedBlob,
    pub file: EncryptedBlob,
}

impl MediaItem {
    /// Build an untagged item with a fresh id and `created_at = now`
    pub fn new(new: NewMediaItem) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            category_id: new.category_id,
            media_type: new.media_type,
            file_name: new.file_name,
            file_size: new.file_size,
            width: new.dimensions.width,
            height: new.dimensions.height,
            duration: match new.media_type {
                MediaType::Image => 0.0,
                MediaType::Video => new.dimensions.duration,
            },
            mime_type: new.mime_type,
            thumbnail: new.thumbnail,
            file: new.file,
            ai_tags: Vec::new(),
            ai_prompt: None,
            ai_model: None,
            ai_response: None,
            created_at: Utc::now(),
            last_tagged: None,
        }
    }

    /// Encrypted original payload
    pub fn file(&self) -> &EncryptedBlob {
        &self.file
    }

    /// Encrypted preview image
    pub fn thumbnail(&self) -> &EncryptedBlob {
        &self.thumbnail
    }

    pub fn ai_tags(&self) -> &[String] {
        &self.ai_tags
    }

    pub fn ai_prompt(&self) -> Option<&str> {
        self.ai_prompt.as_deref()
    }

    pub fn ai_model(&self) -> Option<&str> {
        self.ai_model.as_deref()
    }

    pub fn ai_response(&self) -> Option<&str> {
        self.ai_response.as_deref()
    }

    pub fn last_tagged(&self) -> Option<DateTime<Utc>> {
        self.last_tagged
    }

    pub fn is_tagged(&self) -> bool {
        !self.ai_tags.is_empty()
    }

    /// Replace the AI tag fields. Tags beyond 10 or longer than 50 chars are cut.
    pub fn apply_tags(&mut self, tags: Vec<String>, prompt: &str, model: &str, response: &str) {
        self.ai_tags = tags
            .into_iter()
            .take(MAX_TAGS)
            .map(|t| t.chars().take(MAX_NAME_LEN).collect())
            .collect();
        self.ai_prompt = Some(prompt.to_string());
        self.ai_model = Some(model.to_string());
        self.ai_response = Some(response.to_string());
        self.last_tagged = Some(Utc::now());
    }

    pub fn move_to(&mut self, category_id: &str) {
        self.category_id = category_id.to_string();
    }

    /// Case-insensitive substring match against tags and the raw AI response.
    /// `needle` must already be lowercase.
    pub(crate) fn matches_lowercase(&self, needle: &str) -> bool {
        self.ai_tags
            .iter()
            .any(|t| t.to_lowercase().contains(needle))
            || self
                .ai_response
                .as_deref()
                .map_or(false, |r| r.to_lowercase().contains(needle))
    }
}

impl Record for MediaItem {
    const COLLECTION: Collection = Collection::MediaItems;

    fn id(&self) -> &str {
        &self.id
    }

    fn index_values(&self) -> Vec<(&'static str, String)> {
        vec![
            ("categoryId", self.category_id.clone()),
            ("type", self.media_type.as_str().to_string()),
            ("createdAt", index_timestamp(&self.created_at)),
            ("fileName", self.file_name.clone()),
        ]
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// AI CONFIG
// ═══════════════════════════════════════════════════════════════════════════

/// Connection settings for an OpenAI-compatible vision endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiConfig {
    pub id: String,
    pub name: String,
    pub api_url: String,
    pub api_key: EncryptedText,
    pub model: String,
    pub default_prompt: String,
    pub is_active: bool,
    pub last_tested: Option<DateTime<Utc>>,
}

impl Record for AiConfig {
    const COLLECTION: Collection = Collection::AiConfigs;

    fn id(&self) -> &str {
        &self.id
    }

    fn index_values(&self) -> Vec<(&'static str, String)> {
        vec![
            ("name", self.name.clone()),
            ("isActive", self.is_active.to_string()),
        ]
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// PASSWORD VERIFIER
// ═══════════════════════════════════════════════════════════════════════════

/// Encryption of a known plaintext under the master key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordVerifier {
    #[serde(rename = "verifierCiphertextB64")]
    pub ciphertext: String,
    #[serde(rename = "verifierIvB64")]
    pub iv: String,
}

impl PasswordVerifier {
    pub fn from_blob(blob: &EncryptedBlob) -> Self {
        let text = EncryptedText::from_blob(blob);
        Self {
            ciphertext: text.ciphertext,
            iv: text.iv,
        }
    }

    pub fn to_blob(&self) -> VaultResult<EncryptedBlob> {
        EncryptedText {
            ciphertext: self.ciphertext.clone(),
            iv: self.iv.clone(),
        }
        .to_blob()
    }
}
