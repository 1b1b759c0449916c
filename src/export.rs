//! ALFA Media Vault - Metadata Export
//!
//! Plain JSON snapshot of the catalog. Encrypted payloads never leave the
//! vault through here, so an export cannot be re-imported as a backup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::VaultResult;
use crate::model::{Category, MediaItem, MediaType};

/// A media item without its encrypted fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItemSummary {
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
    pub created_at: DateTime<Utc>,
    pub ai_tags: Vec<String>,
    pub ai_prompt: Option<String>,
    pub ai_model: Option<String>,
    pub ai_response: Option<String>,
    pub last_tagged: Option<DateTime<Utc>>,
}

impl From<&MediaItem> for MediaItemSummary {
    fn from(item: &MediaItem) -> Self {
        Self {
            id: item.id.clone(),
            category_id: item.category_id.clone(),
            media_type: item.media_type,
            file_name: item.file_name.clone(),
            file_size: item.file_size,
            width: item.width,
            height: item.height,
            duration: item.duration,
            mime_type: item.mime_type.clone(),
            created_at: item.created_at,
            ai_tags: item.ai_tags().to_vec(),
            ai_prompt: item.ai_prompt().map(str::to_string),
            ai_model: item.ai_model().map(str::to_string),
            ai_response: item.ai_response().map(str::to_string),
            last_tagged: item.last_tagged(),
        }
    }
}

/// Metadata-only export document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataExport {
    pub version: String,
    pub export_date: DateTime<Utc>,
    pub categories: Vec<Category>,
    pub media_items: Vec<MediaItemSummary>,
}

impl MetadataExport {
    pub fn new(categories: Vec<Category>, items: &[MediaItem]) -> Self {
        Self {
            version: crate::VERSION.to_string(),
            export_date: Utc::now(),
            categories,
            media_items: items.iter().map(MediaItemSummary::from).collect(),
        }
    }

    pub fn to_json(&self) -> VaultResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::EncryptedBlob;
    use crate::model::{MediaDimensions, NewMediaItem, UNCATEGORIZED_ID};

    #[test]
    fn test_export_omits_encrypted_fields() {
        let blob = EncryptedBlob::from_parts(vec![9u8; 40], &[3u8; 12]).unwrap();
        let mut item = MediaItem::new(NewMediaItem {
            category_id: UNCATEGORIZED_ID.into(),
            media_type: MediaType::Video,
            file_name: "clip.mp4".into(),
            file_size: 40,
            mime_type: "video/mp4".into(),
            dimensions: MediaDimensions { width: 1280, height: 720, duration: 3.0 },
            thumbnail: blob.clone(),
            file: blob,
        });
        item.apply_tags(vec!["beach".into()], "tags", "gpt-4o", "beach");

        let export = MetadataExport::new(vec![Category::uncategorized()], &[item.clone()]);
        let json = export.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["version"], crate::VERSION);
        assert!(value["exportDate"].is_string());
        assert_eq!(value["categories"][0]["id"], UNCATEGORIZED_ID);

        let exported = &value["mediaItems"][0];
        assert_eq!(exported["id"], item.id.as_str());
        assert_eq!(exported["type"], "video");
        assert_eq!(exported["aiTags"][0], "beach");
        assert!(exported.get("file").is_none());
        assert!(exported.get("thumbnail").is_none());
        assert!(!json.contains("ciphertext"));
    }
}
