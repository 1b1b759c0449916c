//! ALFA Media Vault - Configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{VaultError, VaultResult};

/// Prompt used when neither the caller nor the active AI config supplies one
pub const DEFAULT_PROMPT: &str = "Describe this image with 5-10 short keyword tags, \
separated by commas. Reply with the tags only.";

/// Vault configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// SQLite database path
    pub db_path: PathBuf,
    /// Edge of the square thumbnail
    pub thumb_size: u32,
    /// Longest edge of images sent to the vision endpoint
    pub preview_max_dimension: u32,
    /// Pause between two items of a tagging batch (0 disables)
    pub tag_delay_ms: u64,
    /// Largest accepted import
    pub max_import_bytes: u64,
    /// `max_tokens` for vision requests
    pub vision_max_tokens: u32,
    /// HTTP timeout for vision requests
    pub vision_timeout_secs: u64,
    /// Fallback tagging prompt
    pub default_prompt: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./media_vault.db"),
            thumb_size: 256,
            preview_max_dimension: 1024,
            tag_delay_ms: 1000,
            max_import_bytes: 2 * 1024 * 1024 * 1024,
            vision_max_tokens: 300,
            vision_timeout_secs: 60,
            default_prompt: DEFAULT_PROMPT.to_string(),
        }
    }
}

impl VaultConfig {
    /// Load from a JSON file; defaults if the file does not exist
    pub fn load(path: &Path) -> VaultResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let data = std::fs::read(path)?;
        serde_json::from_slice(&data).map_err(|e| VaultError::DeserializationError(e.to_string()))
    }

    /// Write as pretty JSON
    pub fn save(&self, path: &Path) -> VaultResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    pub fn tag_delay(&self) -> Duration {
        Duration::from_millis(self.tag_delay_ms)
    }
}
