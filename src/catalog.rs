//! ALFA Media Vault - Catalog
//!
//! Category and AI config management on top of the record store.

use std::sync::Arc;

use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

use crate::crypto::EncryptionEngine;
use crate::error::{VaultError, VaultResult};
use crate::model::{AiConfig, Category, MediaItem, UNCATEGORIZED_ID};
use crate::store::RecordStore;

/// Plaintext input for a new AI config
#[derive(Debug, Clone)]
pub struct AiConfigDraft {
    pub name: String,
    pub api_url: String,
    pub api_key: SecretString,
    pub model: String,
    pub default_prompt: String,
    /// Make this the active config right away
    pub activate: bool,
}

/// Catalog service
#[derive(Clone)]
pub struct Catalog {
    store: Arc<RecordStore>,
    engine: EncryptionEngine,
}

impl Catalog {
    pub fn new(store: Arc<RecordStore>, engine: EncryptionEngine) -> Self {
        Self { store, engine }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // CATEGORIES
    // ═══════════════════════════════════════════════════════════════════════

    /// Create the sentinel category if it does not exist yet
    pub fn ensure_uncategorized(&self) -> VaultResult<()> {
        if self.store.get::<Category>(UNCATEGORIZED_ID)?.is_none() {
            self.store.add(&Category::uncategorized())?;
            log::info!("Created sentinel category '{}'", UNCATEGORIZED_ID);
        }
        Ok(())
    }

    pub fn create_category(
        &self,
        name: &str,
        description: &str,
        color: &str,
    ) -> VaultResult<Category> {
        let category = Category::new(name, description, color)?;
        self.store.add(&category)?;
        log::debug!("Created category {} ({})", category.name, category.id);
        Ok(category)
    }

    /// Persist edits to an existing category
    pub fn update_category(&self, category: &Category) -> VaultResult<Category> {
        self.store.require::<Category>(&category.id)?;

        let mut updated = category.clone();
        updated.name = Category::validate_name(&category.name)?;
        self.store.update(&updated)?;
        Ok(updated)
    }

    pub fn get_category(&self, id: &str) -> VaultResult<Category> {
        self.store.require(id)
    }

    /// All categories, sentinel first, then by name
    pub fn list_categories(&self) -> VaultResult<Vec<Category>> {
        let mut categories = self.store.get_all::<Category>()?;
        categories.sort_by_key(|c| (!c.is_uncategorized(), c.name.to_lowercase()));
        Ok(categories)
    }

    /// Move every item of the category to the sentinel, then delete it.
    /// Returns the number of reassigned items.
    pub fn delete_category(&self, id: &str) -> VaultResult<usize> {
        if id == UNCATEGORIZED_ID {
            return Err(VaultError::ProtectedCategory(id.to_string()));
        }
        let category = self.store.require::<Category>(id)?;

        let items = self.store.get_by_index::<MediaItem>("categoryId", id)?;
        let moved = items.len();
        for mut item in items {
            item.move_to(UNCATEGORIZED_ID);
            self.store.update(&item)?;
        }

        self.store.delete::<Category>(id)?;
        log::info!(
            "Deleted category {} ({} items moved to {})",
            category.name,
            moved,
            UNCATEGORIZED_ID
        );
        Ok(moved)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // ITEMS
    // ═══════════════════════════════════════════════════════════════════════

    pub fn get_item(&self, id: &str) -> VaultResult<MediaItem> {
        self.store.require(id)
    }

    /// Items newest first, optionally limited to one category
    pub fn list_items(&self, category_id: Option<&str>) -> VaultResult<Vec<MediaItem>> {
        let mut items = match category_id {
            Some(id) => self.store.get_by_index::<MediaItem>("categoryId", id)?,
            None => self.store.get_all::<MediaItem>()?,
        };
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    pub fn move_item(&self, item_id: &str, category_id: &str) -> VaultResult<MediaItem> {
        self.store.require::<Category>(category_id)?;

        let mut item = self.store.require::<MediaItem>(item_id)?;
        item.move_to(category_id);
        self.store.update(&item)?;
        Ok(item)
    }

    pub fn delete_item(&self, id: &str) -> VaultResult<bool> {
        let removed = self.store.delete::<MediaItem>(id)?;
        if removed {
            log::debug!("Deleted media item {}", id);
        }
        Ok(removed)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // AI CONFIGS
    // ═══════════════════════════════════════════════════════════════════════

    /// Encrypt the API key and save a new config
    pub fn create_ai_config(&self, draft: AiConfigDraft) -> VaultResult<AiConfig> {
        let name = draft.name.trim();
        if name.is_empty() {
            return Err(VaultError::InvalidRecord("AI config name is empty".into()));
        }
        let api_url = draft.api_url.trim();
        if api_url.is_empty() {
            return Err(VaultError::InvalidRecord("AI config API URL is empty".into()));
        }

        let config = AiConfig {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            api_url: api_url.to_string(),
            api_key: self.engine.encrypt_text(draft.api_key.expose_secret())?,
            model: draft.model.trim().to_string(),
            default_prompt: draft.default_prompt,
            is_active: draft.activate,
            last_tested: None,
        };

        self.save_ai_config(&config)?;
        Ok(config)
    }

    /// Upsert a config. An active config first deactivates every other one;
    /// the two steps are separate writes.
    pub fn save_ai_config(&self, config: &AiConfig) -> VaultResult<()> {
        let name_taken = self
            .store
            .get_by_index::<AiConfig>("name", &config.name)?
            .iter()
            .any(|other| other.id != config.id);
        if name_taken {
            return Err(VaultError::DuplicateKey {
                collection: "ai_configs",
                key: format!("name={}", config.name),
            });
        }

        if config.is_active {
            for mut other in self.store.get_by_index::<AiConfig>("isActive", "true")? {
                if other.id != config.id {
                    other.is_active = false;
                    self.store.update(&other)?;
                    log::debug!("Deactivated AI config {}", other.name);
                }
            }
        }

        self.store.update(config)
    }

    pub fn activate_ai_config(&self, id: &str) -> VaultResult<AiConfig> {
        let mut config = self.store.require::<AiConfig>(id)?;
        config.is_active = true;
        self.save_ai_config(&config)?;

        log::info!("Activated AI config {} ({})", config.name, config.model);
        Ok(config)
    }

    pub fn delete_ai_config(&self, id: &str) -> VaultResult<bool> {
        self.store.delete::<AiConfig>(id)
    }

    pub fn get_ai_config(&self, id: &str) -> VaultResult<AiConfig> {
        self.store.require(id)
    }

    pub fn list_ai_configs(&self) -> VaultResult<Vec<AiConfig>> {
        let mut configs = self.store.get_all::<AiConfig>()?;
        configs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(configs)
    }

    pub fn active_ai_config(&self) -> VaultResult<Option<AiConfig>> {
        self.store.get_active_ai_config()
    }

    /// Plaintext API key. Requires an unlocked vault.
    pub fn decrypt_api_key(&self, config: &AiConfig) -> VaultResult<SecretString> {
        self.engine.decrypt_text(&config.api_key)
    }

    /// Record a successful connection test
    pub fn mark_tested(&self, id: &str) -> VaultResult<AiConfig> {
        let mut config = self.store.require::<AiConfig>(id)?;
        config.last_tested = Some(Utc::now());
        self.store.update(&config)?;
        Ok(config)
    }
}
