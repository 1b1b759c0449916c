//! ALFA Media Vault - Main Vault Implementation
//!
//! Wires the store, key manager, encryption engine, catalog and both
//! pipelines into one handle.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::analyzer::{MediaAnalyzer, RawFile};
use crate::batch::{pacer_for, run_sequential, BatchProgress, BatchReport, CancelToken, NoDelay};
use crate::catalog::Catalog;
use crate::config::VaultConfig;
use crate::crypto::{EncryptionEngine, KeyManager};
use crate::error::{VaultError, VaultResult};
use crate::export::MetadataExport;
use crate::ingest::IngestionPipeline;
use crate::model::{AiConfig, Category, MediaItem, MediaType};
use crate::store::RecordStore;
use crate::tagging::TaggingPipeline;
use crate::thumbs::ImageAnalyzer;

#[cfg(feature = "vision-http")]
use crate::vision::OpenAiVision;

/// Vault statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultStats {
    pub items: usize,
    pub images: usize,
    pub videos: usize,
    pub tagged: usize,
    pub untagged: usize,
    /// Sum of plaintext file sizes
    pub total_bytes: u64,
    pub categories: usize,
    pub ai_configs: usize,
}

/// Media Vault - Main entry point
pub struct MediaVault {
    config: VaultConfig,
    store: Arc<RecordStore>,
    keys: Arc<KeyManager>,
    engine: EncryptionEngine,
    media: Arc<dyn MediaAnalyzer>,
    catalog: Catalog,
    ingestion: IngestionPipeline,
    tagging: TaggingPipeline,
}

impl MediaVault {
    // ═══════════════════════════════════════════════════════════════════════
    // INITIALIZATION
    // ═══════════════════════════════════════════════════════════════════════

    /// Open (or create) the vault database at `config.db_path`
    pub fn open(config: VaultConfig) -> VaultResult<Self> {
        let store = Arc::new(RecordStore::open(&config.db_path)?);
        let media = Arc::new(ImageAnalyzer::new(config.thumb_size, config.preview_max_dimension));
        log::info!("Opened media vault at {}", config.db_path.display());
        Self::with_analyzer(config, store, media)
    }

    /// Vault backed by an in-memory database
    pub fn open_in_memory(config: VaultConfig) -> VaultResult<Self> {
        let store = Arc::new(RecordStore::open_in_memory()?);
        let media = Arc::new(ImageAnalyzer::new(config.thumb_size, config.preview_max_dimension));
        Self::with_analyzer(config, store, media)
    }

    /// Vault over an existing store with a custom media analyzer
    pub fn with_analyzer(
        config: VaultConfig,
        store: Arc<RecordStore>,
        media: Arc<dyn MediaAnalyzer>,
    ) -> VaultResult<Self> {
        let keys = Arc::new(KeyManager::new(store.clone()));
        let engine = EncryptionEngine::new(keys.clone());

        let catalog = Catalog::new(store.clone(), engine.clone());
        catalog.ensure_uncategorized()?;

        let ingestion =
            IngestionPipeline::new(store.clone(), engine.clone(), config.max_import_bytes);
        let tagging = TaggingPipeline::new(
            store.clone(),
            engine.clone(),
            media.clone(),
            pacer_for(config.tag_delay()),
        );

        Ok(Self {
            config,
            store,
            keys,
            engine,
            media,
            catalog,
            ingestion,
            tagging,
        })
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    // ═══════════════════════════════════════════════════════════════════════
    // SESSION
    // ═══════════════════════════════════════════════════════════════════════

    pub fn is_password_set(&self) -> bool {
        self.keys.is_password_set()
    }

    /// First-time setup. Leaves the vault unlocked.
    pub fn setup_password(&self, password: &str) -> VaultResult<()> {
        self.keys.setup_password(password)
    }

    pub fn verify_password(&self, password: &str) -> bool {
        self.keys.verify_password(password)
    }

    pub fn unlock(&self, password: &str) -> VaultResult<()> {
        self.keys.unlock(password)
    }

    /// Drop the session key. Safe to call at any time.
    pub fn lock(&self) {
        self.keys.lock();
    }

    pub fn is_unlocked(&self) -> bool {
        self.keys.is_unlocked()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // SERVICES
    // ═══════════════════════════════════════════════════════════════════════

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn ingestion(&self) -> &IngestionPipeline {
        &self.ingestion
    }

    pub fn tagging(&self) -> &TaggingPipeline {
        &self.tagging
    }

    pub fn analyzer(&self) -> &dyn MediaAnalyzer {
        self.media.as_ref()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // MEDIA
    // ═══════════════════════════════════════════════════════════════════════

    /// Import one file with the vault's media analyzer
    pub fn import(&self, file: RawFile, category_id: &str) -> VaultResult<MediaItem> {
        self.ingestion.import_item(file, category_id, self.media.as_ref())
    }

    /// Read and import files from disk, one at a time
    pub fn import_paths(
        &self,
        paths: Vec<PathBuf>,
        category_id: &str,
        cancel: &CancelToken,
        on_progress: &mut dyn FnMut(&BatchProgress),
    ) -> BatchReport<MediaItem> {
        let report = run_sequential(
            paths,
            |path| path.display().to_string(),
            &NoDelay,
            cancel,
            on_progress,
            |path| {
                let file = RawFile::read(&path)
                    .map_err(|e| VaultError::import(path.display().to_string(), e))?;
                self.import(file, category_id)
            },
        );

        log::info!(
            "Imported {} of {} files",
            report.success_count(),
            report.len()
        );
        report
    }

    /// Decrypted original payload
    pub fn file_bytes(&self, id: &str) -> VaultResult<Vec<u8>> {
        let item = self.store.require::<MediaItem>(id)?;
        self.engine.decrypt_buffer(item.file())
    }

    /// Decrypted thumbnail
    pub fn thumbnail_bytes(&self, id: &str) -> VaultResult<Vec<u8>> {
        let item = self.store.require::<MediaItem>(id)?;
        self.engine.decrypt_buffer(item.thumbnail())
    }

    /// Explicit prompt, else the active AI config's default, else the configured default
    pub fn resolve_prompt(&self, prompt: Option<&str>) -> VaultResult<String> {
        if let Some(prompt) = prompt.map(str::trim).filter(|p| !p.is_empty()) {
            return Ok(prompt.to_string());
        }

        let from_config = self
            .catalog
            .active_ai_config()?
            .map(|c| c.default_prompt)
            .filter(|p| !p.trim().is_empty());
        Ok(from_config.unwrap_or_else(|| self.config.default_prompt.clone()))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // REPORTING
    // ═══════════════════════════════════════════════════════════════════════

    pub fn export_metadata(&self) -> VaultResult<MetadataExport> {
        let categories = self.catalog.list_categories()?;
        let items = self.catalog.list_items(None)?;
        Ok(MetadataExport::new(categories, &items))
    }

    pub fn stats(&self) -> VaultResult<VaultStats> {
        let items = self.store.get_all::<MediaItem>()?;

        let mut stats = VaultStats {
            items: items.len(),
            categories: self.store.count::<Category>()?,
            ai_configs: self.store.count::<AiConfig>()?,
            ..Default::default()
        };
        for item in &items {
            match item.media_type {
                MediaType::Image => stats.images += 1,
                MediaType::Video => stats.videos += 1,
            }
            if item.is_tagged() {
                stats.tagged += 1;
            }
            stats.total_bytes += item.file_size;
        }
        stats.untagged = stats.items - stats.tagged;

        Ok(stats)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // VISION
    // ═══════════════════════════════════════════════════════════════════════

    /// Vision client for the active AI config
    #[cfg(feature = "vision-http")]
    pub fn vision_for_active_config(&self) -> VaultResult<OpenAiVision> {
        let config = self
            .catalog
            .active_ai_config()?
            .ok_or(VaultError::NoActiveAiConfig)?;
        self.vision_for(&config)
    }

    /// List the endpoint's models and record the test time
    #[cfg(feature = "vision-http")]
    pub fn test_ai_connection(&self, id: &str) -> VaultResult<Vec<String>> {
        let config = self.catalog.get_ai_config(id)?;
        let models = self.vision_for(&config)?.list_models()?;

        self.catalog.mark_tested(id)?;
        log::info!("AI config {} reachable, {} models", config.name, models.len());
        Ok(models)
    }

    #[cfg(feature = "vision-http")]
    fn vision_for(&self, config: &AiConfig) -> VaultResult<OpenAiVision> {
        OpenAiVision::new(
            &config.api_url,
            self.catalog.decrypt_api_key(config)?,
            &config.model,
            self.config.vision_max_tokens,
            std::time::Duration::from_secs(self.config.vision_timeout_secs),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AiConfigDraft;
    use crate::model::UNCATEGORIZED_ID;
    use crate::testing::{FakeMedia, FakeVision, TEST_PASSWORD};
    use secrecy::SecretString;
    use tempfile::tempdir;

    fn fake_vault(config: VaultConfig) -> MediaVault {
        let store = Arc::new(RecordStore::open_in_memory().unwrap());
        MediaVault::with_analyzer(config, store, Arc::new(FakeMedia)).unwrap()
    }

    fn draft(prompt: &str) -> AiConfigDraft {
        AiConfigDraft {
            name: "Main".into(),
            api_url: "https://api.example.com/v1".into(),
            api_key: SecretString::new("sk-test".into()),
            model: "gpt-4o".into(),
            default_prompt: prompt.into(),
            activate: true,
        }
    }

    #[test]
    fn test_open_creates_sentinel_category() {
        let vault = MediaVault::open_in_memory(VaultConfig::default()).unwrap();
        let categories = vault.catalog().list_categories().unwrap();

        assert_eq!(categories.len(), 1);
        assert!(categories[0].is_uncategorized());
        assert!(!vault.is_password_set());
        assert!(!vault.is_unlocked());
    }

    #[test]
    fn test_import_read_lock_unlock() {
        let vault = fake_vault(VaultConfig::default());
        vault.setup_password(TEST_PASSWORD).unwrap();

        let item = vault.import(RawFile::new("a.png", b"IMG a".to_vec()), UNCATEGORIZED_ID).unwrap();
        assert_eq!(vault.file_bytes(&item.id).unwrap(), b"IMG a");
        assert_eq!(vault.thumbnail_bytes(&item.id).unwrap(), b"THUMB:IMG a");

        vault.lock();
        assert!(matches!(vault.file_bytes(&item.id), Err(VaultError::Locked)));
        assert!(matches!(vault.unlock("wrong"), Err(VaultError::InvalidPassword)));
        assert!(!vault.is_unlocked());

        vault.unlock(TEST_PASSWORD).unwrap();
        assert_eq!(vault.file_bytes(&item.id).unwrap(), b"IMG a");
        assert!(matches!(vault.file_bytes("missing"), Err(VaultError::NotFound { .. })));
    }

    #[test]
    fn test_reopen_from_disk() {
        let dir = tempdir().unwrap();
        let config = VaultConfig {
            db_path: dir.path().join("vault.db"),
            ..Default::default()
        };

        let id = {
            let vault = MediaVault::with_analyzer(
                config.clone(),
                Arc::new(RecordStore::open(&config.db_path).unwrap()),
                Arc::new(FakeMedia),
            )
            .unwrap();
            vault.setup_password(TEST_PASSWORD).unwrap();
            vault
                .import(RawFile::new("kept.png", b"IMG kept".to_vec()), UNCATEGORIZED_ID)
                .unwrap()
                .id
        };

        let vault = MediaVault::open(config).unwrap();
        assert!(vault.is_password_set());
        assert!(!vault.is_unlocked());
        assert!(vault.verify_password(TEST_PASSWORD));
        assert!(!vault.verify_password("test-passworD"));

        vault.unlock(TEST_PASSWORD).unwrap();
        assert_eq!(vault.file_bytes(&id).unwrap(), b"IMG kept");
        assert_eq!(vault.catalog().list_categories().unwrap().len(), 1);
    }

    #[test]
    fn test_import_paths_reports_unreadable_files() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("good.png");
        std::fs::write(&good, b"IMG good").unwrap();
        let missing = dir.path().join("missing.png");

        let vault = fake_vault(VaultConfig::default());
        vault.setup_password(TEST_PASSWORD).unwrap();

        let report = vault.import_paths(
            vec![good, missing],
            UNCATEGORIZED_ID,
            &CancelToken::new(),
            &mut |_: &BatchProgress| {},
        );

        assert_eq!(report.success_count(), 1);
        let (_, err) = report.failed().next().unwrap();
        assert!(matches!(err.root_cause(), VaultError::IoError(_)));
        assert_eq!(report.succeeded().next().unwrap().file_name, "good.png");
    }

    #[test]
    fn test_stats_and_export() {
        let vault = fake_vault(VaultConfig { tag_delay_ms: 0, ..Default::default() });
        vault.setup_password(TEST_PASSWORD).unwrap();

        let clips = vault.catalog().create_category("Clips", "", "").unwrap();
        let image = vault.import(RawFile::new("a.png", b"IMG aa".to_vec()), UNCATEGORIZED_ID).unwrap();
        vault.import(RawFile::new("b.mp4", b"VID bbbb".to_vec()), &clips.id).unwrap();
        vault
            .tagging()
            .tag_item(&image, &FakeVision::new("sand, sea"), "tags")
            .unwrap();

        let stats = vault.stats().unwrap();
        assert_eq!(
            stats,
            VaultStats {
                items: 2,
                images: 1,
                videos: 1,
                tagged: 1,
                untagged: 1,
                total_bytes: 14,
                categories: 2,
                ai_configs: 0,
            }
        );

        let export = vault.export_metadata().unwrap();
        assert_eq!(export.categories.len(), 2);
        assert_eq!(export.media_items.len(), 2);
        let tagged = export.media_items.iter().find(|i| i.id == image.id).unwrap();
        assert_eq!(tagged.ai_tags, vec!["sand", "sea"]);
    }

    #[test]
    fn test_resolve_prompt_precedence() {
        let vault = fake_vault(VaultConfig::default());
        vault.setup_password(TEST_PASSWORD).unwrap();

        assert_eq!(vault.resolve_prompt(None).unwrap(), vault.config().default_prompt);
        assert_eq!(vault.resolve_prompt(Some(" mine ")).unwrap(), "mine");

        vault.catalog().create_ai_config(draft("Config prompt")).unwrap();
        assert_eq!(vault.resolve_prompt(None).unwrap(), "Config prompt");
        assert_eq!(vault.resolve_prompt(Some("")).unwrap(), "Config prompt");
    }

    #[cfg(feature = "vision-http")]
    #[test]
    fn test_vision_requires_active_config() {
        let vault = fake_vault(VaultConfig::default());
        vault.setup_password(TEST_PASSWORD).unwrap();

        assert!(matches!(vault.vision_for_active_config(), Err(VaultError::NoActiveAiConfig)));

        vault.catalog().create_ai_config(draft("tags")).unwrap();
        let vision = vault.vision_for_active_config().unwrap();
        assert_eq!(crate::analyzer::VisionAnalyzer::model(&vision), "gpt-4o");

        vault.lock();
        assert!(vault.vision_for_active_config().err().unwrap().is_locked());
    }
}
