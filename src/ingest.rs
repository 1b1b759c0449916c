//! ALFA Media Vault - Ingestion Pipeline
//!
//! Raw file → classified, thumbnailed, encrypted, persisted `MediaItem`.
//! Nothing reaches the store until both payloads are encrypted, and the
//! item is written with a single `add`.

use std::sync::Arc;

use crate::analyzer::{MediaAnalyzer, RawFile};
use crate::batch::{run_sequential, BatchProgress, BatchReport, CancelToken, NoDelay};
use crate::crypto::EncryptionEngine;
use crate::error::{VaultError, VaultResult};
use crate::model::{Category, MediaItem, NewMediaItem};
use crate::store::RecordStore;

/// Ingestion Pipeline
#[derive(Clone)]
pub struct IngestionPipeline {
    store: Arc<RecordStore>,
    engine: EncryptionEngine,
    max_import_bytes: u64,
}

impl IngestionPipeline {
    pub fn new(store: Arc<RecordStore>, engine: EncryptionEngine, max_import_bytes: u64) -> Self {
        Self {
            store,
            engine,
            max_import_bytes,
        }
    }

    /// Import one file into `category_id`
    pub fn import_item(
        &self,
        file: RawFile,
        category_id: &str,
        analyzer: &dyn MediaAnalyzer,
    ) -> VaultResult<MediaItem> {
        let file_name = file.name.clone();
        self.import_inner(file, category_id, analyzer)
            .map_err(|e| VaultError::import(file_name, e))
    }

    fn import_inner(
        &self,
        file: RawFile,
        category_id: &str,
        analyzer: &dyn MediaAnalyzer,
    ) -> VaultResult<MediaItem> {
        if !self.engine.is_ready() {
            return Err(VaultError::Locked);
        }
        if file.size() > self.max_import_bytes {
            return Err(VaultError::FileTooLarge {
                size: file.size(),
                max: self.max_import_bytes,
            });
        }
        self.store.require::<Category>(category_id)?;

        let detected = analyzer.detect_type(&file).ok_or_else(|| {
            VaultError::UnsupportedType(
                file.mime_type
                    .clone()
                    .unwrap_or_else(|| "unrecognized content".to_string()),
            )
        })?;

        let dimensions = analyzer.metadata(&file, detected.media_type)?;
        let preview = analyzer.thumbnail(&file, detected.media_type)?;

        // Separate IVs: one per encrypt call
        let thumbnail = self.engine.encrypt_buffer(&preview)?;
        let payload = self.engine.encrypt_buffer(&file.data)?;

        let item = MediaItem::new(NewMediaItem {
            category_id: category_id.to_string(),
            media_type: detected.media_type,
            file_name: file.name,
            file_size: file.data.len() as u64,
            mime_type: detected.mime_type,
            dimensions,
            thumbnail,
            file: payload,
        });

        self.store.add(&item)?;

        log::debug!(
            "Imported {} as {} ({}, {} bytes)",
            item.file_name,
            item.id,
            item.media_type,
            item.file_size
        );
        Ok(item)
    }

    /// Best-effort sequential import. One file's failure never aborts the rest.
    pub fn import_batch(
        &self,
        files: Vec<RawFile>,
        category_id: &str,
        analyzer: &dyn MediaAnalyzer,
        cancel: &CancelToken,
        on_progress: &mut dyn FnMut(&BatchProgress),
    ) -> BatchReport<MediaItem> {
        let report = run_sequential(
            files,
            |file| file.name.clone(),
            &NoDelay,
            cancel,
            on_progress,
            |file| self.import_item(file, category_id, analyzer),
        );

        log::info!(
            "Import batch done: {} imported, {} failed{}",
            report.success_count(),
            report.failure_count(),
            if report.cancelled { " (cancelled)" } else { "" }
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MediaType, UNCATEGORIZED_ID};
    use crate::testing::{FakeMedia, TestVault, TEST_PASSWORD};

    fn pipeline(vault: &TestVault) -> IngestionPipeline {
        IngestionPipeline::new(vault.store.clone(), vault.engine.clone(), 1024)
    }

    fn no_progress() -> impl FnMut(&BatchProgress) {
        |_| {}
    }

    #[test]
    fn test_import_encrypts_and_persists() {
        let vault = TestVault::new();
        let file = RawFile::new("beach.png", b"IMG beach pixels".to_vec());

        let item = pipeline(&vault).import_item(file, UNCATEGORIZED_ID, &FakeMedia).unwrap();

        assert_eq!(item.media_type, MediaType::Image);
        assert_eq!(item.file_name, "beach.png");
        assert_eq!(item.file_size, 16);
        assert_eq!((item.width, item.height, item.duration), (640, 480, 0.0));
        assert!(item.ai_tags().is_empty());

        let stored = vault.store.get::<MediaItem>(&item.id).unwrap().unwrap();
        assert_eq!(stored, item);
        assert_ne!(stored.file().ciphertext(), b"IMG beach pixels");
        assert_ne!(stored.file().iv(), stored.thumbnail().iv());

        assert_eq!(vault.engine.decrypt_buffer(stored.file()).unwrap(), b"IMG beach pixels");
        assert_eq!(vault.engine.decrypt_buffer(stored.thumbnail()).unwrap(), b"THUMB:IMG beach pixels");
    }

    #[test]
    fn test_video_keeps_duration() {
        let vault = TestVault::new();
        let item = pipeline(&vault)
            .import_item(RawFile::new("clip.mp4", b"VID frames".to_vec()), UNCATEGORIZED_ID, &FakeMedia)
            .unwrap();

        assert_eq!(item.media_type, MediaType::Video);
        assert_eq!(item.duration, 4.5);
        assert_eq!(item.mime_type, "video/mp4");
    }

    #[test]
    fn test_failures_persist_nothing() {
        let vault = TestVault::new();
        let ingest = pipeline(&vault);

        let err = ingest
            .import_item(RawFile::new("doc.pdf", b"%PDF".to_vec()), UNCATEGORIZED_ID, &FakeMedia)
            .unwrap_err();
        assert!(matches!(err.root_cause(), VaultError::UnsupportedType(_)));
        assert!(matches!(err, VaultError::Import { ref file_name, .. } if file_name == "doc.pdf"));

        let err = ingest
            .import_item(RawFile::new("a.png", b"IMG".to_vec()), "no-such-category", &FakeMedia)
            .unwrap_err();
        assert!(matches!(err.root_cause(), VaultError::NotFound { .. }));

        let err = ingest
            .import_item(RawFile::new("big.png", vec![b'I'; 2048]), UNCATEGORIZED_ID, &FakeMedia)
            .unwrap_err();
        assert!(matches!(err.root_cause(), VaultError::FileTooLarge { size: 2048, max: 1024 }));

        vault.keys.lock();
        let err = ingest
            .import_item(RawFile::new("a.png", b"IMG".to_vec()), UNCATEGORIZED_ID, &FakeMedia)
            .unwrap_err();
        assert!(err.is_locked());

        assert_eq!(vault.store.count::<MediaItem>().unwrap(), 0);
    }

    #[test]
    fn test_batch_with_one_unsupported_file() {
        let vault = TestVault::new();
        let files = vec![
            RawFile::new("one.png", b"IMG 1".to_vec()),
            RawFile::new("two.txt", b"hello".to_vec()),
            RawFile::new("three.mp4", b"VID 3".to_vec()),
        ];

        let report = pipeline(&vault).import_batch(
            files,
            UNCATEGORIZED_ID,
            &FakeMedia,
            &CancelToken::new(),
            &mut no_progress(),
        );

        assert_eq!(report.success_count(), 2);
        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.failed_labels(), vec!["two.txt"]);
        assert_eq!(vault.store.count::<MediaItem>().unwrap(), 2);
    }

    #[test]
    fn test_lock_mid_batch() {
        let vault = TestVault::new();
        let keys = vault.keys.clone();
        let files = (0..4)
            .map(|i| RawFile::new(format!("{}.png", i), format!("IMG {}", i).into_bytes()))
            .collect();

        let report = pipeline(&vault).import_batch(
            files,
            UNCATEGORIZED_ID,
            &FakeMedia,
            &CancelToken::new(),
            &mut |p: &BatchProgress| {
                if p.done == 1 {
                    keys.lock();
                }
            },
        );

        assert_eq!(report.success_count(), 1);
        assert_eq!(report.failure_count(), 3);
        assert!(report.failed().all(|(_, e)| e.is_locked()));

        vault.keys.unlock(TEST_PASSWORD).unwrap();
        let kept = report.succeeded().next().unwrap();
        assert_eq!(vault.engine.decrypt_buffer(kept.file()).unwrap(), b"IMG 0");
        assert_eq!(vault.store.count::<MediaItem>().unwrap(), 1);
    }
}
