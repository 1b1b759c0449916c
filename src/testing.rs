//! Fakes and fixtures for pipeline tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::analyzer::{Detected, MediaAnalyzer, PreparedImage, RawFile, VisionAnalyzer};
use crate::batch::Pacer;
use crate::crypto::{EncryptionEngine, KeyManager};
use crate::error::{VaultError, VaultResult};
use crate::model::{Category, MediaDimensions, MediaType};
use crate::store::RecordStore;

pub const TEST_PASSWORD: &str = "test-password";

/// In-memory store, unlocked key manager, sentinel category
pub struct TestVault {
    pub store: Arc<RecordStore>,
    pub keys: Arc<KeyManager>,
    pub engine: EncryptionEngine,
}

impl TestVault {
    pub fn new() -> Self {
        let store = Arc::new(RecordStore::open_in_memory().unwrap());
        store.add(&Category::uncategorized()).unwrap();

        let keys = Arc::new(KeyManager::new(store.clone()));
        keys.setup_password(TEST_PASSWORD).unwrap();

        Self {
            engine: EncryptionEngine::new(keys.clone()),
            store,
            keys,
        }
    }
}

/// Counts pauses instead of sleeping
#[derive(Default)]
pub struct CountingPacer {
    pauses: AtomicUsize,
}

impl CountingPacer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pauses(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }
}

impl Pacer for CountingPacer {
    fn pause(&self) {
        self.pauses.fetch_add(1, Ordering::SeqCst);
    }
}

/// Treats `IMG*` payloads as images and `VID*` payloads as videos
pub struct FakeMedia;

impl MediaAnalyzer for FakeMedia {
    fn detect_type(&self, file: &RawFile) -> Option<Detected> {
        if file.data.starts_with(b"IMG") {
            Some(Detected { media_type: MediaType::Image, mime_type: "image/png".into() })
        } else if file.data.starts_with(b"VID") {
            Some(Detected { media_type: MediaType::Video, mime_type: "video/mp4".into() })
        } else {
            None
        }
    }

    fn metadata(&self, _file: &RawFile, media_type: MediaType) -> VaultResult<MediaDimensions> {
        Ok(match media_type {
            MediaType::Image => MediaDimensions { width: 640, height: 480, duration: 0.0 },
            MediaType::Video => MediaDimensions { width: 1920, height: 1080, duration: 4.5 },
        })
    }

    fn thumbnail(&self, file: &RawFile, _media_type: MediaType) -> VaultResult<Vec<u8>> {
        let mut thumb = b"THUMB:".to_vec();
        thumb.extend_from_slice(&file.data);
        Ok(thumb)
    }

    fn prepare_for_vision(
        &self,
        data: &[u8],
        _media_type: MediaType,
        mime_type: &str,
    ) -> VaultResult<PreparedImage> {
        Ok(PreparedImage { mime_type: mime_type.to_string(), data: data.to_vec() })
    }
}

/// Replies with a fixed text, or fails for payloads containing `FAIL`
pub struct FakeVision {
    pub reply: String,
    calls: AtomicUsize,
    pub seen: Mutex<Vec<Vec<u8>>>,
}

impl FakeVision {
    pub fn new(reply: &str) -> Self {
        Self { reply: reply.into(), calls: AtomicUsize::new(0), seen: Mutex::new(Vec::new()) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl VisionAnalyzer for FakeVision {
    fn model(&self) -> &str {
        "fake-vision"
    }

    fn analyze(&self, image: &PreparedImage, _prompt: &str) -> VaultResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(image.data.clone());
        if image.data.windows(4).any(|w| w == b"FAIL") {
            return Err(VaultError::VisionFailed("HTTP 500".into()));
        }
        Ok(self.reply.clone())
    }
}
