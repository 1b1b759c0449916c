//! ALFA Media Vault - AI Tagging Pipeline
//!
//! Decrypts an item, hands a vision-ready image to the remote model and
//! stores the tags pulled out of its free-text answer.

use std::sync::Arc;

use crate::analyzer::{MediaAnalyzer, VisionAnalyzer};
use crate::batch::{run_sequential, BatchProgress, BatchReport, CancelToken, Pacer};
use crate::crypto::EncryptionEngine;
use crate::error::{VaultError, VaultResult};
use crate::model::{MediaItem, MAX_NAME_LEN, MAX_TAGS};
use crate::store::RecordStore;

/// Fragments at least this long (in chars) are dropped
const MAX_FRAGMENT_LEN: usize = 100;

// ═══════════════════════════════════════════════════════════════════════════
// TAG EXTRACTION
// ═══════════════════════════════════════════════════════════════════════════

/// Turn a free-text vision answer into at most 10 tags.
///
/// Splits on `,` `;` and newlines, strips one list marker (`-`, `•`, `*` or
/// `12.`), truncates to 50 chars and keeps fragments of 3..100 chars, in order.
pub fn extract_tags(response: &str) -> Vec<String> {
    response
        .split(|c: char| matches!(c, ',' | ';' | '\n'))
        .filter_map(clean_fragment)
        .take(MAX_TAGS)
        .collect()
}

fn clean_fragment(fragment: &str) -> Option<String> {
    let stripped = strip_list_marker(fragment.trim()).trim();
    let truncated: String = stripped.chars().take(MAX_NAME_LEN).collect();
    let tag = truncated.trim();

    let len = tag.chars().count();
    if len > 2 && len < MAX_FRAGMENT_LEN {
        Some(tag.to_string())
    } else {
        None
    }
}

fn strip_list_marker(fragment: &str) -> &str {
    if let Some(rest) = fragment.strip_prefix(|c: char| matches!(c, '-' | '•' | '*')) {
        return rest;
    }

    let digits = fragment.len() - fragment.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits > 0 {
        if let Some(rest) = fragment[digits..].strip_prefix('.') {
            return rest;
        }
    }
    fragment
}

// ═══════════════════════════════════════════════════════════════════════════
// PIPELINE
// ═══════════════════════════════════════════════════════════════════════════

/// Tagging Pipeline
#[derive(Clone)]
pub struct TaggingPipeline {
    store: Arc<RecordStore>,
    engine: EncryptionEngine,
    media: Arc<dyn MediaAnalyzer>,
    pacer: Arc<dyn Pacer>,
}

impl TaggingPipeline {
    pub fn new(
        store: Arc<RecordStore>,
        engine: EncryptionEngine,
        media: Arc<dyn MediaAnalyzer>,
        pacer: Arc<dyn Pacer>,
    ) -> Self {
        Self {
            store,
            engine,
            media,
            pacer,
        }
    }

    /// Tag one item and persist the result
    pub fn tag_item(
        &self,
        item: &MediaItem,
        vision: &dyn VisionAnalyzer,
        prompt: &str,
    ) -> VaultResult<MediaItem> {
        self.tag_inner(item, vision, prompt)
            .map_err(|e| VaultError::tag(item.id.clone(), e))
    }

    fn tag_inner(
        &self,
        item: &MediaItem,
        vision: &dyn VisionAnalyzer,
        prompt: &str,
    ) -> VaultResult<MediaItem> {
        let payload = self.engine.decrypt_buffer(item.file())?;
        let image = self
            .media
            .prepare_for_vision(&payload, item.media_type, &item.mime_type)?;
        drop(payload);

        let response = vision.analyze(&image, prompt)?;
        let tags = extract_tags(&response);

        // The snapshot may be stale by now; only the tag fields are ours to write
        let mut tagged = self.store.require::<MediaItem>(&item.id)?;
        tagged.apply_tags(tags, prompt, vision.model(), &response);
        self.store.update(&tagged)?;

        log::debug!("Tagged {} with {} tags", tagged.id, tagged.ai_tags().len());
        Ok(tagged)
    }

    /// Tag items one after another, paced between calls to the vision endpoint
    pub fn batch_tag(
        &self,
        items: Vec<MediaItem>,
        vision: &dyn VisionAnalyzer,
        prompt: &str,
        cancel: &CancelToken,
        on_progress: &mut dyn FnMut(&BatchProgress),
    ) -> BatchReport<MediaItem> {
        let report = run_sequential(
            items,
            |item| item.id.clone(),
            self.pacer.as_ref(),
            cancel,
            on_progress,
            |item| self.tag_item(&item, vision, prompt),
        );

        log::info!(
            "Tag batch done: {} tagged, {} failed{}",
            report.success_count(),
            report.failure_count(),
            if report.cancelled { " (cancelled)" } else { "" }
        );
        report
    }

    /// Re-run `batch_tag` over exactly the items that failed in `report`.
    /// Items deleted since are skipped.
    pub fn retry_failed(
        &self,
        report: &BatchReport<MediaItem>,
        vision: &dyn VisionAnalyzer,
        prompt: &str,
        cancel: &CancelToken,
        on_progress: &mut dyn FnMut(&BatchProgress),
    ) -> VaultResult<BatchReport<MediaItem>> {
        let mut items = Vec::new();
        for id in report.failed_labels() {
            match self.store.get::<MediaItem>(&id)? {
                Some(item) => items.push(item),
                None => log::warn!("Skipping retry of deleted item {}", id),
            }
        }

        Ok(self.batch_tag(items, vision, prompt, cancel, on_progress))
    }

    /// Items without AI tags, oldest first, optionally limited to one category
    pub fn get_untagged(&self, category_id: Option<&str>) -> VaultResult<Vec<MediaItem>> {
        let items = match category_id {
            Some(id) => self.store.get_by_index::<MediaItem>("categoryId", id)?,
            None => self.store.get_all::<MediaItem>()?,
        };

        let mut untagged: Vec<MediaItem> = items.into_iter().filter(|i| !i.is_tagged()).collect();
        untagged.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(untagged)
    }

    /// Case-insensitive substring search over tags and raw AI answers.
    /// A blank query matches nothing.
    pub fn search_by_tags(&self, query: &str) -> VaultResult<Vec<MediaItem>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<MediaItem> = self
            .store
            .get_all::<MediaItem>()?
            .into_iter()
            .filter(|item| item.matches_lowercase(&needle))
            .collect();
        hits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(hits)
    }

    /// `get_untagged` followed by `batch_tag`
    pub fn tag_untagged(
        &self,
        category_id: Option<&str>,
        vision: &dyn VisionAnalyzer,
        prompt: &str,
        cancel: &CancelToken,
        on_progress: &mut dyn FnMut(&BatchProgress),
    ) -> VaultResult<BatchReport<MediaItem>> {
        let items = self.get_untagged(category_id)?;
        Ok(self.batch_tag(items, vision, prompt, cancel, on_progress))
    }
}
