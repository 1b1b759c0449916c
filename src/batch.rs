//! ALFA Media Vault - Batch Orchestration
//!
//! Sequential per-item work loop with pluggable pacing and cooperative
//! cancellation. One item's failure is recorded and the loop moves on.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{VaultError, VaultResult};

// ═══════════════════════════════════════════════════════════════════════════
// PACING
// ═══════════════════════════════════════════════════════════════════════════

/// Pacing policy applied between two consecutive items
pub trait Pacer: Send + Sync {
    fn pause(&self);
}

/// No pause at all
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl Pacer for NoDelay {
    fn pause(&self) {}
}

/// Fixed sleep between items
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl Pacer for FixedDelay {
    fn pause(&self) {
        if !self.0.is_zero() {
            std::thread::sleep(self.0);
        }
    }
}

/// `FixedDelay` for a non-zero delay, `NoDelay` otherwise
pub fn pacer_for(delay: Duration) -> Arc<dyn Pacer> {
    if delay.is_zero() {
        Arc::new(NoDelay)
    } else {
        Arc::new(FixedDelay(delay))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// CANCELLATION
// ═══════════════════════════════════════════════════════════════════════════

/// Shared cancellation flag, checked between items
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// REPORTS
// ═══════════════════════════════════════════════════════════════════════════

/// Progress after each processed item
#[derive(Debug, Clone)]
pub struct BatchProgress {
    pub done: usize,
    pub total: usize,
    pub label: String,
    pub succeeded: bool,
}

/// Outcome for one item
#[derive(Debug)]
pub struct BatchEntry<T> {
    /// File name for imports, item id for tagging
    pub label: String,
    pub result: VaultResult<T>,
}

impl<T> BatchEntry<T> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-item outcomes of a batch, in processing order
#[derive(Debug)]
pub struct BatchReport<T> {
    pub entries: Vec<BatchEntry<T>>,
    /// Stopped early by a cancel request
    pub cancelled: bool,
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            cancelled: false,
        }
    }
}

impl<T> BatchReport<T> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn success_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.entries.len() - self.success_count()
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().filter_map(|e| e.result.as_ref().ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &VaultError)> {
        self.entries
            .iter()
            .filter_map(|e| e.result.as_ref().err().map(|err| (e.label.as_str(), err)))
    }

    pub fn failed_labels(&self) -> Vec<String> {
        self.failed().map(|(label, _)| label.to_string()).collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// RUNNER
// ═══════════════════════════════════════════════════════════════════════════

/// Process `items` one at a time. `pacer` runs between items, `cancel` is
/// checked on both sides of each pause, `on_progress` after each item.
pub fn run_sequential<I, T>(
    items: Vec<I>,
    label: impl Fn(&I) -> String,
    pacer: &dyn Pacer,
    cancel: &CancelToken,
    on_progress: &mut dyn FnMut(&BatchProgress),
    mut work: impl FnMut(I) -> VaultResult<T>,
) -> BatchReport<T> {
    let total = items.len();
    let mut report = BatchReport::default();

    for (index, item) in items.into_iter().enumerate() {
        if index > 0 && !cancel.is_cancelled() {
            pacer.pause();
        }
        if cancel.is_cancelled() {
            log::info!("Batch cancelled after {} of {} items", index, total);
            report.cancelled = true;
            break;
        }

        let label = label(&item);
        let result = work(item);
        if let Err(e) = &result {
            log::warn!("Batch item {} failed: {}", label, e);
        }

        on_progress(&BatchProgress {
            done: index + 1,
            total,
            label: label.clone(),
            succeeded: result.is_ok(),
        });
        report.entries.push(BatchEntry { label, result });
    }

    report
}
