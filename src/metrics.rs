//! Per-run counters and the final run report.

use crate::documents::LoadFailure;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counters updated while a run is in progress.
///
/// One instance per run; concurrent batches and reviews update it without locks.
#[derive(Debug, Default)]
pub struct RunMetrics {
    /// Strings sent for translation
    units: AtomicUsize,

    /// Batches translated successfully
    batches: AtomicUsize,

    /// Translations that passed review unchanged
    reviews_accepted: AtomicUsize,

    /// Translations replaced by a corrected version
    reviews_corrected: AtomicUsize,

    /// Reviews that failed and kept the original translation
    reviews_failed: AtomicUsize,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_units(&self, count: usize) {
        self.units.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_batch(&self) {
        self.batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_review_accepted(&self) {
        self.reviews_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_review_corrected(&self) {
        self.reviews_corrected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_review_failed(&self) {
        self.reviews_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn units(&self) -> usize {
        self.units.load(Ordering::Relaxed)
    }

    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::Relaxed)
    }

    pub fn reviews_accepted(&self) -> usize {
        self.reviews_accepted.load(Ordering::Relaxed)
    }

    pub fn reviews_corrected(&self) -> usize {
        self.reviews_corrected.load(Ordering::Relaxed)
    }

    pub fn reviews_failed(&self) -> usize {
        self.reviews_failed.load(Ordering::Relaxed)
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub files_written: Vec<PathBuf>,
    pub files_skipped: Vec<SkippedFile>,
    pub units: usize,
    pub batches: usize,
    pub reviews_accepted: usize,
    pub reviews_corrected: usize,
    pub reviews_failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

impl From<LoadFailure> for SkippedFile {
    fn from(failure: LoadFailure) -> Self {
        Self {
            path: failure.path,
            reason: failure.reason,
        }
    }
}

impl RunReport {
    pub fn new(metrics: &RunMetrics, files_written: Vec<PathBuf>, skipped: Vec<LoadFailure>) -> Self {
        Self {
            files_written,
            files_skipped: skipped.into_iter().map(SkippedFile::from).collect(),
            units: metrics.units(),
            batches: metrics.batches(),
            reviews_accepted: metrics.reviews_accepted(),
            reviews_corrected: metrics.reviews_corrected(),
            reviews_failed: metrics.reviews_failed(),
        }
    }

    /// Units that went through the review pass, whatever the outcome
    pub fn reviewed(&self) -> usize {
        self.reviews_accepted + self.reviews_corrected + self.reviews_failed
    }
}
