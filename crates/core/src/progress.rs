//! Progress math: per-stage weight table, stage-scaled percentages, and
//! the counter-based completion tracker for task batches.
//!
//! The displayed generation percentage is a weighted blend of stage
//! percentages. Stage boundaries are hard floors; the monotonic max rule
//! in [`crate::generation::Generation::progress`] guarantees a stale or
//! lower update never lowers what the user sees.

use std::sync::atomic::{AtomicUsize, Ordering};

// ---------------------------------------------------------------------------
// Stage weight table
// ---------------------------------------------------------------------------

/// Generation record created.
pub const PROGRESS_INIT: f64 = 5.0;
/// Download batch dispatched.
pub const PROGRESS_DOWNLOAD_START: f64 = 10.0;
/// Translated images staged.
pub const PROGRESS_TRANSLATED: f64 = 15.0;
/// Enumeration/combination stage entered (after the download batch settles).
pub const PROGRESS_COMBINE: f64 = 30.0;
/// Merge batch dispatched.
pub const PROGRESS_MERGE_START: f64 = 40.0;
/// Everything settled.
pub const PROGRESS_DONE: f64 = 100.0;

/// Download stage occupies [10, 85] of the overall percentage.
const DOWNLOAD_BASE: f64 = 10.0;
const DOWNLOAD_SPAN: f64 = 75.0;

/// Merge stage occupies [40, 100] of the overall percentage.
const MERGE_BASE: f64 = 40.0;
const MERGE_SPAN: f64 = 60.0;

/// Overall percentage while the download batch is at `batch_percent`.
pub fn download_stage_percent(batch_percent: f64) -> f64 {
    DOWNLOAD_BASE + DOWNLOAD_SPAN * (batch_percent.clamp(0.0, 100.0) / 100.0)
}

/// Overall percentage while the merge batch is at `batch_percent`.
pub fn merge_stage_percent(batch_percent: f64) -> f64 {
    MERGE_BASE + MERGE_SPAN * (batch_percent.clamp(0.0, 100.0) / 100.0)
}

// ---------------------------------------------------------------------------
// BatchProgress
// ---------------------------------------------------------------------------

/// Atomic completion tracker for one batch of independently scheduled
/// tasks running under an allow-failures policy.
///
/// `percent()` counts both successes and allowed failures as settled, so
/// it reaches 100 exactly when every task has reported, regardless of
/// outcome or ordering.
#[derive(Debug)]
pub struct BatchProgress {
    total: usize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
}

impl BatchProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            succeeded: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Number of tasks that have reported, successful or not.
    pub fn settled(&self) -> usize {
        self.succeeded() + self.failed()
    }

    pub fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    /// Fraction of settled tasks in [0, 100].
    ///
    /// An empty batch is trivially settled and reports 100.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.settled() as f64 / self.total as f64 * 100.0).min(100.0)
    }

    pub fn is_settled(&self) -> bool {
        self.settled() >= self.total
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_stage_bounds() {
        assert!((download_stage_percent(0.0) - 10.0).abs() < f64::EPSILON);
        assert!((download_stage_percent(100.0) - 85.0).abs() < f64::EPSILON);
        assert!((download_stage_percent(50.0) - 47.5).abs() < f64::EPSILON);
    }

    #[test]
    fn merge_stage_bounds() {
        assert!((merge_stage_percent(0.0) - 40.0).abs() < f64::EPSILON);
        assert!((merge_stage_percent(100.0) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn stage_percent_clamps_out_of_range_input() {
        assert!((download_stage_percent(150.0) - 85.0).abs() < f64::EPSILON);
        assert!((merge_stage_percent(-10.0) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn batch_percent_counts_failures_as_settled() {
        let progress = BatchProgress::new(4);
        progress.record_success();
        progress.record_failure();
        assert!((progress.percent() - 50.0).abs() < f64::EPSILON);
        assert!(!progress.is_settled());
    }

    #[test]
    fn batch_percent_monotone_and_reaches_100_only_when_all_settled() {
        let progress = BatchProgress::new(3);
        let mut last = progress.percent();
        for i in 0..3 {
            if i % 2 == 0 {
                progress.record_success();
            } else {
                progress.record_failure();
            }
            let now = progress.percent();
            assert!(now >= last);
            last = now;
            if i < 2 {
                assert!(now < 100.0);
            }
        }
        assert!((last - 100.0).abs() < f64::EPSILON);
        assert!(progress.is_settled());
    }

    #[test]
    fn empty_batch_is_settled_at_100() {
        let progress = BatchProgress::new(0);
        assert!((progress.percent() - 100.0).abs() < f64::EPSILON);
        assert!(progress.is_settled());
    }
}
