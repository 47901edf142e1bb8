//! Progress-callback trait for site-build events.
//!
//! Inject an [`Arc<dyn BuildProgressCallback>`] via
//! [`crate::config::BuildConfigBuilder::progress_callback`] to receive an
//! event as each job of a manifest starts, finishes, or fails.
//!
//! # Example
//!
//! ```rust
//! use mdpress::{BuildConfig, BuildProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct SkipCounter {
//!     skipped: AtomicUsize,
//! }
//!
//! impl BuildProgressCallback for SkipCounter {
//!     fn on_job_complete(&self, _index: usize, _total: usize, _label: &str, skipped: bool) {
//!         if skipped {
//!             self.skipped.fetch_add(1, Ordering::SeqCst);
//!         }
//!     }
//! }
//!
//! let counter = Arc::new(SkipCounter { skipped: AtomicUsize::new(0) });
//!
//! let config = BuildConfig::builder()
//!     .progress_callback(counter as Arc<dyn BuildProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by [`crate::site::build_site`] as it works through a manifest.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Jobs run one after another, but the trait is
/// `Send + Sync` so a callback can be shared with other tasks.
pub trait BuildProgressCallback: Send + Sync {
    /// Called once before the first job.
    fn on_build_start(&self, total_jobs: usize) {
        let _ = total_jobs;
    }

    /// Called just before a job runs.
    ///
    /// # Arguments
    /// * `index`: 1-indexed job number
    /// * `total`: number of jobs in the manifest
    /// * `label`: short description, e.g. `compile README.md → pdf`
    fn on_job_start(&self, index: usize, total: usize, label: &str) {
        let _ = (index, total, label);
    }

    /// Called when a job succeeds. `skipped` is true when the cache
    /// reported the output up to date and no conversion ran.
    fn on_job_complete(&self, index: usize, total: usize, label: &str, skipped: bool) {
        let _ = (index, total, label, skipped);
    }

    /// Called when a job fails. The build carries on with the next job.
    fn on_job_error(&self, index: usize, total: usize, label: &str, error: &str) {
        let _ = (index, total, label, error);
    }

    /// Called once after every job has been attempted.
    fn on_build_complete(&self, total_jobs: usize, failed_jobs: usize) {
        let _ = (total_jobs, failed_jobs);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BuildProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::BuildConfig`].
pub type ProgressCallback = Arc<dyn BuildProgressCallback>;
