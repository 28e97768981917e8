//! Progress reporting trait for incident folding.
//!
//! Decouples progress reporting from any rendering backend so the
//! aggregation engine can be driven by an `indicatif` bar in the binary and
//! by [`NullProgress`] in library callers and tests.

use std::sync::Arc;

/// Trait for reporting progress from long-running operations.
///
/// Implementations must be `Send + Sync` so one reporter can be shared by
/// shard threads.
pub trait ProgressCallback: Send + Sync {
    /// Set the total expected units of work (enables percentage/ETA).
    fn set_total(&self, total: u64);

    /// Advance progress by `delta` units.
    fn inc(&self, delta: u64);

    /// Mark progress as complete with a final message.
    fn finish(&self, msg: String);
}

/// A no-op [`ProgressCallback`].
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`] instance for convenient use.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
