//! Progress-callback trait for per-document conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! real-time events as the pipeline processes each document.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward events to a channel, a database record, or a terminal progress bar
//! without the library knowing how the host application communicates. The
//! trait is `Send + Sync` so it works correctly when documents are processed
//! concurrently.

use std::path::Path;
use std::sync::Arc;

/// Called by the run orchestrator as it processes each document.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `on_document_*` methods may be called concurrently
/// from different worker tasks; implementations must protect shared mutable
/// state with the usual synchronisation primitives.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once after scanning, before any document is converted.
    fn on_run_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called when a worker picks up a document.
    fn on_document_start(&self, source: &Path, total_documents: usize) {
        let _ = (source, total_documents);
    }

    /// Called when a document has been written successfully.
    ///
    /// `rewritten_refs` is the number of image references redirected into
    /// the shared asset store for this document.
    fn on_document_complete(&self, source: &Path, total_documents: usize, rewritten_refs: usize) {
        let _ = (source, total_documents, rewritten_refs);
    }

    /// Called when a document fails terminally.
    fn on_document_error(&self, source: &Path, total_documents: usize, error: &str) {
        let _ = (source, total_documents, error);
    }

    /// Called once after all documents have been attempted.
    fn on_run_complete(&self, total_documents: usize, success_count: usize) {
        let _ = (total_documents, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
