//! Error types for the snap2md library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Snap2MdError`] — **Fatal**: the run cannot proceed at all (missing
//!   input directory, no converter configured, asset directory cannot be
//!   created). Returned as `Err(Snap2MdError)` from [`crate::run::run`].
//!
//! * [`JobError`] — **Non-fatal**: a single document failed (unreadable
//!   HTML, LLM failure after retries, write error) but all other documents
//!   are fine. Stored inside [`crate::output::JobResult`] so callers can
//!   inspect partial success rather than losing the whole run to one bad
//!   page snapshot.
//!
//! Unreadable *assets* are softer still: they never fail a document and are
//! reported as [`crate::output::AssetWarning`]s on an otherwise successful
//! result.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the snap2md library.
///
/// Document-level failures use [`JobError`] and are stored in
/// [`crate::output::JobResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Snap2MdError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The input root directory was not found.
    #[error("input directory not found: '{path}'\nCheck the path exists and is readable.")]
    InputRootNotFound { path: PathBuf },

    /// The input root exists but is not a directory.
    #[error("input path '{path}' is not a directory")]
    InputRootNotADirectory { path: PathBuf },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The shared asset directory could not be created.
    #[error("failed to create asset directory '{path}': {source}")]
    AssetDirCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// No converter was injected and no API key could be found.
    #[error("no HTML converter configured.\n{hint}")]
    ConverterNotConfigured { hint: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// The stages a document passes through on its way to disk.
///
/// A successful job reaches [`Stage::Written`]; a failed job records the
/// stage it was attempting when its [`JobError`] occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// Document accepted by the orchestrator.
    Scanned,
    /// Noise-stripped DOM produced.
    Cleaned,
    /// The external converter returned Markdown.
    Converted,
    /// Local image references replaced with asset-store paths.
    Rewritten,
    /// Markdown persisted to its output path.
    Written,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Scanned => "scanned",
            Stage::Cleaned => "cleaned",
            Stage::Converted => "converted",
            Stage::Rewritten => "rewritten",
            Stage::Written => "written",
        };
        f.write_str(s)
    }
}

/// A non-fatal error for a single document.
///
/// Stored in [`crate::output::JobResult`] when a document fails. The overall
/// run continues regardless of how many documents fail.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum JobError {
    /// The source HTML file could not be read.
    #[error("failed to read source HTML: {detail}")]
    Read { detail: String },

    /// DOM parsing or serialisation failed.
    #[error("failed to clean HTML: {detail}")]
    Clean { detail: String },

    /// The external converter failed after all retries.
    #[error("conversion failed after {retries} retries: {detail}")]
    Convert { retries: u32, detail: String },

    /// Every attempt against the external converter timed out.
    #[error("conversion timed out after {retries} retries ({secs}s per call)")]
    Timeout { retries: u32, secs: u64 },

    /// The run was cancelled before this document finished.
    #[error("run cancelled")]
    Cancelled,

    /// The output Markdown could not be persisted.
    #[error("failed to write '{path}': {detail}")]
    Write { path: PathBuf, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_display_is_lowercase() {
        assert_eq!(Stage::Scanned.to_string(), "scanned");
        assert_eq!(Stage::Written.to_string(), "written");
    }

    #[test]
    fn convert_error_display() {
        let e = JobError::Convert {
            retries: 3,
            detail: "HTTP 500".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("3 retries"), "got: {msg}");
        assert!(msg.contains("HTTP 500"));
    }

    #[test]
    fn timeout_error_display() {
        let e = JobError::Timeout {
            retries: 2,
            secs: 120,
        };
        assert!(e.to_string().contains("120s"));
    }

    #[test]
    fn write_error_display_includes_path() {
        let e = JobError::Write {
            path: PathBuf::from("/out/a/b.md"),
            detail: "disk full".into(),
        };
        assert!(e.to_string().contains("/out/a/b.md"));
        assert!(e.to_string().contains("disk full"));
    }
}
