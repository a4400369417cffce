//! Result types: per-document outcomes and run-level aggregates.
//!
//! Everything here is serde-serialisable so the CLI's `--json` mode can dump
//! the full run report for scripting.

use crate::error::{JobError, Stage};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// A non-fatal, per-reference problem on an otherwise successful document.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum AssetWarning {
    /// A local image reference could not be read; it was left unrewritten.
    #[error("could not read asset '{raw_ref}': {detail}")]
    UnreadableAsset { raw_ref: String, detail: String },

    /// The converter did not echo this reference into its Markdown, so the
    /// rewrite could not be applied. The asset was still stored.
    #[error("converter omitted image reference '{raw_ref}' from its output")]
    UnreferencedMapping { raw_ref: String },
}

/// The outcome of one document's trip through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    /// The source HTML file.
    pub source_path: PathBuf,
    /// Where the Markdown was (or would have been) written.
    pub output_path: PathBuf,
    /// The terminal stage: [`Stage::Written`] on success, otherwise the
    /// stage that was being attempted when `error` occurred.
    pub stage: Stage,
    /// The failure, if any.
    pub error: Option<JobError>,
    /// Per-reference warnings (unreadable assets, un-echoed references).
    pub warnings: Vec<AssetWarning>,
    /// Image references rewritten to asset-store paths.
    pub rewritten_refs: usize,
    /// Converter retries spent on this document.
    pub retries: u32,
    /// Wall-clock time for the whole pipeline, in milliseconds.
    pub duration_ms: u64,
}

impl JobResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate statistics for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Documents discovered by the scanner.
    pub total_documents: usize,
    /// Documents that reached [`Stage::Written`].
    pub succeeded: usize,
    /// Documents that ended in a failed state.
    pub failed: usize,
    /// Distinct assets stored (after deduplication).
    pub assets_stored: usize,
    /// Image references rewritten across all documents.
    pub refs_rewritten: usize,
    /// Warnings across all documents.
    pub total_warnings: usize,
    /// Wall-clock duration of the whole run, in milliseconds.
    pub total_duration_ms: u64,
}

/// Everything a completed run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutput {
    /// One entry per discovered document, in completion order.
    pub results: Vec<JobResult>,
    pub stats: RunStats,
}

impl RunOutput {
    /// True if any document failed — the CLI maps this to a nonzero exit.
    pub fn has_failures(&self) -> bool {
        self.stats.failed > 0
    }

    /// The failed results, for error reporting.
    pub fn failures(&self) -> impl Iterator<Item = &JobResult> {
        self.results.iter().filter(|r| !r.is_success())
    }
}
