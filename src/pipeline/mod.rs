//! Pipeline stages for snapshot-to-Markdown conversion.
//!
//! Each submodule implements exactly one transformation step. Keeping stages
//! separate makes each independently testable and lets us swap
//! implementations without touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! scan ──▶ clean ──▶ convert ──▶ postprocess ──▶ rewrite ──▶ write
//! (pair)  (DOM diet)  (LLM)      (cleanup)     (asset paths) (atomic)
//! ```
//!
//! 1. [`clean`]       — strip structurally noisy markup from the DOM; runs in
//!    `spawn_blocking` because the `Rc`-based DOM is not `Send`
//! 2. [`convert`]     — drive the external converter with timeout, retry, and
//!    backoff; the only stage with network I/O
//! 3. [`postprocess`] — deterministic text cleanup of LLM quirks (fences,
//!    line endings, blank-line runs)
//! 4. [`rewrite`]     — resolve local image references through the shared
//!    asset store and substitute output-relative paths
//! 5. [`write`]       — persist atomically (temp file + rename)

pub mod clean;
pub mod convert;
pub mod postprocess;
pub mod rewrite;
pub mod write;
