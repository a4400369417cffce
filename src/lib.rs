//! # snap2md
//!
//! Convert a tree of locally-saved web page snapshots (HTML + sibling
//! `_files` folders) into clean Markdown with a single, deduplicated,
//! content-addressed image asset store.
//!
//! ## Why this crate?
//!
//! Browsers saving "complete web pages" scatter each page's images into a
//! sibling `<name>_files` folder, duplicating every shared logo and figure
//! across snapshots. Mechanical HTML-to-Markdown converters then trip over
//! script soup, navigation chrome, and percent-encoded resource paths.
//! This crate pairs every snapshot with its resources, strips the noise,
//! delegates the semantic conversion to an LLM, and reconciles all images
//! into one `assets/` folder keyed by content hash — so ten documents
//! embedding the same diagram share one file on disk.
//!
//! ## Pipeline Overview
//!
//! ```text
//! input tree
//!  │
//!  ├─ 1. Scan     pair <name>.html with <name>_files, mirror output paths
//!  ├─ 2. Clean    strip scripts/chrome/attributes from the DOM (no I/O)
//!  ├─ 3. Convert  concurrent LLM calls (OpenAI-compatible, e.g. DeepSeek)
//!  ├─ 4. Polish   deterministic Markdown cleanup (fences, whitespace)
//!  ├─ 5. Rewrite  dedupe images by SHA-256, fix relative paths per depth
//!  └─ 6. Write    atomic persist to the mirrored .md tree
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use snap2md::{run, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key auto-detected from DEEPSEEK_API_KEY / OPENAI_API_KEY
//!     let config = ConversionConfig::builder("data/input", "data/output")
//!         .max_workers(8)
//!         .build()?;
//!     let output = run(&config).await?;
//!     eprintln!(
//!         "{}/{} documents converted, {} assets stored",
//!         output.stats.succeeded, output.stats.total_documents, output.stats.assets_stored
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `snap2md` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! snap2md = { version = "0.3", default-features = false }
//! ```
//!
//! ## Guarantees
//!
//! * At most one stored copy per distinct image content, no matter how many
//!   documents reference it or how many workers race on it.
//! * A failure in one document never aborts another; the run always
//!   completes a full pass and reports per-document outcomes.
//! * Output files appear atomically — a crash never leaves a truncated
//!   `.md` at its final path.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod assets;
pub mod config;
pub mod dom;
pub mod error;
pub mod llm;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod run;
pub mod scanner;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use assets::{AssetRecord, AssetStore};
pub use config::{ConversionConfig, ConversionConfigBuilder};
pub use error::{JobError, Snap2MdError, Stage};
pub use llm::{ConvertError, HtmlConverter, OpenAiChatClient};
pub use output::{AssetWarning, JobResult, RunOutput, RunStats};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use run::{run, run_with_cancel};
pub use scanner::{scan, Document};
