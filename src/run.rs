//! The conversion orchestrator: drive every document through the full
//! pipeline on a bounded worker pool.
//!
//! Documents are fully independent units of work. The pool imposes no
//! ordering between them; the only cross-document coupling is the shared
//! [`AssetStore`]. A failure inside one document's pipeline is captured in
//! its [`JobResult`] and never aborts another document — the run always
//! completes a full pass over everything the scanner found.
//!
//! ## Pool shape
//!
//! `futures::stream::iter(..).buffer_unordered(max_workers)`: each worker
//! slot executes one document's pipeline to completion before taking the
//! next. The workload is network-bound (the LLM call dominates), so
//! `max_workers` is sized against the provider's rate limit, not CPU cores.
//!
//! ## Cancellation
//!
//! `run_with_cancel` takes an `AtomicBool` flag (the CLI flips it on
//! Ctrl-C). Workers check it between stages: a cancelled document finishes
//! the stage it is in and records [`JobError::Cancelled`]. The atomic
//! rename in the writer guarantees no partially-written Markdown either
//! way.

use crate::assets::AssetStore;
use crate::config::ConversionConfig;
use crate::error::{JobError, Snap2MdError, Stage};
use crate::llm::{HtmlConverter, OpenAiChatClient};
use crate::output::{AssetWarning, JobResult, RunOutput, RunStats};
use crate::pipeline::{clean, convert, postprocess, rewrite, write};
use crate::scanner::{self, Document};
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Run the full pipeline once: scan, convert everything, report.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// Returns `Err(Snap2MdError)` only for fatal, run-level problems (missing
/// input root, no converter configured, asset directory not creatable).
/// Per-document failures land in the returned [`RunOutput`] instead.
pub async fn run(config: &ConversionConfig) -> Result<RunOutput, Snap2MdError> {
    run_with_cancel(config, Arc::new(AtomicBool::new(false))).await
}

/// Like [`run`], with a cancellation flag checked between pipeline stages.
pub async fn run_with_cancel(
    config: &ConversionConfig,
    cancel: Arc<AtomicBool>,
) -> Result<RunOutput, Snap2MdError> {
    let total_start = Instant::now();
    info!(
        "starting run: {} -> {}",
        config.input_root.display(),
        config.output_root.display()
    );

    // ── Step 1: Discover documents ───────────────────────────────────────
    let documents = scanner::scan(&config.input_root, &config.output_root)?;
    let total = documents.len();
    if total == 0 {
        warn!("no HTML documents found under {}", config.input_root.display());
        if let Some(ref cb) = config.progress_callback {
            cb.on_run_start(0);
            cb.on_run_complete(0, 0);
        }
        return Ok(RunOutput {
            results: Vec::new(),
            stats: RunStats {
                total_duration_ms: total_start.elapsed().as_millis() as u64,
                ..Default::default()
            },
        });
    }

    // ── Step 2: Resolve the converter ────────────────────────────────────
    let converter = resolve_converter(config)?;

    // ── Step 3: Open the shared asset store ──────────────────────────────
    let asset_dir = config.output_root.join(&config.asset_dir_name);
    let store = Arc::new(AssetStore::open(&asset_dir).map_err(|e| {
        Snap2MdError::AssetDirCreateFailed {
            path: asset_dir.clone(),
            source: e,
        }
    })?);

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total);
    }
    info!("converting {} document(s) with {} worker(s)", total, config.max_workers);

    // ── Step 4: Fan out over the worker pool ─────────────────────────────
    let results: Vec<JobResult> = stream::iter(documents.into_iter().map(|doc| {
        let converter = Arc::clone(&converter);
        let store = Arc::clone(&store);
        let cancel = Arc::clone(&cancel);
        let config = config.clone();
        async move {
            let source = doc.source_path.clone();
            if let Some(ref cb) = config.progress_callback {
                cb.on_document_start(&source, total);
            }
            let result = process_document(doc, &converter, &store, &config, &cancel).await;
            if let Some(ref cb) = config.progress_callback {
                match &result.error {
                    None => cb.on_document_complete(&source, total, result.rewritten_refs),
                    Some(e) => cb.on_document_error(&source, total, &e.to_string()),
                }
            }
            result
        }
    }))
    .buffer_unordered(config.max_workers)
    .collect()
    .await;

    // ── Step 5: Aggregate ────────────────────────────────────────────────
    let succeeded = results.iter().filter(|r| r.is_success()).count();
    let failed = results.len() - succeeded;
    let stats = RunStats {
        total_documents: total,
        succeeded,
        failed,
        assets_stored: store.len().await,
        refs_rewritten: results.iter().map(|r| r.rewritten_refs).sum(),
        total_warnings: results.iter().map(|r| r.warnings.len()).sum(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "run complete: {}/{} succeeded, {} asset(s) stored, {}ms",
        succeeded, total, stats.assets_stored, stats.total_duration_ms
    );
    for r in results.iter().filter(|r| !r.is_success()) {
        warn!(
            "failed [{}]: {} — {}",
            r.stage,
            r.source_path.display(),
            r.error.as_ref().map(|e| e.to_string()).unwrap_or_default()
        );
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(total, succeeded);
    }

    Ok(RunOutput { results, stats })
}

/// One document's full trip: read → clean → convert → rewrite → write.
///
/// Always returns a `JobResult` — never propagates an error upward, so a
/// single bad snapshot cannot abort the run.
async fn process_document(
    doc: Document,
    converter: &Arc<dyn HtmlConverter>,
    store: &AssetStore,
    config: &ConversionConfig,
    cancel: &AtomicBool,
) -> JobResult {
    let start = Instant::now();
    let label = doc.relative_path.display().to_string();

    let fail = |stage: Stage, error: JobError, retries: u32, start: Instant| JobResult {
        source_path: doc.source_path.clone(),
        output_path: doc.output_md_path.clone(),
        stage,
        error: Some(error),
        warnings: Vec::new(),
        rewritten_refs: 0,
        retries,
        duration_ms: start.elapsed().as_millis() as u64,
    };

    if cancel.load(Ordering::SeqCst) {
        return fail(Stage::Scanned, JobError::Cancelled, 0, start);
    }

    // ── Read ─────────────────────────────────────────────────────────────
    let raw_bytes = match tokio::fs::read(&doc.source_path).await {
        Ok(b) => b,
        Err(e) => return fail(Stage::Scanned, JobError::Read { detail: e.to_string() }, 0, start),
    };
    // Snapshots are occasionally saved in legacy encodings; a lossy decode
    // degrades those characters rather than failing the document.
    let raw_html = String::from_utf8_lossy(&raw_bytes).into_owned();

    // ── Clean (and harvest image refs) ───────────────────────────────────
    // The Rc-based DOM is not Send, so the whole parse→clean→serialize
    // round-trip runs inside one blocking scope.
    let cleaned = tokio::task::spawn_blocking(move || {
        let dom = crate::dom::Dom::parse(&raw_html);
        clean::clean(&dom);
        let refs = dom.image_refs();
        dom.serialize().map(|html| (html, refs))
    })
    .await;
    let (cleaned_html, raw_refs) = match cleaned {
        Ok(Ok(pair)) => pair,
        Ok(Err(e)) => {
            return fail(Stage::Cleaned, JobError::Clean { detail: e.to_string() }, 0, start)
        }
        Err(join_err) => {
            return fail(
                Stage::Cleaned,
                JobError::Clean { detail: format!("clean task panicked: {join_err}") },
                0,
                start,
            )
        }
    };

    if cancel.load(Ordering::SeqCst) {
        return fail(Stage::Cleaned, JobError::Cancelled, 0, start);
    }

    // ── Convert ──────────────────────────────────────────────────────────
    let outcome = match convert::convert_html(converter, &label, &cleaned_html, config).await {
        Ok(o) => o,
        Err(e) => {
            let retries = match &e {
                JobError::Convert { retries, .. } | JobError::Timeout { retries, .. } => *retries,
                _ => 0,
            };
            return fail(Stage::Converted, e, retries, start);
        }
    };
    let markdown = postprocess::clean_markdown(&outcome.markdown);

    // ── Rewrite asset references ─────────────────────────────────────────
    let resolved = rewrite::resolve_refs(&doc, &raw_refs, store, &config.asset_dir_name).await;
    let (rewritten, missing) = rewrite::rewrite_markdown(&markdown, &resolved.mapping);
    let rewritten_refs = resolved.mapping.len() - missing.len();

    let mut warnings = resolved.warnings;
    warnings.extend(
        missing
            .into_iter()
            .map(|raw_ref| AssetWarning::UnreferencedMapping { raw_ref }),
    );

    if cancel.load(Ordering::SeqCst) {
        return fail(Stage::Rewritten, JobError::Cancelled, outcome.retries, start);
    }

    // ── Write ────────────────────────────────────────────────────────────
    if let Err(e) = write::write_markdown(&doc.output_md_path, &rewritten).await {
        return fail(Stage::Written, e, outcome.retries, start);
    }

    JobResult {
        source_path: doc.source_path,
        output_path: doc.output_md_path,
        stage: Stage::Written,
        error: None,
        warnings,
        rewritten_refs,
        retries: outcome.retries,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

/// Resolve the converter, from most-specific to least-specific.
///
/// 1. **Pre-built converter** (`config.converter`) — the caller constructed
///    it entirely; used as-is. This is how tests inject mocks.
/// 2. **Config fields + API key** — `api_key` from the config, else the
///    `DEEPSEEK_API_KEY` / `OPENAI_API_KEY` environment variables.
fn resolve_converter(config: &ConversionConfig) -> Result<Arc<dyn HtmlConverter>, Snap2MdError> {
    if let Some(ref converter) = config.converter {
        return Ok(Arc::clone(converter));
    }

    let api_key = config
        .api_key
        .clone()
        .or_else(|| std::env::var("DEEPSEEK_API_KEY").ok().filter(|k| !k.is_empty()))
        .or_else(|| std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()))
        .ok_or_else(|| Snap2MdError::ConverterNotConfigured {
            hint: "Set DEEPSEEK_API_KEY (or OPENAI_API_KEY), pass --api-key, or inject a converter."
                .to_string(),
        })?;

    let mut client = OpenAiChatClient::new(api_key)
        .with_api_base(config.api_base.clone())
        .with_model(config.model.clone())
        .with_temperature(config.temperature)
        .with_max_tokens(config.max_tokens);
    if let Some(ref prompt) = config.system_prompt {
        client = client.with_system_prompt(prompt.clone());
    }
    Ok(Arc::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injected_converter_wins() {
        use crate::llm::ConvertError;
        use async_trait::async_trait;

        struct Stub;
        #[async_trait]
        impl HtmlConverter for Stub {
            async fn convert(&self, _html: &str) -> Result<String, ConvertError> {
                Ok("stub".into())
            }
        }

        let config = ConversionConfig::builder("in", "out")
            .converter(Arc::new(Stub))
            .build()
            .unwrap();
        assert!(resolve_converter(&config).is_ok());
    }

    #[test]
    fn explicit_api_key_configures_client() {
        let config = ConversionConfig::builder("in", "out")
            .api_key("sk-test")
            .build()
            .unwrap();
        assert!(resolve_converter(&config).is_ok());
    }
}
