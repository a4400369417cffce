//! CLI binary for snap2md.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig`, renders progress, and turns per-document failures
//! into a nonzero exit status.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use snap2md::{
    run_with_cancel, ConversionConfig, ConversionProgressCallback, ProgressCallback, RunOutput,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per document.
/// Documents complete out-of-order under concurrency; the bar only counts.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Bar length is set by `on_run_start` once the scan is done.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(spinner_style);
        bar.set_prefix("Scanning");
        bar.set_message("Walking input tree…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} docs  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total: usize) {
        self.activate_bar(total);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total} document(s)…"))
        ));
    }

    fn on_document_start(&self, source: &Path, _total: usize) {
        self.bar
            .set_message(display_name(source));
    }

    fn on_document_complete(&self, source: &Path, _total: usize, rewritten_refs: usize) {
        self.bar.println(format!(
            "  {} {:<48}  {}",
            green("✓"),
            display_name(source),
            dim(&format!("{rewritten_refs} image(s)")),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, source: &Path, _total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg = if error.len() > 80 {
            let mut end = 79;
            while !error.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}\u{2026}", &error[..end])
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {:<48}  {}",
            red("✗"),
            display_name(source),
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total: usize, success_count: usize) {
        let failed = total.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} document(s) converted successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} document(s) converted  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

fn display_name(source: &Path) -> String {
    source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.display().to_string())
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a tree of saved pages
  snap2md data/input data/output

  # More workers, explicit model
  snap2md -w 10 --model deepseek-chat data/input data/output

  # OpenAI endpoint instead of DeepSeek
  snap2md --api-base https://api.openai.com/v1 --model gpt-4.1-mini in/ out/

  # Custom system prompt, JSON run report
  snap2md --system-prompt prompt.txt --json in/ out/ > report.json

OUTPUT LAYOUT:
  The output mirrors the input tree one-to-one, substituting .md for .html.
  All images land deduplicated in <output>/assets/, named by content hash;
  every Markdown file references them relatively (../assets/<hash>.png).

ENVIRONMENT VARIABLES:
  DEEPSEEK_API_KEY     API key for the default DeepSeek endpoint
  OPENAI_API_KEY       Fallback API key (any OpenAI-compatible endpoint)
  SNAP2MD_MODEL        Override model ID
  SNAP2MD_API_BASE     Override endpoint base URL

EXIT STATUS:
  0  every discovered document converted and was written
  1  at least one document failed (see the per-document log lines)
"#;

/// Convert saved web-page snapshots to Markdown using an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "snap2md",
    version,
    about = "Convert saved web-page snapshots (HTML + _files folders) to Markdown",
    long_about = "Convert a tree of locally-saved web page snapshots into clean Markdown \
documents with a single deduplicated image asset store. The semantic HTML-to-Markdown \
transformation is delegated to an OpenAI-compatible LLM endpoint (DeepSeek by default).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input root directory containing .html snapshots.
    input: PathBuf,

    /// Output root directory for the mirrored .md tree.
    output: PathBuf,

    /// Number of documents converted concurrently.
    #[arg(short = 'w', long, env = "SNAP2MD_WORKERS", default_value_t = 5)]
    workers: usize,

    /// LLM model ID.
    #[arg(long, env = "SNAP2MD_MODEL", default_value = "deepseek-chat")]
    model: String,

    /// Base URL of the OpenAI-compatible endpoint.
    #[arg(long, env = "SNAP2MD_API_BASE", default_value = "https://api.deepseek.com")]
    api_base: String,

    /// API key (falls back to DEEPSEEK_API_KEY / OPENAI_API_KEY).
    #[arg(long, env = "SNAP2MD_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Name of the shared asset folder under the output root.
    #[arg(long, env = "SNAP2MD_ASSET_DIR", default_value = "assets")]
    asset_dir: String,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "SNAP2MD_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max LLM output tokens per document.
    #[arg(long, env = "SNAP2MD_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: u32,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "SNAP2MD_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Retries per document on transient LLM failure.
    #[arg(long, env = "SNAP2MD_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "SNAP2MD_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Output a structured JSON run report instead of the text summary.
    #[arg(long, env = "SNAP2MD_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "SNAP2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SNAP2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SNAP2MD_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs while the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {path:?}"))?,
        )
    } else {
        None
    };

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let mut builder = ConversionConfig::builder(&cli.input, &cli.output)
        .max_workers(cli.workers)
        .model(&cli.model)
        .api_base(&cli.api_base)
        .asset_dir_name(&cli.asset_dir)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout);

    if let Some(key) = cli.api_key.clone() {
        builder = builder.api_key(key);
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress_cb {
        builder = builder.progress_callback(cb);
    }

    let config = builder.build().context("Invalid configuration")?;

    // ── Cancellation on Ctrl-C ───────────────────────────────────────────
    // In-flight documents finish their current stage and are marked failed;
    // the atomic writer guarantees nothing half-written hits the disk.
    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\n{} interrupt received — finishing in-flight stages…", cyan("⚠"));
                cancel.store(true, Ordering::SeqCst);
            }
        });
    }

    // ── Run ──────────────────────────────────────────────────────────────
    let output = run_with_cancel(&config, cancel)
        .await
        .context("Conversion run failed")?;

    // ── Report ───────────────────────────────────────────────────────────
    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise report")?;
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle.write_all(json.as_bytes()).ok();
        handle.write_all(b"\n").ok();
    } else if !cli.quiet {
        print_summary(&output);
    }

    if output.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_summary(output: &RunOutput) {
    let s = &output.stats;
    eprintln!(
        "{}  {}/{} documents  {} asset(s)  {} reference(s) rewritten  {}ms",
        if s.failed == 0 { green("✔") } else { cyan("⚠") },
        s.succeeded,
        s.total_documents,
        s.assets_stored,
        s.refs_rewritten,
        s.total_duration_ms,
    );
    if s.total_warnings > 0 {
        eprintln!("   {}", dim(&format!("{} warning(s) — rerun with -v for details", s.total_warnings)));
    }
    for r in output.failures() {
        eprintln!(
            "   {} {} {}",
            red("✗"),
            r.source_path.display(),
            dim(&format!(
                "[{}] {}",
                r.stage,
                r.error.as_ref().map(|e| e.to_string()).unwrap_or_default()
            )),
        );
    }
}
