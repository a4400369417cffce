//! Configuration types for snapshot-to-Markdown conversion.
//!
//! All run behaviour is controlled through [`ConversionConfig`], built via
//! its [`ConversionConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs across worker tasks and to diff two runs to
//! understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A fifteen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! well-documented defaults for the rest. The two paths every run needs —
//! input root and output root — are the builder's only required arguments.

use crate::error::Snap2MdError;
use crate::llm::HtmlConverter;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for one conversion run.
///
/// Built via [`ConversionConfig::builder()`].
///
/// # Example
/// ```rust
/// use snap2md::ConversionConfig;
///
/// let config = ConversionConfig::builder("data/input", "data/output")
///     .max_workers(8)
///     .model("deepseek-chat")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Root directory scanned for `.html`/`.htm` snapshots.
    pub input_root: PathBuf,

    /// Root directory receiving the mirrored `.md` tree and the shared
    /// asset folder.
    pub output_root: PathBuf,

    /// Name of the shared asset folder under `output_root`. Default: `assets`.
    pub asset_dir_name: String,

    /// Number of documents converted concurrently. Default: 5.
    ///
    /// The workload is network-bound: each worker spends most of its life
    /// waiting on the LLM API. Size this to saturate the provider's rate
    /// limit, not the machine's cores. If you hit `429` errors, lower it.
    pub max_workers: usize,

    /// LLM model identifier. Default: `deepseek-chat`.
    pub model: String,

    /// Base URL of the OpenAI-compatible endpoint. Default: the DeepSeek API.
    pub api_base: String,

    /// API key. If `None`, the orchestrator falls back to the
    /// `DEEPSEEK_API_KEY` then `OPENAI_API_KEY` environment variables.
    pub api_key: Option<String>,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Low temperature keeps the model faithful to the source text — exactly
    /// what you want for transcription-style conversion.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per document. Default: 8192.
    ///
    /// Long articles routinely exceed 4 000 output tokens; setting this too
    /// low silently truncates the Markdown mid-sentence.
    pub max_tokens: u32,

    /// Maximum retry attempts on a transient converter failure. Default: 3.
    ///
    /// Most 5xx and timeout errors are transient. Permanent errors (bad API
    /// key, 400) are not retried — they fail the document immediately.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    ///
    /// Doubles after each attempt: 500 ms → 1 s → 2 s, so N concurrent
    /// workers never hammer a recovering endpoint in lock-step.
    pub retry_backoff_ms: u64,

    /// Per-call timeout for the external converter, in seconds. Default: 120.
    ///
    /// Exceeding it counts as a transient failure eligible for retry.
    pub api_timeout_secs: u64,

    /// Custom system prompt. If `None`, uses the built-in default.
    pub system_prompt: Option<String>,

    /// Pre-constructed converter. Takes precedence over `model`/`api_base`/
    /// `api_key`. This is the seam tests use to inject mock converters.
    pub converter: Option<Arc<dyn HtmlConverter>>,

    /// Optional progress callback receiving per-document events.
    pub progress_callback: Option<ProgressCallback>,
}

impl ConversionConfig {
    /// Create a new builder rooted at the given input and output directories.
    pub fn builder(
        input_root: impl Into<PathBuf>,
        output_root: impl Into<PathBuf>,
    ) -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: ConversionConfig {
                input_root: input_root.into(),
                output_root: output_root.into(),
                asset_dir_name: "assets".to_string(),
                max_workers: 5,
                model: crate::llm::DEFAULT_MODEL.to_string(),
                api_base: crate::llm::DEFAULT_API_BASE.to_string(),
                api_key: None,
                temperature: 0.1,
                max_tokens: 8192,
                max_retries: 3,
                retry_backoff_ms: 500,
                api_timeout_secs: 120,
                system_prompt: None,
                converter: None,
                progress_callback: None,
            },
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("input_root", &self.input_root)
            .field("output_root", &self.output_root)
            .field("asset_dir_name", &self.asset_dir_name)
            .field("max_workers", &self.max_workers)
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("converter", &self.converter.as_ref().map(|_| "<dyn HtmlConverter>"))
            .finish()
    }
}

/// Builder for [`ConversionConfig`].
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn asset_dir_name(mut self, name: impl Into<String>) -> Self {
        self.config.asset_dir_name = name.into();
        self
    }

    pub fn max_workers(mut self, n: usize) -> Self {
        self.config.max_workers = n.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.config.api_base = base.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn converter(mut self, converter: Arc<dyn HtmlConverter>) -> Self {
        self.config.converter = Some(converter);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Snap2MdError> {
        let c = &self.config;
        if c.max_workers == 0 {
            return Err(Snap2MdError::InvalidConfig("max_workers must be ≥ 1".into()));
        }
        if c.asset_dir_name.is_empty() || c.asset_dir_name.contains(['/', '\\']) {
            return Err(Snap2MdError::InvalidConfig(format!(
                "asset_dir_name must be a bare folder name, got '{}'",
                c.asset_dir_name
            )));
        }
        if c.input_root == c.output_root {
            return Err(Snap2MdError::InvalidConfig(
                "input_root and output_root must differ".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = ConversionConfig::builder("in", "out").build().unwrap();
        assert_eq!(c.max_workers, 5);
        assert_eq!(c.max_retries, 3);
        assert_eq!(c.retry_backoff_ms, 500);
        assert_eq!(c.api_timeout_secs, 120);
        assert_eq!(c.asset_dir_name, "assets");
        assert_eq!(c.max_tokens, 8192);
    }

    #[test]
    fn max_workers_floor_is_one() {
        let c = ConversionConfig::builder("in", "out")
            .max_workers(0)
            .build()
            .unwrap();
        assert_eq!(c.max_workers, 1);
    }

    #[test]
    fn rejects_nested_asset_dir_name() {
        let err = ConversionConfig::builder("in", "out")
            .asset_dir_name("a/b")
            .build();
        assert!(err.is_err());
    }

    #[test]
    fn rejects_identical_roots() {
        assert!(ConversionConfig::builder("same", "same").build().is_err());
    }

    #[test]
    fn temperature_is_clamped() {
        let c = ConversionConfig::builder("in", "out")
            .temperature(9.0)
            .build()
            .unwrap();
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = ConversionConfig::builder("in", "out")
            .api_key("sk-secret")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("<redacted>"));
    }
}
