//! Drive the external converter call with timeout, retry, and backoff.
//!
//! This stage is intentionally thin — all prompt engineering lives in
//! [`crate::prompts`] and the wire protocol in [`crate::llm`], so retry
//! policy can change without touching either.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 5xx errors from LLM APIs are transient and frequent under
//! concurrent load. Exponential backoff (`retry_backoff_ms * 2^attempt`)
//! avoids thundering-herd: with 500 ms base and 3 retries the wait sequence
//! is 500 ms → 1 s → 2 s. A per-call timeout is counted as one more
//! transient failure; permanent API errors (401, 400) fail immediately.

use crate::config::ConversionConfig;
use crate::error::JobError;
use crate::llm::{ConvertError, HtmlConverter};
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// A successful conversion plus the retries it cost.
#[derive(Debug)]
pub struct ConvertOutcome {
    pub markdown: String,
    pub retries: u32,
}

/// Convert one cleaned HTML document to Markdown, retrying transient
/// failures up to `config.max_retries` times.
///
/// `label` is the document name used in log lines.
pub async fn convert_html(
    converter: &Arc<dyn HtmlConverter>,
    label: &str,
    html: &str,
    config: &ConversionConfig,
) -> Result<ConvertOutcome, JobError> {
    let call_timeout = Duration::from_secs(config.api_timeout_secs);
    let mut last_err: Option<ConvertError> = None;
    let mut timed_out = false;
    let mut retries_spent = 0;

    for attempt in 0..=config.max_retries {
        retries_spent = attempt;
        if attempt > 0 {
            let backoff = config.retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "{}: retry {}/{} after {}ms",
                label, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match timeout(call_timeout, converter.convert(html)).await {
            Ok(Ok(markdown)) => {
                debug!(
                    "{}: converted ({} bytes of Markdown, {} retries)",
                    label,
                    markdown.len(),
                    attempt
                );
                return Ok(ConvertOutcome {
                    markdown,
                    retries: attempt,
                });
            }
            Ok(Err(e)) => {
                warn!("{}: attempt {} failed — {}", label, attempt + 1, e);
                let transient = e.is_transient();
                timed_out = false;
                last_err = Some(e);
                if !transient {
                    break;
                }
            }
            Err(_elapsed) => {
                warn!(
                    "{}: attempt {} timed out after {}s",
                    label,
                    attempt + 1,
                    config.api_timeout_secs
                );
                timed_out = true;
                last_err = None;
            }
        }
    }

    if timed_out {
        return Err(JobError::Timeout {
            retries: retries_spent,
            secs: config.api_timeout_secs,
        });
    }
    Err(JobError::Convert {
        retries: retries_spent,
        detail: last_err
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string()),
    })
}
