//! Configuration types for PDF transcription.
//!
//! All transcription behaviour is controlled through [`TranscriptionConfig`],
//! built via its [`TranscriptionConfigBuilder`]. Endpoint credentials live in
//! a separate [`AzureCredentials`] value so a config can be logged or shared
//! without carrying the API key around.

use crate::error::Pdf2TextError;
use crate::progress::ProgressCallback;
use crate::retry::{RetryPolicy, DEFAULT_RETRYABLE_STATUSES};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// API version used when the credential bundle does not name one.
pub const DEFAULT_API_VERSION: &str = "2024-02-15-preview";

/// Configuration for one PDF-to-text transcription.
///
/// # Example
/// ```rust
/// use pdf2text::{RequestMode, TranscriptionConfig};
///
/// let config = TranscriptionConfig::builder()
///     .model("gpt-4o")
///     .scale(2.0)
///     .batch_limit(4)
///     .request_mode(RequestMode::MultiImage)
///     .build()
///     .unwrap();
/// assert_eq!(config.batch_limit, 4);
/// ```
#[derive(Clone)]
pub struct TranscriptionConfig {
    /// Model (deployment) identifier placed in the request URL.
    pub model: String,

    /// Render zoom. 1.0 maps one PDF point to one pixel. Range 0.5–3.0. Default: 1.6.
    pub scale: f32,

    /// Maximum pages per batch. Default: 1.
    ///
    /// In [`RequestMode::PerImage`] this is also the number of requests in
    /// flight at once; in [`RequestMode::MultiImage`] it is the number of
    /// images carried by one request.
    pub batch_limit: usize,

    /// Batch requests in flight at once in [`RequestMode::MultiImage`]. Default: 4.
    pub concurrency: usize,

    /// How a batch is turned into requests. Default: [`RequestMode::PerImage`].
    pub request_mode: RequestMode,

    /// Sampling temperature. Default: 0.2.
    pub temperature: f32,

    /// Upper bound on generated tokens per request. Omitted from the body when None.
    pub max_tokens: Option<usize>,

    /// Custom system instruction. If None, uses [`crate::prompts::DEFAULT_SYSTEM_PROMPT`].
    pub system_prompt: Option<String>,

    /// Attempts per HTTP call, including the first. Default: 3.
    pub max_attempts: u32,

    /// Delay before the second attempt; doubles for each later one. Default: 500.
    pub retry_backoff_ms: u64,

    /// HTTP statuses treated as transient. Default: 429, 500, 502, 503, 504.
    pub retryable_statuses: Vec<u16>,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Per-request HTTP timeout in seconds. None leaves it to the caller.
    pub api_timeout_secs: Option<u64>,

    /// Optional per-batch progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            scale: 1.6,
            batch_limit: 1,
            concurrency: 4,
            request_mode: RequestMode::default(),
            temperature: 0.2,
            max_tokens: None,
            system_prompt: None,
            max_attempts: 3,
            retry_backoff_ms: 500,
            retryable_statuses: DEFAULT_RETRYABLE_STATUSES.to_vec(),
            password: None,
            api_timeout_secs: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for TranscriptionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranscriptionConfig")
            .field("model", &self.model)
            .field("scale", &self.scale)
            .field("batch_limit", &self.batch_limit)
            .field("concurrency", &self.concurrency)
            .field("request_mode", &self.request_mode)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_attempts", &self.max_attempts)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("retryable_statuses", &self.retryable_statuses)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn TranscriptionProgressCallback>"),
            )
            .finish()
    }
}

impl TranscriptionConfig {
    /// Create a new builder for `TranscriptionConfig`.
    pub fn builder() -> TranscriptionConfigBuilder {
        TranscriptionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The system instruction sent with every request.
    pub fn system_instruction(&self) -> &str {
        self.system_prompt
            .as_deref()
            .unwrap_or(crate::prompts::DEFAULT_SYSTEM_PROMPT)
    }

    /// Retry policy derived from the retry fields.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.retry_backoff_ms),
            retryable_statuses: self.retryable_statuses.clone(),
        }
    }
}

/// Builder for [`TranscriptionConfig`].
#[derive(Debug)]
pub struct TranscriptionConfigBuilder {
    config: TranscriptionConfig,
}

impl TranscriptionConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn scale(mut self, scale: f32) -> Self {
        self.config.scale = scale.clamp(0.5, 3.0);
        self
    }

    /// Zero is kept as-is so `build()` can reject it.
    pub fn batch_limit(mut self, n: usize) -> Self {
        self.config.batch_limit = n;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn request_mode(mut self, mode: RequestMode) -> Self {
        self.config.request_mode = mode;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = Some(n);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n.max(1);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn retryable_statuses(mut self, statuses: impl Into<Vec<u16>>) -> Self {
        self.config.retryable_statuses = statuses.into();
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = Some(secs);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<TranscriptionConfig, Pdf2TextError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(Pdf2TextError::InvalidConfig(
                "Model (deployment) name must not be empty".into(),
            ));
        }
        if c.batch_limit == 0 {
            return Err(Pdf2TextError::InvalidConfig(
                "Batch limit must be ≥ 1".into(),
            ));
        }
        if !c.scale.is_finite() {
            return Err(Pdf2TextError::InvalidConfig(format!(
                "Scale must be a finite number, got {}",
                c.scale
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How the pages of one batch are sent to the endpoint.
///
/// | Mode | Requests per batch | In flight |
/// |------|--------------------|-----------|
/// | `PerImage` | one per page | up to `batch_limit` (one batch at a time) |
/// | `MultiImage` | one, carrying every page | up to `concurrency` batches |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RequestMode {
    /// One single-image request per page, a batch's requests run concurrently. (default)
    #[default]
    PerImage,
    /// One multi-image request per batch.
    MultiImage,
}

// ── Credentials ──────────────────────────────────────────────────────────

/// Opaque credential bundle for an Azure-OpenAI style endpoint.
///
/// The key is never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct AzureCredentials {
    /// Resource endpoint, e.g. `https://my-resource.openai.azure.com/`.
    pub endpoint: String,
    /// Sent verbatim in the `api-key` header.
    pub api_key: String,
    /// `api-version` query parameter.
    pub api_version: String,
}

impl AzureCredentials {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            api_version: api_version.into(),
        }
    }

    /// Read `AZURE_OPENAI_ENDPOINT`, `AZURE_OPENAI_API_KEY` and
    /// `AZURE_OPENAI_API_VERSION` (optional) from the environment.
    pub fn from_env() -> Result<Self, Pdf2TextError> {
        let endpoint = require_env("AZURE_OPENAI_ENDPOINT")?;
        let api_key = require_env("AZURE_OPENAI_API_KEY")?;
        let api_version = std::env::var("AZURE_OPENAI_API_VERSION")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_VERSION.to_string());
        Ok(Self {
            endpoint,
            api_key,
            api_version,
        })
    }

    /// The API version to send, falling back to [`DEFAULT_API_VERSION`] when blank.
    pub fn api_version_or_default(&self) -> &str {
        if self.api_version.trim().is_empty() {
            DEFAULT_API_VERSION
        } else {
            &self.api_version
        }
    }
}

impl fmt::Debug for AzureCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureCredentials")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("api_version", &self.api_version)
            .finish()
    }
}

fn require_env(name: &'static str) -> Result<String, Pdf2TextError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(Pdf2TextError::MissingCredential {
            name,
            hint: format!("Set {name} in the environment."),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = TranscriptionConfig::default();
        assert_eq!(c.scale, 1.6);
        assert_eq!(c.batch_limit, 1);
        assert_eq!(c.temperature, 0.2);
        assert_eq!(c.max_attempts, 3);
        assert_eq!(c.retry_backoff_ms, 500);
        assert_eq!(c.retryable_statuses, vec![429, 500, 502, 503, 504]);
        assert_eq!(c.request_mode, RequestMode::PerImage);
        assert!(c.max_tokens.is_none());
    }

    #[test]
    fn builder_clamps_ranges() {
        let c = TranscriptionConfig::builder()
            .model("gpt-4o")
            .scale(10.0)
            .temperature(-1.0)
            .concurrency(0)
            .max_attempts(0)
            .build()
            .unwrap();
        assert_eq!(c.scale, 3.0);
        assert_eq!(c.temperature, 0.0);
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.max_attempts, 1);
    }

    #[test]
    fn builder_rejects_zero_batch_limit() {
        let err = TranscriptionConfig::builder()
            .model("gpt-4o")
            .batch_limit(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, Pdf2TextError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_empty_model() {
        let err = TranscriptionConfig::builder().build().unwrap_err();
        assert!(err.to_string().contains("Model"));
    }

    #[test]
    fn system_instruction_falls_back_to_default() {
        let c = TranscriptionConfig::default();
        assert_eq!(c.system_instruction(), crate::prompts::DEFAULT_SYSTEM_PROMPT);
        let c = TranscriptionConfig::builder()
            .model("m")
            .system_prompt("Transcribe.")
            .build()
            .unwrap();
        assert_eq!(c.system_instruction(), "Transcribe.");
    }

    #[test]
    fn retry_policy_from_config() {
        let c = TranscriptionConfig::builder()
            .model("m")
            .max_attempts(5)
            .retry_backoff_ms(100)
            .retryable_statuses(vec![503])
            .build()
            .unwrap();
        let p = c.retry_policy();
        assert_eq!(p.max_attempts, 5);
        assert_eq!(p.base_delay, Duration::from_millis(100));
        assert_eq!(p.retryable_statuses, vec![503]);
    }

    #[test]
    fn credentials_debug_redacts_key() {
        let creds = AzureCredentials::new("https://x.openai.azure.com", "sk-secret", "2024-02-15-preview");
        let dbg = format!("{creds:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn blank_api_version_uses_default() {
        let creds = AzureCredentials::new("https://x", "k", " ");
        assert_eq!(creds.api_version_or_default(), DEFAULT_API_VERSION);
    }
}
