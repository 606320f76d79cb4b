//! Inference client: build chat-completion requests and call the endpoint.
//!
//! The request layout is fixed by the Azure-OpenAI chat-completions API:
//!
//! ```text
//! POST {endpoint}/openai/deployments/{model}/chat/completions?api-version={v}
//! api-key: {key}
//!
//! { "messages": [
//!     { "role": "system", "content": "<instruction>" },
//!     { "role": "user", "content": [
//!         { "type": "text", "text": "Page 1:" },
//!         { "type": "image_url", "image_url": { "url": "data:image/png;base64,..." } },
//!         ... one text/image pair per page ...
//!     ] } ],
//!   "temperature": 0.2, "max_tokens": 4096 }
//! ```
//!
//! HTTP goes through the [`Transport`] trait so the retry and parsing logic
//! can be exercised without a network; [`ReqwestTransport`] is the real one.

use crate::config::AzureCredentials;
use crate::error::{InferenceError, Pdf2TextError};
use crate::pipeline::render::PageImage;
use crate::prompts::page_label;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

// ── Transport seam ───────────────────────────────────────────────────────

/// One outbound HTTP POST with a JSON body.
#[derive(Clone)]
pub struct HttpRequest {
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: serde_json::Value,
}

impl HttpRequest {
    /// Value of the first header named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Status and body text of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A network-level failure: no HTTP response was received.
#[derive(Debug, Clone, Error)]
#[error("{detail}")]
pub struct TransportError {
    pub detail: String,
    pub timeout: bool,
}

impl TransportError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
            timeout: false,
        }
    }
}

/// Sends an [`HttpRequest`] and returns whatever status came back.
///
/// Implementations must not interpret the status; retry decisions belong to
/// [`RetryPolicy`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// [`Transport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a client, optionally with a per-request timeout.
    pub fn new(timeout: Option<Duration>) -> Result<Self, Pdf2TextError> {
        let mut builder = reqwest::Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        let client = builder
            .build()
            .map_err(|e| Pdf2TextError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let body = serde_json::to_vec(&request.body)
            .map_err(|e| TransportError::new(format!("Failed to serialise body: {e}")))?;

        let mut builder = self
            .client
            .post(request.url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| TransportError {
            detail: e.to_string(),
            timeout: e.is_timeout(),
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| TransportError {
            detail: format!("Failed to read response body: {e}"),
            timeout: e.is_timeout(),
        })?;

        Ok(HttpResponse { status, body })
    }
}

// ── Requests ─────────────────────────────────────────────────────────────

/// One labelled image inside an [`InferenceRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestImage {
    /// Text placed before the image, e.g. `"Page 3:"`.
    pub label: String,
    /// `data:image/png;base64,...`
    pub data_url: String,
}

impl RequestImage {
    pub fn from_page(page: &PageImage) -> Self {
        Self {
            label: page_label(page.page_num),
            data_url: page.data_url(),
        }
    }
}

/// Everything needed for one chat-completion call. Built fresh per request.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub system_instruction: String,
    pub temperature: f32,
    pub max_tokens: Option<usize>,
    pub images: Vec<RequestImage>,
}

impl InferenceRequest {
    /// Build a request for `pages` in the order given.
    pub fn for_pages<'a>(
        system_instruction: &str,
        temperature: f32,
        max_tokens: Option<usize>,
        pages: impl IntoIterator<Item = &'a PageImage>,
    ) -> Self {
        Self {
            system_instruction: system_instruction.to_string(),
            temperature,
            max_tokens,
            images: pages.into_iter().map(RequestImage::from_page).collect(),
        }
    }

    /// The JSON body sent to the endpoint.
    pub fn to_body(&self) -> ChatRequestBody<'_> {
        let mut content = Vec::with_capacity(self.images.len() * 2);
        for image in &self.images {
            content.push(ContentPart::Text { text: &image.label });
            content.push(ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: &image.data_url,
                },
            });
        }
        ChatRequestBody {
            messages: vec![
                Message::System {
                    content: &self.system_instruction,
                },
                Message::User { content },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

/// Serialised request body.
#[derive(Debug, Serialize)]
pub struct ChatRequestBody<'a> {
    pub messages: Vec<Message<'a>>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message<'a> {
    System { content: &'a str },
    User { content: Vec<ContentPart<'a>> },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Debug, Serialize)]
pub struct ImageUrl<'a> {
    pub url: &'a str,
}

// ── Responses ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// Text generated for one request, plus token accounting when reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Extract the first choice's message text from a response body.
pub fn parse_completion(body: &str) -> Result<Completion, InferenceError> {
    let response: ChatCompletionResponse =
        serde_json::from_str(body).map_err(|e| InferenceError::Parse {
            detail: format!("invalid JSON: {e}"),
        })?;

    let choice = response.choices.first().ok_or_else(|| InferenceError::Parse {
        detail: "no choices in response".into(),
    })?;
    let text = choice
        .message
        .as_ref()
        .and_then(|m| m.content.clone())
        .ok_or_else(|| InferenceError::Parse {
            detail: "first choice has no message content".into(),
        })?;

    let (prompt_tokens, completion_tokens) = response
        .usage
        .map(|u| (u.prompt_tokens, u.completion_tokens))
        .unwrap_or((0, 0));

    Ok(Completion {
        text,
        prompt_tokens,
        completion_tokens,
    })
}

// ── Client ───────────────────────────────────────────────────────────────

/// Calls one model deployment with retry.
///
/// Credentials are moved in and only read afterwards.
pub struct InferenceClient {
    transport: Arc<dyn Transport>,
    credentials: AzureCredentials,
    url: Url,
    retry: RetryPolicy,
}

impl std::fmt::Debug for InferenceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceClient")
            .field("url", &self.url.as_str())
            .field("credentials", &self.credentials)
            .field("retry", &self.retry)
            .finish()
    }
}

impl InferenceClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: AzureCredentials,
        model: &str,
        retry: RetryPolicy,
    ) -> Result<Self, Pdf2TextError> {
        if credentials.api_key.trim().is_empty() {
            return Err(Pdf2TextError::MissingCredential {
                name: "api_key",
                hint: "The credential bundle has an empty API key.".into(),
            });
        }
        let url = completions_url(
            &credentials.endpoint,
            model,
            credentials.api_version_or_default(),
        )?;
        Ok(Self {
            transport,
            credentials,
            url,
            retry,
        })
    }

    /// The fully-built chat-completions URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Send `request` and return the generated text.
    pub async fn complete(&self, request: &InferenceRequest) -> Result<Completion, InferenceError> {
        let body = serde_json::to_value(request.to_body()).map_err(|e| InferenceError::Parse {
            detail: format!("failed to serialise request: {e}"),
        })?;
        let http = HttpRequest {
            url: self.url.clone(),
            headers: vec![("api-key".to_string(), self.credentials.api_key.clone())],
            body,
        };

        debug!("POST {} ({} image(s))", self.url.path(), request.images.len());
        let response = self.retry.send(self.transport.as_ref(), &http).await?;

        if !response.is_success() {
            return Err(InferenceError::Http {
                status: response.status,
                body: response.body,
            });
        }

        parse_completion(&response.body)
    }
}

/// Build `{endpoint}/openai/deployments/{model}/chat/completions?api-version={v}`.
///
/// The model is added as a single escaped path segment, so a `/` in a
/// deployment name cannot change the route.
pub fn completions_url(endpoint: &str, model: &str, api_version: &str) -> Result<Url, Pdf2TextError> {
    let mut url = Url::parse(endpoint.trim()).map_err(|e| {
        Pdf2TextError::InvalidConfig(format!("Invalid endpoint URL '{endpoint}': {e}"))
    })?;

    url.path_segments_mut()
        .map_err(|_| {
            Pdf2TextError::InvalidConfig(format!("Endpoint '{endpoint}' cannot be a base URL"))
        })?
        .pop_if_empty()
        .extend(["openai", "deployments", model, "chat", "completions"]);

    url.query_pairs_mut().clear().append_pair("api-version", api_version);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn page(n: usize) -> PageImage {
        PageImage {
            page_num: n,
            width: 1,
            height: 1,
            png: vec![n as u8],
        }
    }

    #[test]
    fn url_with_and_without_trailing_slash() {
        let a = completions_url("https://res.openai.azure.com/", "gpt-4o", "2024-02-15-preview").unwrap();
        let b = completions_url("https://res.openai.azure.com", "gpt-4o", "2024-02-15-preview").unwrap();
        assert_eq!(a, b);
        assert_eq!(
            a.as_str(),
            "https://res.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-02-15-preview"
        );
    }

    #[test]
    fn url_escapes_model_segment() {
        let u = completions_url("https://res.example/", "my model/v2", "2024").unwrap();
        assert!(u.path().contains("/deployments/my%20model%2Fv2/chat"), "got {}", u.path());
    }

    #[test]
    fn url_rejects_garbage_endpoint() {
        assert!(completions_url("not a url", "m", "v").is_err());
    }

    #[test]
    fn body_interleaves_labels_and_images() {
        let pages = [page(3), page(4)];
        let req = InferenceRequest::for_pages("sys", 0.2, None, pages.iter());
        let body = serde_json::to_value(req.to_body()).unwrap();

        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "sys");
        let content = &body["messages"][1]["content"];
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[0]["text"], "Page 3:");
        assert_eq!(content[1]["type"], "image_url");
        assert!(content[1]["image_url"]["url"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,"));
        assert_eq!(content[2]["text"], "Page 4:");
        assert!((body["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn body_includes_max_tokens_when_set() {
        let pages = [page(1)];
        let req = InferenceRequest::for_pages("sys", 0.0, Some(512), pages.iter());
        let body = serde_json::to_value(req.to_body()).unwrap();
        assert_eq!(body["max_tokens"], 512);
    }

    #[test]
    fn parse_first_choice() {
        let c = parse_completion(
            r#"{"choices":[{"message":{"content":"hello"}},{"message":{"content":"other"}}],
                "usage":{"prompt_tokens":10,"completion_tokens":2}}"#,
        )
        .unwrap();
        assert_eq!(c.text, "hello");
        assert_eq!(c.prompt_tokens, 10);
        assert_eq!(c.completion_tokens, 2);
    }

    #[test]
    fn parse_rejects_unexpected_shapes() {
        for body in [
            "not json",
            r#"{"choices":[]}"#,
            r#"{"choices":[{"message":{"content":null}}]}"#,
            r#"{"choices":[{}]}"#,
            r#"{"error":"x"}"#,
        ] {
            assert!(
                matches!(parse_completion(body), Err(InferenceError::Parse { .. })),
                "{body}"
            );
        }
    }

    struct Fixed {
        response: HttpResponse,
        seen: Mutex<Vec<HttpRequest>>,
    }

    #[async_trait]
    impl Transport for Fixed {
        async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(self.response.clone())
        }
    }

    fn client(t: Arc<Fixed>) -> InferenceClient {
        InferenceClient::new(
            t,
            AzureCredentials::new("https://res.example", "key-123", "2024-02-15-preview"),
            "gpt-4o",
            RetryPolicy::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn complete_sends_api_key_and_returns_text() {
        let t = Arc::new(Fixed {
            response: HttpResponse::new(200, r#"{"choices":[{"message":{"content":"PAGE_OK"}}]}"#),
            seen: Mutex::new(vec![]),
        });
        let c = client(Arc::clone(&t));
        let pages = [page(1)];
        let out = c
            .complete(&InferenceRequest::for_pages("sys", 0.2, None, pages.iter()))
            .await
            .unwrap();
        assert_eq!(out.text, "PAGE_OK");
        let seen = t.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].header("API-KEY"), Some("key-123"));
    }

    #[tokio::test]
    async fn complete_surfaces_non_retryable_status() {
        let t = Arc::new(Fixed {
            response: HttpResponse::new(400, "bad request"),
            seen: Mutex::new(vec![]),
        });
        let c = client(Arc::clone(&t));
        let pages = [page(1)];
        let err = c
            .complete(&InferenceRequest::for_pages("sys", 0.2, None, pages.iter()))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            InferenceError::Http {
                status: 400,
                body: "bad request".into()
            }
        );
        assert_eq!(t.seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let t: Arc<dyn Transport> = Arc::new(Fixed {
            response: HttpResponse::new(200, ""),
            seen: Mutex::new(vec![]),
        });
        let err = InferenceClient::new(
            t,
            AzureCredentials::new("https://res.example", "", "v"),
            "m",
            RetryPolicy::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Pdf2TextError::MissingCredential { .. }));
    }
}
