//! HTTP client for the remote completion service.

use std::pin::Pin;

use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use url::Url;

use super::sse::{LineBuffer, StreamLine, parse_line};
use super::{
    ChatCompletionRequest, ChatCompletionResponse, HealthResponse, ModelsResponse, StatsResponse,
    WireMessage,
};
use crate::error::{ClientError, Result};

/// Stream of reply fragments, in arrival order.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Client for the completion service.
///
/// # Example
///
/// ```rust,no_run
/// use koc_support_chat::api::CompletionClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = CompletionClient::new("http://localhost:8000", "koc-assistant")?;
/// let reply = client.complete("How do I register?").await?;
/// println!("{reply}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CompletionClient {
    base_url: Url,
    model: String,
    http: reqwest::Client,
}

impl CompletionClient {
    /// Create a new client for the service at `base_url`.
    pub fn new(base_url: impl AsRef<str>, model: impl Into<String>) -> Result<Self> {
        Self::with_client(base_url, model, reqwest::Client::new())
    }

    /// Create a new client with a custom reqwest client.
    pub fn with_client(
        base_url: impl AsRef<str>,
        model: impl Into<String>,
        http: reqwest::Client,
    ) -> Result<Self> {
        let mut base_url = Url::parse(base_url.as_ref())?;
        // Endpoint paths are joined relative to the base, which needs a trailing slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            base_url,
            model: model.into(),
            http,
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Request a complete reply in one round trip.
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        let resp = self.post_completion(prompt, false).await?;
        let body: ChatCompletionResponse = resp.json().await?;
        body.into_content().ok_or(ClientError::MissingContent)
    }

    /// Request a streamed reply.
    ///
    /// Resolves once the response status is known. The returned stream yields
    /// each non-empty content fragment and ends at `[DONE]` or end of body.
    pub async fn stream(&self, prompt: &str) -> Result<FragmentStream> {
        let resp = self.post_completion(prompt, true).await?;
        let byte_stream = resp.bytes_stream();

        let out = async_stream::try_stream! {
            let mut lines = LineBuffer::new();
            let mut done = false;

            futures::pin_mut!(byte_stream);
            'read: while let Some(chunk) = byte_stream.next().await {
                let chunk = chunk?;
                for line in lines.push(&chunk) {
                    match parse_line(&line) {
                        Some(StreamLine::Fragment(text)) => yield text,
                        Some(StreamLine::Done) => {
                            done = true;
                            break 'read;
                        }
                        None => {}
                    }
                }
            }

            if !done
                && let Some(StreamLine::Fragment(text)) = lines.finish().as_deref().and_then(parse_line)
            {
                yield text;
            }
        };

        Ok(Box::pin(out))
    }

    /// `GET /stats`.
    pub async fn stats(&self) -> Result<StatsResponse> {
        self.get_json("stats").await
    }

    /// `GET /health`.
    pub async fn health(&self) -> Result<HealthResponse> {
        self.get_json("health").await
    }

    /// `GET /models`.
    pub async fn models(&self) -> Result<ModelsResponse> {
        self.get_json("models").await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    async fn post_completion(&self, prompt: &str, stream: bool) -> Result<reqwest::Response> {
        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![WireMessage::user(prompt)],
            stream,
        };

        tracing::debug!(
            model = %self.model,
            stream,
            prompt_len = prompt.len(),
            "Posting chat completion"
        );

        let resp = self
            .http
            .post(self.url("chat/completions")?)
            .json(&body)
            .send()
            .await?;
        check_status(resp)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.http.get(self.url(path)?).send().await?;
        Ok(check_status(resp)?.json().await?)
    }
}

fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        Err(ClientError::Status(status))
    }
}
