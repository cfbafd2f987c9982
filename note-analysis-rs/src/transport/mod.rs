//! Transport adapter for OpenAI-compatible chat-completion providers
//!
//! `ChatClient` turns a [`ProviderProfile`] into a configured HTTP client
//! that issues streaming chat-completion requests. Building one is pure
//! configuration; credentials are checked on the first request.

pub mod models;
pub mod sse;

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER, USER_AGENT};
use reqwest::Client;

use crate::config::ProviderProfile;
use crate::core::{ChatTransport, DeltaStream};
use crate::error::{ErrorContext, PipelineError, Result};
use crate::util::sanitize_for_logging;

use self::models::ChatCompletionRequest;
use self::sse::{SseDecoder, SseFrame};

/// Default user agent string
const DEFAULT_USER_AGENT: &str = concat!("note-analysis-rs/", env!("CARGO_PKG_VERSION"));

/// Streaming chat-completion client for one provider profile
#[derive(Debug, Clone)]
pub struct ChatClient {
    http_client: Client,
    profile: ProviderProfile,
}

impl ChatClient {
    /// Create a client with default transport settings
    pub fn new(profile: ProviderProfile) -> Result<Self> {
        ChatClientBuilder::new(profile).build()
    }

    /// Create a new builder for the client
    pub fn builder(profile: ProviderProfile) -> ChatClientBuilder {
        ChatClientBuilder::new(profile)
    }

    pub fn profile(&self) -> &ProviderProfile {
        &self.profile
    }

    /// Full URL of the chat-completions endpoint
    pub fn chat_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.profile.endpoint().base_url.trim_end_matches('/')
        )
    }

    fn ensure_configured(&self) -> Result<()> {
        let endpoint = self.profile.endpoint();
        if endpoint.api_key.trim().is_empty() {
            return Err(PipelineError::configuration(format!(
                "{} API key is not set",
                self.profile.kind()
            )));
        }
        if endpoint.base_url.trim().is_empty() {
            return Err(PipelineError::configuration(format!(
                "{} base URL is not set",
                self.profile.kind()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ChatTransport for ChatClient {
    fn name(&self) -> &str {
        self.profile.kind().as_str()
    }

    async fn stream_chat(&self, mut request: ChatCompletionRequest) -> Result<DeltaStream> {
        self.ensure_configured()?;
        request.stream = true;

        let url = self.chat_url();
        let service = self.name().to_string();
        debug!("Sending streaming request to {}: POST {}", service, url);

        let start_time = Instant::now();
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.profile.endpoint().api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let err = PipelineError::from(e);
                warn!(
                    "{} request failed: {}",
                    service,
                    sanitize_for_logging(&err.to_string())
                );
                err
            })?;

        let status = response.status();
        if !status.is_success() {
            let error = parse_error_response(&service, &url, response).await;
            warn!(
                "{} returned {} after {:?}: {}",
                service,
                status.as_u16(),
                start_time.elapsed(),
                sanitize_for_logging(&error.to_string())
            );
            return Err(error);
        }

        debug!(
            "{} stream opened after {:?}",
            service,
            start_time.elapsed()
        );
        Ok(delta_stream(response, service))
    }
}

/// Parse a non-2xx response into a PipelineError
async fn parse_error_response(service: &str, url: &str, response: reqwest::Response) -> PipelineError {
    let status = response.status();
    let mut context = ErrorContext::for_service(service)
        .status_code(status.as_u16())
        .endpoint(url);

    if let Some(retry_after) = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
    {
        context.add("retry_after", retry_after);
    }

    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => format!("Failed to read error response: {}", e),
    };

    crate::error::mapping::map_http_error(status, &body, &mut context).with_context(context)
}

struct StreamState {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    finished: bool,
}

impl StreamState {
    fn absorb(&mut self, frames: Vec<SseFrame>) {
        for frame in frames {
            match frame {
                SseFrame::Delta(delta) => self.pending.push_back(delta),
                SseFrame::Done => self.finished = true,
            }
        }
    }
}

async fn next_delta(mut state: StreamState) -> Result<Option<(String, StreamState)>> {
    loop {
        if let Some(delta) = state.pending.pop_front() {
            return Ok(Some((delta, state)));
        }
        if state.finished {
            return Ok(None);
        }

        match state.body.next().await {
            Some(Ok(bytes)) => {
                let frames = state.decoder.feed(&bytes)?;
                state.absorb(frames);
            }
            Some(Err(e)) => return Err(PipelineError::from(e)),
            None => {
                let frames = state.decoder.finish()?;
                state.absorb(frames);
                state.finished = true;
            }
        }
    }
}

fn delta_stream(response: reqwest::Response, service: String) -> DeltaStream {
    let body = response
        .bytes_stream()
        .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
        .boxed();

    let state = StreamState {
        body,
        decoder: SseDecoder::new(service),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::try_unfold(state, next_delta).boxed()
}

/// Builder for [`ChatClient`]
pub struct ChatClientBuilder {
    profile: ProviderProfile,
    user_agent: String,
    connect_timeout: Duration,
    request_timeout: Option<Duration>,
}

impl ChatClientBuilder {
    pub fn new(profile: ProviderProfile) -> Self {
        Self {
            profile,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            connect_timeout: Duration::from_secs(15),
            request_timeout: None,
        }
    }

    /// Set user agent
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Deadline for establishing a connection
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Hard deadline for a whole request, body included
    ///
    /// Streaming responses can run for minutes, so this is unset by default;
    /// per-call deadlines live in [`crate::core::CallOptions`].
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Build the client; performs no network I/O
    pub fn build(self) -> Result<ChatClient> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.user_agent)
                .map_err(|e| PipelineError::configuration(format!("Invalid user agent: {}", e)))?,
        );

        for (name, value) in self.profile.attribution_headers() {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                PipelineError::configuration(format!("Invalid header name {}: {}", name, e))
            })?;
            let header_value = HeaderValue::from_str(&value).map_err(|e| {
                PipelineError::configuration(format!("Invalid {} header value: {}", name, e))
            })?;
            headers.insert(header_name, header_value);
        }

        let mut builder = Client::builder()
            .default_headers(headers)
            .connect_timeout(self.connect_timeout)
            .gzip(true);

        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }

        let http_client = builder.build().map_err(|e| {
            PipelineError::configuration(format!("Failed to build HTTP client: {}", e))
        })?;

        Ok(ChatClient {
            http_client,
            profile: self.profile,
        })
    }
}
