use crate::config::FetchConfig;
use crate::core::error::{SynthesisError, SynthesisResult};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use std::thread;
use std::time::Duration;

const USER_AGENT: &str = concat!("crystal_structure_generator/", env!("CARGO_PKG_VERSION"));
/// Longest error body quoted back to the caller.
const MAX_DETAIL_CHARS: usize = 300;

/// Blocking HTTP client with a bounded timeout and retry on 5xx / dropped connections.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    timeout: Duration,
    max_retries: u32,
    backoff: Duration,
}

impl HttpClient {
    pub fn new(timeout: Duration, max_retries: u32) -> SynthesisResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SynthesisError::ExternalFetchFailure {
                origin: "http".into(),
                source_id: "client".into(),
                status: None,
                detail: e.to_string(),
            })?;
        Ok(Self {
            client,
            timeout,
            max_retries: max_retries.max(1),
            backoff: Duration::from_secs(1),
        })
    }

    pub fn from_config(config: &FetchConfig) -> SynthesisResult<Self> {
        Self::new(config.timeout, config.max_retries)
    }

    /// Initial delay between attempts; doubles after every retry.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Sends the request built by `build`, retrying 5xx answers and transport errors.
    ///
    /// 404 and other client errors are returned immediately with the server's
    /// status and body. A final transport timeout becomes [`SynthesisError::Timeout`].
    pub fn send<F>(&self, origin: &str, source_id: &str, build: F) -> SynthesisResult<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let fetch_failure = |status: Option<StatusCode>, detail: String| SynthesisError::ExternalFetchFailure {
            origin: origin.to_string(),
            source_id: source_id.to_string(),
            status: status.map(|s| s.as_u16()),
            detail,
        };

        let mut delay = self.backoff;
        let mut last_error = fetch_failure(None, "no attempt was made".into());

        for attempt in 1..=self.max_retries {
            match build(&self.client).send() {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) if resp.status() == StatusCode::NOT_FOUND => {
                    return Err(fetch_failure(Some(StatusCode::NOT_FOUND), "not found".into()));
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body = truncate(resp.text().unwrap_or_default());
                    let error = fetch_failure(Some(status), body);
                    // Generally only 5xx errors are retryable
                    if !status.is_server_error() {
                        return Err(error);
                    }
                    last_error = error;
                }
                Err(e) if e.is_timeout() => {
                    last_error = SynthesisError::Timeout {
                        service: origin.to_string(),
                        seconds: self.timeout.as_secs(),
                    };
                }
                Err(e) => {
                    last_error = fetch_failure(e.status(), e.to_string());
                }
            }

            if attempt < self.max_retries {
                log::warn!("{} request for '{}' failed ({}); retrying in {:?}", origin, source_id, last_error, delay);
                thread::sleep(delay);
                delay *= 2;
            }
        }

        Err(last_error)
    }

    /// Like [`HttpClient::send`], returning the body as text.
    pub fn text<F>(&self, origin: &str, source_id: &str, build: F) -> SynthesisResult<String>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        self.send(origin, source_id, build)?
            .text()
            .map_err(|e| SynthesisError::ExternalFetchFailure {
                origin: origin.to_string(),
                source_id: source_id.to_string(),
                status: None,
                detail: format!("could not read response body: {}", e),
            })
    }
}

fn truncate(body: String) -> String {
    let body = body.trim();
    if body.chars().count() <= MAX_DETAIL_CHARS {
        body.to_string()
    } else {
        let cut: String = body.chars().take(MAX_DETAIL_CHARS).collect();
        format!("{}...", cut)
    }
}
