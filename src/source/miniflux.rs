use super::types::{EntryPage, EntryStatus, Feed, SourceError};
use super::EntrySource;
use futures::TryStreamExt;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024; // 10MB
const MAX_RETRIES: u32 = 3;
const AUTH_HEADER: &str = "X-Auth-Token";

/// Body of `PUT /v1/entries`.
#[derive(Serialize)]
struct UpdateEntriesRequest<'a> {
    entry_ids: &'a [i64],
    status: EntryStatus,
}

/// Error payload Miniflux returns alongside non-2xx responses.
#[derive(Deserialize)]
struct ApiError {
    error_message: String,
}

/// [`EntrySource`] backed by the Miniflux REST API.
///
/// The API key is sent in the `X-Auth-Token` header and never appears in
/// `Debug` output or logs.
#[derive(Debug, Clone)]
pub struct MinifluxClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: SecretString,
    request_timeout: Duration,
    retry_delay: Duration,
}

impl MinifluxClient {
    /// Create a client for the Miniflux instance at `base_url`.
    ///
    /// # Errors
    ///
    /// [`SourceError::InvalidUrl`] if `base_url` is not an absolute http(s) URL,
    /// [`SourceError::Network`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, api_key: SecretString) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("miniflux-rules/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Self::with_client(http, base_url, api_key)
    }

    /// Create a client reusing an existing `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        base_url: &str,
        api_key: SecretString,
    ) -> Result<Self, SourceError> {
        let mut base_url =
            Url::parse(base_url).map_err(|e| SourceError::InvalidUrl(e.to_string()))?;
        match base_url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(SourceError::InvalidUrl(format!(
                    "unsupported scheme '{scheme}' (only http/https allowed)"
                )))
            }
        }

        // Url::join replaces the last path segment unless the base ends in '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            http,
            base_url,
            api_key,
            request_timeout: REQUEST_TIMEOUT,
            retry_delay: Duration::from_secs(1),
        })
    }

    /// Deadline for one attempt, from sending the request to the last body byte.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Base delay for exponential backoff on retryable failures (1s, 2s, 4s by default).
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, SourceError> {
        self.base_url
            .join(path)
            .map_err(|e| SourceError::InvalidUrl(e.to_string()))
    }

    /// Send a request built by `build`, retrying transient failures with
    /// exponential backoff, and return the response body as text.
    async fn send_with_retry<F>(&self, build: F) -> Result<String, SourceError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut retry_count = 0;

        loop {
            match self.send_once(build()).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() && retry_count < MAX_RETRIES => {
                    let delay = self.retry_delay * (1u32 << retry_count);
                    tracing::debug!(
                        error = %e,
                        retry = retry_count + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying Miniflux request after transient error"
                    );
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(&self, request: RequestBuilder) -> Result<String, SourceError> {
        let request = request.header(AUTH_HEADER, self.api_key.expose_secret());

        // One deadline for the whole exchange, body included
        tokio::time::timeout(self.request_timeout, exchange(request))
            .await
            .map_err(|_| SourceError::Timeout)?
    }
}

/// Send `request` and read its body; non-2xx statuses become [`SourceError::HttpStatus`].
async fn exchange(request: RequestBuilder) -> Result<String, SourceError> {
    let response = request.send().await?;
    let status = response.status();
    let body = read_body(response).await;

    if status.is_success() {
        return body;
    }

    // Best effort: the body may be missing or not JSON at all
    let message = body
        .ok()
        .and_then(|body| serde_json::from_str::<ApiError>(&body).ok())
        .map(|e| e.error_message);
    Err(SourceError::HttpStatus {
        status: status.as_u16(),
        message,
    })
}

impl EntrySource for MinifluxClient {
    async fn fetch_entries(
        &self,
        status: Option<EntryStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<EntryPage, SourceError> {
        let mut url = self.endpoint("v1/entries")?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(status) = status {
                query.append_pair("status", status.as_str());
            }
            query
                .append_pair("limit", &limit.to_string())
                .append_pair("offset", &offset.to_string())
                // Stable order so consecutive pages neither overlap nor skip
                .append_pair("order", "id")
                .append_pair("direction", "asc");
        }

        tracing::trace!(url = %url, "Fetching entries");
        let body = self
            .send_with_retry(|| self.http.request(Method::GET, url.clone()))
            .await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn update_entries(
        &self,
        entry_ids: &[i64],
        status: EntryStatus,
    ) -> Result<(), SourceError> {
        if entry_ids.is_empty() {
            return Ok(());
        }

        let url = self.endpoint("v1/entries")?;
        let body = serde_json::to_vec(&UpdateEntriesRequest { entry_ids, status })?;

        self.send_with_retry(|| {
            self.http
                .request(Method::PUT, url.clone())
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .body(body.clone())
        })
        .await?;
        Ok(())
    }

    async fn feeds(&self) -> Result<Vec<Feed>, SourceError> {
        let url = self.endpoint("v1/feeds")?;
        let body = self
            .send_with_retry(|| self.http.request(Method::GET, url.clone()))
            .await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Collect the body as UTF-8 text, refusing anything over [`MAX_RESPONSE_SIZE`].
async fn read_body(response: reqwest::Response) -> Result<String, SourceError> {
    if response
        .content_length()
        .is_some_and(|len| len > MAX_RESPONSE_SIZE as u64)
    {
        return Err(SourceError::ResponseTooLarge(MAX_RESPONSE_SIZE));
    }

    let mut stream = response.bytes_stream();
    let mut body = Vec::new();
    while let Some(chunk) = stream.try_next().await? {
        if body.len() + chunk.len() > MAX_RESPONSE_SIZE {
            return Err(SourceError::ResponseTooLarge(MAX_RESPONSE_SIZE));
        }
        body.extend_from_slice(&chunk);
    }

    String::from_utf8(body).map_err(|_| SourceError::InvalidUtf8)
}
