//! Retrying HTTP client

use std::time::Duration;

use crmsync_common::BackoffPolicy;
use crmsync_domain::CrmSyncError;
use reqwest::{Method, Request, RequestBuilder, Response};
use tracing::debug;

use crate::errors::InfraError;

const USER_AGENT: &str = concat!("crmsync/", env!("CARGO_PKG_VERSION"));

/// Outbound HTTP for webhooks and connectors.
///
/// Connection failures, timeouts and 5xx responses are retried with the
/// configured backoff. Any other response is handed back untouched.
#[derive(Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    attempts: u32,
    backoff: BackoffPolicy,
}

enum Attempt {
    Done(Result<Response, CrmSyncError>),
    Retry,
}

impl HttpClient {
    /// Start from 30s timeouts and three attempts.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Request builder bound to this client; send it with [`send`](Self::send).
    pub fn request(&self, method: Method, url: impl reqwest::IntoUrl) -> RequestBuilder {
        self.inner.request(method, url)
    }

    /// POST `body` as JSON. Non-2xx statuses become errors.
    pub async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<Response, CrmSyncError> {
        self.send(self.request(Method::POST, url).json(body))
            .await?
            .error_for_status()
            .map_err(|err| InfraError::from(err).into())
    }

    /// Send with retries. The last response is returned whatever its status.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, CrmSyncError> {
        let mut attempt = 0;
        loop {
            let request = builder
                .try_clone()
                .ok_or_else(|| CrmSyncError::Internal("streaming body cannot be replayed".into()))?
                .build()
                .map_err(|err| CrmSyncError::from(InfraError::from(err)))?;

            attempt += 1;
            let is_last = attempt >= self.attempts;
            match self.attempt(request, attempt, is_last).await {
                Attempt::Done(outcome) => return outcome,
                Attempt::Retry => {
                    let delay = self.backoff.delay(attempt - 1);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    async fn attempt(&self, request: Request, attempt: u32, is_last: bool) -> Attempt {
        let target = format!("{} {}", request.method(), request.url());
        match self.inner.execute(request).await {
            Ok(response) if response.status().is_server_error() && !is_last => {
                debug!(attempt, %target, status = %response.status(), "server error, retrying");
                Attempt::Retry
            }
            Ok(response) => {
                debug!(attempt, %target, status = %response.status(), "http response");
                Attempt::Done(Ok(response))
            }
            Err(err) if !is_last && transient(&err) => {
                debug!(attempt, %target, error = %err, "transport error, retrying");
                Attempt::Retry
            }
            Err(err) => Attempt::Done(Err(InfraError::from(err).into())),
        }
    }
}

fn transient(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout() || err.is_request()
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    attempts: u32,
    backoff: BackoffPolicy,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(30), attempts: 3, backoff: BackoffPolicy::default() }
    }
}

impl HttpClientBuilder {
    /// Per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Total tries including the first one. Clamped to at least 1.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    /// Delay between attempts.
    pub fn backoff(mut self, policy: BackoffPolicy) -> Self {
        self.backoff = policy;
        self
    }

    /// Build the underlying reqwest client.
    pub fn build(self) -> Result<HttpClient, CrmSyncError> {
        let inner = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .no_proxy()
            .build()
            .map_err(|err| CrmSyncError::from(InfraError::from(err)))?;
        Ok(HttpClient { inner, attempts: self.attempts, backoff: self.backoff })
    }
}
