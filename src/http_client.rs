use anyhow::Context;
use futures::future::BoxFuture;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{AuthManager, RefreshCoordinator, RefreshOutcome};
use crate::error::{ApiError, Result, TransportFailure};

/// Header carrying the bearer credential
pub const AUTHORIZATION: &str = "Authorization";

/// HTTP methods used by the catalog API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
        }
    }
}

/// Transport-agnostic request descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    /// Path relative to the API base URL
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn bearer_token(self, token: &str) -> Self {
        self.header(AUTHORIZATION, format!("Bearer {}", token))
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Current Authorization header value, if any
    pub fn authorization(&self) -> Option<&str> {
        self.headers.get(AUTHORIZATION).map(String::as_str)
    }
}

/// Successful response with a parsed JSON body
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    /// Deserialize the body into a typed value
    pub fn json<T: DeserializeOwned>(self) -> Result<T> {
        serde_json::from_value(self.body)
            .map_err(|e| ApiError::Decode(format!("unexpected response body: {}", e)))
    }
}

/// HTTP transport boundary
///
/// Non-2xx statuses are reported as `TransportFailure` carrying the status and
/// the request that produced it. Uses `BoxFuture` so the pipeline can hold an
/// `Arc<dyn Transport>`.
pub trait Transport: Send + Sync {
    fn execute(&self, request: ApiRequest)
        -> BoxFuture<'_, std::result::Result<ApiResponse, TransportFailure>>;
}

/// reqwest-backed transport rooted at a base URL
pub struct ReqwestTransport {
    /// Shared HTTP client with connection pooling
    client: Client,

    /// API base URL, always ending with a slash
    base_url: Url,
}

impl ReqwestTransport {
    /// Create a new transport
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&normalized)
            .with_context(|| format!("Invalid API base URL: {}", base_url))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn execute_inner(
        &self,
        request: ApiRequest,
    ) -> std::result::Result<ApiResponse, TransportFailure> {
        let url = match self.base_url.join(request.path.trim_start_matches('/')) {
            Ok(url) => url,
            Err(e) => {
                return Err(TransportFailure::new(
                    None,
                    format!("invalid request path: {}", e),
                    request,
                ))
            }
        };

        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                // Categorize the error for better debugging
                let error_kind = if e.is_timeout() {
                    "timeout"
                } else if e.is_connect() {
                    "connection_failed"
                } else if e.is_request() {
                    "request_error"
                } else {
                    "unknown"
                };

                tracing::warn!(
                    error_kind = error_kind,
                    error = %e,
                    method = %request.method,
                    path = %request.path,
                    "HTTP request error"
                );
                return Err(TransportFailure::new(
                    None,
                    format!("{} (kind: {})", e, error_kind),
                    request,
                ));
            }
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                return Err(TransportFailure::new(
                    Some(status.as_u16()),
                    format!("failed to read response body: {}", e),
                    request,
                ))
            }
        };

        if !status.is_success() {
            tracing::debug!(
                status = status.as_u16(),
                method = %request.method,
                path = %request.path,
                "Received error response"
            );
            return Err(TransportFailure::new(Some(status.as_u16()), text, request));
        }

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str(&text) {
                Ok(body) => body,
                Err(e) => {
                    return Err(TransportFailure::new(
                        Some(status.as_u16()),
                        format!("invalid JSON body: {}", e),
                        request,
                    ))
                }
            }
        };

        Ok(ApiResponse {
            status: status.as_u16(),
            body,
        })
    }
}

impl Transport for ReqwestTransport {
    fn execute(
        &self,
        request: ApiRequest,
    ) -> BoxFuture<'_, std::result::Result<ApiResponse, TransportFailure>> {
        Box::pin(self.execute_inner(request))
    }
}

/// A request in flight through the pipeline
///
/// `retried` is set once, before the request enters the refresh path, and is
/// never reset. A retried request that fails again is propagated as-is.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    request: ApiRequest,
    retried: bool,
}

impl PendingRequest {
    pub fn new(request: ApiRequest) -> Self {
        Self {
            request,
            retried: false,
        }
    }

    pub fn request(&self) -> &ApiRequest {
        &self.request
    }

    pub fn is_retried(&self) -> bool {
        self.retried
    }

    fn mark_retried(&mut self) {
        self.retried = true;
    }
}

/// Authenticated request pipeline
///
/// Attaches the current bearer credential to every request. On a 401 it
/// joins the shared credential refresh and replays the request once.
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    auth: Arc<AuthManager>,
    coordinator: RefreshCoordinator,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, auth: Arc<AuthManager>) -> Self {
        Self {
            transport,
            auth,
            coordinator: RefreshCoordinator::new(),
        }
    }

    pub fn auth(&self) -> &Arc<AuthManager> {
        &self.auth
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// Send a request through the pipeline
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let mut pending = PendingRequest::new(request);

        match self.dispatch(&pending).await {
            Ok(response) => Ok(response),
            Err(failure) => self.recover(&mut pending, failure).await,
        }
    }

    /// Send a request and deserialize the response body
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        self.send(request).await?.json()
    }

    async fn dispatch(
        &self,
        pending: &PendingRequest,
    ) -> std::result::Result<ApiResponse, TransportFailure> {
        let mut request = pending.request().clone();
        let bearer = self.auth.bearer().await;
        if !bearer.is_empty() {
            request.headers.insert(AUTHORIZATION.to_string(), bearer);
        }

        tracing::debug!(
            method = %request.method,
            path = %request.path,
            "Sending HTTP request"
        );
        self.transport.execute(request).await
    }

    /// Decide what to do with a failed dispatch
    async fn recover(
        &self,
        pending: &mut PendingRequest,
        failure: TransportFailure,
    ) -> Result<ApiResponse> {
        if !failure.is_unauthorized() {
            return Err(failure.into());
        }
        if pending.is_retried() || !self.auth.has_refresh_token().await {
            tracing::debug!(
                path = %pending.request().path,
                retried = pending.is_retried(),
                "Unauthorized response is not refresh-eligible"
            );
            return Err(failure.into());
        }

        pending.mark_retried();
        tracing::warn!(
            path = %pending.request().path,
            "Received 401, refreshing credentials"
        );

        // A refresh that finished after this request was dispatched already
        // produced a newer credential
        let current = self.auth.access_token().await;
        let sent = failure
            .request
            .authorization()
            .and_then(|value| value.strip_prefix("Bearer "));
        let token = if !current.is_empty() && sent != Some(current.as_str()) {
            tracing::debug!(
                path = %pending.request().path,
                "Credential changed since dispatch, replaying without refresh"
            );
            current
        } else {
            match self.coordinator.refresh(&self.auth).await {
                RefreshOutcome::Refreshed(token) => token,
                RefreshOutcome::Failed => return Err(failure.into()),
            }
        };

        let request = pending.request().clone().bearer_token(&token);
        tracing::debug!(
            method = %request.method,
            path = %request.path,
            "Replaying request with refreshed credential"
        );

        match self.transport.execute(request).await {
            Ok(response) => Ok(response),
            Err(failure) => {
                tracing::warn!(
                    status = ?failure.status,
                    path = %failure.request.path,
                    "Replayed request failed"
                );
                Err(failure.into())
            }
        }
    }
}
