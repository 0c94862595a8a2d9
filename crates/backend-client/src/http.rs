//! HTTP transport
//!
//! Request/response types and the reqwest-backed client shared by the
//! configuration loader and the REST backends. Error bodies of the form
//! `{"error": {"code": 400, "message": "...", "status": "..."}}` are
//! turned into [`Error::Service`].

use reqwest::{Client as ReqwestClient, Response as ReqwestResponse};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::{Error, Result};

// =============================================================================
// Request Types
// =============================================================================

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET request
    Get,
    /// POST request
    Post,
    /// PATCH request
    Patch,
}

impl HttpMethod {
    /// Method name as sent on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
        }
    }
}

/// HTTP request against an absolute URL
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method
    pub method: HttpMethod,
    /// Absolute URL
    pub url: String,
    /// Query parameters
    pub params: Vec<(String, String)>,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// JSON body
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Create a new request
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            params: Vec::new(),
            headers: HashMap::new(),
            body: None,
        }
    }

    /// Create a GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    /// Create a POST request
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    /// Create a PATCH request
    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, url)
    }

    /// Add a query parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Add a header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Add a bearer token, if one is given
    pub fn bearer(self, token: Option<&str>) -> Self {
        match token {
            Some(token) => self.header("Authorization", format!("Bearer {}", token)),
            None => self,
        }
    }

    /// Set the request body from JSON
    pub fn json_body<T: Serialize>(mut self, value: &T) -> Result<Self> {
        self.body = Some(serde_json::to_vec(value)?);
        Ok(self)
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// Successful HTTP response with decoded body
#[derive(Debug, Clone)]
pub struct HttpResponse<T> {
    /// HTTP status code
    pub status: u16,
    /// Response data
    pub data: T,
}

/// Standard error envelope returned by the hosted services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Error details
    pub error: ErrorBody,
}

/// Error details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Numeric code (usually the HTTP status)
    #[serde(default)]
    pub code: u16,
    /// Human-readable message
    #[serde(default)]
    pub message: String,
    /// Canonical status name (e.g. "NOT_FOUND")
    #[serde(default)]
    pub status: Option<String>,
}

// =============================================================================
// Client Configuration
// =============================================================================

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("Inkwell/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Set the timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

// =============================================================================
// Client Implementation
// =============================================================================

/// JSON-over-HTTP client
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: ReqwestClient,
}

impl HttpClient {
    /// Create a new client
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let client = ReqwestClient::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self { client })
    }

    /// Execute a request and decode a JSON body
    pub async fn send<T>(&self, request: HttpRequest) -> Result<HttpResponse<T>>
    where
        T: DeserializeOwned,
    {
        let response = self.execute(request).await?;
        Self::parse_response(response).await
    }

    /// Execute a request, mapping a 404 to `None`
    pub async fn send_optional<T>(&self, request: HttpRequest) -> Result<Option<HttpResponse<T>>>
    where
        T: DeserializeOwned,
    {
        let response = self.execute(request).await?;
        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        Self::parse_response(response).await.map(Some)
    }

    async fn execute(&self, request: HttpRequest) -> Result<ReqwestResponse> {
        let mut req = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
            HttpMethod::Patch => self.client.patch(&request.url),
        };

        if !request.params.is_empty() {
            req = req.query(&request.params);
        }

        for (key, value) in &request.headers {
            req = req.header(key, value);
        }

        if let Some(body) = request.body {
            req = req.header("Content-Type", "application/json").body(body);
        }

        tracing::debug!("{} {}", request.method.as_str(), request.url);
        Ok(req.send().await?)
    }

    async fn parse_response<T>(response: ReqwestResponse) -> Result<HttpResponse<T>>
    where
        T: DeserializeOwned,
    {
        let status = response.status().as_u16();
        let body = response.text().await?;

        if !(200..300).contains(&status) {
            return Err(match serde_json::from_str::<ErrorEnvelope>(&body) {
                Ok(envelope) => {
                    let code = envelope
                        .error
                        .status
                        .unwrap_or_else(|| envelope.error.message.clone());
                    Error::service(status, code, envelope.error.message)
                }
                Err(_) => Error::service(status, "Unknown", format!("HTTP {}: {}", status, body)),
            });
        }

        let data: T = serde_json::from_str(&body)?;
        Ok(HttpResponse { status, data })
    }
}
