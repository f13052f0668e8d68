//! HTTP transport for the SWARFARM API
//!
//! Components never talk to `reqwest` directly. They build an [`ApiRequest`]
//! and hand it to a [`Transport`], then turn the reply into an [`Outcome`]
//! with [`classify`]. This keeps the base URL and default headers in one
//! place and lets tests swap the network for a scripted transport.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;

use crate::config::SwarfarmConfig;
use crate::error::{Error, Result};

/// Accepted command list (GET) and log submission (POST)
pub const DATA_LOGS: &str = "data_logs/";

/// Profile upload (POST)
pub const PROFILE_UPLOAD: &str = "profiles/upload/";

/// Status endpoint for a queued profile import
pub fn upload_job_path(job_id: &str) -> String {
    format!("{}{}/", PROFILE_UPLOAD, urlencoding::encode(job_id))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A request against the API root
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API root, e.g. `data_logs/`
    pub path: String,
    /// API key sent as `Authorization: Token <key>`
    pub token: Option<String>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            token: None,
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            token: None,
            body: Some(body),
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }
}

/// Whatever the server answered
#[derive(Debug, Clone, PartialEq)]
pub struct ApiReply {
    pub status: u16,
    /// Parsed JSON body. Text that is not JSON is kept as a string;
    /// `None` if the body was empty or could not be read.
    pub body: Option<Value>,
}

impl ApiReply {
    pub fn new(status: u16, body: Value) -> Self {
        Self {
            status,
            body: Some(body),
        }
    }
}

/// Sends requests to the API root
///
/// `Err` means no response was received at all.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiReply>;
}

/// Closed set of results a component has to handle
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// 200
    Success(Option<Value>),
    /// 401
    Unauthorized(Option<Value>),
    /// 400
    ValidationFailed(Option<Value>),
    /// 409
    Conflict(Option<Value>),
    /// No response received
    TransportFailed(String),
    /// Any other status
    UnexpectedStatus { status: u16, body: Option<Value> },
}

impl Outcome {
    /// Response body, if a response with a JSON body was received
    pub fn body(&self) -> Option<&Value> {
        match self {
            Outcome::Success(body)
            | Outcome::Unauthorized(body)
            | Outcome::ValidationFailed(body)
            | Outcome::Conflict(body)
            | Outcome::UnexpectedStatus { body, .. } => body.as_ref(),
            Outcome::TransportFailed(_) => None,
        }
    }

    /// HTTP status, if a response was received
    pub fn status(&self) -> Option<u16> {
        match self {
            Outcome::Success(_) => Some(200),
            Outcome::Unauthorized(_) => Some(401),
            Outcome::ValidationFailed(_) => Some(400),
            Outcome::Conflict(_) => Some(409),
            Outcome::UnexpectedStatus { status, .. } => Some(*status),
            Outcome::TransportFailed(_) => None,
        }
    }

    /// The server's `detail` field, or the whole body if it has none
    pub fn detail(&self) -> String {
        match self.body() {
            Some(Value::Object(map)) => match map.get("detail") {
                Some(Value::String(detail)) => detail.clone(),
                Some(other) => other.to_string(),
                None => Value::Object(map.clone()).to_string(),
            },
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
            None => "no detail provided".to_string(),
        }
    }
}

/// Interpret a response body: JSON if it parses, the raw text otherwise
pub(crate) fn parse_body(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }
    Some(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())))
}

/// A response body as the server sent it, for user-facing messages
pub fn body_text(body: Option<&Value>) -> String {
    match body {
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
        None => "no response body".to_string(),
    }
}

/// Map a transport result onto an [`Outcome`]
pub fn classify(result: Result<ApiReply>) -> Outcome {
    match result {
        Ok(ApiReply { status: 200, body }) => Outcome::Success(body),
        Ok(ApiReply { status: 400, body }) => Outcome::ValidationFailed(body),
        Ok(ApiReply { status: 401, body }) => Outcome::Unauthorized(body),
        Ok(ApiReply { status: 409, body }) => Outcome::Conflict(body),
        Ok(ApiReply { status, body }) => Outcome::UnexpectedStatus { status, body },
        Err(Error::Transport(message)) => Outcome::TransportFailed(message),
        Err(e) => Outcome::TransportFailed(e.to_string()),
    }
}

/// [`Transport`] over HTTPS using `reqwest`
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a transport bound to `config.server_url`
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: &SwarfarmConfig) -> Result<Self> {
        config.validate()?;

        let base_url = config.server_url.trim_end_matches('/').to_string();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiReply> {
        let url = self.url(&request.path);

        let mut builder = match request.method {
            Method::Get => self.http_client.get(&url),
            Method::Post => self.http_client.post(&url),
        };

        if let Some(token) = &request.token {
            let auth_value = HeaderValue::from_str(&format!("Token {}", token))
                .map_err(|e| Error::Config(format!("invalid api_key: {}", e)))?;
            builder = builder.header(AUTHORIZATION, auth_value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status().as_u16();
        // A status line arrived, so this is a reply even if the body is lost
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(%url, status, error = %e, "Failed to read SWARFARM response body");
                return Ok(ApiReply { status, body: None });
            }
        };

        tracing::trace!(%url, status, "SWARFARM response");

        Ok(ApiReply {
            status,
            body: parse_body(&text),
        })
    }
}
