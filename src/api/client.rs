//! JSON-over-HTTP client used for the conformance API and `api` actions

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;
use url::Url;

use crate::common::{logging::mask_authorization, Error, Result};
use crate::engine::{capture, Variables};

/// Accepted response statuses
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExpectStatus {
    /// Any 2xx status
    #[default]
    Success,
    /// Exactly one of these statuses
    Codes(Vec<u16>),
}

impl ExpectStatus {
    pub fn accepts(&self, status: u16) -> bool {
        match self {
            Self::Success => (200..300).contains(&status),
            Self::Codes(codes) => codes.contains(&status),
        }
    }
}

/// A JSON request description
#[derive(Debug)]
pub struct JsonRequest<'a> {
    method: Method,
    url: &'a str,
    headers: HeaderMap,
    body: Option<&'a Value>,
    expect: ExpectStatus,
    allow_non_json: bool,
}

impl<'a> JsonRequest<'a> {
    pub fn new(method: Method, url: &'a str) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            expect: ExpectStatus::Success,
            allow_non_json: false,
        }
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn body(mut self, body: Option<&'a Value>) -> Self {
        self.body = body;
        self
    }

    pub fn expect(mut self, expect: ExpectStatus) -> Self {
        self.expect = expect;
        self
    }

    /// Tolerate response bodies that are not JSON (parsed as `{}`)
    pub fn allow_non_json(mut self, allow: bool) -> Self {
        self.allow_non_json = allow;
        self
    }
}

/// A successful response
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub url: String,
    pub status: u16,
    /// Raw response text
    pub text: String,
    /// Parsed body; `{}` when the body was empty or tolerated non-JSON
    pub body: Value,
    allow_non_json: bool,
}

impl HttpReply {
    /// Capture variables from the request URL, the raw text (when non-JSON was
    /// allowed) and the parsed body, in that order
    pub fn capture_into(&self, names: &[String], store: &mut Variables) {
        capture::capture_from_url(&self.url, names, store);
        if self.allow_non_json && !self.text.is_empty() {
            capture::capture_from_value(&Value::String(self.text.clone()), names, store);
        }
        capture::capture_from_value(&self.body, names, store);
    }
}

/// Thin reqwest wrapper with base URL and bearer-token handling
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    base_url: Option<String>,
    token: Option<String>,
}

impl HttpClient {
    pub fn new(base_url: Option<&str>, token: Option<&str>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.map(|b| b.trim_end_matches('/').to_string()),
            token: token.map(str::to_string),
        })
    }

    /// Resolve `endpoint` against the base URL
    pub fn build_url(&self, endpoint: &str) -> Result<Url> {
        let base = self
            .base_url
            .as_deref()
            .filter(|b| !b.is_empty())
            .ok_or_else(|| Error::Config("Base URL is required to build URL".to_string()))?;
        let base = Url::parse(&format!("{base}/"))
            .map_err(|e| Error::Config(format!("Invalid base URL '{base}': {e}")))?;
        base.join(endpoint)
            .map_err(|e| Error::Config(format!("Invalid endpoint '{endpoint}': {e}")))
    }

    /// JSON content type, then `extra`, then the bearer token when configured
    pub fn auth_headers(&self, extra: Option<&BTreeMap<String, String>>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        for (name, value) in extra.into_iter().flatten() {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Config(format!("Invalid header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::Config(format!("Invalid value for header '{name}': {e}")))?;
            headers.insert(name, value);
        }

        if let Some(token) = &self.token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| Error::Config(format!("Invalid token: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        Ok(headers)
    }

    /// Send a request and decode its JSON response
    pub async fn request_json(&self, request: JsonRequest<'_>) -> Result<HttpReply> {
        let authorization = request
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(mask_authorization);
        tracing::debug!(
            method = %request.method,
            url = request.url,
            authorization = authorization.as_deref(),
            "HTTP request"
        );

        let mut builder = self
            .client
            .request(request.method.clone(), request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(serde_json::to_vec(body)?);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;

        tracing::debug!(url = request.url, status, "HTTP response");

        if !request.expect.accepts(status) {
            return Err(Error::HttpStatus { status, body: text });
        }

        let body = if text.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            match serde_json::from_str(&text) {
                Ok(value) => value,
                Err(_) if request.allow_non_json => Value::Object(Default::default()),
                Err(e) => return Err(Error::InvalidJson(e.to_string())),
            }
        };

        Ok(HttpReply {
            url: request.url.to_string(),
            status,
            text,
            body,
            allow_non_json: request.allow_non_json,
        })
    }
}
