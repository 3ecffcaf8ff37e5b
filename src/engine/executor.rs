//! Request executor - sends one request and measures the response
//!
//! Execution happens in two phases:
//! 1. `prepare` resolves every `{{variable}}` and attaches the bearer token.
//!    No network traffic happens here, so an undefined variable fails before
//!    anything is sent.
//! 2. `send` performs the HTTP call under a deadline. There are no retries.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use tracing::{debug, info, instrument, warn};

use crate::collection::{substitute, Environment, Request};
use crate::engine::credentials::Token;
use crate::engine::error::{AuthError, ExecuteError, TransportError};
use crate::engine::result::RequestOutcome;

/// Body of a prepared request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreparedBody {
    Empty,
    Raw(String),
    Form(Vec<(String, String)>),
}

/// A request with every template resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRequest {
    pub name: String,
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: PreparedBody,
}

impl PreparedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Response data captured for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub method: String,
    pub url: String,
    pub status: u16,
    pub latency_ms: u64,
    pub size: usize,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Convert into an outcome with no verdicts yet
    pub fn into_outcome(self, folder: &str, request: &str, iteration: u32) -> RequestOutcome {
        RequestOutcome {
            folder: folder.to_string(),
            request: request.to_string(),
            iteration,
            method: self.method,
            url: self.url,
            status: Some(self.status),
            latency_ms: self.latency_ms,
            response_size: self.size,
            body: self.body,
            verdicts: Vec::new(),
            error: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestExecutor {
    client: reqwest::Client,
}

impl Default for RequestExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestExecutor {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Resolve templates and attach the bearer token
    pub fn prepare(
        &self,
        request: &Request,
        env: &Environment,
        token: Option<&Token>,
    ) -> Result<PreparedRequest, AuthError> {
        let resolve = |template: &str| {
            substitute(template, env).map_err(|e| AuthError::unresolved(&request.name, e))
        };

        let url = resolve(&request.url)?;

        let mut headers = Vec::with_capacity(request.headers.len() + 1);
        for (name, value) in &request.headers {
            headers.push((name.clone(), resolve(value)?));
        }

        let body = match (&request.body, &request.form) {
            (Some(body), _) => PreparedBody::Raw(resolve(body)?),
            (None, Some(form)) => PreparedBody::Form(resolve_form(form, &resolve)?),
            (None, None) => PreparedBody::Empty,
        };

        if request.needs_token() {
            if let Some(token) = token {
                headers.retain(|(k, _)| !k.eq_ignore_ascii_case(AUTHORIZATION.as_str()));
                headers.push((AUTHORIZATION.as_str().to_string(), token.bearer()));
            }
        }

        Ok(PreparedRequest {
            name: request.name.clone(),
            method: request.method.to_uppercase(),
            url,
            headers,
            body,
        })
    }

    /// Send a prepared request under `timeout`
    #[instrument(skip(self, prepared), fields(request = %prepared.name, method = %prepared.method))]
    pub async fn send(
        &self,
        prepared: &PreparedRequest,
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        let timeout_ms = timeout.as_millis() as u64;

        let method = Method::from_bytes(prepared.method.as_bytes()).map_err(|_| {
            TransportError::InvalidRequest(format!("unknown HTTP method {}", prepared.method))
        })?;
        let url = reqwest::Url::parse(&prepared.url).map_err(|e| {
            TransportError::InvalidRequest(format!("invalid url '{}': {}", prepared.url, e))
        })?;

        let mut builder = self
            .client
            .request(method, url)
            .headers(header_map(&prepared.headers)?);

        builder = match &prepared.body {
            PreparedBody::Empty => builder,
            PreparedBody::Raw(body) => builder.body(body.clone()),
            PreparedBody::Form(fields) => builder.form(fields),
        };

        debug!("Executing {} {}", prepared.method, prepared.url);
        let start = Instant::now();

        let exchange = async {
            let response = builder.send().await?;
            let status = response.status().as_u16();
            let bytes = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, bytes))
        };

        let (status, bytes) = match tokio::time::timeout(timeout, exchange).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                let err = classify(e, timeout_ms);
                warn!(error = %err, "Request failed");
                return Err(err);
            }
            Err(_) => {
                warn!(timeout_ms, "Request timed out");
                return Err(TransportError::Timeout(timeout_ms));
            }
        };

        let latency_ms = start.elapsed().as_millis() as u64;
        info!(
            "{} {} -> {} ({}ms)",
            prepared.method, prepared.url, status, latency_ms
        );

        Ok(HttpResponse {
            method: prepared.method.clone(),
            url: prepared.url.clone(),
            status,
            latency_ms,
            size: bytes.len(),
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }

    /// Prepare and send in one step
    pub async fn execute(
        &self,
        request: &Request,
        env: &Environment,
        token: Option<&Token>,
        timeout: Duration,
    ) -> Result<HttpResponse, ExecuteError> {
        let prepared = self.prepare(request, env, token)?;
        Ok(self.send(&prepared, timeout).await?)
    }
}

fn resolve_form<F>(
    form: &BTreeMap<String, String>,
    resolve: &F,
) -> Result<Vec<(String, String)>, AuthError>
where
    F: Fn(&str) -> Result<String, AuthError>,
{
    form.iter()
        .map(|(k, v)| Ok((k.clone(), resolve(v)?)))
        .collect()
}

fn header_map(headers: &[(String, String)]) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| TransportError::InvalidRequest(format!("invalid header name '{}'", name)))?;
        let value = HeaderValue::from_str(value).map_err(|_| {
            TransportError::InvalidRequest(format!("invalid value for header '{}'", name))
        })?;
        map.append(name, value);
    }
    Ok(map)
}

fn classify(err: reqwest::Error, timeout_ms: u64) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(timeout_ms)
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Request(err.to_string())
    }
}
