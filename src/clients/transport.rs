//! HTTP transport shared by the clients.
//!
//! Performs one attempt and classifies it. Timeouts and retries belong to
//! the policy, not here.

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::clients::error::ClientError;
use crate::resilience::AttemptError;

/// A base URL plus a pooled reqwest client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ClientError::Configuration(format!("invalid base URL '{}': {}", base_url, e)))?;
        let client = Client::builder()
            .user_agent(concat!("resilient-poller/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Configuration(e.to_string()))?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url, AttemptError> {
        self.base_url
            .join(path)
            .map_err(|e| AttemptError::NonRetryable(format!("invalid path '{}': {}", path, e)))
    }

    /// `GET path?query` and decode a JSON body.
    pub async fn get_json<T>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, AttemptError>
    where
        T: DeserializeOwned,
    {
        let url = self.url(path)?;
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(classify_send_error)?;
        decode(check_status(response, false).await?).await
    }

    /// `POST path` with a JSON body and decode the JSON response.
    ///
    /// 400 and 422 are validation rejections of what we sent.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, AttemptError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path)?;
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(classify_send_error)?;
        decode(check_status(response, true).await?).await
    }
}

fn classify_send_error(e: reqwest::Error) -> AttemptError {
    if e.is_builder() {
        AttemptError::NonRetryable(format!("request error: {}", e))
    } else {
        // Connect failures, resets and transport timeouts.
        AttemptError::Transient(format!("transport error: {}", e))
    }
}

async fn check_status(response: Response, validates_body: bool) -> Result<Response, AttemptError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(classify_status(status, validates_body, error_detail(status, &body)))
}

/// Longest slice of an error body carried into errors and logs.
const MAX_ERROR_BODY: usize = 256;

fn error_detail(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return format!("status {}", status);
    }
    if body.len() <= MAX_ERROR_BODY {
        return format!("status {}: {}", status, body);
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("status {}: {}... ({} bytes)", status, &body[..end], body.len())
}

/// Map a non-success status to an attempt classification.
pub fn classify_status(status: StatusCode, validates_body: bool, detail: String) -> AttemptError {
    match status {
        StatusCode::NOT_FOUND => AttemptError::NotFound,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY if validates_body => {
            AttemptError::Rejected(detail)
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => AttemptError::Transient(detail),
        s if s.is_server_error() => AttemptError::Transient(detail),
        _ => AttemptError::NonRetryable(detail),
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, AttemptError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| AttemptError::Transient(format!("failed to read body: {}", e)))?;
    serde_json::from_slice(&bytes).map_err(|e| AttemptError::NonRetryable(format!("malformed payload: {}", e)))
}
