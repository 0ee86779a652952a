//! HTTP seam shared by both registry clients

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// One failed registry request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("HTTP status {0}")]
    Status(u16),

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("registry result code {code}: {message}")]
    ResultCode { code: String, message: String },
}

impl TransportError {
    /// Rate limiting, server errors, timeouts and bad payloads are retried.
    /// Any other 4xx is final.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Status(code) => *code == 429 || *code >= 500,
            TransportError::Timeout
            | TransportError::Network(_)
            | TransportError::Decode(_)
            | TransportError::ResultCode { .. } => true,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_decode() {
            TransportError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            TransportError::Status(status.as_u16())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

/// GET a JSON document
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> std::result::Result<Value, TransportError>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("drugmatch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> std::result::Result<Value, TransportError> {
        debug!(url, "GET");
        let response = self.client.get(url).query(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        assert!(TransportError::Status(429).is_retryable());
        assert!(TransportError::Status(503).is_retryable());
        assert!(!TransportError::Status(404).is_retryable());
        assert!(!TransportError::Status(400).is_retryable());
        assert!(TransportError::Timeout.is_retryable());
        assert!(TransportError::Decode("eof".into()).is_retryable());
    }

    #[test]
    fn test_result_code_display() {
        let err = TransportError::ResultCode {
            code: "30".into(),
            message: "SERVICE KEY IS NOT REGISTERED".into(),
        };
        assert_eq!(
            err.to_string(),
            "registry result code 30: SERVICE KEY IS NOT REGISTERED"
        );
    }
}
