//! HTTP implementations of [`TokenSource`] and [`CallLogSink`] against the
//! dialer server.

use crate::device::{CallLogSink, TokenSource};
use crate::error::SessionError;
use async_trait::async_trait;
use dialer_types::CallReport;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

/// Authenticated client for the dialer server's API.
#[derive(Clone)]
pub struct ServerClient {
    client: reqwest::Client,
    base_url: String,
    bearer: String,
}

impl std::fmt::Debug for ServerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerClient")
            .field("base_url", &self.base_url)
            .field("bearer", &"[REDACTED]")
            .finish()
    }
}

impl ServerClient {
    pub fn new(base_url: impl Into<String>, bearer: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bearer: bearer.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl TokenSource for ServerClient {
    async fn fetch_token(&self) -> Result<String, SessionError> {
        let response = self
            .client
            .post(self.url("/api/voice/token"))
            .bearer_auth(&self.bearer)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| SessionError::Token(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED => return Err(SessionError::Unauthenticated),
            status if !status.is_success() => {
                return Err(SessionError::Token(format!("server returned {}", status)));
            }
            _ => {}
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| SessionError::Token(format!("invalid token response: {}", e)))?;
        Ok(body.token)
    }
}

#[async_trait]
impl CallLogSink for ServerClient {
    async fn record(&self, report: CallReport) -> Result<(), SessionError> {
        let response = self
            .client
            .post(self.url("/api/calls"))
            .bearer_auth(&self.bearer)
            .timeout(REQUEST_TIMEOUT)
            .json(&report)
            .send()
            .await
            .map_err(|e| SessionError::CallLog(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED => Err(SessionError::Unauthenticated),
            status if status.is_success() => Ok(()),
            status => Err(SessionError::CallLog(format!("server returned {}", status))),
        }
    }
}
