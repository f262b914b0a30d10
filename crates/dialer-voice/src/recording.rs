use crate::error::VoiceError;
use std::time::Duration;

/// Largest recording the worker will download (10 MiB).
pub const MAX_RECORDING_BYTES: usize = 10 * 1024 * 1024;

/// Timeout for a recording download.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Downloads access-controlled recordings from the provider.
#[derive(Clone)]
pub struct RecordingFetcher {
    client: reqwest::Client,
    account_sid: String,
    auth_token: String,
}

impl std::fmt::Debug for RecordingFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingFetcher")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"[REDACTED]")
            .finish()
    }
}

impl RecordingFetcher {
    pub fn new(account_sid: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
        }
    }

    /// Fetches the recording at `url` with HTTP basic auth.
    ///
    /// The provider serves WAV when the URL carries no extension.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, VoiceError> {
        let response = self
            .client
            .get(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| VoiceError::RecordingFetch(format!("request: {}", e)))?;

        if !response.status().is_success() {
            return Err(VoiceError::RecordingFetch(format!(
                "status {} for {}",
                response.status(),
                url
            )));
        }

        if let Some(len) = response.content_length() {
            if len as usize > MAX_RECORDING_BYTES {
                return Err(VoiceError::RecordingFetch(format!(
                    "recording exceeds maximum size: {} bytes (limit: {} bytes)",
                    len, MAX_RECORDING_BYTES
                )));
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| VoiceError::RecordingFetch(format!("body: {}", e)))?;

        if bytes.len() > MAX_RECORDING_BYTES {
            return Err(VoiceError::RecordingFetch(format!(
                "recording exceeds maximum size: {} bytes (limit: {} bytes)",
                bytes.len(),
                MAX_RECORDING_BYTES
            )));
        }
        if bytes.is_empty() {
            return Err(VoiceError::RecordingFetch("empty recording".to_string()));
        }

        tracing::debug!(bytes = bytes.len(), "fetched recording");
        Ok(bytes.to_vec())
    }
}
