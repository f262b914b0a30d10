use crate::config::SpeechConfig;
use crate::error::VoiceError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Largest recording sent for recognition (7 MiB).
///
/// Audio travels inline as base64, which must stay under the service's
/// 10 MB request limit.
const MAX_STT_INPUT_BYTES: usize = 7 * 1024 * 1024;

/// Timeout for a single HTTP request to the service.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Boost applied to the priming phrases.
const PHRASE_BOOST: f32 = 10.0;

/// Channel carrying the parent leg of a dual recording (the seller's browser).
const SELLER_CHANNEL: u32 = 1;

/// Channel carrying the dialed party.
const CUSTOMER_CHANNEL: u32 = 2;

#[derive(Debug, Deserialize)]
struct Operation {
    #[serde(default)]
    name: String,
    #[serde(default)]
    done: bool,
    response: Option<RecognizeResponse>,
    error: Option<OperationError>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<RecognitionResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecognitionResult {
    #[serde(default)]
    alternatives: Vec<Alternative>,
    #[serde(default)]
    channel_tag: u32,
    #[serde(default)]
    result_end_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    #[serde(default)]
    transcript: String,
}

/// Speech-to-text client for finished call recordings.
///
/// Uses asynchronous recognition so recordings longer than a minute are
/// accepted, and recognizes both legs of the dual-channel recording
/// separately.
#[derive(Debug, Clone)]
pub struct SttService {
    client: reqwest::Client,
    config: SpeechConfig,
}

impl SttService {
    pub fn new(config: SpeechConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_enabled()
    }

    /// Builds the recognition request body for a dual-channel call recording.
    pub fn request_body(&self, audio_data: &[u8]) -> Value {
        let mut config = json!({
            "languageCode": self.config.language_code,
            "audioChannelCount": 2,
            "enableSeparateRecognitionPerChannel": true,
            "enableAutomaticPunctuation": true,
            "speechContexts": [{
                "phrases": self.config.phrases,
                "boost": PHRASE_BOOST,
            }],
        });
        if let Some(model) = &self.config.model {
            config["model"] = json!(model);
        }

        json!({
            "config": config,
            "audio": { "content": STANDARD.encode(audio_data) },
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Transcribes a dual-channel recording.
    ///
    /// Starts a recognition operation and polls it until it finishes or
    /// `max_wait_seconds` elapse.
    pub async fn transcribe(&self, audio_data: &[u8]) -> Result<String, VoiceError> {
        if audio_data.len() > MAX_STT_INPUT_BYTES {
            return Err(VoiceError::Stt(format!(
                "audio data exceeds maximum size: {} bytes (limit: {} bytes)",
                audio_data.len(),
                MAX_STT_INPUT_BYTES
            )));
        }
        if !self.is_enabled() {
            return Err(VoiceError::Config("speech-to-text API key missing".to_string()));
        }

        tracing::debug!(
            bytes = audio_data.len(),
            language = %self.config.language_code,
            "starting speech-to-text operation"
        );

        let request = self
            .client
            .post(self.url("speech:longrunningrecognize"))
            .json(&self.request_body(audio_data));
        let mut operation = self.send(request).await?;
        if operation.name.is_empty() && !operation.done {
            return Err(VoiceError::Stt("operation has no name".to_string()));
        }

        let deadline =
            tokio::time::Instant::now() + Duration::from_secs(self.config.max_wait_seconds);
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);

        while !operation.done {
            if tokio::time::Instant::now() + poll_interval > deadline {
                return Err(VoiceError::Stt(format!(
                    "operation {} did not finish within {}s",
                    operation.name, self.config.max_wait_seconds
                )));
            }
            tokio::time::sleep(poll_interval).await;

            let name = operation.name.clone();
            let request = self.client.get(self.url(&format!("operations/{}", name)));
            operation = self.send(request).await?;
            if operation.name.is_empty() {
                operation.name = name;
            }
        }

        if let Some(error) = operation.error {
            return Err(VoiceError::Stt(format!(
                "operation {} failed ({}): {}",
                operation.name, error.code, error.message
            )));
        }

        Ok(operation
            .response
            .map(render_transcript)
            .unwrap_or_default())
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Operation, VoiceError> {
        let response = request
            .query(&[("key", self.config.api_key.as_str())])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| VoiceError::Stt(format!("request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(VoiceError::Stt(format!("status {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| VoiceError::Stt(format!("body: {}", e)))
    }
}

fn speaker_label(channel_tag: u32) -> Option<&'static str> {
    match channel_tag {
        SELLER_CHANNEL => Some("Sælger"),
        CUSTOMER_CHANNEL => Some("Kunde"),
        _ => None,
    }
}

/// Parses a protobuf duration such as `"12.300s"` into milliseconds.
fn end_time_millis(raw: &str) -> Option<u64> {
    let seconds: f64 = raw.trim().strip_suffix('s')?.parse().ok()?;
    (seconds >= 0.0).then(|| (seconds * 1000.0).round() as u64)
}

/// Renders recognition results as a conversation.
///
/// Segments are ordered by end time; consecutive segments of one channel
/// are merged into a single line prefixed with the speaker. Results without
/// a channel tag are joined without a prefix.
fn render_transcript(response: RecognizeResponse) -> String {
    let mut segments: Vec<(u32, Option<u64>, String)> = response
        .results
        .into_iter()
        .filter_map(|r| {
            let text = r.alternatives.into_iter().next()?.transcript.trim().to_string();
            let end = r.result_end_time.as_deref().and_then(end_time_millis);
            (!text.is_empty()).then_some((r.channel_tag, end, text))
        })
        .collect();
    segments.sort_by_key(|(_, end, _)| end.unwrap_or(u64::MAX));

    let mut lines: Vec<(u32, String)> = Vec::new();
    for (channel, _, text) in segments {
        match lines.last_mut() {
            Some((last, line)) if *last == channel => {
                line.push(' ');
                line.push_str(&text);
            }
            _ => lines.push((channel, text)),
        }
    }

    lines
        .into_iter()
        .map(|(channel, line)| match speaker_label(channel) {
            Some(label) => format!("{}: {}", label, line),
            None => line,
        })
        .collect::<Vec<_>>()
        .join("\n")
}
