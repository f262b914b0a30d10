use crate::error::VoiceError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider maximum lifetime for a browser access token.
const MAX_TOKEN_TTL_SECONDS: u64 = 24 * 3600;

fn default_token_ttl_seconds() -> u64 {
    3600
}

fn default_language_code() -> String {
    "da-DK".to_string()
}

fn default_speech_base_url() -> String {
    "https://speech.googleapis.com/v1".to_string()
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_max_wait_seconds() -> u64 {
    600
}

fn default_phrases() -> Vec<String> {
    DEFAULT_PRIMING_PHRASES.iter().map(|p| p.to_string()).collect()
}

/// Greeting and voicemail phrases that dominate outbound sales recordings.
pub const DEFAULT_PRIMING_PHRASES: &[&str] = &[
    "telefonsvarer",
    "læg en besked",
    "efter bippet",
    "du har ringet til",
    "jeg er ikke til stede",
    "ring igen senere",
    "det er",
    "goddag",
    "hej",
];

/// Credentials and numbers for the realtime signaling provider.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub account_sid: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default, skip_serializing)]
    pub api_secret: String,
    /// Shared secret the provider signs its webhooks with; also the basic
    /// auth password for recording downloads.
    #[serde(default, skip_serializing)]
    pub auth_token: String,
    /// Application whose voice URL points at the instructions endpoint.
    #[serde(default)]
    pub twiml_app_sid: String,
    /// Business-owned number presented as caller id.
    #[serde(default)]
    pub caller_id: String,
    /// JWT token TTL in seconds for browser access tokens. Default: 3600 (1 hour).
    #[serde(default = "default_token_ttl_seconds")]
    pub token_ttl_seconds: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            account_sid: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            auth_token: String::new(),
            twiml_app_sid: String::new(),
            caller_id: String::new(),
            token_ttl_seconds: default_token_ttl_seconds(),
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("account_sid", &self.account_sid)
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("auth_token", &"[REDACTED]")
            .field("twiml_app_sid", &self.twiml_app_sid)
            .field("caller_id", &self.caller_id)
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .finish()
    }
}

impl ProviderConfig {
    pub fn new(
        account_sid: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> Self {
        Self {
            account_sid: account_sid.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            auth_token: auth_token.into(),
            ..Self::default()
        }
    }

    pub fn with_app(mut self, twiml_app_sid: impl Into<String>, caller_id: impl Into<String>) -> Self {
        self.twiml_app_sid = twiml_app_sid.into();
        self.caller_id = caller_id.into();
        self
    }

    /// Token lifetime, clamped to `1..=24h`.
    pub fn token_ttl(&self) -> u64 {
        self.token_ttl_seconds.clamp(1, MAX_TOKEN_TTL_SECONDS)
    }

    /// Checks that everything needed to mint tokens is present.
    ///
    /// # Errors
    ///
    /// Returns `VoiceError::Config` naming every missing field.
    pub fn validate_token_credentials(&self) -> Result<(), VoiceError> {
        let missing = missing_fields(&[
            ("account_sid", &self.account_sid),
            ("api_key", &self.api_key),
            ("api_secret", &self.api_secret),
            ("twiml_app_sid", &self.twiml_app_sid),
        ]);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(VoiceError::Config(format!(
                "signaling provider credentials missing: {}",
                missing.join(", ")
            )))
        }
    }

    /// Whether provider webhooks can be authenticated.
    pub fn can_validate_webhooks(&self) -> bool {
        !self.auth_token.is_empty()
    }
}

fn missing_fields(fields: &[(&'static str, &String)]) -> Vec<&'static str> {
    fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect()
}

/// Speech-to-text service settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    #[serde(default, skip_serializing)]
    pub api_key: String,
    /// API root; `speech:longrunningrecognize` and `operations/{name}` are
    /// resolved against it.
    #[serde(default = "default_speech_base_url")]
    pub base_url: String,
    /// BCP-47 language of the recorded conversations.
    #[serde(default = "default_language_code")]
    pub language_code: String,
    /// Recognition model; the service default is used when unset.
    #[serde(default)]
    pub model: Option<String>,
    /// Phrases that bias recognition.
    #[serde(default = "default_phrases")]
    pub phrases: Vec<String>,
    /// Delay between polls of a recognition operation.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Give up on an operation that has not finished after this long.
    #[serde(default = "default_max_wait_seconds")]
    pub max_wait_seconds: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_speech_base_url(),
            language_code: default_language_code(),
            model: None,
            phrases: default_phrases(),
            poll_interval_ms: default_poll_interval_ms(),
            max_wait_seconds: default_max_wait_seconds(),
        }
    }
}

impl fmt::Debug for SpeechConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeechConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("language_code", &self.language_code)
            .field("model", &self.model)
            .field("phrases", &self.phrases.len())
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("max_wait_seconds", &self.max_wait_seconds)
            .finish()
    }
}

impl SpeechConfig {
    pub fn is_enabled(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}
