use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("access token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("recording fetch error: {0}")]
    RecordingFetch(String),

    #[error("STT error: {0}")]
    Stt(String),
}

/// Why a provider request failed signature validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WebhookValidationError {
    #[error("request signature header missing")]
    MissingSignature,

    #[error("request signature is not valid base64")]
    MalformedSignature,

    #[error("request signature does not match")]
    Mismatch,
}
