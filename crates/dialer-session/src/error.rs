use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("signaling error: {0}")]
    Signaling(String),

    #[error("token request failed: {0}")]
    Token(String),

    #[error("call log write failed: {0}")]
    CallLog(String),

    #[error("not authenticated")]
    Unauthenticated,

    #[error("call controller has stopped")]
    Closed,
}
