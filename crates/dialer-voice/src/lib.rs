//! Signaling-provider and speech-to-text integration for the dialer.
//!
//! Everything that speaks the provider's protocols lives here: minting
//! browser access tokens, validating the signature on the provider's
//! server-to-server requests, rendering the call-control document returned
//! when the provider asks what to do with an outbound call, fetching a
//! finished recording, and sending it to the speech-to-text service.
//!
//! Nothing in this crate touches the database; the server crate wires these
//! pieces to the call log.

pub mod config;
pub mod error;
pub mod recording;
pub mod signature;
pub mod stt;
pub mod token;
pub mod twiml;

pub use config::{ProviderConfig, SpeechConfig, DEFAULT_PRIMING_PHRASES};
pub use error::{VoiceError, WebhookValidationError};
pub use recording::{RecordingFetcher, MAX_RECORDING_BYTES};
pub use signature::{compute_signature, RequestValidator, SIGNATURE_HEADER};
pub use stt::SttService;
pub use token::{signaling_identity, IssuedToken, TokenIssuer};
pub use twiml::{CallInstructions, CONTENT_TYPE as INSTRUCTIONS_CONTENT_TYPE};
