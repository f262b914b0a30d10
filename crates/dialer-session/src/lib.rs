//! Browser-side call controller for the dialer.
//!
//! [`CallController`] drives one phone through
//! `idle → initializing → ready → connecting → ringing → connected → ended`
//! and back to `ready`, with `error` reachable from anywhere and left through
//! an explicit retry. Each call attempt produces exactly one [`CallReport`]
//! for the [`CallLogSink`], whatever mix of user and provider events ends it.
//!
//! The provider SDK, the token endpoint and the log endpoint sit behind the
//! traits in [`device`]; [`http::ServerClient`] implements the latter two
//! against the dialer server.
//!
//! [`CallReport`]: dialer_types::CallReport

pub mod controller;
pub mod device;
pub mod error;
pub mod event;
pub mod http;
pub mod state;

pub use controller::{CallController, CallHandle, ControllerSettings, DISPLAY_DELAY};
pub use device::{CallLogSink, Clock, ProviderEventSender, SignalingDevice, SystemClock, TokenSource};
pub use error::SessionError;
pub use event::{transition, Command, ProviderEvent, TokenPurpose, Transition};
pub use http::ServerClient;
pub use state::{CallState, SessionSnapshot};
