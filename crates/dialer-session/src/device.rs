//! Seams between the controller and the outside world.

use crate::error::SessionError;
use crate::event::{Input, ProviderEvent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dialer_types::CallReport;
use tokio::sync::mpsc;

/// The provider's signaling device.
///
/// Owned by the controller task; nothing else holds it. Implementations
/// report asynchronous provider activity through a [`ProviderEventSender`].
#[async_trait]
pub trait SignalingDevice: Send {
    /// Registers the device with a fresh access token.
    async fn register(&mut self, token: &str) -> Result<(), SessionError>;

    /// Swaps a refreshed token into the live channel without re-registering.
    async fn update_token(&mut self, token: &str) -> Result<(), SessionError>;

    /// Places an outbound call to an international-format destination.
    async fn connect(&mut self, destination: &str) -> Result<(), SessionError>;

    /// Tears down the active call, if any.
    async fn disconnect(&mut self);

    /// Mutes or unmutes the active media leg.
    async fn set_muted(&mut self, muted: bool) -> Result<(), SessionError>;

    /// Turns down an inbound offer.
    async fn reject_incoming(&mut self, call_sid: Option<&str>);
}

/// Supplies access tokens for the signaling device.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch_token(&self) -> Result<String, SessionError>;
}

/// Receives the single log write of each finished call attempt.
#[async_trait]
pub trait CallLogSink: Send + Sync {
    async fn record(&self, report: CallReport) -> Result<(), SessionError>;
}

/// Wall-clock time source for call durations.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Handed to a [`SignalingDevice`] so it can feed provider events into the
/// controller's input channel.
#[derive(Debug, Clone)]
pub struct ProviderEventSender {
    tx: mpsc::Sender<Input>,
}

impl ProviderEventSender {
    pub(crate) fn new(tx: mpsc::Sender<Input>) -> Self {
        Self { tx }
    }

    /// Delivers `event` to the controller.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] once the controller has stopped.
    pub async fn send(&self, event: ProviderEvent) -> Result<(), SessionError> {
        self.tx
            .send(Input::Provider(event))
            .await
            .map_err(|_| SessionError::Closed)
    }
}
