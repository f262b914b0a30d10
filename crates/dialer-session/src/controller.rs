//! The call controller task.
//!
//! A single task owns the signaling device and the current call session and
//! consumes one channel carrying user commands, provider events and token
//! fetch results. State is only mutated inside that task, so a burst of
//! termination events (remote hangup racing a local hangup, say) is resolved
//! by the state check alone: the first event to reach `ended` writes the log
//! and every later one finds no call in flight.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dialer_types::{
    classify_outcome, compose_destination, normalize_digits, split_country_code, CallDirection,
    CallReport, CallStatus, DestinationError,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::device::{CallLogSink, Clock, ProviderEventSender, SignalingDevice, TokenSource};
use crate::error::SessionError;
use crate::event::{transition, Command, Input, ProviderEvent, TokenPurpose, Transition};
use crate::state::{CallState, SessionSnapshot};

/// How long a finished call stays on screen before the phone is ready again.
pub const DISPLAY_DELAY: Duration = Duration::from_secs(3);

/// Capacity of the controller's input channel.
const INPUT_CAPACITY: usize = 64;

const MSG_NOT_READY: &str = "The phone is not connected yet.";
const MSG_BUSY: &str = "Finish the current call before dialing again.";
const MSG_EMPTY_NUMBER: &str = "Enter a phone number to call.";
const MSG_NO_COUNTRY_CODE: &str = "Choose a country code.";

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub display_delay: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            display_delay: DISPLAY_DELAY,
        }
    }
}

/// The live call attempt. Exists from dial until the attempt ends.
#[derive(Debug)]
struct CallSession {
    attempt_id: String,
    phone_number: String,
    country_code: String,
    lead_id: Option<String>,
    provider_call_id: Option<String>,
    connected_at: Option<DateTime<Utc>>,
    muted: bool,
}

/// Client-side handle to a running controller.
#[derive(Debug)]
pub struct CallHandle {
    inputs: mpsc::Sender<Input>,
    snapshots: watch::Receiver<SessionSnapshot>,
    task: JoinHandle<()>,
}

impl CallHandle {
    async fn send(&self, command: Command) -> Result<(), SessionError> {
        self.inputs
            .send(Input::Command(command))
            .await
            .map_err(|_| SessionError::Closed)
    }

    pub async fn initialize(&self) -> Result<(), SessionError> {
        self.send(Command::Initialize).await
    }

    pub async fn retry(&self) -> Result<(), SessionError> {
        self.send(Command::Retry).await
    }

    pub async fn dial(
        &self,
        number: impl Into<String>,
        country_code: impl Into<String>,
        lead_id: Option<String>,
    ) -> Result<(), SessionError> {
        self.send(Command::Dial {
            number: number.into(),
            country_code: country_code.into(),
            lead_id,
        })
        .await
    }

    pub async fn hangup(&self) -> Result<(), SessionError> {
        self.send(Command::Hangup).await
    }

    pub async fn set_muted(&self, muted: bool) -> Result<(), SessionError> {
        self.send(Command::SetMuted(muted)).await
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Stops the controller, ending any call in flight, and waits for it.
    pub async fn shutdown(self) {
        let _ = self.inputs.send(Input::Shutdown).await;
        if let Err(e) = self.task.await {
            warn!(error = %e, "call controller task did not stop cleanly");
        }
    }
}

pub struct CallController<D> {
    device: D,
    tokens: Arc<dyn TokenSource>,
    sink: Arc<dyn CallLogSink>,
    clock: Arc<dyn Clock>,
    inputs: mpsc::Sender<Input>,
    snapshots: watch::Sender<SessionSnapshot>,
    settings: ControllerSettings,
    state: CallState,
    session: Option<CallSession>,
    message: Option<String>,
    ended_elapsed: u64,
    reset_at: Option<Instant>,
}

impl<D: SignalingDevice + 'static> CallController<D> {
    /// Starts a controller task in state `idle`.
    ///
    /// `make_device` receives the sender the device uses to report provider
    /// events.
    pub fn spawn<F>(
        make_device: F,
        tokens: Arc<dyn TokenSource>,
        sink: Arc<dyn CallLogSink>,
        clock: Arc<dyn Clock>,
        settings: ControllerSettings,
    ) -> CallHandle
    where
        F: FnOnce(ProviderEventSender) -> D,
    {
        let (inputs_tx, inputs_rx) = mpsc::channel(INPUT_CAPACITY);
        let (snapshots_tx, snapshots_rx) = watch::channel(SessionSnapshot::default());
        let device = make_device(ProviderEventSender::new(inputs_tx.clone()));

        let controller = Self {
            device,
            tokens,
            sink,
            clock,
            inputs: inputs_tx.clone(),
            snapshots: snapshots_tx,
            settings,
            state: CallState::Idle,
            session: None,
            message: None,
            ended_elapsed: 0,
            reset_at: None,
        };
        let task = tokio::spawn(controller.run(inputs_rx));

        CallHandle {
            inputs: inputs_tx,
            snapshots: snapshots_rx,
            task,
        }
    }

    async fn run(mut self, mut inputs: mpsc::Receiver<Input>) {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let reset_at = self.reset_at;
            tokio::select! {
                input = inputs.recv() => {
                    let Some(input) = input else { break };
                    if self.handle(input).await.is_break() {
                        break;
                    }
                }
                _ = tokio::time::sleep_until(reset_at.unwrap_or_else(Instant::now)), if reset_at.is_some() => {
                    self.finish_display();
                }
                _ = ticker.tick(), if self.state == CallState::Connected => {
                    self.publish();
                }
            }
        }

        self.teardown().await;
    }

    async fn handle(&mut self, input: Input) -> ControlFlow<()> {
        match input {
            Input::Command(command) => self.on_command(command).await,
            Input::Provider(event) => self.on_provider_event(event).await,
            Input::TokenFetched { purpose, result } => self.on_token(purpose, result).await,
            Input::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    async fn on_command(&mut self, command: Command) {
        match command {
            Command::Initialize if self.state == CallState::Idle => self.begin_initialize(),
            Command::Retry if self.state == CallState::Error => self.begin_initialize(),
            Command::Dial {
                number,
                country_code,
                lead_id,
            } => self.dial(&number, &country_code, lead_id).await,
            Command::Hangup if self.state.is_in_call() => {
                info!("user hung up");
                self.device.disconnect().await;
                self.end_call(None);
            }
            Command::SetMuted(muted) if self.state == CallState::Connected => {
                match self.device.set_muted(muted).await {
                    Ok(()) => {
                        if let Some(session) = self.session.as_mut() {
                            session.muted = muted;
                        }
                        self.publish();
                    }
                    Err(e) => warn!(error = %e, muted, "failed to change mute state"),
                }
            }
            other => debug!(command = ?other, state = %self.state, "ignoring command"),
        }
    }

    fn begin_initialize(&mut self) {
        info!("initializing phone");
        self.state = CallState::Initializing;
        self.message = None;
        self.publish();
        self.request_token(TokenPurpose::Register);
    }

    /// Fetches a token off the controller task; the result comes back as an input.
    fn request_token(&self, purpose: TokenPurpose) {
        let tokens = Arc::clone(&self.tokens);
        let inputs = self.inputs.clone();
        tokio::spawn(async move {
            let result = tokens.fetch_token().await;
            let _ = inputs.send(Input::TokenFetched { purpose, result }).await;
        });
    }

    async fn on_token(&mut self, purpose: TokenPurpose, result: Result<String, SessionError>) {
        match (purpose, result) {
            (TokenPurpose::Register, _) if self.state != CallState::Initializing => {
                debug!(state = %self.state, "discarding stale registration token");
            }
            (TokenPurpose::Register, Ok(token)) => {
                if let Err(e) = self.device.register(&token).await {
                    self.enter_error(e.to_string());
                }
            }
            (TokenPurpose::Register, Err(e)) => self.enter_error(e.to_string()),
            (TokenPurpose::Refresh, Ok(token)) => match self.device.update_token(&token).await {
                Ok(()) => info!(state = %self.state, "access token refreshed"),
                Err(e) => warn!(error = %e, "failed to swap refreshed token"),
            },
            (TokenPurpose::Refresh, Err(e)) => {
                warn!(error = %e, "token refresh failed; keeping current token");
            }
        }
    }

    async fn dial(&mut self, number: &str, country_code: &str, lead_id: Option<String>) {
        if self.state != CallState::Ready {
            let message = if self.state.is_in_call() || self.state == CallState::Ended {
                MSG_BUSY
            } else {
                MSG_NOT_READY
            };
            self.show_message(message);
            return;
        }

        let destination = match compose_destination(country_code, number) {
            Ok(destination) => destination,
            Err(e) => {
                info!(error = %e, "refusing dial");
                self.show_message(match e {
                    DestinationError::EmptyNumber => MSG_EMPTY_NUMBER,
                    DestinationError::MissingCountryCode => MSG_NO_COUNTRY_CODE,
                });
                return;
            }
        };
        let (country_code, phone_number) = split_destination(number, country_code, &destination);

        let session = CallSession {
            attempt_id: Uuid::new_v4().to_string(),
            phone_number,
            country_code,
            lead_id,
            provider_call_id: None,
            connected_at: None,
            muted: false,
        };
        info!(
            attempt_id = %session.attempt_id,
            destination = %destination,
            "placing call"
        );
        self.session = Some(session);
        self.state = CallState::Connecting;
        self.message = None;
        self.publish();

        if let Err(e) = self.device.connect(&destination).await {
            self.fail(e.to_string()).await;
        }
    }

    async fn on_provider_event(&mut self, event: ProviderEvent) {
        match transition(self.state, &event) {
            Transition::Registered => {
                info!("phone registered");
                self.state = CallState::Ready;
                self.message = None;
                self.publish();
            }
            Transition::Ringing => {
                self.state = CallState::Ringing;
                self.publish();
            }
            Transition::Answered { call_sid } => {
                let now = self.clock.now();
                if let Some(session) = self.session.as_mut() {
                    info!(attempt_id = %session.attempt_id, call_sid = %call_sid, "call answered");
                    session.provider_call_id = Some(call_sid);
                    session.connected_at = Some(now);
                }
                self.state = CallState::Connected;
                self.publish();
            }
            Transition::End { signal } => {
                debug!(event = event.name(), "remote side ended the call");
                self.end_call(signal);
            }
            Transition::Fail { message } => self.fail(message).await,
            Transition::RejectIncoming { call_sid } => {
                info!(call_sid = ?call_sid, "rejecting inbound call");
                self.device.reject_incoming(call_sid.as_deref()).await;
            }
            Transition::RefreshToken => self.request_token(TokenPurpose::Refresh),
            Transition::Ignore => {
                debug!(event = event.name(), state = %self.state, "ignoring provider event");
            }
        }
    }

    /// Moves a call in flight to `ended` and hands its report to the sink.
    ///
    /// A no-op unless a call is in flight.
    fn end_call(&mut self, signal: Option<CallStatus>) {
        if !self.state.is_in_call() {
            return;
        }
        let Some(session) = self.session.take() else {
            return;
        };

        let duration_seconds = session
            .connected_at
            .map(|at| elapsed_between(at, self.clock.now()))
            .unwrap_or(0);
        let status = classify_outcome(duration_seconds, signal);

        info!(
            attempt_id = %session.attempt_id,
            call_sid = ?session.provider_call_id,
            status = %status,
            duration_seconds,
            "call ended"
        );

        let report = CallReport {
            attempt_id: session.attempt_id,
            phone_number: session.phone_number,
            country_code: session.country_code,
            duration_seconds,
            direction: CallDirection::Outbound,
            status,
            lead_id: session.lead_id,
            provider_call_id: session.provider_call_id,
        };
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            let attempt_id = report.attempt_id.clone();
            if let Err(e) = sink.record(report).await {
                warn!(attempt_id = %attempt_id, error = %e, "failed to write call log");
            }
        });

        self.state = CallState::Ended;
        self.ended_elapsed = duration_seconds;
        self.reset_at = Some(Instant::now() + self.settings.display_delay);
        self.publish();
    }

    /// Ends any call in flight as failed, then parks in `error`.
    async fn fail(&mut self, message: String) {
        if self.state.is_in_call() {
            self.device.disconnect().await;
            self.end_call(Some(CallStatus::Failed));
        }
        self.enter_error(message);
    }

    fn enter_error(&mut self, message: String) {
        warn!(error = %message, state = %self.state, "signaling error");
        self.state = CallState::Error;
        self.reset_at = None;
        self.ended_elapsed = 0;
        self.message = Some(message);
        self.publish();
    }

    fn finish_display(&mut self) {
        self.reset_at = None;
        if self.state == CallState::Ended {
            self.state = CallState::Ready;
            self.ended_elapsed = 0;
            self.publish();
        }
    }

    fn show_message(&mut self, message: &str) {
        info!(state = %self.state, "{}", message);
        self.message = Some(message.to_string());
        self.publish();
    }

    async fn teardown(&mut self) {
        if self.state.is_in_call() {
            self.device.disconnect().await;
            self.end_call(None);
        }
        self.session = None;
        debug!("call controller stopped");
    }

    fn elapsed_seconds(&self) -> u64 {
        match self.state {
            CallState::Connected => self
                .session
                .as_ref()
                .and_then(|s| s.connected_at)
                .map(|at| elapsed_between(at, self.clock.now()))
                .unwrap_or(0),
            CallState::Ended => self.ended_elapsed,
            _ => 0,
        }
    }

    fn publish(&self) {
        let snapshot = SessionSnapshot {
            state: self.state,
            elapsed_seconds: self.elapsed_seconds(),
            muted: self.session.as_ref().is_some_and(|s| s.muted),
            message: self.message.clone(),
        };
        self.snapshots.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}

fn elapsed_between(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    u64::try_from((end - start).num_seconds()).unwrap_or(0)
}

/// Splits the dialed destination into the country code and national number
/// stored in the call log.
fn split_destination(number: &str, country_code: &str, destination: &str) -> (String, String) {
    let typed_international = normalize_digits(number).starts_with('+');
    if typed_international {
        if let Some((prefix, national)) = split_country_code(destination) {
            return (prefix.code.to_string(), national);
        }
    }

    let code: String = country_code.chars().filter(|c| c.is_ascii_digit()).collect();
    let digits = destination.trim_start_matches('+');
    let national = digits.strip_prefix(code.as_str()).unwrap_or(digits);
    (code, national.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn national_number_keeps_selected_country() {
        assert_eq!(
            split_destination("12 34 56 78", "45", "+4512345678"),
            ("45".to_string(), "12345678".to_string())
        );
    }

    #[test]
    fn pasted_international_number_is_split_by_prefix() {
        assert_eq!(
            split_destination("+46 70 123 45 67", "45", "+46701234567"),
            ("46".to_string(), "701234567".to_string())
        );
        assert_eq!(
            split_destination("0045 12345678", "46", "+4512345678"),
            ("45".to_string(), "12345678".to_string())
        );
    }

    #[test]
    fn negative_elapsed_is_zero() {
        let now = Utc::now();
        assert_eq!(elapsed_between(now, now - chrono::Duration::seconds(4)), 0);
        assert_eq!(elapsed_between(now, now + chrono::Duration::seconds(4)), 4);
    }
}
