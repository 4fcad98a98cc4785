//! OAuth popup handshake.
//!
//! One attempt runs `authorize`, opens the consent popup, then waits for the
//! first of two signals: the callback page posting its success message, or
//! the popup being found closed by the poll timer. Waiting consumes the
//! attempt, so whichever signal wins, the listener, the timer and the popup
//! handle are released together and the credentials are fetched from the
//! backend exactly once.

use crate::backend::{BackendError, Identity, IntegrationBackend};
use crate::params::{Credentials, IntegrationParams, IntegrationParamsStore};
use crate::provider::{ItemTypeTag, ProviderName};
use crate::window::{MessageBus, OriginPolicy, PopupError, PopupLauncher, PopupWindow, WindowMessage};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::Instrument;
use uuid::Uuid;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

const CANCELLED_MESSAGE: &str = "The connection attempt was cancelled";

#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    pub poll_interval: Duration,
    pub origin_policy: OriginPolicy,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            origin_policy: OriginPolicy::from_origins([crate::backend::DEFAULT_BACKEND_URL]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakePhase {
    Idle,
    Connecting,
    Completed { at: DateTime<Utc> },
    Failed { message: String },
}

/// Which source ended the wait for the popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionSignal {
    Message,
    PopupClosed,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("a connection attempt is already in progress")]
    InProgress,
    #[error("{0} cannot be connected yet")]
    Unsupported(ProviderName),
    #[error("{provider} authorization request failed: {source}")]
    Authorize {
        provider: ProviderName,
        #[source]
        source: BackendError,
    },
    #[error("{provider} authorization window unavailable: {source}")]
    Popup {
        provider: ProviderName,
        #[source]
        source: PopupError,
    },
    #[error("{provider} credential exchange failed: {source}")]
    Credentials {
        provider: ProviderName,
        #[source]
        source: BackendError,
    },
}

impl HandshakeError {
    pub fn user_message(&self) -> String {
        match self {
            HandshakeError::InProgress => "A connection attempt is already in progress".to_string(),
            HandshakeError::Unsupported(provider) => {
                format!("The {provider} integration is not available yet")
            }
            HandshakeError::Authorize { provider, source } => {
                source.user_message(&format!("Error connecting to {provider}"))
            }
            HandshakeError::Popup { provider, .. } => format!(
                "Could not open the {provider} authorization window. Allow popups and try again."
            ),
            HandshakeError::Credentials { provider, source } => {
                source.user_message(&format!("Error getting {provider} credentials"))
            }
        }
    }
}

/// Holds the phase at `Connecting` for the lifetime of one `connect` call.
///
/// If the call is dropped before it settles, the phase becomes `Failed` so a
/// later `reset` or `connect` is not refused.
struct ConnectingPhase {
    phase: Arc<RwLock<HandshakePhase>>,
    settled: bool,
}

impl ConnectingPhase {
    fn enter(phase: &Arc<RwLock<HandshakePhase>>) -> Result<Self, HandshakeError> {
        let mut current = phase.write();
        if matches!(*current, HandshakePhase::Connecting) {
            return Err(HandshakeError::InProgress);
        }
        *current = HandshakePhase::Connecting;
        Ok(Self {
            phase: Arc::clone(phase),
            settled: false,
        })
    }

    fn settle(mut self, next: HandshakePhase) {
        *self.phase.write() = next;
        self.settled = true;
    }
}

impl Drop for ConnectingPhase {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!("connection attempt cancelled");
            *self.phase.write() = HandshakePhase::Failed {
                message: CANCELLED_MESSAGE.to_string(),
            };
        }
    }
}

/// Resources owned by a single authorization attempt. Dropping it removes
/// the message listener, stops the poll timer and releases the popup.
struct Attempt {
    listener: broadcast::Receiver<WindowMessage>,
    listener_open: bool,
    popup: Box<dyn PopupWindow>,
    ticker: Interval,
    expected_message: String,
    origin_policy: OriginPolicy,
}

impl Attempt {
    fn new(
        listener: broadcast::Receiver<WindowMessage>,
        popup: Box<dyn PopupWindow>,
        provider: ProviderName,
        config: &HandshakeConfig,
    ) -> Self {
        let period = config.poll_interval.max(Duration::from_millis(1));
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            listener,
            listener_open: true,
            popup,
            ticker,
            expected_message: provider.auth_success_message(),
            origin_policy: config.origin_policy.clone(),
        }
    }

    /// Wait for the first completion signal. The attempt is consumed, so its
    /// resources are gone before the caller acts on the signal.
    async fn wait(mut self) -> CompletionSignal {
        loop {
            tokio::select! {
                received = self.listener.recv(), if self.listener_open => match received {
                    Ok(message) if self.accepts(&message) => break CompletionSignal::Message,
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "completion listener lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => {
                        self.listener_open = false;
                        continue;
                    }
                },
                _ = self.ticker.tick() => {
                    if self.popup.is_closed() {
                        break CompletionSignal::PopupClosed;
                    }
                }
            }
        }
    }

    fn accepts(&self, message: &WindowMessage) -> bool {
        if message.message_type() != Some(self.expected_message.as_str()) {
            return false;
        }
        if !self.origin_policy.allows(&message.origin) {
            tracing::warn!(origin = %message.origin, "ignoring completion message from unexpected origin");
            return false;
        }
        true
    }
}

/// Drives the connect flow for the provider held in the shared params store.
#[derive(Clone)]
pub struct PopupHandshake {
    backend: Arc<dyn IntegrationBackend>,
    launcher: Arc<dyn PopupLauncher>,
    bus: MessageBus,
    store: IntegrationParamsStore,
    config: HandshakeConfig,
    phase: Arc<RwLock<HandshakePhase>>,
}

impl PopupHandshake {
    pub fn new(
        backend: Arc<dyn IntegrationBackend>,
        launcher: Arc<dyn PopupLauncher>,
        bus: MessageBus,
        store: IntegrationParamsStore,
        config: HandshakeConfig,
    ) -> Self {
        Self {
            backend,
            launcher,
            bus,
            store,
            config,
            phase: Arc::new(RwLock::new(HandshakePhase::Idle)),
        }
    }

    pub fn phase(&self) -> HandshakePhase {
        self.phase.read().clone()
    }

    pub fn is_connecting(&self) -> bool {
        matches!(*self.phase.read(), HandshakePhase::Connecting)
    }

    pub fn store(&self) -> &IntegrationParamsStore {
        &self.store
    }

    /// Return to `Idle` after the UI has shown a completed or failed attempt.
    pub fn reset(&self) {
        let mut phase = self.phase.write();
        if !matches!(*phase, HandshakePhase::Connecting) {
            *phase = HandshakePhase::Idle;
        }
    }

    pub async fn connect(
        &self,
        identity: &Identity,
        item_type: ItemTypeTag,
    ) -> Result<Credentials, HandshakeError> {
        let connecting = ConnectingPhase::enter(&self.phase)?;

        let provider = self.store.provider();
        let attempt_id = Uuid::new_v4();
        let span = tracing::info_span!("handshake", attempt = %attempt_id, %provider, %item_type);
        let result = self
            .run_attempt(provider, identity, item_type)
            .instrument(span)
            .await;

        match &result {
            Ok(_) => connecting.settle(HandshakePhase::Completed { at: Utc::now() }),
            Err(err) => {
                tracing::warn!(attempt = %attempt_id, error = %err, "handshake failed");
                connecting.settle(HandshakePhase::Failed {
                    message: err.user_message(),
                });
            }
        }
        result
    }

    async fn run_attempt(
        &self,
        provider: ProviderName,
        identity: &Identity,
        item_type: ItemTypeTag,
    ) -> Result<Credentials, HandshakeError> {
        if !provider.is_functional() || !provider.supports(item_type) {
            return Err(HandshakeError::Unsupported(provider));
        }

        tracing::info!("requesting authorization url");
        let url = self
            .backend
            .authorize(provider, identity, item_type)
            .await
            .map_err(|source| HandshakeError::Authorize { provider, source })?;

        // Subscribe before the popup exists so its completion notice cannot be missed.
        let listener = self.bus.subscribe();
        let popup = self
            .launcher
            .open(&url)
            .map_err(|source| HandshakeError::Popup { provider, source })?;
        tracing::info!("authorization window opened");

        let signal = Attempt::new(listener, popup, provider, &self.config)
            .wait()
            .await;
        tracing::info!(?signal, "authorization window finished");

        let credentials = self
            .backend
            .fetch_credentials(provider, identity, item_type)
            .await
            .map_err(|source| HandshakeError::Credentials { provider, source })?;
        tracing::info!(keys = credentials.len(), "credentials received");

        let params = IntegrationParams::connected(provider, item_type, credentials);
        let stored = params.credentials.clone().unwrap_or_default();
        self.store.set(params);
        Ok(stored)
    }
}
