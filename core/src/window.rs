use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use url::Url;

const MESSAGE_BUS_CAPACITY: usize = 16;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PopupError {
    #[error("the authorization window was blocked or closed before it opened")]
    BlockedOrClosed,
}

/// A child window showing the provider's consent screen.
pub trait PopupWindow: Send + Sync {
    fn is_closed(&self) -> bool;
}

/// Opens popup windows for a given authorization URL.
pub trait PopupLauncher: Send + Sync {
    fn open(&self, url: &Url) -> Result<Box<dyn PopupWindow>, PopupError>;
}

/// A message one window posted to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowMessage {
    pub origin: String,
    pub data: Value,
}

impl WindowMessage {
    pub fn new(origin: impl Into<String>, data: Value) -> Self {
        Self {
            origin: origin.into(),
            data,
        }
    }

    /// The `{type: "<PROVIDER>_AUTH_SUCCESS"}` notice the callback page sends its opener.
    pub fn auth_success(origin: impl Into<String>, message_type: &str) -> Self {
        Self::new(origin, json!({ "type": message_type }))
    }

    pub fn message_type(&self) -> Option<&str> {
        self.data.get("type").and_then(Value::as_str)
    }
}

/// Cross-window message channel for one application window.
///
/// Listeners only see messages posted after they subscribed; dropping the
/// receiver removes the listener.
#[derive(Clone)]
pub struct MessageBus {
    tx: broadcast::Sender<WindowMessage>,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(MESSAGE_BUS_CAPACITY);
        Self { tx }
    }

    pub fn post(&self, message: WindowMessage) {
        if self.tx.send(message).is_err() {
            tracing::trace!("window message posted with no listeners");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WindowMessage> {
        self.tx.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Which message origins may signal handshake completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginPolicy {
    AllowList(Vec<String>),
    /// Accept any origin, as a browser `postMessage(..., '*')` listener would.
    AnyOrigin,
}

impl OriginPolicy {
    /// Only the backend's own origin, which serves the OAuth callback page.
    pub fn backend(base_url: &Url) -> Self {
        Self::AllowList(vec![origin_of(base_url)])
    }

    pub fn from_origins<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = origins
            .into_iter()
            .filter_map(|origin| normalize_origin(origin.as_ref()))
            .collect();
        Self::AllowList(allowed)
    }

    pub fn allows(&self, origin: &str) -> bool {
        match self {
            OriginPolicy::AnyOrigin => true,
            OriginPolicy::AllowList(allowed) => normalize_origin(origin)
                .map(|origin| allowed.iter().any(|entry| entry == &origin))
                .unwrap_or(false),
        }
    }
}

pub fn origin_of(url: &Url) -> String {
    url.origin().ascii_serialization()
}

fn normalize_origin(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw.trim()).ok()?;
    let origin = parsed.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

/// Popup handle whose closed state is a shared flag.
#[derive(Clone, Default)]
pub struct FlagPopup {
    closed: Arc<AtomicBool>,
}

impl FlagPopup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl PopupWindow for FlagPopup {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Launcher that records every URL it was asked to open.
///
/// Used by the offline demo and by tests; the popups it hands out are
/// [`FlagPopup`]s the caller closes by hand.
#[derive(Clone, Default)]
pub struct RecordingLauncher {
    opened: Arc<Mutex<Vec<(Url, FlagPopup)>>>,
    blocked: Arc<AtomicBool>,
}

impl RecordingLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Behave like a browser with a popup blocker.
    pub fn blocking() -> Self {
        let launcher = Self::default();
        launcher.blocked.store(true, Ordering::SeqCst);
        launcher
    }

    pub fn opened_urls(&self) -> Vec<Url> {
        self.opened.lock().iter().map(|(url, _)| url.clone()).collect()
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().len()
    }

    pub fn last_popup(&self) -> Option<FlagPopup> {
        self.opened.lock().last().map(|(_, popup)| popup.clone())
    }
}

impl PopupLauncher for RecordingLauncher {
    fn open(&self, url: &Url) -> Result<Box<dyn PopupWindow>, PopupError> {
        if self.blocked.load(Ordering::SeqCst) {
            return Err(PopupError::BlockedOrClosed);
        }
        let popup = FlagPopup::new();
        self.opened.lock().push((url.clone(), popup.clone()));
        Ok(Box::new(popup))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_policy_accepts_only_backend_origin() {
        let policy = OriginPolicy::backend(&Url::parse("http://localhost:8000/api/").unwrap());
        assert!(policy.allows("http://localhost:8000"));
        assert!(policy.allows("http://localhost:8000/integrations/hubspot/oauth2callback"));
        assert!(!policy.allows("http://localhost:3000"));
        assert!(!policy.allows("https://localhost:8000"));
        assert!(!policy.allows("null"));
    }

    #[test]
    fn any_origin_accepts_everything() {
        assert!(OriginPolicy::AnyOrigin.allows("https://evil.example"));
    }

    #[test]
    fn allow_list_skips_unparseable_entries() {
        let policy = OriginPolicy::from_origins(["not a url", "https://app.example.com/"]);
        assert_eq!(
            policy,
            OriginPolicy::AllowList(vec!["https://app.example.com".to_string()])
        );
    }

    #[tokio::test]
    async fn listeners_only_see_later_messages() {
        let bus = MessageBus::new();
        bus.post(WindowMessage::auth_success("http://localhost:8000", "HUBSPOT_AUTH_SUCCESS"));
        let mut rx = bus.subscribe();
        assert!(rx.try_recv().is_err());

        bus.post(WindowMessage::auth_success("http://localhost:8000", "HUBSPOT_AUTH_SUCCESS"));
        let message = rx.recv().await.expect("message");
        assert_eq!(message.message_type(), Some("HUBSPOT_AUTH_SUCCESS"));

        drop(rx);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn blocking_launcher_refuses_to_open() {
        let launcher = RecordingLauncher::blocking();
        let url = Url::parse("https://app.hubspot.com/oauth/authorize").unwrap();
        assert!(matches!(launcher.open(&url), Err(PopupError::BlockedOrClosed)));
        assert_eq!(launcher.open_count(), 0);
    }
}
