use conduit_core::window::{origin_of, FlagPopup, MessageBus, PopupError, PopupLauncher, PopupWindow, WindowMessage};
use conduit_core::ProviderName;
use parking_lot::Mutex;
use std::sync::Arc;
use url::Url;

/// An authorization window the UI is currently showing.
#[derive(Clone)]
pub struct OpenPopup {
    pub provider: ProviderName,
    pub url: Url,
    handle: FlagPopup,
}

impl OpenPopup {
    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }
}

/// Launches authorization "popups" as in-app egui windows.
///
/// The handshake holds the [`FlagPopup`] handed out by `open`; the UI draws
/// whatever sits in the shared slot and flips the flag when the window goes
/// away.
#[derive(Clone)]
pub struct EguiPopupLauncher {
    slot: Arc<Mutex<Option<OpenPopup>>>,
    bus: MessageBus,
    backend_origin: String,
    provider: Arc<Mutex<ProviderName>>,
}

impl EguiPopupLauncher {
    pub fn new(bus: MessageBus, backend_url: &Url) -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            bus,
            backend_origin: origin_of(backend_url),
            provider: Arc::new(Mutex::new(ProviderName::default())),
        }
    }

    /// Provider the next window is opened for.
    pub fn set_provider(&self, provider: ProviderName) {
        *self.provider.lock() = provider;
    }

    /// The window to draw this frame, dropping it from the slot once closed.
    pub fn current(&self) -> Option<OpenPopup> {
        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(OpenPopup::is_closed) {
            *slot = None;
        }
        slot.clone()
    }

    /// The user reports the consent screen is done: notify the opener the
    /// way the callback page would, then close.
    pub fn finish(&self) {
        let Some(popup) = self.slot.lock().take() else {
            return;
        };
        let message_type = popup.provider.auth_success_message();
        tracing::debug!(origin = %self.backend_origin, %message_type, "posting completion message");
        self.bus
            .post(WindowMessage::auth_success(self.backend_origin.clone(), &message_type));
        popup.handle.close();
    }

    /// The user dismissed the window without finishing.
    pub fn dismiss(&self) {
        if let Some(popup) = self.slot.lock().take() {
            popup.handle.close();
        }
    }
}

impl PopupLauncher for EguiPopupLauncher {
    fn open(&self, url: &Url) -> Result<Box<dyn PopupWindow>, PopupError> {
        let handle = FlagPopup::new();
        let popup = OpenPopup {
            provider: *self.provider.lock(),
            url: url.clone(),
            handle: handle.clone(),
        };
        if let Some(previous) = self.slot.lock().replace(popup) {
            previous.handle.close();
        }
        Ok(Box::new(handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn launcher() -> (EguiPopupLauncher, MessageBus) {
        let bus = MessageBus::new();
        let backend = Url::parse("http://localhost:8000").expect("url");
        (EguiPopupLauncher::new(bus.clone(), &backend), bus)
    }

    #[tokio::test]
    async fn finishing_posts_the_success_message_and_closes() {
        let (launcher, bus) = launcher();
        let mut listener = bus.subscribe();
        let url = Url::parse("https://app.hubspot.com/oauth/authorize?client_id=x").expect("url");
        let window = launcher.open(&url).expect("window");
        assert_eq!(launcher.current().map(|popup| popup.url), Some(url));

        launcher.finish();

        let message = listener.recv().await.expect("message");
        assert_eq!(message.origin, "http://localhost:8000");
        assert_eq!(message.message_type(), Some("HUBSPOT_AUTH_SUCCESS"));
        assert!(window.is_closed());
        assert!(launcher.current().is_none());
    }

    #[test]
    fn dismissing_closes_without_a_message() {
        let (launcher, bus) = launcher();
        let mut listener = bus.subscribe();
        let url = Url::parse("https://app.hubspot.com/oauth/authorize").expect("url");
        let window = launcher.open(&url).expect("window");

        launcher.dismiss();

        assert!(window.is_closed());
        assert!(listener.try_recv().is_err());
    }

    #[test]
    fn reopening_closes_the_previous_window() {
        let (launcher, _bus) = launcher();
        let url = Url::parse("https://app.hubspot.com/oauth/authorize").expect("url");
        let first = launcher.open(&url).expect("first");
        let second = launcher.open(&url).expect("second");
        assert!(first.is_closed());
        assert!(!second.is_closed());
    }
}
