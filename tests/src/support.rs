use conduit_core::window::FlagPopup;
use conduit_core::{
    HandshakeConfig, IntegrationParamsStore, MessageBus, MockBackend, PopupHandshake,
    ProviderName, RecordingLauncher, WindowMessage,
};
use std::sync::Arc;

pub const BACKEND_ORIGIN: &str = "http://localhost:8000";

pub struct Harness {
    pub backend: MockBackend,
    pub launcher: RecordingLauncher,
    pub bus: MessageBus,
    pub store: IntegrationParamsStore,
    pub handshake: PopupHandshake,
}

impl Harness {
    pub fn new() -> Self {
        let backend = MockBackend::new();
        let launcher = RecordingLauncher::new();
        let bus = MessageBus::new();
        let store = IntegrationParamsStore::new(ProviderName::Hubspot);
        let handshake = PopupHandshake::new(
            Arc::new(backend.clone()),
            Arc::new(launcher.clone()),
            bus.clone(),
            store.clone(),
            HandshakeConfig::default(),
        );
        Self {
            backend,
            launcher,
            bus,
            store,
            handshake,
        }
    }

    /// Wait until the handshake has opened its `n`th popup.
    pub async fn popup(&self, n: usize) -> FlagPopup {
        loop {
            if self.launcher.open_count() >= n {
                if let Some(popup) = self.launcher.last_popup() {
                    return popup;
                }
            }
            tokio::task::yield_now().await;
        }
    }

    pub fn post_success(&self) {
        self.bus
            .post(WindowMessage::auth_success(BACKEND_ORIGIN, "HUBSPOT_AUTH_SUCCESS"));
    }
}

pub fn test_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("runtime")
}
