pub mod backend;
pub mod config;
pub mod handshake;
pub mod item;
pub mod loader;
pub mod params;
pub mod provider;
pub mod render;
pub mod success;
pub mod telemetry;
pub mod window;

pub use backend::{
    connect_backend, BackendError, BackendKind, HttpBackend, Identity, IntegrationBackend,
    MockBackend,
};
pub use config::{ConfigError, ConnectorSettings};
pub use handshake::{HandshakeConfig, HandshakeError, HandshakePhase, PopupHandshake};
pub use item::{CompanyItem, ContactItem, Item, ItemId};
pub use loader::{DataLoader, DataPanel, LoadError, LoadedData};
pub use params::{Credentials, IntegrationParams, IntegrationParamsStore, ParamsError, ParamsUpdate};
pub use provider::{ItemTypeTag, ProviderName};
pub use render::{render, render_loaded, DataView, DisplayModel, ItemCard};
pub use success::SuccessNotice;
pub use window::{
    FlagPopup, MessageBus, OriginPolicy, PopupError, PopupLauncher, PopupWindow,
    RecordingLauncher, WindowMessage,
};
