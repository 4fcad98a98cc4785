pub mod app;
pub mod config;
pub mod popup;
pub mod ui;

pub use app::{render_ui, ConnectorApp};
pub use config::{load_ui_settings, save_ui_settings, ui_settings_path, UiSettings, UiSettingsStore};
pub use popup::EguiPopupLauncher;
