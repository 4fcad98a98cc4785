use anyhow::{Context, Result};
use conduit_core::{ItemTypeTag, ProviderName};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Window and form preferences. Integration state is never written here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiSettings {
    #[serde(default)]
    pub theme_mode: crate::ui::ThemeMode,
    #[serde(default = "UiSettings::default_window_size")]
    pub window_size: [f32; 2],
    #[serde(default)]
    pub last_provider: ProviderName,
    #[serde(default)]
    pub last_item_type: ItemTypeTag,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            theme_mode: crate::ui::ThemeMode::System,
            window_size: UiSettings::default_window_size(),
            last_provider: ProviderName::default(),
            last_item_type: ItemTypeTag::default(),
        }
    }
}

impl UiSettings {
    fn default_window_size() -> [f32; 2] {
        [960.0, 720.0]
    }
}

/// Settings plus where they are saved. `path == None` keeps them in memory.
#[derive(Debug, Clone, Default)]
pub struct UiSettingsStore {
    path: Option<PathBuf>,
    data: UiSettings,
}

impl UiSettingsStore {
    pub fn new(path: PathBuf, data: UiSettings) -> Self {
        Self {
            path: Some(path),
            data,
        }
    }

    pub fn temporary() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn data(&self) -> &UiSettings {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut UiSettings {
        &mut self.data
    }
}

pub async fn load_ui_settings(path: &Path) -> Result<UiSettings> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(settings) => Ok(settings),
            Err(err) => {
                let defaults = UiSettings::default();
                save_ui_settings(path, &defaults).await?;
                warn!(
                    error = ?err,
                    "failed to parse ui_settings.json, resetting to defaults"
                );
                Ok(defaults)
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            let defaults = UiSettings::default();
            save_ui_settings(path, &defaults).await?;
            Ok(defaults)
        }
        Err(err) => Err(err).context("failed to read ui_settings.json"),
    }
}

pub async fn save_ui_settings(path: &Path, settings: &UiSettings) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let serialized = serde_json::to_string_pretty(settings)?;
    tokio::fs::write(path, serialized)
        .await
        .with_context(|| format!("failed to write ui_settings.json at {}", path.display()))
}

pub fn ui_settings_path() -> PathBuf {
    config_dir().join("ui_settings.json")
}

fn config_dir() -> PathBuf {
    if let Some(base) = BaseDirs::new() {
        base.config_dir().join("conduit")
    } else {
        PathBuf::from(".conduit")
    }
}
