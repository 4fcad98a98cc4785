use anyhow::Context;
use clap::{Parser, ValueEnum};
use conduit::config::{load_ui_settings, ui_settings_path, UiSettingsStore};
use conduit::ConnectorApp;
use conduit_core::{telemetry, BackendKind, ConnectorSettings};
use eframe::egui;
use std::sync::Arc;
use tokio::runtime::Runtime;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "Conduit", version, about = "Connect a CRM and browse its records")]
struct Cli {
    /// Base URL of the integration backend.
    #[arg(long)]
    backend_url: Option<Url>,
    /// Talk to the real backend or run against the built-in mock.
    #[arg(long, value_enum)]
    backend: Option<BackendArg>,
    #[arg(long)]
    user: Option<String>,
    #[arg(long)]
    org: Option<String>,
    /// URL the app was opened from, e.g. the backend's post-authorization redirect.
    #[arg(long)]
    launch_url: Option<Url>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    Http,
    Mock,
}

impl From<BackendArg> for BackendKind {
    fn from(value: BackendArg) -> Self {
        match value {
            BackendArg::Http => BackendKind::Http,
            BackendArg::Mock => BackendKind::Mock,
        }
    }
}

fn resolve_settings(cli: &Cli) -> anyhow::Result<ConnectorSettings> {
    let mut settings =
        ConnectorSettings::load().map_err(|err| anyhow::anyhow!(err.user_message()))?;
    if let Some(url) = &cli.backend_url {
        settings.base_url = url.clone();
    }
    if let Some(kind) = cli.backend {
        settings.backend = kind.into();
    }
    if let Some(user) = &cli.user {
        settings.identity.user_id = user.clone();
    }
    if let Some(org) = &cli.org {
        settings.identity.org_id = org.clone();
    }
    Ok(settings)
}

fn main() -> anyhow::Result<()> {
    telemetry::init_tracing(telemetry::default_filter())?;

    let cli = Cli::parse();
    let connector = resolve_settings(&cli)?;
    tracing::info!(
        backend = ?connector.backend,
        base_url = %connector.base_url,
        "starting conduit"
    );

    let runtime = Arc::new(Runtime::new().context("failed to start the async runtime")?);
    let settings_path = ui_settings_path();
    let ui_settings = runtime.block_on(load_ui_settings(&settings_path))?;

    let initial_size = ui_settings.window_size;
    let viewport = egui::ViewportBuilder::default()
        .with_inner_size(egui::vec2(initial_size[0].max(640.0), initial_size[1].max(480.0)))
        .with_min_inner_size(egui::vec2(640.0, 480.0));
    let native_options = eframe::NativeOptions {
        viewport,
        follow_system_theme: true,
        default_theme: ui_settings.theme_mode.fallback_theme(),
        ..Default::default()
    };

    let settings = UiSettingsStore::new(settings_path, ui_settings);
    let launch_url = cli.launch_url;
    eframe::run_native(
        "Conduit",
        native_options,
        Box::new(move |_cc| {
            Box::new(ConnectorApp::new(runtime, &connector, settings, launch_url))
        }),
    )
    .map_err(|err| anyhow::anyhow!(err.to_string()))?;

    Ok(())
}
