use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use conduit_core::render::{render_loaded, DataView};
use conduit_core::{
    telemetry, DataLoader, HandshakeConfig, Identity, IntegrationParamsStore, ItemTypeTag,
    MessageBus, MockBackend, PopupHandshake, ProviderName, RecordingLauncher, WindowMessage,
};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "xtask", version, about = "Automation helpers for Conduit")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a scripted handshake and data load against the in-memory backend.
    Smoke {
        #[arg(long, default_value = "contact")]
        item_type: String,
    },
}

fn main() -> Result<()> {
    telemetry::init_tracing(EnvFilter::new("info"))?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Smoke { item_type } => {
            let item_type = ItemTypeTag::parse(&item_type)
                .with_context(|| format!("unknown item type `{item_type}`"))?;
            smoke_test(item_type)
        }
    }
}

fn smoke_test(item_type: ItemTypeTag) -> Result<()> {
    let runtime = Runtime::new()?;
    runtime.block_on(async {
        let backend = MockBackend::new();
        let launcher = RecordingLauncher::new();
        let bus = MessageBus::new();
        let store = IntegrationParamsStore::new(ProviderName::Hubspot);
        store.update(conduit_core::ParamsUpdate::ItemType(item_type))?;
        let handshake = PopupHandshake::new(
            Arc::new(backend.clone()),
            Arc::new(launcher.clone()),
            bus.clone(),
            store.clone(),
            HandshakeConfig::default(),
        );

        let connect = tokio::spawn({
            let handshake = handshake.clone();
            async move { handshake.connect(&Identity::default(), item_type).await }
        });
        while launcher.open_count() == 0 {
            tokio::task::yield_now().await;
        }
        backend.grant();
        bus.post(WindowMessage::auth_success(
            "http://localhost:8000",
            &ProviderName::Hubspot.auth_success_message(),
        ));
        let credentials = connect.await??;
        info!(keys = credentials.len(), %item_type, "smoke handshake completed");

        let data = DataLoader::new(Arc::new(backend.clone()))
            .load_current(&store)
            .await?;
        match render_loaded(&data) {
            DataView::Items { summary, entries } => {
                info!(items = entries.len(), "{summary}");
            }
            DataView::Empty => bail!("smoke load returned no items"),
            DataView::Error(message) => bail!("smoke load failed: {message}"),
        }

        let calls = backend.calls();
        if calls.credentials != 1 {
            bail!("expected one credential fetch, saw {}", calls.credentials);
        }
        info!(
            authorize = calls.authorize,
            credentials = calls.credentials,
            load = calls.load,
            "smoke test passed"
        );
        Ok::<(), anyhow::Error>(())
    })
}
