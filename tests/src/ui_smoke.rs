use crate::support::test_runtime;
use conduit::ui::ConnectButtonState;
use conduit::{render_ui, ConnectorApp, UiSettingsStore};
use conduit_core::render::{render_loaded, DataView};
use conduit_core::{BackendKind, ConnectorSettings, ItemTypeTag, ProviderName};
use egui::RawInput;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

fn mock_settings() -> ConnectorSettings {
    ConnectorSettings {
        backend: BackendKind::Mock,
        poll_interval: Duration::from_millis(20),
        ..ConnectorSettings::default()
    }
}

fn build_app(settings: &ConnectorSettings, launch_url: Option<Url>) -> ConnectorApp {
    ConnectorApp::new(
        Arc::new(test_runtime()),
        settings,
        UiSettingsStore::temporary(),
        launch_url,
    )
}

fn frame(ctx: &egui::Context, app: &mut ConnectorApp) -> egui::FullOutput {
    ctx.run(RawInput::default(), |ctx| render_ui(ctx, app))
}

/// Render frames until `done` holds, failing after a few seconds.
fn run_until(ctx: &egui::Context, app: &mut ConnectorApp, done: impl Fn(&ConnectorApp) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        frame(ctx, app);
        if done(app) {
            return;
        }
        assert!(Instant::now() < deadline, "timed out waiting for the UI");
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn initial_form_renders_headless() {
    let mut app = build_app(&mock_settings(), None);
    let ctx = egui::Context::default();
    let output = frame(&ctx, &mut app);
    assert!(!output.shapes.is_empty());
    frame(&ctx, &mut app);

    assert_eq!(
        app.button_state(),
        ConnectButtonState::Ready("Connect to HubSpot".to_string())
    );
    assert!(app.notification().is_none());
    assert!(!app.store().is_connected());
}

#[test]
fn connect_and_load_through_the_ui() {
    let mut app = build_app(&mock_settings(), None);
    let ctx = egui::Context::default();
    frame(&ctx, &mut app);

    app.start_connect();
    run_until(&ctx, &mut app, |app| app.launcher().current().is_some());
    let popup = app.launcher().current().expect("auth window");
    assert!(popup.url.as_str().starts_with("https://app.hubspot.com/oauth/authorize"));

    app.launcher().finish();
    run_until(&ctx, &mut app, |app| {
        matches!(app.button_state(), ConnectButtonState::Connected(_))
    });
    assert_eq!(
        app.button_state(),
        ConnectButtonState::Connected("HubSpot Connected".to_string())
    );
    let params = app.store().snapshot();
    assert_eq!(params.item_type, ItemTypeTag::Contact);
    assert!(app.launcher().current().is_none());

    app.load_data();
    run_until(&ctx, &mut app, |app| {
        !app.panel().is_loading() && app.panel().loaded().is_some()
    });
    let loaded = app.panel().loaded().expect("loaded data");
    let DataView::Items { entries, .. } = render_loaded(loaded) else {
        panic!("expected items");
    };
    assert_eq!(entries.len(), 2);
    assert!(app.notification().is_none());

    app.clear_data();
    frame(&ctx, &mut app);
    assert!(app.panel().loaded().is_none());

    app.start_over();
    frame(&ctx, &mut app);
    assert!(!app.store().is_connected());
}

#[test]
fn placeholder_providers_stay_disconnected() {
    let mut app = build_app(&mock_settings(), None);
    let ctx = egui::Context::default();

    app.select_provider(ProviderName::Notion);
    frame(&ctx, &mut app);
    assert_eq!(
        app.button_state(),
        ConnectButtonState::Unavailable("Notion (coming soon)".to_string())
    );

    app.start_connect();
    frame(&ctx, &mut app);
    assert!(app.launcher().current().is_none());

    app.select_item_type(ItemTypeTag::Company);
    frame(&ctx, &mut app);
    let notification = app.notification().expect("notification");
    assert_eq!(notification.title, "Unsupported item type");
}

#[test]
fn success_launch_shows_countdown_then_dismisses() {
    let launch = Url::parse("http://localhost:3000/?hubspot_success=true").expect("url");
    let ctx = egui::Context::default();

    let mut app = build_app(&mock_settings(), Some(launch.clone()));
    frame(&ctx, &mut app);
    let notice = app.success_notice().expect("success view");
    assert_eq!(notice.message(), "HubSpot integration successful!");
    assert_eq!(notice.cleaned_url().as_str(), "http://localhost:3000/");

    let instant = ConnectorSettings {
        close_after: Duration::ZERO,
        ..mock_settings()
    };
    let mut app = build_app(&instant, Some(launch));
    frame(&ctx, &mut app);
    assert!(app.success_notice().is_none());
}

#[test]
fn item_type_is_frozen_while_connecting() {
    let mut app = build_app(&mock_settings(), None);
    let ctx = egui::Context::default();
    frame(&ctx, &mut app);

    app.start_connect();
    run_until(&ctx, &mut app, |app| app.launcher().current().is_some());
    app.select_item_type(ItemTypeTag::Company);
    frame(&ctx, &mut app);
    assert_eq!(app.store().item_type(), ItemTypeTag::Contact);
    assert_eq!(app.ui_settings().last_item_type, ItemTypeTag::Contact);

    app.launcher().finish();
    run_until(&ctx, &mut app, |app| {
        matches!(app.button_state(), ConnectButtonState::Connected(_))
    });
    assert_eq!(app.store().item_type(), ItemTypeTag::Contact);

    app.select_item_type(ItemTypeTag::Company);
    frame(&ctx, &mut app);
    assert_eq!(app.store().item_type(), ItemTypeTag::Company);
    assert_eq!(app.ui_settings().last_item_type, ItemTypeTag::Company);
}
