use crate::config::{save_ui_settings, UiSettings, UiSettingsStore};
use crate::popup::EguiPopupLauncher;
use crate::ui::{
    AuthWindow, ConnectButtonState, DataPanelView, FormState, IntegrationForm, MenuBar,
    Notification, NotificationWindow, SuccessView, ThemeMode, ThemePalette,
};
use conduit_core::{
    connect_backend, ConnectorSettings, Credentials, DataLoader, DataPanel, HandshakeError,
    HandshakePhase, Identity, IntegrationParamsStore, ItemTypeTag, LoadError, LoadedData,
    MessageBus, ParamsUpdate, PopupHandshake, ProviderName, SuccessNotice,
};
use egui::{self, RichText};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{error, info, warn};
use url::Url;

const BUSY_REPAINT: Duration = Duration::from_millis(100);

/// Results handed back from tasks running on the shared runtime.
enum BackgroundEvent {
    Connected(Result<Credentials, HandshakeError>),
    Loaded(Result<LoadedData, LoadError>),
}

pub struct ConnectorApp {
    runtime: Arc<Runtime>,
    settings: UiSettingsStore,
    store: IntegrationParamsStore,
    handshake: PopupHandshake,
    launcher: EguiPopupLauncher,
    loader: DataLoader,
    panel: DataPanel,
    form: FormState,
    notification: Option<Notification>,
    success: Option<SuccessNotice>,
    exit_requested: bool,
    system_dark: bool,
    tx: UnboundedSender<BackgroundEvent>,
    rx: UnboundedReceiver<BackgroundEvent>,
}

impl ConnectorApp {
    pub fn new(
        runtime: Arc<Runtime>,
        connector: &ConnectorSettings,
        settings: UiSettingsStore,
        launch_url: Option<Url>,
    ) -> Self {
        let backend = connect_backend(connector.backend, &connector.base_url);
        let bus = MessageBus::new();
        let launcher = EguiPopupLauncher::new(bus.clone(), &connector.base_url);

        let provider = settings.data().last_provider;
        let store = IntegrationParamsStore::new(provider);
        if let Err(err) = store.update(ParamsUpdate::ItemType(settings.data().last_item_type)) {
            warn!(error = %err, "ignoring saved item type");
        }
        launcher.set_provider(provider);

        let handshake = PopupHandshake::new(
            backend.clone(),
            Arc::new(launcher.clone()),
            bus,
            store.clone(),
            connector.handshake_config(),
        );
        let success = launch_url.as_ref().and_then(|url| {
            SuccessNotice::from_launch_url(url, connector.close_after, Instant::now())
        });
        if let Some(notice) = &success {
            info!(provider = %notice.provider(), "launched from a successful authorization redirect");
        }

        let (tx, rx) = unbounded_channel();
        Self {
            runtime,
            settings,
            store,
            handshake,
            launcher,
            loader: DataLoader::new(backend),
            panel: DataPanel::default(),
            form: FormState {
                user_id: connector.identity.user_id.clone(),
                org_id: connector.identity.org_id.clone(),
            },
            notification: None,
            success,
            exit_requested: false,
            system_dark: true,
            tx,
            rx,
        }
    }

    pub fn store(&self) -> &IntegrationParamsStore {
        &self.store
    }

    pub fn launcher(&self) -> &EguiPopupLauncher {
        &self.launcher
    }

    pub fn panel(&self) -> &DataPanel {
        &self.panel
    }

    pub fn phase(&self) -> HandshakePhase {
        self.handshake.phase()
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    pub fn success_notice(&self) -> Option<&SuccessNotice> {
        self.success.as_ref()
    }

    pub fn ui_settings(&self) -> &UiSettings {
        self.settings.data()
    }

    pub fn theme_mode(&self) -> ThemeMode {
        self.settings.data().theme_mode
    }

    pub fn button_state(&self) -> ConnectButtonState {
        ConnectButtonState::resolve(
            self.store.provider(),
            &self.handshake.phase(),
            self.store.is_connected(),
        )
    }

    pub fn start_connect(&mut self) {
        if !self.button_state().clickable() {
            return;
        }
        let identity = Identity::new(self.form.user_id.trim(), self.form.org_id.trim());
        if identity.user_id.is_empty() || identity.org_id.is_empty() {
            self.notification = Some(Notification::error(
                "Missing details",
                "Enter a user and an organization before connecting.",
            ));
            return;
        }
        let item_type = self.store.item_type();
        self.launcher.set_provider(self.store.provider());
        let handshake = self.handshake.clone();
        let tx = self.tx.clone();
        self.runtime.spawn(async move {
            let result = handshake.connect(&identity, item_type).await;
            if tx.send(BackgroundEvent::Connected(result)).is_err() {
                warn!("UI has been dropped before the handshake finished");
            }
        });
    }

    pub fn load_data(&mut self) {
        if !self.panel.begin() {
            return;
        }
        let loader = self.loader.clone();
        let store = self.store.clone();
        let tx = self.tx.clone();
        self.runtime.spawn(async move {
            let result = loader.load_current(&store).await;
            if tx.send(BackgroundEvent::Loaded(result)).is_err() {
                warn!("UI has been dropped before data finished loading");
            }
        });
    }

    pub fn clear_data(&mut self) {
        self.panel.clear();
    }

    pub fn select_provider(&mut self, provider: ProviderName) {
        if self.handshake.is_connecting() {
            return;
        }
        self.store.select_provider(provider);
        self.launcher.set_provider(provider);
        self.panel.clear();
        self.settings.data_mut().last_provider = provider;
        self.persist_settings();
    }

    pub fn select_item_type(&mut self, item_type: ItemTypeTag) {
        if self.handshake.is_connecting() {
            return;
        }
        match self.store.update(ParamsUpdate::ItemType(item_type)) {
            Ok(()) => {
                self.settings.data_mut().last_item_type = item_type;
                self.persist_settings();
            }
            Err(err) => {
                self.notification = Some(Notification::error("Unsupported item type", err.to_string()));
            }
        }
    }

    pub fn start_over(&mut self) {
        if self.handshake.is_connecting() {
            return;
        }
        info!("restarting the integration flow");
        self.launcher.dismiss();
        self.store.reset();
        self.handshake.reset();
        self.panel.clear();
        self.notification = None;
    }

    fn set_theme(&mut self, mode: ThemeMode) {
        self.settings.data_mut().theme_mode = mode;
        self.persist_settings();
    }

    fn persist_settings(&self) {
        let Some(path) = self.settings.path().map(|path| path.to_path_buf()) else {
            return;
        };
        let data = self.settings.data().clone();
        self.runtime.spawn(async move {
            if let Err(err) = save_ui_settings(&path, &data).await {
                warn!(error = ?err, "failed to save ui settings");
            }
        });
    }

    fn process_background_events(&mut self) {
        while let Ok(event) = self.rx.try_recv() {
            match event {
                BackgroundEvent::Connected(Ok(credentials)) => {
                    info!(keys = credentials.len(), "integration connected");
                }
                BackgroundEvent::Connected(Err(HandshakeError::InProgress)) => {}
                BackgroundEvent::Connected(Err(err)) => {
                    error!(error = %err, "connection failed");
                    self.launcher.dismiss();
                    self.notification = Some(Notification::error(
                        "Connection failed",
                        err.user_message(),
                    ));
                }
                BackgroundEvent::Loaded(result) => {
                    if let Err(err) = &result {
                        error!(error = %err, "failed to load data");
                        self.notification =
                            Some(Notification::error("Loading failed", err.user_message()));
                    }
                    self.panel.finish(&result);
                }
            }
        }
    }

    fn dismiss_notification(&mut self) {
        self.notification = None;
        if matches!(self.handshake.phase(), HandshakePhase::Failed { .. }) {
            self.handshake.reset();
        }
    }

    fn tick_success(&mut self, now: Instant) {
        if let Some(notice) = &self.success {
            if notice.is_expired(now) {
                info!(url = %notice.cleaned_url(), "success parameter cleared");
                self.success = None;
            }
        }
    }
}

/// Draw one frame. Kept separate from `eframe::App` so it can run headless.
pub fn render_ui(ctx: &egui::Context, app: &mut ConnectorApp) {
    app.process_background_events();
    let now = Instant::now();
    app.tick_success(now);

    let dark_mode = app.theme_mode().is_dark(app.system_dark);
    let palette = ThemePalette::for_mode(dark_mode);
    ctx.set_visuals(palette.visuals(dark_mode));

    if let Some(notice) = &app.success {
        let message = notice.message();
        if SuccessView::show(ctx, &palette, &message, notice.remaining_secs(now)) {
            info!(url = %notice.cleaned_url(), "success view closed");
            app.success = None;
        }
        ctx.request_repaint_after(Duration::from_millis(250));
        return;
    }

    let connecting = app.handshake.is_connecting();
    egui::TopBottomPanel::top("menu").show(ctx, |ui| {
        let output = MenuBar::show(ui, app.theme_mode(), connecting);
        if output.start_over {
            app.start_over();
        }
        if let Some(mode) = output.theme_changed {
            app.set_theme(mode);
        }
        if output.exit {
            app.exit_requested = true;
        }
    });

    egui::CentralPanel::default().show(ctx, |ui| {
        ui.heading("Conduit");
        ui.label(
            RichText::new("Connect a CRM and browse its records.").color(palette.text_secondary),
        );
        ui.add_space(12.0);

        let provider = app.store.provider();
        let button = app.button_state();
        let form = IntegrationForm::show(
            ui,
            &palette,
            &mut app.form,
            provider,
            app.store.item_type(),
            &button,
        );
        if let Some(provider) = form.provider_changed {
            app.select_provider(provider);
        }
        if let Some(item_type) = form.item_type_changed {
            app.select_item_type(item_type);
        }
        if form.connect {
            app.start_connect();
        }
        if let HandshakePhase::Completed { at } = app.handshake.phase() {
            ui.label(
                RichText::new(format!(
                    "Connected at {}",
                    at.with_timezone(&chrono::Local).format("%H:%M:%S")
                ))
                .small()
                .color(palette.text_secondary),
            );
        }

        ui.add_space(16.0);
        ui.separator();
        let connected = app.store.is_connected();
        let output = DataPanelView::show(ui, &palette, app.store.provider(), &app.panel, connected);
        if output.load {
            app.load_data();
        }
        if output.clear {
            app.clear_data();
        }
    });

    if let Some(popup) = app.launcher.current() {
        let output = AuthWindow::show(ctx, popup.provider, &popup.url);
        if output.finished {
            app.launcher.finish();
        } else if output.closed {
            app.launcher.dismiss();
        }
    }

    if let Some(notification) = app.notification.clone() {
        if NotificationWindow::show(ctx, &palette, &notification) {
            app.dismiss_notification();
        }
    }

    if app.handshake.is_connecting() || app.panel.is_loading() {
        ctx.request_repaint_after(BUSY_REPAINT);
    }
}

impl eframe::App for ConnectorApp {
    fn update(&mut self, ctx: &egui::Context, frame: &mut eframe::Frame) {
        if let Some(theme) = frame.info().system_theme {
            self.system_dark = theme == eframe::Theme::Dark;
        }
        render_ui(ctx, self);
        if self.exit_requested {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }
    }
}
