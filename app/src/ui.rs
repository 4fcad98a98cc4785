use conduit_core::render::{render_loaded, CardKind, DataView, DisplayModel, ItemCard};
use conduit_core::{DataPanel, HandshakePhase, ItemTypeTag, ProviderName};
use egui::{self, Align2, Color32, Frame, Margin, RichText, ScrollArea};
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    System,
    Light,
    Dark,
}

impl ThemeMode {
    pub const ALL: [ThemeMode; 3] = [ThemeMode::System, ThemeMode::Light, ThemeMode::Dark];

    pub fn label(self) -> &'static str {
        match self {
            ThemeMode::System => "System",
            ThemeMode::Light => "Light",
            ThemeMode::Dark => "Dark",
        }
    }

    pub fn fallback_theme(self) -> eframe::Theme {
        match self {
            ThemeMode::Light => eframe::Theme::Light,
            ThemeMode::System | ThemeMode::Dark => eframe::Theme::Dark,
        }
    }

    pub fn is_dark(self, system_dark: bool) -> bool {
        match self {
            ThemeMode::System => system_dark,
            ThemeMode::Light => false,
            ThemeMode::Dark => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThemePalette {
    pub background: Color32,
    pub surface: Color32,
    pub accent: Color32,
    pub success: Color32,
    pub text_primary: Color32,
    pub text_secondary: Color32,
    pub border: Color32,
    pub warning: Color32,
}

impl ThemePalette {
    pub fn for_dark() -> Self {
        Self {
            background: color_from_hex("#1E1E1E"),
            surface: color_from_hex("#2D2D30"),
            accent: color_from_hex("#0078D7"),
            success: color_from_hex("#2EA043"),
            text_primary: color_from_hex("#E6E6E6"),
            text_secondary: color_from_hex("#B0B0B0"),
            border: color_from_hex("#3B3B3B"),
            warning: color_from_hex("#C63C3C"),
        }
    }

    pub fn for_light() -> Self {
        Self {
            background: color_from_hex("#FFFFFF"),
            surface: color_from_hex("#F9F9F9"),
            accent: color_from_hex("#0063B1"),
            success: color_from_hex("#1A7F37"),
            text_primary: color_from_hex("#202020"),
            text_secondary: color_from_hex("#5F5F5F"),
            border: color_from_hex("#D0D0D0"),
            warning: color_from_hex("#B02020"),
        }
    }

    pub fn for_mode(dark_mode: bool) -> Self {
        if dark_mode {
            Self::for_dark()
        } else {
            Self::for_light()
        }
    }

    pub fn visuals(&self, dark_mode: bool) -> egui::Visuals {
        let mut visuals = if dark_mode {
            egui::Visuals::dark()
        } else {
            egui::Visuals::light()
        };
        visuals.window_fill = self.surface;
        visuals.panel_fill = self.background;
        visuals.extreme_bg_color = self.surface;
        visuals.widgets.noninteractive.bg_fill = self.surface;
        visuals.widgets.noninteractive.fg_stroke.color = self.text_primary;
        visuals.widgets.active.fg_stroke.color = self.text_primary;
        visuals.widgets.inactive.fg_stroke.color = self.text_primary;
        visuals.hyperlink_color = self.accent;
        visuals.dark_mode = dark_mode;
        visuals
    }
}

fn color_from_hex(hex: &str) -> Color32 {
    let trimmed = hex.trim_start_matches('#');
    if trimmed.len() == 6 {
        if let Ok(value) = u32::from_str_radix(trimmed, 16) {
            let r = ((value >> 16) & 0xFF) as u8;
            let g = ((value >> 8) & 0xFF) as u8;
            let b = (value & 0xFF) as u8;
            return Color32::from_rgb(r, g, b);
        }
    }
    Color32::WHITE
}

#[derive(Default)]
pub struct MenuBarOutput {
    pub start_over: bool,
    pub exit: bool,
    pub theme_changed: Option<ThemeMode>,
}

pub struct MenuBar;

impl MenuBar {
    pub fn show(ui: &mut egui::Ui, theme_mode: ThemeMode, busy: bool) -> MenuBarOutput {
        let mut output = MenuBarOutput::default();
        egui::menu::bar(ui, |ui| {
            ui.menu_button("File", |ui| {
                if ui
                    .add_enabled(!busy, egui::Button::new("Start over"))
                    .clicked()
                {
                    output.start_over = true;
                    ui.close_menu();
                }
                ui.separator();
                if ui.button("Exit").clicked() {
                    output.exit = true;
                    ui.close_menu();
                }
            });
            ui.menu_button("View", |ui| {
                ui.menu_button("Theme", |ui| {
                    for mode in ThemeMode::ALL {
                        if ui.radio(theme_mode == mode, mode.label()).clicked() {
                            output.theme_changed = Some(mode);
                            ui.close_menu();
                        }
                    }
                });
            });
        });
        output
    }
}

/// What the connect button shows for the current provider and handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectButtonState {
    Ready(String),
    Connecting,
    Connected(String),
    Unavailable(String),
}

impl ConnectButtonState {
    pub fn resolve(provider: ProviderName, phase: &HandshakePhase, connected: bool) -> Self {
        if !provider.is_functional() {
            return Self::Unavailable(format!("{provider} (coming soon)"));
        }
        if matches!(phase, HandshakePhase::Connecting) {
            return Self::Connecting;
        }
        if connected {
            return Self::Connected(format!("{provider} Connected"));
        }
        Self::Ready(format!("Connect to {provider}"))
    }

    pub fn clickable(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// Text inputs owned by the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormState {
    pub user_id: String,
    pub org_id: String,
}

#[derive(Default)]
pub struct FormOutput {
    pub provider_changed: Option<ProviderName>,
    pub item_type_changed: Option<ItemTypeTag>,
    pub connect: bool,
}

pub struct IntegrationForm;

impl IntegrationForm {
    pub fn show(
        ui: &mut egui::Ui,
        palette: &ThemePalette,
        form: &mut FormState,
        provider: ProviderName,
        item_type: ItemTypeTag,
        button: &ConnectButtonState,
    ) -> FormOutput {
        let mut output = FormOutput::default();
        let locked = !matches!(button, ConnectButtonState::Ready(_));
        let connecting = matches!(button, ConnectButtonState::Connecting);

        egui::Grid::new("integration_form")
            .num_columns(2)
            .spacing([12.0, 8.0])
            .show(ui, |ui| {
                ui.label("User");
                ui.add_enabled(
                    !locked,
                    egui::TextEdit::singleline(&mut form.user_id).desired_width(220.0),
                );
                ui.end_row();

                ui.label("Organization");
                ui.add_enabled(
                    !locked,
                    egui::TextEdit::singleline(&mut form.org_id).desired_width(220.0),
                );
                ui.end_row();

                ui.label("Integration");
                let mut selected = provider;
                ui.add_enabled_ui(!connecting, |ui| {
                    egui::ComboBox::from_id_source("provider_select")
                        .selected_text(provider.label())
                        .show_ui(ui, |ui| {
                            for candidate in ProviderName::ALL {
                                let label = if candidate.is_functional() {
                                    candidate.label().to_string()
                                } else {
                                    format!("{} (coming soon)", candidate.label())
                                };
                                ui.selectable_value(&mut selected, candidate, label);
                            }
                        });
                });
                if selected != provider {
                    output.provider_changed = Some(selected);
                }
                ui.end_row();

                ui.label("Item type");
                let supported = provider.supported_item_types();
                if supported.is_empty() {
                    ui.label(RichText::new("Not available yet").color(palette.text_secondary));
                } else {
                    // Stays editable once connected.
                    let mut selected = item_type;
                    ui.add_enabled_ui(!connecting, |ui| {
                        egui::ComboBox::from_id_source("item_type_select")
                            .selected_text(item_type.label())
                            .show_ui(ui, |ui| {
                                for candidate in supported {
                                    ui.selectable_value(&mut selected, *candidate, candidate.label());
                                }
                            });
                    });
                    if selected != item_type {
                        output.item_type_changed = Some(selected);
                    }
                }
                ui.end_row();
            });

        ui.add_space(12.0);
        ui.horizontal(|ui| match button {
            ConnectButtonState::Ready(label) => {
                if ui
                    .add(egui::Button::new(RichText::new(label).strong()).fill(palette.accent))
                    .clicked()
                {
                    output.connect = true;
                }
            }
            ConnectButtonState::Connecting => {
                ui.add_enabled(false, egui::Button::new("Connecting…"));
                ui.spinner();
            }
            ConnectButtonState::Connected(label) => {
                ui.add_enabled(
                    false,
                    egui::Button::new(RichText::new(label).color(palette.success)),
                );
            }
            ConnectButtonState::Unavailable(label) => {
                ui.add_enabled(false, egui::Button::new(label.as_str()));
            }
        });
        output
    }
}

#[derive(Default)]
pub struct AuthWindowOutput {
    pub finished: bool,
    pub closed: bool,
}

/// In-app stand-in for the provider's OAuth popup.
pub struct AuthWindow;

impl AuthWindow {
    pub fn show(ctx: &egui::Context, provider: ProviderName, url: &Url) -> AuthWindowOutput {
        let mut output = AuthWindowOutput::default();
        let mut open = true;
        egui::Window::new(format!("Connect to {provider}"))
            .id(egui::Id::new("auth_window"))
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
            .open(&mut open)
            .show(ctx, |ui| {
                ui.label(format!(
                    "Sign in to {provider} and grant access in your browser:"
                ));
                ui.add_space(6.0);
                ui.hyperlink_to("Open authorization page", url.as_str());
                if ui
                    .small_button("Copy link")
                    .on_hover_text("Copy the authorization URL to the clipboard")
                    .clicked()
                {
                    ui.output_mut(|out| out.copied_text = url.to_string());
                }
                ui.add_space(12.0);
                ui.horizontal(|ui| {
                    if ui.button("I've finished signing in").clicked() {
                        output.finished = true;
                    }
                    if ui.button("Cancel").clicked() {
                        output.closed = true;
                    }
                });
            });
        if !open {
            output.closed = true;
        }
        output
    }
}

#[derive(Default)]
pub struct DataPanelOutput {
    pub load: bool,
    pub clear: bool,
}

pub struct DataPanelView;

impl DataPanelView {
    pub fn show(
        ui: &mut egui::Ui,
        palette: &ThemePalette,
        provider: ProviderName,
        panel: &DataPanel,
        connected: bool,
    ) -> DataPanelOutput {
        let mut output = DataPanelOutput::default();
        ui.heading(format!("{provider} Data"));
        ui.horizontal(|ui| {
            let can_load = connected && !panel.is_loading();
            if ui
                .add_enabled(can_load, egui::Button::new("Load Data"))
                .clicked()
            {
                output.load = true;
            }
            if panel.is_loading() {
                ui.spinner();
            }
            if ui
                .add_enabled(panel.loaded().is_some(), egui::Button::new("Clear Data"))
                .clicked()
            {
                output.clear = true;
            }
        });
        ui.add_space(8.0);

        let Some(loaded) = panel.loaded() else {
            if !connected {
                ui.label(
                    RichText::new(format!("Connect to {provider} to load data."))
                        .color(palette.text_secondary),
                );
            }
            return output;
        };

        match render_loaded(loaded) {
            DataView::Error(message) => {
                ui.colored_label(palette.warning, message);
            }
            DataView::Empty => {
                ui.label(RichText::new("No data found").color(palette.text_secondary));
            }
            DataView::Items { summary, entries } => {
                ui.label(RichText::new(summary).color(palette.text_secondary));
                ui.add_space(6.0);
                ScrollArea::vertical()
                    .id_source("loaded_items")
                    .auto_shrink([false; 2])
                    .show(ui, |ui| {
                        for entry in entries {
                            ui.push_id(&entry.key, |ui| match &entry.model {
                                DisplayModel::Card(card) => item_card(ui, palette, card),
                                DisplayModel::Raw(dump) => raw_dump(ui, palette, dump),
                            });
                            ui.add_space(6.0);
                        }
                    });
            }
        }
        output
    }
}

fn item_card(ui: &mut egui::Ui, palette: &ThemePalette, card: &ItemCard) {
    let badge_color = match card.kind {
        CardKind::Contact => palette.accent,
        CardKind::Company => palette.success,
    };
    Frame::none()
        .fill(palette.surface)
        .stroke(egui::Stroke::new(1.0, palette.border))
        .rounding(8.0)
        .inner_margin(Margin::symmetric(12.0, 8.0))
        .show(ui, |ui| {
            ui.set_width(ui.available_width());
            ui.horizontal(|ui| {
                ui.label(RichText::new(&card.title).strong());
                ui.label(RichText::new(card.badge).small().color(badge_color));
            });
            for row in &card.rows {
                ui.horizontal(|ui| {
                    ui.label(
                        RichText::new(format!("{}:", row.label)).color(palette.text_secondary),
                    );
                    ui.label(row.value.as_str());
                });
            }
        });
}

fn raw_dump(ui: &mut egui::Ui, palette: &ThemePalette, dump: &str) {
    Frame::none()
        .fill(palette.surface)
        .stroke(egui::Stroke::new(1.0, palette.border))
        .rounding(8.0)
        .inner_margin(Margin::same(8.0))
        .show(ui, |ui| {
            ui.set_width(ui.available_width());
            ui.monospace(dump);
        });
}

/// A blocking message the user has to acknowledge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }
}

pub struct NotificationWindow;

impl NotificationWindow {
    /// Returns `true` once the user has dismissed the notification.
    pub fn show(ctx: &egui::Context, palette: &ThemePalette, notification: &Notification) -> bool {
        let mut dismissed = false;
        egui::Window::new(notification.title.as_str())
            .id(egui::Id::new("notification"))
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.colored_label(palette.warning, notification.message.as_str());
                ui.add_space(8.0);
                if ui.button("OK").clicked() {
                    dismissed = true;
                }
            });
        dismissed
    }
}

pub struct SuccessView;

impl SuccessView {
    /// Returns `true` when "Close now" was pressed.
    pub fn show(
        ctx: &egui::Context,
        palette: &ThemePalette,
        message: &str,
        remaining_secs: u64,
    ) -> bool {
        let mut close_now = false;
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(ui.available_height() * 0.3);
                ui.heading(RichText::new(message).color(palette.success));
                ui.add_space(8.0);
                ui.label(
                    RichText::new(format!(
                        "This window will close in {remaining_secs} seconds."
                    ))
                    .color(palette.text_secondary),
                );
                ui.add_space(12.0);
                if ui.button("Close now").clicked() {
                    close_now = true;
                }
            });
        });
        close_now
    }
}
