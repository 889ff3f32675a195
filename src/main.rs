//! EPG Viewer
//! Browse XMLTV programme guides: channels, favorites, programme search and details

// Hide console window on Windows release builds
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

// Use mimalloc for faster memory allocation (Linux, macOS)
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use chrono::NaiveDateTime;
use eframe::egui;
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;
mod epg;
mod error;
mod prefs;

use app_state::AppState;
use config::AppConfig;
use epg::{format_start, format_stop, Listing, ListingSource, LoadOrigin, ProgressCallback};
use prefs::Preferences;

/// Get current local time as HH:MM:SS
fn timestamp_now() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

/// Wall clock used for the programme time window
fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

fn format_bytes(bytes: u64) -> String {
    const MB: f64 = 1024.0 * 1024.0;
    format!("{:.1} MB", bytes as f64 / MB)
}

/// Background task messages
enum TaskResult {
    EpgProgress { downloaded: u64, total: Option<u64> },
    EpgLoaded { listing: Box<Listing>, origin: LoadOrigin },
    EpgError(String),
}

/// What a background load should do
enum LoadKind {
    /// Cached document if present, otherwise download
    Startup,
    /// Always download and overwrite the cache
    Refresh,
    /// Parse a user-chosen file
    Import(PathBuf),
}

fn main() -> Result<(), eframe::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("epg_viewer=info")),
        )
        .init();

    let config = AppConfig::load();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 950.0])
            .with_min_inner_size([800.0, 550.0]),
        vsync: true,
        ..Default::default()
    };

    eframe::run_native(
        "EPG Viewer",
        options,
        Box::new(move |cc| {
            if config.dark_mode {
                cc.egui_ctx.set_visuals(egui::Visuals::dark());
            } else {
                cc.egui_ctx.set_visuals(egui::Visuals::light());
            }
            Ok(Box::new(EpgViewerApp::new(config, cc.egui_ctx.clone())))
        }),
    )
}

struct EpgViewerApp {
    config: AppConfig,
    state: AppState,
    ctx: egui::Context,

    // Background task channel
    task_receiver: Receiver<TaskResult>,
    task_sender: Sender<TaskResult>,
    loading: bool,
    load_progress: String,
    status_message: String,

    // Filter inputs
    channel_text_input: String,
    programme_text_input: String,

    // Dialogs
    error_message: Option<String>,
    info_message: Option<String>,

    // Console log
    console_log: Vec<String>,
    show_console: bool,
}

impl EpgViewerApp {
    fn new(config: AppConfig, ctx: egui::Context) -> Self {
        let (task_sender, task_receiver) = channel();
        let data_dir = config.data_dir();

        let (prefs, load_errors) = Preferences::load(&data_dir);
        for e in &load_errors {
            error!("failed to load preferences: {}", e);
        }
        let startup_error = if load_errors.is_empty() {
            None
        } else {
            let lines: Vec<String> = load_errors.iter().map(|e| e.to_string()).collect();
            Some(format!(
                "Could not read preferences; changes to them will not be saved this session.\n{}",
                lines.join("\n")
            ))
        };
        let state = AppState::new(prefs, config.programme_window(), config.programme_order());

        let mut app = Self {
            config,
            state,
            ctx,
            task_receiver,
            task_sender,
            loading: false,
            load_progress: String::new(),
            status_message: "Ready".to_string(),
            channel_text_input: String::new(),
            programme_text_input: String::new(),
            error_message: startup_error,
            info_message: None,
            console_log: Vec::new(),
            show_console: false,
        };
        app.log(&format!("[INFO] Data directory: {}", data_dir.display()));
        app.log(&format!(
            "[INFO] Favorites: {}, hidden: {}",
            app.state.prefs.favorites.len(),
            app.state.prefs.hidden.len()
        ));
        app.start_load(LoadKind::Startup);
        app
    }

    fn log(&mut self, message: &str) {
        let timestamp = timestamp_now();
        self.console_log.push(format!("[{}] {}", timestamp, message));
        // Keep last 500 lines
        if self.console_log.len() > 500 {
            self.console_log.remove(0);
        }
    }

    fn start_load(&mut self, kind: LoadKind) {
        if self.loading {
            return;
        }
        self.loading = true;
        self.load_progress.clear();

        let source = ListingSource::new(
            self.config.epg_url.clone(),
            self.config.cache_path(),
            self.config.download_config(),
        );
        match &kind {
            LoadKind::Startup if source.has_cache() => {
                self.status_message = "Loading cached EPG...".to_string();
                self.log(&format!("[INFO] Loading EPG from cache: {}", source.cache_path.display()));
            }
            LoadKind::Startup | LoadKind::Refresh => {
                self.status_message = "Downloading EPG...".to_string();
                self.log(&format!("[INFO] Downloading EPG from: {}", source.url));
            }
            LoadKind::Import(path) => {
                self.status_message = "Opening EPG file...".to_string();
                self.log(&format!("[INFO] Opening EPG file: {}", path.display()));
            }
        }

        let sender = self.task_sender.clone();
        let ctx = self.ctx.clone();
        let progress: ProgressCallback = {
            let sender = sender.clone();
            let ctx = ctx.clone();
            Box::new(move |downloaded, total| {
                let _ = sender.send(TaskResult::EpgProgress { downloaded, total });
                ctx.request_repaint();
            })
        };

        thread::spawn(move || {
            let result = match kind {
                LoadKind::Startup => source.load(Some(&progress)),
                LoadKind::Refresh => source
                    .refresh(Some(&progress))
                    .map(|listing| (listing, LoadOrigin::Network)),
                LoadKind::Import(path) => {
                    ListingSource::import(&path).map(|listing| (listing, LoadOrigin::File))
                }
            };

            let message = match result {
                Ok((listing, origin)) => TaskResult::EpgLoaded {
                    listing: Box::new(listing),
                    origin,
                },
                Err(e) => {
                    error!("EPG load failed: {}", e);
                    TaskResult::EpgError(e.to_string())
                }
            };
            let _ = sender.send(message);
            ctx.request_repaint();
        });
    }

    fn process_tasks(&mut self) {
        while let Ok(result) = self.task_receiver.try_recv() {
            match result {
                TaskResult::EpgProgress { downloaded, total } => {
                    self.load_progress = match total {
                        Some(total) => format!("{} / {}", format_bytes(downloaded), format_bytes(total)),
                        None => format_bytes(downloaded),
                    };
                }
                TaskResult::EpgLoaded { listing, origin } => {
                    self.loading = false;
                    self.log(&format!(
                        "[INFO] EPG loaded from {}: {} channels, {} programmes",
                        origin.label(),
                        listing.channel_count(),
                        listing.programme_count()
                    ));
                    self.state.replace_listing(*listing, origin, local_now());
                    self.status_message = format!(
                        "{} channels, {} programmes ({})",
                        self.state.listing.channel_count(),
                        self.state.listing.programme_count(),
                        origin.label()
                    );
                    if origin == LoadOrigin::Network {
                        self.info_message = Some("EPG refreshed".to_string());
                    }
                }
                TaskResult::EpgError(msg) => {
                    self.loading = false;
                    self.log(&format!("[ERROR] EPG: {}", msg));
                    self.status_message = "EPG load failed".to_string();
                    self.error_message = Some(msg);
                }
            }
        }
    }

    fn toggle_favorite(&mut self) {
        match self.state.toggle_favorite_selected(local_now()) {
            Ok(true) => self.log("[INFO] Favorites updated"),
            Ok(false) => {}
            Err(e) => self.report_save_error(e),
        }
    }

    fn hide_channels(&mut self) {
        let count = self.state.selected.len();
        match self.state.hide_selected() {
            Ok(true) => self.log(&format!("[INFO] Hid {} channel(s)", count)),
            Ok(false) => {}
            Err(e) => self.report_save_error(e),
        }
    }

    fn report_save_error(&mut self, e: error::EpgError) {
        error!("failed to save preferences: {}", e);
        self.log(&format!("[ERROR] Saving preferences: {}", e));
        self.error_message = Some(e.to_string());
    }

    fn open_file(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("XMLTV", &["xml", "gz"])
            .add_filter("All files", &["*"])
            .pick_file()
        {
            self.start_load(LoadKind::Import(path));
        }
    }

    fn show_top_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.add_space(4.0);
            ui.horizontal(|ui| {
                let refresh = ui
                    .add_enabled(!self.loading, egui::Button::new("🔄 Refresh EPG (internet)"))
                    .on_hover_text(self.config.epg_url.as_str());
                if refresh.clicked() {
                    self.start_load(LoadKind::Refresh);
                }
                if ui
                    .add_enabled(!self.loading, egui::Button::new("📂 Open XMLTV file"))
                    .clicked()
                {
                    self.open_file();
                }
                ui.separator();
                ui.toggle_value(&mut self.show_console, "📋 Console");

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("Quit").clicked() {
                        ui.ctx().send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });
            });
            ui.add_space(4.0);
        });
    }

    fn show_status_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if self.loading {
                    ui.spinner();
                }
                ui.label(self.status_message.as_str());
                if self.loading && !self.load_progress.is_empty() {
                    ui.label(self.load_progress.as_str());
                }
            });
        });
    }

    fn show_channel_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::left("channels_panel")
            .resizable(true)
            .default_width(260.0)
            .min_width(200.0)
            .show(ctx, |ui| {
                ui.label("Search channels");
                if ui.text_edit_singleline(&mut self.channel_text_input).changed() {
                    self.state.set_channel_text(&self.channel_text_input);
                }

                let mut favorites_only = self.state.favorites_only;
                if ui.checkbox(&mut favorites_only, "Show favorites only").changed() {
                    self.state.set_favorites_only(favorites_only);
                }

                ui.horizontal(|ui| {
                    let has_selection = !self.state.selected.is_empty();
                    if ui
                        .add_enabled(has_selection, egui::Button::new("⭐ Add / remove favorite"))
                        .clicked()
                    {
                        self.toggle_favorite();
                    }
                    if ui
                        .add_enabled(has_selection, egui::Button::new("🚫 Hide channel"))
                        .clicked()
                    {
                        self.hide_channels();
                    }
                });
                ui.separator();
                ui.label(format!("Channels ({})", self.state.channels.len()));

                let multi = ui.input(|i| i.modifiers.command);
                let mut clicked: Option<String> = None;

                egui::ScrollArea::vertical()
                    .id_salt("channels_scroll")
                    .auto_shrink([false, false])
                    .show(ui, |ui| {
                        for row in &self.state.channels {
                            let selected = self.state.is_selected(&row.id);
                            if ui.selectable_label(selected, row.label()).clicked() {
                                clicked = Some(row.id.clone());
                            }
                        }
                    });

                if let Some(id) = clicked {
                    if multi {
                        self.state.toggle_selection(&id, local_now());
                    } else {
                        self.state.select_only(&id, local_now());
                    }
                }
            });
    }

    fn show_details_panel(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("details_panel")
            .resizable(true)
            .default_height(320.0)
            .min_height(120.0)
            .show(ctx, |ui| {
                ui.heading("Details");
                ui.separator();
                egui::ScrollArea::vertical()
                    .id_salt("details_scroll")
                    .auto_shrink([false, false])
                    .show(ui, |ui| {
                        if let Some(programme) = self.state.selected_details() {
                            ui.label(programme.details());
                        }
                    });
            });
    }

    fn show_programme_panel(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.label("Search programmes");
            if ui.text_edit_singleline(&mut self.programme_text_input).changed() {
                self.state.set_programme_text(&self.programme_text_input, local_now());
            }

            let mut search_favorites = self.state.search_favorites;
            if ui
                .checkbox(&mut search_favorites, "Search programmes on favorite channels only")
                .changed()
            {
                self.state.set_search_favorites(search_favorites, local_now());
            }
            ui.separator();
            ui.label(format!("Programmes ({})", self.state.programmes.len()));

            let mut clicked = None;
            egui::ScrollArea::vertical()
                .id_salt("programmes_scroll")
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    egui::Grid::new("programme_grid")
                        .num_columns(4)
                        .striped(true)
                        .spacing([16.0, 4.0])
                        .show(ui, |ui| {
                            ui.strong("Channel");
                            ui.strong("Start");
                            ui.strong("Stop");
                            ui.strong("Title");
                            ui.end_row();

                            for row in &self.state.programmes {
                                let selected = self.state.selected_programme.as_ref() == Some(&row.key);
                                ui.label(row.channel.as_str());
                                ui.label(format_start(&row.start));
                                ui.label(row.stop.as_ref().map(format_stop).unwrap_or_default());
                                if ui.selectable_label(selected, row.title.as_str()).clicked() {
                                    clicked = Some(row.key.clone());
                                }
                                ui.end_row();
                            }
                        });
                });

            if let Some(key) = clicked {
                self.state.select_programme(key);
            }
        });
    }

    fn show_dialogs(&mut self, ctx: &egui::Context) {
        if let Some(msg) = self.error_message.clone() {
            egui::Window::new("⚠ Error")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.label(msg);
                    ui.add_space(8.0);
                    if ui.button("OK").clicked() {
                        self.error_message = None;
                    }
                });
        } else if let Some(msg) = self.info_message.clone() {
            egui::Window::new("EPG")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.label(msg);
                    ui.add_space(8.0);
                    if ui.button("OK").clicked() {
                        self.info_message = None;
                    }
                });
        }
    }

    fn show_console(&mut self, ctx: &egui::Context) {
        egui::Window::new("Console Log")
            .open(&mut self.show_console)
            .default_size([640.0, 320.0])
            .show(ctx, |ui| {
                egui::ScrollArea::vertical()
                    .auto_shrink([false, false])
                    .stick_to_bottom(true)
                    .show(ui, |ui| {
                        for line in &self.console_log {
                            let color = if line.contains("[ERROR]") {
                                egui::Color32::RED
                            } else if line.contains("[WARN]") {
                                egui::Color32::YELLOW
                            } else if line.contains("[INFO]") {
                                egui::Color32::LIGHT_BLUE
                            } else {
                                egui::Color32::GRAY
                            };
                            ui.label(egui::RichText::new(line).monospace().color(color));
                        }
                    });
            });
    }
}

impl eframe::App for EpgViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_tasks();

        // Side and bottom panels must be laid out before the central panel
        self.show_top_bar(ctx);
        self.show_status_bar(ctx);
        self.show_channel_panel(ctx);
        self.show_details_panel(ctx);
        self.show_programme_panel(ctx);

        self.show_dialogs(ctx);
        self.show_console(ctx);

        if self.loading {
            ctx.request_repaint();
        }
    }
}
