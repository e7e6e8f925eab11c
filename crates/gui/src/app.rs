//! Main application state and UI layout.

use std::sync::{Arc, Mutex};
use std::thread;

use eframe::egui;
use amg_core::generate::{ClientConfig, GenerationService, HttpGenerationClient};
use amg_core::input::ACCEPTED_EXTENSIONS;
use amg_core::resource::DOWNLOAD_FILE_NAME;
use amg_core::session::SessionConfig;
use amg_core::{Studio, UserError};

use crate::decor::{paint_glyphs, paint_marker};

// ─── Background submission ──────────────────────────────────────

/// Outcome of a generation request, handed from the worker thread to the UI.
#[derive(Clone, Default)]
struct SubmissionSlot {
    outcome: Arc<Mutex<Option<Result<Vec<u8>, UserError>>>>,
}

impl SubmissionSlot {
    fn put(&self, outcome: Result<Vec<u8>, UserError>) {
        *self.outcome.lock().unwrap() = Some(outcome);
    }

    fn take(&self) -> Option<Result<Vec<u8>, UserError>> {
        self.outcome.lock().unwrap().take()
    }
}

// ─── App ─────────────────────────────────────────────────────────

pub struct AmgApp {
    studio: Studio,
    client: Option<Arc<HttpGenerationClient>>,
    slot: SubmissionSlot,
    /// Last download result shown under the player
    download_note: Option<String>,
}

impl AmgApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let client = match HttpGenerationClient::new(ClientConfig::default()) {
            Ok(c) => Some(Arc::new(c)),
            Err(e) => {
                log::error!("{:#}", e);
                None
            }
        };

        Self {
            studio: Studio::new(SessionConfig::default()),
            client,
            slot: SubmissionSlot::default(),
            download_note: None,
        }
    }
}

impl eframe::App for AmgApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if let Some(outcome) = self.slot.take() {
            self.studio.complete_submission(outcome);
            self.download_note = None;
        }
        self.studio.refresh();

        if let Some(pos) = ctx.input(|i| i.pointer.hover_pos()) {
            self.studio.pointer.update(pos.x, pos.y);
        }

        // Decorations animate continuously
        ctx.request_repaint();
        paint_glyphs(ctx, self.studio.glyphs());

        egui::CentralPanel::default()
            .frame(egui::Frame::default().inner_margin(24.0))
            .show(ctx, |ui| {
                ui.vertical_centered(|ui| {
                    ui.add_space(12.0);
                    ui.heading(egui::RichText::new("AI Music Generator").size(32.0).strong());
                    ui.add_space(24.0);
                });

                show_upload_section(ui, self, ctx);

                if self.studio.generated().is_some() {
                    ui.add_space(16.0);
                    show_player_section(ui, self);
                }

                ui.add_space(24.0);
                ui.vertical_centered(|ui| {
                    ui.weak(
                        "Upload a MIDI file and our AI will generate a new musical piece \
                         inspired by your input.",
                    );
                });
            });

        paint_marker(ctx, &self.studio.pointer);
    }
}

// ─── Sections ────────────────────────────────────────────────────

fn show_upload_section(ui: &mut egui::Ui, app: &mut AmgApp, ctx: &egui::Context) {
    egui::Frame::group(ui.style()).show(ui, |ui| {
        ui.set_width(ui.available_width());
        ui.vertical_centered(|ui| {
            if ui.button("Choose MIDI file...").clicked() {
                if let Some(path) = rfd::FileDialog::new()
                    .add_filter("MIDI", &ACCEPTED_EXTENSIONS)
                    .pick_file()
                {
                    // Errors are kept on the studio and shown below
                    let _ = app.studio.select_path(&path);
                }
            }
            ui.weak("only .mid / .midi files");

            if let Some(file) = app.studio.pending() {
                ui.colored_label(
                    egui::Color32::from_rgb(0x00, 0xCC, 0x66),
                    format!("Selected: {}", file.name),
                );
            }
            if let Some(err) = app.studio.error() {
                ui.colored_label(egui::Color32::RED, err);
            }
        });
    });

    ui.add_space(12.0);
    ui.vertical_centered_justified(|ui| {
        if app.studio.is_loading() {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Generating...");
            });
        } else {
            let enabled = app.studio.can_submit() && app.client.is_some();
            if ui
                .add_enabled(enabled, egui::Button::new("Generate Music"))
                .clicked()
            {
                start_generation(app, ctx);
            }
        }
    });
}

fn show_player_section(ui: &mut egui::Ui, app: &mut AmgApp) {
    egui::Frame::group(ui.style()).show(ui, |ui| {
        ui.set_width(ui.available_width());
        ui.heading("Generated Music");
        ui.add_space(8.0);

        ui.horizontal(|ui| {
            let label = if app.studio.is_playing() { "Stop" } else { "Play" };
            if ui.button(label).clicked() {
                app.studio.toggle_playback();
            }
            if app.studio.is_playing() {
                ui.monospace(app.studio.session().position_bbs());
            }
        });

        ui.add_space(8.0);
        if ui.link("Download MIDI file").clicked() {
            if let Some(target) = rfd::FileDialog::new()
                .set_file_name(DOWNLOAD_FILE_NAME)
                .save_file()
            {
                app.download_note = Some(match app.studio.download_as(&target) {
                    Ok(_) => format!("Saved to {}", target.display()),
                    Err(e) => {
                        log::error!("{:#}", e);
                        format!("Download failed: {}", e)
                    }
                });
            }
        }
        if let Some(note) = &app.download_note {
            ui.weak(note);
        }
    });
}

// ─── Generation ─────────────────────────────────────────────────

fn start_generation(app: &mut AmgApp, ctx: &egui::Context) {
    let Some(client) = app.client.clone() else {
        return;
    };
    let Some(file) = app.studio.begin_submission() else {
        return;
    };

    let slot = app.slot.clone();
    let ctx = ctx.clone();
    thread::spawn(move || {
        let outcome = client.generate(&file);
        slot.put(outcome);
        ctx.request_repaint();
    });
}
