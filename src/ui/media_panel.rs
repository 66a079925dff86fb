use eframe::egui;
use std::fs;

use log::warn;

use super::app::StoryApp;
use super::settings_panel;

pub fn draw_media_panel(ctx: &egui::Context, app: &mut StoryApp) {
    egui::SidePanel::right("media")
        .resizable(true)
        .default_width(320.0)
        .min_width(240.0)
        .show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                draw_illustration(ui, app);
                ui.separator();
                draw_narration(ui, app);
                ui.separator();
                draw_video(ui, app);
                ui.separator();
                settings_panel::draw_settings_section(ui, app);
            });
        });
}

fn draw_illustration(ui: &mut egui::Ui, app: &StoryApp) {
    ui.heading("Illustration");
    ui.add_space(4.0);

    match &app.illustration {
        Some(texture) => {
            ui.add(egui::Image::new(texture).max_width(ui.available_width()));
        }
        None if app.illustration_pending => {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Illustrating…");
            });
        }
        None => {
            ui.label("No illustration for this scene.");
        }
    }
    ui.add_space(6.0);
}

fn draw_narration(ui: &mut egui::Ui, app: &mut StoryApp) {
    ui.heading("Narration");
    ui.add_space(4.0);

    if app.narration_pending {
        ui.horizontal(|ui| {
            ui.spinner();
            ui.label("Narrating…");
        });
    } else if ui.button("Narrate this scene").clicked() {
        app.request_narration();
    }

    if let Some(audio) = app.narration.clone() {
        if ui.button("Save narration…").clicked() {
            save_bytes("narration.wav", &audio);
        }
    }
    ui.add_space(6.0);
}

fn draw_video(ui: &mut egui::Ui, app: &mut StoryApp) {
    ui.heading("Video");
    ui.add_space(4.0);

    if app.video_pending {
        ui.horizontal(|ui| {
            ui.spinner();
            ui.label("Rendering…");
            if ui.button("Cancel").clicked() {
                app.cancel_video();
            }
        });
    } else if ui.button("Render this scene as video").clicked() {
        app.request_video();
    }

    if let Some(url) = app.video_url.clone() {
        ui.hyperlink_to("Open rendered clip", url);
    }
    ui.add_space(6.0);
}

fn save_bytes(suggested_name: &str, bytes: &[u8]) {
    let Some(path) = rfd::FileDialog::new()
        .set_file_name(suggested_name)
        .save_file()
    else {
        return;
    };

    if let Err(e) = fs::write(&path, bytes) {
        warn!("could not save {}: {e}", path.display());
    }
}
