use eframe::egui;

use super::app::StoryApp;

/// Collapsing settings editor. Drawn from both the setup form and the
/// media pane so a misconfigured backend can always be corrected, even
/// before any session has started.
pub fn draw_settings_section(ui: &mut egui::Ui, app: &mut StoryApp) {
    ui.collapsing("Settings", |ui| {
        let backend = &mut app.settings.backend;

        ui.label("API base URL");
        ui.text_edit_singleline(&mut backend.base_url);

        ui.label("API key");
        ui.add(egui::TextEdit::singleline(&mut backend.api_key).password(true));

        ui.label("Narrative model");
        ui.text_edit_singleline(&mut backend.narrative_model);

        ui.label("Image model");
        ui.text_edit_singleline(&mut backend.image_model);

        ui.label("Speech model");
        ui.text_edit_singleline(&mut backend.speech_model);

        ui.label("Video model");
        ui.text_edit_singleline(&mut backend.video_model);

        ui.separator();

        ui.label("UI scale");
        ui.add(egui::Slider::new(&mut app.settings.ui_scale, 0.75..=2.0));

        for key in ["Scene", "Actions", "Notice"] {
            ui.horizontal(|ui| {
                ui.label(key);
                let mut color = app.settings.color(key);
                if ui.color_edit_button_srgba(&mut color).changed() {
                    app.settings.set_color(key, color);
                }
            });
        }

        ui.separator();

        if ui.button("Apply and restart").clicked() {
            app.apply_settings();
        }
        ui.label(
            egui::RichText::new("Applying abandons the current story.").small(),
        );
    });
}
