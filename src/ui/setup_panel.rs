use eframe::egui;

use super::app::StoryApp;
use super::settings_panel;

pub fn draw_setup_panel(ctx: &egui::Context, app: &mut StoryApp) {
    egui::CentralPanel::default().show(ctx, |ui| {
        ui.vertical_centered(|ui| {
            ui.add_space(40.0);
            ui.heading("Storyweaver");
            ui.label("Set the stage, then let the story unfold.");
        });

        ui.add_space(20.0);

        egui::Grid::new("setup_form")
            .num_columns(2)
            .spacing([12.0, 10.0])
            .show(ui, |ui| {
                ui.label("Genre");
                ui.add_sized(
                    [320.0, 20.0],
                    egui::TextEdit::singleline(&mut app.setup.genre)
                        .hint_text("Fantasy, noir, space opera…"),
                );
                ui.end_row();

                ui.label("Tone");
                ui.add_sized(
                    [320.0, 20.0],
                    egui::TextEdit::singleline(&mut app.setup.tone)
                        .hint_text("Lighthearted, grim, mysterious…"),
                );
                ui.end_row();

                ui.label("Your role");
                ui.add_sized(
                    [320.0, 60.0],
                    egui::TextEdit::multiline(&mut app.setup.player_role)
                        .hint_text("Who are you in this story?"),
                );
                ui.end_row();
            });

        ui.add_space(16.0);

        let ready = app.setup.is_complete() && !app.loading;
        let begin = ui.add_enabled(ready, egui::Button::new("Begin the story"));

        if begin.clicked() {
            app.begin_session();
        }

        if app.loading {
            ui.add_space(8.0);
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("The opening scene is being written…");
            });
        }

        if let Some(notice) = app.notice.clone() {
            ui.add_space(8.0);
            super::app::bubble(ui, app.settings.color("Notice"), &notice);
        }

        // The backend may need correcting before any story can start, so
        // the settings editor must be reachable here too.
        ui.add_space(24.0);
        ui.separator();
        settings_panel::draw_settings_section(ui, app);
    });
}
