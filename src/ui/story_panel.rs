use eframe::egui;

use super::app::{bubble, StoryApp};

pub fn draw_story_panel(ctx: &egui::Context, app: &mut StoryApp) {
    // ---------- Top bar ----------
    egui::TopBottomPanel::top("story_top").show(ctx, |ui| {
        ui.horizontal(|ui| {
            ui.heading("Storyweaver");

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("New story").clicked() {
                    app.new_story();
                }
                if ui.button("Export transcript").clicked() {
                    app.export_transcript();
                }
            });
        });
    });

    // ---------- Scene, reactions, choices ----------
    egui::CentralPanel::default().show(ctx, |ui| {
        egui::ScrollArea::vertical().show(ui, |ui| {
            let Some(snapshot) = app.snapshot.clone() else {
                ui.label("No scene yet.");
                return;
            };

            ui.add_space(6.0);
            bubble(ui, app.settings.color("Scene"), &snapshot.scene);

            if !snapshot.actions.is_empty() {
                ui.add_space(6.0);
                ui.label(egui::RichText::new("Character reactions").small());
                bubble(ui, app.settings.color("Actions"), &snapshot.actions);
            }

            if let Some(notice) = app.notice.clone() {
                ui.add_space(6.0);
                bubble(ui, app.settings.color("Notice"), &notice);
            }

            ui.add_space(12.0);
            ui.separator();
            ui.label(egui::RichText::new("What do you do?").strong());
            ui.add_space(4.0);

            if app.loading {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label("The story is being written…");
                });
                return;
            }

            let mut picked: Option<String> = None;

            for (i, choice) in snapshot.choices.iter().enumerate() {
                let label = format!("{}. {}", i + 1, choice);
                if ui.button(label).clicked() {
                    picked = Some(choice.clone());
                }
                ui.add_space(2.0);
            }

            if let Some(choice) = picked {
                app.choose(choice);
            }
        });
    });
}
