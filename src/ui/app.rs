use eframe::egui;
use std::fs;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use log::{debug, error, info, warn};

use crate::engine::backend::HttpBackend;
use crate::engine::engine::Engine;
use crate::engine::protocol::{EngineCommand, EngineResponse, MediaKind};
use crate::model::session::SessionConfig;
use crate::model::story::StorySnapshot;
use crate::ui::settings::UiSettings;
use crate::ui::settings_io;
use crate::ui::{media_panel, setup_panel, story_panel};

/* =========================
   Phase
   ========================= */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Setup,
    Playing,
}

/* =========================
   App
   ========================= */

pub struct StoryApp {
    pub settings: UiSettings,
    pub setup: SessionConfig,
    pub phase: Phase,

    pub snapshot: Option<StorySnapshot>,

    /// Generation id of the snapshot on screen; media results carrying an
    /// older id are stale and dropped.
    pub latest_generation: u64,

    /// Blocks choice submission while a narrative request is outstanding.
    pub loading: bool,
    pub notice: Option<String>,

    pub illustration: Option<egui::TextureHandle>,
    pub illustration_pending: bool,
    pub narration: Option<Vec<u8>>,
    pub narration_pending: bool,
    pub video_url: Option<String>,
    pub video_pending: bool,

    transcript_target: Option<PathBuf>,

    /// False when `HttpBackend` construction failed and no engine thread
    /// is listening; requests would otherwise hang the loading spinner.
    engine_alive: bool,

    cmd_tx: mpsc::Sender<EngineCommand>,
    resp_rx: mpsc::Receiver<EngineResponse>,
}

const ENGINE_DEAD_NOTICE: &str =
    "The storyteller could not be reached. Check the backend settings.";

fn spawn_engine(
    settings: &UiSettings,
) -> (
    mpsc::Sender<EngineCommand>,
    mpsc::Receiver<EngineResponse>,
    bool,
) {
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let (resp_tx, resp_rx) = mpsc::channel();

    let alive = match HttpBackend::new(settings.backend.clone()) {
        Ok(backend) => {
            thread::spawn(move || {
                Engine::new(cmd_rx, resp_tx, backend).run();
            });
            true
        }
        // The settings pane stays usable so the endpoint can be corrected.
        Err(e) => {
            error!("could not start engine: {e:#}");
            false
        }
    };

    (cmd_tx, resp_rx, alive)
}

impl StoryApp {
    pub fn new() -> Self {
        let settings = settings_io::load_settings();
        let (cmd_tx, resp_rx, engine_alive) = spawn_engine(&settings);
        Self::from_parts(settings, cmd_tx, resp_rx, engine_alive)
    }

    fn from_parts(
        settings: UiSettings,
        cmd_tx: mpsc::Sender<EngineCommand>,
        resp_rx: mpsc::Receiver<EngineResponse>,
        engine_alive: bool,
    ) -> Self {
        Self {
            settings,
            setup: SessionConfig::default(),
            phase: Phase::Setup,
            snapshot: None,
            latest_generation: 0,
            loading: false,
            notice: None,
            illustration: None,
            illustration_pending: false,
            narration: None,
            narration_pending: false,
            video_url: None,
            video_pending: false,
            transcript_target: None,
            engine_alive,
            cmd_tx,
            resp_rx,
        }
    }

    pub fn send_command(&self, cmd: EngineCommand) {
        let _ = self.cmd_tx.send(cmd);
    }

    pub fn begin_session(&mut self) {
        if !self.setup.is_complete() || self.loading {
            return;
        }
        if !self.engine_alive {
            self.notice = Some(ENGINE_DEAD_NOTICE.to_string());
            return;
        }

        self.loading = true;
        self.notice = None;
        self.send_command(EngineCommand::StartSession(self.setup.clone()));
    }

    pub fn choose(&mut self, choice: String) {
        if self.loading {
            return;
        }
        if !self.engine_alive {
            self.notice = Some(ENGINE_DEAD_NOTICE.to_string());
            return;
        }

        self.loading = true;
        self.notice = None;
        self.send_command(EngineCommand::Advance { choice });
    }

    pub fn request_narration(&mut self) {
        if self.narration_pending || !self.engine_alive {
            return;
        }

        self.narration = None;
        self.narration_pending = true;
        self.send_command(EngineCommand::RequestNarration);
    }

    pub fn request_video(&mut self) {
        if !self.engine_alive {
            return;
        }

        self.video_url = None;
        self.video_pending = true;
        self.send_command(EngineCommand::RequestVideo);
    }

    pub fn cancel_video(&mut self) {
        self.video_pending = false;
        self.send_command(EngineCommand::CancelVideo);
    }

    pub fn export_transcript(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .set_file_name("story.txt")
            .save_file()
        else {
            return;
        };

        self.transcript_target = Some(path);
        self.send_command(EngineCommand::RequestTranscript);
    }

    /// Persists settings and restarts the engine against the new backend.
    /// Any running session is abandoned.
    pub fn apply_settings(&mut self) {
        settings_io::save_settings(&self.settings);

        let (cmd_tx, resp_rx, engine_alive) = spawn_engine(&self.settings);
        self.cmd_tx = cmd_tx;
        self.resp_rx = resp_rx;
        self.engine_alive = engine_alive;

        self.phase = Phase::Setup;
        self.snapshot = None;
        self.latest_generation = 0;
        self.loading = false;
        self.notice = if engine_alive {
            None
        } else {
            Some(ENGINE_DEAD_NOTICE.to_string())
        };
        self.illustration = None;
        self.illustration_pending = false;
        self.narration = None;
        self.narration_pending = false;
        self.video_url = None;
        self.video_pending = false;
    }

    pub fn new_story(&mut self) {
        self.phase = Phase::Setup;
        self.notice = None;
        self.loading = false;
    }

    fn pump_responses(&mut self, ctx: &egui::Context) {
        while let Ok(resp) = self.resp_rx.try_recv() {
            match resp {
                EngineResponse::SceneReady {
                    generation,
                    snapshot,
                } => {
                    self.latest_generation = generation;
                    self.snapshot = Some(snapshot);
                    self.loading = false;
                    self.notice = None;
                    self.phase = Phase::Playing;

                    // Scene-bound media belongs to the previous scene now,
                    // the stale illustration included.
                    self.illustration = None;
                    self.illustration_pending = true;
                    self.narration = None;
                    self.narration_pending = false;
                    self.video_url = None;
                    self.video_pending = false;
                }

                EngineResponse::NarrativeFailed { notice } => {
                    self.loading = false;
                    self.notice = Some(notice);
                }

                EngineResponse::Illustration { generation, image } => {
                    if generation == self.latest_generation {
                        self.illustration = decode_illustration(ctx, &image);
                        self.illustration_pending = false;
                    } else {
                        debug!("dropping stale illustration for generation {generation}");
                    }
                }

                EngineResponse::Narration { generation, audio } => {
                    if generation == self.latest_generation {
                        self.narration = Some(audio);
                        self.narration_pending = false;
                    } else {
                        debug!("dropping stale narration for generation {generation}");
                    }
                }

                EngineResponse::VideoReady { generation, url } => {
                    if generation == self.latest_generation {
                        self.video_url = Some(url);
                        self.video_pending = false;
                    } else {
                        debug!("dropping stale video for generation {generation}");
                    }
                }

                EngineResponse::MediaFailed {
                    generation,
                    kind,
                    notice,
                } => {
                    if generation != self.latest_generation {
                        continue;
                    }

                    match kind {
                        MediaKind::Narration => self.narration_pending = false,
                        MediaKind::Video => self.video_pending = false,
                        MediaKind::Illustration => self.illustration_pending = false,
                    }
                    self.notice = Some(notice);
                }

                EngineResponse::Transcript(text) => {
                    if let Some(path) = self.transcript_target.take() {
                        match fs::write(&path, text) {
                            Ok(()) => info!("transcript written to {}", path.display()),
                            Err(e) => {
                                warn!("could not write transcript: {e}");
                                self.notice =
                                    Some("The transcript could not be saved.".to_string());
                            }
                        }
                    }
                }
            }
        }
    }
}

impl eframe::App for StoryApp {
    fn update(&mut self, ctx: &egui::Context, _: &mut eframe::Frame) {
        ctx.set_pixels_per_point(self.settings.ui_scale);

        self.pump_responses(ctx);

        // Worker threads finish while the UI is idle; keep pumping.
        if self.loading
            || self.illustration_pending
            || self.narration_pending
            || self.video_pending
        {
            ctx.request_repaint_after(std::time::Duration::from_millis(200));
        }

        match self.phase {
            Phase::Setup => setup_panel::draw_setup_panel(ctx, self),
            Phase::Playing => {
                media_panel::draw_media_panel(ctx, self);
                story_panel::draw_story_panel(ctx, self);
            }
        }
    }
}

/* =========================
   UI Helpers
   ========================= */

fn decode_illustration(ctx: &egui::Context, bytes: &[u8]) -> Option<egui::TextureHandle> {
    match image::load_from_memory(bytes) {
        Ok(img) => {
            let rgba = img.to_rgba8();
            let size = [rgba.width() as usize, rgba.height() as usize];
            let pixels = egui::ColorImage::from_rgba_unmultiplied(size, rgba.as_raw());
            Some(ctx.load_texture("illustration", pixels, egui::TextureOptions::default()))
        }
        Err(e) => {
            warn!("could not decode illustration payload: {e}");
            None
        }
    }
}

pub fn bubble(ui: &mut egui::Ui, color: egui::Color32, text: &str) {
    egui::Frame::new()
        .fill(color)
        .corner_radius(egui::CornerRadius::same(8))
        .inner_margin(egui::Margin::symmetric(10, 6))
        .show(ui, |ui| {
            ui.label(egui::RichText::new(text).color(egui::Color32::WHITE));
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::setup_panel;

    fn test_app(engine_alive: bool) -> (StoryApp, mpsc::Sender<EngineResponse>) {
        let (cmd_tx, _cmd_rx) = mpsc::channel();
        let (resp_tx, resp_rx) = mpsc::channel();
        let app = StoryApp::from_parts(UiSettings::default(), cmd_tx, resp_rx, engine_alive);
        (app, resp_tx)
    }

    #[test]
    fn dead_engine_reports_instead_of_spinning() {
        let (mut app, _resp_tx) = test_app(false);

        app.begin_session();

        assert!(!app.loading);
        assert_eq!(app.notice.as_deref(), Some(ENGINE_DEAD_NOTICE));
    }

    #[test]
    fn dead_engine_rejects_choices_too() {
        let (mut app, _resp_tx) = test_app(false);
        app.phase = Phase::Playing;

        app.choose("Go left".into());

        assert!(!app.loading);
        assert_eq!(app.notice.as_deref(), Some(ENGINE_DEAD_NOTICE));
    }

    #[test]
    fn scene_ready_clears_the_previous_illustration() {
        let (mut app, resp_tx) = test_app(true);
        let ctx = egui::Context::default();

        let pixels = egui::ColorImage::from_rgba_unmultiplied([1, 1], &[10, 20, 30, 255]);
        app.illustration =
            Some(ctx.load_texture("previous", pixels, egui::TextureOptions::default()));
        app.latest_generation = 1;

        resp_tx
            .send(EngineResponse::SceneReady {
                generation: 2,
                snapshot: StorySnapshot::default(),
            })
            .unwrap();
        app.pump_responses(&ctx);

        assert!(app.illustration.is_none());
        assert!(app.illustration_pending);
        assert_eq!(app.latest_generation, 2);
    }

    #[test]
    fn stale_illustration_is_dropped() {
        let (mut app, resp_tx) = test_app(true);
        let ctx = egui::Context::default();
        app.latest_generation = 3;

        resp_tx
            .send(EngineResponse::Illustration {
                generation: 2,
                image: vec![0xAA],
            })
            .unwrap();
        app.pump_responses(&ctx);

        assert!(app.illustration.is_none());
    }

    #[test]
    fn setup_phase_offers_the_settings_editor() {
        let (mut app, _resp_tx) = test_app(true);
        app.phase = Phase::Setup;

        // A headless pass over the setup form; it hosts the same settings
        // section as the media pane, so a bad endpoint is fixable before
        // any story has started.
        let ctx = egui::Context::default();
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            setup_panel::draw_setup_panel(ctx, &mut app);
        });

        assert_eq!(app.phase, Phase::Setup);
    }
}
