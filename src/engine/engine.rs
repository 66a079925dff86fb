use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{error, info, warn};

use crate::engine::backend::{StoryBackend, VideoStatus};
use crate::engine::prompt_builder::PromptBuilder;
use crate::engine::protocol::{EngineCommand, EngineResponse, MediaKind};
use crate::engine::response_parser::parse_story;
use crate::model::message::{Role, Turn};
use crate::model::story::StorySnapshot;

/// Generic notice shown for any failed narrative request. The UI clears
/// its loading flag on this so the user can retry.
const NARRATIVE_NOTICE: &str = "The story could not continue. Please try again.";

/// Owns the conversation history and the current snapshot. Commands are
/// processed one at a time on the engine thread; the UI blocks further
/// choice submission while a narrative request is outstanding. Media
/// requests run on short-lived worker threads tagged with the generation
/// they were started for, so stale results can be dropped.
pub struct Engine<B: StoryBackend> {
    rx: Receiver<EngineCommand>,
    tx: Sender<EngineResponse>,
    backend: Arc<B>,

    turns: Vec<Turn>,
    snapshot: Option<StorySnapshot>,

    /// Increases by one per successful narrative exchange.
    generation: u64,

    video_cancel: Option<Arc<AtomicBool>>,
    video_poll_interval: Duration,
    video_poll_limit: u32,
}

impl<B: StoryBackend> Engine<B> {
    pub fn new(rx: Receiver<EngineCommand>, tx: Sender<EngineResponse>, backend: B) -> Self {
        Self {
            rx,
            tx,
            backend: Arc::new(backend),
            turns: Vec::new(),
            snapshot: None,
            generation: 0,
            video_cancel: None,
            video_poll_interval: Duration::from_secs(5),
            video_poll_limit: 60,
        }
    }

    pub fn with_video_polling(mut self, interval: Duration, limit: u32) -> Self {
        self.video_poll_interval = interval;
        self.video_poll_limit = limit;
        self
    }

    pub fn run(&mut self) {
        while let Ok(cmd) = self.rx.recv() {
            self.handle(cmd);
        }
    }

    fn handle(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::StartSession(config) => {
                info!(
                    "starting session: genre={:?} tone={:?}",
                    config.genre, config.tone
                );

                let opening = vec![Turn::user(PromptBuilder::opening_prompt(&config))];

                match self
                    .backend
                    .narrate(&PromptBuilder::system_instruction(), &opening)
                {
                    Ok(raw) => {
                        // The opening prompt is not retained; the session
                        // begins with exactly one model turn.
                        self.turns = vec![Turn::model(raw)];
                        self.finish_exchange();
                    }
                    Err(e) => self.report_narrative_failure("session start", e),
                }
            }

            EngineCommand::Advance { choice } => {
                if self.turns.is_empty() {
                    warn!("advance received with no active session");
                    return;
                }

                let mut request = self.turns.clone();
                request.push(Turn::user(choice.clone()));

                match self
                    .backend
                    .narrate(&PromptBuilder::system_instruction(), &request)
                {
                    Ok(raw) => {
                        self.turns.push(Turn::user(choice));
                        self.turns.push(Turn::model(raw));
                        self.finish_exchange();
                    }
                    // No partial mutation: the chosen turn is only kept
                    // alongside a model reply.
                    Err(e) => self.report_narrative_failure("advance", e),
                }
            }

            EngineCommand::RequestNarration => {
                let Some(scene) = self.current_scene() else {
                    warn!("narration requested with no scene");
                    return;
                };

                let backend = Arc::clone(&self.backend);
                let tx = self.tx.clone();
                let generation = self.generation;

                info!("requesting narration for generation {generation}");
                thread::spawn(move || {
                    let resp = match backend.speak(&scene) {
                        Ok(audio) => EngineResponse::Narration { generation, audio },
                        Err(e) => media_failure(generation, MediaKind::Narration, e),
                    };
                    let _ = tx.send(resp);
                });
            }

            EngineCommand::RequestVideo => {
                let Some(scene) = self.current_scene() else {
                    warn!("video requested with no scene");
                    return;
                };

                // A new request supersedes any job still polling.
                if let Some(flag) = self.video_cancel.take() {
                    flag.store(true, Ordering::Relaxed);
                }

                let cancel = Arc::new(AtomicBool::new(false));
                self.video_cancel = Some(Arc::clone(&cancel));

                let backend = Arc::clone(&self.backend);
                let tx = self.tx.clone();
                let generation = self.generation;
                let interval = self.video_poll_interval;
                let limit = self.video_poll_limit;

                info!("requesting video for generation {generation}");
                thread::spawn(move || {
                    let resp = render_video(&*backend, &scene, &cancel, interval, limit)
                        .map(|url| EngineResponse::VideoReady { generation, url })
                        .unwrap_or_else(|e| media_failure(generation, MediaKind::Video, e));
                    let _ = tx.send(resp);
                });
            }

            EngineCommand::CancelVideo => {
                if let Some(flag) = self.video_cancel.take() {
                    info!("cancelling video job");
                    flag.store(true, Ordering::Relaxed);
                }
            }

            EngineCommand::RequestTranscript => {
                let _ = self
                    .tx
                    .send(EngineResponse::Transcript(format_transcript(&self.turns)));
            }
        }
    }

    /// Parses the newest model turn, publishes the snapshot, and kicks off
    /// the fire-and-forget illustration for it.
    fn finish_exchange(&mut self) {
        let raw = self
            .turns
            .last()
            .map(|turn| turn.content.as_str())
            .unwrap_or_default();

        let snapshot = parse_story(raw);
        self.generation += 1;
        self.snapshot = Some(snapshot.clone());

        info!(
            "exchange {} complete ({} turns in history)",
            self.generation,
            self.turns.len()
        );

        let _ = self.tx.send(EngineResponse::SceneReady {
            generation: self.generation,
            snapshot: snapshot.clone(),
        });

        self.spawn_illustration(snapshot.scene);
    }

    fn spawn_illustration(&self, scene: String) {
        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        let generation = self.generation;

        thread::spawn(move || {
            let resp = match backend.illustrate(&scene) {
                Ok(image) => EngineResponse::Illustration { generation, image },
                Err(e) => media_failure(generation, MediaKind::Illustration, e),
            };
            let _ = tx.send(resp);
        });
    }

    fn current_scene(&self) -> Option<String> {
        self.snapshot.as_ref().map(|snap| snap.scene.clone())
    }

    fn report_narrative_failure(&self, what: &str, err: anyhow::Error) {
        error!("{what} failed: {err:#}");
        let _ = self.tx.send(EngineResponse::NarrativeFailed {
            notice: NARRATIVE_NOTICE.to_string(),
        });
    }
}

/// Bounded, cancellable polling for a video job.
fn render_video<B: StoryBackend + ?Sized>(
    backend: &B,
    scene: &str,
    cancel: &AtomicBool,
    interval: Duration,
    limit: u32,
) -> anyhow::Result<String> {
    let job = backend.begin_video(scene)?;
    info!("video job {} started", job.id);

    for _ in 0..limit {
        if cancel.load(Ordering::Relaxed) {
            anyhow::bail!("video job {} cancelled", job.id);
        }

        match backend.poll_video(&job)? {
            VideoStatus::Done { url } => return Ok(url),
            VideoStatus::Pending => thread::sleep(interval),
        }
    }

    anyhow::bail!("video job {} timed out after {limit} polls", job.id)
}

fn media_failure(generation: u64, kind: MediaKind, err: anyhow::Error) -> EngineResponse {
    warn!("{} failed: {err:#}", kind.label());
    EngineResponse::MediaFailed {
        generation,
        kind,
        notice: format!("The {} could not be generated.", kind.label()),
    }
}

fn format_transcript(turns: &[Turn]) -> String {
    let mut out = String::new();

    for turn in turns {
        let heading = match turn.role {
            Role::User => "You",
            Role::Model => "Narrator",
        };
        out.push_str(heading);
        out.push_str(":\n");
        out.push_str(&turn.content);
        out.push_str("\n\n");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::backend::VideoJob;
    use crate::model::session::SessionConfig;
    use std::collections::VecDeque;
    use std::sync::mpsc;
    use std::sync::Mutex;

    /// Replays canned narrative replies and records the history length of
    /// every request it receives.
    struct ScriptedBackend {
        replies: Mutex<VecDeque<anyhow::Result<String>>>,
        seen_history_lens: Mutex<Vec<usize>>,
        video_polls: Mutex<VecDeque<VideoStatus>>,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<anyhow::Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().collect()),
                seen_history_lens: Mutex::new(Vec::new()),
                video_polls: Mutex::new(VecDeque::new()),
            }
        }

        fn with_video_polls(self, polls: Vec<VideoStatus>) -> Self {
            *self.video_polls.lock().unwrap() = polls.into_iter().collect();
            self
        }
    }

    impl StoryBackend for ScriptedBackend {
        fn narrate(&self, _system: &str, history: &[Turn]) -> anyhow::Result<String> {
            self.seen_history_lens.lock().unwrap().push(history.len());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow::anyhow!("script exhausted")))
        }

        fn illustrate(&self, _scene: &str) -> anyhow::Result<Vec<u8>> {
            Ok(vec![0xAA])
        }

        fn speak(&self, _scene: &str) -> anyhow::Result<Vec<u8>> {
            Ok(vec![0xBB])
        }

        fn begin_video(&self, _scene: &str) -> anyhow::Result<VideoJob> {
            Ok(VideoJob { id: "job-1".into() })
        }

        fn poll_video(&self, _job: &VideoJob) -> anyhow::Result<VideoStatus> {
            Ok(self
                .video_polls
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(VideoStatus::Pending))
        }
    }

    fn engine_with(
        backend: ScriptedBackend,
    ) -> (Engine<ScriptedBackend>, mpsc::Receiver<EngineResponse>) {
        let (_cmd_tx, cmd_rx) = mpsc::channel();
        let (resp_tx, resp_rx) = mpsc::channel();
        let engine = Engine::new(cmd_rx, resp_tx, backend)
            .with_video_polling(Duration::from_millis(1), 5);
        (engine, resp_rx)
    }

    fn scene_reply(scene: &str) -> anyhow::Result<String> {
        Ok(format!(
            "[SCENE]\n{scene}\n[CHOICES]\n1. Go left\n2. Go right"
        ))
    }

    fn recv_scene(rx: &mpsc::Receiver<EngineResponse>) -> (u64, StorySnapshot) {
        let deadline = Duration::from_secs(2);
        loop {
            match rx.recv_timeout(deadline).expect("engine response") {
                EngineResponse::SceneReady {
                    generation,
                    snapshot,
                } => return (generation, snapshot),
                _ => continue,
            }
        }
    }

    #[test]
    fn start_session_keeps_exactly_one_model_turn() {
        let (mut engine, rx) = engine_with(ScriptedBackend::new(vec![scene_reply("A cave.")]));

        engine.handle(EngineCommand::StartSession(SessionConfig::default()));

        assert_eq!(engine.turns.len(), 1);
        assert_eq!(engine.turns[0].role, Role::Model);

        let (generation, snapshot) = recv_scene(&rx);
        assert_eq!(generation, 1);
        assert_eq!(snapshot.scene, "A cave.");

        // The opening request carried the synthetic prompt and nothing else.
        let lens = engine.backend.seen_history_lens.lock().unwrap();
        assert_eq!(*lens, vec![1]);
    }

    #[test]
    fn advance_appends_exactly_two_turns_on_success() {
        let (mut engine, rx) = engine_with(ScriptedBackend::new(vec![
            scene_reply("A cave."),
            scene_reply("A tunnel."),
        ]));

        engine.handle(EngineCommand::StartSession(SessionConfig::default()));
        recv_scene(&rx);

        let before = engine.turns.len();
        engine.handle(EngineCommand::Advance {
            choice: "Go left".into(),
        });

        assert_eq!(engine.turns.len(), before + 2);
        assert_eq!(engine.turns[before].role, Role::User);
        assert_eq!(engine.turns[before].content, "Go left");
        assert_eq!(engine.turns[before + 1].role, Role::Model);

        let (generation, snapshot) = recv_scene(&rx);
        assert_eq!(generation, 2);
        assert_eq!(snapshot.scene, "A tunnel.");
    }

    #[test]
    fn advance_leaves_state_unchanged_on_failure() {
        let (mut engine, rx) = engine_with(ScriptedBackend::new(vec![
            scene_reply("A cave."),
            Err(anyhow::anyhow!("upstream 500")),
        ]));

        engine.handle(EngineCommand::StartSession(SessionConfig::default()));
        recv_scene(&rx);

        let before = engine.turns.clone();
        engine.handle(EngineCommand::Advance {
            choice: "Go left".into(),
        });

        assert_eq!(engine.turns, before);
        assert_eq!(engine.generation, 1);

        let deadline = Duration::from_secs(2);
        loop {
            match rx.recv_timeout(deadline).expect("engine response") {
                EngineResponse::NarrativeFailed { notice } => {
                    assert_eq!(notice, NARRATIVE_NOTICE);
                    break;
                }
                _ => continue,
            }
        }
    }

    #[test]
    fn advance_replays_the_entire_history() {
        let (mut engine, rx) = engine_with(ScriptedBackend::new(vec![
            scene_reply("One."),
            scene_reply("Two."),
            scene_reply("Three."),
        ]));

        engine.handle(EngineCommand::StartSession(SessionConfig::default()));
        recv_scene(&rx);
        engine.handle(EngineCommand::Advance {
            choice: "Go left".into(),
        });
        recv_scene(&rx);
        engine.handle(EngineCommand::Advance {
            choice: "Go right".into(),
        });
        recv_scene(&rx);

        // Opening prompt, then 1 retained turn + choice, then 3 + choice.
        let lens = engine.backend.seen_history_lens.lock().unwrap();
        assert_eq!(*lens, vec![1, 2, 4]);
    }

    #[test]
    fn video_polls_until_done() {
        let backend = ScriptedBackend::new(vec![scene_reply("A cave.")]).with_video_polls(vec![
            VideoStatus::Pending,
            VideoStatus::Pending,
            VideoStatus::Done {
                url: "https://example.com/clip.mp4".into(),
            },
        ]);
        let (mut engine, rx) = engine_with(backend);

        engine.handle(EngineCommand::StartSession(SessionConfig::default()));
        recv_scene(&rx);
        engine.handle(EngineCommand::RequestVideo);

        let deadline = Duration::from_secs(2);
        loop {
            match rx.recv_timeout(deadline).expect("engine response") {
                EngineResponse::VideoReady { generation, url } => {
                    assert_eq!(generation, 1);
                    assert_eq!(url, "https://example.com/clip.mp4");
                    break;
                }
                _ => continue,
            }
        }
    }

    #[test]
    fn video_polling_is_bounded() {
        // Default script never completes; the 5-poll limit must trip.
        let (mut engine, rx) = engine_with(ScriptedBackend::new(vec![scene_reply("A cave.")]));

        engine.handle(EngineCommand::StartSession(SessionConfig::default()));
        recv_scene(&rx);
        engine.handle(EngineCommand::RequestVideo);

        let deadline = Duration::from_secs(2);
        loop {
            match rx.recv_timeout(deadline).expect("engine response") {
                EngineResponse::MediaFailed { kind, .. } if kind == MediaKind::Video => break,
                _ => continue,
            }
        }
    }

    #[test]
    fn cancel_stops_an_in_flight_video_job() {
        let (mut engine, rx) = engine_with(ScriptedBackend::new(vec![scene_reply("A cave.")]));
        engine.video_poll_interval = Duration::from_millis(5);
        engine.video_poll_limit = 10_000;

        engine.handle(EngineCommand::StartSession(SessionConfig::default()));
        recv_scene(&rx);
        engine.handle(EngineCommand::RequestVideo);
        engine.handle(EngineCommand::CancelVideo);

        let deadline = Duration::from_secs(5);
        loop {
            match rx.recv_timeout(deadline).expect("engine response") {
                EngineResponse::MediaFailed { kind, .. } if kind == MediaKind::Video => break,
                _ => continue,
            }
        }
    }

    #[test]
    fn transcript_labels_both_roles() {
        let (mut engine, rx) = engine_with(ScriptedBackend::new(vec![
            scene_reply("A cave."),
            scene_reply("A tunnel."),
        ]));

        engine.handle(EngineCommand::StartSession(SessionConfig::default()));
        recv_scene(&rx);
        engine.handle(EngineCommand::Advance {
            choice: "Go left".into(),
        });
        recv_scene(&rx);
        engine.handle(EngineCommand::RequestTranscript);

        let deadline = Duration::from_secs(2);
        loop {
            match rx.recv_timeout(deadline).expect("engine response") {
                EngineResponse::Transcript(text) => {
                    assert!(text.contains("Narrator:\n"));
                    assert!(text.contains("You:\nGo left"));
                    break;
                }
                _ => continue,
            }
        }
    }
}
