use crate::model::session::SessionConfig;
use crate::model::story::StorySnapshot;

#[derive(Debug, Clone)]
pub enum EngineCommand {
    StartSession(SessionConfig),
    Advance { choice: String },
    RequestNarration,
    RequestVideo,
    CancelVideo,
    RequestTranscript,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Illustration,
    Narration,
    Video,
}

impl MediaKind {
    pub fn label(&self) -> &'static str {
        match self {
            MediaKind::Illustration => "illustration",
            MediaKind::Narration => "narration",
            MediaKind::Video => "video",
        }
    }
}

#[derive(Debug, Clone)]
pub enum EngineResponse {
    /// A narrative exchange completed. `generation` increases by one per
    /// exchange; media responses are matched against it.
    SceneReady {
        generation: u64,
        snapshot: StorySnapshot,
    },

    /// The narrative request failed; session state is unchanged and the
    /// user may retry.
    NarrativeFailed { notice: String },

    Illustration {
        generation: u64,
        image: Vec<u8>,
    },

    Narration {
        generation: u64,
        audio: Vec<u8>,
    },

    VideoReady {
        generation: u64,
        url: String,
    },

    MediaFailed {
        generation: u64,
        kind: MediaKind,
        notice: String,
    },

    Transcript(String),
}
