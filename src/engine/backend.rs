use anyhow::{anyhow, bail, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::model::message::{Role, Turn};

/// Handle for a server-side video rendering job.
#[derive(Debug, Clone)]
pub struct VideoJob {
    pub id: String,
}

#[derive(Debug, Clone)]
pub enum VideoStatus {
    Pending,
    Done { url: String },
}

/// The generative backend, treated as an opaque oracle. The engine is
/// generic over this trait so tests run against a scripted fake.
pub trait StoryBackend: Send + Sync + 'static {
    /// One narrative exchange: system instruction plus the full replayed
    /// history, returning the model's raw response text.
    fn narrate(&self, system: &str, history: &[Turn]) -> Result<String>;

    /// Encoded image bytes illustrating the given scene.
    fn illustrate(&self, scene: &str) -> Result<Vec<u8>>;

    /// Narrated audio bytes for the given scene.
    fn speak(&self, scene: &str) -> Result<Vec<u8>>;

    fn begin_video(&self, scene: &str) -> Result<VideoJob>;

    fn poll_video(&self, job: &VideoJob) -> Result<VideoStatus>;
}

/// Connection settings for the hosted generative API. Constructed
/// explicitly and passed in; nothing reads environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub api_key: String,
    pub narrative_model: String,
    pub image_model: String,
    pub speech_model: String,
    pub video_model: String,
    pub temperature: f32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:1234/v1".into(),
            api_key: String::new(),
            narrative_model: "local-model".into(),
            image_model: "local-image-model".into(),
            speech_model: "local-speech-model".into(),
            video_model: "local-video-model".into(),
            temperature: 0.7,
        }
    }
}

/* =========================
   Wire types
   ========================= */

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: String,
}

#[derive(Serialize)]
struct ImageRequest {
    model: String,
    prompt: String,
    response_format: &'static str,
}

#[derive(Deserialize)]
struct ImageResponse {
    data: Vec<ImagePayload>,
}

#[derive(Deserialize)]
struct ImagePayload {
    b64_json: String,
}

#[derive(Serialize)]
struct SpeechRequest {
    model: String,
    input: String,
    voice: &'static str,
}

#[derive(Serialize)]
struct VideoRequest {
    model: String,
    prompt: String,
}

#[derive(Deserialize)]
struct VideoJobResponse {
    id: String,
}

#[derive(Deserialize)]
struct VideoStatusResponse {
    status: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/* =========================
   HTTP backend
   ========================= */

pub struct HttpBackend {
    config: BackendConfig,
    client: Client,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("building HTTP client")?;

        Ok(Self { config, client })
    }

    fn post(&self, path: &str) -> reqwest::blocking::RequestBuilder {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), path);
        let req = self.client.post(url);

        if self.config.api_key.is_empty() {
            req
        } else {
            req.bearer_auth(&self.config.api_key)
        }
    }

    fn get(&self, path: &str) -> reqwest::blocking::RequestBuilder {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), path);
        let req = self.client.get(url);

        if self.config.api_key.is_empty() {
            req
        } else {
            req.bearer_auth(&self.config.api_key)
        }
    }
}

fn wire_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Model => "assistant",
    }
}

impl StoryBackend for HttpBackend {
    fn narrate(&self, system: &str, history: &[Turn]) -> Result<String> {
        let mut messages = vec![ChatMessage {
            role: "system",
            content: system.to_string(),
        }];

        messages.extend(history.iter().map(|turn| ChatMessage {
            role: wire_role(turn.role),
            content: turn.content.clone(),
        }));

        let req = ChatCompletionRequest {
            model: self.config.narrative_model.clone(),
            temperature: self.config.temperature,
            messages,
        };

        let resp: ChatCompletionResponse = self
            .post("chat/completions")
            .json(&req)
            .send()?
            .error_for_status()?
            .json()?;

        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("narrative response contained no choices"))?;

        Ok(choice.message.content)
    }

    fn illustrate(&self, scene: &str) -> Result<Vec<u8>> {
        let req = ImageRequest {
            model: self.config.image_model.clone(),
            prompt: format!("An evocative storybook illustration of: {scene}"),
            response_format: "b64_json",
        };

        let resp: ImageResponse = self
            .post("images/generations")
            .json(&req)
            .send()?
            .error_for_status()?
            .json()?;

        let payload = resp
            .data
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("image response contained no data"))?;

        BASE64
            .decode(payload.b64_json)
            .context("decoding image payload")
    }

    fn speak(&self, scene: &str) -> Result<Vec<u8>> {
        let req = SpeechRequest {
            model: self.config.speech_model.clone(),
            input: scene.to_string(),
            voice: "alloy",
        };

        let resp = self
            .post("audio/speech")
            .json(&req)
            .send()?
            .error_for_status()?;

        Ok(resp.bytes()?.to_vec())
    }

    fn begin_video(&self, scene: &str) -> Result<VideoJob> {
        let req = VideoRequest {
            model: self.config.video_model.clone(),
            prompt: format!("A short cinematic clip of: {scene}"),
        };

        let resp: VideoJobResponse = self
            .post("videos")
            .json(&req)
            .send()?
            .error_for_status()?
            .json()?;

        Ok(VideoJob { id: resp.id })
    }

    fn poll_video(&self, job: &VideoJob) -> Result<VideoStatus> {
        let resp: VideoStatusResponse = self
            .get(&format!("videos/{}", job.id))
            .send()?
            .error_for_status()?
            .json()?;

        match resp.status.as_str() {
            "completed" => {
                let url = resp
                    .url
                    .ok_or_else(|| anyhow!("completed video job has no url"))?;
                Ok(VideoStatus::Done { url })
            }
            "failed" => bail!(
                "video job failed: {}",
                resp.error.unwrap_or_else(|| "no reason given".into())
            ),
            _ => Ok(VideoStatus::Pending),
        }
    }
}
