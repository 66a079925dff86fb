use crate::model::story::{default_choices, StorySnapshot, DEFAULT_SCENE};

const SCENE_MARKER: &str = "[SCENE]";
const ACTIONS_MARKER: &str = "[CHARACTER ACTIONS]";
const CHOICES_MARKER: &str = "[CHOICES]";

/// Turns one raw model response into a renderable snapshot.
///
/// The model is only asked, never guaranteed, to honor the marker format,
/// so every extraction degrades to a default instead of failing. The
/// narrative must never visibly break on malformed output.
pub fn parse_story(raw: &str) -> StorySnapshot {
    let scene = section(raw, SCENE_MARKER, &[ACTIONS_MARKER, CHOICES_MARKER]);
    let actions = section(raw, ACTIONS_MARKER, &[CHOICES_MARKER]);
    let choices = parse_choices(raw);

    StorySnapshot {
        scene: match scene {
            Some(s) if !s.is_empty() => s,
            _ => DEFAULT_SCENE.to_string(),
        },
        actions: actions.unwrap_or_default(),
        choices: if choices.is_empty() {
            default_choices()
        } else {
            choices
        },
    }
}

/// Text after `marker`, up to the nearest following end marker or end of
/// input, trimmed. `None` when the marker is absent.
fn section(raw: &str, marker: &str, ends: &[&str]) -> Option<String> {
    let start = raw.find(marker)? + marker.len();
    let rest = &raw[start..];

    let end = ends
        .iter()
        .filter_map(|m| rest.find(m))
        .min()
        .unwrap_or(rest.len());

    Some(rest[..end].trim().to_string())
}

fn parse_choices(raw: &str) -> Vec<String> {
    let Some(block) = section(raw, CHOICES_MARKER, &[]) else {
        return Vec::new();
    };

    block
        .lines()
        .map(strip_number_prefix)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Strips a leading "1. " style prefix if present.
fn strip_number_prefix(line: &str) -> &str {
    let line = line.trim();

    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return line;
    }

    match line[digits..].strip_prefix('.') {
        Some(rest) => rest.trim_start(),
        None => line,
    }
}
