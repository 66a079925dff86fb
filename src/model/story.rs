use serde::{Deserialize, Serialize};

/// Fallback scene text shown when the model omits the `[SCENE]` section.
pub const DEFAULT_SCENE: &str =
    "The scene shifts, though the details are hard to make out. \
     The story waits for you to act.";

/// Fallback options shown when the model omits usable `[CHOICES]`.
pub fn default_choices() -> Vec<String> {
    vec![
        "Press onward.".to_string(),
        "Stop and take in your surroundings.".to_string(),
    ]
}

/// The derived view of the latest model turn: what the reader sees.
/// Rebuilt wholesale from each response, never merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorySnapshot {
    pub scene: String,

    /// Character reactions; empty means no reaction pane is shown.
    pub actions: String,

    /// Always non-empty; falls back to `default_choices`.
    pub choices: Vec<String>,
}

impl Default for StorySnapshot {
    fn default() -> Self {
        Self {
            scene: DEFAULT_SCENE.to_string(),
            actions: String::new(),
            choices: default_choices(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_snapshot_is_renderable() {
        let snap = StorySnapshot::default();
        assert!(!snap.scene.is_empty());
        assert_eq!(snap.choices.len(), 2);
    }
}
