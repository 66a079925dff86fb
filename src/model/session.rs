use serde::{Deserialize, Serialize};

/// Setup values fixed at session start. Embedded only in the opening
/// prompt; later requests rely on the replayed history instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub genre: String,
    pub tone: String,
    pub player_role: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            genre: "Fantasy".into(),
            tone: "Adventurous".into(),
            player_role: "A wandering traveler with a mysterious past".into(),
        }
    }
}

impl SessionConfig {
    pub fn is_complete(&self) -> bool {
        !self.genre.trim().is_empty()
            && !self.tone.trim().is_empty()
            && !self.player_role.trim().is_empty()
    }
}
