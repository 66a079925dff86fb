use egui::Color32;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::engine::backend::BackendConfig;

#[derive(Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct UiSettings {
    pub ui_scale: f32,

    pub backend: BackendConfig,

    // Section → color mapping (extensible)
    pub section_colors: HashMap<String, [u8; 4]>,
}

impl Default for UiSettings {
    fn default() -> Self {
        let mut section_colors = HashMap::new();

        section_colors.insert("Scene".into(), [40, 44, 58, 255]);
        section_colors.insert("Actions".into(), [40, 70, 55, 255]);
        section_colors.insert("Notice".into(), [110, 50, 50, 255]);

        Self {
            ui_scale: 1.0,
            backend: BackendConfig::default(),
            section_colors,
        }
    }
}

impl UiSettings {
    pub fn color(&self, key: &str) -> Color32 {
        self.section_colors
            .get(key)
            .map(|c| Color32::from_rgba_unmultiplied(c[0], c[1], c[2], c[3]))
            .unwrap_or(Color32::DARK_GRAY)
    }

    pub fn set_color(&mut self, key: &str, color: Color32) {
        self.section_colors.insert(
            key.to_string(),
            [color.r(), color.g(), color.b(), color.a()],
        );
    }
}
