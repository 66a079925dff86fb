pub mod app;
pub mod media_panel;
pub mod settings;
pub mod settings_io;
pub mod settings_panel;
pub mod setup_panel;
pub mod story_panel;
