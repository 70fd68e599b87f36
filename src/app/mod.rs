//! Headless avatar player: settings, playback controls and the frame loop.

pub mod playback;
pub mod player;
pub mod settings;

pub use playback::PlaybackControls;
pub use player::AvatarPlayer;
pub use settings::PlayerSettings;
