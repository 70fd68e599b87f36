use crate::animation::AnimationAction;

/// The player's two on-screen controls: a "Pause | Resume" button and a
/// "Time" slider over the active clip.
pub struct PlaybackControls<'a> {
    action: &'a mut AnimationAction,
}

impl<'a> PlaybackControls<'a> {
    pub fn new(action: &'a mut AnimationAction) -> Self {
        Self { action }
    }

    /// Flips the paused state and returns the button's new label.
    pub fn toggle_pause(&mut self) -> &'static str {
        self.action.paused = !self.action.paused;
        log::info!("Playback {}", if self.action.paused { "paused" } else { "resumed" });
        self.button_label()
    }

    /// "Resume" while paused, "Pause" while playing.
    #[must_use]
    pub fn button_label(&self) -> &'static str {
        if self.action.paused { "Resume" } else { "Pause" }
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.action.paused
    }

    #[must_use]
    pub fn time(&self) -> f32 {
        self.action.time
    }

    /// Moves the slider; clamped to `[0, duration]`.
    pub fn set_time(&mut self, time: f32) {
        self.action.set_time(time);
    }

    /// Upper bound of the slider.
    #[must_use]
    pub fn duration(&self) -> f32 {
        self.action.duration()
    }
}
