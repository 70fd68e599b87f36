use std::sync::Arc;

use crate::animation::{AnimationAction, AnimationMixer, Binder};
use crate::app::playback::PlaybackControls;
use crate::app::settings::PlayerSettings;
use crate::vrm::Vrm;
use crate::vrm_animation::{VrmAnimation, create_vrm_animation_clip};

/// An avatar with one retargeted animation looping on it.
///
/// Each [`tick`](Self::tick) advances the mixer, then the avatar.
#[derive(Debug)]
pub struct AvatarPlayer {
    vrm: Vrm,
    mixer: AnimationMixer,
    action: usize,
    elapsed: f32,
}

impl AvatarPlayer {
    #[must_use]
    pub fn new(vrm: Vrm, animation: &VrmAnimation) -> Self {
        let clip = Arc::new(create_vrm_animation_clip(animation, &vrm));
        log::info!(
            "Playing '{}' ({:.2}s, {} tracks) on '{}'",
            clip.name,
            clip.duration,
            clip.tracks.len(),
            vrm.meta.name
        );

        let mut action = AnimationAction::new(clip.clone());
        action.bindings = Binder::bind(&vrm.scene, vrm.root, &clip);
        action.play();

        let mut mixer = AnimationMixer::new();
        let action = mixer.add_action(action);

        Self {
            vrm,
            mixer,
            action,
            elapsed: 0.0,
        }
    }

    /// Advances playback and the avatar by `dt` seconds.
    pub fn tick(&mut self, dt: f32) {
        self.elapsed += dt;
        self.mixer.update(dt, &mut self.vrm);
        self.vrm.update(dt);
    }

    /// Runs the fixed-step frame loop described by `settings` and returns
    /// the number of frames simulated.
    ///
    /// `scrub_to` is applied before the first frame, `pause_at` presses the
    /// pause button once the elapsed time reaches it.
    pub fn run(&mut self, settings: &PlayerSettings) -> usize {
        if let Some(time) = settings.scrub_to
            && let Some(mut controls) = self.controls()
        {
            controls.set_time(time);
            log::info!("Time slider moved to {:.2}s", controls.time());
        }

        let step = settings.fixed_timestep.max(1e-4);
        let frames = (settings.run_seconds / step).ceil() as usize;
        let mut pause_pending = settings.pause_at;

        for frame in 0..frames {
            if let Some(at) = pause_pending
                && self.elapsed >= at
            {
                let label = self.controls().map(|mut controls| controls.toggle_pause());
                if let Some(label) = label {
                    log::info!("Button now reads '{label}' at t={:.2}s", self.elapsed);
                }
                pause_pending = None;
            }

            self.tick(step);

            if frame % 60 == 0 {
                log::debug!(
                    "frame {frame}: clip time {:.3}s",
                    self.action().map_or(0.0, |a| a.time)
                );
            }
        }

        frames
    }

    /// Total time passed to [`tick`](Self::tick).
    #[must_use]
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn controls(&mut self) -> Option<PlaybackControls<'_>> {
        self.mixer.action_mut(self.action).map(PlaybackControls::new)
    }

    #[must_use]
    pub fn action(&self) -> Option<&AnimationAction> {
        self.mixer.action(self.action)
    }

    #[must_use]
    pub fn vrm(&self) -> &Vrm {
        &self.vrm
    }

    pub fn vrm_mut(&mut self) -> &mut Vrm {
        &mut self.vrm
    }

    #[must_use]
    pub fn into_vrm(self) -> Vrm {
        self.vrm
    }
}
