use std::sync::Arc;

use glam::{Quat, Vec3};

use crate::animation::{
    binding::PropertyBinding,
    clip::{AnimationClip, TrackData},
    tracks::KeyframeCursor,
    values::MorphWeightData,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    Once,
    Loop,
    PingPong,
}

#[derive(Debug, Clone)]
pub struct AnimationAction {
    clip: Arc<AnimationClip>,

    pub time: f32,
    pub time_scale: f32,
    pub weight: f32,
    pub loop_mode: LoopMode,
    /// A paused action keeps applying its current sample but does not advance.
    pub paused: bool,
    pub enabled: bool,

    pub bindings: Vec<PropertyBinding>,

    pub(crate) track_cursors: Vec<KeyframeCursor>,
}

impl AnimationAction {
    #[must_use]
    pub fn new(clip: Arc<AnimationClip>) -> Self {
        let track_count = clip.tracks.len();
        Self {
            clip,
            time: 0.0,
            time_scale: 1.0,
            weight: 1.0,
            loop_mode: LoopMode::Loop,
            paused: false,
            enabled: true,
            bindings: Vec::new(),
            track_cursors: vec![KeyframeCursor::default(); track_count],
        }
    }

    #[must_use]
    pub fn clip(&self) -> &Arc<AnimationClip> {
        &self.clip
    }

    #[inline]
    #[must_use]
    pub fn duration(&self) -> f32 {
        self.clip.duration
    }

    /// Starts (or restarts) playback from the beginning.
    pub fn play(&mut self) {
        self.enabled = true;
        self.paused = false;
        self.time = 0.0;
    }

    /// Disables the action and rewinds it.
    pub fn stop(&mut self) {
        self.enabled = false;
        self.time = 0.0;
    }

    /// Jumps to `time`, clamped to the clip range.
    pub fn set_time(&mut self, time: f32) {
        self.time = time.clamp(0.0, self.clip.duration.max(0.0));
    }

    /// Advances local time according to time scale and loop mode.
    pub fn update(&mut self, dt: f32) {
        if self.paused || !self.enabled {
            return;
        }

        let duration = self.clip.duration;
        if duration <= 0.0 {
            return;
        }

        self.time += dt * self.time_scale;

        match self.loop_mode {
            LoopMode::Once => {
                if self.time >= duration {
                    self.time = duration;
                    self.paused = true;
                } else if self.time < 0.0 {
                    self.time = 0.0;
                    self.paused = true;
                }
            }
            LoopMode::Loop => {
                if self.time >= duration {
                    self.time %= duration;
                } else if self.time < 0.0 {
                    self.time = duration + (self.time % duration);
                }
            }
            LoopMode::PingPong => {
                let double_duration = duration * 2.0;
                let mut t = self.time % double_duration;
                if t < 0.0 {
                    t += double_duration;
                }
                if t > duration {
                    t = double_duration - t;
                }
                self.time = t;
            }
        }
    }

    /// Samples the given track at the current time.
    pub fn sample_track(&mut self, track_index: usize) -> Option<TrackValue> {
        let track = self.clip.tracks.get(track_index)?;
        let cursor = self.track_cursors.get_mut(track_index)?;
        let time = self.time;

        Some(match &track.data {
            TrackData::Vector3(t) => TrackValue::Vector3(t.sample_with_cursor(time, cursor)?),
            TrackData::Quaternion(t) => TrackValue::Quaternion(t.sample_with_cursor(time, cursor)?),
            TrackData::Scalar(t) => TrackValue::Scalar(t.sample_with_cursor(time, cursor)?),
            TrackData::MorphWeights(t) => {
                TrackValue::MorphWeight(Box::new(t.sample_with_cursor(time, cursor)?))
            }
        })
    }
}

pub enum TrackValue {
    Vector3(Vec3),
    Quaternion(Quat),
    Scalar(f32),
    MorphWeight(Box<MorphWeightData>),
}
