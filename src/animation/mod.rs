//! Keyframe animation: tracks, clips, actions and the mixer that applies
//! them to a scene or a VRM avatar.

pub mod action;
pub mod binder;
pub mod binding;
pub mod clip;
pub mod mixer;
pub mod target;
pub mod tracks;
pub mod values;

pub use action::{AnimationAction, LoopMode, TrackValue};
pub use binder::Binder;
pub use binding::{PropertyBinding, TargetPath};
pub use clip::{AnimationClip, Track, TrackData, TrackMeta};
pub use mixer::AnimationMixer;
pub use target::AnimationTarget;
pub use tracks::{InterpolationMode, KeyframeCursor, KeyframeTrack};
pub use values::{Interpolatable, MorphWeightData, MAX_MORPH_TARGETS};
