//! VRM animation (`.vrma`) files and their retargeting onto avatars.

pub mod loader;
pub mod retarget;

pub use loader::{ExpressionTracks, HumanoidTracks, VrmAnimation, VrmAnimationLoader, VrmAnimationLoaderPlugin};
pub use retarget::{LOOK_AT_TRACK_NAME, create_vrm_animation_clip};
