#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod animation;
pub mod app;
pub mod assets;
pub mod errors;
pub mod scene;
pub mod vrm;
pub mod vrm_animation;

pub use animation::{AnimationAction, AnimationClip, AnimationMixer, AnimationTarget, Binder, LoopMode};
pub use app::{AvatarPlayer, PlaybackControls, PlayerSettings};
pub use assets::{AssetServer, GltfAsset, GltfExtensionParser, GltfLoader};
pub use errors::{AnimaError, Result};
pub use scene::{Node, NodeHandle, Scene, Transform};
pub use vrm::{
    ExpressionManager, ExpressionPreset, HumanBoneName, Humanoid, LookAt, SpringBoneManager, Vrm, VrmLoader,
    VrmLoaderPlugin, VrmMeta,
};
pub use vrm_animation::{VrmAnimation, VrmAnimationLoader, VrmAnimationLoaderPlugin, create_vrm_animation_clip};
