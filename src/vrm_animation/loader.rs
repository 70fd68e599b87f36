use std::collections::BTreeMap;
use std::path::Path;

use glam::{Affine3A, Quat, Vec3};
use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::animation::{InterpolationMode, KeyframeTrack, TargetPath, TrackData};
use crate::assets::loaders::{GltfAsset, GltfExtensionParser, GltfLoader};
use crate::errors::{AnimaError, Result};
use crate::scene::NodeHandle;
use crate::vrm::{ExpressionPreset, HumanBoneName};

const VRMC_VRM_ANIMATION: &str = "VRMC_vrm_animation";

// ============================================================================
// Schema
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct VrmcVrmAnimation {
    spec_version: String,
    humanoid: Option<AnimationHumanoid>,
    expressions: Option<AnimationExpressions>,
    look_at: Option<NodeIndex>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AnimationHumanoid {
    human_bones: BTreeMap<String, NodeIndex>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct AnimationExpressions {
    preset: BTreeMap<String, NodeIndex>,
    custom: BTreeMap<String, NodeIndex>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct NodeIndex {
    node: usize,
}

// ============================================================================
// Parsed animation
// ============================================================================

/// Humanoid tracks already expressed relative to the normalized rig.
#[derive(Debug, Clone, Default)]
pub struct HumanoidTracks {
    /// World-space hips translation. Other bones carry no translation.
    pub translation: FxHashMap<HumanBoneName, KeyframeTrack<Vec3>>,
    pub rotation: FxHashMap<HumanBoneName, KeyframeTrack<Quat>>,
}

#[derive(Debug, Clone, Default)]
pub struct ExpressionTracks {
    pub preset: FxHashMap<ExpressionPreset, KeyframeTrack<f32>>,
    pub custom: FxHashMap<String, KeyframeTrack<f32>>,
}

/// One animation of a `.vrma` file, independent of any avatar.
#[derive(Debug, Clone)]
pub struct VrmAnimation {
    pub name: String,
    pub duration: f32,
    /// World position of the hips in the file's rest pose.
    pub rest_hips_position: Vec3,
    pub humanoid_tracks: HumanoidTracks,
    pub expression_tracks: ExpressionTracks,
    pub look_at_track: Option<KeyframeTrack<Quat>>,
}

/// What the plugin leaves in the asset's user data.
#[derive(Debug, Clone, Default)]
pub(crate) struct VrmAnimations(pub Vec<VrmAnimation>);

// ============================================================================
// Plugin
// ============================================================================

/// Reads `VRMC_vrm_animation` and converts the file's glTF animations into
/// [`VrmAnimation`]s.
#[derive(Debug, Default)]
pub struct VrmAnimationLoaderPlugin;

impl GltfExtensionParser for VrmAnimationLoaderPlugin {
    fn name(&self) -> &str {
        VRMC_VRM_ANIMATION
    }

    fn on_after_load(&mut self, asset: &mut GltfAsset) -> Result<()> {
        let Some(value) = asset.extension(VRMC_VRM_ANIMATION) else {
            return Ok(());
        };
        let schema: VrmcVrmAnimation = serde_json::from_value(value.clone())?;
        if !schema.spec_version.starts_with("1.") {
            log::warn!("Unknown VRMC_vrm_animation specVersion '{}'", schema.spec_version);
        }

        let rig = AnimationRig::new(asset, &schema);
        let animations = asset
            .animations
            .iter()
            .enumerate()
            .map(|(index, animation)| {
                let name = if animation.clip.name.is_empty() {
                    format!("Animation_{index}")
                } else {
                    animation.clip.name.clone()
                };
                rig.convert(name, animation.clip.duration, &animation.clip.tracks, &animation.target_nodes)
            })
            .collect();

        asset.user_data.insert(VrmAnimations(animations));
        Ok(())
    }
}

/// Loads every animation of a `.vrma` file.
pub struct VrmAnimationLoader;

impl VrmAnimationLoader {
    pub fn load_slice(bytes: &[u8], base_path: Option<&Path>) -> Result<Vec<VrmAnimation>> {
        Self::load_with(GltfLoader::new(), bytes, base_path)
    }

    /// Like [`Self::load_slice`], on a preconfigured loader.
    pub fn load_with(loader: GltfLoader, bytes: &[u8], base_path: Option<&Path>) -> Result<Vec<VrmAnimation>> {
        let mut asset = loader
            .with_extension(VrmAnimationLoaderPlugin)
            .load_slice(bytes, base_path)?;

        asset
            .user_data
            .take::<VrmAnimations>()
            .map(|animations| animations.0)
            .ok_or_else(|| AnimaError::MissingExtension(VRMC_VRM_ANIMATION.to_string()))
    }
}

// ============================================================================
// Conversion
// ============================================================================

enum NodeRole {
    Bone(HumanBoneName),
    Preset(ExpressionPreset),
    Custom(String),
    LookAt,
}

/// Rest-pose data of the animation file needed to convert its tracks.
struct AnimationRig {
    roles: FxHashMap<usize, NodeRole>,
    /// World rotation of each bone in the file's rest pose.
    world_rest_rotations: FxHashMap<HumanBoneName, Quat>,
    /// World rotation of the nearest mapped ancestor (or the hips' parent).
    parent_world_rest_rotations: FxHashMap<HumanBoneName, Quat>,
    hips_parent_world: Affine3A,
    rest_hips_position: Vec3,
}

impl AnimationRig {
    fn new(asset: &GltfAsset, schema: &VrmcVrmAnimation) -> Self {
        let mut roles = FxHashMap::default();
        let mut bone_nodes: FxHashMap<HumanBoneName, NodeHandle> = FxHashMap::default();

        if let Some(humanoid) = &schema.humanoid {
            for (name, index) in &humanoid.human_bones {
                let Ok(bone) = name.parse::<HumanBoneName>() else {
                    log::warn!("Ignoring unknown human bone '{name}' in animation");
                    continue;
                };
                let Some(handle) = asset.node(index.node) else {
                    log::warn!("Animation bone '{name}' refers to node {}, which does not exist", index.node);
                    continue;
                };
                roles.insert(index.node, NodeRole::Bone(bone));
                bone_nodes.insert(bone, handle);
            }
        }

        if let Some(expressions) = &schema.expressions {
            for (name, index) in &expressions.preset {
                match name.parse::<ExpressionPreset>() {
                    Ok(preset) => {
                        roles.insert(index.node, NodeRole::Preset(preset));
                    }
                    Err(_) => log::warn!("Ignoring unknown preset expression '{name}' in animation"),
                }
            }
            for (name, index) in &expressions.custom {
                roles.insert(index.node, NodeRole::Custom(name.clone()));
            }
        }

        if let Some(look_at) = schema.look_at {
            roles.insert(look_at.node, NodeRole::LookAt);
        }

        let scene = &asset.scene;
        let world_rest_rotations: FxHashMap<HumanBoneName, Quat> = bone_nodes
            .iter()
            .map(|(&bone, &handle)| (bone, scene.world_rotation(handle)))
            .collect();

        let hips = bone_nodes.get(&HumanBoneName::Hips).copied();
        let hips_parent_world = hips.map_or(Affine3A::IDENTITY, |h| scene.parent_world_matrix(h));
        let hips_parent_rotation = hips_parent_world.to_scale_rotation_translation().1.normalize();

        let parent_world_rest_rotations = bone_nodes
            .keys()
            .map(|&bone| {
                let mut parent = bone.parent();
                while let Some(p) = parent {
                    if world_rest_rotations.contains_key(&p) {
                        break;
                    }
                    parent = p.parent();
                }
                let rotation = parent
                    .and_then(|p| world_rest_rotations.get(&p).copied())
                    .unwrap_or(hips_parent_rotation);
                (bone, rotation)
            })
            .collect();

        if hips.is_none() {
            log::warn!("Animation has no hips bone; translation tracks are ignored");
        }

        Self {
            roles,
            world_rest_rotations,
            parent_world_rest_rotations,
            hips_parent_world,
            rest_hips_position: hips.map_or(Vec3::ZERO, |h| scene.world_position(h)),
        }
    }

    fn convert(
        &self,
        name: String,
        duration: f32,
        tracks: &[crate::animation::Track],
        target_nodes: &[usize],
    ) -> VrmAnimation {
        let mut humanoid_tracks = HumanoidTracks::default();
        let mut expression_tracks = ExpressionTracks::default();
        let mut look_at_track = None;

        for (track, &node_index) in tracks.iter().zip(target_nodes) {
            let Some(role) = self.roles.get(&node_index) else {
                continue;
            };

            match (role, track.meta.target, &track.data) {
                (NodeRole::Bone(bone), TargetPath::Rotation, TrackData::Quaternion(data)) => {
                    let (Some(&world), Some(&parent_world)) = (
                        self.world_rest_rotations.get(bone),
                        self.parent_world_rest_rotations.get(bone),
                    ) else {
                        continue;
                    };
                    let inverse_world = world.inverse();
                    let data = data.clone().map_values(|q| parent_world * q * inverse_world);
                    humanoid_tracks.rotation.insert(*bone, data);
                }
                (NodeRole::Bone(HumanBoneName::Hips), TargetPath::Translation, TrackData::Vector3(data)) => {
                    humanoid_tracks
                        .translation
                        .insert(HumanBoneName::Hips, self.hips_to_world(data));
                }
                (NodeRole::Bone(_), TargetPath::Translation | TargetPath::Scale, _) => {}
                (NodeRole::Preset(preset), TargetPath::Translation, TrackData::Vector3(data)) => {
                    expression_tracks.preset.insert(*preset, expression_track(data));
                }
                (NodeRole::Custom(custom), TargetPath::Translation, TrackData::Vector3(data)) => {
                    expression_tracks.custom.insert(custom.clone(), expression_track(data));
                }
                (NodeRole::LookAt, TargetPath::Rotation, TrackData::Quaternion(data)) => {
                    look_at_track = Some(data.clone());
                }
                (_, target, _) => {
                    log::debug!("Ignoring {target:?} track on animation node {node_index}");
                }
            }
        }

        VrmAnimation {
            name,
            duration,
            rest_hips_position: self.rest_hips_position,
            humanoid_tracks,
            expression_tracks,
            look_at_track,
        }
    }

    /// Values are points, cubic tangents are directions.
    fn hips_to_world(&self, track: &KeyframeTrack<Vec3>) -> KeyframeTrack<Vec3> {
        let matrix = self.hips_parent_world;
        let mut track = track.clone();
        let cubic = track.interpolation == InterpolationMode::CubicSpline;
        for (i, v) in track.values.iter_mut().enumerate() {
            *v = if cubic && i % 3 != 1 {
                matrix.transform_vector3(*v)
            } else {
                matrix.transform_point3(*v)
            };
        }
        track
    }
}

fn expression_track(track: &KeyframeTrack<Vec3>) -> KeyframeTrack<f32> {
    KeyframeTrack::new(
        track.times.clone(),
        track.values.iter().map(|v| v.x).collect(),
        track.interpolation,
    )
}
