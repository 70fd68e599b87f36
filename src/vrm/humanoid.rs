//! Humanoid bone map and the normalized rig.
//!
//! Every VRM avatar maps a fixed set of human bones onto its own skeleton
//! ("raw" bones), each with an arbitrary rest orientation. The normalized rig
//! is a parallel hierarchy of proxy nodes whose rest rotations are all
//! identity, so that a rotation authored for one avatar means the same thing
//! on every other avatar. [`Humanoid::update`] transfers normalized rotations
//! onto the raw bones.

use std::fmt;
use std::str::FromStr;

use glam::{Quat, Vec3};
use rustc_hash::FxHashMap;

use crate::scene::{Node, NodeHandle, Scene};

// ============================================================================
// Bone names
// ============================================================================

macro_rules! human_bones {
    ($($variant:ident => $name:literal, parent: $parent:expr, required: $required:literal;)*) => {
        /// The VRM 1.0 human bone set.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum HumanBoneName {
            $($variant,)*
        }

        impl HumanBoneName {
            /// Every bone, parents listed before their children.
            pub const ALL: &'static [HumanBoneName] = &[$(HumanBoneName::$variant,)*];

            /// Name used in `VRMC_vrm` and `VRMC_vrm_animation`.
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $(HumanBoneName::$variant => $name,)*
                }
            }

            /// Parent in the canonical human skeleton (`None` for hips).
            #[must_use]
            pub fn parent(self) -> Option<HumanBoneName> {
                match self {
                    $(HumanBoneName::$variant => $parent,)*
                }
            }

            /// Whether a valid avatar must map this bone.
            #[must_use]
            pub fn is_required(self) -> bool {
                match self {
                    $(HumanBoneName::$variant => $required,)*
                }
            }
        }

        impl FromStr for HumanBoneName {
            type Err = UnknownHumanBone;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(HumanBoneName::$variant),)*
                    _ => Err(UnknownHumanBone(s.to_string())),
                }
            }
        }
    };
}

use HumanBoneName as B;

human_bones! {
    Hips => "hips", parent: None, required: true;
    Spine => "spine", parent: Some(B::Hips), required: true;
    Chest => "chest", parent: Some(B::Spine), required: false;
    UpperChest => "upperChest", parent: Some(B::Chest), required: false;
    Neck => "neck", parent: Some(B::UpperChest), required: false;
    Head => "head", parent: Some(B::Neck), required: true;
    LeftEye => "leftEye", parent: Some(B::Head), required: false;
    RightEye => "rightEye", parent: Some(B::Head), required: false;
    Jaw => "jaw", parent: Some(B::Head), required: false;

    LeftUpperLeg => "leftUpperLeg", parent: Some(B::Hips), required: true;
    LeftLowerLeg => "leftLowerLeg", parent: Some(B::LeftUpperLeg), required: true;
    LeftFoot => "leftFoot", parent: Some(B::LeftLowerLeg), required: true;
    LeftToes => "leftToes", parent: Some(B::LeftFoot), required: false;
    RightUpperLeg => "rightUpperLeg", parent: Some(B::Hips), required: true;
    RightLowerLeg => "rightLowerLeg", parent: Some(B::RightUpperLeg), required: true;
    RightFoot => "rightFoot", parent: Some(B::RightLowerLeg), required: true;
    RightToes => "rightToes", parent: Some(B::RightFoot), required: false;

    LeftShoulder => "leftShoulder", parent: Some(B::UpperChest), required: false;
    LeftUpperArm => "leftUpperArm", parent: Some(B::LeftShoulder), required: true;
    LeftLowerArm => "leftLowerArm", parent: Some(B::LeftUpperArm), required: true;
    LeftHand => "leftHand", parent: Some(B::LeftLowerArm), required: true;
    RightShoulder => "rightShoulder", parent: Some(B::UpperChest), required: false;
    RightUpperArm => "rightUpperArm", parent: Some(B::RightShoulder), required: true;
    RightLowerArm => "rightLowerArm", parent: Some(B::RightUpperArm), required: true;
    RightHand => "rightHand", parent: Some(B::RightLowerArm), required: true;

    LeftThumbMetacarpal => "leftThumbMetacarpal", parent: Some(B::LeftHand), required: false;
    LeftThumbProximal => "leftThumbProximal", parent: Some(B::LeftThumbMetacarpal), required: false;
    LeftThumbDistal => "leftThumbDistal", parent: Some(B::LeftThumbProximal), required: false;
    LeftIndexProximal => "leftIndexProximal", parent: Some(B::LeftHand), required: false;
    LeftIndexIntermediate => "leftIndexIntermediate", parent: Some(B::LeftIndexProximal), required: false;
    LeftIndexDistal => "leftIndexDistal", parent: Some(B::LeftIndexIntermediate), required: false;
    LeftMiddleProximal => "leftMiddleProximal", parent: Some(B::LeftHand), required: false;
    LeftMiddleIntermediate => "leftMiddleIntermediate", parent: Some(B::LeftMiddleProximal), required: false;
    LeftMiddleDistal => "leftMiddleDistal", parent: Some(B::LeftMiddleIntermediate), required: false;
    LeftRingProximal => "leftRingProximal", parent: Some(B::LeftHand), required: false;
    LeftRingIntermediate => "leftRingIntermediate", parent: Some(B::LeftRingProximal), required: false;
    LeftRingDistal => "leftRingDistal", parent: Some(B::LeftRingIntermediate), required: false;
    LeftLittleProximal => "leftLittleProximal", parent: Some(B::LeftHand), required: false;
    LeftLittleIntermediate => "leftLittleIntermediate", parent: Some(B::LeftLittleProximal), required: false;
    LeftLittleDistal => "leftLittleDistal", parent: Some(B::LeftLittleIntermediate), required: false;

    RightThumbMetacarpal => "rightThumbMetacarpal", parent: Some(B::RightHand), required: false;
    RightThumbProximal => "rightThumbProximal", parent: Some(B::RightThumbMetacarpal), required: false;
    RightThumbDistal => "rightThumbDistal", parent: Some(B::RightThumbProximal), required: false;
    RightIndexProximal => "rightIndexProximal", parent: Some(B::RightHand), required: false;
    RightIndexIntermediate => "rightIndexIntermediate", parent: Some(B::RightIndexProximal), required: false;
    RightIndexDistal => "rightIndexDistal", parent: Some(B::RightIndexIntermediate), required: false;
    RightMiddleProximal => "rightMiddleProximal", parent: Some(B::RightHand), required: false;
    RightMiddleIntermediate => "rightMiddleIntermediate", parent: Some(B::RightMiddleProximal), required: false;
    RightMiddleDistal => "rightMiddleDistal", parent: Some(B::RightMiddleIntermediate), required: false;
    RightRingProximal => "rightRingProximal", parent: Some(B::RightHand), required: false;
    RightRingIntermediate => "rightRingIntermediate", parent: Some(B::RightRingProximal), required: false;
    RightRingDistal => "rightRingDistal", parent: Some(B::RightRingIntermediate), required: false;
    RightLittleProximal => "rightLittleProximal", parent: Some(B::RightHand), required: false;
    RightLittleIntermediate => "rightLittleIntermediate", parent: Some(B::RightLittleProximal), required: false;
    RightLittleDistal => "rightLittleDistal", parent: Some(B::RightLittleIntermediate), required: false;
}

impl HumanBoneName {
    /// Parses a VRM 0.x bone name.
    ///
    /// VRM 0.x has no metacarpal: its thumb chain is Proximal, Intermediate,
    /// Distal, which maps to Metacarpal, Proximal, Distal.
    #[must_use]
    pub fn from_vrm0(name: &str) -> Option<HumanBoneName> {
        let renamed = match name {
            "leftThumbProximal" => "leftThumbMetacarpal",
            "leftThumbIntermediate" => "leftThumbProximal",
            "rightThumbProximal" => "rightThumbMetacarpal",
            "rightThumbIntermediate" => "rightThumbProximal",
            other => other,
        };
        renamed.parse().ok()
    }

    /// Name of the proxy node representing this bone in the normalized rig.
    #[must_use]
    pub fn normalized_node_name(self) -> String {
        format!("Normalized_{}", self.as_str())
    }
}

impl fmt::Display for HumanBoneName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownHumanBone(pub String);

impl fmt::Display for UnknownHumanBone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown human bone '{}'", self.0)
    }
}

impl std::error::Error for UnknownHumanBone {}

// ============================================================================
// Poses
// ============================================================================

/// Local transform of one bone. Missing fields are left untouched when a
/// pose is applied.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BonePose {
    pub position: Option<Vec3>,
    pub rotation: Option<Quat>,
}

pub type HumanoidPose = FxHashMap<HumanBoneName, BonePose>;

// ============================================================================
// Humanoid
// ============================================================================

#[derive(Debug, Clone)]
struct RawBone {
    node: NodeHandle,
    rest_position: Vec3,
    rest_rotation: Quat,
    /// World rotation of the raw parent at rest.
    parent_world_rotation: Quat,
}

#[derive(Debug, Clone)]
struct NormalizedBone {
    node: NodeHandle,
    rest_position: Vec3,
}

/// Raw bone map plus the normalized rig built from it.
#[derive(Debug, Clone)]
pub struct Humanoid {
    raw: FxHashMap<HumanBoneName, RawBone>,
    normalized: FxHashMap<HumanBoneName, NormalizedBone>,
    rig_root: NodeHandle,
    /// When false, [`update`](Self::update) leaves the raw bones alone.
    pub auto_update_human_bones: bool,
}

impl Humanoid {
    /// Builds the normalized rig under `parent` from the current (rest) pose.
    ///
    /// World matrices of the raw skeleton must be up to date.
    pub fn new(scene: &mut Scene, parent: NodeHandle, bones: &FxHashMap<HumanBoneName, NodeHandle>) -> Self {
        let mut raw = FxHashMap::default();
        let mut world_positions: FxHashMap<HumanBoneName, Vec3> = FxHashMap::default();

        for &bone in HumanBoneName::ALL {
            let Some(&node) = bones.get(&bone) else {
                continue;
            };
            let Some(engine_node) = scene.get_node(node) else {
                log::warn!("Humanoid: node for bone '{bone}' does not exist");
                continue;
            };

            let rest_position = engine_node.transform.position;
            let rest_rotation = engine_node.transform.rotation;
            let parent_world_rotation = engine_node
                .parent()
                .map_or(Quat::IDENTITY, |p| scene.world_rotation(p));

            world_positions.insert(bone, scene.world_position(node));
            raw.insert(
                bone,
                RawBone {
                    node,
                    rest_position,
                    rest_rotation,
                    parent_world_rotation,
                },
            );
        }

        let missing: Vec<_> = HumanBoneName::ALL
            .iter()
            .filter(|b| b.is_required() && !raw.contains_key(b))
            .map(|b| b.as_str())
            .collect();
        if !missing.is_empty() {
            log::warn!("Humanoid is missing required bones: {missing:?}");
        }

        let rig_root = scene.add_to_parent(Node::with_name("VRMHumanoidRig"), parent);
        let mut normalized: FxHashMap<HumanBoneName, NormalizedBone> = FxHashMap::default();

        // ALL lists parents first, so the proxy parent always exists already.
        for &bone in HumanBoneName::ALL {
            let Some(&world_position) = world_positions.get(&bone) else {
                continue;
            };

            let mut ancestor = bone.parent();
            while let Some(a) = ancestor {
                if raw.contains_key(&a) {
                    break;
                }
                ancestor = a.parent();
            }

            let (proxy_parent, parent_position) = match ancestor {
                Some(a) => (normalized[&a].node, world_positions[&a]),
                None => (rig_root, Vec3::ZERO),
            };

            let rest_position = world_position - parent_position;
            let mut proxy = Node::with_name(bone.normalized_node_name());
            proxy.transform.position = rest_position;
            let node = scene.add_to_parent(proxy, proxy_parent);

            normalized.insert(bone, NormalizedBone { node, rest_position });
        }

        scene.update_world_matrix(rig_root, true, true);

        Self {
            raw,
            normalized,
            rig_root,
            auto_update_human_bones: true,
        }
    }

    /// Root node of the normalized rig.
    #[must_use]
    pub fn rig_root(&self) -> NodeHandle {
        self.rig_root
    }

    #[must_use]
    pub fn raw_bone_node(&self, bone: HumanBoneName) -> Option<NodeHandle> {
        self.raw.get(&bone).map(|b| b.node)
    }

    #[must_use]
    pub fn normalized_bone_node(&self, bone: HumanBoneName) -> Option<NodeHandle> {
        self.normalized.get(&bone).map(|b| b.node)
    }

    /// Mapped bones, in canonical order.
    pub fn bones(&self) -> impl Iterator<Item = HumanBoneName> + '_ {
        HumanBoneName::ALL
            .iter()
            .copied()
            .filter(|b| self.raw.contains_key(b))
    }

    /// Required bones the avatar does not map.
    #[must_use]
    pub fn missing_required_bones(&self) -> Vec<HumanBoneName> {
        HumanBoneName::ALL
            .iter()
            .copied()
            .filter(|b| b.is_required() && !self.raw.contains_key(b))
            .collect()
    }

    /// Rest pose of the raw skeleton.
    #[must_use]
    pub fn raw_rest_pose(&self) -> HumanoidPose {
        self.raw
            .iter()
            .map(|(&bone, raw)| {
                (
                    bone,
                    BonePose {
                        position: Some(raw.rest_position),
                        rotation: Some(raw.rest_rotation),
                    },
                )
            })
            .collect()
    }

    /// Rest pose of the normalized rig (identity rotations).
    #[must_use]
    pub fn normalized_rest_pose(&self) -> HumanoidPose {
        self.normalized
            .iter()
            .map(|(&bone, norm)| {
                (
                    bone,
                    BonePose {
                        position: Some(norm.rest_position),
                        rotation: Some(Quat::IDENTITY),
                    },
                )
            })
            .collect()
    }

    #[must_use]
    pub fn get_raw_pose(&self, scene: &Scene) -> HumanoidPose {
        collect_pose(scene, self.raw.iter().map(|(&b, r)| (b, r.node)))
    }

    #[must_use]
    pub fn get_normalized_pose(&self, scene: &Scene) -> HumanoidPose {
        collect_pose(scene, self.normalized.iter().map(|(&b, n)| (b, n.node)))
    }

    pub fn set_raw_pose(&self, scene: &mut Scene, pose: &HumanoidPose) {
        apply_pose(scene, pose, |bone| self.raw_bone_node(bone));
    }

    pub fn set_normalized_pose(&self, scene: &mut Scene, pose: &HumanoidPose) {
        apply_pose(scene, pose, |bone| self.normalized_bone_node(bone));
    }

    pub fn reset_raw_pose(&self, scene: &mut Scene) {
        self.set_raw_pose(scene, &self.raw_rest_pose());
    }

    pub fn reset_normalized_pose(&self, scene: &mut Scene) {
        self.set_normalized_pose(scene, &self.normalized_rest_pose());
    }

    /// Copies the normalized pose onto the raw bones.
    pub fn update(&self, scene: &mut Scene) {
        if !self.auto_update_human_bones {
            return;
        }
        for &bone in HumanBoneName::ALL {
            self.update_bone(scene, bone);
        }
    }

    /// Transfers a single normalized bone onto its raw bone.
    ///
    /// The raw local rotation is the normalized rotation conjugated into the
    /// raw parent's rest frame, on top of the raw rest rotation. For hips the
    /// normalized world position is also carried over.
    pub fn update_bone(&self, scene: &mut Scene, bone: HumanBoneName) {
        let (Some(raw), Some(norm)) = (self.raw.get(&bone), self.normalized.get(&bone)) else {
            return;
        };
        let Some(norm_rotation) = scene.get_node(norm.node).map(|n| n.transform.rotation) else {
            return;
        };

        let rotation = raw.parent_world_rotation.inverse()
            * norm_rotation
            * raw.parent_world_rotation
            * raw.rest_rotation;

        let position = if bone == HumanBoneName::Hips {
            scene.update_world_matrix(norm.node, true, false);
            let world_position = scene.world_position(norm.node);

            if let Some(parent) = scene.get_node(raw.node).and_then(Node::parent) {
                scene.update_world_matrix(parent, true, false);
            }
            let parent_inverse = scene.parent_world_matrix(raw.node).inverse();
            Some(parent_inverse.transform_point3(world_position))
        } else {
            None
        };

        if let Some(node) = scene.get_node_mut(raw.node) {
            node.transform.rotation = rotation;
            if let Some(position) = position {
                node.transform.position = position;
            }
        }
    }
}

fn collect_pose(scene: &Scene, bones: impl Iterator<Item = (HumanBoneName, NodeHandle)>) -> HumanoidPose {
    bones
        .filter_map(|(bone, handle)| {
            let node = scene.get_node(handle)?;
            Some((
                bone,
                BonePose {
                    position: Some(node.transform.position),
                    rotation: Some(node.transform.rotation),
                },
            ))
        })
        .collect()
}

fn apply_pose(scene: &mut Scene, pose: &HumanoidPose, resolve: impl Fn(HumanBoneName) -> Option<NodeHandle>) {
    for (&bone, state) in pose {
        let Some(node) = resolve(bone).and_then(|h| scene.get_node_mut(h)) else {
            continue;
        };
        if let Some(position) = state.position {
            node.transform.position = position;
        }
        if let Some(rotation) = state.rotation {
            node.transform.rotation = rotation;
        }
    }
}
