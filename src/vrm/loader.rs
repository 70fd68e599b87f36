//! `VRMC_vrm` / `VRM` (0.x) extension parser.

use std::path::Path;

use glam::Vec3;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::assets::loaders::{GltfAsset, GltfExtensionParser, GltfLoader};
use crate::errors::{AnimaError, Result};
use crate::scene::NodeHandle;
use crate::vrm::Vrm;
use crate::vrm::expression::{Expression, ExpressionManager, ExpressionOverride, ExpressionPreset, MorphTargetBind};
use crate::vrm::humanoid::{HumanBoneName, Humanoid};
use crate::vrm::look_at::{LookAt, LookAtRangeMap, LookAtType};
use crate::vrm::meta::{MetaVersion, VrmMeta};
use crate::vrm::schema::{
    Collider1, DegreeMap0, RangeMap1, SecondaryAnimation0, SpringBone1, Vector3Xyz, Vrm0, VrmcVrm,
};
use crate::vrm::spring_bone::{
    ColliderGroup, ColliderShape, SpringBoneCollider, SpringBoneJoint, SpringBoneJointSettings, SpringBoneManager,
};

const VRMC_VRM: &str = "VRMC_vrm";
const VRMC_SPRING_BONE: &str = "VRMC_springBone";
const VRMC_SPRING_BONE_EXTENDED_COLLIDER: &str = "VRMC_springBone_extended_collider";
const VRM0: &str = "VRM";

/// Everything the parser builds, handed to [`Vrm`] through the asset's user data.
#[derive(Debug)]
pub(crate) struct VrmParts {
    pub meta: VrmMeta,
    pub humanoid: Humanoid,
    pub expression_manager: ExpressionManager,
    pub look_at: Option<LookAt>,
    pub spring_bone_manager: SpringBoneManager,
}

/// Builds the humanoid, expressions, look-at and spring bones of a VRM 1.0
/// or 0.x model.
#[derive(Debug, Default)]
pub struct VrmLoaderPlugin;

impl GltfExtensionParser for VrmLoaderPlugin {
    fn name(&self) -> &str {
        VRMC_VRM
    }

    fn handles(&self, extension: &str) -> bool {
        matches!(
            extension,
            VRMC_VRM | VRMC_SPRING_BONE | VRMC_SPRING_BONE_EXTENDED_COLLIDER | VRM0
        )
    }

    fn on_after_load(&mut self, asset: &mut GltfAsset) -> Result<()> {
        let parts = if let Some(value) = asset.extension(VRMC_VRM) {
            let vrm: VrmcVrm = serde_json::from_value(value.clone())?;
            if !vrm.spec_version.starts_with("1.") {
                log::warn!("Unknown VRMC_vrm specVersion '{}'", vrm.spec_version);
            }
            let springs = match asset.extension(VRMC_SPRING_BONE) {
                Some(value) => Some(serde_json::from_value::<SpringBone1>(value.clone())?),
                None => None,
            };
            build_vrm1(asset, vrm, springs.as_ref())?
        } else if let Some(value) = asset.extension(VRM0) {
            let vrm: Vrm0 = serde_json::from_value(value.clone())?;
            build_vrm0(asset, vrm)
        } else {
            log::warn!("Spring bone extension found without VRMC_vrm; skipping the model setup");
            return Ok(());
        };

        asset.user_data.insert(parts);
        Ok(())
    }
}

/// Loads a complete [`Vrm`] from `.vrm` bytes.
pub struct VrmLoader;

impl VrmLoader {
    pub fn load_slice(bytes: &[u8], base_path: Option<&Path>) -> Result<Vrm> {
        Self::load_with(GltfLoader::new(), bytes, base_path)
    }

    /// Like [`Self::load_slice`], on a preconfigured loader (e.g. one holding
    /// prefetched external buffers).
    pub fn load_with(loader: GltfLoader, bytes: &[u8], base_path: Option<&Path>) -> Result<Vrm> {
        let asset = loader
            .with_extension(VrmLoaderPlugin)
            .load_slice(bytes, base_path)?;
        Vrm::try_from(asset)
    }
}

impl TryFrom<GltfAsset> for Vrm {
    type Error = AnimaError;

    fn try_from(mut asset: GltfAsset) -> Result<Self> {
        let parts = asset
            .user_data
            .take::<VrmParts>()
            .ok_or_else(|| AnimaError::MissingExtension(format!("{VRMC_VRM} or {VRM0}")))?;

        Ok(Vrm {
            scene: asset.scene,
            root: asset.root,
            meta: parts.meta,
            humanoid: parts.humanoid,
            expression_manager: parts.expression_manager,
            look_at: parts.look_at,
            spring_bone_manager: parts.spring_bone_manager,
            animations: asset.animations,
        })
    }
}

// ============================================================================
// VRM 1.0
// ============================================================================

fn build_vrm1(asset: &mut GltfAsset, vrm: VrmcVrm, springs: Option<&SpringBone1>) -> Result<VrmParts> {
    let humanoid_schema = vrm
        .humanoid
        .ok_or_else(|| AnimaError::InvalidVrm(format!("{VRMC_VRM} has no humanoid")))?;
    let meta = vrm
        .meta
        .map_or_else(|| VrmMeta::empty(MetaVersion::V1), VrmMeta::from);

    let mut bones = FxHashMap::default();
    for (name, node_ref) in humanoid_schema.human_bones {
        let Ok(bone) = name.parse::<HumanBoneName>() else {
            log::warn!("Ignoring unknown human bone '{name}'");
            continue;
        };
        if let Some(handle) = resolve_node(asset, node_ref.node, "human bone") {
            bones.insert(bone, handle);
        }
    }
    let humanoid = Humanoid::new(&mut asset.scene, asset.root, &bones);

    let mut expression_manager = ExpressionManager::new();
    if let Some(expressions) = vrm.expressions {
        for (name, schema) in &expressions.preset {
            if name.parse::<ExpressionPreset>().is_err() {
                log::warn!("Ignoring unknown preset expression '{name}'");
                continue;
            }
            expression_manager.register(build_expression1(asset, name, schema));
        }
        for (name, schema) in &expressions.custom {
            if name.parse::<ExpressionPreset>().is_ok() {
                log::warn!("Custom expression '{name}' collides with a preset name; ignored");
                continue;
            }
            expression_manager.register(build_expression1(asset, name, schema));
        }
    }

    let look_at = vrm.look_at.and_then(|schema| {
        let head = humanoid.raw_bone_node(HumanBoneName::Head)?;
        let look_at_type = match schema.look_at_type.as_deref() {
            Some("expression") => LookAtType::Expression,
            _ => LookAtType::Bone,
        };
        let mut look_at = LookAt::new(&asset.scene, asset.root, head, look_at_type);
        if let Some(offset) = schema.offset_from_head_bone {
            look_at.offset_from_head_bone = Vec3::from_array(offset);
        }
        apply_range_map1(&mut look_at.range_map_horizontal_inner, schema.range_map_horizontal_inner);
        apply_range_map1(&mut look_at.range_map_horizontal_outer, schema.range_map_horizontal_outer);
        apply_range_map1(&mut look_at.range_map_vertical_down, schema.range_map_vertical_down);
        apply_range_map1(&mut look_at.range_map_vertical_up, schema.range_map_vertical_up);
        Some(look_at)
    });

    let spring_bone_manager = springs.map_or_else(SpringBoneManager::new, |s| build_springs1(asset, s));

    Ok(VrmParts {
        meta,
        humanoid,
        expression_manager,
        look_at,
        spring_bone_manager,
    })
}

fn build_expression1(asset: &GltfAsset, name: &str, schema: &crate::vrm::schema::Expression1) -> Expression {
    let mut expression = Expression::new(name);
    expression.is_binary = schema.is_binary;
    expression.override_blink = ExpressionOverride::parse(schema.override_blink.as_deref());
    expression.override_look_at = ExpressionOverride::parse(schema.override_look_at.as_deref());
    expression.override_mouth = ExpressionOverride::parse(schema.override_mouth.as_deref());

    for bind in &schema.morph_target_binds {
        let Some(handle) = resolve_node(asset, bind.node, "morph target bind") else {
            continue;
        };
        expression.binds.push(MorphTargetBind {
            primitives: SmallVec::from_slice(&[handle]),
            index: bind.index,
            weight: bind.weight,
        });
    }
    expression
}

fn apply_range_map1(map: &mut LookAtRangeMap, schema: Option<RangeMap1>) {
    if let Some(schema) = schema {
        if let Some(input) = schema.input_max_value {
            map.input_max_value = input;
        }
        if let Some(output) = schema.output_scale {
            map.output_scale = output;
        }
    }
}

fn collider_shape1(collider: &Collider1) -> Option<ColliderShape> {
    let v = |a: Option<[f32; 3]>| a.map_or(Vec3::ZERO, Vec3::from_array);

    if let Some(extended) = &collider.extensions.extended_collider {
        let shape = &extended.shape;
        if let Some(s) = shape.sphere {
            return Some(ColliderShape::Sphere {
                offset: v(s.offset),
                radius: s.radius.unwrap_or(0.0),
                inside: s.inside,
            });
        }
        if let Some(c) = shape.capsule {
            return Some(ColliderShape::Capsule {
                offset: v(c.offset),
                tail: v(c.tail),
                radius: c.radius.unwrap_or(0.0),
                inside: c.inside,
            });
        }
        if let Some(p) = shape.plane {
            return Some(ColliderShape::plane(
                v(p.offset),
                p.normal.map_or(Vec3::Z, Vec3::from_array),
            ));
        }
    }

    if let Some(s) = collider.shape.sphere {
        return Some(ColliderShape::sphere(v(s.offset), s.radius.unwrap_or(0.0)));
    }
    collider
        .shape
        .capsule
        .map(|c| ColliderShape::capsule(v(c.offset), v(c.tail), c.radius.unwrap_or(0.0)))
}

fn build_springs1(asset: &GltfAsset, schema: &SpringBone1) -> SpringBoneManager {
    let mut manager = SpringBoneManager::new();

    let collider_indices: Vec<Option<usize>> = schema
        .colliders
        .iter()
        .map(|collider| {
            let node = resolve_node(asset, collider.node, "collider")?;
            let Some(shape) = collider_shape1(collider) else {
                log::warn!("Collider on node {} has no shape; ignored", collider.node);
                return None;
            };
            Some(manager.add_collider(SpringBoneCollider { node, shape }))
        })
        .collect();

    for group in &schema.collider_groups {
        let colliders = group
            .colliders
            .iter()
            .filter_map(|&i| collider_indices.get(i).copied().flatten())
            .collect();
        manager.add_collider_group(ColliderGroup {
            name: group.name.clone(),
            colliders,
        });
    }
    let group_count = manager.collider_groups().len();

    for spring in &schema.springs {
        let center = spring
            .center
            .and_then(|index| resolve_node(asset, index, "spring center"));
        let groups = valid_groups(&spring.collider_groups, group_count, &spring.name);

        // Each joint drives the bone between itself and the next joint.
        for pair in spring.joints.windows(2) {
            let (joint, next) = (&pair[0], &pair[1]);
            let Some(bone) = resolve_node(asset, joint.node, "spring joint") else {
                continue;
            };
            let child = resolve_node(asset, next.node, "spring joint");

            let defaults = SpringBoneJointSettings::default();
            let settings = SpringBoneJointSettings {
                hit_radius: joint.hit_radius.unwrap_or(defaults.hit_radius),
                stiffness: joint.stiffness.unwrap_or(defaults.stiffness),
                gravity_power: joint.gravity_power.unwrap_or(defaults.gravity_power),
                gravity_dir: joint.gravity_dir.map_or(defaults.gravity_dir, Vec3::from_array),
                drag_force: joint.drag_force.unwrap_or(defaults.drag_force),
            };

            let mut spring_joint = SpringBoneJoint::new(&asset.scene, bone, child, settings, groups.clone());
            if center.is_some() {
                spring_joint.set_center(&asset.scene, center);
            }
            manager.add_joint(spring_joint);
        }
    }

    manager
}

// ============================================================================
// VRM 0.x
// ============================================================================

fn build_vrm0(asset: &mut GltfAsset, vrm: Vrm0) -> VrmParts {
    let meta = vrm
        .meta
        .map_or_else(|| VrmMeta::empty(MetaVersion::V0), VrmMeta::from);

    let mut bones = FxHashMap::default();
    for bone in vrm.humanoid.unwrap_or_default().human_bones {
        let (Some(name), Some(node)) = (bone.bone, bone.node) else {
            continue;
        };
        let Some(bone_name) = HumanBoneName::from_vrm0(&name) else {
            log::warn!("Ignoring unknown VRM 0.x human bone '{name}'");
            continue;
        };
        if let Some(handle) = resolve_node(asset, node, "human bone") {
            bones.insert(bone_name, handle);
        }
    }
    let humanoid = Humanoid::new(&mut asset.scene, asset.root, &bones);

    let mut expression_manager = ExpressionManager::new();
    for group in vrm.blend_shape_master.unwrap_or_default().blend_shape_groups {
        let preset = group.preset_name.as_deref().and_then(ExpressionPreset::from_vrm0);
        let name = match (preset, &group.name) {
            (Some(preset), _) => preset.as_str().to_string(),
            (None, Some(name)) => name.clone(),
            (None, None) => {
                log::warn!("Blend shape group without name or preset; ignored");
                continue;
            }
        };

        let mut expression = Expression::new(name);
        expression.is_binary = group.is_binary;
        for bind in &group.binds {
            let (Some(mesh), Some(index)) = (bind.mesh, bind.index) else {
                continue;
            };
            let primitives: SmallVec<[NodeHandle; 2]> = asset.mesh_nodes(mesh).iter().copied().collect();
            if primitives.is_empty() {
                log::warn!("Blend shape bind refers to mesh {mesh}, which no node uses");
                continue;
            }
            expression.binds.push(MorphTargetBind {
                primitives,
                index,
                weight: bind.weight.unwrap_or(100.0) * 0.01,
            });
        }
        expression_manager.register(expression);
    }

    let look_at = vrm.first_person.and_then(|first_person| {
        let head = humanoid.raw_bone_node(HumanBoneName::Head)?;
        let look_at_type = match first_person.look_at_type_name.as_deref() {
            Some("BlendShape") => LookAtType::Expression,
            _ => LookAtType::Bone,
        };
        let mut look_at = LookAt::new(&asset.scene, asset.root, head, look_at_type);
        look_at.face_front = Vec3::NEG_Z;
        look_at.offset_from_head_bone = first_person
            .first_person_bone_offset
            .map_or(Vec3::new(0.0, 0.06, 0.0), flip_z);

        apply_degree_map0(&mut look_at.range_map_horizontal_inner, first_person.look_at_horizontal_inner.as_ref());
        apply_degree_map0(&mut look_at.range_map_horizontal_outer, first_person.look_at_horizontal_outer.as_ref());
        apply_degree_map0(&mut look_at.range_map_vertical_down, first_person.look_at_vertical_down.as_ref());
        apply_degree_map0(&mut look_at.range_map_vertical_up, first_person.look_at_vertical_up.as_ref());
        Some(look_at)
    });

    let spring_bone_manager = vrm
        .secondary_animation
        .map_or_else(SpringBoneManager::new, |s| build_springs0(asset, &s));

    VrmParts {
        meta,
        humanoid,
        expression_manager,
        look_at,
        spring_bone_manager,
    }
}

/// VRM 0.x stores vectors in a frame whose z axis points the other way.
fn flip_z(v: Vector3Xyz) -> Vec3 {
    Vec3::new(v.x, v.y, -v.z)
}

fn apply_degree_map0(map: &mut LookAtRangeMap, schema: Option<&DegreeMap0>) {
    let Some(schema) = schema else {
        return;
    };
    if let Some(x_range) = schema.x_range {
        map.input_max_value = x_range;
    }
    if let Some(y_range) = schema.y_range {
        map.output_scale = y_range;
    }
}

fn build_springs0(asset: &GltfAsset, schema: &SecondaryAnimation0) -> SpringBoneManager {
    let mut manager = SpringBoneManager::new();

    for group in &schema.collider_groups {
        let node = group
            .node
            .and_then(|index| resolve_node(asset, index, "collider group"));
        let mut colliders = Vec::new();
        if let Some(node) = node {
            for collider in &group.colliders {
                let shape = ColliderShape::sphere(
                    collider.offset.map_or(Vec3::ZERO, flip_z),
                    collider.radius.unwrap_or(0.0),
                );
                colliders.push(manager.add_collider(SpringBoneCollider { node, shape }));
            }
        }
        // Keep indices aligned with the schema even for broken groups.
        manager.add_collider_group(ColliderGroup {
            name: String::new(),
            colliders,
        });
    }
    let group_count = manager.collider_groups().len();

    for bone_group in &schema.bone_groups {
        let name = bone_group.comment.as_deref().unwrap_or_default();
        let defaults = SpringBoneJointSettings::default();
        let settings = SpringBoneJointSettings {
            hit_radius: bone_group.hit_radius.unwrap_or(defaults.hit_radius),
            stiffness: bone_group
                .stiffiness
                .or(bone_group.stiffness)
                .unwrap_or(defaults.stiffness),
            gravity_power: bone_group.gravity_power.unwrap_or(defaults.gravity_power),
            gravity_dir: bone_group.gravity_dir.map_or(defaults.gravity_dir, flip_z),
            drag_force: bone_group.drag_force.unwrap_or(defaults.drag_force),
        };
        let center = bone_group
            .center
            .and_then(|c| usize::try_from(c).ok())
            .and_then(|index| resolve_node(asset, index, "spring center"));
        let groups = valid_groups(&bone_group.collider_groups, group_count, name);

        for &root_index in &bone_group.bones {
            let Some(root) = resolve_node(asset, root_index, "spring root bone") else {
                continue;
            };

            // Every node of the subtree becomes a joint pointing at its first child.
            let mut stack = vec![root];
            while let Some(bone) = stack.pop() {
                let Some(node) = asset.scene.get_node(bone) else {
                    continue;
                };
                let child = node.children().first().copied();
                stack.extend(node.children().iter().rev().copied());

                let mut joint = SpringBoneJoint::new(&asset.scene, bone, child, settings, groups.clone());
                if center.is_some() {
                    joint.set_center(&asset.scene, center);
                }
                manager.add_joint(joint);
            }
        }
    }

    manager
}

// ============================================================================
// Helpers
// ============================================================================

fn resolve_node(asset: &GltfAsset, index: usize, what: &str) -> Option<NodeHandle> {
    let handle = asset.node(index);
    if handle.is_none() {
        log::warn!("{what} refers to node {index}, which does not exist");
    }
    handle
}

fn valid_groups(indices: &[usize], group_count: usize, spring_name: &str) -> Vec<usize> {
    indices
        .iter()
        .copied()
        .filter(|&i| {
            let valid = i < group_count;
            if !valid {
                log::warn!("Spring '{spring_name}' refers to collider group {i}, which does not exist");
            }
            valid
        })
        .collect()
}
