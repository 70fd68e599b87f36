//! Serde mirrors of the VRM glTF extensions.
//!
//! Only the fields the runtime consumes are modelled; everything else in
//! the JSON is ignored. Fields are optional wherever the published schemas
//! allow them to be omitted.

use std::collections::BTreeMap;

use serde::Deserialize;

// ============================================================================
// VRM 1.0: VRMC_vrm
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VrmcVrm {
    pub spec_version: String,
    pub meta: Option<Meta1>,
    pub humanoid: Option<Humanoid1>,
    pub look_at: Option<LookAt1>,
    pub expressions: Option<Expressions1>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Meta1 {
    pub name: String,
    pub version: Option<String>,
    pub authors: Vec<String>,
    pub copyright_information: Option<String>,
    pub contact_information: Option<String>,
    pub references: Vec<String>,
    pub license_url: String,
    pub avatar_permission: Option<String>,
    pub commercial_usage: Option<String>,
    pub credit_notation: Option<String>,
    pub allow_redistribution: Option<bool>,
    pub modification: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Humanoid1 {
    pub human_bones: BTreeMap<String, NodeRef>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct NodeRef {
    pub node: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LookAt1 {
    pub offset_from_head_bone: Option<[f32; 3]>,
    #[serde(rename = "type")]
    pub look_at_type: Option<String>,
    pub range_map_horizontal_inner: Option<RangeMap1>,
    pub range_map_horizontal_outer: Option<RangeMap1>,
    pub range_map_vertical_down: Option<RangeMap1>,
    pub range_map_vertical_up: Option<RangeMap1>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RangeMap1 {
    pub input_max_value: Option<f32>,
    pub output_scale: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Expressions1 {
    pub preset: BTreeMap<String, Expression1>,
    pub custom: BTreeMap<String, Expression1>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Expression1 {
    pub morph_target_binds: Vec<MorphTargetBind1>,
    pub is_binary: bool,
    pub override_blink: Option<String>,
    pub override_look_at: Option<String>,
    pub override_mouth: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MorphTargetBind1 {
    pub node: usize,
    pub index: usize,
    pub weight: f32,
}

// ============================================================================
// VRM 1.0: VRMC_springBone (+ VRMC_springBone_extended_collider)
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpringBone1 {
    pub spec_version: String,
    pub colliders: Vec<Collider1>,
    pub collider_groups: Vec<ColliderGroup1>,
    pub springs: Vec<Spring1>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Collider1 {
    pub node: usize,
    #[serde(default)]
    pub shape: ColliderShape1,
    #[serde(default)]
    pub extensions: ColliderExtensions1,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ColliderShape1 {
    pub sphere: Option<Sphere1>,
    pub capsule: Option<Capsule1>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct Sphere1 {
    pub offset: Option<[f32; 3]>,
    pub radius: Option<f32>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct Capsule1 {
    pub offset: Option<[f32; 3]>,
    pub radius: Option<f32>,
    pub tail: Option<[f32; 3]>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ColliderExtensions1 {
    #[serde(rename = "VRMC_springBone_extended_collider")]
    pub extended_collider: Option<ExtendedCollider>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtendedCollider {
    pub spec_version: String,
    pub shape: ExtendedShape,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExtendedShape {
    pub sphere: Option<ExtendedSphere>,
    pub capsule: Option<ExtendedCapsule>,
    pub plane: Option<ExtendedPlane>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct ExtendedSphere {
    pub offset: Option<[f32; 3]>,
    pub radius: Option<f32>,
    pub inside: bool,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct ExtendedCapsule {
    pub offset: Option<[f32; 3]>,
    pub radius: Option<f32>,
    pub tail: Option<[f32; 3]>,
    pub inside: bool,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct ExtendedPlane {
    pub offset: Option<[f32; 3]>,
    pub normal: Option<[f32; 3]>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ColliderGroup1 {
    pub name: String,
    pub colliders: Vec<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Spring1 {
    pub name: String,
    pub joints: Vec<SpringJoint1>,
    pub collider_groups: Vec<usize>,
    pub center: Option<usize>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpringJoint1 {
    pub node: usize,
    pub hit_radius: Option<f32>,
    pub stiffness: Option<f32>,
    pub gravity_power: Option<f32>,
    pub gravity_dir: Option<[f32; 3]>,
    pub drag_force: Option<f32>,
}

// ============================================================================
// VRM 0.x: VRM
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Vrm0 {
    pub exporter_version: Option<String>,
    pub spec_version: Option<String>,
    pub meta: Option<Meta0>,
    pub humanoid: Option<Humanoid0>,
    pub first_person: Option<FirstPerson0>,
    pub blend_shape_master: Option<BlendShapeMaster0>,
    pub secondary_animation: Option<SecondaryAnimation0>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Meta0 {
    pub title: Option<String>,
    pub version: Option<String>,
    pub author: Option<String>,
    pub contact_information: Option<String>,
    pub reference: Option<String>,
    pub allowed_user_name: Option<String>,
    pub license_name: Option<String>,
    pub other_license_url: Option<String>,
}

/// `{x, y, z}` vector as written by VRM 0.x exporters.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct Vector3Xyz {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Humanoid0 {
    pub human_bones: Vec<HumanBone0>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HumanBone0 {
    pub bone: Option<String>,
    pub node: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FirstPerson0 {
    pub first_person_bone: Option<i64>,
    pub first_person_bone_offset: Option<Vector3Xyz>,
    pub look_at_type_name: Option<String>,
    pub look_at_horizontal_inner: Option<DegreeMap0>,
    pub look_at_horizontal_outer: Option<DegreeMap0>,
    pub look_at_vertical_down: Option<DegreeMap0>,
    pub look_at_vertical_up: Option<DegreeMap0>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DegreeMap0 {
    pub curve: Option<Vec<f32>>,
    pub x_range: Option<f32>,
    pub y_range: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlendShapeMaster0 {
    pub blend_shape_groups: Vec<BlendShapeGroup0>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlendShapeGroup0 {
    pub name: Option<String>,
    pub preset_name: Option<String>,
    pub binds: Vec<BlendShapeBind0>,
    pub is_binary: bool,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct BlendShapeBind0 {
    pub mesh: Option<usize>,
    pub index: Option<usize>,
    /// 0 to 100
    pub weight: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecondaryAnimation0 {
    pub bone_groups: Vec<BoneGroup0>,
    pub collider_groups: Vec<ColliderGroup0>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BoneGroup0 {
    pub comment: Option<String>,
    /// Spelled this way in the VRM 0.x schema.
    pub stiffiness: Option<f32>,
    pub stiffness: Option<f32>,
    pub gravity_power: Option<f32>,
    pub gravity_dir: Option<Vector3Xyz>,
    pub drag_force: Option<f32>,
    /// Node index, or -1 for none.
    pub center: Option<i64>,
    pub hit_radius: Option<f32>,
    pub bones: Vec<usize>,
    pub collider_groups: Vec<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ColliderGroup0 {
    pub node: Option<usize>,
    pub colliders: Vec<Collider0>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct Collider0 {
    pub offset: Option<Vector3Xyz>,
    pub radius: Option<f32>,
}
