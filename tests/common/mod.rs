//! In-memory glTF fixtures shared by the loader, retargeting and player tests.
//!
//! `GltfBuilder` assembles a minimal glTF document (nodes, morph-target
//! meshes, animations, root extensions) and serializes it either as JSON
//! with a base64 data-URI buffer or as a GLB container.

#![allow(dead_code)]

use std::collections::BTreeMap;

use base64::Engine;
use serde_json::{Map, Value, json};

/// Routes `log` output through the test harness. Run with `RUST_LOG=debug`
/// to see the loader traces.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// GltfBuilder
// ============================================================================

pub struct Channel {
    pub node: usize,
    pub path: &'static str,
    pub times: Vec<f32>,
    pub values: Vec<f32>,
    pub interpolation: &'static str,
}

impl Channel {
    pub fn linear(node: usize, path: &'static str, times: Vec<f32>, values: Vec<f32>) -> Self {
        Self {
            node,
            path,
            times,
            values,
            interpolation: "LINEAR",
        }
    }
}

#[derive(Default)]
pub struct GltfBuilder {
    nodes: Vec<Map<String, Value>>,
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
    buffer: Vec<u8>,
    buffer_views: Vec<Value>,
    accessors: Vec<Value>,
    meshes: Vec<Value>,
    animations: Vec<Value>,
    extensions: Map<String, Value>,
}

impl GltfBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&mut self, name: &str, parent: Option<usize>, translation: [f32; 3]) -> usize {
        let mut node = Map::new();
        node.insert("name".into(), json!(name));
        if translation != [0.0; 3] {
            node.insert("translation".into(), json!(translation));
        }

        let index = self.nodes.len();
        self.nodes.push(node);
        self.children.push(Vec::new());
        match parent {
            Some(parent) => self.children[parent].push(index),
            None => self.roots.push(index),
        }
        index
    }

    /// Sets a node's rotation (`[x, y, z, w]`).
    pub fn rotate(&mut self, node: usize, rotation: [f32; 4]) {
        self.nodes[node].insert("rotation".into(), json!(rotation));
    }

    pub fn scale(&mut self, node: usize, scale: [f32; 3]) {
        self.nodes[node].insert("scale".into(), json!(scale));
    }

    /// A node instancing a new single-primitive mesh with `targets` morph targets.
    pub fn mesh_node(&mut self, name: &str, parent: Option<usize>, targets: usize) -> usize {
        let position = self.accessor(&[0.0, 0.0, 0.0], "VEC3", 1);
        let morph_targets: Vec<Value> = (0..targets).map(|_| json!({ "POSITION": position })).collect();

        let mesh = self.meshes.len();
        self.meshes.push(json!({
            "name": name,
            "primitives": [{ "attributes": { "POSITION": position }, "targets": morph_targets }],
            "weights": vec![0.0; targets],
        }));

        let node = self.node(name, parent, [0.0; 3]);
        self.nodes[node].insert("mesh".into(), json!(mesh));
        node
    }

    /// Appends float data to the buffer and returns the new accessor index.
    pub fn accessor(&mut self, data: &[f32], kind: &str, count: usize) -> usize {
        while self.buffer.len() % 4 != 0 {
            self.buffer.push(0);
        }
        let offset = self.buffer.len();
        for value in data {
            self.buffer.extend_from_slice(&value.to_le_bytes());
        }

        let view = self.buffer_views.len();
        self.buffer_views.push(json!({
            "buffer": 0,
            "byteOffset": offset,
            "byteLength": data.len() * 4,
        }));

        let accessor = self.accessors.len();
        self.accessors.push(json!({
            "bufferView": view,
            "componentType": 5126,
            "count": count,
            "type": kind,
        }));
        accessor
    }

    pub fn animation(&mut self, name: Option<&str>, channels: Vec<Channel>) {
        let mut samplers = Vec::new();
        let mut json_channels = Vec::new();

        for channel in channels {
            let (kind, components) = match channel.path {
                "rotation" => ("VEC4", 4),
                "weights" => ("SCALAR", 1),
                _ => ("VEC3", 3),
            };
            let input = self.accessor(&channel.times, "SCALAR", channel.times.len());
            let output = self.accessor(&channel.values, kind, channel.values.len() / components);

            json_channels.push(json!({
                "sampler": samplers.len(),
                "target": { "node": channel.node, "path": channel.path },
            }));
            samplers.push(json!({
                "input": input,
                "output": output,
                "interpolation": channel.interpolation,
            }));
        }

        let mut animation = json!({ "channels": json_channels, "samplers": samplers });
        if let Some(name) = name {
            animation["name"] = json!(name);
        }
        self.animations.push(animation);
    }

    pub fn extension(&mut self, name: &str, value: Value) {
        self.extensions.insert(name.to_string(), value);
    }

    fn document(&self, buffer: Option<Value>) -> Value {
        let nodes: Vec<Value> = self
            .nodes
            .iter()
            .zip(&self.children)
            .map(|(node, children)| {
                let mut node = node.clone();
                if !children.is_empty() {
                    node.insert("children".into(), json!(children));
                }
                Value::Object(node)
            })
            .collect();

        let mut root = json!({
            "asset": { "version": "2.0", "generator": "anima tests" },
            "scene": 0,
            "scenes": [{ "nodes": self.roots }],
            "nodes": nodes,
        });
        if !self.meshes.is_empty() {
            root["meshes"] = json!(self.meshes);
        }
        if let Some(buffer) = buffer {
            root["buffers"] = json!([buffer]);
            root["bufferViews"] = json!(self.buffer_views);
            root["accessors"] = json!(self.accessors);
        }
        if !self.animations.is_empty() {
            root["animations"] = json!(self.animations);
        }
        if !self.extensions.is_empty() {
            let used: Vec<&String> = self.extensions.keys().collect();
            root["extensionsUsed"] = json!(used);
            root["extensions"] = Value::Object(self.extensions.clone());
        }
        root
    }

    /// `.gltf` flavour: JSON with the buffer embedded as a data URI.
    pub fn to_json_bytes(&self) -> Vec<u8> {
        let buffer = (!self.buffer.is_empty()).then(|| {
            let encoded = base64::engine::general_purpose::STANDARD.encode(&self.buffer);
            json!({
                "byteLength": self.buffer.len(),
                "uri": format!("data:application/octet-stream;base64,{encoded}"),
            })
        });
        serde_json::to_vec(&self.document(buffer)).expect("serialize glTF")
    }

    /// `.gltf` + `.bin` pair: JSON referring to an external buffer file.
    pub fn to_split_bytes(&self, bin_uri: &str) -> (Vec<u8>, Vec<u8>) {
        let buffer = (!self.buffer.is_empty()).then(|| json!({ "byteLength": self.buffer.len(), "uri": bin_uri }));
        let json = serde_json::to_vec(&self.document(buffer)).expect("serialize glTF");
        (json, self.buffer.clone())
    }

    /// `.glb` / `.vrm` flavour: binary container with a BIN chunk.
    pub fn to_glb_bytes(&self) -> Vec<u8> {
        let buffer = (!self.buffer.is_empty()).then(|| json!({ "byteLength": self.buffer.len() }));
        let mut json_chunk = serde_json::to_vec(&self.document(buffer)).expect("serialize glTF");
        while json_chunk.len() % 4 != 0 {
            json_chunk.push(b' ');
        }
        let mut bin_chunk = self.buffer.clone();
        while bin_chunk.len() % 4 != 0 {
            bin_chunk.push(0);
        }

        let mut total = 12 + 8 + json_chunk.len();
        if !bin_chunk.is_empty() {
            total += 8 + bin_chunk.len();
        }

        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(b"glTF");
        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&(total as u32).to_le_bytes());

        out.extend_from_slice(&(json_chunk.len() as u32).to_le_bytes());
        out.extend_from_slice(b"JSON");
        out.extend_from_slice(&json_chunk);

        if !bin_chunk.is_empty() {
            out.extend_from_slice(&(bin_chunk.len() as u32).to_le_bytes());
            out.extend_from_slice(b"BIN\0");
            out.extend_from_slice(&bin_chunk);
        }
        out
    }
}

/// `[x, y, z, w]` of a rotation of `angle` radians about +Y.
pub fn rotation_y(angle: f32) -> [f32; 4] {
    let half = angle * 0.5;
    [0.0, half.sin(), 0.0, half.cos()]
}

// ============================================================================
// Avatar fixture
// ============================================================================

/// Node indices of the fixture skeleton, by bone or node name.
pub struct Layout {
    pub nodes: BTreeMap<&'static str, usize>,
}

impl Layout {
    pub fn get(&self, name: &str) -> usize {
        self.nodes[name]
    }
}

/// Human bones of the fixture: `(bone, parent, local translation)`.
/// T-pose facing +Z with identity rest rotations.
const SKELETON: &[(&str, Option<&str>, [f32; 3])] = &[
    ("hips", None, [0.0, 0.8, 0.0]),
    ("spine", Some("hips"), [0.0, 0.1, 0.0]),
    ("chest", Some("spine"), [0.0, 0.15, 0.0]),
    ("neck", Some("chest"), [0.0, 0.2, 0.0]),
    ("head", Some("neck"), [0.0, 0.1, 0.0]),
    ("leftEye", Some("head"), [0.03, 0.06, 0.05]),
    ("rightEye", Some("head"), [-0.03, 0.06, 0.05]),
    ("leftUpperArm", Some("chest"), [0.2, 0.12, 0.0]),
    ("leftLowerArm", Some("leftUpperArm"), [0.25, 0.0, 0.0]),
    ("leftHand", Some("leftLowerArm"), [0.25, 0.0, 0.0]),
    ("rightUpperArm", Some("chest"), [-0.2, 0.12, 0.0]),
    ("rightLowerArm", Some("rightUpperArm"), [-0.25, 0.0, 0.0]),
    ("rightHand", Some("rightLowerArm"), [-0.25, 0.0, 0.0]),
    ("leftUpperLeg", Some("hips"), [0.1, -0.05, 0.0]),
    ("leftLowerLeg", Some("leftUpperLeg"), [0.0, -0.35, 0.0]),
    ("leftFoot", Some("leftLowerLeg"), [0.0, -0.35, 0.0]),
    ("rightUpperLeg", Some("hips"), [-0.1, -0.05, 0.0]),
    ("rightLowerLeg", Some("rightUpperLeg"), [0.0, -0.35, 0.0]),
    ("rightFoot", Some("rightLowerLeg"), [0.0, -0.35, 0.0]),
];

/// Armature, skeleton, a three-joint hair strand under the head and a face
/// mesh with three morph targets.
pub fn avatar_skeleton(builder: &mut GltfBuilder) -> Layout {
    let mut nodes = BTreeMap::new();
    let armature = builder.node("Armature", None, [0.0; 3]);
    nodes.insert("Armature", armature);

    for &(bone, parent, translation) in SKELETON {
        let parent = parent.map_or(armature, |p| nodes[p]);
        let index = builder.node(&format!("J_{bone}"), Some(parent), translation);
        nodes.insert(bone, index);
    }

    let hair0 = builder.node("hair0", Some(nodes["head"]), [0.0, 0.1, -0.05]);
    let hair1 = builder.node("hair1", Some(hair0), [0.0, -0.1, 0.0]);
    let hair2 = builder.node("hair2", Some(hair1), [0.0, -0.1, 0.0]);
    nodes.insert("hair0", hair0);
    nodes.insert("hair1", hair1);
    nodes.insert("hair2", hair2);

    let face = builder.mesh_node("Face", Some(nodes["head"]), 3);
    nodes.insert("Face", face);

    Layout { nodes }
}

fn human_bone_names() -> impl Iterator<Item = &'static str> {
    SKELETON.iter().map(|(bone, _, _)| *bone)
}

/// `VRMC_vrm` + `VRMC_springBone` on the fixture skeleton.
pub fn vrm1_builder() -> (GltfBuilder, Layout) {
    init_logging();
    let mut builder = GltfBuilder::new();
    let layout = avatar_skeleton(&mut builder);
    let face = layout.get("Face");

    let human_bones: Map<String, Value> = human_bone_names()
        .map(|bone| (bone.to_string(), json!({ "node": layout.get(bone) })))
        .collect();

    builder.extension(
        "VRMC_vrm",
        json!({
            "specVersion": "1.0",
            "meta": {
                "name": "Fixture Avatar",
                "version": "1.0",
                "authors": ["anima"],
                "licenseUrl": "https://vrm.dev/licenses/1.0/",
            },
            "humanoid": { "humanBones": human_bones },
            "expressions": {
                "preset": {
                    "happy": {
                        "morphTargetBinds": [{ "node": face, "index": 0, "weight": 1.0 }],
                        "overrideBlink": "block",
                    },
                    "blink": {
                        "morphTargetBinds": [{ "node": face, "index": 1, "weight": 1.0 }],
                        "isBinary": true,
                    },
                    "notAPreset": {},
                },
                "custom": {
                    "wink": { "morphTargetBinds": [{ "node": face, "index": 2, "weight": 0.5 }] },
                },
            },
            "lookAt": {
                "type": "bone",
                "offsetFromHeadBone": [0.0, 0.06, 0.02],
                "rangeMapHorizontalOuter": { "inputMaxValue": 80.0, "outputScale": 12.0 },
                "rangeMapVerticalUp": { "inputMaxValue": 60.0 },
            },
        }),
    );

    builder.extension(
        "VRMC_springBone",
        json!({
            "specVersion": "1.0",
            "colliders": [
                { "node": layout.get("head"), "shape": { "sphere": { "offset": [0.0, 0.0, 0.0], "radius": 0.1 } } },
                {
                    "node": layout.get("chest"),
                    "shape": { "capsule": { "offset": [0.0, 0.0, 0.0], "radius": 0.05, "tail": [0.0, 0.2, 0.0] } },
                },
                {
                    "node": layout.get("hips"),
                    "shape": { "sphere": { "radius": 1.0 } },
                    "extensions": {
                        "VRMC_springBone_extended_collider": {
                            "specVersion": "1.0",
                            "shape": { "plane": { "offset": [0.0, -0.8, 0.0], "normal": [0.0, 1.0, 0.0] } },
                        },
                    },
                },
            ],
            "colliderGroups": [{ "name": "upper body", "colliders": [0, 1, 2] }],
            "springs": [{
                "name": "hair",
                "joints": [
                    {
                        "node": layout.get("hair0"),
                        "hitRadius": 0.02,
                        "stiffness": 0.8,
                        "gravityPower": 0.5,
                        "gravityDir": [0.0, -1.0, 0.0],
                        "dragForce": 0.4,
                    },
                    { "node": layout.get("hair1"), "hitRadius": 0.02 },
                    { "node": layout.get("hair2") },
                ],
                "colliderGroups": [0, 7],
                "center": layout.get("head"),
            }],
        }),
    );

    (builder, layout)
}

/// `VRM` (0.x) on the fixture skeleton.
pub fn vrm0_builder() -> (GltfBuilder, Layout) {
    init_logging();
    let mut builder = GltfBuilder::new();
    let layout = avatar_skeleton(&mut builder);

    let mut human_bones: Vec<Value> = human_bone_names()
        .map(|bone| json!({ "bone": bone, "node": layout.get(bone) }))
        .collect();
    human_bones.push(json!({ "bone": "tail", "node": layout.get("hips") }));

    builder.extension(
        "VRM",
        json!({
            "exporterVersion": "UniVRM-0.99",
            "specVersion": "0.0",
            "meta": { "title": "Legacy Avatar", "version": "0.1", "author": "anima", "licenseName": "CC0" },
            "humanoid": { "humanBones": human_bones },
            "blendShapeMaster": {
                "blendShapeGroups": [
                    { "name": "Joy", "presetName": "joy", "binds": [{ "mesh": 0, "index": 0, "weight": 100.0 }] },
                    {
                        "name": "Blink",
                        "presetName": "blink",
                        "binds": [{ "mesh": 0, "index": 1, "weight": 50.0 }],
                        "isBinary": true,
                    },
                    { "name": "Wink", "presetName": "unknown", "binds": [{ "mesh": 0, "index": 2, "weight": 100.0 }] },
                    { "name": "Ghost", "presetName": "unknown", "binds": [{ "mesh": 4, "index": 0, "weight": 100.0 }] },
                ],
            },
            "firstPerson": {
                "firstPersonBone": layout.get("head"),
                "firstPersonBoneOffset": { "x": 0.0, "y": 0.06, "z": 0.02 },
                "lookAtTypeName": "Bone",
                "lookAtHorizontalOuter": { "curve": [0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0], "xRange": 90.0, "yRange": 12.0 },
                "lookAtVerticalUp": { "xRange": 45.0, "yRange": 8.0 },
            },
            "secondaryAnimation": {
                "boneGroups": [{
                    "comment": "hair",
                    "stiffiness": 0.7,
                    "gravityPower": 0.2,
                    "gravityDir": { "x": 0.0, "y": -1.0, "z": 0.5 },
                    "dragForce": 0.3,
                    "center": -1,
                    "hitRadius": 0.02,
                    "bones": [layout.get("hair0")],
                    "colliderGroups": [0, 1, 5],
                }],
                "colliderGroups": [
                    { "node": layout.get("head"), "colliders": [{ "offset": { "x": 0.0, "y": 0.0, "z": 0.05 }, "radius": 0.1 }] },
                    { "node": 999, "colliders": [{ "radius": 0.1 }] },
                ],
            },
        }),
    );

    (builder, layout)
}

// ============================================================================
// Animation fixture
// ============================================================================

pub const ANIMATION_NAME: &str = "wave";

/// `.vrma` with hips translation, a spine swing, a happy expression, an
/// unknown custom expression and a look-at rotation, all over one second.
///
/// `hips_height` places the file's hips; `hips_rest` rotates them at rest.
pub fn vrma_builder(hips_height: f32, hips_rest: [f32; 4]) -> (GltfBuilder, Layout) {
    init_logging();
    let mut builder = GltfBuilder::new();
    let mut nodes = BTreeMap::new();

    let root = builder.node("root", None, [0.0; 3]);
    let hips = builder.node("hips", Some(root), [0.0, hips_height, 0.0]);
    builder.rotate(hips, hips_rest);
    let spine = builder.node("spine", Some(hips), [0.0, 0.1, 0.0]);
    let head = builder.node("head", Some(spine), [0.0, 0.4, 0.0]);
    let happy = builder.node("happy", None, [0.0; 3]);
    let custom = builder.node("custom_missing", None, [0.0; 3]);
    let look_at = builder.node("lookAt", None, [0.0; 3]);

    for (name, index) in [
        ("root", root),
        ("hips", hips),
        ("spine", spine),
        ("head", head),
        ("happy", happy),
        ("custom_missing", custom),
        ("lookAt", look_at),
    ] {
        nodes.insert(name, index);
    }

    builder.extension(
        "VRMC_vrm_animation",
        json!({
            "specVersion": "1.0",
            "humanoid": {
                "humanBones": {
                    "hips": { "node": hips },
                    "spine": { "node": spine },
                    "head": { "node": head },
                    "tail": { "node": root },
                },
            },
            "expressions": {
                "preset": { "happy": { "node": happy } },
                "custom": { "custom_missing": { "node": custom } },
            },
            "lookAt": { "node": look_at },
        }),
    );

    let swing = rotation_y(0.5);
    let look = rotation_y(0.3);
    builder.animation(
        Some(ANIMATION_NAME),
        vec![
            Channel::linear(
                hips,
                "translation",
                vec![0.0, 1.0],
                vec![0.0, hips_height, 0.0, 0.2, hips_height, 0.0],
            ),
            Channel::linear(
                hips,
                "rotation",
                vec![0.0, 1.0],
                [hips_rest, hips_rest].concat(),
            ),
            Channel::linear(spine, "rotation", vec![0.0, 1.0], [[0.0, 0.0, 0.0, 1.0], swing].concat()),
            Channel::linear(spine, "scale", vec![0.0, 1.0], vec![1.0, 1.0, 1.0, 1.0, 1.0, 1.0]),
            Channel::linear(happy, "translation", vec![0.0, 1.0], vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0]),
            Channel::linear(custom, "translation", vec![0.0, 1.0], vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0]),
            Channel::linear(look_at, "rotation", vec![0.0, 1.0], [[0.0, 0.0, 0.0, 1.0], look].concat()),
        ],
    );

    (builder, Layout { nodes })
}
