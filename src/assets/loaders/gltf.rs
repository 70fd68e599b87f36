use std::any::{Any, TypeId};
use std::fmt;
use std::path::Path;

use base64::Engine as _;
use glam::{Quat, Vec3};
use gltf::json::Path as JsonPath;
use gltf::json::validation::{Error as ValidationError, Validate};
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::animation::binding::TargetPath;
use crate::animation::clip::{AnimationClip, Track, TrackData};
use crate::animation::tracks::{InterpolationMode, KeyframeTrack};
use crate::animation::values::{MAX_MORPH_TARGETS, MorphWeightData};
use crate::errors::{AnimaError, Result};
use crate::scene::{NodeHandle, Scene};

// ============================================================================
// 1. Loaded asset
// ============================================================================

/// Type-keyed storage extension parsers use to hand their results over to
/// whoever consumes the asset.
#[derive(Default)]
pub struct UserData {
    entries: FxHashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl UserData {
    /// Stores `value`, replacing any previous value of the same type.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) {
        self.entries.insert(TypeId::of::<T>(), Box::new(value));
    }

    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|b| b.downcast_ref::<T>())
    }

    /// Removes and returns the value of type `T`.
    pub fn take<T: Any + Send + Sync>(&mut self) -> Option<T> {
        self.entries
            .remove(&TypeId::of::<T>())
            .and_then(|b| b.downcast::<T>().ok())
            .map(|b| *b)
    }

    #[must_use]
    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }
}

impl fmt::Debug for UserData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserData")
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// An animation as read from the file. `target_nodes[i]` is the glTF node
/// index animated by `clip.tracks[i]`.
#[derive(Debug, Clone)]
pub struct GltfAnimation {
    pub clip: AnimationClip,
    pub target_nodes: Vec<usize>,
}

/// Result of a glTF load: the node hierarchy, animations, the raw root JSON
/// and whatever the extension parsers produced.
#[derive(Debug)]
pub struct GltfAsset {
    pub scene: Scene,
    /// Synthetic root every scene node hangs under.
    pub root: NodeHandle,
    /// glTF node index -> scene node
    pub node_mapping: Vec<NodeHandle>,
    /// glTF mesh index -> scene nodes instancing that mesh
    pub mesh_instances: Vec<Vec<NodeHandle>>,
    pub animations: Vec<GltfAnimation>,
    pub json: Value,
    pub user_data: UserData,
}

impl GltfAsset {
    /// Scene node for a glTF node index.
    #[must_use]
    pub fn node(&self, index: usize) -> Option<NodeHandle> {
        self.node_mapping.get(index).copied()
    }

    /// Scene nodes instancing the glTF mesh `index`.
    #[must_use]
    pub fn mesh_nodes(&self, index: usize) -> &[NodeHandle] {
        self.mesh_instances.get(index).map_or(&[], Vec::as_slice)
    }

    /// Root-level `extensions.<name>` object.
    #[must_use]
    pub fn extension(&self, name: &str) -> Option<&Value> {
        self.json.get("extensions")?.get(name)
    }

    /// Names of the root-level extension objects.
    pub fn root_extension_names(&self) -> impl Iterator<Item = &str> {
        self.json
            .get("extensions")
            .and_then(Value::as_object)
            .into_iter()
            .flat_map(|map| map.keys().map(String::as_str))
    }
}

// ============================================================================
// 2. Extension plugin seam
// ============================================================================

/// Hook for glTF extensions layered on top of the core document.
///
/// Parsers run after the scene and animations are built, in registration
/// order, and only if the file carries a root extension they handle.
pub trait GltfExtensionParser: Send {
    fn name(&self) -> &str;

    /// Whether this parser understands the root extension `extension`.
    fn handles(&self, extension: &str) -> bool {
        extension == self.name()
    }

    fn on_after_load(&mut self, asset: &mut GltfAsset) -> Result<()>;
}

// ============================================================================
// 3. GltfLoader
// ============================================================================

/// External buffer contents fetched ahead of parsing, keyed by their `uri`.
pub type ExternalBuffers = FxHashMap<String, Vec<u8>>;

#[derive(Default)]
pub struct GltfLoader {
    extensions: Vec<Box<dyn GltfExtensionParser>>,
    external_buffers: ExternalBuffers,
}

impl GltfLoader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            extensions: Vec::new(),
            external_buffers: ExternalBuffers::default(),
        }
    }

    /// Serves external buffers from memory instead of `base_path`.
    ///
    /// Used for sources that have no local directory, such as HTTP URLs.
    #[must_use]
    pub fn with_external_buffers(mut self, buffers: ExternalBuffers) -> Self {
        self.external_buffers = buffers;
        self
    }

    /// URIs of the buffers stored outside the document, i.e. neither in the
    /// GLB binary chunk nor in a data URI. Duplicates are dropped.
    pub fn external_buffer_uris(bytes: &[u8]) -> Result<Vec<String>> {
        let json = Self::read_root_json(bytes)?;
        let mut uris: Vec<String> = Vec::new();
        for buffer in json.get("buffers").and_then(Value::as_array).into_iter().flatten() {
            if let Some(uri) = buffer.get("uri").and_then(Value::as_str)
                && !uri.starts_with("data:")
                && !uris.iter().any(|known| known == uri)
            {
                uris.push(uri.to_string());
            }
        }
        Ok(uris)
    }

    #[must_use]
    pub fn with_extension(mut self, extension: impl GltfExtensionParser + 'static) -> Self {
        self.register_extension(Box::new(extension));
        self
    }

    pub fn register_extension(&mut self, extension: Box<dyn GltfExtensionParser>) {
        self.extensions.push(extension);
    }

    /// Loads a `.glb` / `.gltf` (and therefore `.vrm` / `.vrma`) from memory.
    ///
    /// External buffers are resolved against `base_path`; data URIs and the
    /// GLB binary chunk need no base path.
    pub fn load_slice(&mut self, bytes: &[u8], base_path: Option<&Path>) -> Result<GltfAsset> {
        let gltf = gltf::Gltf::from_slice_without_validation(bytes)?;
        Self::check_indices(&gltf)?;
        let json = Self::read_root_json(bytes)?;

        self.check_extensions(&gltf);

        let buffers = self.load_buffers(&gltf, base_path)?;

        // Step 1: nodes and transforms
        let mut scene = Scene::new();
        let mut node_mapping = Vec::with_capacity(gltf.nodes().count());
        for node in gltf.nodes() {
            node_mapping.push(Self::create_node(&mut scene, &node));
        }

        // Step 2: hierarchy
        let root = scene.create_node_with_name("gltf_root");
        scene.root_nodes.push(root);

        for node in gltf.nodes() {
            let parent_handle = node_mapping[node.index()];
            for child in node.children() {
                if let Some(&child_handle) = node_mapping.get(child.index()) {
                    scene.attach(child_handle, parent_handle);
                }
            }
        }

        if let Some(default_scene) = gltf.default_scene().or_else(|| gltf.scenes().next()) {
            for node in default_scene.nodes() {
                if let Some(&node_handle) = node_mapping.get(node.index()) {
                    scene.attach(node_handle, root);
                }
            }
        }

        // Step 3: mesh instances (morph target consumers)
        let mut mesh_instances = vec![Vec::new(); gltf.meshes().count()];
        for node in gltf.nodes() {
            if let Some(mesh) = node.mesh()
                && let Some(instances) = mesh_instances.get_mut(mesh.index())
            {
                instances.push(node_mapping[node.index()]);
            }
        }

        scene.update_matrix_world();

        // Step 4: animations
        let animations = Self::load_animations(&gltf, &buffers);

        let mut asset = GltfAsset {
            scene,
            root,
            node_mapping,
            mesh_instances,
            animations,
            json,
            user_data: UserData::default(),
        };

        // Step 5: extensions
        for extension in &mut self.extensions {
            let handled = asset.root_extension_names().any(|name| extension.handles(name));
            if handled {
                log::debug!("Running glTF extension parser '{}'", extension.name());
                extension.on_after_load(&mut asset)?;
            }
        }

        Ok(asset)
    }

    /// Rejects dangling references before the document is walked.
    ///
    /// Only out-of-range indices are fatal; the document accessors panic on
    /// them. Other validation errors are left to the individual stages.
    fn check_indices(gltf: &gltf::Gltf) -> Result<()> {
        let root = gltf.as_json();
        let mut dangling = Vec::new();
        root.validate(root, JsonPath::new, &mut |path, error| {
            if error == ValidationError::IndexOutOfBounds {
                dangling.push(path().to_string());
            }
        });

        if dangling.is_empty() {
            Ok(())
        } else {
            Err(AnimaError::GltfError(format!(
                "Index out of range at {}",
                dangling.join(", ")
            )))
        }
    }

    fn read_root_json(bytes: &[u8]) -> Result<Value> {
        if bytes.starts_with(b"glTF") {
            let glb = gltf::Glb::from_slice(bytes)?;
            Ok(serde_json::from_slice(&glb.json)?)
        } else {
            Ok(serde_json::from_slice(bytes)?)
        }
    }

    fn check_extensions(&self, gltf: &gltf::Gltf) {
        let supported = |name: &str| self.extensions.iter().any(|ext| ext.handles(name));

        let required_not_supported: Vec<_> = gltf
            .extensions_required()
            .filter(|ext| !supported(ext))
            .collect();
        if !required_not_supported.is_empty() {
            log::warn!("glTF file requires unsupported extensions: {required_not_supported:?}");
        }

        let used_not_supported: Vec<_> = gltf
            .extensions_used()
            .filter(|ext| !supported(ext))
            .collect();
        if !used_not_supported.is_empty() {
            log::debug!("glTF file uses extensions that will be ignored: {used_not_supported:?}");
        }
    }

    fn load_buffers(&self, gltf: &gltf::Gltf, base_path: Option<&Path>) -> Result<Vec<Vec<u8>>> {
        let mut buffer_data = Vec::new();
        for buffer in gltf.buffers() {
            let data = match buffer.source() {
                gltf::buffer::Source::Bin => gltf
                    .blob
                    .as_deref()
                    .map(<[u8]>::to_vec)
                    .ok_or_else(|| AnimaError::GltfError("Missing GLB binary chunk".to_string()))?,
                gltf::buffer::Source::Uri(uri) if uri.starts_with("data:") => decode_data_uri(uri)?,
                gltf::buffer::Source::Uri(uri) => {
                    if let Some(data) = self.external_buffers.get(uri) {
                        data.clone()
                    } else {
                        let Some(base) = base_path else {
                            return Err(AnimaError::AssetNotFound(format!(
                                "external buffer '{uri}' (no base path)"
                            )));
                        };
                        std::fs::read(base.join(uri))?
                    }
                }
            };

            if data.len() < buffer.length() {
                return Err(AnimaError::GltfError(format!(
                    "Buffer {} holds {} bytes, {} declared",
                    buffer.index(),
                    data.len(),
                    buffer.length()
                )));
            }
            buffer_data.push(data);
        }
        Ok(buffer_data)
    }

    fn create_node(scene: &mut Scene, node: &gltf::Node) -> NodeHandle {
        let node_name = node
            .name()
            .map_or_else(|| format!("Node_{}", node.index()), str::to_string);
        let handle = scene.create_node_with_name(&node_name);

        if let Some(engine_node) = scene.get_node_mut(handle) {
            let (t, r, s) = node.transform().decomposed();
            engine_node.transform.position = Vec3::from_array(t);
            engine_node.transform.rotation = Quat::from_array(r);
            engine_node.transform.scale = Vec3::from_array(s);

            if let Some(mesh) = node.mesh() {
                let target_count = mesh
                    .primitives()
                    .map(|p| p.morph_targets().count())
                    .max()
                    .unwrap_or(0);
                let defaults = node.weights().or_else(|| mesh.weights()).unwrap_or(&[]);

                engine_node.mesh = Some(mesh.index());
                engine_node.morph_weights = (0..target_count)
                    .map(|i| defaults.get(i).copied().unwrap_or(0.0))
                    .collect();
            }
        }

        handle
    }

    fn load_animations(gltf: &gltf::Gltf, buffers: &[Vec<u8>]) -> Vec<GltfAnimation> {
        use gltf::animation::util::ReadOutputs;

        let mut animations = Vec::new();

        for anim in gltf.animations() {
            let mut tracks = Vec::new();
            let mut target_nodes = Vec::new();

            for channel in anim.channels() {
                let reader = channel.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
                let gltf_node = channel.target().node();

                let node_name = gltf_node
                    .name()
                    .map_or_else(|| format!("Node_{}", gltf_node.index()), str::to_string);

                let (Some(inputs), Some(outputs)) = (reader.read_inputs(), reader.read_outputs()) else {
                    log::warn!(
                        "Animation {}: channel on '{}' has unreadable accessors; skipped",
                        anim.index(),
                        node_name
                    );
                    continue;
                };
                let times: Vec<f32> = inputs.collect();

                let interpolation = match channel.sampler().interpolation() {
                    gltf::animation::Interpolation::Linear => InterpolationMode::Linear,
                    gltf::animation::Interpolation::Step => InterpolationMode::Step,
                    gltf::animation::Interpolation::CubicSpline => InterpolationMode::CubicSpline,
                };

                let (target, data) = match outputs {
                    ReadOutputs::Translations(iter) => (
                        TargetPath::Translation,
                        TrackData::Vector3(KeyframeTrack::new(
                            times,
                            iter.map(Vec3::from_array).collect(),
                            interpolation,
                        )),
                    ),
                    ReadOutputs::Rotations(iter) => (
                        TargetPath::Rotation,
                        TrackData::Quaternion(KeyframeTrack::new(
                            times,
                            iter.into_f32().map(Quat::from_array).collect(),
                            interpolation,
                        )),
                    ),
                    ReadOutputs::Scales(iter) => (
                        TargetPath::Scale,
                        TrackData::Vector3(KeyframeTrack::new(
                            times,
                            iter.map(Vec3::from_array).collect(),
                            interpolation,
                        )),
                    ),
                    ReadOutputs::MorphTargetWeights(iter) => {
                        let weights: Vec<f32> = iter.into_f32().collect();
                        let frames = if interpolation == InterpolationMode::CubicSpline {
                            times.len() * 3
                        } else {
                            times.len()
                        };
                        (
                            TargetPath::Weights,
                            TrackData::MorphWeights(KeyframeTrack::new(
                                times,
                                pack_morph_weights(&weights, frames),
                                interpolation,
                            )),
                        )
                    }
                };

                tracks.push(Track::new(node_name, target, data));
                target_nodes.push(gltf_node.index());
            }

            let name = anim
                .name()
                .map_or_else(|| format!("Animation_{}", anim.index()), str::to_string);
            animations.push(GltfAnimation {
                clip: AnimationClip::new(name, tracks),
                target_nodes,
            });
        }

        animations
    }
}

/// Splits a flat weights accessor into one [`MorphWeightData`] per frame.
fn pack_morph_weights(weights: &[f32], frames: usize) -> Vec<MorphWeightData> {
    if frames == 0 {
        return Vec::new();
    }
    let per_frame = weights.len() / frames;
    let count = per_frame.min(MAX_MORPH_TARGETS);

    (0..frames)
        .map(|i| {
            let mut pod = MorphWeightData::default();
            let start = i * per_frame;
            pod.weights[..count].copy_from_slice(&weights[start..start + count]);
            pod
        })
        .collect()
}

/// Decodes a base64 `data:` URI.
fn decode_data_uri(uri: &str) -> Result<Vec<u8>> {
    let (header, payload) = uri
        .split_once(',')
        .ok_or_else(|| AnimaError::DataUriError("missing ',' separator".to_string()))?;
    if !header.ends_with(";base64") {
        return Err(AnimaError::DataUriError(format!(
            "unsupported data URI encoding: {header}"
        )));
    }
    Ok(base64::engine::general_purpose::STANDARD.decode(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_data_uri() {
        let bytes = decode_data_uri("data:application/octet-stream;base64,AAECAw==").unwrap();
        assert_eq!(bytes, vec![0, 1, 2, 3]);
        assert!(decode_data_uri("data:text/plain,hello").is_err());
        assert!(decode_data_uri("no-comma").is_err());
    }

    #[test]
    fn test_pack_morph_weights() {
        let packed = pack_morph_weights(&[0.1, 0.2, 0.3, 0.4], 2);
        assert_eq!(packed.len(), 2);
        assert!((packed[1].weights[0] - 0.3).abs() < 1e-6);
        assert!((packed[1].weights[1] - 0.4).abs() < 1e-6);
        assert!(pack_morph_weights(&[], 0).is_empty());
    }

    #[test]
    fn test_user_data_take() {
        let mut data = UserData::default();
        data.insert(42u32);
        assert_eq!(data.get::<u32>(), Some(&42));
        assert_eq!(data.take::<u32>(), Some(42));
        assert!(!data.contains::<u32>());
    }
}
