use std::path::{Path, PathBuf};

use crate::assets::io::AssetReaderVariant;
use crate::assets::loaders::{ExternalBuffers, GltfAsset, GltfLoader};
use crate::errors::Result;
use crate::vrm::{Vrm, VrmLoader};
use crate::vrm_animation::{VrmAnimation, VrmAnimationLoader};

/// Async front door for loading models and animations.
///
/// Bytes are fetched on the async runtime; parsing runs on the blocking pool.
/// The server is lightweight and can be cloned freely.
#[derive(Debug, Clone, Default)]
pub struct AssetServer {
    root: Option<PathBuf>,
}

impl AssetServer {
    #[must_use]
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Resolves relative local sources against `root`.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    #[must_use]
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Loads a plain glTF / GLB file without any extension plugin.
    pub async fn load_gltf(&self, source: &str) -> Result<GltfAsset> {
        let fetched = self.read_source(source).await?;
        tokio::task::spawn_blocking(move || {
            fetched.parse(|mut loader, bytes, base_path| loader.load_slice(bytes, base_path))
        })
        .await?
    }

    /// Loads a `.vrm` model (VRM 1.0 or 0.x).
    pub async fn load_vrm(&self, source: &str) -> Result<Vrm> {
        let fetched = self.read_source(source).await?;
        let vrm = tokio::task::spawn_blocking(move || fetched.parse(VrmLoader::load_with)).await??;
        log::info!(
            "Loaded VRM '{}' ({:?}, {} nodes)",
            vrm.meta.name,
            vrm.meta.meta_version,
            vrm.scene.nodes.len()
        );
        Ok(vrm)
    }

    /// Loads every animation of a `.vrma` file.
    pub async fn load_vrm_animation(&self, source: &str) -> Result<Vec<VrmAnimation>> {
        let fetched = self.read_source(source).await?;
        let animations = tokio::task::spawn_blocking(move || fetched.parse(VrmAnimationLoader::load_with)).await??;
        log::info!("Loaded {} animation(s) from {source}", animations.len());
        Ok(animations)
    }

    async fn read_source(&self, source: &str) -> Result<FetchedSource> {
        let resolved = self.resolve(source);
        let reader = AssetReaderVariant::from_source(&resolved)?;
        let filename = AssetReaderVariant::source_filename(&resolved);

        log::debug!("Reading {resolved}");
        let bytes = reader.read_bytes(filename).await?;
        let base_path = reader.base_path();

        // Without a local directory the loader cannot open external buffers
        // itself; fetch them through the same reader.
        let mut external_buffers = ExternalBuffers::default();
        if base_path.is_none() {
            for uri in GltfLoader::external_buffer_uris(&bytes)? {
                log::debug!("Fetching external buffer {uri}");
                let data = reader.read_bytes(&uri).await?;
                external_buffers.insert(uri, data);
            }
        }

        Ok(FetchedSource {
            bytes,
            base_path,
            external_buffers,
        })
    }

    fn resolve(&self, source: &str) -> String {
        match &self.root {
            Some(root) if !source.contains("://") && Path::new(source).is_relative() => {
                root.join(source).to_string_lossy().into_owned()
            }
            _ => source.to_string(),
        }
    }
}

struct FetchedSource {
    bytes: Vec<u8>,
    base_path: Option<PathBuf>,
    external_buffers: ExternalBuffers,
}

impl FetchedSource {
    fn parse<T>(self, parse: impl FnOnce(GltfLoader, &[u8], Option<&Path>) -> Result<T>) -> Result<T> {
        let loader = GltfLoader::new().with_external_buffers(self.external_buffers);
        parse(loader, &self.bytes, self.base_path.as_deref())
    }
}
