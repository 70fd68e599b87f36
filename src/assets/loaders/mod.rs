pub mod gltf;

pub use self::gltf::{ExternalBuffers, GltfAnimation, GltfAsset, GltfExtensionParser, GltfLoader, UserData};
