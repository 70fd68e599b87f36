//! Asset I/O and loaders.

pub mod io;
pub mod loaders;
pub mod server;

pub use io::{AssetReader, AssetReaderVariant, FileAssetReader};
#[cfg(feature = "http")]
pub use io::HttpAssetReader;
pub use loaders::{ExternalBuffers, GltfAnimation, GltfAsset, GltfExtensionParser, GltfLoader, UserData};
pub use server::AssetServer;
