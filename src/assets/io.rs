use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::{AnimaError, Result};

/// Asynchronous byte source for model and animation files.
pub trait AssetReader: Send + Sync {
    /// Reads the resource at `uri`, relative to the reader's root.
    fn read_bytes(&self, uri: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
}

/// Reads files from a local directory.
pub struct FileAssetReader {
    root_path: PathBuf,
}

impl FileAssetReader {
    /// Accepts either a directory or a file path; for files the parent
    /// directory becomes the root.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let root_path = if path.is_file() || path.extension().is_some() {
            path.parent().unwrap_or(Path::new(".")).to_path_buf()
        } else {
            path.to_path_buf()
        };
        Self { root_path }
    }

    #[inline]
    #[must_use]
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }
}

impl AssetReader for FileAssetReader {
    async fn read_bytes(&self, uri: &str) -> Result<Vec<u8>> {
        let path = self.root_path.join(uri);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(AnimaError::AssetNotFound(path.display().to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Reads resources over HTTP(S).
#[cfg(feature = "http")]
pub struct HttpAssetReader {
    root_url: url::Url,
}

#[cfg(feature = "http")]
impl HttpAssetReader {
    pub fn new(url_str: &str) -> Result<Self> {
        let url = url::Url::parse(url_str)?;
        let root_url = if url.path().ends_with('/') {
            url
        } else {
            let mut u = url.clone();
            if let Ok(mut segments) = u.path_segments_mut() {
                segments.pop();
                segments.push("");
            }
            u
        };

        Ok(Self { root_url })
    }

    #[inline]
    #[must_use]
    pub fn root_url(&self) -> &url::Url {
        &self.root_url
    }
}

#[cfg(feature = "http")]
impl AssetReader for HttpAssetReader {
    async fn read_bytes(&self, uri: &str) -> Result<Vec<u8>> {
        let url = self.root_url.join(uri)?;
        let request = ehttp::Request::get(url.as_str());
        let response = ehttp::fetch_async(request)
            .await
            .map_err(AnimaError::HttpError)?;
        if !response.ok {
            return Err(AnimaError::HttpResponseError {
                status: response.status,
            });
        }
        Ok(response.bytes)
    }
}

/// Reader chosen from the shape of the source string.
///
/// An enum instead of a trait object keeps `read_bytes` a plain `async fn`.
#[derive(Clone)]
pub enum AssetReaderVariant {
    File(Arc<FileAssetReader>),
    #[cfg(feature = "http")]
    Http(Arc<HttpAssetReader>),
}

impl AssetReaderVariant {
    /// Picks the HTTP reader for `http://` / `https://` sources and the file
    /// reader otherwise.
    pub fn from_source(source: &str) -> Result<Self> {
        if is_remote(source) {
            #[cfg(feature = "http")]
            {
                Ok(Self::Http(Arc::new(HttpAssetReader::new(source)?)))
            }
            #[cfg(not(feature = "http"))]
            {
                Err(AnimaError::FeatureNotEnabled(
                    "http (enable it with `features = [\"http\"]`)".to_string(),
                ))
            }
        } else {
            Ok(Self::File(Arc::new(FileAssetReader::new(source))))
        }
    }

    pub async fn read_bytes(&self, uri: &str) -> Result<Vec<u8>> {
        match self {
            Self::File(r) => r.read_bytes(uri).await,
            #[cfg(feature = "http")]
            Self::Http(r) => r.read_bytes(uri).await,
        }
    }

    /// Directory external buffers are resolved against, for local sources.
    ///
    /// Remote sources return `None`; their external buffers are fetched with
    /// [`Self::read_bytes`] relative to the document URL instead.
    #[must_use]
    pub fn base_path(&self) -> Option<PathBuf> {
        match self {
            Self::File(r) => Some(r.root_path().to_path_buf()),
            #[cfg(feature = "http")]
            Self::Http(_) => None,
        }
    }

    /// File-name part of a path or URL.
    #[must_use]
    pub fn source_filename(source: &str) -> &str {
        if is_remote(source) {
            source.rsplit('/').next().unwrap_or(source)
        } else {
            Path::new(source)
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or(source)
        }
    }
}

#[inline]
fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}
