//! Error Types
//!
//! This module defines the error types used throughout the crate.
//!
//! # Overview
//!
//! The main error type [`AnimaError`] covers the failure modes of loading
//! and assembling an avatar:
//! - File and network I/O
//! - glTF / JSON / base64 decoding
//! - Missing or malformed VRM extension data
//!
//! Per-frame updates (spring bones, expressions, humanoid) never return
//! errors: malformed configuration is logged and skipped at build time.
//!
//! # Usage
//!
//! ```rust,ignore
//! use anima::errors::Result;
//!
//! fn load_avatar(bytes: &[u8]) -> Result<anima::vrm::Vrm> {
//!     anima::vrm::VrmLoader::load_slice(bytes, None)
//! }
//! ```

use thiserror::Error;

/// The main error type for the crate.
#[derive(Error, Debug)]
pub enum AnimaError {
    // ========================================================================
    // Asset Loading Errors
    // ========================================================================
    /// The requested asset was not found.
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    // ========================================================================
    // I/O Errors
    // ========================================================================
    /// File I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    // ========================================================================
    // HTTP & Network Errors
    // ========================================================================
    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// URL parsing error.
    #[cfg(feature = "http")]
    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    /// HTTP response error with status code.
    #[error("HTTP response error: status {status}")]
    HttpResponseError {
        /// HTTP status code
        status: u16,
    },

    // ========================================================================
    // Format & Parsing Errors
    // ========================================================================
    /// glTF parsing or loading error.
    #[error("glTF error: {0}")]
    GltfError(String),

    /// Data URI parsing error.
    #[error("Data URI error: {0}")]
    DataUriError(String),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Base64 decoding error.
    #[error("Base64 decode error: {0}")]
    Base64Error(#[from] base64::DecodeError),

    // ========================================================================
    // VRM Errors
    // ========================================================================
    /// The file does not carry the extension a loader expects.
    #[error("Missing glTF extension: {0}")]
    MissingExtension(String),

    /// The extension exists but its content cannot be used.
    #[error("Invalid VRM data: {0}")]
    InvalidVrm(String),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Bad command-line argument or setting.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ========================================================================
    // Async & Threading Errors
    // ========================================================================
    /// Task join error (when async tasks fail to complete).
    #[error("Task join error: {0}")]
    TaskJoinError(String),

    // ========================================================================
    // Platform-Specific Errors
    // ========================================================================
    /// Feature not enabled.
    #[error("Feature not enabled: {0}")]
    FeatureNotEnabled(String),
}

// ============================================================================
// Convenient conversion implementations
// ============================================================================

impl From<gltf::Error> for AnimaError {
    fn from(err: gltf::Error) -> Self {
        AnimaError::GltfError(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AnimaError {
    fn from(err: tokio::task::JoinError) -> Self {
        AnimaError::TaskJoinError(err.to_string())
    }
}

/// Alias for `Result<T, AnimaError>`.
pub type Result<T> = std::result::Result<T, AnimaError>;
