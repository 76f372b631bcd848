//! Error Types
//!
//! The main error type [`TalosError`] covers all failure modes of the
//! scene-editing core:
//! - Asset parsing and decoding errors
//! - File I/O errors
//! - Lookup failures against the scene store
//!
//! All fallible public APIs return [`Result<T>`], an alias for
//! `std::result::Result<T, TalosError>`.

use thiserror::Error;

/// The main error type for the talos core.
#[derive(Error, Debug)]
pub enum TalosError {
    // ========================================================================
    // Asset Loading Errors
    // ========================================================================
    /// The requested asset was not found.
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    /// Asset index out of bounds.
    #[error("Asset index out of bounds: {context} (index: {index})")]
    AssetIndexOutOfBounds {
        /// Description of what was being accessed
        context: String,
        /// The invalid index
        index: usize,
    },

    /// Malformed or internally inconsistent asset data.
    #[error("Invalid asset data: {0}")]
    InvalidData(String),

    // ========================================================================
    // I/O Errors
    // ========================================================================
    /// File I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    // ========================================================================
    // Format & Parsing Errors
    // ========================================================================
    /// glTF parsing or loading error.
    #[error("glTF error: {0}")]
    GltfError(String),

    /// Image decoding error.
    #[error("Image decode error: {0}")]
    ImageDecodeError(String),
}

// ============================================================================
// Convenient conversion implementations
// ============================================================================

impl From<image::ImageError> for TalosError {
    fn from(err: image::ImageError) -> Self {
        TalosError::ImageDecodeError(err.to_string())
    }
}

impl From<gltf::Error> for TalosError {
    fn from(err: gltf::Error) -> Self {
        TalosError::GltfError(err.to_string())
    }
}

/// Alias for `Result<T, TalosError>`.
pub type Result<T> = std::result::Result<T, TalosError>;
