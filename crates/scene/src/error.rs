use std::path::PathBuf;

use thiserror::Error;

use crate::model::BlobKind;

/// Errors raised while decoding, building or persisting a scene.
#[derive(Debug, Error)]
pub enum SceneError {
    /// A blob is truncated, malformed or references something out of range.
    /// The load is aborted and any previously loaded scene stays in place.
    #[error("corrupt {blob} data: {reason}")]
    CorruptSceneData { blob: BlobKind, reason: String },

    /// The header blob was written by an encoder this build does not know.
    #[error("unsupported scene header version {found} (expected {expected})")]
    UnsupportedHeaderVersion { found: u8, expected: u8 },

    #[error("scene `{0}` not found")]
    NotFound(String),

    #[error("missing `{blob}` blob for scene `{scene}`")]
    MissingBlob { scene: String, blob: BlobKind },

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SceneError {
    pub(crate) fn corrupt(blob: BlobKind, reason: impl Into<String>) -> Self {
        SceneError::CorruptSceneData {
            blob,
            reason: reason.into(),
        }
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, SceneError::CorruptSceneData { .. })
    }
}
