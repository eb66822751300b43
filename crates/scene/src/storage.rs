use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::{debug, info};

use crate::error::SceneError;
use crate::model::{BlobKind, SceneBlobs};

/// Six sibling files per scene, `{name}.{blob}`, each holding the exact
/// serializer output.
#[derive(Debug, Clone)]
pub struct SceneStorage {
    dir: PathBuf,
}

impl SceneStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn blob_path(&self, name: &str, kind: BlobKind) -> PathBuf {
        self.dir.join(format!("{name}.{}", kind.name()))
    }

    pub fn save(&self, name: &str, blobs: &SceneBlobs) -> Result<(), SceneError> {
        fs::create_dir_all(&self.dir).map_err(|source| SceneError::Io {
            path: self.dir.clone(),
            source,
        })?;
        for kind in BlobKind::ALL {
            let path = self.blob_path(name, kind);
            fs::write(&path, blobs.get(kind)).map_err(|source| SceneError::Io { path, source })?;
        }
        info!(scene = name, bytes = blobs.total_len(), dir = %self.dir.display(), "scene saved");
        Ok(())
    }

    /// Loads all six blobs. A scene without a header file does not exist; any
    /// other missing file is reported as such.
    pub fn load(&self, name: &str) -> Result<SceneBlobs, SceneError> {
        let mut blobs = SceneBlobs::default();
        for kind in BlobKind::ALL {
            let path = self.blob_path(name, kind);
            match fs::read(&path) {
                Ok(data) => blobs.set(kind, Bytes::from(data)),
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    return Err(match kind {
                        BlobKind::Header => SceneError::NotFound(name.to_owned()),
                        blob => SceneError::MissingBlob {
                            scene: name.to_owned(),
                            blob,
                        },
                    });
                }
                Err(source) => return Err(SceneError::Io { path, source }),
            }
        }
        debug!(scene = name, bytes = blobs.total_len(), "scene files read");
        Ok(blobs)
    }

    /// Names of all scenes with a header file, sorted.
    pub fn list(&self) -> Result<Vec<String>, SceneError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(SceneError::Io {
                    path: self.dir.clone(),
                    source,
                });
            }
        };

        let suffix = format!(".{}", BlobKind::Header.name());
        let names: BTreeSet<String> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let file_name = entry.file_name().into_string().ok()?;
                file_name.strip_suffix(&suffix).map(str::to_owned)
            })
            .filter(|name| !name.is_empty())
            .collect();
        Ok(names.into_iter().collect())
    }

    pub fn delete(&self, name: &str) -> Result<(), SceneError> {
        let mut found = false;
        for kind in BlobKind::ALL {
            let path = self.blob_path(name, kind);
            match fs::remove_file(&path) {
                Ok(()) => found = true,
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(source) => return Err(SceneError::Io { path, source }),
            }
        }
        if !found {
            return Err(SceneError::NotFound(name.to_owned()));
        }
        info!(scene = name, "scene deleted");
        Ok(())
    }
}
