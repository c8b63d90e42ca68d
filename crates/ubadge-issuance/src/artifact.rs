//! # Artifact Store
//!
//! Where assembled certificate documents are persisted. The orchestrator
//! only sees the [`ArtifactStore`] trait; the composition root picks an
//! implementation.
//!
//! - [`InMemoryArtifacts`] keeps documents in a map. Used in tests and when
//!   no artifact directory is configured.
//! - [`FsArtifacts`] writes documents under a root directory.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

/// Artifact persistence failures.
#[derive(Error, Debug)]
pub enum ArtifactError {
    /// The storage path escapes the store root or is otherwise unusable.
    #[error("invalid artifact path {path:?}")]
    InvalidPath {
        /// The rejected path.
        path: String,
    },

    /// Filesystem write failed.
    #[error("failed to write artifact {path:?}: {source}")]
    Io {
        /// The path being written.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Persists immutable artifacts and reports where they landed.
pub trait ArtifactStore: Send + Sync {
    /// Store `bytes` at `path`. `public` asks for world-readable access
    /// where the backend supports it. Returns the artifact's location.
    fn upload(&self, path: &str, bytes: &[u8], public: bool) -> Result<String, ArtifactError>;
}

/// Reject absolute paths and any `..` or root component.
fn validate_relative(path: &str) -> Result<&Path, ArtifactError> {
    let candidate = Path::new(path);
    let clean = !path.is_empty()
        && candidate
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if clean {
        Ok(candidate)
    } else {
        Err(ArtifactError::InvalidPath {
            path: path.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// A stored artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub bytes: Vec<u8>,
    pub public: bool,
}

/// Map-backed artifact store. Clones share contents.
#[derive(Debug, Clone, Default)]
pub struct InMemoryArtifacts {
    objects: Arc<RwLock<HashMap<String, StoredArtifact>>>,
}

impl InMemoryArtifacts {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The artifact stored at `path`.
    pub fn get(&self, path: &str) -> Option<StoredArtifact> {
        self.objects.read().get(path).cloned()
    }

    /// All stored paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.objects.read().keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Number of stored artifacts.
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArtifactStore for InMemoryArtifacts {
    fn upload(&self, path: &str, bytes: &[u8], public: bool) -> Result<String, ArtifactError> {
        validate_relative(path)?;
        self.objects.write().insert(
            path.to_string(),
            StoredArtifact {
                bytes: bytes.to_vec(),
                public,
            },
        );
        Ok(format!("memory://{path}"))
    }
}

// ---------------------------------------------------------------------------
// Filesystem
// ---------------------------------------------------------------------------

/// Writes artifacts beneath a root directory.
///
/// The returned location is `{public_base_url}/{path}` when a base URL is
/// configured (for a directory served by a static file server), otherwise
/// the absolute file path. The `public` flag has no filesystem meaning and
/// is only logged.
#[derive(Debug, Clone)]
pub struct FsArtifacts {
    root: PathBuf,
    public_base_url: Option<String>,
}

impl FsArtifacts {
    /// Store under `root`, creating directories as needed.
    pub fn new(root: impl Into<PathBuf>, public_base_url: Option<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArtifactStore for FsArtifacts {
    fn upload(&self, path: &str, bytes: &[u8], public: bool) -> Result<String, ArtifactError> {
        let relative = validate_relative(path)?;
        let target = self.root.join(relative);
        let io_err = |source| ArtifactError::Io {
            path: path.to_string(),
            source,
        };

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(&target, bytes).map_err(io_err)?;
        tracing::debug!(path, public, size = bytes.len(), "artifact written");

        Ok(match &self.public_base_url {
            Some(base) => format!("{base}/{path}"),
            None => target.display().to_string(),
        })
    }
}
