//! Registry backends that hold mapping resources by location.
//!
//! Locations follow the registry convention: `conf:path` is read from the
//! configuration registry, `gov:path` from the governance registry, and a bare
//! path is relative to the configuration registry.

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use parking_lot::RwLock;

use super::ResourceError;

/// Source of raw resource documents.
pub trait ResourceRegistry: Send + Sync {
    /// Fetch the document stored at `location`.
    fn fetch(&self, location: &str) -> Result<String, ResourceError>;
}

/// Registry laid out on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileSystemRegistry {
    config_root: PathBuf,
    governance_root: PathBuf,
}

impl FileSystemRegistry {
    pub fn new(config_root: impl Into<PathBuf>, governance_root: impl Into<PathBuf>) -> Self {
        Self {
            config_root: config_root.into(),
            governance_root: governance_root.into(),
        }
    }

    /// Map a registry location onto a file path.
    pub fn resolve_path(&self, location: &str) -> Result<PathBuf, ResourceError> {
        let (root, relative) = if let Some(rest) = location.strip_prefix("conf:") {
            (&self.config_root, rest)
        } else if let Some(rest) = location.strip_prefix("gov:") {
            (&self.governance_root, rest)
        } else {
            (&self.config_root, location)
        };

        let relative = Path::new(relative.trim_start_matches('/'));
        let escapes_root = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes_root || relative.as_os_str().is_empty() {
            return Err(ResourceError::UnsupportedLocation(location.to_string()));
        }

        Ok(root.join(relative))
    }
}

impl ResourceRegistry for FileSystemRegistry {
    fn fetch(&self, location: &str) -> Result<String, ResourceError> {
        let path = self.resolve_path(location)?;
        fs::read_to_string(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ResourceError::NotFound(location.to_string())
            } else {
                ResourceError::Io {
                    location: location.to_string(),
                    source,
                }
            }
        })
    }
}

/// Registry held in memory; used by tests and by embedders that load
/// resources themselves.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, location: impl Into<String>, content: impl Into<String>) {
        self.entries.write().insert(location.into(), content.into());
    }

    pub fn with_entry(self, location: impl Into<String>, content: impl Into<String>) -> Self {
        self.insert(location, content);
        self
    }
}

impl ResourceRegistry for InMemoryRegistry {
    fn fetch(&self, location: &str) -> Result<String, ResourceError> {
        self.entries
            .read()
            .get(location)
            .cloned()
            .ok_or_else(|| ResourceError::NotFound(location.to_string()))
    }
}
