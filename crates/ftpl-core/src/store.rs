/*
 * store.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template storage.
//!
//! A [`TemplateStore`] is the root of all template files: every directive
//! reference is resolved to a [`ResourceId`] relative to it. The filesystem
//! store backs deployed templates; the memory store backs tests and templates
//! bundled into the application.

use crate::error::{TemplateError, TemplateResult};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Identifier of a template resource: a normalized, `/`-separated path
/// relative to the store root (e.g. `"includes/geometry.json"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Wrap an already normalized store-relative path.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The directory part of this identifier, `""` for resources at the root.
    pub fn parent_dir(&self) -> &str {
        match self.0.rfind('/') {
            Some(pos) => &self.0[..pos],
            None => "",
        }
    }

    /// File extension, if any.
    pub fn extension(&self) -> Option<&str> {
        let file = self.0.rsplit('/').next().unwrap_or(&self.0);
        file.rsplit_once('.').map(|(_, ext)| ext)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Backing storage for template resources.
///
/// Implementations must be shareable across request threads: the reload
/// watcher of a compiled template keeps a handle to its store.
pub trait TemplateStore: Send + Sync {
    /// Whether the resource exists.
    fn exists(&self, id: &ResourceId) -> bool;

    /// Load the resource's source text.
    fn read(&self, id: &ResourceId) -> TemplateResult<String>;

    /// Current modification time, or `None` if the resource is gone.
    fn last_modified(&self, id: &ResourceId) -> Option<SystemTime>;
}

/// Store that reads templates from a directory on disk.
#[derive(Debug, Clone)]
pub struct FileSystemStore {
    root: PathBuf,
}

impl FileSystemStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of a resource on disk.
    pub fn path_of(&self, id: &ResourceId) -> PathBuf {
        id.as_str()
            .split('/')
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }
}

impl TemplateStore for FileSystemStore {
    fn exists(&self, id: &ResourceId) -> bool {
        self.path_of(id).is_file()
    }

    fn read(&self, id: &ResourceId) -> TemplateResult<String> {
        std::fs::read_to_string(self.path_of(id)).map_err(|source| TemplateError::Io {
            resource: id.clone(),
            source: Arc::new(source),
        })
    }

    fn last_modified(&self, id: &ResourceId) -> Option<SystemTime> {
        std::fs::metadata(self.path_of(id))
            .and_then(|m| m.modified())
            .ok()
    }
}

#[derive(Debug, Clone)]
struct MemoryResource {
    content: String,
    modified: SystemTime,
}

/// Store holding templates in memory.
///
/// Modification times come from a logical clock that advances on every
/// write, so touching a resource is always observable.
#[derive(Debug, Default)]
pub struct MemoryStore {
    resources: RwLock<HashMap<ResourceId, MemoryResource>>,
    clock: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with the given resources.
    pub fn with_resources(
        resources: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        let store = Self::new();
        for (id, content) in resources {
            store.insert(id, content);
        }
        store
    }

    /// Add or replace a resource.
    pub fn insert(&self, id: impl Into<String>, content: impl Into<String>) {
        let modified = self.tick();
        self.resources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                ResourceId::new(id),
                MemoryResource {
                    content: content.into(),
                    modified,
                },
            );
    }

    /// Bump a resource's modification time without changing its content.
    ///
    /// Returns `false` if the resource does not exist.
    pub fn touch(&self, id: &str) -> bool {
        let modified = self.tick();
        let mut resources = self.resources.write().unwrap_or_else(PoisonError::into_inner);
        match resources.get_mut(&ResourceId::new(id)) {
            Some(resource) => {
                resource.modified = modified;
                true
            }
            None => false,
        }
    }

    /// Remove a resource, returning whether it existed.
    pub fn remove(&self, id: &str) -> bool {
        self.resources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&ResourceId::new(id))
            .is_some()
    }

    fn tick(&self) -> SystemTime {
        let millis = self.clock.fetch_add(1, Ordering::SeqCst) + 1;
        UNIX_EPOCH + Duration::from_millis(millis)
    }
}

impl TemplateStore for MemoryStore {
    fn exists(&self, id: &ResourceId) -> bool {
        self.resources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    fn read(&self, id: &ResourceId) -> TemplateResult<String> {
        self.resources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .map(|r| r.content.clone())
            .ok_or_else(|| TemplateError::Io {
                resource: id.clone(),
                source: Arc::new(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no such template",
                )),
            })
    }

    fn last_modified(&self, id: &ResourceId) -> Option<SystemTime> {
        self.resources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .map(|r| r.modified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_id_parts() {
        let id = ResourceId::new("includes/geom/point.json");
        assert_eq!(id.parent_dir(), "includes/geom");
        assert_eq!(id.extension(), Some("json"));

        let id = ResourceId::new("root.xml");
        assert_eq!(id.parent_dir(), "");
        assert_eq!(id.extension(), Some("xml"));

        assert_eq!(ResourceId::new("dir.d/noext").extension(), None);
    }

    #[test]
    fn test_memory_store_touch_advances_clock() {
        let store = MemoryStore::with_resources([("a.json", "{}")]);
        let id = ResourceId::new("a.json");
        let before = store.last_modified(&id).unwrap();

        assert!(store.touch("a.json"));
        assert!(store.last_modified(&id).unwrap() > before);
        assert!(!store.touch("missing.json"));
    }

    #[test]
    fn test_memory_store_read_missing() {
        let store = MemoryStore::new();
        let err = store.read(&ResourceId::new("nope.json")).unwrap_err();
        assert!(matches!(err, TemplateError::Io { .. }));
    }

    #[test]
    fn test_memory_store_remove() {
        let store = MemoryStore::with_resources([("a.json", "{}")]);
        assert!(store.remove("a.json"));
        assert!(!store.exists(&ResourceId::new("a.json")));
        assert!(store.last_modified(&ResourceId::new("a.json")).is_none());
    }

    #[test]
    fn test_filesystem_store() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("x.json"), "[1]").unwrap();

        let store = FileSystemStore::new(dir.path());
        let id = ResourceId::new("sub/x.json");
        assert!(store.exists(&id));
        assert_eq!(store.read(&id).unwrap(), "[1]");
        assert!(store.last_modified(&id).is_some());
        assert!(!store.exists(&ResourceId::new("sub")));
    }
}
