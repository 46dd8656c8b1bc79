/*
 * resolver.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Resolution of directive references to template resources.
//!
//! Path rules:
//! - `object.json`, `sub/object.json`: relative to the directory of the
//!   referencing template
//! - `/shared/object.json`: anchored at the store root; `..` segments are
//!   allowed here as long as they stay inside the store
//! - `../object.json`: rejected, relative references may not climb

use crate::directive::Directive;
use crate::error::{TemplateError, TemplateResult};
use crate::store::{ResourceId, TemplateStore};

/// Marker that anchors a reference at the template store root.
pub const ROOT_ANCHOR: char = '/';

/// Resolves directive references against a template store.
pub struct ResourceResolver<'a> {
    store: &'a dyn TemplateStore,
}

impl<'a> ResourceResolver<'a> {
    pub fn new(store: &'a dyn TemplateStore) -> Self {
        Self { store }
    }

    /// Resolve `reference`, found in `base`, to an existing resource.
    pub fn resolve(
        &self,
        base: &ResourceId,
        reference: &str,
        directive: Directive,
    ) -> TemplateResult<ResourceId> {
        let id = resolve_reference(base, reference)?;
        if self.store.exists(&id) {
            return Ok(id);
        }

        Err(match directive {
            Directive::Merge => TemplateError::MergeTargetMissing {
                reference: reference.to_string(),
            },
            Directive::Include | Directive::IncludeFlat => TemplateError::ResourceNotFound {
                directive: directive.as_str(),
                reference: reference.to_string(),
            },
        })
    }
}

/// Compute the identifier a reference points at, without touching the store.
pub fn resolve_reference(base: &ResourceId, reference: &str) -> TemplateResult<ResourceId> {
    let invalid = || TemplateError::InvalidPath {
        reference: reference.to_string(),
    };

    let normalized = reference.trim().replace('\\', "/");
    let (anchored, path) = match normalized.strip_prefix(ROOT_ANCHOR) {
        Some(rest) => (true, rest),
        None => (false, normalized.as_str()),
    };

    let mut segments: Vec<&str> = Vec::new();
    if !anchored {
        if path.split('/').any(|s| s == "..") {
            return Err(invalid());
        }
        segments.extend(base.parent_dir().split('/').filter(|s| !s.is_empty()));
    }

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop().ok_or_else(invalid)?;
            }
            segment => segments.push(segment),
        }
    }

    if segments.is_empty() {
        return Err(invalid());
    }

    Ok(ResourceId::new(segments.join("/")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn resolve(base: &str, reference: &str) -> TemplateResult<ResourceId> {
        resolve_reference(&ResourceId::new(base), reference)
    }

    #[test]
    fn test_relative_to_base_directory() {
        assert_eq!(
            resolve("templates/root.json", "object.json").unwrap(),
            ResourceId::new("templates/object.json")
        );
        assert_eq!(
            resolve("templates/root.json", "./sub/object.json").unwrap(),
            ResourceId::new("templates/sub/object.json")
        );
        assert_eq!(
            resolve("root.json", "object.json").unwrap(),
            ResourceId::new("object.json")
        );
    }

    #[test]
    fn test_parent_traversal_rejected() {
        let err = resolve("templates/sub/root.json", "../object.json").unwrap_err();
        assert!(
            matches!(err, TemplateError::InvalidPath { ref reference } if reference == "../object.json")
        );
        assert!(resolve("a/b.json", "x/../y.json").is_err());
    }

    #[test]
    fn test_root_anchored() {
        assert_eq!(
            resolve("templates/sub/root.json", "/shared/geom.json").unwrap(),
            ResourceId::new("shared/geom.json")
        );
        assert_eq!(
            resolve("templates/sub/root.json", "/templates/sub/../common.json").unwrap(),
            ResourceId::new("templates/common.json")
        );
    }

    #[test]
    fn test_root_anchored_cannot_escape_store() {
        assert!(matches!(
            resolve("root.json", "/../outside.json"),
            Err(TemplateError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_empty_reference() {
        assert!(resolve("root.json", "  ").is_err());
        assert!(resolve("root.json", "/").is_err());
    }

    #[test]
    fn test_missing_resources() {
        let store = MemoryStore::with_resources([("dir/present.json", "{}")]);
        let resolver = ResourceResolver::new(&store);
        let base = ResourceId::new("dir/root.json");

        assert_eq!(
            resolver
                .resolve(&base, "present.json", Directive::Include)
                .unwrap(),
            ResourceId::new("dir/present.json")
        );

        let err = resolver
            .resolve(&base, "absent.json", Directive::IncludeFlat)
            .unwrap_err();
        assert_eq!(err.to_string(), "$includeFlat path absent.json does not exist");

        let err = resolver
            .resolve(&base, "absent.json", Directive::Merge)
            .unwrap_err();
        assert!(matches!(err, TemplateError::MergeTargetMissing { .. }));
    }
}
