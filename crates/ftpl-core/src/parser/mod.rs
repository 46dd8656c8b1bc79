/*
 * parser/mod.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Recursive template parsing.
//!
//! Both parsers load a root template and expand every `$include`,
//! `$includeFlat` and `$merge` directive depth-first. The chain of resources
//! being expanded is threaded explicitly through the recursion so cycles and
//! runaway nesting are reported with the full chain, and every resource read
//! is recorded with its modification time for reload detection.

mod json;
mod xml;

pub use json::JsonTemplateParser;
pub use xml::XmlTemplateParser;

use crate::directive::Directive;
use crate::error::{TemplateError, TemplateResult};
use crate::resolver::{ResourceResolver, resolve_reference};
use crate::store::{ResourceId, TemplateStore};
use std::collections::{BTreeMap, BTreeSet};
use std::time::SystemTime;

/// Default bound on the length of the inclusion chain, root included.
pub const DEFAULT_MAX_DEPTH: usize = 51;

/// Resources consulted during one resolution, with the modification time
/// observed when each was read.
pub type WatchedResources = BTreeMap<ResourceId, Option<SystemTime>>;

/// Resources a resolution referenced that did not exist at the time.
pub type MissingResources = BTreeSet<ResourceId>;

/// The resources currently being expanded, outermost first.
#[derive(Debug, Clone)]
pub struct InclusionChain {
    entries: Vec<ResourceId>,
    max_depth: usize,
}

impl InclusionChain {
    pub fn new(root: ResourceId, max_depth: usize) -> Self {
        Self {
            entries: vec![root],
            max_depth,
        }
    }

    /// Start expanding `id`, failing on a cycle or when too deep.
    pub fn enter(&mut self, id: ResourceId) -> TemplateResult<()> {
        if self.entries.contains(&id) {
            let mut chain = self.entries.clone();
            chain.push(id);
            return Err(TemplateError::CyclicInclusion { chain });
        }
        if self.entries.len() >= self.max_depth {
            let mut chain = self.entries.clone();
            chain.push(id);
            return Err(TemplateError::ExpansionDepthExceeded {
                max_depth: self.max_depth,
                chain,
            });
        }
        self.entries.push(id);
        Ok(())
    }

    /// Finish expanding the innermost resource.
    pub fn leave(&mut self) {
        if self.entries.len() > 1 {
            self.entries.pop();
        }
    }

    /// The resource whose content is being expanded.
    pub fn current(&self) -> &ResourceId {
        // The root entry is never popped
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[ResourceId] {
        &self.entries
    }
}

/// Byte offsets at which the lines of a source text start.
#[derive(Debug, Clone)]
pub(crate) struct LineIndex(Vec<usize>);

impl LineIndex {
    pub fn new(source: &str) -> Self {
        Self(
            std::iter::once(0)
                .chain(source.match_indices('\n').map(|(pos, _)| pos + 1))
                .collect(),
        )
    }

    /// 1-based line holding the byte at `offset`.
    pub fn line(&self, offset: usize) -> usize {
        self.0.partition_point(|&start| start <= offset)
    }
}

/// State shared by one top-level resolution pass.
struct Resolution<'a> {
    store: &'a dyn TemplateStore,
    chain: InclusionChain,
    /// Line tables of the resources on the chain, innermost last.
    lines: Vec<LineIndex>,
    watched: WatchedResources,
    missing: MissingResources,
}

impl<'a> Resolution<'a> {
    fn new(store: &'a dyn TemplateStore, root: &ResourceId, max_depth: usize) -> Self {
        Self {
            store,
            chain: InclusionChain::new(root.clone(), max_depth),
            lines: Vec::new(),
            watched: WatchedResources::new(),
            missing: MissingResources::new(),
        }
    }

    /// Read the root template, recording it as watched.
    fn read_root(&mut self) -> TemplateResult<String> {
        let root = self.chain.current().clone();
        if !self.store.exists(&root) {
            self.missing.insert(root.clone());
            return Err(TemplateError::ResourceNotFound {
                directive: "template",
                reference: root.to_string(),
            });
        }
        self.read(&root)
    }

    fn read(&mut self, id: &ResourceId) -> TemplateResult<String> {
        // Stat before reading: a change racing the read shows up as stale
        let modified = self.store.last_modified(id);
        let source = self.store.read(id)?;
        self.watched.insert(id.clone(), modified);
        self.lines.push(LineIndex::new(&source));
        Ok(source)
    }

    /// Resolve `reference` from the current resource and expand its content.
    ///
    /// `expand` receives the resource's source text while the resource is on
    /// the chain, so nested directives resolve relative to it.
    fn load<T>(
        &mut self,
        reference: &str,
        directive: Directive,
        expand: impl FnOnce(&mut Self, &ResourceId, String) -> TemplateResult<T>,
    ) -> TemplateResult<T> {
        let id = match ResourceResolver::new(self.store).resolve(self.chain.current(), reference, directive) {
            Ok(id) => id,
            Err(err) => {
                // Creating the resource later is a change worth reacting to
                if let Ok(id) = resolve_reference(self.chain.current(), reference) {
                    self.missing.insert(id);
                }
                return Err(err);
            }
        };
        tracing::debug!(
            directive = directive.as_str(),
            from = %self.chain.current(),
            resource = %id,
            depth = self.chain.entries().len(),
            "Expanding template directive"
        );

        self.chain.enter(id.clone())?;
        let source = self.read(&id)?;
        let expanded = expand(self, &id, source)?;
        self.chain.leave();
        self.lines.pop();
        Ok(expanded)
    }

    fn invalid_directive(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::InvalidDirective {
            resource: self.chain.current().clone(),
            line: None,
            message: message.into(),
        }
    }

    /// An invalid directive at byte `offset` of the current resource.
    fn invalid_directive_at(&self, offset: usize, message: impl Into<String>) -> TemplateError {
        TemplateError::InvalidDirective {
            resource: self.chain.current().clone(),
            line: self.lines.last().map(|lines| lines.line(offset)),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(path: &str) -> ResourceId {
        ResourceId::new(path)
    }

    #[test]
    fn test_chain_detects_cycle() {
        let mut chain = InclusionChain::new(id("a.json"), DEFAULT_MAX_DEPTH);
        chain.enter(id("b.json")).unwrap();
        let err = chain.enter(id("a.json")).unwrap_err();
        match err {
            TemplateError::CyclicInclusion { chain } => {
                assert_eq!(chain, vec![id("a.json"), id("b.json"), id("a.json")]);
            }
            other => panic!("expected a cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_chain_depth_bound() {
        let mut chain = InclusionChain::new(id("0.json"), 3);
        chain.enter(id("1.json")).unwrap();
        chain.enter(id("2.json")).unwrap();
        let err = chain.enter(id("3.json")).unwrap_err();
        assert!(matches!(
            err,
            TemplateError::ExpansionDepthExceeded { max_depth: 3, ref chain } if chain.len() == 4
        ));
    }

    #[test]
    fn test_line_index() {
        let lines = LineIndex::new("<a>\n  <b/>\n</a>");
        assert_eq!(lines.line(0), 1);
        assert_eq!(lines.line(3), 1);
        assert_eq!(lines.line(4), 2);
        assert_eq!(lines.line(12), 3);
    }

    #[test]
    fn test_chain_leave_keeps_root() {
        let mut chain = InclusionChain::new(id("root.json"), DEFAULT_MAX_DEPTH);
        chain.enter(id("child.json")).unwrap();
        assert_eq!(chain.current(), &id("child.json"));
        chain.leave();
        chain.leave();
        assert_eq!(chain.current(), &id("root.json"));
        // The same resource may be included again once it left the chain
        chain.enter(id("child.json")).unwrap();
    }
}
