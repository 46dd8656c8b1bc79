/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Feature template resolution and compilation.
//!
//! Feature templates describe how features are written out as GeoJSON or
//! GML. A template may be split across many files, stitched together with
//! three directives:
//!
//! - `$include`: replace the directive with the content of another file
//! - `$includeFlat`: splice the content of another file into the enclosing
//!   object or array, without an extra nesting level
//! - `$merge`: deep-merge the enclosing object over a base file
//!
//! XML templates express the same directives as `gft:include`,
//! `gft:includeFlat` and `gft:merge` elements.
//!
//! # Architecture
//!
//! - [`TemplateStore`]: where template files live ([`FileSystemStore`],
//!   [`MemoryStore`])
//! - [`ResourceResolver`]: turns a directive's path into a [`ResourceId`]
//! - [`JsonTemplateParser`] / [`XmlTemplateParser`]: expand every directive,
//!   recording each file read
//! - [`merge_trees`] / [`merge_elements`]: the `$merge` semantics
//! - [`JsonTemplateReader`] / [`XmlTemplateReader`]: compile the expanded
//!   document into a [`RootBuilder`]
//! - [`ReloadWatcher`]: tells whether a compiled tree went stale
//! - [`TemplateCompiler`] and [`TemplateCache`]: the whole pipeline, and a
//!   cache that recompiles stale trees once
//!
//! # Example
//!
//! ```rust
//! use ftpl_core::{CompileConfig, EnvironmentParams, MemoryStore, ResourceId, TemplateCompiler};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::with_resources([
//!     ("feature.json", r#"{"type": "Feature", "properties": "$include{props.json}"}"#),
//!     ("props.json", r#"{"name": "${STATE_NAME}"}"#),
//! ]));
//!
//! let compiler = TemplateCompiler::new(store, CompileConfig::default());
//! let root = compiler
//!     .compile(&ResourceId::new("feature.json"), &EnvironmentParams::new())
//!     .unwrap();
//!
//! assert_eq!(root.children().len(), 2);
//! assert!(!root.needs_reload());
//! ```

pub mod builder;
pub mod cache;
pub mod compile;
pub mod config;
pub mod directive;
pub mod error;
pub mod expression;
pub mod merge;
pub mod namespace;
pub mod parser;
pub mod reader;
pub mod resolver;
pub mod store;
pub mod watcher;

pub use builder::{
    AttributeBuilder, AttributeValue, Builder, ContainerBuilder, DynamicBuilder,
    DynamicMergeBuilder, EncodingHints, FlatBuilder, KeySpec, NamespaceBinding, RootBuilder,
    StaticBuilder, TemplateOptions,
};
pub use cache::TemplateCache;
pub use compile::{CompileFailure, ResolvedTemplate, TemplateCompiler, TemplateFormat};
pub use config::CompileConfig;
pub use directive::Directive;
pub use error::{TemplateError, TemplateResult};
pub use expression::EnvironmentParams;
pub use merge::{merge_elements, merge_trees};
pub use namespace::NamespaceSupport;
pub use parser::{
    DEFAULT_MAX_DEPTH, InclusionChain, JsonTemplateParser, MissingResources, WatchedResources,
    XmlTemplateParser,
};
pub use reader::{JsonTemplateReader, ReaderConfig, XmlTemplateReader};
pub use resolver::ResourceResolver;
pub use store::{FileSystemStore, MemoryStore, ResourceId, TemplateStore};
pub use watcher::ReloadWatcher;
