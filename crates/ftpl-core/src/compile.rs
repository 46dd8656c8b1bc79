/*
 * compile.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! One-call resolution and compilation of a stored template.

use crate::builder::RootBuilder;
use crate::config::CompileConfig;
use crate::error::{TemplateError, TemplateResult};
use crate::expression::EnvironmentParams;
use crate::namespace::NamespaceSupport;
use crate::parser::{JsonTemplateParser, MissingResources, WatchedResources, XmlTemplateParser};
use crate::reader::{JsonTemplateReader, ReaderConfig, XmlTemplateReader};
use crate::store::{ResourceId, TemplateStore};
use crate::watcher::ReloadWatcher;
use ftpl_xml::XmlElement;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// Template syntax, chosen from the resource extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateFormat {
    Json,
    Xml,
}

impl TemplateFormat {
    /// `.xml` and `.gml` resources are XML templates, anything else JSON.
    pub fn of(template: &ResourceId) -> Self {
        match template.extension() {
            Some(ext) if ext.eq_ignore_ascii_case("xml") || ext.eq_ignore_ascii_case("gml") => {
                TemplateFormat::Xml
            }
            _ => TemplateFormat::Json,
        }
    }
}

/// A template with every directive expanded.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedTemplate {
    Json(Value),
    Xml(XmlElement),
}

/// Resolves and compiles templates from one store.
pub struct TemplateCompiler {
    store: Arc<dyn TemplateStore>,
    config: CompileConfig,
    namespaces: NamespaceSupport,
}

impl TemplateCompiler {
    pub fn new(store: Arc<dyn TemplateStore>, config: CompileConfig) -> Self {
        Self {
            store,
            config,
            namespaces: NamespaceSupport::new(),
        }
    }

    /// Namespaces known to the output format, visible to XML templates.
    pub fn with_namespaces(mut self, namespaces: NamespaceSupport) -> Self {
        self.namespaces = namespaces;
        self
    }

    pub fn store(&self) -> &Arc<dyn TemplateStore> {
        &self.store
    }

    pub fn config(&self) -> &CompileConfig {
        &self.config
    }

    /// Expand every directive of `template`.
    pub fn resolve(&self, template: &ResourceId) -> TemplateResult<(ResolvedTemplate, WatchedResources)> {
        let (resolved, watched, _) = self.resolve_tracked(template);
        resolved.map(|resolved| (resolved, watched))
    }

    /// Expand `template`, reporting what was consulted even when it fails.
    fn resolve_tracked(
        &self,
        template: &ResourceId,
    ) -> (TemplateResult<ResolvedTemplate>, WatchedResources, MissingResources) {
        match TemplateFormat::of(template) {
            TemplateFormat::Json => {
                let mut parser =
                    JsonTemplateParser::new(self.store.as_ref()).with_max_depth(self.config.max_depth);
                let resolved = parser.parse(template).map(ResolvedTemplate::Json);
                let (watched, missing) = parser.into_parts();
                (resolved, watched, missing)
            }
            TemplateFormat::Xml => {
                let mut parser =
                    XmlTemplateParser::new(self.store.as_ref()).with_max_depth(self.config.max_depth);
                let resolved = parser.parse(template).map(ResolvedTemplate::Xml);
                let (watched, missing) = parser.into_parts();
                (resolved, watched, missing)
            }
        }
    }

    /// Resolve `template` and compile it with the given environment.
    ///
    /// The returned tree carries a watcher over every resource read.
    pub fn compile(&self, template: &ResourceId, environment: &EnvironmentParams) -> TemplateResult<RootBuilder> {
        self.attempt(template, environment).map_err(|failure| failure.error)
    }

    /// Like [`compile`](Self::compile), but a failure keeps a watcher over
    /// the resources the attempt consulted, so callers can tell when trying
    /// again could give a different answer.
    pub fn attempt(
        &self,
        template: &ResourceId,
        environment: &EnvironmentParams,
    ) -> Result<RootBuilder, CompileFailure> {
        let started = Instant::now();
        let (resolved, watched, missing) = self.resolve_tracked(template);
        let watcher = ReloadWatcher::new(self.store.clone(), watched)
            .with_missing(missing)
            .with_check_interval(self.config.reload_check_interval());

        let reader = ReaderConfig {
            environment: environment.clone(),
            flat_output: self.config.flat_output,
            namespaces: self.namespaces.clone(),
            ..ReaderConfig::default()
        };
        let root = resolved.and_then(|resolved| match resolved {
            ResolvedTemplate::Json(document) => JsonTemplateReader::new(&reader).read(document),
            ResolvedTemplate::Xml(element) => XmlTemplateReader::new(&reader).read(element),
        });
        let parameters = reader.parameters_read();

        match root {
            Ok(root) => {
                tracing::info!(
                    template = %template,
                    resources = watcher.watched().len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Compiled template"
                );
                Ok(root
                    .with_parameters(parameters)
                    .with_watcher(template.clone(), watcher))
            }
            Err(error) => Err(CompileFailure {
                error,
                parameters,
                watcher,
            }),
        }
    }
}

/// A failed compilation and what it depended on.
#[derive(Debug)]
pub struct CompileFailure {
    pub error: TemplateError,
    /// Environment parameters read before the failure, sorted.
    pub parameters: Vec<String>,
    /// Watches the resources read and the references that were missing.
    pub watcher: ReloadWatcher,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(TemplateFormat::of(&ResourceId::new("a/b.json")), TemplateFormat::Json);
        assert_eq!(TemplateFormat::of(&ResourceId::new("a/b.GML")), TemplateFormat::Xml);
        assert_eq!(TemplateFormat::of(&ResourceId::new("a/b.xml")), TemplateFormat::Xml);
        assert_eq!(TemplateFormat::of(&ResourceId::new("noext")), TemplateFormat::Json);
    }

    #[test]
    fn test_compile_attaches_watcher() {
        let store = Arc::new(MemoryStore::with_resources([
            ("root.json", r#"{"a": "$include{a.json}"}"#),
            ("a.json", r#"{"b": "${b}"}"#),
        ]));
        let compiler = TemplateCompiler::new(store, CompileConfig::default());
        let root = compiler
            .compile(&ResourceId::new("root.json"), &EnvironmentParams::new())
            .unwrap();

        assert_eq!(root.template(), Some(&ResourceId::new("root.json")));
        let watched: Vec<&str> = root
            .watcher()
            .map(|w| w.watched().keys().map(ResourceId::as_str).collect())
            .unwrap_or_default();
        assert_eq!(watched, vec!["a.json", "root.json"]);
        assert!(!root.needs_reload());
    }

    #[test]
    fn test_compile_records_parameters_read() {
        let store = Arc::new(MemoryStore::with_resources([(
            "root.json",
            r#"{"$options": {"flat_output": "${env('FLAT_OUTPUT', false)}"}, "a": "${a}"}"#,
        )]));
        let compiler = TemplateCompiler::new(store, CompileConfig::default());
        let env: EnvironmentParams = [("request_id", "42")].into_iter().collect();
        let root = compiler.compile(&ResourceId::new("root.json"), &env).unwrap();
        assert_eq!(root.parameters(), ["flat_output".to_string()]);
    }

    #[test]
    fn test_failed_attempt_watches_missing_reference() {
        let store = Arc::new(MemoryStore::with_resources([
            ("root.json", r#"{"a": "$include{parts/a.json}"}"#),
        ]));
        let compiler = TemplateCompiler::new(
            store.clone(),
            CompileConfig {
                reload_check_interval_ms: 0,
                ..CompileConfig::default()
            },
        );
        let failure = compiler
            .attempt(&ResourceId::new("root.json"), &EnvironmentParams::new())
            .unwrap_err();

        assert_eq!(failure.error.code(), "FT-1-1");
        assert!(failure.watcher.watched().contains_key(&ResourceId::new("root.json")));
        assert!(failure.watcher.missing().contains(&ResourceId::new("parts/a.json")));
        assert!(!failure.watcher.needs_reload());

        store.insert("parts/a.json", "{}");
        assert!(failure.watcher.needs_reload());
    }
}
