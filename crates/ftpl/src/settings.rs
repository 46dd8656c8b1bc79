/*
 * settings.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Compile settings from the config file and command-line flags.

use crate::StoreArgs;
use anyhow::{Context, Result};
use ftpl_core::resolver::resolve_reference;
use ftpl_core::{CompileConfig, EnvironmentParams, FileSystemStore, ResourceId, TemplateCompiler};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Load compile settings, applying flag overrides on top of the config file.
pub fn load_config(args: &StoreArgs) -> Result<CompileConfig> {
    let mut config = match &args.config {
        Some(path) => read_config(path)?,
        None => CompileConfig::default(),
    };
    if let Some(max_depth) = args.max_depth {
        config.max_depth = max_depth;
    }
    Ok(config)
}

fn read_config(path: &Path) -> Result<CompileConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("Invalid config file {}", path.display()))
}

/// A compiler over the store named on the command line.
pub fn compiler(args: &StoreArgs, config: CompileConfig) -> Result<TemplateCompiler> {
    if !args.root.is_dir() {
        anyhow::bail!("Template root is not a directory: {}", args.root.display());
    }
    tracing::debug!(root = %args.root.display(), ?config, "Opening template store");
    Ok(TemplateCompiler::new(
        Arc::new(FileSystemStore::new(&args.root)),
        config,
    ))
}

/// The store id of a template path given on the command line.
///
/// The path is normalized the way directive references are, so the root
/// and the files it includes are named consistently.
pub fn template_id(path: &str) -> Result<ResourceId> {
    resolve_reference(&ResourceId::new(""), path)
        .with_context(|| format!("Invalid template path {}", path))
}

/// Parse a `KEY=VALUE` environment parameter.
pub fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

pub fn environment(params: Vec<(String, String)>) -> EnvironmentParams {
    params.into_iter().collect()
}
