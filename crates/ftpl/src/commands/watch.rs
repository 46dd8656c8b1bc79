/*
 * watch.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Watch command implementation
 */

//! Watch command implementation.
//!
//! Compiles a template through a [`TemplateCache`] and polls it: whenever
//! one of the files the template was compiled from changes, the cache
//! recompiles it. A broken edit is reported and the previous tree is kept
//! until the template compiles again.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use ftpl_core::TemplateCache;
use tracing::{error, info};

use crate::StoreArgs;
use crate::settings;

/// Arguments for the watch command
#[derive(Debug)]
pub struct WatchArgs {
    pub template: String,
    pub params: Vec<(String, String)>,
    pub interval_ms: u64,
    pub once: bool,
    pub timeout: Option<u64>,
}

/// Execute the watch command
pub fn execute(store: &StoreArgs, args: WatchArgs) -> Result<()> {
    let mut config = settings::load_config(store)?;
    // The command polls at its own pace
    config.reload_check_interval_ms = 0;
    let cache = TemplateCache::new(settings::compiler(store, config)?);

    let template = settings::template_id(&args.template)?;
    let environment = settings::environment(args.params);
    let interval = Duration::from_millis(args.interval_ms.max(10));
    let deadline = args.timeout.map(|secs| Instant::now() + Duration::from_secs(secs));

    let mut current = cache
        .get(&template, &environment)
        .with_context(|| format!("Failed to compile template {}", template))?;
    let files = current.watcher().map_or(0, |w| w.watched().len());
    info!(template = %template, files, "Watching template");

    // Report a broken template once, not on every poll
    let mut reported: Option<String> = None;
    loop {
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            info!("Timeout reached, stopping");
            return Ok(());
        }
        thread::sleep(interval);

        if !current.needs_reload() {
            continue;
        }
        match cache.get(&template, &environment) {
            Ok(root) => {
                info!(
                    template = %template,
                    builders = root.children().len(),
                    "Template changed and was recompiled"
                );
                current = root;
                reported = None;
                if args.once {
                    return Ok(());
                }
            }
            Err(err) => {
                let message = err.to_string();
                if reported.as_ref() != Some(&message) {
                    error!(template = %template, code = err.code(), "{}", message);
                    reported = Some(message);
                }
            }
        }
    }
}
