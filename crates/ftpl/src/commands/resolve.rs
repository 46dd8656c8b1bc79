/*
 * resolve.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Resolve command implementation
 */

use anyhow::{Context, Result};
use ftpl_core::ResolvedTemplate;

use crate::StoreArgs;
use crate::settings;

/// Execute the resolve command
pub fn execute(args: &StoreArgs, template: &str, show_watched: bool) -> Result<()> {
    let config = settings::load_config(args)?;
    let compiler = settings::compiler(args, config)?;
    let template = settings::template_id(template)?;

    let (resolved, watched) = compiler
        .resolve(&template)
        .with_context(|| format!("Failed to resolve template {}", template))?;

    let text = match &resolved {
        ResolvedTemplate::Json(document) => serde_json::to_string_pretty(document)?,
        ResolvedTemplate::Xml(element) => ftpl_xml::to_xml_string(element)
            .with_context(|| format!("Failed to write resolved template {}", template))?,
    };
    println!("{}", text);

    if show_watched {
        eprintln!("Files read:");
        for id in watched.keys() {
            eprintln!("  {}", id);
        }
    }
    Ok(())
}
