/*
 * compile.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Compile command implementation
 */

use anyhow::{Context, Result};
use tracing::info;

use crate::StoreArgs;
use crate::settings;

/// Execute the compile command
pub fn execute(
    args: &StoreArgs,
    template: &str,
    params: Vec<(String, String)>,
    flat_output: bool,
) -> Result<()> {
    let mut config = settings::load_config(args)?;
    config.flat_output |= flat_output;
    let compiler = settings::compiler(args, config)?;
    let template = settings::template_id(template)?;

    let root = compiler
        .compile(&template, &settings::environment(params))
        .with_context(|| format!("Failed to compile template {}", template))?;
    info!(
        builders = root.children().len(),
        flat_output = root.options().flat_output,
        "Template compiled"
    );

    println!("{}", serde_json::to_string_pretty(&root)?);
    Ok(())
}
