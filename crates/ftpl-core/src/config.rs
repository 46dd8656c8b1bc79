/*
 * config.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Compilation settings.

use crate::parser::DEFAULT_MAX_DEPTH;
use crate::watcher::DEFAULT_CHECK_INTERVAL;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings shared by every compilation of a [`TemplateCompiler`](crate::TemplateCompiler).
///
/// Every field is optional when deserialized:
///
/// ```toml
/// max_depth = 51
/// reload_check_interval_ms = 1000
/// flat_output = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileConfig {
    /// Maximum length of the inclusion chain, root included.
    pub max_depth: usize,
    /// How long a reload check result is reused. Zero checks on every call.
    pub reload_check_interval_ms: u64,
    /// `flat_output` for templates that do not set it.
    pub flat_output: bool,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            reload_check_interval_ms: DEFAULT_CHECK_INTERVAL.as_millis() as u64,
            flat_output: false,
        }
    }
}

impl CompileConfig {
    pub fn reload_check_interval(&self) -> Duration {
        Duration::from_millis(self.reload_check_interval_ms)
    }
}
