/*
 * cache.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Shared compiled templates, recompiled when their files change.

use crate::builder::RootBuilder;
use crate::compile::{CompileFailure, TemplateCompiler};
use crate::error::{TemplateError, TemplateResult};
use crate::expression::EnvironmentParams;
use crate::store::ResourceId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Values of the parameters a template reads, in the order of its
/// parameter list. Environments agreeing on these share one tree.
type Variant = Vec<Option<String>>;

fn variant_of(environment: &EnvironmentParams, parameters: &[String]) -> Variant {
    parameters
        .iter()
        .map(|name| environment.get(name).map(str::to_string))
        .collect()
}

/// Compiled trees of one template.
#[derive(Default)]
struct SlotState {
    /// Parameters the current version of the template reads.
    parameters: Vec<String>,
    trees: HashMap<Variant, Arc<RootBuilder>>,
    failure: Option<Failure>,
}

/// The last failed compile, answered again until its inputs change.
struct Failure {
    variant: Variant,
    attempt: CompileFailure,
}

/// Holds every compiled variant of one template.
///
/// Its mutex is held across compilation, so concurrent callers asking for
/// the same stale template wait for a single recompile.
#[derive(Default)]
struct Slot {
    state: Mutex<SlotState>,
}

/// Cache of compiled templates.
///
/// Trees are shared between environments that agree on every parameter
/// the template's options read through `env(...)`; other request
/// parameters do not create new entries.
pub struct TemplateCache {
    compiler: TemplateCompiler,
    slots: Mutex<HashMap<ResourceId, Arc<Slot>>>,
}

impl TemplateCache {
    pub fn new(compiler: TemplateCompiler) -> Self {
        Self {
            compiler,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn compiler(&self) -> &TemplateCompiler {
        &self.compiler
    }

    /// The compiled tree for `template`, compiling or recompiling as needed.
    ///
    /// A failed compile is remembered: the same error is returned without
    /// touching the template files again until one of the files it read, or
    /// a reference it could not find, changes.
    pub fn get(&self, template: &ResourceId, environment: &EnvironmentParams) -> TemplateResult<Arc<RootBuilder>> {
        let slot = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(template.clone())
            .or_default()
            .clone();

        let mut guard = slot.state.lock().unwrap_or_else(PoisonError::into_inner);
        let state = &mut *guard;
        let variant = variant_of(environment, &state.parameters);
        if let Some(root) = state.trees.get(&variant)
            && !root.needs_reload()
        {
            return Ok(root.clone());
        }
        if let Some(failure) = &state.failure
            && failure.variant == variant_of(environment, &failure.attempt.parameters)
            && !failure.attempt.watcher.needs_reload()
        {
            return Err(failure.attempt.error.clone());
        }

        let reloading = !state.trees.is_empty();
        if reloading {
            tracing::debug!(template = %template, "Recompiling template");
        }
        // Stale trees are never served again
        state.trees.retain(|_, root| !root.needs_reload());

        match self.compiler.attempt(template, environment) {
            Ok(root) => {
                if root.parameters() != state.parameters.as_slice() {
                    state.parameters = root.parameters().to_vec();
                    state.trees.clear();
                }
                let root = Arc::new(root);
                let variant = variant_of(environment, &state.parameters);
                state.trees.insert(variant, root.clone());
                state.failure = None;
                Ok(root)
            }
            Err(attempt) => {
                tracing::warn!(
                    template = %template,
                    code = attempt.error.code(),
                    error = %attempt.error,
                    "Compiling template failed"
                );
                let error = attempt.error.clone();
                // I/O failures may be transient, so they are retried
                state.failure = match error {
                    TemplateError::Io { .. } => None,
                    _ => Some(Failure {
                        variant: variant_of(environment, &attempt.parameters),
                        attempt,
                    }),
                };
                Err(error)
            }
        }
    }

    /// Drop every cached tree of `template`.
    pub fn invalidate(&self, template: &ResourceId) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(template);
    }

    pub fn clear(&self) {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Number of compiled trees held, over every template.
    pub fn len(&self) -> usize {
        let slots: Vec<Arc<Slot>> = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        slots
            .iter()
            .map(|slot| slot.state.lock().unwrap_or_else(PoisonError::into_inner).trees.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
