/*
 * watcher.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Staleness detection for compiled templates.

use crate::parser::{MissingResources, WatchedResources};
use crate::store::TemplateStore;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Default time a [`ReloadWatcher`] trusts its previous answer.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Answers whether any resource a template was compiled from has changed.
///
/// The watcher holds the modification times observed while resolving the
/// template. Checking stats every watched resource, so the answer is reused
/// for `check_interval` before the store is consulted again. Once a change
/// has been seen the watcher stays stale: the tree it belongs to is replaced,
/// never refreshed.
pub struct ReloadWatcher {
    store: Arc<dyn TemplateStore>,
    snapshot: WatchedResources,
    missing: MissingResources,
    check_interval: Duration,
    last_check: Mutex<Option<Instant>>,
    stale: AtomicBool,
}

impl ReloadWatcher {
    pub fn new(store: Arc<dyn TemplateStore>, snapshot: WatchedResources) -> Self {
        Self {
            store,
            snapshot,
            missing: MissingResources::new(),
            check_interval: DEFAULT_CHECK_INTERVAL,
            last_check: Mutex::new(None),
            stale: AtomicBool::new(false),
        }
    }

    /// Also go stale when any of `missing` comes into existence.
    pub fn with_missing(mut self, missing: MissingResources) -> Self {
        self.missing = missing;
        self
    }

    /// Set how long a check result is reused. Zero checks on every call.
    pub fn with_check_interval(mut self, check_interval: Duration) -> Self {
        self.check_interval = check_interval;
        self
    }

    /// The resources watched and their modification times at compile time.
    pub fn watched(&self) -> &WatchedResources {
        &self.snapshot
    }

    /// Resources that did not exist at compile time.
    pub fn missing(&self) -> &MissingResources {
        &self.missing
    }

    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    /// Whether any watched resource changed or disappeared.
    pub fn needs_reload(&self) -> bool {
        if self.stale.load(Ordering::Acquire) {
            return true;
        }

        let mut last_check = self.last_check.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(checked_at) = *last_check
            && checked_at.elapsed() < self.check_interval
        {
            return self.stale.load(Ordering::Acquire);
        }
        *last_check = Some(Instant::now());

        let changed = self
            .snapshot
            .iter()
            .find(|(id, observed)| !self.store.exists(id) || self.store.last_modified(id) != **observed)
            .map(|(id, _)| id)
            .or_else(|| self.missing.iter().find(|id| self.store.exists(id)));
        match changed {
            Some(id) => {
                tracing::info!(resource = %id, "Template resource changed, reload needed");
                self.stale.store(true, Ordering::Release);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for ReloadWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReloadWatcher")
            .field("snapshot", &self.snapshot)
            .field("missing", &self.missing)
            .field("check_interval", &self.check_interval)
            .field("stale", &self.stale.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
