//! Thread-safe handle around a [`CumulativeStateCache`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use story_model::WorldState;

use super::{CumulativeStateCache, NodeChangeSummary, StorySource};
use crate::error::NarrativeError;
use crate::script::{ScriptEngine, ScriptError};

/// A cache shared between threads. Recomputes and reads are serialized.
#[derive(Debug, Clone)]
pub struct SharedStateCache {
    inner: Arc<Mutex<CumulativeStateCache>>,
}

impl SharedStateCache {
    pub fn new(engine: ScriptEngine) -> Self {
        Self::from_cache(CumulativeStateCache::new(engine))
    }

    pub fn from_cache(cache: CumulativeStateCache) -> Self {
        Self {
            inner: Arc::new(Mutex::new(cache)),
        }
    }

    /// Run `f` with exclusive access to the cache.
    pub fn with_cache<R>(&self, f: impl FnOnce(&mut CumulativeStateCache) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn cumulative_at<S: StorySource + ?Sized>(
        &self,
        source: &S,
        target: &str,
        force_refresh: bool,
    ) -> Result<Option<WorldState>, NarrativeError> {
        self.lock().cumulative_at(source, target, force_refresh)
    }

    pub fn state_at<S: StorySource + ?Sized>(
        &self,
        source: &S,
        target: &str,
    ) -> Result<WorldState, NarrativeError> {
        self.lock().state_at(source, target)
    }

    pub fn invalidate(&self) {
        self.lock().invalidate();
    }

    pub fn is_dirty(&self) -> bool {
        self.lock().is_dirty()
    }

    pub fn changes_for(&self, node_id: &str) -> Option<NodeChangeSummary> {
        self.lock().changes_for(node_id).cloned()
    }

    pub fn all_changes(&self) -> Vec<NodeChangeSummary> {
        self.lock().all_changes().to_vec()
    }

    pub fn failures(&self) -> Vec<ScriptError> {
        self.lock().failures().to_vec()
    }

    // Poisoning is recovered from: an interrupted recompute leaves the cache dirty.
    fn lock(&self) -> MutexGuard<'_, CumulativeStateCache> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
