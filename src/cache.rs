//! Summary cache
//!
//! Summaries are recomputed from source files on every request unless the
//! orchestrator keeps them here. The cache is owned by the caller, never
//! global, and only changes through explicit `remove`/`clear`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::BinConfig;
use crate::types::{Modality, ModalityReport, ParticipantId};

/// Everything a cached report depends on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub participant_id: ParticipantId,
    pub modality: Modality,
    pub config: BinConfig,
    pub strict: bool,
}

impl CacheKey {
    pub fn new(participant_id: ParticipantId, modality: Modality, config: BinConfig, strict: bool) -> Self {
        Self {
            participant_id,
            modality,
            config,
            strict,
        }
    }
}

/// Hit / miss counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Report cache keyed by participant, modality and binning configuration
#[derive(Debug, Default)]
pub struct SummaryCache {
    entries: HashMap<CacheKey, Arc<ModalityReport>>,
    stats: CacheStats,
}

impl SummaryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached report for `key`, computing and storing it on a miss.
    ///
    /// Errors from `compute` are returned as-is and nothing is stored.
    pub fn get_or_try_insert_with<E, F>(&mut self, key: CacheKey, compute: F) -> Result<Arc<ModalityReport>, E>
    where
        F: FnOnce() -> Result<ModalityReport, E>,
    {
        if let Some(report) = self.entries.get(&key) {
            self.stats.hits += 1;
            log::debug!("cache hit for {} {}", key.participant_id, key.modality);
            return Ok(Arc::clone(report));
        }

        self.stats.misses += 1;
        let report = Arc::new(compute()?);
        self.entries.insert(key, Arc::clone(&report));
        Ok(report)
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<ModalityReport>> {
        self.entries.get(key).cloned()
    }

    pub fn remove(&mut self, key: &CacheKey) -> Option<Arc<ModalityReport>> {
        self.entries.remove(key)
    }

    /// Drop every entry for a participant; returns how many were removed
    pub fn remove_participant(&mut self, participant: &ParticipantId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| &key.participant_id != participant);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}
