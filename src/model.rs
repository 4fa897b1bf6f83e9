//! `FieldTestModel`: the engine facade the front-end drives.
//!
//! Holds the store, configuration, clock and the recent-value cache. The
//! lifecycle, archive and session operations live in their own modules as
//! further `impl` blocks on this type.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::NaiveDateTime;
use serde_json::Value;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::curves::CurveRepository;
use crate::error::Result;
use crate::fs_store::FsStore;
use crate::recent::RecentValues;
use crate::schema::layout;
use crate::store::{read_as, to_record, RecordKey, Store};

pub struct FieldTestModel<S: Store = FsStore> {
    config: EngineConfig,
    store: S,
    clock: Box<dyn Clock>,
    recent: Mutex<Option<RecentValues>>,
    /// Serializes every read-check-write sequence (id allocation, test slot
    /// check, status recomputation, archival).
    writer: Mutex<()>,
}

impl FieldTestModel<FsStore> {
    /// Open the on-device store under `config.base_dir`.
    pub fn open(config: EngineConfig) -> Result<Self> {
        let store = FsStore::open(&config.base_dir)?;
        Ok(Self::with_store(config, store))
    }
}

impl<S: Store> FieldTestModel<S> {
    pub fn with_store(config: EngineConfig, store: S) -> Self {
        Self {
            config,
            store,
            clock: Box::new(SystemClock),
            recent: Mutex::new(None),
            writer: Mutex::new(()),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn curves(&self) -> CurveRepository<'_, S> {
        CurveRepository::new(&self.store)
    }

    pub(crate) fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    pub(crate) fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Recent values ───────────────────────────────────────────────────────

    /// Up to `recent_limit` previous entries for `field`, newest first.
    pub fn suggestions(&self, field: &str) -> Result<Vec<String>> {
        let mut cache = self.recent_cache()?;
        Ok(cache
            .get_or_insert_with(RecentValues::default)
            .suggestions(field)
            .to_vec())
    }

    /// Apply `entries` to a copy of the cache. Returns the record to commit
    /// alongside the owning write, or `None` if nothing changed.
    pub(crate) fn stage_recent(
        &self,
        entries: &[(&str, &str)],
    ) -> Result<Option<(RecentValues, (RecordKey, Value))>> {
        let mut cache = self.recent_cache()?;
        let mut next = cache.get_or_insert_with(RecentValues::default).clone();
        let mut changed = false;
        for (field, value) in entries {
            changed |= next.remember(field, value, self.config.recent_limit);
        }
        if !changed {
            return Ok(None);
        }
        let record = to_record(&next)?;
        Ok(Some((next, (RecordKey::setting(layout::RECENT_ENTRIES), record))))
    }

    /// Adopt a staged cache once its record is committed.
    pub(crate) fn adopt_recent(&self, values: RecentValues) {
        let mut cache = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
        *cache = Some(values);
    }

    /// Loaded on first use.
    fn recent_cache(&self) -> Result<MutexGuard<'_, Option<RecentValues>>> {
        let mut cache = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
        if cache.is_none() {
            let loaded: Option<RecentValues> =
                read_as(&self.store, &RecordKey::setting(layout::RECENT_ENTRIES))?;
            debug!(found = loaded.is_some(), "Loaded recent values");
            *cache = Some(loaded.unwrap_or_default());
        }
        Ok(cache)
    }
}
