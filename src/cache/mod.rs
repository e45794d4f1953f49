// Freshness-aware per-zone cache with coalesced, time-bounded refreshes

mod clock;

pub use clock::{Clock, ManualClock, SystemClock};

use crate::error::AqiError;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Age after which a cached value is stale
pub const FRESHNESS_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Freshness of a served value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    Fresh,
    Stale,
}

/// Per-zone cache state: `Empty → Fresh → Stale → Fresh → …`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheState {
    Empty,
    Fresh,
    Stale,
}

/// A value served from the cache
#[derive(Debug, Serialize)]
pub struct Cached<T> {
    #[serde(flatten)]
    pub value: Arc<T>,

    /// When the value was computed
    #[serde(rename = "timestamp")]
    pub computed_at: DateTime<Utc>,

    pub freshness: Freshness,
}

impl<T> Clone for Cached<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            computed_at: self.computed_at,
            freshness: self.freshness,
        }
    }
}

struct CacheEntry<T> {
    value: Arc<T>,
    computed_at: DateTime<Utc>,
}

/// One zone's entry plus the lock that serializes its refreshes.
///
/// `entry` is only held for the instant of a read or a swap; `refresh` is
/// held for the whole fetch-and-compute run. `runs` counts finished runs and
/// `last_failure` holds the error of the latest run if it failed, tagged
/// with that run's number.
struct ZoneSlot<T> {
    entry: RwLock<Option<CacheEntry<T>>>,
    refresh: tokio::sync::Mutex<()>,
    runs: AtomicU64,
    last_failure: Mutex<Option<(u64, AqiError)>>,
}

impl<T> ZoneSlot<T> {
    fn new() -> Self {
        Self {
            entry: RwLock::new(None),
            refresh: tokio::sync::Mutex::new(()),
            runs: AtomicU64::new(0),
            last_failure: Mutex::new(None),
        }
    }

    /// Record a finished run. Caller holds the refresh lock.
    fn finish_run(&self, failure: Option<AqiError>) {
        let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_failure.lock().unwrap_or_else(PoisonError::into_inner) =
            failure.map(|e| (run, e));
    }

    /// Error of a run that finished after `seen` runs, if that run failed
    fn failure_since(&self, seen: u64) -> Option<AqiError> {
        let last = self.last_failure.lock().unwrap_or_else(PoisonError::into_inner);
        match last.as_ref() {
            Some((run, e)) if *run > seen => Some(e.clone()),
            _ => None,
        }
    }
}

/// In-memory cache keyed by zone id.
///
/// Zones are independent: each has its own slot and refresh lock, and
/// nothing ever locks across zones. Entries are never evicted.
pub struct ZoneCache<T> {
    slots: DashMap<String, Arc<ZoneSlot<T>>>,
    refresh_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl<T: Send + Sync + 'static> ZoneCache<T> {
    pub fn new(refresh_timeout: Duration) -> Self {
        Self::with_clock(refresh_timeout, Arc::new(SystemClock))
    }

    pub fn with_clock(refresh_timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: DashMap::new(),
            refresh_timeout,
            clock,
        }
    }

    pub fn refresh_timeout(&self) -> Duration {
        self.refresh_timeout
    }

    /// Current state of a zone's entry
    pub fn state(&self, zone_id: &str) -> CacheState {
        match self.peek(zone_id) {
            None => CacheState::Empty,
            Some(cached) if cached.freshness == Freshness::Fresh => CacheState::Fresh,
            Some(_) => CacheState::Stale,
        }
    }

    /// Stored value regardless of age, without triggering a refresh
    pub fn peek(&self, zone_id: &str) -> Option<Cached<T>> {
        let slot = self.slots.get(zone_id).map(|s| Arc::clone(s.value()))?;
        self.read(&slot)
    }

    /// Serve the zone's value, refreshing it through `fetch` when it is
    /// empty or stale.
    ///
    /// At most one `fetch` runs per zone at a time. While another caller
    /// owns a refresh, a stale value is returned immediately; a caller on an
    /// empty zone waits for that refresh and shares its outcome, error
    /// included. On failure the stored value is left untouched.
    pub async fn get_or_refresh<F, Fut>(&self, zone_id: &str, fetch: F) -> Result<Cached<T>, AqiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AqiError>>,
    {
        let slot = self.slot(zone_id);

        if let Some(hit) = self.read(&slot).filter(|c| c.freshness == Freshness::Fresh) {
            debug!(zone_id, "Cache hit");
            return Ok(hit);
        }

        let seen = slot.runs.load(Ordering::SeqCst);
        let _guard = match slot.refresh.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                if let Some(stale) = self.read(&slot) {
                    debug!(zone_id, "Refresh in flight, serving stale value");
                    return Ok(stale);
                }
                slot.refresh.lock().await
            }
        };

        // The previous owner may have stored a value while we waited
        if let Some(hit) = self.read(&slot).filter(|c| c.freshness == Freshness::Fresh) {
            debug!(zone_id, "Refresh coalesced with concurrent request");
            return Ok(hit);
        }

        // ...or failed, in which case its error is ours too
        if let Some(e) = slot.failure_since(seen) {
            debug!(zone_id, error = %e, "Sharing failure of concurrent refresh");
            return Err(e);
        }

        self.run_refresh(zone_id, &slot, fetch).await
    }

    /// Recompute the zone's value regardless of freshness.
    ///
    /// Waits for an in-flight refresh and skips its own `fetch` if that
    /// refresh completed after this call was made.
    pub async fn refresh<F, Fut>(&self, zone_id: &str, fetch: F) -> Result<Cached<T>, AqiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AqiError>>,
    {
        let requested_at = self.clock.now();
        let slot = self.slot(zone_id);
        let _guard = slot.refresh.lock().await;

        if let Some(current) = self.read(&slot) {
            if current.computed_at > requested_at {
                debug!(zone_id, "Forced refresh satisfied by concurrent refresh");
                return Ok(current);
            }
        }

        self.run_refresh(zone_id, &slot, fetch).await
    }

    /// Run `fetch` under the timeout and store its result. Caller holds the
    /// slot's refresh lock.
    async fn run_refresh<F, Fut>(
        &self,
        zone_id: &str,
        slot: &ZoneSlot<T>,
        fetch: F,
    ) -> Result<Cached<T>, AqiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AqiError>>,
    {
        let started = Instant::now();

        let value = match tokio::time::timeout(self.refresh_timeout, fetch()).await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                warn!(zone_id, error = %e, "Zone refresh failed, cache unchanged");
                slot.finish_run(Some(e.clone()));
                return Err(e);
            }
            Err(_) => {
                let e = AqiError::UpstreamTimeout {
                    zone_id: zone_id.to_string(),
                    timeout: self.refresh_timeout,
                };
                warn!(zone_id, error = %e, "Zone refresh timed out, cache unchanged");
                slot.finish_run(Some(e.clone()));
                return Err(e);
            }
        };

        let entry = CacheEntry {
            value: Arc::new(value),
            computed_at: self.clock.now(),
        };
        let cached = Cached {
            value: Arc::clone(&entry.value),
            computed_at: entry.computed_at,
            freshness: Freshness::Fresh,
        };

        *slot.entry.write().unwrap_or_else(PoisonError::into_inner) = Some(entry);
        slot.finish_run(None);

        info!(
            zone_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Zone refreshed"
        );

        Ok(cached)
    }

    fn slot(&self, zone_id: &str) -> Arc<ZoneSlot<T>> {
        if let Some(slot) = self.slots.get(zone_id) {
            return Arc::clone(slot.value());
        }
        Arc::clone(
            self.slots
                .entry(zone_id.to_string())
                .or_insert_with(|| Arc::new(ZoneSlot::new()))
                .value(),
        )
    }

    fn read(&self, slot: &ZoneSlot<T>) -> Option<Cached<T>> {
        let entry = slot.entry.read().unwrap_or_else(PoisonError::into_inner);
        entry.as_ref().map(|e| Cached {
            value: Arc::clone(&e.value),
            computed_at: e.computed_at,
            freshness: self.freshness_of(e.computed_at),
        })
    }

    fn freshness_of(&self, computed_at: DateTime<Utc>) -> Freshness {
        match self.clock.now().signed_duration_since(computed_at).to_std() {
            Ok(age) if age >= FRESHNESS_WINDOW => Freshness::Stale,
            // Negative age (clock stepped back) counts as fresh
            _ => Freshness::Fresh,
        }
    }
}
