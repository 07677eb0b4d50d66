//! ---
//! hmon_section: "04-telemetry-ingest"
//! hmon_subsection: "module"
//! hmon_type: "source"
//! hmon_scope: "code"
//! hmon_description: "Schema cache and telemetry ingest pipeline."
//! hmon_version: "v0.0.0-prealpha"
//! hmon_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::error::SchemaError;
use crate::schema::{MeasurementSchema, SchemaStore};

pub use hmon_common::config::DEFAULT_SCHEMA_TTL;

/// Wall-clock source, injectable so expiry can be tested.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        if let Ok(delta) = chrono::Duration::from_std(by) {
            *now = now.checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC);
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

#[derive(Debug)]
struct CacheEntry {
    schema: Arc<MeasurementSchema>,
    expires_at: DateTime<Utc>,
}

/// Read-through TTL cache in front of a [`SchemaStore`].
///
/// Snapshots are handed out as `Arc`s so callers never hold the lock while
/// decoding. Missing schemas are not cached.
pub struct SchemaCache<S, C = SystemClock> {
    store: S,
    clock: C,
    ttl: Duration,
    entries: RwLock<HashMap<(String, String), CacheEntry>>,
}

impl<S: SchemaStore> SchemaCache<S, SystemClock> {
    pub fn new(store: S, ttl: Duration) -> Self {
        Self::with_clock(store, ttl, SystemClock)
    }
}

impl<S: SchemaStore, C: Clock> SchemaCache<S, C> {
    pub fn with_clock(store: S, ttl: Duration, clock: C) -> Self {
        Self {
            store,
            clock,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn get(
        &self,
        app_name: &str,
        version: &str,
    ) -> Result<Option<Arc<MeasurementSchema>>, SchemaError> {
        let key = (app_name.to_owned(), version.to_owned());
        let now = self.clock.now();

        if let Some(entry) = self.entries.read().get(&key) {
            if now < entry.expires_at {
                trace!(app_name, version, "schema cache hit");
                return Ok(Some(Arc::clone(&entry.schema)));
            }
        }

        debug!(app_name, version, "schema cache miss, loading from store");
        let Some(schema) = self.store.get(app_name, version)? else {
            self.entries.write().remove(&key);
            return Ok(None);
        };

        let schema = Arc::new(schema);
        self.entries.write().insert(
            key,
            CacheEntry {
                schema: Arc::clone(&schema),
                expires_at: self.expiry_from(now),
            },
        );
        Ok(Some(schema))
    }

    /// Write through to the store, then prime the cache with the new document.
    pub fn save(&self, schema: MeasurementSchema) -> Result<Arc<MeasurementSchema>, SchemaError> {
        self.store.save(&schema)?;
        let key = (schema.app_name.clone(), schema.version.clone());
        let schema = Arc::new(schema);
        let expires_at = self.expiry_from(self.clock.now());
        self.entries.write().insert(
            key,
            CacheEntry {
                schema: Arc::clone(&schema),
                expires_at,
            },
        );
        Ok(schema)
    }

    pub fn invalidate(&self, app_name: &str, version: &str) {
        self.entries
            .write()
            .remove(&(app_name.to_owned(), version.to_owned()));
    }

    pub fn invalidate_all(&self) {
        self.entries.write().clear();
    }

    /// Number of cached entries, expired ones included until next touched.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::InMemorySchemaStore;
    use chrono::TimeZone;
    use hmon_proto::MeasurementMeta;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts store reads so cache hits are observable.
    #[derive(Default)]
    struct CountingStore {
        inner: InMemorySchemaStore,
        gets: AtomicUsize,
    }

    impl SchemaStore for CountingStore {
        fn get(&self, app: &str, version: &str) -> Result<Option<MeasurementSchema>, SchemaError> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.inner.get(app, version)
        }

        fn save(&self, schema: &MeasurementSchema) -> Result<(), SchemaError> {
            self.inner.save(schema)
        }
    }

    fn schema(version: &str, unit: &str) -> MeasurementSchema {
        MeasurementSchema::new("weather-station", version)
            .with_measurement(MeasurementMeta::new(2, "temperature", "float", unit))
    }

    fn cache_at_epoch(ttl: Duration) -> (SchemaCache<CountingStore, Arc<ManualClock>>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ));
        let cache = SchemaCache::with_clock(CountingStore::default(), ttl, Arc::clone(&clock));
        (cache, clock)
    }

    #[test]
    fn hits_are_served_without_touching_the_store() {
        let (cache, _clock) = cache_at_epoch(Duration::from_secs(60));
        cache.store().inner.save(&schema("1.0", "celsius")).unwrap();

        let first = cache.get("weather-station", "1.0").unwrap().unwrap();
        let second = cache.get("weather-station", "1.0").unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.store().gets.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn entries_expire_after_ttl() {
        let (cache, clock) = cache_at_epoch(Duration::from_secs(60));
        cache.store().inner.save(&schema("1.0", "celsius")).unwrap();
        cache.get("weather-station", "1.0").unwrap();

        // replace behind the cache's back
        cache.store().inner.save(&schema("1.0", "kelvin")).unwrap();
        clock.advance(Duration::from_secs(59));
        let stale = cache.get("weather-station", "1.0").unwrap().unwrap();
        assert_eq!(stale.measurements["temperature"].unit, "celsius");

        clock.advance(Duration::from_secs(1));
        let fresh = cache.get("weather-station", "1.0").unwrap().unwrap();
        assert_eq!(fresh.measurements["temperature"].unit, "kelvin");
        assert_eq!(cache.store().gets.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn save_primes_the_cache() {
        let (cache, _clock) = cache_at_epoch(DEFAULT_SCHEMA_TTL);
        cache.save(schema("2.0", "celsius")).unwrap();

        assert_eq!(cache.len(), 1);
        assert!(cache.get("weather-station", "2.0").unwrap().is_some());
        assert_eq!(cache.store().gets.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn invalidation_forces_reload() {
        let (cache, _clock) = cache_at_epoch(DEFAULT_SCHEMA_TTL);
        cache.save(schema("1.0", "celsius")).unwrap();
        cache.save(schema("2.0", "celsius")).unwrap();

        cache.invalidate("weather-station", "1.0");
        assert_eq!(cache.len(), 1);
        cache.get("weather-station", "1.0").unwrap();
        assert_eq!(cache.store().gets.load(Ordering::SeqCst), 1);

        cache.invalidate_all();
        assert!(cache.is_empty());
    }

    #[test]
    fn default_ttl_matches_configuration_default() {
        assert_eq!(
            DEFAULT_SCHEMA_TTL,
            hmon_common::AppConfig::default().schema_cache.ttl
        );
        assert_eq!(DEFAULT_SCHEMA_TTL, Duration::from_secs(86_400));
    }

    #[test]
    fn missing_schema_is_not_cached() {
        let (cache, _clock) = cache_at_epoch(DEFAULT_SCHEMA_TTL);
        assert!(cache.get("unknown", "0.0").unwrap().is_none());
        assert!(cache.is_empty());
        cache.get("unknown", "0.0").unwrap();
        assert_eq!(cache.store().gets.load(Ordering::SeqCst), 2);
    }
}
