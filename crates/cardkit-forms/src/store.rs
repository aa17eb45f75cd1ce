//! Form Schema Store
//!
//! Live card instances keyed by tracking id. The map is sharded and each
//! entry carries its own mutex: actions on one card are serialized while
//! unrelated cards proceed in parallel. A shard lock is only held long
//! enough to clone the entry handle, never across a mutation.
//!
//! Entries are created when a card is sent and leave the store through
//! explicit removal, capacity eviction (least recently touched first) or
//! idle expiry.

use crate::config::StoreConfig;
use crate::domain::{FormSchema, InstanceId};
use crate::error::{FormsError, Result};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Capacity eviction frees this share of `max_instances` beyond the
/// overflow, so a full store rescans once per batch of inserts
const CAPACITY_SLACK_DIVISOR: usize = 100;

struct StoreEntry {
    schema: FormSchema,
    last_touched: DateTime<Utc>,
    /// Set once the entry has left the map; late lockers must not mutate it
    detached: bool,
}

type EntryHandle = Arc<Mutex<StoreEntry>>;

/// Eviction counters
#[derive(Debug, Default)]
pub struct StoreStats {
    pub inserted: AtomicU64,
    pub evicted_capacity: AtomicU64,
    pub evicted_expired: AtomicU64,
}

pub struct FormSchemaStore {
    entries: DashMap<InstanceId, EntryHandle>,
    config: StoreConfig,
    stats: StoreStats,
}

impl FormSchemaStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            stats: StoreStats::default(),
        }
    }

    /// Register the schema of a newly sent card, replacing any previous one
    pub fn insert(&self, id: InstanceId, schema: FormSchema) -> Option<FormSchema> {
        let entry = Arc::new(Mutex::new(StoreEntry {
            schema,
            last_touched: Utc::now(),
            detached: false,
        }));
        let previous = self.entries.insert(id.clone(), entry).map(|old| detach(&old));
        self.stats.inserted.fetch_add(1, Ordering::Relaxed);
        self.enforce_capacity(&id);
        previous
    }

    /// Run `f` on the instance's schema under its lock.
    ///
    /// Fails with `InstanceNotFound` for unknown or expired instances and
    /// never creates an entry.
    pub fn with_schema<R>(
        &self,
        id: &InstanceId,
        f: impl FnOnce(&mut FormSchema) -> Result<R>,
    ) -> Result<R> {
        let entry = self
            .entries
            .get(id)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| FormsError::InstanceNotFound(id.to_string()))?;

        let mut guard = entry.lock();
        if guard.detached {
            return Err(FormsError::InstanceNotFound(id.to_string()));
        }
        let now = Utc::now();
        if self.is_expired(guard.last_touched, now) {
            guard.detached = true;
            if self.entries.remove_if(id, |_, current| Arc::ptr_eq(current, &entry)).is_some() {
                self.stats.evicted_expired.fetch_add(1, Ordering::Relaxed);
                warn!(instance = %id, "card instance expired");
            }
            return Err(FormsError::InstanceNotFound(id.to_string()));
        }
        guard.last_touched = now;
        f(&mut guard.schema)
    }

    /// Copy of the instance's current schema
    pub fn snapshot(&self, id: &InstanceId) -> Result<FormSchema> {
        self.with_schema(id, |schema| Ok(schema.clone()))
    }

    pub fn remove(&self, id: &InstanceId) -> Option<FormSchema> {
        self.entries.remove(id).map(|(_, entry)| detach(&entry))
    }

    pub fn contains(&self, id: &InstanceId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }

    /// Drop every instance idle past the TTL
    pub fn evict_expired(&self) -> usize {
        self.evict_expired_at(Utc::now())
    }

    /// Drop every instance idle past the TTL as of `now`.
    ///
    /// Instances locked by an in-flight action are in use and kept, as are
    /// instances touched or replaced after the scan.
    pub fn evict_expired_at(&self, now: DateTime<Utc>) -> usize {
        if self.config.ttl_secs.is_none() {
            return 0;
        }

        let mut removed = 0;
        for (id, seen, touched) in self.idle_entries(None) {
            if self.is_expired(touched, now) && self.remove_if_untouched(&id, &seen, touched) {
                removed += 1;
                debug!(instance = %id, "evicted expired card instance");
            }
        }
        self.stats
            .evicted_expired
            .fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    fn is_expired(&self, last_touched: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self.config.ttl_secs {
            Some(ttl) => now.signed_duration_since(last_touched) >= Duration::seconds(ttl as i64),
            None => false,
        }
    }

    /// Entries not locked right now, with the handle and stamp seen
    fn idle_entries(&self, skip: Option<&InstanceId>) -> Vec<(InstanceId, EntryHandle, DateTime<Utc>)> {
        self.entries
            .iter()
            .filter(|e| Some(e.key()) != skip)
            .filter_map(|e| {
                let touched = e.value().try_lock()?.last_touched;
                Some((e.key().clone(), Arc::clone(e.value()), touched))
            })
            .collect()
    }

    /// Remove `id` only if it still maps to `seen`, is not locked and has
    /// not been touched since `touched`
    fn remove_if_untouched(&self, id: &InstanceId, seen: &EntryHandle, touched: DateTime<Utc>) -> bool {
        self.entries
            .remove_if(id, |_, current| {
                if !Arc::ptr_eq(current, seen) {
                    return false;
                }
                match current.try_lock() {
                    Some(mut entry) if entry.last_touched == touched => {
                        entry.detached = true;
                        true
                    }
                    _ => false,
                }
            })
            .is_some()
    }

    /// Evict least recently touched instances once the store is over
    /// capacity, freeing a small batch beyond the overflow per scan
    fn enforce_capacity(&self, keep: &InstanceId) {
        let Some(max) = self.config.max_instances else {
            return;
        };
        let len = self.entries.len();
        if len <= max {
            return;
        }

        let target = len - max + max / CAPACITY_SLACK_DIVISOR;
        let mut candidates = self.idle_entries(Some(keep));
        if candidates.len() > target {
            candidates.select_nth_unstable_by_key(target, |(_, _, touched)| *touched);
            candidates.truncate(target);
        }

        let mut evicted = 0u64;
        for (victim, seen, touched) in candidates {
            if self.remove_if_untouched(&victim, &seen, touched) {
                evicted += 1;
                debug!(instance = %victim, "evicted least recently touched card");
            }
        }
        if evicted > 0 {
            self.stats.evicted_capacity.fetch_add(evicted, Ordering::Relaxed);
            warn!(evicted, max, remaining = self.entries.len(), "store full, evicted least recently touched cards");
        }
    }
}

/// Mark a removed entry detached and return its last schema
fn detach(entry: &Mutex<StoreEntry>) -> FormSchema {
    let mut guard = entry.lock();
    guard.detached = true;
    guard.schema.clone()
}

impl Default for FormSchemaStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FieldType;
    use crate::domain::FieldDefinition;

    fn schema() -> FormSchema {
        FormSchema::new(vec![FieldDefinition::new("title", "Title", FieldType::Text)]).unwrap()
    }

    fn id(s: &str) -> InstanceId {
        InstanceId::new(s).unwrap()
    }

    #[test]
    fn test_insert_and_snapshot() {
        let store = FormSchemaStore::new(StoreConfig::unbounded());
        assert!(store.insert(id("c1"), schema()).is_none());
        assert!(store.contains(&id("c1")));
        assert_eq!(store.snapshot(&id("c1")).unwrap().fields().len(), 1);
        assert!(store.insert(id("c1"), schema()).is_some());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_unknown_instance_creates_nothing() {
        let store = FormSchemaStore::new(StoreConfig::unbounded());
        let result = store.with_schema(&id("ghost"), |_| Ok(()));
        assert_eq!(result, Err(FormsError::InstanceNotFound("ghost".into())));
        assert!(store.is_empty());
    }

    #[test]
    fn test_capacity_evicts_least_recently_touched() {
        let store = FormSchemaStore::new(StoreConfig {
            max_instances: Some(2),
            ttl_secs: None,
        });
        store.insert(id("a"), schema());
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.insert(id("b"), schema());
        std::thread::sleep(std::time::Duration::from_millis(5));
        // touching "a" makes "b" the oldest
        store.snapshot(&id("a")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.insert(id("c"), schema());

        assert_eq!(store.len(), 2);
        assert!(store.contains(&id("a")));
        assert!(!store.contains(&id("b")));
        assert!(store.contains(&id("c")));
        assert_eq!(store.stats().evicted_capacity.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_expired_instance_is_not_found() {
        let store = FormSchemaStore::new(StoreConfig {
            max_instances: None,
            ttl_secs: Some(0),
        });
        store.insert(id("c1"), schema());
        assert!(matches!(
            store.snapshot(&id("c1")),
            Err(FormsError::InstanceNotFound(_))
        ));
        assert!(!store.contains(&id("c1")));
    }

    #[test]
    fn test_evict_expired_sweep() {
        let store = FormSchemaStore::new(StoreConfig {
            max_instances: None,
            ttl_secs: Some(60),
        });
        store.insert(id("c1"), schema());
        store.insert(id("c2"), schema());

        assert_eq!(store.evict_expired(), 0);
        assert_eq!(store.evict_expired_at(Utc::now() + Duration::seconds(61)), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_no_ttl_never_expires() {
        let store = FormSchemaStore::new(StoreConfig::unbounded());
        store.insert(id("c1"), schema());
        assert_eq!(store.evict_expired_at(Utc::now() + Duration::days(365)), 0);
    }

    #[test]
    fn test_capacity_frees_a_batch() {
        let store = FormSchemaStore::new(StoreConfig {
            max_instances: Some(200),
            ttl_secs: None,
        });
        for i in 0..200 {
            store.insert(id(&format!("c{}", i)), schema());
        }
        assert_eq!(store.len(), 200);
        store.insert(id("newest"), schema());
        // one over plus 200 / 100 slack
        assert_eq!(store.len(), 198);
        assert!(store.contains(&id("newest")));
        assert_eq!(store.stats().evicted_capacity.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_sweep_keeps_entry_touched_after_scan() {
        let store = FormSchemaStore::new(StoreConfig {
            max_instances: None,
            ttl_secs: Some(60),
        });
        store.insert(id("c1"), schema());
        let later = Utc::now() + Duration::seconds(61);
        let scanned = store.idle_entries(None);
        assert_eq!(scanned.len(), 1);

        std::thread::sleep(std::time::Duration::from_millis(2));
        store.snapshot(&id("c1")).unwrap();

        let (scanned_id, seen, touched) = &scanned[0];
        assert!(store.is_expired(*touched, later));
        assert!(!store.remove_if_untouched(scanned_id, seen, *touched));
        assert!(store.contains(&id("c1")));
    }

    #[test]
    fn test_sweep_keeps_entry_replaced_after_scan() {
        let store = FormSchemaStore::new(StoreConfig::unbounded());
        store.insert(id("c1"), schema());
        let scanned = store.idle_entries(None);
        store.insert(id("c1"), schema());

        let (scanned_id, seen, touched) = &scanned[0];
        assert!(!store.remove_if_untouched(scanned_id, seen, *touched));
        assert!(store.snapshot(&id("c1")).is_ok());
    }

    #[test]
    fn test_detached_entry_rejects_late_action() {
        let store = FormSchemaStore::new(StoreConfig {
            max_instances: None,
            ttl_secs: Some(60),
        });
        store.insert(id("c1"), schema());
        let handle = store.entries.get(&id("c1")).map(|e| Arc::clone(e.value())).unwrap();

        assert_eq!(store.evict_expired_at(Utc::now() + Duration::seconds(61)), 1);
        assert!(handle.lock().detached);
        assert!(matches!(
            store.with_schema(&id("c1"), |_| Ok(())),
            Err(FormsError::InstanceNotFound(_))
        ));
    }

    #[test]
    fn test_locked_entry_survives_sweep() {
        let store = FormSchemaStore::new(StoreConfig {
            max_instances: None,
            ttl_secs: Some(60),
        });
        store.insert(id("c1"), schema());
        let handle = store.entries.get(&id("c1")).map(|e| Arc::clone(e.value())).unwrap();
        let guard = handle.lock();
        assert_eq!(store.evict_expired_at(Utc::now() + Duration::seconds(61)), 0);
        drop(guard);
        assert!(store.contains(&id("c1")));
    }

    #[test]
    fn test_remove() {
        let store = FormSchemaStore::default();
        store.insert(id("c1"), schema());
        assert!(store.remove(&id("c1")).is_some());
        assert!(store.remove(&id("c1")).is_none());
    }
}
