//! Bounded prefix cache
//!
//! Keeps at most `capacity` materialized prefixes on disk, evicting the
//! least-recently-used entry when a new one pushes the count over the
//! bound. The cache owns every artifact outright: an artifact is deleted
//! exactly once, either at eviction or when the whole namespace is torn
//! down at shutdown.
//!
//! Concurrent `get` calls for the same key collapse into one
//! materialization: the first caller installs a shared future as an
//! in-flight placeholder and every later caller awaits the same future,
//! receiving the same success or failure. Calls for different keys run in
//! parallel. The metadata mutex is only ever held for map and list
//! updates, never across a download.

pub mod entry;
pub mod lru;

pub use entry::CacheEntry;

use crate::error::{StashError, StashResult};
use crate::materialize::Materializer;
use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use lru::RecencyList;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::fs;
use tracing::{debug, info, warn};

type FlightResult = Result<Arc<CacheEntry>, Arc<StashError>>;
type Flight = Shared<BoxFuture<'static, FlightResult>>;

/// Observability counters for the cache
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub capacity: usize,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits={} misses={} size={} capacity={}",
            self.hits, self.misses, self.size, self.capacity
        )
    }
}

struct CacheState {
    entries: HashMap<String, Arc<CacheEntry>>,
    recency: RecencyList,
    inflight: HashMap<String, Flight>,
    hits: u64,
    misses: u64,
    tombstone_seq: u64,
}

/// Unique retirement name for an evicted slot, alongside it in the namespace
fn tombstone_path(slot: &std::path::Path, seq: u64) -> PathBuf {
    let name = slot
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "slot".to_string());
    slot.with_file_name(format!("{name}.evicted-{seq}"))
}

/// LRU cache of materialized prefixes
pub struct PrefixCache {
    materializer: Arc<Materializer>,
    namespace: PathBuf,
    capacity: usize,
    state: Mutex<CacheState>,
}

impl PrefixCache {
    /// Create a cache over an existing materializer
    ///
    /// Creates the namespace directory; `capacity` must be positive.
    pub async fn new(
        materializer: Arc<Materializer>,
        namespace: PathBuf,
        capacity: usize,
    ) -> StashResult<Self> {
        if capacity == 0 {
            return Err(StashError::ConfigInvalid {
                path: namespace,
                reason: "cache capacity must be a positive integer".to_string(),
            });
        }
        fs::create_dir_all(&namespace)
            .await
            .map_err(|e| StashError::CacheDirCreate {
                path: namespace.clone(),
                source: e,
            })?;

        Ok(Self {
            materializer,
            namespace,
            capacity,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                recency: RecencyList::new(),
                inflight: HashMap::new(),
                hits: 0,
                misses: 0,
                tombstone_seq: 0,
            }),
        })
    }

    /// Get the entry for a prefix, materializing it on a miss
    pub async fn get(&self, prefix: &str) -> StashResult<Arc<CacheEntry>> {
        let flight = {
            let mut st = self.lock_state();

            if let Some(entry) = st.entries.get(prefix).cloned() {
                st.hits += 1;
                st.recency.touch(prefix);
                debug!("Cache hit for {}", prefix);
                return Ok(entry);
            }

            if let Some(flight) = st.inflight.get(prefix).cloned() {
                // Another request is already materializing this key
                st.hits += 1;
                debug!("Joining in-flight materialization for {}", prefix);
                flight
            } else {
                st.misses += 1;
                debug!("Cache miss for {}", prefix);
                let materializer = self.materializer.clone();
                let key = prefix.to_string();
                let flight: Flight = async move {
                    materializer
                        .materialize(&key)
                        .await
                        .map(Arc::new)
                        .map_err(Arc::new)
                }
                .boxed()
                .shared();
                st.inflight.insert(prefix.to_string(), flight.clone());
                flight
            }
        };

        let result = flight.await;

        // Whichever waiter gets here first does the bookkeeping; the
        // in-flight slot gates it so insertion and eviction happen once.
        let evicted = self.complete(prefix, &result)?;
        for path in evicted {
            if let Err(e) = entry::delete_path(&path).await {
                warn!("Failed to delete evicted artifact {}: {}", path.display(), e);
            }
        }

        result.map_err(StashError::Shared)
    }

    /// Finish an in-flight materialization, returning retired slot paths
    ///
    /// Evicted slots are renamed to a tombstone while the lock is held
    /// (one metadata op, atomic within the namespace volume). That frees
    /// the slot name immediately, so a re-materialization of the same key
    /// builds a fresh slot and the delayed delete only ever touches the
    /// tombstone. The caller deletes the returned paths after the lock
    /// has been released.
    fn complete(&self, prefix: &str, result: &FlightResult) -> StashResult<Vec<PathBuf>> {
        let mut st = self.lock_state();

        if st.inflight.remove(prefix).is_none() {
            // A concurrent waiter already completed this flight
            return Ok(Vec::new());
        }

        let entry = match result {
            Ok(entry) => entry.clone(),
            // Failures register nothing and count nothing against capacity
            Err(_) => return Ok(Vec::new()),
        };

        st.entries.insert(prefix.to_string(), entry);
        st.recency.touch(prefix);

        let mut evicted = Vec::new();
        while st.entries.len() > self.capacity {
            let Some(lru_key) = st.recency.pop_lru() else {
                return Err(StashError::CapacityInvariant(format!(
                    "{} entries over capacity {} with empty recency list",
                    st.entries.len(),
                    self.capacity
                )));
            };
            let Some(victim) = st.entries.remove(&lru_key) else {
                return Err(StashError::CapacityInvariant(format!(
                    "recency list key {lru_key} missing from entry map"
                )));
            };
            info!("Evicting least-recently-used entry {}", lru_key);
            st.tombstone_seq += 1;
            let tombstone = tombstone_path(&victim.slot, st.tombstone_seq);
            match std::fs::rename(&victim.slot, &tombstone) {
                Ok(()) => evicted.push(tombstone),
                // Slot already gone; nothing left to delete
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(_) => evicted.push(victim.slot.clone()),
            }
        }

        debug_assert!(st.entries.len() <= self.capacity);
        debug_assert_eq!(st.entries.len(), st.recency.len());
        Ok(evicted)
    }

    /// Current counters
    pub fn stats(&self) -> CacheStats {
        let st = self.lock_state();
        CacheStats {
            hits: st.hits,
            misses: st.misses,
            size: st.entries.len(),
            capacity: self.capacity,
        }
    }

    /// Tear down the cache: forget all entries and delete the namespace
    ///
    /// Idempotent; safe to call on a cache that was already shut down.
    pub async fn shutdown(&self) -> StashResult<()> {
        {
            let mut st = self.lock_state();
            st.entries.clear();
            st.recency.clear();
            st.inflight.clear();
        }

        info!(
            "Shutting down; removing all data from {}",
            self.namespace.display()
        );
        match fs::remove_dir_all(&self.namespace).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StashError::io(
                format!("removing cache namespace {}", self.namespace.display()),
                e,
            )),
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, CacheState> {
        // Lock is only held for metadata updates; poisoning would mean a
        // panic mid-update, which nothing here can recover from.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
