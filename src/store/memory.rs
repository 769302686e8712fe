//! In-process shared store backed by `DashMap`.
//!
//! Keys come from client-controlled headers, so entries are reclaimed once they
//! have not been written for a full rate limit window (see [`MemoryStore::run_expiry`]).
//! An entry idle that long describes an expired window; removing it and resetting it
//! on the next request give the same count.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::time;

use crate::observability::metrics;
use crate::store::{CasToken, SharedStore, StoreError};

struct Slot {
    value: Vec<u8>,
    version: u32,
    written_at: Instant,
}

/// Thread-safe compare-and-set store shared by every request in the process.
///
/// Cloning shares the underlying map. Versions are drawn from one store-wide
/// counter, so a key removed and written again never reuses an outstanding token.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<DashMap<String, Slot>>,
    versions: Arc<AtomicU32>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys held.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn bump(&self) -> u32 {
        next_version(self.versions.fetch_add(1, Ordering::Relaxed))
    }

    /// Remove every key not written within `ttl`. Returns how many were removed.
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        let mut removed = 0;
        self.inner.retain(|_, slot| {
            let keep = slot.written_at.elapsed() < ttl;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    /// Evict idle keys every `every` until shutdown.
    pub async fn run_expiry(
        self,
        ttl: Duration,
        every: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        tracing::info!(ttl = ?ttl, every = ?every, "Store expiry starting");
        let mut ticker = time::interval(every.max(Duration::from_millis(1)));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.evict_idle(ttl);
                    if removed > 0 {
                        metrics::record_store_evictions(removed);
                        tracing::debug!(removed, remaining = self.len(), "Evicted idle store entries");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Store expiry received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

fn next_version(version: u32) -> u32 {
    // 0 is reserved for CasToken::ABSENT
    match version.wrapping_add(1) {
        0 => 1,
        v => v,
    }
}

impl SharedStore for MemoryStore {
    fn get(&self, key: &str) -> Result<(Option<Vec<u8>>, CasToken), StoreError> {
        Ok(match self.inner.get(key) {
            Some(slot) => (Some(slot.value.clone()), CasToken::new(slot.version)),
            None => (None, CasToken::ABSENT),
        })
    }

    fn set(&self, key: &str, value: &[u8], token: CasToken) -> Result<(), StoreError> {
        // The entry guard holds the shard lock, so compare and write are atomic per key.
        match self.inner.entry(key.to_string()) {
            Entry::Vacant(vacant) => {
                if token != CasToken::ABSENT {
                    return Err(StoreError::CasMismatch);
                }
                vacant.insert(Slot {
                    value: value.to_vec(),
                    version: self.bump(),
                    written_at: Instant::now(),
                });
                Ok(())
            }
            Entry::Occupied(mut occupied) => {
                let slot = occupied.get_mut();
                if token.as_u32() != slot.version {
                    return Err(StoreError::CasMismatch);
                }
                slot.value = value.to_vec();
                slot.version = self.bump();
                slot.written_at = Instant::now();
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_reports_absent_token() {
        let store = MemoryStore::new();
        let (value, token) = store.get("10.0.0.1").unwrap();
        assert!(value.is_none());
        assert_eq!(token, CasToken::ABSENT);
        assert!(store.is_empty());
    }

    #[test]
    fn set_with_current_token_succeeds() {
        let store = MemoryStore::new();
        store.set("k", b"1:100", CasToken::ABSENT).unwrap();

        let (value, token) = store.get("k").unwrap();
        assert_eq!(value.as_deref(), Some(&b"1:100"[..]));

        store.set("k", b"2:100", token).unwrap();
        let (value, _) = store.get("k").unwrap();
        assert_eq!(value.as_deref(), Some(&b"2:100"[..]));
    }

    #[test]
    fn stale_token_is_refused() {
        let store = MemoryStore::new();
        store.set("k", b"1:100", CasToken::ABSENT).unwrap();
        let (_, stale) = store.get("k").unwrap();
        store.set("k", b"2:100", stale).unwrap();

        assert_eq!(store.set("k", b"3:100", stale), Err(StoreError::CasMismatch));
        // a second first-seen writer loses too
        assert_eq!(
            store.set("k", b"1:200", CasToken::ABSENT),
            Err(StoreError::CasMismatch)
        );
    }

    #[test]
    fn versioned_token_on_missing_key_is_refused() {
        let store = MemoryStore::new();
        assert_eq!(
            store.set("k", b"1:1", CasToken::new(7)),
            Err(StoreError::CasMismatch)
        );
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn idle_entries_are_evicted() {
        let store = MemoryStore::new();
        for i in 0..100 {
            store.set(&format!("10.0.{}.1", i), b"1:0", CasToken::ABSENT).unwrap();
        }
        std::thread::sleep(Duration::from_millis(20));
        store.set("10.9.9.9", b"1:0", CasToken::ABSENT).unwrap();

        assert_eq!(store.evict_idle(Duration::from_millis(10)), 100);
        assert_eq!(store.len(), 1);
        assert!(store.get("10.9.9.9").unwrap().0.is_some());
    }

    #[test]
    fn stale_token_after_eviction_is_refused() {
        let store = MemoryStore::new();
        store.set("k", b"1:0", CasToken::ABSENT).unwrap();
        let (_, token) = store.get("k").unwrap();
        assert_eq!(store.evict_idle(Duration::ZERO), 1);

        assert_eq!(store.set("k", b"2:0", token), Err(StoreError::CasMismatch));
        store.set("k", b"1:5", CasToken::ABSENT).unwrap();

        // the re-created key does not accept the token from before eviction
        assert_ne!(store.get("k").unwrap().1, token);
        assert_eq!(store.set("k", b"2:0", token), Err(StoreError::CasMismatch));
    }

    #[tokio::test]
    async fn expiry_task_sweeps_until_shutdown() {
        let store = MemoryStore::new();
        store.set("a", b"1:0", CasToken::ABSENT).unwrap();
        store.set("b", b"1:0", CasToken::ABSENT).unwrap();

        let (tx, rx) = broadcast::channel(1);
        let task = tokio::spawn(store.clone().run_expiry(
            Duration::from_millis(5),
            Duration::from_millis(10),
            rx,
        ));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(store.is_empty());

        tx.send(()).unwrap();
        task.await.unwrap();
    }

    #[test]
    fn version_skips_absent_on_wrap() {
        assert_eq!(next_version(u32::MAX), 1);
        assert_eq!(next_version(1), 2);
    }
}
