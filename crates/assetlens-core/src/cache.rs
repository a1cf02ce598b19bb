//! Bounded, recency-ordered asset cache
//!
//! Assets live in a slot arena. Recency links are slot indices, so an entry
//! evicted or invalidated while another task holds its `Arc<Asset>` never
//! leaves a dangling link behind.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use assetlens_api::Asset;

/// Arena slot holding one asset and its recency links
#[derive(Debug)]
struct Slot {
    asset: Arc<Asset>,
    /// Neighbor towards the most-recent end
    prev: Option<usize>,
    /// Neighbor towards the least-recent end
    next: Option<usize>,
}

/// LRU index of assets keyed by IP address
///
/// Not synchronized; [`CacheStore`] wraps it in a single lock.
#[derive(Debug)]
pub struct AssetLru {
    capacity: usize,
    slots: Vec<Option<Slot>>,
    free: Vec<usize>,
    index: HashMap<String, usize>,
    most_recent: Option<usize>,
    least_recent: Option<usize>,
}

impl AssetLru {
    /// Create an empty cache holding at most `capacity` assets
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            most_recent: None,
            least_recent: None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn contains(&self, ip: &str) -> bool {
        self.index.contains_key(ip)
    }

    /// Look up an asset and mark it most recently used
    pub fn get(&mut self, ip: &str) -> Option<Arc<Asset>> {
        let idx = *self.index.get(ip)?;
        self.detach(idx);
        self.attach_most_recent(idx);
        Some(self.slot(idx).asset.clone())
    }

    /// Insert an asset at the most-recent end
    ///
    /// Returns the IP evicted to make room, if any. With capacity zero the
    /// inserted asset itself is evicted. An asset whose IP is already cached
    /// replaces the resident record without evicting anything.
    pub fn insert(&mut self, asset: Arc<Asset>) -> Option<String> {
        if self.capacity == 0 {
            return Some(asset.ip_address.clone());
        }

        if let Some(&idx) = self.index.get(&asset.ip_address) {
            self.slot_mut(idx).asset = asset;
            self.detach(idx);
            self.attach_most_recent(idx);
            return None;
        }

        let evicted = if self.index.len() >= self.capacity {
            self.pop_least_recent().map(|old| old.ip_address.clone())
        } else {
            None
        };

        let ip = asset.ip_address.clone();
        let idx = self.allocate(Slot {
            asset,
            prev: None,
            next: None,
        });
        self.attach_most_recent(idx);
        self.index.insert(ip, idx);

        evicted
    }

    /// Remove an asset; no-op if absent
    pub fn remove(&mut self, ip: &str) -> Option<Arc<Asset>> {
        let idx = self.index.remove(ip)?;
        self.detach(idx);
        Some(self.release(idx).asset)
    }

    /// Cached IPs from most to least recently used
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(self.len());
        let mut cursor = self.most_recent;
        while let Some(idx) = cursor {
            let slot = self.slot(idx);
            keys.push(slot.asset.ip_address.clone());
            cursor = slot.next;
        }
        keys
    }

    fn slot(&self, idx: usize) -> &Slot {
        self.slots[idx]
            .as_ref()
            .unwrap_or_else(|| unreachable!("linked slot {idx} is vacant"))
    }

    fn slot_mut(&mut self, idx: usize) -> &mut Slot {
        self.slots[idx]
            .as_mut()
            .unwrap_or_else(|| unreachable!("linked slot {idx} is vacant"))
    }

    fn allocate(&mut self, slot: Slot) -> usize {
        if let Some(idx) = self.free.pop() {
            self.slots[idx] = Some(slot);
            idx
        } else {
            self.slots.push(Some(slot));
            self.slots.len() - 1
        }
    }

    fn release(&mut self, idx: usize) -> Slot {
        let slot = self.slots[idx]
            .take()
            .unwrap_or_else(|| unreachable!("released slot {idx} is vacant"));
        self.free.push(idx);
        slot
    }

    /// Unlink a slot, patching its neighbors and the list ends
    fn detach(&mut self, idx: usize) {
        let (prev, next) = {
            let slot = self.slot_mut(idx);
            (slot.prev.take(), slot.next.take())
        };

        match prev {
            Some(p) => self.slot_mut(p).next = next,
            None => self.most_recent = next,
        }
        match next {
            Some(n) => self.slot_mut(n).prev = prev,
            None => self.least_recent = prev,
        }
    }

    fn attach_most_recent(&mut self, idx: usize) {
        let old = self.most_recent;
        {
            let slot = self.slot_mut(idx);
            slot.prev = None;
            slot.next = old;
        }
        match old {
            Some(o) => self.slot_mut(o).prev = Some(idx),
            None => self.least_recent = Some(idx),
        }
        self.most_recent = Some(idx);
    }

    fn pop_least_recent(&mut self) -> Option<Arc<Asset>> {
        let idx = self.least_recent?;
        self.detach(idx);
        let slot = self.release(idx);
        self.index.remove(&slot.asset.ip_address);
        Some(slot.asset)
    }

    /// Check that the index and the recency list hold the same entries
    #[cfg(test)]
    fn validate_invariants(&self) {
        assert!(self.len() <= self.capacity, "over capacity");

        let mut count = 0;
        let mut prev = None;
        let mut cursor = self.most_recent;
        while let Some(idx) = cursor {
            let slot = self.slot(idx);
            assert_eq!(slot.prev, prev, "broken back link at slot {idx}");
            assert_eq!(self.index.get(&slot.asset.ip_address), Some(&idx));
            count += 1;
            prev = Some(idx);
            cursor = slot.next;
        }

        assert_eq!(prev, self.least_recent, "tail mismatch");
        assert_eq!(count, self.index.len(), "list and index disagree");
        assert_eq!(
            self.slots.iter().filter(|s| s.is_none()).count(),
            self.free.len()
        );
    }
}

/// Result of applying one poll cycle to the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invalidation {
    /// Checkpoint after the update
    pub checkpoint: i64,
    /// Whether the checkpoint moved
    pub advanced: bool,
    /// Number of cached assets dropped
    pub removed: usize,
}

#[derive(Debug)]
struct CacheState {
    lru: AssetLru,
    checkpoint: i64,
}

/// Thread-safe asset cache plus change-feed checkpoint
///
/// Every operation runs under one lock: list patches touch neighbors, so
/// finer-grained locking is not safe.
#[derive(Debug)]
pub struct CacheStore {
    capacity: usize,
    state: Mutex<CacheState>,
}

impl CacheStore {
    /// Create an empty store with checkpoint zero
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(CacheState {
                lru: AssetLru::new(capacity),
                checkpoint: 0,
            }),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.lru.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.lru.is_empty()
    }

    /// Check presence without touching recency
    pub async fn contains(&self, ip: &str) -> bool {
        self.state.lock().await.lru.contains(ip)
    }

    /// Cached IPs from most to least recently used
    pub async fn keys(&self) -> Vec<String> {
        self.state.lock().await.lru.keys()
    }

    /// Look up an asset, refreshing its recency on hit
    pub async fn lookup(&self, ip: &str) -> Option<Arc<Asset>> {
        self.state.lock().await.lru.get(ip)
    }

    /// Insert an asset, returning the evicted IP if capacity was reached
    pub async fn insert(&self, asset: Asset) -> Option<String> {
        let evicted = self.state.lock().await.lru.insert(Arc::new(asset));
        if let Some(ip) = &evicted {
            debug!(%ip, "evicted least recently used asset");
        }
        evicted
    }

    /// Return the cached asset for this IP, inserting `asset` if there is none
    pub async fn get_or_insert(&self, asset: Asset) -> Arc<Asset> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.lru.get(&asset.ip_address) {
            return existing;
        }

        let asset = Arc::new(asset);
        if let Some(ip) = state.lru.insert(asset.clone()) {
            debug!(%ip, "evicted least recently used asset");
        }
        asset
    }

    /// Drop an asset from the cache; returns whether it was present
    pub async fn remove(&self, ip: &str) -> bool {
        self.state.lock().await.lru.remove(ip).is_some()
    }

    /// Highest change-feed id fully processed
    pub async fn checkpoint(&self) -> i64 {
        self.state.lock().await.checkpoint
    }

    /// Raise the checkpoint to `id`; lower values are ignored
    pub async fn advance_checkpoint(&self, id: i64) -> i64 {
        let mut state = self.state.lock().await;
        state.checkpoint = state.checkpoint.max(id);
        state.checkpoint
    }

    /// Advance the checkpoint and drop invalidated IPs in one critical section
    pub async fn apply_invalidations(&self, head_id: Option<i64>, ips: &[String]) -> Invalidation {
        let mut state = self.state.lock().await;

        let advanced = match head_id {
            Some(id) if id > state.checkpoint => {
                state.checkpoint = id;
                true
            }
            _ => false,
        };

        let removed = ips
            .iter()
            .filter(|ip| state.lru.remove(ip).is_some())
            .count();

        Invalidation {
            checkpoint: state.checkpoint,
            advanced,
            removed,
        }
    }
}
