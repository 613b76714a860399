//! Sharded in-memory record tables.
//!
//! Every shared table in this crate (users, sessions, rate-limit entries,
//! lockout state) lives in a [`MemoryTable`]: a key-indexed map split across
//! shards, each guarded by its own `tokio::sync::RwLock`. A logical operation
//! on one record runs as a single closure under that record's shard write
//! lock, so read-modify-write sequences are atomic per key without a global
//! lock. An alternative storage backend replaces this type behind the same
//! surface.

use std::collections::HashMap;
use std::hash::{BuildHasher, Hash, RandomState};
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::RwLock;

use super::errors::{StoreError, StoreResult};

/// Default shard count for new tables.
const DEFAULT_SHARDS: usize = 8;

/// A bounded, sharded, concurrently accessible record table.
pub struct MemoryTable<K, V> {
    shards: Vec<RwLock<HashMap<K, V>>>,
    hasher: RandomState,
    max_entries: Option<usize>,
    len: AtomicUsize,
}

impl<K, V> MemoryTable<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create an unbounded table with the default shard count.
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_SHARDS, None)
    }

    /// Create a table that refuses inserts beyond `max_entries` records.
    pub fn bounded(max_entries: usize) -> Self {
        Self::with_shards(DEFAULT_SHARDS, Some(max_entries))
    }

    /// Create a table with an explicit shard count and optional entry bound.
    pub fn with_shards(shards: usize, max_entries: Option<usize>) -> Self {
        let shards = shards.max(1);
        Self {
            shards: (0..shards).map(|_| RwLock::new(HashMap::new())).collect(),
            hasher: RandomState::new(),
            max_entries,
            len: AtomicUsize::new(0),
        }
    }

    fn shard(&self, key: &K) -> &RwLock<HashMap<K, V>> {
        &self.shards[self.shard_index(key)]
    }

    fn shard_index(&self, key: &K) -> usize {
        (self.hasher.hash_one(key) as usize) % self.shards.len()
    }

    /// Claim space for one new record, failing when the table is full.
    fn reserve_slot(&self) -> StoreResult<()> {
        let Some(max) = self.max_entries else {
            self.len.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        };
        self.len
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                (n < max).then_some(n + 1)
            })
            .map(|_| ())
            .map_err(|_| StoreError::Capacity { capacity: max })
    }

    fn release_slots(&self, n: usize) {
        if n > 0 {
            self.len.fetch_sub(n, Ordering::Relaxed);
        }
    }

    /// Fetch a copy of the record stored under `key`.
    pub async fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.shard(key).read().await.get(key).cloned()
    }

    /// Insert or replace the record under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Capacity`] when inserting a new key into a full
    /// table. Replacing an existing record never fails.
    pub async fn put(&self, key: K, value: V) -> StoreResult<()> {
        let mut map = self.shard(&key).write().await;
        if !map.contains_key(&key) {
            self.reserve_slot()?;
        }
        map.insert(key, value);
        Ok(())
    }

    /// Insert a record only if `key` is absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] if the key is present and
    /// [`StoreError::Capacity`] if the table is full.
    pub async fn try_insert(&self, key: K, value: V) -> StoreResult<()> {
        let mut map = self.shard(&key).write().await;
        if map.contains_key(&key) {
            return Err(StoreError::Duplicate);
        }
        self.reserve_slot()?;
        map.insert(key, value);
        Ok(())
    }

    /// Insert a record only if `key` is absent and no existing record matches
    /// the `conflicts` predicate.
    ///
    /// Takes every shard lock in index order so the cross-record uniqueness
    /// check and the insert happen as one atomic step. Intended for
    /// low-frequency writes such as registration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] on a key or predicate conflict and
    /// [`StoreError::Capacity`] if the table is full.
    pub async fn insert_unique<F>(&self, key: K, value: V, conflicts: F) -> StoreResult<()>
    where
        F: Fn(&V) -> bool,
    {
        let mut guards = Vec::with_capacity(self.shards.len());
        for shard in &self.shards {
            guards.push(shard.write().await);
        }
        if guards.iter().any(|map| map.contains_key(&key)) {
            return Err(StoreError::Duplicate);
        }
        if guards.iter().any(|map| map.values().any(&conflicts)) {
            return Err(StoreError::Duplicate);
        }
        self.reserve_slot()?;
        let index = self.shard_index(&key);
        guards[index].insert(key, value);
        Ok(())
    }

    /// Run `op` against the record under `key` as one atomic critical
    /// section, returning its result, or `None` if the key is absent.
    pub async fn update<F, R>(&self, key: &K, op: F) -> Option<R>
    where
        F: FnOnce(&mut V) -> R,
    {
        let mut map = self.shard(key).write().await;
        map.get_mut(key).map(op)
    }

    /// Run `op` against the record under `key`, creating it with `init`
    /// first when absent. The init-and-update pair is a single atomic
    /// critical section; `op` receives `true` when the record is fresh.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Capacity`] when the record is absent and the
    /// table is full; `op` is not run in that case.
    pub async fn update_or_insert<I, F, R>(&self, key: &K, init: I, op: F) -> StoreResult<R>
    where
        I: FnOnce() -> V,
        F: FnOnce(&mut V, bool) -> R,
    {
        let mut map = self.shard(key).write().await;
        if let Some(value) = map.get_mut(key) {
            return Ok(op(value, false));
        }
        self.reserve_slot()?;
        let value = map.entry(key.clone()).or_insert_with(init);
        Ok(op(value, true))
    }

    /// Remove the record under `key`, reporting whether one existed.
    pub async fn delete(&self, key: &K) -> bool {
        let removed = self.shard(key).write().await.remove(key).is_some();
        if removed {
            self.release_slots(1);
        }
        removed
    }

    /// Remove every record matching `dead`, shard by shard, returning the
    /// number removed. A concurrent reader sees each shard either fully
    /// swept or untouched.
    pub async fn sweep<F>(&self, mut dead: F) -> usize
    where
        F: FnMut(&V) -> bool,
    {
        let mut removed = 0;
        for shard in &self.shards {
            let mut map = shard.write().await;
            let before = map.len();
            map.retain(|_, value| !dead(value));
            removed += before - map.len();
        }
        self.release_slots(removed);
        removed
    }

    /// Remove the record whose `rank` value is smallest, returning its key.
    ///
    /// Best effort under concurrency: the minimum is chosen under shard read
    /// locks and may have been removed by the time it is deleted. Used to
    /// evict the oldest-idle entry from a full table.
    pub async fn evict_min_by<F, T>(&self, mut rank: F) -> Option<K>
    where
        F: FnMut(&V) -> T,
        T: Ord,
    {
        let mut min: Option<(K, T)> = None;
        for shard in &self.shards {
            let map = shard.read().await;
            for (key, value) in map.iter() {
                let r = rank(value);
                if min.as_ref().is_none_or(|(_, best)| r < *best) {
                    min = Some((key.clone(), r));
                }
            }
        }
        let (key, _) = min?;
        self.delete(&key).await.then_some(key)
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// Whether the table holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Default for MemoryTable<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
