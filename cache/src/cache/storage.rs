use super::{Config, Stats};
use crate::{store::Store, Block, Error, BLOCK_SIZE};
use prometheus_client::{
    metrics::{counter::Counter, gauge::Gauge},
    registry::Registry,
};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, trace, warn};

/// A resident block.
struct Entry {
    /// Id of the block in the [Store].
    block: u64,

    /// Value of the access counter when the block was last read or written.
    last_access: u64,

    /// Whether `data` has diverged from what the [Store] holds for `block`.
    dirty: bool,

    /// The cached block itself.
    data: Box<Block>,
}

impl Entry {
    /// Create an entry with a freshly allocated (zeroed) buffer.
    fn alloc() -> Result<Self, Error> {
        let mut data = Vec::new();
        data.try_reserve_exact(BLOCK_SIZE)
            .map_err(|_| Error::AllocationFailed)?;
        data.resize(BLOCK_SIZE, 0u8);
        let data: Box<Block> = data
            .into_boxed_slice()
            .try_into()
            .map_err(|_| Error::AllocationFailed)?;
        Ok(Self {
            block: 0,
            last_access: 0,
            dirty: false,
            data,
        })
    }
}

struct Metrics {
    hits: Counter,
    misses: Counter,
    evictions: Counter,
    writebacks: Counter,
    resident: Gauge,
    dirty: Gauge,
}

impl Metrics {
    fn new(registry: &mut Registry) -> Self {
        let metrics = Self {
            hits: Counter::default(),
            misses: Counter::default(),
            evictions: Counter::default(),
            writebacks: Counter::default(),
            resident: Gauge::default(),
            dirty: Gauge::default(),
        };
        registry.register(
            "hits",
            "Number of reads served from the cache",
            metrics.hits.clone(),
        );
        registry.register(
            "misses",
            "Number of reads that had to go to the store",
            metrics.misses.clone(),
        );
        registry.register(
            "evictions",
            "Number of blocks evicted to make room for another",
            metrics.evictions.clone(),
        );
        registry.register(
            "writebacks",
            "Number of dirty blocks written back on eviction",
            metrics.writebacks.clone(),
        );
        registry.register(
            "resident",
            "Number of resident blocks",
            metrics.resident.clone(),
        );
        registry.register(
            "dirty",
            "Number of resident dirty blocks",
            metrics.dirty.clone(),
        );
        metrics
    }
}

/// Fixed-capacity, write-back block cache in front of a [Store].
///
/// Resident blocks live in `entries` (never more than `capacity` of them). `index` maps a block id
/// to its slot in `entries` and `recency` maps each slot's last access stamp back to the slot, so
/// the least recently used block is always the first key of `recency`.
///
/// Dropping the cache flushes every dirty block. Errors encountered while doing so are logged and
/// otherwise ignored; use [Cache::close] to observe them.
pub struct Cache<S: Store> {
    store: S,

    /// Resident blocks. Slots are reused on eviction, so buffers are only allocated while the
    /// cache is filling up.
    entries: Vec<Entry>,

    /// Block id to slot in `entries`.
    index: HashMap<u64, usize>,

    /// Last access stamp to slot in `entries`.
    recency: BTreeMap<u64, usize>,

    /// Maximum number of resident blocks.
    capacity: usize,

    /// Last stamp handed out.
    access_counter: u64,

    metrics: Metrics,
}

impl<S: Store> Cache<S> {
    /// Create an empty cache in front of `store`, registering its metrics in `registry`.
    pub fn init(store: S, cfg: Config, registry: &mut Registry) -> Result<Self, Error> {
        let capacity = cfg.capacity.get();
        let mut entries = Vec::new();
        entries
            .try_reserve_exact(capacity)
            .map_err(|_| Error::AllocationFailed)?;
        let mut index = HashMap::new();
        index
            .try_reserve(capacity)
            .map_err(|_| Error::AllocationFailed)?;

        Ok(Self {
            store,
            entries,
            index,
            recency: BTreeMap::new(),
            capacity,
            access_counter: 0,
            metrics: Metrics::new(registry),
        })
    }

    /// Read `block` into the first [BLOCK_SIZE] bytes of `buf`.
    ///
    /// On a miss the block is fetched from the [Store] (evicting the least recently used block if
    /// the cache is full). A miss is counted even if fetching fails.
    pub fn read(&mut self, block: u64, buf: &mut [u8]) -> Result<(), Error> {
        let buf = block_mut(buf)?;

        if let Some(&slot) = self.index.get(&block) {
            self.touch(slot);
            buf.copy_from_slice(&self.entries[slot].data[..]);
            self.metrics.hits.inc();
            trace!(block, "hit");
            return Ok(());
        }

        self.metrics.misses.inc();
        trace!(block, "miss");
        let slot = self.reserve()?;
        if let Err(err) = self.store.read(block, &mut self.entries[slot].data) {
            self.discard(slot);
            return Err(err);
        }
        self.entries[slot].dirty = false;
        self.admit(slot, block);
        buf.copy_from_slice(&self.entries[slot].data[..]);
        Ok(())
    }

    /// Write the first [BLOCK_SIZE] bytes of `buf` to `block`.
    ///
    /// The block is only updated in memory (and marked dirty). A write miss never reads from the
    /// [Store], but it may need to write back an evicted block.
    pub fn write(&mut self, block: u64, buf: &[u8]) -> Result<(), Error> {
        let buf = block_ref(buf)?;

        let slot = match self.index.get(&block) {
            Some(&slot) => {
                self.touch(slot);
                slot
            }
            None => {
                let slot = self.reserve()?;
                self.admit(slot, block);
                slot
            }
        };

        let entry = &mut self.entries[slot];
        entry.data.copy_from_slice(buf);
        if !entry.dirty {
            entry.dirty = true;
            self.metrics.dirty.inc();
        }
        Ok(())
    }

    /// Write every dirty block back to the [Store].
    ///
    /// Stops at the first failure: blocks written before it are clean, the failing block and any
    /// not yet visited stay dirty. Access stamps and statistics are left untouched.
    pub fn flush(&mut self) -> Result<(), Error> {
        let mut flushed = 0;
        for entry in self.entries.iter_mut().filter(|entry| entry.dirty) {
            if let Err(err) = self.store.write(entry.block, &entry.data) {
                warn!(block = entry.block, ?err, "flush failed");
                return Err(err);
            }
            entry.dirty = false;
            self.metrics.dirty.dec();
            flushed += 1;
        }
        debug!(flushed, "flushed cache");
        Ok(())
    }

    /// Flush all dirty blocks and release the cache, returning the outcome of the flush.
    ///
    /// Resident blocks are released even if the flush fails.
    pub fn close(mut self) -> Result<(), Error> {
        let result = self.flush();
        self.release();
        result
    }

    /// Hits and misses observed so far.
    pub fn stats(&self) -> Stats {
        Stats {
            hits: self.metrics.hits.get(),
            misses: self.metrics.misses.get(),
        }
    }

    /// Number of resident blocks.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether no blocks are resident.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Maximum number of resident blocks.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether `block` is resident.
    pub fn contains(&self, block: u64) -> bool {
        self.index.contains_key(&block)
    }

    /// Whether `block` is dirty, or `None` if it is not resident.
    pub fn is_dirty(&self, block: u64) -> Option<bool> {
        self.index.get(&block).map(|&slot| self.entries[slot].dirty)
    }

    /// Number of resident dirty blocks.
    pub fn dirty(&self) -> usize {
        self.entries.iter().filter(|entry| entry.dirty).count()
    }

    /// The [Store] behind the cache.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Hand out the next access stamp.
    fn tick(&mut self) -> u64 {
        self.access_counter += 1;
        self.access_counter
    }

    /// Mark the block in `slot` as the most recently used.
    fn touch(&mut self, slot: usize) {
        let stamp = self.tick();
        let entry = &mut self.entries[slot];
        self.recency.remove(&entry.last_access);
        entry.last_access = stamp;
        self.recency.insert(stamp, slot);
    }

    /// Obtain a slot for a block that is not resident.
    ///
    /// The returned slot is detached: it is not reachable through `index` or `recency` until
    /// [Self::admit] is called (or it is dropped by [Self::discard]). If the cache is full, the
    /// least recently used block is evicted, writing it back first if dirty. If that write fails,
    /// nothing changes and the error is returned.
    fn reserve(&mut self) -> Result<usize, Error> {
        if self.entries.len() < self.capacity {
            self.entries.push(Entry::alloc()?);
            return Ok(self.entries.len() - 1);
        }

        // Cache is full, evict the least recently used block.
        let Some((&stamp, &slot)) = self.recency.first_key_value() else {
            unreachable!("full cache has no resident blocks");
        };
        let victim = &mut self.entries[slot];
        if victim.dirty {
            if let Err(err) = self.store.write(victim.block, &victim.data) {
                warn!(block = victim.block, ?err, "write-back failed, keeping block");
                return Err(err);
            }
            victim.dirty = false;
            self.metrics.dirty.dec();
            self.metrics.writebacks.inc();
        }
        self.recency.remove(&stamp);
        assert_eq!(self.index.remove(&victim.block), Some(slot));
        self.metrics.evictions.inc();
        debug!(block = victim.block, last_access = stamp, "evicted block");
        Ok(slot)
    }

    /// Make the detached `slot` resident as `block`.
    fn admit(&mut self, slot: usize, block: u64) {
        let stamp = self.tick();
        let entry = &mut self.entries[slot];
        entry.block = block;
        entry.last_access = stamp;
        self.index.insert(block, slot);
        self.recency.insert(stamp, slot);
        self.metrics.resident.set(self.index.len() as i64);
    }

    /// Drop the detached `slot` (and its buffer).
    fn discard(&mut self, slot: usize) {
        self.entries.swap_remove(slot);
        if let Some(moved) = self.entries.get(slot) {
            self.index.insert(moved.block, slot);
            self.recency.insert(moved.last_access, slot);
        }
        self.metrics.resident.set(self.index.len() as i64);
    }

    /// Release every resident block without writing anything back.
    fn release(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.recency.clear();
        self.metrics.resident.set(0);
        self.metrics.dirty.set(0);
    }

    /// Assert the structural invariants of the cache.
    #[cfg(test)]
    pub(super) fn check_invariants(&self) {
        use std::collections::HashSet;

        assert!(self.entries.len() <= self.capacity);
        assert_eq!(self.entries.len(), self.index.len());
        assert_eq!(self.entries.len(), self.recency.len());
        let mut stamps = HashSet::new();
        for (slot, entry) in self.entries.iter().enumerate() {
            assert_eq!(entry.data.len(), BLOCK_SIZE);
            assert_eq!(self.index.get(&entry.block), Some(&slot));
            assert_eq!(self.recency.get(&entry.last_access), Some(&slot));
            assert!(entry.last_access <= self.access_counter);
            assert!(stamps.insert(entry.last_access));
        }
        assert_eq!(self.metrics.resident.get(), self.len() as i64);
        assert_eq!(self.metrics.dirty.get(), self.dirty() as i64);
    }

    /// Block id of the next eviction victim.
    #[cfg(test)]
    pub(super) fn lru(&self) -> Option<u64> {
        self.recency
            .first_key_value()
            .map(|(_, &slot)| self.entries[slot].block)
    }
}

impl<S: Store> Drop for Cache<S> {
    fn drop(&mut self) {
        if let Err(err) = self.flush() {
            warn!(?err, "failed to flush cache on drop");
        }
        self.release();
    }
}

/// View the first [BLOCK_SIZE] bytes of `buf` as a [Block].
fn block_ref(buf: &[u8]) -> Result<&Block, Error> {
    buf.get(..BLOCK_SIZE)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(Error::BufferTooSmall(buf.len()))
}

/// View the first [BLOCK_SIZE] bytes of `buf` as a mutable [Block].
fn block_mut(buf: &mut [u8]) -> Result<&mut Block, Error> {
    let len = buf.len();
    buf.get_mut(..BLOCK_SIZE)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(Error::BufferTooSmall(len))
}
