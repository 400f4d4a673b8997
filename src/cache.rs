//! Provides the thread-safe cache used by each group.
//!
//! This wraps the [LruCache](crate::lru::LruCache) in a mutex so that many concurrent lookups
//! can share it. Note that an exclusive lock is used on purpose: even a read has to update the
//! recency order of the underlying cache, so a shared lock would not buy anything here. All
//! operations only hold the lock for a handful of pointer operations.
//!
//! The inner cache is constructed lazily on the first write. A group which never sees a miss
//! (or which is never used at all) therefore doesn't allocate any cache structures.
use std::sync::Mutex;

use crate::byteview::ByteView;
use crate::fmt::format_size;
use crate::lru::LruCache;

/// A thread-safe, lazily initialized LRU cache for [ByteView](ByteView) values.
///
/// # Examples
/// ```
/// # use ganymede::cache::MemoryCache;
/// # use ganymede::byteview::ByteView;
/// let cache = MemoryCache::new(1024);
///
/// // A lookup on an untouched cache simply misses...
/// assert_eq!(cache.get("foo"), None);
///
/// // ...once a value has been inserted, it can be read back.
/// cache.insert("foo", ByteView::from("bar"));
/// assert_eq!(cache.get("foo").unwrap().to_string(), "bar");
/// ```
pub struct MemoryCache {
    lru: Mutex<Option<LruCache<ByteView>>>,
    max_memory: usize,
}

/// A point in time snapshot of the state and metrics of a [MemoryCache](MemoryCache).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    /// The number of resident entries.
    pub entries: usize,
    /// The memory in bytes allocated by the resident keys and values.
    pub allocated_memory: usize,
    /// The memory budget of the cache (0 = unbounded).
    pub max_memory: usize,
    /// The total number of lookups.
    pub reads: usize,
    /// The total number of writes.
    pub writes: usize,
    /// The number of lookups which hit a resident entry.
    pub hits: usize,
}

impl CacheStats {
    /// Returns the cache hit rate in percent.
    pub fn hit_rate(&self) -> f32 {
        match self.reads {
            0 => 0.,
            n => self.hits as f32 / n as f32 * 100.,
        }
    }
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} entries, {} of {} used, {:.2} % hit rate",
            self.entries,
            format_size(self.allocated_memory),
            format_size(self.max_memory),
            self.hit_rate()
        )
    }
}

impl MemoryCache {
    /// Creates a new cache with the given memory budget in bytes (0 = unbounded).
    ///
    /// Note that no memory is allocated until the first value is inserted.
    pub fn new(max_memory: usize) -> Self {
        MemoryCache {
            lru: Mutex::new(None),
            max_memory,
        }
    }

    /// Performs a lookup for the given key.
    ///
    /// Returns a clone of the stored view - which is cheap, as only a reference counter is
    /// bumped. A lookup on a cache which has not seen any write yet reports a miss without
    /// initializing the underlying storage.
    pub fn get(&self, key: &str) -> Option<ByteView> {
        match self.lru.lock().unwrap().as_mut() {
            Some(lru) => lru.get(key).cloned(),
            None => None,
        }
    }

    /// Stores the given value for the given key.
    ///
    /// The first insert constructs the underlying LRU cache with the budget given to
    /// [new](MemoryCache::new).
    pub fn insert(&self, key: &str, value: ByteView) {
        self.lru
            .lock()
            .unwrap()
            .get_or_insert_with(|| LruCache::new(self.max_memory))
            .put(key.to_owned(), value);
    }

    /// Returns the memory budget of this cache (0 = unbounded).
    pub fn max_memory(&self) -> usize {
        self.max_memory
    }

    /// Provides a snapshot of the current state and metrics of this cache.
    ///
    /// # Examples
    /// ```
    /// # use ganymede::cache::MemoryCache;
    /// # use ganymede::byteview::ByteView;
    /// let cache = MemoryCache::new(1024);
    /// cache.insert("foo", ByteView::from("bar"));
    /// let _ = cache.get("foo");
    /// let _ = cache.get("unknown");
    ///
    /// let stats = cache.stats();
    /// assert_eq!(stats.entries, 1);
    /// assert_eq!(stats.reads, 2);
    /// assert_eq!(stats.hits, 1);
    /// assert_eq!(stats.hit_rate().round() as i32, 50);
    /// ```
    pub fn stats(&self) -> CacheStats {
        match self.lru.lock().unwrap().as_ref() {
            Some(lru) => CacheStats {
                entries: lru.len(),
                allocated_memory: lru.allocated_memory(),
                max_memory: self.max_memory,
                reads: lru.reads(),
                writes: lru.writes(),
                hits: lru.hits(),
            },
            None => CacheStats {
                max_memory: self.max_memory,
                ..CacheStats::default()
            },
        }
    }
}
