//! Provides the cache groups which tie all the pieces together.
//!
//! A [Group](Group) is a named cache namespace. It owns a bounded in-memory cache, knows how
//! to load missing entries from the user supplied data source and - once peers have been
//! registered - how to fetch entries from the cluster member responsible for a key.
//!
//! # Lookup pipeline
//! Every lookup runs through the same stations:
//!
//! 1. The local cache. A hit is returned immediately.
//! 2. The duplicate suppression: concurrent misses for the same key collapse into a single
//!    load whose result all callers share.
//! 3. The peer election: if a picker is registered and elects a remote node for the key, the
//!    value is fetched from that peer. A peer failure is logged and recovered locally.
//! 4. The local load: the user supplied [Getter](Getter) produces the value which is then
//!    placed in the local cache.
//!
//! Note that values fetched from a peer are **not** placed in the local cache by default -
//! the peer already caches them, and caching them twice would halve the effective capacity
//! of the cluster. Where the extra hop dominates, this can be changed per group via
//! [GroupSettings::cache_peer_results](crate::config::GroupSettings).
//!
//! # The registry
//! Groups are registered process-wide under their unique name and live for the rest of the
//! process. This allows request handlers to simply look their group up by name via
//! [lookup_group](lookup_group) instead of threading references through the application.
//!
//! # Examples
//! ```
//! use ganymede::group::{create_group, GetterFn};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let group = create_group(
//!         "articles",
//!         8 * 1024 * 1024,
//!         GetterFn::new(|key| Ok(format!("article {}", key).into_bytes())),
//!     )
//!     .unwrap();
//!
//!     let value = group.get("42").await.unwrap();
//!     assert_eq!(value.to_string(), "article 42");
//! }
//! ```
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use async_trait::async_trait;

use crate::byteview::ByteView;
use crate::cache::{CacheStats, MemoryCache};
use crate::config::GroupSettings;
use crate::error::{Error, Result};
use crate::peers::{FetchRequest, PeerGetter, PeerPicker};
use crate::singleflight::Singleflight;

lazy_static::lazy_static! {
    /// Keeps all groups of the process. Reads vastly outnumber writes (a group is created
    /// once and looked up per request), hence the reader/writer lock.
    static ref GROUPS: RwLock<HashMap<String, Arc<Group>>> = RwLock::new(HashMap::new());
}

/// Loads a value from the authoritative data source of a group.
///
/// This is the only contract a user of the library has to implement: given a key, produce the
/// bytes of the value (or report why that is impossible). The returned buffer is handed over
/// to the cache and must not be retained by the implementation.
///
/// Implementations must not call back into [Group::get](Group::get) for the **same** key -
/// that lookup would wait on the very load the implementation is currently performing.
/// Lookups for other keys (even in the same group) are safe.
#[async_trait]
pub trait Getter: Send + Sync {
    /// Produces the value for the given key.
    async fn fetch(&self, key: &str) -> anyhow::Result<Vec<u8>>;
}

/// Adapts a plain closure to the [Getter](Getter) trait.
///
/// # Examples
/// ```
/// # use ganymede::group::{Getter, GetterFn};
/// let getter = GetterFn::new(|key| Ok(key.to_uppercase().into_bytes()));
/// ```
pub struct GetterFn<F> {
    callback: F,
}

impl<F> GetterFn<F>
where
    F: Fn(&str) -> anyhow::Result<Vec<u8>> + Send + Sync,
{
    /// Wraps the given closure into a [Getter](Getter).
    pub fn new(callback: F) -> Self {
        GetterFn { callback }
    }
}

#[async_trait]
impl<F> Getter for GetterFn<F>
where
    F: Fn(&str) -> anyhow::Result<Vec<u8>> + Send + Sync,
{
    async fn fetch(&self, key: &str) -> anyhow::Result<Vec<u8>> {
        (self.callback)(key)
    }
}

/// A named cache namespace fronting a single data source.
///
/// Groups are created via [create_group](create_group) or
/// [create_group_with](create_group_with) and are looked up via [lookup_group](lookup_group).
pub struct Group {
    name: String,
    getter: Arc<dyn Getter>,
    main_cache: MemoryCache,
    peers: OnceLock<Arc<dyn PeerPicker>>,
    loader: Singleflight<String, Result<ByteView>>,
    cache_peer_results: bool,
}

/// Creates and registers a new group.
///
/// **max_memory** is the memory budget of the group's cache in bytes (0 = unbounded), the
/// [Getter](Getter) loads entries which are neither cached nor owned by a peer. The group is
/// registered process-wide under its name; registering a second group under the same name is
/// rejected with [Error::GroupExists](crate::error::Error::GroupExists).
pub fn create_group(
    name: impl Into<String>,
    max_memory: usize,
    getter: impl Getter + 'static,
) -> Result<Arc<Group>> {
    create_group_with(
        name,
        GroupSettings {
            max_memory,
            ..GroupSettings::default()
        },
        getter,
    )
}

/// Creates and registers a new group with the given settings.
///
/// Behaves like [create_group](create_group) but permits to control all settings of the
/// group, most notably whether values fetched from peers are placed in the local cache.
pub fn create_group_with(
    name: impl Into<String>,
    settings: GroupSettings,
    getter: impl Getter + 'static,
) -> Result<Arc<Group>> {
    let name = name.into();
    let mut groups = GROUPS.write().unwrap();

    if groups.contains_key(&name) {
        return Err(Error::GroupExists(name));
    }

    let group = Arc::new(Group {
        name: name.clone(),
        getter: Arc::new(getter),
        main_cache: MemoryCache::new(settings.max_memory),
        peers: OnceLock::new(),
        loader: Singleflight::new(),
        cache_peer_results: settings.cache_peer_results,
    });

    log::info!(
        "Created cache group '{}' with a budget of {}...",
        name,
        crate::fmt::format_size(settings.max_memory)
    );
    let _ = groups.insert(name, Arc::clone(&group));

    Ok(group)
}

/// Resolves a previously created group by its name.
pub fn lookup_group(name: &str) -> Option<Arc<Group>> {
    GROUPS.read().unwrap().get(name).cloned()
}

impl Group {
    /// Returns the name under which this group is registered.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Binds this group to a cluster.
    ///
    /// The picker elects, per key, the remote node responsible for it. A picker can only be
    /// registered once - subsequent registrations are ignored with a warning, as silently
    /// swapping the routing of a live group would tear the cluster's cache locality apart.
    pub fn register_peers(&self, peers: Arc<dyn PeerPicker>) {
        if self.peers.set(peers).is_err() {
            log::warn!(
                "A peer picker has already been registered for group '{}'. \
                 Ignoring the repeated registration...",
                self.name
            );
        }
    }

    /// Performs a lookup for the given key.
    ///
    /// A cached value is returned immediately. Otherwise the value is loaded - from the peer
    /// owning the key if this group is clustered, from the data source otherwise - while
    /// concurrent lookups for the same key share a single load.
    ///
    /// # Errors
    /// Fails with [Error::EmptyKey](crate::error::Error::EmptyKey) for an empty key and with
    /// [Error::SourceError](crate::error::Error::SourceError) if the data source reports an
    /// error. In the latter case nothing is cached, so a retry starts a fresh load.
    pub async fn get(&self, key: &str) -> Result<ByteView> {
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }

        if let Some(value) = self.main_cache.get(key) {
            log::debug!("Cache hit for '{}' in group '{}'...", key, self.name);
            return Ok(value);
        }

        self.load(key).await
    }

    /// Loads the value for the given key, collapsing concurrent loads into one.
    async fn load(&self, key: &str) -> Result<ByteView> {
        self.loader
            .execute(key.to_owned(), || async {
                if let Some(picker) = self.peers.get() {
                    if let Some(peer) = picker.pick_peer(key) {
                        match self.fetch_from_peer(peer.as_ref(), key).await {
                            Ok(value) => {
                                if self.cache_peer_results {
                                    self.main_cache.insert(key, value.clone());
                                }
                                return Ok(value);
                            }
                            Err(error) => log::warn!(
                                "Group '{}': {}. Falling back to the local data source...",
                                self.name,
                                error
                            ),
                        }
                    }
                }

                self.load_locally(key).await
            })
            .await
    }

    /// Fetches the value for the given key from the elected peer.
    async fn fetch_from_peer(&self, peer: &dyn PeerGetter, key: &str) -> Result<ByteView> {
        let request = FetchRequest {
            group: self.name.clone(),
            key: key.to_owned(),
        };

        match peer.fetch(request).await {
            Ok(response) => Ok(ByteView::from(response.value)),
            Err(error) => Err(Error::PeerError {
                key: key.to_owned(),
                message: error.to_string(),
            }),
        }
    }

    /// Loads the value for the given key from the data source and places it in the cache.
    async fn load_locally(&self, key: &str) -> Result<ByteView> {
        let bytes = self
            .getter
            .fetch(key)
            .await
            .map_err(|error| Error::SourceError {
                key: key.to_owned(),
                message: error.to_string(),
            })?;

        let value = ByteView::from(bytes);
        self.main_cache.insert(key, value.clone());

        Ok(value)
    }

    /// Provides a snapshot of the state and metrics of this group's cache.
    pub fn stats(&self) -> CacheStats {
        self.main_cache.stats()
    }
}
