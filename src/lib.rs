//! Ganymede is a library providing a distributed read-through cache for immutable data.
//!
//! # Introduction
//! **Ganymede** organizes cached data into independent named namespaces called **groups**. Each
//! group fronts a user supplied data source and answers lookups from a bounded in-memory cache
//! which evicts its least recently used entries once a configurable memory budget is exceeded.
//!
//! When a lookup misses the local cache, the group resolves it through a fixed pipeline: if the
//! group participates in a cluster, a consistent-hash ring elects the peer responsible for the
//! key and the value is fetched remotely. If no peer is responsible (or the peer fails), the
//! user supplied callback loads the value from the original data source and the result is placed
//! in the local cache.
//!
//! The expensive part of a miss is protected against thundering herds: concurrent lookups for
//! the same key are collapsed into a single upstream fetch whose result is shared by all callers
//! (see [singleflight](crate::singleflight)). This matters for **hotkeys** - keys which suddenly
//! receive many concurrent misses, e.g. after a cache restart or a viral access pattern.
//!
//! # Modules
//! * **group**: The heart of the library. A [Group](crate::group::Group) combines the local
//!   cache, the duplicate suppression and the peer routing into a single lookup pipeline. Groups
//!   are registered process-wide and can be obtained from everywhere via
//!   [lookup_group](crate::group::lookup_group).
//! * **lru**: A size constrained LRU cache which tracks the memory allocated by its keys and
//!   values and evicts the least recently used entries once a budget is exceeded.
//! * **cache**: A thread-safe wrapper around the LRU cache which is lazily initialized on the
//!   first write.
//! * **singleflight**: Collapses concurrent invocations for the same key into a single execution
//!   whose result is fanned out to all callers.
//! * **ring**: A consistent-hash ring with virtual nodes which deterministically maps keys to
//!   cluster nodes.
//! * **peers**: The abstractions via which a group talks to its cluster, along with a ring-backed
//!   default implementation.
//! * **byteview**: The immutable byte payload handed out by the cache.
//! * **config**: YAML based settings for groups and the cluster, supporting common size
//!   suffixes like `64m` or `1g`.
//!
//! # Example
//! ```
//! use ganymede::group::{create_group, GetterFn};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     // Create a group which loads missing entries from a (here: synthetic) data source and
//!     // keeps up to 64 KiB of hot entries in memory...
//!     let group = create_group(
//!         "descriptions",
//!         64 * 1024,
//!         GetterFn::new(|key| Ok(format!("description of {}", key).into_bytes())),
//!     )
//!     .unwrap();
//!
//!     // The first lookup invokes the data source...
//!     let value = group.get("tea-pot").await.unwrap();
//!     assert_eq!(value.to_string(), "description of tea-pot");
//!
//!     // ...subsequent lookups are served from the cache.
//!     let value = group.get("tea-pot").await.unwrap();
//!     assert_eq!(value.to_string(), "description of tea-pot");
//! }
//! ```
#![deny(
    warnings,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_results
)]
use simplelog::{format_description, ConfigBuilder, LevelFilter, SimpleLogger};
use std::sync::Once;

pub mod byteview;
pub mod cache;
pub mod config;
pub mod error;
pub mod fmt;
pub mod group;
pub mod lru;
pub mod peers;
pub mod ring;
pub mod singleflight;

/// Contains the version of the Ganymede library.
pub const GANYMEDE_VERSION: &str = "DEVELOPMENT-SNAPSHOT";

/// Contains the git commit hash of the Ganymede build being used.
pub const GANYMEDE_REVISION: &str = "NO-REVISION";

/// Initializes the logging system.
///
/// Logs are written to stdout which is all that is needed when running inside a container. Note
/// that this function is idempotent and can therefore be safely invoked from integration tests
/// which run in the same process.
pub fn init_logging() {
    static INIT_LOGGING: Once = Once::new();

    // We need to do this as otherwise integration tests might crash as the logging system
    // is initialized several times...
    INIT_LOGGING.call_once(|| {
        if let Err(error) = SimpleLogger::init(
            LevelFilter::Debug,
            ConfigBuilder::new()
                .set_time_format_custom(format_description!(
                    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]"
                ))
                .set_thread_level(LevelFilter::Trace)
                .set_target_level(LevelFilter::Error)
                .set_location_level(LevelFilter::Trace)
                .build(),
        ) {
            panic!("Failed to initialize logging system: {}", error);
        }
    });
}

#[cfg(test)]
mod testing {
    /// Executes async code within a single threaded tokio runtime.
    pub fn test_async<F: std::future::Future>(future: F) {
        use tokio::runtime;

        let rt = runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let _ = rt.block_on(future);
    }
}
