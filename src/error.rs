//! Error types for the public surface of the library.
//!
//! Collaborator callbacks ([Getter](crate::group::Getter),
//! [PeerGetter](crate::peers::PeerGetter)) report their failures as **anyhow::Error** so that
//! data sources and transports can surface whatever went wrong without ceremony. At the library
//! surface these are converted into the typed [Error] below, which callers can match on.
//!
//! Note that [Error] is `Clone`: a failed load is fanned out to every caller waiting on the
//! same singleflight execution, so the error must be shareable. Variants therefore carry the
//! rendered message of the underlying failure rather than the failure itself.
use thiserror::Error;

/// Result type alias using the library's [Error] type.
pub type Result<T> = std::result::Result<T, Error>;

/// Enumerates the errors surfaced by group lookups and group registration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A lookup was attempted with an empty key.
    #[error("a cache key must not be empty")]
    EmptyKey,

    /// A group with the given name has already been registered in this process.
    #[error("a group named '{0}' is already registered")]
    GroupExists(String),

    /// The user supplied data source reported an error.
    ///
    /// Nothing is cached in this case, so a subsequent lookup for the same key starts a fresh
    /// load attempt.
    #[error("the data source failed for key '{key}': {message}")]
    SourceError {
        /// The key being loaded when the data source failed.
        key: String,
        /// The rendered message of the underlying failure.
        message: String,
    },

    /// A peer failed to deliver a value (transport error or malformed response).
    ///
    /// Group lookups recover from this error by falling back to the local data source, so it
    /// only surfaces to callers of the peer abstractions themselves.
    #[error("a peer failed to deliver key '{key}': {message}")]
    PeerError {
        /// The key being fetched when the peer failed.
        key: String,
        /// The rendered message of the underlying failure.
        message: String,
    },
}
