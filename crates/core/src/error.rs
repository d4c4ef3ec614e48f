//! Unified error types for larder.
//!
//! Every failure the worker can observe maps onto one of these variants.
//! Only `InstallFailed` is allowed to surface out of an event handler; the
//! rest are absorbed at their call sites (logged, with a safe default taken).

use tokio_rusqlite::rusqlite;

/// Unified error type shared by every larder crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A precache manifest fetch failed or the batch write was rejected.
    /// Install aborted; no partial writes are retained.
    #[error("INSTALL_FAILED: {0}")]
    InstallFailed(String),

    /// A store write was rejected (quota, I/O, generation deleted underneath
    /// us). Logged and non-fatal; the in-flight response is still delivered.
    #[error("CACHE_WRITE: {0}")]
    CacheWrite(String),

    /// The live network fetch was rejected or timed out.
    #[error("NETWORK_UNREACHABLE: {0}")]
    NetworkUnreachable(String),

    /// Upstream response body exceeded the configured byte ceiling.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// A request could not be constructed (unparseable URL or method).
    #[error("MALFORMED_REQUEST: {0}")]
    MalformedRequest(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Upstream HTTP client could not be constructed.
    #[error("GATEWAY: {0}")]
    Gateway(String),
}

impl Error {
    /// True for failures the interceptor treats as "the network is down":
    /// they route a cacheable request into the offline fallback chain.
    pub fn is_network_failure(&self) -> bool {
        matches!(self, Error::NetworkUnreachable(_) | Error::FetchTooLarge(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}
