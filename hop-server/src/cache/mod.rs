//! Persistent result cache.
//!
//! Entries are JSON payloads stamped with their write time. Expiry is
//! per namespace: the route map and session are short lived, flight results
//! and whole-search records last a working day.

mod key;
mod record;
mod store;
mod ttl;

pub use key::{CacheKey, FLIGHTS_PREFIX, ITINERARY_PREFIX, Namespace, PAGE_PREFIX, SearchKey};
pub use record::{ItineraryRecord, ReturnsByDate, TripEntry};
pub use store::{CacheEntry, FileStore, KeyValueStore, MemoryStore};
pub use ttl::{CacheConfig, TtlCache};

/// Errors from cache backends.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// Reading or writing the backing file failed.
    #[error("cache I/O error: {message}")]
    Io { message: String },

    /// A value could not be encoded.
    #[error("cache serialization error: {message}")]
    Serialization { message: String },
}
