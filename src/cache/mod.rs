//! Response caching.
//!
//! A single cache of finished assistant responses, keyed on a
//! [`Fingerprint`] of (question, model). A hit short-circuits the whole
//! upstream path: no retry, no breaker, no ledger record.

pub mod response;

pub use response::{CacheConfig, CacheEntry, Fingerprint, ResponseCache, fingerprint};
