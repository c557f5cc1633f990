//! File services
//!
//! Thin operations over the metadata store, fronted by the query cache.
//! Reads go through [`loft_cache::QueryCache`] with a short TTL; every
//! mutation invalidates the owner's cache prefix before its success is
//! surfaced, so a read issued after a mutation always reflects it.
//!
//! Batch operations validate each id in parallel and join all outcomes
//! before handing the store an atomic batch: one bad id fails the whole
//! batch and nothing is applied.

mod files;

pub use files::FileService;
