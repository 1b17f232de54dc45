//! Named cache containers holding HTTP response snapshots.
//!
//! `CacheStorage` is the persistence seam used by the worker. Two
//! implementations are provided:
//! - `MemoryCacheStorage`: process-local, used for tests and ephemeral runs
//! - `DiskCacheStorage`: one directory per container under a cache root

pub mod disk;
pub mod entry;
pub mod memory;
pub mod storage;

pub use disk::DiskCacheStorage;
pub use entry::{CacheKey, CachedResponse};
pub use memory::MemoryCacheStorage;
pub use storage::CacheStorage;
