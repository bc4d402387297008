use crate::http::{
    Request,
    Response,
};
use std::ops::Deref;

pub mod memory;
pub mod sled_storage;

pub use memory::InMemoryCacheStorage;
pub use sled_storage::SledCacheStorage;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MatchOptions {
    pub ignore_search: bool,
}

impl MatchOptions {
    pub fn ignoring_search() -> Self {
        Self {
            ignore_search: true,
        }
    }
}

/// One named cache.
pub trait Cache {
    fn match_request(
        &self,
        request: &Request,
        options: MatchOptions,
    ) -> anyhow::Result<Option<Response>>;

    /// write or overwrite the entry for `request`
    fn put(&self, request: &Request, response: &Response) -> anyhow::Result<()>;

    /// write all entries or none of them
    fn put_all(&self, entries: &[(Request, Response)]) -> anyhow::Result<()>;

    fn keys(&self) -> anyhow::Result<Vec<String>>;

    /// release the handle, persisting pending writes
    fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// The set of named caches available to a worker.
pub trait CacheStorage {
    type Cache: Cache;

    /// open (creating if needed) the cache called `name`
    fn open(&self, name: &str) -> anyhow::Result<Self::Cache>;

    fn cache_names(&self) -> anyhow::Result<Vec<String>>;

    /// returns whether a cache was removed
    fn delete(&self, name: &str) -> anyhow::Result<bool>;

    /// Opens `name` for the duration of one operation.
    fn scoped(&self, name: &str) -> anyhow::Result<CacheHandle<Self::Cache>> {
        let cache = self.open(name)?;
        Ok(CacheHandle {
            name: name.to_string(),
            cache,
        })
    }
}

/// Cache opened for a single operation. Closing happens on drop, on every
/// exit path of the operation.
pub struct CacheHandle<C: Cache> {
    name: String,
    cache: C,
}

impl<C: Cache> Deref for CacheHandle<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.cache
    }
}

impl<C: Cache> Drop for CacheHandle<C> {
    fn drop(&mut self) {
        if let Err(e) = self.cache.close() {
            tracing::warn!(cache = %self.name, "failed to close cache: {e:#}");
        }
    }
}
