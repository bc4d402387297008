use crate::{
    entry::CachedEntry,
    http::{
        Request,
        Response,
    },
    storage::{
        Cache,
        CacheStorage,
        MatchOptions,
    },
};
use anyhow::anyhow;
use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        Mutex,
        atomic::{
            AtomicUsize,
            Ordering,
        },
    },
};

type Entries = BTreeMap<String, CachedEntry>;

#[derive(Clone, Default)]
pub struct InMemoryCacheStorage {
    caches: Arc<Mutex<BTreeMap<String, Arc<Mutex<Entries>>>>>,
    open_handles: Arc<AtomicUsize>,
}

impl InMemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles opened and not yet closed.
    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }
}

pub struct InMemoryCache {
    entries: Arc<Mutex<Entries>>,
    open_handles: Arc<AtomicUsize>,
}

impl CacheStorage for InMemoryCacheStorage {
    type Cache = InMemoryCache;

    fn open(&self, name: &str) -> anyhow::Result<InMemoryCache> {
        let mut caches = self
            .caches
            .lock()
            .map_err(|_| anyhow!("cache storage lock poisoned"))?;
        let entries = caches.entry(name.to_string()).or_default().clone();
        self.open_handles.fetch_add(1, Ordering::SeqCst);
        Ok(InMemoryCache {
            entries,
            open_handles: self.open_handles.clone(),
        })
    }

    fn cache_names(&self) -> anyhow::Result<Vec<String>> {
        let caches = self
            .caches
            .lock()
            .map_err(|_| anyhow!("cache storage lock poisoned"))?;
        Ok(caches.keys().cloned().collect())
    }

    fn delete(&self, name: &str) -> anyhow::Result<bool> {
        let mut caches = self
            .caches
            .lock()
            .map_err(|_| anyhow!("cache storage lock poisoned"))?;
        Ok(caches.remove(name).is_some())
    }
}

impl InMemoryCache {
    fn entries(&self) -> anyhow::Result<std::sync::MutexGuard<'_, Entries>> {
        self.entries
            .lock()
            .map_err(|_| anyhow!("cache lock poisoned"))
    }
}

impl Cache for InMemoryCache {
    fn match_request(
        &self,
        request: &Request,
        options: MatchOptions,
    ) -> anyhow::Result<Option<Response>> {
        let entries = self.entries()?;
        if !options.ignore_search {
            return Ok(entries
                .get(&request.cache_key())
                .cloned()
                .and_then(CachedEntry::into_verified));
        }
        let wanted = request.cache_key_ignoring_search();
        let found = entries
            .values()
            .find(|entry| strip_query(&entry.key) == wanted)
            .cloned();
        Ok(found.and_then(CachedEntry::into_verified))
    }

    fn put(&self, request: &Request, response: &Response) -> anyhow::Result<()> {
        let key = request.cache_key();
        self.entries()?
            .insert(key.clone(), CachedEntry::new(key, response.clone()));
        Ok(())
    }

    fn put_all(&self, batch: &[(Request, Response)]) -> anyhow::Result<()> {
        let mut entries = self.entries()?;
        for (request, response) in batch {
            let key = request.cache_key();
            entries.insert(key.clone(), CachedEntry::new(key, response.clone()));
        }
        Ok(())
    }

    fn keys(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.entries()?.keys().cloned().collect())
    }

    fn close(&self) -> anyhow::Result<()> {
        self.open_handles.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

pub(crate) fn strip_query(key: &str) -> &str {
    key.split_once('?').map_or(key, |(base, _)| base)
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use url::Url;

    fn request(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    #[test]
    fn match_request__ignoring_search_finds_variant_with_query() {
        let storage = InMemoryCacheStorage::new();
        let cache = storage.open("v1").unwrap();
        cache
            .put(&request("https://coin.example/?source=pwa"), &Response::ok("text/html", "shell"))
            .unwrap();

        let exact = cache
            .match_request(&request("https://coin.example/"), MatchOptions::default())
            .unwrap();
        let loose = cache
            .match_request(&request("https://coin.example/"), MatchOptions::ignoring_search())
            .unwrap();

        assert!(exact.is_none());
        assert_eq!(loose.map(|r| r.body), Some(b"shell".to_vec()));
    }

    #[test]
    fn scoped__releases_handle_on_drop() {
        let storage = InMemoryCacheStorage::new();

        {
            let _handle = storage.scoped("v1").unwrap();
            assert_eq!(storage.open_handles(), 1);
        }

        assert_eq!(storage.open_handles(), 0);
    }

    #[test]
    fn delete__removes_named_cache() {
        let storage = InMemoryCacheStorage::new();
        storage.open("v0").unwrap().close().unwrap();
        storage.open("v1").unwrap().close().unwrap();

        assert!(storage.delete("v0").unwrap());
        assert!(!storage.delete("v0").unwrap());
        assert_eq!(storage.cache_names().unwrap(), vec!["v1".to_string()]);
    }
}
