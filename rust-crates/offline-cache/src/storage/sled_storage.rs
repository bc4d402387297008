// Sled-backed cache storage: one tree per named cache.
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
        memory::strip_query,
    },
};
use anyhow::Context;
use sled::{
    Batch,
    Config,
    Db,
    Tree,
};
use std::path::Path;

const TREE_PREFIX: &str = "cache:";

#[derive(Clone)]
pub struct SledCacheStorage {
    db: Db,
}

#[derive(Clone)]
pub struct SledCache {
    tree: Tree,
}

impl SledCacheStorage {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub fn open_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let db = Config::default()
            .path(path)
            .open()
            .context("open sled cache database")?;
        Ok(Self::new(db))
    }

    fn tree_name(name: &str) -> String {
        format!("{TREE_PREFIX}{name}")
    }
}

impl CacheStorage for SledCacheStorage {
    type Cache = SledCache;

    fn open(&self, name: &str) -> anyhow::Result<SledCache> {
        let tree = self
            .db
            .open_tree(Self::tree_name(name))
            .with_context(|| format!("open cache tree {name}"))?;
        Ok(SledCache { tree })
    }

    fn cache_names(&self) -> anyhow::Result<Vec<String>> {
        Ok(self
            .db
            .tree_names()
            .into_iter()
            .filter_map(|raw| {
                std::str::from_utf8(&raw)
                    .ok()
                    .and_then(|name| name.strip_prefix(TREE_PREFIX))
                    .map(str::to_string)
            })
            .collect())
    }

    fn delete(&self, name: &str) -> anyhow::Result<bool> {
        self.db
            .drop_tree(Self::tree_name(name))
            .with_context(|| format!("drop cache tree {name}"))
    }
}

impl SledCache {
    fn decode(bytes: &[u8]) -> anyhow::Result<CachedEntry> {
        serde_json::from_slice(bytes).context("decode cached entry")
    }

    fn encode(request: &Request, response: &Response) -> anyhow::Result<(String, Vec<u8>)> {
        let key = request.cache_key();
        let entry = CachedEntry::new(key.clone(), response.clone());
        let bytes = serde_json::to_vec(&entry).context("encode cached entry")?;
        Ok((key, bytes))
    }
}

impl Cache for SledCache {
    fn match_request(
        &self,
        request: &Request,
        options: MatchOptions,
    ) -> anyhow::Result<Option<Response>> {
        if !options.ignore_search {
            return match self.tree.get(request.cache_key()).context("read cache entry")? {
                Some(bytes) => Ok(Self::decode(&bytes)?.into_verified()),
                None => Ok(None),
            };
        }
        let wanted = request.cache_key_ignoring_search();
        for item in self.tree.scan_prefix(wanted.as_bytes()) {
            let (key, bytes) = item.context("scan cache entries")?;
            let key = String::from_utf8_lossy(&key);
            if strip_query(&key) == wanted {
                return Ok(Self::decode(&bytes)?.into_verified());
            }
        }
        Ok(None)
    }

    fn put(&self, request: &Request, response: &Response) -> anyhow::Result<()> {
        let (key, bytes) = Self::encode(request, response)?;
        self.tree
            .insert(key.as_bytes(), bytes)
            .context("write cache entry")?;
        Ok(())
    }

    fn put_all(&self, entries: &[(Request, Response)]) -> anyhow::Result<()> {
        let mut batch = Batch::default();
        for (request, response) in entries {
            let (key, bytes) = Self::encode(request, response)?;
            batch.insert(key.as_bytes(), bytes);
        }
        self.tree
            .apply_batch(batch)
            .context("write cache entries")
    }

    fn keys(&self) -> anyhow::Result<Vec<String>> {
        self.tree
            .iter()
            .keys()
            .map(|key| {
                key.map(|k| String::from_utf8_lossy(&k).into_owned())
                    .context("read cache key")
            })
            .collect()
    }

    fn close(&self) -> anyhow::Result<()> {
        self.tree.flush().context("flush cache tree")?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use tempdir::TempDir;
    use url::Url;

    fn sled_storage(temp_dir: &TempDir) -> SledCacheStorage {
        let db = Config::default()
            .path(temp_dir.path())
            .temporary(true)
            .open()
            .unwrap();
        SledCacheStorage::new(db)
    }

    fn request(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    #[test]
    fn sut__when_putting_then_match_returns_identical_bytes() {
        // given
        let temp_dir = TempDir::new("sled_cache_put").unwrap();
        let storage = sled_storage(&temp_dir);
        let cache = storage.scoped("coinflip-v1").unwrap();
        let body: Vec<u8> = (0u8..=255).collect();
        let response = Response::ok("image/png", body.clone());

        // when
        cache
            .put(&request("https://coin.example/icons/icon-192.png"), &response)
            .unwrap();

        // then
        let found = cache
            .match_request(
                &request("https://coin.example/icons/icon-192.png"),
                MatchOptions::default(),
            )
            .unwrap()
            .unwrap();
        assert_eq!(found.body, body);
        assert_eq!(found.content_type.as_deref(), Some("image/png"));
    }

    #[test]
    fn sut__when_listing_names_then_only_cache_trees_are_returned() {
        // given
        let temp_dir = TempDir::new("sled_cache_names").unwrap();
        let storage = sled_storage(&temp_dir);
        storage.open("coinflip-v0").unwrap();
        storage.open("coinflip-v1").unwrap();

        // when
        let mut names = storage.cache_names().unwrap();
        names.sort();

        // then
        assert_eq!(names, vec!["coinflip-v0".to_string(), "coinflip-v1".to_string()]);
    }

    #[test]
    fn sut__when_dropping_then_cache_is_gone() {
        // given
        let temp_dir = TempDir::new("sled_cache_drop").unwrap();
        let storage = sled_storage(&temp_dir);
        let cache = storage.open("coinflip-v0").unwrap();
        cache
            .put(&request("https://coin.example/"), &Response::ok("text/html", "old"))
            .unwrap();

        // when
        let removed = storage.delete("coinflip-v0").unwrap();

        // then
        assert!(removed);
        assert!(storage.cache_names().unwrap().is_empty());
    }

    #[test]
    fn sut__when_matching_ignoring_search_then_query_variant_is_found() {
        let temp_dir = TempDir::new("sled_cache_search").unwrap();
        let storage = sled_storage(&temp_dir);
        let cache = storage.open("coinflip-v1").unwrap();
        cache
            .put(&request("https://coin.example/index.html?v=2"), &Response::ok("text/html", "v2"))
            .unwrap();

        let found = cache
            .match_request(
                &request("https://coin.example/index.html"),
                MatchOptions::ignoring_search(),
            )
            .unwrap();

        assert_eq!(found.map(|r| r.body), Some(b"v2".to_vec()));
    }
}
