use crate::{
    http::{
        Request,
        Response,
    },
    network::Network,
    storage::{
        Cache,
        CacheStorage,
        MatchOptions,
    },
};
use futures::future::try_join_all;
use url::Url;

pub const DEFAULT_CACHE_VERSION: &str = "coinflip-v1";

/// Core assets pre-cached on install. Content-hashed bundle names must be
/// added here (or through configuration) whenever they change.
pub const DEFAULT_MANIFEST: [&str; 5] = [
    "/",
    "/index.html",
    "/manifest.json",
    "/icons/icon-192.png",
    "/icons/icon-512.png",
];


#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("invalid manifest entry '{entry}': {source}")]
    Manifest {
        entry: String,
        #[source]
        source: url::ParseError,
    },
    #[error("failed to fetch {url}: {source:#}")]
    Fetch {
        url: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("{url} responded with status {status}")]
    BadStatus { url: String, status: u16 },
    #[error("offline and no cached copy of {url}")]
    Offline {
        url: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("cache storage error: {0:#}")]
    Storage(#[source] anyhow::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install failed; this worker never controls requests.
    Redundant,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstallReport {
    pub cached: usize,
    /// Activate without waiting for existing clients to close.
    pub skip_waiting: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActivateReport {
    pub deleted: Vec<String>,
    pub clients_claimed: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchSource {
    Network,
    Cache,
    /// Offline document request answered with the cached root document.
    RootFallback,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Served {
    pub response: Response,
    pub source: FetchSource,
}

/// Versioned offline cache in front of the network.
///
/// Documents are served network-first so the shell is always the latest
/// deployment when online; everything else is served cache-first.
pub struct OfflineCacheWorker<N, S> {
    origin: Url,
    version: String,
    manifest: Vec<String>,
    network: N,
    storage: S,
    state: WorkerState,
}

impl<N: Network, S: CacheStorage> OfflineCacheWorker<N, S> {
    pub fn new(origin: Url, network: N, storage: S) -> Self {
        Self {
            origin,
            version: DEFAULT_CACHE_VERSION.to_string(),
            manifest: DEFAULT_MANIFEST.iter().map(|s| s.to_string()).collect(),
            network,
            storage,
            state: WorkerState::Parsed,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_manifest<I, T>(mut self, manifest: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.manifest = manifest.into_iter().map(Into::into).collect();
        self
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn resolve(&self, path: &str) -> Result<Url, WorkerError> {
        self.origin
            .join(path)
            .map_err(|source| WorkerError::Manifest {
                entry: path.to_string(),
                source,
            })
    }

    /// Caches every manifest asset or none of them.
    pub async fn install(&mut self) -> Result<InstallReport, WorkerError> {
        self.state = WorkerState::Installing;
        match self.precache().await {
            Ok(cached) => {
                self.state = WorkerState::Installed;
                tracing::info!(version = %self.version, cached, "offline cache installed");
                Ok(InstallReport {
                    cached,
                    skip_waiting: true,
                })
            }
            Err(e) => {
                self.state = WorkerState::Redundant;
                tracing::error!(version = %self.version, "offline cache install failed: {e}");
                Err(e)
            }
        }
    }

    async fn precache(&self) -> Result<usize, WorkerError> {
        let requests = self
            .manifest
            .iter()
            .map(|entry| self.resolve(entry).map(Request::get))
            .collect::<Result<Vec<_>, _>>()?;

        let fetches = requests.iter().map(|request| async move {
            let response =
                self.network
                    .fetch(request)
                    .await
                    .map_err(|source| WorkerError::Fetch {
                        url: request.url.to_string(),
                        source,
                    })?;
            if !response.is_ok() {
                return Err(WorkerError::BadStatus {
                    url: request.url.to_string(),
                    status: response.status,
                });
            }
            Ok((request.clone(), response))
        });
        let entries = try_join_all(fetches).await?;

        let cache = self
            .storage
            .scoped(&self.version)
            .map_err(WorkerError::Storage)?;
        cache.put_all(&entries).map_err(WorkerError::Storage)?;
        Ok(entries.len())
    }

    /// Removes every cache other than the current version and takes control.
    pub fn activate(&mut self) -> Result<ActivateReport, WorkerError> {
        self.state = WorkerState::Activating;
        let names = self.storage.cache_names().map_err(WorkerError::Storage)?;
        let mut deleted = Vec::new();
        for name in names.into_iter().filter(|name| *name != self.version) {
            if self.storage.delete(&name).map_err(WorkerError::Storage)? {
                tracing::info!(cache = %name, "deleted outdated cache");
                deleted.push(name);
            }
        }
        self.state = WorkerState::Activated;
        Ok(ActivateReport {
            deleted,
            clients_claimed: true,
        })
    }

    /// Install followed by activate, as a skip-waiting worker does.
    pub async fn start(&mut self) -> Result<(InstallReport, ActivateReport), WorkerError> {
        let installed = self.install().await?;
        let activated = self.activate()?;
        Ok((installed, activated))
    }

    pub async fn handle_fetch(&self, request: &Request) -> Result<Served, WorkerError> {
        if self.state != WorkerState::Activated {
            // not in control yet: plain network
            let response = self.fetch_network(request).await?;
            return Ok(Served {
                response,
                source: FetchSource::Network,
            });
        }
        if request.is_document() {
            self.network_first(request).await
        } else {
            self.cache_first(request).await
        }
    }

    async fn network_first(&self, request: &Request) -> Result<Served, WorkerError> {
        match self.network.fetch(request).await {
            Ok(response) => {
                let refreshed = self
                    .storage
                    .scoped(&self.version)
                    .and_then(|cache| cache.put(request, &response));
                if let Err(e) = refreshed {
                    tracing::warn!(url = %request.url, "failed to refresh cached document: {e:#}");
                }
                Ok(Served {
                    response,
                    source: FetchSource::Network,
                })
            }
            Err(network_error) => {
                tracing::debug!(url = %request.url, "document fetch failed, serving from cache: {network_error:#}");
                let cache = self
                    .storage
                    .scoped(&self.version)
                    .map_err(WorkerError::Storage)?;
                if let Some(response) = cache
                    .match_request(request, MatchOptions::ignoring_search())
                    .map_err(WorkerError::Storage)?
                {
                    return Ok(Served {
                        response,
                        source: FetchSource::Cache,
                    });
                }
                let root = Request::get(self.resolve("/")?);
                match cache
                    .match_request(&root, MatchOptions::default())
                    .map_err(WorkerError::Storage)?
                {
                    Some(response) => Ok(Served {
                        response,
                        source: FetchSource::RootFallback,
                    }),
                    None => Err(WorkerError::Offline {
                        url: request.url.to_string(),
                        source: network_error,
                    }),
                }
            }
        }
    }

    async fn cache_first(&self, request: &Request) -> Result<Served, WorkerError> {
        // an unreadable cache degrades to plain network
        let cache = match self.storage.scoped(&self.version) {
            Ok(cache) => Some(cache),
            Err(e) => {
                tracing::warn!(cache = %self.version, "failed to open cache: {e:#}");
                None
            }
        };
        if let Some(cache) = &cache {
            match cache.match_request(request, MatchOptions::default()) {
                Ok(Some(response)) => {
                    return Ok(Served {
                        response,
                        source: FetchSource::Cache,
                    });
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(url = %request.url, "failed to read cache: {e:#}"),
            }
        }
        let response = self.fetch_network(request).await?;
        if let Some(Err(e)) = cache.as_ref().map(|cache| cache.put(request, &response)) {
            tracing::warn!(url = %request.url, "failed to cache response: {e:#}");
        }
        Ok(Served {
            response,
            source: FetchSource::Network,
        })
    }

    async fn fetch_network(&self, request: &Request) -> Result<Response, WorkerError> {
        self.network
            .fetch(request)
            .await
            .map_err(|source| WorkerError::Fetch {
                url: request.url.to_string(),
                source,
            })
    }
}
