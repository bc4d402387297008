//! Offline cache worker: pre-caches the app shell on install, drops stale
//! cache versions on activate and answers requests from cache or network.

pub mod entry;
pub mod http;
pub mod network;
pub mod storage;
pub mod worker;

pub use http::{
    Request,
    Response,
};
pub use network::{
    Network,
    ReqwestNetwork,
};
pub use storage::{
    CacheStorage,
    InMemoryCacheStorage,
    SledCacheStorage,
};
pub use worker::{
    FetchSource,
    OfflineCacheWorker,
    WorkerError,
    WorkerState,
};
