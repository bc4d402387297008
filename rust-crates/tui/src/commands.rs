// Non-interactive subcommands: print history, drive the offline cache.
use crate::{
    config::AppConfig,
    services::Services,
};
use chrono::Local;
use coinflip::{
    HistoryView,
    history::HistoryState,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use offline_cache::{
    FetchSource,
    OfflineCacheWorker,
    ReqwestNetwork,
    Request,
    SledCacheStorage,
};
use std::path::Path;

pub async fn print_history(services: Services) -> Result<()> {
    let Services { store, auth, .. } = services;
    let mut history = HistoryView::new(store, auth.context());
    history.mount().await.wrap_err("Failed to load flip history")?;

    match history.state() {
        HistoryState::SignInRequired => {
            println!("Sign in to view your flip history (run `coinflip` and press Ctrl+S).");
        }
        HistoryState::Loading => {}
        HistoryState::Loaded(records) if records.is_empty() => {
            println!("No Flips Yet. Start flipping coins to see your history here!");
        }
        HistoryState::Loaded(records) => {
            let stats = history.stats();
            println!(
                "Total flips: {} | Heads: {} | Tails: {}",
                stats.total, stats.heads, stats.tails
            );
            for record in records {
                println!(
                    "{}  {} vs {}  {:<5}  -> {}",
                    record
                        .created_at
                        .with_timezone(&Local)
                        .format("%Y-%m-%d %H:%M"),
                    record.option_1,
                    record.option_2,
                    record.result.as_str().to_uppercase(),
                    record.winner
                );
            }
        }
    }
    Ok(())
}

#[derive(Debug)]
pub enum CacheCommand {
    Install,
    Activate,
    Fetch {
        path: String,
        document: bool,
        output: Option<String>,
    },
}

type Worker = OfflineCacheWorker<ReqwestNetwork, SledCacheStorage>;

fn worker(config: &AppConfig) -> Result<Worker> {
    let storage = SledCacheStorage::open_path(config.cache_path())
        .map_err(|e| eyre!("Failed to open offline cache: {e:#}"))?;
    let network =
        ReqwestNetwork::new().map_err(|e| eyre!("Failed to build HTTP client: {e:#}"))?;
    Ok(
        OfflineCacheWorker::new(config.origin.clone(), network, storage)
            .with_version(config.cache_version.clone())
            .with_manifest(config.manifest.clone()),
    )
}

pub async fn run_cache(config: &AppConfig, command: CacheCommand) -> Result<()> {
    let mut worker = worker(config)?;
    match command {
        CacheCommand::Install => {
            let (installed, activated) = worker
                .start()
                .await
                .wrap_err("Offline cache install failed")?;
            println!(
                "Cached {} assets from {} as {}",
                installed.cached,
                worker.origin(),
                worker.version()
            );
            print_deleted(&activated.deleted);
        }
        CacheCommand::Activate => {
            let activated = worker.activate().wrap_err("Offline cache activation failed")?;
            print_deleted(&activated.deleted);
        }
        CacheCommand::Fetch {
            path,
            document,
            output,
        } => {
            worker.activate().wrap_err("Offline cache activation failed")?;
            let url = worker.resolve(&path)?;
            let request = if document {
                Request::document(url)
            } else {
                Request::get(url)
            };
            let served = worker
                .handle_fetch(&request)
                .await
                .wrap_err_with(|| format!("Failed to fetch {path}"))?;
            let source = match served.source {
                FetchSource::Network => "network",
                FetchSource::Cache => "cache",
                FetchSource::RootFallback => "cached root document",
            };
            println!(
                "{} {} from {source} ({}, {} bytes)",
                served.response.status,
                request.url,
                served
                    .response
                    .content_type
                    .as_deref()
                    .unwrap_or("no content type"),
                served.response.body.len()
            );
            if let Some(output) = output {
                write_body(Path::new(&output), &served.response.body)?;
            }
        }
    }
    Ok(())
}

fn print_deleted(deleted: &[String]) {
    if deleted.is_empty() {
        println!("No outdated caches");
    }
    for name in deleted {
        println!("Deleted outdated cache {name}");
    }
}

fn write_body(path: &Path, body: &[u8]) -> Result<()> {
    std::fs::write(path, body).wrap_err_with(|| format!("Failed to write {}", path.display()))
}
