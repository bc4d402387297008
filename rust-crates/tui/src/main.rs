use clap::{
    Parser,
    Subcommand,
};
use coinflip::SessionContext;
use color_eyre::eyre::Result;

mod client;
mod commands;
mod config;
mod logging;
mod services;
mod ui;

use commands::CacheCommand;
use config::{
    AppConfig,
    ConfigLayer,
};
use services::Services;

#[derive(Parser, Debug)]
#[command(
    name = "coinflip",
    about = "Can't decide? Enter two options and let a coin flip choose",
    version
)]
struct Args {
    /// Config file (defaults to ~/.config/coinflip/config.json)
    #[arg(long)]
    config: Option<String>,

    /// Hosted backend URL; needs --anon-key as well
    #[arg(long)]
    backend_url: Option<String>,

    /// Public (anon) key of the hosted backend
    #[arg(long)]
    anon_key: Option<String>,

    /// Keep history on this machine and skip the hosted backend
    #[arg(long)]
    local: bool,

    /// Where sessions, local history, cache and logs live
    #[arg(long)]
    data_dir: Option<String>,

    /// How long the coin spins before landing
    #[arg(long)]
    reveal_delay_ms: Option<u64>,

    /// Log filter such as `info` or `coinflip=debug` (defaults to RUST_LOG, then info)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the interactive coin flipper (default)
    Play,
    /// Print the signed-in user's flip history
    History,
    /// Manage the offline copy of the web app
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Pre-cache the asset manifest and drop older cache versions
    Install,
    /// Drop every cache version except the configured one
    Activate,
    /// Request a path through the offline cache
    Fetch {
        path: String,
        /// Treat the request as a page navigation (network first)
        #[arg(long)]
        document: bool,
        /// Write the response body to this file
        #[arg(long)]
        output: Option<String>,
    },
}

impl Args {
    fn config_layer(&self) -> ConfigLayer {
        ConfigLayer {
            backend_url: self.backend_url.clone(),
            anon_key: self.anon_key.clone(),
            local: self.local.then_some(true),
            data_dir: self.data_dir.clone(),
            reveal_delay_ms: self.reveal_delay_ms,
            ..ConfigLayer::default()
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let mut args = Args::parse();
    let command = args.command.take().unwrap_or(Command::Play);
    let log_level = args.log_level.as_deref();

    match command {
        Command::Play => {
            // the file sink needs the data dir, so resolve config before logging
            let config = AppConfig::load(args.config.as_deref(), args.config_layer())?;
            let _guard = logging::init_file_tracing(&config.log_dir(), log_level)?;
            config.warn_fallback();
            tracing::info!(local = config.is_local(), backend = ?config.backend, "starting coinflip");
            let services = Services::connect(&config, SessionContext::default()).await?;
            let options = client::AppOptions {
                reveal_delay: config.reveal_delay,
                auth_provider: config.auth_provider.clone(),
                backend_label: services.backend_label.clone(),
            };
            client::run_app(services, options).await
        }
        Command::History => {
            logging::init_stderr_tracing(log_level)?;
            let config = AppConfig::load(args.config.as_deref(), args.config_layer())?;
            config.warn_fallback();
            let services = Services::connect(&config, SessionContext::default()).await?;
            commands::print_history(services).await
        }
        Command::Cache { action } => {
            logging::init_stderr_tracing(log_level)?;
            let config = AppConfig::load(args.config.as_deref(), args.config_layer())?;
            config.warn_fallback();
            let command = match action {
                CacheAction::Install => CacheCommand::Install,
                CacheAction::Activate => CacheCommand::Activate,
                CacheAction::Fetch {
                    path,
                    document,
                    output,
                } => CacheCommand::Fetch {
                    path,
                    document,
                    output,
                },
            };
            commands::run_cache(&config, command).await
        }
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    #[test]
    fn args__default_to_play_with_no_overrides() {
        let args = Args::parse_from(["coinflip"]);

        assert!(args.command.is_none());
        assert_eq!(args.config_layer(), ConfigLayer::default());
    }

    #[test]
    fn args__flags_become_the_top_config_layer() {
        // when
        let args = Args::parse_from([
            "coinflip",
            "--local",
            "--reveal-delay-ms",
            "250",
            "--data-dir",
            "/tmp/coinflip",
            "history",
        ]);

        // then
        let layer = args.config_layer();
        assert_eq!(layer.local, Some(true));
        assert_eq!(layer.reveal_delay_ms, Some(250));
        assert_eq!(layer.data_dir.as_deref(), Some("/tmp/coinflip"));
        assert!(matches!(args.command, Some(Command::History)));
    }

    #[test]
    fn args__cache_fetch_takes_path_and_document_flag() {
        let args = Args::parse_from(["coinflip", "cache", "fetch", "/index.html", "--document"]);

        match args.command {
            Some(Command::Cache {
                action: CacheAction::Fetch { path, document, output },
            }) => {
                assert_eq!(path, "/index.html");
                assert!(document);
                assert!(output.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
