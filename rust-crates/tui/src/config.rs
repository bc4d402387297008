use coinflip::{
    backend::BackendConfig,
    controller::DEFAULT_REVEAL_DELAY,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use offline_cache::worker::{
    DEFAULT_CACHE_VERSION,
    DEFAULT_MANIFEST,
};
use serde::Deserialize;
use std::{
    fmt,
    path::{
        Path,
        PathBuf,
    },
    time::Duration,
};
use tracing::{
    info,
    warn,
};
use url::Url;

pub const DEFAULT_CONFIG_PATH: &str = "~/.config/coinflip/config.json";
pub const DEFAULT_DATA_DIR: &str = "~/.local/share/coinflip";
pub const DEFAULT_ORIGIN: &str = "http://localhost:8080/";
pub const DEFAULT_AUTH_PROVIDER: &str = "github";

pub const ENV_BACKEND_URL: &str = "COINFLIP_BACKEND_URL";
pub const ENV_ANON_KEY: &str = "COINFLIP_ANON_KEY";
pub const ENV_ORIGIN: &str = "COINFLIP_ORIGIN";

/// One source of settings. Unset fields defer to the layers below.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigLayer {
    pub backend_url: Option<String>,
    pub anon_key: Option<String>,
    pub local: Option<bool>,
    pub data_dir: Option<String>,
    pub reveal_delay_ms: Option<u64>,
    pub cache_version: Option<String>,
    pub origin: Option<String>,
    pub manifest: Option<Vec<String>>,
    pub auth_provider: Option<String>,
}

impl ConfigLayer {
    /// Settings from the environment, read through `lookup`.
    pub fn from_env(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| {
            let value = lookup(key).filter(|v| !v.trim().is_empty());
            if value.is_some() {
                info!("{key} set in environment");
            }
            value
        };
        Self {
            backend_url: var(ENV_BACKEND_URL),
            anon_key: var(ENV_ANON_KEY),
            origin: var(ENV_ORIGIN),
            ..Self::default()
        }
    }

    /// Reads a JSON config file. A missing file is only an error when
    /// `required` is set.
    pub fn from_file(path: &Path, required: bool) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw)
                .wrap_err_with(|| format!("Invalid config file {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
                info!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e)
                .wrap_err_with(|| format!("Failed to read config file {}", path.display())),
        }
    }

    /// `other` wins wherever it sets a value.
    pub fn overlay(self, other: ConfigLayer) -> Self {
        Self {
            backend_url: other.backend_url.or(self.backend_url),
            anon_key: other.anon_key.or(self.anon_key),
            local: other.local.or(self.local),
            data_dir: other.data_dir.or(self.data_dir),
            reveal_delay_ms: other.reveal_delay_ms.or(self.reveal_delay_ms),
            cache_version: other.cache_version.or(self.cache_version),
            origin: other.origin.or(self.origin),
            manifest: other.manifest.or(self.manifest),
            auth_provider: other.auth_provider.or(self.auth_provider),
        }
    }
}

#[derive(Clone)]
pub enum BackendMode {
    Remote(BackendConfig),
    /// On-disk history and a fixed local identity.
    Local,
}

impl fmt::Debug for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(backend) => f.debug_tuple("Remote").field(backend).finish(),
            Self::Local => f.write_str("Local"),
        }
    }
}

/// Why local mode was picked although it was not asked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocalFallback {
    NoBackend,
    IncompleteBackend,
}

impl fmt::Display for LocalFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoBackend => f.write_str("no backend configured; using local mode"),
            Self::IncompleteBackend => {
                f.write_str("backend url and anon key must both be set; using local mode")
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub backend: BackendMode,
    pub local_fallback: Option<LocalFallback>,
    pub data_dir: PathBuf,
    pub reveal_delay: Duration,
    pub cache_version: String,
    pub origin: Url,
    pub manifest: Vec<String>,
    pub auth_provider: String,
}

impl AppConfig {
    /// Loads `defaults -> config file -> environment -> cli`.
    pub fn load(config_path: Option<&str>, cli: ConfigLayer) -> Result<Self> {
        let required = config_path.is_some();
        let path = expand_path(config_path.unwrap_or(DEFAULT_CONFIG_PATH));
        let file = ConfigLayer::from_file(&path, required)?;
        let env = ConfigLayer::from_env(|key| std::env::var(key).ok());
        Self::resolve(file.overlay(env).overlay(cli))
    }

    /// Resolution runs before logging is set up, so a fallback to local mode
    /// is recorded in `local_fallback` and reported by [`Self::warn_fallback`].
    pub fn resolve(layer: ConfigLayer) -> Result<Self> {
        let (backend, local_fallback) = match (layer.local, layer.backend_url, layer.anon_key) {
            (Some(true), _, _) => (BackendMode::Local, None),
            (_, Some(url), Some(key)) => {
                let backend = BackendConfig::new(&url, key)
                    .map_err(|e| eyre!("Invalid backend url {url}: {e:#}"))?;
                (BackendMode::Remote(backend), None)
            }
            (_, None, None) => (BackendMode::Local, Some(LocalFallback::NoBackend)),
            (_, _, _) => (BackendMode::Local, Some(LocalFallback::IncompleteBackend)),
        };

        let origin_raw = layer.origin.as_deref().unwrap_or(DEFAULT_ORIGIN);
        let origin = Url::parse(origin_raw)
            .wrap_err_with(|| format!("Invalid origin {origin_raw}"))?;

        Ok(Self {
            backend,
            local_fallback,
            data_dir: expand_path(layer.data_dir.as_deref().unwrap_or(DEFAULT_DATA_DIR)),
            reveal_delay: layer
                .reveal_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_REVEAL_DELAY),
            cache_version: layer
                .cache_version
                .unwrap_or_else(|| DEFAULT_CACHE_VERSION.to_string()),
            origin,
            manifest: layer
                .manifest
                .unwrap_or_else(|| DEFAULT_MANIFEST.iter().map(|s| s.to_string()).collect()),
            auth_provider: layer
                .auth_provider
                .unwrap_or_else(|| DEFAULT_AUTH_PROVIDER.to_string()),
        })
    }

    pub fn warn_fallback(&self) {
        if let Some(fallback) = self.local_fallback {
            warn!("{fallback}");
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self.backend, BackendMode::Local)
    }

    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join("session.json")
    }

    pub fn flips_path(&self) -> PathBuf {
        self.data_dir.join("flips")
    }

    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join("offline-cache")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use std::{
        collections::HashMap,
        io::Write,
        sync::{
            Arc,
            Mutex,
        },
    };
    use tempdir::TempDir;

    fn remote_layer() -> ConfigLayer {
        ConfigLayer {
            backend_url: Some("https://abc.supabase.co".to_string()),
            anon_key: Some("anon".to_string()),
            ..ConfigLayer::default()
        }
    }

    #[test]
    fn resolve__defaults_to_local_mode_without_backend() {
        // when
        let config = AppConfig::resolve(ConfigLayer::default()).unwrap();

        // then
        assert!(config.is_local());
        assert_eq!(config.reveal_delay, Duration::from_millis(1000));
        assert_eq!(config.cache_version, "coinflip-v1");
        assert_eq!(config.manifest.len(), DEFAULT_MANIFEST.len());
        assert_eq!(config.auth_provider, "github");
        assert_eq!(config.origin.as_str(), DEFAULT_ORIGIN);
    }

    #[test]
    fn resolve__half_configured_backend_falls_back_to_local() {
        let layer = ConfigLayer {
            backend_url: Some("https://abc.supabase.co".to_string()),
            ..ConfigLayer::default()
        };

        let config = AppConfig::resolve(layer).unwrap();

        assert!(config.is_local());
    }

    #[test]
    fn resolve__url_and_key_select_remote_backend() {
        let config = AppConfig::resolve(remote_layer()).unwrap();

        match config.backend {
            BackendMode::Remote(backend) => {
                assert_eq!(backend.url.as_str(), "https://abc.supabase.co/");
            }
            BackendMode::Local => panic!("expected remote backend"),
        }
    }

    #[test]
    fn resolve__local_flag_wins_over_backend_settings() {
        let layer = remote_layer().overlay(ConfigLayer {
            local: Some(true),
            ..ConfigLayer::default()
        });

        let config = AppConfig::resolve(layer).unwrap();

        assert!(config.is_local());
    }

    #[test]
    fn resolve__records_why_local_mode_was_chosen() {
        let half = ConfigLayer {
            anon_key: Some("anon".to_string()),
            ..ConfigLayer::default()
        };
        let asked = ConfigLayer {
            local: Some(true),
            ..ConfigLayer::default()
        };

        let fallback = |layer| AppConfig::resolve(layer).unwrap().local_fallback;

        assert_eq!(fallback(ConfigLayer::default()), Some(LocalFallback::NoBackend));
        assert_eq!(fallback(half), Some(LocalFallback::IncompleteBackend));
        assert_eq!(fallback(asked), None);
        assert_eq!(fallback(remote_layer()), None);
    }

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn warn_fallback__logs_local_mode_warning_once_a_subscriber_exists() {
        // given
        let config = AppConfig::resolve(ConfigLayer::default()).unwrap();
        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        // when
        tracing::subscriber::with_default(subscriber, || config.warn_fallback());

        // then
        let logged = String::from_utf8(log.0.lock().unwrap().clone()).unwrap();
        assert!(logged.contains("WARN"));
        assert!(logged.contains("no backend configured; using local mode"));
    }

    #[test]
    fn warn_fallback__is_silent_for_a_configured_backend() {
        let config = AppConfig::resolve(remote_layer()).unwrap();
        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || config.warn_fallback());

        assert!(log.0.lock().unwrap().is_empty());
    }

    #[test]
    fn resolve__rejects_invalid_origin() {
        let layer = ConfigLayer {
            origin: Some("not a url".to_string()),
            ..ConfigLayer::default()
        };

        assert!(AppConfig::resolve(layer).is_err());
    }

    #[test]
    fn overlay__upper_layer_wins_only_where_set() {
        // given
        let file = ConfigLayer {
            reveal_delay_ms: Some(250),
            cache_version: Some("coinflip-v2".to_string()),
            ..remote_layer()
        };
        let cli = ConfigLayer {
            reveal_delay_ms: Some(10),
            ..ConfigLayer::default()
        };

        // when
        let merged = file.overlay(cli);

        // then
        assert_eq!(merged.reveal_delay_ms, Some(10));
        assert_eq!(merged.cache_version.as_deref(), Some("coinflip-v2"));
        assert_eq!(merged.anon_key.as_deref(), Some("anon"));
    }

    #[test]
    fn from_env__reads_known_variables_and_skips_blank_ones() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_BACKEND_URL, "https://env.supabase.co"),
            (ENV_ANON_KEY, "  "),
            (ENV_ORIGIN, "https://coin.example/"),
        ]);

        let layer = ConfigLayer::from_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(layer.backend_url.as_deref(), Some("https://env.supabase.co"));
        assert_eq!(layer.anon_key, None);
        assert_eq!(layer.origin.as_deref(), Some("https://coin.example/"));
    }

    #[test]
    fn from_file__missing_default_file_is_empty_layer() {
        let temp_dir = TempDir::new("config_missing").unwrap();

        let layer = ConfigLayer::from_file(&temp_dir.path().join("config.json"), false).unwrap();

        assert_eq!(layer, ConfigLayer::default());
    }

    #[test]
    fn from_file__missing_explicit_file_is_an_error() {
        let temp_dir = TempDir::new("config_required").unwrap();

        let result = ConfigLayer::from_file(&temp_dir.path().join("config.json"), true);

        assert!(result.is_err());
    }

    #[test]
    fn from_file__parses_manifest_and_rejects_unknown_keys() {
        // given
        let temp_dir = TempDir::new("config_parse").unwrap();
        let good = temp_dir.path().join("good.json");
        std::fs::write(
            &good,
            r#"{"manifest": ["/", "/assets/index-3f9a.js"], "reveal_delay_ms": 500}"#,
        )
        .unwrap();
        let bad = temp_dir.path().join("bad.json");
        std::fs::write(&bad, r#"{"reveal_delay": 500}"#).unwrap();

        // when
        let layer = ConfigLayer::from_file(&good, true).unwrap();

        // then
        assert_eq!(
            layer.manifest,
            Some(vec!["/".to_string(), "/assets/index-3f9a.js".to_string()])
        );
        assert_eq!(layer.reveal_delay_ms, Some(500));
        assert!(ConfigLayer::from_file(&bad, true).is_err());
    }
}
