// Picks the concrete gateways for the configured backend.
use crate::config::{
    AppConfig,
    BackendMode,
};
use coinflip::{
    AuthedUser,
    FlipRecord,
    Session,
    SessionContext,
    auth::{
        AuthError,
        AuthGateway,
        AuthService,
        LocalAuth,
        SessionFile,
        SignInFlow,
        SupabaseAuth,
    },
    record::NewFlipRecord,
    store::{
        FlipStore,
        RestFlipStore,
        SledFlipStore,
    },
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};

pub const LOCAL_USER_ID: &str = "local-user";

#[derive(Clone)]
pub enum AppStore {
    Remote(RestFlipStore),
    Local(SledFlipStore),
}

impl FlipStore for AppStore {
    async fn insert(
        &self,
        user: &AuthedUser,
        record: NewFlipRecord,
    ) -> anyhow::Result<FlipRecord> {
        match self {
            Self::Remote(store) => store.insert(user, record).await,
            Self::Local(store) => store.insert(user, record).await,
        }
    }

    async fn list(&self, user: &AuthedUser) -> anyhow::Result<Vec<FlipRecord>> {
        match self {
            Self::Remote(store) => store.list(user).await,
            Self::Local(store) => store.list(user).await,
        }
    }

    async fn delete_for_user(&self, user: &AuthedUser) -> anyhow::Result<()> {
        match self {
            Self::Remote(store) => store.delete_for_user(user).await,
            Self::Local(store) => store.delete_for_user(user).await,
        }
    }
}

#[derive(Clone)]
pub enum AppAuth {
    Remote(SupabaseAuth),
    Local(LocalAuth),
}

impl AuthGateway for AppAuth {
    async fn get_session(&self) -> Result<Session, AuthError> {
        match self {
            Self::Remote(auth) => auth.get_session().await,
            Self::Local(auth) => auth.get_session().await,
        }
    }

    async fn sign_in_with_provider(&self, provider: &str) -> Result<SignInFlow, AuthError> {
        match self {
            Self::Remote(auth) => auth.sign_in_with_provider(provider).await,
            Self::Local(auth) => auth.sign_in_with_provider(provider).await,
        }
    }

    async fn complete_sign_in(&self, access_token: &str) -> Result<AuthedUser, AuthError> {
        match self {
            Self::Remote(auth) => auth.complete_sign_in(access_token).await,
            Self::Local(auth) => auth.complete_sign_in(access_token).await,
        }
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        match self {
            Self::Remote(auth) => auth.sign_out().await,
            Self::Local(auth) => auth.sign_out().await,
        }
    }
}

pub struct Services {
    pub store: AppStore,
    pub auth: AuthService<AppAuth>,
    pub backend_label: String,
}

impl Services {
    /// Builds the gateways and restores the previous session into `context`.
    pub async fn connect(config: &AppConfig, context: SessionContext) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir).wrap_err_with(|| {
            format!("Failed to create data directory {}", config.data_dir.display())
        })?;
        let session_file = SessionFile::new(config.session_path());

        let (store, gateway, backend_label) = match &config.backend {
            BackendMode::Remote(backend) => {
                let store = RestFlipStore::new(backend.clone())
                    .map_err(|e| eyre!("Failed to set up flip store: {e:#}"))?;
                let auth = SupabaseAuth::new(backend.clone(), session_file)
                    .map_err(|e| eyre!("Failed to set up auth: {e:#}"))?
                    .with_redirect(config.origin.clone());
                (
                    AppStore::Remote(store),
                    AppAuth::Remote(auth),
                    backend.url.host_str().unwrap_or("remote").to_string(),
                )
            }
            BackendMode::Local => {
                let store = SledFlipStore::open(config.flips_path())
                    .map_err(|e| eyre!("Failed to open local flip store: {e:#}"))?;
                let auth = LocalAuth::new(LOCAL_USER_ID, session_file);
                (AppStore::Local(store), AppAuth::Local(auth), "local".to_string())
            }
        };

        let auth = AuthService::new(gateway, context);
        match auth.restore().await {
            Ok(session) => {
                tracing::info!(signed_in = session.is_signed_in(), "session restored");
            }
            Err(e) => tracing::warn!("could not restore session: {e}"),
        }

        Ok(Self {
            store,
            auth,
            backend_label,
        })
    }
}
