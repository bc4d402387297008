use crate::session::{
    AuthedUser,
    Session,
    SessionContext,
};
use anyhow::Context;
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
};
use url::Url;

pub mod local;
pub mod supabase;

pub use local::LocalAuth;
pub use supabase::SupabaseAuth;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("sign-in failed: {0:#}")]
    SignInFailed(#[source] anyhow::Error),
    #[error("could not restore session: {0:#}")]
    SessionUnavailable(#[source] anyhow::Error),
    #[error("sign-out failed: {0:#}")]
    SignOutFailed(#[source] anyhow::Error),
    #[error("{0}")]
    Unsupported(&'static str),
}

/// Result of starting a provider sign-in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignInFlow {
    /// The identity is available immediately.
    Completed(AuthedUser),
    /// The user must visit `authorize_url` and hand back the issued access token.
    Redirect { authorize_url: Url },
}

/// Identity provider. Session changes are published through
/// [`AuthService`], not by the gateway itself.
pub trait AuthGateway {
    fn get_session(&self) -> impl Future<Output = Result<Session, AuthError>>;

    fn sign_in_with_provider(
        &self,
        provider: &str,
    ) -> impl Future<Output = Result<SignInFlow, AuthError>>;

    /// finish a redirect sign-in with the token the provider issued
    fn complete_sign_in(
        &self,
        access_token: &str,
    ) -> impl Future<Output = Result<AuthedUser, AuthError>>;

    fn sign_out(&self) -> impl Future<Output = Result<(), AuthError>>;
}

/// Couples a gateway with the session context so every successful auth
/// operation is observed by the flip controller and the history view.
pub struct AuthService<A> {
    gateway: A,
    context: SessionContext,
}

impl<A: AuthGateway> AuthService<A> {
    pub fn new(gateway: A, context: SessionContext) -> Self {
        Self { gateway, context }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub async fn restore(&self) -> Result<Session, AuthError> {
        let session = self.gateway.get_session().await?;
        self.context.set(session.clone());
        Ok(session)
    }

    pub async fn sign_in(&self, provider: &str) -> Result<SignInFlow, AuthError> {
        let flow = self.gateway.sign_in_with_provider(provider).await?;
        if let SignInFlow::Completed(user) = &flow {
            self.context.set(Session::SignedIn(user.clone()));
        }
        Ok(flow)
    }

    pub async fn complete_sign_in(&self, access_token: &str) -> Result<AuthedUser, AuthError> {
        let user = self.gateway.complete_sign_in(access_token).await?;
        self.context.set(Session::SignedIn(user.clone()));
        Ok(user)
    }

    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let result = self.gateway.sign_out().await;
        // the local session ends even when the provider could not be told
        self.context.set(Session::SignedOut);
        result
    }
}

/// JSON file holding the last signed-in identity.
#[derive(Clone, Debug)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> anyhow::Result<Option<AuthedUser>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = fs::read(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let user = serde_json::from_slice(&data)
            .with_context(|| format!("failed to parse {}", self.path.display()))?;
        Ok(Some(user))
    }

    pub fn save(&self, user: &AuthedUser) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_vec_pretty(user).context("failed to serialize session")?;
        fs::write(&self.path, json)
            .with_context(|| format!("failed to write {}", self.path.display()))
    }

    pub fn remove(&self) -> anyhow::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("failed to remove {}", self.path.display())),
        }
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn session_file__round_trips_and_removes() {
        // given
        let temp_dir = TempDir::new("session_file").unwrap();
        let file = SessionFile::new(temp_dir.path().join("nested").join("session.json"));
        let mut user = AuthedUser::new("u1", "token");
        user.email = Some("u1@example.com".to_string());

        // when
        file.save(&user).unwrap();
        let loaded = file.load().unwrap();
        file.remove().unwrap();

        // then
        assert_eq!(loaded, Some(user));
        assert_eq!(file.load().unwrap(), None);
        file.remove().unwrap();
    }

    #[tokio::test]
    async fn auth_service__publishes_sign_in_and_sign_out() {
        // given
        let temp_dir = TempDir::new("auth_service").unwrap();
        let gateway = LocalAuth::new("local-user", SessionFile::new(temp_dir.path().join("s.json")));
        let service = AuthService::new(gateway, SessionContext::default());
        let mut subscription = service.context().subscribe();

        // when
        service.sign_in("local").await.unwrap();

        // then
        let session = subscription.poll_change().expect("signed in");
        assert_eq!(session.user().map(|u| u.id.as_str()), Some("local-user"));

        // when
        service.sign_out().await.unwrap();

        // then
        assert_eq!(subscription.poll_change(), Some(Session::SignedOut));
    }
}
