use crate::{
    auth::{
        AuthError,
        AuthGateway,
        SessionFile,
        SignInFlow,
    },
    backend::{
        BackendConfig,
        ensure_success,
        http_client,
    },
    session::{
        AuthedUser,
        Session,
    },
};
use anyhow::Context;
use serde::Deserialize;
use url::Url;

/// OAuth sign-in against the hosted auth service. The session survives
/// restarts through a [`SessionFile`].
#[derive(Clone)]
pub struct SupabaseAuth {
    backend: BackendConfig,
    http: reqwest::Client,
    session_file: SessionFile,
    redirect_to: Option<Url>,
}

#[derive(Deserialize)]
struct UserDto {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl SupabaseAuth {
    pub fn new(backend: BackendConfig, session_file: SessionFile) -> anyhow::Result<Self> {
        Ok(Self {
            backend,
            http: http_client()?,
            session_file,
            redirect_to: None,
        })
    }

    pub fn with_redirect(mut self, redirect_to: Url) -> Self {
        self.redirect_to = Some(redirect_to);
        self
    }

    pub fn authorize_url(&self, provider: &str) -> anyhow::Result<Url> {
        let mut url = self.backend.endpoint("auth/v1/authorize")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("provider", provider);
            if let Some(redirect_to) = &self.redirect_to {
                query.append_pair("redirect_to", redirect_to.as_str());
            }
        }
        Ok(url)
    }

    async fn fetch_user(&self, access_token: &str) -> anyhow::Result<AuthedUser> {
        let request = self.http.get(self.backend.endpoint("auth/v1/user")?);
        let res = self
            .backend
            .authorize(request, access_token)
            .send()
            .await
            .context("auth user request failed")?;
        let dto: UserDto = ensure_success(res, "validating the access token")
            .await?
            .json()
            .await
            .context("invalid auth user payload")?;
        Ok(AuthedUser {
            id: dto.id,
            email: dto.email,
            access_token: access_token.to_string(),
        })
    }
}

impl AuthGateway for SupabaseAuth {
    async fn get_session(&self) -> Result<Session, AuthError> {
        let stored = self
            .session_file
            .load()
            .map_err(AuthError::SessionUnavailable)?;
        Ok(stored.map_or(Session::SignedOut, Session::SignedIn))
    }

    async fn sign_in_with_provider(&self, provider: &str) -> Result<SignInFlow, AuthError> {
        let authorize_url = self
            .authorize_url(provider)
            .map_err(AuthError::SignInFailed)?;
        tracing::info!(provider, "starting provider sign-in");
        Ok(SignInFlow::Redirect { authorize_url })
    }

    async fn complete_sign_in(&self, access_token: &str) -> Result<AuthedUser, AuthError> {
        let access_token = access_token.trim();
        if access_token.is_empty() {
            return Err(AuthError::SignInFailed(anyhow::anyhow!(
                "no access token was provided"
            )));
        }
        let user = self
            .fetch_user(access_token)
            .await
            .map_err(AuthError::SignInFailed)?;
        self.session_file
            .save(&user)
            .map_err(AuthError::SignInFailed)?;
        tracing::info!(user_id = %user.id, "signed in");
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let stored = self
            .session_file
            .load()
            .map_err(AuthError::SignOutFailed)?;
        if let Some(user) = stored {
            let remote = async {
                let request = self.http.post(self.backend.endpoint("auth/v1/logout")?);
                let res = self
                    .backend
                    .authorize(request, &user.access_token)
                    .send()
                    .await
                    .context("logout request failed")?;
                ensure_success(res, "signing out").await.map(|_| ())
            };
            if let Err(e) = remote.await {
                tracing::warn!("remote sign-out failed, clearing local session anyway: {e:#}");
            }
        }
        self.session_file.remove().map_err(AuthError::SignOutFailed)
    }
}
