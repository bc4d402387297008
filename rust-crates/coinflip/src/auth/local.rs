use crate::{
    auth::{
        AuthError,
        AuthGateway,
        SessionFile,
        SignInFlow,
    },
    session::{
        AuthedUser,
        Session,
    },
};

const LOCAL_ACCESS_TOKEN: &str = "local";

/// Offline identity for local mode: signing in always succeeds as a fixed
/// user and is remembered across runs.
#[derive(Clone, Debug)]
pub struct LocalAuth {
    user_id: String,
    session_file: SessionFile,
}

impl LocalAuth {
    pub fn new(user_id: impl Into<String>, session_file: SessionFile) -> Self {
        Self {
            user_id: user_id.into(),
            session_file,
        }
    }

    fn user(&self) -> AuthedUser {
        AuthedUser::new(&self.user_id, LOCAL_ACCESS_TOKEN)
    }
}

impl AuthGateway for LocalAuth {
    async fn get_session(&self) -> Result<Session, AuthError> {
        let stored = self
            .session_file
            .load()
            .map_err(AuthError::SessionUnavailable)?;
        Ok(match stored {
            Some(user) if user.id == self.user_id => Session::SignedIn(user),
            _ => Session::SignedOut,
        })
    }

    async fn sign_in_with_provider(&self, provider: &str) -> Result<SignInFlow, AuthError> {
        tracing::info!(provider, "signing in locally");
        let user = self.user();
        self.session_file
            .save(&user)
            .map_err(AuthError::SignInFailed)?;
        Ok(SignInFlow::Completed(user))
    }

    async fn complete_sign_in(&self, _access_token: &str) -> Result<AuthedUser, AuthError> {
        Err(AuthError::Unsupported(
            "local sign-in completes immediately; there is nothing to finish",
        ))
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.session_file.remove().map_err(AuthError::SignOutFailed)
    }
}
