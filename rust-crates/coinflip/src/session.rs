use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;
use tokio::sync::watch;

/// A signed-in identity. The access token is the bearer credential for the
/// remote gateways and is redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthedUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    pub access_token: String,
}

impl AuthedUser {
    pub fn new(id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            access_token: access_token.into(),
        }
    }

    pub fn display_name(&self) -> &str {
        self.email.as_deref().unwrap_or(&self.id)
    }
}

impl fmt::Debug for AuthedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthedUser")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Session {
    #[default]
    SignedOut,
    SignedIn(AuthedUser),
}

impl Session {
    pub fn user(&self) -> Option<&AuthedUser> {
        match self {
            Session::SignedOut => None,
            Session::SignedIn(user) => Some(user),
        }
    }

    pub fn is_signed_in(&self) -> bool {
        matches!(self, Session::SignedIn(_))
    }
}

/// Shared holder of the current session. Cloning yields another handle to the
/// same session; observers subscribe and stop observing when the
/// subscription is dropped.
#[derive(Clone, Debug)]
pub struct SessionContext {
    sender: watch::Sender<Session>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new(Session::SignedOut)
    }
}

impl SessionContext {
    pub fn new(initial: Session) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    pub fn current(&self) -> Session {
        self.sender.borrow().clone()
    }

    /// Replaces the session, notifying subscribers only when it changed.
    pub fn set(&self, session: Session) {
        let changed = self.sender.send_if_modified(|current| {
            if *current == session {
                false
            } else {
                *current = session;
                true
            }
        });
        if changed {
            tracing::info!(
                signed_in = self.sender.borrow().is_signed_in(),
                "session changed"
            );
        }
    }

    pub fn subscribe(&self) -> SessionSubscription {
        SessionSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

pub struct SessionSubscription {
    receiver: watch::Receiver<Session>,
}

impl SessionSubscription {
    pub fn current(&self) -> Session {
        self.receiver.borrow().clone()
    }

    /// Returns the new session if it changed since the last call.
    pub fn poll_change(&mut self) -> Option<Session> {
        match self.receiver.has_changed() {
            Ok(true) => Some(self.receiver.borrow_and_update().clone()),
            _ => None,
        }
    }

    /// Waits for the next change. `None` once the context is gone.
    pub async fn changed(&mut self) -> Option<Session> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    #[test]
    fn subscription__sees_change_once() {
        let context = SessionContext::default();
        let mut subscription = context.subscribe();

        context.set(Session::SignedIn(AuthedUser::new("u1", "token")));

        let seen = subscription.poll_change().expect("change observed");
        assert_eq!(seen.user().map(|u| u.id.as_str()), Some("u1"));
        assert!(subscription.poll_change().is_none());
    }

    #[test]
    fn set__same_session_does_not_notify() {
        let context = SessionContext::default();
        let mut subscription = context.subscribe();

        context.set(Session::SignedOut);

        assert!(subscription.poll_change().is_none());
    }

    #[test]
    fn dropping_subscription__unsubscribes() {
        let context = SessionContext::default();
        let subscription = context.subscribe();
        assert_eq!(context.subscriber_count(), 1);

        drop(subscription);

        assert_eq!(context.subscriber_count(), 0);
    }

    #[test]
    fn authed_user_debug__redacts_token() {
        let user = AuthedUser::new("u1", "super-secret");

        let rendered = format!("{user:?}");

        assert!(!rendered.contains("super-secret"));
    }
}
