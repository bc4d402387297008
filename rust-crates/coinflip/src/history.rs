use crate::{
    record::{
        FlipRecord,
        HistoryStats,
    },
    session::{
        AuthedUser,
        SessionContext,
        SessionSubscription,
    },
    store::FlipStore,
};

pub const CLEAR_CONFIRMATION_PROMPT: &str =
    "Are you sure you want to clear all flip history? This cannot be undone.";

#[cfg(test)]
mod tests;

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("Failed to load flip history")]
    Load(#[source] anyhow::Error),
    #[error("Failed to clear history")]
    Clear(#[source] anyhow::Error),
    #[error("The signed-in account changed; history was not cleared")]
    SessionChanged,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HistoryState {
    /// No session; the view only offers sign-in.
    SignInRequired,
    Loading,
    Loaded(Vec<FlipRecord>),
}

/// Proof that the user was asked to confirm clearing their history.
/// Dropping it declines.
#[must_use = "the clear only happens once the pending request is confirmed"]
#[derive(Debug)]
pub struct PendingClear {
    user: AuthedUser,
}

impl PendingClear {
    pub fn prompt(&self) -> &'static str {
        CLEAR_CONFIRMATION_PROMPT
    }
}

/// Flip history of the signed-in user, newest first.
pub struct HistoryView<S> {
    store: S,
    session: SessionSubscription,
    state: HistoryState,
}

impl<S: FlipStore> HistoryView<S> {
    pub fn new(store: S, session: &SessionContext) -> Self {
        Self {
            store,
            session: session.subscribe(),
            state: HistoryState::Loading,
        }
    }

    pub fn state(&self) -> &HistoryState {
        &self.state
    }

    pub fn records(&self) -> &[FlipRecord] {
        match &self.state {
            HistoryState::Loaded(records) => records,
            _ => &[],
        }
    }

    pub fn stats(&self) -> HistoryStats {
        HistoryStats::from_records(self.records())
    }

    /// Loads the history for the current session. A failed load leaves an
    /// empty list behind.
    pub async fn mount(&mut self) -> Result<(), HistoryError> {
        let session = self.session.current();
        let Some(user) = session.user() else {
            self.state = HistoryState::SignInRequired;
            return Ok(());
        };
        self.state = HistoryState::Loading;
        match self.store.list(user).await {
            Ok(records) => {
                tracing::debug!(count = records.len(), "loaded flip history");
                self.state = HistoryState::Loaded(records);
                Ok(())
            }
            Err(e) => {
                tracing::error!("error loading history: {e:#}");
                self.state = HistoryState::Loaded(Vec::new());
                Err(HistoryError::Load(e))
            }
        }
    }

    /// Reloads after a new record was written elsewhere. Also consumes any
    /// pending session change, since the reload already reflects it.
    pub async fn refresh(&mut self) -> Result<(), HistoryError> {
        let _ = self.session.poll_change();
        self.mount().await
    }

    /// Reloads when the session changed since the last look. Returns whether
    /// a reload happened.
    pub async fn sync_session(&mut self) -> Result<bool, HistoryError> {
        if self.session.poll_change().is_none() {
            return Ok(false);
        }
        self.mount().await?;
        Ok(true)
    }

    /// Starts a clear. Only offered to a signed-in user with a non-empty list.
    pub fn request_clear(&self) -> Option<PendingClear> {
        if self.records().is_empty() {
            return None;
        }
        let session = self.session.current();
        session.user().map(|user| PendingClear { user: user.clone() })
    }

    /// Deletes every record of the confirming user. On failure the list is
    /// left exactly as it was.
    pub async fn confirm_clear(&mut self, pending: PendingClear) -> Result<(), HistoryError> {
        let still_same_user = self
            .session
            .current()
            .user()
            .is_some_and(|current| current.id == pending.user.id);
        if !still_same_user {
            return Err(HistoryError::SessionChanged);
        }
        match self.store.delete_for_user(&pending.user).await {
            Ok(()) => {
                tracing::info!("flip history cleared");
                self.state = HistoryState::Loaded(Vec::new());
                Ok(())
            }
            Err(e) => {
                tracing::error!("error clearing history: {e:#}");
                Err(HistoryError::Clear(e))
            }
        }
    }
}
