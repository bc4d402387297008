use crate::{
    draw::CoinSource,
    record::{
        FlipAssignment,
        FlipOutcome,
        FlipRecord,
        NewFlipRecord,
        Side,
    },
    session::{
        SessionContext,
        SessionSubscription,
    },
    store::FlipStore,
};
use std::time::Duration;

pub const DEFAULT_REVEAL_DELAY: Duration = Duration::from_millis(1000);


#[derive(Debug, thiserror::Error)]
pub enum FlipError {
    #[error("Please enter both options before flipping!")]
    MissingOptions,
    #[error("The coin is already in the air")]
    AlreadyFlipping,
    #[error("Options cannot be changed while the coin is flipping")]
    InputLocked,
    #[error("Failed to save flip: {0:#}")]
    Persistence(#[source] anyhow::Error),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlipState {
    Idle,
    Flipping {
        generation: u64,
        assignment: FlipAssignment,
    },
    Revealed {
        assignment: FlipAssignment,
        outcome: FlipOutcome,
    },
}

/// Handed out by [`FlipController::flip`]; the caller waits `delay` and then
/// passes `generation` back to [`FlipController::reveal`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingReveal {
    pub generation: u64,
    pub delay: Duration,
}

#[derive(Debug)]
pub enum Persistence {
    /// No session, nothing was written.
    Skipped,
    Saved(FlipRecord),
    /// The reveal stands even though the write failed.
    Failed(FlipError),
}

#[derive(Debug)]
pub struct Reveal {
    pub assignment: FlipAssignment,
    pub outcome: FlipOutcome,
    pub persistence: Persistence,
}

/// Owns the two option inputs and drives `Idle -> Flipping -> Revealed`.
///
/// Every flip gets a new generation number. A reveal only applies while its
/// generation is current, so a reset or a newer flip turns an outstanding
/// reveal into a no-op.
pub struct FlipController<S, C> {
    store: S,
    coin: C,
    session: SessionSubscription,
    option_1: String,
    option_2: String,
    state: FlipState,
    generation: u64,
    reveal_delay: Duration,
}

impl<S: FlipStore, C: CoinSource> FlipController<S, C> {
    pub fn new(store: S, coin: C, session: &SessionContext) -> Self {
        Self {
            store,
            coin,
            session: session.subscribe(),
            option_1: String::new(),
            option_2: String::new(),
            state: FlipState::Idle,
            generation: 0,
            reveal_delay: DEFAULT_REVEAL_DELAY,
        }
    }

    pub fn with_reveal_delay(mut self, delay: Duration) -> Self {
        self.reveal_delay = delay;
        self
    }

    pub fn state(&self) -> &FlipState {
        &self.state
    }

    pub fn option_1(&self) -> &str {
        &self.option_1
    }

    pub fn option_2(&self) -> &str {
        &self.option_2
    }

    pub fn set_option_1(&mut self, value: impl Into<String>) -> Result<(), FlipError> {
        self.ensure_editable()?;
        self.option_1 = value.into();
        Ok(())
    }

    pub fn set_option_2(&mut self, value: impl Into<String>) -> Result<(), FlipError> {
        self.ensure_editable()?;
        self.option_2 = value.into();
        Ok(())
    }

    pub fn is_flipping(&self) -> bool {
        matches!(self.state, FlipState::Flipping { .. })
    }

    pub fn assignment(&self) -> Option<&FlipAssignment> {
        match &self.state {
            FlipState::Idle => None,
            FlipState::Flipping { assignment, .. } | FlipState::Revealed { assignment, .. } => {
                Some(assignment)
            }
        }
    }

    pub fn outcome(&self) -> Option<&FlipOutcome> {
        match &self.state {
            FlipState::Revealed { outcome, .. } => Some(outcome),
            _ => None,
        }
    }

    pub fn result(&self) -> Option<Side> {
        self.outcome().map(|o| o.side)
    }

    /// Whether the flip control is enabled.
    pub fn can_flip(&self) -> bool {
        !self.is_flipping() && self.options_present()
    }

    /// Whether the reset control is shown and enabled.
    pub fn can_reset(&self) -> bool {
        let has_content = self.result().is_some()
            || !self.option_1.is_empty()
            || !self.option_2.is_empty();
        has_content && !self.is_flipping()
    }

    /// Validates the options, draws the assignment and enters `Flipping`.
    pub fn flip(&mut self) -> Result<PendingReveal, FlipError> {
        if self.is_flipping() {
            return Err(FlipError::AlreadyFlipping);
        }
        if !self.options_present() {
            return Err(FlipError::MissingOptions);
        }
        let heads_first = self.coin.draw_assignment();
        let assignment =
            FlipAssignment::new(self.option_1.trim(), self.option_2.trim(), heads_first);
        self.generation += 1;
        tracing::debug!(
            generation = self.generation,
            heads = %assignment.heads,
            tails = %assignment.tails,
            "coin flipping"
        );
        self.state = FlipState::Flipping {
            generation: self.generation,
            assignment,
        };
        Ok(PendingReveal {
            generation: self.generation,
            delay: self.reveal_delay,
        })
    }

    /// Draws the winning side for the flip identified by `generation` and,
    /// when signed in, records it. Returns `None` if that flip is no longer
    /// current.
    pub async fn reveal(&mut self, generation: u64) -> Option<Reveal> {
        let assignment = match &self.state {
            FlipState::Flipping {
                generation: current,
                assignment,
            } if *current == generation => assignment.clone(),
            _ => {
                tracing::debug!(generation, "discarding stale reveal");
                return None;
            }
        };
        let side = self.coin.draw_side();
        let outcome = FlipOutcome::from_assignment(&assignment, side);
        tracing::info!(result = %side, winner = %outcome.winner, "coin landed");
        self.state = FlipState::Revealed {
            assignment: assignment.clone(),
            outcome: outcome.clone(),
        };

        let session = self.session.current();
        let persistence = match session.user() {
            None => Persistence::Skipped,
            Some(user) => {
                let record = NewFlipRecord::new(
                    &user.id,
                    self.option_1.trim(),
                    self.option_2.trim(),
                    &assignment,
                    &outcome,
                );
                match self.store.insert(user, record).await {
                    Ok(saved) => Persistence::Saved(saved),
                    Err(e) => {
                        tracing::error!("failed to save flip: {e:#}");
                        Persistence::Failed(FlipError::Persistence(e))
                    }
                }
            }
        };

        Some(Reveal {
            assignment,
            outcome,
            persistence,
        })
    }

    /// Flips, waits out the reveal delay and reveals.
    pub async fn flip_and_wait(&mut self) -> Result<Option<Reveal>, FlipError> {
        let pending = self.flip()?;
        tokio::time::sleep(pending.delay).await;
        Ok(self.reveal(pending.generation).await)
    }

    /// Clears inputs and result. An outstanding reveal becomes stale.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.option_1.clear();
        self.option_2.clear();
        self.state = FlipState::Idle;
    }

    fn options_present(&self) -> bool {
        !self.option_1.trim().is_empty() && !self.option_2.trim().is_empty()
    }

    fn ensure_editable(&self) -> Result<(), FlipError> {
        if self.is_flipping() {
            Err(FlipError::InputLocked)
        } else {
            Ok(())
        }
    }
}
