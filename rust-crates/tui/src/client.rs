use crate::{
    services::Services,
    ui::{
        self,
        Edit,
        Field,
        UserEvent,
    },
};
use coinflip::{
    FlipController,
    FlipError,
    HistoryView,
    auth::{
        AuthGateway,
        AuthService,
        SignInFlow,
    },
    coin::{
        CoinDisplay,
        CoinView,
    },
    controller::{
        Persistence,
        PendingReveal,
    },
    draw::{
        CoinSource,
        RandCoin,
    },
    history::{
        HistoryState,
        PendingClear,
    },
    notice::{
        Notice,
        Notices,
    },
    record::{
        FlipAssignment,
        FlipOutcome,
        FlipRecord,
        HistoryStats,
    },
    store::FlipStore,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use crossterm::event::EventStream;
use futures::StreamExt;
use std::time::{
    Duration,
    Instant,
};
use tokio::sync::mpsc;
use url::Url;

/// One animation frame of the spinning coin.
pub const ANIMATION_FRAME: Duration = Duration::from_millis(80);

#[derive(Clone, Debug)]
pub struct AppOptions {
    pub reveal_delay: Duration,
    pub auth_provider: String,
    pub backend_label: String,
}

/// What the run loop has to do after an event was handled.
#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    None,
    Quit,
    ScheduleReveal(PendingReveal),
    PromptToken(Url),
    ConfirmClear(&'static str),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HistorySnapshot {
    SignInRequired,
    Loading,
    Loaded {
        records: Vec<FlipRecord>,
        stats: HistoryStats,
    },
}

/// Everything the UI needs for one frame.
#[derive(Clone, Debug)]
pub struct AppSnapshot {
    pub option_1: String,
    pub option_2: String,
    pub coin: CoinView,
    pub flipping: bool,
    pub assignment: Option<FlipAssignment>,
    pub outcome: Option<FlipOutcome>,
    pub can_flip: bool,
    pub can_reset: bool,
    pub user: Option<String>,
    pub backend_label: String,
    pub history: HistorySnapshot,
    pub notices: Vec<Notice>,
}

pub struct AppController<S, C, A> {
    flips: FlipController<S, C>,
    history: HistoryView<S>,
    auth: AuthService<A>,
    coin: CoinDisplay,
    notices: Notices,
    pending_clear: Option<PendingClear>,
    auth_provider: String,
    backend_label: String,
}

impl<S, C, A> AppController<S, C, A>
where
    S: FlipStore + Clone,
    C: CoinSource,
    A: AuthGateway,
{
    pub fn new(store: S, coin: C, auth: AuthService<A>, options: AppOptions) -> Self {
        let context = auth.context().clone();
        let flips = FlipController::new(store.clone(), coin, &context)
            .with_reveal_delay(options.reveal_delay);
        let history = HistoryView::new(store, &context);
        Self {
            flips,
            history,
            auth,
            coin: CoinDisplay::new(),
            notices: Notices::default(),
            pending_clear: None,
            auth_provider: options.auth_provider,
            backend_label: options.backend_label,
        }
    }

    /// Initial history load for the restored session.
    pub async fn start(&mut self) {
        if let Err(e) = self.history.mount().await {
            self.notices.error(e.to_string());
        }
    }

    pub fn snapshot(&self) -> AppSnapshot {
        let session = self.auth.context().current();
        let history = match self.history.state() {
            HistoryState::SignInRequired => HistorySnapshot::SignInRequired,
            HistoryState::Loading => HistorySnapshot::Loading,
            HistoryState::Loaded(records) => HistorySnapshot::Loaded {
                records: records.clone(),
                stats: self.history.stats(),
            },
        };
        AppSnapshot {
            option_1: self.flips.option_1().to_string(),
            option_2: self.flips.option_2().to_string(),
            coin: self.coin.view(self.flips.is_flipping(), self.flips.result()),
            flipping: self.flips.is_flipping(),
            assignment: self.flips.assignment().cloned(),
            outcome: self.flips.outcome().cloned(),
            can_flip: self.flips.can_flip(),
            can_reset: self.flips.can_reset(),
            user: session.user().map(|user| user.display_name().to_string()),
            backend_label: self.backend_label.clone(),
            history,
            notices: self.notices.iter().cloned().collect(),
        }
    }

    pub async fn handle(&mut self, event: UserEvent) -> Action {
        match event {
            UserEvent::Quit => return Action::Quit,
            UserEvent::Redraw => {}
            UserEvent::Edit(field, edit) => self.edit_option(field, edit),
            UserEvent::Flip => return self.flip(),
            UserEvent::Reset => {
                if self.flips.can_reset() {
                    self.flips.reset();
                }
            }
            UserEvent::ShowHistory => {
                if let Err(e) = self.history.mount().await {
                    self.notices.error(e.to_string());
                }
            }
            UserEvent::RequestClear => {
                if let Some(pending) = self.history.request_clear() {
                    let prompt = pending.prompt();
                    self.pending_clear = Some(pending);
                    return Action::ConfirmClear(prompt);
                }
            }
            UserEvent::ConfirmClear(confirmed) => self.finish_clear(confirmed).await,
            UserEvent::SignIn => return self.sign_in().await,
            UserEvent::SubmitToken(token) => self.submit_token(&token).await,
            UserEvent::SignOut => self.sign_out().await,
        }
        Action::None
    }

    /// Applies a due reveal. Stale generations are ignored by the controller.
    pub async fn on_reveal_due(&mut self, generation: u64) {
        let Some(reveal) = self.flips.reveal(generation).await else {
            return;
        };
        self.notices
            .success(format!("The coin has decided: {}!", reveal.outcome.winner));
        match reveal.persistence {
            Persistence::Skipped => {}
            Persistence::Saved(_) => {
                if let Err(e) = self.history.refresh().await {
                    self.notices.error(e.to_string());
                }
            }
            Persistence::Failed(e) => self.notices.error(e.to_string()),
        }
    }

    /// Advances the animation and expires notices. Returns whether the frame
    /// needs redrawing.
    pub fn on_tick(&mut self, now: Instant) -> bool {
        let flipping = self.flips.is_flipping();
        if self.coin.tick(flipping).is_some() {
            tracing::trace!("coin completed a rotation");
        }
        let before = self.notices.iter().count();
        self.notices.expire(now);
        flipping || before != self.notices.iter().count()
    }

    fn edit_option(&mut self, field: Field, edit: Edit) {
        let current = match field {
            Field::Option1 => self.flips.option_1(),
            Field::Option2 => self.flips.option_2(),
        };
        let mut value = current.to_string();
        match edit {
            Edit::Insert(c) => value.push(c),
            Edit::Paste(text) => value.push_str(&text),
            Edit::Backspace => {
                value.pop();
            }
        }
        let result = match field {
            Field::Option1 => self.flips.set_option_1(value),
            Field::Option2 => self.flips.set_option_2(value),
        };
        if let Err(e) = result {
            tracing::debug!("ignored edit: {e}");
        }
    }

    fn flip(&mut self) -> Action {
        match self.flips.flip() {
            Ok(pending) => Action::ScheduleReveal(pending),
            Err(FlipError::AlreadyFlipping) => Action::None,
            Err(e) => {
                self.notices.error(e.to_string());
                Action::None
            }
        }
    }

    async fn finish_clear(&mut self, confirmed: bool) {
        let Some(pending) = self.pending_clear.take() else {
            return;
        };
        if !confirmed {
            tracing::debug!("clear declined");
            return;
        }
        match self.history.confirm_clear(pending).await {
            Ok(()) => self.notices.success("History cleared successfully"),
            Err(e) => self.notices.error(e.to_string()),
        }
    }

    async fn sign_in(&mut self) -> Action {
        match self.auth.sign_in(&self.auth_provider).await {
            Ok(SignInFlow::Completed(user)) => {
                self.notices
                    .success(format!("Signed in as {}", user.display_name()));
                self.sync_history().await;
                Action::None
            }
            Ok(SignInFlow::Redirect { authorize_url }) => {
                self.notices
                    .info("Open the sign-in link, then paste the access token");
                Action::PromptToken(authorize_url)
            }
            Err(e) => {
                self.notices.error(e.to_string());
                Action::None
            }
        }
    }

    async fn submit_token(&mut self, token: &str) {
        match self.auth.complete_sign_in(token).await {
            Ok(user) => {
                self.notices
                    .success(format!("Signed in as {}", user.display_name()));
                self.sync_history().await;
            }
            Err(e) => self.notices.error(e.to_string()),
        }
    }

    async fn sign_out(&mut self) {
        match self.auth.sign_out().await {
            Ok(()) => self.notices.info("Signed out"),
            Err(e) => self.notices.error(e.to_string()),
        }
        self.pending_clear = None;
        self.sync_history().await;
    }

    async fn sync_history(&mut self) {
        if let Err(e) = self.history.sync_session().await {
            self.notices.error(e.to_string());
        }
    }
}

fn install_terminal_restore_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = ui::terminal_exit();
        previous(info);
    }));
}

pub async fn run_app(services: Services, options: AppOptions) -> Result<()> {
    let Services { store, auth, .. } = services;
    let mut controller = AppController::new(store, RandCoin::default(), auth, options);
    controller.start().await;
    let mut ui_state = ui::UiState::default();

    install_terminal_restore_hook();
    tracing::info!("Starting UI");
    ui::terminal_enter(&mut ui_state).wrap_err("coinflip needs an interactive terminal")?;
    // the event reader needs the tty that terminal_enter just claimed
    let mut input_events = EventStream::new();
    tracing::info!("UI ready");
    let res = run_loop(&mut controller, &mut ui_state, &mut input_events).await;
    ui::terminal_exit()?;
    res
}

fn schedule_reveal(reveal_tx: &mpsc::UnboundedSender<u64>, pending: PendingReveal) {
    let reveal_tx = reveal_tx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(pending.delay).await;
        let _ = reveal_tx.send(pending.generation);
    });
}

async fn run_loop<S, C, A>(
    controller: &mut AppController<S, C, A>,
    ui_state: &mut ui::UiState,
    input_events: &mut EventStream,
) -> Result<()>
where
    S: FlipStore + Clone,
    C: CoinSource,
    A: AuthGateway,
{
    let (reveal_tx, mut reveal_rx) = mpsc::unbounded_channel::<u64>();
    let mut frames = tokio::time::interval(ANIMATION_FRAME);
    frames.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    tracing::info!("Running app loop");
    ui::draw(ui_state, &controller.snapshot()).wrap_err("initial draw failed")?;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            raw_ev = input_events.next() => {
                let Some(raw_ev) = raw_ev else {
                    tracing::warn!("terminal event stream closed");
                    break;
                };
                let event = raw_ev.wrap_err("failed to read terminal event")?;
                let Some(ev) = ui::interpret_event(ui_state, event) else {
                    continue;
                };
                match controller.handle(ev).await {
                    Action::Quit => break,
                    Action::ScheduleReveal(pending) => schedule_reveal(&reveal_tx, pending),
                    Action::PromptToken(url) => ui_state.prompt_token(url),
                    Action::ConfirmClear(prompt) => ui_state.confirm_clear(prompt),
                    Action::None => {}
                }
                ui::draw(ui_state, &controller.snapshot())
                    .wrap_err("draw after input failed")?;
            }
            Some(generation) = reveal_rx.recv() => {
                controller.on_reveal_due(generation).await;
                ui::draw(ui_state, &controller.snapshot())
                    .wrap_err("draw after reveal failed")?;
            }
            _ = frames.tick() => {
                if controller.on_tick(Instant::now()) {
                    ui::draw(ui_state, &controller.snapshot())
                        .wrap_err("draw on animation frame failed")?;
                }
            }
        }
    }
    Ok(())
}
