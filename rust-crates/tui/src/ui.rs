use crate::client::{
    AppSnapshot,
    HistorySnapshot,
};
use chrono::Local;
use coinflip::{
    FlipRecord,
    Side,
    coin::{
        CoinView,
        FRAMES_PER_CYCLE,
    },
    notice::NoticeLevel,
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use crossterm::{
    event::{
        Event,
        KeyCode,
        KeyEvent,
        KeyEventKind,
        KeyModifiers,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use ratatui::{
    prelude::*,
    widgets::*,
};
use std::io::{
    IsTerminal,
    stdout,
};
use unicode_width::UnicodeWidthStr;
use url::Url;

#[derive(Debug, PartialEq, Eq)]
pub enum UserEvent {
    Quit,
    Redraw,
    Edit(Field, Edit),
    Flip,
    Reset,
    ShowHistory,
    RequestClear,
    ConfirmClear(bool),
    SignIn,
    SubmitToken(String),
    SignOut,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Field {
    #[default]
    Option1,
    Option2,
}

impl Field {
    fn other(self) -> Self {
        match self {
            Field::Option1 => Field::Option2,
            Field::Option2 => Field::Option1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Edit {
    Insert(char),
    Paste(String),
    Backspace,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Screen {
    #[default]
    Flip,
    History,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
enum Mode {
    #[default]
    Normal,
    QuitModal,
    ConfirmClear {
        prompt: &'static str,
    },
    TokenEntry {
        authorize_url: Url,
        token: String,
    },
}

#[derive(Debug, Default)]
pub struct UiState {
    screen: Screen,
    focus: Field,
    mode: Mode,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

impl UiState {
    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn focus(&self) -> Field {
        self.focus
    }

    /// Asks for the access token issued at `authorize_url`.
    pub fn prompt_token(&mut self, authorize_url: Url) {
        self.mode = Mode::TokenEntry {
            authorize_url,
            token: String::new(),
        };
    }

    pub fn confirm_clear(&mut self, prompt: &'static str) {
        self.mode = Mode::ConfirmClear { prompt };
    }
}

fn ensure_terminal(stdout_is_terminal: bool) -> Result<()> {
    if stdout_is_terminal {
        Ok(())
    } else {
        Err(eyre!("stdout is not a terminal; use `coinflip history` for plain output"))
    }
}

/// Claims the terminal. Fails without touching it when there is no tty, so
/// the caller can bail out before any input reader is created.
pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    ensure_terminal(stdout().is_terminal())?;
    enable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::terminal::EnterAlternateScreen,
        crossterm::event::EnableBracketedPaste
    )?;
    // one persistent Terminal keeps its buffers across draws
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::event::DisableBracketedPaste,
        crossterm::terminal::LeaveAlternateScreen,
        crossterm::cursor::Show
    )?;
    Ok(())
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| ui(f, state, snap))?;
        state.terminal = Some(term);
    }
    Ok(())
}

/// Maps a terminal event to an app event, updating modal and focus state on
/// the way.
pub fn interpret_event(state: &mut UiState, event: Event) -> Option<UserEvent> {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => interpret_key(state, key),
        Event::Paste(text) => interpret_paste(state, &text),
        Event::Resize(_, _) => Some(UserEvent::Redraw),
        _ => None,
    }
}

fn interpret_paste(state: &mut UiState, text: &str) -> Option<UserEvent> {
    let text: String = text.chars().filter(|c| !c.is_control()).collect();
    match &mut state.mode {
        Mode::TokenEntry { token, .. } => {
            token.push_str(text.trim());
            Some(UserEvent::Redraw)
        }
        Mode::Normal if state.screen == Screen::Flip => {
            Some(UserEvent::Edit(state.focus, Edit::Paste(text)))
        }
        _ => None,
    }
}

fn interpret_key(state: &mut UiState, key: KeyEvent) -> Option<UserEvent> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl && key.code == KeyCode::Char('c') {
        return Some(UserEvent::Quit);
    }

    match &mut state.mode {
        Mode::QuitModal => {
            return match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => Some(UserEvent::Quit),
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    state.mode = Mode::Normal;
                    Some(UserEvent::Redraw)
                }
                _ => None,
            };
        }
        Mode::ConfirmClear { .. } => {
            let confirmed = match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => true,
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => false,
                _ => return None,
            };
            state.mode = Mode::Normal;
            return Some(UserEvent::ConfirmClear(confirmed));
        }
        Mode::TokenEntry { token, .. } => {
            return match key.code {
                KeyCode::Esc => {
                    state.mode = Mode::Normal;
                    Some(UserEvent::Redraw)
                }
                KeyCode::Enter => {
                    let submitted = token.trim().to_string();
                    if submitted.is_empty() {
                        return None;
                    }
                    state.mode = Mode::Normal;
                    Some(UserEvent::SubmitToken(submitted))
                }
                KeyCode::Backspace => {
                    token.pop();
                    Some(UserEvent::Redraw)
                }
                KeyCode::Char(c) if !ctrl => {
                    token.push(c);
                    Some(UserEvent::Redraw)
                }
                _ => None,
            };
        }
        Mode::Normal => {}
    }

    match state.screen {
        Screen::Flip => interpret_flip_key(state, key, ctrl),
        Screen::History => interpret_history_key(state, key, ctrl),
    }
}

fn interpret_flip_key(state: &mut UiState, key: KeyEvent, ctrl: bool) -> Option<UserEvent> {
    if ctrl {
        return match key.code {
            KeyCode::Char('r') => Some(UserEvent::Reset),
            KeyCode::Char('t') => {
                state.screen = Screen::History;
                Some(UserEvent::ShowHistory)
            }
            KeyCode::Char('s') => Some(UserEvent::SignIn),
            KeyCode::Char('o') => Some(UserEvent::SignOut),
            _ => None,
        };
    }
    Some(match key.code {
        KeyCode::Esc => {
            state.mode = Mode::QuitModal;
            UserEvent::Redraw
        }
        KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
            state.focus = state.focus.other();
            UserEvent::Redraw
        }
        KeyCode::Enter => UserEvent::Flip,
        KeyCode::Backspace => UserEvent::Edit(state.focus, Edit::Backspace),
        KeyCode::Char(c) => UserEvent::Edit(state.focus, Edit::Insert(c)),
        _ => return None,
    })
}

fn interpret_history_key(state: &mut UiState, key: KeyEvent, ctrl: bool) -> Option<UserEvent> {
    Some(match key.code {
        KeyCode::Char('t') if ctrl => {
            state.screen = Screen::Flip;
            UserEvent::Redraw
        }
        _ if ctrl => return None,
        KeyCode::Char('q') | KeyCode::Esc => {
            state.mode = Mode::QuitModal;
            UserEvent::Redraw
        }
        KeyCode::Char('f') | KeyCode::Tab => {
            state.screen = Screen::Flip;
            UserEvent::Redraw
        }
        KeyCode::Char('r') => UserEvent::ShowHistory,
        KeyCode::Char('c') => UserEvent::RequestClear,
        KeyCode::Char('s') => UserEvent::SignIn,
        KeyCode::Char('o') => UserEvent::SignOut,
        _ => return None,
    })
}

fn ui(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // title + session
            Constraint::Min(12),   // screen body
            Constraint::Length(3), // notices
            Constraint::Length(3), // help
        ])
        .split(f.area());

    draw_header(f, chunks[0], state, snap);
    match state.screen {
        Screen::Flip => draw_flip_screen(f, chunks[1], state, snap),
        Screen::History => draw_history_screen(f, chunks[1], snap),
    }
    draw_notices(f, chunks[2], snap);
    draw_help(f, chunks[3], state, snap);
    draw_modals(f, state);
}

fn draw_header(f: &mut Frame, area: Rect, state: &UiState, snap: &AppSnapshot) {
    let who = match &snap.user {
        Some(name) => format!("Signed in as {name}"),
        None => String::from("Not signed in"),
    };
    let screen = match state.screen() {
        Screen::Flip => "Flip",
        Screen::History => "History",
    };
    let text = format!("{screen} | {who} | Backend: {}", snap.backend_label);
    let widget = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("Coin Flip"));
    f.render_widget(widget, area);
}

fn draw_flip_screen(f: &mut Frame, area: Rect, state: &UiState, snap: &AppSnapshot) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);
    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(4),
        ])
        .split(columns[0]);

    draw_option_input(f, left[0], state, snap, Field::Option1);
    draw_option_input(f, left[1], state, snap, Field::Option2);
    draw_assignment(f, left[2], snap);
    draw_coin(f, columns[1], snap);
}

fn draw_option_input(
    f: &mut Frame,
    area: Rect,
    state: &UiState,
    snap: &AppSnapshot,
    field: Field,
) {
    let (title, value) = match field {
        Field::Option1 => ("Option 1", snap.option_1.as_str()),
        Field::Option2 => ("Option 2", snap.option_2.as_str()),
    };
    let focused = state.focus() == field && state.mode == Mode::Normal;
    let border_style = if focused && !snap.flipping {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    let text_style = if snap.flipping {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(title);
    let inner = block.inner(area);
    let widget = Paragraph::new(Span::styled(value.to_string(), text_style)).block(block);
    f.render_widget(widget, area);

    if focused && !snap.flipping {
        let offset = (value.width() as u16).min(inner.width.saturating_sub(1));
        f.set_cursor_position(Position::new(inner.x + offset, inner.y));
    }
}

fn draw_assignment(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let mut lines: Vec<Line> = Vec::new();
    match &snap.assignment {
        Some(assignment) => {
            lines.push(Line::from(format!("Heads: {}", assignment.heads)));
            lines.push(Line::from(format!("Tails: {}", assignment.tails)));
        }
        None => lines.push(Line::from("Enter two options, then press Enter to flip")),
    }
    lines.push(Line::from(""));
    if snap.flipping {
        lines.push(Line::styled(
            "Flipping...",
            Style::default().fg(Color::Yellow),
        ));
    } else {
        let flip_style = if snap.can_flip {
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        lines.push(Line::styled("[Enter] Flip the coin", flip_style));
    }
    if snap.can_reset {
        lines.push(Line::from("[Ctrl+R] Reset"));
    }
    let widget = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Assignment"));
    f.render_widget(widget, area);
}

fn draw_coin(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let style = match snap.coin {
        CoinView::Spinning { .. } => Style::default().fg(Color::Yellow),
        CoinView::Face { settled: true, .. } => Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD),
        CoinView::Face { settled: false, .. } => Style::default(),
    };
    let mut lines: Vec<Line> = coin_lines(snap.coin)
        .into_iter()
        .map(|row| Line::styled(row, style))
        .collect();
    lines.push(Line::from(""));
    if let (Some(outcome), false) = (&snap.outcome, snap.flipping) {
        lines.push(Line::from(format!(
            "Result: {}",
            outcome.side.as_str().to_uppercase()
        )));
        lines.push(Line::styled(
            format!("Winner: {}", outcome.winner),
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ));
    }
    let widget = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title("Coin"));
    f.render_widget(widget, area);
}

const FACE_WIDE: [&str; 5] = [
    "  .-------.  ",
    " /         \\ ",
    "|     {}     |",
    " \\         / ",
    "  '-------'  ",
];
const FACE_HALF: [&str; 5] = [
    "    .---.    ",
    "   /     \\   ",
    "  |   {}   |  ",
    "   \\     /   ",
    "    '---'    ",
];
const FACE_EDGE: [&str; 5] = [
    "      |      ",
    "      |      ",
    "      |      ",
    "      |      ",
    "      |      ",
];

fn face_letter(side: Side) -> &'static str {
    match side {
        Side::Heads => "H",
        Side::Tails => "T",
    }
}

/// ASCII rendering of the coin. A spin shows heads, turns edge-on, shows
/// tails and turns back over one cycle.
pub fn coin_lines(view: CoinView) -> Vec<String> {
    let (shape, side) = match view {
        CoinView::Face { side, .. } => (&FACE_WIDE, Some(side)),
        CoinView::Spinning { frame } => {
            let quarter = FRAMES_PER_CYCLE / 4;
            let phase = frame % FRAMES_PER_CYCLE;
            let side = if phase < FRAMES_PER_CYCLE / 2 {
                Side::Heads
            } else {
                Side::Tails
            };
            match phase % (quarter * 2) {
                0 => (&FACE_WIDE, Some(side)),
                p if p == quarter => (&FACE_EDGE, None),
                _ => (&FACE_HALF, Some(side)),
            }
        }
    };
    shape
        .iter()
        .map(|row| match side {
            Some(side) => row.replace("{}", face_letter(side)),
            None => row.to_string(),
        })
        .collect()
}

fn draw_history_screen(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    match &snap.history {
        HistorySnapshot::SignInRequired => {
            let lines = vec![
                Line::from("Sign in to view your flip history"),
                Line::from(""),
                Line::from("[s] Sign in"),
            ];
            let widget = Paragraph::new(lines)
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL).title("Flip History"));
            f.render_widget(widget, area);
        }
        HistorySnapshot::Loading => {
            let widget = Paragraph::new("Loading...")
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL).title("Flip History"));
            f.render_widget(widget, area);
        }
        HistorySnapshot::Loaded { records, stats } => {
            let rows = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(3), Constraint::Min(3)])
                .split(area);
            let stat_cols = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([
                    Constraint::Ratio(1, 3),
                    Constraint::Ratio(1, 3),
                    Constraint::Ratio(1, 3),
                ])
                .split(rows[0]);
            for (rect, (title, count)) in stat_cols.iter().zip([
                ("Total Flips", stats.total),
                ("Heads", stats.heads),
                ("Tails", stats.tails),
            ]) {
                let widget = Paragraph::new(count.to_string())
                    .alignment(Alignment::Center)
                    .block(Block::default().borders(Borders::ALL).title(title));
                f.render_widget(widget, *rect);
            }
            draw_history_list(f, rows[1], records);
        }
    }
}

fn draw_history_list(f: &mut Frame, area: Rect, records: &[FlipRecord]) {
    let block = Block::default().borders(Borders::ALL).title("Flip History");
    if records.is_empty() {
        let lines = vec![
            Line::from("No Flips Yet"),
            Line::from("Start flipping coins to see your history here!"),
        ];
        let widget = Paragraph::new(lines).alignment(Alignment::Center).block(block);
        f.render_widget(widget, area);
        return;
    }
    let items: Vec<ListItem> = records.iter().map(render_record).collect();
    f.render_widget(List::new(items).block(block), area);
}

fn render_record(record: &FlipRecord) -> ListItem<'static> {
    let when = record
        .created_at
        .with_timezone(&Local)
        .format("%b %e, %Y %H:%M");
    let face_style = match record.result {
        Side::Heads => Style::default().fg(Color::Yellow),
        Side::Tails => Style::default().fg(Color::Cyan),
    };
    ListItem::new(vec![
        Line::from(vec![
            Span::raw(format!("{} vs {}  ", record.option_1, record.option_2)),
            Span::styled(record.result.as_str().to_uppercase(), face_style),
            Span::raw("  -> "),
            Span::styled(
                record.winner.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::styled(
            format!(
                "  H: {} | T: {} | {when}",
                record.heads_option, record.tails_option
            ),
            Style::default().fg(Color::DarkGray),
        ),
    ])
}

fn draw_notices(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let widget = match snap.notices.last() {
        Some(notice) => {
            let color = match notice.level {
                NoticeLevel::Info => Color::White,
                NoticeLevel::Success => Color::Green,
                NoticeLevel::Error => Color::Red,
            };
            Paragraph::new(notice.message.clone()).style(Style::default().fg(color))
        }
        None => Paragraph::new("Ready").style(Style::default().fg(Color::DarkGray)),
    };
    f.render_widget(
        widget.block(Block::default().borders(Borders::ALL).title("Status")),
        area,
    );
}

fn draw_help(f: &mut Frame, area: Rect, state: &UiState, snap: &AppSnapshot) {
    let signed_in = snap.user.is_some();
    let text = match state.screen {
        Screen::Flip => {
            let account = if signed_in { "^O sign out" } else { "^S sign in" };
            format!("Tab switch field | Enter flip | ^R reset | ^T history | {account} | Esc quit")
        }
        Screen::History => {
            let account = if signed_in { "o sign out" } else { "s sign in" };
            format!("f/Tab flip | r reload | c clear all | {account} | q/Esc quit")
        }
    };
    let help = Paragraph::new(text).block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, area);
}

fn draw_modals(f: &mut Frame, state: &UiState) {
    match &state.mode {
        Mode::QuitModal => {
            let area = centered_rect(40, 20, f.area());
            let block = Block::default().borders(Borders::ALL).title("Confirm Quit");
            let p = Paragraph::new("Quit? (Y/N)");
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::ConfirmClear { prompt } => {
            let area = centered_rect(50, 25, f.area());
            let block = Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red))
                .title("Clear History");
            let p = Paragraph::new(vec![
                Line::from(*prompt),
                Line::from(""),
                Line::from("Clear all? (Y/N)"),
            ])
            .wrap(Wrap { trim: true });
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::TokenEntry {
            authorize_url,
            token,
        } => {
            let area = centered_rect(70, 40, f.area());
            let block = Block::default().borders(Borders::ALL).title("Sign In");
            let masked = "*".repeat(token.chars().count());
            let p = Paragraph::new(vec![
                Line::from("Open this link in a browser and sign in:"),
                Line::styled(
                    authorize_url.to_string(),
                    Style::default().fg(Color::Cyan),
                ),
                Line::from(""),
                Line::from("Paste the access token and press Enter (Esc cancels):"),
                Line::from(format!("> {masked}")),
            ])
            .wrap(Wrap { trim: false });
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::Normal => {}
    }
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests;
