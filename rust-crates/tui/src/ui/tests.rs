#![allow(non_snake_case)]

use super::*;
use crossterm::event::KeyEventState;

fn press(code: KeyCode) -> Event {
    Event::Key(KeyEvent {
        code,
        modifiers: KeyModifiers::NONE,
        kind: KeyEventKind::Press,
        state: KeyEventState::NONE,
    })
}

fn ctrl(c: char) -> Event {
    Event::Key(KeyEvent {
        code: KeyCode::Char(c),
        modifiers: KeyModifiers::CONTROL,
        kind: KeyEventKind::Press,
        state: KeyEventState::NONE,
    })
}

#[test]
fn interpret_event__typing_edits_focused_field() {
    // given
    let mut state = UiState::default();

    // when
    let first = interpret_event(&mut state, press(KeyCode::Char('P')));
    interpret_event(&mut state, press(KeyCode::Tab));
    let second = interpret_event(&mut state, press(KeyCode::Char('T')));

    // then
    assert_eq!(first, Some(UserEvent::Edit(Field::Option1, Edit::Insert('P'))));
    assert_eq!(second, Some(UserEvent::Edit(Field::Option2, Edit::Insert('T'))));
    assert_eq!(state.focus(), Field::Option2);
}

#[test]
fn interpret_event__enter_flips_and_ctrl_r_resets() {
    let mut state = UiState::default();

    assert_eq!(interpret_event(&mut state, press(KeyCode::Enter)), Some(UserEvent::Flip));
    assert_eq!(interpret_event(&mut state, ctrl('r')), Some(UserEvent::Reset));
}

#[test]
fn interpret_event__key_release_is_ignored() {
    let mut state = UiState::default();
    let release = Event::Key(KeyEvent {
        code: KeyCode::Enter,
        modifiers: KeyModifiers::NONE,
        kind: KeyEventKind::Release,
        state: KeyEventState::NONE,
    });

    assert_eq!(interpret_event(&mut state, release), None);
}

#[test]
fn interpret_event__ctrl_t_switches_to_history_and_back() {
    // given
    let mut state = UiState::default();

    // when
    let to_history = interpret_event(&mut state, ctrl('t'));
    let screen_after_first = state.screen();
    let back = interpret_event(&mut state, press(KeyCode::Char('f')));

    // then
    assert_eq!(to_history, Some(UserEvent::ShowHistory));
    assert_eq!(screen_after_first, Screen::History);
    assert_eq!(back, Some(UserEvent::Redraw));
    assert_eq!(state.screen(), Screen::Flip);
}

#[test]
fn interpret_event__history_letters_are_commands_not_text() {
    let mut state = UiState::default();
    interpret_event(&mut state, ctrl('t'));

    assert_eq!(
        interpret_event(&mut state, press(KeyCode::Char('c'))),
        Some(UserEvent::RequestClear)
    );
    assert_eq!(
        interpret_event(&mut state, press(KeyCode::Char('r'))),
        Some(UserEvent::ShowHistory)
    );
    assert_eq!(interpret_event(&mut state, press(KeyCode::Char('x'))), None);
}

#[test]
fn interpret_event__clear_confirmation_answers_once() {
    // given
    let mut state = UiState::default();
    state.confirm_clear("sure?");

    // when
    let ignored = interpret_event(&mut state, press(KeyCode::Char('x')));
    let answer = interpret_event(&mut state, press(KeyCode::Char('n')));
    let after = interpret_event(&mut state, press(KeyCode::Char('y')));

    // then
    assert_eq!(ignored, None);
    assert_eq!(answer, Some(UserEvent::ConfirmClear(false)));
    // back on the flip screen, 'y' is just text
    assert_eq!(after, Some(UserEvent::Edit(Field::Option1, Edit::Insert('y'))));
}

#[test]
fn interpret_event__token_entry_collects_and_submits_trimmed_token() {
    // given
    let mut state = UiState::default();
    state.prompt_token(Url::parse("https://abc.supabase.co/auth/v1/authorize?provider=github").unwrap());

    // when
    interpret_event(&mut state, Event::Paste("  eyJhbGci\n".to_string()));
    interpret_event(&mut state, press(KeyCode::Char('X')));
    interpret_event(&mut state, press(KeyCode::Backspace));
    let submitted = interpret_event(&mut state, press(KeyCode::Enter));

    // then
    assert_eq!(submitted, Some(UserEvent::SubmitToken("eyJhbGci".to_string())));
    assert_eq!(interpret_event(&mut state, press(KeyCode::Enter)), Some(UserEvent::Flip));
}

#[test]
fn interpret_event__empty_token_is_not_submitted() {
    let mut state = UiState::default();
    state.prompt_token(Url::parse("https://abc.supabase.co/auth/v1/authorize").unwrap());

    assert_eq!(interpret_event(&mut state, press(KeyCode::Enter)), None);
    assert_eq!(interpret_event(&mut state, press(KeyCode::Esc)), Some(UserEvent::Redraw));
}

#[test]
fn interpret_event__escape_asks_before_quitting() {
    let mut state = UiState::default();

    assert_eq!(interpret_event(&mut state, press(KeyCode::Esc)), Some(UserEvent::Redraw));
    assert_eq!(
        interpret_event(&mut state, press(KeyCode::Char('y'))),
        Some(UserEvent::Quit)
    );
}

#[test]
fn interpret_event__ctrl_c_quits_from_any_mode() {
    let mut state = UiState::default();
    state.confirm_clear("sure?");

    assert_eq!(interpret_event(&mut state, ctrl('c')), Some(UserEvent::Quit));
}

#[test]
fn coin_lines__face_shows_side_letter() {
    let heads = coin_lines(CoinView::Face {
        side: Side::Heads,
        settled: false,
    });
    let tails = coin_lines(CoinView::Face {
        side: Side::Tails,
        settled: true,
    });

    assert!(heads[2].contains('H'));
    assert!(tails[2].contains('T'));
}

#[test]
fn coin_lines__spin_turns_edge_on_and_shows_both_sides() {
    // when
    let frames: Vec<Vec<String>> = (0..FRAMES_PER_CYCLE)
        .map(|frame| coin_lines(CoinView::Spinning { frame }))
        .collect();

    // then
    let edge_on = frames
        .iter()
        .filter(|rows| rows.iter().all(|row| row.trim() == "|"))
        .count();
    assert_eq!(edge_on, 2);
    assert!(frames.iter().any(|rows| rows[2].contains('H')));
    assert!(frames.iter().any(|rows| rows[2].contains('T')));
    // every frame keeps the same footprint
    let width = frames[0][0].chars().count();
    assert!(frames.iter().flatten().all(|row| row.chars().count() == width));
}

#[test]
fn ensure_terminal__refuses_without_a_tty() {
    let err = ensure_terminal(false).unwrap_err();

    assert!(err.to_string().contains("not a terminal"));
    assert!(ensure_terminal(true).is_ok());
}
