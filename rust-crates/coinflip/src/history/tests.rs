#![allow(non_snake_case)]

use super::*;
use crate::{
    record::{
        FlipAssignment,
        FlipOutcome,
        NewFlipRecord,
        Side,
    },
    session::Session,
    test_helpers::{
        FlakyFlipStore,
        signed_in_context,
        test_user,
    },
};

async fn seed(store: &FlakyFlipStore, user: &AuthedUser, sides: &[Side]) {
    for side in sides {
        let assignment = FlipAssignment::new("Pizza", "Tacos", true);
        let outcome = FlipOutcome::from_assignment(&assignment, *side);
        let record = NewFlipRecord::new(&user.id, "Pizza", "Tacos", &assignment, &outcome);
        store.insert(user, record).await.unwrap();
    }
}

#[tokio::test]
async fn mount__signed_out_requires_sign_in() {
    // given
    let store = FlakyFlipStore::new();
    let mut sut = HistoryView::new(store, &SessionContext::new(Session::SignedOut));

    // when
    sut.mount().await.unwrap();

    // then
    assert_eq!(sut.state(), &HistoryState::SignInRequired);
    assert!(sut.request_clear().is_none());
}

#[tokio::test]
async fn mount__loads_newest_first_with_counts() {
    // given
    let store = FlakyFlipStore::new();
    let user = test_user("user-1");
    seed(&store, &user, &[Side::Heads, Side::Tails, Side::Heads]).await;
    let mut sut = HistoryView::new(store, &signed_in_context("user-1"));

    // when
    sut.mount().await.unwrap();

    // then
    let records = sut.records();
    assert_eq!(records.len(), 3);
    assert!(records.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    assert_eq!(records[0].result, Side::Heads);
    assert_eq!(records[1].result, Side::Tails);
    let stats = sut.stats();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.heads, 2);
    assert_eq!(stats.tails, 1);
    assert_eq!(stats.heads + stats.tails, stats.total);
}

#[tokio::test]
async fn mount__load_failure_leaves_empty_list() {
    // given
    let store = FlakyFlipStore::new();
    let user = test_user("user-1");
    seed(&store, &user, &[Side::Heads]).await;
    store.fail_lists(true);
    let mut sut = HistoryView::new(store, &signed_in_context("user-1"));

    // when
    let result = sut.mount().await;

    // then
    assert!(matches!(result, Err(HistoryError::Load(_))));
    assert_eq!(sut.state(), &HistoryState::Loaded(Vec::new()));
    assert_eq!(sut.stats().total, 0);
}

#[tokio::test]
async fn request_clear__not_offered_for_empty_history() {
    let store = FlakyFlipStore::new();
    let mut sut = HistoryView::new(store, &signed_in_context("user-1"));
    sut.mount().await.unwrap();

    assert!(sut.request_clear().is_none());
}

#[tokio::test]
async fn confirm_clear__empties_list_for_current_user_only() {
    // given
    let store = FlakyFlipStore::new();
    let user = test_user("user-1");
    let other = test_user("user-2");
    seed(&store, &user, &[Side::Heads, Side::Tails]).await;
    seed(&store, &other, &[Side::Tails]).await;
    let mut sut = HistoryView::new(store.clone(), &signed_in_context("user-1"));
    sut.mount().await.unwrap();

    // when
    let pending = sut.request_clear().expect("clear offered");
    assert_eq!(pending.prompt(), CLEAR_CONFIRMATION_PROMPT);
    sut.confirm_clear(pending).await.unwrap();

    // then
    assert!(sut.records().is_empty());
    let remaining = store.records();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].user_id, "user-2");
}

#[tokio::test]
async fn confirm_clear__failure_keeps_previous_list() {
    // given
    let store = FlakyFlipStore::new();
    let user = test_user("user-1");
    seed(&store, &user, &[Side::Heads, Side::Tails]).await;
    let mut sut = HistoryView::new(store.clone(), &signed_in_context("user-1"));
    sut.mount().await.unwrap();
    let before = sut.records().to_vec();
    store.fail_deletes(true);

    // when
    let pending = sut.request_clear().unwrap();
    let result = sut.confirm_clear(pending).await;

    // then
    assert!(matches!(result, Err(HistoryError::Clear(_))));
    assert_eq!(sut.records(), before.as_slice());
}

#[tokio::test]
async fn declining_clear__issues_no_delete() {
    let store = FlakyFlipStore::new();
    let user = test_user("user-1");
    seed(&store, &user, &[Side::Heads]).await;
    let mut sut = HistoryView::new(store.clone(), &signed_in_context("user-1"));
    sut.mount().await.unwrap();

    let pending = sut.request_clear().unwrap();
    drop(pending);

    assert_eq!(store.delete_calls(), 0);
    assert_eq!(sut.records().len(), 1);
}

#[tokio::test]
async fn confirm_clear__refused_after_account_switch() {
    // given
    let store = FlakyFlipStore::new();
    let user = test_user("user-1");
    seed(&store, &user, &[Side::Heads]).await;
    let context = signed_in_context("user-1");
    let mut sut = HistoryView::new(store.clone(), &context);
    sut.mount().await.unwrap();
    let pending = sut.request_clear().unwrap();

    // when
    context.set(Session::SignedIn(test_user("user-2")));
    let result = sut.confirm_clear(pending).await;

    // then
    assert!(matches!(result, Err(HistoryError::SessionChanged)));
    assert_eq!(store.delete_calls(), 0);
}

#[tokio::test]
async fn sync_session__reloads_after_sign_out() {
    // given
    let store = FlakyFlipStore::new();
    let user = test_user("user-1");
    seed(&store, &user, &[Side::Heads]).await;
    let context = signed_in_context("user-1");
    let mut sut = HistoryView::new(store, &context);
    sut.mount().await.unwrap();
    assert!(!sut.sync_session().await.unwrap());

    // when
    context.set(Session::SignedOut);

    // then
    assert!(sut.sync_session().await.unwrap());
    assert_eq!(sut.state(), &HistoryState::SignInRequired);
}

#[tokio::test]
async fn refresh__picks_up_records_written_after_mount() {
    // given
    let store = FlakyFlipStore::new();
    let user = test_user("user-1");
    let mut sut = HistoryView::new(store.clone(), &signed_in_context("user-1"));
    sut.mount().await.unwrap();
    assert!(sut.records().is_empty());

    // when
    seed(&store, &user, &[Side::Tails]).await;
    sut.refresh().await.unwrap();

    // then
    assert_eq!(sut.records().len(), 1);
    assert_eq!(sut.stats().tails, 1);
    assert!(!sut.sync_session().await.unwrap());
}
