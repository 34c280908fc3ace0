//! Dialogue state-machine tests: the transition table, cancellation
//! semantics, and the price-check/back card sub-flow.

mod common;

use common::{lexical_state, note_app, CountingFallback, EchoReranker};
use std::sync::Arc;
use toolrec::dialogue::handle_event;
use toolrec::fallback::FallbackReply;
use toolrec::{AppState, Catalog, InboundEvent, SessionState};

const USER: i64 = 1;

fn text(t: &str) -> InboundEvent {
    InboundEvent::Text {
        text: t.to_string(),
    }
}

fn callback(data: &str) -> InboundEvent {
    InboundEvent::Callback {
        data: data.to_string(),
    }
}

fn default_state() -> Arc<AppState> {
    lexical_state(
        Catalog::from_records(vec![note_app()]).unwrap(),
        Arc::new(EchoReranker),
        Arc::new(CountingFallback::new(FallbackReply::Failed)),
    )
}

async fn session_state(state: &Arc<AppState>, user: i64) -> SessionState {
    state.sessions.session(user).lock().await.state
}

/// Walk a user to the follow-up state with one NoteApp card shown.
async fn show_results(state: &Arc<AppState>) {
    handle_event(state, USER, InboundEvent::Start).await;
    handle_event(state, USER, callback("mode_smart")).await;
    handle_event(state, USER, text("notes")).await;
    assert_eq!(
        session_state(state, USER).await,
        SessionState::AwaitingFollowUpChoice
    );
}

// ============================================================================
// Transition table
// ============================================================================

#[tokio::test]
async fn test_start_enters_mode_choice_with_menu() {
    let state = default_state();

    let replies = handle_event(&state, USER, InboundEvent::Start).await;

    assert_eq!(session_state(&state, USER).await, SessionState::AwaitingModeChoice);
    assert_eq!(replies.len(), 1);
    let controls: Vec<&str> = replies[0].controls.iter().map(|c| c.data.as_str()).collect();
    assert_eq!(controls, vec!["mode_smart", "mode_quick"]);
}

#[tokio::test]
async fn test_mode_choices_route_to_the_right_prompt() {
    let state = default_state();

    handle_event(&state, USER, InboundEvent::Start).await;
    handle_event(&state, USER, callback("mode_smart")).await;
    assert_eq!(
        session_state(&state, USER).await,
        SessionState::AwaitingFreeTextQuery
    );

    handle_event(&state, 2, InboundEvent::Start).await;
    handle_event(&state, 2, callback("mode_quick")).await;
    assert_eq!(session_state(&state, 2).await, SessionState::AwaitingKeywordQuery);
}

#[tokio::test]
async fn test_mode_choice_accepts_plain_text_too() {
    let state = default_state();

    handle_event(&state, USER, InboundEvent::Start).await;
    handle_event(&state, USER, text("smart")).await;
    assert_eq!(
        session_state(&state, USER).await,
        SessionState::AwaitingFreeTextQuery
    );
}

#[tokio::test]
async fn test_unrecognized_mode_input_reprompts_in_place() {
    let state = default_state();

    handle_event(&state, USER, InboundEvent::Start).await;
    let replies = handle_event(&state, USER, text("what?")).await;

    assert_eq!(session_state(&state, USER).await, SessionState::AwaitingModeChoice);
    assert!(!replies[0].controls.is_empty(), "should re-show the menu");
}

#[tokio::test]
async fn test_query_produces_cards_and_follow_up_offer() {
    let state = default_state();
    handle_event(&state, USER, InboundEvent::Start).await;
    handle_event(&state, USER, callback("mode_smart")).await;

    let replies = handle_event(&state, USER, text("notes")).await;

    // One card for NoteApp plus the follow-up offer.
    assert_eq!(replies.len(), 2);
    assert!(replies[0].text.contains("NoteApp"));
    assert!(replies[0].text.contains("https://noteapp.example"));
    assert_eq!(replies[0].controls[0].data, "price_check:NoteApp");
    assert_eq!(
        session_state(&state, USER).await,
        SessionState::AwaitingFollowUpChoice
    );

    let ctx = state.sessions.session(USER).lock().await.last_query.clone();
    assert_eq!(ctx.as_deref(), Some("notes"));
}

#[tokio::test]
async fn test_follow_up_menu_returns_to_idle() {
    let state = default_state();
    show_results(&state).await;

    handle_event(&state, USER, callback("followup_menu")).await;

    let session = state.sessions.session(USER);
    let ctx = session.lock().await;
    assert_eq!(ctx.state, SessionState::Idle);
    assert!(ctx.last_query.is_none());
    assert!(ctx.last_shown_card.is_empty());
}

#[tokio::test]
async fn test_follow_up_web_runs_fallback_on_last_query_then_idles() {
    let fallback = Arc::new(CountingFallback::new(FallbackReply::Summary(
        "web says hello".to_string(),
    )));
    let state = lexical_state(
        Catalog::from_records(vec![note_app()]).unwrap(),
        Arc::new(EchoReranker),
        fallback.clone(),
    );
    show_results(&state).await;

    let replies = handle_event(&state, USER, callback("followup_web")).await;

    assert_eq!(fallback.call_count(), 1);
    assert_eq!(fallback.queries.lock().unwrap().as_slice(), &["notes".to_string()]);
    assert!(replies[0].text.contains("web says hello"));
    assert_eq!(session_state(&state, USER).await, SessionState::Idle);
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_cancel_discards_session_data_from_any_state() {
    let state = default_state();
    show_results(&state).await;

    handle_event(&state, USER, InboundEvent::Cancel).await;

    let session = state.sessions.session(USER);
    let ctx = session.lock().await;
    assert_eq!(ctx.state, SessionState::Idle);
    assert!(ctx.last_query.is_none());
    assert!(ctx.last_shown_card.is_empty());
}

#[tokio::test]
async fn test_back_after_cancel_fails_gracefully() {
    let state = default_state();
    show_results(&state).await;
    handle_event(&state, USER, InboundEvent::Cancel).await;

    // The card was discarded with the session; the stale callback must
    // get an explicit not-found reply, not a crash.
    let replies = handle_event(&state, USER, callback("back:NoteApp")).await;

    assert_eq!(replies.len(), 1);
    assert!(replies[0].text.contains("couldn't find"));
}

// ============================================================================
// Price check and back
// ============================================================================

#[tokio::test]
async fn test_price_check_without_llm_offers_back_control() {
    let state = default_state();
    show_results(&state).await;

    let replies = handle_event(&state, USER, callback("price_check:NoteApp")).await;

    assert_eq!(replies.len(), 1);
    assert!(replies[0].text.contains("NoteApp"));
    assert_eq!(replies[0].controls[0].data, "back:NoteApp");
}

#[tokio::test]
async fn test_back_restores_the_original_card_verbatim() {
    let state = default_state();
    handle_event(&state, USER, InboundEvent::Start).await;
    handle_event(&state, USER, callback("mode_smart")).await;
    let shown = handle_event(&state, USER, text("notes")).await;
    let original_card = shown[0].clone();

    handle_event(&state, USER, callback("price_check:NoteApp")).await;
    let replies = handle_event(&state, USER, callback("back:NoteApp")).await;

    assert_eq!(replies[0], original_card);
}

#[tokio::test]
async fn test_price_check_for_unknown_card_fails_gracefully() {
    let state = default_state();
    show_results(&state).await;

    let replies = handle_event(&state, USER, callback("price_check:GhostTool")).await;

    assert!(replies[0].text.contains("couldn't find"));
}

// ============================================================================
// Routing recovery and admin commands
// ============================================================================

#[tokio::test]
async fn test_free_text_while_idle_points_at_start() {
    let state = default_state();

    let replies = handle_event(&state, USER, text("hello?")).await;

    assert_eq!(session_state(&state, USER).await, SessionState::Idle);
    assert!(replies[0].text.contains("start"));
}

#[tokio::test]
async fn test_stats_command_is_admin_only() {
    let admin = 42;
    let state = {
        let config = toolrec::Config {
            admin_user_id: Some(admin),
            retrieval_strategy: toolrec::RetrievalStrategy::Lexical,
            ..toolrec::Config::default()
        };
        Arc::new(AppState::with_parts(
            config,
            toolrec::SearchSnapshot {
                catalog: Catalog::from_records(vec![note_app()]).unwrap(),
                vector: None,
            },
            None,
            Arc::new(EchoReranker),
            Arc::new(CountingFallback::new(FallbackReply::Failed)),
            None,
        ))
    };

    let denied = handle_event(
        &state,
        USER,
        InboundEvent::Command {
            name: "stats".to_string(),
        },
    )
    .await;
    assert!(denied.is_empty());

    let allowed = handle_event(
        &state,
        admin,
        InboundEvent::Command {
            name: "stats".to_string(),
        },
    )
    .await;
    assert!(allowed[0].text.contains("Loaded tools: 1"));
}
