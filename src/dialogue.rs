//! Multi-turn dialogue controller.
//!
//! A per-user finite-state machine sequencing mode choice, query
//! intake, result presentation, and follow-up actions. Inputs that no
//! state handler expects are answered with a re-prompt; nothing in
//! this module can crash a session.

use crate::fallback::FallbackReply;
use crate::pipeline::{self, RecommendationOutcome};
use crate::session::{RenderedCard, SessionContext, SessionState};
use crate::state::AppState;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Inbound event from the chat transport.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    /// `/start`: enter the main menu from any state.
    Start,
    /// `/cancel`: discard session data and return to idle.
    Cancel,
    /// Admin commands (`stats`, `rebuild_index`).
    Command { name: String },
    /// Free-text message, routed by the current session state.
    Text { text: String },
    /// Inline control callback (`mode_smart`, `price_check:<name>`, ...).
    Callback { data: String },
}

/// One inline control attached to a reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Control {
    pub label: String,
    pub data: String,
}

/// Outbound message for the transport to deliver.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Reply {
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub controls: Vec<Control>,
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            controls: Vec::new(),
        }
    }

    fn with_controls(text: impl Into<String>, controls: Vec<Control>) -> Self {
        Self {
            text: text.into(),
            controls,
        }
    }
}

const CB_MODE_SMART: &str = "mode_smart";
const CB_MODE_QUICK: &str = "mode_quick";
const CB_FOLLOWUP_WEB: &str = "followup_web";
const CB_FOLLOWUP_MENU: &str = "followup_menu";
const CB_PRICE_PREFIX: &str = "price_check:";
const CB_BACK_PREFIX: &str = "back:";

enum CallbackAction {
    ModeSmart,
    ModeQuick,
    FollowUpWeb,
    FollowUpMenu,
    PriceCheck(String),
    Back(String),
    Unknown,
}

fn parse_callback(data: &str) -> CallbackAction {
    if let Some(name) = data.strip_prefix(CB_PRICE_PREFIX) {
        return CallbackAction::PriceCheck(name.to_string());
    }
    if let Some(name) = data.strip_prefix(CB_BACK_PREFIX) {
        return CallbackAction::Back(name.to_string());
    }
    match data {
        CB_MODE_SMART => CallbackAction::ModeSmart,
        CB_MODE_QUICK => CallbackAction::ModeQuick,
        CB_FOLLOWUP_WEB => CallbackAction::FollowUpWeb,
        CB_FOLLOWUP_MENU => CallbackAction::FollowUpMenu,
        _ => CallbackAction::Unknown,
    }
}

/// Handle one inbound event for one user and produce the replies.
///
/// The per-user session mutex is held for the whole turn, so a user's
/// events process strictly one at a time; a stale callback arriving
/// after a reset only ever sees the already-reset state.
pub async fn handle_event(state: &Arc<AppState>, user_id: i64, event: InboundEvent) -> Vec<Reply> {
    let session = state.sessions.session(user_id);
    let mut ctx = session.lock().await;

    match event {
        InboundEvent::Start => {
            ctx.reset();
            ctx.state = SessionState::AwaitingModeChoice;
            vec![main_menu()]
        }
        InboundEvent::Cancel => {
            ctx.reset();
            vec![Reply::text(
                "Cancelled. Send start whenever you need another tool.",
            )]
        }
        InboundEvent::Command { name } => handle_command(state, user_id, &name),
        InboundEvent::Text { text } => match ctx.state {
            SessionState::AwaitingModeChoice => match text.trim().to_lowercase().as_str() {
                "smart" => {
                    ctx.state = SessionState::AwaitingFreeTextQuery;
                    vec![prompt_free_text()]
                }
                "quick" | "quick search" => {
                    ctx.state = SessionState::AwaitingKeywordQuery;
                    vec![prompt_keyword()]
                }
                _ => vec![main_menu()],
            },
            SessionState::AwaitingFreeTextQuery => {
                ctx.last_query = Some(text.clone());
                let outcome = pipeline::recommend_smart(state, &text).await;
                render_outcome(&mut ctx, outcome)
            }
            SessionState::AwaitingKeywordQuery => {
                ctx.last_query = Some(text.clone());
                let outcome = pipeline::recommend_quick(state, &text).await;
                render_outcome(&mut ctx, outcome)
            }
            SessionState::AwaitingFollowUpChoice => vec![follow_up_offer()],
            SessionState::Idle | SessionState::ResultsShown => {
                // No handler expects free text here; recover by pointing
                // at the entry command.
                vec![Reply::text("Send start to begin looking for a tool.")]
            }
        },
        InboundEvent::Callback { data } => match parse_callback(&data) {
            CallbackAction::ModeSmart if ctx.state == SessionState::AwaitingModeChoice => {
                ctx.state = SessionState::AwaitingFreeTextQuery;
                vec![prompt_free_text()]
            }
            CallbackAction::ModeQuick if ctx.state == SessionState::AwaitingModeChoice => {
                ctx.state = SessionState::AwaitingKeywordQuery;
                vec![prompt_keyword()]
            }
            CallbackAction::FollowUpWeb
                if ctx.state == SessionState::AwaitingFollowUpChoice =>
            {
                let Some(query) = ctx.last_query.clone() else {
                    ctx.reset();
                    return vec![Reply::text(
                        "I lost track of that search. Send start to try again.",
                    )];
                };
                let reply = render_fallback(state.fallback.recommend(&query).await);
                ctx.reset();
                reply
            }
            CallbackAction::FollowUpMenu => {
                ctx.reset();
                vec![Reply::text(
                    "Okay, back to the start. Send start whenever you need another tool.",
                )]
            }
            CallbackAction::PriceCheck(name) => price_check(state, &mut ctx, &name).await,
            CallbackAction::Back(name) => match ctx.last_shown_card.get(&name.to_lowercase()) {
                Some(card) => vec![Reply::with_controls(card.text.clone(), card.controls.clone())],
                None => vec![Reply::text(
                    "Sorry, I couldn't find that tool's information anymore.",
                )],
            },
            _ => {
                tracing::debug!(user_id, data = %data, "Callback with no handler in current state");
                vec![reprompt_for(ctx.state)]
            }
        },
    }
}

fn handle_command(state: &Arc<AppState>, user_id: i64, name: &str) -> Vec<Reply> {
    if state.config.admin_user_id != Some(user_id) {
        // Non-admin commands are ignored, as the transport expects.
        return Vec::new();
    }
    match name {
        "stats" => {
            let snapshot = state.current_snapshot();
            vec![Reply::text(format!(
                "Loaded tools: {}\nUsers seen: {}",
                snapshot.catalog.len(),
                state.sessions.user_count()
            ))]
        }
        "rebuild_index" => match state.trigger_rebuild() {
            Ok(job) => vec![Reply::text(format!("Index rebuild started (job {}).", job))],
            Err(reason) => vec![Reply::text(format!("Cannot rebuild: {}.", reason))],
        },
        _ => vec![Reply::text(format!("Unknown command: {}", name))],
    }
}

fn main_menu() -> Reply {
    Reply::with_controls(
        "Hi! How would you like to find a tool?",
        vec![
            Control {
                label: "✨ Smart search".to_string(),
                data: CB_MODE_SMART.to_string(),
            },
            Control {
                label: "🔎 Quick search".to_string(),
                data: CB_MODE_QUICK.to_string(),
            },
        ],
    )
}

fn prompt_free_text() -> Reply {
    Reply::text("Describe what you're trying to do and I'll find a matching tool.")
}

fn prompt_keyword() -> Reply {
    Reply::text("Send me a keyword (for example: video, notes, design).")
}

fn follow_up_offer() -> Reply {
    Reply::with_controls(
        "Anything else?",
        vec![
            Control {
                label: "🌐 Search the web".to_string(),
                data: CB_FOLLOWUP_WEB.to_string(),
            },
            Control {
                label: "🏠 Main menu".to_string(),
                data: CB_FOLLOWUP_MENU.to_string(),
            },
        ],
    )
}

fn reprompt_for(state: SessionState) -> Reply {
    match state {
        SessionState::AwaitingModeChoice => main_menu(),
        SessionState::AwaitingFreeTextQuery => prompt_free_text(),
        SessionState::AwaitingKeywordQuery => prompt_keyword(),
        SessionState::AwaitingFollowUpChoice | SessionState::ResultsShown => follow_up_offer(),
        SessionState::Idle => Reply::text("Send start to begin looking for a tool."),
    }
}

/// Render a pipeline outcome, snapshotting each shown card so price
/// check and back can operate on it later, and finish with the
/// follow-up offer.
fn render_outcome(ctx: &mut SessionContext, outcome: RecommendationOutcome) -> Vec<Reply> {
    let mut replies = Vec::new();

    match outcome {
        RecommendationOutcome::Matches(records) => {
            ctx.state = SessionState::ResultsShown;
            for record in records {
                let text = format!(
                    "{}\n{}\n🔗 {}",
                    record.name, record.description, record.url
                );
                let controls = vec![Control {
                    label: "💰 Price check".to_string(),
                    data: format!("{}{}", CB_PRICE_PREFIX, record.name),
                }];
                ctx.last_shown_card.insert(
                    record.name.to_lowercase(),
                    RenderedCard {
                        text: text.clone(),
                        controls: controls.clone(),
                    },
                );
                replies.push(Reply::with_controls(text, controls));
            }
        }
        RecommendationOutcome::Fallback(reply) => {
            ctx.state = SessionState::ResultsShown;
            replies.extend(render_fallback(reply));
        }
        RecommendationOutcome::Unavailable => {
            ctx.reset();
            return vec![Reply::text(
                "The tool catalog is under maintenance right now. Please try again later.",
            )];
        }
    }

    replies.push(follow_up_offer());
    ctx.state = SessionState::AwaitingFollowUpChoice;
    replies
}

fn render_fallback(reply: FallbackReply) -> Vec<Reply> {
    match reply {
        FallbackReply::Suggestions(suggestions) => {
            let mut replies =
                vec![Reply::text("Nothing in my catalog fits, but these might help:")];
            for s in suggestions {
                replies.push(Reply::text(format!(
                    "{}\n{}\n🔗 {}",
                    s.name, s.description, s.url
                )));
            }
            replies
        }
        FallbackReply::Summary(summary) => vec![Reply::text(summary)],
        FallbackReply::Failed => vec![Reply::text(
            "I couldn't complete the search this time. You can retry or go back to the main menu.",
        )],
    }
}

/// Single pricing lookup for a shown result. The original card stays
/// snapshotted in the session so `back:<name>` restores it verbatim.
async fn price_check(state: &Arc<AppState>, ctx: &mut SessionContext, name: &str) -> Vec<Reply> {
    if !ctx.last_shown_card.contains_key(&name.to_lowercase()) {
        return vec![Reply::text(
            "Sorry, I couldn't find that tool's information anymore.",
        )];
    }

    let snapshot = state.current_snapshot();
    let Some(record) = snapshot.catalog.find_by_name(name) else {
        return vec![Reply::text(
            "Sorry, I couldn't find that tool's information anymore.",
        )];
    };

    let Some(llm) = &state.llm else {
        return vec![price_reply(
            &record.name,
            "Price lookup isn't available right now.".to_string(),
        )];
    };

    let question = format!(
        "Summarize the current pricing of the tool \"{}\" ({}) in two or \
         three short sentences. If you are not sure, say so.",
        record.name, record.url
    );
    let text = match llm
        .chat_text("You are a concise software pricing assistant.", &question)
        .await
    {
        Ok(answer) => answer,
        Err(e) => {
            tracing::warn!(error = %e, tool = %record.name, "Price lookup failed");
            "I couldn't fetch pricing information right now.".to_string()
        }
    };

    vec![price_reply(&record.name, text)]
}

fn price_reply(name: &str, text: String) -> Reply {
    Reply::with_controls(
        format!("💰 {}\n{}", name, text),
        vec![Control {
            label: "⬅️ Back".to_string(),
            data: format!("{}{}", CB_BACK_PREFIX, name),
        }],
    )
}
